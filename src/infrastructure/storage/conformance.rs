//! Repository behaviour shared by every storage backend
//!
//! Each check takes a fresh set of repositories; `repository_conformance!`
//! instantiates all checks for one backend constructor.

use std::collections::BTreeSet;

use crate::domain::{
    Account, AccountKey, Context, DomainError, ProviderType, RefreshToken, RefreshTokenId, User,
    UserId, VerificationKind,
};
use crate::infrastructure::repositories::Repositories;

use super::StorageConfig;

fn user_id(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn create_test_user(id: &str, email: &str, username: &str) -> User {
    User::new(user_id(id), email, username)
}

async fn check_user_round_trip(repos: Repositories) {
    let ctx = Context::new();

    let mut user = create_test_user("user1", "a@x.com", "Alice");
    user.set_password_hash("$argon2id$hash");
    user.set_given_name("Alice");
    user.set_picture("https://example.com/a.png");
    user.merge_user_metadata(serde_json::json!({"theme": "dark"}).as_object().unwrap().clone());
    user.set_verification_token(VerificationKind::Confirmation, "conf1");
    user.set_verification_sent_at(VerificationKind::Confirmation, chrono::Utc::now());

    let saved = repos.users.save(&ctx, user).await.unwrap();
    let found = repos.users.find_by_id(&ctx, &user_id("user1")).await.unwrap();

    assert_eq!(found, saved);
    assert!(repos.users.exists_by_id(&ctx, &user_id("user1")).await.unwrap());
    assert!(!repos.users.exists_by_id(&ctx, &user_id("user2")).await.unwrap());
}

async fn check_account_and_token_round_trip(repos: Repositories) {
    let ctx = Context::new();

    let account = Account::new(user_id("user1"), ProviderType::Password, "a@x.com");
    let saved = repos.accounts.save(&ctx, account).await.unwrap();
    let key = AccountKey::new(&user_id("user1"), ProviderType::Password, "a@x.com");
    assert_eq!(repos.accounts.find(&ctx, &key).await.unwrap(), saved);

    let token = RefreshToken::new(RefreshTokenId::new("tok1").unwrap(), user_id("user1"), "secret1");
    let saved = repos.refresh_tokens.save(&ctx, token).await.unwrap();
    let found = repos
        .refresh_tokens
        .find_by_id(&ctx, &RefreshTokenId::new("tok1").unwrap())
        .await
        .unwrap();
    assert_eq!(found, saved);
    assert_eq!(repos.refresh_tokens.find_by_token(&ctx, "secret1").await.unwrap(), saved);
}

async fn check_pagination_completeness(repos: Repositories) {
    let ctx = Context::new();
    let total = 7;

    let mut expected = Vec::new();
    for i in 0..total {
        let id = format!("user{}", i);
        repos
            .users
            .save(&ctx, create_test_user(&id, &format!("u{}@x.com", i), &format!("name{}", i)))
            .await
            .unwrap();
        expected.push(id);
    }
    expected.sort();

    for limit in 1..=total {
        let mut seen = Vec::new();
        let mut cursor = String::new();

        loop {
            let page = repos.users.find_all(&ctx, &cursor, limit as i64).await.unwrap();
            assert!(page.len() <= limit);
            seen.extend(page.items.iter().map(|u| u.id().as_str().to_string()));

            if !page.has_more() {
                break;
            }
            assert_eq!(page.len(), limit);
            cursor = page.next_cursor;
        }

        assert_eq!(seen, expected, "limit {}", limit);
    }

    let page = repos.users.find_all(&ctx, "", 0).await.unwrap();
    assert_eq!(page.len(), total);
    assert!(!page.has_more());
}

async fn check_identifier_uniqueness(repos: Repositories) {
    let ctx = Context::new();

    repos
        .users
        .save(&ctx, create_test_user("user1", "a@x.com", "alice"))
        .await
        .unwrap();

    let same_email = repos
        .users
        .save(&ctx, create_test_user("user2", "a@x.com", "bob"))
        .await
        .unwrap_err();
    assert!(same_email.is_already_exists());

    let same_username = repos
        .users
        .save(&ctx, create_test_user("user3", "b@x.com", "ALICE"))
        .await
        .unwrap_err();
    assert!(same_username.is_already_exists());

    assert_eq!(repos.users.count(&ctx).await.unwrap(), 1);
    assert!(!repos.users.exists_by_identifier(&ctx, "bob").await.unwrap());
    assert!(!repos.users.exists_by_identifier(&ctx, "b@x.com").await.unwrap());

    // Re-saving the owner is not a conflict
    let user = repos.users.find_by_id(&ctx, &user_id("user1")).await.unwrap();
    repos.users.save(&ctx, user).await.unwrap();
}

async fn check_stale_index_cleanup(repos: Repositories) {
    let ctx = Context::new();

    let mut user = repos
        .users
        .save(&ctx, create_test_user("user1", "a@x.com", "alice"))
        .await
        .unwrap();

    user.set_email("b@x.com");
    user.set_username("alicia");
    repos.users.save(&ctx, user).await.unwrap();

    assert!(!repos.users.exists_by_identifier(&ctx, "a@x.com").await.unwrap());
    assert!(!repos.users.exists_by_identifier(&ctx, "alice").await.unwrap());
    assert!(repos.users.exists_by_identifier(&ctx, "b@x.com").await.unwrap());
    assert!(repos.users.exists_by_identifier(&ctx, "alicia").await.unwrap());

    // The released identifiers can be claimed by someone else
    repos
        .users
        .save(&ctx, create_test_user("user2", "a@x.com", "alice"))
        .await
        .unwrap();
}

async fn check_verification_token_lookups(repos: Repositories) {
    let ctx = Context::new();

    let mut user = create_test_user("user1", "a@x.com", "alice");
    user.set_verification_token(VerificationKind::Confirmation, "conf1");
    user.set_verification_token(VerificationKind::Recovery, "rec1");
    user.stage_new_email("new@x.com");
    user.set_verification_token(VerificationKind::EmailChange, "chg1");
    let mut user = repos.users.save(&ctx, user).await.unwrap();

    let by_confirmation = repos.users.find_by_confirmation_token(&ctx, "conf1").await.unwrap();
    let by_recovery = repos.users.find_by_recovery_token(&ctx, "rec1").await.unwrap();
    let by_change = repos.users.find_by_email_change_token(&ctx, "chg1").await.unwrap();
    assert_eq!(by_confirmation.id(), user.id());
    assert_eq!(by_recovery.id(), user.id());
    assert_eq!(by_change.new_email(), "new@x.com");

    user.clear_recovery();
    repos.users.save(&ctx, user).await.unwrap();

    assert!(repos
        .users
        .find_by_recovery_token(&ctx, "rec1")
        .await
        .unwrap_err()
        .is_not_found());
    assert!(repos.users.find_by_confirmation_token(&ctx, "conf1").await.is_ok());

    let mut other = create_test_user("user2", "b@x.com", "bob");
    other.set_verification_token(VerificationKind::Confirmation, "conf1");
    let err = repos.users.save(&ctx, other).await.unwrap_err();
    assert!(err.is_already_exists());
}

async fn check_failed_validation_leaves_storage_untouched(repos: Repositories) {
    let ctx = Context::new();

    let user = repos
        .users
        .save(&ctx, create_test_user("user1", "a@x.com", "alice"))
        .await
        .unwrap();

    let mut broken = user.clone();
    broken.set_email("not-an-email");
    let err = repos.users.save(&ctx, broken).await.unwrap_err();
    assert!(matches!(err, DomainError::Validation { .. }));

    let stored = repos.users.find_by_id(&ctx, &user_id("user1")).await.unwrap();
    assert_eq!(stored, user);
    assert!(!repos.users.exists_by_identifier(&ctx, "not-an-email").await.unwrap());
}

async fn check_delete(repos: Repositories) {
    let ctx = Context::new();

    repos
        .users
        .save(&ctx, create_test_user("user1", "a@x.com", "alice"))
        .await
        .unwrap();

    repos.users.delete_by_id(&ctx, &user_id("user1")).await.unwrap();
    assert!(!repos.users.exists_by_identifier(&ctx, "a@x.com").await.unwrap());
    assert_eq!(repos.users.count(&ctx).await.unwrap(), 0);

    // Missing records delete cleanly
    repos.users.delete_by_id(&ctx, &user_id("user1")).await.unwrap();
    repos
        .refresh_tokens
        .delete_by_id(&ctx, &RefreshTokenId::new("missing").unwrap())
        .await
        .unwrap();
    repos
        .accounts
        .delete(
            &ctx,
            &AccountKey::new(&user_id("user1"), ProviderType::Password, "a@x.com"),
        )
        .await
        .unwrap();
}

async fn check_delete_all(repos: Repositories) {
    let ctx = Context::new();

    for i in 0..3 {
        repos
            .users
            .save(
                &ctx,
                create_test_user(&format!("user{}", i), &format!("u{}@x.com", i), &format!("name{}", i)),
            )
            .await
            .unwrap();
        repos
            .refresh_tokens
            .save(&ctx, RefreshToken::issue(user_id("user0")))
            .await
            .unwrap();
    }

    repos.users.delete_all(&ctx).await.unwrap();

    assert_eq!(repos.users.count(&ctx).await.unwrap(), 0);
    assert!(repos.users.find_all(&ctx, "", 0).await.unwrap().is_empty());
    assert!(!repos.users.exists_by_identifier(&ctx, "u1@x.com").await.unwrap());
    assert_eq!(repos.refresh_tokens.count(&ctx).await.unwrap(), 3);

    repos.refresh_tokens.delete_all(&ctx).await.unwrap();
    assert!(repos
        .refresh_tokens
        .find_all_for_user(&ctx, "user0", "", 0)
        .await
        .unwrap()
        .is_empty());
}

async fn check_refresh_tokens_for_user(repos: Repositories) {
    let ctx = Context::new();

    let mut expected = BTreeSet::new();
    for _ in 0..5 {
        let token = repos
            .refresh_tokens
            .save(&ctx, RefreshToken::issue(user_id("user1")))
            .await
            .unwrap();
        expected.insert(token.id().as_str().to_string());
    }
    repos
        .refresh_tokens
        .save(&ctx, RefreshToken::issue(user_id("user2")))
        .await
        .unwrap();

    let mut seen = BTreeSet::new();
    let mut cursor = String::new();
    loop {
        let page = repos
            .refresh_tokens
            .find_all_for_user(&ctx, "user1", &cursor, 2)
            .await
            .unwrap();
        for token in &page.items {
            assert!(seen.insert(token.id().as_str().to_string()));
        }
        if !page.has_more() {
            break;
        }
        cursor = page.next_cursor;
    }
    assert_eq!(seen, expected);

    let err = repos
        .refresh_tokens
        .find_all_for_user(&ctx, "", "", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation { .. }));
}

async fn check_revoked_token_stays_revoked(repos: Repositories) {
    let ctx = Context::new();

    let token = repos
        .refresh_tokens
        .save(&ctx, RefreshToken::issue(user_id("user1")))
        .await
        .unwrap();
    let active = token.clone();

    repos.refresh_tokens.save(&ctx, token.clone().revoke()).await.unwrap();

    let err = repos.refresh_tokens.save(&ctx, active).await.unwrap_err();
    assert!(matches!(err, DomainError::TokenRevoked { .. }));

    let err = repos
        .refresh_tokens
        .save(&ctx, token.clone().revoke())
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::TokenRevoked { .. }));

    let stored = repos.refresh_tokens.find_by_id(&ctx, token.id()).await.unwrap();
    assert!(stored.is_revoked());
}

async fn check_duplicate_refresh_secret(repos: Repositories) {
    let ctx = Context::new();

    repos
        .refresh_tokens
        .save(&ctx, RefreshToken::new(RefreshTokenId::new("tok1").unwrap(), user_id("user1"), "same"))
        .await
        .unwrap();

    let err = repos
        .refresh_tokens
        .save(&ctx, RefreshToken::new(RefreshTokenId::new("tok2").unwrap(), user_id("user1"), "same"))
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
}

async fn check_cancelled_context(repos: Repositories) {
    let ctx = Context::new();
    ctx.cancel();

    let err = repos
        .users
        .save(&ctx, create_test_user("user1", "a@x.com", "alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Cancelled));

    assert!(matches!(
        repos.users.count(&ctx).await,
        Err(DomainError::Cancelled)
    ));
    assert!(matches!(
        repos.refresh_tokens.find_by_token(&ctx, "x").await,
        Err(DomainError::Cancelled)
    ));

    let live = Context::new();
    assert_eq!(repos.users.count(&live).await.unwrap(), 0);
}

macro_rules! repository_conformance {
    ($backend:ident, $make:expr) => {
        mod $backend {
            use super::*;

            async fn repos() -> Repositories {
                $make.await.unwrap()
            }

            #[tokio::test]
            async fn user_round_trip() {
                check_user_round_trip(repos().await).await;
            }

            #[tokio::test]
            async fn account_and_token_round_trip() {
                check_account_and_token_round_trip(repos().await).await;
            }

            #[tokio::test]
            async fn pagination_completeness() {
                check_pagination_completeness(repos().await).await;
            }

            #[tokio::test]
            async fn identifier_uniqueness() {
                check_identifier_uniqueness(repos().await).await;
            }

            #[tokio::test]
            async fn stale_index_cleanup() {
                check_stale_index_cleanup(repos().await).await;
            }

            #[tokio::test]
            async fn verification_token_lookups() {
                check_verification_token_lookups(repos().await).await;
            }

            #[tokio::test]
            async fn failed_validation_leaves_storage_untouched() {
                check_failed_validation_leaves_storage_untouched(repos().await).await;
            }

            #[tokio::test]
            async fn delete() {
                check_delete(repos().await).await;
            }

            #[tokio::test]
            async fn delete_all() {
                check_delete_all(repos().await).await;
            }

            #[tokio::test]
            async fn refresh_tokens_for_user() {
                check_refresh_tokens_for_user(repos().await).await;
            }

            #[tokio::test]
            async fn revoked_token_stays_revoked() {
                check_revoked_token_stays_revoked(repos().await).await;
            }

            #[tokio::test]
            async fn duplicate_refresh_secret() {
                check_duplicate_refresh_secret(repos().await).await;
            }

            #[tokio::test]
            async fn cancelled_context() {
                check_cancelled_context(repos().await).await;
            }
        }
    };
}

repository_conformance!(jsonmutexdb, Repositories::in_memory());

repository_conformance!(
    leveldb,
    Repositories::open(&StorageConfig::LevelDbInMemory {
        key_prefix: "authzy:".to_string(),
    })
);
