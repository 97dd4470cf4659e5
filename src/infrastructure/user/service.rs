//! User service for identity lifecycle and authentication

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::domain::context::Context;
use crate::domain::user::{User, UserId, UserRepository};
use crate::domain::DomainError;

use super::password::PasswordHasher;

/// Request for creating a new user
#[derive(Debug, Clone, Default)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    /// Plaintext; an empty password leaves the user without one
    pub password: String,
    pub user_metadata: Map<String, Value>,
}

/// User service for identity management
#[derive(Debug)]
pub struct UserService<R: ?Sized = dyn UserRepository, H: ?Sized = dyn PasswordHasher> {
    repository: Arc<R>,
    hasher: Arc<H>,
}

impl<R, H> Clone for UserService<R, H>
where
    R: ?Sized,
    H: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            hasher: Arc::clone(&self.hasher),
        }
    }
}

impl<R, H> UserService<R, H>
where
    R: UserRepository + ?Sized,
    H: PasswordHasher + ?Sized,
{
    /// Create a new user service
    pub fn new(repository: Arc<R>, hasher: Arc<H>) -> Self {
        Self { repository, hasher }
    }

    /// Create a new user with a fresh ID
    ///
    /// Fails with `AlreadyExists` if the username or email is taken; nothing
    /// is written in that case.
    pub async fn create_user(
        &self,
        ctx: &Context,
        request: CreateUserRequest,
    ) -> Result<User, DomainError> {
        let mut user = User::new(UserId::generate(), &request.email, &request.username);

        if self
            .repository
            .exists_by_identifier(ctx, user.normalized_username())
            .await?
        {
            return Err(DomainError::already_exists(format!(
                "Username '{}' is already taken",
                request.username
            )));
        }

        if self.repository.exists_by_identifier(ctx, user.email()).await? {
            return Err(DomainError::already_exists(format!(
                "Email '{}' is already registered",
                user.email()
            )));
        }

        if !request.password.is_empty() {
            user.set_password_hash(self.hasher.hash(&request.password)?);
        }

        if !request.user_metadata.is_empty() {
            user.merge_user_metadata(request.user_metadata);
        }

        let user = self.repository.save(ctx, user).await?;
        tracing::info!(user_id = %user.id(), "User created");

        Ok(user)
    }

    /// Persist changes to an existing user
    pub async fn update_user(&self, ctx: &Context, user: User) -> Result<User, DomainError> {
        if !self.repository.exists_by_id(ctx, user.id()).await? {
            return Err(DomainError::not_found(format!("User '{}' not found", user.id())));
        }

        self.repository.save(ctx, user).await
    }

    /// Replace the password of a stored user
    pub async fn update_password(
        &self,
        ctx: &Context,
        id: &UserId,
        password: &str,
    ) -> Result<User, DomainError> {
        let mut user = self.repository.find_by_id(ctx, id).await?;

        if !password.is_empty() {
            user.set_password_hash(self.hasher.hash(password)?);
        }

        self.repository.save(ctx, user).await
    }

    /// Mark the user's email as verified
    pub async fn confirm_user(&self, ctx: &Context, id: &UserId) -> Result<User, DomainError> {
        let mut user = self.repository.find_by_id(ctx, id).await?;
        user.confirm();

        let user = self.repository.save(ctx, user).await?;
        tracing::info!(user_id = %user.id(), "User confirmed");

        Ok(user)
    }

    /// Drop a redeemed recovery token
    pub async fn confirm_recovery(&self, ctx: &Context, mut user: User) -> Result<User, DomainError> {
        user.clear_recovery();
        self.repository.save(ctx, user).await
    }

    /// Promote the staged email to the primary one
    pub async fn confirm_email_change(
        &self,
        ctx: &Context,
        mut user: User,
    ) -> Result<User, DomainError> {
        user.apply_email_change();

        let user = self.repository.save(ctx, user).await?;
        tracing::info!(user_id = %user.id(), "Email changed");

        Ok(user)
    }

    pub async fn find_user_by_id(&self, ctx: &Context, id: &UserId) -> Result<User, DomainError> {
        self.repository.find_by_id(ctx, id).await
    }

    pub async fn find_user_by_email(&self, ctx: &Context, email: &str) -> Result<User, DomainError> {
        self.repository
            .find_by_identifier(ctx, &email.to_lowercase())
            .await
    }

    pub async fn find_user_by_confirmation_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<User, DomainError> {
        self.repository.find_by_confirmation_token(ctx, token).await
    }

    pub async fn find_user_by_recovery_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<User, DomainError> {
        self.repository.find_by_recovery_token(ctx, token).await
    }

    pub async fn find_user_by_email_change_token(
        &self,
        ctx: &Context,
        token: &str,
    ) -> Result<User, DomainError> {
        self.repository.find_by_email_change_token(ctx, token).await
    }

    /// Authenticate with a username or email and a password
    ///
    /// Unknown identifiers and wrong passwords are indistinguishable.
    pub async fn authenticate(
        &self,
        ctx: &Context,
        identifier: &str,
        password: &str,
    ) -> Result<User, DomainError> {
        let user = match self
            .repository
            .find_by_identifier(ctx, &identifier.to_lowercase())
            .await
        {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(DomainError::InvalidCredentials),
            Err(e) => return Err(e),
        };

        if !user.has_password() || !self.hasher.verify(password, user.password_hash()) {
            tracing::debug!(user_id = %user.id(), "Password mismatch");
            return Err(DomainError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Record a successful sign in on the stored user
    pub async fn user_signed_in(
        &self,
        ctx: &Context,
        user: &User,
        ip: Option<&str>,
    ) -> Result<User, DomainError> {
        let mut stored = self.repository.find_by_id(ctx, user.id()).await?;
        let ip = ip.map(str::to_string).unwrap_or_else(|| stored.last_ip().to_string());
        stored.record_sign_in(ip);

        self.repository.save(ctx, stored).await
    }

    /// Shallow-merge user metadata into the stored user; `null` values remove keys
    pub async fn update_user_metadata(
        &self,
        ctx: &Context,
        user: &User,
        updates: Map<String, Value>,
    ) -> Result<User, DomainError> {
        let mut stored = self.repository.find_by_id(ctx, user.id()).await?;
        stored.merge_user_metadata(updates);

        self.repository.save(ctx, stored).await
    }

    /// Shallow-merge application metadata into the stored user; `null` values remove keys
    pub async fn update_app_metadata(
        &self,
        ctx: &Context,
        user: &User,
        updates: Map<String, Value>,
    ) -> Result<User, DomainError> {
        let mut stored = self.repository.find_by_id(ctx, user.id()).await?;
        stored.merge_app_metadata(updates);

        self.repository.save(ctx, stored).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::VerificationKind;
    use crate::infrastructure::storage::StorageFactory;
    use crate::infrastructure::user::password::MockPasswordHasher;
    use crate::infrastructure::user::repository::StorageUserRepository;
    use serde_json::json;

    fn create_hasher() -> MockPasswordHasher {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .returning(|password| Ok(format!("hashed:{}", password)));
        hasher
            .expect_verify()
            .returning(|password, hash| hash == format!("hashed:{}", password));
        hasher
    }

    fn create_service() -> UserService<StorageUserRepository, MockPasswordHasher> {
        let repository = Arc::new(StorageUserRepository::new(
            StorageFactory::create_in_memory::<User>(),
        ));
        UserService::new(repository, Arc::new(create_hasher()))
    }

    fn make_request(email: &str, username: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    fn metadata(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_user() {
        let service = create_service();
        let ctx = Context::new();

        let user = service
            .create_user(&ctx, make_request("A@X.com", "Alice", "secret"))
            .await
            .unwrap();

        assert_eq!(user.email(), "a@x.com");
        assert_eq!(user.normalized_username(), "alice");
        assert_eq!(user.password_hash(), "hashed:secret");
        assert!(user.password_updated_at().is_some());
        assert_eq!(user.id().as_str().len(), 26);
    }

    #[tokio::test]
    async fn test_create_user_collisions() {
        let service = create_service();
        let ctx = Context::new();

        service
            .create_user(&ctx, make_request("a@x.com", "alice", "secret"))
            .await
            .unwrap();

        assert!(service
            .repository
            .exists_by_identifier(&ctx, "a@x.com")
            .await
            .unwrap());

        let same_email = service
            .create_user(&ctx, make_request("A@X.com", "bob", "secret"))
            .await
            .unwrap_err();
        assert!(same_email.is_already_exists());

        let same_username = service
            .create_user(&ctx, make_request("b@x.com", "ALICE", "secret"))
            .await
            .unwrap_err();
        assert!(same_username.is_already_exists());

        assert_eq!(service.repository.count(&ctx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_plaintext_is_never_stored() {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .withf(|password| password == "hunter22")
            .times(1)
            .returning(|_| Ok("$argon2id$opaque".to_string()));

        let repository = Arc::new(StorageUserRepository::new(
            StorageFactory::create_in_memory::<User>(),
        ));
        let service = UserService::new(repository, Arc::new(hasher));
        let ctx = Context::new();

        let user = service
            .create_user(&ctx, make_request("a@x.com", "alice", "hunter22"))
            .await
            .unwrap();

        let stored = serde_json::to_string(&user).unwrap();
        assert!(!stored.contains("hunter22"));
    }

    #[tokio::test]
    async fn test_hasher_failure_persists_nothing() {
        let mut hasher = MockPasswordHasher::new();
        hasher
            .expect_hash()
            .returning(|_| Err(DomainError::credential("boom")));

        let repository = Arc::new(StorageUserRepository::new(
            StorageFactory::create_in_memory::<User>(),
        ));
        let service = UserService::new(repository, Arc::new(hasher));
        let ctx = Context::new();

        let err = service
            .create_user(&ctx, make_request("a@x.com", "alice", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Credential { .. }));
        assert_eq!(service.repository.count(&ctx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_user_requires_existing() {
        let service = create_service();
        let ctx = Context::new();

        let stranger = User::new(UserId::new("ghost").unwrap(), "g@x.com", "ghost");
        let err = service.update_user(&ctx, stranger).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_authenticate() {
        let service = create_service();
        let ctx = Context::new();

        let user = service
            .create_user(&ctx, make_request("a@x.com", "alice", "secret"))
            .await
            .unwrap();

        let by_email = service.authenticate(&ctx, "A@X.COM", "secret").await.unwrap();
        assert_eq!(by_email.id(), user.id());

        let by_username = service.authenticate(&ctx, "Alice", "secret").await.unwrap();
        assert_eq!(by_username.id(), user.id());

        let wrong = service.authenticate(&ctx, "alice", "nope").await.unwrap_err();
        assert!(matches!(wrong, DomainError::InvalidCredentials));

        let unknown = service.authenticate(&ctx, "bob", "secret").await.unwrap_err();
        assert!(matches!(unknown, DomainError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_update_password() {
        let service = create_service();
        let ctx = Context::new();

        let user = service
            .create_user(&ctx, make_request("a@x.com", "alice", "old"))
            .await
            .unwrap();

        service.update_password(&ctx, user.id(), "new").await.unwrap();

        assert!(service.authenticate(&ctx, "alice", "old").await.is_err());
        assert!(service.authenticate(&ctx, "alice", "new").await.is_ok());
    }

    #[tokio::test]
    async fn test_confirm_user() {
        let service = create_service();
        let ctx = Context::new();

        let mut user = service
            .create_user(&ctx, make_request("a@x.com", "alice", "secret"))
            .await
            .unwrap();
        user.set_verification_token(VerificationKind::Confirmation, "conf1");
        let user = service.update_user(&ctx, user).await.unwrap();

        let confirmed = service.confirm_user(&ctx, user.id()).await.unwrap();
        assert!(confirmed.is_email_verified());
        assert!(confirmed.valid_since().is_some());
        assert!(confirmed.confirmation_token().is_empty());
        assert!(service
            .find_user_by_confirmation_token(&ctx, "conf1")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_confirm_email_change() {
        let service = create_service();
        let ctx = Context::new();

        let mut user = service
            .create_user(&ctx, make_request("a@x.com", "alice", "secret"))
            .await
            .unwrap();
        user.stage_new_email("b@x.com");
        user.set_verification_token(VerificationKind::EmailChange, "chg1");
        let user = service.update_user(&ctx, user).await.unwrap();

        let changed = service.confirm_email_change(&ctx, user).await.unwrap();
        assert_eq!(changed.email(), "b@x.com");
        assert!(changed.new_email().is_empty());
        assert!(service.find_user_by_email(&ctx, "B@x.com").await.is_ok());
        assert!(service.find_user_by_email(&ctx, "a@x.com").await.is_err());
    }

    #[tokio::test]
    async fn test_user_signed_in() {
        let service = create_service();
        let ctx = Context::new();

        let user = service
            .create_user(&ctx, make_request("a@x.com", "alice", "secret"))
            .await
            .unwrap();

        service.user_signed_in(&ctx, &user, Some("10.0.0.1")).await.unwrap();
        let user = service.user_signed_in(&ctx, &user, None).await.unwrap();

        assert_eq!(user.logins_count(), 2);
        assert_eq!(user.last_ip(), "10.0.0.1");
        assert!(user.last_login_at().is_some());
    }

    #[tokio::test]
    async fn test_metadata_merge() {
        let service = create_service();
        let ctx = Context::new();

        let user = service
            .create_user(&ctx, make_request("a@x.com", "alice", "secret"))
            .await
            .unwrap();

        let user = service
            .update_user_metadata(&ctx, &user, metadata(json!({"a": 1, "b": 2})))
            .await
            .unwrap();
        let user = service
            .update_user_metadata(&ctx, &user, metadata(json!({"a": null, "c": 3})))
            .await
            .unwrap();

        assert_eq!(Value::Object(user.user_metadata().clone()), json!({"b": 2, "c": 3}));

        let user = service
            .update_app_metadata(&ctx, &user, metadata(json!({"roles": ["admin"]})))
            .await
            .unwrap();
        assert_eq!(user.app_metadata()["roles"], json!(["admin"]));
    }

    #[tokio::test]
    async fn test_metadata_update_keeps_newer_writes() {
        let service = create_service();
        let ctx = Context::new();

        let stale = service
            .create_user(&ctx, make_request("a@x.com", "alice", "secret"))
            .await
            .unwrap();
        service.user_signed_in(&ctx, &stale, Some("10.0.0.1")).await.unwrap();

        let user = service
            .update_user_metadata(&ctx, &stale, metadata(json!({"theme": "dark"})))
            .await
            .unwrap();
        assert_eq!(user.logins_count(), 1);
        assert_eq!(user.last_ip(), "10.0.0.1");

        let user = service
            .update_app_metadata(&ctx, &stale, metadata(json!({"plan": "pro"})))
            .await
            .unwrap();
        assert_eq!(user.logins_count(), 1);
        assert_eq!(user.user_metadata()["theme"], json!("dark"));

        let stored = service.find_user_by_id(&ctx, stale.id()).await.unwrap();
        assert_eq!(stored, user);
    }

    #[tokio::test]
    async fn test_metadata_update_requires_stored_user() {
        let service = create_service();
        let ctx = Context::new();
        let unknown = User::new(UserId::new("ghost").unwrap(), "g@x.com", "ghost");

        let err = service
            .update_app_metadata(&ctx, &unknown, metadata(json!({"plan": "pro"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = service
            .update_user_metadata(&ctx, &unknown, metadata(json!({"theme": "dark"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(service.find_user_by_id(&ctx, unknown.id()).await.is_err());
    }
}
