//! Account service

use std::sync::Arc;

use crate::domain::account::{Account, AccountRepository};
use crate::domain::context::Context;
use crate::domain::user::UserId;
use crate::domain::DomainError;

/// Links users to their credential providers
#[derive(Debug, Clone)]
pub struct AccountService {
    repository: Arc<dyn AccountRepository>,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_account(
        &self,
        ctx: &Context,
        account: Account,
    ) -> Result<Account, DomainError> {
        let account = self.repository.save(ctx, account).await?;
        tracing::info!(
            user_id = %account.user_id(),
            provider = %account.provider(),
            "Account linked"
        );

        Ok(account)
    }

    pub async fn update_account(
        &self,
        ctx: &Context,
        account: Account,
    ) -> Result<Account, DomainError> {
        self.repository.save(ctx, account).await
    }

    pub async fn find_all_for_user(
        &self,
        ctx: &Context,
        user_id: &UserId,
    ) -> Result<Vec<Account>, DomainError> {
        self.repository.find_all_for_user(ctx, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::ProviderType;
    use crate::infrastructure::account::StorageAccountRepository;
    use crate::infrastructure::storage::StorageFactory;

    fn create_service() -> AccountService {
        AccountService::new(Arc::new(StorageAccountRepository::new(
            StorageFactory::create_in_memory::<Account>(),
        )))
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let service = create_service();
        let ctx = Context::new();
        let user_id = UserId::new("user1").unwrap();

        service
            .create_account(&ctx, Account::new(user_id.clone(), ProviderType::Password, "a@x.com"))
            .await
            .unwrap();

        let accounts = service.find_all_for_user(&ctx, &user_id).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].provider(), ProviderType::Password);
    }

    #[tokio::test]
    async fn test_create_requires_federated_id() {
        let service = create_service();
        let ctx = Context::new();

        let account = Account::new(UserId::new("user1").unwrap(), ProviderType::Password, "");
        let err = service.create_account(&ctx, account).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }
}
