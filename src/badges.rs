use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result, StoreError};
use crate::models::{AwardedBadge, Badge, NewBadge, UserBadge};
use crate::store::Store;

/// User <-> badge associations. Callers are expected to have checked that
/// the acting identity is an administrator.
#[derive(Clone)]
pub struct BadgeLedger {
    store: Arc<dyn Store>,
}

impl BadgeLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_badge(&self, req: NewBadge) -> Result<Badge> {
        if req.name.trim().is_empty() {
            return Err(Error::validation("badge name is empty"));
        }
        let badge = Badge {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            image_url: req.image_url,
        };
        self.store.insert_badge(&badge).await?;
        Ok(badge)
    }

    pub async fn list_badges(&self) -> Result<Vec<Badge>> {
        Ok(self.store.list_badges().await?)
    }

    pub async fn assign(&self, user_id: Uuid, badge_id: Uuid) -> Result<UserBadge> {
        if self.store.get_badge(badge_id).await?.is_none() {
            return Err(Error::NotFound("badge"));
        }
        if self.store.get_user_badge(user_id, badge_id).await?.is_some() {
            return Err(Error::AlreadyAssigned);
        }
        let awarded = UserBadge {
            user_id,
            badge_id,
            awarded_at: Utc::now(),
        };
        match self.store.insert_user_badge(&awarded).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(Error::AlreadyAssigned),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(%user_id, %badge_id, "badge assigned");
        Ok(awarded)
    }

    pub async fn revoke(&self, user_id: Uuid, badge_id: Uuid) -> Result<()> {
        if !self.store.delete_user_badge(user_id, badge_id).await? {
            return Err(Error::NotAssigned);
        }
        tracing::info!(%user_id, %badge_id, "badge revoked");
        Ok(())
    }

    pub async fn badges_for_user(&self, user_id: Uuid) -> Result<Vec<AwardedBadge>> {
        Ok(self.store.list_badges_for_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn ledger_with_badge() -> (BadgeLedger, Badge) {
        let ledger = BadgeLedger::new(Arc::new(MemoryStore::new()));
        let badge = ledger
            .create_badge(NewBadge {
                name: "First steps".into(),
                description: "Finished a module".into(),
                image_url: None,
            })
            .await
            .unwrap();
        (ledger, badge)
    }

    #[tokio::test]
    async fn assign_then_assign_again_fails() {
        let (ledger, badge) = ledger_with_badge().await;
        let user = Uuid::new_v4();
        ledger.assign(user, badge.id).await.unwrap();
        assert!(matches!(ledger.assign(user, badge.id).await, Err(Error::AlreadyAssigned)));

        let mine = ledger.badges_for_user(user).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].badge.name, "First steps");
    }

    #[tokio::test]
    async fn revoke_requires_assignment() {
        let (ledger, badge) = ledger_with_badge().await;
        let user = Uuid::new_v4();
        assert!(matches!(ledger.revoke(user, badge.id).await, Err(Error::NotAssigned)));

        ledger.assign(user, badge.id).await.unwrap();
        ledger.revoke(user, badge.id).await.unwrap();
        assert!(ledger.badges_for_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_badge_is_not_found() {
        let (ledger, _) = ledger_with_badge().await;
        assert!(matches!(
            ledger.assign(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(Error::NotFound("badge"))
        ));
    }
}
