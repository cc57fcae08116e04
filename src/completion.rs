use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::ModuleProgress;
use crate::store::Store;

#[derive(Clone)]
pub struct CompletionTracker {
    store: Arc<dyn Store>,
}

impl CompletionTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Flips the completed flag for (user, module). A missing record counts
    /// as "not completed", so the first call marks the module completed.
    /// Calling twice restores the previous state.
    pub async fn toggle_completion(
        &self,
        user_id: Uuid,
        module_id: Uuid,
        course_id: Uuid,
    ) -> Result<ModuleProgress> {
        let next = match self.store.get_module_progress(user_id, module_id).await? {
            Some(prev) => {
                let completed = !prev.completed;
                let next = ModuleProgress {
                    completed,
                    completed_at: completed.then(Utc::now),
                    ..prev
                };
                if !self.store.update_module_progress(&next).await? {
                    return Err(Error::NotFound("module progress"));
                }
                next
            }
            None => {
                let first = ModuleProgress {
                    user_id,
                    module_id,
                    course_id,
                    completed: true,
                    completed_at: Some(Utc::now()),
                };
                self.store.insert_module_progress(&first).await?;
                first
            }
        };
        tracing::info!(%user_id, %module_id, completed = next.completed, "module completion toggled");
        Ok(next)
    }

    pub async fn is_completed(&self, user_id: Uuid, module_id: Uuid) -> Result<bool> {
        Ok(self
            .store
            .get_module_progress(user_id, module_id)
            .await?
            .is_some_and(|p| p.completed))
    }

    pub async fn progress_for_course(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Vec<ModuleProgress>> {
        Ok(self.store.list_module_progress(user_id, course_id).await?)
    }
}
