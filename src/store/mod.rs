//! Record store seam. Every tracker talks to the database through these named
//! methods; each call is a single atomic read or write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::*;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    // courses / hierarchy
    async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>>;
    async fn insert_course(&self, course: &Course) -> StoreResult<()>;
    /// Modules of a course ordered by `order_index` ascending.
    async fn list_modules(&self, course_id: Uuid) -> StoreResult<Vec<Module>>;
    async fn get_module(&self, id: Uuid) -> StoreResult<Option<Module>>;
    async fn insert_module(&self, module: &Module) -> StoreResult<()>;
    /// Returns false when no module with that id exists.
    async fn update_module(&self, module: &Module) -> StoreResult<bool>;
    /// Items of a module ordered by `order_index` ascending.
    async fn list_content_items(&self, module_id: Uuid) -> StoreResult<Vec<ContentItemRow>>;
    async fn get_content_item(&self, id: Uuid) -> StoreResult<Option<ContentItemRow>>;
    /// Makes `items` the module's item set: rows are upserted by id and the
    /// module's rows missing from `items` are deleted (with their attempts).
    async fn sync_content_items(
        &self,
        module_id: Uuid,
        items: &[ContentItemRow],
    ) -> StoreResult<()>;

    // enrollments
    async fn get_enrollment(&self, user_id: Uuid, course_id: Uuid)
        -> StoreResult<Option<Enrollment>>;
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> StoreResult<()>;
    async fn delete_enrollment(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool>;
    async fn update_enrollment_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: i32,
    ) -> StoreResult<bool>;
    async fn list_enrollments_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Enrollment>>;
    async fn list_enrollments_by_course(&self, course_id: Uuid) -> StoreResult<Vec<Enrollment>>;

    // module progress
    async fn get_module_progress(
        &self,
        user_id: Uuid,
        module_id: Uuid,
    ) -> StoreResult<Option<ModuleProgress>>;
    async fn insert_module_progress(&self, progress: &ModuleProgress) -> StoreResult<()>;
    async fn update_module_progress(&self, progress: &ModuleProgress) -> StoreResult<bool>;
    async fn list_module_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Vec<ModuleProgress>>;

    // quiz attempts
    /// Creates the (user, item) row with `attempts = 1`, or increments it and
    /// overwrites `is_correct`, in one atomic write. Returns the stored row.
    async fn record_quiz_attempt(
        &self,
        user_id: Uuid,
        content_item_id: Uuid,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<QuizAttempt>;
    async fn list_quiz_attempts(&self, user_id: Uuid) -> StoreResult<Vec<QuizAttempt>>;

    // badges
    async fn get_badge(&self, id: Uuid) -> StoreResult<Option<Badge>>;
    async fn insert_badge(&self, badge: &Badge) -> StoreResult<()>;
    async fn list_badges(&self) -> StoreResult<Vec<Badge>>;
    async fn get_user_badge(&self, user_id: Uuid, badge_id: Uuid)
        -> StoreResult<Option<UserBadge>>;
    async fn insert_user_badge(&self, user_badge: &UserBadge) -> StoreResult<()>;
    async fn delete_user_badge(&self, user_id: Uuid, badge_id: Uuid) -> StoreResult<bool>;
    async fn list_badges_for_user(&self, user_id: Uuid) -> StoreResult<Vec<AwardedBadge>>;
}
