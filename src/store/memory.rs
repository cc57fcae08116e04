use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Store, StoreResult};
use crate::error::StoreError;
use crate::models::*;

#[derive(Default)]
struct Tables {
    courses: HashMap<Uuid, Course>,
    modules: HashMap<Uuid, Module>,
    content_items: HashMap<Uuid, ContentItemRow>,
    enrollments: HashMap<(Uuid, Uuid), Enrollment>,
    module_progress: HashMap<(Uuid, Uuid), ModuleProgress>,
    quiz_attempts: HashMap<(Uuid, Uuid), QuizAttempt>,
    badges: HashMap<Uuid, Badge>,
    user_badges: HashMap<(Uuid, Uuid), UserBadge>,
}

/// Process-local [`Store`]. Enforces the same uniqueness rules as the
/// Postgres schema; used by tests and `STORE=memory` runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Other("memory store poisoned".into()))
    }
}

fn conflict(what: &str) -> StoreError {
    StoreError::Conflict(what.to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.courses.contains_key(&course.id) {
            return Err(conflict("courses_pkey"));
        }
        t.courses.insert(course.id, course.clone());
        Ok(())
    }

    async fn list_modules(&self, course_id: Uuid) -> StoreResult<Vec<Module>> {
        let t = self.lock()?;
        let mut out: Vec<Module> = t
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.order_index);
        Ok(out)
    }

    async fn get_module(&self, id: Uuid) -> StoreResult<Option<Module>> {
        Ok(self.lock()?.modules.get(&id).cloned())
    }

    async fn insert_module(&self, module: &Module) -> StoreResult<()> {
        let mut t = self.lock()?;
        let taken = t.modules.values().any(|m| {
            m.id == module.id
                || (m.course_id == module.course_id && m.order_index == module.order_index)
        });
        if taken {
            return Err(conflict("modules_course_id_order_index_key"));
        }
        t.modules.insert(module.id, module.clone());
        Ok(())
    }

    async fn update_module(&self, module: &Module) -> StoreResult<bool> {
        let mut t = self.lock()?;
        let clash = t.modules.values().any(|m| {
            m.id != module.id
                && m.course_id == module.course_id
                && m.order_index == module.order_index
        });
        if clash {
            return Err(conflict("modules_course_id_order_index_key"));
        }
        match t.modules.get_mut(&module.id) {
            Some(m) => {
                m.title = module.title.clone();
                m.duration = module.duration;
                m.order_index = module.order_index;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_content_items(&self, module_id: Uuid) -> StoreResult<Vec<ContentItemRow>> {
        let t = self.lock()?;
        let mut out: Vec<ContentItemRow> = t
            .content_items
            .values()
            .filter(|i| i.module_id == module_id)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.order_index);
        Ok(out)
    }

    async fn get_content_item(&self, id: Uuid) -> StoreResult<Option<ContentItemRow>> {
        Ok(self.lock()?.content_items.get(&id).cloned())
    }

    async fn sync_content_items(
        &self,
        module_id: Uuid,
        items: &[ContentItemRow],
    ) -> StoreResult<()> {
        let mut t = self.lock()?;
        let mut seen = HashSet::new();
        if !items.iter().all(|i| seen.insert(i.order_index)) {
            return Err(conflict("content_items_module_id_order_index_key"));
        }
        let foreign = items.iter().any(|i| {
            t.content_items
                .get(&i.id)
                .is_some_and(|row| row.module_id != module_id)
        });
        if foreign {
            return Err(conflict("content_items_pkey"));
        }
        let keep: HashSet<Uuid> = items.iter().map(|i| i.id).collect();
        let dropped: HashSet<Uuid> = t
            .content_items
            .values()
            .filter(|i| i.module_id == module_id && !keep.contains(&i.id))
            .map(|i| i.id)
            .collect();
        t.content_items.retain(|id, _| !dropped.contains(id));
        // attempts follow their item, as ON DELETE CASCADE does in postgres
        t.quiz_attempts.retain(|(_, item), _| !dropped.contains(item));
        for it in items {
            let mut row = it.clone();
            row.module_id = module_id;
            t.content_items.insert(row.id, row);
        }
        Ok(())
    }

    async fn get_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(self.lock()?.enrollments.get(&(user_id, course_id)).cloned())
    }

    async fn insert_enrollment(&self, e: &Enrollment) -> StoreResult<()> {
        let mut t = self.lock()?;
        let key = (e.user_id, e.course_id);
        if t.enrollments.contains_key(&key) {
            return Err(conflict("course_enrollments_pkey"));
        }
        t.enrollments.insert(key, e.clone());
        Ok(())
    }

    async fn delete_enrollment(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        Ok(self.lock()?.enrollments.remove(&(user_id, course_id)).is_some())
    }

    async fn update_enrollment_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: i32,
    ) -> StoreResult<bool> {
        let mut t = self.lock()?;
        match t.enrollments.get_mut(&(user_id, course_id)) {
            Some(e) => {
                e.progress = progress;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_enrollments_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        let t = self.lock()?;
        let mut out: Vec<Enrollment> = t
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
        Ok(out)
    }

    async fn list_enrollments_by_course(&self, course_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        let t = self.lock()?;
        let mut out: Vec<Enrollment> = t
            .enrollments
            .values()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.enrolled_at);
        Ok(out)
    }

    async fn get_module_progress(
        &self,
        user_id: Uuid,
        module_id: Uuid,
    ) -> StoreResult<Option<ModuleProgress>> {
        Ok(self.lock()?.module_progress.get(&(user_id, module_id)).cloned())
    }

    async fn insert_module_progress(&self, p: &ModuleProgress) -> StoreResult<()> {
        let mut t = self.lock()?;
        let key = (p.user_id, p.module_id);
        if t.module_progress.contains_key(&key) {
            return Err(conflict("module_progress_pkey"));
        }
        t.module_progress.insert(key, p.clone());
        Ok(())
    }

    async fn update_module_progress(&self, p: &ModuleProgress) -> StoreResult<bool> {
        let mut t = self.lock()?;
        match t.module_progress.get_mut(&(p.user_id, p.module_id)) {
            Some(row) => {
                row.completed = p.completed;
                row.completed_at = p.completed_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_module_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Vec<ModuleProgress>> {
        let t = self.lock()?;
        Ok(t.module_progress
            .values()
            .filter(|p| p.user_id == user_id && p.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn record_quiz_attempt(
        &self,
        user_id: Uuid,
        content_item_id: Uuid,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<QuizAttempt> {
        let mut t = self.lock()?;
        let row = t
            .quiz_attempts
            .entry((user_id, content_item_id))
            .and_modify(|a| {
                a.attempts += 1;
                a.is_correct = is_correct;
                a.updated_at = at;
            })
            .or_insert_with(|| QuizAttempt {
                user_id,
                content_item_id,
                attempts: 1,
                is_correct,
                updated_at: at,
            });
        Ok(row.clone())
    }

    async fn list_quiz_attempts(&self, user_id: Uuid) -> StoreResult<Vec<QuizAttempt>> {
        let t = self.lock()?;
        Ok(t.quiz_attempts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_badge(&self, id: Uuid) -> StoreResult<Option<Badge>> {
        Ok(self.lock()?.badges.get(&id).cloned())
    }

    async fn insert_badge(&self, badge: &Badge) -> StoreResult<()> {
        let mut t = self.lock()?;
        if t.badges.contains_key(&badge.id) {
            return Err(conflict("badges_pkey"));
        }
        t.badges.insert(badge.id, badge.clone());
        Ok(())
    }

    async fn list_badges(&self) -> StoreResult<Vec<Badge>> {
        let t = self.lock()?;
        let mut out: Vec<Badge> = t.badges.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn get_user_badge(
        &self,
        user_id: Uuid,
        badge_id: Uuid,
    ) -> StoreResult<Option<UserBadge>> {
        Ok(self.lock()?.user_badges.get(&(user_id, badge_id)).cloned())
    }

    async fn insert_user_badge(&self, ub: &UserBadge) -> StoreResult<()> {
        let mut t = self.lock()?;
        let key = (ub.user_id, ub.badge_id);
        if t.user_badges.contains_key(&key) {
            return Err(conflict("user_badges_pkey"));
        }
        t.user_badges.insert(key, ub.clone());
        Ok(())
    }

    async fn delete_user_badge(&self, user_id: Uuid, badge_id: Uuid) -> StoreResult<bool> {
        Ok(self.lock()?.user_badges.remove(&(user_id, badge_id)).is_some())
    }

    async fn list_badges_for_user(&self, user_id: Uuid) -> StoreResult<Vec<AwardedBadge>> {
        let t = self.lock()?;
        let mut out: Vec<AwardedBadge> = t
            .user_badges
            .values()
            .filter(|ub| ub.user_id == user_id)
            .filter_map(|ub| {
                t.badges.get(&ub.badge_id).map(|b| AwardedBadge {
                    badge: b.clone(),
                    awarded_at: ub.awarded_at,
                })
            })
            .collect();
        out.sort_by(|a, b| b.awarded_at.cmp(&a.awarded_at));
        Ok(out)
    }
}
