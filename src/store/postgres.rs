use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as};
use uuid::Uuid;

use super::{Store, StoreResult};
use crate::db::Db;
use crate::error::StoreError;
use crate::models::*;

/// [`Store`] backed by the Postgres schema in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

// Unique violations are the store's way of saying "pair already exists".
fn write_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Db(e),
    }
}

const COURSE_COLS: &str =
    "id, title, description, duration, level, category, instructor_id, created_at";

#[async_trait]
impl Store for PgStore {
    async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        let sql = format!("SELECT {COURSE_COLS} FROM courses WHERE id=$1");
        Ok(query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn insert_course(&self, c: &Course) -> StoreResult<()> {
        query(
            r#"
            INSERT INTO courses (id, title, description, duration, level, category, instructor_id, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
        .bind(c.id)
        .bind(&c.title)
        .bind(&c.description)
        .bind(c.duration)
        .bind(c.level.as_str())
        .bind(&c.category)
        .bind(c.instructor_id)
        .bind(c.created_at)
        .execute(&self.db)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn list_modules(&self, course_id: Uuid) -> StoreResult<Vec<Module>> {
        Ok(query_as::<_, Module>(
            "SELECT id, course_id, title, duration, order_index FROM modules WHERE course_id=$1 ORDER BY order_index",
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn get_module(&self, id: Uuid) -> StoreResult<Option<Module>> {
        Ok(query_as::<_, Module>(
            "SELECT id, course_id, title, duration, order_index FROM modules WHERE id=$1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn insert_module(&self, m: &Module) -> StoreResult<()> {
        query("INSERT INTO modules (id, course_id, title, duration, order_index) VALUES ($1,$2,$3,$4,$5)")
            .bind(m.id)
            .bind(m.course_id)
            .bind(&m.title)
            .bind(m.duration)
            .bind(m.order_index)
            .execute(&self.db)
            .await
            .map_err(write_err)?;
        Ok(())
    }

    async fn update_module(&self, m: &Module) -> StoreResult<bool> {
        let res = query("UPDATE modules SET title=$2, duration=$3, order_index=$4 WHERE id=$1")
            .bind(m.id)
            .bind(&m.title)
            .bind(m.duration)
            .bind(m.order_index)
            .execute(&self.db)
            .await
            .map_err(write_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_content_items(&self, module_id: Uuid) -> StoreResult<Vec<ContentItemRow>> {
        Ok(query_as::<_, ContentItemRow>(
            "SELECT id, module_id, type, content, duration, order_index FROM content_items WHERE module_id=$1 ORDER BY order_index",
        )
        .bind(module_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn get_content_item(&self, id: Uuid) -> StoreResult<Option<ContentItemRow>> {
        Ok(query_as::<_, ContentItemRow>(
            "SELECT id, module_id, type, content, duration, order_index FROM content_items WHERE id=$1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn sync_content_items(
        &self,
        module_id: Uuid,
        items: &[ContentItemRow],
    ) -> StoreResult<()> {
        let keep: Vec<Uuid> = items.iter().map(|i| i.id).collect();
        let mut tx = self.db.begin().await?;
        query("DELETE FROM content_items WHERE module_id=$1 AND NOT (id = ANY($2))")
            .bind(module_id)
            .bind(&keep)
            .execute(&mut *tx)
            .await?;
        for it in items {
            let res = query(
                r#"INSERT INTO content_items (id, module_id, type, content, duration, order_index)
                   VALUES ($1,$2,$3,$4,$5,$6)
                   ON CONFLICT (id) DO UPDATE
                   SET type=EXCLUDED.type, content=EXCLUDED.content,
                       duration=EXCLUDED.duration, order_index=EXCLUDED.order_index
                   WHERE content_items.module_id = EXCLUDED.module_id"#,
            )
            .bind(it.id)
            .bind(module_id)
            .bind(it.kind.as_str())
            .bind(&it.content)
            .bind(it.duration)
            .bind(it.order_index)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
            if res.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!(
                    "content item {} belongs to another module",
                    it.id
                )));
            }
        }
        // the (module_id, order_index) key is deferred, so reorders are checked here
        tx.commit().await.map_err(write_err)?;
        Ok(())
    }

    async fn get_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(query_as::<_, Enrollment>(
            "SELECT user_id, course_id, progress, enrolled_at FROM course_enrollments WHERE user_id=$1 AND course_id=$2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn insert_enrollment(&self, e: &Enrollment) -> StoreResult<()> {
        query(
            "INSERT INTO course_enrollments (user_id, course_id, progress, enrolled_at) VALUES ($1,$2,$3,$4)",
        )
        .bind(e.user_id)
        .bind(e.course_id)
        .bind(e.progress)
        .bind(e.enrolled_at)
        .execute(&self.db)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn delete_enrollment(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        let res = query("DELETE FROM course_enrollments WHERE user_id=$1 AND course_id=$2")
            .bind(user_id)
            .bind(course_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn update_enrollment_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: i32,
    ) -> StoreResult<bool> {
        let res = query(
            "UPDATE course_enrollments SET progress=$3 WHERE user_id=$1 AND course_id=$2",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(progress)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_enrollments_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        Ok(query_as::<_, Enrollment>(
            "SELECT user_id, course_id, progress, enrolled_at FROM course_enrollments WHERE user_id=$1 ORDER BY enrolled_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn list_enrollments_by_course(&self, course_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        Ok(query_as::<_, Enrollment>(
            "SELECT user_id, course_id, progress, enrolled_at FROM course_enrollments WHERE course_id=$1 ORDER BY enrolled_at",
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn get_module_progress(
        &self,
        user_id: Uuid,
        module_id: Uuid,
    ) -> StoreResult<Option<ModuleProgress>> {
        Ok(query_as::<_, ModuleProgress>(
            "SELECT user_id, module_id, course_id, completed, completed_at FROM module_progress WHERE user_id=$1 AND module_id=$2",
        )
        .bind(user_id)
        .bind(module_id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn insert_module_progress(&self, p: &ModuleProgress) -> StoreResult<()> {
        query(
            "INSERT INTO module_progress (user_id, module_id, course_id, completed, completed_at) VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(p.user_id)
        .bind(p.module_id)
        .bind(p.course_id)
        .bind(p.completed)
        .bind(p.completed_at)
        .execute(&self.db)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn update_module_progress(&self, p: &ModuleProgress) -> StoreResult<bool> {
        let res = query(
            "UPDATE module_progress SET completed=$3, completed_at=$4 WHERE user_id=$1 AND module_id=$2",
        )
        .bind(p.user_id)
        .bind(p.module_id)
        .bind(p.completed)
        .bind(p.completed_at)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_module_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Vec<ModuleProgress>> {
        Ok(query_as::<_, ModuleProgress>(
            "SELECT user_id, module_id, course_id, completed, completed_at FROM module_progress WHERE user_id=$1 AND course_id=$2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn record_quiz_attempt(
        &self,
        user_id: Uuid,
        content_item_id: Uuid,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<QuizAttempt> {
        Ok(query_as::<_, QuizAttempt>(
            r#"INSERT INTO quiz_attempts (user_id, content_item_id, attempts, is_correct, updated_at)
               VALUES ($1,$2,1,$3,$4)
               ON CONFLICT (user_id, content_item_id) DO UPDATE
               SET attempts = quiz_attempts.attempts + 1,
                   is_correct = EXCLUDED.is_correct,
                   updated_at = EXCLUDED.updated_at
               RETURNING user_id, content_item_id, attempts, is_correct, updated_at"#,
        )
        .bind(user_id)
        .bind(content_item_id)
        .bind(is_correct)
        .bind(at)
        .fetch_one(&self.db)
        .await?)
    }

    async fn list_quiz_attempts(&self, user_id: Uuid) -> StoreResult<Vec<QuizAttempt>> {
        Ok(query_as::<_, QuizAttempt>(
            "SELECT user_id, content_item_id, attempts, is_correct, updated_at FROM quiz_attempts WHERE user_id=$1",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn get_badge(&self, id: Uuid) -> StoreResult<Option<Badge>> {
        Ok(query_as::<_, Badge>("SELECT id, name, description, image_url FROM badges WHERE id=$1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn insert_badge(&self, b: &Badge) -> StoreResult<()> {
        query("INSERT INTO badges (id, name, description, image_url) VALUES ($1,$2,$3,$4)")
            .bind(b.id)
            .bind(&b.name)
            .bind(&b.description)
            .bind(&b.image_url)
            .execute(&self.db)
            .await
            .map_err(write_err)?;
        Ok(())
    }

    async fn list_badges(&self) -> StoreResult<Vec<Badge>> {
        Ok(query_as::<_, Badge>("SELECT id, name, description, image_url FROM badges ORDER BY name")
            .fetch_all(&self.db)
            .await?)
    }

    async fn get_user_badge(
        &self,
        user_id: Uuid,
        badge_id: Uuid,
    ) -> StoreResult<Option<UserBadge>> {
        Ok(query_as::<_, UserBadge>(
            "SELECT user_id, badge_id, awarded_at FROM user_badges WHERE user_id=$1 AND badge_id=$2",
        )
        .bind(user_id)
        .bind(badge_id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn insert_user_badge(&self, ub: &UserBadge) -> StoreResult<()> {
        query("INSERT INTO user_badges (user_id, badge_id, awarded_at) VALUES ($1,$2,$3)")
            .bind(ub.user_id)
            .bind(ub.badge_id)
            .bind(ub.awarded_at)
            .execute(&self.db)
            .await
            .map_err(write_err)?;
        Ok(())
    }

    async fn delete_user_badge(&self, user_id: Uuid, badge_id: Uuid) -> StoreResult<bool> {
        let res = query("DELETE FROM user_badges WHERE user_id=$1 AND badge_id=$2")
            .bind(user_id)
            .bind(badge_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_badges_for_user(&self, user_id: Uuid) -> StoreResult<Vec<AwardedBadge>> {
        Ok(query_as::<_, AwardedBadge>(
            r#"
            SELECT b.id, b.name, b.description, b.image_url, ub.awarded_at
            FROM user_badges ub JOIN badges b ON b.id = ub.badge_id
            WHERE ub.user_id=$1
            ORDER BY ub.awarded_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?)
    }
}
