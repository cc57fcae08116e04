use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result, StoreError};
use crate::models::Enrollment;
use crate::store::Store;

#[derive(Clone)]
pub struct EnrollmentTracker {
    store: Arc<dyn Store>,
}

impl EnrollmentTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        if self.store.get_course(course_id).await?.is_none() {
            return Err(Error::NotFound("course"));
        }
        if self.store.get_enrollment(user_id, course_id).await?.is_some() {
            return Err(Error::AlreadyEnrolled);
        }
        let enrollment = Enrollment {
            user_id,
            course_id,
            progress: 0,
            enrolled_at: Utc::now(),
        };
        match self.store.insert_enrollment(&enrollment).await {
            Ok(()) => {}
            // lost a race with another enroll for the same pair
            Err(StoreError::Conflict(_)) => return Err(Error::AlreadyEnrolled),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(%user_id, %course_id, "enrolled");
        Ok(enrollment)
    }

    /// Removes the enrollment only. Module progress and quiz attempts stay
    /// and show up again if the user re-enrolls.
    pub async fn unenroll(&self, user_id: Uuid, course_id: Uuid) -> Result<()> {
        if !self.store.delete_enrollment(user_id, course_id).await? {
            return Err(Error::NotEnrolled);
        }
        tracing::info!(%user_id, %course_id, "unenrolled");
        Ok(())
    }

    /// Stores `percent` clamped to 0..=100 and returns the stored value.
    pub async fn set_progress(&self, user_id: Uuid, course_id: Uuid, percent: i32) -> Result<i32> {
        let progress = percent.clamp(0, 100);
        if !self
            .store
            .update_enrollment_progress(user_id, course_id, progress)
            .await?
        {
            return Err(Error::NotEnrolled);
        }
        Ok(progress)
    }

    pub async fn enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        Ok(self.store.get_enrollment(user_id, course_id).await?)
    }

    pub async fn enrollments_for_user(&self, user_id: Uuid) -> Result<Vec<Enrollment>> {
        Ok(self.store.list_enrollments_by_user(user_id).await?)
    }

    pub async fn enrollments_for_course(&self, course_id: Uuid) -> Result<Vec<Enrollment>> {
        Ok(self.store.list_enrollments_by_course(course_id).await?)
    }
}
