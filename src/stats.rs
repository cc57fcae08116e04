//! Aggregates shown in the admin CRM.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Enrollment;
use crate::store::Store;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressBand {
    NotStarted,
    InProgress,
    Complete,
}

impl ProgressBand {
    pub fn of(average: f64) -> Self {
        if average >= 100.0 {
            ProgressBand::Complete
        } else if average > 0.0 {
            ProgressBand::InProgress
        } else {
            ProgressBand::NotStarted
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CourseStats {
    pub course_id: Uuid,
    pub total_enrollments: usize,
    pub avg_progress: f64,
    /// Percentage of enrollments at 100% progress.
    pub completion_rate: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LearnerStats {
    pub user_id: Uuid,
    pub total_courses: usize,
    pub avg_progress: i32,
    pub total_minutes: i64,
    pub band: ProgressBand,
}

fn average(enrollments: &[Enrollment]) -> f64 {
    if enrollments.is_empty() {
        return 0.0;
    }
    let sum: i64 = enrollments.iter().map(|e| i64::from(e.progress)).sum();
    sum as f64 / enrollments.len() as f64
}

pub fn course_stats(course_id: Uuid, enrollments: &[Enrollment]) -> CourseStats {
    let completed = enrollments.iter().filter(|e| e.progress == 100).count();
    let completion_rate = if enrollments.is_empty() {
        0.0
    } else {
        completed as f64 * 100.0 / enrollments.len() as f64
    };
    CourseStats {
        course_id,
        total_enrollments: enrollments.len(),
        avg_progress: average(enrollments),
        completion_rate,
    }
}

#[derive(Clone)]
pub struct ProgressStats {
    store: Arc<dyn Store>,
}

impl ProgressStats {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn course(&self, course_id: Uuid) -> Result<CourseStats> {
        if self.store.get_course(course_id).await?.is_none() {
            return Err(Error::NotFound("course"));
        }
        let enrollments = self.store.list_enrollments_by_course(course_id).await?;
        Ok(course_stats(course_id, &enrollments))
    }

    pub async fn learner(&self, user_id: Uuid) -> Result<LearnerStats> {
        let enrollments = self.store.list_enrollments_by_user(user_id).await?;
        let mut total_minutes = 0i64;
        for e in &enrollments {
            // a course deleted under the enrollment contributes no time
            if let Some(course) = self.store.get_course(e.course_id).await? {
                total_minutes += i64::from(course.duration);
            }
        }
        let avg = average(&enrollments);
        Ok(LearnerStats {
            user_id,
            total_courses: enrollments.len(),
            avg_progress: avg.round() as i32,
            total_minutes,
            band: ProgressBand::of(avg),
        })
    }
}
