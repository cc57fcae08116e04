use std::sync::Arc;
use std::time::Duration;

use crate::authoring::CourseAuthoring;
use crate::badges::BadgeLedger;
use crate::completion::CompletionTracker;
use crate::enrollment::EnrollmentTracker;
use crate::hierarchy::HierarchyReader;
use crate::quiz::{QuizGrader, DEFAULT_RESET_DELAY};
use crate::stats::ProgressStats;
use crate::store::Store;

/// Everything a request handler may touch. Built once at startup and handed
/// to the router.
#[derive(Clone)]
pub struct AppState {
    pub hierarchy: HierarchyReader,
    pub enrollments: EnrollmentTracker,
    pub completion: CompletionTracker,
    pub quizzes: QuizGrader,
    pub badges: BadgeLedger,
    pub authoring: CourseAuthoring,
    pub stats: ProgressStats,
    pub quiz_reset_delay: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            hierarchy: HierarchyReader::new(store.clone()),
            enrollments: EnrollmentTracker::new(store.clone()),
            completion: CompletionTracker::new(store.clone()),
            quizzes: QuizGrader::new(store.clone()),
            badges: BadgeLedger::new(store.clone()),
            authoring: CourseAuthoring::new(store.clone()),
            stats: ProgressStats::new(store),
            quiz_reset_delay: DEFAULT_RESET_DELAY,
        }
    }

    pub fn with_quiz_reset_delay(mut self, delay: Duration) -> Self {
        self.quiz_reset_delay = delay;
        self
    }
}
