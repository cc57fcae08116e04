//! Quiz selection, grading and attempt bookkeeping.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hierarchy::HierarchyReader;
use crate::models::{ContentBody, Quiz, QuizAttempt, QuizMode};
use crate::store::Store;

pub const MIN_OPTIONS: usize = 2;

/// Structural rules for a quiz definition.
pub fn validate(quiz: &Quiz) -> Result<()> {
    if quiz.question.trim().is_empty() {
        return Err(Error::validation("quiz question is empty"));
    }
    if quiz.options.len() < MIN_OPTIONS {
        return Err(Error::validation(format!(
            "quiz needs at least {MIN_OPTIONS} options, got {}",
            quiz.options.len()
        )));
    }
    let correct = quiz.options.iter().filter(|o| o.is_correct).count();
    if quiz.mode == QuizMode::Single && correct != 1 {
        return Err(Error::validation(format!(
            "single choice quiz must have exactly one correct option, got {correct}"
        )));
    }
    Ok(())
}

/// Applies a click on option `index` to the current selection vector.
///
/// Single choice replaces the selection, multiple choice toggles the option.
/// `current` is padded with `false` (or truncated) to the option count.
pub fn select_option(quiz: &Quiz, current: &[bool], index: usize) -> Result<Vec<bool>> {
    let n = quiz.options.len();
    if index >= n {
        return Err(Error::validation(format!(
            "option {index} out of range (quiz has {n})"
        )));
    }
    let mut next: Vec<bool> = match quiz.mode {
        QuizMode::Single => vec![false; n],
        QuizMode::Multiple => (0..n).map(|i| current.get(i).copied().unwrap_or(false)).collect(),
    };
    next[index] = match quiz.mode {
        QuizMode::Single => true,
        QuizMode::Multiple => !next[index],
    };
    Ok(next)
}

/// All-or-nothing: every option's selection must match its correctness flag.
pub fn grade(quiz: &Quiz, selections: &[bool]) -> bool {
    selections.len() == quiz.options.len()
        && quiz
            .options
            .iter()
            .zip(selections)
            .all(|(opt, sel)| opt.is_correct == *sel)
}

/// A multiple choice quiz may mark no option correct; its only right answer
/// is the empty selection.
fn has_no_correct_option(quiz: &Quiz) -> bool {
    quiz.options.iter().all(|o| !o.is_correct)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Graded {
    pub correct: bool,
    pub attempt: QuizAttempt,
}

#[derive(Clone)]
pub struct QuizGrader {
    store: Arc<dyn Store>,
    reader: HierarchyReader,
}

impl QuizGrader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let reader = HierarchyReader::new(store.clone());
        Self { store, reader }
    }

    /// Bumps the attempt counter for (user, item) and stores the latest result.
    pub async fn record_attempt(
        &self,
        user_id: Uuid,
        content_item_id: Uuid,
        is_correct: bool,
    ) -> Result<QuizAttempt> {
        Ok(self
            .store
            .record_quiz_attempt(user_id, content_item_id, is_correct, Utc::now())
            .await?)
    }

    /// Grades `selections` against the quiz stored in `content_item_id` and
    /// records the attempt.
    pub async fn submit(
        &self,
        user_id: Uuid,
        content_item_id: Uuid,
        selections: &[bool],
    ) -> Result<Graded> {
        let item = self.reader.content_item(content_item_id).await?;
        let ContentBody::Quiz(quiz) = item.body else {
            return Err(Error::validation("content item is not a quiz"));
        };
        if selections.len() != quiz.options.len() {
            return Err(Error::validation(format!(
                "expected {} selections, got {}",
                quiz.options.len(),
                selections.len()
            )));
        }
        if !selections.iter().any(|s| *s) && !has_no_correct_option(&quiz) {
            return Err(Error::validation("select at least one option"));
        }

        let correct = grade(&quiz, selections);
        let attempt = self.record_attempt(user_id, content_item_id, correct).await?;
        tracing::info!(%user_id, %content_item_id, correct, attempts = attempt.attempts, "quiz graded");
        Ok(Graded { correct, attempt })
    }

    pub async fn attempts_for_user(&self, user_id: Uuid) -> Result<Vec<QuizAttempt>> {
        Ok(self.store.list_quiz_attempts(user_id).await?)
    }
}

// --- presentation state ---

pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(2);

#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    pub selections: Vec<bool>,
    /// Result of the last submission still on screen.
    pub feedback: Option<bool>,
    pub attempts: i32,
}

impl ViewState {
    pub fn locked(&self) -> bool {
        self.feedback == Some(true)
    }
}

/// Selection state of one quiz on screen.
///
/// A wrong answer is shown for `reset_after`, then the selection clears so the
/// learner can retry. A right answer locks the quiz. The pending reset is
/// aborted when the view is dropped.
pub struct QuizView {
    quiz: Quiz,
    state: Arc<Mutex<ViewState>>,
    reset_after: Duration,
    pending_reset: Option<JoinHandle<()>>,
}

fn lock(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl QuizView {
    pub fn new(quiz: Quiz, reset_after: Duration) -> Self {
        let selections = vec![false; quiz.options.len()];
        Self {
            quiz,
            state: Arc::new(Mutex::new(ViewState {
                selections,
                ..Default::default()
            })),
            reset_after,
            pending_reset: None,
        }
    }

    /// Restores the counter from a stored attempt. A stored correct answer
    /// keeps the quiz locked; a wrong one leaves it open for a retry.
    pub fn resume(quiz: Quiz, reset_after: Duration, attempt: Option<&QuizAttempt>) -> Self {
        let view = Self::new(quiz, reset_after);
        if let Some(a) = attempt {
            let mut st = lock(&view.state);
            st.attempts = a.attempts;
            if a.is_correct {
                st.feedback = Some(true);
            }
        }
        view
    }

    pub fn snapshot(&self) -> ViewState {
        lock(&self.state).clone()
    }

    pub fn select(&self, index: usize) -> Result<()> {
        let mut st = lock(&self.state);
        if st.locked() {
            return Err(Error::validation("quiz already answered correctly"));
        }
        st.selections = select_option(&self.quiz, &st.selections, index)?;
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        let st = lock(&self.state);
        !st.locked() && (st.selections.iter().any(|s| *s) || has_no_correct_option(&self.quiz))
    }

    pub async fn submit(
        &mut self,
        grader: &QuizGrader,
        user_id: Uuid,
        content_item_id: Uuid,
    ) -> Result<bool> {
        if !self.can_submit() {
            return Err(Error::validation("nothing to submit"));
        }
        let selections = lock(&self.state).selections.clone();
        let correct = grade(&self.quiz, &selections);
        let attempt = grader
            .record_attempt(user_id, content_item_id, correct)
            .await?;
        {
            let mut st = lock(&self.state);
            st.feedback = Some(correct);
            st.attempts = attempt.attempts;
        }
        if correct {
            if let Some(pending) = self.pending_reset.take() {
                pending.abort();
            }
        } else {
            self.schedule_reset();
        }
        Ok(correct)
    }

    fn schedule_reset(&mut self) {
        if let Some(prev) = self.pending_reset.take() {
            prev.abort();
        }
        let state = Arc::clone(&self.state);
        let n = self.quiz.options.len();
        let delay = self.reset_after;
        self.pending_reset = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut st = lock(&state);
            st.selections = vec![false; n];
            st.feedback = None;
        }));
    }
}

impl Drop for QuizView {
    fn drop(&mut self) {
        if let Some(handle) = self.pending_reset.take() {
            handle.abort();
        }
    }
}
