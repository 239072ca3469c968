use quiz_core::model::{ProgressRecord, Question, QuestionBank, TopicId};
use quiz_core::scoring::score_attempt;
use quiz_core::Clock;

use super::progress::{AttemptResult, SessionProgress};
use crate::error::{DataLoadError, SessionError};
use crate::progress_service::{ProgressStore, RemoteSync};

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    InProgress,
    Submitted(AttemptResult),
    /// Left midway; `saved` tells whether a partial record was written.
    Exited { saved: bool },
    /// Content could not be loaded; holds the message to show.
    LoadFailed(String),
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::InProgress => "in progress",
            Self::Submitted(_) => "submitted",
            Self::Exited { .. } => "exited",
            Self::LoadFailed(_) => "load failed",
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One pass through a topic's questions.
///
/// Answers are kept one slot per question. Nothing is persisted until `submit`
/// or `exit`.
#[derive(Debug, Clone)]
pub struct QuizSession {
    clock: Clock,
    topic_id: Option<TopicId>,
    title: String,
    questions: Vec<Question>,
    answers: Vec<Option<u32>>,
    current: usize,
    state: SessionState,
}

impl QuizSession {
    /// Session waiting for its question bank.
    #[must_use]
    pub fn loading(clock: Clock, topic_id: Option<TopicId>) -> Self {
        Self {
            clock,
            topic_id,
            title: String::new(),
            questions: Vec::new(),
            answers: Vec::new(),
            current: 0,
            state: SessionState::Loading,
        }
    }

    /// Move from `Loading` to `InProgress` over `bank`.
    ///
    /// Unless `retake` is set, a record with answered questions resumes at its
    /// `completedQuestions` index with its answers restored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` outside `Loading`.
    pub fn begin(
        &mut self,
        bank: QuestionBank,
        saved: Option<&ProgressRecord>,
        retake: bool,
    ) -> Result<(), SessionError> {
        self.expect_state("begin", |s| matches!(s, SessionState::Loading))?;

        let (topic_id, title, questions) = bank.into_parts();
        let len = questions.len();
        let mut answers = vec![None; len];
        let mut current = 0;

        if let Some(record) = saved.filter(|r| !retake && r.completed_questions() > 0) {
            let resume_at = usize::try_from(record.completed_questions()).unwrap_or(usize::MAX);
            current = resume_at.min(len.saturating_sub(1));
            for (slot, answer) in answers.iter_mut().zip(record.answers()) {
                *slot = *answer;
            }
            tracing::info!(topic = %topic_id, question = current, "resuming saved attempt");
        }

        // Restored answers must still name an option of their question.
        for (slot, question) in answers.iter_mut().zip(&questions) {
            if slot.is_some_and(|index| !question.has_option(index)) {
                *slot = None;
            }
        }

        self.topic_id = Some(topic_id);
        self.title = title;
        self.questions = questions;
        self.answers = answers;
        self.current = current;
        self.state = SessionState::InProgress;
        Ok(())
    }

    /// Move from `Loading` to `LoadFailed`.
    pub fn fail(&mut self, err: &DataLoadError) {
        tracing::warn!(topic = ?self.topic_id, error = %err, "quiz could not be loaded");
        self.state = SessionState::LoadFailed(err.user_message().to_owned());
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn topic_id(&self) -> Option<&TopicId> {
        self.topic_id.as_ref()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<u32>] {
        &self.answers
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<u32> {
        self.answers.get(self.current).copied().flatten()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::at(self.current, &self.answers)
    }

    /// Record `index` as the answer to the current question. Does not advance.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` outside `InProgress`, or
    /// `SessionError::InvalidOption` if the question has no such option.
    pub fn select_answer(&mut self, index: u32) -> Result<(), SessionError> {
        self.expect_state("select_answer", |s| matches!(s, SessionState::InProgress))?;
        let question = self
            .questions
            .get(self.current)
            .ok_or(SessionError::InvalidState {
                operation: "select_answer",
                state: "empty",
            })?;
        if !question.has_option(index) {
            return Err(SessionError::InvalidOption {
                index,
                options: question.options().len(),
            });
        }
        self.answers[self.current] = Some(index);
        Ok(())
    }

    /// Step forward; a no-op on the last question. Returns whether it moved.
    pub fn next(&mut self) -> bool {
        if self.state != SessionState::InProgress || self.current + 1 >= self.questions.len() {
            return false;
        }
        self.current += 1;
        true
    }

    /// Step back; a no-op on the first question. Returns whether it moved.
    pub fn previous(&mut self) -> bool {
        if self.state != SessionState::InProgress || self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Grade every answer and persist one completed record.
    ///
    /// Callers offer this once `progress().can_submit` is set.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` outside `InProgress`.
    pub fn submit(
        &mut self,
        store: &mut ProgressStore,
    ) -> Result<(AttemptResult, RemoteSync), SessionError> {
        self.expect_state("submit", |s| matches!(s, SessionState::InProgress))?;
        let topic = self.require_topic("submit")?;

        let now = self.clock.timestamp();
        let scored = score_attempt(&self.questions, &self.answers, now);
        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);
        let record = ProgressRecord::completed(
            scored.score,
            total,
            self.answers.clone(),
            scored.mistakes,
            now,
        )?;

        let sync = store.record_attempt(&topic, record);
        let result = AttemptResult::new(scored.score, total);
        self.state = SessionState::Submitted(result.clone());
        Ok((result, sync))
    }

    /// Leave the quiz, saving a partial record if anything was answered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` outside `InProgress`.
    pub fn exit(&mut self, store: &mut ProgressStore) -> Result<Option<RemoteSync>, SessionError> {
        self.expect_state("exit", |s| matches!(s, SessionState::InProgress))?;
        let topic = self.require_topic("exit")?;

        let sync = if self.answers.iter().any(Option::is_some) {
            let completed = u32::try_from(self.current).unwrap_or(u32::MAX);
            let record =
                ProgressRecord::partial(completed, self.answers.clone(), self.clock.timestamp());
            Some(store.record_attempt(&topic, record))
        } else {
            tracing::debug!(%topic, "left quiz without answers, nothing saved");
            None
        };

        self.state = SessionState::Exited {
            saved: sync.is_some(),
        };
        Ok(sync)
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: impl FnOnce(&SessionState) -> bool,
    ) -> Result<(), SessionError> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    fn require_topic(&self, operation: &'static str) -> Result<TopicId, SessionError> {
        self.topic_id.clone().ok_or(SessionError::InvalidState {
            operation,
            state: "without topic",
        })
    }
}
