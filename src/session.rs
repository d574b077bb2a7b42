//! Level/score/answer state machine for the single player session.
//!
//! The session is the only writer of `GameState`. Question requests release the
//! lock while they are in flight so readers can observe `AwaitingQuestion`.
//! Post-answer level changes run as spawned timers tagged with the session epoch;
//! `restart` bumps the epoch, which turns any pending timer (or any question that
//! arrives late) into a no-op.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Timing;
use crate::difficulty::{difficulty_for, MAX_LEVEL};
use crate::domain::{Difficulty, Question, Topic};
use crate::error::Result;

/// Anything that can hand the session a question for a topic at a level.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch_question(&self, topic: Topic, level: u32) -> Result<Question>;
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingTopicSelection,
    AwaitingQuestion,
    AwaitingAnswer,
    ShowingOutcome,
    Completed,
}

/// Result of an accepted answer.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
    /// Correct answer on the last level.
    Completed,
}

/// What happened to a `select_topic` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopicRequest {
    Ready,
    Failed,
    /// Not in `AwaitingTopicSelection`.
    Ignored,
    /// The session was restarted while the request was in flight.
    Stale,
}

#[derive(Clone, Debug)]
struct GameState {
    phase: Phase,
    level: u32,
    score: u32,
    current_question: Option<Question>,
    selected_topic: Option<Topic>,
    answered: bool,
    selected_index: Option<usize>,
    status_message: String,
    epoch: u64,
}

impl GameState {
    fn initial(epoch: u64) -> Self {
        Self {
            phase: Phase::AwaitingTopicSelection,
            level: 1,
            score: 0,
            current_question: None,
            selected_topic: None,
            answered: false,
            selected_index: None,
            status_message: String::new(),
            epoch,
        }
    }

    fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            phase: self.phase,
            level: self.level,
            max_level: MAX_LEVEL,
            difficulty: difficulty_for(self.level),
            score: self.score,
            topic: self.selected_topic,
            question: self.current_question.as_ref().map(|q| QuestionView {
                id: q.id,
                prompt_text: q.prompt_text.clone(),
                options: q.options.clone(),
            }),
            answered: self.answered,
            selected_index: self.selected_index,
            correct_index: self
                .current_question
                .as_ref()
                .filter(|_| self.answered)
                .map(|q| q.correct_index),
            status_message: self.status_message.clone(),
        }
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub phase: Phase,
    pub level: u32,
    pub max_level: u32,
    pub difficulty: Difficulty,
    pub score: u32,
    pub topic: Option<Topic>,
    pub question: Option<QuestionView>,
    pub answered: bool,
    pub selected_index: Option<usize>,
    /// Only revealed once an answer was submitted.
    pub correct_index: Option<usize>,
    pub status_message: String,
}

/// A question without its answer.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: Uuid,
    pub prompt_text: String,
    pub options: Vec<String>,
}

#[derive(Clone)]
pub struct GameSession {
    state: Arc<RwLock<GameState>>,
    source: Arc<dyn QuestionSource>,
    timing: Timing,
    updates: Arc<watch::Sender<GameSnapshot>>,
}

impl GameSession {
    pub fn new(source: Arc<dyn QuestionSource>, timing: Timing) -> Self {
        let initial = GameState::initial(0);
        let (tx, _rx) = watch::channel(initial.snapshot());
        Self {
            state: Arc::new(RwLock::new(initial)),
            source,
            timing,
            updates: Arc::new(tx),
        }
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        self.state.read().await.snapshot()
    }

    /// Receives a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<GameSnapshot> {
        self.updates.subscribe()
    }

    // Called with the write lock held so snapshots go out in mutation order.
    fn publish(&self, st: &GameState) {
        self.updates.send_replace(st.snapshot());
    }

    /// Pick a topic and fetch the question for the current level.
    /// Provider failures become the status message; level and score are untouched.
    #[instrument(level = "info", skip(self), fields(%topic))]
    pub async fn select_topic(&self, topic: Topic) -> TopicRequest {
        let (level, epoch) = {
            let mut st = self.state.write().await;
            if st.phase != Phase::AwaitingTopicSelection {
                debug!(target: "game", phase = ?st.phase, "select_topic ignored");
                return TopicRequest::Ignored;
            }
            st.phase = Phase::AwaitingQuestion;
            st.selected_topic = Some(topic);
            st.current_question = None;
            st.answered = false;
            st.selected_index = None;
            st.status_message.clear();
            self.publish(&st);
            (st.level, st.epoch)
        };

        let result = self.source.fetch_question(topic, level).await;

        let mut st = self.state.write().await;
        if st.epoch != epoch || st.phase != Phase::AwaitingQuestion {
            info!(target: "game", level, "Discarding question reply for a restarted session");
            return TopicRequest::Stale;
        }
        match result {
            Ok(question) => {
                info!(target: "game", level, question_id = %question.id, "Question ready");
                st.current_question = Some(question);
                st.answered = false;
                st.phase = Phase::AwaitingAnswer;
                self.publish(&st);
                TopicRequest::Ready
            }
            Err(e) => {
                warn!(target: "game", level, kind = e.kind(), error = %e, "Question request failed");
                st.status_message = e.to_string();
                st.selected_topic = None;
                st.phase = Phase::AwaitingTopicSelection;
                self.publish(&st);
                TopicRequest::Failed
            }
        }
    }

    /// Submit an answer for the displayed question. Returns `None` when the
    /// submission is ignored (already answered, wrong phase, or aimed at another question).
    #[instrument(level = "info", skip(self))]
    pub async fn submit_answer(&self, index: usize, question_id: Option<Uuid>) -> Option<Outcome> {
        let mut st = self.state.write().await;
        if st.phase != Phase::AwaitingAnswer || st.answered {
            debug!(target: "game", phase = ?st.phase, answered = st.answered, "submit_answer ignored");
            return None;
        }
        let question = st.current_question.as_ref()?;
        if question_id.is_some_and(|id| id != question.id) {
            debug!(target: "game", "submit_answer for a different question ignored");
            return None;
        }
        let correct = question.is_correct(index);
        let correct_text = question.correct_option().unwrap_or_default().to_string();

        st.answered = true;
        st.selected_index = Some(index);
        st.phase = Phase::ShowingOutcome;

        let outcome = if correct {
            st.score += 1;
            if st.level >= MAX_LEVEL {
                st.phase = Phase::Completed;
                st.status_message = format!("Congratulations! You cleared all {MAX_LEVEL} levels.");
                Outcome::Completed
            } else {
                st.status_message = format!("Correct! On to level {}.", st.level + 1);
                Outcome::Correct
            }
        } else {
            st.status_message = if st.level > 1 {
                format!("Wrong! The answer was \"{correct_text}\". Back to level {}.", st.level - 1)
            } else {
                format!("Wrong! The answer was \"{correct_text}\".")
            };
            Outcome::Incorrect
        };

        info!(target: "game", level = st.level, score = st.score, ?outcome, "Answer evaluated");
        self.publish(&st);
        if outcome != Outcome::Completed {
            self.schedule_transition(st.epoch, outcome);
        }
        Some(outcome)
    }

    /// Back to level 1 with score 0, from any phase.
    #[instrument(level = "info", skip(self))]
    pub async fn restart(&self) {
        let mut st = self.state.write().await;
        let epoch = st.epoch + 1;
        *st = GameState::initial(epoch);
        info!(target: "game", epoch, "Session restarted");
        self.publish(&st);
    }

    fn schedule_transition(&self, epoch: u64, outcome: Outcome) {
        let delay = match outcome {
            Outcome::Correct => self.timing.correct_delay(),
            _ => self.timing.incorrect_delay(),
        };
        let session = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.apply_transition(epoch, outcome).await;
        });
    }

    async fn apply_transition(&self, epoch: u64, outcome: Outcome) {
        let mut st = self.state.write().await;
        if st.epoch != epoch || st.phase != Phase::ShowingOutcome {
            debug!(target: "game", epoch, current = st.epoch, "Stale level transition dropped");
            return;
        }
        st.status_message.clear();
        st.level = match outcome {
            Outcome::Correct => (st.level + 1).min(MAX_LEVEL),
            Outcome::Incorrect => st.level.saturating_sub(1).max(1),
            Outcome::Completed => st.level,
        };
        st.current_question = None;
        st.selected_topic = None;
        st.answered = false;
        st.selected_index = None;
        st.phase = Phase::AwaitingTopicSelection;
        info!(target: "game", level = st.level, "Level transition applied");
        self.publish(&st);
    }

    #[cfg(test)]
    pub(crate) async fn set_level(&self, level: u32) {
        self.state.write().await.level = level;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;
    use crate::error::QuizError;

    /// Serves queued results (or a default question) and counts calls.
    /// With a gate, every fetch waits until the gate is notified.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        replies: Mutex<VecDeque<Result<Question>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl FakeSource {
        pub(crate) fn gated(gate: Arc<Notify>) -> Self {
            Self { gate: Some(gate), ..Default::default() }
        }

        pub(crate) fn push(&self, reply: Result<Question>) {
            self.replies.lock().unwrap().push_back(reply);
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    pub(crate) fn sample_question() -> Question {
        Question::new("2+2?", vec!["3".into(), "4".into(), "5".into(), "6".into()], 1)
    }

    #[async_trait]
    impl QuestionSource for FakeSource {
        async fn fetch_question(&self, _topic: Topic, _level: u32) -> Result<Question> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let queued = self.replies.lock().unwrap().pop_front();
            queued.unwrap_or_else(|| Ok(sample_question()))
        }
    }

    fn timing() -> Timing {
        Timing { correct_delay_ms: 2000, incorrect_delay_ms: 2500 }
    }

    fn session() -> (GameSession, Arc<FakeSource>) {
        let source = Arc::new(FakeSource::default());
        (GameSession::new(source.clone(), timing()), source)
    }

    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn play(s: &GameSession, index: usize) -> Option<Outcome> {
        assert_eq!(s.select_topic(Topic::Math).await, TopicRequest::Ready);
        s.submit_answer(index, None).await
    }

    #[tokio::test]
    async fn starts_awaiting_topic_at_level_one() {
        let (s, _) = session();
        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::AwaitingTopicSelection);
        assert_eq!(snap.level, 1);
        assert_eq!(snap.score, 0);
        assert_eq!(snap.difficulty, Difficulty::Easy);
        assert!(snap.question.is_none());
    }

    #[tokio::test]
    async fn select_topic_shows_question_without_answer() {
        let (s, source) = session();
        assert_eq!(s.select_topic(Topic::Geography).await, TopicRequest::Ready);
        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::AwaitingAnswer);
        assert_eq!(snap.topic, Some(Topic::Geography));
        assert_eq!(snap.question.as_ref().map(|q| q.options.len()), Some(4));
        assert_eq!(snap.correct_index, None);
        assert!(!snap.answered);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn correct_answer_advances_after_delay() {
        let (s, _) = session();
        s.set_level(5).await;
        assert_eq!(play(&s, 1).await, Some(Outcome::Correct));

        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::ShowingOutcome);
        assert_eq!(snap.score, 1);
        assert_eq!(snap.level, 5);
        assert_eq!(snap.correct_index, Some(1));
        assert!(snap.status_message.starts_with("Correct!"));

        settle(1999).await;
        assert_eq!(s.snapshot().await.phase, Phase::ShowingOutcome);
        settle(2).await;
        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::AwaitingTopicSelection);
        assert_eq!(snap.level, 6);
        assert_eq!(snap.score, 1);
        assert_eq!(snap.topic, None);
        assert!(snap.question.is_none());
        assert!(!snap.answered);
        assert!(snap.status_message.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn incorrect_answer_at_level_one_stays_at_one() {
        let (s, _) = session();
        assert_eq!(play(&s, 0).await, Some(Outcome::Incorrect));
        let snap = s.snapshot().await;
        assert!(snap.status_message.contains("\"4\""));
        settle(2501).await;
        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::AwaitingTopicSelection);
        assert_eq!(snap.level, 1);
        assert_eq!(snap.score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn incorrect_answer_drops_one_level() {
        for level in 2..=MAX_LEVEL {
            let (s, _) = session();
            s.set_level(level).await;
            assert_eq!(play(&s, 3).await, Some(Outcome::Incorrect));
            settle(2001).await;
            assert_eq!(s.snapshot().await.level, level, "not applied before its delay");
            settle(500).await;
            let snap = s.snapshot().await;
            assert_eq!(snap.level, level - 1);
            assert_eq!(snap.score, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn correct_answer_climbs_one_level() {
        for level in 1..MAX_LEVEL {
            let (s, _) = session();
            s.set_level(level).await;
            assert_eq!(play(&s, 1).await, Some(Outcome::Correct));
            settle(2001).await;
            let snap = s.snapshot().await;
            assert_eq!(snap.level, level + 1);
            assert_eq!(snap.score, 1);
            assert_eq!(snap.phase, Phase::AwaitingTopicSelection);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn correct_answer_on_last_level_completes() {
        let (s, source) = session();
        s.set_level(MAX_LEVEL).await;
        assert_eq!(play(&s, 1).await, Some(Outcome::Completed));
        settle(10_000).await;

        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::Completed);
        assert_eq!(snap.level, MAX_LEVEL);
        assert_eq!(snap.score, 1);
        assert!(snap.status_message.starts_with("Congratulations"));

        assert_eq!(s.select_topic(Topic::History).await, TopicRequest::Ignored);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_climb_reaches_completion() {
        let (s, _) = session();
        for _ in 1..MAX_LEVEL {
            assert_eq!(play(&s, 1).await, Some(Outcome::Correct));
            settle(2001).await;
        }
        assert_eq!(s.snapshot().await.level, MAX_LEVEL);
        assert_eq!(play(&s, 1).await, Some(Outcome::Completed));
        let snap = s.snapshot().await;
        assert_eq!(snap.score, MAX_LEVEL);
        assert_eq!(snap.phase, Phase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_submission_is_ignored() {
        let (s, _) = session();
        s.set_level(7).await;
        assert_eq!(play(&s, 1).await, Some(Outcome::Correct));
        assert_eq!(s.submit_answer(1, None).await, None);
        assert_eq!(s.submit_answer(0, None).await, None);
        settle(5000).await;
        let snap = s.snapshot().await;
        assert_eq!(snap.level, 8);
        assert_eq!(snap.score, 1);
    }

    #[tokio::test]
    async fn answer_for_another_question_is_ignored() {
        let (s, _) = session();
        s.select_topic(Topic::Math).await;
        assert_eq!(s.submit_answer(1, Some(Uuid::new_v4())).await, None);
        let id = s.snapshot().await.question.unwrap().id;
        assert_eq!(s.submit_answer(1, Some(id)).await, Some(Outcome::Correct));
    }

    #[tokio::test]
    async fn answer_without_question_is_ignored() {
        let (s, _) = session();
        assert_eq!(s.submit_answer(0, None).await, None);
        assert_eq!(s.snapshot().await.score, 0);
    }

    #[tokio::test]
    async fn select_topic_outside_topic_phase_is_ignored() {
        let (s, source) = session();
        s.select_topic(Topic::Math).await;
        assert_eq!(s.select_topic(Topic::History).await, TopicRequest::Ignored);
        assert_eq!(source.calls(), 1);
        assert_eq!(s.snapshot().await.topic, Some(Topic::Math));
    }

    #[tokio::test]
    async fn provider_failure_becomes_status_message() {
        let (s, source) = session();
        s.set_level(4).await;
        source.push(Err(QuizError::provider_call("HTTP 500: boom")));
        assert_eq!(s.select_topic(Topic::Math).await, TopicRequest::Failed);

        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::AwaitingTopicSelection);
        assert_eq!(snap.status_message, "Provider call failed: HTTP 500: boom");
        assert_eq!(snap.level, 4);
        assert_eq!(snap.score, 0);
        assert!(snap.question.is_none());

        assert_eq!(s.select_topic(Topic::Math).await, TopicRequest::Ready);
        let snap = s.snapshot().await;
        assert!(snap.status_message.is_empty());
        assert_eq!(snap.phase, Phase::AwaitingAnswer);
    }

    #[tokio::test]
    async fn every_error_kind_is_recoverable() {
        let (s, source) = session();
        let errors = vec![
            QuizError::MissingCredential,
            QuizError::provider_call("x"),
            QuizError::ProviderResponseShape { raw: serde_json::Value::Null },
            QuizError::MalformedJson { message: "m".into(), text: "t".into() },
            QuizError::SchemaValidation { reason: "r".into(), parsed: serde_json::Value::Null },
        ];
        for e in errors {
            let expected = e.to_string();
            source.push(Err(e));
            assert_eq!(s.select_topic(Topic::History).await, TopicRequest::Failed);
            let snap = s.snapshot().await;
            assert_eq!(snap.status_message, expected);
            assert_eq!(snap.phase, Phase::AwaitingTopicSelection);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restart_from_completed_resets() {
        let (s, _) = session();
        s.set_level(MAX_LEVEL).await;
        assert_eq!(play(&s, 1).await, Some(Outcome::Completed));
        s.restart().await;
        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::AwaitingTopicSelection);
        assert_eq!(snap.level, 1);
        assert_eq!(snap.score, 0);
        assert!(snap.question.is_none());
        assert!(snap.status_message.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_pending_transition() {
        let (s, _) = session();
        s.set_level(5).await;
        assert_eq!(play(&s, 1).await, Some(Outcome::Correct));
        s.restart().await;

        // A new round in the fresh session must not be disturbed by the old timer.
        assert_eq!(s.select_topic(Topic::Math).await, TopicRequest::Ready);
        settle(3000).await;
        let snap = s.snapshot().await;
        assert_eq!(snap.level, 1);
        assert_eq!(snap.score, 0);
        assert_eq!(snap.phase, Phase::AwaitingAnswer);
    }

    #[tokio::test]
    async fn loading_is_observable_and_restart_discards_late_question() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(FakeSource::gated(gate.clone()));
        let s = GameSession::new(source.clone(), timing());

        let pending = tokio::spawn({
            let s = s.clone();
            async move { s.select_topic(Topic::History).await }
        });
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::AwaitingQuestion);
        assert_eq!(snap.topic, Some(Topic::History));

        s.restart().await;
        gate.notify_one();
        assert_eq!(pending.await.unwrap(), TopicRequest::Stale);

        let snap = s.snapshot().await;
        assert_eq!(snap.phase, Phase::AwaitingTopicSelection);
        assert!(snap.question.is_none());
        assert_eq!(snap.topic, None);
    }

    #[tokio::test]
    async fn subscribers_see_each_change() {
        let (s, _) = session();
        let mut rx = s.subscribe();
        s.select_topic(Topic::Math).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().phase, Phase::AwaitingAnswer);

        s.submit_answer(2, None).await;
        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.phase, Phase::ShowingOutcome);
        assert_eq!(snap.selected_index, Some(2));
        assert_eq!(snap.correct_index, Some(1));
    }
}
