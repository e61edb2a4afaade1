//! # Narration Pipeline
//!
//! Drives one narration run:
//!
//! ```text
//! Idle → Generating → Evaluating → Done
//!            │  │          │
//!            │  └──────────┴──▶ Failed
//!            └──▶ Cancelled (caller dropped the channel)
//! ```
//!
//! Fragments are relayed as soon as they arrive. The evaluator runs once, on
//! exactly the accumulated narrative and the residents that seeded it, and its
//! verdict is the last event. The channel closes when the run ends, whatever
//! the terminal stage.

use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::evaluator::{ConsistencyEvaluator, StructuredJudge};
use super::generator::{ChatNarrator, TextGenerator};
use super::prompts;
use super::types::{EvaluationVerdict, FramedEvent, LocationDescriptor, NarrationError};
use crate::llm::{LlmError, OpenAiCompatClient};
use crate::models::ModelConfig;

/// Items on a run's output channel. An `Err` is terminal.
pub type NarrationItem = Result<FramedEvent, NarrationError>;
pub type EventSender = mpsc::Sender<NarrationItem>;
pub type EventReceiver = mpsc::Receiver<NarrationItem>;

/// Stage of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Generating,
    Evaluating,
    Done,
    Failed,
    Cancelled,
}

/// The run state machine
#[derive(Debug, Clone)]
pub struct RunState {
    pub stage: PipelineStage,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Idle,
        }
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance along the happy path; terminal stages stay put
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            PipelineStage::Idle => PipelineStage::Generating,
            PipelineStage::Generating => PipelineStage::Evaluating,
            PipelineStage::Evaluating => PipelineStage::Done,
            terminal => terminal,
        };
    }

    pub fn fail(&mut self) {
        if matches!(
            self.stage,
            PipelineStage::Generating | PipelineStage::Evaluating
        ) {
            self.stage = PipelineStage::Failed;
        }
    }

    pub fn cancel(&mut self) {
        if self.stage == PipelineStage::Generating {
            self.stage = PipelineStage::Cancelled;
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.stage,
            PipelineStage::Done | PipelineStage::Failed | PipelineStage::Cancelled
        )
    }
}

/// How the evaluation stage ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Evaluated(EvaluationVerdict),
    /// The evaluator failed; the channel closed without a verdict frame
    EvaluationUnavailable(String),
    /// The caller went away before evaluation started
    Cancelled,
}

/// Summary of a finished run (generation failures are returned as errors)
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stage: PipelineStage,
    pub narrative: String,
    pub fragments: usize,
    pub outcome: RunOutcome,
}

/// A spawned run: its event channel and the task driving it
pub struct NarrationHandle {
    pub events: EventReceiver,
    pub task: JoinHandle<Result<RunReport, NarrationError>>,
}

#[derive(Clone)]
pub struct NarrationPipeline {
    generator: Arc<dyn TextGenerator>,
    evaluator: Arc<dyn ConsistencyEvaluator>,
    channel_capacity: usize,
}

impl NarrationPipeline {
    pub fn new(generator: Arc<dyn TextGenerator>, evaluator: Arc<dyn ConsistencyEvaluator>) -> Self {
        Self {
            generator,
            evaluator,
            channel_capacity: 32,
        }
    }

    /// Wire the pipeline to OpenAI-compatible providers, keys from the environment
    pub fn from_models(narrator: &ModelConfig, evaluator: &ModelConfig) -> Result<Self, LlmError> {
        let narrator_backend = Arc::new(OpenAiCompatClient::from_env(narrator.clone())?);
        let judge_backend = Arc::new(OpenAiCompatClient::from_env(evaluator.clone())?);
        let judge = StructuredJudge::new(judge_backend)
            .with_temperature(evaluator.temperature.unwrap_or(0.0));

        Ok(Self::new(
            Arc::new(ChatNarrator::new(narrator_backend)),
            Arc::new(judge),
        ))
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Start a run on its own task
    pub fn spawn(&self, location: LocationDescriptor) -> NarrationHandle {
        let (tx, events) = mpsc::channel(self.channel_capacity);
        let pipeline = self.clone();
        let task = tokio::spawn(async move { pipeline.run(location, tx).await });
        NarrationHandle { events, task }
    }

    /// Run to completion, writing events to `tx`. Dropping the receiving half
    /// cancels the run before any evaluation call.
    #[tracing::instrument(skip_all, fields(location = %location.name, residents = location.residents.len()))]
    pub async fn run(
        &self,
        location: LocationDescriptor,
        tx: EventSender,
    ) -> Result<RunReport, NarrationError> {
        let mut state = RunState::new();
        let payload = prompts::narration_payload(&location);

        state.advance();
        tracing::debug!(stage = ?state.stage, "Narration started");

        let mut fragments = match self.generator.stream(prompts::NARRATOR, &payload).await {
            Ok(fragments) => fragments,
            Err(e) => {
                state.fail();
                return Err(fail_generation(&tx, e.to_string()).await);
            }
        };

        let mut narrative = String::new();
        let mut count = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => None,
                next = fragments.next() => Some(next),
            };

            let Some(next) = next else {
                state.cancel();
                return Ok(cancelled(state, narrative, count));
            };

            match next {
                Some(Ok(fragment)) => {
                    narrative.push_str(&fragment);
                    count += 1;
                    if tx.send(Ok(FramedEvent::TextFragment(fragment))).await.is_err() {
                        state.cancel();
                        return Ok(cancelled(state, narrative, count));
                    }
                }
                Some(Err(e)) => {
                    state.fail();
                    tracing::warn!(fragments = count, "Generation failed mid-stream: {}", e);
                    return Err(fail_generation(&tx, e.to_string()).await);
                }
                None => break,
            }
        }

        if count == 0 {
            state.fail();
            return Err(fail_generation(&tx, "generator produced no text".to_string()).await);
        }

        if tx.is_closed() {
            state.cancel();
            return Ok(cancelled(state, narrative, count));
        }

        state.advance();
        tracing::debug!(fragments = count, chars = narrative.len(), "Generation complete, evaluating");

        match self.evaluator.evaluate(&narrative, &location.residents).await {
            Ok(verdict) => {
                if tx
                    .send(Ok(FramedEvent::Evaluation(verdict.clone())))
                    .await
                    .is_err()
                {
                    tracing::debug!("Caller left before the verdict was delivered");
                }
                state.advance();
                tracing::info!(score = verdict.score, fragments = count, "Narration evaluated");
                Ok(RunReport {
                    stage: state.stage,
                    narrative,
                    fragments: count,
                    outcome: RunOutcome::Evaluated(verdict),
                })
            }
            Err(e) => {
                state.fail();
                tracing::warn!("Evaluation unavailable, closing stream without verdict: {}", e);
                Ok(RunReport {
                    stage: state.stage,
                    narrative,
                    fragments: count,
                    outcome: RunOutcome::EvaluationUnavailable(e.to_string()),
                })
            }
        }
    }
}

/// Push a terminal error to the caller and hand the same failure back
async fn fail_generation(tx: &EventSender, message: String) -> NarrationError {
    tracing::warn!("Narration generation failed: {}", message);
    let _ = tx
        .send(Err(NarrationError::Generation(message.clone())))
        .await;
    NarrationError::Generation(message)
}

fn cancelled(state: RunState, narrative: String, fragments: usize) -> RunReport {
    tracing::info!(fragments, "Caller went away, narration abandoned");
    RunReport {
        stage: state.stage,
        narrative,
        fragments,
        outcome: RunOutcome::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::generator::FragmentStream;
    use crate::narration::types::ResidentRef;
    use async_trait::async_trait;
    use futures::channel::mpsc as fmpsc;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedGenerator {
        fragments: Vec<Result<String, String>>,
    }

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn stream(&self, _: &str, _: &str) -> Result<FragmentStream, NarrationError> {
            let items: Vec<Result<String, NarrationError>> = self
                .fragments
                .iter()
                .cloned()
                .map(|f| f.map_err(NarrationError::Generation))
                .collect();
            Ok(stream::iter(items).boxed())
        }
    }

    /// Generator fed by the test, so it can pause mid-narration
    struct ManualGenerator {
        rx: Mutex<Option<fmpsc::UnboundedReceiver<Result<String, NarrationError>>>>,
    }

    #[async_trait]
    impl TextGenerator for ManualGenerator {
        async fn stream(&self, _: &str, _: &str) -> Result<FragmentStream, NarrationError> {
            let rx = self.rx.lock().unwrap().take().expect("stream requested twice");
            Ok(rx.boxed())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn stream(&self, _: &str, _: &str) -> Result<FragmentStream, NarrationError> {
            Err(NarrationError::Generation("model offline".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingEvaluator {
        calls: AtomicUsize,
        fail: bool,
        seen: Mutex<Vec<(String, Vec<ResidentRef>)>>,
    }

    #[async_trait]
    impl ConsistencyEvaluator for RecordingEvaluator {
        async fn evaluate(
            &self,
            narrative: &str,
            residents: &[ResidentRef],
        ) -> Result<EvaluationVerdict, NarrationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .push((narrative.to_string(), residents.to_vec()));
            if self.fail {
                return Err(NarrationError::StructuredOutput("no shape".to_string()));
            }
            Ok(EvaluationVerdict::new(8, "consistent"))
        }
    }

    fn location() -> LocationDescriptor {
        LocationDescriptor::new(
            "Earth (C-137)",
            "Planet",
            vec![ResidentRef::named("Rick Sanchez"), ResidentRef::named("Morty Smith")],
        )
    }

    fn fixed(fragments: &[&str]) -> Arc<FixedGenerator> {
        Arc::new(FixedGenerator {
            fragments: fragments.iter().map(|f| Ok(f.to_string())).collect(),
        })
    }

    async fn drain(mut events: EventReceiver) -> Vec<NarrationItem> {
        let mut items = Vec::new();
        while let Some(item) = events.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn test_fragments_then_single_verdict() {
        let evaluator = Arc::new(RecordingEvaluator::default());
        let pipeline = NarrationPipeline::new(fixed(&["Welcome ", "to ", "Earth."]), evaluator.clone());

        let handle = pipeline.spawn(location());
        let items = drain(handle.events).await;
        let report = handle.task.await.unwrap().unwrap();

        let events: Vec<FramedEvent> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                FramedEvent::TextFragment("Welcome ".to_string()),
                FramedEvent::TextFragment("to ".to_string()),
                FramedEvent::TextFragment("Earth.".to_string()),
                FramedEvent::Evaluation(EvaluationVerdict::new(8, "consistent")),
            ]
        );
        assert_eq!(report.stage, PipelineStage::Done);
        assert_eq!(report.narrative, "Welcome to Earth.");
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_evaluator_sees_exact_narrative_and_residents() {
        let evaluator = Arc::new(RecordingEvaluator::default());
        let pipeline = NarrationPipeline::new(fixed(&["Rick ", "", "lives here."]), evaluator.clone());

        let handle = pipeline.spawn(location());
        drain(handle.events).await;
        handle.task.await.unwrap().unwrap();

        let seen = evaluator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "Rick lives here.");
        assert_eq!(seen[0].1, location().residents);
    }

    #[tokio::test]
    async fn test_evaluation_failure_closes_without_verdict() {
        let evaluator = Arc::new(RecordingEvaluator {
            fail: true,
            ..Default::default()
        });
        let pipeline = NarrationPipeline::new(fixed(&["A ", "tour."]), evaluator.clone());

        let handle = pipeline.spawn(location());
        let items = drain(handle.events).await;
        let report = handle.task.await.unwrap().unwrap();

        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|i| matches!(i, Ok(FramedEvent::TextFragment(_)))));
        assert_eq!(report.stage, PipelineStage::Failed);
        assert!(matches!(report.outcome, RunOutcome::EvaluationUnavailable(_)));
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_sent_fragments() {
        let generator = Arc::new(FixedGenerator {
            fragments: vec![Ok("Squanch".to_string()), Err("socket closed".to_string())],
        });
        let evaluator = Arc::new(RecordingEvaluator::default());
        let pipeline = NarrationPipeline::new(generator, evaluator.clone());

        let handle = pipeline.spawn(location());
        let items = drain(handle.events).await;
        let result = handle.task.await.unwrap();

        assert!(matches!(&items[0], Ok(FramedEvent::TextFragment(t)) if t == "Squanch"));
        assert!(matches!(&items[1], Err(NarrationError::Generation(_))));
        assert_eq!(items.len(), 2);
        assert!(matches!(result, Err(NarrationError::Generation(_))));
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generator_unavailable() {
        let evaluator = Arc::new(RecordingEvaluator::default());
        let pipeline = NarrationPipeline::new(Arc::new(FailingGenerator), evaluator.clone());

        let handle = pipeline.spawn(location());
        let items = drain(handle.events).await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
        assert!(handle.task.await.unwrap().is_err());
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_generation_is_a_failure() {
        let evaluator = Arc::new(RecordingEvaluator::default());
        let pipeline = NarrationPipeline::new(fixed(&[]), evaluator.clone());

        let handle = pipeline.spawn(location());
        drain(handle.events).await;

        assert!(matches!(
            handle.task.await.unwrap(),
            Err(NarrationError::Generation(_))
        ));
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_while_generator_is_pending() {
        let (frag_tx, frag_rx) = fmpsc::unbounded();
        let generator = Arc::new(ManualGenerator {
            rx: Mutex::new(Some(frag_rx)),
        });
        let evaluator = Arc::new(RecordingEvaluator::default());
        let pipeline = NarrationPipeline::new(generator, evaluator.clone());

        frag_tx.unbounded_send(Ok("Welcome".to_string())).unwrap();
        let mut handle = pipeline.spawn(location());

        let first = handle.events.recv().await.unwrap().unwrap();
        assert_eq!(first, FramedEvent::TextFragment("Welcome".to_string()));
        drop(handle.events);

        let report = handle.task.await.unwrap().unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.stage, PipelineStage::Cancelled);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
        drop(frag_tx);
    }

    #[tokio::test]
    async fn test_cancel_then_generator_finishes() {
        let (frag_tx, frag_rx) = fmpsc::unbounded();
        let generator = Arc::new(ManualGenerator {
            rx: Mutex::new(Some(frag_rx)),
        });
        let evaluator = Arc::new(RecordingEvaluator::default());
        let pipeline = NarrationPipeline::new(generator, evaluator.clone());

        frag_tx.unbounded_send(Ok("Welcome".to_string())).unwrap();
        let mut handle = pipeline.spawn(location());
        handle.events.recv().await.unwrap().unwrap();
        drop(handle.events);

        frag_tx.unbounded_send(Ok(" back".to_string())).unwrap();
        drop(frag_tx);

        let report = handle.task.await.unwrap().unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_run_state_transitions() {
        let mut state = RunState::new();
        assert_eq!(state.stage, PipelineStage::Idle);

        state.advance();
        assert_eq!(state.stage, PipelineStage::Generating);
        state.advance();
        assert_eq!(state.stage, PipelineStage::Evaluating);
        state.fail();
        assert_eq!(state.stage, PipelineStage::Failed);
        assert!(state.is_terminal());

        // terminal stages stay put
        state.advance();
        assert_eq!(state.stage, PipelineStage::Failed);
    }

    #[test]
    fn test_cancel_only_from_generating() {
        let mut state = RunState::new();
        state.cancel();
        assert_eq!(state.stage, PipelineStage::Idle);

        state.advance();
        state.cancel();
        assert_eq!(state.stage, PipelineStage::Cancelled);
    }
}
