//! The tuning loop implementation.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use kerneltune_config::AppConfig;
use kerneltune_core::agent::AgentState;
use kerneltune_core::error::{Error, ProviderError};
use kerneltune_core::event::{DomainEvent, EventBus};
use kerneltune_core::message::{Conversation, Message, MessageToolCall};
use kerneltune_core::phase::{Phase, PhaseThresholds};
use kerneltune_core::provider::{Provider, ProviderRequest, ToolDefinition};
use kerneltune_core::tool::{ToolCall, ToolRegistry, ToolResult};
use kerneltune_tuning::{MetricExtractor, PromptBuilder};
use tracing::{debug, error, info, warn};

use crate::summary::{RoundRecord, RunSummary, Termination};

/// Drives one model through think → act → evaluate rounds until the
/// performance goal is met, the model stops calling tools, a model call
/// fails, or the step budget runs out.
pub struct TuningAgent {
    /// The model gateway
    provider: Arc<dyn Provider>,

    /// The model to request
    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    /// Tool dispatcher
    tools: Arc<ToolRegistry>,

    prompts: PromptBuilder,

    extractor: MetricExtractor,

    thresholds: PhaseThresholds,

    /// Stop once a sample improves on the baseline by this ratio
    target_ratio: f64,

    /// Upper bound on think/act cycles per run
    max_steps: u32,

    /// Upper bound on a single model call
    think_timeout: Option<Duration>,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

/// Mutable state of a single run.
struct RunState {
    state: AgentState,
    step: u32,
    phase: Phase,
    baseline: Option<f64>,
    best_sample: Option<f64>,
    rounds: Vec<RoundRecord>,
    /// Last recommended value of each parameter, seeded with the defaults
    applied: BTreeMap<String, i64>,
}

impl TuningAgent {
    /// Create a new tuning agent.
    ///
    /// The tool definitions are listed in the system prompt as well as sent
    /// as the tool schema.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        prompts: PromptBuilder,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let prompts = prompts.with_tools(&tools.definitions());
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            prompts,
            extractor: MetricExtractor::default(),
            thresholds: PhaseThresholds::default(),
            target_ratio: 0.08,
            max_steps: 10,
            think_timeout: None,
            event_bus,
        }
    }

    /// Build an agent with every knob taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        prompts: PromptBuilder,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, Error> {
        let extractor = MetricExtractor::new(&config.tuning.metric_label).map_err(|e| Error::Config {
            message: format!("tuning.metric_label: {e}"),
        })?;

        Ok(Self::new(provider, config.model.clone(), tools, prompts, event_bus)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_max_steps(config.agent.max_steps)
            .with_target_ratio(config.tuning.target_ratio)
            .with_thresholds(config.tuning.thresholds)
            .with_think_timeout(Duration::from_secs(config.agent.think_timeout_secs))
            .with_extractor(extractor))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the step budget. A budget of zero is raised to one.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        if max == 0 {
            warn!("max_steps of 0 raised to 1");
        }
        self.max_steps = max.max(1);
        self
    }

    pub fn with_target_ratio(mut self, ratio: f64) -> Self {
        self.target_ratio = ratio;
        self.prompts = self.prompts.with_target_ratio(ratio);
        self
    }

    pub fn with_thresholds(mut self, thresholds: PhaseThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Bound each model call. A zero duration disables the bound.
    pub fn with_think_timeout(mut self, timeout: Duration) -> Self {
        self.think_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_extractor(mut self, extractor: MetricExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// The system prompt every think step sends.
    pub fn system_prompt(&self) -> String {
        self.prompts.build_initial_prompt()
    }

    /// Run a tuning session, appending to `conversation`.
    ///
    /// Never fails: a failed model call ends the run early and is reported
    /// in the summary's [`Termination`].
    pub async fn run(&self, conversation: &mut Conversation) -> RunSummary {
        let mut run = RunState {
            state: AgentState::Idle,
            step: 0,
            phase: Phase::default(),
            baseline: None,
            best_sample: None,
            rounds: Vec::new(),
            applied: self.prompts.tunables().defaults(),
        };
        run.state.transition(AgentState::Running);

        info!(
            conversation_id = %conversation.id,
            model = %self.model,
            max_steps = self.max_steps,
            target_ratio = self.target_ratio,
            parameters = self.prompts.tunables().len(),
            "Starting tuning run"
        );

        let system_prompt = self.prompts.build_initial_prompt();
        let tool_definitions = self.tools.definitions();
        conversation.push(Message::user(self.prompts.initial_request()));

        let termination = loop {
            if run.step >= self.max_steps {
                info!(steps = run.step, "Step budget exhausted");
                break Termination::BudgetExhausted;
            }
            run.step += 1;
            let round_start = conversation.len();

            debug!(step = run.step, phase = %run.phase, "Tuning step");
            self.event_bus.publish(DomainEvent::StepStarted {
                step: run.step,
                phase: run.phase,
                timestamp: Utc::now(),
            });

            // ── Think ──
            match self
                .think(&mut run, conversation, &system_prompt, &tool_definitions)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    info!(step = run.step, "Model returned no tool calls, finishing");
                    break Termination::ModelFinished;
                }
                Err(e) => {
                    error!(step = run.step, error = %e, "Model call failed, aborting run");
                    break Termination::ThinkFailed {
                        error: e.to_string(),
                    };
                }
            }

            // ── Act ──
            self.act(conversation).await;

            // ── Evaluate ──
            if let Some(ratio) = self.evaluate(&mut run, conversation, round_start) {
                break Termination::GoalReached { ratio };
            }
        };

        run.state.transition(AgentState::Finished);
        self.event_bus.publish(DomainEvent::RunFinished {
            steps: run.step,
            reason: termination.as_str().to_string(),
            timestamp: Utc::now(),
        });
        info!(
            steps = run.step,
            termination = termination.as_str(),
            phase = %run.phase,
            "Tuning run finished"
        );

        RunSummary {
            request: conversation.first_user_request().map(str::to_string),
            steps: run.step,
            state: run.state,
            last_response: conversation.last_assistant_text().map(str::to_string),
            termination,
            baseline: run.baseline,
            best_sample: run.best_sample,
            final_phase: run.phase,
            rounds: run.rounds,
        }
    }

    /// Ask the model for the next action.
    ///
    /// Returns whether the model requested tool calls. The assistant message
    /// is appended either way.
    async fn think(
        &self,
        run: &mut RunState,
        conversation: &mut Conversation,
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<bool, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            system_prompt: system_prompt.to_string(),
            messages: conversation.messages().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.to_vec(),
        };

        let call = self.provider.complete(request);
        let response = match self.think_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                ProviderError::Timeout(format!("no model response within {}s", limit.as_secs()))
            })??,
            None => call.await?,
        };

        let tool_calls = response.message.tool_calls.len();
        self.event_bus.publish(DomainEvent::ResponseGenerated {
            model: response.model.clone(),
            tool_calls,
            tokens_used: response.usage.as_ref().map(|u| u.total_tokens),
            timestamp: Utc::now(),
        });
        debug!(step = run.step, tool_calls, "Model responded");

        if tool_calls > 0 {
            self.check_recommendation(run, &response.message);
        }

        conversation.push(response.message);
        Ok(tool_calls > 0)
    }

    /// Execute every tool call of the latest assistant message, in order.
    async fn act(&self, conversation: &mut Conversation) {
        let Some(calls) = conversation.last().map(|m| m.tool_calls.clone()) else {
            return;
        };

        let mut seen = HashSet::new();
        for tc in &calls {
            if !seen.insert(tc.id.as_str()) {
                warn!(id = %tc.id, "Duplicate tool call id, dispatching anyway");
            }
        }

        for tc in &calls {
            let start = Instant::now();
            let result = match parse_arguments(tc) {
                Ok(arguments) => {
                    let call = ToolCall {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        arguments,
                    };
                    self.tools.dispatch(&call).await
                }
                Err(reason) => {
                    warn!(tool = %tc.name, id = %tc.id, %reason, "Unparsable tool arguments");
                    ToolResult::failure(reason)
                }
            };

            self.event_bus.publish(DomainEvent::ToolExecuted {
                tool_name: tc.name.clone(),
                success: result.is_success(),
                duration_ms: start.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });

            conversation.push(Message::tool_result(&tc.id, result.to_message_content()));
        }
    }

    /// Measure the round and decide what happens next.
    ///
    /// Only messages appended since `round_start` are searched, so a round
    /// without a fresh measurement is never credited with an older one.
    /// Returns the improvement ratio when the goal is reached.
    fn evaluate(
        &self,
        run: &mut RunState,
        conversation: &mut Conversation,
        round_start: usize,
    ) -> Option<f64> {
        let sample = match self.extractor.extract(&conversation.messages()[round_start..]) {
            Some(s) if !(s.is_finite() && s > 0.0) => {
                warn!(step = run.step, sample = s, "Ignoring non-positive training duration");
                None
            }
            other => other,
        };
        let mut record = RoundRecord {
            step: run.step,
            phase: run.phase,
            sample,
            improvement_ratio: None,
        };

        let Some(sample) = sample else {
            warn!(step = run.step, "No training duration in tool output, skipping evaluation");
            run.rounds.push(record);
            return None;
        };

        let Some(baseline) = run.baseline else {
            info!(step = run.step, baseline = sample, "Baseline measured");
            run.baseline = Some(sample);
            run.best_sample = Some(sample);
            self.event_bus.publish(DomainEvent::SampleMeasured {
                step: run.step,
                seconds: sample,
                improvement_ratio: None,
                timestamp: Utc::now(),
            });
            conversation.push(Message::user(
                self.prompts.build_feedback_prompt(run.phase, sample, None),
            ));
            run.rounds.push(record);
            return None;
        };

        let ratio = (baseline - sample) / baseline;
        record.improvement_ratio = Some(ratio);
        run.rounds.push(record);
        if run.best_sample.is_none_or(|best| sample < best) {
            run.best_sample = Some(sample);
        }

        info!(step = run.step, sample, baseline, ratio, phase = %run.phase, "Round measured");
        self.event_bus.publish(DomainEvent::SampleMeasured {
            step: run.step,
            seconds: sample,
            improvement_ratio: Some(ratio),
            timestamp: Utc::now(),
        });

        if ratio >= self.target_ratio {
            info!(ratio, target = self.target_ratio, "Performance goal reached");
            return Some(ratio);
        }

        let next = self.thresholds.advance(run.phase, ratio);
        if next != run.phase {
            info!(from = %run.phase, to = %next, ratio, "Phase advanced");
            self.event_bus.publish(DomainEvent::PhaseChanged {
                from: run.phase,
                to: next,
                timestamp: Utc::now(),
            });
            run.phase = next;
        }

        conversation.push(Message::user(self.prompts.build_feedback_prompt(
            run.phase,
            baseline,
            Some(sample),
        )));
        None
    }

    /// Log how the recommendation in `message` fits the tunable set and
    /// the current phase. Never blocks the run.
    fn check_recommendation(&self, run: &mut RunState, message: &Message) {
        let mut text = message.content.clone();
        for tc in &message.tool_calls {
            text.push('\n');
            text.push_str(&tc.arguments);
        }

        let report = self.prompts.tunables().check_recommendation(&text);
        if report.is_empty() {
            return;
        }

        if !report.unknown.is_empty() {
            warn!(step = run.step, unknown = ?report.unknown, "Recommendation names parameters outside the tunable set");
        }
        if !report.out_of_range.is_empty() {
            warn!(step = run.step, out_of_range = ?report.out_of_range, "Recommendation has out-of-range values");
        }

        if run.baseline.is_some() {
            let changed = report.changed_from(&run.applied);
            let required = self.prompts.rules(run.phase).min_changed_params;
            if changed < required {
                warn!(step = run.step, phase = %run.phase, changed, required, "Recommendation changes fewer parameters than the phase requires");
            } else {
                debug!(step = run.step, changed, "Recommendation meets the phase change count");
            }
        }

        run.applied.extend(report.values);
    }
}

/// Arguments as JSON, or the error text sent back to the model.
fn parse_arguments(tc: &MessageToolCall) -> Result<serde_json::Value, String> {
    if tc.arguments.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(&tc.arguments)
        .map_err(|e| format!("Invalid arguments for tool '{}': {e}", tc.name))
}
