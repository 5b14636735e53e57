//! Bounded re-generation of module outputs and the final synthesis.
//!
//! Per module: `Attempt(n) -> Generate -> Validate -> Accept | Retry(n+1) |
//! AcceptDegraded`. A retry sends the original input context (or the
//! dedicated retry context) with corrective instructions prepended to the
//! module prompt; the rejected output is never fed back. Modules run one
//! after another. Once all four resolve, their outputs are combined and the
//! synthesis loop runs with its own attempt bound, carrying the previous
//! retry prompt forward.
//!
//! The cancellation token is checked before every generation call and after
//! every validation.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use verdict_config::{ConfigError, RetryConfig, VerdictConfig};
use verdict_core::enums::{ModuleKind, RecordOutcome, ValidatorKind};
use verdict_core::events::ValidationEvent;
use verdict_db::events::EventLog;
use verdict_llm::{GenerationError, Generator};
use verdict_report::retry_prompt::module_retry_instructions;
use verdict_report::{
    FinalReportValidator, FinalValidationResult, ModuleValidationResult, ModuleValidator,
    Partials, SubjectMeta,
};

use crate::error::{Cancelled, PipelineError};
use crate::prompts::PromptSet;
use crate::runner::RunContext;

const PROMPT_SEPARATOR: &str =
    "================================================================================";

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// Input for one analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub subject_id: String,
    /// Full context for first attempts (comments plus metadata).
    pub context: String,
    /// Context for retries. Falls back to `context`.
    pub retry_context: Option<String>,
    pub comment_count: Option<u64>,
}

impl AnalysisRequest {
    #[must_use]
    pub fn new(subject_id: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            context: context.into(),
            retry_context: None,
            comment_count: None,
        }
    }

    #[must_use]
    pub fn with_retry_context(mut self, retry_context: impl Into<String>) -> Self {
        self.retry_context = Some(retry_context.into());
        self
    }

    #[must_use]
    pub const fn with_comment_count(mut self, count: u64) -> Self {
        self.comment_count = Some(count);
        self
    }

    fn retry_context(&self) -> &str {
        self.retry_context.as_deref().unwrap_or(&self.context)
    }

    fn subject_meta(&self) -> SubjectMeta {
        SubjectMeta {
            subject_id: Some(self.subject_id.clone()),
            comment_count: self.comment_count,
        }
    }
}

/// The resolved output of one module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleOutput {
    pub module: ModuleKind,
    pub text: String,
    /// Generation calls made for this module.
    pub attempts: u32,
    /// Last validation, `None` on the unvalidated fast path.
    pub validation: Option<ModuleValidationResult>,
    /// Accepted after the retry budget ran out.
    pub degraded: bool,
}

/// A finished analysis report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub subject_id: String,
    /// Final text, auto-corrected when a correction was applied.
    pub text: String,
    pub validation: FinalValidationResult,
    pub modules: Vec<ModuleOutput>,
    pub synthesis_attempts: u32,
}

impl AnalysisReport {
    /// Modules accepted without reaching their passing score.
    pub fn degraded_modules(&self) -> impl Iterator<Item = ModuleKind> + '_ {
        self.modules.iter().filter(|m| m.degraded).map(|m| m.module)
    }
}

/// Result of an analysis run that was not cancelled.
#[derive(Debug)]
pub enum Outcome {
    /// Final report passed and every module reached its passing score.
    Accepted(AnalysisReport),
    /// A report exists but something exhausted its retry budget.
    Degraded(AnalysisReport),
    Failed(PipelineError),
}

impl Outcome {
    #[must_use]
    pub const fn report(&self) -> Option<&AnalysisReport> {
        match self {
            Self::Accepted(report) | Self::Degraded(report) => Some(report),
            Self::Failed(_) => None,
        }
    }

    /// Persisted outcome label, `None` for failures.
    #[must_use]
    pub const fn record_outcome(&self) -> Option<RecordOutcome> {
        match self {
            Self::Accepted(_) => Some(RecordOutcome::Accepted),
            Self::Degraded(_) => Some(RecordOutcome::Degraded),
            Self::Failed(_) => None,
        }
    }
}

/// Why the inner run stopped early.
enum Halt {
    Cancelled,
    Failed(PipelineError),
}

impl From<PipelineError> for Halt {
    fn from(e: PipelineError) -> Self {
        Self::Failed(e)
    }
}

impl From<Cancelled> for Halt {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

pub(crate) fn check(cancel: &CancellationToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}

/// Sleep for `delay` unless cancelled first.
async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
    if delay.is_zero() {
        return check(cancel);
    }
    tokio::select! {
        () = cancel.cancelled() => Err(Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Attempt bounds and delays outside the module validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub synthesis_max_attempts: u32,
    pub retry_delay: Duration,
    pub generation_error_delay: Duration,
    /// When `false`, modules are generated once, concurrently, and the
    /// synthesis is validated once.
    pub validation_enabled: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            synthesis_max_attempts: 3,
            retry_delay: Duration::ZERO,
            generation_error_delay: Duration::ZERO,
            validation_enabled: true,
        }
    }
}

impl RetryPolicy {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero synthesis bound.
    pub fn from_config(retry: &RetryConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            synthesis_max_attempts: retry.synthesis_max_attempts()?,
            retry_delay: retry.retry_delay(),
            generation_error_delay: retry.generation_error_delay(),
            validation_enabled: retry.validation_enabled,
        })
    }
}

// ---------------------------------------------------------------------------
// RetryOrchestrator
// ---------------------------------------------------------------------------

pub struct RetryOrchestrator<G> {
    generator: G,
    prompts: PromptSet,
    module_validator: ModuleValidator,
    final_validator: FinalReportValidator,
    policy: RetryPolicy,
    events: EventLog,
}

impl<G: Generator> RetryOrchestrator<G> {
    #[must_use]
    pub fn new(
        generator: G,
        prompts: PromptSet,
        module_validator: ModuleValidator,
        final_validator: FinalReportValidator,
        policy: RetryPolicy,
        events: EventLog,
    ) -> Self {
        Self {
            generator,
            prompts,
            module_validator,
            final_validator,
            policy,
            events,
        }
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when `retry.module_max_retries`
    /// is unset, or `ConfigError::InvalidValue` for a zero synthesis bound.
    pub fn from_config(
        generator: G,
        prompts: PromptSet,
        config: &VerdictConfig,
        events: EventLog,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            generator,
            prompts,
            ModuleValidator::from_config(&config.validation, &config.retry)?,
            FinalReportValidator::new(config.validation.clone()),
            RetryPolicy::from_config(&config.retry)?,
            events,
        ))
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the whole analysis.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when `cancel` fires. Generation failures and other
    /// terminal problems come back as `Outcome::Failed`. Report copies written
    /// to the event log by a cancelled run are removed.
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<Outcome, Cancelled> {
        let mut ctx = RunContext::new(&request.subject_id);
        let result = self.run_in(request, cancel, &mut ctx).await;
        if result.is_err() {
            ctx.discard_files().await;
        }
        result
    }

    /// Like [`run`](Self::run), but report copies are tracked in `ctx` and
    /// left for the caller to keep or discard.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when `cancel` fires.
    pub async fn run_in(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
        ctx: &mut RunContext,
    ) -> Result<Outcome, Cancelled> {
        let started = std::time::Instant::now();
        let result = if self.policy.validation_enabled {
            self.run_validated(request, cancel, ctx).await
        } else {
            self.run_fast(request, cancel, ctx).await
        };

        match result {
            Ok(report) => {
                let accepted =
                    report.validation.is_pass() && report.degraded_modules().next().is_none();
                info!(
                    subject_id = %request.subject_id,
                    score = report.validation.score,
                    accepted,
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "analysis finished"
                );
                Ok(if accepted {
                    Outcome::Accepted(report)
                } else {
                    Outcome::Degraded(report)
                })
            }
            Err(Halt::Cancelled) => {
                info!(subject_id = %request.subject_id, "analysis cancelled");
                Err(Cancelled)
            }
            Err(Halt::Failed(e)) => {
                warn!(subject_id = %request.subject_id, error = %e, "analysis failed");
                Ok(Outcome::Failed(e))
            }
        }
    }

    async fn run_validated(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
        ctx: &mut RunContext,
    ) -> Result<AnalysisReport, Halt> {
        let mut modules = Vec::with_capacity(ModuleKind::ALL.len());
        for module in ModuleKind::ALL {
            modules.push(self.run_module(module, request, cancel).await?);
        }
        self.run_synthesis(request, modules, self.policy.synthesis_max_attempts, cancel, ctx)
            .await
    }

    /// Fan out one generation per module, then validate the synthesis once.
    async fn run_fast(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
        ctx: &mut RunContext,
    ) -> Result<AnalysisReport, Halt> {
        check(cancel)?;
        let calls = ModuleKind::ALL.map(|module| async move {
            let text = self
                .generator
                .generate(self.prompts.module(module), &request.context)
                .await;
            (module, text)
        });
        let results = futures_util::future::join_all(calls).await;
        check(cancel)?;

        let mut modules = Vec::with_capacity(results.len());
        for (module, text) in results {
            let text = text.map_err(|source| PipelineError::Generation {
                stage: module.to_string(),
                attempts: 1,
                source,
            })?;
            modules.push(ModuleOutput {
                module,
                text,
                attempts: 1,
                validation: None,
                degraded: false,
            });
        }
        self.run_synthesis(request, modules, 1, cancel, ctx).await
    }

    async fn run_module(
        &self,
        module: ModuleKind,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<ModuleOutput, Halt> {
        let prompt = self.prompts.module(module);
        let max_calls = self.module_validator.max_retries().saturating_add(1);
        let mut previous: Option<ModuleValidationResult> = None;
        let mut attempt = 1;

        loop {
            check(cancel)?;
            let (system, context) = match &previous {
                None => (prompt.to_string(), request.context.as_str()),
                Some(prev) => (
                    format!(
                        "{}\n\n{PROMPT_SEPARATOR}\n\nОРИГИНАЛЬНЫЙ ПРОМПТ:\n{prompt}",
                        module_retry_instructions(prev, self.module_validator.min_quality_score())
                    ),
                    request.retry_context(),
                ),
            };

            debug!(subject_id = %request.subject_id, %module, attempt, "generating module");
            let text = match self.generator.generate(&system, context).await {
                Ok(text) => text,
                Err(e) => {
                    if attempt >= max_calls || !e.is_transient() {
                        return Err(generation_failed(module.as_str(), attempt, e).into());
                    }
                    warn!(subject_id = %request.subject_id, %module, attempt, error = %e, "module generation failed, retrying");
                    attempt += 1;
                    pause(self.error_delay(&e), cancel).await?;
                    continue;
                }
            };

            let result = self.module_validator.validate(module, &text, attempt);
            self.log_module(request, &result);
            check(cancel)?;

            if result.is_valid || !result.retry_needed {
                let degraded = !result.is_valid;
                if degraded {
                    warn!(
                        subject_id = %request.subject_id,
                        %module,
                        attempt,
                        score = result.quality_score,
                        "module accepted degraded"
                    );
                }
                return Ok(ModuleOutput {
                    module,
                    text,
                    attempts: attempt,
                    validation: Some(result),
                    degraded,
                });
            }

            debug!(subject_id = %request.subject_id, %module, attempt, score = result.quality_score, "module retry");
            previous = Some(result);
            attempt += 1;
            pause(self.policy.retry_delay, cancel).await?;
        }
    }

    async fn run_synthesis(
        &self,
        request: &AnalysisRequest,
        modules: Vec<ModuleOutput>,
        max_attempts: u32,
        cancel: &CancellationToken,
        ctx: &mut RunContext,
    ) -> Result<AnalysisReport, Halt> {
        let combined = combine_partials(&modules);
        let partials: Partials = modules.iter().map(|m| (m.module, m.text.clone())).collect();
        let subject = request.subject_meta();
        let synthesis_prompt = self.prompts.synthesis();
        let max_attempts = max_attempts.max(1);

        let mut last_retry_prompt: Option<String> = None;
        let mut last: Option<(String, FinalValidationResult, u32)> = None;

        for attempt in 1..=max_attempts {
            check(cancel)?;
            let system = match &last_retry_prompt {
                Some(retry) => format!("{synthesis_prompt}\n\n{retry}"),
                None => synthesis_prompt.to_string(),
            };

            debug!(subject_id = %request.subject_id, attempt, "generating synthesis");
            let raw = match self.generator.generate(&system, &combined).await {
                Ok(text) => text,
                Err(e) => {
                    if attempt >= max_attempts || !e.is_transient() {
                        return Err(generation_failed("synthesis", attempt, e).into());
                    }
                    warn!(subject_id = %request.subject_id, attempt, error = %e, "synthesis generation failed, retrying");
                    pause(self.error_delay(&e), cancel).await?;
                    continue;
                }
            };

            let result = self.final_validator.validate(&raw, &subject, Some(&partials));
            self.log_final(request, attempt, &raw, &result, ctx).await;
            check(cancel)?;

            let retry_prompt = result
                .retry_prompt
                .clone()
                .filter(|_| result.retry_needed && attempt < max_attempts);

            let (text, verdict) = match result.corrected_report.clone() {
                Some(corrected) => {
                    let revalidated = self.final_validator.validate(&corrected, &subject, Some(&partials));
                    debug!(
                        subject_id = %request.subject_id,
                        attempt,
                        before = result.score,
                        after = revalidated.score,
                        "re-validated corrected report"
                    );
                    (corrected, revalidated)
                }
                None => (raw, result),
            };
            last = Some((text, verdict, attempt));

            match retry_prompt {
                Some(prompt) => {
                    last_retry_prompt = Some(prompt);
                    pause(self.policy.retry_delay, cancel).await?;
                }
                None => break,
            }
        }

        let Some((text, validation, synthesis_attempts)) = last else {
            return Err(PipelineError::NoSynthesis.into());
        };
        Ok(AnalysisReport {
            subject_id: request.subject_id.clone(),
            text,
            validation,
            modules,
            synthesis_attempts,
        })
    }

    /// Wait at least as long as the generator asked for.
    fn error_delay(&self, error: &GenerationError) -> Duration {
        error
            .retry_after()
            .map_or(self.policy.generation_error_delay, |d| d.max(self.policy.generation_error_delay))
    }

    // -----------------------------------------------------------------------
    // Event log
    // -----------------------------------------------------------------------

    fn log_module(&self, request: &AnalysisRequest, result: &ModuleValidationResult) {
        let Ok(value) = serde_json::to_value(result) else {
            return;
        };
        let event = ValidationEvent::new(ValidatorKind::Module, result.attempt, value, Utc::now())
            .with_subject(&request.subject_id)
            .with_module(result.module);
        if let Err(e) = self.events.append(&event) {
            warn!(subject_id = %request.subject_id, error = %e, "failed to append module validation event");
        }
    }

    async fn log_final(
        &self,
        request: &AnalysisRequest,
        attempt: u32,
        raw: &str,
        result: &FinalValidationResult,
        ctx: &mut RunContext,
    ) {
        let Ok(value) = serde_json::to_value(result) else {
            return;
        };
        let stem = format!("{}_{}_synthesis_{attempt}", request.subject_id, ctx.run_id());
        let mut event = ValidationEvent::new(ValidatorKind::FinalSynthesis, attempt, value, Utc::now())
            .with_subject(&request.subject_id)
            .with_extra(serde_json::json!({
                "score": result.score,
                "status": result.status,
            }));
        event.raw_report_path = self.write_report(&format!("{stem}_raw"), raw, ctx).await;
        if let Some(corrected) = &result.corrected_report {
            event.corrected_report_path = self
                .write_report(&format!("{stem}_corrected"), corrected, ctx)
                .await;
        }
        if let Err(e) = self.events.append(&event) {
            warn!(subject_id = %request.subject_id, error = %e, "failed to append synthesis validation event");
        }
    }

    async fn write_report(&self, name: &str, text: &str, ctx: &mut RunContext) -> Option<String> {
        match self.events.write_report(name, text).await {
            Ok(path) => path.map(|p| {
                let shown = p.display().to_string();
                ctx.track_file(p);
                shown
            }),
            Err(e) => {
                warn!(name, error = %e, "failed to write report copy");
                None
            }
        }
    }
}

fn generation_failed(stage: &str, attempts: u32, source: GenerationError) -> PipelineError {
    PipelineError::Generation {
        stage: stage.to_string(),
        attempts,
        source,
    }
}

/// Module outputs joined for the synthesis call, in module order.
#[must_use]
pub fn combine_partials(modules: &[ModuleOutput]) -> String {
    modules
        .iter()
        .map(|m| format!("МОДУЛЬ {} - {}:\n{}", m.module, m.module.title(), m.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
