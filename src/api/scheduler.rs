//! Scheduler: drives push and pull fixes through the pipeline.
//!
//! A single background task owns the [`Pipeline`]. Push fixes arrive on a
//! bounded channel fed by [`FixSink`]s, pull fixes are fetched on a fixed
//! cadence, and both are handled one at a time inside the same `select!`
//! loop, so no two fixes ever interleave mid-pipeline. A full channel drops
//! the incoming event and counts it.
//!
//! # Usage
//!
//! ```ignore
//! let mut agent = TrackingAgent::new(AgentConfig::default(), providers);
//! agent.start()?;
//! // ...
//! agent.stop().await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::error::{AgentError, AgentResult};
use crate::api::notifier::{StatusNotifier, TracingNotifier};
use crate::api::status::{
    inspect_log_dir, AgentSnapshot, AgentStatus, HaltReason, SchedulerState,
};
use crate::core::PositionSample;
use crate::processing::pipeline::{FixOutcome, Pipeline};
use crate::source::{
    FixOrigin, FixSink, PositionProvider, ProviderChain, ProviderError, ProviderId,
    ProviderResult, RecoveryStrategy, SourceEvent, SubscriptionRequest,
};
use crate::utils::config::AgentConfig;

/// Snapshot shared between the scheduler task and status readers.
/// Readers always get a whole, consistent copy.
#[derive(Clone, Default)]
struct SharedSnapshot {
    snapshot: Arc<RwLock<AgentSnapshot>>,
    /// Bumped by sinks directly, outside the scheduler task
    dropped: Arc<AtomicU64>,
}

impl SharedSnapshot {
    fn read(&self) -> AgentSnapshot {
        let mut snapshot = self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        snapshot.dropped_events = self.dropped.load(Ordering::Relaxed);
        snapshot
    }

    fn update(&self, apply: impl FnOnce(&mut AgentSnapshot)) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut guard);
    }

    fn replace(&self, snapshot: AgentSnapshot) {
        self.dropped.store(snapshot.dropped_events, Ordering::Relaxed);
        self.update(|s| *s = snapshot);
    }
}

struct WorkerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Background location sampling agent
pub struct TrackingAgent {
    config: AgentConfig,
    providers: ProviderChain,
    notifier: Arc<dyn StatusNotifier>,
    shared: SharedSnapshot,
    worker: Option<WorkerHandle>,
}

impl TrackingAgent {
    /// Create a stopped agent that reports accepted samples through `tracing`
    pub fn new(config: AgentConfig, providers: ProviderChain) -> Self {
        Self {
            config,
            providers,
            notifier: Arc::new(TracingNotifier),
            shared: SharedSnapshot::default(),
            worker: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn StatusNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.read().state
    }

    /// Consistent copy of the agent's counters and last sample
    pub fn snapshot(&self) -> AgentSnapshot {
        self.shared.read()
    }

    /// Snapshot, freshness and log directory in one answer
    pub fn status(&self) -> AgentResult<AgentStatus> {
        let snapshot = self.snapshot();
        let freshness = snapshot.freshness(Utc::now(), self.config.stale_after());
        let logs = inspect_log_dir(&self.config.log_dir)?;
        Ok(AgentStatus {
            snapshot,
            freshness,
            logs,
        })
    }

    /// Register for push fixes and begin the pull cadence.
    ///
    /// Must be called from within a tokio runtime. Fails with a
    /// `PermissionDenied` provider error if positioning is not authorized;
    /// a missing provider is not an error, the agent then relies on the pull
    /// cadence. An agent that halted on its own can be started again without
    /// calling `stop()` first.
    pub fn start(&mut self) -> AgentResult<()> {
        if let Some(worker) = &self.worker {
            // a halted loop publishes Stopped just before its task returns
            if !worker.task.is_finished() && self.state() != SchedulerState::Stopped {
                return Err(AgentError::AlreadyRunning);
            }
        }
        self.worker = None;

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| AgentError::NoRuntime)?;
        self.config.validate()?;

        self.shared.replace(AgentSnapshot {
            state: SchedulerState::Starting,
            ..Default::default()
        });
        info!(
            log_dir = %self.config.log_dir.display(),
            pull_interval_ms = self.config.pull_interval_ms,
            min_distance_m = self.config.min_distance_m,
            queue_capacity = self.config.queue_capacity,
            providers = ?self.providers.ids(),
            "Starting location agent"
        );

        let cancel = CancellationToken::new();
        let (tx, events) = mpsc::channel(self.config.queue_capacity);
        let pipeline = Pipeline::new(
            self.config.filter(),
            self.config.writer(),
            Arc::clone(&self.notifier),
        );
        let mut scheduler = SchedulerLoop {
            providers: self.providers.clone(),
            request: self.config.subscription_request(),
            pull_interval: self.config.pull_interval(),
            pipeline,
            events,
            tx,
            cancel: cancel.clone(),
            active: None,
            shared: self.shared.clone(),
        };

        if let Err(e) = scheduler.refresh_push() {
            scheduler.release_push();
            self.shared.update(|s| {
                s.state = SchedulerState::Stopped;
                s.halt = halt_reason(&e);
            });
            error!(error = %e, "Cannot start location agent");
            return Err(e.into());
        }
        if scheduler.active.is_none() {
            warn!("No provider available for push updates; relying on pull cadence");
        }

        self.shared.update(|s| s.state = SchedulerState::Running);
        let task = runtime.spawn(scheduler.run());
        self.worker = Some(WorkerHandle { cancel, task });
        Ok(())
    }

    /// Unregister push fixes and cancel the pull cadence.
    ///
    /// An append already in progress completes; no fix is accepted after
    /// this is called. Stopping a stopped agent is a no-op.
    pub async fn stop(&mut self) -> AgentResult<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.shared.update(|s| {
            if s.state == SchedulerState::Running {
                s.state = SchedulerState::Stopping;
            }
        });
        worker.cancel.cancel();
        if let Err(e) = worker.task.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }

        self.shared.update(|s| {
            s.state = SchedulerState::Stopped;
            s.active_provider = None;
        });
        info!("Location agent stopped");
        Ok(())
    }
}

impl Drop for TrackingAgent {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.cancel.cancel();
        }
    }
}

fn halt_reason(error: &ProviderError) -> Option<HaltReason> {
    match error {
        ProviderError::PermissionDenied { provider } => Some(HaltReason::PermissionDenied {
            provider: provider.clone(),
        }),
        _ => None,
    }
}

/// State owned by the scheduler task
struct SchedulerLoop {
    providers: ProviderChain,
    request: SubscriptionRequest,
    pull_interval: Duration,
    pipeline: Pipeline,
    events: mpsc::Receiver<SourceEvent>,
    tx: mpsc::Sender<SourceEvent>,
    cancel: CancellationToken,
    /// Provider holding the push subscription
    active: Option<Arc<dyn PositionProvider>>,
    shared: SharedSnapshot,
}

impl SchedulerLoop {
    async fn run(mut self) {
        let cancel = self.cancel.clone();
        // first tick fires immediately
        let mut ticker = tokio::time::interval(self.pull_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Handlers run to completion before cancellation is observed again,
        // so an append in flight always finishes.
        loop {
            let step = tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(event) = self.events.recv() => self.handle_event(event).await,

                _ = ticker.tick() => self.on_tick().await,
            };

            if let Err(e) = step {
                self.release_push();
                self.halt(e);
                break;
            }
        }

        self.release_push();
        debug!("Scheduler loop exited");
    }

    async fn handle_event(&mut self, event: SourceEvent) -> ProviderResult<()> {
        match event {
            SourceEvent::Fix {
                provider,
                origin,
                sample,
            } => {
                self.process(&provider, origin, sample).await;
                Ok(())
            }
            SourceEvent::Availability { provider, enabled } => {
                info!(provider = %provider, enabled, "Provider availability changed");
                self.refresh_push()
            }
        }
    }

    /// Pull cadence: re-check the push registration, then fetch the most
    /// preferred provider's last known fix. An unavailable provider hands
    /// over to the next one; a transient failure waits for the next tick.
    async fn on_tick(&mut self) -> ProviderResult<()> {
        self.refresh_push()?;

        for provider in self.providers.available()? {
            match provider.last_known_fix() {
                Ok(Some(sample)) => {
                    self.process(provider.id(), FixOrigin::Pull, sample).await;
                    return Ok(());
                }
                Ok(None) => {
                    debug!(provider = %provider.id(), "No last known fix");
                    return Ok(());
                }
                Err(e) => match e.recovery_strategy() {
                    RecoveryStrategy::Halt => return Err(e),
                    RecoveryStrategy::Fallback => {
                        warn!(provider = %provider.id(), error = %e, "Pull failed; trying next provider");
                        self.record_provider_error(&e);
                    }
                    RecoveryStrategy::RetryNextTick => {
                        warn!(provider = %provider.id(), error = %e, "Pull failed; retrying next tick");
                        self.record_provider_error(&e);
                        return Ok(());
                    }
                },
            }
        }
        debug!("No provider could answer the pull");
        Ok(())
    }

    async fn process(&mut self, provider: &ProviderId, origin: FixOrigin, sample: PositionSample) {
        let outcome = self.pipeline.process(sample).await;
        let last_accepted = self.pipeline.state().last_accepted().cloned();
        let now = Utc::now();

        match &outcome {
            FixOutcome::Accepted { decision, .. } => debug!(
                provider = %provider,
                ?origin,
                distance_m = ?decision.distance_m(),
                "Fix accepted"
            ),
            FixOutcome::Rejected { distance_m } => {
                debug!(provider = %provider, ?origin, distance_m, "Fix rejected")
            }
            FixOutcome::Invalid(e) => warn!(provider = %provider, ?origin, error = %e, "Fix invalid"),
        }

        self.shared.update(|s| {
            s.last_fix_at = Some(now);
            match &outcome {
                FixOutcome::Accepted { persisted, .. } => {
                    s.accepted += 1;
                    s.last_accepted = last_accepted;
                    match persisted {
                        Ok(_) => s.last_write_error = None,
                        Err(e) => {
                            s.write_failures += 1;
                            s.last_write_error = Some(e.to_string());
                        }
                    }
                }
                FixOutcome::Rejected { .. } => s.rejected += 1,
                FixOutcome::Invalid(_) => s.invalid += 1,
            }
        });
    }

    /// Keep the push subscription on the most preferred enabled provider.
    ///
    /// Drops a subscription whose provider went away and upgrades to a
    /// better provider when one becomes available. Never produces a fix.
    fn refresh_push(&mut self) -> ProviderResult<()> {
        let available = self.providers.available()?;

        if let Some(active) = &self.active {
            let still_enabled = available.iter().any(|p| p.id() == active.id());
            if !still_enabled {
                info!(provider = %active.id(), "Push provider no longer available");
                self.release_push();
            }
        }

        let current_rank = self
            .active
            .as_ref()
            .and_then(|p| self.providers.rank(p.id()))
            .unwrap_or(usize::MAX);

        for provider in available {
            let rank = self.providers.rank(provider.id()).unwrap_or(usize::MAX);
            if rank >= current_rank {
                break;
            }
            let sink = FixSink::new(provider.id().clone(), self.tx.clone(), self.cancel.clone())
                .counting_drops(Arc::clone(&self.shared.dropped));
            match provider.subscribe(&self.request, sink) {
                Ok(()) => {
                    self.release_push();
                    info!(
                        provider = %provider.id(),
                        min_interval_ms = self.request.min_interval_ms,
                        min_distance_m = self.request.min_distance_m,
                        "Push updates registered"
                    );
                    self.shared
                        .update(|s| s.active_provider = Some(provider.id().clone()));
                    self.active = Some(provider);
                    return Ok(());
                }
                Err(e) if !e.is_recoverable() => return Err(e),
                Err(e) => {
                    warn!(provider = %provider.id(), error = %e, "Push registration failed");
                    self.record_provider_error(&e);
                }
            }
        }
        Ok(())
    }

    fn release_push(&mut self) {
        if let Some(provider) = self.active.take() {
            if let Err(e) = provider.unsubscribe() {
                warn!(provider = %provider.id(), error = %e, "Unsubscribe failed");
            }
            self.shared.update(|s| s.active_provider = None);
        }
    }

    fn record_provider_error(&self, error: &ProviderError) {
        let message = error.to_string();
        self.shared.update(|s| s.last_provider_error = Some(message));
    }

    /// Permission lost while running: stop attempting fixes. The push
    /// registration must already be released.
    fn halt(&mut self, error: ProviderError) {
        error!(error = %error, "Halting location agent");
        self.cancel.cancel();
        let reason = halt_reason(&error);
        self.shared.update(|s| {
            s.state = SchedulerState::Stopped;
            s.halt = reason;
        });
    }
}
