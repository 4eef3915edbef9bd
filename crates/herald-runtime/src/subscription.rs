//! # Subscription runner
//!
//! Binds (role, trigger, callback) triples and drives each one in its own
//! tokio task:
//!
//! ```text
//! loop {
//!     event  = trigger.next()
//!     output = role.run(Some(event))
//!     if output is Some: callback(output)
//! }
//! ```
//!
//! Every step is raced against the subscription's cancellation token, so
//! `unsubscribe` takes effect at the next await point and hands the role back.
//! A failure in one subscription never reaches another: the task logs it,
//! publishes a [`RuntimeEvent::SubscriptionFailed`], and either stops or waits
//! for the next trigger event depending on the [`FailurePolicy`]. A panic
//! anywhere in a cycle is caught and always stops the subscription, reported
//! with stage `"panic"`.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use herald_config::RunnerConfig;
use herald_core::{EventBus, HeraldError, Message, Result, RoleId, RuntimeEvent, SubscriptionId};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::role::Role;
use crate::trigger::Trigger;

// ── Callbacks ──────────────────────────────────────────────────

/// Receives every message a subscribed role produces.
#[async_trait]
pub trait SubscriptionCallback: Send + Sync {
    async fn call(&self, message: Message) -> Result<()>;
}

/// Adapts an async closure into a [`SubscriptionCallback`].
pub struct FnCallback<F>(F);

pub fn from_fn<F, Fut>(f: F) -> FnCallback<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    FnCallback(f)
}

#[async_trait]
impl<F, Fut> SubscriptionCallback for FnCallback<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn call(&self, message: Message) -> Result<()> {
        (self.0)(message).await
    }
}

/// Forwards messages into an mpsc channel. Fails once the receiver is gone.
pub struct ChannelCallback {
    tx: mpsc::Sender<Message>,
}

impl ChannelCallback {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SubscriptionCallback for ChannelCallback {
    async fn call(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| HeraldError::Callback("receiver dropped".into()))
    }
}

/// Logs each message at info level.
pub struct LogCallback;

#[async_trait]
impl SubscriptionCallback for LogCallback {
    async fn call(&self, message: Message) -> Result<()> {
        info!(
            message_id = %message.id(),
            role = message.role().unwrap_or("-"),
            cause = %message.cause_by(),
            "{}",
            message.content()
        );
        Ok(())
    }
}

// ── Options ────────────────────────────────────────────────────

/// What a subscription does after its action or callback fails.
/// Trigger failures always end the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    TearDown,
    /// Keep going until `max_consecutive` failures in a row.
    Restart { max_consecutive: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    pub failure_policy: FailurePolicy,
    /// Bound on one `role.run` call.
    pub cycle_timeout: Option<Duration>,
    /// Bound on one callback invocation.
    pub callback_timeout: Option<Duration>,
}

impl RunnerOptions {
    pub fn from_config(config: &RunnerConfig) -> Result<Self> {
        let failure_policy = match config.failure_policy.as_str() {
            "teardown" => FailurePolicy::TearDown,
            "restart" => FailurePolicy::Restart {
                max_consecutive: config.max_consecutive_failures,
            },
            other => {
                return Err(HeraldError::ConfigValidation {
                    field: "runner.failure_policy".into(),
                    reason: format!("unknown failure policy '{other}'"),
                });
            }
        };
        let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
        Ok(Self {
            failure_policy,
            cycle_timeout: secs(config.cycle_timeout_secs),
            callback_timeout: secs(config.callback_timeout_secs),
        })
    }
}

// ── Runner ─────────────────────────────────────────────────────

/// A snapshot row describing one live subscription.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub role_id: RoleId,
    pub role: String,
    pub trigger: String,
    pub started_at: DateTime<Utc>,
}

struct Entry {
    info: SubscriptionInfo,
    callback: Arc<dyn SubscriptionCallback>,
    cancel: CancellationToken,
    handle: JoinHandle<Role>,
}

struct Inner {
    entries: Mutex<HashMap<RoleId, Entry>>,
    options: RunnerOptions,
    events: Option<EventBus>,
    shutdown: CancellationToken,
    changed: Notify,
}

impl Inner {
    fn publish(&self, event: RuntimeEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Drop the registry row for `role_id` if it still belongs to subscription `id`.
    fn remove_if_current(&self, role_id: RoleId, id: SubscriptionId) {
        let mut entries = self.entries.lock();
        if entries.get(&role_id).is_some_and(|e| e.info.id == id) {
            entries.remove(&role_id);
        }
        drop(entries);
        self.changed.notify_waiters();
    }
}

/// Drives many subscriptions concurrently. Cheap to clone; all clones share
/// one registry.
#[derive(Clone)]
pub struct SubscriptionRunner {
    inner: Arc<Inner>,
}

impl Default for SubscriptionRunner {
    fn default() -> Self {
        Self::new(RunnerOptions::default())
    }
}

impl SubscriptionRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self::build(options, None)
    }

    /// Publish lifecycle events (and role state changes) on `bus`.
    pub fn with_events(options: RunnerOptions, bus: EventBus) -> Self {
        Self::build(options, Some(bus))
    }

    fn build(options: RunnerOptions, events: Option<EventBus>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                options,
                events,
                shutdown: CancellationToken::new(),
                changed: Notify::new(),
            }),
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.inner.options
    }

    /// Bind `role` to `trigger` and start driving it immediately.
    ///
    /// Fails with [`HeraldError::AlreadySubscribed`] if a subscription for the
    /// same role id is live; the live one is left alone.
    pub fn subscribe(
        &self,
        role: Role,
        trigger: impl Trigger + 'static,
        callback: impl SubscriptionCallback + 'static,
    ) -> Result<SubscriptionId> {
        self.subscribe_boxed(role, Box::new(trigger), Arc::new(callback))
    }

    pub fn subscribe_boxed(
        &self,
        mut role: Role,
        trigger: Box<dyn Trigger>,
        callback: Arc<dyn SubscriptionCallback>,
    ) -> Result<SubscriptionId> {
        let role_id = role.id();
        // Held across the spawn so a task that ends at once cannot race its own registration.
        let mut entries = self.inner.entries.lock();
        if entries.contains_key(&role_id) {
            warn!(role = %role, role_id = %role_id, "role already subscribed, rejecting");
            return Err(HeraldError::AlreadySubscribed(role.to_string()));
        }

        if let Some(bus) = &self.inner.events {
            role.attach_events(bus.clone());
        }

        let info = SubscriptionInfo {
            id: Uuid::new_v4(),
            role_id,
            role: role.to_string(),
            trigger: trigger.describe(),
            started_at: Utc::now(),
        };
        let cancel = self.inner.shutdown.child_token();
        let handle = tokio::spawn(drive(
            Arc::clone(&self.inner),
            info.id,
            role,
            trigger,
            Arc::clone(&callback),
            cancel.clone(),
        ));

        info!(
            subscription_id = %info.id,
            role = %info.role,
            trigger = %info.trigger,
            "subscription started"
        );
        self.inner.publish(RuntimeEvent::SubscriptionStarted {
            subscription_id: info.id,
            role_id,
            role: info.role.clone(),
            trigger: info.trigger.clone(),
        });

        let id = info.id;
        entries.insert(
            role_id,
            Entry {
                info,
                callback,
                cancel,
                handle,
            },
        );
        Ok(id)
    }

    /// Stop the subscription for `role_id` and hand its role back.
    ///
    /// Returns `None` if there is no live subscription for the role, including
    /// when it was already unsubscribed or has torn itself down.
    pub async fn unsubscribe(&self, role_id: RoleId) -> Option<Role> {
        let entry = self.inner.entries.lock().remove(&role_id)?;
        entry.cancel.cancel();
        self.inner.changed.notify_waiters();
        match entry.handle.await {
            Ok(role) => Some(role),
            Err(e) => {
                warn!(role_id = %role_id, error = %e, "subscription task did not finish cleanly");
                None
            }
        }
    }

    /// Move a live subscription onto a new trigger, keeping its role (with
    /// its memory and state) and callback.
    pub async fn rebind(
        &self,
        role_id: RoleId,
        trigger: impl Trigger + 'static,
    ) -> Result<SubscriptionId> {
        let callback = self
            .inner
            .entries
            .lock()
            .get(&role_id)
            .map(|e| Arc::clone(&e.callback))
            .ok_or_else(|| HeraldError::NotSubscribed(role_id.to_string()))?;
        let role = self
            .unsubscribe(role_id)
            .await
            .ok_or_else(|| HeraldError::NotSubscribed(role_id.to_string()))?;
        self.subscribe_boxed(role, Box::new(trigger), callback)
    }

    pub fn is_subscribed(&self, role_id: RoleId) -> bool {
        self.inner.entries.lock().contains_key(&role_id)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let mut rows: Vec<SubscriptionInfo> = self
            .inner
            .entries
            .lock()
            .values()
            .map(|e| e.info.clone())
            .collect();
        rows.sort_by_key(|r| r.started_at);
        rows
    }

    /// Wait until no subscription is live or the runner is shut down.
    pub async fn run(&self) {
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.shutdown.is_cancelled() || self.is_empty() {
                return;
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = self.inner.shutdown.cancelled() => return,
            }
        }
    }

    /// Cancel every subscription and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let entries: Vec<Entry> = self.inner.entries.lock().drain().map(|(_, e)| e).collect();
        info!(count = entries.len(), "shutting down subscriptions");
        for entry in entries {
            if let Err(e) = entry.handle.await {
                warn!(subscription_id = %entry.info.id, error = %e, "subscription task did not finish cleanly");
            }
        }
        self.inner.changed.notify_waiters();
    }
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        None => fut.await,
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| HeraldError::Timeout {
                what: what.to_string(),
                secs: limit.as_secs(),
            })?,
    }
}

/// One trigger event through the role and, if it produced something, the callback.
/// On failure, reports which stage failed.
async fn run_cycle(
    options: &RunnerOptions,
    role: &mut Role,
    event: Message,
    callback: &dyn SubscriptionCallback,
) -> std::result::Result<Option<Uuid>, (&'static str, HeraldError)> {
    let output = with_timeout(options.cycle_timeout, "role cycle", role.run(Some(event)))
        .await
        .map_err(|e| ("action", e))?;
    let Some(message) = output else {
        return Ok(None);
    };
    let message_id = message.id();
    with_timeout(options.callback_timeout, "callback", callback.call(message))
        .await
        .map_err(|e| ("callback", e))?;
    Ok(Some(message_id))
}

/// A panic always tears the subscription down, whatever the [`FailurePolicy`].
fn report_panic(
    inner: &Inner,
    id: SubscriptionId,
    role_id: RoleId,
    during: &str,
    payload: Box<dyn Any + Send>,
) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    error!(subscription_id = %id, during, panic = %detail, "subscription panicked, tearing it down");
    inner.publish(RuntimeEvent::SubscriptionFailed {
        subscription_id: id,
        role_id,
        stage: "panic".into(),
        error: format!("panicked during {during}: {detail}"),
        restarting: false,
    });
    format!("panicked during {during}: {detail}")
}

async fn drive(
    inner: Arc<Inner>,
    id: SubscriptionId,
    mut role: Role,
    mut trigger: Box<dyn Trigger>,
    callback: Arc<dyn SubscriptionCallback>,
    cancel: CancellationToken,
) -> Role {
    let role_id = role.id();
    let mut cycle: u64 = 0;
    let mut failures: u32 = 0;

    let reason = loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break "cancelled".to_string(),
            event = AssertUnwindSafe(trigger.next()).catch_unwind() => event,
        };
        let event = match event {
            Ok(Ok(event)) => event,
            Err(payload) => break report_panic(&inner, id, role_id, "trigger", payload),
            Ok(Err(e)) => {
                error!(subscription_id = %id, role = %role, error = %e, "trigger failed");
                inner.publish(RuntimeEvent::SubscriptionFailed {
                    subscription_id: id,
                    role_id,
                    stage: "trigger".into(),
                    error: e.to_string(),
                    restarting: false,
                });
                break format!("trigger failed: {e}");
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break "cancelled".to_string(),
            outcome = AssertUnwindSafe(run_cycle(&inner.options, &mut role, event, callback.as_ref()))
                .catch_unwind() => outcome,
        };
        cycle += 1;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(payload) => break report_panic(&inner, id, role_id, "cycle", payload),
        };

        match outcome {
            Ok(message_id) => {
                failures = 0;
                inner.publish(RuntimeEvent::SubscriptionCycle {
                    subscription_id: id,
                    role_id,
                    cycle,
                    message_id,
                });
            }
            Err((stage, e)) => {
                failures += 1;
                let restarting = match inner.options.failure_policy {
                    FailurePolicy::TearDown => false,
                    FailurePolicy::Restart { max_consecutive } => failures < max_consecutive,
                };
                if restarting {
                    warn!(subscription_id = %id, role = %role, stage, failures, error = %e, "cycle failed, waiting for next trigger event");
                } else {
                    error!(subscription_id = %id, role = %role, stage, failures, error = %e, "cycle failed, tearing subscription down");
                }
                inner.publish(RuntimeEvent::SubscriptionFailed {
                    subscription_id: id,
                    role_id,
                    stage: stage.to_string(),
                    error: e.to_string(),
                    restarting,
                });
                if !restarting {
                    break format!("{stage} failed: {e}");
                }
            }
        }
    };

    info!(subscription_id = %id, role = %role, cycles = cycle, reason = %reason, "subscription stopped");
    // Deregister first: anyone seeing the stop event must also see the row gone.
    inner.remove_if_current(role_id, id);
    inner.publish(RuntimeEvent::SubscriptionStopped {
        subscription_id: id,
        role_id,
        reason,
        at: Utc::now(),
    });
    role
}
