//! Sequencing engine
//!
//! [`Automator::automate`] expands an action list, spawns a driver task that
//! walks it one step at a time, and returns a [`CompletionHandle`]. Each run
//! has its own state; starting a new run kills the previous one, whose handle
//! then never resolves.
//!
//! The driver is a single loop over [`Run::advance`]: it dispatches each
//! action to the handler registered for its shape, waits on deferred replies,
//! pushes interim sequences, and sleeps the configured step and iteration
//! delays. Kill requests are honored at step boundaries only.

use automator_config::{AutomatorConfig, ScriptConfig};
use automator_core::{
    Action, Deferred, Event, EventPayload, HandlerError, Reply, RunId, SleepReason, Value,
};
use automator_event_bus::{EventBus, SharedEventBus};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, warn};

use crate::completion::{CompletionHandle, RunEnd};
use crate::dispatch::DispatchTable;
use crate::error::{AutomatorError, AutomatorResult};
use crate::expand::expand_actions;
use crate::run::{Run, RunControl, Step};
use crate::status::{RunPhase, RunStatus};

/// Callback invoked after each iteration with the finished iteration's index
///
/// Its settled value is passed to the first step of the next iteration, and
/// the last one resolves the completion handle.
pub type IterationCallback = Arc<dyn Fn(usize) -> Result<Deferred, HandlerError> + Send + Sync>;

/// Wrap a closure as an [`IterationCallback`]
pub fn iteration_callback<F>(f: F) -> IterationCallback
where
    F: Fn(usize) -> Result<Deferred, HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Logs a step transition when `debug` is enabled in the config
macro_rules! trace_step {
    ($driver:expr, $($arg:tt)+) => {
        if $driver.config.debug {
            debug!(run_id = %$driver.run.id(), $($arg)+);
        }
    };
}

/// The sequencing engine
pub struct Automator {
    config: AutomatorConfig,
    dispatch: Arc<DispatchTable>,
    event_bus: SharedEventBus,
    current: Mutex<Option<Arc<RunControl>>>,
    status: Arc<watch::Sender<RunStatus>>,
}

impl Automator {
    /// Create an engine with an explicit dispatch table and event bus
    pub fn new(config: AutomatorConfig, dispatch: DispatchTable, event_bus: SharedEventBus) -> Self {
        let (status, _) = watch::channel(RunStatus::default());
        Self {
            config,
            dispatch: Arc::new(dispatch),
            event_bus,
            current: Mutex::new(None),
            status: Arc::new(status),
        }
    }

    /// Create an engine with the default handlers and a fresh event bus
    pub fn with_defaults(config: AutomatorConfig) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let dispatch = DispatchTable::with_defaults(event_bus.clone());
        Self::new(config, dispatch, event_bus)
    }

    /// Engine settings
    pub fn config(&self) -> &AutomatorConfig {
        &self.config
    }

    /// Dispatch table in use
    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    /// Bus carrying run transitions and key events
    pub fn event_bus(&self) -> &SharedEventBus {
        &self.event_bus
    }

    /// Start a run
    ///
    /// Any run still in progress is killed first. `actions` are expanded
    /// (see [`expand_actions`]) and run `iterations` times; `callback` is
    /// called after each iteration. Must be called within a tokio runtime.
    pub fn automate(
        &self,
        actions: Vec<Action>,
        iterations: usize,
        callback: Option<IterationCallback>,
    ) -> AutomatorResult<CompletionHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| AutomatorError::NoRuntime)?;

        let control = Arc::new(RunControl::new());
        if let Some(previous) = self.lock_current().replace(control.clone()) {
            if !previous.is_killed() {
                debug!(run_id = %previous.id(), "Superseding previous run");
            }
            previous.kill();
        }

        let actions = expand_actions(actions);
        if self.config.debug {
            debug!(run_id = %control.id(), iterations, "Automating {} actions", actions.len());
        }

        let run = Run::new(control, actions, iterations);
        let run_id = run.id().clone();
        self.status.send_replace(run.snapshot(RunPhase::Running));
        self.event_bus.fire(Event::for_run(
            run_id.clone(),
            EventPayload::RunStarted { iterations },
        ));

        let (value_tx, value_rx) = oneshot::channel();
        let driver = Driver {
            run,
            config: self.config.clone(),
            dispatch: self.dispatch.clone(),
            event_bus: self.event_bus.clone(),
            status: self.status.clone(),
            callback,
            completion: Some(value_tx),
        };

        let task = runtime.spawn(driver.drive());
        Ok(CompletionHandle::new(run_id, value_rx, task))
    }

    /// Start a run from a configured script
    pub fn automate_script(
        &self,
        script: &ScriptConfig,
        callback: Option<IterationCallback>,
    ) -> AutomatorResult<CompletionHandle> {
        self.automate(script.actions(), script.iterations, callback)
    }

    /// Kill the current run
    ///
    /// Takes effect at the run's next step boundary, or at once if the run
    /// is sleeping or waiting on a deferred result. Work already handed to a
    /// handler is not aborted; only what follows it is dropped. Finished
    /// runs are left as they are.
    pub fn kill(&self) {
        let Some(control) = self.lock_current().clone() else {
            return;
        };

        if self.config.debug {
            debug!(run_id = %control.id(), "Kill requested");
        }
        control.kill();
        self.status.send_if_modified(|status| {
            if status.run_id.as_ref() != Some(control.id())
                || status.killed
                || !status.phase.is_active()
            {
                return false;
            }
            status.killed = true;
            true
        });
    }

    /// Snapshot of the most recent run
    pub fn status(&self) -> RunStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change
    pub fn watch_status(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    /// Whether the most recent run is still in progress
    pub fn is_running(&self) -> bool {
        self.status.borrow().phase.is_active()
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Arc<RunControl>>> {
        // The guarded value is a plain Option, so a poisoned lock is still usable
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns one run and walks it to completion on a spawned task
struct Driver {
    run: Run,
    config: AutomatorConfig,
    dispatch: Arc<DispatchTable>,
    event_bus: SharedEventBus,
    status: Arc<watch::Sender<RunStatus>>,
    callback: Option<IterationCallback>,
    completion: Option<oneshot::Sender<Value>>,
}

impl Driver {
    async fn drive(mut self) -> Result<RunEnd, AutomatorError> {
        let result = match AssertUnwindSafe(self.run_steps()).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(AutomatorError::Panicked(panic_message(panic.as_ref()))),
        };

        match &result {
            Ok(RunEnd::Completed(_)) => {
                trace_step!(self, "Done with iterations");
                self.publish(RunPhase::Done);
                self.fire(EventPayload::RunCompleted);
            }
            Ok(RunEnd::Killed) => {
                trace_step!(self, "Killed, exiting");
                self.publish(RunPhase::Killed);
                self.fire(EventPayload::RunKilled);
            }
            Err(e) => {
                error!(run_id = %self.run.id(), error = %e, "Run faulted");
                self.publish(RunPhase::Faulted);
                self.fire(EventPayload::RunFaulted {
                    message: e.to_string(),
                });
            }
        }

        result
    }

    async fn run_steps(&mut self) -> Result<RunEnd, AutomatorError> {
        let step_delay = self.config.step_delay_duration();
        let mut pass_through = Value::Null;

        loop {
            match self.run.advance(step_delay) {
                Step::Halted => return Ok(RunEnd::Killed),

                Step::Skipped => {
                    trace_step!(self, "Skipping null action");
                    pass_through = Value::Null;
                }

                Step::IterationDone {
                    iteration,
                    finished,
                } => {
                    trace_step!(self, iteration, "Iteration completed");
                    self.fire(EventPayload::IterationCompleted { iteration });

                    let pending = match &self.callback {
                        Some(callback) => {
                            trace_step!(self, iteration, "Executing iteration callback");
                            callback(iteration).map_err(|source| {
                                AutomatorError::IterationCallback { iteration, source }
                            })?
                        }
                        None => Deferred::ready(Value::Null),
                    };

                    if finished {
                        let Some(value) = self.settle(pending).await? else {
                            return Ok(RunEnd::Killed);
                        };
                        if self.run.is_killed() {
                            return Ok(RunEnd::Killed);
                        }
                        if let Some(tx) = self.completion.take() {
                            let _ = tx.send(value.clone());
                        }
                        return Ok(RunEnd::Completed(value));
                    }

                    self.publish(RunPhase::Iterating);
                    let Some(value) = self.settle(pending).await? else {
                        return Ok(RunEnd::Killed);
                    };
                    self.sleep(
                        self.config.iteration_delay_duration(),
                        SleepReason::Iteration,
                    )
                    .await;
                    trace_step!(self, iteration = iteration + 1, "Iteration ready to start");
                    self.publish(RunPhase::Running);
                    pass_through = value;
                }

                Step::Dispatch {
                    action,
                    shape,
                    delay,
                    from_interim,
                } => {
                    trace_step!(self, %action, "Handling action");
                    let handler = self
                        .dispatch
                        .handler(shape)
                        .cloned()
                        .ok_or(AutomatorError::UnsupportedAction { shape })?;

                    self.fire(EventPayload::StepDispatched {
                        shape,
                        action_index: self.run.action_index(),
                        delay_ms: delay.as_millis() as u64,
                        interim: from_interim,
                    });
                    self.publish(RunPhase::Running);

                    let reply = handler(&action, pass_through).map_err(|source| {
                        AutomatorError::Handler {
                            action: action.to_string(),
                            source,
                        }
                    })?;

                    pass_through = match reply {
                        Reply::Value(value) => {
                            self.sleep(delay, SleepReason::Step).await;
                            value
                        }
                        Reply::Pending(deferred) => {
                            let Some(value) = self.settle(deferred).await? else {
                                return Ok(RunEnd::Killed);
                            };
                            self.sleep(delay, SleepReason::Step).await;
                            value
                        }
                        Reply::Interim(actions) => {
                            let actions = expand_actions(actions);
                            let len = actions.len();
                            if self.run.push_interim(actions) {
                                trace_step!(self, len, "Pushed interim actions");
                                self.fire(EventPayload::InterimPushed {
                                    len,
                                    depth: self.run.interim_depth(),
                                });
                                self.publish(RunPhase::Running);
                            }
                            Value::Null
                        }
                    };
                }
            }
        }
    }

    /// Wait for a deferred result, or for the run to be killed
    ///
    /// Returns `None` once killed. The deferred runs on its own task, so a
    /// kill stops the wait but not the work behind it. A failed settlement
    /// is passed on as its error message, like a rejection argument.
    async fn settle(&self, deferred: Deferred) -> Result<Option<Value>, AutomatorError> {
        let task = tokio::spawn(deferred);
        let Some(settled) = self.run.control().unless_killed(task).await else {
            trace_step!(self, "Killed while waiting on a deferred result");
            return Ok(None);
        };

        match settled {
            Ok(Ok(value)) => Ok(Some(value)),
            Ok(Err(e)) => {
                warn!(run_id = %self.run.id(), error = %e, "Deferred result failed, passing the failure on");
                Ok(Some(Value::String(e.to_string())))
            }
            Err(join_error) => Err(AutomatorError::Panicked(join_error.to_string())),
        }
    }

    /// Sleep between steps; a kill cuts the sleep short
    async fn sleep(&self, delay: Duration, reason: SleepReason) {
        if delay.is_zero() {
            return;
        }

        let delay_ms = delay.as_millis() as u64;
        trace_step!(self, delay_ms, "Sleeping");
        self.fire(EventPayload::Sleeping { delay_ms, reason });
        self.run
            .control()
            .unless_killed(tokio::time::sleep(delay))
            .await;
    }

    fn fire(&self, payload: EventPayload) {
        self.event_bus
            .fire(Event::for_run(self.run.id().clone(), payload));
    }

    /// Publish a status snapshot unless a newer run has taken over
    fn publish(&self, phase: RunPhase) {
        let run_id: &RunId = self.run.id();
        self.status.send_if_modified(|status| {
            if status.run_id.as_ref() != Some(run_id) {
                return false;
            }
            *status = self.run.snapshot(phase);
            true
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
