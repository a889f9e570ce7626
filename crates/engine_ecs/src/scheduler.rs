//! Frame scheduler driving the per-frame system lifecycle.
//!
//! One call to [`World::tick`] runs one frame:
//!
//! 1. **Initialization pass.** Every system still awaiting `initialize` gets
//!    one attempt, in registration order. A failure is retried next frame
//!    until the configured attempt limit, after which the system is
//!    permanently deactivated.
//! 2. **Update phase.** The active `Update` systems run in
//!    `(priority, registration order)`. Each runs its opening hook, `update`,
//!    then its closing hook.
//! 3. **Draw phase.** The same, for `Draw` systems, strictly after every
//!    `Update` system has finished.
//!
//! The order of both phases is copied once, after the initialization pass.
//! Priority changes, registrations and removals made by a hook take effect
//! from the next frame, whichever phase they touch.
//!
//! A failing hook aborts only that system's remaining hooks for the frame.
//! The failure is logged, recorded with the system's identity and the frame
//! number, and the phase continues with the next system.
//!
//! Execution is single-threaded and synchronous. Systems are taken out of the
//! registry while their hooks run, which is what lets a hook borrow the
//! world mutably and register or unregister other systems. While a system's
//! hooks run it is the world's current system, and query references taken
//! through [`World::query`] are recorded against it.

use tracing::{debug, error, info, warn};

use crate::config::ClosingHook;
use crate::registry::SystemState;
use crate::system::{Frame, FrameInfo, Hook, Phase, System, SystemId};
use crate::world::World;

/// Failures caught at the scheduler boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// `initialize` returned an error.
    #[error("system '{system}' failed to initialize (attempt {attempt}): {message}")]
    SystemInitFailure {
        /// The system's name.
        system: String,
        /// Attempts made so far, including this one.
        attempt: u32,
        /// The rendered error chain.
        message: String,
    },

    /// A per-frame hook returned an error.
    #[error("system '{system}' failed in {hook}: {message}")]
    HookFailure {
        /// The system's name.
        system: String,
        /// The hook that failed.
        hook: Hook,
        /// The rendered error chain.
        message: String,
    },
}

/// One misbehaving system in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    /// Frame in which the failure happened.
    pub frame: u64,
    /// The offending system.
    pub system: SystemId,
    /// What went wrong.
    pub error: SchedulerError,
    /// `true` if the system has been permanently deactivated.
    pub fatal: bool,
}

/// Outcome of one [`World::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// The frame counter.
    pub frame: u64,
    /// Systems that became active during this frame's initialization pass.
    pub initialized: usize,
    /// Systems whose per-frame cycle was started.
    pub systems_run: usize,
    /// Failures recorded during this frame.
    pub failures: Vec<FailureReport>,
}

impl FrameReport {
    /// Returns `true` if no system failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Scheduler bookkeeping held by the world.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    pub(crate) frame: u64,
    pub(crate) in_frame: bool,
    /// The system whose hooks are running, if any.
    pub(crate) current: Option<SystemId>,
    /// Failures not yet collected with `World::take_failures`.
    pub(crate) failures: Vec<FailureReport>,
}

impl World {
    /// Run one frame.
    ///
    /// `elapsed_ms` and `delta` are computed by the host and passed through
    /// to every hook untouched.
    pub fn tick(&mut self, elapsed_ms: f64, delta: f64) -> FrameReport {
        if self.scheduler.in_frame {
            warn!(frame = self.scheduler.frame, "tick called from inside a frame; ignored");
            return FrameReport {
                frame: self.scheduler.frame,
                ..FrameReport::default()
            };
        }

        self.scheduler.frame += 1;
        self.scheduler.in_frame = true;
        let frame = self.scheduler.frame;
        let mut report = FrameReport {
            frame,
            ..FrameReport::default()
        };
        debug!(frame, elapsed_ms, delta, "frame start");

        self.run_initialization(frame, &mut report);

        let orders = Phase::ALL.map(|phase| (phase, self.systems.snapshot(phase)));
        for (phase, order) in orders {
            debug!(frame, %phase, systems = order.len(), "phase start");
            for id in order {
                let info = FrameInfo {
                    frame,
                    elapsed_ms,
                    delta,
                    phase,
                    system: id,
                };
                self.run_cycle(info, &mut report);
            }
        }

        self.scheduler.in_frame = false;
        for id in self.systems.drain_pending_removals() {
            if let Err(err) = self.remove_system_now(id) {
                debug!(frame, system = %id, %err, "deferred removal skipped");
            }
        }

        self.scheduler.failures.extend(report.failures.iter().cloned());
        report
    }

    fn run_initialization(&mut self, frame: u64, report: &mut FrameReport) {
        let limit = self.config.init_retry_limit.max(1);

        for id in self.systems.pending_init() {
            let Some(mut system) = self.systems.take(id) else {
                continue;
            };
            let name = system.name().to_string();
            self.scheduler.current = Some(id);
            let result = system.initialize(self);
            self.scheduler.current = None;
            let declared = if result.is_ok() {
                system.queries()
            } else {
                Vec::new()
            };
            self.systems.restore(id, system);

            match result {
                Ok(()) => {
                    self.systems.activate(id, declared);
                    report.initialized += 1;
                    info!(frame, system = %id, name = %name, "system initialized");
                }
                Err(err) => {
                    let held = self.systems.take_held(id);
                    self.release_held(id, held);
                    let attempt = self.systems.record_init_failure(id);
                    let fatal = attempt >= limit;
                    let error = SchedulerError::SystemInitFailure {
                        system: name.clone(),
                        attempt,
                        message: format!("{err:#}"),
                    };
                    if fatal {
                        self.systems.mark_failed(id);
                        error!(frame, system = %id, name = %name, attempt, %error, "system permanently deactivated");
                    } else {
                        warn!(frame, system = %id, name = %name, attempt, limit, %error, "system initialization failed; will retry");
                    }
                    report.failures.push(FailureReport {
                        frame,
                        system: id,
                        error,
                        fatal,
                    });
                }
            }
        }
    }

    fn run_cycle(&mut self, info: FrameInfo, report: &mut FrameReport) {
        let id = info.system;
        if self.systems.state(id) != Some(SystemState::Active) {
            return;
        }
        let declared = self.systems.declared(id).to_vec();
        let Some(mut system) = self.systems.take(id) else {
            return;
        };
        report.systems_run += 1;

        let closing = match self.config.closing_hook {
            ClosingHook::PostUpdate => Hook::PostUpdate,
            ClosingHook::RepeatPreUpdate => Hook::PreUpdate,
        };

        let mut failure = None;
        self.scheduler.current = Some(id);
        for hook in [Hook::PreUpdate, Hook::Update, closing] {
            let mut ctx = Frame::begin(self, info, &declared);
            if let Err(err) = call_hook(system.as_mut(), hook, &mut ctx) {
                failure = Some((hook, err));
                break;
            }
        }
        self.scheduler.current = None;
        let name = system.name().to_string();
        self.systems.restore(id, system);

        if let Some((hook, err)) = failure {
            let error = SchedulerError::HookFailure {
                system: name.clone(),
                hook,
                message: format!("{err:#}"),
            };
            warn!(frame = info.frame, phase = %info.phase, system = %id, name = %name, %hook, %error, "hook failed");
            report.failures.push(FailureReport {
                frame: info.frame,
                system: id,
                error,
                fatal: false,
            });
        }
    }
}

fn call_hook(system: &mut dyn System, hook: Hook, ctx: &mut Frame<'_>) -> anyhow::Result<()> {
    match hook {
        Hook::PreUpdate => system.preupdate(ctx),
        Hook::Update => system.update(ctx),
        Hook::PostUpdate => system.postupdate(ctx),
    }
}
