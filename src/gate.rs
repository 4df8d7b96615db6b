//! Cooperative wait for templates that are still compiling
//!
//! The gate never blocks on a thread. It hands control to the host's
//! [`EventPump`] one slice at a time so that asynchronous compilation (and
//! anything else queued on the host loop) can make progress, and re-checks
//! the template after each slice.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::engine::CompileStatus;
use crate::template::TemplateHandle;

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_POLL_SLICE: Duration = Duration::from_millis(10);
/// Smallest slice the gate will charge, so a wait always accumulates time
pub const MIN_POLL_SLICE: Duration = Duration::from_millis(1);

/// The host's event loop, driven in bounded slices
pub trait EventPump {
    /// Process pending events for at most `max_slice`, returning the time spent
    fn process_pending_events(&mut self, max_slice: Duration) -> Duration;
}

/// Outcome of waiting on a template
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Ready,
    Error(String),
    Timeout,
}

#[derive(Debug, Clone, Copy)]
pub struct ReadinessGate {
    timeout: Duration,
    slice: Duration,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_READY_TIMEOUT,
            slice: DEFAULT_POLL_SLICE,
        }
    }
}

impl ReadinessGate {
    /// Slices shorter than [`MIN_POLL_SLICE`] are raised to it.
    pub fn new(timeout: Duration, slice: Duration) -> Self {
        Self {
            timeout,
            slice: slice.max(MIN_POLL_SLICE),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn slice(&self) -> Duration {
        self.slice
    }

    /// Wait until `handle` is Ready or Error, or the timeout elapses.
    ///
    /// Terminal handles return without touching the pump. A pump that reports
    /// no elapsed time is charged a full slice so the wait always ends.
    pub fn await_ready(&self, handle: &TemplateHandle, pump: &mut dyn EventPump) -> Readiness {
        let mut waited = Duration::ZERO;
        let mut slices = 0usize;

        loop {
            match handle.status() {
                CompileStatus::Ready => {
                    if slices > 0 {
                        debug!(uri = handle.uri(), slices, ?waited, "template ready");
                    }
                    return Readiness::Ready;
                }
                CompileStatus::Error(detail) => {
                    debug!(uri = handle.uri(), slices, ?waited, "template failed while loading");
                    return Readiness::Error(detail);
                }
                CompileStatus::Loading => {}
            }

            if waited >= self.timeout {
                debug!(uri = handle.uri(), slices, ?waited, "gave up waiting for template");
                return Readiness::Timeout;
            }

            let remaining = self.timeout - waited;
            let elapsed = pump.process_pending_events(self.slice.min(remaining));
            waited += if elapsed.is_zero() { self.slice } else { elapsed };
            slices += 1;
        }
    }
}

type Task = Box<dyn FnOnce()>;

/// A single-threaded task queue standing in for a host event loop.
///
/// Tasks posted while the queue is running are picked up in the same slice
/// if time remains. As a pump it returns as soon as the queue drains after
/// running work, and sleeps out the slice only when there was nothing to do.
#[derive(Default)]
pub struct LocalEventQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl LocalEventQueue {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn post(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run queued tasks until the queue is empty, returning how many ran
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            let Some(task) = task else {
                return ran;
            };
            task();
            ran += 1;
        }
    }
}

impl fmt::Debug for LocalEventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEventQueue")
            .field("pending", &self.len())
            .finish()
    }
}

impl EventPump for Rc<LocalEventQueue> {
    fn process_pending_events(&mut self, max_slice: Duration) -> Duration {
        let start = Instant::now();
        let mut ran = 0usize;
        while start.elapsed() < max_slice {
            let task = self.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => {
                    if ran == 0 {
                        std::thread::sleep(max_slice - start.elapsed().min(max_slice));
                    }
                    break;
                }
            }
        }
        start.elapsed()
    }
}

/// Pump for hosts without an event loop: it only lets time pass
#[derive(Debug, Default, Clone, Copy)]
pub struct SleepPump;

impl EventPump for SleepPump {
    fn process_pending_events(&mut self, max_slice: Duration) -> Duration {
        std::thread::sleep(max_slice);
        max_slice
    }
}
