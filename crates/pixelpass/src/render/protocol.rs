use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{RenderError, RenderResult};

/// How long a client waits for the render thread before declaring it hung.
pub(crate) const RENDEZVOUS_TIMEOUT: Duration = Duration::from_secs(4);

/// One client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request {
    /// Run one render pass.
    Render,
    /// Read the current output target back; no new pass.
    Read,
}

/// What the worker hands back for a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Done,
    Bytes(Vec<u8>),
}

/// Snapshot returned to the worker together with a taken request.
#[derive(Debug)]
pub(crate) enum WorkerWake {
    Request {
        request: Request,
        accumulate: bool,
        reset_frames: bool,
    },
    /// Idle tick with no traffic; time for housekeeping.
    Idle,
    Shutdown,
}

#[derive(Default)]
struct ProtocolState {
    /// Single request slot; `None` while idle.
    request: Option<Request>,
    /// Result slot for the request most recently taken.
    outcome: Option<RenderResult<Outcome>>,
    /// One-shot init handshake result.
    init: Option<RenderResult<()>>,
    /// True between a successful start and shutdown.
    alive: bool,
    /// Accumulation toggle, applied by the worker before its next pass.
    accumulate: bool,
    /// Set whenever the accumulation toggle is touched; resets the frame
    /// counter on the worker side.
    reset_frames: bool,
    /// The protocol broke down; all further traffic fails with this.
    fatal: Option<RenderError>,
}

/// Synchronous rendezvous between the client and the render thread.
///
/// A single-slot channel: the client deposits one request and blocks until
/// the worker deposits the outcome. There is never more than one request in
/// flight. A timeout poisons the protocol; a hung render thread is never
/// waited on twice.
pub(crate) struct Protocol {
    state: Mutex<ProtocolState>,
    /// Wakes the worker: request deposited, or shutdown.
    work: Condvar,
    /// Wakes clients: init finished or an outcome deposited.
    done: Condvar,
    timeout: Duration,
}

impl Protocol {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(ProtocolState::default()),
            work: Condvar::new(),
            done: Condvar::new(),
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProtocolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── client side ──────────────────────────────────────────────────────

    /// Marks the protocol live; fails if it already is.
    pub(crate) fn begin_start(&self) -> RenderResult<()> {
        let mut state = self.lock();
        if state.alive {
            return Err(RenderError::protocol("renderer already started"));
        }
        state.alive = true;
        state.init = None;
        state.fatal = None;
        Ok(())
    }

    /// Blocks until the worker posts its one-shot init result.
    ///
    /// Deliberately unbounded: first-time device and shader setup cost is
    /// unbounded, so no timeout applies here.
    pub(crate) fn wait_init(&self) -> RenderResult<()> {
        let mut state = self.lock();
        loop {
            if let Some(result) = state.init.take() {
                if result.is_err() {
                    state.alive = false;
                }
                return result;
            }
            state = self.done.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Deposits `request` and blocks until its outcome arrives.
    pub(crate) fn submit(&self, request: Request) -> RenderResult<Outcome> {
        let mut state = self.lock();
        if let Some(fatal) = &state.fatal {
            return Err(fatal.clone());
        }
        if !state.alive {
            return Err(RenderError::protocol("renderer is not alive"));
        }
        state.request = Some(request);
        state.outcome = None;
        self.work.notify_one();

        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(outcome) = state.outcome.take() {
                return outcome;
            }
            if let Some(fatal) = &state.fatal {
                return Err(fatal.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                // Withdraw the request if the worker never took it, and
                // refuse all further traffic.
                state.request = None;
                let err = RenderError::protocol(format!(
                    "render thread not responding after {:?}",
                    self.timeout
                ));
                state.fatal = Some(err.clone());
                return Err(err);
            }
            let (guard, _) = self
                .done
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Flips the accumulation toggle. The worker picks it up with the next
    /// request and resets its frame counter.
    pub(crate) fn set_accumulate(&self, enable: bool) {
        let mut state = self.lock();
        state.accumulate = enable;
        state.reset_frames = true;
    }

    /// Requests shutdown and wakes everyone.
    pub(crate) fn begin_shutdown(&self) {
        let mut state = self.lock();
        state.alive = false;
        drop(state);
        self.work.notify_all();
        self.done.notify_all();
    }

    pub(crate) fn is_alive(&self) -> bool {
        let state = self.lock();
        state.alive && state.fatal.is_none()
    }

    // ── worker side ──────────────────────────────────────────────────────

    /// Posts the one-shot init result.
    pub(crate) fn post_init(&self, result: RenderResult<()>) {
        let mut state = self.lock();
        state.init = Some(result);
        drop(state);
        self.done.notify_all();
    }

    /// Blocks for up to `idle` waiting for traffic.
    pub(crate) fn wait_for_work(&self, idle: Duration) -> WorkerWake {
        let mut state = self.lock();
        loop {
            if !state.alive {
                return WorkerWake::Shutdown;
            }
            if let Some(request) = state.request.take() {
                return WorkerWake::Request {
                    request,
                    accumulate: state.accumulate,
                    reset_frames: std::mem::take(&mut state.reset_frames),
                };
            }
            let (guard, timeout) = self
                .work
                .wait_timeout(state, idle)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
            if timeout.timed_out() {
                if state.alive && state.request.is_none() {
                    return WorkerWake::Idle;
                }
                // Traffic raced the timeout; take it on the next spin.
            }
        }
    }

    /// Deposits the outcome of the request most recently taken.
    pub(crate) fn complete(&self, outcome: RenderResult<Outcome>) {
        let mut state = self.lock();
        state.outcome = Some(outcome);
        drop(state);
        self.done.notify_all();
    }

    /// Records an unrecoverable worker failure; the renderer is dead.
    pub(crate) fn fail(&self, error: RenderError) {
        let mut state = self.lock();
        state.alive = false;
        state.fatal = Some(error);
        drop(state);
        self.done.notify_all();
    }
}
