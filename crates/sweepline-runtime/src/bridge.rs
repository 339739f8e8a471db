#![forbid(unsafe_code)]

//! Render bridge and UI context.
//!
//! The [`UiContext`] is a dedicated thread that owns the host [`Surface`]
//! and executes [`UiCommand`]s in FIFO order. Engine threads never touch the
//! surface; they hand updates to a [`RenderBridge`], which forwards them to
//! the UI context.
//!
//! # Slot gates
//!
//! Each bar slot (determinate, sweep A, sweep B) has a gate. A driver must
//! acquire the slot's gate before queueing an update, and the UI context
//! releases it once the update has been applied. A driver therefore never has
//! two updates for the same slot in flight, and a slow surface throttles the
//! driver instead of growing the queue without bound. Gate waits poll the
//! driver's [`StopSignal`] so that joining an engine never deadlocks against
//! a busy UI context.
//!
//! Surface panics are caught on the UI context. A panic while applying a
//! gated update is recorded on the slot's gate and returned to the driver as
//! [`BridgeError::SurfaceFault`] on its next apply.
//!
//! # Visibility
//!
//! Show/hide scale animations run on the UI context itself: while one is
//! active, the command loop wakes every frame to advance it.

use std::fmt;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use sweepline_core::animation::{Clock, Easing, Timeline, lerp};

use crate::engine::{EngineExit, StopSignal, panic_message};
use crate::surface::{BarSlot, Surface, SurfaceUpdate};

/// Duration of the show/hide scale animation.
pub const VISIBILITY_DURATION: Duration = Duration::from_millis(300);

/// Frame period of the UI context while a visibility animation runs.
const UI_FRAME: Duration = Duration::from_millis(16);

/// How long a gate wait sleeps between stop-signal checks.
const GATE_POLL: Duration = Duration::from_millis(2);

/// Errors returned by [`RenderBridge`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The caller's stop signal fired while waiting on a gate.
    Cancelled,
    /// The UI context has shut down.
    Disconnected,
    /// The surface panicked while applying an update for this slot.
    SurfaceFault(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("bridge wait cancelled"),
            Self::Disconnected => f.write_str("ui context disconnected"),
            Self::SurfaceFault(msg) => write!(f, "surface fault: {msg}"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<BridgeError> for EngineExit {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Cancelled => EngineExit::Cancelled,
            BridgeError::Disconnected => EngineExit::Disconnected,
            BridgeError::SurfaceFault(msg) => EngineExit::Faulted(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct GateState {
    in_flight: bool,
    epoch: u64,
    fault: Option<String>,
}

#[derive(Debug, Default)]
struct Gate {
    state: Mutex<GateState>,
    cvar: Condvar,
}

impl Gate {
    /// Wait until the slot is free, then claim it. Returns the claim's epoch.
    fn acquire(&self, stop: &StopSignal) -> Result<u64, BridgeError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(msg) = state.fault.take() {
                return Err(BridgeError::SurfaceFault(msg));
            }
            if !state.in_flight {
                state.in_flight = true;
                return Ok(state.epoch);
            }
            if stop.is_stopped() {
                return Err(BridgeError::Cancelled);
            }
            let (guard, _) = self
                .cvar
                .wait_timeout(state, GATE_POLL)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    /// Release a claim. Claims from before the last [`reset`](Self::reset)
    /// are ignored.
    fn release(&self, epoch: u64, fault: Option<String>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.epoch != epoch {
            return;
        }
        state.in_flight = false;
        if fault.is_some() {
            state.fault = fault;
        }
        self.cvar.notify_all();
    }

    fn take_fault(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fault
            .take()
    }

    fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.epoch = state.epoch.wrapping_add(1);
        state.in_flight = false;
        state.fault = None;
        self.cvar.notify_all();
    }
}

type Gates = Arc<[Gate; BarSlot::COUNT]>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Work executed on the UI context.
#[derive(Debug)]
pub(crate) enum UiCommand {
    /// Gated bar update from an engine.
    Apply {
        slot: BarSlot,
        epoch: u64,
        update: SurfaceUpdate,
    },
    /// Ungated update from the controller.
    Post(SurfaceUpdate),
    /// Start a visibility scale animation.
    AnimateVisibility {
        from: f32,
        to: f32,
        duration: Duration,
    },
    /// Acknowledge once every earlier command has run.
    Flush(Sender<()>),
    Shutdown,
}

// ---------------------------------------------------------------------------
// UI context
// ---------------------------------------------------------------------------

/// The thread that owns the surface.
pub struct UiContext {
    sender: Sender<UiCommand>,
    gates: Gates,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl fmt::Debug for UiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiContext")
            .field("thread_id", &self.thread_id)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl UiContext {
    /// Spawn the UI context thread, moving `surface` onto it.
    pub fn spawn(surface: Box<dyn Surface>) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let gates: Gates = Arc::new(Default::default());
        let loop_gates = Arc::clone(&gates);
        let handle = thread::Builder::new()
            .name("sweepline-ui".into())
            .spawn(move || ui_loop(surface, receiver, loop_gates))?;
        let thread_id = handle.thread().id();
        Ok(Self {
            sender,
            gates,
            thread_id,
            handle: Some(handle),
        })
    }

    /// A bridge that feeds this context.
    pub fn bridge(&self) -> RenderBridge {
        RenderBridge {
            sender: self.sender.clone(),
            gates: Arc::clone(&self.gates),
            ui_thread: self.thread_id,
        }
    }

    /// Id of the UI context thread.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Run every queued command, then stop the thread and join it.
    pub fn shutdown(&mut self) {
        let _ = self.sender.send(UiCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            let _ = handle.join();
        }
    }
}

impl Drop for UiContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Reveal {
    from: f32,
    to: f32,
    clock: Clock,
    last: Instant,
    next_frame: Instant,
}

impl Reveal {
    fn new(from: f32, to: f32, duration: Duration) -> Self {
        let now = Instant::now();
        Self {
            from,
            to,
            clock: Clock::new(duration).with_easing(Easing::EaseInOut),
            last: now,
            next_frame: now + UI_FRAME,
        }
    }

    /// Advance to `now` and return the scale for this frame.
    fn frame(&mut self, now: Instant) -> f32 {
        self.clock.advance(now.saturating_duration_since(self.last));
        self.last = now;
        self.next_frame = now + UI_FRAME;
        lerp(self.from, self.to, self.clock.progress())
    }
}

fn ui_loop(mut surface: Box<dyn Surface>, receiver: Receiver<UiCommand>, gates: Gates) {
    let mut reveal: Option<Reveal> = None;

    loop {
        let command = if let Some(active) = &reveal {
            let wait = active.next_frame.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(wait) {
                Ok(cmd) => Some(cmd),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match receiver.recv() {
                Ok(cmd) => Some(cmd),
                Err(_) => break,
            }
        };

        // Commands arriving between frames do not advance the reveal.
        let now = Instant::now();
        if let Some(active) = reveal.as_mut()
            && now >= active.next_frame
        {
            let scale_y = active.frame(now);
            apply_ungated(&mut *surface, SurfaceUpdate::Visibility { scale_y });
            if active.clock.is_finished() {
                reveal = None;
            }
        }

        let Some(command) = command else { continue };
        match command {
            UiCommand::Apply {
                slot,
                epoch,
                update,
            } => {
                let fault = catch_unwind(AssertUnwindSafe(|| surface.apply(update)))
                    .err()
                    .map(panic_message);
                if let Some(msg) = &fault {
                    tracing::error!(?slot, error = %msg, "surface panicked applying update");
                }
                gates[slot.index()].release(epoch, fault);
            }
            UiCommand::Post(update) => apply_ungated(&mut *surface, update),
            UiCommand::AnimateVisibility { from, to, duration } => {
                apply_ungated(&mut *surface, SurfaceUpdate::Visibility { scale_y: from });
                reveal = Some(Reveal::new(from, to, duration));
            }
            UiCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            UiCommand::Shutdown => break,
        }
    }

    // Outstanding claims can never be released now.
    for gate in gates.iter() {
        gate.reset();
    }
    tracing::debug!("ui context stopped");
}

fn apply_ungated(surface: &mut dyn Surface, update: SurfaceUpdate) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| surface.apply(update))) {
        tracing::error!(error = %panic_message(payload), "surface panicked applying update");
    }
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Sending side of the UI context.
#[derive(Clone)]
pub struct RenderBridge {
    sender: Sender<UiCommand>,
    gates: Gates,
    ui_thread: ThreadId,
}

impl fmt::Debug for RenderBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBridge")
            .field("ui_thread", &self.ui_thread)
            .finish()
    }
}

impl RenderBridge {
    /// Queue a bar update, waiting until the slot's previous update has been
    /// applied.
    ///
    /// Updates without a slot are posted directly.
    pub fn apply(&self, update: SurfaceUpdate, stop: &StopSignal) -> Result<(), BridgeError> {
        let Some(slot) = update.slot() else {
            return self.post(update);
        };
        let gate = &self.gates[slot.index()];
        let epoch = gate.acquire(stop)?;
        self.sender
            .send(UiCommand::Apply {
                slot,
                epoch,
                update,
            })
            .map_err(|_| {
                gate.release(epoch, None);
                BridgeError::Disconnected
            })
    }

    /// Queue an update without gating. Used by the controller after the
    /// engine has been joined.
    pub fn post(&self, update: SurfaceUpdate) -> Result<(), BridgeError> {
        self.sender
            .send(UiCommand::Post(update))
            .map_err(|_| BridgeError::Disconnected)
    }

    /// Start a visibility scale animation on the UI context.
    pub fn animate_visibility(
        &self,
        from: f32,
        to: f32,
        duration: Duration,
    ) -> Result<(), BridgeError> {
        self.sender
            .send(UiCommand::AnimateVisibility { from, to, duration })
            .map_err(|_| BridgeError::Disconnected)
    }

    /// Block until every command queued before this call has run.
    ///
    /// Returns immediately when called on the UI context itself.
    pub fn flush(&self) -> Result<(), BridgeError> {
        if self.is_ui_thread() {
            return Ok(());
        }
        let (ack, done) = mpsc::channel();
        self.sender
            .send(UiCommand::Flush(ack))
            .map_err(|_| BridgeError::Disconnected)?;
        done.recv().map_err(|_| BridgeError::Disconnected)
    }

    /// Take a fault recorded for `slot` since its last apply.
    pub fn take_fault(&self, slot: BarSlot) -> Option<String> {
        self.gates[slot.index()].take_fault()
    }

    /// Forget outstanding claims and faults on every slot.
    ///
    /// Called before a new engine starts so that it does not inherit the
    /// previous engine's state.
    pub fn reset_gates(&self) {
        for gate in self.gates.iter() {
            gate.reset();
        }
    }

    /// Whether the current thread is the UI context.
    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }
}
