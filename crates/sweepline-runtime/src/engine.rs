#![forbid(unsafe_code)]

//! Engine threads and cooperative cancellation.
//!
//! Every driver runs on its own background thread, wrapped in an
//! [`EngineHandle`]. The handle owns the thread and a [`StopTrigger`]; the
//! driver receives the matching [`StopSignal`] and must check it at least once
//! per tick or frame.
//!
//! Stopping is always *trigger, then join*: [`EngineHandle::stop`] returns
//! only after the thread has exited, so the lifecycle controller can create a
//! replacement without two drivers ever writing the same bars.
//!
//! [`EngineStats`] counts engine bodies as they enter and leave, from inside
//! the engine thread, so the peak count reflects real overlap.

use std::fmt;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sweepline_core::IndicatorMode;

// ---------------------------------------------------------------------------
// Stop signal
// ---------------------------------------------------------------------------

type StopCell = Arc<(Mutex<bool>, Condvar)>;

/// Driver side of an engine's cancellation flag.
#[derive(Clone)]
pub struct StopSignal {
    inner: StopCell,
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl StopSignal {
    /// Create a new (signal, trigger) pair.
    pub fn new() -> (Self, StopTrigger) {
        let inner: StopCell = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Self {
            inner: Arc::clone(&inner),
        };
        (signal, StopTrigger { inner })
    }

    /// Whether the trigger has fired.
    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for `duration` or until stopped, whichever comes first.
    ///
    /// Returns `true` if stopped. Spurious wakeups are absorbed by
    /// re-waiting for the remaining time.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(|e| e.into_inner());
        if *stopped {
            return true;
        }
        if duration.is_zero() {
            return false;
        }

        let start = Instant::now();
        let mut remaining = duration;
        loop {
            let (guard, result) = cvar
                .wait_timeout(stopped, remaining)
                .unwrap_or_else(|e| e.into_inner());
            stopped = guard;
            if *stopped {
                return true;
            }
            if result.timed_out() {
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return false;
            }
            remaining = duration - elapsed;
        }
    }
}

/// Controller side of an engine's cancellation flag.
pub struct StopTrigger {
    inner: StopCell,
}

impl StopTrigger {
    /// Raise the flag and wake any timed wait.
    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(|e| e.into_inner());
        *stopped = true;
        cvar.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Exit reasons
// ---------------------------------------------------------------------------

/// Why an engine thread ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineExit {
    /// The stop signal was observed.
    Cancelled,
    /// A tick panicked or the surface reported a fault.
    Faulted(String),
    /// The UI context went away.
    Disconnected,
}

impl EngineExit {
    /// Whether the engine ended because of a fault rather than a request.
    pub fn is_fault(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for EngineExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::Faulted(msg) => write!(f, "faulted: {msg}"),
            Self::Disconnected => f.write_str("ui context disconnected"),
        }
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one tick, converting a panic into an error message.
pub(crate) fn contain_tick<T>(tick: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(tick)).map_err(panic_message)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Engine instrumentation shared by every engine of one indicator.
#[derive(Debug, Default)]
pub struct EngineStats {
    live: AtomicUsize,
    peak: AtomicUsize,
    started: AtomicU64,
    finished: AtomicU64,
    faulted: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatsSnapshot {
    /// Engine bodies currently executing.
    pub live: usize,
    /// Highest `live` value ever observed.
    pub peak: usize,
    /// Engine bodies entered.
    pub started: u64,
    /// Engine bodies exited, for any reason.
    pub finished: u64,
    /// Engine bodies that exited with a fault.
    pub faulted: u64,
}

impl EngineStats {
    /// Current counters.
    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            live: self.live.load(Ordering::Acquire),
            peak: self.peak.load(Ordering::Acquire),
            started: self.started.load(Ordering::Acquire),
            finished: self.finished.load(Ordering::Acquire),
            faulted: self.faulted.load(Ordering::Acquire),
        }
    }

    fn enter(&self) -> LiveGuard<'_> {
        let now = self.live.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        self.started.fetch_add(1, Ordering::AcqRel);
        LiveGuard { stats: self }
    }

    fn record_exit(&self, exit: &EngineExit) {
        if exit.is_fault() {
            self.faulted.fetch_add(1, Ordering::AcqRel);
        }
    }
}

struct LiveGuard<'a> {
    stats: &'a EngineStats,
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.stats.live.fetch_sub(1, Ordering::AcqRel);
        self.stats.finished.fetch_add(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// Engine handle
// ---------------------------------------------------------------------------

/// A running engine thread.
pub struct EngineHandle {
    id: u64,
    mode: IndicatorMode,
    trigger: StopTrigger,
    thread: Option<JoinHandle<EngineExit>>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl EngineHandle {
    /// Spawn `body` on a named engine thread.
    pub fn spawn<F>(
        id: u64,
        mode: IndicatorMode,
        stats: Arc<EngineStats>,
        body: F,
    ) -> io::Result<Self>
    where
        F: FnOnce(StopSignal) -> EngineExit + Send + 'static,
    {
        let (signal, trigger) = StopSignal::new();
        let thread = thread::Builder::new()
            .name(format!("sweepline-{mode}-{id}"))
            .spawn(move || {
                let _live = stats.enter();
                let exit = contain_tick(|| body(signal))
                    .unwrap_or_else(EngineExit::Faulted);
                stats.record_exit(&exit);
                exit
            })?;

        tracing::debug!(engine_id = id, %mode, "engine spawned");
        Ok(Self {
            id,
            mode,
            trigger,
            thread: Some(thread),
        })
    }

    /// Engine id, unique per indicator.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mode the engine was started for.
    pub fn mode(&self) -> IndicatorMode {
        self.mode
    }

    /// Whether the thread has already exited on its own.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Trigger the stop signal and join the thread.
    pub fn stop(mut self) -> EngineExit {
        self.trigger.stop();
        self.join()
    }

    fn join(&mut self) -> EngineExit {
        let exit = match self.thread.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|payload| EngineExit::Faulted(panic_message(payload))),
            None => EngineExit::Cancelled,
        };
        tracing::debug!(engine_id = self.id, mode = %self.mode, %exit, "engine joined");
        exit
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.trigger.stop();
        // Not joined here; owners that need the guarantee call `stop()`.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_signal_starts_clear() {
        let (signal, _trigger) = StopSignal::new();
        assert!(!signal.is_stopped());
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn trigger_wakes_timed_wait() {
        let (signal, trigger) = StopSignal::new();
        let waiter = thread::spawn(move || signal.wait_timeout(Duration::from_secs(10)));
        thread::sleep(Duration::from_millis(10));
        trigger.stop();
        assert!(waiter.join().expect("waiter thread"));
    }

    #[test]
    fn zero_wait_only_polls() {
        let (signal, trigger) = StopSignal::new();
        assert!(!signal.wait_timeout(Duration::ZERO));
        trigger.stop();
        assert!(signal.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn stop_joins_and_reports_cancelled() {
        let stats = Arc::new(EngineStats::default());
        let engine = EngineHandle::spawn(1, IndicatorMode::Determinate, stats.clone(), |stop| {
            while !stop.wait_timeout(Duration::from_millis(1)) {}
            EngineExit::Cancelled
        })
        .expect("spawn");
        assert_eq!(engine.stop(), EngineExit::Cancelled);

        let snap = stats.snapshot();
        assert_eq!(snap.live, 0);
        assert_eq!(snap.started, 1);
        assert_eq!(snap.finished, 1);
        assert_eq!(snap.faulted, 0);
    }

    #[test]
    fn panicking_body_is_contained() {
        let stats = Arc::new(EngineStats::default());
        let engine = EngineHandle::spawn(2, IndicatorMode::Indeterminate, stats.clone(), |_| {
            panic!("tick exploded")
        })
        .expect("spawn");
        match engine.stop() {
            EngineExit::Faulted(msg) => assert!(msg.contains("tick exploded")),
            other => panic!("unexpected exit: {other:?}"),
        }
        assert_eq!(stats.snapshot().faulted, 1);
        assert_eq!(stats.snapshot().live, 0);
    }

    #[test]
    fn sequential_engines_never_overlap() {
        let stats = Arc::new(EngineStats::default());
        for id in 0..5 {
            let engine = EngineHandle::spawn(id, IndicatorMode::Determinate, stats.clone(), |stop| {
                while !stop.wait_timeout(Duration::from_millis(1)) {}
                EngineExit::Cancelled
            })
            .expect("spawn");
            thread::sleep(Duration::from_millis(2));
            engine.stop();
        }
        let snap = stats.snapshot();
        assert_eq!(snap.peak, 1);
        assert_eq!(snap.started, 5);
        assert_eq!(snap.finished, 5);
    }

    #[test]
    fn panic_message_formats() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic");
    }
}
