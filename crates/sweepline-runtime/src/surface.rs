#![forbid(unsafe_code)]

//! The host's bar elements.
//!
//! A [`Surface`] is owned by the UI context thread and receives every visual
//! change as a [`SurfaceUpdate`]. Hosts implement it over whatever view
//! objects draw the track and bars.
//!
//! [`RecordingSurface`] is an in-memory implementation for tests and demos.

use std::sync::{Arc, Mutex};

use sweepline_core::{Color, SweepBar, SweepGeometry};

/// One visual change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceUpdate {
    /// New determinate bar width.
    Determinate { width_px: u32 },
    /// New placement for one sweep bar.
    Sweep { bar: SweepBar, geometry: SweepGeometry },
    /// Vertical scale of the whole indicator (show/hide animation).
    Visibility { scale_y: f32 },
    /// Paint for the bars and the track behind them.
    Colors { bar: Color, track: Color },
}

impl SurfaceUpdate {
    /// The bar slot this update writes, if it writes a bar.
    pub fn slot(&self) -> Option<BarSlot> {
        match self {
            Self::Determinate { .. } => Some(BarSlot::Determinate),
            Self::Sweep { bar, .. } => Some(BarSlot::Sweep(*bar)),
            Self::Visibility { .. } | Self::Colors { .. } => None,
        }
    }
}

/// A bar element that engines write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarSlot {
    Determinate,
    Sweep(SweepBar),
}

impl BarSlot {
    /// Number of distinct slots.
    pub const COUNT: usize = 3;

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Determinate => 0,
            Self::Sweep(SweepBar::A) => 1,
            Self::Sweep(SweepBar::B) => 2,
        }
    }
}

/// Receiver of visual changes. Called only on the UI context thread.
pub trait Surface: Send {
    /// Apply one update to the host elements.
    fn apply(&mut self, update: SurfaceUpdate);
}

impl<F> Surface for F
where
    F: FnMut(SurfaceUpdate) + Send,
{
    fn apply(&mut self, update: SurfaceUpdate) {
        self(update)
    }
}

// ---------------------------------------------------------------------------
// Recording surface
// ---------------------------------------------------------------------------

/// Shared view of everything a [`RecordingSurface`] received.
#[derive(Debug, Clone, Default)]
pub struct SurfaceLog {
    updates: Arc<Mutex<Vec<SurfaceUpdate>>>,
}

impl SurfaceLog {
    fn push(&self, update: SurfaceUpdate) {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(update);
    }

    /// All updates in application order.
    pub fn updates(&self) -> Vec<SurfaceUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of updates received.
    pub fn len(&self) -> usize {
        self.updates.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing was received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything received so far.
    pub fn clear(&self) {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Determinate widths in order.
    pub fn determinate_widths(&self) -> Vec<u32> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                SurfaceUpdate::Determinate { width_px } => Some(width_px),
                _ => None,
            })
            .collect()
    }

    /// Geometry frames applied to `bar`, in order.
    pub fn sweep_frames(&self, bar: SweepBar) -> Vec<SweepGeometry> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                SurfaceUpdate::Sweep { bar: b, geometry } if b == bar => Some(geometry),
                _ => None,
            })
            .collect()
    }

    /// Visibility scales in order.
    pub fn visibility(&self) -> Vec<f32> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                SurfaceUpdate::Visibility { scale_y } => Some(scale_y),
                _ => None,
            })
            .collect()
    }

    /// Color pairs `(bar, track)` in order.
    pub fn colors(&self) -> Vec<(Color, Color)> {
        self.updates()
            .into_iter()
            .filter_map(|u| match u {
                SurfaceUpdate::Colors { bar, track } => Some((bar, track)),
                _ => None,
            })
            .collect()
    }

    /// Last determinate width, if any.
    pub fn last_width(&self) -> Option<u32> {
        self.determinate_widths().last().copied()
    }
}

/// A [`Surface`] that records every update.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    log: SurfaceLog,
    panic_after: Option<usize>,
    applied: usize,
}

impl RecordingSurface {
    /// A recording surface and a handle to read what it received.
    pub fn new() -> (Self, SurfaceLog) {
        let surface = Self::default();
        let log = surface.log.clone();
        (surface, log)
    }

    /// Panic on every bar update after `n` have been applied (builder).
    ///
    /// Visibility and color updates are never faulted.
    #[must_use]
    pub fn panicking_after(mut self, n: usize) -> Self {
        self.panic_after = Some(n);
        self
    }
}

impl Surface for RecordingSurface {
    fn apply(&mut self, update: SurfaceUpdate) {
        if update.slot().is_some() {
            if let Some(limit) = self.panic_after
                && self.applied >= limit
            {
                panic!("surface rejected update #{}", self.applied);
            }
            self.applied += 1;
        }
        self.log.push(update);
    }
}
