#![forbid(unsafe_code)]

//! Sweepline Runtime
//!
//! Runs the progress indicator: one engine thread at a time animates the bars,
//! and a dedicated UI context thread applies every change to the host
//! surface.
//!
//! # Key Components
//!
//! - [`ProgressIndicator`] - Host-facing handle; all setters and callbacks
//! - [`Lifecycle`] - Start/stop/restart state machine owning the engine
//! - [`EngineHandle`] / [`StopSignal`] - Engine thread with cooperative stop
//! - [`run_determinate`] - One-pixel-per-tick width driver
//! - [`run_indeterminate`] - Two-bar leapfrogging sweep driver
//! - [`UiContext`] / [`RenderBridge`] - Surface thread and gated delivery
//! - [`Surface`] - Trait the host implements over its bar elements

pub mod bridge;
pub mod determinate;
pub mod engine;
pub mod error;
pub mod indeterminate;
pub mod indicator;
pub mod lifecycle;
pub mod surface;

pub use bridge::{BridgeError, RenderBridge, UiContext, VISIBILITY_DURATION};
pub use determinate::{DeterminateDriver, run_determinate};
pub use engine::{
    EngineExit, EngineHandle, EngineStats, EngineStatsSnapshot, StopSignal, StopTrigger,
};
pub use error::IndicatorError;
pub use indeterminate::{
    CycleSettings, FRAME_PERIOD, IndeterminateDriver, SweepCycle, SweepFrame, SweepPhase,
    run_indeterminate,
};
pub use indicator::ProgressIndicator;
pub use lifecycle::{Lifecycle, LifecycleState, StartError, StopReason};
pub use surface::{BarSlot, RecordingSurface, Surface, SurfaceLog, SurfaceUpdate};
