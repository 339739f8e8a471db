//! End-to-end behaviour through the public indicator API.

use std::thread;
use std::time::{Duration, Instant};

use sweepline_core::{IndicatorConfig, IndicatorMode, SweepBar, SweepDirection};
use sweepline_runtime::{LifecycleState, ProgressIndicator, RecordingSurface, SurfaceUpdate};

fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition never held");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn half_value_on_200px_track_walks_to_100px() {
    let (surface, log) = RecordingSurface::new();
    let indicator =
        ProgressIndicator::new(IndicatorConfig::default().with_determinate_rate(0.0), surface)
            .expect("indicator");
    indicator.on_layout(200);
    indicator.set_value(50.0);

    wait_for(|| log.last_width() == Some(100));
    thread::sleep(Duration::from_millis(30));
    indicator.flush().expect("flush");

    let widths = log.determinate_widths();
    let run: Vec<u32> = widths.iter().copied().skip_while(|&w| w != 1).collect();
    assert_eq!(run, (1..=100).collect::<Vec<_>>(), "one pixel per tick, no overshoot");
    assert!(widths.windows(2).all(|w| w[1].abs_diff(w[0]) <= 1));
}

#[test]
fn value_changes_mid_animation_never_snap() {
    let (surface, log) = RecordingSurface::new();
    let indicator =
        ProgressIndicator::new(IndicatorConfig::default().with_determinate_rate(0.2), surface)
            .expect("indicator");
    indicator.on_layout(400);
    indicator.set_value(100.0);
    thread::sleep(Duration::from_millis(20));
    indicator.set_value(10.0);
    wait_for(|| log.last_width() == Some(40));
    indicator.stop();
    indicator.flush().expect("flush");

    let widths = log.determinate_widths();
    let body = &widths[..widths.len() - 1];
    assert!(body.windows(2).all(|w| w[1].abs_diff(w[0]) <= 1), "{body:?}");
}

#[test]
fn sweep_starts_bar_a_then_bar_b() {
    let (surface, log) = RecordingSurface::new();
    let indicator = ProgressIndicator::with_threshold_seed(
        IndicatorConfig::default().with_mode(IndicatorMode::Indeterminate),
        surface,
        42,
    )
    .expect("indicator");
    indicator.flush().expect("flush");
    log.clear();
    indicator.on_layout(300);

    wait_for(|| !log.sweep_frames(SweepBar::B).is_empty());
    indicator.stop();
    indicator.flush().expect("flush");

    let updates = log.updates();
    let first_a = updates
        .iter()
        .position(|u| matches!(u, SurfaceUpdate::Sweep { bar: SweepBar::A, .. }))
        .expect("bar A frame");
    let first_b = updates
        .iter()
        .position(|u| matches!(u, SurfaceUpdate::Sweep { bar: SweepBar::B, .. }))
        .expect("bar B frame");
    assert!(first_a < first_b);

    // B starts once A is at least half way: A's x has passed its midpoint.
    let a_before_b: Vec<f32> = updates[..first_b]
        .iter()
        .filter_map(|u| match u {
            SurfaceUpdate::Sweep {
                bar: SweepBar::A,
                geometry,
            } => Some(geometry.x_px),
            _ => None,
        })
        .collect();
    let midpoint = (-150.0 + 300.0 * 1.4) / 2.0;
    assert!(a_before_b.last().copied().unwrap_or(f32::MIN) > midpoint);
}

#[test]
fn rtl_sweep_enters_from_the_right() {
    let (surface, log) = RecordingSurface::new();
    let indicator = ProgressIndicator::new(
        IndicatorConfig::default()
            .with_mode(IndicatorMode::Indeterminate)
            .with_sweep_direction(SweepDirection::Rtl),
        surface,
    )
    .expect("indicator");
    indicator.flush().expect("flush");
    log.clear();
    indicator.on_layout(200);
    wait_for(|| log.sweep_frames(SweepBar::A).len() > 3);
    indicator.stop();
    indicator.flush().expect("flush");

    let a = log.sweep_frames(SweepBar::A);
    assert_eq!(a[0].x_px, 200.0);
    assert!(a[1].x_px < 200.0);
}

#[test]
fn surface_panic_stops_engine_without_reaching_host() {
    let (surface, _log) = RecordingSurface::new();
    let indicator = ProgressIndicator::new(
        IndicatorConfig::default().with_determinate_rate(0.0),
        surface.panicking_after(10),
    )
    .expect("indicator");
    indicator.on_layout(100);
    indicator.set_value(100.0);

    wait_for(|| indicator.state() == LifecycleState::Stopped);
    let stats = indicator.engine_stats();
    assert_eq!(stats.faulted, 1);
    assert_eq!(stats.live, 0);

    // The indicator stays usable.
    indicator.set_mode(IndicatorMode::Indeterminate);
    assert_eq!(indicator.mode(), IndicatorMode::Indeterminate);
}

#[test]
fn show_plays_reveal_and_hide_collapses() {
    let (surface, log) = RecordingSurface::new();
    let indicator = ProgressIndicator::new(IndicatorConfig::default(), surface).expect("indicator");
    indicator.show(false);
    thread::sleep(Duration::from_millis(400));
    indicator.flush().expect("flush");
    assert_eq!(log.visibility().last().copied(), Some(0.0));

    log.clear();
    indicator.on_layout(100);
    indicator.show(true);
    thread::sleep(Duration::from_millis(400));
    indicator.flush().expect("flush");
    let scales = log.visibility();
    assert_eq!(scales.first().copied(), Some(0.0));
    assert_eq!(scales.last().copied(), Some(1.0));
    assert!(matches!(indicator.state(), LifecycleState::Running(_)));
}
