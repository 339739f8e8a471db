//! The facade is enough to drive an indicator end to end.

use std::time::{Duration, Instant};

use sweepline::prelude::*;
use sweepline::{ConfigError, RecordingSurface};

fn build(config: IndicatorConfig) -> Result<(ProgressIndicator, sweepline::SurfaceLog)> {
    let (surface, log) = RecordingSurface::new();
    let indicator = ProgressIndicator::new(config, surface)?;
    Ok((indicator, log))
}

#[test]
fn invalid_config_maps_to_facade_error() {
    let err = build(IndicatorConfig::default().with_range(10.0, 0.0)).expect_err("inverted");
    match err {
        Error::InvalidConfig(errors) => {
            assert!(matches!(errors[0], ConfigError::InvalidRange { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn setter_errors_convert_with_question_mark() {
    fn widen(indicator: &ProgressIndicator) -> Result<()> {
        indicator.set_max_value(-5.0)?;
        Ok(())
    }
    let (indicator, _log) = build(IndicatorConfig::default()).expect("indicator");
    assert!(matches!(widen(&indicator), Err(Error::Config(_))));
}

#[test]
fn env_config_drives_indicator() {
    let parse = IndicatorConfig::from_env_with(|key| match key {
        "SWEEPLINE_MODE" => Some("indeterminate".to_string()),
        "SWEEPLINE_INDETERMINATE_RATE_MS" => Some("400".to_string()),
        "SWEEPLINE_SWEEP_RTL" => Some("1".to_string()),
        _ => None,
    });
    assert!(parse.errors.is_empty());
    let (indicator, log) = build(parse.config).expect("indicator");
    assert_eq!(indicator.mode(), IndicatorMode::Indeterminate);
    assert!(indicator.is_sweep_rtl());
    assert_eq!(indicator.indeterminate_rate(), 400);

    indicator.on_layout(160);
    let deadline = Instant::now() + Duration::from_secs(5);
    while log.sweep_frames(sweepline::SweepBar::A).len() < 3 {
        assert!(Instant::now() < deadline);
        std::thread::sleep(Duration::from_millis(2));
    }
    indicator.stop();
    assert_eq!(indicator.state(), LifecycleState::Stopped);
}
