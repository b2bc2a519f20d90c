use super::activity::{Activity, ActivityGraph};
use super::approximate::{DomeModel, HorizontalCandidate, INFEASIBLE_DELAY};
use super::common::math::fmod;
use super::common::target::{Band, DeepDrilling, Target};
use super::config::{ConfigError, ObservatoryConfig, ObservatoryParams, RateWindow};
use super::filter_ledger::{FilterChangeLedger, FilterMagazine};
use super::observatory_state::{AxisSet, FailKind, Position};
use super::sky::{SiteCoordinates, SkyCoordinates, greenwich_mean_sidereal_time, julian_date, timestamp};
use super::ObservatoryModel;
use chrono::{TimeZone, Utc};
use rand::Rng;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

fn model() -> ObservatoryModel { ObservatoryModel::new(&ObservatoryConfig::default()).unwrap() }

fn model_with(config: &ObservatoryConfig) -> ObservatoryModel {
    ObservatoryModel::new(config).unwrap()
}

fn horizontal(alt_deg: f64, az_deg: f64, rot_deg: f64, filter: Band) -> Target {
    Target::horizontal(0, alt_deg.to_radians(), az_deg.to_radians(), rot_deg.to_radians(), filter)
}

fn delay_of(delays: &[(Activity, f64)], activity: Activity) -> f64 {
    delays.iter().find(|(a, _)| *a == activity).map_or(0.0, |(_, d)| *d)
}

fn angle_diff(a: f64, b: f64) -> f64 {
    let d = fmod(a - b, TAU);
    d.min(TAU - d)
}

fn default_ledger(burst: RateWindow, average: RateWindow) -> FilterChangeLedger {
    let magazine = FilterMagazine::new(
        vec![Band::G, Band::R, Band::I, Band::Z, Band::Y],
        vec![Band::U],
    )
    .unwrap();
    FilterChangeLedger::new(burst, average, magazine)
}

#[test]
fn test_default_config_is_valid() {
    let params = ObservatoryParams::try_from(&ObservatoryConfig::default()).unwrap();
    assert!((params.tel_alt_limits.max - 86.5_f64.to_radians()).abs() < 1e-12);
    assert!((params.optics_ol_slope - (1.0 / 3.5) / 1.0_f64.to_radians()).abs() < 1e-9);
    assert_eq!(params.optics_cl_alt_limit.len(), params.optics_cl_delay.len() + 1);
    assert!(ActivityGraph::new(&ObservatoryConfig::default().slew.prerequisites).is_ok());
}

#[test]
fn test_config_defects_are_fatal() {
    let mut missing = ObservatoryConfig::default();
    missing.slew.prerequisites.remove(&Activity::Readout);
    assert_eq!(
        ObservatoryModel::new(&missing).err(),
        Some(ConfigError::MissingPrerequisites(Activity::Readout))
    );

    let mut cyclic = ObservatoryConfig::default();
    cyclic.slew.prerequisites.insert(Activity::TelAlt, vec![Activity::Exposures]);
    assert!(matches!(
        ObservatoryModel::new(&cyclic).err(),
        Some(ConfigError::CyclicPrerequisites(_))
    ));

    let mut limits = ObservatoryConfig::default();
    limits.telescope.altitude_minpos = 90.0;
    assert_eq!(
        ObservatoryModel::new(&limits).err(),
        Some(ConfigError::InvalidAxisLimits("telescope altitude"))
    );

    let mut kinematics = ObservatoryConfig::default();
    kinematics.dome.azimuth_accel = 0.0;
    assert_eq!(
        ObservatoryModel::new(&kinematics).err(),
        Some(ConfigError::InvalidKinematics("dome azimuth"))
    );

    let mut optics = ObservatoryConfig::default();
    optics.optics.cl_delay.push(50.0);
    assert_eq!(ObservatoryModel::new(&optics).err(), Some(ConfigError::InvalidOpticsTable));

    let mut filters = ObservatoryConfig::default();
    filters.camera.filter_unmounted = vec![Band::U, Band::G];
    assert_eq!(ObservatoryModel::new(&filters).err(), Some(ConfigError::InvalidFilterSets));

    let mut park = ObservatoryConfig::default();
    park.park.telescope_altitude = 90.0;
    assert_eq!(
        ObservatoryModel::new(&park).err(),
        Some(ConfigError::ParkOutOfRange("telescope altitude"))
    );
}

#[test]
fn test_ledger_burst_window() {
    let mut ledger = default_ledger(
        RateWindow { count: 2, duration: 100.0 },
        RateWindow { count: 10, duration: 1.0e6 },
    );
    assert!(ledger.is_change_allowed(Band::G, 0.0));
    assert!(ledger.record_if_changed(Band::R, Band::G, 0.0));
    assert!(!ledger.record_if_changed(Band::G, Band::G, 5.0));
    assert!(ledger.is_change_allowed(Band::I, 5.0));
    assert!(ledger.record_if_changed(Band::G, Band::I, 10.0));

    assert!(!ledger.is_change_allowed(Band::R, 50.0));
    assert!(!ledger.is_change_allowed(Band::R, 99.9));
    assert!(ledger.is_change_allowed(Band::R, 100.0));
    assert!(!ledger.is_change_allowed(Band::U, 1000.0));

    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.last_change(), Some(10.0));
    assert_eq!(ledger.delta_since_last(30.0), Some(20.0));
    assert_eq!(ledger.delta_burst(30.0), Some(30.0));
    assert_eq!(ledger.delta_average(30.0), None);
}

#[test]
fn test_ledger_average_window() {
    let mut ledger = default_ledger(
        RateWindow { count: 1, duration: 0.0 },
        RateWindow { count: 3, duration: 1000.0 },
    );
    for t in [0.0, 10.0, 20.0] {
        assert!(ledger.is_change_allowed(Band::G, t));
        ledger.record_if_changed(Band::R, Band::G, t);
    }
    assert!(!ledger.is_change_allowed(Band::G, 500.0));
    assert!(ledger.is_change_allowed(Band::G, 1000.0));
}

#[test]
fn test_ledger_swap() {
    let mut ledger = default_ledger(
        RateWindow { count: 1, duration: 0.0 },
        RateWindow { count: 3000, duration: 1.0 },
    );
    assert!(ledger.swap(Band::Z));
    assert_eq!(ledger.magazine().mounted(), &[Band::G, Band::R, Band::I, Band::Y, Band::U]);
    assert_eq!(ledger.magazine().unmounted(), &[Band::Z]);

    assert!(!ledger.swap(Band::Z));
    assert_eq!(ledger.magazine().unmounted(), &[Band::Z]);

    assert!(ledger.swap(Band::U));
    assert_eq!(ledger.magazine().mounted(), &[Band::G, Band::R, Band::I, Band::Y, Band::Z]);
    assert_eq!(ledger.magazine().unmounted(), &[Band::U]);
}

#[test]
fn test_model_swap_syncs_states() {
    let mut model = model();
    assert!(model.swap_filter(Band::Z));
    assert_eq!(model.current_state().magazine().unmounted(), &[Band::Z]);
    assert_eq!(model.park_state().magazine().unmounted(), &[Band::Z]);
    assert!(!model.swap_filter(Band::Z));
    assert!(model.is_filter_change_allowed(Band::U));
    assert!(!model.is_filter_change_allowed(Band::Z));
}

#[test]
fn test_new_model_is_parked() {
    let model = model();
    let state = model.current_state();
    assert_eq!(state.time(), 0.0);
    assert_eq!(state.filter(), Band::R);
    assert!(!state.is_tracking());
    assert!((state.position().alt - 86.5_f64.to_radians()).abs() < 1e-12);
    assert!((state.axes().dom_alt - FRAC_PI_2).abs() < 1e-12);
    assert!(state.to_string().starts_with("t=0.0 "));
    assert!(state.to_string().ends_with("mounted=[g, r, i, z, y] unmounted=[u]"));
}

#[test]
fn test_slew_altaz_critical_path() {
    let mut model = model();

    let delay = model.commit_slew(&horizontal(80.0, 0.0, 0.0, Band::R));
    assert!((delay - (4.0 + 6.5 / 1.75)).abs() < 1e-6, "delay {delay}");
    assert_eq!(model.critical_path(), vec![Activity::DomAlt]);

    let delays = model.last_slew_delays();
    assert!((delay_of(&delays, Activity::TelAlt) - (2.0 + 3.0 / 3.5)).abs() < 1e-6);
    assert!((delay_of(&delays, Activity::TelSettle) - 3.0).abs() < 1e-12);
    assert!((delay_of(&delays, Activity::TelOpticsOpenLoop) - 6.5 / 3.5).abs() < 1e-6);
    assert!((delay_of(&delays, Activity::Readout) - 2.0).abs() < 1e-12);
    assert_eq!(delay_of(&delays, Activity::TelOpticsClosedLoop), 0.0);
    assert_eq!(delay_of(&delays, Activity::Filter), 0.0);

    let state = model.current_state();
    assert!((state.time() - delay).abs() < 1e-9);
    assert!((state.peak_speeds().tel_alt + 3.5_f64.to_radians()).abs() < 1e-9);
    assert!((state.peak_speeds().dom_alt + 1.75_f64.to_radians()).abs() < 1e-9);
    assert!((state.position().alt - 80.0_f64.to_radians()).abs() < 1e-12);
    assert!(!state.is_tracking());

    let delay = model.commit_slew(&horizontal(70.0, 30.0, 15.0, Band::R));
    assert!((delay - (36.0 + 1.0 + 26.0 / 1.5)).abs() < 1e-6, "delay {delay}");
    assert_eq!(
        model.critical_path(),
        vec![Activity::TelOpticsClosedLoop, Activity::DomAzSettle, Activity::DomAz]
    );
    let axes = model.current_state().axes();
    assert!((axes.tel_az - 30.0_f64.to_radians()).abs() < 1e-9);
    assert!((axes.tel_rot - 15.0_f64.to_radians()).abs() < 1e-9);
    assert!((axes.dom_az - 30.0_f64.to_radians()).abs() < 1e-9);
}

#[test]
fn test_slew_delay_leaves_state_unchanged() {
    let mut model = model();
    model.commit_slew(&horizontal(80.0, 0.0, 0.0, Band::R));
    let before = model.current_state().clone();

    let readout_only = model.slew_delay(&horizontal(80.0, 0.0, 0.0, Band::R));
    assert!(readout_only.is_feasible());
    assert!((readout_only.seconds() - 2.0).abs() < 1e-6);

    let filter_change = model.slew_delay(&horizontal(80.0, 0.0, 0.0, Band::G));
    assert!((filter_change.seconds() - 120.0).abs() < 1e-6);
    assert_eq!(model.critical_path(), vec![Activity::Filter]);

    assert_eq!(model.current_state().position(), before.position());
    assert_eq!(model.current_state().axes(), before.axes());
    assert_eq!(model.filter_change_count(), 0);
}

#[test]
fn test_slew_delay_rejections() {
    let mut model = model();

    let unmounted = model.slew_delay(&horizontal(60.0, 0.0, 0.0, Band::U));
    assert_eq!(unmounted.seconds(), INFEASIBLE_DELAY);
    assert!(unmounted.failures().contains(FailKind::Filter));

    let low = model.slew_delay(&horizontal(10.0, 0.0, 0.0, Band::R));
    assert_eq!(low.seconds(), INFEASIBLE_DELAY);
    assert_eq!(low.failures().iter().collect::<Vec<_>>(), vec![FailKind::AltEmin]);

    let high = model.slew_delay(&horizontal(88.0, 0.0, 0.0, Band::R));
    assert!(high.failures().contains(FailKind::AltEmax));
    assert!(!high.is_feasible());
}

#[test]
fn test_filter_burst_through_model() {
    let mut config = ObservatoryConfig::default();
    config.camera.filter_max_changes_burst_time = 300.0;
    let mut model = model_with(&config);

    let delay = model.commit_slew(&horizontal(80.0, 0.0, 0.0, Band::G));
    assert!((delay - 120.0).abs() < 1e-6);
    assert_eq!(model.filter_change_count(), 1);
    assert_eq!(model.last_filter_change(), Some(0.0));
    assert_eq!(model.current_state().filter(), Band::G);

    let back = horizontal(80.0, 0.0, 0.0, Band::R);
    assert!(model.slew_delay(&back).failures().contains(FailKind::Filter));
    model.advance_to(300.0);
    assert_eq!(model.delta_since_last_filter_change(), Some(300.0));
    assert_eq!(model.delta_burst_window(), Some(300.0));
    assert_eq!(model.delta_average_window(), None);
    let allowed = model.slew_delay(&back);
    assert!(allowed.is_feasible());
    assert!((allowed.seconds() - 120.0).abs() < 1e-6);
}

#[test]
fn test_park_is_idempotent() {
    let mut config = ObservatoryConfig::default();
    config.park.dome_altitude = config.park.telescope_altitude;
    let mut model = model_with(&config);
    model.commit_slew(&horizontal(60.0, 45.0, 10.0, Band::I));
    let delay = model.park();
    assert!(delay > 0.0);

    let state = model.current_state();
    assert_eq!(state.filter(), Band::I);
    assert!((state.position().alt - 86.5_f64.to_radians()).abs() < 1e-12);

    let init = model.current_state().clone();
    let park_pose = horizontal(86.5, 0.0, 0.0, Band::I);
    let position = model.target_position(&park_pose, init.time());
    let mut resolved = model.resolve_pointing(&position, false);
    assert_eq!(resolved.axes(), init.axes());

    let total = model.slew_delay_between(&mut resolved, &init);
    let axis_activities = [
        Activity::TelAlt,
        Activity::TelAz,
        Activity::TelRot,
        Activity::DomAlt,
        Activity::DomAz,
        Activity::DomAzSettle,
        Activity::TelSettle,
    ];
    let delays = model.last_slew_delays();
    for activity in axis_activities {
        assert_eq!(delay_of(&delays, activity), 0.0, "{activity}");
    }
    assert!((total - 2.0).abs() < 1e-12);
    assert_eq!(model.critical_path(), vec![Activity::Readout]);
}

#[test]
fn test_park_then_reset_keeps_filter() {
    let mut model = model();
    model.commit_slew(&horizontal(60.0, 45.0, 10.0, Band::I));
    assert_eq!(model.filter_change_count(), 1);

    model.park();
    assert_eq!(model.park_state().filter(), Band::I);
    assert_eq!(model.current_state().filter(), Band::I);
    assert_eq!(model.filter_change_count(), 1);

    model.reset();
    assert_eq!(model.current_state().filter(), Band::I);
    assert_eq!(model.filter_change_count(), 1);
}

#[test]
fn test_critical_path_is_deterministic() {
    let mut model = model();
    model.commit_slew(&horizontal(45.0, 120.0, -30.0, Band::R));
    let init = model.current_state().clone();
    let position = model.target_position(&horizontal(75.0, -100.0, 40.0, Band::Y), init.time());
    let mut target = model.resolve_pointing(&position, false);
    let mut again = target.clone();

    let first = model.slew_delay_between(&mut target, &init);
    let first_path = model.critical_path();
    let first_delays = model.last_slew_delays();
    let second = model.slew_delay_between(&mut again, &init);

    assert_eq!(first, second);
    assert_eq!(first_path, model.critical_path());
    assert_eq!(first_delays, model.last_slew_delays());
    assert_eq!(target.peak_speeds(), again.peak_speeds());
}

#[test]
fn test_reset_returns_to_park() {
    let mut model = model();
    model.commit_slew(&horizontal(50.0, 90.0, 0.0, Band::G));
    let now = model.current_state().time();
    model.reset();
    let state = model.current_state();
    assert_eq!(state.filter(), Band::R);
    assert_eq!(state.time(), now);
    assert!((state.position().alt - 86.5_f64.to_radians()).abs() < 1e-12);
    assert_eq!(model.filter_change_count(), 2);
}

#[test]
fn test_resolve_pointing_failures() {
    let mut model = model();
    let position = Position {
        alt: 10.0_f64.to_radians(),
        az: 0.0,
        rot: 100.0_f64.to_radians(),
        tracking: true,
        ..Position::at_rest(Band::R)
    };

    let state = model.resolve_pointing(&position, true);
    assert!(!state.is_tracking());
    assert!((state.axes().tel_alt - 20.0_f64.to_radians()).abs() < 1e-12);
    assert!((state.axes().tel_rot - 90.0_f64.to_radians()).abs() < 1e-12);
    let flags = model.current_state().fail_flags();
    assert_eq!(flags.iter().collect::<Vec<_>>(), vec![FailKind::AltEmin, FailKind::RotEmax]);
    assert_eq!(flags.bits(), 2 | 16);

    model.resolve_pointing(&position, true);
    assert_eq!(model.fail_record().count(FailKind::AltEmin), 2);
    assert_eq!(model.fail_record().count(FailKind::RotEmax), 2);
    assert_eq!(model.fail_record().total(), 4);

    let valid = Position { alt: 60.0_f64.to_radians(), ..position };
    let state = model.resolve_pointing(&Position { rot: 0.0, ..valid }, true);
    assert!(state.is_tracking());
    assert!(model.current_state().fail_flags().is_empty());
    assert_eq!(model.fail_record().total(), 4);
}

#[test]
fn test_resolve_pointing_reflects_rotator() {
    let mut model = model();
    let position = Position {
        alt: 60.0_f64.to_radians(),
        rot: 120.0_f64.to_radians(),
        ..Position::at_rest(Band::R)
    };
    let state = model.resolve_pointing(&position, false);
    assert!((state.axes().tel_rot + 60.0_f64.to_radians()).abs() < 1e-9);
    assert!(angle_diff(state.position().ang, state.position().pa - state.axes().tel_rot) < 1e-9);
    assert!(model.current_state().fail_flags().is_empty());
}

#[test]
fn test_tracking_clamps_azimuth_at_cable_wrap() {
    let tracking_at = |az_deg: f64| Position {
        alt: 60.0_f64.to_radians(),
        az: az_deg.to_radians(),
        tracking: true,
        ..Position::at_rest(Band::R)
    };

    let mut east = model();
    let mut west = model();

    east.commit_slew(&horizontal(60.0, 170.0, 0.0, Band::R));
    east.commit_slew(&horizontal(60.0, 260.0, 0.0, Band::R));
    assert!((east.current_state().axes().tel_az - 260.0_f64.to_radians()).abs() < 1e-9);

    let state = east.resolve_pointing(&tracking_at(300.0), true);
    assert!(!state.is_tracking());
    assert!((state.axes().tel_az - 270.0_f64.to_radians()).abs() < 1e-12);
    assert_eq!(east.current_state().fail_flags().iter().collect::<Vec<_>>(), vec![
        FailKind::AzEmax
    ]);

    west.commit_slew(&horizontal(60.0, -170.0, 0.0, Band::R));
    west.commit_slew(&horizontal(60.0, -260.0, 0.0, Band::R));
    assert!((west.current_state().axes().tel_az + 260.0_f64.to_radians()).abs() < 1e-9);

    let state = west.resolve_pointing(&tracking_at(60.0), true);
    assert!(!state.is_tracking());
    assert!((state.axes().tel_az + 270.0_f64.to_radians()).abs() < 1e-12);
    assert!(west.current_state().fail_flags().contains(FailKind::AzEmin));
    assert_eq!(west.fail_record().count(FailKind::AzEmin), 1);

    let state = west.resolve_pointing(&tracking_at(-250.0), true);
    assert!(state.is_tracking());
    assert!((state.axes().tel_az + 250.0_f64.to_radians()).abs() < 1e-9);
}

#[test]
fn test_azimuth_wrap_padding() {
    let mut unpadded = model();
    unpadded.commit_slew(&horizontal(60.0, 170.0, 0.0, Band::R));
    unpadded.commit_slew(&horizontal(60.0, 260.0, 0.0, Band::R));
    assert!((unpadded.current_state().axes().tel_az - 260.0_f64.to_radians()).abs() < 1e-9);

    let mut config = ObservatoryConfig::default();
    config.telescope.azimuth_wrap_padding = 50.0;
    let mut padded = model_with(&config);
    padded.commit_slew(&horizontal(60.0, 170.0, 0.0, Band::R));
    padded.commit_slew(&horizontal(60.0, 260.0, 0.0, Band::R));
    assert!((padded.current_state().axes().tel_az + 100.0_f64.to_radians()).abs() < 1e-9);

    padded.commit_slew(&horizontal(60.0, 200.0, 0.0, Band::R));
    assert!((padded.current_state().axes().tel_az + 160.0_f64.to_radians()).abs() < 1e-9);
    padded.commit_slew(&horizontal(60.0, 250.0, 0.0, Band::R));
    assert!((padded.current_state().axes().tel_az + 110.0_f64.to_radians()).abs() < 1e-9);
}

#[test]
fn test_slew_delay_keeps_fail_flags() {
    let mut model = model();
    let low = Position { alt: 10.0_f64.to_radians(), tracking: true, ..Position::at_rest(Band::R) };
    model.resolve_pointing(&low, true);
    assert_eq!(model.current_state().fail_flags().bits(), FailKind::AltEmin.bit());

    let estimate = model.slew_delay(&horizontal(60.0, 30.0, 0.0, Band::R));
    assert!(estimate.is_feasible());
    assert_eq!(model.current_state().fail_flags().bits(), FailKind::AltEmin.bit());
    assert_eq!(model.fail_record().total(), 1);
}

#[test]
fn test_commit_slew_at_advances_first() {
    let mut model = model();
    let first = model.commit_slew_at(1000.0, &horizontal(80.0, 0.0, 0.0, Band::R));
    assert!((first - (4.0 + 6.5 / 1.75)).abs() < 1e-6);
    assert!((model.current_state().time() - (1000.0 + first)).abs() < 1e-9);

    let second = model.commit_slew_at(10.0, &horizontal(70.0, 0.0, 0.0, Band::R));
    assert!(second >= 36.0);
    assert!((model.current_state().time() - (1000.0 + first + second)).abs() < 1e-9);
}

#[test]
fn test_tracking_keeps_rotator_invariant() {
    let mut model = model();
    let sky = *model.sky();
    let lst = sky.local_sidereal_time(0.0);
    let target = Target::equatorial(1, lst - 0.3, sky.latitude() - 0.2, 0.4, Band::R);

    model.commit_slew(&target);
    assert!(model.current_state().is_tracking());
    let ra = model.current_state().position().ra;
    let dec = model.current_state().position().dec;

    for step in 1..=5 {
        model.advance_to(model.current_state().time() + 120.0 * f64::from(step));
        let p = *model.current_state().position();
        assert!(p.tracking);
        assert_eq!((p.ra, p.dec), (ra, dec));
        assert!(angle_diff(p.rot, p.pa - p.ang) < 1e-9);
        assert!(model.current_state().fail_flags().is_empty());
    }

    let t = model.current_state().time();
    model.advance_to(t - 1000.0);
    assert_eq!(model.current_state().time(), t);

    model.stop_tracking(t + 10.0);
    model.stop_tracking(t + 10.0);
    assert!(!model.current_state().is_tracking());
    let held = *model.current_state().position();
    model.advance_to(t + 3600.0);
    let p = *model.current_state().position();
    assert_eq!((p.alt, p.az, p.rot), (held.alt, held.az, held.rot));
    assert!(angle_diff(p.ra, held.ra) > 0.1);
    assert!(angle_diff(p.rot, p.pa - p.ang) < 1e-9);

    model.start_tracking(t + 3600.0);
    assert!(model.current_state().is_tracking());
}

#[test]
fn test_rotator_follow_sky() {
    let mut config = ObservatoryConfig::default();
    config.rotator.follow_sky = true;
    let mut model = model_with(&config);
    let sky = *model.sky();
    let lst = sky.local_sidereal_time(0.0);
    let target = Target::equatorial(1, lst + 0.25, sky.latitude() + 0.1, 0.0, Band::R);

    model.commit_slew(&target);
    let p = *model.current_state().position();
    assert!(angle_diff(p.ang, 0.0) < 1e-9 || angle_diff(p.ang, PI) < 1e-9, "ang {}", p.ang);
    assert!(angle_diff(p.rot, p.pa - p.ang) < 1e-9);
}

#[test]
fn test_observe_advances_by_visit() {
    let mut model = model();
    let target = horizontal(70.0, 10.0, 0.0, Band::R).with_exposures(vec![15.0, 15.0]).unwrap();
    assert!((model.visit_time(&target) - 34.0).abs() < 1e-12);
    let slew = model.observe(&target);
    assert!((model.current_state().time() - (slew + 34.0)).abs() < 1e-9);
}

#[test]
fn test_deep_drilling_duration() {
    let model = model();
    let sequence = DeepDrilling { exp_time: 2880.0, exposures: 192, filter_changes: 3 };
    assert_eq!(model.deep_drilling_duration(&sequence), 3808.0);
}

#[test]
fn test_approximate_slew_delays() {
    let model = model();
    let p = *model.current_state().position();
    let here = HorizontalCandidate { alt: p.alt, az: p.az, filter: Band::R };

    assert_eq!(model.approximate_slew_delays(&[here], DomeModel::ExactFollow), vec![2.0]);
    let other = HorizontalCandidate { filter: Band::U, ..here };
    assert_eq!(model.approximate_slew_delays(&[other], DomeModel::ExactFollow), vec![120.0]);

    let out: Vec<_> = [90.0_f64, 0.0, -20.0]
        .into_iter()
        .map(|alt| HorizontalCandidate { alt: alt.to_radians(), az: 0.0, filter: Band::R })
        .collect();
    assert!(
        model
            .approximate_slew_delays(&out, DomeModel::ExactFollow)
            .iter()
            .all(|d| *d == INFEASIBLE_DELAY)
    );

    let nearby = HorizontalCandidate { az: 3.0_f64.to_radians(), ..here };
    let exact = model.approximate_slew_delays(&[nearby], DomeModel::ExactFollow)[0];
    let crawl = model.approximate_slew_delays(&[nearby], DomeModel::DomeCrawl)[0];
    assert!((exact - 5.0).abs() < 1e-9, "exact {exact}");
    assert!((crawl - (2.0 * (3.0_f64 / 7.0).sqrt() + 3.0)).abs() < 1e-9, "crawl {crawl}");

    let far = HorizontalCandidate { alt: 50.0_f64.to_radians(), az: 40.0_f64.to_radians(), ..here };
    let exact = model.approximate_slew_delays(&[far], DomeModel::ExactFollow)[0];
    let crawl = model.approximate_slew_delays(&[far], DomeModel::DomeCrawl)[0];
    assert!((exact - (36.0 + 4.0 + 37.0 / 1.5 + 1.0)).abs() < 1e-6, "exact {exact}");
    assert!((crawl - (36.0 + 40.0 / 1.5)).abs() < 1e-6, "crawl {crawl}");

    let grid: Vec<_> = (0..90)
        .map(|i| HorizontalCandidate {
            alt: f64::from(i).to_radians(),
            az: f64::from(2 * i).to_radians(),
            filter: Band::R,
        })
        .collect();
    assert_eq!(model.approximate_slew_delays(&grid, DomeModel::DomeCrawl).len(), grid.len());
}

#[test]
fn test_sky_round_trip() {
    let sky = SiteCoordinates::default();
    let mut rng = rand::rng();
    for _ in 0..500 {
        let t = rng.random_range(0.0..2.0e9);
        let ra = rng.random_range(0.0..TAU);
        let dec = rng.random_range(-1.2..1.2);
        let (alt, az, pa) = sky.equatorial_to_horizontal(t, ra, dec);
        if alt.abs() > 1.55 {
            continue;
        }
        let (ra_back, dec_back, pa_back) = sky.horizontal_to_equatorial(t, alt, az);
        assert!(angle_diff(ra_back, ra) < 1e-9, "ra {ra} -> {ra_back}");
        assert!((dec_back - dec).abs() < 1e-9);
        assert!(angle_diff(pa_back, pa) < 1e-9);
    }
}

#[test]
fn test_sidereal_time() {
    let j2000 = timestamp(Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap());
    assert!((j2000 - 946_728_000.0).abs() < 1e-6);
    assert!((julian_date(j2000) - 2_451_545.0).abs() < 1e-9);
    let gmst_hours = greenwich_mean_sidereal_time(julian_date(j2000)).to_degrees() / 15.0;
    assert!((gmst_hours - 18.697_374_558).abs() < 1e-6);

    let sky = SiteCoordinates::default();
    let lst = sky.local_sidereal_time(j2000);
    assert!(angle_diff(lst, greenwich_mean_sidereal_time(julian_date(j2000)) + sky.longitude()) < 1e-12);

    let (alt, _, _) = sky.equatorial_to_horizontal(j2000, lst, sky.latitude());
    assert!((alt - FRAC_PI_2).abs() < 1e-9);
}

#[test]
fn test_graph_diagnostics_reset_per_call() {
    let mut graph = ActivityGraph::new(&ObservatoryConfig::default().slew.prerequisites).unwrap();
    let params = ObservatoryParams::try_from(&ObservatoryConfig::default()).unwrap();
    assert_eq!(graph.prerequisites(Activity::Exposures), &[Activity::TelOpticsClosedLoop]);

    let model = model();
    let init = model.current_state().clone();
    let mut moved = init.clone();
    moved.axes_mut().tel_az += 10.0_f64.to_radians();
    let total = graph.critical_path_delay(Activity::Exposures, &params, &mut moved, &init);
    assert!(graph.own_delay(Activity::TelAz) > 0.0);
    assert!((graph.own_delay(Activity::TelSettle) - 3.0).abs() < 1e-12);
    assert!((total - (graph.own_delay(Activity::TelAz) + 3.0)).abs() < 1e-9);
    assert!(moved.peak_speeds().tel_az > 0.0);

    let mut still = init.clone();
    let total = graph.critical_path_delay(Activity::Exposures, &params, &mut still, &init);
    assert_eq!(total, 2.0);
    assert_eq!(graph.own_delay(Activity::TelAz), 0.0);
    assert_eq!(graph.critical_path(), vec![Activity::Readout]);
}

#[test]
fn test_set_position_aligns_axes() {
    let mut model = model();
    model.commit_slew(&horizontal(60.0, 20.0, 5.0, Band::R));
    let mut state = model.current_state().clone();
    assert!(state.peak_speeds().tel_alt != 0.0);

    let position = Position {
        alt: 45.0_f64.to_radians(),
        az: 100.0_f64.to_radians(),
        rot: 0.2,
        ..Position::at_rest(Band::G)
    };
    state.set_position(&position);
    assert_eq!(state.position(), &position);
    assert_eq!(state.axes().dom_az, position.az);
    assert_eq!(state.axes().tel_rot, 0.2);
    assert_eq!(*state.peak_speeds(), AxisSet::default());
    assert_eq!(state.magazine(), model.current_state().magazine());
}

#[test]
fn test_routine_logging_is_opt_in() {
    use crate::logger::{VERBOSE_ENV, event, info, log, verbose};
    assert_eq!(verbose(), std::env::var_os(VERBOSE_ENV).is_some());
    info!("model tests running");
    log!("routine line");
    event!("high-volume line");
}
