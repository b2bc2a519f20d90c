use super::activity::{Activity, ActivityGraph};
use super::approximate::{DomeModel, HorizontalCandidate, INFEASIBLE_DELAY, approximate_slew_delays};
use super::common::math::{closest_angle_distance, normalize_from, wrap_two_pi};
use super::common::target::{Band, DeepDrilling, Orientation, Pointing, Target};
use super::config::{AxisLimits, ConfigError, ObservatoryConfig, ObservatoryParams};
use super::filter_ledger::{FilterChangeLedger, FilterMagazine};
use super::observatory_state::{AxisSet, FailFlags, FailKind, FailRecord, ObservatoryState, Position};
use super::sky::{SiteCoordinates, SkyCoordinates};
use crate::logger::{error, event, info, log};
use itertools::Itertools;
use std::f64::consts::PI;
use strum::IntoEnumIterator;

/// Outcome of a slew delay query. An infeasible slew carries a negative delay and the failed constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlewDelay {
    seconds: f64,
    failures: FailFlags,
}

impl SlewDelay {
    fn feasible(seconds: f64) -> Self { Self { seconds, failures: FailFlags::NONE } }

    fn infeasible(kind: FailKind) -> Self {
        Self { seconds: INFEASIBLE_DELAY, failures: FailFlags::of(kind) }
    }

    pub fn seconds(&self) -> f64 { self.seconds }
    pub fn failures(&self) -> FailFlags { self.failures }
    pub fn is_feasible(&self) -> bool { self.failures.is_empty() }
}

/// Kinematic and state model of the observatory.
///
/// Owns the current and the park state, the activity graph and the filter ledger. Every
/// operation runs to completion synchronously; the model is not meant to be shared between
/// threads without external serialization.
pub struct ObservatoryModel<S: SkyCoordinates = SiteCoordinates> {
    params: ObservatoryParams,
    sky: S,
    graph: ActivityGraph,
    ledger: FilterChangeLedger,
    current: ObservatoryState,
    park: ObservatoryState,
}

impl ObservatoryModel<SiteCoordinates> {
    /// Builds a model for the site described in `config`.
    ///
    /// # Errors
    /// - Any [`ConfigError`] raised while validating `config`.
    pub fn new(config: &ObservatoryConfig) -> Result<Self, ConfigError> {
        Self::with_sky(config, SiteCoordinates::from(&config.site))
    }
}

impl<S: SkyCoordinates> ObservatoryModel<S> {
    /// Builds a model that converts coordinates with `sky`.
    ///
    /// The current state starts out parked at time zero.
    ///
    /// # Errors
    /// - Any [`ConfigError`] raised while validating `config`.
    pub fn with_sky(config: &ObservatoryConfig, sky: S) -> Result<Self, ConfigError> {
        let mut model = Self::build(config, sky)
            .inspect_err(|e| error!("Rejected observatory configuration: {e}"))?;
        model.log_configuration();
        model.advance_to(0.0);
        info!(
            "Observatory model ready, parked at alt={:.1} az={:.1} with filter {}",
            model.current.position().alt.to_degrees(),
            model.current.position().az.to_degrees(),
            model.current.filter()
        );
        Ok(model)
    }

    fn build(config: &ObservatoryConfig, sky: S) -> Result<Self, ConfigError> {
        let params = ObservatoryParams::try_from(config)?;
        let graph = ActivityGraph::new(&config.slew.prerequisites)?;
        let magazine = FilterMagazine::new(
            config.camera.filter_mounted.clone(),
            config.camera.filter_unmounted.clone(),
        )?;

        let park_cfg = &config.park;
        let park_position = Position {
            alt: park_cfg.telescope_altitude.to_radians(),
            az: park_cfg.telescope_azimuth.to_radians(),
            rot: park_cfg.telescope_rotator.to_radians(),
            ..Position::at_rest(park_cfg.filter_position)
        };
        check_park(&params.tel_alt_limits, park_position.alt, "telescope altitude")?;
        check_park(&params.tel_az_limits, park_position.az, "telescope azimuth")?;
        check_park(&params.tel_rot_limits, park_position.rot, "rotator")?;
        if !magazine.is_mounted(park_cfg.filter_position) {
            return Err(ConfigError::ParkOutOfRange("filter"));
        }
        let park_axes = AxisSet {
            tel_alt: park_position.alt,
            tel_az: park_position.az,
            tel_rot: park_position.rot,
            dom_alt: park_cfg.dome_altitude.to_radians(),
            dom_az: park_cfg.dome_azimuth.to_radians(),
        };
        let park = ObservatoryState::new(park_position, park_axes, magazine.clone());
        let ledger = FilterChangeLedger::new(params.filter_burst, params.filter_average, magazine);

        Ok(Self { params, sky, graph, ledger, current: park.clone(), park })
    }

    fn log_configuration(&self) {
        let p = &self.params;
        event!(
            "Telescope alt [{:.1}, {:.1}] az [{:.1}, {:.1}] rot [{:.1}, {:.1}] deg, \
             rotator filter change position {:.1} deg, follow sky {}",
            p.tel_alt_limits.min.to_degrees(),
            p.tel_alt_limits.max.to_degrees(),
            p.tel_az_limits.min.to_degrees(),
            p.tel_az_limits.max.to_degrees(),
            p.tel_rot_limits.min.to_degrees(),
            p.tel_rot_limits.max.to_degrees(),
            p.rotator_filter_change_pos.to_degrees(),
            p.rotator_follow_sky
        );
        event!(
            "Camera readout {}s shutter {}s filter change {}s, mounted [{}] unmounted [{}]",
            p.readout_time,
            p.shutter_time,
            p.filter_change_time,
            self.ledger.magazine().mounted().iter().join(", "),
            self.ledger.magazine().unmounted().iter().join(", ")
        );
        for activity in Activity::iter() {
            event!(
                "Prerequisites of {activity}: [{}]",
                self.graph.prerequisites(activity).iter().join(", ")
            );
        }
    }

    /// Horizontal and equatorial pointing of `target` at `time`, before any axis resolution.
    pub fn target_position(&self, target: &Target, time: f64) -> Position {
        let (ra, dec, alt, az, pa, tracking) = match target.pointing() {
            Pointing::Equatorial { ra, dec } => {
                let (alt, az, pa) = self.sky.equatorial_to_horizontal(time, ra, dec);
                (ra, dec, alt, az, pa, true)
            }
            Pointing::Horizontal { alt, az } => {
                let (ra, dec, pa) = self.sky.horizontal_to_equatorial(time, alt, az);
                (ra, dec, alt, az, pa, false)
            }
        };
        let (ang, rot) = match target.orientation() {
            Orientation::SkyAngle(ang) if self.params.rotator_follow_sky => {
                (ang, wrap_two_pi(pa - ang))
            }
            Orientation::SkyAngle(ang) => (ang, self.current.axes().tel_rot),
            Orientation::Rotator(rot) => (wrap_two_pi(pa - rot), rot),
        };
        Position { time, ra, dec, ang, filter: target.filter(), tracking, alt, az, pa, rot }
    }

    /// Resolves `position` into axis angles reachable from the current state.
    ///
    /// Altitude is clamped to the mount limits. In tracking mode azimuth and rotator take the
    /// shortest free path and are clamped afterwards; otherwise they are resolved against their
    /// cable wrap. Every clamp is recorded as a failure on the current state and marks the
    /// resulting tracking as invalid.
    pub fn resolve_pointing(&mut self, position: &Position, as_tracking: bool) -> ObservatoryState {
        self.current.clear_fail_flags();
        let from = *self.current.axes();
        let mut resolved = *position;
        let mut valid = true;

        let alt_limits = self.params.tel_alt_limits;
        let tel_alt = if position.alt < alt_limits.min {
            valid = false;
            self.current.record_failure(FailKind::AltEmin);
            alt_limits.min
        } else if position.alt > alt_limits.max {
            valid = false;
            self.current.record_failure(FailKind::AltEmax);
            alt_limits.max
        } else {
            position.alt
        };

        let az_limits = self.params.tel_az_limits;
        let tel_az = if as_tracking {
            let (free, _) = closest_angle_distance(position.az, from.tel_az, None, 0.0);
            let (az, clamped) =
                self.clamp_axis(free, az_limits, FailKind::AzEmin, FailKind::AzEmax);
            valid &= !clamped;
            az
        } else {
            let padding = self.params.tel_az_wrap_padding;
            closest_angle_distance(position.az, from.tel_az, az_limits.as_bounds(), padding).0
        };
        let (dom_az, _) = closest_angle_distance(position.az, from.dom_az, None, 0.0);

        let rot_limits = self.params.tel_rot_limits;
        let tel_rot = if as_tracking {
            let (free, _) = closest_angle_distance(position.rot, from.tel_rot, None, 0.0);
            let (rot, clamped) =
                self.clamp_axis(free, rot_limits, FailKind::RotEmin, FailKind::RotEmax);
            valid &= !clamped;
            rot
        } else {
            let norm = normalize_from(position.rot, rot_limits.min);
            if norm > rot_limits.max {
                resolved.rot = norm - PI;
            }
            closest_angle_distance(resolved.rot, from.tel_rot, rot_limits.as_bounds(), 0.0).0
        };
        resolved.ang = wrap_two_pi(resolved.pa - tel_rot);

        let axes = AxisSet { tel_alt, tel_az, tel_rot, dom_alt: tel_alt, dom_az };
        let mut state = ObservatoryState::new(resolved, axes, self.current.magazine().clone());
        if as_tracking {
            state.position_mut().tracking = valid;
        }
        state
    }

    fn clamp_axis(
        &mut self,
        angle: f64,
        limits: AxisLimits,
        below: FailKind,
        above: FailKind,
    ) -> (f64, bool) {
        if angle < limits.min {
            self.current.record_failure(below);
            (limits.min, true)
        } else if angle > limits.max {
            self.current.record_failure(above);
            (limits.max, true)
        } else {
            (angle, false)
        }
    }

    /// Time needed to slew from the current state to `target` without moving there.
    ///
    /// A needed filter change that is not allowed and an altitude outside the limits are
    /// reported as infeasible instead of being clamped. The fail flags of the current state are
    /// left as they were; only the critical-path diagnostics change.
    pub fn slew_delay(&mut self, target: &Target) -> SlewDelay {
        let now = self.current.time();
        if target.filter() != self.current.filter()
            && !self.ledger.is_change_allowed(target.filter(), now)
        {
            return SlewDelay::infeasible(FailKind::Filter);
        }

        let position = self.target_position(target, now);
        if position.alt < self.params.tel_alt_limits.min {
            return SlewDelay::infeasible(FailKind::AltEmin);
        }
        if position.alt > self.params.tel_alt_limits.max {
            return SlewDelay::infeasible(FailKind::AltEmax);
        }

        let flags = self.current.fail_flags();
        let mut candidate = self.resolve_pointing(&position, false);
        self.current.set_fail_flags(flags);
        SlewDelay::feasible(self.critical_path_from_current(&mut candidate))
    }

    /// Critical-path delay for moving from `init` to `target`, recording the diagnostics and the
    /// peak speeds in `target`.
    pub fn slew_delay_between(
        &mut self,
        target: &mut ObservatoryState,
        init: &ObservatoryState,
    ) -> f64 {
        let delay =
            self.graph.critical_path_delay(Activity::Exposures, &self.params, target, init);
        self.log_critical_path(delay);
        delay
    }

    fn critical_path_from_current(&mut self, target: &mut ObservatoryState) -> f64 {
        let delay =
            self.graph.critical_path_delay(Activity::Exposures, &self.params, target, &self.current);
        self.log_critical_path(delay);
        delay
    }

    fn log_critical_path(&self, delay: f64) {
        event!(
            "Slew delay {delay:.3}s via [{}]",
            self.graph.critical_path().iter().join(" <- ")
        );
    }

    /// Slews to `target` at the current time. Returns the slew delay in seconds.
    pub fn commit_slew(&mut self, target: &Target) -> f64 {
        self.commit_slew_at(self.current.time(), target)
    }

    /// Advances to `time`, then slews to `target`. Returns the slew delay in seconds.
    pub fn commit_slew_at(&mut self, time: f64, target: &Target) -> f64 {
        self.advance_to(time);
        let position = self.target_position(target, self.current.time());
        self.commit_position(&position)
    }

    fn commit_position(&mut self, position: &Position) -> f64 {
        let mut candidate = self.resolve_pointing(position, false);
        let delay = self.critical_path_from_current(&mut candidate);
        self.ledger.record_if_changed(self.current.filter(), candidate.filter(), candidate.time());
        candidate.position_mut().time += delay;
        let arrival = candidate.time();
        self.current.set(&candidate);
        self.advance_to(arrival);
        delay
    }

    /// Moves the model clock to `time`, never backwards, and re-derives the pointing.
    ///
    /// While tracking the equatorial pointing and sky angle stay fixed and the axes follow the
    /// sky; otherwise the horizontal pointing and rotator angle stay fixed.
    pub fn advance_to(&mut self, time: f64) {
        let now = time.max(self.current.time());
        let current = *self.current.position();
        if current.tracking {
            let (alt, az, pa) = self.sky.equatorial_to_horizontal(now, current.ra, current.dec);
            let rot = wrap_two_pi(pa - current.ang);
            let position = Position { time: now, alt, az, pa, rot, ..current };
            let resolved = self.resolve_pointing(&position, true);
            let r = *resolved.position();
            let p = self.current.position_mut();
            p.time = r.time;
            p.alt = r.alt;
            p.az = r.az;
            p.pa = r.pa;
            p.rot = r.rot;
            p.tracking = r.tracking;
            *self.current.axes_mut() = *resolved.axes();
        } else {
            let (ra, dec, pa) = self.sky.horizontal_to_equatorial(now, current.alt, current.az);
            let p = self.current.position_mut();
            p.time = now;
            p.ra = ra;
            p.dec = dec;
            p.ang = wrap_two_pi(pa - current.rot);
            p.pa = pa;
        }
    }

    /// Advances to `time` and enables sidereal tracking.
    pub fn start_tracking(&mut self, time: f64) {
        self.advance_to(time);
        if !self.current.is_tracking() {
            self.current.position_mut().tracking = true;
        }
    }

    /// Advances to `time` and holds the horizontal pointing from then on.
    pub fn stop_tracking(&mut self, time: f64) {
        self.advance_to(time);
        if self.current.is_tracking() {
            self.current.position_mut().tracking = false;
        }
    }

    /// Slews to the park pose keeping the current filter. Returns the slew delay in seconds.
    ///
    /// The stored park pose adopts the current filter, so a later [`Self::reset`] costs no
    /// filter change.
    pub fn park(&mut self) -> f64 {
        self.park.position_mut().filter = self.current.filter();
        let mut park = self.park.clone();
        let delay = self.critical_path_from_current(&mut park);
        park.position_mut().time = self.current.time() + delay;
        let arrival = park.time();
        self.current.set(&park);
        self.advance_to(arrival);
        log!("Parked after {delay:.1}s at t={arrival:.1}");
        delay
    }

    /// Puts the current state onto the park pose at the current time without any travel cost.
    /// A differing park filter is recorded as a filter change.
    pub fn reset(&mut self) {
        let now = self.current.time();
        self.ledger.record_if_changed(self.current.filter(), self.park.filter(), now);
        let mut park = self.park.clone();
        park.position_mut().time = now;
        self.current.set(&park);
        self.advance_to(now);
        log!("Reset to park pose at t={now:.1}");
    }

    /// Slews to `target` and takes its exposures. Returns the slew delay in seconds.
    pub fn observe(&mut self, target: &Target) -> f64 {
        let delay = self.commit_slew(target);
        let end = self.current.time() + self.visit_time(target);
        self.advance_to(end);
        delay
    }

    /// Open shutter, shutter motion and intermediate readout time of the exposures of `target`.
    #[allow(clippy::cast_precision_loss)]
    pub fn visit_time(&self, target: &Target) -> f64 {
        let exposures = target.num_exp() as f64;
        target.exp_times().iter().sum::<f64>()
            + exposures * self.params.shutter_time
            + (exposures - 1.0).max(0.0) * self.params.readout_time
    }

    /// Duration of a deep drilling sequence, which involves no axis motion.
    pub fn deep_drilling_duration(&self, sequence: &DeepDrilling) -> f64 {
        let exposures = f64::from(sequence.exposures);
        sequence.exp_time
            + exposures * self.params.shutter_time
            + (exposures - 1.0).max(0.0) * self.params.readout_time
            + f64::from(sequence.filter_changes)
                * (self.params.filter_change_time - self.params.readout_time)
    }

    /// Exchanges the mounted `band` with a stored filter in the camera and in both states.
    pub fn swap_filter(&mut self, band: Band) -> bool {
        if !self.ledger.swap(band) {
            return false;
        }
        let magazine = self.ledger.magazine();
        self.current.set_magazine(magazine);
        self.park.set_magazine(magazine);
        true
    }

    /// Bulk estimate of slew times from the current state, see [`approximate_slew_delays`].
    pub fn approximate_slew_delays(
        &self,
        candidates: &[HorizontalCandidate],
        dome: DomeModel,
    ) -> Vec<f64> {
        approximate_slew_delays(&self.params, &self.current, candidates, dome)
    }

    pub fn is_filter_change_allowed(&self, band: Band) -> bool {
        self.ledger.is_change_allowed(band, self.current.time())
    }

    pub fn current_state(&self) -> &ObservatoryState { &self.current }
    pub fn park_state(&self) -> &ObservatoryState { &self.park }
    pub fn params(&self) -> &ObservatoryParams { &self.params }
    pub fn sky(&self) -> &S { &self.sky }
    pub fn fail_record(&self) -> &FailRecord { self.current.fail_record() }
    pub fn filter_ledger(&self) -> &FilterChangeLedger { &self.ledger }

    /// Positive per-activity delays of the most recent critical-path evaluation.
    pub fn last_slew_delays(&self) -> Vec<(Activity, f64)> { self.graph.last_delays() }

    /// Bottleneck chain of the most recent critical-path evaluation, terminal activity first.
    pub fn critical_path(&self) -> Vec<Activity> { self.graph.critical_path() }

    pub fn filter_change_count(&self) -> usize { self.ledger.len() }

    pub fn last_filter_change(&self) -> Option<f64> { self.ledger.last_change() }

    pub fn delta_since_last_filter_change(&self) -> Option<f64> {
        self.ledger.delta_since_last(self.current.time())
    }

    pub fn delta_burst_window(&self) -> Option<f64> { self.ledger.delta_burst(self.current.time()) }

    pub fn delta_average_window(&self) -> Option<f64> {
        self.ledger.delta_average(self.current.time())
    }
}

fn check_park(limits: &AxisLimits, angle: f64, axis: &'static str) -> Result<(), ConfigError> {
    if limits.contains(angle) { Ok(()) } else { Err(ConfigError::ParkOutOfRange(axis)) }
}
