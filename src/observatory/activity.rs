use super::common::math::kinematic_delay;
use super::config::{AxisKinematics, ConfigError, ObservatoryParams};
use super::observatory_state::ObservatoryState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{Display, EnumCount as EnumCountMacro, EnumIter};

/// Axis movements below this are treated as no movement at all.
const MOTION_EPSILON: f64 = 1e-6;

/// Motion and readiness steps that make up a slew.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumCountMacro,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    TelAlt,
    TelAz,
    TelRot,
    TelSettle,
    TelOpticsOpenLoop,
    TelOpticsClosedLoop,
    DomAlt,
    DomAz,
    DomAzSettle,
    Filter,
    Readout,
    Exposures,
}

impl Activity {
    /// Own delay of this activity when moving from `init` to `target`.
    ///
    /// Axis activities store their peak speed in `target`.
    pub fn delay(
        self,
        params: &ObservatoryParams,
        target: &mut ObservatoryState,
        init: &ObservatoryState,
    ) -> f64 {
        let from = init.axes();
        let to = *target.axes();
        match self {
            Activity::TelAlt => {
                let (delay, peak) = axis_delay(to.tel_alt - from.tel_alt, &params.tel_alt);
                target.peak_speeds_mut().tel_alt = peak;
                delay
            }
            Activity::TelAz => {
                let (delay, peak) = axis_delay(to.tel_az - from.tel_az, &params.tel_az);
                target.peak_speeds_mut().tel_az = peak;
                delay
            }
            Activity::TelRot => {
                let (delay, peak) = axis_delay(to.tel_rot - from.tel_rot, &params.tel_rot);
                target.peak_speeds_mut().tel_rot = peak;
                delay
            }
            Activity::DomAlt => {
                let (delay, peak) = axis_delay(to.dom_alt - from.dom_alt, &params.dom_alt);
                target.peak_speeds_mut().dom_alt = peak;
                delay
            }
            Activity::DomAz => {
                let (delay, peak) = axis_delay(to.dom_az - from.dom_az, &params.dom_az);
                target.peak_speeds_mut().dom_az = peak;
                delay
            }
            Activity::DomAzSettle => {
                if (to.dom_az - from.dom_az).abs() > MOTION_EPSILON {
                    params.dome_settle_time
                } else {
                    0.0
                }
            }
            Activity::TelSettle => {
                let moved = (to.tel_alt - from.tel_alt).abs() + (to.tel_az - from.tel_az).abs();
                if moved > MOTION_EPSILON { params.mount_settle_time } else { 0.0 }
            }
            Activity::TelOpticsOpenLoop => {
                let delta_alt = (to.tel_alt - from.tel_alt).abs();
                if delta_alt > MOTION_EPSILON { delta_alt * params.optics_ol_slope } else { 0.0 }
            }
            Activity::TelOpticsClosedLoop => {
                closed_loop_delay((to.tel_alt - from.tel_alt).abs(), params)
            }
            Activity::Filter => {
                if target.filter() == init.filter() { 0.0 } else { params.filter_change_time }
            }
            Activity::Readout => params.readout_time,
            Activity::Exposures => 0.0,
        }
    }
}

fn axis_delay(distance: f64, axis: &AxisKinematics) -> (f64, f64) {
    kinematic_delay(distance, axis.max_speed, axis.accel, axis.decel, axis.free_range)
}

/// Closed-loop correction for the altitude bucket `[limit[k], limit[k+1])` containing `delta_alt`.
fn closed_loop_delay(delta_alt: f64, params: &ObservatoryParams) -> f64 {
    params
        .optics_cl_delay
        .iter()
        .zip(params.optics_cl_alt_limit.windows(2))
        .find(|(_, bucket)| bucket[0] <= delta_alt && delta_alt < bucket[1])
        .map_or(0.0, |(delay, _)| *delay)
}

/// Prerequisite DAG over all [`Activity`]s with diagnostics of the most recent evaluation.
#[derive(Debug, Clone)]
pub struct ActivityGraph {
    prerequisites: [Vec<Activity>; Activity::COUNT],
    own_delays: [f64; Activity::COUNT],
    critical_prereqs: [Option<Activity>; Activity::COUNT],
    terminal: Activity,
}

impl ActivityGraph {
    /// Builds the graph from an edge map that must name every activity and be acyclic.
    ///
    /// # Errors
    /// - [`ConfigError::MissingPrerequisites`] for an activity without entry.
    /// - [`ConfigError::CyclicPrerequisites`] naming an activity on a cycle.
    pub fn new(edges: &BTreeMap<Activity, Vec<Activity>>) -> Result<Self, ConfigError> {
        let mut prerequisites: [Vec<Activity>; Activity::COUNT] = Default::default();
        for activity in Activity::iter() {
            let entry = edges.get(&activity).ok_or(ConfigError::MissingPrerequisites(activity))?;
            prerequisites[activity as usize].clone_from(entry);
        }

        let mut marks = [Mark::Unvisited; Activity::COUNT];
        for activity in Activity::iter() {
            Self::check_acyclic(&prerequisites, activity, &mut marks)?;
        }

        Ok(Self {
            prerequisites,
            own_delays: [0.0; Activity::COUNT],
            critical_prereqs: [None; Activity::COUNT],
            terminal: Activity::Exposures,
        })
    }

    fn check_acyclic(
        prerequisites: &[Vec<Activity>; Activity::COUNT],
        activity: Activity,
        marks: &mut [Mark; Activity::COUNT],
    ) -> Result<(), ConfigError> {
        match marks[activity as usize] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(ConfigError::CyclicPrerequisites(activity)),
            Mark::Unvisited => {}
        }
        marks[activity as usize] = Mark::InProgress;
        for prereq in &prerequisites[activity as usize] {
            Self::check_acyclic(prerequisites, *prereq, marks)?;
        }
        marks[activity as usize] = Mark::Done;
        Ok(())
    }

    /// Longest chain of delays ending in `terminal` for the move from `init` to `target`.
    ///
    /// Replaces the diagnostics of the previous call and stores the peak axis speeds in `target`.
    pub fn critical_path_delay(
        &mut self,
        terminal: Activity,
        params: &ObservatoryParams,
        target: &mut ObservatoryState,
        init: &ObservatoryState,
    ) -> f64 {
        self.own_delays = [0.0; Activity::COUNT];
        self.critical_prereqs = [None; Activity::COUNT];
        self.terminal = terminal;
        self.accumulate(terminal, params, target, init)
    }

    fn accumulate(
        &mut self,
        activity: Activity,
        params: &ObservatoryParams,
        target: &mut ObservatoryState,
        init: &ObservatoryState,
    ) -> f64 {
        let own = activity.delay(params, target, init);
        let mut longest = 0.0;
        let mut critical = None;
        for i in 0..self.prerequisites[activity as usize].len() {
            let prereq = self.prerequisites[activity as usize][i];
            let chain = self.accumulate(prereq, params, target, init);
            if chain > longest {
                longest = chain;
                critical = Some(prereq);
            }
        }
        self.own_delays[activity as usize] = own;
        self.critical_prereqs[activity as usize] = critical;
        own + longest
    }

    /// Positive own delays of the last evaluation in activity order.
    pub fn last_delays(&self) -> Vec<(Activity, f64)> {
        Activity::iter()
            .map(|a| (a, self.own_delays[a as usize]))
            .filter(|(_, delay)| *delay > 0.0)
            .collect()
    }

    /// Bottleneck chain of the last evaluation, starting at the terminal activity and skipping
    /// activities that cost nothing.
    pub fn critical_path(&self) -> Vec<Activity> {
        let mut path = Vec::new();
        let mut next = Some(self.terminal);
        while let Some(activity) = next {
            if self.own_delays[activity as usize] > 0.0 {
                path.push(activity);
            }
            next = self.critical_prereqs[activity as usize];
        }
        path
    }

    pub fn own_delay(&self, activity: Activity) -> f64 { self.own_delays[activity as usize] }

    pub fn prerequisites(&self, activity: Activity) -> &[Activity] {
        &self.prerequisites[activity as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}
