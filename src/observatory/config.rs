use super::activity::Activity;
use super::common::target::Band;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Telescope mount limits and kinematics. Angles in degrees, times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelescopeConfig {
    pub altitude_minpos: f64,
    pub altitude_maxpos: f64,
    pub azimuth_minpos: f64,
    pub azimuth_maxpos: f64,
    pub azimuth_wrap_padding: f64,
    pub altitude_maxspeed: f64,
    pub altitude_accel: f64,
    pub altitude_decel: f64,
    pub azimuth_maxspeed: f64,
    pub azimuth_accel: f64,
    pub azimuth_decel: f64,
    pub settle_time: f64,
}

impl Default for TelescopeConfig {
    fn default() -> Self {
        Self {
            altitude_minpos: 20.0,
            altitude_maxpos: 86.5,
            azimuth_minpos: -270.0,
            azimuth_maxpos: 270.0,
            azimuth_wrap_padding: 0.0,
            altitude_maxspeed: 3.5,
            altitude_accel: 3.5,
            altitude_decel: 3.5,
            azimuth_maxspeed: 7.0,
            azimuth_accel: 7.0,
            azimuth_decel: 7.0,
            settle_time: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomeConfig {
    pub altitude_maxspeed: f64,
    pub altitude_accel: f64,
    pub altitude_decel: f64,
    pub altitude_freerange: f64,
    pub azimuth_maxspeed: f64,
    pub azimuth_accel: f64,
    pub azimuth_decel: f64,
    pub azimuth_freerange: f64,
    pub settle_time: f64,
}

impl Default for DomeConfig {
    fn default() -> Self {
        Self {
            altitude_maxspeed: 1.75,
            altitude_accel: 0.875,
            altitude_decel: 0.875,
            altitude_freerange: 0.0,
            azimuth_maxspeed: 1.5,
            azimuth_accel: 0.75,
            azimuth_decel: 0.75,
            azimuth_freerange: 4.0,
            settle_time: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotatorConfig {
    pub minpos: f64,
    pub maxpos: f64,
    pub filter_change_pos: f64,
    pub maxspeed: f64,
    pub accel: f64,
    pub decel: f64,
    /// Honour the requested sky angle instead of holding the current rotator angle.
    pub follow_sky: bool,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            minpos: -90.0,
            maxpos: 90.0,
            filter_change_pos: 0.0,
            maxspeed: 3.5,
            accel: 1.0,
            decel: 1.0,
            follow_sky: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub readout_time: f64,
    pub shutter_time: f64,
    pub filter_change_time: f64,
    pub filter_max_changes_burst_num: usize,
    pub filter_max_changes_burst_time: f64,
    pub filter_max_changes_avg_num: usize,
    pub filter_max_changes_avg_time: f64,
    pub filter_mounted: Vec<Band>,
    pub filter_unmounted: Vec<Band>,
    pub field_of_view: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            readout_time: 2.0,
            shutter_time: 1.0,
            filter_change_time: 120.0,
            filter_max_changes_burst_num: 1,
            filter_max_changes_burst_time: 0.0,
            filter_max_changes_avg_num: 3000,
            filter_max_changes_avg_time: 365.25 * 24.0 * 60.0 * 60.0,
            filter_mounted: vec![Band::G, Band::R, Band::I, Band::Z, Band::Y],
            filter_unmounted: vec![Band::U],
            field_of_view: 3.5,
        }
    }
}

/// Active optics corrections. `cl_alt_limit` holds one more breakpoint than `cl_delay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticsConfig {
    /// Seconds of open-loop correction per degree of altitude travel.
    pub ol_slope: f64,
    pub cl_delay: Vec<f64>,
    pub cl_alt_limit: Vec<f64>,
}

impl Default for OpticsConfig {
    fn default() -> Self {
        Self { ol_slope: 1.0 / 3.5, cl_delay: vec![0.0, 36.0], cl_alt_limit: vec![0.0, 9.0, 90.0] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlewConfig {
    pub prerequisites: BTreeMap<Activity, Vec<Activity>>,
}

impl Default for SlewConfig {
    fn default() -> Self {
        use Activity::{
            DomAlt, DomAz, DomAzSettle, Exposures, Filter, Readout, TelAlt, TelAz,
            TelOpticsClosedLoop, TelOpticsOpenLoop, TelRot, TelSettle,
        };
        let prerequisites = [
            (TelAlt, vec![]),
            (TelAz, vec![]),
            (TelRot, vec![]),
            (TelSettle, vec![TelAlt, TelAz]),
            (TelOpticsOpenLoop, vec![TelAlt, TelAz]),
            (
                TelOpticsClosedLoop,
                vec![DomAlt, DomAzSettle, TelSettle, Readout, TelOpticsOpenLoop, Filter, TelRot],
            ),
            (DomAlt, vec![]),
            (DomAz, vec![]),
            (DomAzSettle, vec![DomAz]),
            (Filter, vec![]),
            (Readout, vec![]),
            (Exposures, vec![TelOpticsClosedLoop]),
        ];
        Self { prerequisites: prerequisites.into_iter().collect() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkConfig {
    pub telescope_altitude: f64,
    pub telescope_azimuth: f64,
    pub telescope_rotator: f64,
    pub dome_altitude: f64,
    pub dome_azimuth: f64,
    pub filter_position: Band,
}

impl Default for ParkConfig {
    fn default() -> Self {
        Self {
            telescope_altitude: 86.5,
            telescope_azimuth: 0.0,
            telescope_rotator: 0.0,
            dome_altitude: 90.0,
            dome_azimuth: 0.0,
            filter_position: Band::R,
        }
    }
}

/// Geodetic site location in degrees and meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
}

impl Default for SiteConfig {
    fn default() -> Self { Self { latitude: -30.2446, longitude: -70.7494, height: 2650.0 } }
}

/// Complete observatory description in human units.
///
/// Every section falls back to the reference survey telescope, so a partial document only needs
/// to name what differs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservatoryConfig {
    pub telescope: TelescopeConfig,
    pub dome: DomeConfig,
    pub rotator: RotatorConfig,
    pub camera: CameraConfig,
    pub optics: OpticsConfig,
    pub slew: SlewConfig,
    pub park: ParkConfig,
    pub site: SiteConfig,
}

/// Fatal defects found while turning an [`ObservatoryConfig`] into a model.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingPrerequisites(Activity),
    CyclicPrerequisites(Activity),
    InvalidAxisLimits(&'static str),
    InvalidKinematics(&'static str),
    InvalidOpticsTable,
    InvalidFilterSets,
    ParkOutOfRange(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingPrerequisites(activity) => {
                write!(f, "no prerequisite entry for activity '{activity}'")
            }
            ConfigError::CyclicPrerequisites(activity) => {
                write!(f, "prerequisite graph has a cycle through '{activity}'")
            }
            ConfigError::InvalidAxisLimits(axis) => write!(f, "invalid limits for axis {axis}"),
            ConfigError::InvalidKinematics(axis) => {
                write!(f, "speed, acceleration and deceleration of {axis} must be positive")
            }
            ConfigError::InvalidOpticsTable => {
                write!(f, "closed loop table needs one more altitude limit than delays")
            }
            ConfigError::InvalidFilterSets => {
                write!(f, "mounted and unmounted filters must be disjoint and unique")
            }
            ConfigError::ParkOutOfRange(axis) => write!(f, "park position of {axis} is outside limits"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Position limits of one axis in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    pub min: f64,
    pub max: f64,
}

impl AxisLimits {
    fn from_degrees(min: f64, max: f64, axis: &'static str) -> Result<Self, ConfigError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ConfigError::InvalidAxisLimits(axis));
        }
        Ok(Self { min: min.to_radians(), max: max.to_radians() })
    }

    pub fn contains(&self, angle: f64) -> bool { (self.min..=self.max).contains(&angle) }

    pub fn as_bounds(&self) -> Option<(f64, f64)> { Some((self.min, self.max)) }
}

/// Motion capabilities of one axis in radians and seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisKinematics {
    pub max_speed: f64,
    pub accel: f64,
    pub decel: f64,
    pub free_range: f64,
}

impl AxisKinematics {
    fn from_degrees(
        max_speed: f64,
        accel: f64,
        decel: f64,
        free_range: f64,
        axis: &'static str,
    ) -> Result<Self, ConfigError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(max_speed) || !positive(accel) || !positive(decel) || free_range < 0.0 {
            return Err(ConfigError::InvalidKinematics(axis));
        }
        Ok(Self {
            max_speed: max_speed.to_radians(),
            accel: accel.to_radians(),
            decel: decel.to_radians(),
            free_range: free_range.to_radians(),
        })
    }
}

/// Count and duration of one filter change rate window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateWindow {
    pub count: usize,
    pub duration: f64,
}

/// Validated runtime parameters, all angles in radians.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservatoryParams {
    pub tel_alt_limits: AxisLimits,
    pub tel_az_limits: AxisLimits,
    pub tel_rot_limits: AxisLimits,
    pub tel_az_wrap_padding: f64,
    pub tel_alt: AxisKinematics,
    pub tel_az: AxisKinematics,
    pub tel_rot: AxisKinematics,
    pub dom_alt: AxisKinematics,
    pub dom_az: AxisKinematics,
    pub mount_settle_time: f64,
    pub dome_settle_time: f64,
    pub rotator_filter_change_pos: f64,
    pub rotator_follow_sky: bool,
    pub readout_time: f64,
    pub shutter_time: f64,
    pub filter_change_time: f64,
    pub filter_burst: RateWindow,
    pub filter_average: RateWindow,
    pub field_of_view: f64,
    /// Seconds per radian of altitude travel.
    pub optics_ol_slope: f64,
    pub optics_cl_delay: Vec<f64>,
    pub optics_cl_alt_limit: Vec<f64>,
}

impl TryFrom<&ObservatoryConfig> for ObservatoryParams {
    type Error = ConfigError;

    fn try_from(config: &ObservatoryConfig) -> Result<Self, Self::Error> {
        let tel = &config.telescope;
        let dome = &config.dome;
        let rot = &config.rotator;
        let cam = &config.camera;
        let optics = &config.optics;

        let limits_ok = optics.cl_alt_limit.len() == optics.cl_delay.len() + 1
            && optics.cl_alt_limit.windows(2).all(|w| w[0] <= w[1])
            && optics.cl_delay.iter().all(|d| d.is_finite() && *d >= 0.0);
        if !limits_ok {
            return Err(ConfigError::InvalidOpticsTable);
        }

        Ok(Self {
            tel_alt_limits: AxisLimits::from_degrees(
                tel.altitude_minpos,
                tel.altitude_maxpos,
                "telescope altitude",
            )?,
            tel_az_limits: AxisLimits::from_degrees(
                tel.azimuth_minpos,
                tel.azimuth_maxpos,
                "telescope azimuth",
            )?,
            tel_rot_limits: AxisLimits::from_degrees(rot.minpos, rot.maxpos, "rotator")?,
            tel_az_wrap_padding: tel.azimuth_wrap_padding.to_radians(),
            tel_alt: AxisKinematics::from_degrees(
                tel.altitude_maxspeed,
                tel.altitude_accel,
                tel.altitude_decel,
                0.0,
                "telescope altitude",
            )?,
            tel_az: AxisKinematics::from_degrees(
                tel.azimuth_maxspeed,
                tel.azimuth_accel,
                tel.azimuth_decel,
                0.0,
                "telescope azimuth",
            )?,
            tel_rot: AxisKinematics::from_degrees(rot.maxspeed, rot.accel, rot.decel, 0.0, "rotator")?,
            dom_alt: AxisKinematics::from_degrees(
                dome.altitude_maxspeed,
                dome.altitude_accel,
                dome.altitude_decel,
                dome.altitude_freerange,
                "dome altitude",
            )?,
            dom_az: AxisKinematics::from_degrees(
                dome.azimuth_maxspeed,
                dome.azimuth_accel,
                dome.azimuth_decel,
                dome.azimuth_freerange,
                "dome azimuth",
            )?,
            mount_settle_time: tel.settle_time,
            dome_settle_time: dome.settle_time,
            rotator_filter_change_pos: rot.filter_change_pos.to_radians(),
            rotator_follow_sky: rot.follow_sky,
            readout_time: cam.readout_time,
            shutter_time: cam.shutter_time,
            filter_change_time: cam.filter_change_time,
            filter_burst: RateWindow {
                count: cam.filter_max_changes_burst_num,
                duration: cam.filter_max_changes_burst_time,
            },
            filter_average: RateWindow {
                count: cam.filter_max_changes_avg_num,
                duration: cam.filter_max_changes_avg_time,
            },
            field_of_view: cam.field_of_view.to_radians(),
            optics_ol_slope: optics.ol_slope / 1.0_f64.to_radians(),
            optics_cl_delay: optics.cl_delay.clone(),
            optics_cl_alt_limit: optics.cl_alt_limit.iter().map(|a| a.to_radians()).collect(),
        })
    }
}

/// Checks that the mounted and unmounted filter lists are unique and disjoint.
pub(crate) fn validate_filter_sets(mounted: &[Band], unmounted: &[Band]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    if mounted.iter().chain(unmounted).all(|band| seen.insert(*band)) {
        Ok(())
    } else {
        Err(ConfigError::InvalidFilterSets)
    }
}
