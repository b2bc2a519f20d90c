use super::common::math::uam_slew_time;
use super::common::target::Band;
use super::config::ObservatoryParams;
use super::observatory_state::ObservatoryState;
use std::f64::consts::TAU;

/// Returned for candidates whose altitude is outside the telescope limits.
pub const INFEASIBLE_DELAY: f64 = -1.0;

/// How the dome follows the telescope in the bulk estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DomeModel {
    /// The dome slews and settles exactly onto every field.
    #[default]
    ExactFollow,
    /// The dome slit tolerates small offsets; nearby fields need no dome motion and there is no
    /// azimuth settle.
    DomeCrawl,
}

/// Horizontal candidate pointing for the bulk estimator, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalCandidate {
    pub alt: f64,
    pub az: f64,
    pub filter: Band,
}

/// Fast, rotator-agnostic slew estimates from `state` to each candidate.
///
/// Ignores cable wrap and the rotator, so results rank candidates but do not replace the
/// critical-path delay. Candidates outside the altitude limits yield [`INFEASIBLE_DELAY`].
pub fn approximate_slew_delays(
    params: &ObservatoryParams,
    state: &ObservatoryState,
    candidates: &[HorizontalCandidate],
    dome: DomeModel,
) -> Vec<f64> {
    candidates
        .iter()
        .map(|candidate| approximate_slew_delay(params, state, candidate, dome))
        .collect()
}

fn approximate_slew_delay(
    params: &ObservatoryParams,
    state: &ObservatoryState,
    candidate: &HorizontalCandidate,
    dome: DomeModel,
) -> f64 {
    if !params.tel_alt_limits.contains(candidate.alt) {
        return INFEASIBLE_DELAY;
    }
    let current = state.position();
    let delta_alt = (candidate.alt - current.alt).abs();
    let raw_delta_az = (candidate.az - current.az).abs();
    let delta_az = raw_delta_az.min((raw_delta_az - TAU).abs());

    let tel_alt = uam_slew_time(delta_alt, params.tel_alt.max_speed, params.tel_alt.accel);
    let tel_az = uam_slew_time(delta_az, params.tel_az.max_speed, params.tel_az.accel);
    let open_loop = delta_alt * params.optics_ol_slope;
    let mut mount = tel_alt.max(tel_az) + open_loop;
    if mount > 0.0 {
        mount += (params.mount_settle_time - open_loop).max(0.0);
    }
    let telescope = mount.max(params.readout_time);

    let dome_time = match dome {
        DomeModel::ExactFollow => {
            let alt = uam_slew_time(delta_alt, params.dom_alt.max_speed, params.dom_alt.accel);
            let mut az = uam_slew_time(delta_az, params.dom_az.max_speed, params.dom_az.accel);
            if az > 0.0 {
                az += params.dome_settle_time;
            }
            alt.max(az)
        }
        DomeModel::DomeCrawl => dome_crawl_time(params, delta_alt, delta_az),
    };

    let mut slew = telescope.max(dome_time);
    if candidate.filter != current.filter {
        slew = slew.max(params.filter_change_time);
    }
    if let (Some(limit), Some(delay)) =
        (params.optics_cl_alt_limit.get(1), params.optics_cl_delay.get(1))
    {
        if delta_alt >= *limit {
            slew += delay;
        }
    }
    slew
}

/// Dome time when the field only has to fit inside the slit. Either the slit is centred in
/// altitude and azimuth only has to catch up to the slit edge, or the other way round; the
/// cheaper option wins.
fn dome_crawl_time(params: &ObservatoryParams, delta_alt: f64, delta_az: f64) -> f64 {
    let fov = params.field_of_view;
    if delta_alt.powi(2) + delta_az.powi(2) < fov.powi(2) {
        return 0.0;
    }
    let slit_diameter = fov / 2.0;
    let slack = 2.0 * (slit_diameter / 2.0 - fov / 2.0);
    let alt_speed = params.dom_alt.max_speed;
    let az_speed = params.dom_az.max_speed;

    let centred_alt = (delta_alt / alt_speed).max((delta_az - slack) / az_speed);
    let centred_az = ((delta_alt - slack) / alt_speed).max(delta_az / az_speed);
    centred_alt.min(centred_az)
}
