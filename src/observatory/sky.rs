use super::common::math::wrap_two_pi;
use super::config::SiteConfig;
use chrono::{DateTime, Utc};

const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const J2000_JD: f64 = 2_451_545.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_CENTURY: f64 = 36_525.0;

/// Conversions between the equatorial and the horizontal frame for one site.
///
/// Implementations must be pure: the same inputs always give the same outputs.
pub trait SkyCoordinates {
    /// Local sidereal time in radians at Unix time `time`.
    fn local_sidereal_time(&self, time: f64) -> f64;

    /// Converts `(ra, dec)` to `(alt, az, pa)` at `time`, all in radians.
    fn equatorial_to_horizontal(&self, time: f64, ra: f64, dec: f64) -> (f64, f64, f64);

    /// Converts `(alt, az)` to `(ra, dec, pa)` at `time`, all in radians.
    fn horizontal_to_equatorial(&self, time: f64, alt: f64, az: f64) -> (f64, f64, f64);
}

/// Geometric sky model of a ground site, without refraction or nutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiteCoordinates {
    latitude: f64,
    longitude: f64,
    height: f64,
}

impl SiteCoordinates {
    /// # Arguments
    /// - `latitude`, `longitude`: Geodetic site location in radians, east positive.
    /// - `height`: Elevation above sea level in meters.
    pub fn new(latitude: f64, longitude: f64, height: f64) -> Self {
        Self { latitude, longitude, height }
    }

    pub fn latitude(&self) -> f64 { self.latitude }
    pub fn longitude(&self) -> f64 { self.longitude }
    pub fn height(&self) -> f64 { self.height }
}

impl From<&SiteConfig> for SiteCoordinates {
    fn from(site: &SiteConfig) -> Self {
        Self::new(site.latitude.to_radians(), site.longitude.to_radians(), site.height)
    }
}

impl Default for SiteCoordinates {
    fn default() -> Self { Self::from(&SiteConfig::default()) }
}

impl SkyCoordinates for SiteCoordinates {
    fn local_sidereal_time(&self, time: f64) -> f64 {
        wrap_two_pi(greenwich_mean_sidereal_time(julian_date(time)) + self.longitude)
    }

    fn equatorial_to_horizontal(&self, time: f64, ra: f64, dec: f64) -> (f64, f64, f64) {
        let ha = self.local_sidereal_time(time) - ra;
        let (az, alt) = hour_angle_to_horizontal(ha, dec, self.latitude);
        let pa = wrap_two_pi(parallactic_angle(ha, dec, self.latitude));
        (alt, az, pa)
    }

    fn horizontal_to_equatorial(&self, time: f64, alt: f64, az: f64) -> (f64, f64, f64) {
        let (ha, dec) = horizontal_to_hour_angle(az, alt, self.latitude);
        let pa = wrap_two_pi(parallactic_angle(ha, dec, self.latitude));
        let ra = wrap_two_pi(self.local_sidereal_time(time) - ha);
        (ra, dec, pa)
    }
}

/// Julian date of a Unix timestamp in seconds.
pub fn julian_date(time: f64) -> f64 { time / SECONDS_PER_DAY + UNIX_EPOCH_JD }

/// Unix timestamp in seconds, the time scale used by the model.
#[allow(clippy::cast_precision_loss)]
pub fn timestamp(datetime: DateTime<Utc>) -> f64 { datetime.timestamp_micros() as f64 * 1e-6 }

/// Greenwich mean sidereal time in radians (IAU 1982 polynomial).
pub fn greenwich_mean_sidereal_time(jd: f64) -> f64 {
    let days = jd - J2000_JD;
    let t = days / DAYS_PER_CENTURY;
    let gmst_deg = 280.460_618_37 + 360.985_647_366_29 * days + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    wrap_two_pi(gmst_deg.to_radians())
}

/// `(az, el)` of hour angle `ha` and declination `dec` at latitude `phi`. Azimuth is in `[0, 2π)`.
fn hour_angle_to_horizontal(ha: f64, dec: f64, phi: f64) -> (f64, f64) {
    let (sh, ch) = ha.sin_cos();
    let (sd, cd) = dec.sin_cos();
    let (sp, cp) = phi.sin_cos();

    let x = -ch * cd * sp + sd * cp;
    let y = -sh * cd;
    let z = ch * cd * cp + sd * sp;
    let r = x.hypot(y);
    let az = if r == 0.0 { 0.0 } else { wrap_two_pi(y.atan2(x)) };
    (az, z.atan2(r))
}

/// `(ha, dec)` of azimuth `az` and elevation `el` at latitude `phi`.
fn horizontal_to_hour_angle(az: f64, el: f64, phi: f64) -> (f64, f64) {
    let (sa, ca) = az.sin_cos();
    let (se, ce) = el.sin_cos();
    let (sp, cp) = phi.sin_cos();

    let x = -ca * ce * sp + se * cp;
    let y = -sa * ce;
    let z = ca * ce * cp + se * sp;
    let r = x.hypot(y);
    let ha = if r == 0.0 { 0.0 } else { y.atan2(x) };
    (ha, z.atan2(r))
}

fn parallactic_angle(ha: f64, dec: f64, phi: f64) -> f64 {
    let cp = phi.cos();
    let sqsz = cp * ha.sin();
    let cqsz = phi.sin() * dec.cos() - cp * dec.sin() * ha.cos();
    if sqsz == 0.0 && cqsz == 0.0 { 0.0 } else { sqsz.atan2(cqsz) }
}
