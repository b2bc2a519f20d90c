use num::Float;
use std::f64::consts::{PI, TAU};

/// Floored modulo: the result always carries the sign of the divisor.
///
/// # Arguments
/// - `a`: The dividend.
/// - `b`: The divisor.
///
/// # Returns
/// - `a mod b` in `[0, b)` for positive `b`.
pub fn fmod<T: Float>(a: T, b: T) -> T {
    let rem = a % b;
    if rem != T::zero() && (rem < T::zero()) != (b < T::zero()) { rem + b } else { rem }
}

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_two_pi(angle: f64) -> f64 { fmod(angle, TAU) }

/// Motion time of a single axis moving `distance` with a trapezoidal velocity profile.
///
/// Travel inside `free_range` is treated as already settled. Outside of it the axis enters and
/// leaves the profile at the speed reachable by ramping across the free range.
///
/// # Arguments
/// - `distance`: The signed travel in radians.
/// - `max_speed`: The axis speed limit in rad/s.
/// - `accel`: The axis acceleration in rad/s².
/// - `decel`: The axis deceleration in rad/s².
/// - `free_range`: The crawl zone in radians, `0.0` if the axis has none.
///
/// # Returns
/// - A tuple `(delay, peak)` with the delay in seconds and the peak speed carrying the sign of
///   `distance`.
pub fn kinematic_delay(
    distance: f64,
    max_speed: f64,
    accel: f64,
    decel: f64,
    free_range: f64,
) -> (f64, f64) {
    let d = distance.abs();
    let ramp = 1.0 / accel + 1.0 / decel;
    let v_crawl = (2.0 * free_range / ramp).sqrt().min(max_speed);

    let (delay, peak) = if d <= free_range {
        (0.0, v_crawl)
    } else {
        let v_peak = (2.0 * d / ramp).sqrt();
        if v_peak <= max_speed {
            ((v_peak - v_crawl) * ramp, v_peak)
        } else {
            let d1 = (0.5 * max_speed * max_speed / accel - free_range * accel / (accel + decel))
                .max(0.0);
            let d3 = (0.5 * max_speed * max_speed / decel - free_range * decel / (accel + decel))
                .max(0.0);
            let d2 = d - d1 - d3 - free_range;
            let t1 = (max_speed - v_crawl) / accel;
            let t3 = (max_speed - v_crawl) / decel;
            let t2 = d2 / max_speed;
            (t1 + t2 + t3, max_speed)
        }
    };

    if distance < 0.0 { (delay, -peak) } else { (delay, peak) }
}

/// Unsigned uniform-acceleration slew time with `accel == decel` and no crawl zone.
///
/// Only the bulk estimator uses this; authoritative delays go through [`kinematic_delay`].
pub fn uam_slew_time(distance: f64, max_speed: f64, accel: f64) -> f64 {
    let d = distance.abs();
    let d_max = max_speed * max_speed / accel;
    if d < d_max {
        2.0 * (d / accel).sqrt()
    } else {
        2.0 * max_speed / accel + (d - d_max) / max_speed
    }
}

/// Shortest travel from `current` to `target` on a possibly cable-wrapped axis.
///
/// With a lower bound the target is first normalized into `[min, min + 2π)`; a normalized target
/// beyond `max` is reflected by `π`. With both bounds the travel direction flips by a full turn
/// whenever the accumulated angle would leave the padded range.
///
/// # Arguments
/// - `target`: The requested angle in radians.
/// - `current`: The accumulated axis angle in radians.
/// - `bounds`: Optional `(min, max)` limits in radians.
/// - `padding`: Keep-out margin inside the limits in radians.
///
/// # Returns
/// - A tuple `(final_angle, signed_distance)`.
pub fn closest_angle_distance(
    target: f64,
    current: f64,
    bounds: Option<(f64, f64)>,
    padding: f64,
) -> (f64, f64) {
    let norm_target = match bounds {
        Some((min, max)) => {
            let norm = normalize_from(target, min);
            if norm > max { min.max(norm - PI) } else { norm }
        }
        None => target,
    };

    let mut distance = fmod(norm_target - current, TAU);
    if distance > PI {
        distance -= TAU;
    }

    if let Some((min, max)) = bounds {
        let accumulated = current + distance;
        if accumulated > max - padding {
            distance -= TAU;
        }
        if accumulated < min + padding {
            distance += TAU;
        }
    }

    (current + distance, distance)
}

/// Normalizes `angle` into `[min, min + 2π)`.
pub fn normalize_from(angle: f64, min: f64) -> f64 { fmod(angle - min, TAU) + min }
