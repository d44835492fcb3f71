//! Angle and range helpers shared by the integrator and the sensor model

use std::f64::consts::PI;

/// Normalize an angle to (-PI, PI]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut angle = angle;
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Euclidean distance between two points
pub fn distance(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()
}

/// Absolute bearing from an observer position to a target position
pub fn azimuth(from_x: f64, from_y: f64, to_x: f64, to_y: f64) -> f64 {
    (to_y - from_y).atan2(to_x - from_x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_wraps_into_half_open_range() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-5.0 * PI) - PI).abs() < 1e-12);
        assert_eq!(normalize_angle(0.0), 0.0);
        assert!((normalize_angle(PI) - PI).abs() < 1e-12);

        for raw in [-123.456, -7.0, -PI - 1e-9, 2.0 * PI, 42.0, 1e6] {
            let n = normalize_angle(raw);
            assert!(n > -PI && n <= PI, "normalize({raw}) = {n} out of range");
        }
    }

    #[test]
    fn azimuth_points_at_target() {
        assert!((azimuth(0.0, 0.0, 1.0, 0.0)).abs() < 1e-12);
        assert!((azimuth(0.0, 0.0, 0.0, 1.0) - PI / 2.0).abs() < 1e-12);
    }
}
