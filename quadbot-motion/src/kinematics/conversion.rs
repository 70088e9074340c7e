//! Inverse and forward kinematics for one leg, plus the per-leg servo
//! mirroring.
//!
//! The leg is a two-link planar arm (`LENGTH_A`, `LENGTH_B`) on a yaw joint
//! whose horizontal reach is offset by the foot segment `LENGTH_C`. All
//! angles cross this boundary in degrees.
use core::f32::consts::PI;
use core::fmt::{self, Display, Formatter};

use libm::{acosf, atan2f, cosf, sinf, sqrtf};

use crate::robot::config::{LENGTH_A, LENGTH_B, LENGTH_C};
use crate::robot::leg::Leg;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IkError {
    /// The target lies outside the annulus the arm can reach, so the
    /// law-of-cosines argument left the arccosine domain.
    OutOfReach { x: f32, y: f32, z: f32 },
}

impl Display for IkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IkError::OutOfReach { x, y, z } => {
                write!(f, "target ({x:.1}, {y:.1}, {z:.1}) is out of reach")
            }
        }
    }
}

/// Solves the leg-local inverse kinematics.
///
/// Returns `(alpha, beta, gamma)` in degrees: hip elevation, knee interior
/// angle, and hip yaw. Unreachable targets are reported as [`IkError`]
/// rather than letting a NaN propagate towards the actuators.
pub fn cartesian_to_polar(x: f32, y: f32, z: f32) -> Result<(f32, f32, f32), IkError> {
    // horizontal reach, signed so legs can point backwards
    let w_sign = if x >= 0.0 { 1.0 } else { -1.0 };
    let w = w_sign * sqrtf(x * x + y * y);
    let v = w - LENGTH_C;

    let d_squared = v * v + z * z;
    let d = sqrtf(d_squared);

    let cos_hip = (LENGTH_A * LENGTH_A - LENGTH_B * LENGTH_B + d_squared) / (2.0 * LENGTH_A * d);
    let cos_knee =
        (LENGTH_A * LENGTH_A + LENGTH_B * LENGTH_B - d_squared) / (2.0 * LENGTH_A * LENGTH_B);
    // Catches targets beyond the annulus and the degenerate d == 0 pose,
    // where the quotients go infinite or NaN.
    if !(-1.0..=1.0).contains(&cos_hip) || !(-1.0..=1.0).contains(&cos_knee) {
        return Err(IkError::OutOfReach { x, y, z });
    }

    let alpha = atan2f(z, v) + acosf(cos_hip);
    let beta = acosf(cos_knee);
    let gamma = if w >= 0.0 {
        atan2f(y, x)
    } else {
        atan2f(-y, -x)
    };

    Ok((
        alpha * 180.0 / PI,
        beta * 180.0 / PI,
        gamma * 180.0 / PI,
    ))
}

/// Forward kinematics, the inverse of [`cartesian_to_polar`]. Used to
/// verify solved poses and for calibration tooling.
pub fn polar_to_cartesian(alpha: f32, beta: f32, gamma: f32) -> (f32, f32, f32) {
    let alpha = alpha * PI / 180.0;
    let beta = beta * PI / 180.0;
    let gamma = gamma * PI / 180.0;

    // the tibia folds back from the femur by the knee interior angle
    let v = LENGTH_A * cosf(alpha) + LENGTH_B * cosf(alpha + beta - PI);
    let z = LENGTH_A * sinf(alpha) + LENGTH_B * sinf(alpha + beta - PI);
    let w = v + LENGTH_C;

    (w * cosf(gamma), w * sinf(gamma), z)
}

/// Maps model angles to servo angles for one leg, ordered
/// `[femur, tibia, coxa]`.
///
/// Legs 0 and 3 are mounted mirrored with respect to legs 1 and 2, so the
/// two diagonal pairs need complementary angle conventions to move
/// symmetrically.
pub fn polar_to_servo(leg: Leg, alpha: f32, beta: f32, gamma: f32) -> [f32; 3] {
    match leg {
        Leg::FrontLeft | Leg::BottomRight => [90.0 - alpha, beta, gamma + 90.0],
        Leg::BottomLeft | Leg::FrontRight => [alpha + 90.0, 180.0 - beta, 90.0 - gamma],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::config::{X_DEFAULT, Y_STEP, Z_BOOT, Z_DEFAULT, Z_UP};
    use approx::assert_abs_diff_eq;

    fn round_trip(x: f32, y: f32, z: f32) {
        let (alpha, beta, gamma) = cartesian_to_polar(x, y, z).expect("pose should be reachable");
        let (rx, ry, rz) = polar_to_cartesian(alpha, beta, gamma);
        assert_abs_diff_eq!(rx, x, epsilon = 1e-3);
        assert_abs_diff_eq!(ry, y, epsilon = 1e-3);
        assert_abs_diff_eq!(rz, z, epsilon = 1e-3);
    }

    #[test]
    fn round_trips_over_working_poses() {
        round_trip(X_DEFAULT, 0.0, Z_DEFAULT);
        round_trip(X_DEFAULT, Y_STEP, Z_DEFAULT);
        round_trip(X_DEFAULT, 2.0 * Y_STEP, Z_UP);
        round_trip(X_DEFAULT, 0.0, Z_BOOT);
        round_trip(X_DEFAULT - 30.0, 2.0 * Y_STEP, 55.0);
        round_trip(33.7, 56.9, 50.0);
    }

    #[test]
    fn solves_a_known_pose() {
        let (alpha, beta, gamma) = cartesian_to_polar(62.0, 50.0, -50.0).unwrap();
        assert_abs_diff_eq!(alpha, 29.85, epsilon = 0.1);
        assert_abs_diff_eq!(beta, 63.44, epsilon = 0.1);
        assert_abs_diff_eq!(gamma, 38.88, epsilon = 0.1);
    }

    #[test]
    fn yaw_flips_for_backward_reach() {
        let (_, _, forward) = cartesian_to_polar(62.0, 50.0, -50.0).unwrap();
        let (_, _, backward) = cartesian_to_polar(-62.0, 50.0, -50.0).unwrap();
        assert_abs_diff_eq!(backward, -forward, epsilon = 1e-3);
    }

    #[test]
    fn rejects_targets_outside_the_annulus() {
        // far beyond LENGTH_A + LENGTH_B
        assert!(cartesian_to_polar(300.0, 0.0, -50.0).is_err());
        assert!(cartesian_to_polar(0.0, 250.0, 100.0).is_err());
        // degenerate pose right on the hip axis, d == 0
        assert!(cartesian_to_polar(LENGTH_C, 0.0, 0.0).is_err());
    }

    #[test]
    fn never_reports_nan_angles() {
        for &(x, y, z) in &[
            (300.0, 0.0, -50.0),
            (LENGTH_C, 0.0, 0.0),
            (0.0, 0.0, 0.0),
            (62.0, 0.0, -50.0),
        ] {
            if let Ok((a, b, g)) = cartesian_to_polar(x, y, z) {
                assert!(!a.is_nan() && !b.is_nan() && !g.is_nan());
            }
        }
    }

    #[test]
    fn mirrored_mounts_get_complementary_angles() {
        let (alpha, beta, gamma) = (30.0, 60.0, 15.0);

        let fl = polar_to_servo(Leg::FrontLeft, alpha, beta, gamma);
        let br = polar_to_servo(Leg::BottomRight, alpha, beta, gamma);
        let bl = polar_to_servo(Leg::BottomLeft, alpha, beta, gamma);
        let fr = polar_to_servo(Leg::FrontRight, alpha, beta, gamma);

        // same mount orientation, same mapping
        assert_eq!(fl, br);
        assert_eq!(bl, fr);

        assert_eq!(fl, [60.0, 60.0, 105.0]);
        assert_eq!(bl, [120.0, 120.0, 75.0]);
    }
}
