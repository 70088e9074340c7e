//! Physical and movement constants, plus the turn geometry derived from
//! them at boot.
use libm::{acosf, cosf, sinf, sqrtf};

// ROBOT SIZE
pub const LENGTH_A: f32 = 55.0;
pub const LENGTH_B: f32 = 77.5;
pub const LENGTH_C: f32 = 27.5;
pub const LENGTH_SIDE: f32 = 71.0;
pub const Z_ABSOLUTE: f32 = -28.0;

// CONST FOR MOVEMENT
pub const Z_DEFAULT: f32 = -50.0;
pub const Z_UP: f32 = -30.0;
pub const Z_BOOT: f32 = Z_ABSOLUTE;
pub const X_DEFAULT: f32 = 62.0;
pub const X_OFFSET: f32 = 0.0;
pub const Y_START: f32 = 0.0;
pub const Y_STEP: f32 = 40.0;

// SPEEDS
pub const SPEED_MULTIPLE: f32 = 1.0;
pub const SPOT_TURN_SPEED: f32 = 4.0;
pub const LEG_MOVE_SPEED: f32 = 8.0;
pub const BODY_MOVE_SPEED: f32 = 3.0;
pub const STAND_SEAT_SPEED: f32 = 1.0;

/// Tolerance for every position comparison. Interpolated coordinates drift
/// by additive rounding, so reach checks and phase detection must never use
/// exact float equality.
pub const EPSILON: f32 = 0.001;

/// Period of the motor update loop in milliseconds.
pub const UPDATE_PERIOD_MS: u64 = 20;

/// Turn-pivot coordinates and the intermediate triangle values they are
/// derived from. Built once at boot and owned by the state store; the
/// derivation cannot run twice.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub temp_a: f32,
    pub temp_b: f32,
    pub temp_c: f32,
    pub temp_alpha: f32,
    pub turn_x0: f32,
    pub turn_y0: f32,
    pub turn_x1: f32,
    pub turn_y1: f32,
}

impl Geometry {
    /// Solves the triangle spanned by a leg's home position and its two
    /// turn positions (law of cosines) to get the spot-turn pivot sites.
    pub fn new() -> Self {
        let span = 2.0 * X_DEFAULT + LENGTH_SIDE;
        let temp_a = sqrtf(span * span + Y_STEP * Y_STEP);
        let temp_b = 2.0 * (Y_START + Y_STEP) + LENGTH_SIDE;
        let far = 2.0 * Y_START + Y_STEP + LENGTH_SIDE;
        let temp_c = sqrtf(span * span + far * far);
        let temp_alpha = acosf(
            (temp_a * temp_a + temp_b * temp_b - temp_c * temp_c) / (2.0 * temp_a * temp_b),
        );

        let turn_x1 = (temp_a - LENGTH_SIDE) / 2.0;
        let turn_y1 = Y_START + Y_STEP / 2.0;
        let turn_x0 = turn_x1 - temp_b * cosf(temp_alpha);
        let turn_y0 = temp_b * sinf(temp_alpha) - turn_y1 - LENGTH_SIDE;

        Self {
            temp_a,
            temp_b,
            temp_c,
            temp_alpha,
            turn_x0,
            turn_y0,
            turn_x1,
            turn_y1,
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn triangle_closes() {
        let g = Geometry::new();
        // temp_alpha came out of an acos; reconstructing temp_c through the
        // law of cosines checks the argument stayed in domain.
        let c2 = g.temp_a * g.temp_a + g.temp_b * g.temp_b
            - 2.0 * g.temp_a * g.temp_b * cosf(g.temp_alpha);
        assert_abs_diff_eq!(sqrtf(c2), g.temp_c, epsilon = 5e-2);
        assert!(g.temp_c < g.temp_a + g.temp_b);
    }

    #[test]
    fn turn_sites() {
        let g = Geometry::new();
        assert_abs_diff_eq!(g.turn_x1, (g.temp_a - LENGTH_SIDE) / 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(g.turn_y1, Y_START + Y_STEP / 2.0, epsilon = 1e-4);
        // The outer pivot sits behind and outside the inner one.
        assert!(g.turn_x0 < g.turn_x1);
        assert!(g.turn_y0 > g.turn_y1);
    }
}
