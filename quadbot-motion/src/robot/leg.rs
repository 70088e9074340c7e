use core::fmt::Display;

pub const NB_LEGS: usize = 4;

/// Legs 0 and 3 share a mount orientation, as do 1 and 2; the two groups
/// need mirrored servo conventions (see `polar_to_servo`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    FrontLeft = 0,
    BottomLeft = 1,
    FrontRight = 2,
    BottomRight = 3,
}

impl Display for Leg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Leg::FrontLeft => f.write_str("Front left"),
            Leg::BottomLeft => f.write_str("Bottom left"),
            Leg::FrontRight => f.write_str("Front right"),
            Leg::BottomRight => f.write_str("Bottom right"),
        }
    }
}

impl From<usize> for Leg {
    fn from(value: usize) -> Self {
        match value {
            0 => Leg::FrontLeft,
            1 => Leg::BottomLeft,
            2 => Leg::FrontRight,
            _ => Leg::BottomRight,
        }
    }
}
