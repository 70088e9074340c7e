//! Command types for robot control and inter-task communication.
//!
//! [`GaitCommand`] is what the command transport hands the motion task;
//! [`ServoCommand`] is one leg's worth of joint angles on its way to the
//! actuator driver.
use core::fmt::{self, Display, Formatter};

use super::leg::Leg;

/// A command is never repeated more than this, whatever the client asked.
const MAX_REPEAT: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaitCommand {
    Sit,
    Stand,
    StepForward(u8),
    StepBack(u8),
    TurnLeft(u8),
    TurnRight(u8),
    HandWave(u8),
    HandShake(u8),
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseCommandError;

impl Display for ParseCommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("unrecognised gait command")
    }
}

impl TryFrom<&str> for GaitCommand {
    type Error = ParseCommandError;

    /// Parses `"<name> [repeat]"`. The repeat count defaults to 1 and is
    /// clamped to [`MAX_REPEAT`]; a malformed count falls back to 1.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut tokens = value.trim().split_whitespace();

        let cmd = tokens.next().ok_or(ParseCommandError)?;
        let times = tokens
            .next()
            .map(|s| s.parse::<u8>().unwrap_or(1))
            .unwrap_or(1)
            .min(MAX_REPEAT);

        match cmd {
            "sit" => Ok(GaitCommand::Sit),
            "stand" => Ok(GaitCommand::Stand),
            "sf" | "step_forward" => Ok(GaitCommand::StepForward(times)),
            "sb" | "step_back" => Ok(GaitCommand::StepBack(times)),
            "tl" | "turn_left" => Ok(GaitCommand::TurnLeft(times)),
            "tr" | "turn_right" => Ok(GaitCommand::TurnRight(times)),
            "wave" | "hand_wave" => Ok(GaitCommand::HandWave(times)),
            "shake" | "hand_shake" => Ok(GaitCommand::HandShake(times)),
            _ => Err(ParseCommandError),
        }
    }
}

/// One leg's servo angles in degrees, ordered `[femur, tibia, coxa]`.
/// The driver clamps to the 0..=180 servo range.
#[derive(Debug, Clone, Copy)]
pub struct ServoCommand {
    pub leg: Leg,
    pub angles: [f32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!(GaitCommand::try_from("stand"), Ok(GaitCommand::Stand));
        assert_eq!(GaitCommand::try_from("sit"), Ok(GaitCommand::Sit));
        assert_eq!(
            GaitCommand::try_from("sf 3"),
            Ok(GaitCommand::StepForward(3))
        );
        assert_eq!(
            GaitCommand::try_from("step_forward 3"),
            Ok(GaitCommand::StepForward(3))
        );
        assert_eq!(GaitCommand::try_from("tl"), Ok(GaitCommand::TurnLeft(1)));
        assert_eq!(
            GaitCommand::try_from("wave 2"),
            Ok(GaitCommand::HandWave(2))
        );
    }

    #[test]
    fn repeat_defaults_and_clamps() {
        assert_eq!(GaitCommand::try_from("sb"), Ok(GaitCommand::StepBack(1)));
        assert_eq!(
            GaitCommand::try_from("sb 99"),
            Ok(GaitCommand::StepBack(10))
        );
        // garbage counts fall back to a single run
        assert_eq!(
            GaitCommand::try_from("tr x"),
            Ok(GaitCommand::TurnRight(1))
        );
    }

    #[test]
    fn rejects_unknown_input() {
        assert_eq!(GaitCommand::try_from(""), Err(ParseCommandError));
        assert_eq!(GaitCommand::try_from("jump 2"), Err(ParseCommandError));
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(
            GaitCommand::try_from("  stand \r\n"),
            Ok(GaitCommand::Stand)
        );
    }
}
