//! Wire command grammar for the arm controller.
//!
//! A regular command is four underscore-joined ASCII fields ending in the
//! literal terminator, e.g. `s_90_1_n`. Two irregular two-byte signals live
//! outside that grammar: `Zn` (home posture) and `gn` (claw toggle).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminator character closing every wire command
pub const COMMAND_TERMINATOR: char = 'n';

/// Irregular claw-toggle signal
pub const GRAB_COMMAND: &str = "gn";

/// Irregular home-posture signal
pub const RESET_COMMAND: &str = "Zn";

/// Largest angle the wrist servos accept, in degrees
pub const MAX_ANGLE_DEGREES: u32 = 180;

/// Joints addressable through the four-field grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actuator {
    /// Shoulder joint, stepped moves
    Shoulder,
    /// Elbow joint, stepped moves with inverted wire polarity
    Elbow,
    /// Base rotation, stepped moves
    Base,
    /// Wrist pitch servo, absolute angles
    WristPitch,
    /// Wrist roll servo, absolute angles
    WristRoll,
}

impl Actuator {
    /// Every addressable joint, wire-tag order
    pub const ALL: [Actuator; 5] = [
        Actuator::Shoulder,
        Actuator::Elbow,
        Actuator::Base,
        Actuator::WristPitch,
        Actuator::WristRoll,
    ];

    /// Single-character wire tag
    pub fn tag(&self) -> char {
        match self {
            Self::Shoulder => 's',
            Self::Elbow => 'e',
            Self::Base => 'b',
            Self::WristPitch => 'w',
            Self::WristRoll => 'r',
        }
    }

    /// Reverse lookup from a wire tag
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            's' => Some(Self::Shoulder),
            'e' => Some(Self::Elbow),
            'b' => Some(Self::Base),
            'w' => Some(Self::WristPitch),
            'r' => Some(Self::WristRoll),
            _ => None,
        }
    }

    /// Human-readable joint name, never sent on the wire
    pub fn label(&self) -> &'static str {
        match self {
            Self::Shoulder => "Shoulder",
            Self::Elbow => "Elbow",
            Self::Base => "Base",
            Self::WristPitch => "Wrist pitch",
            Self::WristRoll => "Wrist roll",
        }
    }

    /// True for servos that take an absolute angle instead of a step
    pub fn is_angle(&self) -> bool {
        matches!(self, Self::WristPitch | Self::WristRoll)
    }

    /// True when the joint's wire sign bit is inverted relative to the others
    pub fn inverted_polarity(&self) -> bool {
        matches!(self, Self::Elbow)
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sign bit of the third wire field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Wire bit 0
    Negative,
    /// Wire bit 1
    Positive,
}

impl Direction {
    /// Wire representation of the bit
    pub fn bit(&self) -> u8 {
        match self {
            Self::Negative => 0,
            Self::Positive => 1,
        }
    }

    /// Reverse lookup from a wire bit
    pub fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0 => Some(Self::Negative),
            1 => Some(Self::Positive),
            _ => None,
        }
    }

    /// The opposite sign
    pub fn flipped(&self) -> Self {
        match self {
            Self::Negative => Self::Positive,
            Self::Positive => Self::Negative,
        }
    }
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Input does not satisfy the command grammar
    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

/// One instruction for the arm controller.
///
/// Values are immutable once constructed; the checked constructors
/// [`Command::step`] and [`Command::angle`] are the only way to build a
/// `Move`, so every held value has a valid wire rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Joint movement: a relative step for shoulder/elbow/base, an absolute
    /// angle for the wrist servos. `direction` is the wire-level sign bit.
    Move {
        /// Target joint
        actuator: Actuator,
        /// Step size or absolute angle in degrees
        degrees: u32,
        /// Wire sign bit (fixed to `Negative` for angle servos)
        direction: Direction,
    },
    /// Claw open/close toggle (`gn`)
    Grab,
    /// Return every joint to its home posture (`Zn`)
    Reset,
}

impl Command {
    /// Build a stepped move for an arrow-style joint.
    ///
    /// `direction` is the logical sign; the elbow's wire polarity is inverted
    /// here so callers never deal with the quirk.
    pub fn step(actuator: Actuator, degrees: u32, direction: Direction) -> Result<Self, DecodeError> {
        if actuator.is_angle() {
            return Err(DecodeError::MalformedCommand(format!(
                "{} takes absolute angles, not steps",
                actuator.label()
            )));
        }
        let direction = if actuator.inverted_polarity() {
            direction.flipped()
        } else {
            direction
        };
        Ok(Self::Move {
            actuator,
            degrees,
            direction,
        })
    }

    /// Build an absolute angle command for a wrist servo.
    pub fn angle(actuator: Actuator, degrees: u32) -> Result<Self, DecodeError> {
        if !actuator.is_angle() {
            return Err(DecodeError::MalformedCommand(format!(
                "{} takes steps, not absolute angles",
                actuator.label()
            )));
        }
        if degrees > MAX_ANGLE_DEGREES {
            return Err(DecodeError::MalformedCommand(format!(
                "angle {} exceeds {} degrees",
                degrees, MAX_ANGLE_DEGREES
            )));
        }
        // Angle servos always carry a zero sign bit.
        Ok(Self::Move {
            actuator,
            degrees,
            direction: Direction::Negative,
        })
    }

    /// Render the command as its exact wire bytes. Total for any held value.
    pub fn encode(&self) -> String {
        match self {
            Self::Move {
                actuator,
                degrees,
                direction,
            } => format!(
                "{}_{}_{}_{}",
                actuator.tag(),
                degrees,
                direction.bit(),
                COMMAND_TERMINATOR
            ),
            Self::Grab => GRAB_COMMAND.to_string(),
            Self::Reset => RESET_COMMAND.to_string(),
        }
    }

    /// Parse one wire command.
    ///
    /// The two irregular signals are matched verbatim first; everything else
    /// must be exactly four underscore-joined fields with a digits-only
    /// magnitude, a 0/1 sign bit, a known joint tag and the closing
    /// terminator. Angle servos additionally require a zero sign bit and a
    /// magnitude within range.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        match text {
            GRAB_COMMAND => return Ok(Self::Grab),
            RESET_COMMAND => return Ok(Self::Reset),
            _ => {}
        }

        let fields: Vec<&str> = text.split('_').collect();
        if fields.len() != 4 {
            return Err(malformed(text));
        }
        let (tag_field, magnitude_field, direction_field, terminator_field) =
            (fields[0], fields[1], fields[2], fields[3]);

        let mut terminator = terminator_field.chars();
        if terminator.next() != Some(COMMAND_TERMINATOR) || terminator.next().is_some() {
            return Err(malformed(text));
        }

        let mut tag = tag_field.chars();
        let actuator = match (tag.next(), tag.next()) {
            (Some(c), None) => Actuator::from_tag(c).ok_or_else(|| malformed(text))?,
            _ => return Err(malformed(text)),
        };

        if magnitude_field.is_empty() || !magnitude_field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(text));
        }
        let degrees: u32 = magnitude_field.parse().map_err(|_| malformed(text))?;

        let direction = match direction_field {
            "0" => Direction::Negative,
            "1" => Direction::Positive,
            _ => return Err(malformed(text)),
        };

        if actuator.is_angle() && (direction != Direction::Negative || degrees > MAX_ANGLE_DEGREES)
        {
            return Err(malformed(text));
        }

        Ok(Self::Move {
            actuator,
            degrees,
            direction,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn malformed(text: &str) -> DecodeError {
    DecodeError::MalformedCommand(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_shoulder_step() {
        let cmd = Command::step(Actuator::Shoulder, 90, Direction::Positive).unwrap();
        assert_eq!(cmd.encode(), "s_90_1_n");
    }

    #[test]
    fn test_encode_irregular_signals() {
        assert_eq!(Command::Grab.encode(), "gn");
        assert_eq!(Command::Reset.encode(), "Zn");
    }

    #[test]
    fn test_elbow_polarity_is_inverted() {
        let up = Command::step(Actuator::Elbow, 10, Direction::Positive).unwrap();
        let down = Command::step(Actuator::Elbow, 10, Direction::Negative).unwrap();
        assert_eq!(up.encode(), "e_10_0_n");
        assert_eq!(down.encode(), "e_10_1_n");
    }

    #[test]
    fn test_angle_carries_zero_sign_bit() {
        let cmd = Command::angle(Actuator::WristPitch, 90).unwrap();
        assert_eq!(cmd.encode(), "w_90_0_n");
    }

    #[test]
    fn test_constructors_reject_wrong_joint_class() {
        assert!(Command::step(Actuator::WristRoll, 10, Direction::Positive).is_err());
        assert!(Command::angle(Actuator::Base, 90).is_err());
    }

    #[test]
    fn test_angle_range_is_checked() {
        assert!(Command::angle(Actuator::WristRoll, 180).is_ok());
        assert!(Command::angle(Actuator::WristRoll, 181).is_err());
    }

    #[test]
    fn test_decode_round_trip_steps() {
        for actuator in [Actuator::Shoulder, Actuator::Elbow, Actuator::Base] {
            for direction in [Direction::Negative, Direction::Positive] {
                for degrees in [0, 1, 10, 359] {
                    let cmd = Command::step(actuator, degrees, direction).unwrap();
                    assert_eq!(Command::decode(&cmd.encode()), Ok(cmd));
                }
            }
        }
    }

    #[test]
    fn test_decode_round_trip_angles() {
        for actuator in [Actuator::WristPitch, Actuator::WristRoll] {
            for degrees in [0, 90, 180] {
                let cmd = Command::angle(actuator, degrees).unwrap();
                assert_eq!(Command::decode(&cmd.encode()), Ok(cmd));
            }
        }
    }

    #[test]
    fn test_decode_irregular_signals() {
        assert_eq!(Command::decode("gn"), Ok(Command::Grab));
        assert_eq!(Command::decode("Zn"), Ok(Command::Reset));
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        let bad = [
            "",
            "n",
            "gN",
            "ZN",
            "g_n",
            "s_90_1",
            "s_90_1_N",
            "s_90_1_n_x",
            "s_90_1_nn",
            "q_90_1_n",
            "ss_90_1_n",
            "_90_1_n",
            "s__1_n",
            "s_+5_1_n",
            "s_-5_1_n",
            "s_9.5_1_n",
            "s_90_2_n",
            "s_90__n",
            "w_90_1_n",
            "w_200_0_n",
        ];
        for input in bad {
            assert!(
                matches!(Command::decode(input), Err(DecodeError::MalformedCommand(_))),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_decode_tolerates_leading_zeros() {
        let cmd = Command::decode("s_010_1_n").unwrap();
        assert_eq!(cmd, Command::step(Actuator::Shoulder, 10, Direction::Positive).unwrap());
        // The canonical rendering drops them.
        assert_eq!(cmd.encode(), "s_10_1_n");
    }

    #[test]
    fn test_display_is_wire_form() {
        let cmd = Command::step(Actuator::Base, 5, Direction::Negative).unwrap();
        assert_eq!(cmd.to_string(), "b_5_0_n");
    }
}
