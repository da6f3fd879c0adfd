//! Per-frame skier controls.
//!
//! Whatever collects raw input (keyboard, gamepad, a script) writes one of these
//! before each tick. The simulation never reads devices directly.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Control input for one simulation tick
#[derive(Resource, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct SkiInput {
    /// -1 = all weight on the left ski, +1 = all on the right
    pub weight_transfer: f32,
    /// -1 = carve left, +1 = carve right
    pub turn_input: f32,
    /// Stance width change rate (meters per second)
    pub stance_change: f32,
    /// Target edge angle change rate
    pub edge_change: f32,
    /// Push off (or push again when stopped)
    pub start_requested: bool,
}

impl SkiInput {
    /// Copy with axes clamped to [-1, 1] and non-finite values zeroed
    pub fn sanitized(&self) -> Self {
        fn finite_or_zero(value: f32) -> f32 {
            if value.is_finite() {
                value
            } else {
                0.0
            }
        }

        Self {
            weight_transfer: finite_or_zero(self.weight_transfer).clamp(-1.0, 1.0),
            turn_input: finite_or_zero(self.turn_input).clamp(-1.0, 1.0),
            stance_change: finite_or_zero(self.stance_change),
            edge_change: finite_or_zero(self.edge_change),
            start_requested: self.start_requested,
        }
    }

    /// Input that only requests a push-off
    pub fn push_off() -> Self {
        Self {
            start_requested: true,
            ..default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_clamps_axes() {
        let input = SkiInput {
            weight_transfer: 3.0,
            turn_input: -7.5,
            stance_change: 0.2,
            edge_change: -0.01,
            start_requested: true,
        }
        .sanitized();

        assert_eq!(input.weight_transfer, 1.0);
        assert_eq!(input.turn_input, -1.0);
        assert_eq!(input.stance_change, 0.2);
        assert_eq!(input.edge_change, -0.01);
        assert!(input.start_requested);
    }

    #[test]
    fn test_sanitized_drops_non_finite() {
        let input = SkiInput {
            weight_transfer: f32::NAN,
            turn_input: f32::INFINITY,
            stance_change: f32::NEG_INFINITY,
            edge_change: f32::NAN,
            start_requested: false,
        }
        .sanitized();

        assert_eq!(input, SkiInput::default());
    }

    #[test]
    fn test_partial_ron_input() {
        let input: SkiInput = ron::from_str("(turn_input: 0.5)").unwrap();
        assert_eq!(input.turn_input, 0.5);
        assert!(!input.start_requested);
    }
}
