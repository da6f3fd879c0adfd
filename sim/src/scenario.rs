//! Scripted runs: a session config plus timed control inputs, loaded from RON.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use ski_shared::{SessionConfig, SkiInput};

/// Input held from `at` seconds until the next segment starts
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InputSegment {
    pub at: f32,
    #[serde(default)]
    pub input: SkiInput,
}

#[derive(Resource, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Scenario {
    pub session: SessionConfig,
    /// Seconds of simulated time before the run exits
    pub duration: f32,
    /// Seconds between pose reports
    pub report_every: f32,
    pub segments: Vec<InputSegment>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            duration: 30.0,
            report_every: 1.0,
            segments: vec![InputSegment {
                at: 0.0,
                input: SkiInput::push_off(),
            }],
        }
    }
}

impl Scenario {
    pub fn from_ron_str(text: &str) -> Result<Self, String> {
        let scenario: Self = ron::from_str(text).map_err(|e| format!("Failed to parse scenario: {}", e))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_ron_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.session.validate()?;
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(format!("duration must be positive, got {}", self.duration));
        }
        if !self.report_every.is_finite() || self.report_every <= 0.0 {
            return Err(format!("report_every must be positive, got {}", self.report_every));
        }
        if let Some(pair) = self.segments.windows(2).find(|pair| pair[1].at < pair[0].at) {
            return Err(format!(
                "segments out of order: {} comes after {}",
                pair[1].at, pair[0].at
            ));
        }
        Ok(())
    }

    /// Index of the segment active at `time`, if any has started
    pub fn segment_at(&self, time: f32) -> Option<usize> {
        self.segments.iter().rposition(|segment| segment.at <= time)
    }
}

/// Playback position in the scenario script
#[derive(Resource, Default, Debug)]
pub struct ScriptPlayer {
    pub current: Option<usize>,
    pub next_report: f32,
}

impl ScriptPlayer {
    /// New input to apply at `time`, only when a segment boundary was crossed.
    /// Applying once keeps a push-off request from firing every tick.
    pub fn advance<'a>(&mut self, scenario: &'a Scenario, time: f32) -> Option<&'a SkiInput> {
        let index = scenario.segment_at(time);
        if index == self.current {
            return None;
        }
        self.current = index;
        index.map(|i| &scenario.segments[i].input)
    }

    /// True once per `report_every` seconds of simulated time
    pub fn report_due(&mut self, scenario: &Scenario, time: f32) -> bool {
        if time + 1e-4 < self.next_report {
            return false;
        }
        self.next_report += scenario.report_every;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOWNHILL: &str = include_str!("../assets/downhill.ron");

    #[test]
    fn test_bundled_scenario_parses() {
        let scenario = Scenario::from_ron_str(DOWNHILL).unwrap();
        assert!(scenario.duration > 0.0);
        assert!(!scenario.segments.is_empty());
        assert!(scenario.segments[0].input.start_requested);
    }

    #[test]
    fn test_empty_scenario_is_default() {
        assert_eq!(Scenario::from_ron_str("()").unwrap(), Scenario::default());
    }

    #[test]
    fn test_rejects_unordered_segments() {
        let err = Scenario::from_ron_str("(segments: [(at: 2.0), (at: 1.0)])").unwrap_err();
        assert!(err.contains("out of order"));
        assert!(Scenario::from_ron_str("(duration: 0.0)").is_err());
    }

    #[test]
    fn test_segment_lookup() {
        let scenario = Scenario::from_ron_str(
            "(segments: [(at: 1.0), (at: 2.0, input: (turn_input: 1.0)), (at: 4.0)])",
        )
        .unwrap();

        assert_eq!(scenario.segment_at(0.5), None);
        assert_eq!(scenario.segment_at(1.0), Some(0));
        assert_eq!(scenario.segment_at(3.9), Some(1));
        assert_eq!(scenario.segment_at(100.0), Some(2));
    }

    #[test]
    fn test_player_applies_each_segment_once() {
        let scenario = Scenario::default();
        let mut player = ScriptPlayer::default();

        let first = player.advance(&scenario, 0.0).cloned();
        assert_eq!(first, Some(SkiInput::push_off()));
        assert_eq!(player.advance(&scenario, 0.5), None);
        assert_eq!(player.advance(&scenario, 1.0), None);
    }

    #[test]
    fn test_reports_on_schedule() {
        let scenario = Scenario::default();
        let mut player = ScriptPlayer::default();

        let due: Vec<bool> = [0.0, 0.5, 1.0, 1.5, 2.0]
            .iter()
            .map(|t| player.report_due(&scenario, *t))
            .collect();
        assert_eq!(due, vec![true, false, true, false, true]);
    }
}
