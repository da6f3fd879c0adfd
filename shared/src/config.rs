//! Session configuration, loaded from RON.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::skier::SkierDef;
use crate::terrain::TerrainDef;

/// A point on the slope (x lateral, z downhill)
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct SlopePoint {
    pub x: f32,
    pub z: f32,
}

impl SlopePoint {
    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.z)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.z.is_finite()
    }
}

/// Skier starting point near the top of the run
pub const DEFAULT_START: SlopePoint = SlopePoint::new(0.0, -950.0);
pub const DEFAULT_LIFT_BOTTOM: SlopePoint = SlopePoint::new(0.0, 0.0);
pub const DEFAULT_LIFT_TOP: SlopePoint = SlopePoint::new(0.0, -800.0);

#[derive(Resource, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub terrain: TerrainDef,
    pub skier: SkierDef,
    pub start: SlopePoint,
    pub lift_bottom: SlopePoint,
    pub lift_top: SlopePoint,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainDef::default(),
            skier: SkierDef::default(),
            start: DEFAULT_START,
            lift_bottom: DEFAULT_LIFT_BOTTOM,
            lift_top: DEFAULT_LIFT_TOP,
        }
    }
}

impl SessionConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, String> {
        let config: Self = ron::from_str(text).map_err(|e| format!("Failed to parse session config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_ron_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.terrain.validate()?;
        self.skier.validate()?;
        for (name, point) in [
            ("start", self.start),
            ("lift_bottom", self.lift_bottom),
            ("lift_top", self.lift_top),
        ] {
            if !point.is_finite() {
                return Err(format!("{} must be finite, got ({}, {})", name, point.x, point.z));
            }
        }
        Ok(())
    }
}
