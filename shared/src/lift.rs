//! Chair lift between a bottom and a top station.
//!
//! While the skier is riding, the lift owns their position and no physics runs.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::terrain::TerrainField;

/// Stations sit this far above the snow
pub const STATION_CLEARANCE: f32 = 3.0;
/// Fraction of the line travelled per second
pub const LIFT_SPEED: f32 = 0.3;
/// Phase gap between consecutive chairs
pub const CHAIR_SPACING: f32 = 0.2;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChairLift {
    pub bottom: Vec3,
    pub top: Vec3,
    /// 0 = bottom station, 1 = top station
    pub progress: f32,
    pub speed: f32,
    pub riding: bool,
}

impl ChairLift {
    /// Build a lift between two slope positions (x, z), stations raised above the terrain
    pub fn between(terrain: &TerrainField, bottom: Vec2, top: Vec2) -> Self {
        let station = |at: Vec2| Vec3::new(at.x, terrain.height(at.x, at.y) + STATION_CLEARANCE, at.y);
        Self {
            bottom: station(bottom),
            top: station(top),
            progress: 0.0,
            speed: LIFT_SPEED,
            riding: false,
        }
    }

    /// Start a ride from the bottom station
    pub fn board(&mut self) {
        self.riding = true;
        self.progress = 0.0;
    }

    pub fn dismount(&mut self) {
        self.riding = false;
    }

    pub fn at_top(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn advance(&mut self, dt: f32) {
        if self.riding {
            self.progress = (self.progress + self.speed * dt).clamp(0.0, 1.0);
        }
    }

    /// Rider position along the cable
    pub fn position(&self) -> Vec3 {
        self.bottom.lerp(self.top, self.progress.clamp(0.0, 1.0))
    }

    /// Positions of `count` evenly phased chairs, for drawing
    pub fn chair_positions(&self, count: usize) -> Vec<Vec3> {
        (0..count)
            .map(|i| {
                let phase = (self.progress + i as f32 * CHAIR_SPACING).rem_euclid(1.0);
                self.bottom.lerp(self.top, phase)
            })
            .collect()
    }
}
