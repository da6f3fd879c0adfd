//! One skiing session: the slope, the skier and the chair lift, advanced together.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::input::SkiInput;
use crate::lift::ChairLift;
use crate::skier::{frame_dt, Orientation, SkierBody, StepReport};
use crate::terrain::{SurfaceType, TerrainField};

const MS_TO_KMH: f32 = 3.6;
const LEAN_FROM_WEIGHT: f32 = 0.3;
const LEAN_FROM_BALANCE: f32 = 0.2;

/// What a renderer needs to draw the skier for one frame
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RenderPose {
    pub position: Vec3,
    pub orientation: Orientation,
    pub left_edge_angle: f32,
    pub right_edge_angle: f32,
    pub stance_width: f32,
    pub speed: f32,
    pub speed_kmh: f32,
    /// Sideways body lean (radians)
    pub lean: f32,
    pub surface: SurfaceType,
    pub on_lift: bool,
}

#[derive(Resource, Clone, Debug)]
pub struct SkiSession {
    pub config: SessionConfig,
    pub terrain: TerrainField,
    pub skier: SkierBody,
    pub lift: ChairLift,
    pub frames: u64,
    pub elapsed: f32,
}

impl SkiSession {
    pub fn new(config: &SessionConfig) -> Result<Self, String> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Session from `config`, or from the defaults if `config` doesn't validate
    pub fn new_or_default(config: &SessionConfig) -> Self {
        match config.validate() {
            Ok(()) => Self::build(config),
            Err(e) => {
                warn!("Invalid session config ({}), using defaults", e);
                Self::build(&SessionConfig::default())
            }
        }
    }

    fn build(config: &SessionConfig) -> Self {
        let terrain = TerrainField::new(&config.terrain);
        let skier = SkierBody::standing(config.skier, &terrain, config.start.x, config.start.z);
        let lift = ChairLift::between(&terrain, config.lift_bottom.to_vec2(), config.lift_top.to_vec2());

        info!(
            "Ski session ready: skier at ({:.1}, {:.1}, {:.1}), lift {:.0}m",
            skier.position.x,
            skier.position.y,
            skier.position.z,
            lift.bottom.distance(lift.top)
        );

        Self {
            config: config.clone(),
            terrain,
            skier,
            lift,
            frames: 0,
            elapsed: 0.0,
        }
    }

    /// Advance the whole session by one frame. `dt` is bounded here, once, before
    /// the lift and the skier see it.
    pub fn frame(&mut self, dt: f32, input: &SkiInput) -> StepReport {
        let dt = frame_dt(dt);

        self.lift.advance(dt);
        let report = self.skier.step(dt, &self.terrain, input, Some(&self.lift));

        if self.lift.riding && self.lift.at_top() {
            self.lift.dismount();
            let top = self.lift.top;
            self.skier = SkierBody::standing(self.config.skier, &self.terrain, top.x, top.z);
            info!("Skier left the lift at ({:.1}, {:.1})", top.x, top.z);
        }

        self.frames += 1;
        self.elapsed += dt;
        report
    }

    /// Put the skier on a chair at the bottom station
    pub fn board_lift(&mut self) {
        self.lift.board();
        self.skier.has_started = false;
        self.skier.velocity = Vec3::ZERO;
        self.skier.position = self.lift.position();
    }

    /// Back to the start, standing still
    pub fn reset(&mut self) {
        self.lift.dismount();
        self.lift.progress = 0.0;
        self.skier = SkierBody::standing(
            self.config.skier,
            &self.terrain,
            self.config.start.x,
            self.config.start.z,
        );
        self.frames = 0;
        self.elapsed = 0.0;
    }

    pub fn pose(&self) -> RenderPose {
        let skier = &self.skier;
        let speed = skier.speed();
        RenderPose {
            position: skier.position,
            orientation: skier.orientation,
            left_edge_angle: skier.left_ski.edge_angle,
            right_edge_angle: skier.right_ski.edge_angle,
            stance_width: skier.stance_width,
            speed,
            speed_kmh: speed * MS_TO_KMH,
            lean: skier.weight_transfer * LEAN_FROM_WEIGHT + skier.balance * LEAN_FROM_BALANCE,
            surface: skier.surface,
            on_lift: self.lift.riding,
        }
    }
}
