//! Skier physics - simplified two-ski model glued to the snow.
//!
//! This is not a rigid body. The skier:
//! - Rides the terrain surface (never airborne, never below the snow)
//! - Is always driven forward along the heading and can't stall
//! - Carves by edging the skis; weight transfer splits the load between them
//!
//! Every step ends with a single constraint pass (non-finite recovery, ground clamp,
//! minimum forward speed) so both invariants hold whatever the force model did.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::input::SkiInput;
use crate::lift::ChairLift;
use crate::terrain::{SurfaceSample, SurfaceType, TerrainField};

// =============================================================================
// SKIER TUNING CONSTANTS
// =============================================================================

pub mod tuning {
    pub const GRAVITY: f32 = 9.81;
    pub const AIR_DENSITY: f32 = 1.2;
    pub const SKI_MASS: f32 = 2.0;             // kg per ski
    pub const BODY_MASS: f32 = 70.0;           // kg
    pub const MASS: f32 = SKI_MASS * 2.0 + BODY_MASS;

    /// Gap between the skier's reference point and the snow so the skis render above it
    pub const SURFACE_OFFSET: f32 = 0.2;
    /// A ski counts as on the ground within this height of the surface
    pub const GROUND_TOLERANCE: f32 = 0.8;
    /// Further above the surface than this and the skier is pulled back down
    pub const SNAP_TOLERANCE: f32 = 0.2;

    pub const STANCE_MIN: f32 = 0.2;           // meters
    pub const STANCE_MAX: f32 = 0.6;
    pub const STANCE_DEFAULT: f32 = 0.4;
    pub const EDGE_LIMIT: f32 = std::f32::consts::FRAC_PI_3;
    pub const EDGE_RATE: f32 = 2.0;

    pub const TURN_DEADZONE: f32 = 0.1;
    /// Extra turn rate per m/s of speed (carving tightens with speed)
    pub const TURN_SPEED_GAIN: f32 = 0.1;

    pub const WEIGHT_TRANSFER_GAIN: f32 = 0.4;
    pub const WEIGHT_MIN: f32 = 0.1;
    pub const WEIGHT_MAX: f32 = 0.9;
    pub const BALANCE_CORRECTION: f32 = 0.3;

    pub const FRICTION_SCALE: f32 = 0.1;
    /// Forward friction is this fraction of lateral friction
    pub const FORWARD_FRICTION_FACTOR: f32 = 0.1;
    /// Edging relieves this much of the sliding friction
    pub const EDGE_FRICTION_RELIEF: f32 = 0.7;
    pub const TURN_FORCE_GAIN: f32 = 0.1;
    pub const AIR_DRAG: f32 = 0.005;

    pub const FORWARD_THRUST: f32 = 15.0;      // m/s^2 along the heading
    /// Thrust lost at a 90 degree heading
    pub const TURN_THRUST_PENALTY: f32 = 0.4;
    /// |yaw| beyond this counts as turning
    pub const TURNING_YAW: f32 = 0.1;
    pub const MAX_SPEED: f32 = 27.8;           // m/s (100 km/h)
    pub const MAX_SPEED_TURNING: f32 = 22.0;
    pub const MIN_SPEED: f32 = 10.0;
    pub const MIN_SPEED_TURNING: f32 = 6.0;

    pub const TORQUE_GAIN: f32 = 0.02;
    pub const ANGULAR_DAMPING: f32 = 0.98;     // per step
    pub const MAX_ANGULAR_VELOCITY: f32 = 2.0;
    pub const ROTATION_RATE: f32 = 0.5;
    /// Pitch and roll decay per step (keeps the skier upright)
    pub const UPRIGHT_DAMPING: f32 = 0.95;

    pub const BALANCE_GAIN: f32 = 0.5;
    pub const BALANCE_DECAY: f32 = 0.92;       // per step

    pub const START_PUSH: f32 = 10.0;          // m/s
    /// Below this speed a start request pushes again
    pub const RESTART_SPEED: f32 = 2.0;

    pub const RECOVERY_SPEED: f32 = 10.0;
    pub const RECOVERY_HEIGHT: f32 = 100.0;

    /// Longest step we integrate; longer frame gaps are truncated
    pub const MAX_FRAME_DT: f32 = 0.1;
}

/// Tuning values for a skier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkierDef {
    pub mass: f32,
    pub gravity: f32,
    pub air_density: f32,
    pub surface_offset: f32,
    pub ground_tolerance: f32,
    pub snap_tolerance: f32,
    pub stance_min: f32,
    pub stance_max: f32,
    pub stance_default: f32,
    pub edge_limit: f32,
    pub edge_rate: f32,
    pub turn_deadzone: f32,
    pub turn_speed_gain: f32,
    pub weight_transfer_gain: f32,
    pub forward_thrust: f32,
    pub turn_thrust_penalty: f32,
    pub turning_yaw: f32,
    pub max_speed: f32,
    pub max_speed_turning: f32,
    pub min_speed: f32,
    pub min_speed_turning: f32,
    pub start_push: f32,
    pub restart_speed: f32,
}

impl Default for SkierDef {
    fn default() -> Self {
        Self {
            mass: tuning::MASS,
            gravity: tuning::GRAVITY,
            air_density: tuning::AIR_DENSITY,
            surface_offset: tuning::SURFACE_OFFSET,
            ground_tolerance: tuning::GROUND_TOLERANCE,
            snap_tolerance: tuning::SNAP_TOLERANCE,
            stance_min: tuning::STANCE_MIN,
            stance_max: tuning::STANCE_MAX,
            stance_default: tuning::STANCE_DEFAULT,
            edge_limit: tuning::EDGE_LIMIT,
            edge_rate: tuning::EDGE_RATE,
            turn_deadzone: tuning::TURN_DEADZONE,
            turn_speed_gain: tuning::TURN_SPEED_GAIN,
            weight_transfer_gain: tuning::WEIGHT_TRANSFER_GAIN,
            forward_thrust: tuning::FORWARD_THRUST,
            turn_thrust_penalty: tuning::TURN_THRUST_PENALTY,
            turning_yaw: tuning::TURNING_YAW,
            max_speed: tuning::MAX_SPEED,
            max_speed_turning: tuning::MAX_SPEED_TURNING,
            min_speed: tuning::MIN_SPEED,
            min_speed_turning: tuning::MIN_SPEED_TURNING,
            start_push: tuning::START_PUSH,
            restart_speed: tuning::RESTART_SPEED,
        }
    }
}

impl SkierDef {
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("mass", self.mass),
            ("gravity", self.gravity),
            ("air_density", self.air_density),
            ("surface_offset", self.surface_offset),
            ("ground_tolerance", self.ground_tolerance),
            ("snap_tolerance", self.snap_tolerance),
            ("stance_min", self.stance_min),
            ("stance_max", self.stance_max),
            ("stance_default", self.stance_default),
            ("edge_limit", self.edge_limit),
            ("edge_rate", self.edge_rate),
            ("turn_deadzone", self.turn_deadzone),
            ("turn_speed_gain", self.turn_speed_gain),
            ("weight_transfer_gain", self.weight_transfer_gain),
            ("forward_thrust", self.forward_thrust),
            ("turn_thrust_penalty", self.turn_thrust_penalty),
            ("turning_yaw", self.turning_yaw),
            ("max_speed", self.max_speed),
            ("max_speed_turning", self.max_speed_turning),
            ("min_speed", self.min_speed),
            ("min_speed_turning", self.min_speed_turning),
            ("start_push", self.start_push),
            ("restart_speed", self.restart_speed),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(format!("skier {name} must be finite and non-negative, got {value}"));
        }
        if self.mass <= 0.0 {
            return Err("skier mass must be positive".to_string());
        }
        if self.stance_min < tuning::STANCE_MIN || self.stance_max > tuning::STANCE_MAX {
            return Err(format!(
                "stance range [{}, {}] must lie within [{}, {}]",
                self.stance_min,
                self.stance_max,
                tuning::STANCE_MIN,
                tuning::STANCE_MAX
            ));
        }
        if self.edge_limit > tuning::EDGE_LIMIT {
            return Err(format!(
                "edge_limit {} exceeds {} (60 degrees)",
                self.edge_limit,
                tuning::EDGE_LIMIT
            ));
        }
        if self.stance_min > self.stance_max {
            return Err(format!(
                "stance range is inverted: {} > {}",
                self.stance_min, self.stance_max
            ));
        }
        if self.min_speed > self.max_speed || self.min_speed_turning > self.max_speed_turning {
            return Err("minimum speed must not exceed maximum speed".to_string());
        }
        Ok(())
    }

    pub fn min_speed_for(&self, turning: bool) -> f32 {
        if turning {
            self.min_speed_turning
        } else {
            self.min_speed
        }
    }

    pub fn max_speed_for(&self, turning: bool) -> f32 {
        if turning {
            self.max_speed_turning
        } else {
            self.max_speed
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Heading and body tilt (radians). Yaw 0 faces straight down the fall line (+Z).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Orientation {
    pub fn forward(&self) -> Vec3 {
        forward_from_yaw(self.yaw)
    }

    pub fn right(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin())
    }

    fn is_finite(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite() && self.roll.is_finite()
    }
}

/// Horizontal unit vector for a heading
pub fn forward_from_yaw(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Frame time bounded to `[0, MAX_FRAME_DT]`; long frame gaps are truncated and
/// non-finite values become 0
pub fn frame_dt(dt: f32) -> f32 {
    if dt.is_finite() {
        dt.clamp(0.0, tuning::MAX_FRAME_DT)
    } else {
        0.0
    }
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SkiState {
    /// Rotation about the ski's long axis; 0 = flat, positive = right edge down
    pub edge_angle: f32,
    pub weight_fraction: f32,
    pub contact_point: Vec3,
    pub grip: f32,
    pub on_ground: bool,
}

impl Default for SkiState {
    fn default() -> Self {
        Self {
            edge_angle: 0.0,
            weight_fraction: 0.5,
            contact_point: Vec3::ZERO,
            grip: 1.0,
            on_ground: false,
        }
    }
}

/// Which regime the last step ran in. Chosen by external flags, not by the skier.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkierPhase {
    /// Carried by the chair lift
    OnLift,
    /// Standing at the start, waiting for a push-off
    Waiting,
    Active,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepReport {
    pub phase: SkierPhase,
    /// Non-finite state was found and replaced this step
    pub recovered: bool,
    /// Crashes are disabled; always false
    pub crashed: bool,
}

impl StepReport {
    fn new(phase: SkierPhase, recovered: bool) -> Self {
        Self {
            phase,
            recovered,
            crashed: false,
        }
    }
}

#[derive(Default)]
struct SkiForces {
    force: Vec3,
    torque: Vec3,
    grip: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SkierBody {
    pub def: SkierDef,
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Orientation,
    /// Pitch, yaw and roll rates as x, y, z
    pub angular_velocity: Vec3,
    pub left_ski: SkiState,
    pub right_ski: SkiState,
    pub stance_width: f32,
    pub target_edge_angle: f32,
    pub weight_transfer: f32,
    pub turn_input: f32,
    /// -1 falling left .. 1 falling right
    pub balance: f32,
    pub slope_pitch: f32,
    pub terrain_normal: Vec3,
    pub surface: SurfaceType,
    pub has_started: bool,
}

impl SkierBody {
    /// Skier standing at rest on the snow at (x, z), facing downhill
    pub fn standing(def: SkierDef, terrain: &TerrainField, x: f32, z: f32) -> Self {
        let ground = terrain.height(x, z);
        Self {
            def,
            position: Vec3::new(x, ground + def.surface_offset, z),
            velocity: Vec3::ZERO,
            orientation: Orientation::default(),
            angular_velocity: Vec3::ZERO,
            left_ski: SkiState::default(),
            right_ski: SkiState::default(),
            stance_width: def.stance_default.clamp(def.stance_min, def.stance_max),
            target_edge_angle: 0.0,
            weight_transfer: 0.0,
            turn_input: 0.0,
            balance: 0.0,
            slope_pitch: 0.0,
            terrain_normal: Vec3::Y,
            surface: SurfaceType::Groomed,
            has_started: false,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Velocity along the current heading
    pub fn forward_speed(&self) -> f32 {
        self.velocity.dot(self.orientation.forward())
    }

    pub fn is_turning(&self) -> bool {
        self.orientation.yaw.abs() > self.def.turning_yaw
    }

    /// Push off down the slope. Also pushes again if already skiing but nearly stopped.
    pub fn push_off(&mut self, terrain: &TerrainField) {
        if self.has_started && self.speed() >= self.def.restart_speed {
            return;
        }
        let restart = self.has_started;
        self.has_started = true;

        // Tilt the push down the slope so it follows the snow
        let normal = terrain.normal(self.position.x, self.position.z);
        let steepness = (1.0 - normal.y * normal.y).max(0.0).sqrt();
        let forward = self.orientation.forward();
        let push = Vec3::new(forward.x, -steepness, forward.z)
            .try_normalize()
            .unwrap_or(forward);
        self.velocity += push * self.def.start_push;

        info!(
            "Skier {} at ({:.1}, {:.1}, {:.1})",
            if restart { "pushed off again" } else { "pushed off" },
            self.position.x,
            self.position.y,
            self.position.z
        );
    }

    /// Advance the skier one frame.
    ///
    /// - On the lift: position follows the cable, velocity is zero
    /// - Before push-off: pinned to the snow, velocity is zero
    /// - Skiing: controls, terrain, ski forces, forward drive, rotation, balance, move,
    ///   then the constraint pass
    ///
    /// `dt` is expected to be already bounded by the caller (see [`frame_dt`]).
    pub fn step(
        &mut self,
        dt: f32,
        terrain: &TerrainField,
        input: &SkiInput,
        lift: Option<&ChairLift>,
    ) -> StepReport {
        let input = input.sanitized();

        if let Some(lift) = lift.filter(|lift| lift.riding) {
            self.position = lift.position();
            self.velocity = Vec3::ZERO;
            self.angular_velocity = Vec3::ZERO;
            return StepReport::new(SkierPhase::OnLift, false);
        }

        let recovered = self.recover_non_finite();

        if input.start_requested {
            self.push_off(terrain);
        }

        if !self.has_started {
            self.velocity = Vec3::ZERO;
            let ground = terrain.height(self.position.x, self.position.z);
            if ground.is_finite() {
                self.position.y = ground + self.def.surface_offset;
            }
            return StepReport::new(SkierPhase::Waiting, recovered);
        }

        self.apply_controls(&input, dt);

        let sample = terrain.sample(self.position.x, self.position.z);
        self.terrain_normal = sample.normal;
        self.surface = sample.surface;
        self.slope_pitch = sample.pitch;

        self.place_skis(terrain, &sample);

        let left = self.ski_forces(&self.left_ski, sample.surface);
        let right = self.ski_forces(&self.right_ski, sample.surface);
        self.left_ski.grip = left.grip;
        self.right_ski.grip = right.grip;

        self.velocity += (left.force + right.force) / self.def.mass * dt;
        self.apply_drive(dt);
        self.integrate_rotation(left.torque + right.torque, dt);

        self.balance += (left.grip - right.grip) * tuning::BALANCE_GAIN * dt;
        self.balance *= tuning::BALANCE_DECAY;

        // Start the move from the surface so last frame's error doesn't carry over
        self.clamp_to_ground(terrain);
        self.position += self.velocity * dt;

        let recovered_late = self.enforce_constraints(terrain);
        StepReport::new(SkierPhase::Active, recovered || recovered_late)
    }

    fn apply_controls(&mut self, input: &SkiInput, dt: f32) {
        self.weight_transfer = input.weight_transfer;
        self.turn_input = input.turn_input;
        self.stance_width =
            (self.stance_width + input.stance_change * dt).clamp(self.def.stance_min, self.def.stance_max);
        self.target_edge_angle = (self.target_edge_angle + input.edge_change * dt * self.def.edge_rate)
            .clamp(-self.def.edge_limit, self.def.edge_limit);

        if self.turn_input.abs() > self.def.turn_deadzone {
            let turn_rate = 1.0 + self.speed() * self.def.turn_speed_gain;
            self.orientation.yaw = wrap_angle(self.orientation.yaw + self.turn_input * turn_rate * dt);
        }
    }

    /// Weight split, edge angles and contact points for both skis
    fn place_skis(&mut self, terrain: &TerrainField, sample: &SurfaceSample) {
        let shift = self.weight_transfer * self.def.weight_transfer_gain;
        let edge = self.target_edge_angle - self.balance * tuning::BALANCE_CORRECTION;
        let half_stance = self.orientation.right() * (self.stance_width * 0.5);
        let on_ground = self.position.y <= sample.height + self.def.ground_tolerance;
        let position = self.position;

        for (ski, weight, offset) in [
            (&mut self.left_ski, 0.5 - shift, -half_stance),
            (&mut self.right_ski, 0.5 + shift, half_stance),
        ] {
            let contact = position + offset;
            ski.weight_fraction = weight.clamp(tuning::WEIGHT_MIN, tuning::WEIGHT_MAX);
            ski.edge_angle = edge;
            ski.contact_point = Vec3::new(contact.x, terrain.height(contact.x, contact.z), contact.z);
            ski.on_ground = on_ground;
        }
    }

    fn ski_forces(&self, ski: &SkiState, surface: SurfaceType) -> SkiForces {
        if !ski.on_ground {
            return SkiForces::default();
        }

        let speed = self.speed();
        let forward = self.orientation.forward();
        let right = self.orientation.right();
        let velocity_dir = if speed > 0.01 {
            self.velocity / speed
        } else {
            forward
        };

        let edge_factor = ski.edge_angle.sin().abs();
        let grip = (surface.grip() * edge_factor * (0.5 + ski.weight_fraction)).clamp(0.0, 1.0);

        let mut force = Vec3::ZERO;
        if speed > 0.1 {
            // Friction opposes motion but barely acts along the skis
            let friction_magnitude = surface.friction()
                * (1.0 - edge_factor * tuning::EDGE_FRICTION_RELIEF)
                * ski.weight_fraction
                * self.def.mass
                * self.def.gravity
                * tuning::FRICTION_SCALE;
            let mut friction = -velocity_dir * friction_magnitude;
            let along = friction.dot(forward);
            friction -= forward * (along * (1.0 - tuning::FORWARD_FRICTION_FACTOR));

            let turn = right
                * (grip * speed * speed * tuning::TURN_FORCE_GAIN * ski.edge_angle.sin() * ski.weight_fraction);
            let drag = -velocity_dir * (speed * speed * tuning::AIR_DRAG * self.def.air_density);

            force = friction + turn + drag;
        }

        let torque = Vec3::new(
            -ski.edge_angle * ski.weight_fraction * 0.5,
            0.0,
            (ski.weight_fraction - 0.5) * 2.0,
        );

        SkiForces { force, torque, grip }
    }

    /// Constant forward thrust along the heading, then the speed cap
    fn apply_drive(&mut self, dt: f32) {
        let forward = self.orientation.forward();
        let turning = self.is_turning();

        let mut thrust = self.def.forward_thrust;
        if turning {
            let angle = self.orientation.yaw.abs().min(FRAC_PI_2);
            thrust *= 1.0 - angle / FRAC_PI_2 * self.def.turn_thrust_penalty;
        }
        self.velocity += forward * (thrust * dt);

        let max_speed = self.def.max_speed_for(turning);
        let speed = self.velocity.length();
        if speed > max_speed && speed > 0.01 {
            self.velocity *= max_speed / speed;
        }

        if self.velocity.y < 0.0 {
            self.velocity.y = 0.0;
        }
    }

    fn integrate_rotation(&mut self, torque: Vec3, dt: f32) {
        self.angular_velocity += torque * (dt * tuning::TORQUE_GAIN);
        self.angular_velocity *= tuning::ANGULAR_DAMPING;
        let rate = self.angular_velocity.length();
        if rate > tuning::MAX_ANGULAR_VELOCITY {
            self.angular_velocity *= tuning::MAX_ANGULAR_VELOCITY / rate;
        }

        let delta = self.angular_velocity * (dt * tuning::ROTATION_RATE);
        self.orientation.pitch = (self.orientation.pitch + delta.x) * tuning::UPRIGHT_DAMPING;
        self.orientation.yaw = wrap_angle(self.orientation.yaw + delta.y);
        self.orientation.roll = (self.orientation.roll + delta.z) * tuning::UPRIGHT_DAMPING;
    }

    /// Put the skier on the snow: never below it, never floating above it
    fn clamp_to_ground(&mut self, terrain: &TerrainField) {
        let mut ground = terrain.height(self.position.x, self.position.z);
        if !ground.is_finite() {
            ground = terrain.min_height();
        }
        let floor = ground + self.def.surface_offset;

        if self.position.y < floor {
            self.position.y = floor;
            if self.velocity.y < 0.0 {
                self.velocity.y = 0.0;
            }
        } else if self.position.y > floor + self.def.snap_tolerance {
            self.position.y = floor;
            if self.velocity.y > 0.0 {
                self.velocity.y = 0.0;
            }
        }
    }

    /// Raise the along-heading velocity to the minimum, keeping the lateral part
    fn enforce_min_speed(&mut self) {
        if !self.has_started {
            return;
        }
        let forward = self.orientation.forward();
        let min_speed = self.def.min_speed_for(self.is_turning());
        let along = self.velocity.dot(forward);
        if along < min_speed {
            self.velocity += forward * (min_speed - along);
        }
    }

    /// Replace any non-finite state with safe values. Returns true if anything was replaced.
    fn recover_non_finite(&mut self) -> bool {
        let mut recovered = false;

        if !self.orientation.is_finite() || !self.angular_velocity.is_finite() {
            warn!("Non-finite skier orientation, resetting");
            let yaw = if self.orientation.yaw.is_finite() {
                wrap_angle(self.orientation.yaw)
            } else {
                0.0
            };
            self.orientation = Orientation { yaw, ..default() };
            self.angular_velocity = Vec3::ZERO;
            recovered = true;
        }

        if !self.velocity.is_finite() {
            warn!("Non-finite skier velocity, resetting");
            self.velocity = if self.has_started {
                self.orientation.forward() * tuning::RECOVERY_SPEED
            } else {
                Vec3::ZERO
            };
            recovered = true;
        }

        if !self.position.is_finite() {
            warn!("Non-finite skier position, resetting");
            let finite_or_zero = |v: f32| if v.is_finite() { v } else { 0.0 };
            self.position = Vec3::new(
                finite_or_zero(self.position.x),
                tuning::RECOVERY_HEIGHT,
                finite_or_zero(self.position.z),
            );
            recovered = true;
        }

        if !self.balance.is_finite() {
            self.balance = 0.0;
            recovered = true;
        }

        recovered
    }

    /// The one ordered correction pass run at the end of every skiing step
    fn enforce_constraints(&mut self, terrain: &TerrainField) -> bool {
        let recovered = self.recover_non_finite();
        self.clamp_to_ground(terrain);
        self.enforce_min_speed();
        recovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainDef;

    const DT: f32 = 0.016;

    fn slope() -> TerrainField {
        TerrainField::new(&TerrainDef::default())
    }

    fn skier(terrain: &TerrainField) -> SkierBody {
        SkierBody::standing(SkierDef::default(), terrain, 0.0, -950.0)
    }

    fn assert_on_snow(body: &SkierBody, terrain: &TerrainField) {
        let floor = terrain.height(body.position.x, body.position.z) + body.def.surface_offset;
        assert!(
            body.position.y >= floor - 1e-3,
            "skier below snow: y={} floor={}",
            body.position.y,
            floor
        );
    }

    fn assert_min_speed(body: &SkierBody) {
        let min = body.def.min_speed_for(body.is_turning());
        assert!(
            body.forward_speed() >= min - 1e-3,
            "forward speed {} below {}",
            body.forward_speed(),
            min
        );
    }

    #[test]
    fn test_idle_skier_stays_frozen() {
        let terrain = slope();
        let mut body = skier(&terrain);
        let start = body.position;

        for _ in 0..10 {
            let report = body.step(DT, &terrain, &SkiInput::default(), None);
            assert_eq!(report.phase, SkierPhase::Waiting);
        }

        assert_eq!(body.velocity, Vec3::ZERO);
        assert_eq!(body.position.x, start.x);
        assert_eq!(body.position.z, start.z);
        assert_eq!(body.position.y, terrain.height(start.x, start.z) + body.def.surface_offset);
        assert!(!body.has_started);
    }

    #[test]
    fn test_started_skier_moves_at_minimum_speed() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.has_started = true;

        let report = body.step(DT, &terrain, &SkiInput::default(), None);

        assert_eq!(report.phase, SkierPhase::Active);
        assert!(!report.crashed);
        assert!(!body.is_turning());
        assert!(body.forward_speed() >= 10.0 - 1e-3);
        assert_on_snow(&body, &terrain);
    }

    #[test]
    fn test_push_off_starts_skiing() {
        let terrain = slope();
        let mut body = skier(&terrain);

        body.step(DT, &terrain, &SkiInput::push_off(), None);

        assert!(body.has_started);
        assert_min_speed(&body);
        assert!(body.position.z > -950.0);
    }

    #[test]
    fn test_restart_only_when_stopped() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.has_started = true;
        body.velocity = Vec3::new(0.0, 0.0, 15.0);

        body.push_off(&terrain);
        assert_eq!(body.velocity, Vec3::new(0.0, 0.0, 15.0));

        body.velocity = Vec3::new(0.5, 0.0, 0.5);
        body.push_off(&terrain);
        assert!(body.speed() > 5.0);
    }

    #[test]
    fn test_invariants_hold_through_a_run() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.step(DT, &terrain, &SkiInput::push_off(), None);

        for frame in 0..1500 {
            // Alternate carves every second with some edging and stance changes
            let side = if (frame / 60) % 2 == 0 { 1.0 } else { -1.0 };
            let input = SkiInput {
                weight_transfer: side * 0.5,
                turn_input: side,
                stance_change: side * 0.2,
                edge_change: side * 0.02,
                start_requested: false,
            };
            let report = body.step(DT, &terrain, &input, None);

            assert_eq!(report.phase, SkierPhase::Active);
            assert!(!report.recovered);
            assert!(body.position.is_finite() && body.velocity.is_finite());
            assert_on_snow(&body, &terrain);
            assert_min_speed(&body);
        }
    }

    #[test]
    fn test_straight_run_respects_speed_cap() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.step(DT, &terrain, &SkiInput::push_off(), None);

        for _ in 0..600 {
            body.step(DT, &terrain, &SkiInput::default(), None);
        }

        assert!(!body.is_turning());
        assert!(body.speed() <= tuning::MAX_SPEED + 0.05, "speed {}", body.speed());
        assert!(body.forward_speed() > tuning::MIN_SPEED);
    }

    #[test]
    fn test_turning_lowers_speed_floor() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.has_started = true;
        body.orientation.yaw = 0.6;

        body.step(DT, &terrain, &SkiInput::default(), None);

        assert!(body.is_turning());
        assert!(body.forward_speed() >= tuning::MIN_SPEED_TURNING - 1e-3);
        assert!(body.forward_speed() < tuning::MIN_SPEED);
    }

    #[test]
    fn test_turn_input_changes_heading() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.has_started = true;

        let carve_right = SkiInput {
            turn_input: 1.0,
            ..default()
        };
        for _ in 0..30 {
            body.step(DT, &terrain, &carve_right, None);
        }
        assert!(body.orientation.yaw > 0.3);

        // Inside the deadzone nothing turns
        let yaw = body.orientation.yaw;
        let nudge = SkiInput {
            turn_input: 0.05,
            ..default()
        };
        body.step(DT, &terrain, &nudge, None);
        assert!((body.orientation.yaw - yaw).abs() < 1e-3);
    }

    #[test]
    fn test_stance_and_edge_clamped() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.has_started = true;

        let widen = SkiInput {
            stance_change: 5.0,
            edge_change: 10.0,
            ..default()
        };
        for _ in 0..20 {
            body.step(0.05, &terrain, &widen, None);
        }
        assert_eq!(body.stance_width, tuning::STANCE_MAX);
        assert_eq!(body.target_edge_angle, tuning::EDGE_LIMIT);

        let narrow = SkiInput {
            stance_change: -5.0,
            edge_change: -10.0,
            ..default()
        };
        for _ in 0..40 {
            body.step(0.05, &terrain, &narrow, None);
        }
        assert_eq!(body.stance_width, tuning::STANCE_MIN);
        assert_eq!(body.target_edge_angle, -tuning::EDGE_LIMIT);
    }

    #[test]
    fn test_weight_transfer_splits_load() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.has_started = true;

        let lean_right = SkiInput {
            weight_transfer: 1.0,
            ..default()
        };
        body.step(DT, &terrain, &lean_right, None);

        assert!((body.left_ski.weight_fraction - 0.1).abs() < 1e-5);
        assert!((body.right_ski.weight_fraction - 0.9).abs() < 1e-5);
        assert!(body.left_ski.on_ground && body.right_ski.on_ground);
        let gap = body.right_ski.contact_point - body.left_ski.contact_point;
        assert!((Vec2::new(gap.x, gap.z).length() - body.stance_width).abs() < 1e-3);
    }

    #[test]
    fn test_recovers_from_non_finite_velocity() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.has_started = true;
        body.velocity = Vec3::new(f32::NAN, 0.0, f32::INFINITY);

        let report = body.step(DT, &terrain, &SkiInput::default(), None);

        assert!(report.recovered);
        assert!(body.velocity.is_finite());
        assert!(body.position.is_finite());
        assert_on_snow(&body, &terrain);
        assert_min_speed(&body);
    }

    #[test]
    fn test_recovers_from_non_finite_position() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.has_started = true;
        body.position = Vec3::new(f32::NAN, f32::INFINITY, -500.0);
        body.orientation.yaw = f32::NAN;

        let report = body.step(DT, &terrain, &SkiInput::default(), None);

        assert!(report.recovered);
        assert!(body.position.is_finite());
        assert!(body.orientation.yaw.is_finite());
        assert!(terrain.contains(body.position.x, body.position.z));
        assert_on_snow(&body, &terrain);
        assert_min_speed(&body);
    }

    #[test]
    fn test_lift_carries_skier() {
        let terrain = slope();
        let mut body = skier(&terrain);
        body.has_started = true;
        body.velocity = Vec3::new(0.0, 0.0, 12.0);

        let mut lift = ChairLift::between(&terrain, Vec2::new(0.0, 0.0), Vec2::new(0.0, -800.0));
        lift.board();
        lift.advance(1.0);

        let report = body.step(DT, &terrain, &SkiInput::push_off(), Some(&lift));

        assert_eq!(report.phase, SkierPhase::OnLift);
        assert_eq!(body.position, lift.position());
        assert_eq!(body.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_frame_dt_bounds() {
        assert_eq!(frame_dt(5.0), tuning::MAX_FRAME_DT);
        assert_eq!(frame_dt(-1.0), 0.0);
        assert_eq!(frame_dt(f32::NAN), 0.0);
        assert_eq!(frame_dt(f32::INFINITY), 0.0);
        assert_eq!(frame_dt(0.016), 0.016);
    }

    #[test]
    fn test_def_validation() {
        assert!(SkierDef::default().validate().is_ok());
        assert!(SkierDef {
            stance_min: 0.7,
            ..default()
        }
        .validate()
        .is_err());
        assert!(SkierDef {
            stance_max: 2.0,
            ..default()
        }
        .validate()
        .is_err());
        assert!(SkierDef {
            stance_min: 0.1,
            ..default()
        }
        .validate()
        .is_err());
        assert!(SkierDef {
            edge_limit: 3.0,
            ..default()
        }
        .validate()
        .is_err());
        assert!(SkierDef {
            stance_min: 0.3,
            stance_max: 0.5,
            edge_limit: 0.5,
            ..default()
        }
        .validate()
        .is_ok());
        assert!(SkierDef {
            min_speed: 40.0,
            ..default()
        }
        .validate()
        .is_err());
        assert!(SkierDef {
            mass: f32::NAN,
            ..default()
        }
        .validate()
        .is_err());
    }
}
