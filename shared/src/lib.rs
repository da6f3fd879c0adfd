//! Alpine slope simulation: procedural terrain and a two-ski skier model.
//!
//! Shared by anything that hosts a session (the headless `ski_sim` runner, a renderer).

pub mod config;
pub mod input;
pub mod lift;
pub mod plugin;
pub mod session;
pub mod skier;
pub mod terrain;

pub use config::{SessionConfig, SlopePoint};
pub use input::SkiInput;
pub use lift::ChairLift;
pub use plugin::{tick_duration, tick_session, SkiPlugin, SkiSimulationSet, FIXED_TIMESTEP_HZ};
pub use session::{RenderPose, SkiSession};
pub use skier::{frame_dt, Orientation, SkiState, SkierBody, SkierDef, SkierPhase, StepReport};
pub use terrain::{SurfaceSample, SurfaceType, TerrainDef, TerrainField, TerrainMeshData};
