//! Bevy integration: the session lives in a resource and ticks in `FixedUpdate`.

use bevy::prelude::*;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::input::SkiInput;
use crate::session::SkiSession;

/// Fixed timestep for the skier simulation (60 Hz)
pub const FIXED_TIMESTEP_HZ: f64 = 60.0;

/// Tick duration for app runners
pub fn tick_duration() -> Duration {
    Duration::from_secs_f64(1.0 / FIXED_TIMESTEP_HZ)
}

/// Systems that advance the slope simulation. Input writers run before this set.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SkiSimulationSet;

#[derive(Default)]
pub struct SkiPlugin {
    pub config: SessionConfig,
}

impl Plugin for SkiPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Time::<Fixed>::from_hz(FIXED_TIMESTEP_HZ));
        app.init_resource::<SkiInput>();
        app.insert_resource(SkiSession::new_or_default(&self.config));

        app.configure_sets(FixedUpdate, SkiSimulationSet);
        app.add_systems(FixedUpdate, tick_session.in_set(SkiSimulationSet));
    }
}

/// Advance the session one fixed tick with the current input
pub fn tick_session(mut session: ResMut<SkiSession>, mut input: ResMut<SkiInput>) {
    let dt = 1.0 / FIXED_TIMESTEP_HZ as f32;

    let report = session.frame(dt, &input);
    // A push-off request is consumed by the tick that sees it
    input.start_requested = false;

    if report.recovered {
        warn!(
            "Skier state recovered at frame {} ({:?})",
            session.frames, report.phase
        );
    }

    if session.frames % FIXED_TIMESTEP_HZ as u64 == 0 {
        let skier = &session.skier;
        debug!(
            "t={:.1}s phase={:?} vel=({:.2}, {:.2}, {:.2}) speed={:.1}",
            session.elapsed,
            report.phase,
            skier.velocity.x,
            skier.velocity.y,
            skier.velocity.z,
            skier.speed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainDef;

    fn small_config() -> SessionConfig {
        SessionConfig {
            terrain: TerrainDef {
                resolution: 32,
                ..default()
            },
            ..default()
        }
    }

    #[test]
    fn test_plugin_inserts_resources() {
        let mut app = App::new();
        app.add_plugins(SkiPlugin {
            config: small_config(),
        });

        assert!(app.world().contains_resource::<SkiInput>());
        let session = app.world().resource::<SkiSession>();
        assert_eq!(session.terrain.resolution(), 32);
        assert_eq!(session.frames, 0);
    }

    #[test]
    fn test_tick_consumes_push_off() {
        let mut app = App::new();
        app.insert_resource(SkiSession::new(&small_config()).unwrap());
        app.insert_resource(SkiInput::push_off());
        app.add_systems(Update, tick_session);

        app.update();

        assert!(!app.world().resource::<SkiInput>().start_requested);
        let session = app.world().resource::<SkiSession>();
        assert_eq!(session.frames, 1);
        assert!(session.skier.has_started);

        app.update();
        app.update();

        let session = app.world().resource::<SkiSession>();
        assert_eq!(session.frames, 3);
        assert!(session.skier.forward_speed() >= 10.0 - 1e-3);
    }

    #[test]
    fn test_idle_ticks_keep_skier_waiting() {
        let mut app = App::new();
        app.insert_resource(SkiSession::new(&small_config()).unwrap());
        app.init_resource::<SkiInput>();
        app.add_systems(Update, tick_session);

        for _ in 0..10 {
            app.update();
        }

        let session = app.world().resource::<SkiSession>();
        assert!(!session.skier.has_started);
        assert_eq!(session.skier.velocity, Vec3::ZERO);
        assert_eq!(session.pose().speed, 0.0);
    }
}
