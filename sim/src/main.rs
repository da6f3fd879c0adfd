//! Slope Simulator - headless Bevy app that plays a scripted ski run
//!
//! Usage: `ski_sim [scenario.ron]` (defaults to the bundled downhill run)

mod scenario;

use bevy::app::{AppExit, ScheduleRunnerPlugin};
use bevy::prelude::*;
use std::path::PathBuf;

use scenario::{Scenario, ScriptPlayer};
use ski_shared::{tick_duration, SkiInput, SkiPlugin, SkiSession, SkiSimulationSet};

const DEFAULT_SCENARIO: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/downhill.ron");

/// Feed scripted input into the simulation when a new segment starts
fn advance_script(
    scenario: Res<Scenario>,
    session: Res<SkiSession>,
    mut player: ResMut<ScriptPlayer>,
    mut input: ResMut<SkiInput>,
) {
    if let Some(next) = player.advance(&scenario, session.elapsed) {
        debug!("Script input at t={:.2}s: {:?}", session.elapsed, next);
        *input = next.clone();
    }
}

/// The mesh a renderer would upload for this slope
fn describe_slope(session: Res<SkiSession>) {
    let mesh = session.terrain.mesh_data();
    info!(
        "Slope mesh: {} vertices, {} triangles, lowest point {:.1}m",
        mesh.positions.len(),
        mesh.indices.len() / 3,
        session.terrain.min_height()
    );
}

fn report_pose(scenario: Res<Scenario>, session: Res<SkiSession>, mut player: ResMut<ScriptPlayer>) {
    if !player.report_due(&scenario, session.elapsed) {
        return;
    }

    let pose = session.pose();
    let ground = session.terrain.height(pose.position.x, pose.position.z);
    info!(
        "t={:5.1}s pos=({:7.1}, {:6.1}, {:7.1}) above_snow={:.2} yaw={:+.2} speed={:5.1} km/h lean={:+.2} surface={:?}{}",
        session.elapsed,
        pose.position.x,
        pose.position.y,
        pose.position.z,
        pose.position.y - ground,
        pose.orientation.yaw,
        pose.speed_kmh,
        pose.lean,
        pose.surface,
        if pose.on_lift { " (lift)" } else { "" }
    );
}

fn finish_run(scenario: Res<Scenario>, session: Res<SkiSession>, mut app_exit: MessageWriter<AppExit>) {
    if session.elapsed + 1e-4 < scenario.duration {
        return;
    }

    let pose = session.pose();
    info!(
        "Run finished after {} frames ({:.1}s): ended at z={:.1}, {:.1} km/h",
        session.frames, session.elapsed, pose.position.z, pose.speed_kmh
    );
    app_exit.write(AppExit::Success);
}

fn main() {
    let scenario_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCENARIO));

    let mut app = App::new();

    // Headless, ticking at the simulation rate
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(tick_duration())));
    app.add_plugins(bevy::log::LogPlugin::default());

    // Logging is up, so load failures are visible
    let scenario = match Scenario::load(&scenario_path) {
        Ok(scenario) => {
            info!("Loaded scenario {}", scenario_path.display());
            scenario
        }
        Err(e) => {
            warn!("{}; running the default scenario", e);
            Scenario::default()
        }
    };

    app.add_plugins(SkiPlugin {
        config: scenario.session.clone(),
    });
    app.insert_resource(scenario);
    app.init_resource::<ScriptPlayer>();

    app.add_systems(Startup, describe_slope);

    // Fixed tick: script input, simulate, then report and check for the end of the run.
    app.add_systems(FixedUpdate, advance_script.before(SkiSimulationSet));
    app.add_systems(
        FixedUpdate,
        (report_pose, finish_run).chain().after(SkiSimulationSet),
    );

    info!("Starting slope simulation");
    app.run();
}
