//! High-level plugin composition.
//!
//! `ParkourPlugin` glues together every domain plugin (course, player, movement, camera, audio,
//! animation, UI) and sets up system ordering. Each subsystem owns its own state; this module
//! only registers them and spawns the scene-wide camera and light.

use bevy::prelude::*;

use crate::animation::AnimationPlugin;
use crate::audio::GameAudioPlugin;
use crate::camera::{CameraPlugin, FollowCamera};
use crate::level::LevelPlugin;
use crate::movement::MovementPlugin;
use crate::player::PlayerPlugin;
use crate::state::{toggle_pause, GameSet, GameState};
use crate::ui::UiPlugin;

/// Bundles every gameplay plugin into a single unit that can be added to the Bevy `App`.
pub struct ParkourPlugin;

impl Plugin for ParkourPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<GameState>()
            .add_plugins((
                LevelPlugin,     // Course description, platforms and room.
                PlayerPlugin,    // Spawn, respawn, end of run.
                GameAudioPlugin, // Sound service lifecycle.
                CameraPlugin,    // Orbit follow camera.
                MovementPlugin,  // Input + character controller tick.
                AnimationPlugin, // Clip playback on the player mesh.
                UiPlugin,        // HUD and overlays.
            ))
            // Input -> Movement -> Effects, only while playing. Platforms advance inside
            // Movement before the controller reads them.
            .configure_sets(
                Update,
                (GameSet::Input, GameSet::Movement, GameSet::Effects)
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Startup, setup_scene)
            .add_systems(Update, toggle_pause);
    }
}

/// Spawns the 3D camera tagged with `FollowCamera` and the lights.
fn setup_scene(mut commands: Commands) {
    commands.spawn((
        Name::new("MainCamera"),
        Camera3dBundle {
            transform: Transform::from_xyz(0.0, 2.0, 7.0).looking_at(Vec3::ZERO, Vec3::Y),
            ..default()
        },
        FollowCamera::default(),
    ));

    commands.spawn((
        Name::new("Sun"),
        DirectionalLightBundle {
            directional_light: DirectionalLight {
                illuminance: 8_000.0,
                shadows_enabled: true,
                ..default()
            },
            transform: Transform::from_xyz(4.0, 12.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
            ..default()
        },
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 300.0,
    });
}
