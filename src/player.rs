//! Player entity lifecycle: spawning the avatar once the course is loaded, respawning it at the
//! last checkpoint after a damaging fall, and ending or restarting the run.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

use crate::animation::{AnimationClip, PlayerAnimator};
use crate::level::Course;
use crate::movement::{CharacterController, MovementSettings, PlayerInput};
use crate::state::{GameSet, GameState};

/// Registers the player spawn, the damage and completion reactions and the restart key.
pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PlayerDamaged>()
            .add_systems(OnExit(GameState::Loading), spawn_player)
            .add_systems(
                Update,
                // Completion first: finishing the course on a damaging landing still wins.
                (check_course_complete, handle_player_damage)
                    .chain()
                    .in_set(GameSet::Effects),
            )
            .add_systems(
                Update,
                restart_course
                    .run_if(in_state(GameState::GameOver).or_else(in_state(GameState::Won))),
            );
    }
}

/// Marker component used by the camera, movement and HUD systems to find the player.
#[derive(Component)]
pub struct Player;

/// The child entity carrying the player's mesh. Posed by the animation system.
#[derive(Component)]
pub struct PlayerVisual;

/// Sent after a fall costs health. `health` is what is left.
#[derive(Event, Debug, Clone, Copy)]
pub struct PlayerDamaged {
    pub health: u32,
}

fn spawn_player(
    mut commands: Commands,
    course: Option<Res<Course>>,
    settings: Option<Res<MovementSettings>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let (Some(course), Some(settings)) = (course, settings) else {
        return;
    };

    let spawn = course.platforms.spawn_point();
    let controller = CharacterController::new(*settings, spawn);
    let radius = settings.radius;

    let body = meshes.add(Capsule3d::new(radius * 0.7, radius * 0.6));
    let visor = meshes.add(Cuboid::new(radius, radius * 0.3, radius * 0.3));
    let body_material = materials.add(Color::srgb(0.85, 0.45, 0.2));
    let visor_material = materials.add(Color::srgb(0.1, 0.1, 0.15));

    commands
        .spawn((
            Name::new("Player"),
            Player,
            SpatialBundle::from_transform(
                Transform::from_translation(spawn).with_rotation(controller.rotation()),
            ),
            controller,
            PlayerAnimator::new(AnimationClip::Idle),
            PlayerInput::default(),
        ))
        .with_children(|parent| {
            parent
                .spawn((
                    PlayerVisual,
                    PbrBundle {
                        mesh: body,
                        material: body_material,
                        ..default()
                    },
                ))
                .with_children(|visual| {
                    // Marks the facing direction (+Z in local space).
                    visual.spawn(PbrBundle {
                        mesh: visor,
                        material: visor_material,
                        transform: Transform::from_xyz(0.0, radius * 0.4, radius * 0.6),
                        ..default()
                    });
                });
        });
}

fn handle_player_damage(
    mut events: EventReader<PlayerDamaged>,
    course: Res<Course>,
    mut players: Query<(&mut Transform, &mut CharacterController), With<Player>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(event) = events.read().last().copied() else {
        return;
    };

    if course.platforms.is_complete() {
        return;
    }

    if event.health == 0 {
        info!("Out of health; game over");
        next_state.set(GameState::GameOver);
        return;
    }

    let respawn = course.platforms.current_checkpoint_position();
    for (mut transform, mut controller) in &mut players {
        controller.reset(event.health);
        controller.set_position(respawn);
        transform.translation = respawn;
        transform.rotation = controller.rotation();
    }
    info!(
        "Respawned at checkpoint {} with {} health",
        course.platforms.current_checkpoint(),
        event.health
    );
}

fn check_course_complete(course: Res<Course>, mut next_state: ResMut<NextState<GameState>>) {
    if course.platforms.is_complete() {
        next_state.set(GameState::Won);
    }
}

/// Full restart from the end screens: progress cleared, full health, back at the spawn point.
fn restart_course(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut course: ResMut<Course>,
    settings: Res<MovementSettings>,
    mut players: Query<
        (
            &mut Transform,
            &mut CharacterController,
            &mut PlayerInput,
            &mut PlayerAnimator,
        ),
        With<Player>,
    >,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyR) {
        return;
    }

    course.platforms.reset_progress();
    let spawn = course.platforms.spawn_point();
    let health = settings.max_health;

    for (mut transform, mut controller, mut input, mut animator) in &mut players {
        controller.reset(health);
        controller.set_position(spawn);
        transform.translation = spawn;
        transform.rotation = controller.rotation();
        *input = PlayerInput::default();
        *animator = PlayerAnimator::new(AnimationClip::Idle);
    }

    info!("Restarting course");
    next_state.set(GameState::Playing);
}
