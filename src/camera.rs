//! Orbit camera. Mouse motion turns the camera around the player, the wheel zooms, and the room
//! keeps the camera from leaving the course. The camera's yaw also defines which way "forward"
//! is for the movement keys.

use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, PrimaryWindow};

use crate::level::Course;
use crate::player::Player;
use crate::state::{GameSet, GameState};

/// Radians of turn per pixel of mouse motion.
const MOUSE_SENSITIVITY: f32 = 0.01;
const MIN_PITCH: f32 = -1.2;
const MAX_PITCH: f32 = 0.7;
const MIN_DISTANCE: f32 = 2.0;
const MAX_DISTANCE: f32 = 10.0;
const ZOOM_STEP: f32 = 0.5;
/// Pixel-unit wheel deltas are scaled down to roughly one line per notch.
const PIXELS_PER_LINE: f32 = 40.0;
/// The camera looks slightly above the player's center.
const TARGET_HEIGHT: f32 = 0.25;
const CAMERA_RADIUS: f32 = 0.2;
const FLOOR_CLEARANCE: f32 = 0.1;

/// Plugin that registers the orbit input and follow systems.
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Playing), grab_cursor)
            .add_systems(OnExit(GameState::Playing), release_cursor)
            .add_systems(
                Update,
                orbit_camera_input
                    .in_set(GameSet::Input)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(
                Update,
                follow_player_camera
                    .after(GameSet::Movement)
                    .run_if(has_player_and_camera),
            );
    }
}

/// Orbit parameters. Angles are in radians.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct FollowCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl Default for FollowCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: 3.0,
        }
    }
}

impl FollowCamera {
    /// Applies a mouse movement in pixels. Moving the mouse up raises the view.
    pub fn turn(&mut self, delta: Vec2) {
        self.yaw += delta.x * MOUSE_SENSITIVITY;
        self.pitch = (self.pitch - delta.y * MOUSE_SENSITIVITY).clamp(MIN_PITCH, MAX_PITCH);
    }

    /// Applies wheel notches; positive zooms in.
    pub fn zoom(&mut self, notches: f32) {
        self.distance = (self.distance - notches * ZOOM_STEP).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Unit vector from the camera toward its target.
    pub fn direction(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            -self.yaw.cos() * self.pitch.cos(),
        )
    }

    /// Camera position for `target`, before any room constraint other than the floor.
    pub fn orbit_position(&self, target: Vec3, floor_y: f32) -> Vec3 {
        let mut position = target - self.direction() * self.distance + Vec3::Y;
        position.y = position.y.max(floor_y + FLOOR_CLEARANCE);
        position
    }
}

/// Run condition that only schedules the follow system when both a player and camera exist.
fn has_player_and_camera(
    player_query: Query<Entity, With<Player>>,
    camera_query: Query<Entity, With<FollowCamera>>,
) -> bool {
    !player_query.is_empty() && !camera_query.is_empty()
}

fn grab_cursor(mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    if let Ok(mut window) = windows.get_single_mut() {
        window.cursor.grab_mode = CursorGrabMode::Locked;
        window.cursor.visible = false;
    }
}

fn release_cursor(mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    if let Ok(mut window) = windows.get_single_mut() {
        window.cursor.grab_mode = CursorGrabMode::None;
        window.cursor.visible = true;
    }
}

fn orbit_camera_input(
    mut motion: EventReader<MouseMotion>,
    mut wheel: EventReader<MouseWheel>,
    mut cameras: Query<&mut FollowCamera>,
) {
    let delta: Vec2 = motion.read().map(|event| event.delta).sum();
    let notches: f32 = wheel
        .read()
        .map(|event| match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / PIXELS_PER_LINE,
        })
        .sum();

    if delta == Vec2::ZERO && notches == 0.0 {
        return;
    }

    for mut camera in &mut cameras {
        camera.turn(delta);
        camera.zoom(notches);
    }
}

/// Places the camera on its orbit around the player and keeps it inside the room.
fn follow_player_camera(
    mut camera_query: Query<(&mut Transform, &FollowCamera)>,
    player_query: Query<&Transform, (With<Player>, Without<FollowCamera>)>,
    course: Option<Res<Course>>,
) {
    let Ok(player_transform) = player_query.get_single() else {
        return;
    };

    let Ok((mut camera_transform, orbit)) = camera_query.get_single_mut() else {
        return;
    };

    let target = player_transform.translation + Vec3::Y * TARGET_HEIGHT;
    let floor_y = course.as_ref().map_or(0.0, |course| course.room.floor_y());
    let mut position = orbit.orbit_position(target, floor_y);

    if let Some(course) = course.as_ref() {
        position = course.room.constrain_point(position, CAMERA_RADIUS);
    }

    *camera_transform = Transform::from_translation(position).looking_at(target, Vec3::Y);
}
