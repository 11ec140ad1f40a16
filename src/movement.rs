//! Kinematic character controller. Each tick turns the input snapshot into a facing and a
//! displacement, rides or leaves moving platforms, resolves walls and landings against the
//! course, and fires the animation, damage and footstep side effects. The step order inside
//! [`CharacterController::update`] is part of the behaviour: reordering it changes how jumps
//! pass through platforms and how momentum carries.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::animation::{AnimationClip, AnimationDriver, PlayerAnimator};
use crate::audio::{SoundDriver, SoundEngine, SoundEvent, FOOTSTEP_SAMPLES};
use crate::camera::FollowCamera;
use crate::course::{PlatformSet, Progress, Support};
use crate::error::CourseError;
use crate::level::Course;
use crate::player::{Player, PlayerDamaged};
use crate::room::Room;
use crate::state::{GameSet, GameState};

/// Input directions shorter than this are treated as no input.
const MIN_DIRECTION_SQ: f32 = 1.0e-6;

/// Value the footstep timer restarts from whenever the player stops or leaves the ground.
const FOOTSTEP_TIMER_START: f32 = 0.0;

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (
                read_player_input.in_set(GameSet::Input),
                apply_kinematics.in_set(GameSet::Movement),
            )
                .run_if(in_state(GameState::Playing)),
        );
    }
}

/// Tuning for the controller, read from the `[movement]` table of the course file. Inserted as a
/// resource once the course is loaded; spawning and restarting the player read it from there.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MovementSettings {
    /// Vertical acceleration; negative pulls down.
    pub gravity: f32,
    pub jump_force: f32,
    pub walk_speed: f32,
    pub sprint_speed: f32,
    pub radius: f32,
    /// Height the player's center rests at on the bare floor.
    pub ground_level: f32,
    /// Minimum drop from the peak of a fall that costs one health point.
    pub fall_damage_height: f32,
    /// Facing in degrees after spawning or respawning.
    pub spawn_yaw: f32,
    pub walk_footstep_interval: f32,
    pub sprint_footstep_interval: f32,
    pub max_health: u32,
    pub footstep_seed: u64,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            gravity: -18.0,
            jump_force: 7.5,
            walk_speed: 3.5,
            sprint_speed: 6.0,
            radius: 0.3,
            ground_level: 0.3,
            fall_damage_height: 2.0,
            spawn_yaw: 180.0,
            walk_footstep_interval: 0.45,
            sprint_footstep_interval: 0.3,
            max_health: 3,
            footstep_seed: 0x5eed,
        }
    }
}

impl MovementSettings {
    /// Rejects tuning the controller cannot integrate.
    pub fn validate(&self) -> Result<(), CourseError> {
        let tuning = [
            ("gravity", self.gravity),
            ("jump_force", self.jump_force),
            ("walk_speed", self.walk_speed),
            ("sprint_speed", self.sprint_speed),
            ("radius", self.radius),
            ("ground_level", self.ground_level),
            ("fall_damage_height", self.fall_damage_height),
            ("spawn_yaw", self.spawn_yaw),
            ("walk_footstep_interval", self.walk_footstep_interval),
            ("sprint_footstep_interval", self.sprint_footstep_interval),
        ];
        if let Some((name, _)) = tuning.iter().find(|(_, value)| !value.is_finite()) {
            return Err(CourseError::NonFinite {
                what: format!("movement.{name}"),
            });
        }

        if !(self.radius > 0.0) {
            return Err(CourseError::NonPositiveRadius(self.radius));
        }

        Ok(())
    }
}

/// Keys held this frame, plus whether jump was pressed since the last tick.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub jump_pressed: bool,
}

/// Everything the controller reads from outside the course for one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub dt: f32,
    pub keys: PlayerInput,
    /// Camera yaw in radians; movement keys are relative to it.
    pub camera_yaw: f32,
}

/// What happened during a tick, for the game-flow systems.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub jumped: bool,
    pub landed: bool,
    pub wall_blocked: bool,
    /// Drop height of a damaging fall.
    pub fall_damage: Option<f32>,
    pub progress: Option<Progress>,
}

#[derive(Component, Debug, Clone)]
pub struct CharacterController {
    position: Vec3,
    velocity: Vec3,
    facing_yaw: f32,
    grounded: bool,
    sprinting: bool,
    health: u32,
    /// Highest point reached since leaving the ground; `None` while grounded.
    fall_peak: Option<f32>,
    footstep_timer: f32,
    settings: MovementSettings,
    rng: StdRng,
}

impl CharacterController {
    pub fn new(settings: MovementSettings, position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            facing_yaw: settings.spawn_yaw,
            grounded: true,
            sprinting: false,
            health: settings.max_health,
            fall_peak: None,
            footstep_timer: FOOTSTEP_TIMER_START,
            settings,
            rng: StdRng::seed_from_u64(settings.footstep_seed),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn facing_yaw(&self) -> f32 {
        self.facing_yaw
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.facing_yaw.to_radians())
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn is_sprinting(&self) -> bool {
        self.sprinting
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn settings(&self) -> &MovementSettings {
        &self.settings
    }

    /// Puts the controller back on its feet for a respawn or restart. Course progress and
    /// position are left to the caller.
    pub fn reset(&mut self, health: u32) {
        self.grounded = true;
        self.sprinting = false;
        self.health = health;
        self.fall_peak = None;
        self.velocity = Vec3::ZERO;
        self.facing_yaw = self.settings.spawn_yaw;
        self.footstep_timer = FOOTSTEP_TIMER_START;
    }

    pub fn update(
        &mut self,
        tick: &TickInput,
        course: &mut PlatformSet,
        room: Option<&Room>,
        animation: &mut impl AnimationDriver,
        sound: &mut impl SoundDriver,
    ) -> TickReport {
        let dt = tick.dt.max(0.0);
        let settings = self.settings;
        let radius = settings.radius;
        let start = self.position;
        let mut report = TickReport::default();

        let direction = movement_direction(&tick.keys, tick.camera_yaw);
        let is_moving = direction.length_squared() > MIN_DIRECTION_SQ;

        // Sprinting can only start on the ground but survives a jump.
        self.sprinting = tick.keys.sprint && (self.grounded || self.sprinting);

        if tick.keys.jump_pressed && self.grounded {
            self.velocity.y = settings.jump_force;
            self.grounded = false;
            animation.play(AnimationClip::Jumping, true);
            sound.play_event(SoundEvent::Jump, None, None);
            report.jumped = true;
        }

        if !self.grounded {
            self.velocity.y += settings.gravity * dt;
        }

        let mut horizontal = Vec3::ZERO;
        if is_moving {
            let direction = direction.normalize();
            self.facing_yaw = yaw_degrees(direction);
            let speed = if self.sprinting {
                settings.sprint_speed
            } else {
                settings.walk_speed
            };
            horizontal = direction * speed * dt;
        }

        let vertical = Vec3::new(0.0, self.velocity.y * dt, 0.0);

        let riding = course.find_support(start, radius);
        if let Some(support) = riding {
            record_progress(course, &support, sound, &mut report);
        }

        // Riding: move exactly as far as the platform did. Airborne: keep launch momentum.
        let carry = if self.grounded {
            riding.map_or(Vec3::ZERO, |support| support.delta)
        } else {
            Vec3::new(self.velocity.x, 0.0, self.velocity.z) * dt
        };

        let mut candidate = start + horizontal + vertical + carry;

        // Rising bodies skip wall checks so they can jump up through platforms.
        if self.grounded || self.velocity.y <= 0.0 {
            if course.blocks_movement(start, candidate, radius) {
                candidate = start + vertical + carry;
                report.wall_blocked = true;
            } else if let Some(room) = room {
                if room.blocks_movement(start, candidate, radius) {
                    candidate = room.constrain_movement(start, candidate, radius);
                }
            }
        }

        let was_grounded = self.grounded;
        let landing = course.find_support(candidate, radius);
        if let Some(support) = landing {
            record_progress(course, &support, sound, &mut report);
        }

        match landing {
            Some(support) if self.velocity.y <= 0.0 => {
                candidate.y = support.surface_y + radius;
                self.grounded = true;
                self.velocity = Vec3::new(support.velocity.x, 0.0, support.velocity.z);
            }
            _ if candidate.y <= settings.ground_level => {
                candidate.y = settings.ground_level;
                self.grounded = true;
                self.velocity = Vec3::ZERO;
            }
            _ => self.grounded = false,
        }
        report.landed = self.grounded && !was_grounded;

        if self.grounded
            && animation.current() == Some(AnimationClip::Jumping)
            && animation.is_finished()
        {
            animation.play(self.locomotion_clip(is_moving), false);
        }

        self.position = candidate;

        if self.grounded && animation.current() != Some(AnimationClip::Jumping) {
            let clip = self.locomotion_clip(is_moving);
            if animation.current() != Some(clip) {
                debug!("Player animation -> {}", clip.name());
                animation.play(clip, false);
            }
        }

        self.track_fall(start.y, sound, &mut report);
        self.step_footsteps(dt, is_moving, sound);

        report
    }

    fn locomotion_clip(&self, is_moving: bool) -> AnimationClip {
        match (is_moving, self.sprinting) {
            (false, _) => AnimationClip::Idle,
            (true, false) => AnimationClip::Walking,
            (true, true) => AnimationClip::Sprinting,
        }
    }

    fn track_fall(&mut self, start_y: f32, sound: &mut impl SoundDriver, report: &mut TickReport) {
        if !self.grounded {
            let peak = self.fall_peak.unwrap_or(start_y).max(self.position.y);
            self.fall_peak = Some(peak);
            return;
        }

        let Some(peak) = self.fall_peak.take() else {
            return;
        };

        let drop = peak - self.position.y;
        if drop >= self.settings.fall_damage_height {
            self.health = self.health.saturating_sub(1);
            sound.play_event(SoundEvent::Damage, None, None);
            sound.play_event(SoundEvent::Break, None, None);
            info!(
                "Fell {:.2} units; health now {}/{}",
                drop, self.health, self.settings.max_health
            );
            report.fall_damage = Some(drop);
        }
    }

    fn step_footsteps(&mut self, dt: f32, is_moving: bool, sound: &mut impl SoundDriver) {
        if !(self.grounded && is_moving) {
            self.footstep_timer = FOOTSTEP_TIMER_START;
            return;
        }

        let interval = if self.sprinting {
            self.settings.sprint_footstep_interval
        } else {
            self.settings.walk_footstep_interval
        };

        self.footstep_timer += dt;
        if self.footstep_timer < interval {
            return;
        }

        self.footstep_timer = FOOTSTEP_TIMER_START;
        let sample = self.rng.gen_range(0..FOOTSTEP_SAMPLES);
        let pitch = self.rng.gen_range(0.9..=1.1);
        let volume = self.rng.gen_range(0.8..=1.0);
        sound.play_event(SoundEvent::Footstep(sample), Some(pitch), Some(volume));
    }
}

/// Any platform touching the player counts toward progress, whether or not the player ends up
/// standing on it this tick.
fn record_progress(
    course: &mut PlatformSet,
    support: &Support,
    sound: &mut impl SoundDriver,
    report: &mut TickReport,
) {
    let Some(progress) = course.advance_progress(support) else {
        return;
    };

    let event = match progress {
        Progress::CheckpointReached(_) => SoundEvent::Checkpoint,
        Progress::Completed => SoundEvent::Victory,
    };
    sound.play_event(event, None, None);
    report.progress = Some(progress);
}

/// Sum of the camera-relative basis vectors for every held key. Not normalised here.
pub fn movement_direction(keys: &PlayerInput, camera_yaw: f32) -> Vec3 {
    let forward = Vec3::new(camera_yaw.sin(), 0.0, -camera_yaw.cos());
    let right = Vec3::new(camera_yaw.cos(), 0.0, camera_yaw.sin());

    let mut direction = Vec3::ZERO;
    if keys.forward {
        direction += forward;
    }
    if keys.back {
        direction -= forward;
    }
    if keys.right {
        direction += right;
    }
    if keys.left {
        direction -= right;
    }
    direction
}

/// Facing yaw in degrees, in `[0, 360)`, for a horizontal unit direction.
fn yaw_degrees(direction: Vec3) -> f32 {
    direction.x.atan2(direction.z).to_degrees().rem_euclid(360.0)
}

fn read_player_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut query: Query<&mut PlayerInput, With<Player>>,
) {
    for mut input in &mut query {
        input.forward = keyboard.any_pressed([KeyCode::KeyW, KeyCode::ArrowUp]);
        input.back = keyboard.any_pressed([KeyCode::KeyS, KeyCode::ArrowDown]);
        input.left = keyboard.any_pressed([KeyCode::KeyA, KeyCode::ArrowLeft]);
        input.right = keyboard.any_pressed([KeyCode::KeyD, KeyCode::ArrowRight]);
        input.sprint = keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);

        if keyboard.just_pressed(KeyCode::Space) {
            input.jump_pressed = true;
        }
    }
}

pub(crate) fn apply_kinematics(
    time: Res<Time>,
    mut course: ResMut<Course>,
    mut sound: ResMut<SoundEngine>,
    cameras: Query<&FollowCamera>,
    mut query: Query<
        (
            &mut Transform,
            &mut CharacterController,
            &mut PlayerAnimator,
            &mut PlayerInput,
        ),
        With<Player>,
    >,
    mut damaged: EventWriter<PlayerDamaged>,
) {
    let dt = time.delta_seconds();
    let camera_yaw = cameras.get_single().map(|camera| camera.yaw).unwrap_or(0.0);
    let Course { platforms, room, .. } = &mut *course;

    for (mut transform, mut controller, mut animator, mut input) in &mut query {
        animator.tick(dt);

        let tick = TickInput {
            dt,
            keys: *input,
            camera_yaw,
        };
        input.jump_pressed = false;

        let report = controller.update(&tick, platforms, Some(&*room), &mut *animator, &mut *sound);

        transform.translation = controller.position();
        transform.rotation = controller.rotation();

        if report.jumped || report.landed || report.wall_blocked {
            debug!(
                "Player at {:?}: jumped {}, landed {}, blocked {}",
                controller.position(),
                report.jumped,
                report.landed,
                report.wall_blocked
            );
        }

        if report.fall_damage.is_some() {
            damaged.send(PlayerDamaged {
                health: controller.health(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bevy::time::TimeUpdateStrategy;

    use super::*;
    use crate::platform::VelocityEstimate;

    const DT: f32 = 1.0 / 60.0;

    #[derive(Default)]
    struct RecordingAnimation {
        animator: PlayerAnimator,
        played: Vec<(AnimationClip, bool)>,
    }

    impl AnimationDriver for RecordingAnimation {
        fn play(&mut self, clip: AnimationClip, restart: bool) {
            self.played.push((clip, restart));
            self.animator.play(clip, restart);
        }

        fn current(&self) -> Option<AnimationClip> {
            self.animator.current()
        }

        fn is_finished(&self) -> bool {
            self.animator.is_finished()
        }
    }

    #[derive(Default)]
    struct RecordingSound {
        events: Vec<(SoundEvent, Option<f32>, Option<f32>)>,
    }

    impl RecordingSound {
        fn count(&self, wanted: impl Fn(SoundEvent) -> bool) -> usize {
            self.events.iter().filter(|(e, _, _)| wanted(*e)).count()
        }
    }

    impl SoundDriver for RecordingSound {
        fn play_event(&mut self, event: SoundEvent, pitch: Option<f32>, volume: Option<f32>) {
            self.events.push((event, pitch, volume));
        }
    }

    struct Rig {
        controller: CharacterController,
        course: PlatformSet,
        room: Option<Room>,
        animation: RecordingAnimation,
        sound: RecordingSound,
    }

    impl Rig {
        fn new(position: Vec3) -> Self {
            Self {
                controller: CharacterController::new(MovementSettings::default(), position),
                course: PlatformSet::new(Vec3::ZERO, VelocityEstimate::ReferenceStep),
                room: None,
                animation: RecordingAnimation::default(),
                sound: RecordingSound::default(),
            }
        }

        fn airborne(mut self) -> Self {
            self.controller.grounded = false;
            self
        }

        fn tick(&mut self, dt: f32, keys: PlayerInput) -> TickReport {
            self.course.update(dt);
            self.tick_player(dt, keys)
        }

        fn tick_player(&mut self, dt: f32, keys: PlayerInput) -> TickReport {
            let tick = TickInput {
                dt,
                keys,
                camera_yaw: 0.0,
            };
            self.controller.update(
                &tick,
                &mut self.course,
                self.room.as_ref(),
                &mut self.animation,
                &mut self.sound,
            )
        }

        fn fall_until_grounded(&mut self) -> Vec<TickReport> {
            let mut reports = Vec::new();
            for _ in 0..600 {
                let report = self.tick(DT, PlayerInput::default());
                reports.push(report);
                if self.controller.is_grounded() {
                    break;
                }
            }
            reports
        }
    }

    fn jump() -> PlayerInput {
        PlayerInput {
            jump_pressed: true,
            ..default()
        }
    }

    fn floor_y() -> f32 {
        MovementSettings::default().ground_level
    }

    #[test]
    fn jump_from_floor_sets_velocity_and_lifts_off() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        let report = rig.tick(DT, jump());

        assert!(report.jumped);
        assert!(!rig.controller.is_grounded());
        assert!((rig.controller.velocity().y - (7.5 - 18.0 / 60.0)).abs() < 1e-5);

        let rise = rig.controller.position().y - floor_y();
        assert!((rise - 7.2 / 60.0).abs() < 1e-5, "rose {rise}");
        assert!((rise - 0.125).abs() < 0.01);

        assert_eq!(rig.animation.played.first(), Some(&(AnimationClip::Jumping, true)));
        assert_eq!(rig.sound.count(|e| e == SoundEvent::Jump), 1);
    }

    #[test]
    fn jump_needs_ground() {
        let mut rig = Rig::new(Vec3::new(0.0, 3.0, 0.0)).airborne();
        let report = rig.tick(DT, jump());

        assert!(!report.jumped);
        assert!(rig.controller.velocity().y < 0.0);
    }

    #[test]
    fn landing_snaps_to_surface() {
        let mut rig = Rig::new(Vec3::new(0.0, 1.45, 0.0)).airborne();
        rig.course
            .add_static(Vec3::new(0.0, 1.0, 0.0), Vec3::new(2.0, 0.2, 2.0))
            .unwrap();

        let report = rig.tick(DT, PlayerInput::default());
        let surface = rig.course.platforms()[0].surface_y();

        assert!(report.landed);
        assert!(rig.controller.is_grounded());
        assert_eq!(rig.controller.position().y, surface + 0.3);
        assert_eq!(rig.controller.velocity(), Vec3::ZERO);
    }

    #[test]
    fn jumps_up_through_platform_and_lands_on_top() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        rig.course
            .add_static(Vec3::new(0.0, 1.2, 0.0), Vec3::new(2.0, 0.2, 2.0))
            .unwrap();

        rig.tick(DT, jump());
        rig.fall_until_grounded();

        let surface = rig.course.platforms()[0].surface_y();
        assert!(rig.controller.is_grounded());
        assert_eq!(rig.controller.position().y, surface + 0.3);
    }

    #[test]
    fn rider_moves_exactly_with_platform() {
        let start = Vec3::new(0.0, 2.0, 0.0);
        let mut rig = Rig::new(Vec3::new(0.0, 2.4, 0.0));
        rig.course
            .add_moving(start, Vec3::new(4.0, 2.0, 0.0), Vec3::new(2.0, 0.2, 2.0), 0.1)
            .unwrap();

        for _ in 0..120 {
            let before = rig.controller.position();
            rig.tick(DT, PlayerInput::default());
            let delta = rig.course.platforms()[0].delta();

            assert!(rig.controller.is_grounded());
            assert!((rig.controller.position().x - before.x - delta.x).abs() < 1e-5);
            assert!((rig.controller.position().y - 2.4).abs() < 1e-5);
        }
        assert!(rig.controller.position().x > 0.5);
    }

    #[test]
    fn jumping_off_a_mover_keeps_its_momentum() {
        let mut rig = Rig::new(Vec3::new(0.0, 2.4, 0.0));
        rig.course
            .add_moving(
                Vec3::new(0.0, 2.0, 0.0),
                Vec3::new(4.0, 2.0, 0.0),
                Vec3::new(2.0, 0.2, 2.0),
                0.1,
            )
            .unwrap();

        rig.tick(DT, PlayerInput::default());
        let inherited = rig.controller.velocity().x;
        assert!(inherited > 0.0);

        rig.tick(DT, jump());
        let before = rig.controller.position().x;
        rig.tick(DT, PlayerInput::default());
        let moved = rig.controller.position().x - before;
        assert!((moved - inherited * DT).abs() < 1e-5);
    }

    #[test]
    fn platform_side_cancels_horizontal_input() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        rig.course
            .add_static(Vec3::new(1.0, 0.3, 0.0), Vec3::new(1.0, 0.6, 1.0))
            .unwrap();
        let walk_right = PlayerInput {
            right: true,
            ..default()
        };

        let first = rig.tick(0.1, walk_right);
        assert!(!first.wall_blocked);
        let x_after_first = rig.controller.position().x;
        assert!((x_after_first - 0.35).abs() < 1e-5);

        let second = rig.tick(0.1, walk_right);
        assert!(second.wall_blocked);
        assert_eq!(rig.controller.position().x, x_after_first);
    }

    #[test]
    fn room_walls_clamp_the_player() {
        let mut rig = Rig::new(Vec3::new(9.0, floor_y(), 0.0));
        rig.room = Some(Room::new(-10.0, 10.0, -10.0, 10.0, 0.0, 8.0).unwrap());
        let walk_right = PlayerInput {
            right: true,
            ..default()
        };

        for _ in 0..10 {
            rig.tick(0.1, walk_right);
        }
        assert!((rig.controller.position().x - 9.7).abs() < 1e-5);
    }

    #[test]
    fn facing_snaps_to_movement_direction() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        rig.tick(
            DT,
            PlayerInput {
                right: true,
                ..default()
            },
        );
        assert!((rig.controller.facing_yaw() - 90.0).abs() < 1e-3);

        rig.tick(
            DT,
            PlayerInput {
                forward: true,
                ..default()
            },
        );
        assert!((rig.controller.facing_yaw() - 180.0).abs() < 1e-3);
    }

    #[test]
    fn opposite_keys_cancel_without_nan() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        rig.tick(
            DT,
            PlayerInput {
                left: true,
                right: true,
                ..default()
            },
        );
        assert!(rig.controller.position().is_finite());
        assert_eq!(rig.controller.position().x, 0.0);
        assert_eq!(rig.controller.facing_yaw(), 180.0);
    }

    #[test]
    fn diagonal_input_is_normalised() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        rig.tick(
            0.1,
            PlayerInput {
                forward: true,
                right: true,
                ..default()
            },
        );
        let p = rig.controller.position();
        let travelled = Vec2::new(p.x, p.z).length();
        assert!((travelled - 0.35).abs() < 1e-5);
    }

    #[test]
    fn damaging_fall_costs_one_health() {
        let mut rig = Rig::new(Vec3::new(0.0, 5.0, 0.0)).airborne();
        rig.course
            .add_static(Vec3::new(0.0, 2.5, 0.0), Vec3::new(2.0, 0.2, 2.0))
            .unwrap();

        let reports = rig.fall_until_grounded();
        let landing = reports.last().unwrap();

        assert!((rig.controller.position().y - 2.9).abs() < 1e-5);
        assert_eq!(rig.controller.health(), 2);
        assert!(landing.fall_damage.is_some());
        assert_eq!(rig.sound.count(|e| e == SoundEvent::Damage), 1);
        assert_eq!(rig.sound.count(|e| e == SoundEvent::Break), 1);
        assert_eq!(rig.controller.fall_peak, None);
    }

    #[test]
    fn short_fall_is_harmless() {
        let mut rig = Rig::new(Vec3::new(0.0, 5.0, 0.0)).airborne();
        rig.course
            .add_static(Vec3::new(0.0, 3.1, 0.0), Vec3::new(2.0, 0.2, 2.0))
            .unwrap();

        let reports = rig.fall_until_grounded();

        assert!((rig.controller.position().y - 3.5).abs() < 1e-5);
        assert_eq!(rig.controller.health(), 3);
        assert!(reports.iter().all(|r| r.fall_damage.is_none()));
        assert_eq!(rig.sound.count(|e| e == SoundEvent::Damage), 0);
    }

    #[test]
    fn fall_peak_includes_jump_apex() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        rig.tick(DT, jump());
        rig.fall_until_grounded();

        // Apex is about 1.56 above the floor: below the damage threshold.
        assert_eq!(rig.controller.health(), 3);
        assert_eq!(rig.controller.position().y, floor_y());
        assert_eq!(rig.controller.velocity(), Vec3::ZERO);
    }

    #[test]
    fn health_never_goes_below_zero() {
        let mut rig = Rig::new(Vec3::new(0.0, 5.0, 0.0)).airborne();
        rig.controller.health = 0;
        rig.fall_until_grounded();
        assert_eq!(rig.controller.health(), 0);
    }

    #[test]
    fn footsteps_follow_walk_cadence() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        let walk = PlayerInput {
            forward: true,
            ..default()
        };

        for _ in 0..10 {
            rig.tick(0.1, walk);
        }

        let steps: Vec<_> = rig
            .sound
            .events
            .iter()
            .filter(|(e, _, _)| matches!(e, SoundEvent::Footstep(_)))
            .collect();
        assert_eq!(steps.len(), 2);
        for (event, pitch, volume) in steps {
            let SoundEvent::Footstep(sample) = event else {
                unreachable!()
            };
            assert!(*sample < FOOTSTEP_SAMPLES);
            assert!((0.9..=1.1).contains(&pitch.unwrap()));
            assert!((0.8..=1.0).contains(&volume.unwrap()));
        }
    }

    #[test]
    fn stopping_resets_footstep_timer() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        let walk = PlayerInput {
            forward: true,
            ..default()
        };

        for _ in 0..4 {
            rig.tick(0.1, walk);
        }
        rig.tick(0.1, PlayerInput::default());
        for _ in 0..4 {
            rig.tick(0.1, walk);
        }
        assert_eq!(rig.sound.count(|e| matches!(e, SoundEvent::Footstep(_))), 0);
    }

    #[test]
    fn sprinting_steps_faster() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        let sprint = PlayerInput {
            forward: true,
            sprint: true,
            ..default()
        };

        // Steps on the third and sixth tick.
        for _ in 0..7 {
            rig.tick(0.11, sprint);
        }
        assert!(rig.controller.is_sprinting());
        assert_eq!(rig.sound.count(|e| matches!(e, SoundEvent::Footstep(_))), 2);
        assert!((rig.controller.position().z + 6.0 * 0.77).abs() < 1e-4);
    }

    #[test]
    fn sprint_cannot_start_in_the_air_but_carries_through_a_jump() {
        let mut rig = Rig::new(Vec3::new(0.0, 4.0, 0.0)).airborne();
        let sprint = PlayerInput {
            forward: true,
            sprint: true,
            ..default()
        };
        rig.tick(DT, sprint);
        assert!(!rig.controller.is_sprinting());

        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        rig.tick(DT, sprint);
        rig.tick(
            DT,
            PlayerInput {
                jump_pressed: true,
                ..sprint
            },
        );
        rig.tick(DT, sprint);
        assert!(!rig.controller.is_grounded());
        assert!(rig.controller.is_sprinting());
    }

    #[test]
    fn animation_follows_movement_state() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        let walk = PlayerInput {
            forward: true,
            ..default()
        };

        rig.tick(DT, walk);
        assert_eq!(rig.animation.current(), Some(AnimationClip::Walking));

        rig.tick(
            DT,
            PlayerInput {
                sprint: true,
                ..walk
            },
        );
        assert_eq!(rig.animation.current(), Some(AnimationClip::Sprinting));

        rig.tick(DT, PlayerInput::default());
        assert_eq!(rig.animation.current(), Some(AnimationClip::Idle));
    }

    #[test]
    fn jump_animation_ends_only_after_it_finishes() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        rig.tick(DT, jump());
        rig.fall_until_grounded();

        // The animator was never ticked, so the jump clip is still on its first frame.
        assert_eq!(rig.animation.current(), Some(AnimationClip::Jumping));

        for _ in 0..6 {
            rig.animation.animator.tick(1.0 / 14.0 + 1e-4);
        }
        rig.tick(DT, PlayerInput::default());
        assert_eq!(rig.animation.current(), Some(AnimationClip::Idle));
    }

    #[test]
    fn checkpoint_survives_reset() {
        let mut rig = Rig::new(Vec3::new(0.0, 5.0, 0.0)).airborne();
        rig.course
            .add_checkpoint(Vec3::new(5.0, 1.0, 0.0), Vec3::new(1.0, 0.2, 1.0))
            .unwrap();
        rig.course
            .add_checkpoint(Vec3::new(0.0, 4.0, 0.0), Vec3::new(1.0, 0.2, 1.0))
            .unwrap();

        let reports = rig.fall_until_grounded();
        assert_eq!(
            reports.last().unwrap().progress,
            Some(Progress::CheckpointReached(2))
        );
        assert_eq!(rig.sound.count(|e| e == SoundEvent::Checkpoint), 1);

        rig.controller.reset(3);
        rig.controller
            .set_position(rig.course.current_checkpoint_position());

        assert_eq!(rig.course.current_checkpoint(), 2);
        assert_eq!(rig.controller.position(), Vec3::new(0.0, 5.0, 0.0));
        assert_ne!(rig.controller.position(), rig.course.spawn_point());
        assert!(rig.controller.is_grounded());
        assert_eq!(rig.controller.velocity(), Vec3::ZERO);
    }

    #[test]
    fn reaching_the_goal_reports_completion_once() {
        let mut rig = Rig::new(Vec3::new(0.0, 1.45, 0.0)).airborne();
        rig.course
            .add_final(Vec3::new(0.0, 1.0, 0.0), Vec3::new(2.0, 0.2, 2.0))
            .unwrap();

        let first = rig.tick(DT, PlayerInput::default());
        let second = rig.tick(DT, PlayerInput::default());

        assert_eq!(first.progress, Some(Progress::Completed));
        assert_eq!(second.progress, None);
        assert!(rig.course.is_complete());
        assert_eq!(rig.sound.count(|e| e == SoundEvent::Victory), 1);
    }

    #[test]
    fn reset_restores_spawn_state() {
        let mut rig = Rig::new(Vec3::new(0.0, floor_y(), 0.0));
        rig.tick(
            DT,
            PlayerInput {
                right: true,
                sprint: true,
                jump_pressed: true,
                ..default()
            },
        );

        rig.controller.reset(1);
        assert!(rig.controller.is_grounded());
        assert!(!rig.controller.is_sprinting());
        assert_eq!(rig.controller.health(), 1);
        assert_eq!(rig.controller.velocity(), Vec3::ZERO);
        assert_eq!(rig.controller.facing_yaw(), 180.0);
        assert_eq!(rig.controller.fall_peak, None);
    }

    #[test]
    fn tick_player_without_course_update_leaves_rider_in_place() {
        let mut rig = Rig::new(Vec3::new(0.0, 2.4, 0.0));
        rig.course
            .add_moving(
                Vec3::new(0.0, 2.0, 0.0),
                Vec3::new(4.0, 2.0, 0.0),
                Vec3::new(2.0, 0.2, 2.0),
                0.1,
            )
            .unwrap();

        rig.tick_player(DT, PlayerInput::default());
        assert_eq!(rig.controller.position().x, 0.0);
    }

    fn input_app() -> App {
        let course = Course {
            platforms: PlatformSet::new(Vec3::ZERO, VelocityEstimate::ReferenceStep),
            room: Room::new(-10.0, 10.0, -10.0, 10.0, 0.0, 8.0).unwrap(),
            settings: MovementSettings::default(),
        };

        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f32(DT)))
            .init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<SoundEngine>()
            .insert_resource(course)
            .add_event::<PlayerDamaged>()
            .add_systems(Update, (read_player_input, apply_kinematics).chain());

        app.world_mut().spawn((
            Player,
            Transform::default(),
            CharacterController::new(MovementSettings::default(), Vec3::new(0.0, floor_y(), 0.0)),
            PlayerAnimator::new(AnimationClip::Idle),
            PlayerInput::default(),
        ));
        // The first frame has a zero delta.
        app.update();
        app
    }

    fn player(app: &mut App) -> (CharacterController, PlayerInput, Transform) {
        let mut query = app
            .world_mut()
            .query_filtered::<(&CharacterController, &PlayerInput, &Transform), With<Player>>();
        let (controller, input, transform) = query.single(app.world());
        (controller.clone(), *input, *transform)
    }

    #[test]
    fn held_space_jumps_once_per_press() {
        let mut app = input_app();

        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::Space);
        app.update();

        let (controller, input, transform) = player(&mut app);
        assert!(!controller.is_grounded());
        assert!(controller.velocity().y > 0.0);
        assert!(!input.jump_pressed);
        assert_eq!(transform.translation, controller.position());

        // Still held, but no longer a fresh press.
        app.world_mut().resource_mut::<ButtonInput<KeyCode>>().clear();
        for _ in 0..120 {
            app.update();
        }

        let (controller, input, _) = player(&mut app);
        assert!(controller.is_grounded());
        assert_eq!(controller.position().y, floor_y());
        assert!(!input.jump_pressed);
        assert!(app
            .world()
            .resource::<ButtonInput<KeyCode>>()
            .pressed(KeyCode::Space));
    }

    #[test]
    fn held_keys_move_the_player_entity() {
        let mut app = input_app();

        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::KeyW);
        for _ in 0..30 {
            app.update();
        }

        let (controller, input, transform) = player(&mut app);
        assert!(input.forward);
        assert!(controller.position().z < 0.0);
        assert_eq!(transform.translation, controller.position());
        assert_eq!(transform.rotation, controller.rotation());
    }
}
