//! Course orchestration: reads the course description, builds the platform set and room, spawns
//! their visuals and drives moving platforms each frame.
//!
//! The description is TOML. Native builds read it from the assets directory and fall back to the
//! copy compiled into the binary; web builds always use the compiled-in copy.

use std::collections::HashMap;

use bevy::prelude::*;
use serde::Deserialize;

use crate::course::PlatformSet;
use crate::error::CourseError;
use crate::movement::{apply_kinematics, MovementSettings};
use crate::platform::{PlatformKind, VelocityEstimate};
use crate::room::Room;
use crate::state::{GameSet, GameState};

const BUILTIN_COURSE: &str = include_str!("../assets/courses/parkour.toml");

const WALL_THICKNESS: f32 = 0.2;

/// Registers course loading, platform advancement and visual sync.
pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LevelConfig>()
            .add_systems(OnEnter(GameState::Loading), load_course)
            .add_systems(
                Update,
                finish_loading
                    .run_if(in_state(GameState::Loading).and_then(resource_exists::<Course>)),
            )
            .add_systems(OnExit(GameState::Loading), spawn_course_visuals)
            .add_systems(
                Update,
                advance_platforms
                    .in_set(GameSet::Movement)
                    .before(apply_kinematics),
            )
            .add_systems(
                Update,
                sync_platform_visuals
                    .after(GameSet::Movement)
                    .run_if(resource_exists::<Course>),
            );
    }
}

/// Which course file to load, relative to the assets directory.
#[derive(Resource, Clone)]
pub struct LevelConfig {
    pub course_path: String,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            course_path: "courses/parkour.toml".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RoomConfig {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
    #[serde(default)]
    pub floor_y: f32,
    pub wall_top_y: f32,
}

/// A platform footprint, either inline `[width, thickness, depth]` or the name of a preset from
/// the `[sizes]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SizeRef {
    Explicit([f32; 3]),
    Preset(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformDef {
    Static {
        position: [f32; 3],
        size: SizeRef,
    },
    Moving {
        start: [f32; 3],
        end: [f32; 3],
        size: SizeRef,
        speed: f32,
    },
    Checkpoint {
        position: [f32; 3],
        size: SizeRef,
    },
    Final {
        position: [f32; 3],
        size: SizeRef,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseConfig {
    pub spawn: [f32; 3],
    #[serde(default)]
    pub platform_velocity: VelocityEstimate,
    pub room: RoomConfig,
    #[serde(default)]
    pub movement: MovementSettings,
    #[serde(default)]
    pub sizes: HashMap<String, [f32; 3]>,
    #[serde(default)]
    pub platforms: Vec<PlatformDef>,
}

impl CourseConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, CourseError> {
        Ok(toml::from_str(source)?)
    }

    /// Validates the description and builds the runtime course. Checkpoints are numbered in the
    /// order they are declared.
    pub fn build(&self) -> Result<Course, CourseError> {
        self.movement.validate()?;
        if !Vec3::from(self.spawn).is_finite() {
            return Err(CourseError::NonFinite {
                what: "spawn point".to_owned(),
            });
        }

        let room = Room::new(
            self.room.min_x,
            self.room.max_x,
            self.room.min_z,
            self.room.max_z,
            self.room.floor_y,
            self.room.wall_top_y,
        )?;

        let mut platforms = PlatformSet::new(Vec3::from(self.spawn), self.platform_velocity);
        for (index, def) in self.platforms.iter().enumerate() {
            match def {
                PlatformDef::Static { position, size } => {
                    platforms.add_static(Vec3::from(*position), self.resolve_size(index, size)?)?
                }
                PlatformDef::Moving {
                    start,
                    end,
                    size,
                    speed,
                } => platforms.add_moving(
                    Vec3::from(*start),
                    Vec3::from(*end),
                    self.resolve_size(index, size)?,
                    *speed,
                )?,
                PlatformDef::Checkpoint { position, size } => platforms
                    .add_checkpoint(Vec3::from(*position), self.resolve_size(index, size)?)?,
                PlatformDef::Final { position, size } => {
                    platforms.add_final(Vec3::from(*position), self.resolve_size(index, size)?)?
                }
            };
        }

        Ok(Course {
            platforms,
            room,
            settings: self.movement,
        })
    }

    fn resolve_size(&self, index: usize, size: &SizeRef) -> Result<Vec3, CourseError> {
        match size {
            SizeRef::Explicit(dims) => Ok(Vec3::from(*dims)),
            SizeRef::Preset(name) => self
                .sizes
                .get(name)
                .map(|dims| Vec3::from(*dims))
                .ok_or_else(|| CourseError::UnknownSize {
                    index,
                    name: name.clone(),
                }),
        }
    }
}

/// The loaded course: platforms, the room around them and the tuning the player uses on it.
#[derive(Resource, Debug, Clone)]
pub struct Course {
    pub platforms: PlatformSet,
    pub room: Room,
    pub settings: MovementSettings,
}

impl Course {
    pub fn builtin() -> Result<Self, CourseError> {
        CourseConfig::from_toml_str(BUILTIN_COURSE)?.build()
    }
}

/// Links a spawned mesh to its platform index.
#[derive(Component, Debug, Clone, Copy)]
pub struct PlatformVisual(pub usize);

/// Marker for every entity spawned for the course, so a reload can clear them.
#[derive(Component)]
pub struct CourseRoot;

#[cfg(not(target_arch = "wasm32"))]
fn read_course(path: &str) -> Result<Course, CourseError> {
    let full_path = std::path::Path::new("assets").join(path);
    let source = std::fs::read_to_string(&full_path).map_err(|source| CourseError::Io {
        path: full_path.display().to_string(),
        source,
    })?;
    CourseConfig::from_toml_str(&source)?.build()
}

#[cfg(target_arch = "wasm32")]
fn read_course(_path: &str) -> Result<Course, CourseError> {
    Course::builtin()
}

fn load_course(mut commands: Commands, config: Res<LevelConfig>) {
    let course = match read_course(&config.course_path) {
        Ok(course) => course,
        Err(err) => {
            warn!(
                "Unable to load course '{}': {}; using the built-in course.",
                config.course_path, err
            );
            match Course::builtin() {
                Ok(course) => course,
                Err(err) => {
                    error!("Built-in course is invalid: {}", err);
                    return;
                }
            }
        }
    };

    info!(
        "Loaded course with {} platforms and {} checkpoints",
        course.platforms.platforms().len(),
        course.platforms.checkpoint_count()
    );

    commands.insert_resource(course.settings);
    commands.insert_resource(course);
}

fn finish_loading(mut next_state: ResMut<NextState<GameState>>) {
    next_state.set(GameState::Playing);
}

fn spawn_course_visuals(
    mut commands: Commands,
    course: Option<Res<Course>>,
    existing: Query<Entity, With<CourseRoot>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(course) = course else {
        return;
    };

    for entity in &existing {
        commands.entity(entity).despawn_recursive();
    }

    let room = course.room;
    let extent = room.extent();
    let center = room.center();
    let wall_height = room.wall_top_y() - room.floor_y();

    let floor_material = materials.add(Color::srgb(0.35, 0.33, 0.3));
    let wall_material = materials.add(Color::srgb(0.55, 0.3, 0.25));

    commands.spawn((
        CourseRoot,
        Name::new("Floor"),
        PbrBundle {
            mesh: meshes.add(Cuboid::new(extent.x, WALL_THICKNESS, extent.y)),
            material: floor_material,
            transform: Transform::from_translation(center - Vec3::Y * WALL_THICKNESS * 0.5),
            ..default()
        },
    ));

    let half = extent * 0.5;
    let walls = [
        (Vec3::new(0.0, 0.0, -half.y), Vec3::new(extent.x, wall_height, WALL_THICKNESS)),
        (Vec3::new(0.0, 0.0, half.y), Vec3::new(extent.x, wall_height, WALL_THICKNESS)),
        (Vec3::new(-half.x, 0.0, 0.0), Vec3::new(WALL_THICKNESS, wall_height, extent.y)),
        (Vec3::new(half.x, 0.0, 0.0), Vec3::new(WALL_THICKNESS, wall_height, extent.y)),
    ];
    for (offset, size) in walls {
        commands.spawn((
            CourseRoot,
            Name::new("Wall"),
            PbrBundle {
                mesh: meshes.add(Cuboid::from_size(size)),
                material: wall_material.clone(),
                transform: Transform::from_translation(
                    center + offset + Vec3::Y * wall_height * 0.5,
                ),
                ..default()
            },
        ));
    }

    for (index, platform) in course.platforms.platforms().iter().enumerate() {
        let color = match platform.kind() {
            PlatformKind::Static => Color::srgb(0.6, 0.6, 0.65),
            PlatformKind::Moving(_) => Color::srgb(0.3, 0.5, 0.85),
            PlatformKind::Checkpoint { .. } => Color::srgb(0.95, 0.8, 0.2),
            PlatformKind::Final => Color::srgb(0.3, 0.85, 0.4),
        };

        commands.spawn((
            CourseRoot,
            PlatformVisual(index),
            Name::new(format!("Platform {index}")),
            PbrBundle {
                mesh: meshes.add(Cuboid::from_size(platform.size())),
                material: materials.add(color),
                transform: Transform::from_translation(platform.position()),
                ..default()
            },
        ));
    }
}

pub(crate) fn advance_platforms(time: Res<Time>, mut course: ResMut<Course>) {
    course.platforms.update(time.delta_seconds());
}

fn sync_platform_visuals(
    course: Res<Course>,
    mut visuals: Query<(&PlatformVisual, &mut Transform)>,
) {
    let platforms = course.platforms.platforms();
    for (visual, mut transform) in &mut visuals {
        if let Some(platform) = platforms.get(visual.0) {
            transform.translation = platform.position();
        }
    }
}
