//! The set of platforms making up a course, plus the player's progress through it.
//!
//! Support lookup is a pure query (`find_support`); recording checkpoint and completion
//! progress is a separate command (`advance_progress`) the caller issues with the support it
//! decided to act on.

use bevy::prelude::*;

use crate::error::CourseError;
use crate::platform::{Platform, PlatformKind, VelocityEstimate};

/// Offset from a checkpoint platform's center to the point the player respawns at.
pub const CHECKPOINT_RESPAWN_OFFSET: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// The platform currently holding the player up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Support {
    pub index: usize,
    pub surface_y: f32,
    pub velocity: Vec3,
    pub delta: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    CheckpointReached(usize),
    Completed,
}

#[derive(Debug, Clone)]
pub struct PlatformSet {
    platforms: Vec<Platform>,
    /// Respawn points by checkpoint ordinal; index 0 is the course spawn point.
    checkpoints: Vec<Vec3>,
    current_checkpoint: usize,
    complete: bool,
    velocity_estimate: VelocityEstimate,
}

impl PlatformSet {
    pub fn new(spawn: Vec3, velocity_estimate: VelocityEstimate) -> Self {
        Self {
            platforms: Vec::new(),
            checkpoints: vec![spawn],
            current_checkpoint: 0,
            complete: false,
            velocity_estimate,
        }
    }

    pub fn add_static(&mut self, position: Vec3, size: Vec3) -> Result<usize, CourseError> {
        self.push(Platform::new(position, size, PlatformKind::Static))
    }

    pub fn add_moving(
        &mut self,
        start: Vec3,
        end: Vec3,
        size: Vec3,
        speed: f32,
    ) -> Result<usize, CourseError> {
        self.push(Platform::moving(start, end, size, speed))
    }

    /// Checkpoints are numbered in the order they are added.
    pub fn add_checkpoint(&mut self, position: Vec3, size: Vec3) -> Result<usize, CourseError> {
        let ordinal = self.checkpoints.len();
        let index = self.push(Platform::new(
            position,
            size,
            PlatformKind::Checkpoint { ordinal },
        ))?;
        self.checkpoints.push(position + CHECKPOINT_RESPAWN_OFFSET);
        Ok(index)
    }

    pub fn add_final(&mut self, position: Vec3, size: Vec3) -> Result<usize, CourseError> {
        self.push(Platform::new(position, size, PlatformKind::Final))
    }

    fn push(&mut self, platform: Platform) -> Result<usize, CourseError> {
        let index = self.platforms.len();
        platform.validate(index)?;
        self.platforms.push(platform);
        Ok(index)
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Number of checkpoint platforms (the spawn point is not counted).
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len() - 1
    }

    pub fn update(&mut self, dt: f32) {
        for platform in &mut self.platforms {
            platform.update(dt);
        }
    }

    /// Finds the highest platform surface the player is resting on. On equal heights the
    /// platform added first wins.
    pub fn find_support(&self, player: Vec3, radius: f32) -> Option<Support> {
        let mut best: Option<Support> = None;

        for (index, platform) in self.platforms.iter().enumerate() {
            let Some(surface_y) = platform.player_support(player, radius) else {
                continue;
            };

            if best.map_or(true, |b| surface_y > b.surface_y) {
                best = Some(Support {
                    index,
                    surface_y,
                    velocity: platform.velocity(self.velocity_estimate),
                    delta: platform.delta(),
                });
            }
        }

        best
    }

    /// Records what standing on `support` means for course progress. Returns the progress
    /// made, if any: a new furthest checkpoint, or completion the first time the goal is
    /// reached.
    pub fn advance_progress(&mut self, support: &Support) -> Option<Progress> {
        match self.platforms.get(support.index)?.kind() {
            PlatformKind::Checkpoint { ordinal } if ordinal > self.current_checkpoint => {
                self.current_checkpoint = ordinal;
                info!("Checkpoint {} reached", ordinal);
                Some(Progress::CheckpointReached(ordinal))
            }
            PlatformKind::Final if !self.complete => {
                self.complete = true;
                info!("Course completed");
                Some(Progress::Completed)
            }
            _ => None,
        }
    }

    /// True if any platform side stands in the way of moving from `from` to `to`.
    pub fn blocks_movement(&self, from: Vec3, to: Vec3, radius: f32) -> bool {
        self.platforms
            .iter()
            .any(|platform| platform.blocks_movement(from, to, radius))
    }

    pub fn current_checkpoint(&self) -> usize {
        self.current_checkpoint
    }

    pub fn current_checkpoint_position(&self) -> Vec3 {
        // Ordinals only ever come from `add_checkpoint`, so the index is always mapped.
        self.checkpoints[self.current_checkpoint]
    }

    pub fn spawn_point(&self) -> Vec3 {
        self.checkpoints[0]
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn reset_completion(&mut self) {
        self.complete = false;
    }

    /// Full restart: back to the spawn point with no checkpoints and the goal unreached.
    pub fn reset_progress(&mut self) {
        self.current_checkpoint = 0;
        self.reset_completion();
    }
}
