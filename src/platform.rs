//! A single collidable platform. Platforms are axis-aligned boxes; moving platforms slide back
//! and forth between two fixed endpoints and remember how far they travelled this tick so a
//! rider can be carried exactly that far.

use bevy::prelude::*;
use serde::Deserialize;

use crate::error::CourseError;

/// Tick length the momentum estimate assumes (60 Hz), independent of the real frame time.
pub const REFERENCE_TIMESTEP: f32 = 1.0 / 60.0;

/// How far the player's feet may sink below a surface and still count as standing on it.
const SUPPORT_SINK_TOLERANCE: f32 = 0.1;
/// How far the player's feet may hover above a surface and still count as standing on it.
const SUPPORT_HOVER_TOLERANCE: f32 = 0.15;

/// How a platform's velocity is derived from its per-tick displacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityEstimate {
    /// `delta / REFERENCE_TIMESTEP`. Momentum handed to the player has the same magnitude for
    /// the same displacement whatever the frame rate.
    #[default]
    ReferenceStep,
    /// `delta / dt` of the last update.
    ElapsedTime,
}

/// Linear back-and-forth motion between `start` and `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingPongPath {
    start: Vec3,
    end: Vec3,
    speed: f32,
    /// Position along the triangle wave, kept in `[0, 2)`.
    progress: f32,
}

impl PingPongPath {
    pub fn new(start: Vec3, end: Vec3, speed: f32) -> Self {
        Self {
            start,
            end,
            speed,
            progress: 0.0,
        }
    }

    pub fn start(&self) -> Vec3 {
        self.start
    }

    pub fn end(&self) -> Vec3 {
        self.end
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Advances along the path and returns the new position.
    fn advance(&mut self, dt: f32) -> Vec3 {
        self.progress = (self.progress + dt * self.speed).rem_euclid(2.0);
        self.sample()
    }

    fn sample(&self) -> Vec3 {
        let t = if self.progress > 1.0 {
            2.0 - self.progress
        } else {
            self.progress
        };

        self.start.lerp(self.end, t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlatformKind {
    Static,
    Moving(PingPongPath),
    /// Checkpoints are numbered from 1 in course order; 0 is the spawn point.
    Checkpoint { ordinal: usize },
    Final,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    position: Vec3,
    /// Width (x), thickness (y) and depth (z).
    size: Vec3,
    kind: PlatformKind,
    delta: Vec3,
    last_dt: f32,
}

impl Platform {
    pub fn new(position: Vec3, size: Vec3, kind: PlatformKind) -> Self {
        let position = match kind {
            PlatformKind::Moving(path) => path.start(),
            _ => position,
        };

        Self {
            position,
            size,
            kind,
            delta: Vec3::ZERO,
            last_dt: 0.0,
        }
    }

    pub fn moving(start: Vec3, end: Vec3, size: Vec3, speed: f32) -> Self {
        Self::new(
            start,
            size,
            PlatformKind::Moving(PingPongPath::new(start, end, speed)),
        )
    }

    /// Rejects shapes and paths that would make the per-tick queries meaningless.
    pub fn validate(&self, index: usize) -> Result<(), CourseError> {
        if !self.position.is_finite() || !self.size.is_finite() {
            return Err(CourseError::NonFinite {
                what: format!("platform {index} position or size"),
            });
        }

        if !(self.size.x > 0.0 && self.size.y > 0.0 && self.size.z > 0.0) {
            return Err(CourseError::NonPositiveSize {
                index,
                width: self.size.x,
                height: self.size.y,
                depth: self.size.z,
            });
        }

        if let PlatformKind::Moving(path) = self.kind {
            if !path.end().is_finite() || !path.speed().is_finite() {
                return Err(CourseError::NonFinite {
                    what: format!("moving platform {index} path"),
                });
            }
            if path.start().distance_squared(path.end()) <= f32::EPSILON {
                return Err(CourseError::DegeneratePath { index });
            }
            if !(path.speed() > 0.0) {
                return Err(CourseError::NonPositiveSpeed {
                    index,
                    speed: path.speed(),
                });
            }
        }

        Ok(())
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn size(&self) -> Vec3 {
        self.size
    }

    pub fn kind(&self) -> PlatformKind {
        self.kind
    }

    /// Displacement applied by the most recent `update`.
    pub fn delta(&self) -> Vec3 {
        self.delta
    }

    pub fn update(&mut self, dt: f32) {
        let previous = self.position;

        if let PlatformKind::Moving(ref mut path) = self.kind {
            self.position = path.advance(dt);
        }

        self.delta = self.position - previous;
        self.last_dt = dt;
    }

    pub fn velocity(&self, estimate: VelocityEstimate) -> Vec3 {
        match estimate {
            VelocityEstimate::ReferenceStep => self.delta / REFERENCE_TIMESTEP,
            VelocityEstimate::ElapsedTime if self.last_dt > 0.0 => self.delta / self.last_dt,
            VelocityEstimate::ElapsedTime => Vec3::ZERO,
        }
    }

    pub fn surface_y(&self) -> f32 {
        self.position.y + self.size.y * 0.5
    }

    pub fn bottom_y(&self) -> f32 {
        self.position.y - self.size.y * 0.5
    }

    /// Footprint test with no margin: edges count as inside.
    pub fn contains_horizontal(&self, x: f32, z: f32) -> bool {
        let half_width = self.size.x * 0.5;
        let half_depth = self.size.z * 0.5;

        x >= self.position.x - half_width
            && x <= self.position.x + half_width
            && z >= self.position.z - half_depth
            && z <= self.position.z + half_depth
    }

    /// Returns the surface height when a sphere at `player` of `radius` rests on this platform.
    pub fn player_support(&self, player: Vec3, radius: f32) -> Option<f32> {
        if !self.contains_horizontal(player.x, player.z) {
            return None;
        }

        let surface_y = self.surface_y();
        let gap = (player.y - radius) - surface_y;

        (-SUPPORT_SINK_TOLERANCE..=SUPPORT_HOVER_TOLERANCE)
            .contains(&gap)
            .then_some(surface_y)
    }

    /// Side collision. Rising movement always passes, as does anything already above the top,
    /// so the player can jump up through a platform and land on it.
    pub fn blocks_movement(&self, from: Vec3, to: Vec3, radius: f32) -> bool {
        if !self.contains_horizontal(to.x, to.z) {
            return false;
        }

        if to.y > from.y {
            return false;
        }

        let surface_y = self.surface_y();
        if from.y - radius > surface_y {
            return false;
        }

        let player_bottom = to.y - radius;
        let player_top = to.y + radius;

        player_bottom < surface_y && player_top > self.bottom_y()
    }
}
