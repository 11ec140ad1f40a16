//! The static room enclosing the course: a rectangular floor with walls. The player is kept
//! inside the horizontal rectangle and the camera is kept inside it and above the floor.

use bevy::prelude::*;

use crate::error::CourseError;

/// Extra clearance the camera keeps above the floor, on top of its own radius.
const CAMERA_FLOOR_CLEARANCE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Room {
    min_x: f32,
    max_x: f32,
    min_z: f32,
    max_z: f32,
    floor_y: f32,
    wall_top_y: f32,
}

impl Room {
    pub fn new(
        min_x: f32,
        max_x: f32,
        min_z: f32,
        max_z: f32,
        floor_y: f32,
        wall_top_y: f32,
    ) -> Result<Self, CourseError> {
        let bounds = [min_x, max_x, min_z, max_z, floor_y, wall_top_y];
        if bounds.iter().any(|value| !value.is_finite()) {
            return Err(CourseError::NonFinite {
                what: "room bounds".to_owned(),
            });
        }

        if !(min_x < max_x && min_z < max_z) {
            return Err(CourseError::InvertedRoom {
                min_x,
                max_x,
                min_z,
                max_z,
            });
        }

        if floor_y > wall_top_y {
            return Err(CourseError::FloorAboveWallTop {
                floor_y,
                wall_top_y,
            });
        }

        Ok(Self {
            min_x,
            max_x,
            min_z,
            max_z,
            floor_y,
            wall_top_y,
        })
    }

    pub fn floor_y(&self) -> f32 {
        self.floor_y
    }

    pub fn wall_top_y(&self) -> f32 {
        self.wall_top_y
    }

    /// Horizontal size (x, z) of the room.
    pub fn extent(&self) -> Vec2 {
        Vec2::new(self.max_x - self.min_x, self.max_z - self.min_z)
    }

    /// Horizontal center of the room, at floor height.
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min_x + self.max_x) * 0.5,
            self.floor_y,
            (self.min_z + self.max_z) * 0.5,
        )
    }

    /// Clamps a camera position into the room, inset by `radius`, and lifts it above the floor.
    pub fn constrain_point(&self, point: Vec3, radius: f32) -> Vec3 {
        let min_y = self.floor_y + CAMERA_FLOOR_CLEARANCE + radius;

        Vec3::new(
            clamp_inset(point.x, self.min_x, self.max_x, radius),
            point.y.max(min_y),
            clamp_inset(point.z, self.min_z, self.max_z, radius),
        )
    }

    /// True when a sphere of `radius` centered on `to` would poke out of the walls.
    pub fn blocks_movement(&self, _from: Vec3, to: Vec3, radius: f32) -> bool {
        to.x - radius < self.min_x
            || to.x + radius > self.max_x
            || to.z - radius < self.min_z
            || to.z + radius > self.max_z
    }

    /// Pulls `to` back inside the inset rectangle. Height passes through untouched.
    pub fn constrain_movement(&self, _from: Vec3, to: Vec3, radius: f32) -> Vec3 {
        Vec3::new(
            clamp_inset(to.x, self.min_x, self.max_x, radius),
            to.y,
            clamp_inset(to.z, self.min_z, self.max_z, radius),
        )
    }
}

// `f32::clamp` panics when the inset range is inverted (radius wider than the room), so the
// lower bound simply wins in that case.
fn clamp_inset(value: f32, min: f32, max: f32, radius: f32) -> f32 {
    value.min(max - radius).max(min + radius)
}
