//! Configuration errors raised while building a course. Every variant is detected before the
//! first tick runs; the per-frame simulation itself has no failure path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourseError {
    #[error("course file `{path}` could not be read: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("course description is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("room bounds are inverted: x [{min_x}, {max_x}], z [{min_z}, {max_z}]")]
    InvertedRoom {
        min_x: f32,
        max_x: f32,
        min_z: f32,
        max_z: f32,
    },

    #[error("room floor {floor_y} lies above the wall top {wall_top_y}")]
    FloorAboveWallTop { floor_y: f32, wall_top_y: f32 },

    #[error("platform {index} has a non-positive size {width} x {height} x {depth}")]
    NonPositiveSize {
        index: usize,
        width: f32,
        height: f32,
        depth: f32,
    },

    #[error("moving platform {index} has a zero-length path")]
    DegeneratePath { index: usize },

    #[error("moving platform {index} has a non-positive speed {speed}")]
    NonPositiveSpeed { index: usize, speed: f32 },

    #[error("platform {index} refers to unknown size preset `{name}`")]
    UnknownSize { index: usize, name: String },

    #[error("{what} is not a finite number")]
    NonFinite { what: String },

    #[error("player radius must be positive, got {0}")]
    NonPositiveRadius(f32),
}
