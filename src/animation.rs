//! Player animation clips. The controller only talks to the [`AnimationDriver`] trait; the
//! [`PlayerAnimator`] component is the in-game implementation, a frame timer per clip.

use bevy::prelude::*;

use crate::player::{Player, PlayerVisual};
use crate::state::GameSet;

pub struct AnimationPlugin;

impl Plugin for AnimationPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, pose_player_visual.after(GameSet::Movement));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationClip {
    Idle,
    Walking,
    Sprinting,
    Jumping,
}

struct ClipSpec {
    frames: usize,
    frame_rate: f32,
    looping: bool,
}

impl AnimationClip {
    pub fn name(self) -> &'static str {
        match self {
            AnimationClip::Idle => "idle",
            AnimationClip::Walking => "walking",
            AnimationClip::Sprinting => "sprinting",
            AnimationClip::Jumping => "jumping",
        }
    }

    fn spec(self) -> ClipSpec {
        match self {
            AnimationClip::Idle => ClipSpec {
                frames: 1,
                frame_rate: 1.0,
                looping: true,
            },
            AnimationClip::Walking => ClipSpec {
                frames: 6,
                frame_rate: 12.0,
                looping: true,
            },
            AnimationClip::Sprinting => ClipSpec {
                frames: 6,
                frame_rate: 18.0,
                looping: true,
            },
            AnimationClip::Jumping => ClipSpec {
                frames: 7,
                frame_rate: 14.0,
                looping: false,
            },
        }
    }
}

/// What the character controller needs from whatever plays its animations.
pub trait AnimationDriver {
    /// Switches to `clip`. Re-playing the current clip only rewinds it when `restart` is set.
    fn play(&mut self, clip: AnimationClip, restart: bool);

    fn current(&self) -> Option<AnimationClip>;

    /// True once a non-looping clip has reached its last frame. Looping clips never finish.
    fn is_finished(&self) -> bool;
}

#[derive(Component, Debug, Default)]
pub struct PlayerAnimator {
    current: Option<AnimationClip>,
    frame: usize,
    timer: f32,
}

impl PlayerAnimator {
    pub fn new(clip: AnimationClip) -> Self {
        Self {
            current: Some(clip),
            ..default()
        }
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Advances the current clip by at most one frame.
    pub fn tick(&mut self, dt: f32) {
        let Some(clip) = self.current else {
            return;
        };

        let spec = clip.spec();
        let frame_duration = 1.0 / spec.frame_rate;

        self.timer += dt;
        if self.timer < frame_duration {
            return;
        }

        self.timer -= frame_duration;
        self.frame += 1;

        if self.frame >= spec.frames {
            self.frame = if spec.looping { 0 } else { spec.frames - 1 };
        }
    }
}

impl AnimationDriver for PlayerAnimator {
    fn play(&mut self, clip: AnimationClip, restart: bool) {
        if self.current != Some(clip) || restart {
            self.current = Some(clip);
            self.frame = 0;
            self.timer = 0.0;
        }
    }

    fn current(&self) -> Option<AnimationClip> {
        self.current
    }

    fn is_finished(&self) -> bool {
        match self.current {
            Some(clip) => {
                let spec = clip.spec();
                !spec.looping && self.frame >= spec.frames - 1
            }
            None => false,
        }
    }
}

/// Stand-in for skinned playback: squashes and stretches the player's mesh by clip and frame.
fn pose_player_visual(
    animators: Query<&PlayerAnimator, With<Player>>,
    mut visuals: Query<&mut Transform, With<PlayerVisual>>,
) {
    let Ok(animator) = animators.get_single() else {
        return;
    };

    let stretch = match animator.current() {
        Some(AnimationClip::Jumping) => 1.0 + 0.04 * (3.0 - animator.frame() as f32).abs(),
        Some(AnimationClip::Walking) | Some(AnimationClip::Sprinting) => {
            1.0 + 0.02 * (animator.frame() % 2) as f32
        }
        _ => 1.0,
    };

    for mut transform in &mut visuals {
        transform.scale = Vec3::new(1.0 / stretch.sqrt(), stretch, 1.0 / stretch.sqrt());
    }
}
