//! Global game state definitions. Switching states updates an enum value and triggers the
//! on-enter/on-exit schedules that spawn and tear down overlays.

use bevy::input::keyboard::KeyCode;
use bevy::prelude::*;

/// High-level state machine for a run through the course.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum GameState {
    #[default]
    Loading,
    Playing,
    Paused,
    /// Health ran out. R restarts.
    GameOver,
    /// The final platform was reached. R restarts.
    Won,
}

/// Named system sets to structure the Update schedule.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameSet {
    Input,
    Movement,
    Effects,
}

/// Toggles between Playing and Paused when `ESC` is pressed. `NextState` holds the pending
/// transition, which Bevy applies before the next `Update`.
pub fn toggle_pause(
    keyboard: Res<ButtonInput<KeyCode>>,
    state: Res<State<GameState>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if !keyboard.just_pressed(KeyCode::Escape) {
        return;
    }

    match state.get() {
        GameState::Playing => next_state.set(GameState::Paused),
        GameState::Paused => next_state.set(GameState::Playing),
        GameState::Loading | GameState::GameOver | GameState::Won => {}
    }
}
