//! Overlays: the pause menu, the health/checkpoint HUD and the end-of-run screens.

use bevy::prelude::*;

use crate::level::Course;
use crate::movement::CharacterController;
use crate::player::Player;
use crate::state::GameState;

/// Registers overlay spawn/despawn systems and the HUD refresh.
pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Paused), spawn_pause_menu)
            .add_systems(OnExit(GameState::Paused), despawn_overlay::<PauseMenu>)
            .add_systems(OnExit(GameState::Loading), spawn_hud)
            .add_systems(
                Update,
                update_hud.run_if(resource_exists::<Course>),
            )
            .add_systems(OnEnter(GameState::GameOver), spawn_game_over)
            .add_systems(OnExit(GameState::GameOver), despawn_overlay::<EndScreen>)
            .add_systems(OnEnter(GameState::Won), spawn_victory)
            .add_systems(OnExit(GameState::Won), despawn_overlay::<EndScreen>);
    }
}

#[derive(Component)]
struct PauseMenu;

#[derive(Component)]
struct EndScreen;

#[derive(Component)]
struct HudText;

fn overlay_node() -> NodeBundle {
    NodeBundle {
        background_color: BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.6)),
        style: Style {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            align_items: AlignItems::Center,
            justify_content: JustifyContent::Center,
            ..default()
        },
        ..default()
    }
}

fn overlay_text(message: &str, color: Color) -> TextBundle {
    TextBundle::from_section(
        message,
        TextStyle {
            font_size: 36.0,
            color,
            ..default()
        },
    )
    .with_text_justify(JustifyText::Center)
}

fn spawn_pause_menu(mut commands: Commands) {
    commands
        .spawn((PauseMenu, Name::new("PauseMenu"), overlay_node()))
        .with_children(|parent| {
            parent.spawn(overlay_text(
                "Paused\nPress ESC to resume",
                Color::srgba(0.9, 0.9, 0.9, 1.0),
            ));
        });
}

fn spawn_game_over(mut commands: Commands) {
    commands
        .spawn((EndScreen, Name::new("GameOver"), overlay_node()))
        .with_children(|parent| {
            parent.spawn(overlay_text(
                "Game over\nPress R to restart",
                Color::srgb(0.95, 0.35, 0.3),
            ));
        });
}

fn spawn_victory(mut commands: Commands) {
    commands
        .spawn((EndScreen, Name::new("Victory"), overlay_node()))
        .with_children(|parent| {
            parent.spawn(overlay_text(
                "Course complete!\nPress R to play again",
                Color::srgb(0.4, 0.9, 0.45),
            ));
        });
}

fn despawn_overlay<T: Component>(mut commands: Commands, query: Query<Entity, With<T>>) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

fn spawn_hud(mut commands: Commands) {
    commands.spawn((
        HudText,
        Name::new("Hud"),
        TextBundle::from_section(
            "",
            TextStyle {
                font_size: 24.0,
                color: Color::srgb(0.95, 0.95, 0.95),
                ..default()
            },
        )
        .with_style(Style {
            position_type: PositionType::Absolute,
            top: Val::Px(12.0),
            left: Val::Px(12.0),
            ..default()
        }),
    ));
}

fn hud_line(health: u32, max_health: u32, checkpoint: usize, checkpoints: usize) -> String {
    format!("Health {health}/{max_health}    Checkpoint {checkpoint}/{checkpoints}")
}

fn update_hud(
    course: Res<Course>,
    players: Query<&CharacterController, With<Player>>,
    mut hud: Query<&mut Text, With<HudText>>,
) {
    let Ok(controller) = players.get_single() else {
        return;
    };

    let line = hud_line(
        controller.health(),
        controller.settings().max_health,
        course.platforms.current_checkpoint(),
        course.platforms.checkpoint_count(),
    );

    for mut text in &mut hud {
        if let Some(section) = text.sections.first_mut() {
            if section.value != line {
                section.value.clone_from(&line);
            }
        }
    }
}
