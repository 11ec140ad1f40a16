//! Sound playback as an owned service. Gameplay code asks a [`SoundDriver`] to play an event and
//! moves on; the [`SoundEngine`] resource queues those requests and a system turns them into Bevy
//! audio entities each frame.
//!
//! Bevy's asset system reference-counts handles; the engine holds one handle per sound from
//! `init` until `shutdown`, which keeps the decoded buffers alive for the whole session.

use std::collections::HashMap;

use bevy::app::AppExit;
use bevy::asset::LoadState;
use bevy::audio::{PlaybackSettings, Volume};
use bevy::prelude::*;

use crate::state::GameState;

/// Number of footstep samples the controller picks from.
pub const FOOTSTEP_SAMPLES: usize = 5;

/// Registers the sound service, its load/unload lifecycle and the playback system.
pub struct GameAudioPlugin;

impl Plugin for GameAudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SoundEngine>()
            .add_systems(OnEnter(GameState::Loading), load_sound_engine)
            .add_systems(Update, play_queued_sounds)
            .add_systems(Last, shutdown_sound_engine.run_if(on_event::<AppExit>()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEvent {
    Jump,
    /// One of `FOOTSTEP_SAMPLES` recorded steps.
    Footstep(usize),
    Damage,
    Break,
    Checkpoint,
    Victory,
}

impl SoundEvent {
    fn all() -> impl Iterator<Item = SoundEvent> {
        [
            SoundEvent::Jump,
            SoundEvent::Damage,
            SoundEvent::Break,
            SoundEvent::Checkpoint,
            SoundEvent::Victory,
        ]
        .into_iter()
        .chain((0..FOOTSTEP_SAMPLES).map(SoundEvent::Footstep))
    }

    fn asset_path(self) -> String {
        match self {
            SoundEvent::Jump => "audio/jump.ogg".to_owned(),
            SoundEvent::Footstep(sample) => format!("audio/footstep-{}.ogg", sample + 1),
            SoundEvent::Damage => "audio/damage.ogg".to_owned(),
            SoundEvent::Break => "audio/break.ogg".to_owned(),
            SoundEvent::Checkpoint => "audio/checkpoint.ogg".to_owned(),
            SoundEvent::Victory => "audio/victory.ogg".to_owned(),
        }
    }
}

/// Fire-and-forget sound output used by the character controller.
pub trait SoundDriver {
    fn play_event(&mut self, event: SoundEvent, pitch: Option<f32>, volume: Option<f32>);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundRequest {
    pub event: SoundEvent,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
}

#[derive(Resource, Default)]
pub struct SoundEngine {
    handles: HashMap<SoundEvent, Handle<AudioSource>>,
    pending: Vec<SoundRequest>,
    running: bool,
}

impl SoundEngine {
    /// Queues every sound for loading. Requests made before this are dropped.
    pub fn init(&mut self, asset_server: &AssetServer) {
        for event in SoundEvent::all() {
            self.handles
                .insert(event, asset_server.load(event.asset_path()));
        }
        self.running = true;
    }

    /// Releases all handles and pending requests.
    pub fn shutdown(&mut self) {
        self.handles.clear();
        self.pending.clear();
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Takes every queued request. Only those whose sound is already decoded in `sources` are
    /// returned; the rest are discarded, since a late sound is worse than none.
    fn drain(
        &mut self,
        sources: &Assets<AudioSource>,
    ) -> Vec<(Handle<AudioSource>, SoundRequest)> {
        let handles = &self.handles;
        self.pending
            .drain(..)
            .filter_map(|request| {
                handles
                    .get(&request.event)
                    .filter(|handle| sources.contains(handle.id()))
                    .map(|handle| (handle.clone(), request))
            })
            .collect()
    }

    /// Drops the handles `failed` reports as unloadable, so their events stop being queued for
    /// nothing.
    fn forget_failed(&mut self, failed: impl Fn(&Handle<AudioSource>) -> bool) {
        self.handles.retain(|event, handle| {
            if failed(handle) {
                warn!("Sound {:?} failed to load; it will stay silent", event);
                return false;
            }
            true
        });
    }
}

impl SoundDriver for SoundEngine {
    fn play_event(&mut self, event: SoundEvent, pitch: Option<f32>, volume: Option<f32>) {
        if !self.running {
            return;
        }

        self.pending.push(SoundRequest {
            event,
            pitch,
            volume,
        });
    }
}

fn load_sound_engine(asset_server: Res<AssetServer>, mut engine: ResMut<SoundEngine>) {
    if engine.is_running() {
        return;
    }

    engine.init(&asset_server);
    info!("Queued sound effects. Add the files under assets/audio/ to enable playback.");
}

/// Spawns one self-despawning audio entity per queued request whose sound has loaded. An entity
/// for an unloaded source never gets a sink and so would never despawn.
fn play_queued_sounds(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    sources: Res<Assets<AudioSource>>,
    mut engine: ResMut<SoundEngine>,
) {
    engine.forget_failed(|handle| {
        matches!(
            asset_server.get_load_state(handle.id()),
            Some(LoadState::Failed(_))
        )
    });

    for (source, request) in engine.drain(&sources) {
        let mut settings = PlaybackSettings::DESPAWN;
        if let Some(pitch) = request.pitch {
            settings = settings.with_speed(pitch);
        }
        if let Some(volume) = request.volume {
            settings = settings.with_volume(Volume::new(volume));
        }

        commands.spawn(AudioBundle { source, settings });
    }
}

fn shutdown_sound_engine(mut engine: ResMut<SoundEngine>) {
    engine.shutdown();
}
