use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use songbird::events::{Event, EventContext, TrackEvent};
use songbird::input::{HttpRequest, Input};
use songbird::tracks::{PlayMode, TrackHandle};
use songbird::Songbird;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{PlayerError, PlayerResult};
use crate::player::track::Track;
use crate::player::voice::{PlayerEvent, VoiceGateway, VoiceSession};

fn transport(err: impl std::fmt::Display) -> PlayerError {
    PlayerError::Transport(err.to_string())
}

/// Songbird-backed voice layer. The stream URLs handed to [`begin`] point
/// at raw media, so playback is a plain HTTP input probed by Symphonia and
/// needs no external process.
///
/// [`begin`]: VoiceSession::begin
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    cache: Arc<serenity::cache::Cache>,
    http: reqwest::Client,
    /// Handle of the track currently loaded per guild.
    tracks: DashMap<GuildId, TrackHandle>,
}

impl SongbirdVoice {
    pub fn new(manager: Arc<Songbird>, cache: Arc<serenity::cache::Cache>) -> Self {
        Self {
            manager,
            cache,
            http: reqwest::Client::new(),
            tracks: DashMap::new(),
        }
    }

    async fn play_mode(&self, guild: GuildId) -> Option<PlayMode> {
        let handle = self.tracks.get(&guild)?.clone();
        handle.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl VoiceGateway for SongbirdVoice {
    async fn join(&self, guild: GuildId, channel: ChannelId) -> PlayerResult<()> {
        self.manager
            .join(guild, channel)
            .await
            .map_err(transport)?;
        info!(guild_id = guild.get(), channel_id = channel.get(), "joined voice channel");
        Ok(())
    }

    async fn leave(&self, guild: GuildId) -> PlayerResult<()> {
        self.tracks.remove(&guild);
        self.manager.remove(guild).await.map_err(transport)?;
        info!(guild_id = guild.get(), "left voice channel");
        Ok(())
    }

    async fn current_channel(&self, guild: GuildId) -> Option<ChannelId> {
        let call = self.manager.get(guild)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::from(channel.0))
    }
}

#[async_trait]
impl VoiceSession for SongbirdVoice {
    async fn begin(
        &self,
        guild: GuildId,
        track: &Track,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> PlayerResult<()> {
        let call = self
            .manager
            .get(guild)
            .ok_or(PlayerError::NotInVoiceChannel)?;

        let input = Input::from(HttpRequest::new(
            self.http.clone(),
            track.stream_url.clone(),
        ));

        let handle = {
            let mut call = call.lock().await;
            call.play_only_input(input)
        };
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndRelay {
                    guild,
                    events: events.clone(),
                },
            )
            .map_err(transport)?;
        handle
            .add_event(Event::Track(TrackEvent::Error), TrackErrorRelay { guild, events })
            .map_err(transport)?;

        self.tracks.insert(guild, handle);
        Ok(())
    }

    async fn pause(&self, guild: GuildId) -> PlayerResult<()> {
        let handle = self
            .tracks
            .get(&guild)
            .ok_or(PlayerError::NoActiveSession)?;
        handle.pause().map_err(transport)
    }

    async fn resume(&self, guild: GuildId) -> PlayerResult<()> {
        let handle = self
            .tracks
            .get(&guild)
            .ok_or(PlayerError::NoActiveSession)?;
        handle.play().map_err(transport)
    }

    async fn halt(&self, guild: GuildId) -> PlayerResult<()> {
        let handle = self
            .tracks
            .get(&guild)
            .ok_or(PlayerError::NoActiveSession)?;
        handle.stop().map_err(transport)
    }

    async fn is_playing(&self, guild: GuildId) -> bool {
        matches!(self.play_mode(guild).await, Some(PlayMode::Play))
    }

    async fn is_paused(&self, guild: GuildId) -> bool {
        matches!(self.play_mode(guild).await, Some(PlayMode::Pause))
    }

    async fn is_connected(&self, guild: GuildId) -> bool {
        match self.manager.get(guild) {
            Some(call) => call.lock().await.current_connection().is_some(),
            None => false,
        }
    }

    async fn human_listeners(&self, guild: GuildId) -> usize {
        let Some(channel) = VoiceGateway::current_channel(self, guild).await else {
            return 0;
        };
        let Some(guild_ref) = self.cache.guild(guild) else {
            return 0;
        };
        guild_ref
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel))
            .filter(|state| {
                guild_ref
                    .members
                    .get(&state.user_id)
                    .map(|member| !member.user.bot)
                    .unwrap_or(false)
            })
            .count()
    }
}

/// Forwards a track's natural end into the control loop, once.
struct TrackEndRelay {
    guild: GuildId,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

#[async_trait]
impl songbird::EventHandler for TrackEndRelay {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if self.events.send(PlayerEvent::TrackEnded(self.guild)).is_err() {
            warn!(guild_id = self.guild.get(), "control loop gone, dropping end event");
        }
        Some(Event::Cancel)
    }
}

struct TrackErrorRelay {
    guild: GuildId,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

#[async_trait]
impl songbird::EventHandler for TrackErrorRelay {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let reason = match ctx {
            EventContext::Track(states) => states
                .first()
                .map(|(state, _)| format!("{:?}", state.playing))
                .unwrap_or_else(|| "unknown".to_string()),
            _ => "unknown".to_string(),
        };
        let _ = self
            .events
            .send(PlayerEvent::TrackErrored(self.guild, reason));
        Some(Event::Cancel)
    }
}
