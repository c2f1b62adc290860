use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc;

use crate::error::PlayerResult;
use crate::player::track::Track;

/// Completion signals emitted by the voice driver. The control loop owns
/// the receiving end and performs every queue transition itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    TrackEnded(GuildId),
    TrackErrored(GuildId, String),
}

/// Voice channel membership operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(&self, guild: GuildId, channel: ChannelId) -> PlayerResult<()>;
    async fn leave(&self, guild: GuildId) -> PlayerResult<()>;
    /// Voice channel the bot currently occupies in this guild, if any.
    async fn current_channel(&self, guild: GuildId) -> Option<ChannelId>;
}

/// Playback operations on an established voice connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceSession: Send + Sync {
    /// Starts the track on the guild's connection and wires its completion
    /// events into `events`. Replaces whatever was playing.
    async fn begin(
        &self,
        guild: GuildId,
        track: &Track,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> PlayerResult<()>;

    async fn pause(&self, guild: GuildId) -> PlayerResult<()>;
    async fn resume(&self, guild: GuildId) -> PlayerResult<()>;
    /// Stops the current track. Its end event still fires.
    async fn halt(&self, guild: GuildId) -> PlayerResult<()>;

    async fn is_playing(&self, guild: GuildId) -> bool;
    async fn is_paused(&self, guild: GuildId) -> bool;
    async fn is_connected(&self, guild: GuildId) -> bool;
    /// Members in the bot's voice channel, excluding bots.
    async fn human_listeners(&self, guild: GuildId) -> usize;
}

/// Text-channel output. Delivery is best effort; a failed send is logged
/// and never unwinds playback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: ChannelId, message: &str);

    /// Channel to fall back on when no invoking channel was recorded for
    /// the guild.
    async fn fallback_channel(&self, guild: GuildId) -> Option<ChannelId>;
}
