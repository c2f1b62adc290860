use std::sync::Arc;

use async_trait::async_trait;
use serenity::http::Http;
use serenity::model::channel::ChannelType;
use serenity::model::id::{ChannelId, GuildId};
use tracing::warn;

use crate::player::voice::Notifier;

/// Sends playback notifications over the Discord REST API. Failures are
/// logged and swallowed; playback never depends on a message landing.
pub struct ChannelNotifier {
    http: Arc<Http>,
    cache: Arc<serenity::cache::Cache>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, cache: Arc<serenity::cache::Cache>) -> Self {
        Self { http, cache }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, channel: ChannelId, message: &str) {
        if let Err(err) = channel.say(&self.http, message).await {
            warn!(channel_id = channel.get(), error = %err, "notification failed");
        }
    }

    /// System channel when the guild has one, otherwise its topmost text
    /// channel.
    async fn fallback_channel(&self, guild: GuildId) -> Option<ChannelId> {
        let guild_ref = self.cache.guild(guild)?;
        if let Some(channel) = guild_ref.system_channel_id {
            return Some(channel);
        }
        guild_ref
            .channels
            .values()
            .filter(|channel| channel.kind == ChannelType::Text)
            .min_by_key(|channel| channel.position)
            .map(|channel| channel.id)
    }
}
