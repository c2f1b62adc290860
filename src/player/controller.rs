use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::GuildId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{PlayerError, PlayerResult};
use crate::player::idle::IdleLeaveScheduler;
use crate::player::registry::StateRegistry;
use crate::player::track::Track;
use crate::player::voice::{Notifier, PlayerEvent, VoiceGateway, VoiceSession};

/// What happened to a track handed to [`PlaybackController::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Nothing was playing; the track started immediately.
    Started,
    /// Something was playing; the track waits at this queue position
    /// (1 is next up).
    Queued(usize),
}

/// Owns every queue transition for every guild.
///
/// Commands mutate state through the methods here, and the voice driver's
/// completion events arrive on a channel drained by [`drive`]. Each
/// transition happens under the guild's playback lock, so a completion and
/// a command can never interleave their read-modify-write.
///
/// [`drive`]: PlaybackController::drive
pub struct PlaybackController {
    registry: Arc<StateRegistry>,
    session: Arc<dyn VoiceSession>,
    gateway: Arc<dyn VoiceGateway>,
    idle: Arc<IdleLeaveScheduler>,
    notifier: Arc<dyn Notifier>,
    events: mpsc::UnboundedSender<PlayerEvent>,
    max_queue_size: usize,
    queue_end_grace: Duration,
}

impl PlaybackController {
    pub fn new(
        registry: Arc<StateRegistry>,
        session: Arc<dyn VoiceSession>,
        gateway: Arc<dyn VoiceGateway>,
        idle: Arc<IdleLeaveScheduler>,
        notifier: Arc<dyn Notifier>,
        max_queue_size: usize,
        queue_end_grace: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let controller = Arc::new(Self {
            registry,
            session,
            gateway,
            idle,
            notifier,
            events,
            max_queue_size,
            queue_end_grace,
        });
        (controller, rx)
    }

    /// Spawns the completion loop. Runs until every sender is dropped.
    pub fn drive(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<PlayerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    PlayerEvent::TrackEnded(guild) => {
                        debug!(guild_id = guild.get(), "track ended");
                        self.play_next(guild).await;
                    }
                    PlayerEvent::TrackErrored(guild, reason) => {
                        warn!(guild_id = guild.get(), %reason, "track errored");
                        self.announce(guild, &format!("Playback failed: {reason}"))
                            .await;
                        self.play_next(guild).await;
                    }
                }
            }
        })
    }

    /// Appends a resolved track, starting it at once if nothing is playing.
    pub async fn enqueue(&self, guild: GuildId, track: Track) -> PlayerResult<EnqueueOutcome> {
        let state = self.registry.get_or_create(guild);
        let mut playback = state.playback.lock().await;

        if playback.current.is_some() {
            if playback.queue.len() >= self.max_queue_size {
                return Err(PlayerError::QueueFull);
            }
            playback.queue.push_back(track);
            return Ok(EnqueueOutcome::Queued(playback.queue.len()));
        }

        playback.current = Some(track.clone());
        if let Err(err) = self.session.begin(guild, &track, self.events.clone()).await {
            playback.current = None;
            return Err(err);
        }
        drop(playback);

        self.idle.cancel(guild);
        info!(guild_id = guild.get(), title = %track.title, "playback started");
        Ok(EnqueueOutcome::Started)
    }

    /// Advances to the next queued track, skipping any that fail to start.
    /// With an empty queue the guild goes idle and the auto-leave countdown
    /// is armed.
    async fn play_next(&self, guild: GuildId) {
        let Some(state) = self.registry.get(guild) else {
            return;
        };
        let mut playback = state.playback.lock().await;

        if !playback.queue.is_empty() && !self.session.is_connected(guild).await {
            // The connection dropped mid-queue. Rejoin the channel the last
            // command came from before advancing; without one the queue has
            // nowhere to play.
            let channel = *state.last_voice_channel.lock();
            let rejoined = match channel {
                Some(channel) => self.gateway.join(guild, channel).await.is_ok(),
                None => false,
            };
            if !rejoined {
                warn!(guild_id = guild.get(), "voice connection lost, dropping queue");
                playback.queue.clear();
                playback.current = None;
                self.announce_later(
                    guild,
                    "Lost the voice connection, the queue was cleared.".to_string(),
                );
                return;
            }
        }

        loop {
            let Some(track) = playback.queue.pop_front() else {
                playback.current = None;
                drop(playback);
                if self.session.is_connected(guild).await {
                    debug!(guild_id = guild.get(), "queue drained, arming auto-leave");
                    self.idle.schedule(guild, self.queue_end_grace);
                }
                return;
            };

            playback.current = Some(track.clone());
            match self.session.begin(guild, &track, self.events.clone()).await {
                Ok(()) => {
                    drop(playback);
                    self.idle.cancel(guild);
                    self.announce(guild, &format!("Now playing: {}", track.title))
                        .await;
                    return;
                }
                Err(err) => {
                    error!(guild_id = guild.get(), title = %track.title, error = %err, "track failed to start");
                    playback.current = None;
                    // Keep the lock; try the next one in the same transition.
                    self.announce_later(guild, format!("Skipping {}: {err}", track.title));
                }
            }
        }
    }

    pub async fn pause(&self, guild: GuildId) -> PlayerResult<()> {
        if !self.session.is_playing(guild).await {
            return Err(PlayerError::NoActiveSession);
        }
        self.session.pause(guild).await
    }

    pub async fn resume(&self, guild: GuildId) -> PlayerResult<()> {
        if !self.session.is_paused(guild).await {
            return Err(PlayerError::NoActiveSession);
        }
        self.session.resume(guild).await
    }

    /// Stops the current track. The driver's end event then advances the
    /// queue like a natural completion.
    pub async fn skip(&self, guild: GuildId) -> PlayerResult<Track> {
        let state = self
            .registry
            .get(guild)
            .ok_or(PlayerError::NoActiveSession)?;
        let skipped = {
            let playback = state.playback.lock().await;
            playback.current.clone().ok_or(PlayerError::NoActiveSession)?
        };
        self.session.halt(guild).await?;
        info!(guild_id = guild.get(), title = %skipped.title, "skipped");
        Ok(skipped)
    }

    /// Clears the queue, stops playback, and arms a short auto-leave grace.
    pub async fn stop(&self, guild: GuildId, grace: Duration) -> PlayerResult<()> {
        if !self.session.is_connected(guild).await {
            return Err(PlayerError::NoActiveSession);
        }
        let state = self.registry.get_or_create(guild);
        {
            let mut playback = state.playback.lock().await;
            playback.queue.clear();
            playback.current = None;
        }
        self.session.halt(guild).await?;
        self.idle.schedule(guild, grace);
        info!(guild_id = guild.get(), "stopped and cleared queue");
        Ok(())
    }

    pub async fn now_playing(&self, guild: GuildId) -> Option<Track> {
        let state = self.registry.get(guild)?;
        let playback = state.playback.lock().await;
        playback.current.clone()
    }

    /// Current track plus a copy of the waiting queue, for display.
    pub async fn queue_snapshot(&self, guild: GuildId) -> (Option<Track>, Vec<Track>) {
        let Some(state) = self.registry.get(guild) else {
            return (None, Vec::new());
        };
        let playback = state.playback.lock().await;
        (
            playback.current.clone(),
            playback.queue.iter().cloned().collect(),
        )
    }

    async fn announce(&self, guild: GuildId, message: &str) {
        let Some(state) = self.registry.get(guild) else {
            return;
        };
        let channel = *state.last_text_channel.lock();
        let channel = match channel {
            Some(channel) => Some(channel),
            None => self.notifier.fallback_channel(guild).await,
        };
        if let Some(channel) = channel {
            self.notifier.send(channel, message).await;
        }
    }

    /// Fire-and-forget variant for call sites holding the playback lock.
    fn announce_later(&self, guild: GuildId, message: String) {
        let registry = Arc::clone(&self.registry);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let Some(state) = registry.get(guild) else {
                return;
            };
            let channel = *state.last_text_channel.lock();
            let channel = match channel {
                Some(channel) => Some(channel),
                None => notifier.fallback_channel(guild).await,
            };
            if let Some(channel) = channel {
                notifier.send(channel, &message).await;
            }
        });
    }
}
