use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::GuildId;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::player::registry::StateRegistry;
use crate::player::voice::{Notifier, VoiceGateway, VoiceSession};

/// A scheduled auto-leave, stored in the guild's timer slot. The sequence
/// number is the claim token: a firing task may only act if the slot still
/// holds its own number.
pub struct IdleTimer {
    seq: u64,
    handle: JoinHandle<()>,
}

/// Arms and disarms the per-guild auto-leave countdown.
///
/// Scheduling replaces any armed timer, so only the most recent grace
/// period counts. A timer that fires re-checks channel occupancy before
/// leaving, because listeners may have returned while it slept.
pub struct IdleLeaveScheduler {
    seq: AtomicU64,
    registry: Arc<StateRegistry>,
    session: Arc<dyn VoiceSession>,
    gateway: Arc<dyn VoiceGateway>,
    notifier: Arc<dyn Notifier>,
}

impl IdleLeaveScheduler {
    pub fn new(
        registry: Arc<StateRegistry>,
        session: Arc<dyn VoiceSession>,
        gateway: Arc<dyn VoiceGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            seq: AtomicU64::new(0),
            registry,
            session,
            gateway,
            notifier,
        }
    }

    /// Arms the countdown for this guild, replacing any armed timer.
    pub fn schedule(self: &Arc<Self>, guild: GuildId, grace: Duration) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            scheduler.fire(guild, seq).await;
        });

        let state = self.registry.get_or_create(guild);
        let previous = {
            let mut slot = state.idle_timer.lock();
            slot.replace(IdleTimer { seq, handle })
        };
        if let Some(timer) = previous {
            timer.handle.abort();
        }
        debug!(guild_id = guild.get(), seq, grace_secs = grace.as_secs(), "idle timer armed");
    }

    /// Disarms the countdown if one is armed.
    pub fn cancel(&self, guild: GuildId) {
        let Some(state) = self.registry.get(guild) else {
            return;
        };
        let taken = state.idle_timer.lock().take();
        if let Some(timer) = taken {
            timer.handle.abort();
            debug!(guild_id = guild.get(), seq = timer.seq, "idle timer cancelled");
        }
    }

    async fn fire(&self, guild: GuildId, seq: u64) {
        let Some(state) = self.registry.get(guild) else {
            return;
        };

        // Claim the slot. If another schedule or cancel got there first the
        // stored number differs and this firing is stale.
        {
            let mut slot = state.idle_timer.lock();
            match slot.as_ref() {
                Some(timer) if timer.seq == seq => {
                    slot.take();
                }
                _ => return,
            }
        }

        if !self.session.is_connected(guild).await {
            return;
        }
        if self.session.human_listeners(guild).await > 0 {
            debug!(guild_id = guild.get(), "listeners returned, staying");
            return;
        }

        {
            let mut playback = state.playback.lock().await;
            if !playback.is_idle() {
                debug!(guild_id = guild.get(), "dropping unplayed queue on idle leave");
            }
            playback.queue.clear();
            playback.current = None;
        }

        let channel = *state.last_text_channel.lock();
        let channel = match channel {
            Some(channel) => Some(channel),
            None => self.notifier.fallback_channel(guild).await,
        };
        if let Some(channel) = channel {
            self.notifier
                .send(channel, "Left the voice channel, nothing to play.")
                .await;
        }

        if let Err(err) = self.gateway.leave(guild).await {
            warn!(guild_id = guild.get(), error = %err, "auto-leave failed");
        } else {
            info!(guild_id = guild.get(), "left voice channel after idle grace");
        }
    }
}
