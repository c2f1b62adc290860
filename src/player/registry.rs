use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::player::idle::IdleTimer;
use crate::player::track::{CandidateTrack, Track};

/// Queue and now-playing state for one guild. Mutated only under the
/// async lock so queue transitions never interleave.
#[derive(Debug, Default)]
pub struct PlaybackState {
    pub queue: VecDeque<Track>,
    pub current: Option<Track>,
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }
}

/// All per-guild state. One instance per guild, shared behind an `Arc`,
/// never removed while the process runs.
pub struct GuildState {
    pub playback: AsyncMutex<PlaybackState>,
    /// The candidate list from the most recent search. A new search
    /// replaces the whole slot, so a pick always reads the latest list.
    pub pending_candidates: parking_lot::Mutex<Option<Vec<CandidateTrack>>>,
    /// Set while a pick is being resolved; rejects concurrent picks.
    pub choose_in_flight: AtomicBool,
    /// Where playback notifications go when no invoking channel is at hand.
    pub last_text_channel: parking_lot::Mutex<Option<ChannelId>>,
    /// The voice channel last joined on a user's behalf, used to rejoin
    /// when the connection drops mid-queue.
    pub last_voice_channel: parking_lot::Mutex<Option<ChannelId>>,
    pub idle_timer: parking_lot::Mutex<Option<IdleTimer>>,
}

impl GuildState {
    fn new() -> Self {
        Self {
            playback: AsyncMutex::new(PlaybackState::default()),
            pending_candidates: parking_lot::Mutex::new(None),
            choose_in_flight: AtomicBool::new(false),
            last_text_channel: parking_lot::Mutex::new(None),
            last_voice_channel: parking_lot::Mutex::new(None),
            idle_timer: parking_lot::Mutex::new(None),
        }
    }

    /// Takes the pending candidate list, leaving the slot empty.
    pub fn take_candidates(&self) -> Option<Vec<CandidateTrack>> {
        self.pending_candidates.lock().take()
    }

    pub fn set_candidates(&self, candidates: Vec<CandidateTrack>) {
        *self.pending_candidates.lock() = Some(candidates);
    }

    pub fn remember_text_channel(&self, channel: ChannelId) {
        *self.last_text_channel.lock() = Some(channel);
    }

    pub fn remember_voice_channel(&self, channel: ChannelId) {
        *self.last_voice_channel.lock() = Some(channel);
    }
}

impl std::fmt::Debug for GuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildState").finish_non_exhaustive()
    }
}

/// Concurrent guild-keyed store. `get_or_create` is atomic, so two
/// commands racing on a fresh guild observe the same state instance.
#[derive(Default)]
pub struct StateRegistry {
    guilds: DashMap<GuildId, Arc<GuildState>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildState> {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                debug!(guild_id = guild_id.get(), "creating guild state");
                Arc::new(GuildState::new())
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildState>> {
        self.guilds.get(&guild_id).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track {
            title: title.to_string(),
            stream_url: format!("https://cdn.example/{title}"),
            page_url: format!("https://example.com/{title}"),
        }
    }

    #[test]
    fn same_guild_gets_same_state() {
        let registry = StateRegistry::new();
        let a = registry.get_or_create(GuildId::new(1));
        let b = registry.get_or_create(GuildId::new(1));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn guilds_are_isolated() {
        let registry = StateRegistry::new();
        let a = registry.get_or_create(GuildId::new(1));
        let b = registry.get_or_create(GuildId::new(2));
        assert!(!Arc::ptr_eq(&a, &b));

        a.set_candidates(vec![CandidateTrack {
            title: "only in a".to_string(),
            page_url: "https://example.com/a".to_string(),
            duration: None,
            channel: None,
        }]);
        assert!(b.pending_candidates.lock().is_none());
    }

    #[test]
    fn get_does_not_create() {
        let registry = StateRegistry::new();
        assert!(registry.get(GuildId::new(7)).is_none());
        registry.get_or_create(GuildId::new(7));
        assert!(registry.get(GuildId::new(7)).is_some());
    }

    #[tokio::test]
    async fn concurrent_creation_yields_one_instance() {
        let registry = Arc::new(StateRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.get_or_create(GuildId::new(42))
            }));
        }
        let mut states = Vec::new();
        for handle in handles {
            states.push(handle.await.unwrap());
        }
        for state in &states[1..] {
            assert!(Arc::ptr_eq(&states[0], state));
        }
    }

    #[test]
    fn take_candidates_empties_the_slot() {
        let registry = StateRegistry::new();
        let state = registry.get_or_create(GuildId::new(3));
        state.set_candidates(vec![]);
        assert!(state.take_candidates().is_some());
        assert!(state.take_candidates().is_none());
    }

    #[tokio::test]
    async fn playback_state_idle_check() {
        let state = GuildState::new();
        {
            let playback = state.playback.lock().await;
            assert!(playback.is_idle());
        }
        {
            let mut playback = state.playback.lock().await;
            playback.queue.push_back(track("queued"));
            assert!(!playback.is_idle());
        }
        let _ = state;
    }
}
