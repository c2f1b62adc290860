use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serenity::model::id::GuildId;
use tracing::{debug, info};

use crate::error::{PlayerError, PlayerResult};
use crate::player::controller::{EnqueueOutcome, PlaybackController};
use crate::player::registry::StateRegistry;
use crate::player::track::{CandidateTrack, Track};
use crate::sources::MediaResolver;

/// Clears the in-flight flag when the selection attempt ends, however it
/// ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The two-phase search flow: a search lists candidates without resolving
/// them, then a pick resolves exactly the chosen one.
///
/// Each guild holds one candidate list at a time. A new search replaces it
/// outright, and a pick that arrives while another pick is resolving is
/// rejected rather than queued.
pub struct SearchSelectionFlow {
    registry: Arc<StateRegistry>,
    resolver: Arc<dyn MediaResolver>,
    controller: Arc<PlaybackController>,
    result_limit: usize,
}

impl SearchSelectionFlow {
    pub fn new(
        registry: Arc<StateRegistry>,
        resolver: Arc<dyn MediaResolver>,
        controller: Arc<PlaybackController>,
        result_limit: usize,
    ) -> Self {
        Self {
            registry,
            resolver,
            controller,
            result_limit,
        }
    }

    /// Resolves a page link directly and queues it, bypassing the picker.
    pub async fn play_reference(
        &self,
        guild: GuildId,
        reference: &str,
    ) -> PlayerResult<(Track, EnqueueOutcome)> {
        let track = self.resolver.resolve_one(reference).await?;
        let outcome = self.controller.enqueue(guild, track.clone()).await?;
        Ok((track, outcome))
    }

    /// Runs a flat search and stores the hits as this guild's pending
    /// candidates, replacing any previous list.
    pub async fn search(
        &self,
        guild: GuildId,
        query: &str,
    ) -> PlayerResult<Vec<CandidateTrack>> {
        let candidates = self.resolver.search_flat(query, self.result_limit).await?;
        if candidates.is_empty() {
            return Err(crate::error::ResolutionError::NoResults.into());
        }

        let state = self.registry.get_or_create(guild);
        state.set_candidates(candidates.clone());
        info!(
            guild_id = guild.get(),
            hits = candidates.len(),
            "search candidates stored"
        );
        Ok(candidates)
    }

    /// Resolves the picked candidate (1-based) and queues it.
    ///
    /// The candidate list survives a failed resolution so the user can pick
    /// again; it is consumed only once a pick succeeds.
    pub async fn select(
        &self,
        guild: GuildId,
        index: usize,
    ) -> PlayerResult<(Track, EnqueueOutcome)> {
        let state = self.registry.get_or_create(guild);

        if state
            .choose_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PlayerError::SelectionInFlight);
        }
        let _guard = InFlightGuard(&state.choose_in_flight);

        let candidate = {
            let slot = state.pending_candidates.lock();
            let list = slot.as_ref().ok_or(PlayerError::InvalidSelection)?;
            if index == 0 || index > list.len() {
                return Err(PlayerError::InvalidSelection);
            }
            list[index - 1].clone()
        };

        debug!(guild_id = guild.get(), index, title = %candidate.title, "resolving pick");
        let track = self.resolver.resolve_one(&candidate.page_url).await?;

        state.take_candidates();

        let outcome = self.controller.enqueue(guild, track.clone()).await?;
        Ok((track, outcome))
    }
}
