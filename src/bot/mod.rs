//! Discord-facing layer: event handling, command dispatch, and the
//! songbird-backed voice implementations.
//!
//! The bot reacts to three event families. Messages carry prefix commands,
//! component interactions carry search picks, and voice state updates
//! drive the auto-leave logic. Everything stateful lives behind
//! [`Services`], built once when the gateway reports ready, because the
//! songbird manager and the caches only exist from that point on.

use std::sync::{Arc, OnceLock};

use serenity::all::{Context, EventHandler, Interaction, Message, Ready, VoiceState};
use serenity::async_trait;
use serenity::model::id::GuildId;
use tracing::{debug, error, info};

pub mod commands;
pub mod notify;
pub mod voice;

use crate::config::Config;
use crate::player::controller::PlaybackController;
use crate::player::idle::IdleLeaveScheduler;
use crate::player::registry::StateRegistry;
use crate::player::selection::SearchSelectionFlow;
use crate::player::voice::{Notifier, VoiceGateway, VoiceSession};
use crate::sources::{MediaResolver, YtDlpResolver};
use crate::ui::buttons;
use notify::ChannelNotifier;
use voice::SongbirdVoice;

/// Everything the command handlers need, wired together once at ready.
pub struct Services {
    pub config: Arc<Config>,
    pub registry: Arc<StateRegistry>,
    pub controller: Arc<PlaybackController>,
    pub selection: Arc<SearchSelectionFlow>,
    pub idle: Arc<IdleLeaveScheduler>,
    pub gateway: Arc<dyn VoiceGateway>,
    pub session: Arc<dyn VoiceSession>,
}

pub struct MusicBot {
    config: Arc<Config>,
    services: OnceLock<Arc<Services>>,
}

impl MusicBot {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            services: OnceLock::new(),
        }
    }

    async fn build_services(&self, ctx: &Context) -> Option<Arc<Services>> {
        let manager = songbird::get(ctx).await?;
        let voice = Arc::new(SongbirdVoice::new(manager, ctx.cache.clone()));
        let session: Arc<dyn VoiceSession> = voice.clone();
        let gateway: Arc<dyn VoiceGateway> = voice;
        let notifier: Arc<dyn Notifier> =
            Arc::new(ChannelNotifier::new(ctx.http.clone(), ctx.cache.clone()));

        let registry = Arc::new(StateRegistry::new());
        let idle = Arc::new(IdleLeaveScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&session),
            Arc::clone(&gateway),
            Arc::clone(&notifier),
        ));
        let (controller, events) = PlaybackController::new(
            Arc::clone(&registry),
            Arc::clone(&session),
            Arc::clone(&gateway),
            Arc::clone(&idle),
            notifier,
            self.config.max_queue_size,
            self.config.queue_end_grace(),
        );
        Arc::clone(&controller).drive(events);

        let resolver: Arc<dyn MediaResolver> = Arc::new(YtDlpResolver::from_config(&self.config));
        let selection = Arc::new(SearchSelectionFlow::new(
            Arc::clone(&registry),
            resolver,
            Arc::clone(&controller),
            self.config.search_results,
        ));

        Some(Arc::new(Services {
            config: Arc::clone(&self.config),
            registry,
            controller,
            selection,
            idle,
            gateway,
            session,
        }))
    }

    /// Clears guild state after a disconnect that bypassed the bot's own
    /// leave path, such as a moderator kick.
    async fn cleanup_after_disconnect(&self, services: &Arc<Services>, guild_id: GuildId) {
        services.idle.cancel(guild_id);
        if let Some(state) = services.registry.get(guild_id) {
            let mut playback = state.playback.lock().await;
            playback.queue.clear();
            playback.current = None;
        }
        // Tears down whatever driver state is left.
        let _ = services.gateway.leave(guild_id).await;
        info!(guild_id = guild_id.get(), "cleaned up after external disconnect");
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "connected to the gateway"
        );

        if self.services.get().is_some() {
            return;
        }
        match self.build_services(&ctx).await {
            Some(services) => {
                let _ = self.services.set(services);
                info!("services initialized");
            }
            None => error!("songbird manager missing, voice is unavailable"),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(services) = self.services.get() else {
            return;
        };
        let Some(command) = commands::parse(&services.config.command_prefix, &msg.content) else {
            return;
        };

        debug!(
            guild_id = msg.guild_id.map(|g| g.get()),
            author = msg.author.id.get(),
            ?command,
            "command received"
        );
        if let Err(err) = commands::dispatch(services, &ctx, &msg, command).await {
            if let Err(send_err) = msg.channel_id.say(&ctx.http, err.to_string()).await {
                error!(error = %send_err, "error reply failed");
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Component(component) = interaction else {
            return;
        };
        let Some(index) = buttons::parse_pick_id(&component.data.custom_id) else {
            return;
        };
        let Some(services) = self.services.get() else {
            return;
        };
        commands::handle_pick(services, &ctx, &component, index).await;
    }

    /// Watches the bot's voice channel. An empty channel arms a short
    /// auto-leave grace, a returning listener disarms it, and an external
    /// disconnect of the bot itself triggers a full cleanup.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(services) = self.services.get() else {
            return;
        };
        let Some(guild_id) = new.guild_id.or_else(|| old.as_ref().and_then(|o| o.guild_id))
        else {
            return;
        };

        let bot_id = ctx.cache.current_user().id;
        if new.user_id == bot_id {
            let was_connected = old.as_ref().and_then(|o| o.channel_id).is_some();
            if was_connected && new.channel_id.is_none() {
                self.cleanup_after_disconnect(services, guild_id).await;
            }
            return;
        }

        let Some(bot_channel) = services.gateway.current_channel(guild_id).await else {
            return;
        };
        let old_channel = old.as_ref().and_then(|o| o.channel_id);
        if new.channel_id != Some(bot_channel) && old_channel != Some(bot_channel) {
            return;
        }

        if services.session.human_listeners(guild_id).await == 0 {
            debug!(guild_id = guild_id.get(), "alone in voice, arming auto-leave");
            services
                .idle
                .schedule(guild_id, services.config.membership_grace());
        } else {
            services.idle.cancel(guild_id);
        }
    }
}
