use std::sync::Arc;
use std::time::Duration;

use serenity::all::{ComponentInteraction, Context, Message};
use serenity::builder::{
    CreateInteractionResponseFollowup, CreateMessage, EditMessage,
};
use serenity::model::id::{ChannelId, GuildId, UserId};
use tracing::{debug, error, warn};

use crate::bot::Services;
use crate::error::{PlayerError, PlayerResult};
use crate::player::controller::EnqueueOutcome;
use crate::player::track::Track;
use crate::sources::is_url;
use crate::ui::{buttons, embeds};

/// How long a search picker stays interactive before its buttons are
/// stripped.
const PICKER_LIFETIME: Duration = Duration::from_secs(60);

/// A parsed prefix command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(String),
    Choose(usize),
    Pause,
    Resume,
    Skip,
    Stop,
    NowPlaying,
    Queue,
}

/// Parses `content` against the configured prefix. Unknown or malformed
/// commands come back as `None` and are ignored.
pub fn parse(prefix: &str, content: &str) -> Option<Command> {
    let body = content.strip_prefix(prefix)?.trim();
    let first = body.split_whitespace().next()?;
    let name = first.to_lowercase();
    let rest = body[first.len()..].trim();

    match name.as_str() {
        // A bare play is valid: the argument may arrive as an attachment.
        "play" | "p" => Some(Command::Play(rest.to_string())),
        "choose" | "pick" => rest.parse().ok().map(Command::Choose),
        "pause" => Some(Command::Pause),
        "resume" => Some(Command::Resume),
        "skip" | "next" => Some(Command::Skip),
        "stop" => Some(Command::Stop),
        "now" | "np" => Some(Command::NowPlaying),
        "queue" | "q" => Some(Command::Queue),
        _ => None,
    }
}

/// Runs one command against a guild. The returned error renders as the
/// reply text.
pub async fn dispatch(
    services: &Arc<Services>,
    ctx: &Context,
    msg: &Message,
    command: Command,
) -> PlayerResult<()> {
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };
    services
        .registry
        .get_or_create(guild_id)
        .remember_text_channel(msg.channel_id);

    match command {
        Command::Play(query) => {
            if query.is_empty() {
                let Some(attachment) = msg.attachments.first() else {
                    say(
                        ctx,
                        msg.channel_id,
                        "Give me a link, a search query, or an attached audio file.",
                    )
                    .await;
                    return Ok(());
                };
                ensure_voice(services, ctx, guild_id, msg.author.id).await?;
                // Discord's CDN link streams directly; no extraction needed.
                let track = Track {
                    title: attachment.filename.clone(),
                    stream_url: attachment.url.clone(),
                    page_url: attachment.url.clone(),
                };
                let outcome = services.controller.enqueue(guild_id, track.clone()).await?;
                reply_outcome(ctx, msg.channel_id, &track, outcome).await;
                return Ok(());
            }
            ensure_voice(services, ctx, guild_id, msg.author.id).await?;
            if is_url(&query) {
                let (track, outcome) =
                    services.selection.play_reference(guild_id, &query).await?;
                reply_outcome(ctx, msg.channel_id, &track, outcome).await;
            } else {
                let candidates = services.selection.search(guild_id, &query).await?;
                let embed = embeds::search_results(&query, &candidates);
                let rows = buttons::pick_buttons(candidates.len());
                let sent = msg
                    .channel_id
                    .send_message(
                        &ctx.http,
                        CreateMessage::new().embed(embed).components(rows),
                    )
                    .await
                    .map_err(|err| PlayerError::Transport(err.to_string()))?;
                expire_picker(ctx, msg.channel_id, sent.id);
            }
        }
        Command::Choose(index) => {
            ensure_voice(services, ctx, guild_id, msg.author.id).await?;
            let (track, outcome) = services.selection.select(guild_id, index).await?;
            reply_outcome(ctx, msg.channel_id, &track, outcome).await;
        }
        Command::Pause => {
            services.controller.pause(guild_id).await?;
            say(ctx, msg.channel_id, "Paused.").await;
        }
        Command::Resume => {
            services.controller.resume(guild_id).await?;
            say(ctx, msg.channel_id, "Resumed.").await;
        }
        Command::Skip => {
            let skipped = services.controller.skip(guild_id).await?;
            say(ctx, msg.channel_id, &format!("Skipped: {}", skipped.title)).await;
        }
        Command::Stop => {
            services
                .controller
                .stop(guild_id, services.config.stop_grace())
                .await?;
            say(ctx, msg.channel_id, "Stopped and cleared the queue.").await;
        }
        Command::NowPlaying => {
            let track = services
                .controller
                .now_playing(guild_id)
                .await
                .ok_or(PlayerError::NoActiveSession)?;
            send_embed(ctx, msg.channel_id, embeds::now_playing(&track)).await;
        }
        Command::Queue => {
            let (current, waiting) = services.controller.queue_snapshot(guild_id).await;
            if current.is_none() && waiting.is_empty() {
                return Err(PlayerError::NoActiveSession);
            }
            send_embed(ctx, msg.channel_id, embeds::queue(current.as_ref(), &waiting)).await;
        }
    }
    Ok(())
}

/// Handles a pick button. Resolution can outlast the three-second
/// interaction window, so the response is deferred and delivered as a
/// followup.
pub async fn handle_pick(
    services: &Arc<Services>,
    ctx: &Context,
    component: &ComponentInteraction,
    index: usize,
) {
    let Some(guild_id) = component.guild_id else {
        return;
    };
    services
        .registry
        .get_or_create(guild_id)
        .remember_text_channel(component.channel_id);

    if let Err(err) = component.defer(&ctx.http).await {
        error!(guild_id = guild_id.get(), error = %err, "failed to defer pick");
        return;
    }

    let result = match ensure_voice(services, ctx, guild_id, component.user.id).await {
        Ok(()) => services.selection.select(guild_id, index).await,
        Err(err) => Err(err),
    };

    match result {
        Ok((track, outcome)) => {
            // The picker has served its purpose.
            let _ = component
                .message
                .channel_id
                .edit_message(
                    &ctx.http,
                    component.message.id,
                    EditMessage::new().components(Vec::new()),
                )
                .await;

            let embed = match outcome {
                EnqueueOutcome::Started => embeds::now_playing(&track),
                EnqueueOutcome::Queued(position) => embeds::track_queued(&track, position),
            };
            let followup = component
                .create_followup(&ctx.http, CreateInteractionResponseFollowup::new().embed(embed))
                .await;
            if let Err(err) = followup {
                warn!(guild_id = guild_id.get(), error = %err, "pick followup failed");
            }
        }
        Err(err) => {
            let followup = component
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new().content(err.to_string()),
                )
                .await;
            if let Err(err) = followup {
                warn!(guild_id = guild_id.get(), error = %err, "pick error reply failed");
            }
        }
    }
}

/// Joins (or moves to) the invoker's voice channel. Rejects users who are
/// not in voice.
async fn ensure_voice(
    services: &Arc<Services>,
    ctx: &Context,
    guild_id: GuildId,
    user: UserId,
) -> PlayerResult<()> {
    let user_channel =
        user_voice_channel(ctx, guild_id, user).ok_or(PlayerError::NotInVoiceChannel)?;
    services
        .registry
        .get_or_create(guild_id)
        .remember_voice_channel(user_channel);

    if services.gateway.current_channel(guild_id).await == Some(user_channel) {
        return Ok(());
    }
    services.gateway.join(guild_id, user_channel).await?;
    services.idle.cancel(guild_id);
    Ok(())
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild.voice_states.get(&user)?.channel_id
}

async fn reply_outcome(ctx: &Context, channel: ChannelId, track: &Track, outcome: EnqueueOutcome) {
    let embed = match outcome {
        EnqueueOutcome::Started => embeds::now_playing(track),
        EnqueueOutcome::Queued(position) => embeds::track_queued(track, position),
    };
    send_embed(ctx, channel, embed).await;
}

async fn send_embed(ctx: &Context, channel: ChannelId, embed: serenity::builder::CreateEmbed) {
    if let Err(err) = channel
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await
    {
        warn!(channel_id = channel.get(), error = %err, "embed reply failed");
    }
}

async fn say(ctx: &Context, channel: ChannelId, message: &str) {
    if let Err(err) = channel.say(&ctx.http, message).await {
        warn!(channel_id = channel.get(), error = %err, "reply failed");
    }
}

/// Removes the buttons once the picker goes stale. The embed stays so the
/// listing remains readable.
fn expire_picker(ctx: &Context, channel: ChannelId, message: serenity::model::id::MessageId) {
    let http = Arc::clone(&ctx.http);
    tokio::spawn(async move {
        tokio::time::sleep(PICKER_LIFETIME).await;
        let edit = channel
            .edit_message(&http, message, EditMessage::new().components(Vec::new()))
            .await;
        if let Err(err) = edit {
            debug!(channel_id = channel.get(), error = %err, "picker expiry edit failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_play_with_query() {
        assert_eq!(
            parse("!", "!play never gonna give you up"),
            Some(Command::Play("never gonna give you up".to_string()))
        );
        assert_eq!(
            parse("!", "!p url"),
            Some(Command::Play("url".to_string()))
        );
    }

    #[test]
    fn bare_play_parses_with_an_empty_query() {
        assert_eq!(parse("!", "!play"), Some(Command::Play(String::new())));
        assert_eq!(parse("!", "!play   "), Some(Command::Play(String::new())));
    }

    #[test]
    fn parses_choose_number() {
        assert_eq!(parse("!", "!choose 3"), Some(Command::Choose(3)));
        assert_eq!(parse("!", "!pick 1"), Some(Command::Choose(1)));
    }

    #[test]
    fn malformed_choose_is_ignored() {
        assert_eq!(parse("!", "!choose"), None);
        assert_eq!(parse("!", "!choose abc"), None);
    }

    #[test]
    fn command_names_are_case_insensitive() {
        assert_eq!(parse("!", "!PAUSE"), Some(Command::Pause));
        assert_eq!(parse("!", "!Skip"), Some(Command::Skip));
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(parse("!", "!next"), Some(Command::Skip));
        assert_eq!(parse("!", "!np"), Some(Command::NowPlaying));
        assert_eq!(parse("!", "!q"), Some(Command::Queue));
    }

    #[test]
    fn wrong_prefix_is_ignored() {
        assert_eq!(parse("!", "?play something"), None);
        assert_eq!(parse("!", "play something"), None);
    }

    #[test]
    fn unknown_command_is_ignored() {
        assert_eq!(parse("!", "!dance"), None);
    }

    #[test]
    fn custom_prefix_works() {
        assert_eq!(parse(">>", ">>stop"), Some(Command::Stop));
    }
}
