use serenity::all::Timestamp;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};

use crate::player::track::{CandidateTrack, Track};

/// Standard color palette for the bot.
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

const STANDARD_FOOTER: &str = "🎵 Cadence";

/// Longest title shown in the search listing. Anything longer is clipped
/// so every result stays on one line.
const SEARCH_TITLE_LIMIT: usize = 70;

fn clipped(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit - 3).collect();
    format!("{cut}...")
}

/// Numbered search results, one line per candidate. Pairs with the pick
/// buttons, whose labels use the same numbering.
pub fn search_results(query: &str, candidates: &[CandidateTrack]) -> CreateEmbed {
    let lines: Vec<String> = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let channel = candidate.channel.as_deref().unwrap_or("Unknown");
            format!(
                "**{}.** {} `[{}]` · {}",
                i + 1,
                clipped(&candidate.title, SEARCH_TITLE_LIMIT),
                candidate.duration_label(),
                channel
            )
        })
        .collect();

    CreateEmbed::default()
        .title("🔍 Search Results")
        .description(format!("Results for **{}**\n\n{}", query, lines.join("\n")))
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn now_playing(track: &Track) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", track.title))
        .url(&track.page_url)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn track_queued(track: &Track, position: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("✅ Added to Queue")
        .description(format!("**{}**", track.title))
        .url(&track.page_url)
        .field("Position", position.to_string(), true)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Current track plus up to ten waiting entries.
pub fn queue(current: Option<&Track>, waiting: &[Track]) -> CreateEmbed {
    let mut description = match current {
        Some(track) => format!("**Now:** {}\n", track.title),
        None => "Nothing is playing.\n".to_string(),
    };

    if waiting.is_empty() {
        description.push_str("\nThe queue is empty.");
    } else {
        description.push('\n');
        for (i, track) in waiting.iter().take(10).enumerate() {
            description.push_str(&format!("**{}.** {}\n", i + 1, track.title));
        }
        if waiting.len() > 10 {
            description.push_str(&format!("...and {} more", waiting.len() - 10));
        }
    }

    CreateEmbed::default()
        .title("📋 Queue")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_titles_pass_through_unchanged() {
        assert_eq!(clipped("a short title", 70), "a short title");
    }

    #[test]
    fn long_titles_are_clipped_with_an_ellipsis() {
        let long = "x".repeat(90);
        let out = clipped(&long, 70);
        assert_eq!(out.chars().count(), 70);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn clipping_respects_multibyte_characters() {
        let long = "é".repeat(80);
        let out = clipped(&long, 70);
        assert_eq!(out.chars().count(), 70);
        assert!(out.starts_with('é'));
    }
}
