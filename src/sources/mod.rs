pub mod ytdlp;

use async_trait::async_trait;

pub use ytdlp::YtDlpResolver;

use crate::error::ResolutionError;
use crate::player::track::{CandidateTrack, Track};

/// Turns user input into playable media.
///
/// `resolve_one` takes a page reference (watch URL or bare query) and
/// produces exactly one resolved track. `search_flat` lists candidates
/// without resolving any of them, which keeps searches cheap.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve_one(&self, reference: &str) -> Result<Track, ResolutionError>;
    async fn search_flat(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateTrack>, ResolutionError>;
}

/// Whether the input is a page link rather than free-text search terms.
pub fn is_url(input: &str) -> bool {
    match url::Url::parse(input) {
        Ok(parsed) => parsed.scheme() == "http" || parsed.scheme() == "https",
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_links_are_urls() {
        assert!(is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_url("http://example.com/audio.mp3"));
    }

    #[test]
    fn plain_queries_are_not_urls() {
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("watch?v=dQw4w9WgXcQ"));
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert!(!is_url("file:///etc/passwd"));
        assert!(!is_url("ftp://example.com/a.mp3"));
    }
}
