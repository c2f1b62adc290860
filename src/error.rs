use thiserror::Error;

/// Failures while turning a query or page link into playable media.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no results found")]
    NoResults,

    #[error("no usable audio stream in the extractor output")]
    NoStream,

    /// The extractor process ran but reported a failure.
    #[error("extractor failed: {0}")]
    Upstream(String),

    #[error("extractor produced invalid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("could not run the extractor: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors specific to playback and selection operations.
///
/// Every variant renders as a reply to the invoking user; none of these
/// terminate the process.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    #[error("that choice is no longer valid, search again")]
    InvalidSelection,

    /// A previous selection for this guild is still being resolved.
    #[error("hold on, still working on the previous pick")]
    SelectionInFlight,

    #[error("join a voice channel first")]
    NotInVoiceChannel,

    #[error("the queue is full")]
    QueueFull,

    #[error("nothing is playing right now")]
    NoActiveSession,

    #[error("voice transport failure: {0}")]
    Transport(String),
}

pub type PlayerResult<T> = Result<T, PlayerError>;
