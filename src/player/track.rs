use serde::{Deserialize, Serialize};

/// A fully resolved, playable item. The stream URL points at raw media and
/// is handed straight to the voice driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub stream_url: String,
    pub page_url: String,
}

/// A search hit that has not been resolved yet. Resolution happens only
/// after the user picks it, so this carries display metadata and the page
/// link needed to resolve later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub title: String,
    pub page_url: String,
    /// Duration in seconds when the listing reports one.
    pub duration: Option<u64>,
    pub channel: Option<String>,
}

impl CandidateTrack {
    /// Renders the duration as `m:ss` (or `h:mm:ss`), or `?:??` when the
    /// listing omitted it, as live streams do.
    pub fn duration_label(&self) -> String {
        match self.duration {
            Some(secs) => {
                let h = secs / 3600;
                let m = (secs % 3600) / 60;
                let s = secs % 60;
                if h > 0 {
                    format!("{}:{:02}:{:02}", h, m, s)
                } else {
                    format!("{}:{:02}", m, s)
                }
            }
            None => "?:??".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(duration: Option<u64>) -> CandidateTrack {
        CandidateTrack {
            title: "test".to_string(),
            page_url: "https://example.com/watch".to_string(),
            duration,
            channel: None,
        }
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(candidate(Some(245)).duration_label(), "4:05");
    }

    #[test]
    fn formats_hours() {
        assert_eq!(candidate(Some(3725)).duration_label(), "1:02:05");
    }

    #[test]
    fn unknown_duration_is_placeholder() {
        assert_eq!(candidate(None).duration_label(), "?:??");
    }

    #[test]
    fn zero_is_zero() {
        assert_eq!(candidate(Some(0)).duration_label(), "0:00");
    }
}
