//! Playback URL resolution.
//!
//! The generation service may report up to three URLs for a finished video.
//! Precedence is `stream_url > download_url > hosted_url`; a locally stored
//! URL is only used when the service reported none of the three.

/// URLs reported by the external service for a single video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportedUrls {
    pub stream_url: Option<String>,
    pub download_url: Option<String>,
    pub hosted_url: Option<String>,
}

/// Pick the best playback URL from the reported set, falling back to the
/// locally stored URL when the service reported nothing.
pub fn resolve_playback_url(reported: &ReportedUrls, stored: Option<&str>) -> Option<String> {
    reported
        .stream_url
        .as_deref()
        .or(reported.download_url.as_deref())
        .or(reported.hosted_url.as_deref())
        .or(stored)
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(stream: Option<&str>, download: Option<&str>, hosted: Option<&str>) -> ReportedUrls {
        ReportedUrls {
            stream_url: stream.map(String::from),
            download_url: download.map(String::from),
            hosted_url: hosted.map(String::from),
        }
    }

    #[test]
    fn stream_url_wins_over_everything() {
        let reported = urls(Some("https://s"), Some("https://d"), Some("https://h"));
        assert_eq!(
            resolve_playback_url(&reported, Some("https://stored")),
            Some("https://s".to_string())
        );
    }

    #[test]
    fn download_url_beats_hosted() {
        let reported = urls(None, Some("https://d"), Some("https://h"));
        assert_eq!(
            resolve_playback_url(&reported, None),
            Some("https://d".to_string())
        );
    }

    #[test]
    fn hosted_url_alone_is_used() {
        let reported = urls(None, None, Some("https://h"));
        assert_eq!(
            resolve_playback_url(&reported, None),
            Some("https://h".to_string())
        );
    }

    #[test]
    fn stored_url_is_the_last_resort() {
        assert_eq!(
            resolve_playback_url(&ReportedUrls::default(), Some("https://stored")),
            Some("https://stored".to_string())
        );
    }

    #[test]
    fn nothing_reported_nothing_stored() {
        assert_eq!(resolve_playback_url(&ReportedUrls::default(), None), None);
    }
}
