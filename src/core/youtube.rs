//! YouTube URL normalization

use url::Url;

/// Return a canonical YouTube watch URL when possible.
///
/// Users often paste URLs with playlist/mix params like `&list=...`. Only
/// single videos are supported (`--no-playlist`), so normalizing to
/// `https://www.youtube.com/watch?v=<id>` avoids weird edge cases.
///
/// If the URL can't be parsed, the original string is returned: never break
/// a download because of the normalizer.
pub fn normalize_youtube_url(url: &str) -> String {
    let raw = url.trim();
    if raw.is_empty() {
        return raw.to_string();
    }

    let Ok(parsed) = Url::parse(raw) else {
        return raw.to_string();
    };

    let host = parsed.host_str().unwrap_or("").to_lowercase();

    let video_id: Option<String> = if host.contains("youtu.be") {
        // https://youtu.be/<id>
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|candidate| !candidate.is_empty())
            .map(|candidate| candidate.to_string())
    } else if host.contains("youtube.com") {
        // https://www.youtube.com/watch?v=<id>
        parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    } else {
        None
    };

    match video_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()) {
        Some(id) => format!("https://www.youtube.com/watch?v={}", id),
        None => raw.to_string(),
    }
}

/// Quick check whether a string points at YouTube at all.
pub fn is_youtube_url(url: &str) -> bool {
    url.contains("youtube.com") || url.contains("youtu.be")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_url_strips_playlist_params() {
        let url = "https://www.youtube.com/watch?v=hcu8qlRRVPE&list=RDhcu8qlRRVPE&start_radio=1";
        assert_eq!(
            normalize_youtube_url(url),
            "https://www.youtube.com/watch?v=hcu8qlRRVPE"
        );
    }

    #[test]
    fn test_short_url_is_canonicalized() {
        let url = "https://youtu.be/hcu8qlRRVPE?t=10";
        assert_eq!(
            normalize_youtube_url(url),
            "https://www.youtube.com/watch?v=hcu8qlRRVPE"
        );
    }

    #[test]
    fn test_mobile_host_is_recognized() {
        let url = "https://m.youtube.com/watch?v=dQw4w9WgXcQ&pp=ygUF";
        assert_eq!(
            normalize_youtube_url(url),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_unrelated_urls_pass_through() {
        let url = "https://example.com/video?v=abc";
        assert_eq!(normalize_youtube_url(url), url);
    }

    #[test]
    fn test_unparseable_input_passes_through() {
        assert_eq!(normalize_youtube_url("not a url"), "not a url");
        assert_eq!(normalize_youtube_url("   "), "");
    }

    #[test]
    fn test_is_youtube_url() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_youtube_url("https://example.com/video"));
    }
}
