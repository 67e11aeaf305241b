//! URL utilities for source validation and classification
//!
//! This module provides the helpers used by the source resolver: scheme
//! validation for caller-supplied URLs, HLS playlist detection, and
//! resolution of redirect `Location` values against the original URL.

use url::Url;

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Parse and validate a playable URL
    ///
    /// Only `http` and `https` URLs are accepted; anything else (ftp, file,
    /// data, ...) is rejected before any upstream connection is attempted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bakwaasfm_proxy::utils::url::UrlUtils;
    ///
    /// assert!(UrlUtils::validate_playable("https://example.com/live.mp3").is_ok());
    /// assert!(UrlUtils::validate_playable("ftp://example.com/live.mp3").is_err());
    /// ```
    pub fn validate_playable(raw: &str) -> Result<Url, String> {
        let parsed =
            Url::parse(raw.trim()).map_err(|e| format!("unparseable URL '{raw}': {e}"))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(format!("unsupported URL scheme '{other}'")),
        }
    }

    /// Returns true when the URL's path ends in `.m3u8`, ignoring any query
    /// string or fragment. Such sources are HLS playlists and go through the
    /// transcoding bridge rather than the byte relay.
    pub fn is_hls_playlist(raw: &str) -> bool {
        match Url::parse(raw) {
            Ok(parsed) => parsed.path().to_ascii_lowercase().ends_with(".m3u8"),
            // Fall back to a textual check for URLs the parser rejects
            Err(_) => raw
                .split(['?', '#'])
                .next()
                .is_some_and(|path| path.to_ascii_lowercase().ends_with(".m3u8")),
        }
    }

    /// Resolve a redirect `Location` value against the URL that produced it.
    /// Absolute locations are returned as-is; relative ones are joined onto
    /// the base.
    pub fn resolve_location(base: &str, location: &str) -> Option<String> {
        let base = Url::parse(base).ok()?;
        base.join(location).ok().map(|joined| joined.to_string())
    }
}
