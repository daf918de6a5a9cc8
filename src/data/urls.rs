//! URL normalization and validation.
//!
//! `normalize` produces the sole deduplication key for the article cache:
//! scheme, host, and path are lowercased, the trailing slash is stripped
//! from the path, and the query string is preserved verbatim.

use url::Url;

/// Normalize a URL for consistent comparison.
///
/// Idempotent: `normalize(normalize(u)) == normalize(u)`. URLs differing
/// only in scheme/host/path casing or a trailing path slash collapse to the
/// same key. Inputs that do not parse are lowercased as-is.
pub fn normalize(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return url.trim().to_ascii_lowercase();
    };

    let mut normalized = format!(
        "{}://{}",
        parsed.scheme().to_ascii_lowercase(),
        parsed.host_str().unwrap_or_default().to_ascii_lowercase(),
    );
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(parsed.path().to_ascii_lowercase().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        normalized.push('?');
        normalized.push_str(query);
    }
    normalized
}

/// Whether a URL is an absolute http(s) URL with a host.
pub fn validate(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_case_and_trailing_slash() {
        assert_eq!(normalize("https://X.COM/A/"), "https://x.com/a");
        assert_eq!(normalize("https://x.com/a"), "https://x.com/a");
        assert_eq!(normalize("HTTP://Example.org/News/"), "http://example.org/news");
    }

    #[test]
    fn preserves_query_verbatim() {
        assert_eq!(
            normalize("https://X.com/a?Page=2&Sort=DESC"),
            "https://x.com/a?Page=2&Sort=DESC"
        );
    }

    #[test]
    fn is_idempotent() {
        for url in [
            "https://X.COM/A/",
            "https://x.com/a?Q=Z",
            "http://news.example.com:8080/Story/",
            "not a url",
        ] {
            let once = normalize(url);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn strips_root_path() {
        assert_eq!(normalize("https://x.com/"), "https://x.com");
    }

    #[test]
    fn keeps_explicit_port() {
        assert_eq!(
            normalize("https://X.com:8443/a/"),
            "https://x.com:8443/a"
        );
    }

    #[test]
    fn validates_scheme_and_host() {
        assert!(validate("https://example.com/a"));
        assert!(validate("http://example.com"));
        assert!(!validate("ftp://example.com/a"));
        assert!(!validate("example.com/a"));
        assert!(!validate("https://"));
    }
}
