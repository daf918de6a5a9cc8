//! HTTP article scraper.
//!
//! Fetches a page and extracts a title and a plain-text body. Extraction is
//! deliberately minimal: a handful of regex passes, not a DOM pipeline.
//! HTTP failures are classified into distinct error strings so the worker's
//! retry path can log something meaningful.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::scraper::{ScrapeOutcome, Scraper};

/// Hard cap on stored article content.
const MAX_CONTENT_CHARS: usize = 50_000;

/// Minimum length for a paragraph to count as article text.
const MIN_PARAGRAPH_CHARS: usize = 50;

/// Minimum length for a container's text to count as the article body.
const MIN_CONTAINER_CHARS: usize = 100;

static OG_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta[^>]+property\s*=\s*["']og:title["'][^>]*content\s*=\s*["']([^"']+)["']"#)
        .expect("invalid og:title regex")
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("invalid title regex"));
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("invalid h1 regex"));
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p[^>]*>(.*?)</p>").expect("invalid paragraph regex"));
static NOISE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?is)",
        r"<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>",
        r"|<nav\b[^>]*>.*?</nav>|<header\b[^>]*>.*?</header>",
        r"|<footer\b[^>]*>.*?</footer>|<aside\b[^>]*>.*?</aside>",
        r"|<form\b[^>]*>.*?</form>|<iframe\b[^>]*>.*?</iframe>",
        r"|<noscript\b[^>]*>.*?</noscript>",
    ))
    .expect("invalid noise block regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("invalid tag regex"));
static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<article\b[^>]*>(.*?)</article>").expect("invalid article regex")
});
static MAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<main\b[^>]*>(.*?)</main>").expect("invalid main regex"));
static CLASS_CONTAINER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?is)<(?:div|section)\b[^>]*(?:class|id)\s*=\s*["'][^"']*"#,
        r#"\b(?:article-content|article-body|post-content|entry-content|story-body|content)\b"#,
        r#"[^"']*["'][^>]*>(.*?)</(?:div|section)>"#,
    ))
    .expect("invalid content container regex")
});

/// Classified scrape failures; the display form is what lands in the
/// article's `error_message`.
#[derive(Debug, thiserror::Error)]
enum ScrapeError {
    #[error("404 Not Found")]
    NotFound,
    #[error("403 Forbidden - Access denied")]
    Forbidden,
    #[error("HTTP Error {0}")]
    Http(u16),
    #[error("Timeout after {0} seconds")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(reqwest::Error),
    #[error("Failed to extract article content")]
    EmptyContent,
}

pub struct HttpScraper {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/120.0.0.0 Safari/537.36",
            )
            .build()?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, error: reqwest::Error) -> ScrapeError {
        if error.is_timeout() {
            ScrapeError::Timeout(self.timeout.as_secs())
        } else {
            ScrapeError::Network(error)
        }
    }

    async fn fetch(&self, url: &str) -> Result<(Option<String>, String), ScrapeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        match response.status().as_u16() {
            404 => return Err(ScrapeError::NotFound),
            403 => return Err(ScrapeError::Forbidden),
            code if code >= 400 => return Err(ScrapeError::Http(code)),
            _ => {}
        }

        let html = response.text().await.map_err(|e| self.classify(e))?;

        let title = extract_title(&html);
        let content = extract_content(&html).ok_or(ScrapeError::EmptyContent)?;
        debug!(url, chars = content.len(), "extracted article content");
        Ok((title, content))
    }
}

#[async_trait::async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, url: &str) -> ScrapeOutcome {
        match self.fetch(url).await {
            Ok((title, content)) => {
                ScrapeOutcome::ok(title.unwrap_or_else(|| "Unknown Title".to_owned()), content)
            }
            Err(e) => ScrapeOutcome::err(e.to_string()),
        }
    }
}

/// Extract the article title: og:title meta, then <title>, then the first
/// <h1>.
fn extract_title(html: &str) -> Option<String> {
    if let Some(captures) = OG_TITLE_RE.captures(html) {
        let title = clean_fragment(&captures[1]);
        if !title.is_empty() {
            return Some(title);
        }
    }
    for re in [&*TITLE_RE, &*H1_RE] {
        if let Some(captures) = re.captures(html) {
            let title = clean_fragment(&captures[1]);
            if !title.is_empty() {
                return Some(title);
            }
        }
    }
    None
}

/// Extract the article body as plain text.
///
/// Strips noise blocks, then tries the containers that usually hold the
/// body (`<article>`, `<main>`, common content class/id names) before
/// joining substantial paragraphs from anywhere in the page; the whole
/// remaining document text is the last resort. Container scoping keeps
/// sidebar and related-article paragraphs out of the stored content on
/// pages that do separate them.
fn extract_content(html: &str) -> Option<String> {
    let cleaned = NOISE_BLOCK_RE.replace_all(html, " ");

    for re in [&*ARTICLE_RE, &*MAIN_RE, &*CLASS_CONTAINER_RE] {
        if let Some(captures) = re.captures(&cleaned) {
            if let Some(text) = container_text(&captures[1]) {
                return Some(truncate_content(text));
            }
        }
    }

    let paragraphs = join_paragraphs(&cleaned);
    if !paragraphs.is_empty() {
        return Some(truncate_content(paragraphs));
    }

    let body = clean_fragment(&cleaned);
    if body.is_empty() {
        None
    } else {
        Some(truncate_content(body))
    }
}

/// Text of one candidate container, or `None` when it is too short to be
/// the article body.
fn container_text(fragment: &str) -> Option<String> {
    let paragraphs = join_paragraphs(fragment);
    let text = if paragraphs.is_empty() {
        clean_fragment(fragment)
    } else {
        paragraphs
    };
    (text.len() > MIN_CONTAINER_CHARS).then_some(text)
}

/// Join every substantial paragraph in a fragment.
fn join_paragraphs(fragment: &str) -> String {
    PARAGRAPH_RE
        .captures_iter(fragment)
        .map(|captures| clean_fragment(&captures[1]))
        .filter(|text| text.len() > MIN_PARAGRAPH_CHARS)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Strip tags, unescape entities, and collapse whitespace.
fn clean_fragment(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    let unescaped = htmlize::unescape(stripped.as_ref());
    unescaped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_content(content: String) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content;
    }
    let mut truncated: String = content.chars().take(MAX_CONTENT_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_og_title() {
        let html = r#"<head>
            <meta property="og:title" content="The Real Title" />
            <title>Fallback Title</title>
        </head><h1>Heading</h1>"#;
        assert_eq!(extract_title(html).unwrap(), "The Real Title");
    }

    #[test]
    fn title_falls_back_to_title_tag_then_h1() {
        let html = "<title> Page &amp; Title </title><h1>Heading</h1>";
        assert_eq!(extract_title(html).unwrap(), "Page & Title");

        let html = "<body><h1>Only a Heading</h1></body>";
        assert_eq!(extract_title(html).unwrap(), "Only a Heading");

        assert!(extract_title("<body><p>nothing</p></body>").is_none());
    }

    #[test]
    fn content_joins_substantial_paragraphs() {
        let long_a = "a".repeat(80);
        let long_b = "b".repeat(80);
        let html = format!(
            "<article><p>{long_a}</p><p>short</p><p>{long_b}</p></article>"
        );
        let content = extract_content(&html).unwrap();
        assert_eq!(content, format!("{long_a}\n\n{long_b}"));
    }

    #[test]
    fn content_ignores_script_and_nav_noise() {
        let story = "real story text ".repeat(10);
        let html = format!(
            "<script>var x = 'junk junk junk junk junk junk junk junk';</script>\
             <nav>home | about | contact and plenty of other link text here</nav>\
             <p>{story}</p>"
        );
        let content = extract_content(&html).unwrap();
        assert!(content.contains("real story text"));
        assert!(!content.contains("junk"));
        assert!(!content.contains("about"));
    }

    #[test]
    fn article_container_excludes_surrounding_paragraphs() {
        let story = "the actual story text ".repeat(8);
        let promo = "promoted teaser copy that is plenty long enough to pass ".repeat(3);
        let related = "related article blurb that is also long enough to pass ".repeat(3);
        let html = format!(
            "<p>{promo}</p><article><p>{story}</p></article>\
             <div class=\"related\"><p>{related}</p></div>"
        );

        let content = extract_content(&html).unwrap();
        assert!(content.contains("the actual story text"));
        assert!(!content.contains("promoted teaser"));
        assert!(!content.contains("related article blurb"));
    }

    #[test]
    fn content_class_container_scopes_extraction() {
        let story = "story body paragraph text ".repeat(8);
        let sidebar = "sidebar widget text that is long enough to qualify here ".repeat(3);
        let html = format!(
            "<div class=\"sidebar\"><span>{sidebar}</span></div>\
             <div class=\"article-content\"><p>{story}</p></div>"
        );

        let content = extract_content(&html).unwrap();
        assert!(content.contains("story body paragraph"));
        assert!(!content.contains("sidebar widget"));
    }

    #[test]
    fn short_container_falls_through_to_paragraphs() {
        let long = "a paragraph outside any container that carries the text ".repeat(3);
        let html = format!("<article><p>stub</p></article><p>{long}</p>");

        let content = extract_content(&html).unwrap();
        assert!(content.contains("a paragraph outside any container"));
    }

    #[test]
    fn content_caps_length() {
        let huge = "x".repeat(MAX_CONTENT_CHARS + 500);
        let html = format!("<p>{huge}</p>");
        let content = extract_content(&html).unwrap();
        assert_eq!(content.chars().count(), MAX_CONTENT_CHARS + 3);
        assert!(content.ends_with("..."));
    }

    #[test]
    fn empty_page_yields_no_content() {
        assert!(extract_content("<script>only();</script>").is_none());
        assert!(extract_content("").is_none());
    }
}
