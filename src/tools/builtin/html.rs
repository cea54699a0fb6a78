//! HTML helpers for `web_fetch`
//!
//! Readable-article extraction uses article_scraper; everything else is a
//! handful of regexes and a tag-stripping fallback that never fails.

use article_scraper::Readability;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use url::Url;

pub const MAX_LINKS: usize = 100;

static TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title pattern"));

static META_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid meta pattern"));

static ATTRIBUTE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\b(name|property|content)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute pattern")
});

static ANCHOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>(.*?)</a>"#)
        .expect("valid anchor pattern")
});

const BLOCK_TAGS: &[&str] = &[
    "div", "p", "br", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "section", "article",
];

/// Contents of the first `<title>`
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_PATTERN
        .captures(html)
        .map(|c| decode_entities(c[1].trim()))
        .filter(|t| !t.is_empty())
}

/// `content` of the first meta tag whose name or property is one of `names`
pub fn extract_meta(html: &str, names: &[&str]) -> Option<String> {
    for tag in META_TAG_PATTERN.find_iter(html) {
        let mut key = None;
        let mut content = None;
        for attr in ATTRIBUTE_PATTERN.captures_iter(tag.as_str()) {
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match attr[1].to_ascii_lowercase().as_str() {
                "content" => content = Some(value),
                _ => key = Some(value.to_ascii_lowercase()),
            }
        }

        if let (Some(key), Some(content)) = (key, content) {
            if names.contains(&key.as_str()) && !content.trim().is_empty() {
                return Some(decode_entities(content.trim()));
            }
        }
    }
    None
}

/// Absolute links with their anchor text; fragments and scripts are skipped
pub fn extract_links(html: &str, base: &Url) -> Vec<Value> {
    ANCHOR_PATTERN
        .captures_iter(html)
        .filter_map(|c| {
            let href = c.get(1).or_else(|| c.get(2))?.as_str().trim();
            if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
                return None;
            }
            let absolute = base.join(href).ok()?;
            let text = simple_html_to_text(&c[3]).replace('\n', " ");
            Some(json!({"url": absolute.to_string(), "text": text}))
        })
        .take(MAX_LINKS)
        .collect()
}

/// Readable article text, falling back to tag stripping
pub async fn extract_readable_text(html: &str, url: &Url) -> String {
    let html_owned = html.to_string();
    let base = url.clone();

    // article_scraper can panic on malformed markup
    let result = tokio::task::spawn_blocking(move || {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tokio::runtime::Handle::current()
                .block_on(async { Readability::extract(&html_owned, Some(base)).await })
        }))
    })
    .await;

    match result {
        Ok(Ok(Ok(article))) => {
            let text = simple_html_to_text(&article);
            if text.is_empty() {
                simple_html_to_text(html)
            } else {
                text
            }
        }
        Ok(Ok(Err(e))) => {
            tracing::debug!("Article extraction failed: {}, falling back to tag stripping", e);
            simple_html_to_text(html)
        }
        Ok(Err(_panic)) => {
            tracing::debug!(url = %url, "Article extraction panicked, falling back to tag stripping");
            simple_html_to_text(html)
        }
        Err(e) => {
            tracing::warn!("Article extraction task failed: {}", e);
            simple_html_to_text(html)
        }
    }
}

/// Strip tags, drop script and style bodies, collapse whitespace (pure function)
pub fn simple_html_to_text(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;
    let mut tag = String::new();

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                let name = tag
                    .split(|c: char| c.is_whitespace() || c == '/' && !tag.starts_with('/'))
                    .next()
                    .unwrap_or_default()
                    .to_ascii_lowercase();

                match name.as_str() {
                    "script" => in_script = true,
                    "/script" => in_script = false,
                    "style" => in_style = true,
                    "/style" => in_style = false,
                    _ => {}
                }

                if BLOCK_TAGS.contains(&name.trim_start_matches('/')) {
                    result.push('\n');
                }

                in_tag = false;
                tag.clear();
            }
            _ if in_tag => tag.push(ch),
            _ if in_script || in_style => {}
            _ if ch.is_whitespace() => {
                if !result.ends_with(' ') && !result.ends_with('\n') {
                    result.push(' ');
                }
            }
            _ => result.push(ch),
        }
    }

    let text = result
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    decode_entities(&text)
}

/// The handful of entities common in page text
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Cut to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text.to_string(), false),
    }
}
