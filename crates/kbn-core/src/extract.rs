//! Best-effort article extraction from news pages.
//!
//! Two entry points: [`extract_article`] for a single article page (the
//! `parse` action) and [`extract_candidates`] for a source listing page (the
//! poller). Neither is a general HTML-to-text converter.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{errors::Error, Result};

/// Containers tried in order for the article body.
const ARTICLE_SELECTORS: [&str; 7] = [
    "article",
    ".article",
    "#article",
    ".post-content",
    ".entry-content",
    ".news-content",
    "main",
];

/// Elements whose text forms the article body inside a container.
const BODY_NODES: &str = "p, h2, h3";

/// Paragraphs used when no container matches.
const FALLBACK_PARAGRAPHS: usize = 10;

/// Tags removed (with content) before parsing.
const BOILERPLATE_TAGS: [&str; 7] = [
    "script", "style", "nav", "footer", "header", "aside", "noscript",
];

/// Containers of individual articles on a listing page.
const LISTING_CONTAINERS: &str = "article, .news-item, .post, .item";

pub const DEFAULT_TITLE_SELECTOR: &str = "h1, h2, h3";
pub const DEFAULT_TEXT_SELECTOR: &str = "p";
pub const DEFAULT_IMAGE_SELECTOR: &str = "img";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub text: String,
}

/// Extract title (first `h1`) and body text from an article page.
///
/// Returns [`Error::Extract`] when neither a title nor any body text is found.
pub fn extract_article(html: &str) -> Result<Article> {
    let cleaned = strip_boilerplate_tags(html);
    let document = Html::parse_document(&cleaned);

    let title = first_text(&document, "h1").unwrap_or_default();

    let body_nodes = selector(BODY_NODES)?;
    let mut text = String::new();
    for sel in ARTICLE_SELECTORS {
        let container_sel = selector(sel)?;
        if let Some(container) = document.select(&container_sel).next() {
            text = join_texts(container.select(&body_nodes));
            break;
        }
    }

    if text.is_empty() {
        let p = selector("p")?;
        text = join_texts(document.select(&p).take(FALLBACK_PARAGRAPHS));
    }

    if title.is_empty() && text.is_empty() {
        return Err(Error::Extract(
            "could not extract text from the page".to_string(),
        ));
    }

    Ok(Article { title, text })
}

/// CSS selector hints configured on a news source.
#[derive(Clone, Copy, Debug)]
pub struct SourceSelectors<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub image: &'a str,
}

impl Default for SourceSelectors<'_> {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE_SELECTOR,
            text: DEFAULT_TEXT_SELECTOR,
            image: DEFAULT_IMAGE_SELECTOR,
        }
    }
}

/// One article found on a listing page, with absolute URLs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    pub text: String,
    pub image_url: Option<String>,
}

/// Find up to `limit` distinct articles on a listing page.
///
/// Relative links and image sources are resolved against `base_url`. When the
/// page has no recognizable article containers, title elements that carry a
/// link are used instead.
pub fn extract_candidates(
    html: &str,
    base_url: &str,
    selectors: SourceSelectors<'_>,
    limit: usize,
) -> Result<Vec<Candidate>> {
    let base = Url::parse(base_url)
        .map_err(|e| Error::Validation(format!("invalid source url {base_url}: {e}")))?;
    let cleaned = strip_boilerplate_tags(html);
    let document = Html::parse_document(&cleaned);

    let title_sel = selector(selectors.title)?;
    let text_sel = selector(selectors.text)?;
    let image_sel = selector(selectors.image)?;
    let link_sel = selector("a[href]")?;
    let containers = selector(LISTING_CONTAINERS)?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for container in document.select(&containers) {
        if out.len() >= limit {
            break;
        }
        let Some(url) = container
            .select(&link_sel)
            .find_map(|a| a.value().attr("href").and_then(|h| resolve_url(&base, h)))
        else {
            continue;
        };

        let title = container
            .select(&title_sel)
            .map(element_text)
            .find(|t| !t.is_empty())
            .or_else(|| container.select(&link_sel).map(element_text).find(|t| !t.is_empty()))
            .unwrap_or_default();
        let text = join_texts(container.select(&text_sel));
        if title.is_empty() && text.is_empty() {
            continue;
        }
        let image_url = container
            .select(&image_sel)
            .find_map(|img| image_src(&img).and_then(|src| resolve_url(&base, src)));

        if seen.insert(url.clone()) {
            out.push(Candidate {
                url,
                title,
                text,
                image_url,
            });
        }
    }

    if !out.is_empty() {
        return Ok(out);
    }

    // No containers: fall back to linked headings.
    for heading in document.select(&title_sel) {
        if out.len() >= limit {
            break;
        }
        let own_href = if heading.value().name() == "a" {
            heading.value().attr("href")
        } else {
            None
        };
        let href = own_href.or_else(|| {
            heading
                .select(&link_sel)
                .find_map(|a| a.value().attr("href"))
        });
        let Some(url) = href.and_then(|h| resolve_url(&base, h)) else {
            continue;
        };
        let title = element_text(heading);
        if title.is_empty() || !seen.insert(url.clone()) {
            continue;
        }
        out.push(Candidate {
            url,
            title,
            text: String::new(),
            image_url: None,
        });
    }

    Ok(out)
}

/// Resolve `href` against `base`, keeping only http(s) targets.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

fn image_src<'a>(img: &ElementRef<'a>) -> Option<&'a str> {
    let v = img.value();
    v.attr("src")
        .filter(|s| !s.trim().is_empty() && !s.starts_with("data:"))
        .or_else(|| v.attr("data-src"))
}

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| Error::Extract(format!("invalid selector {s:?}: {e}")))
}

fn first_text(document: &Html, sel: &str) -> Option<String> {
    let sel = Selector::parse(sel).ok()?;
    document
        .select(&sel)
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Element text with whitespace runs collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty element texts separated by blank lines.
fn join_texts<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> String {
    elements
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn strip_boilerplate_tags(html: &str) -> String {
    let mut result = html.to_owned();
    for tag in BOILERPLATE_TAGS {
        result = strip_tag(&result, tag);
    }
    result
}

/// Remove every `<tag ...>...</tag>` (ASCII case-insensitive).
fn strip_tag(html: &str, tag: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical to `html`.
    let lower = html.to_ascii_lowercase();
    let open_tag = format!("<{tag}");
    let close_tag = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());

    let mut pos = 0;
    while let Some(offset) = lower[pos..].find(&open_tag) {
        let start = pos + offset;
        let after_tag = start + open_tag.len();

        // `<navigation>` is not `<nav>`.
        let boundary = lower
            .as_bytes()
            .get(after_tag)
            .map_or(true, |b| matches!(b, b' ' | b'>' | b'/' | b'\n' | b'\r' | b'\t'));
        if !boundary {
            result.push_str(&html[pos..after_tag]);
            pos = after_tag;
            continue;
        }

        result.push_str(&html[pos..start]);
        pos = match lower[start..].find(&close_tag) {
            Some(end) => start + end + close_tag.len(),
            None => match lower[start..].find('>') {
                Some(end) => start + end + 1,
                None => html.len(),
            },
        };
    }
    result.push_str(&html[pos..]);
    result
}
