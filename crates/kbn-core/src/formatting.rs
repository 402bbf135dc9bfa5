//! Formatting utilities (Telegram HTML for news posts, text truncation).

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Keep at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Truncate to `max_chars` and mark the cut with `...`.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", truncate_chars(text, max_chars))
    } else {
        text.to_string()
    }
}

/// `<b>title</b>\n\ntext` plus a source link when a URL is known. Empty
/// parts are left out along with their separator.
pub fn news_post_html(title: &str, text: &str, url: Option<&str>) -> String {
    let mut parts = Vec::with_capacity(3);
    if !title.trim().is_empty() {
        parts.push(format!("<b>{}</b>", escape_html(title.trim())));
    }
    if !text.trim().is_empty() {
        parts.push(escape_html(text.trim()));
    }
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
        parts.push(format!(
            "<a href=\"{}\">Source</a>",
            escape_html(url.trim())
        ));
    }
    parts.join("\n\n")
}

/// Fit an HTML post into Telegram's photo caption limit.
///
/// The text part is shortened (never the markup), so tags stay balanced.
/// When the title and link alone are over the limit, the text is dropped and
/// the title shortened instead; the link goes last.
pub fn news_caption_html(title: &str, text: &str, url: Option<&str>, max_len: usize) -> String {
    let fits = |html: &str| html.chars().count() <= max_len;

    let full = news_post_html(title, text, url);
    if fits(&full) {
        return full;
    }

    // Separator plus the `...` marker.
    let overhead = news_post_html(title, "", url).chars().count() + 5;
    if overhead <= max_len {
        let mut shortened = truncate_chars(text.trim(), max_len - overhead);
        // Escaping can grow the text again; shave until it fits.
        while !shortened.is_empty()
            && !fits(&news_post_html(title, &format!("{shortened}..."), url))
        {
            shortened.pop();
        }
        let html = news_post_html(title, &format!("{shortened}..."), url);
        if fits(&html) {
            return html;
        }
    }

    for url in [url, None] {
        let mut shortened = truncate_chars(title.trim(), max_len);
        loop {
            let html = news_post_html(&format!("{shortened}..."), "", url);
            if fits(&html) {
                return html;
            }
            if shortened.pop().is_none() {
                break;
            }
        }
    }
    String::new()
}

/// `HH:MM:SS` for a number of seconds.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_entities() {
        assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("привет", 3), "при");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc...");
        assert_eq!(truncate_with_ellipsis("abc", 3), "abc");
    }

    #[test]
    fn post_html_includes_source_link() {
        let html = news_post_html("Title", "Body <x>", Some("https://e.com/a?b=1&c=2"));
        assert_eq!(
            html,
            "<b>Title</b>\n\nBody &lt;x&gt;\n\n<a href=\"https://e.com/a?b=1&amp;c=2\">Source</a>"
        );
    }

    #[test]
    fn post_html_without_title_or_url() {
        assert_eq!(news_post_html("", "Just text", None), "Just text");
    }

    #[test]
    fn caption_respects_limit() {
        let text = "word ".repeat(500);
        let caption = news_caption_html("Title", &text, Some("https://e.com"), 1024);
        assert!(caption.chars().count() <= 1024);
        assert!(caption.starts_with("<b>Title</b>"));
        assert!(caption.ends_with("Source</a>"));
        assert!(caption.contains("..."));
    }

    #[test]
    fn overlong_title_is_shortened_to_fit() {
        let title = "Т".repeat(1100);
        let caption = news_caption_html(&title, "body text", Some("https://e.com/1"), 1024);
        assert!(caption.chars().count() <= 1024);
        assert!(caption.starts_with("<b>ТТТ"));
        assert!(caption.contains("...</b>"));
        assert!(caption.ends_with("Source</a>"));
        assert!(!caption.contains("body text"));
    }

    #[test]
    fn link_is_dropped_when_nothing_else_fits() {
        let url = format!("https://e.com/{}", "p".repeat(200));
        let caption = news_caption_html("Title & more", "body", Some(&url), 40);
        assert!(caption.chars().count() <= 40);
        assert!(caption.starts_with("<b>Title"));
        assert!(!caption.contains("href"));
    }

    #[test]
    fn formats_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(3723), "01:02:03");
    }
}
