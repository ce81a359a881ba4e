//! Utility functions and helpers.

pub mod http;
pub mod url;

use ::url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Escape text for HTML element and attribute context.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Keep only `http`/`https` URLs; anything else becomes `#`.
///
/// The result is not escaped. Use [`safe_href`] for attribute output.
pub fn sanitize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => trimmed.to_string(),
        _ => "#".to_string(),
    }
}

/// A URL ready to drop into an `href`/`src` attribute.
pub fn safe_href(raw: &str) -> String {
    escape_html(&sanitize_url(raw))
}
