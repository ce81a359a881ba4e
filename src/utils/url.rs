// src/utils/url.rs

//! URL rewriting for generated pages.

use url::Url;

/// Shown when a student row has no photo.
pub const PLACEHOLDER_PHOTO: &str = "https://via.placeholder.com/100x100?text=Student";

const SPREADSHEET_MARKER: &str = "docs.google.com/spreadsheets";

/// Query parameters cleared before the embed flags are applied.
const EMBED_CLEARED: &[&str] = &[
    "usp", "embedded", "rm", "chrome", "headers", "widget", "single",
];

const EMBED_FLAGS: &[(&str, &str)] = &[
    ("rm", "minimal"),
    ("embedded", "true"),
    ("chrome", "false"),
    ("headers", "false"),
    ("widget", "true"),
    ("single", "true"),
];

/// Rewrite a Google Sheets link for the minimal embedded view.
///
/// Links to anything else, and links that fail to parse, come back unchanged.
///
/// # Examples
/// ```
/// use roster_sync::utils::url::embed_spreadsheet_url;
///
/// let url = embed_spreadsheet_url("https://docs.google.com/spreadsheets/d/abc/edit?usp=sharing");
/// assert_eq!(
///     url,
///     "https://docs.google.com/spreadsheets/d/abc/edit?rm=minimal&embedded=true&chrome=false&headers=false&widget=true&single=true"
/// );
/// ```
pub fn embed_spreadsheet_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() || !raw.contains(SPREADSHEET_MARKER) {
        return raw.to_string();
    }

    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            log::warn!("Vocabulary URL {raw:?} not rewritten: {e}");
            return raw.to_string();
        }
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !EMBED_CLEARED.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        for (k, v) in EMBED_FLAGS {
            query.append_pair(k, v);
        }
    }

    url.to_string()
}

/// Human title for an activity link, from its last path segment.
///
/// `None` when nothing usable is left; callers fall back to `Activity N`.
pub fn activity_title(link: &str) -> Option<String> {
    let without_fragment = link.split('#').next().unwrap_or("");
    let without_query = without_fragment.split('?').next().unwrap_or("");
    let last = without_query.rsplit('/').next().unwrap_or("");

    let stem = strip_page_extension(last);
    let words: Vec<String> = stem
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn strip_page_extension(segment: &str) -> &str {
    const EXTENSIONS: &[&str] = &[".html", ".htm", ".php", ".asp", ".jsp"];
    let lower = segment.to_ascii_lowercase();
    for ext in EXTENSIONS {
        if lower.ends_with(ext) {
            return &segment[..segment.len() - ext.len()];
        }
    }
    segment
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Generated avatar for a teacher without a photo.
pub fn avatar_url(name: &str) -> String {
    let mut url = match Url::parse("https://ui-avatars.com/api/") {
        Ok(url) => url,
        Err(_) => return String::new(),
    };
    url.query_pairs_mut()
        .append_pair("name", name)
        .append_pair("size", "300")
        .append_pair("background", "667eea")
        .append_pair("color", "ffffff");
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_keeps_unrelated_params() {
        let url = embed_spreadsheet_url(
            "https://docs.google.com/spreadsheets/d/abc/edit?gid=42&rm=demo&widget=false",
        );
        assert_eq!(
            url,
            "https://docs.google.com/spreadsheets/d/abc/edit?gid=42&rm=minimal&embedded=true&chrome=false&headers=false&widget=true&single=true"
        );
    }

    #[test]
    fn test_embed_is_stable() {
        let once = embed_spreadsheet_url("https://docs.google.com/spreadsheets/d/abc/edit");
        assert_eq!(embed_spreadsheet_url(&once), once);
    }

    #[test]
    fn test_embed_ignores_other_links() {
        assert_eq!(
            embed_spreadsheet_url("https://quizlet.com/set/1?usp=x"),
            "https://quizlet.com/set/1?usp=x"
        );
        assert_eq!(embed_spreadsheet_url("   "), "");
        assert_eq!(
            embed_spreadsheet_url("docs.google.com/spreadsheets/d/abc"),
            "docs.google.com/spreadsheets/d/abc"
        );
    }

    #[test]
    fn test_activity_title() {
        assert_eq!(
            activity_title("https://site.com/past_simple-quiz.HTML").as_deref(),
            Some("Past Simple Quiz")
        );
        assert_eq!(
            activity_title("https://site.com/lessons/PHRASAL--verbs.php?x=1#top").as_deref(),
            Some("Phrasal Verbs")
        );
        assert_eq!(activity_title("https://site.com/"), None);
        assert_eq!(activity_title("https://site.com/.html"), None);
    }

    #[test]
    fn test_avatar_url_encodes_name() {
        assert_eq!(
            avatar_url("Ms. Smith"),
            "https://ui-avatars.com/api/?name=Ms.+Smith&size=300&background=667eea&color=ffffff"
        );
    }
}
