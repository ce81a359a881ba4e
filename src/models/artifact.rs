//! Artifact kinds and the name ↔ file name mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two kinds of generated page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    StudentPage,
    TeacherDashboard,
}

impl ArtifactKind {
    /// Fixed file name suffix identifying the kind.
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::StudentPage => "-Page.html",
            ArtifactKind::TeacherDashboard => "-Teacher-Dashboard.html",
        }
    }

    /// Label used in commit messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::StudentPage => "Students",
            ArtifactKind::TeacherDashboard => "Teachers",
        }
    }

    /// One-line description of a publish.
    pub fn publish_description(&self) -> &'static str {
        match self {
            ArtifactKind::StudentPage => "Student pages updated from Google Sheets",
            ArtifactKind::TeacherDashboard => "Teacher dashboards updated from Google Sheets",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::StudentPage => write!(f, "student page"),
            ArtifactKind::TeacherDashboard => write!(f, "teacher dashboard"),
        }
    }
}

/// Turn a natural key into a filesystem-safe stem.
///
/// Drops everything outside `[A-Za-z0-9]`, whitespace and `-`, then folds
/// each run of whitespace/`-` into one `-`. The result is a fixed point:
/// `normalize_name(normalize_name(x)) == normalize_name(x)`.
///
/// Hyphenated names keep their hyphen: "Mary-Jane Watson" becomes
/// `Mary-Jane-Watson`. Older sites dropped it and published
/// `MaryJane-Watson-Page.html`, so those page URLs change on the first sync
/// and the old files are removed as orphans.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            in_separator = false;
        } else if ch.is_whitespace() || ch == '-' {
            if !in_separator {
                out.push('-');
                in_separator = true;
            }
        }
    }

    out
}

/// Whether a stem could have been produced by [`normalize_name`].
pub fn is_valid_stem(stem: &str) -> bool {
    !stem.is_empty() && stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Best-effort natural key from a stem (`John-Doe` → `John Doe`).
pub fn denormalize_stem(stem: &str) -> String {
    stem.replace('-', " ")
}

/// Identity of one artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    stem: String,
    kind: ArtifactKind,
}

impl ArtifactKey {
    /// Key for a record's natural key.
    pub fn new(kind: ArtifactKind, name: &str) -> Self {
        Self {
            stem: normalize_name(name.trim()),
            kind,
        }
    }

    /// Recover a key from a file name carrying the kind's suffix.
    pub fn from_file_name(kind: ArtifactKind, file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(kind.suffix())?;
        if !is_valid_stem(stem) {
            return None;
        }
        Some(Self {
            stem: stem.to_string(),
            kind,
        })
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// File name on disk.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem, self.kind.suffix())
    }

    /// Lossy natural key recovered from the stem.
    pub fn approximate_name(&self) -> String {
        denormalize_stem(&self.stem)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_collapses() {
        assert_eq!(normalize_name("John Doe"), "John-Doe");
        assert_eq!(normalize_name("Mary  O'Brien"), "Mary-OBrien");
        assert_eq!(normalize_name("Dr. Jane\t Smith"), "Dr-Jane-Smith");
        assert_eq!(normalize_name("Ana - Lucía"), "Ana-Luca");
    }

    #[test]
    fn hyphenated_names_keep_their_hyphen() {
        assert_eq!(normalize_name("Mary-Jane Watson"), "Mary-Jane-Watson");
        assert_eq!(
            ArtifactKey::new(ArtifactKind::StudentPage, "Mary-Jane Watson").file_name(),
            "Mary-Jane-Watson-Page.html"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        for name in [
            "John Doe",
            "  padded  ",
            "Mary-Jane  Watson",
            "a--b - c",
            "José María",
            "!!!",
            "",
        ] {
            let once = normalize_name(name);
            assert_eq!(normalize_name(&once), once, "not a fixed point for {name:?}");
        }
    }

    #[test]
    fn file_name_round_trips_to_key() {
        let key = ArtifactKey::new(ArtifactKind::StudentPage, "John Doe");
        assert_eq!(key.file_name(), "John-Doe-Page.html");

        let parsed = ArtifactKey::from_file_name(ArtifactKind::StudentPage, "John-Doe-Page.html");
        assert_eq!(parsed, Some(key.clone()));
        assert_eq!(key.approximate_name(), "John Doe");
    }

    #[test]
    fn from_file_name_requires_suffix_and_stem() {
        assert!(ArtifactKey::from_file_name(ArtifactKind::StudentPage, "Template.html").is_none());
        assert!(ArtifactKey::from_file_name(ArtifactKind::StudentPage, "-Page.html").is_none());
        assert!(ArtifactKey::from_file_name(ArtifactKind::StudentPage, "My Notes-Page.html").is_none());
        assert!(
            ArtifactKey::from_file_name(
                ArtifactKind::TeacherDashboard,
                "John-Doe-Page.html"
            )
            .is_none()
        );
        let teacher = ArtifactKey::from_file_name(
            ArtifactKind::TeacherDashboard,
            "Ms-Smith-Teacher-Dashboard.html",
        )
        .unwrap();
        assert_eq!(teacher.approximate_name(), "Ms Smith");
    }
}
