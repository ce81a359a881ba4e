// src/pipeline/render.rs

//! Template model and page rendering.
//!
//! A template is parsed once into literal spans, `{{NAME}}` slots and named
//! blocks. Rendering walks the segments a single time, so a substituted
//! value is never scanned for further tokens.
//!
//! ```text
//! <h1>{{STUDENT_NAME}}</h1>            Slot("STUDENT_NAME")
//! <!-- TEACHER CONFIGURATION -->       Block("TEACHER_CONFIG") ...
//! <script>...</script>                 ... through the first closing tag
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Config, Student, Teacher};
use crate::utils::url::{PLACEHOLDER_PHOTO, activity_title, avatar_url, embed_spreadsheet_url};
use crate::utils::{escape_html, safe_href};

/// Values keyed by slot or block name.
pub type Values = HashMap<String, String>;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Z][A-Z0-9_]*)\}\}").expect("Invalid template token regex")
});

/// A delimited region replaced as a whole.
#[derive(Debug, Clone, Copy)]
pub struct BlockMarker {
    pub name: &'static str,
    pub start: &'static str,
    /// The block runs through the first `end` after `start`.
    pub end: &'static str,
}

/// The runtime configuration script in teacher dashboards.
pub const TEACHER_CONFIG_BLOCK: BlockMarker = BlockMarker {
    name: "TEACHER_CONFIG",
    start: "<!-- TEACHER CONFIGURATION -->",
    end: "</script>",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Slot(String),
    Block { name: String, original: String },
}

/// A parsed template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template text, carving out the given blocks first.
    pub fn parse(text: &str, blocks: &[BlockMarker]) -> Self {
        let mut segments = Vec::new();
        let mut rest = text;

        while let Some((marker, start)) = next_block(rest, blocks) {
            let body_start = start + marker.start.len();
            let Some(end_offset) = rest[body_start..].find(marker.end) else {
                log::warn!("Block {} has no closing {:?}; left as text", marker.name, marker.end);
                break;
            };
            let end = body_start + end_offset + marker.end.len();

            push_text(&mut segments, &rest[..start]);
            segments.push(Segment::Block {
                name: marker.name.to_string(),
                original: rest[start..end].to_string(),
            });
            rest = &rest[end..];
        }
        push_text(&mut segments, rest);

        Self { segments }
    }

    /// Read and parse a template file.
    pub async fn load(path: &Path, blocks: &[BlockMarker]) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::template(path, e))?;
        Ok(Self::parse(&text, blocks))
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Slot names in document order.
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Block { name: n, .. } if n == name))
    }

    /// Expand the template.
    ///
    /// Missing slots render empty. Missing blocks keep their original text.
    pub fn render(&self, values: &Values) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => {
                    if let Some(value) = values.get(name) {
                        out.push_str(value);
                    }
                }
                Segment::Block { name, original } => {
                    out.push_str(values.get(name).unwrap_or(original));
                }
            }
        }
        out
    }
}

fn next_block<'m>(text: &str, blocks: &'m [BlockMarker]) -> Option<(&'m BlockMarker, usize)> {
    blocks
        .iter()
        .filter_map(|m| text.find(m.start).map(|pos| (m, pos)))
        .min_by_key(|(_, pos)| *pos)
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    let mut last = 0;
    for caps in TOKEN_PATTERN.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(text[last..whole.start()].to_string()));
        }
        segments.push(Segment::Slot(name.as_str().to_string()));
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment::Literal(text[last..].to_string()));
    }
}

/// One-shot token substitution without blocks.
pub fn render_text(text: &str, values: &Values) -> String {
    Template::parse(text, &[]).render(values)
}

// --- Student pages ---

const NO_ACTIVITIES_HTML: &str =
    r#"<div style="text-align: center; color: #666; padding: 40px;"><p>No finished activities yet.</p></div>"#;

/// A URL slot value; blank stays blank, unsafe schemes become `#`.
fn url_value(raw: &str) -> String {
    if raw.trim().is_empty() {
        String::new()
    } else {
        safe_href(raw)
    }
}

/// Activity links, most recent first.
pub fn finished_activity_links(raw: &str) -> Vec<&str> {
    let mut links: Vec<&str> = raw.split(',').map(str::trim).filter(|l| !l.is_empty()).collect();
    links.reverse();
    links
}

/// Card list for the finished-activities tab.
pub fn finished_activities_html(raw: &str) -> String {
    let links = finished_activity_links(raw);
    if links.is_empty() {
        return NO_ACTIVITIES_HTML.to_string();
    }

    let mut html = String::from(r#"<div style="display: grid; gap: 15px;">"#);
    for (i, link) in links.iter().enumerate() {
        let title = activity_title(link).unwrap_or_else(|| format!("Activity {}", i + 1));
        html.push_str(&format!(
            r#"
    <a class="activity-card" href="{href}" target="_blank" rel="noopener" style="display: block; background: rgba(255, 255, 255, 0.8); border: 1px solid rgba(0, 0, 0, 0.1); border-radius: 12px; padding: 20px; text-decoration: none;">
        <div style="display: flex; align-items: center; margin-bottom: 10px;">
            <span style="color: #48bb78; font-size: 1.2rem; margin-right: 10px;">✓</span>
            <h4 style="color: #2d3748; margin: 0; font-size: 1.1rem; font-weight: 600;">{title}</h4>
            <span style="color: #4c51bf; font-size: 0.8rem; margin-left: 10px;">🔗 Click to open</span>
        </div>
        <p style="color: #4a5568; margin: 8px 0; font-size: 0.9rem; word-break: break-all;">{text}</p>
    </a>"#,
            href = url_value(link),
            title = escape_html(&title),
            text = escape_html(link),
        ));
    }
    html.push_str("\n</div>");
    html
}

/// Slot values for a student page.
pub fn student_values(student: &Student) -> Values {
    let photo = if student.image_url.is_empty() {
        PLACEHOLDER_PHOTO
    } else {
        student.image_url.as_str()
    };
    let role = if student.role.is_empty() {
        "Student"
    } else {
        student.role.as_str()
    };
    let text = |v: &str| escape_html(v);

    let pairs = [
        ("STUDENT_NAME", text(&student.name)),
        ("STUDENT_PHOTO", url_value(photo)),
        ("ASSIGNED_TEACHER", text(&student.assigned_teacher)),
        ("CONTRACT", text(&student.contract)),
        ("WORKPLACE", text(&student.workplace)),
        ("EMAIL", text(&student.email)),
        ("PHONE", text(&student.whatsapp)),
        ("PHONE_NUMBER", text(&student.whatsapp)),
        ("PHONE_NUMBER_CLEAN", student.phone_digits()),
        ("ROLE", text(role)),
        ("CLASS_LINK", url_value(&student.class_link)),
        ("CLASS_LINK_ICON", student.class_link_icon().to_string()),
        ("WHATSAPP", text(&student.whatsapp)),
        ("WHATSAPP_LINK", url_value(&student.whatsapp_link())),
        ("LEVEL", text(&student.level)),
        ("LEARNING_OBJECTIVES", text(&student.learning_objective)),
        (
            "VOCABULARY_URL",
            url_value(&embed_spreadsheet_url(&student.vocabulary_url)),
        ),
        ("FINISHED_ACTIVITIES", text(&student.finished_activities)),
        (
            "FINISHED_ACTIVITIES_HTML",
            finished_activities_html(&student.finished_activities),
        ),
        ("NATIONALITY", text(&student.nationality)),
        ("LOCATION", text(&student.location)),
    ];

    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn render_student(template: &Template, student: &Student) -> String {
    template.render(&student_values(student))
}

// --- Teacher dashboards ---

/// Site-wide constants baked into every dashboard.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub teacher_title: String,
    pub sheet_url: String,
    pub website_url: String,
    pub website_logo: String,
    pub pages_base_url: String,
    pub default_platforms: Vec<String>,
}

impl SiteInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            teacher_title: config.dashboard.teacher_title.clone(),
            sheet_url: config.sheet_edit_url(),
            website_url: config.dashboard.website_url.clone(),
            website_logo: config.dashboard.website_logo.clone(),
            pages_base_url: config.dashboard.pages_base_url.clone(),
            default_platforms: config.dashboard.default_platforms.clone(),
        }
    }
}

#[derive(Serialize)]
struct Tab {
    show: bool,
    label: &'static str,
}

#[derive(Serialize)]
struct Tabs {
    home: Tab,
    students: Tab,
    invoicing: Tab,
    work: Tab,
}

impl Default for Tabs {
    fn default() -> Self {
        let tab = |label| Tab { show: true, label };
        Self {
            home: tab("Home"),
            students: tab("Students"),
            invoicing: tab("Invoicing"),
            work: tab("Call"),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TeacherConfig<'a> {
    teacher_name: &'a str,
    teacher_title: &'a str,
    header_title: String,
    sheet_url: &'a str,
    profile_image: String,
    website_url: &'a str,
    website_logo: &'a str,
    tabs: Tabs,
    platforms: Vec<String>,
    github_pages_url: &'a str,
    total_students: usize,
    active_classes: usize,
    assigned_teacher: &'a str,
}

/// The full `TEACHER CONFIGURATION` block for one teacher.
pub fn teacher_config_block(teacher: &Teacher, site: &SiteInfo) -> Result<String> {
    let mut platforms = teacher.platforms();
    if platforms.is_empty() {
        platforms = site.default_platforms.clone();
    }

    let config = TeacherConfig {
        teacher_name: &teacher.name,
        teacher_title: &site.teacher_title,
        header_title: format!("{}'s Dashboard", teacher.name),
        sheet_url: &site.sheet_url,
        profile_image: avatar_url(&teacher.name),
        website_url: &site.website_url,
        website_logo: &site.website_logo,
        tabs: Tabs::default(),
        platforms,
        github_pages_url: &site.pages_base_url,
        total_students: teacher.total_students(),
        active_classes: teacher.active_classes(),
        assigned_teacher: &teacher.name,
    };

    // `<` is escaped so no value can close the script element.
    let json = serde_json::to_string_pretty(&config)?.replace('<', "\\u003c");
    let json = json.replace('\n', "\n        ");

    Ok(format!(
        "{start}\n    <script>\n        const TEACHER_CONFIG = {json};\n    {end}",
        start = TEACHER_CONFIG_BLOCK.start,
        end = TEACHER_CONFIG_BLOCK.end,
    ))
}

/// Slot and block values for a teacher dashboard.
pub fn teacher_values(teacher: &Teacher, site: &SiteInfo) -> Result<Values> {
    let mut values = Values::new();
    values.insert(
        TEACHER_CONFIG_BLOCK.name.to_string(),
        teacher_config_block(teacher, site)?,
    );
    values.insert("TEACHER_NAME".into(), escape_html(&teacher.name));
    values.insert("TOTAL_STUDENTS".into(), teacher.total_students().to_string());
    values.insert("ACTIVE_CLASSES".into(), teacher.active_classes().to_string());
    Ok(values)
}

pub fn render_teacher(template: &Template, teacher: &Teacher, site: &SiteInfo) -> Result<String> {
    if !template.has_block(TEACHER_CONFIG_BLOCK.name) {
        log::warn!(
            "Teacher template has no {:?} marker; dashboard for {} gets no configuration",
            TEACHER_CONFIG_BLOCK.start,
            teacher.name
        );
    }
    Ok(template.render(&teacher_values(teacher, site)?))
}
