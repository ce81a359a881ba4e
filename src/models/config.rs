//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ArtifactKind;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the roster spreadsheet lives
    #[serde(default)]
    pub source: SourceConfig,

    /// HTTP fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Repository, artifact and template locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Git publishing settings
    #[serde(default)]
    pub publish: PublishConfig,

    /// Polling intervals
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Constants baked into teacher dashboards
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.export_url.is_none() && self.source.sheet_id.trim().is_empty() {
            return Err(AppError::validation(
                "source.sheet_id is empty and no source.export_url is set",
            ));
        }
        if self.source.schema_version != crate::models::SCHEMA_VERSION {
            return Err(AppError::validation(format!(
                "source.schema_version {} is not supported (expected {})",
                self.source.schema_version,
                crate::models::SCHEMA_VERSION
            )));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.paths.students_dir == self.paths.teachers_dir {
            return Err(AppError::validation(
                "paths.students_dir and paths.teachers_dir must differ",
            ));
        }
        if self.publish.enabled
            && (self.publish.remote.trim().is_empty() || self.publish.branch.trim().is_empty())
        {
            return Err(AppError::validation(
                "publish.remote and publish.branch are required when publishing",
            ));
        }
        if self.schedule.student_interval_mins == 0 || self.schedule.teacher_interval_mins == 0 {
            return Err(AppError::validation("schedule intervals must be > 0"));
        }
        for (i, dir) in self.publish.directories.iter().enumerate() {
            if dir.name.trim().is_empty() || dir.path.as_os_str().is_empty() {
                return Err(AppError::validation(format!(
                    "publish.directories[{i}] needs a name and a path"
                )));
            }
            if dir.interval_mins == 0 {
                return Err(AppError::validation(format!(
                    "publish.directories[{i}].interval_mins must be > 0"
                )));
            }
            if self.publish.directories[..i].iter().any(|d| d.name == dir.name) {
                return Err(AppError::validation(format!(
                    "publish.directories has two entries named {:?}",
                    dir.name
                )));
            }
        }
        Ok(())
    }

    /// The CSV export URL for the roster sheet.
    pub fn export_url(&self) -> String {
        match &self.source.export_url {
            Some(url) => url.clone(),
            None => format!(
                "https://docs.google.com/spreadsheets/d/{}/export?format=csv&gid={}",
                self.source.sheet_id, self.source.gid
            ),
        }
    }

    /// The editable sheet URL linked from teacher dashboards.
    pub fn sheet_edit_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/edit",
            self.source.sheet_id
        )
    }

    /// Artifact directory for a kind, relative to the repository root.
    pub fn artifact_subdir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::StudentPage => &self.paths.students_dir,
            ArtifactKind::TeacherDashboard => &self.paths.teachers_dir,
        }
    }

    /// Absolute-ish artifact directory for a kind.
    pub fn artifact_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.paths.repo_root.join(self.artifact_subdir(kind))
    }

    /// Template path for a kind.
    pub fn template_path(&self, kind: ArtifactKind) -> PathBuf {
        let template = match kind {
            ArtifactKind::StudentPage => &self.paths.student_template,
            ArtifactKind::TeacherDashboard => &self.paths.teacher_template,
        };
        self.paths.repo_root.join(template)
    }

    /// Polling interval for a kind.
    pub fn interval(&self, kind: ArtifactKind) -> Duration {
        let minutes = match kind {
            ArtifactKind::StudentPage => self.schedule.student_interval_mins,
            ArtifactKind::TeacherDashboard => self.schedule.teacher_interval_mins,
        };
        Duration::from_secs(minutes.saturating_mul(60))
    }
}

/// Spreadsheet location and schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Google Sheets document ID
    #[serde(default = "defaults::sheet_id")]
    pub sheet_id: String,

    /// Worksheet gid to export
    #[serde(default = "defaults::gid")]
    pub gid: String,

    /// Full export URL, overriding `sheet_id`/`gid`
    #[serde(default)]
    pub export_url: Option<String>,

    /// Column layout version the sheet is expected to follow
    #[serde(default = "defaults::schema_version")]
    pub schema_version: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sheet_id: defaults::sheet_id(),
            gid: defaults::gid(),
            export_url: None,
            schema_version: defaults::schema_version(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Git working tree that holds the generated pages
    #[serde(default = "defaults::repo_root")]
    pub repo_root: PathBuf,

    /// Student pages directory, relative to `repo_root`
    #[serde(default = "defaults::students_dir")]
    pub students_dir: PathBuf,

    /// Teacher dashboards directory, relative to `repo_root`
    #[serde(default = "defaults::teachers_dir")]
    pub teachers_dir: PathBuf,

    /// Student page template, relative to `repo_root`
    #[serde(default = "defaults::student_template")]
    pub student_template: PathBuf,

    /// Teacher dashboard template, relative to `repo_root`
    #[serde(default = "defaults::teacher_template")]
    pub teacher_template: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            repo_root: defaults::repo_root(),
            students_dir: defaults::students_dir(),
            teachers_dir: defaults::teachers_dir(),
            student_template: defaults::student_template(),
            teacher_template: defaults::teacher_template(),
        }
    }
}

/// Git publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Commit and push after each cycle
    #[serde(default = "defaults::publish_enabled")]
    pub enabled: bool,

    /// Remote name to push to
    #[serde(default = "defaults::remote")]
    pub remote: String,

    /// Remote branch to push to
    #[serde(default = "defaults::branch")]
    pub branch: String,

    /// Extra directories published on their own timer
    #[serde(default)]
    pub directories: Vec<DirectoryConfig>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::publish_enabled(),
            remote: defaults::remote(),
            branch: defaults::branch(),
            directories: Vec::new(),
        }
    }
}

/// A hand-maintained directory committed and pushed as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Label for logs and the commit message
    pub name: String,

    /// Directory relative to `repo_root`
    pub path: PathBuf,

    /// Defaults to `publish.remote`
    #[serde(default)]
    pub remote: Option<String>,

    /// Defaults to `publish.branch`
    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default = "defaults::directory_interval")]
    pub interval_mins: u64,

    #[serde(default = "defaults::directory_description")]
    pub description: String,
}

impl DirectoryConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            remote: None,
            branch: None,
            interval_mins: defaults::directory_interval(),
            description: defaults::directory_description(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_mins.saturating_mul(60))
    }
}

/// Polling intervals in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "defaults::student_interval")]
    pub student_interval_mins: u64,

    #[serde(default = "defaults::teacher_interval")]
    pub teacher_interval_mins: u64,

    /// How long shutdown waits for an in-flight cycle
    #[serde(default = "defaults::shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            student_interval_mins: defaults::student_interval(),
            teacher_interval_mins: defaults::teacher_interval(),
            shutdown_grace_secs: defaults::shutdown_grace(),
        }
    }
}

/// Site constants written into each teacher's dashboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "defaults::teacher_title")]
    pub teacher_title: String,

    #[serde(default = "defaults::website_url")]
    pub website_url: String,

    #[serde(default = "defaults::website_logo")]
    pub website_logo: String,

    /// Public base URL of the student pages
    #[serde(default = "defaults::pages_base_url")]
    pub pages_base_url: String,

    /// Platforms shown when a teacher's students list none
    #[serde(default = "defaults::default_platforms")]
    pub default_platforms: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            teacher_title: defaults::teacher_title(),
            website_url: defaults::website_url(),
            website_logo: defaults::website_logo(),
            pages_base_url: defaults::pages_base_url(),
            default_platforms: defaults::default_platforms(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn sheet_id() -> String {
        "1e2ppEZlcrZENPHMMyIAtNxqCvqHnxCl_FuR3NUX046I".into()
    }
    pub fn gid() -> String {
        "0".into()
    }
    pub fn schema_version() -> u32 {
        crate::models::SCHEMA_VERSION
    }

    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; roster-sync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Path defaults
    pub fn repo_root() -> PathBuf {
        PathBuf::from(".")
    }
    pub fn students_dir() -> PathBuf {
        PathBuf::from("Students")
    }
    pub fn teachers_dir() -> PathBuf {
        PathBuf::from("Teachers")
    }
    pub fn student_template() -> PathBuf {
        PathBuf::from("templates/Template.html")
    }
    pub fn teacher_template() -> PathBuf {
        PathBuf::from("templates/Teacher-Template.html")
    }

    // Publish defaults
    pub fn publish_enabled() -> bool {
        true
    }
    pub fn remote() -> String {
        "students".into()
    }
    pub fn branch() -> String {
        "master".into()
    }
    pub fn directory_interval() -> u64 {
        2
    }
    pub fn directory_description() -> String {
        "Files updated".into()
    }

    // Schedule defaults
    pub fn student_interval() -> u64 {
        1
    }
    pub fn teacher_interval() -> u64 {
        2
    }
    pub fn shutdown_grace() -> u64 {
        30
    }

    // Dashboard defaults
    pub fn teacher_title() -> String {
        "English Teacher".into()
    }
    pub fn website_url() -> String {
        "https://www.mimlanguageservices.com/".into()
    }
    pub fn website_logo() -> String {
        "https://static.wixstatic.com/media/593d03_21d7db92a5cc4b1c9633f867764de873~mv2.png".into()
    }
    pub fn pages_base_url() -> String {
        "https://mimlanguageservices.github.io/Students/".into()
    }
    pub fn default_platforms() -> Vec<String> {
        vec![
            "MIM".into(),
            "Linked".into(),
            "Italki".into(),
            "Preply".into(),
        ]
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_schema_version() {
        let mut config = Config::default();
        config.source.schema_version = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_shared_artifact_dir() {
        let mut config = Config::default();
        config.paths.teachers_dir = config.paths.students_dir.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn export_url_prefers_override() {
        let mut config = Config::default();
        assert!(config.export_url().ends_with("/export?format=csv&gid=0"));

        config.source.export_url = Some("http://127.0.0.1:9/roster.csv".into());
        assert_eq!(config.export_url(), "http://127.0.0.1:9/roster.csv");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            repo_root = "/srv/site"

            [schedule]
            teacher_interval_mins = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.students_dir, PathBuf::from("Students"));
        assert_eq!(
            config.artifact_dir(ArtifactKind::TeacherDashboard),
            PathBuf::from("/srv/site/Teachers")
        );
        assert_eq!(
            config.interval(ArtifactKind::TeacherDashboard),
            Duration::from_secs(300)
        );
        assert_eq!(config.publish.remote, "students");
    }

    #[test]
    fn load_or_default_falls_back() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = Config::load_or_default(tmp.path().join("absent.toml"));
        assert_eq!(missing.publish.branch, "master");

        let path = tmp.path().join("roster.toml");
        fs::write(&path, "[publish]\nbranch = \"main\"\n").unwrap();
        assert_eq!(Config::load_or_default(&path).publish.branch, "main");

        fs::write(&path, "[publish\n").unwrap();
        assert!(Config::load(&path).is_err());
        assert_eq!(Config::load_or_default(&path).publish.branch, "master");
    }

    #[test]
    fn publish_directories_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [[publish.directories]]
            name = "Classes"
            path = "Classes"

            [[publish.directories]]
            name = "Grammar"
            path = "English-Grammar"
            remote = "grammar"
            interval_mins = 5
            description = "Grammar lesson files updated"
            "#,
        )
        .unwrap();

        let dirs = &config.publish.directories;
        assert_eq!(dirs.len(), 2);
        assert_eq!(dirs[0], DirectoryConfig::new("Classes", "Classes"));
        assert_eq!(dirs[0].interval(), Duration::from_secs(120));
        assert_eq!(dirs[1].remote.as_deref(), Some("grammar"));
        assert_eq!(dirs[1].branch, None);
        assert_eq!(config.publish.remote, "students");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_publish_directories() {
        let mut config = Config::default();
        config.publish.directories = vec![DirectoryConfig::new("Classes", "")];
        assert!(config.validate().is_err());

        config.publish.directories = vec![
            DirectoryConfig::new("Classes", "Classes"),
            DirectoryConfig::new("Classes", "Other"),
        ];
        assert!(config.validate().is_err());

        let mut zero = DirectoryConfig::new("Classes", "Classes");
        zero.interval_mins = 0;
        config.publish.directories = vec![zero];
        assert!(config.validate().is_err());
    }
}
