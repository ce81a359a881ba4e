// src/pipeline/sync.rs

//! The reconciliation engine.
//!
//! One cycle: fetch → parse → map → diff against the inventory → write and
//! delete → report. Any failure before the first write leaves the inventory
//! exactly as it was.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{
    ArtifactKey, ArtifactKind, Config, Record, SheetSchema, Student, SyncTally, Teacher,
};
use crate::pipeline::diff::DiffCalculator;
use crate::pipeline::map::{group_teachers, map_students};
use crate::pipeline::parse::parse_table;
use crate::pipeline::render::{
    BlockMarker, SiteInfo, TEACHER_CONFIG_BLOCK, Template, render_student, render_teacher,
};
use crate::services::SheetSource;
use crate::storage::{ArtifactStore, LocalArtifactStore, Removal};

const TEACHER_BLOCKS: &[BlockMarker] = &[TEACHER_CONFIG_BLOCK];

/// Turns roster rows into one kind of page.
pub trait PageBuilder: Send + Sync {
    type Record: Record;

    fn kind(&self) -> ArtifactKind {
        <Self::Record as Record>::KIND
    }

    /// Blocks the template parser should carve out.
    fn blocks(&self) -> &'static [BlockMarker] {
        &[]
    }

    /// Build this kind's records from the decoded students.
    fn records(&self, students: Vec<Student>) -> Vec<Self::Record>;

    fn render(&self, template: &Template, record: &Self::Record) -> Result<String>;
}

/// One page per student.
#[derive(Debug, Clone, Default)]
pub struct StudentPages;

impl PageBuilder for StudentPages {
    type Record = Student;

    fn records(&self, students: Vec<Student>) -> Vec<Student> {
        students
    }

    fn render(&self, template: &Template, record: &Student) -> Result<String> {
        Ok(render_student(template, record))
    }
}

/// One dashboard per teacher.
#[derive(Debug, Clone)]
pub struct TeacherDashboards {
    site: SiteInfo,
}

impl TeacherDashboards {
    pub fn new(site: SiteInfo) -> Self {
        Self { site }
    }
}

impl PageBuilder for TeacherDashboards {
    type Record = Teacher;

    fn blocks(&self) -> &'static [BlockMarker] {
        TEACHER_BLOCKS
    }

    fn records(&self, students: Vec<Student>) -> Vec<Teacher> {
        group_teachers(&students)
    }

    fn render(&self, template: &Template, record: &Teacher) -> Result<String> {
        render_teacher(template, record, &self.site)
    }
}

/// Where the engine is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Fetching,
    Parsing,
    Diffing,
    Applying,
    Reporting,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::Fetching => "fetching",
            SyncState::Parsing => "parsing",
            SyncState::Diffing => "diffing",
            SyncState::Applying => "applying",
            SyncState::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// Artifact keys believed present on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    keys: BTreeSet<ArtifactKey>,
}

impl Inventory {
    pub fn from_keys(keys: impl IntoIterator<Item = ArtifactKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn keys(&self) -> &BTreeSet<ArtifactKey> {
        &self.keys
    }

    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Lossy natural keys recovered from file names.
    pub fn approximate_names(&self) -> Vec<String> {
        self.keys.iter().map(ArtifactKey::approximate_name).collect()
    }
}

/// A sheet record and whether its artifact exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub file_name: String,
    pub exists: bool,
}

/// Reconciles one artifact kind against the sheet.
pub struct SyncEngine<B: PageBuilder> {
    builder: B,
    source: Arc<dyn SheetSource>,
    store: Arc<dyn ArtifactStore>,
    template_path: PathBuf,
    schema: SheetSchema,
    inventory: Inventory,
    state: SyncState,
}

impl<B: PageBuilder> SyncEngine<B> {
    pub fn new(
        builder: B,
        source: Arc<dyn SheetSource>,
        store: Arc<dyn ArtifactStore>,
        template_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            builder,
            source,
            store,
            template_path: template_path.into(),
            schema: SheetSchema::current(),
            inventory: Inventory::default(),
            state: SyncState::Idle,
        }
    }

    pub fn with_schema(mut self, schema: SheetSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn schema(&self) -> &SheetSchema {
        &self.schema
    }

    pub fn kind(&self) -> ArtifactKind {
        self.builder.kind()
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    fn set_state(&mut self, state: SyncState) {
        if self.state != state {
            log::debug!("{} engine: {} → {}", self.kind(), self.state, state);
            self.state = state;
        }
    }

    /// Rebuild the inventory from what is on disk.
    pub async fn seed(&mut self) -> Result<usize> {
        let keys = self.store.enumerate().await?;
        self.inventory = Inventory::from_keys(keys);
        log::info!(
            "📁 Found {} existing {} file(s)",
            self.inventory.len(),
            self.kind()
        );
        Ok(self.inventory.len())
    }

    async fn fetch_records(&mut self) -> Result<Vec<B::Record>> {
        self.set_state(SyncState::Fetching);
        log::info!("📥 Fetching roster from {}", self.source.location());
        let csv = self.source.fetch_csv().await?;

        self.set_state(SyncState::Parsing);
        let table = parse_table(&csv);
        let students = map_students(&table, &self.schema);
        Ok(self.builder.records(students))
    }

    async fn load_template(&self) -> Result<Template> {
        Template::load(&self.template_path, self.builder.blocks()).await
    }

    /// Run one reconciliation pass.
    ///
    /// Errors are returned only for failures that abort the cycle before
    /// anything is applied; per-artifact failures are logged and skipped.
    pub async fn run_cycle(&mut self) -> Result<SyncTally> {
        let result = self.cycle().await;
        self.set_state(SyncState::Idle);
        result
    }

    async fn cycle(&mut self) -> Result<SyncTally> {
        let records = self.fetch_records().await?;
        let template = self.load_template().await?;

        self.set_state(SyncState::Diffing);
        let known = self.inventory.keys.clone();
        let diff = DiffCalculator::new().calculate(&known, &records);

        for collision in &diff.collisions {
            log::warn!(
                "⚠️ {:?} and {:?} both map to {}; keeping {:?}",
                collision.kept,
                collision.dropped,
                collision.key,
                collision.kept
            );
        }
        for name in &diff.unnamed {
            log::warn!("⚠️ {name:?} has no usable characters for a file name; skipped");
        }

        self.set_state(SyncState::Applying);
        let mut tally = SyncTally {
            total: records.len(),
            ..SyncTally::default()
        };
        let mut next: BTreeSet<ArtifactKey> = BTreeSet::new();

        for upsert in &diff.upserts {
            let written = match self.builder.render(&template, upsert.record) {
                Ok(content) => self.store.write(&upsert.key, &content).await,
                Err(e) => Err(e),
            };
            match written {
                Ok(()) => {
                    next.insert(upsert.key.clone());
                    if upsert.known {
                        tally.updated += 1;
                        log::debug!("✓ Updated: {}", upsert.key);
                    } else {
                        tally.created += 1;
                        log::info!("✓ Created: {}", upsert.key);
                    }
                }
                Err(e) => {
                    log::error!("✗ Error writing {}: {e}", upsert.key);
                    // The previous file is still on disk.
                    if upsert.known {
                        next.insert(upsert.key.clone());
                    }
                }
            }
        }

        for key in &diff.removals {
            match self.store.remove(key).await {
                Ok(Removal::Deleted) => {
                    tally.deleted += 1;
                    log::info!("🗑️ Deleted: {key}");
                }
                Ok(Removal::Missing) => {
                    log::debug!("{key} was already gone");
                }
                Ok(Removal::Refused) => {
                    next.insert(key.clone());
                }
                Err(e) => {
                    log::error!("✗ Error deleting {key}: {e}");
                    next.insert(key.clone());
                }
            }
        }

        self.set_state(SyncState::Reporting);
        self.inventory = Inventory { keys: next };
        log::info!(
            "✓ {} sync complete: {} created, {} updated, {} deleted, {} total",
            self.kind().label(),
            tally.created,
            tally.updated,
            tally.deleted,
            tally.total
        );

        Ok(tally)
    }

    async fn current_records(&mut self) -> Result<Vec<B::Record>> {
        let records = self.fetch_records().await;
        self.set_state(SyncState::Idle);
        records
    }

    /// Look a record up by name, ignoring case.
    pub async fn find(&mut self, name: &str) -> Result<Option<B::Record>> {
        let wanted = name.trim().to_lowercase();
        let records = self.current_records().await?;
        Ok(records
            .into_iter()
            .find(|r| r.name().trim().to_lowercase() == wanted))
    }

    /// Render and write a single record.
    ///
    /// `Ok(None)` when the sheet has no such name.
    pub async fn create_one(&mut self, name: &str) -> Result<Option<ArtifactKey>> {
        let Some(record) = self.find(name).await? else {
            log::warn!("❌ {} {name:?} not found in the sheet", self.kind());
            return Ok(None);
        };

        let key = record.artifact_key();
        if key.stem().is_empty() {
            return Err(AppError::validation(format!(
                "{:?} has no usable characters for a file name",
                record.name()
            )));
        }

        let template = self.load_template().await?;
        let content = self.builder.render(&template, &record)?;
        self.store.write(&key, &content).await?;
        self.inventory.keys.insert(key.clone());

        log::info!("✓ Created/Updated: {key}");
        Ok(Some(key))
    }

    /// Delete a single artifact by natural key.
    pub async fn remove_one(&mut self, name: &str) -> Result<Removal> {
        let key = ArtifactKey::new(self.kind(), name);
        let removal = self.store.remove(&key).await?;

        match removal {
            Removal::Deleted => {
                self.inventory.keys.remove(&key);
                log::info!("🗑️ Deleted: {key}");
            }
            Removal::Missing => {
                self.inventory.keys.remove(&key);
                log::warn!("{key} does not exist");
            }
            Removal::Refused => {}
        }
        Ok(removal)
    }

    /// Every sheet record with an existence marker.
    pub async fn listing(&mut self) -> Result<Vec<ListingEntry>> {
        let records = self.current_records().await?;
        let mut entries = Vec::with_capacity(records.len());

        for record in &records {
            let key = record.artifact_key();
            let exists = if key.stem().is_empty() {
                false
            } else {
                self.store.exists(&key).await?
            };
            entries.push(ListingEntry {
                name: record.name().to_string(),
                file_name: key.file_name(),
                exists,
            });
        }
        Ok(entries)
    }
}

/// Layout named by `source.schema_version`; `validate` rejects unknown ones.
fn configured_schema(config: &Config) -> SheetSchema {
    SheetSchema::for_version(config.source.schema_version).unwrap_or_else(SheetSchema::current)
}

impl SyncEngine<StudentPages> {
    /// Student page engine over the configured directory and template.
    pub fn for_students(config: &Config, source: Arc<dyn SheetSource>) -> Self {
        let kind = ArtifactKind::StudentPage;
        Self::new(
            StudentPages,
            source,
            Arc::new(LocalArtifactStore::new(config.artifact_dir(kind), kind)),
            config.template_path(kind),
        )
        .with_schema(configured_schema(config))
    }
}

impl SyncEngine<TeacherDashboards> {
    /// Teacher dashboard engine over the configured directory and template.
    pub fn for_teachers(config: &Config, source: Arc<dyn SheetSource>) -> Self {
        let kind = ArtifactKind::TeacherDashboard;
        Self::new(
            TeacherDashboards::new(SiteInfo::from_config(config)),
            source,
            Arc::new(LocalArtifactStore::new(config.artifact_dir(kind), kind)),
            config.template_path(kind),
        )
        .with_schema(configured_schema(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const HEADER: &str = "Teacher,Student,Contract,Level,Finished,Workplace,Role,Nationality,Location,Email,WhatsApp,Image,Class,Vocabulary,Objective";

    struct FakeSheet {
        csv: Mutex<Option<String>>,
    }

    impl FakeSheet {
        fn new(rows: &[&str]) -> Arc<Self> {
            let sheet = Arc::new(Self {
                csv: Mutex::new(None),
            });
            sheet.set(rows);
            sheet
        }

        fn set(&self, rows: &[&str]) {
            let csv = std::iter::once(HEADER)
                .chain(rows.iter().copied())
                .collect::<Vec<_>>()
                .join("\n");
            *self.csv.lock().unwrap() = Some(csv);
        }

        fn fail(&self) {
            *self.csv.lock().unwrap() = None;
        }
    }

    #[async_trait]
    impl SheetSource for FakeSheet {
        async fn fetch_csv(&self) -> Result<String> {
            self.csv
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| AppError::fetch("fake://sheet", "offline"))
        }

        fn location(&self) -> String {
            "fake://sheet".into()
        }
    }

    struct Fixture {
        tmp: TempDir,
        sheet: Arc<FakeSheet>,
    }

    impl Fixture {
        fn new(rows: &[&str]) -> Self {
            let tmp = TempDir::new().unwrap();
            std::fs::write(
                tmp.path().join("Template.html"),
                "<h1>{{STUDENT_NAME}}</h1><p>{{LEVEL}}</p>",
            )
            .unwrap();
            Self {
                tmp,
                sheet: FakeSheet::new(rows),
            }
        }

        fn dir(&self) -> PathBuf {
            self.tmp.path().join("Students")
        }

        fn engine(&self) -> SyncEngine<StudentPages> {
            SyncEngine::new(
                StudentPages,
                self.sheet.clone(),
                Arc::new(LocalArtifactStore::new(self.dir(), ArtifactKind::StudentPage)),
                self.tmp.path().join("Template.html"),
            )
        }
    }

    #[test]
    fn test_engines_use_configured_schema() {
        let config = Config::default();
        let sheet = FakeSheet::new(&[]);
        let students = SyncEngine::for_students(&config, sheet.clone());
        let teachers = SyncEngine::for_teachers(&config, sheet);
        assert_eq!(students.schema().version(), config.source.schema_version);
        assert_eq!(teachers.schema().version(), config.source.schema_version);
    }

    #[tokio::test]
    async fn test_second_cycle_is_all_updates() {
        let fx = Fixture::new(&["T,John Doe,,B1", "T,Ana,,A2", "T,Mary O'Brien,,C1"]);
        let mut engine = fx.engine();
        engine.seed().await.unwrap();

        let first = engine.run_cycle().await.unwrap();
        assert_eq!((first.created, first.updated, first.deleted), (3, 0, 0));

        let second = engine.run_cycle().await.unwrap();
        assert_eq!((second.created, second.updated, second.deleted), (0, 3, 0));
        assert_eq!(second.total, 3);
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_inventory() {
        let fx = Fixture::new(&["T,John Doe"]);
        let mut engine = fx.engine();
        engine.run_cycle().await.unwrap();
        let before = engine.inventory().clone();

        fx.sheet.fail();
        let err = engine.run_cycle().await.unwrap_err();
        assert!(err.is_pre_apply());
        assert_eq!(engine.inventory(), &before);
        assert_eq!(engine.state(), SyncState::Idle);
        assert!(fx.dir().join("John-Doe-Page.html").exists());
    }

    #[tokio::test]
    async fn test_missing_template_aborts_before_writes() {
        let fx = Fixture::new(&["T,John Doe"]);
        std::fs::remove_file(fx.tmp.path().join("Template.html")).unwrap();
        let mut engine = fx.engine();

        let err = engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, AppError::Template { .. }));
        assert!(!fx.dir().exists());
        assert!(engine.inventory().is_empty());
    }

    #[tokio::test]
    async fn test_removed_row_deletes_page() {
        let fx = Fixture::new(&["T,John Doe", "T,Ana"]);
        let mut engine = fx.engine();
        engine.run_cycle().await.unwrap();

        fx.sheet.set(&["T,Ana"]);
        let tally = engine.run_cycle().await.unwrap();
        assert_eq!((tally.created, tally.updated, tally.deleted), (0, 1, 1));
        assert!(!fx.dir().join("John-Doe-Page.html").exists());
        assert_eq!(engine.inventory().approximate_names(), vec!["Ana"]);
    }

    #[tokio::test]
    async fn test_single_record_operations() {
        let fx = Fixture::new(&["T,John Doe,,B2", "T,Ana"]);
        let mut engine = fx.engine();

        let found = engine.find("  JOHN doe ").await.unwrap().unwrap();
        assert_eq!(found.level, "B2");
        assert!(engine.find("Nobody").await.unwrap().is_none());

        let key = engine.create_one("john doe").await.unwrap().unwrap();
        assert_eq!(key.file_name(), "John-Doe-Page.html");
        let html = std::fs::read_to_string(fx.dir().join("John-Doe-Page.html")).unwrap();
        assert_eq!(html, "<h1>John Doe</h1><p>B2</p>");
        assert!(engine.create_one("Nobody").await.unwrap().is_none());

        let listing = engine.listing().await.unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing[0].exists);
        assert!(!listing[1].exists);

        assert_eq!(engine.remove_one("John Doe").await.unwrap(), Removal::Deleted);
        assert_eq!(engine.remove_one("John Doe").await.unwrap(), Removal::Missing);
        assert!(engine.inventory().is_empty());
    }
}
