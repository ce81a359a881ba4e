//! Named column schema for the roster sheet.
//!
//! Rows are decoded by column name instead of bare indices, so a layout
//! change only has to be made here and is caught by [`SheetSchema::check_header`].

/// Current roster layout version.
pub const SCHEMA_VERSION: u32 = 1;

/// A named roster column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    AssignedTeacher,
    StudentName,
    Contract,
    Level,
    FinishedActivities,
    Workplace,
    Role,
    Nationality,
    Location,
    Email,
    Whatsapp,
    ImageUrl,
    ClassLink,
    VocabularyUrl,
    LearningObjective,
}

/// Position and requirement of one column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub column: Column,
    pub index: usize,
    pub required: bool,
}

const fn spec(column: Column, index: usize, required: bool) -> ColumnSpec {
    ColumnSpec {
        column,
        index,
        required,
    }
}

const V1_COLUMNS: &[ColumnSpec] = &[
    spec(Column::AssignedTeacher, 0, false),
    spec(Column::StudentName, 1, true),
    spec(Column::Contract, 2, false),
    spec(Column::Level, 3, false),
    spec(Column::FinishedActivities, 4, false),
    spec(Column::Workplace, 5, false),
    spec(Column::Role, 6, false),
    spec(Column::Nationality, 7, false),
    spec(Column::Location, 8, false),
    spec(Column::Email, 9, false),
    spec(Column::Whatsapp, 10, false),
    spec(Column::ImageUrl, 11, false),
    spec(Column::ClassLink, 12, false),
    spec(Column::VocabularyUrl, 13, false),
    spec(Column::LearningObjective, 14, false),
];

/// A validated, versioned column layout.
#[derive(Debug, Clone, Copy)]
pub struct SheetSchema {
    version: u32,
    columns: &'static [ColumnSpec],
}

impl SheetSchema {
    /// Schema for a layout version, if known.
    pub fn for_version(version: u32) -> Option<Self> {
        match version {
            1 => Some(Self {
                version,
                columns: V1_COLUMNS,
            }),
            _ => None,
        }
    }

    /// The current layout.
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            columns: V1_COLUMNS,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of columns the layout spans.
    pub fn width(&self) -> usize {
        self.columns.iter().map(|c| c.index + 1).max().unwrap_or(0)
    }

    fn index_of(&self, column: Column) -> Option<usize> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.index)
    }

    /// Columns that must be non-blank for a row to be usable.
    pub fn required(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().filter(|c| c.required).map(|c| c.column)
    }

    /// Warn when the sheet header is narrower than the layout.
    ///
    /// Returns `false` on a mismatch. Decoding still proceeds; missing
    /// columns read as empty.
    pub fn check_header(&self, header: &[String]) -> bool {
        let width = self.width();
        if header.len() < width {
            log::warn!(
                "Sheet header has {} column(s), schema v{} expects {}; trailing fields will be empty",
                header.len(),
                self.version,
                width
            );
            return false;
        }
        true
    }

    /// View a raw row through this schema.
    pub fn row<'a>(&'a self, fields: &'a [String]) -> RowView<'a> {
        RowView {
            schema: self,
            fields,
        }
    }
}

impl Default for SheetSchema {
    fn default() -> Self {
        Self::current()
    }
}

/// A raw row accessed by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    schema: &'a SheetSchema,
    fields: &'a [String],
}

impl<'a> RowView<'a> {
    /// Raw field value, empty when the row is short.
    pub fn get(&self, column: Column) -> &'a str {
        self.schema
            .index_of(column)
            .and_then(|i| self.fields.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Trimmed field value.
    pub fn trimmed(&self, column: Column) -> &'a str {
        self.get(column).trim()
    }

    /// True when every required column has content.
    pub fn is_complete(&self) -> bool {
        self.schema
            .required()
            .all(|column| !self.trimmed(column).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(SheetSchema::for_version(1).is_some());
        assert!(SheetSchema::for_version(2).is_none());
        assert_eq!(SheetSchema::current().width(), 15);
    }

    #[test]
    fn short_rows_read_empty() {
        let schema = SheetSchema::current();
        let raw = fields(&["Ms. Smith", "  John Doe "]);
        let row = schema.row(&raw);

        assert_eq!(row.get(Column::AssignedTeacher), "Ms. Smith");
        assert_eq!(row.trimmed(Column::StudentName), "John Doe");
        assert_eq!(row.get(Column::LearningObjective), "");
        assert!(row.is_complete());
    }

    #[test]
    fn blank_name_is_incomplete() {
        let schema = SheetSchema::current();
        let raw = fields(&["Ms. Smith", "   ", "Preply"]);
        assert!(!schema.row(&raw).is_complete());
    }

    #[test]
    fn narrow_header_is_flagged() {
        let schema = SheetSchema::current();
        assert!(!schema.check_header(&fields(&["Teacher", "Student"])));
        let wide: Vec<String> = (0..15).map(|i| format!("c{i}")).collect();
        assert!(schema.check_header(&wide));
    }
}
