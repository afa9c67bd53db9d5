//! The difference record produced by the diff engine.

use crate::EndpointRef;
use pgcompare_schema::DEFAULT_SCHEMA;
use std::fmt;
use std::str::FromStr;

/// Item name used for primary key differences.
pub const PRIMARY_KEY_ITEM: &str = "PRIMARY_KEY";

/// What kind of discrepancy a [`Difference`] records.
///
/// The wire names (`MISSING_TABLE`, ...) are stable and shared with report
/// consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DifferenceKind {
    MissingTable,
    ExtraTable,
    MissingColumn,
    ExtraColumn,
    ColumnDiff,
    MissingIndex,
    ExtraIndex,
    IndexDiff,
    PrimaryKeyDiff,
}

impl DifferenceKind {
    /// Every kind, in wire-contract order.
    pub const ALL: [DifferenceKind; 9] = [
        DifferenceKind::MissingTable,
        DifferenceKind::ExtraTable,
        DifferenceKind::MissingColumn,
        DifferenceKind::ExtraColumn,
        DifferenceKind::ColumnDiff,
        DifferenceKind::MissingIndex,
        DifferenceKind::ExtraIndex,
        DifferenceKind::IndexDiff,
        DifferenceKind::PrimaryKeyDiff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DifferenceKind::MissingTable => "MISSING_TABLE",
            DifferenceKind::ExtraTable => "EXTRA_TABLE",
            DifferenceKind::MissingColumn => "MISSING_COLUMN",
            DifferenceKind::ExtraColumn => "EXTRA_COLUMN",
            DifferenceKind::ColumnDiff => "COLUMN_DIFF",
            DifferenceKind::MissingIndex => "MISSING_INDEX",
            DifferenceKind::ExtraIndex => "EXTRA_INDEX",
            DifferenceKind::IndexDiff => "INDEX_DIFF",
            DifferenceKind::PrimaryKeyDiff => "PRIMARY_KEY_DIFF",
        }
    }

    /// Severity is a pure function of the kind.
    pub fn severity(&self) -> Severity {
        match self {
            DifferenceKind::MissingTable | DifferenceKind::PrimaryKeyDiff => Severity::Critical,
            DifferenceKind::MissingColumn
            | DifferenceKind::ColumnDiff
            | DifferenceKind::MissingIndex => Severity::Warning,
            DifferenceKind::ExtraTable
            | DifferenceKind::ExtraColumn
            | DifferenceKind::ExtraIndex
            | DifferenceKind::IndexDiff => Severity::Info,
        }
    }
}

impl fmt::Display for DifferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown difference kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown difference kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for DifferenceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DifferenceKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// How much a difference matters to someone reading a report.
///
/// Ordered `Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Most severe first.
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::Warning, Severity::Info];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural discrepancy between a base and a target snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    pub kind: DifferenceKind,
    pub base: EndpointRef,
    pub target: EndpointRef,
    /// Schema of the base snapshot.
    pub schema_name: String,
    pub table_name: String,
    /// Column, index or table name, or [`PRIMARY_KEY_ITEM`].
    pub item_name: String,
    pub description: String,
    pub base_value: Option<String>,
    pub target_value: Option<String>,
}

impl Difference {
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.schema_name != DEFAULT_SCHEMA {
            write!(f, "{}.", self.schema_name)?;
        }
        write!(
            f,
            "{}.{} - {}",
            self.table_name, self.item_name, self.description
        )
    }
}
