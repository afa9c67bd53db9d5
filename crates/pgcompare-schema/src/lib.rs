//! Schema snapshot types for pgcompare.
//!
//! A [`SchemaSnapshot`] is a point-in-time capture of one database schema:
//! its tables, their columns, primary keys and indexes. Snapshots are plain
//! values. They are produced by a schema loader, compared by the diff engine
//! and never mutated after loading.
//!
//! Maps keep insertion order, so the order in which a loader inserts tables
//! (and columns, and indexes) is the snapshot's natural order. The diff engine
//! relies on that order to produce deterministic output.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;

/// The schema used when an endpoint does not name one.
pub const DEFAULT_SCHEMA: &str = "public";

/// Kind of relation, as reported by `information_schema.tables.table_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TableType {
    /// `BASE TABLE`
    #[default]
    BaseTable,
    /// `VIEW`
    View,
    /// `FOREIGN`
    Foreign,
    /// `LOCAL TEMPORARY`
    LocalTemporary,
    /// Anything the catalog reports that we don't know about.
    Other(String),
}

impl TableType {
    /// Parse the catalog spelling of a table type.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASE TABLE" => TableType::BaseTable,
            "VIEW" => TableType::View,
            "FOREIGN" | "FOREIGN TABLE" => TableType::Foreign,
            "LOCAL TEMPORARY" => TableType::LocalTemporary,
            _ => TableType::Other(s.trim().to_string()),
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableType::BaseTable => write!(f, "BASE TABLE"),
            TableType::View => write!(f, "VIEW"),
            TableType::Foreign => write!(f, "FOREIGN"),
            TableType::LocalTemporary => write!(f, "LOCAL TEMPORARY"),
            TableType::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A column as seen in the catalog.
///
/// Equality ignores `name`: two descriptors are equal when every other field
/// matches. The name is the lookup key in [`TableDescriptor::columns`].
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,
    /// Data type, as spelled by `information_schema.columns.data_type`
    pub data_type: String,
    /// Whether the column allows NULL
    pub nullable: bool,
    /// Default value expression (if any)
    pub default: Option<String>,
    /// `character_maximum_length`
    pub character_max_length: Option<i32>,
    /// `numeric_precision`
    pub numeric_precision: Option<i32>,
    /// `numeric_scale`
    pub numeric_scale: Option<i32>,
}

impl ColumnDescriptor {
    /// Create a nullable column with no default and no length information.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            character_max_length: None,
            numeric_precision: None,
            numeric_scale: None,
        }
    }

    /// Mark the column `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set the default value expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the character maximum length.
    pub fn with_max_length(mut self, len: i32) -> Self {
        self.character_max_length = Some(len);
        self
    }

    /// Set numeric precision and scale.
    pub fn with_precision(mut self, precision: i32, scale: i32) -> Self {
        self.numeric_precision = Some(precision);
        self.numeric_scale = Some(scale);
        self
    }

    /// Compact rendering of the column definition, without the name.
    ///
    /// `character varying(50) NOT NULL DEFAULT 'x'`
    pub fn signature(&self) -> String {
        let mut sig = self.data_type.clone();
        if let Some(len) = positive(self.character_max_length) {
            sig.push_str(&format!("({})", len));
        } else if self.data_type.eq_ignore_ascii_case("numeric")
            && let Some(precision) = positive(self.numeric_precision)
        {
            sig.push_str(&format!(
                "({},{})",
                precision,
                self.numeric_scale.unwrap_or(0)
            ));
        }
        if !self.nullable {
            sig.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sig.push_str(&format!(" DEFAULT {}", default));
        }
        sig
    }
}

impl PartialEq for ColumnDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.data_type == other.data_type
            && self.nullable == other.nullable
            && self.default == other.default
            && self.character_max_length == other.character_max_length
            && self.numeric_precision == other.numeric_precision
            && self.numeric_scale == other.numeric_scale
    }
}

impl Eq for ColumnDescriptor {}

/// Returns the value if it is present and strictly positive.
pub fn positive(value: Option<i32>) -> Option<i32> {
    value.filter(|v| *v > 0)
}

/// An index as seen in the catalog.
///
/// Equality ignores `name` and compares `unique`, `columns` (order matters),
/// `include` and `method`.
#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    /// Index name
    pub name: String,
    /// Whether this is a unique index
    pub unique: bool,
    /// Indexed columns (or expressions), in key order
    pub columns: Vec<String>,
    /// Non-key columns carried by the index (`INCLUDE (...)`)
    pub include: Vec<String>,
    /// Access method: `btree`, `hash`, `gin`, `gist`, ...
    pub method: String,
}

impl IndexDescriptor {
    /// Create a non-unique index.
    pub fn new<I, S>(name: impl Into<String>, columns: I, method: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            unique: false,
            columns: columns.into_iter().map(Into::into).collect(),
            include: Vec::new(),
            method: method.into(),
        }
    }

    /// Create a non-unique btree index.
    pub fn btree<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, columns, "btree")
    }

    /// Mark the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the non-key `INCLUDE` columns.
    pub fn with_include<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = columns.into_iter().map(Into::into).collect();
        self
    }

    /// `UNIQUE btree (a, b) INCLUDE (c)`
    pub fn signature(&self) -> String {
        let mut sig = format!(
            "{}{} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.method,
            self.columns.join(", ")
        );
        if !self.include.is_empty() {
            sig.push_str(&format!(" INCLUDE ({})", self.include.join(", ")));
        }
        sig
    }
}

impl PartialEq for IndexDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.unique == other.unique
            && self.columns == other.columns
            && self.include == other.include
            && self.method == other.method
    }
}

impl Eq for IndexDescriptor {}

/// A table (or view) and everything we compare about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,
    /// Relation kind
    pub table_type: TableType,
    /// Columns, keyed by name, in ordinal order
    pub columns: IndexMap<String, ColumnDescriptor>,
    /// Indexes (primary key index excluded), keyed by name
    pub indexes: IndexMap<String, IndexDescriptor>,
    /// Primary key column names
    pub primary_key: BTreeSet<String>,
}

impl TableDescriptor {
    /// Create an empty base table.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_type(name, TableType::BaseTable)
    }

    /// Create an empty relation of the given type.
    pub fn with_type(name: impl Into<String>, table_type: TableType) -> Self {
        Self {
            name: name.into(),
            table_type,
            columns: IndexMap::new(),
            indexes: IndexMap::new(),
            primary_key: BTreeSet::new(),
        }
    }

    /// Add (or replace) a column.
    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    /// Add (or replace) an index.
    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.insert(index.name.clone(), index);
        self
    }

    /// Set the primary key columns.
    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.get(name)
    }

    /// Get an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes.get(name)
    }

    /// Primary key columns joined with `", "`, in alphabetical order.
    ///
    /// Returns `"none"` when the table has no primary key.
    pub fn primary_key_display(&self) -> String {
        if self.primary_key.is_empty() {
            "none".to_string()
        } else {
            self.primary_key
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// A point-in-time capture of one schema on one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSnapshot {
    /// The schema this snapshot was taken from.
    pub schema_name: String,
    /// Tables in the schema, indexed by name
    pub tables: IndexMap<String, TableDescriptor>,
}

impl Default for SchemaSnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA)
    }
}

impl SchemaSnapshot {
    /// Create an empty snapshot of the given schema.
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            tables: IndexMap::new(),
        }
    }

    /// Add (or replace) a table.
    pub fn with_table(mut self, table: TableDescriptor) -> Self {
        self.insert_table(table);
        self
    }

    /// Add (or replace) a table in place.
    pub fn insert_table(&mut self, table: TableDescriptor) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(name)
    }

    /// Get a table by name, mutably. Loaders use this while filling a snapshot.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut TableDescriptor> {
        self.tables.get_mut(name)
    }

    /// Iterate over all tables in natural order.
    pub fn iter_tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values()
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if the snapshot has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Total number of columns across all tables.
    pub fn column_count(&self) -> usize {
        self.tables.values().map(|t| t.columns.len()).sum()
    }

    /// Total number of indexes across all tables.
    pub fn index_count(&self) -> usize {
        self.tables.values().map(|t| t.indexes.len()).sum()
    }
}
