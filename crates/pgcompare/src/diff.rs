//! Schema diffing - compare a target snapshot against the base snapshot.
//!
//! [`diff`] is a pure function: the same two snapshots always produce the same
//! ordered list of [`Difference`]s, and nothing in here can fail.
//!
//! ## Ordering
//!
//! Tables are visited base-first, in the base snapshot's natural order, then
//! target-only tables in the target's natural order. Within a table that
//! exists on both sides the output is always:
//!
//! 1. columns (base columns in order, then target-only columns)
//! 2. primary key (at most one difference)
//! 3. indexes (base indexes in order, then target-only indexes)
//!
//! ## Column comparison
//!
//! A `COLUMN_DIFF` description lists only the sub-fields that differ, in a
//! fixed order, joined with `"; "`:
//!
//! ```text
//! data type differs - base: integer, target: bigint; default differs - base: none, target: 0
//! ```
//!
//! Length, precision and scale are only reported when both sides carry a
//! positive value. When a length, precision or scale reported on one side is
//! the only thing that differs, it is described with its raw values instead:
//!
//! ```text
//! character max length differs - base: none, target: 20
//! ```

use crate::{DatabaseEndpoint, Difference, DifferenceKind, EndpointRef, PRIMARY_KEY_ITEM};
use pgcompare_schema::{
    ColumnDescriptor, IndexDescriptor, SchemaSnapshot, TableDescriptor, positive,
};

/// Compare `target` against `base`.
///
/// Every difference is tagged with both endpoint identities and the base
/// endpoint's schema name.
pub fn diff(
    base: &SchemaSnapshot,
    target: &SchemaSnapshot,
    base_endpoint: &DatabaseEndpoint,
    target_endpoint: &DatabaseEndpoint,
) -> Vec<Difference> {
    let mut cx = DiffContext {
        base: base_endpoint.identity(),
        target: target_endpoint.identity(),
        schema: base_endpoint.schema().to_string(),
        differences: Vec::new(),
    };

    for base_table in base.iter_tables() {
        match target.get_table(&base_table.name) {
            Some(target_table) => cx.diff_table(base_table, target_table),
            None => {
                let description = format!(
                    "table '{}' is missing in target '{}'",
                    base_table.name, cx.target.display_name
                );
                cx.push(
                    DifferenceKind::MissingTable,
                    &base_table.name,
                    &base_table.name,
                    description,
                    None,
                    None,
                );
            }
        }
    }

    for target_table in target.iter_tables() {
        if base.get_table(&target_table.name).is_none() {
            let description = format!(
                "table '{}' exists only in target '{}'",
                target_table.name, cx.target.display_name
            );
            cx.push(
                DifferenceKind::ExtraTable,
                &target_table.name,
                &target_table.name,
                description,
                None,
                None,
            );
        }
    }

    cx.differences
}

struct DiffContext {
    base: EndpointRef,
    target: EndpointRef,
    schema: String,
    differences: Vec<Difference>,
}

impl DiffContext {
    fn push(
        &mut self,
        kind: DifferenceKind,
        table: &str,
        item: &str,
        description: String,
        base_value: Option<String>,
        target_value: Option<String>,
    ) {
        self.differences.push(Difference {
            kind,
            base: self.base.clone(),
            target: self.target.clone(),
            schema_name: self.schema.clone(),
            table_name: table.to_string(),
            item_name: item.to_string(),
            description,
            base_value,
            target_value,
        });
    }

    /// Diff two tables with the same name.
    fn diff_table(&mut self, base: &TableDescriptor, target: &TableDescriptor) {
        self.diff_columns(base, target);
        self.diff_primary_key(base, target);
        self.diff_indexes(base, target);
    }

    fn diff_columns(&mut self, base: &TableDescriptor, target: &TableDescriptor) {
        for base_col in base.columns.values() {
            match target.column(&base_col.name) {
                None => {
                    let description = format!(
                        "column '{}' of table '{}' is missing in target '{}'",
                        base_col.name, base.name, self.target.display_name
                    );
                    self.push(
                        DifferenceKind::MissingColumn,
                        &base.name,
                        &base_col.name,
                        description,
                        Some(base_col.signature()),
                        None,
                    );
                }
                Some(target_col) if base_col != target_col => {
                    let clauses = column_clauses(base_col, target_col);
                    self.push(
                        DifferenceKind::ColumnDiff,
                        &base.name,
                        &base_col.name,
                        clauses.join("; "),
                        Some(base_col.signature()),
                        Some(target_col.signature()),
                    );
                }
                Some(_) => {}
            }
        }

        for target_col in target.columns.values() {
            if base.column(&target_col.name).is_none() {
                let description = format!(
                    "column '{}' of table '{}' exists only in target '{}'",
                    target_col.name, base.name, self.target.display_name
                );
                self.push(
                    DifferenceKind::ExtraColumn,
                    &base.name,
                    &target_col.name,
                    description,
                    None,
                    Some(target_col.signature()),
                );
            }
        }
    }

    fn diff_primary_key(&mut self, base: &TableDescriptor, target: &TableDescriptor) {
        if base.primary_key == target.primary_key {
            return;
        }

        let base_keys = base.primary_key_display();
        let target_keys = target.primary_key_display();
        let description = format!(
            "primary key differs - base: [{}], target: [{}]",
            base_keys, target_keys
        );
        self.push(
            DifferenceKind::PrimaryKeyDiff,
            &base.name,
            PRIMARY_KEY_ITEM,
            description,
            Some(base_keys),
            Some(target_keys),
        );
    }

    fn diff_indexes(&mut self, base: &TableDescriptor, target: &TableDescriptor) {
        for base_idx in base.indexes.values() {
            match target.index(&base_idx.name) {
                None => {
                    let description = format!(
                        "index '{}' on table '{}' is missing in target '{}' ({})",
                        base_idx.name,
                        base.name,
                        self.target.display_name,
                        index_details(base_idx)
                    );
                    self.push(
                        DifferenceKind::MissingIndex,
                        &base.name,
                        &base_idx.name,
                        description,
                        Some(base_idx.signature()),
                        None,
                    );
                }
                Some(target_idx) if base_idx != target_idx => {
                    self.push(
                        DifferenceKind::IndexDiff,
                        &base.name,
                        &base_idx.name,
                        index_clauses(base_idx, target_idx).join("; "),
                        Some(base_idx.signature()),
                        Some(target_idx.signature()),
                    );
                }
                Some(_) => {}
            }
        }

        for target_idx in target.indexes.values() {
            if base.index(&target_idx.name).is_none() {
                let description = format!(
                    "index '{}' on table '{}' exists only in target '{}' ({})",
                    target_idx.name,
                    base.name,
                    self.target.display_name,
                    index_details(target_idx)
                );
                self.push(
                    DifferenceKind::ExtraIndex,
                    &base.name,
                    &target_idx.name,
                    description,
                    None,
                    Some(target_idx.signature()),
                );
            }
        }
    }
}

/// Describe each differing column sub-field, in fixed order.
fn column_clauses(base: &ColumnDescriptor, target: &ColumnDescriptor) -> Vec<String> {
    let mut clauses = Vec::new();

    if base.data_type != target.data_type {
        clauses.push(format!(
            "data type differs - base: {}, target: {}",
            base.data_type, target.data_type
        ));
    }

    if base.nullable != target.nullable {
        clauses.push(format!(
            "nullability differs - base: {}, target: {}",
            nullability(base.nullable),
            nullability(target.nullable)
        ));
    }

    if base.default != target.default {
        clauses.push(format!(
            "default differs - base: {}, target: {}",
            base.default.as_deref().unwrap_or("none"),
            target.default.as_deref().unwrap_or("none")
        ));
    }

    let sized = [
        (
            "character max length",
            base.character_max_length,
            target.character_max_length,
        ),
        (
            "numeric precision",
            base.numeric_precision,
            target.numeric_precision,
        ),
        ("numeric scale", base.numeric_scale, target.numeric_scale),
    ];
    let mut one_sided = Vec::new();
    for (label, b, t) in sized {
        match (positive(b), positive(t)) {
            (Some(b), Some(t)) => {
                if b != t {
                    clauses.push(format!("{} differs - base: {}, target: {}", label, b, t));
                }
            }
            _ if b != t => one_sided.push(format!(
                "{} differs - base: {}, target: {}",
                label,
                size(b),
                size(t)
            )),
            _ => {}
        }
    }

    // Unequal descriptors always get a description, even when the only
    // differences are sizes reported on one side.
    if clauses.is_empty() {
        clauses = one_sided;
    }

    clauses
}

fn size(value: Option<i32>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

/// Describe each differing index sub-field: uniqueness, columns, included
/// columns, method.
fn index_clauses(base: &IndexDescriptor, target: &IndexDescriptor) -> Vec<String> {
    let mut clauses = Vec::new();

    if base.unique != target.unique {
        clauses.push(format!(
            "uniqueness differs - base: {}, target: {}",
            uniqueness(base.unique),
            uniqueness(target.unique)
        ));
    }

    if base.columns != target.columns {
        clauses.push(format!(
            "columns differ - base: [{}], target: [{}]",
            base.columns.join(", "),
            target.columns.join(", ")
        ));
    }

    if base.include != target.include {
        clauses.push(format!(
            "included columns differ - base: [{}], target: [{}]",
            base.include.join(", "),
            target.include.join(", ")
        ));
    }

    if base.method != target.method {
        clauses.push(format!(
            "method differs - base: {}, target: {}",
            base.method, target.method
        ));
    }

    clauses
}

fn index_details(index: &IndexDescriptor) -> String {
    let mut details = format!("columns: {}", index.columns.join(", "));
    if !index.include.is_empty() {
        details.push_str(&format!(", include: {}", index.include.join(", ")));
    }
    details.push_str(&format!(
        ", method: {}, unique: {}",
        index.method,
        if index.unique { "yes" } else { "no" }
    ));
    details
}

fn nullability(nullable: bool) -> &'static str {
    if nullable { "NULL" } else { "NOT NULL" }
}

fn uniqueness(unique: bool) -> &'static str {
    if unique { "unique" } else { "non-unique" }
}
