pub mod path;

use std::collections::HashSet;

use crate::error::Error;
use crate::model::{
    CellConfig, ColumnConfig, Dimension, LayoutConfig, RegionConfig, RowConfig, TableConfig,
};

pub fn load_layout(json: &str) -> Result<LayoutConfig, Error> {
    let layout: LayoutConfig = serde_json::from_str(json)?;
    validate_layout(&layout)?;
    Ok(layout)
}

/// Parse a table set: either a bare array of tables or `{"tables": [...]}`.
pub fn load_tables(json: &str) -> Result<Vec<TableConfig>, Error> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum TableSet {
        Bare(Vec<TableConfig>),
        Wrapped { tables: Vec<TableConfig> },
    }

    let tables = match serde_json::from_str::<TableSet>(json) {
        Ok(TableSet::Bare(t) | TableSet::Wrapped { tables: t }) => t,
        // Re-parse as a bare array so the error names the offending field
        // instead of serde's generic untagged-enum message.
        Err(_) => serde_json::from_str::<Vec<TableConfig>>(json)?,
    };
    validate_table_set(&tables)?;
    Ok(tables)
}

fn positive(value: f32, what: &str) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::Config(format!("{what} must be positive, got {value}")))
    }
}

fn non_negative(value: f32, what: &str) -> Result<(), Error> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::Config(format!("{what} must not be negative, got {value}")))
    }
}

fn validate_dimension(dim: Dimension, what: &str) -> Result<(), Error> {
    match dim.points() {
        Some(p) => non_negative(p, what),
        None => Ok(()),
    }
}

fn validate_cell(cell: &CellConfig, what: &str) -> Result<(), Error> {
    validate_dimension(cell.width, &format!("{what} width"))?;
    if let Some(size) = cell.font_size {
        positive(size, &format!("{what} font_size"))?;
    }
    Ok(())
}

fn validate_row(row: &RowConfig, what: &str) -> Result<(), Error> {
    validate_dimension(row.height, &format!("{what} height"))?;
    for (ci, cell) in row.cells.iter().enumerate() {
        validate_cell(cell, &format!("{what} cell {ci}"))?;
    }
    Ok(())
}

fn validate_region(region: &RegionConfig, what: &str) -> Result<(), Error> {
    non_negative(region.spacing, &format!("{what} spacing"))?;
    for (ri, row) in region.rows.iter().enumerate() {
        validate_row(row, &format!("{what} row {ri}"))?;
    }
    Ok(())
}

pub(crate) fn validate_layout(layout: &LayoutConfig) -> Result<(), Error> {
    let page = &layout.page;
    positive(page.width, "page width")?;
    positive(page.height, "page height")?;
    let m = &page.margins;
    for (value, what) in [
        (m.top, "top margin"),
        (m.bottom, "bottom margin"),
        (m.left, "left margin"),
        (m.right, "right margin"),
    ] {
        non_negative(value, what)?;
    }
    if page.content_width() <= 0.0 {
        return Err(Error::Config(format!(
            "left/right margins ({} + {}) leave no room on a {}pt wide page",
            m.left, m.right, page.width
        )));
    }
    if page.height - m.top - m.bottom <= 0.0 {
        return Err(Error::Config(format!(
            "top/bottom margins ({} + {}) leave no room on a {}pt tall page",
            m.top, m.bottom, page.height
        )));
    }

    let text = &layout.text;
    positive(text.font_size, "text font_size")?;
    positive(text.title_font_size, "text title_font_size")?;
    positive(text.line_spacing, "text line_spacing")?;
    non_negative(text.margin, "text margin")?;
    non_negative(text.padding, "text padding")?;
    non_negative(layout.table_spacing, "table_spacing")?;

    if let Some(header) = &layout.header {
        validate_region(header, "header")?;
    }
    if let Some(footer) = &layout.footer {
        validate_region(footer, "footer")?;
    }

    let mut seen = HashSet::new();
    for id in &layout.table_order {
        if !seen.insert(id.as_str()) {
            return Err(Error::Config(format!("table `{id}` listed twice in table_order")));
        }
    }
    Ok(())
}

fn validate_columns(id: &str, columns: &[ColumnConfig]) -> Result<(), Error> {
    if columns.is_empty() {
        return Err(Error::Config(format!("table `{id}` has no columns")));
    }
    for (ci, col) in columns.iter().enumerate() {
        validate_dimension(col.width, &format!("table `{id}` column {ci} width"))?;
        if let Some(size) = col.font_size {
            positive(size, &format!("table `{id}` column {ci} font_size"))?;
        }
    }
    Ok(())
}

fn validate_table(table: &TableConfig) -> Result<(), Error> {
    let id = table.id();
    if id.trim().is_empty() {
        return Err(Error::Config("table with empty id".into()));
    }
    match table {
        TableConfig::Fixed(t) => {
            validate_columns(id, &t.columns)?;
            for (ri, row) in t.rows.iter().enumerate() {
                validate_row(row, &format!("table `{id}` row {ri}"))?;
            }
        }
        TableConfig::Dynamic(t) => {
            validate_columns(id, &t.columns)?;
            validate_row(&t.row, &format!("table `{id}` row template"))?;
            if path::parse(&t.data_source).is_none() {
                return Err(Error::Config(format!(
                    "table `{id}` has an invalid data_source `{}`",
                    t.data_source
                )));
            }
        }
        TableConfig::SignatureGroup(t) => {
            if t.blocks.is_empty() {
                return Err(Error::Config(format!("signature table `{id}` has no blocks")));
            }
            for (bi, block) in t.blocks.iter().enumerate() {
                let what = format!("table `{id}` block {bi}");
                non_negative(block.x, &format!("{what} x"))?;
                non_negative(block.y, &format!("{what} y"))?;
                validate_dimension(block.width, &format!("{what} width"))?;
                for (ri, row) in block.rows.iter().enumerate() {
                    validate_dimension(row.height, &format!("{what} row {ri} height"))?;
                    for (ci, cell) in row.cells.iter().enumerate() {
                        validate_cell(cell, &format!("{what} row {ri} cell {ci}"))?;
                    }
                    if let Some(source) = &row.data_source
                        && path::parse(source).is_none()
                    {
                        return Err(Error::Config(format!(
                            "{what} row {ri} has an invalid data_source `{source}`"
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn validate_table_set(tables: &[TableConfig]) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for table in tables {
        validate_table(table)?;
        if !seen.insert(table.id()) {
            return Err(Error::Config(format!("duplicate table id `{}`", table.id())));
        }
    }
    Ok(())
}

/// Resolve the rendering order: `table_order` when given, else table-set order.
pub(crate) fn ordered_tables<'a>(
    layout: &LayoutConfig,
    tables: &'a [TableConfig],
) -> Result<Vec<&'a TableConfig>, Error> {
    if layout.table_order.is_empty() {
        return Ok(tables.iter().collect());
    }
    layout
        .table_order
        .iter()
        .map(|id| {
            tables
                .iter()
                .find(|t| t.id() == id)
                .ok_or_else(|| Error::Config(format!("table_order names unknown table `{id}`")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_defaults_fill_in() {
        let layout = load_layout("{}").unwrap();
        assert!((layout.page.width - 595.28).abs() < 0.01);
        assert_eq!(layout.text.font_size, 9.0);
        assert!(layout.fonts.regular.is_none());
        assert!(layout.table_order.is_empty());
    }

    #[test]
    fn impossible_margins_are_config_errors() {
        let err = load_layout(r#"{"page": {"width": 100, "height": 100,
            "margins": {"top": 10, "bottom": 10, "left": 60, "right": 60}}}"#)
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
    }

    #[test]
    fn malformed_json_is_json_error() {
        assert!(matches!(load_layout("{"), Err(Error::Json(_))));
        assert!(matches!(load_tables("[{\"type\": \"fixed\"}]"), Err(Error::Json(_))));
    }

    #[test]
    fn tables_parse_all_variants() {
        let tables = load_tables(
            r#"{"tables": [
                {"type": "fixed", "id": "approval", "title": "Approval",
                 "columns": [{"header": "Field", "width": 120}, {"header": "Value", "width": "auto"}],
                 "rows": [{"height": 20, "cells": [{"text": "Code"}, {"source": "document.code"}]}]},
                {"type": "dynamic", "id": "revision_history",
                 "columns": [{"header": "Rev"}], "row": {"cells": [{"source": "version"}]},
                 "data_source": "revisions"},
                {"type": "signature_group", "id": "signatures",
                 "blocks": [{"name": "review", "x": 0, "y": 0, "rows": [
                    {"data_source": "participants.reviewers",
                     "cells": [{"text": "Reviewer", "width": 90}, {"source": "name"}]}]}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(tables.len(), 3);
        assert!(matches!(tables[0], TableConfig::Fixed(_)));
        assert!(matches!(tables[1], TableConfig::Dynamic(_)));
        assert!(matches!(tables[2], TableConfig::SignatureGroup(_)));
        let TableConfig::Fixed(fixed) = &tables[0] else { unreachable!() };
        assert_eq!(fixed.columns[0].width, Dimension::Points(120.0));
        assert_eq!(fixed.columns[1].width, Dimension::default());
        assert!(fixed.rows[0].cells[0].borders.left);
    }

    #[test]
    fn tables_without_columns_are_rejected() {
        let err = load_tables(r#"[{"type": "fixed", "id": "x", "columns": []}]"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = load_tables(
            r#"[{"type": "fixed", "id": "a", "columns": [{"header": "A"}]},
                {"type": "fixed", "id": "a", "columns": [{"header": "B"}]}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unknown_table_in_order_is_rejected() {
        let layout = LayoutConfig {
            table_order: vec!["missing".into()],
            ..Default::default()
        };
        let tables = load_tables(
            r#"[{"type": "fixed", "id": "approval", "columns": [{"header": "A"}]}]"#,
        )
        .unwrap();
        assert!(matches!(ordered_tables(&layout, &tables), Err(Error::Config(_))));
    }
}
