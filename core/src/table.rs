//! The projection table: one row per processed document with its 2D
//! coordinate, plus optional named numeric columns used for coloring.

use crate::{DocId, GalenError, Point};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub doc_id: DocId,
    pub paper_id: String,
    pub title: String,
    pub x: f32,
    pub y: f32,
}

impl TableRow {
    pub fn point(&self) -> Point {
        [self.x, self.y]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectionTable {
    rows: Vec<TableRow>,
    columns: BTreeMap<String, Vec<f32>>,
}

impl ProjectionTable {
    /// Build a table, checking that row `i` describes document `i`.
    pub fn new(rows: Vec<TableRow>) -> Result<Self> {
        let table = Self { rows, columns: BTreeMap::new() };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((i, row)) = self.rows.iter().enumerate().find(|(i, r)| r.doc_id as usize != *i) {
            return Err(GalenError::Misaligned(format!("table row {i} holds document {}", row.doc_id)).into());
        }
        for (name, values) in &self.columns {
            if values.len() != self.rows.len() {
                return Err(GalenError::ColumnLength { name: name.clone(), expected: self.rows.len(), got: values.len() }.into());
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn row(&self, doc_id: DocId) -> Option<&TableRow> {
        self.rows.get(doc_id as usize)
    }

    pub fn points(&self) -> Vec<Point> {
        self.rows.iter().map(TableRow::point).collect()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Result<&[f32]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| GalenError::UnknownColumn(name.to_string()).into())
    }

    /// Add or replace an auxiliary column; it must have one value per row.
    pub fn add_column(&mut self, name: impl Into<String>, values: Vec<f32>) -> Result<()> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(GalenError::ColumnLength { name, expected: self.rows.len(), got: values.len() }.into());
        }
        self.columns.insert(name, values);
        Ok(())
    }
}
