// 🗄️ Record Store - relational persistence behind one trait
// SQLite (WAL) for real runs, an in-memory store for tests and dry runs

use crate::config::ColumnType;
use crate::error::{InventoryError, Result};
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use rusqlite::{params, params_from_iter, Connection};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::debug;

// ============================================================================
// SCHEMA & VALUES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: &str, columns: &[(&str, ColumnType)]) -> Self {
        TableSchema {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(column, column_type)| ColumnDef {
                    name: column.to_string(),
                    column_type: *column_type,
                })
                .collect(),
        }
    }

    /// Schema where every column is TEXT
    pub fn text(name: &str, columns: &[&str]) -> Self {
        let typed: Vec<(&str, ColumnType)> =
            columns.iter().map(|c| (*c, ColumnType::Text)).collect();
        TableSchema::new(name, &typed)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A single stored value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Int(i64),
    Real(f64),
}

impl Cell {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// SQLite collation order: numbers (compared by value) before text
    pub fn sort_cmp(&self, other: &Cell) -> Ordering {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.to_string().cmp(&other.to_string()),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Real(r) => Some(*r),
            Cell::Text(_) => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{}", r),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Int(value as i64)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Real(value)
    }
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Text(s) => ToSqlOutput::from(s.as_str()),
            Cell::Int(i) => ToSqlOutput::from(*i),
            Cell::Real(r) => ToSqlOutput::from(*r),
        })
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Text(String::new()),
            Value::Integer(i) => Cell::Int(i),
            Value::Real(r) => Cell::Real(r),
            Value::Text(s) => Cell::Text(s),
            Value::Blob(b) => Cell::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

/// Equality predicate for grouped queries
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Cell,
}

impl Filter {
    pub fn equals(column: &str, value: impl Into<Cell>) -> Self {
        Filter {
            column: column.to_string(),
            value: value.into(),
        }
    }
}

/// One row of a GROUP BY ... COUNT(*) result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub key: Vec<Cell>,
    pub count: i64,
}

/// `column = to` wherever `column = from`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub column: String,
    pub from: String,
    pub to: String,
}

impl Replacement {
    pub fn new(column: &str, from: &str, to: &str) -> Self {
        Replacement {
            column: column.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Every row must carry exactly one value per listed column
fn check_row_widths(table: &str, columns: &[&str], rows: &[Vec<Cell>]) -> Result<()> {
    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(InventoryError::RowWidth {
                table: table.to_string(),
                row: index + 1,
                expected: columns.len(),
                found: row.len(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// RECORD STORE TRAIT
// ============================================================================

pub trait RecordStore {
    fn create_table(&mut self, schema: &TableSchema) -> Result<()>;

    /// Drop a table; dropping a missing table is not an error
    fn drop_table(&mut self, table: &str) -> Result<()>;

    fn table_exists(&self, table: &str) -> Result<bool>;

    /// Insert rows atomically. Columns not listed are stored empty; a row
    /// whose width differs from `columns` rejects the whole batch.
    fn insert_rows(&mut self, table: &str, columns: &[&str], rows: &[Vec<Cell>]) -> Result<usize>;

    /// Apply replacements in order, all or nothing. Returns rows changed.
    fn replace_values(&mut self, table: &str, replacements: &[Replacement]) -> Result<usize>;

    fn replace_value(&mut self, table: &str, column: &str, from: &str, to: &str) -> Result<usize> {
        self.replace_values(table, &[Replacement::new(column, from, to)])
    }

    /// Count rows grouped by `group_by`, ordered by key. With no grouping
    /// columns the result is a single group holding the total.
    fn group_count(
        &self,
        table: &str,
        group_by: &[&str],
        filter: Option<&Filter>,
    ) -> Result<Vec<GroupCount>>;

    fn count_rows(&self, table: &str) -> Result<i64> {
        Ok(self
            .group_count(table, &[], None)?
            .iter()
            .map(|g| g.count)
            .sum())
    }

    /// Number of distinct value tuples over `columns`
    fn distinct_count(&self, table: &str, columns: &[&str]) -> Result<i64> {
        Ok(self.group_count(table, columns, None)?.len() as i64)
    }

    /// Drop (if present) and recreate a table
    fn reset_table(&mut self, schema: &TableSchema) -> Result<()> {
        if self.table_exists(&schema.name)? {
            self.drop_table(&schema.name)?;
            debug!(table = %schema.name, "dropped table");
        }
        self.create_table(schema)
    }
}

// ============================================================================
// SQLITE STORE
// ============================================================================

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) an on-disk database with WAL journaling
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(SqliteStore {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordStore for SqliteStore {
    fn create_table(&mut self, schema: &TableSchema) -> Result<()> {
        if self.table_exists(&schema.name)? {
            return Err(InventoryError::TableExists(schema.name.clone()));
        }

        let columns = schema
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql()))
            .collect::<Vec<_>>()
            .join(", ");

        self.conn.execute(
            &format!("CREATE TABLE {} ({})", quote_ident(&schema.name), columns),
            [],
        )?;
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> Result<()> {
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), [])?;
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert_rows(&mut self, table: &str, columns: &[&str], rows: &[Vec<Cell>]) -> Result<usize> {
        if !self.table_exists(table)? {
            return Err(InventoryError::UnknownTable(table.to_string()));
        }
        check_row_widths(table, columns, rows)?;

        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            quote_list(columns),
            placeholders
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        Ok(rows.len())
    }

    fn replace_values(&mut self, table: &str, replacements: &[Replacement]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut changed = 0;
        for r in replacements {
            changed += tx.execute(
                &format!(
                    "UPDATE {table} SET {col} = ?1 WHERE {col} = ?2",
                    table = quote_ident(table),
                    col = quote_ident(&r.column)
                ),
                params![r.to, r.from],
            )?;
        }
        tx.commit()?;
        Ok(changed)
    }

    fn group_count(
        &self,
        table: &str,
        group_by: &[&str],
        filter: Option<&Filter>,
    ) -> Result<Vec<GroupCount>> {
        let mut sql = if group_by.is_empty() {
            format!("SELECT COUNT(*) FROM {}", quote_ident(table))
        } else {
            format!(
                "SELECT {}, COUNT(*) FROM {}",
                quote_list(group_by),
                quote_ident(table)
            )
        };
        if let Some(filter) = filter {
            sql.push_str(&format!(" WHERE {} = ?1", quote_ident(&filter.column)));
        }
        if !group_by.is_empty() {
            let keys = quote_list(group_by);
            sql.push_str(&format!(" GROUP BY {keys} ORDER BY {keys}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let width = group_by.len();
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<GroupCount> {
            let mut key = Vec::with_capacity(width);
            for i in 0..width {
                let value: Value = row.get(i)?;
                key.push(Cell::from(value));
            }
            Ok(GroupCount {
                key,
                count: row.get(width)?,
            })
        };

        let groups = match filter {
            Some(filter) => stmt
                .query_map(params![filter.value], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };

        Ok(groups)
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Group key ordered column by column with `Cell::sort_cmp`
#[derive(Debug, Clone)]
struct GroupKey(Vec<Cell>);

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.sort_cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.0.len().cmp(&other.0.len()))
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl MemoryTable {
    fn position(&self, table: &str, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| InventoryError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
    }
}

/// Store backed by plain vectors; same observable behavior as `SqliteStore`
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<String, MemoryTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, table: &str) -> Result<&MemoryTable> {
        self.tables
            .get(table)
            .ok_or_else(|| InventoryError::UnknownTable(table.to_string()))
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemoryTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| InventoryError::UnknownTable(table.to_string()))
    }
}

impl RecordStore for MemoryStore {
    fn create_table(&mut self, schema: &TableSchema) -> Result<()> {
        if self.tables.contains_key(&schema.name) {
            return Err(InventoryError::TableExists(schema.name.clone()));
        }
        self.tables.insert(
            schema.name.clone(),
            MemoryTable {
                columns: schema.columns.iter().map(|c| c.name.clone()).collect(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> Result<()> {
        self.tables.remove(table);
        Ok(())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.tables.contains_key(table))
    }

    fn insert_rows(&mut self, table: &str, columns: &[&str], rows: &[Vec<Cell>]) -> Result<usize> {
        let target = self.table_mut(table)?;
        let positions = columns
            .iter()
            .map(|c| target.position(table, c))
            .collect::<Result<Vec<_>>>()?;
        check_row_widths(table, columns, rows)?;

        let width = target.columns.len();
        let mut staged = Vec::with_capacity(rows.len());
        for row in rows {
            let mut stored = vec![Cell::Text(String::new()); width];
            for (cell, &pos) in row.iter().zip(&positions) {
                stored[pos] = cell.clone();
            }
            staged.push(stored);
        }

        target.rows.extend(staged);
        Ok(rows.len())
    }

    fn replace_values(&mut self, table: &str, replacements: &[Replacement]) -> Result<usize> {
        let target = self.table_mut(table)?;
        let positions = replacements
            .iter()
            .map(|r| target.position(table, &r.column))
            .collect::<Result<Vec<_>>>()?;

        let mut changed = 0;
        for (r, &pos) in replacements.iter().zip(&positions) {
            for row in target.rows.iter_mut() {
                if matches!(&row[pos], Cell::Text(s) if *s == r.from) {
                    row[pos] = Cell::from(r.to.as_str());
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    fn group_count(
        &self,
        table: &str,
        group_by: &[&str],
        filter: Option<&Filter>,
    ) -> Result<Vec<GroupCount>> {
        let source = self.table(table)?;
        let key_positions = group_by
            .iter()
            .map(|c| source.position(table, c))
            .collect::<Result<Vec<_>>>()?;
        let filter_position = match filter {
            Some(f) => Some((source.position(table, &f.column)?, &f.value)),
            None => None,
        };

        let mut groups: BTreeMap<GroupKey, i64> = BTreeMap::new();
        let mut total = 0;

        for row in &source.rows {
            if let Some((pos, value)) = filter_position {
                if &row[pos] != value {
                    continue;
                }
            }
            total += 1;

            let key = GroupKey(key_positions.iter().map(|&p| row[p].clone()).collect());
            *groups.entry(key).or_insert(0) += 1;
        }

        if group_by.is_empty() {
            return Ok(vec![GroupCount {
                key: Vec::new(),
                count: total,
            }]);
        }

        Ok(groups
            .into_iter()
            .map(|(key, count)| GroupCount { key: key.0, count })
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================
