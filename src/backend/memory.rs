use parking_lot::RwLock;
use std::{collections::BTreeMap, time::Duration};

use crate::results::{ColumnType, Row, RowSet, Schema, Value};

use super::{BackendError, BackendResult, ExecContext, ExecutionBackend};

// -----------------------------------------------------------------------------
// ----- MemoryBackend ---------------------------------------------------------

/// Stand-in execution backend holding an in-memory catalog. Understands just
/// enough statement shapes (`CREATE TABLE`, `DROP TABLE`, `SHOW TABLES`,
/// `SLEEP <ms>`) to exercise the gateway end to end. Not a SQL engine.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<BTreeMap<String, TableDef>>,
}

#[derive(Debug, Clone)]
struct TableDef {
    columns: Vec<(String, String)>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

// -----------------------------------------------------------------------------
// ----- MemoryBackend: Statements ---------------------------------------------

impl MemoryBackend {
    fn create_table(&self, body: &str, ctx: &ExecContext) -> Result<BackendResult, BackendError> {
        let (name, columns) = parse_table_def(body)
            .ok_or_else(|| BackendError::Execution(format!("malformed CREATE TABLE: {body}")))?;

        let mut tables = self.tables.write();
        if tables.contains_key(&name) {
            return Err(BackendError::Execution(format!(
                "table '{name}' already exists"
            )));
        }

        ctx.log.push(format!("created table {name}"));
        tables.insert(name, TableDef { columns });

        Ok(BackendResult::empty())
    }

    fn drop_table(&self, name: &str, ctx: &ExecContext) -> Result<BackendResult, BackendError> {
        let name = name.trim().trim_end_matches(';').to_lowercase();

        if self.tables.write().remove(&name).is_none() {
            return Err(BackendError::Execution(format!("unknown table '{name}'")));
        }

        ctx.log.push(format!("dropped table {name}"));
        Ok(BackendResult::empty())
    }

    fn show_tables(&self) -> BackendResult {
        let rows: Vec<Row> = self
            .tables
            .read()
            .keys()
            .map(|name| vec![Value::Text(name.clone())])
            .collect();

        BackendResult {
            schema: Schema::new(vec![("tab_name", ColumnType::Text)]),
            rows: RowSet::new(rows),
        }
    }

    fn sleep(&self, arg: &str, ctx: &ExecContext) -> Result<BackendResult, BackendError> {
        let total_ms: u64 = arg
            .trim()
            .trim_end_matches(';')
            .parse()
            .map_err(|_| BackendError::Execution(format!("bad SLEEP duration: {arg}")))?;

        ctx.log.push(format!("sleeping {total_ms}ms"));

        // Sleep in slices so a cancel lands promptly.
        let mut remaining = total_ms;
        while remaining > 0 {
            if ctx.cancel.is_canceled() {
                ctx.log.push("sleep canceled");
                return Err(BackendError::Canceled);
            }
            let slice = remaining.min(10);
            std::thread::sleep(Duration::from_millis(slice));
            remaining -= slice;
        }

        Ok(BackendResult::empty())
    }
}

// -----------------------------------------------------------------------------
// ----- MemoryBackend: ExecutionBackend ---------------------------------------

impl ExecutionBackend for MemoryBackend {
    fn execute(&self, ctx: &ExecContext, statement: &str) -> Result<BackendResult, BackendError> {
        if ctx.cancel.is_canceled() {
            return Err(BackendError::Canceled);
        }

        let trimmed = statement.trim();
        // Ascii-only casefold so byte offsets line up with the original.
        let upper = trimmed.to_ascii_uppercase();

        if let Some(rest) = strip_keywords(trimmed, &upper, &["CREATE", "TABLE"]) {
            return self.create_table(rest, ctx);
        }
        if let Some(rest) = strip_keywords(trimmed, &upper, &["DROP", "TABLE"]) {
            return self.drop_table(rest, ctx);
        }
        if upper.trim_end_matches(';').trim() == "SHOW TABLES" {
            return Ok(self.show_tables());
        }
        if let Some(rest) = strip_keywords(trimmed, &upper, &["SLEEP"]) {
            return self.sleep(rest, ctx);
        }

        Err(BackendError::Unsupported(format!(
            "statement not understood by the memory backend: {trimmed}"
        )))
    }

    fn get_catalogs(&self, _ctx: &ExecContext) -> Result<BackendResult, BackendError> {
        Ok(BackendResult {
            schema: Schema::new(vec![("TABLE_CAT", ColumnType::Text)]),
            rows: RowSet::empty(),
        })
    }

    fn get_schemas(
        &self,
        _ctx: &ExecContext,
        _catalog: Option<&str>,
        schema_pattern: Option<&str>,
    ) -> Result<BackendResult, BackendError> {
        let rows = if pattern_matches(schema_pattern, "default") {
            vec![vec![Value::Text("default".into()), Value::Null]]
        } else {
            Vec::new()
        };

        Ok(BackendResult {
            schema: Schema::new(vec![
                ("TABLE_SCHEM", ColumnType::Text),
                ("TABLE_CATALOG", ColumnType::Text),
            ]),
            rows: RowSet::new(rows),
        })
    }

    fn get_tables(
        &self,
        _ctx: &ExecContext,
        _catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        table_types: &[String],
    ) -> Result<BackendResult, BackendError> {
        let type_ok = table_types.is_empty() || table_types.iter().any(|t| t == "TABLE");
        let schema_ok = pattern_matches(schema_pattern, "default");

        let rows: Vec<Row> = if type_ok && schema_ok {
            self.tables
                .read()
                .keys()
                .filter(|name| pattern_matches(table_pattern, name))
                .map(|name| {
                    vec![
                        Value::Null,
                        Value::Text("default".into()),
                        Value::Text(name.clone()),
                        Value::Text("TABLE".into()),
                        Value::Null,
                    ]
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(BackendResult {
            schema: tables_schema(),
            rows: RowSet::new(rows),
        })
    }

    fn get_columns(
        &self,
        _ctx: &ExecContext,
        _catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Result<BackendResult, BackendError> {
        let mut rows: Vec<Row> = Vec::new();

        if pattern_matches(schema_pattern, "default") {
            for (table, def) in self.tables.read().iter() {
                if !pattern_matches(table_pattern, table) {
                    continue;
                }
                for (pos, (column, type_name)) in def.columns.iter().enumerate() {
                    if !pattern_matches(column_pattern, column) {
                        continue;
                    }
                    rows.push(vec![
                        Value::Text("default".into()),
                        Value::Text(table.clone()),
                        Value::Text(column.clone()),
                        Value::Text(type_name.clone()),
                        Value::I64(pos as i64 + 1),
                    ]);
                }
            }
        }

        Ok(BackendResult {
            schema: Schema::new(vec![
                ("TABLE_SCHEM", ColumnType::Text),
                ("TABLE_NAME", ColumnType::Text),
                ("COLUMN_NAME", ColumnType::Text),
                ("TYPE_NAME", ColumnType::Text),
                ("ORDINAL_POSITION", ColumnType::I64),
            ]),
            rows: RowSet::new(rows),
        })
    }

    fn get_functions(
        &self,
        _ctx: &ExecContext,
        _catalog: Option<&str>,
        _schema_pattern: Option<&str>,
        _function_pattern: Option<&str>,
    ) -> Result<BackendResult, BackendError> {
        Ok(BackendResult {
            schema: Schema::new(vec![
                ("FUNCTION_SCHEM", ColumnType::Text),
                ("FUNCTION_NAME", ColumnType::Text),
            ]),
            rows: RowSet::empty(),
        })
    }

    fn get_type_info(&self, _ctx: &ExecContext) -> Result<BackendResult, BackendError> {
        let rows = ["BOOLEAN", "BIGINT", "DOUBLE", "STRING"]
            .iter()
            .map(|name| vec![Value::Text((*name).to_string())])
            .collect();

        Ok(BackendResult {
            schema: Schema::new(vec![("TYPE_NAME", ColumnType::Text)]),
            rows: RowSet::new(rows),
        })
    }

    fn get_table_types(&self, _ctx: &ExecContext) -> Result<BackendResult, BackendError> {
        Ok(BackendResult {
            schema: Schema::new(vec![("TABLE_TYPE", ColumnType::Text)]),
            rows: RowSet::new(vec![vec![Value::Text("TABLE".into())]]),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn tables_schema() -> Schema {
    Schema::new(vec![
        ("TABLE_CAT", ColumnType::Text),
        ("TABLE_SCHEM", ColumnType::Text),
        ("TABLE_NAME", ColumnType::Text),
        ("TABLE_TYPE", ColumnType::Text),
        ("REMARKS", ColumnType::Text),
    ])
}

/// Strips leading keywords (case-insensitive) and returns the remainder, or
/// None if the statement does not start with them.
fn strip_keywords<'a>(original: &'a str, upper: &str, keywords: &[&str]) -> Option<&'a str> {
    let mut offset = 0;
    for keyword in keywords {
        let rest = upper[offset..].trim_start();
        offset = upper.len() - rest.len();
        if !rest.starts_with(keyword) {
            return None;
        }
        offset += keyword.len();
    }
    // Keyword must be followed by whitespace, '(' or end of statement.
    match original[offset..].chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() || c == '(' => Some(&original[offset..]),
        Some(_) => None,
    }
}

/// `name(col TYPE, ...)` -> (name, columns). Lowercases identifiers.
fn parse_table_def(body: &str) -> Option<(String, Vec<(String, String)>)> {
    let body = body.trim().trim_end_matches(';').trim();
    let open = body.find('(')?;
    let close = body.rfind(')')?;
    if close <= open {
        return None;
    }

    let name = body[..open].trim().to_lowercase();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }

    let mut columns = Vec::new();
    for part in body[open + 1..close].split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let mut words = part.split_whitespace();
        let column = words.next()?.to_lowercase();
        let type_name = words.next().unwrap_or("STRING").to_uppercase();
        columns.push((column, type_name));
    }

    Some((name, columns))
}

fn pattern_matches(pattern: Option<&str>, value: &str) -> bool {
    match pattern {
        None => true,
        Some(p) if p.is_empty() || p == "%" || p == "*" => true,
        Some(p) => p.eq_ignore_ascii_case(value),
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CancelToken;
    use crate::operation::log::OperationLog;
    use std::collections::HashMap;

    fn ctx() -> ExecContext {
        ExecContext::new(HashMap::new(), OperationLog::new(), CancelToken::new())
    }

    #[test]
    fn create_then_show_tables() {
        let backend = MemoryBackend::new();

        backend
            .execute(&ctx(), "CREATE TABLE t(id INT)")
            .expect("create");

        let mut result = backend.execute(&ctx(), "SHOW TABLES").expect("show");
        let rows = result
            .rows
            .fetch(crate::results::FetchOrientation::Next, 100)
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Text("t".into())]]);
    }

    #[test]
    fn duplicate_create_fails() {
        let backend = MemoryBackend::new();
        backend.execute(&ctx(), "CREATE TABLE t(id INT)").unwrap();

        let err = backend
            .execute(&ctx(), "create table T(id int)")
            .unwrap_err();
        assert!(matches!(err, BackendError::Execution(_)));
    }

    #[test]
    fn drop_unknown_table_fails() {
        let backend = MemoryBackend::new();
        let err = backend.execute(&ctx(), "DROP TABLE ghost").unwrap_err();
        assert!(matches!(err, BackendError::Execution(_)));
    }

    #[test]
    fn unknown_statement_is_unsupported() {
        let backend = MemoryBackend::new();
        let err = backend.execute(&ctx(), "SELECT 1").unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));
    }

    #[test]
    fn sleep_observes_cancel() {
        let backend = MemoryBackend::new();
        let ctx = ctx();
        ctx.cancel.cancel();

        let err = backend.execute(&ctx, "SLEEP 10000").unwrap_err();
        assert_eq!(err, BackendError::Canceled);
    }

    #[test]
    fn get_columns_reports_table_layout() {
        let backend = MemoryBackend::new();
        backend
            .execute(&ctx(), "CREATE TABLE t(id INT, name STRING)")
            .unwrap();

        let mut result = backend
            .get_columns(&ctx(), None, None, Some("t"), None)
            .unwrap();
        let rows = result
            .rows
            .fetch(crate::results::FetchOrientation::Next, 100)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][2], Value::Text("id".into()));
        assert_eq!(rows[1][2], Value::Text("name".into()));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
