use serde::{Deserialize, Serialize};

use crate::errors::{GatewayError, GatewayResult};

// -----------------------------------------------------------------------------
// ----- Value -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
}

pub type Row = Vec<Value>;

// -----------------------------------------------------------------------------
// ----- Schema ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bool,
    I64,
    F64,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDesc {
    pub name: String,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnDesc>,
}

impl Schema {
    pub fn new(columns: Vec<(&str, ColumnType)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, column_type)| ColumnDesc {
                    name: name.to_string(),
                    column_type,
                })
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

// -----------------------------------------------------------------------------
// ----- FetchOrientation ------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOrientation {
    Next,
    Restart,
}

// -----------------------------------------------------------------------------
// ----- RowSet ----------------------------------------------------------------

/// Buffered, forward-only result of a finished operation. Fetches hand out
/// whole rows only; an exhausted set yields an empty page, not an error.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    rows: Vec<Row>,
    cursor: usize,
    rewindable: bool,
}

// -----------------------------------------------------------------------------
// ----- RowSet: Static --------------------------------------------------------

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            cursor: 0,
            rewindable: true,
        }
    }

    /// A set whose producer cannot restart (streaming cursor upstream).
    pub fn forward_only(rows: Vec<Row>) -> Self {
        Self {
            rows,
            cursor: 0,
            rewindable: false,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

// -----------------------------------------------------------------------------
// ----- RowSet: Public --------------------------------------------------------

impl RowSet {
    pub fn fetch(
        &mut self,
        orientation: FetchOrientation,
        max_rows: usize,
    ) -> GatewayResult<Vec<Row>> {
        match orientation {
            FetchOrientation::Next => {}
            FetchOrientation::Restart => {
                if !self.rewindable {
                    return Err(GatewayError::Unsupported(
                        "result set cannot be rewound".to_string(),
                    ));
                }
                self.cursor = 0;
            }
        }

        // max_rows comes straight off the wire; the add must not overflow.
        let end = self.rows.len().min(self.cursor.saturating_add(max_rows));
        let page = self.rows[self.cursor..end].to_vec();
        self.cursor = end;

        Ok(page)
    }

    pub fn has_more(&self) -> bool {
        self.cursor < self.rows.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn text_rows(names: &[&str]) -> Vec<Row> {
        names
            .iter()
            .map(|n| vec![Value::Text(n.to_string())])
            .collect()
    }

    #[test]
    fn fetch_respects_max_rows_and_pages_forward() {
        let mut set = RowSet::new(text_rows(&["a", "b", "c"]));

        let first = set.fetch(FetchOrientation::Next, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert!(set.has_more());

        let second = set.fetch(FetchOrientation::Next, 2).unwrap();
        assert_eq!(second, text_rows(&["c"]));
        assert!(!set.has_more());
    }

    #[test]
    fn exhausted_set_yields_empty_page() {
        let mut set = RowSet::new(text_rows(&["a"]));
        set.fetch(FetchOrientation::Next, 10).unwrap();

        let page = set.fetch(FetchOrientation::Next, 10).unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn huge_max_rows_after_partial_fetch_is_safe() {
        let mut set = RowSet::new(text_rows(&["a", "b"]));
        set.fetch(FetchOrientation::Next, 1).unwrap();

        let rest = set.fetch(FetchOrientation::Next, usize::MAX).unwrap();
        assert_eq!(rest, text_rows(&["b"]));
        assert!(!set.has_more());
    }

    #[test]
    fn restart_rewinds_when_allowed() {
        let mut set = RowSet::new(text_rows(&["a", "b"]));
        set.fetch(FetchOrientation::Next, 2).unwrap();

        let again = set.fetch(FetchOrientation::Restart, 2).unwrap();
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn restart_on_forward_only_set_is_unsupported() {
        let mut set = RowSet::forward_only(text_rows(&["a"]));

        assert!(matches!(
            set.fetch(FetchOrientation::Restart, 1),
            Err(GatewayError::Unsupported(_))
        ));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
