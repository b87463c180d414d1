use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// ----- OperationKind ---------------------------------------------------------

/// The closed set of things an operation can be: one statement-execution
/// variant plus the metadata-discovery family. Dispatched through a single
/// run path; there is no open-ended hierarchy to extend at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationKind {
    ExecuteStatement {
        statement: String,
    },
    GetCatalogs,
    GetSchemas {
        catalog: Option<String>,
        schema_pattern: Option<String>,
    },
    GetTables {
        catalog: Option<String>,
        schema_pattern: Option<String>,
        table_pattern: Option<String>,
        table_types: Vec<String>,
    },
    GetColumns {
        catalog: Option<String>,
        schema_pattern: Option<String>,
        table_pattern: Option<String>,
        column_pattern: Option<String>,
    },
    GetFunctions {
        catalog: Option<String>,
        schema_pattern: Option<String>,
        function_pattern: Option<String>,
    },
    GetTypeInfo,
    GetTableTypes,
}

// -----------------------------------------------------------------------------
// ----- OperationKind: Public -------------------------------------------------

impl OperationKind {
    pub fn is_statement(&self) -> bool {
        matches!(self, OperationKind::ExecuteStatement { .. })
    }

    pub fn describe(&self) -> &'static str {
        match self {
            OperationKind::ExecuteStatement { .. } => "execute_statement",
            OperationKind::GetCatalogs => "get_catalogs",
            OperationKind::GetSchemas { .. } => "get_schemas",
            OperationKind::GetTables { .. } => "get_tables",
            OperationKind::GetColumns { .. } => "get_columns",
            OperationKind::GetFunctions { .. } => "get_functions",
            OperationKind::GetTypeInfo => "get_type_info",
            OperationKind::GetTableTypes => "get_table_types",
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
