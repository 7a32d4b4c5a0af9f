//! Aggregated outcome of one stored procedure call

use serde::Serialize;
use serde_json::{Map, Value};

use crate::session::ColumnMetadata;

/// Column name to value, in the order the session reported the columns.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub type_name: String,
}

impl From<ColumnMetadata> for Column {
    fn from(meta: ColumnMetadata) -> Self {
        Self {
            name: meta.col_name,
            type_name: meta.type_name,
        }
    }
}

/// Output parameters, column layout and rows of a completed call.
///
/// Rows appear in the order the session reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallResult {
    pub output_parameters: Map<String, Value>,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl CallResult {
    /// Value of an output parameter, if the session returned one.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.output_parameters.get(name)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
