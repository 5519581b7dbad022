use serde::{Deserialize, Serialize};

use super::column_map::ColumnMap;

/// A mapped table: the SQL table name, the model name it is addressed by in
/// query identifiers (e.g. `Book` for `book`), and its columns.
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct TableMap {
    pub name: String,
    pub model_name: String,
    pub columns: Vec<ColumnMap>,
}

/// The derived implementation of `Debug` is quite verbose, so we implement
/// it manually to print the table name only.
impl std::fmt::Debug for TableMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Table: ")?;
        f.write_str(&self.name)
    }
}

impl TableMap {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Find a column by its canonical SQL name, tolerating the casing
    /// variants query identifiers arrive in: an exact match first, then the
    /// lowercased and uppercased forms.
    pub fn find_column_by_name(&self, name: &str) -> Option<&ColumnMap> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| {
                let lowered = name.to_lowercase();
                self.columns.iter().find(|c| c.name == lowered)
            })
            .or_else(|| {
                let uppered = name.to_uppercase();
                self.columns.iter().find(|c| c.name == uppered)
            })
    }

    pub fn column_by_field_name(&self, field_name: &str) -> Option<&ColumnMap> {
        self.columns.iter().find(|c| c.field_name == field_name)
    }

    pub fn has_column_by_field_name(&self, field_name: &str) -> bool {
        self.column_by_field_name(field_name).is_some()
    }

    /// Find a column addressed either by its field name or by its SQL name.
    pub fn find_column(&self, name: &str) -> Option<&ColumnMap> {
        self.column_by_field_name(name)
            .or_else(|| self.find_column_by_name(name))
    }
}
