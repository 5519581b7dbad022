use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};
use typed_generational_arena::{Arena, IgnoreGeneration, Index};

pub mod column_map;
pub mod table_map;

pub use column_map::{BindType, ColumnMap, ColumnType};
pub use table_map::TableMap;

pub type SerializableSlab<T> = Arena<T, usize, IgnoreGeneration>;
pub type TableId = Index<TableMap, usize, IgnoreGeneration>;

/// A stable handle to a column: the owning table's arena index plus the
/// column's position within that table. Column expressions carry this
/// instead of a pointer into the schema.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnId {
    pub table_id: TableId,
    pub column_index: usize,
}

/// The schema map: every mapped table of one database, addressable by model
/// name or SQL name.
#[derive(Serialize, Deserialize, Default)]
pub struct DatabaseMap {
    tables: SerializableSlab<TableMap>,
}

impl DatabaseMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&mut self, table: TableMap) -> TableId {
        self.tables.insert(table)
    }

    pub fn get_table(&self, id: TableId) -> &TableMap {
        &self.tables[id]
    }

    pub fn get_column(&self, id: ColumnId) -> &ColumnMap {
        &self.tables[id.table_id].columns[id.column_index]
    }

    /// Look up a table by its model name or its SQL name.
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.tables.iter().find_map(|(id, table)| {
            (table.model_name == name || table.name == name).then_some(id)
        })
    }

    pub fn column_id(&self, table_id: TableId, column_name: &str) -> Option<ColumnId> {
        self.tables[table_id]
            .find_column(column_name)
            .and_then(|c| self.tables[table_id].column_index(&c.name))
            .map(|column_index| ColumnId {
                table_id,
                column_index,
            })
    }

    pub fn tables(&self) -> &SerializableSlab<TableMap> {
        &self.tables
    }
}

impl Debug for DatabaseMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (id, table) in self.tables.iter() {
            writeln!(f, "{}: {}", id.arr_idx(), table.name)?;
            for (index, column) in table.columns.iter().enumerate() {
                writeln!(f, "  {}: {:?}", index, column)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use super::*;

    /// A two-table schema shared by resolver, filter, and builder tests.
    pub(crate) fn library_schema() -> Arc<DatabaseMap> {
        let mut schema = DatabaseMap::new();

        schema.insert_table(TableMap {
            name: "book".to_string(),
            model_name: "Book".to_string(),
            columns: vec![
                column("book", "id", "Id", ColumnType::Integer),
                column("book", "title", "Title", ColumnType::Varchar { length: Some(255) }),
                column("book", "author_id", "AuthorId", ColumnType::Integer),
                column("book", "price", "Price", ColumnType::Double),
            ],
        });

        schema.insert_table(TableMap {
            name: "author".to_string(),
            model_name: "Author".to_string(),
            columns: vec![
                column("author", "id", "Id", ColumnType::Integer),
                column("author", "last_name", "LastName", ColumnType::Varchar { length: Some(128) }),
            ],
        });

        Arc::new(schema)
    }

    fn column(table: &str, name: &str, field: &str, typ: ColumnType) -> ColumnMap {
        ColumnMap {
            name: name.to_string(),
            field_name: field.to_string(),
            table_name: table.to_string(),
            typ,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::library_schema;

    #[test]
    fn table_lookup_by_either_name() {
        let schema = library_schema();
        let by_model = schema.table_id("Book").unwrap();
        let by_sql = schema.table_id("book").unwrap();
        assert_eq!(by_model, by_sql);
        assert!(schema.table_id("Publisher").is_none());
    }

    #[test]
    fn column_handles() {
        let schema = library_schema();
        let book = schema.table_id("Book").unwrap();
        let title = schema.column_id(book, "Title").unwrap();
        assert_eq!(schema.get_column(title).name, "title");

        // SQL name resolves to the same handle
        assert_eq!(schema.column_id(book, "title").unwrap(), title);
        assert!(schema.column_id(book, "subtitle").is_none());
    }

    #[test]
    fn schema_serialization_round_trip() {
        let schema = library_schema();
        let json = serde_json::to_string(&*schema).unwrap();
        let restored: super::DatabaseMap = serde_json::from_str(&json).unwrap();

        let book = restored.table_id("Book").unwrap();
        assert_eq!(restored.get_table(book).columns.len(), 4);
        assert_eq!(restored.column_id(book, "Price"), schema.column_id(book, "Price"));
    }
}
