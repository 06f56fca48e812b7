//! Schema registry: symbolic identifiers to physical table and enum names.
//!
//! Application code addresses tables and enum types by a stable key. The
//! registry maps each key to its current physical name and DDL; the
//! physical name may change at runtime (rename) while the key never does.
//!
//! Keys are generic. Applications normally use a closed `enum`:
//!
//! ```rust
//! use cms_db::SchemaRegistry;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Table {
//!     Root,
//!     Users,
//! }
//!
//! let schema = SchemaRegistry::new();
//! schema.register_table(Table::Root, "cms_root", "id SERIAL PRIMARY KEY");
//! assert_eq!(schema.table_name(&Table::Root).as_deref(), Some("cms_root"));
//! assert_eq!(schema.table_name(&Table::Users), None);
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use parking_lot::RwLock;

/// A key usable as a schema identifier.
///
/// Implemented for every cloneable, hashable, debuggable type, so both
/// application enums and `&'static str` work.
pub trait SchemaKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> SchemaKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// A registered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Current physical table name.
    pub name: String,
    /// Column list used in `CREATE TABLE`.
    pub fields: String,
}

/// A registered enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    /// Physical type name.
    pub name: String,
    /// Enumerator literals, in declaration order.
    pub values: Vec<String>,
}

/// Thread-safe registry of tables and enum types.
pub struct SchemaRegistry<K> {
    inner: RwLock<Entries<K>>,
}

struct Entries<K> {
    tables: HashMap<K, TableDef>,
    table_order: Vec<K>,
    enums: HashMap<K, EnumDef>,
    enum_order: Vec<K>,
}

impl<K: SchemaKey> SchemaRegistry<K> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Entries {
                tables: HashMap::new(),
                table_order: Vec::new(),
                enums: HashMap::new(),
                enum_order: Vec::new(),
            }),
        }
    }

    /// Register a table, replacing any previous entry for `id`.
    pub fn register_table(&self, id: K, name: impl Into<String>, fields: impl Into<String>) {
        let def = TableDef {
            name: name.into(),
            fields: fields.into(),
        };
        tracing::debug!(?id, name = %def.name, "registering table");

        let mut inner = self.inner.write();
        if inner.tables.insert(id.clone(), def).is_none() {
            inner.table_order.push(id);
        }
    }

    /// Register an enum type, replacing any previous entry for `id`.
    pub fn register_enum<I, S>(&self, id: K, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let def = EnumDef {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        };
        tracing::debug!(?id, name = %def.name, values = def.values.len(), "registering enum");

        let mut inner = self.inner.write();
        if inner.enums.insert(id.clone(), def).is_none() {
            inner.enum_order.push(id);
        }
    }

    /// Current physical name of a table.
    #[must_use]
    pub fn table_name(&self, id: &K) -> Option<String> {
        self.inner.read().tables.get(id).map(|t| t.name.clone())
    }

    /// Column DDL of a table.
    #[must_use]
    pub fn table_fields(&self, id: &K) -> Option<String> {
        self.inner.read().tables.get(id).map(|t| t.fields.clone())
    }

    /// Full table definition.
    #[must_use]
    pub fn table(&self, id: &K) -> Option<TableDef> {
        self.inner.read().tables.get(id).cloned()
    }

    /// Physical name of an enum type.
    #[must_use]
    pub fn enum_name(&self, id: &K) -> Option<String> {
        self.inner.read().enums.get(id).map(|e| e.name.clone())
    }

    /// Enumerator literals of an enum type.
    #[must_use]
    pub fn enum_values(&self, id: &K) -> Option<Vec<String>> {
        self.inner.read().enums.get(id).map(|e| e.values.clone())
    }

    /// Full enum definition.
    #[must_use]
    pub fn enum_def(&self, id: &K) -> Option<EnumDef> {
        self.inner.read().enums.get(id).cloned()
    }

    /// Change the stored physical name of a registered table.
    ///
    /// Only the registry changes; use
    /// [`ConnectionManager::rename_table`](crate::ConnectionManager::rename_table)
    /// to rename the backing table as well. Returns `false` if `id` is not
    /// registered.
    pub fn set_table_name(&self, id: &K, name: impl Into<String>) -> bool {
        match self.inner.write().tables.get_mut(id) {
            Some(table) => {
                table.name = name.into();
                tracing::debug!(?id, name = %table.name, "table renamed in registry");
                true
            }
            None => false,
        }
    }

    /// Change the stored column DDL of a registered table.
    ///
    /// Returns `false` if `id` is not registered.
    pub fn set_table_fields(&self, id: &K, fields: impl Into<String>) -> bool {
        match self.inner.write().tables.get_mut(id) {
            Some(table) => {
                table.fields = fields.into();
                true
            }
            None => false,
        }
    }

    /// Registered table identifiers, in registration order.
    #[must_use]
    pub fn tables(&self) -> Vec<K> {
        self.inner.read().table_order.clone()
    }

    /// Registered enum identifiers, in registration order.
    #[must_use]
    pub fn enums(&self) -> Vec<K> {
        self.inner.read().enum_order.clone()
    }
}

impl<K: SchemaKey> Default for SchemaRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: SchemaKey> Debug for SchemaRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SchemaRegistry")
            .field("tables", &inner.tables)
            .field("enums", &inner.enums)
            .finish()
    }
}
