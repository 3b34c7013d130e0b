//! SQLite product catalogue.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, error, info};

use super::{StockUpdate, StoreGateway};
use crate::error::{StockError, Result};

const UPDATE_STOCK: &str = "update products set products_quantity=?1, products_status=1, \
     manufacturer_out_of_stock=?2 where products_model like ?3";

/// Table layout the updates expect. Only used to set up fresh databases.
const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        products_id INTEGER PRIMARY KEY,
        products_model TEXT NOT NULL,
        products_quantity INTEGER NOT NULL DEFAULT 0,
        products_status INTEGER NOT NULL DEFAULT 0,
        manufacturer_out_of_stock TEXT NOT NULL DEFAULT '0'
    );
    CREATE INDEX IF NOT EXISTS idx_products_model ON products(products_model);
"#;

/// Product store over one SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStore {
    /// Open an existing database. A missing file is an error rather than a
    /// new empty catalogue.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StockError::Store(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "Opened product store");
        Ok(Self { conn })
    }

    /// A private in-memory database with the schema in place.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create the `products` table if it does not exist.
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl StoreGateway for SqliteStore {
    fn update_stock(&mut self, update: &StockUpdate) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(UPDATE_STOCK)?;
        match stmt.execute(params![update.quantity, update.status.flag(), update.sku]) {
            Ok(changed) => {
                debug!(sku = %update.sku, flag = update.status.flag(), changed, "Updated product");
                Ok(changed)
            }
            Err(e) => {
                error!(sku = %update.sku, error = %e, "Product update failed");
                Err(e.into())
            }
        }
    }
}
