//! Service layer for analysis persistence.
//!
//! `VerdictService` wraps `VerdictDb` and hosts the repo methods
//! (`impl VerdictService` blocks under `repos/`). The validation event log and
//! the artifact store are separate handles so that decisions never depend on
//! whether an append or a file write succeeded.

use crate::VerdictDb;
use crate::error::DatabaseError;

pub struct VerdictService {
    db: VerdictDb,
}

impl VerdictService {
    /// Open a service on a local database.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        if db_path != ":memory:" {
            if let Some(parent) = std::path::Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        let db = VerdictDb::open_local(db_path).await?;
        Ok(Self { db })
    }

    /// Create from an existing `VerdictDb`.
    #[must_use]
    pub const fn from_db(db: VerdictDb) -> Self {
        Self { db }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &VerdictDb {
        &self.db
    }
}
