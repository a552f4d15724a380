use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record already carries identifier {0}; identifiers are assigned by the store")]
    IdentifierPreassigned(Uuid),

    #[error("invalid identifier line at byte offset {offset}: {source}")]
    InvalidIdentifier {
        offset: u64,
        #[source]
        source: uuid::Error,
    },

    #[error(
        "corrupt frame at byte offset {offset}: identifier line {line_id} \
         does not match embedded identifier {embedded_id}"
    )]
    Corruption {
        offset: u64,
        line_id: Uuid,
        embedded_id: Uuid,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock error")]
    Lock,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Lock a mutex, converting a poisoned-lock panic into `Error::Lock`.
pub fn lock_mutex<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| Error::Lock)
}
