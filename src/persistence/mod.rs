// State persistence for the sequencer
// Save/load run in the polling context only, never on the real-time path.

pub mod serialization;
pub mod storage;
pub mod types;

pub use serialization::Snapshot;
pub use storage::{FileStorage, MemoryStorage, StateStorage};
pub use types::{FORMAT_TAG, SaveBlob};

use crate::sequencer::pattern::PatternStore;

/// Persistence error types
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    #[error("Format tag mismatch: expected {expected:#x}, found {found:#x}")]
    FormatMismatch { expected: u32, found: u32 },

    #[error("Invalid state structure: {0}")]
    InvalidStructure(String),
}

/// Encode and store the current state
pub fn save_state(
    storage: &mut dyn StateStorage,
    store: &PatternStore,
    bpm: u16,
) -> Result<(), PersistenceError> {
    let blob = serialization::blob_from_store(store, bpm);
    storage.save(&serialization::serialize_to_ron(&blob)?)
}

/// Fetch and validate the stored state; `Ok(None)` when nothing is stored
pub fn load_state(storage: &mut dyn StateStorage) -> Result<Option<Snapshot>, PersistenceError> {
    let Some(text) = storage.load()? else {
        return Ok(None);
    };
    let blob = serialization::deserialize_from_ron(&text)?;
    serialization::store_from_blob(&blob).map(Some)
}
