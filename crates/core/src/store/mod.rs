//! JSON document collections.
//!
//! Every logical table of HealthAssist is one JSON file in the data directory. Two shapes exist:
//!
//! ```text
//! patients_db.json        { "patients": [ { "id": "PT0001", ... }, ... ] }
//! notifications_db.json   { "users": { "<username>": <value> } }
//! ```
//!
//! [`JsonCollection`] handles the first shape (records with an identifier field) and
//! [`KeyedCollection`] the second (one value per username).
//!
//! ## Persistence model
//!
//! Each operation loads the whole file, works on the in-memory container and, for mutations,
//! rewrites the whole file. Writes go to a temporary sibling file that is then renamed over the
//! original, so readers never observe a half-written document. Writers within one process are
//! serialised by a per-collection lock; writers in *different* processes are not coordinated and
//! the last one to rename wins.

mod collection;
mod file;
mod keyed;

pub use collection::{merge_fields, patched, JsonCollection, Record};
pub use keyed::KeyedCollection;

/// Static description of a list collection: where it lives and how its ids look.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionSpec {
    /// File name relative to the data directory.
    pub file_name: &'static str,
    /// Top-level JSON key holding the record list.
    pub key: &'static str,
    /// Prefix of generated identifiers (`PT`, `REC`, ...).
    pub id_prefix: &'static str,
}

impl CollectionSpec {
    pub const fn new(file_name: &'static str, key: &'static str, id_prefix: &'static str) -> Self {
        Self {
            file_name,
            key,
            id_prefix,
        }
    }
}
