// Document store — the DocumentStore trait and its two backends.
//
// `elastic` speaks the search engine's REST API; `memory` runs everything
// in-process. `ingest` batches a corpus into any backend and `settings`
// builds the JSON request bodies the engine expects.

pub mod elastic;
pub mod ingest;
pub mod memory;
pub mod models;
pub mod settings;
pub mod traits;

pub use traits::DocumentStore;
