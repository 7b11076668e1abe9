// textlens: named analysis pipelines, bulk loading and similarity queries
// over an Elasticsearch-compatible search engine.
//
// This is the library root. Each module corresponds to a major subsystem;
// the binary in main.rs only wires them together.

pub mod analysis;
pub mod config;
pub mod corpus;
pub mod error;
pub mod output;
pub mod similarity;
pub mod store;
pub mod walkthrough;
