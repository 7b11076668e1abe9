// Text analysis — pipeline definitions, the registry that validates them,
// and a local executor for the in-memory store.

pub mod definitions;
pub mod local;
pub mod pipeline;
pub mod registry;
