//! Persistence for the engine's documents.

pub mod documents;

pub use documents::DocumentStore;
