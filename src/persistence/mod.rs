//! Learning-state persistence.

pub mod learning_store;

pub use learning_store::JsonFileStore;
