/// Document store capability and its backends.
pub mod document_store;
/// Persisted document layouts.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
