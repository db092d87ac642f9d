/// Fact store abstraction and its in-process implementation.
pub mod fact_store;
/// Fact model definitions.
pub mod facts;
/// Typed traversals and writes over the fact store.
pub mod repository;
/// Storage error types shared by fact store backends.
pub mod storage;
