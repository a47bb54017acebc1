pub mod config;
pub mod error;
pub mod hawkes;
pub mod model;
pub mod summary;
pub mod tape_store;
