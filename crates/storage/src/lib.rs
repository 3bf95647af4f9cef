#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CatalogRepository, CatalogWriter, InMemoryRepository, ProgressRepository, Storage,
    StorageError,
};
