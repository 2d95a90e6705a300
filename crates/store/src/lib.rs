pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryProductStore;
pub use postgres::PostgresProductStore;
pub use repository::Repository;
pub use store::{ExpectedVersion, ProductStore, StagedProduct};
