pub mod manager;
pub mod memory;
pub mod models;
pub mod pg;
pub mod query_builder;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use store::{ResourceStore, UserStore};
