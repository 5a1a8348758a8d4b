pub mod error;
pub mod json_bridge;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{DB_FILE_NAME, RunSummary, Store, default_base_dir};
