pub mod json_dir;
pub mod models;
pub mod provider;

pub use json_dir::JsonDirProvider;
pub use models::*;
pub use provider::{fetch_seasons, InMemoryProvider, StatRecordProvider};
