//! Repository implementations for database operations

pub mod alerts;
pub mod portfolio;
pub mod saved_items;
pub mod search_history;
pub mod settings;
pub mod trends;
pub mod users;

pub use alerts::*;
pub use portfolio::*;
pub use saved_items::*;
pub use search_history::*;
pub use settings::*;
pub use trends::*;
pub use users::*;
