pub mod cursor_store;
pub mod destination;
pub mod memory;
pub mod sqlite;
pub mod types;

pub use cursor_store::*;
pub use destination::*;
pub use memory::*;
pub use sqlite::*;
pub use types::*;
