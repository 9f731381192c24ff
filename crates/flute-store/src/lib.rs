pub mod memory;
pub mod mysql;
pub mod types;

pub use memory::MemoryInventoryStore;
pub use mysql::MySqlInventoryStore;
pub use types::InventoryStore;
