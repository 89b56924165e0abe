pub mod file;
pub mod memory;
pub mod provider;

pub use file::DiskTier;
pub use memory::MemoryTier;
pub use provider::CacheTier;
