pub mod local_file;
pub mod memory_file;

pub use local_file::LocalFile;
pub use memory_file::MemoryFile;
