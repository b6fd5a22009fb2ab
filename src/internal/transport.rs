pub mod http_transport;
pub mod memory_transport;

pub use http_transport::HttpTransport;
pub use memory_transport::{MemoryResource, MemoryTransport};
