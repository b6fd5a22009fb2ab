pub mod file_store;
pub mod task_hook;
pub mod transport;

pub use file_store::{FileStore, OpenMode};
pub use task_hook::TaskHook;
pub use transport::Transport;
