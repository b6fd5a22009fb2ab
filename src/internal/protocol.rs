pub mod download_manager;
pub mod http_protocol;
pub mod manager_snapshot;
pub mod traits;

pub use download_manager::{AddTaskParams, DownloadManager, ManagerTaskId};
pub use http_protocol::HttpProtocol;
pub use manager_snapshot::{ManagerSnapshot, TaskRecord};
pub use traits::Protocol;
