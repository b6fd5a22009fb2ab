pub mod engine;
pub mod file_name;
pub mod hook_adapters;
pub mod http_config;
pub mod progress_bitmap;
pub mod range_request;
pub mod resume_data;
pub mod session;
pub mod task;
pub mod task_builder;
pub mod task_hooks_container;
pub mod task_progress;
pub mod task_state;
pub mod transfer_error;
pub mod transport_event;

// 重导出公共类型
pub use engine::Engine;
pub use file_name::{DEFAULT_FILE_NAME, guess_file_name};
pub use http_config::{
    DEFAULT_BYTES_PER_BLOCK, DEFAULT_MIN_SESSION_BLOCKS, DEFAULT_RETRY_COUNT,
    DEFAULT_SESSION_NUMBER, HttpConfig,
};
pub use progress_bitmap::{MAX_BITMAP_BLOCKS, ProgressBitmap};
pub use range_request::RangeRequest;
pub use resume_data::ResumeData;
pub use session::{Session, SessionId};
pub use task::{Task, TaskId};
pub use task_builder::TaskBuilder;
pub use task_hooks_container::TaskHooksContainer;
pub use task_progress::TaskProgress;
pub use task_state::{InternalState, TaskState};
pub use transfer_error::{ErrorKind, TransferError};
pub use transport_event::{
    ResponseInfo, StatusClass, TransportEvent, TransportHandle, parse_content_range_total,
    strip_mime_params,
};
