/// 内部导出的模块
mod internal;

#[cfg(test)]
mod tests;

/// 分段传输核心：位图、会话、任务状态机与引擎
pub mod transfer {
    use crate::internal;
    pub use internal::transfer::structs::*;
    pub use internal::transfer::traits::*;
}

/// 传输层实现
pub mod transport {
    use crate::internal;
    pub use internal::transport::*;
}

/// 文件存储实现
pub mod file_store {
    use crate::internal;
    pub use internal::file_store::*;
}

/// 按地址分派协议与下载管理器
pub mod protocol {
    use crate::internal;
    pub use internal::protocol::*;
}

pub mod states {
    pub mod unlock_reactive {
        use crate::internal;
        pub use internal::states::unlock_reactive::*;
    }
}
