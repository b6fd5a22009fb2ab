//! # UnlockReactiveProperty
//!
//! 任务进度的发布通道：任务在引擎线程上每个 tick 更新一次，界面或日志在别处读取。
//! 更新不加锁也不等待，慢的读取方只会错过中间值，不会拖住引擎。
//!
//! ## 使用示例
//! ```rust,no_run
//! use segfetch::states::unlock_reactive::UnlockReactiveProperty;
//!
//! # async fn demo() {
//! let prop = UnlockReactiveProperty::new(0u64);
//! let mut watcher = prop.watch();
//! prop.update(1024);
//! let done = watcher.wait_until(|bytes| *bytes >= 1024).await;
//! # }
//! ```

pub use super::reactive_core::{PropertyWatcher, ReactivePropertyError as UnlockReactivePropertyError};

pub type UnlockReactiveProperty<T> = super::reactive_core::ReactiveProperty<T>;
