//! # ReactiveProperty — 进度发布内核
//!
//! 写入方是引擎线程上的任务：每个 tick 结束时调用一次 [`ReactiveProperty::update`]，不阻塞、不等待。
//! 读取方可以在任意线程取快照，也可以在异步上下文里等待下一次发布。
//!
//! 最后一个属性句柄释放（任务被移除）时，所有监听者收到一次 `Destroyed`。
//!
//! 本模块**不对外导出**，通过 [`super::unlock_reactive`] 使用。

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio::sync::watch::error::RecvError;

// ──────────────────────────── Error ────────────────────────────

#[derive(Debug, Error)]
pub enum ReactivePropertyError {
    /// 发布方已释放，不会再有新值
    #[error("进度源已释放")]
    Destroyed,

    #[error("等待进度失败: {0}")]
    RecvError(#[from] RecvError),
}

// ──────────────────────────── Publisher ────────────────────────────

/// 发布端；释放时写入 `None` 作为结束标记。
#[derive(Debug)]
struct Publisher<T> {
    sender: watch::Sender<Option<T>>,
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        self.sender.send_replace(None);
    }
}

// ──────────────────────────── ReactiveProperty ────────────────────────────

/// 可克隆的属性句柄；克隆共享同一个发布端。
#[derive(Clone, Debug)]
pub struct ReactiveProperty<T: Clone + Send + Sync> {
    publisher: Arc<Publisher<T>>,
    snapshot: watch::Receiver<Option<T>>,
}

impl<T> ReactiveProperty<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(value: T) -> Self {
        let (sender, snapshot) = watch::channel(Some(value));
        Self {
            publisher: Arc::new(Publisher { sender }),
            snapshot,
        }
    }

    /// 发布新值并唤醒所有监听者；没有监听者时也会保存下来。
    pub fn update(&self, value: T) -> &Self {
        self.publisher.sender.send_replace(Some(value));
        self
    }

    pub fn get_current(&self) -> Option<T> {
        self.snapshot.borrow().clone()
    }

    /// 新建监听器；它只会看到此后的发布。
    pub fn watch(&self) -> PropertyWatcher<T> {
        PropertyWatcher {
            receiver: self.publisher.sender.subscribe(),
        }
    }
}

// ──────────────────────────── PropertyWatcher ────────────────────────────

/// 属性监听器，可以跨线程移动。
pub struct PropertyWatcher<T> {
    receiver: watch::Receiver<Option<T>>,
}

impl<T> PropertyWatcher<T>
where
    T: Clone + Send + Sync,
{
    /// 等待下一次发布并返回新值。
    pub async fn changed(&mut self) -> Result<T, ReactivePropertyError> {
        self.receiver.changed().await?;
        self.receiver
            .borrow_and_update()
            .clone()
            .ok_or(ReactivePropertyError::Destroyed)
    }

    /// 等到满足条件的值出现；当前值已满足时立即返回。
    pub async fn wait_until<F>(&mut self, mut predicate: F) -> Result<T, ReactivePropertyError>
    where
        F: FnMut(&T) -> bool,
    {
        loop {
            match self.receiver.borrow_and_update().as_ref() {
                None => return Err(ReactivePropertyError::Destroyed),
                Some(value) if predicate(value) => return Ok(value.clone()),
                Some(_) => {}
            }
            self.receiver.changed().await?;
        }
    }

    pub fn borrow(&self) -> Option<T> {
        self.receiver.borrow().clone()
    }
}
