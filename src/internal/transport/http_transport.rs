//! HTTP(S) 传输：每个区间请求在调用方提供的 tokio 运行时上执行，
//! 事件经无界 mpsc 队列回到引擎，`perform` 用 `try_recv` 非阻塞地取走。

mod fetch_range;

use std::collections::HashMap;

use reqwest::Client;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::internal::transfer::structs::{
    RangeRequest, TransferError, TransportEvent, TransportHandle,
};
use crate::internal::transfer::traits::Transport;

use fetch_range::{FetchRangeParams, fetch_range};

pub struct HttpTransport {
    client: Client,
    runtime: Handle,
    sender: mpsc::UnboundedSender<TransportEvent>,
    receiver: mpsc::UnboundedReceiver<TransportEvent>,
    /// 在途请求；关闭时中止对应的异步任务
    requests: HashMap<TransportHandle, JoinHandle<()>>,
    next_handle: u64,
}

impl HttpTransport {
    /// 使用默认客户端；请求在 `runtime` 上执行。
    pub fn new(runtime: Handle) -> Result<Self, TransferError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransferError::TransportSetup(e.to_string()))?;
        Ok(Self::with_client(client, runtime))
    }

    /// 使用自定义客户端（代理、超时等由调用方配置）。
    pub fn with_client(client: Client, runtime: Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            client,
            runtime,
            sender,
            receiver,
            requests: HashMap::new(),
            next_handle: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.requests.len()
    }
}

impl Transport for HttpTransport {
    fn open(&mut self, request: RangeRequest) -> Result<TransportHandle, TransferError> {
        url::Url::parse(&request.uri)
            .map_err(|e| TransferError::TransportSetup(format!("{}: {e}", request.uri)))?;
        let handle = TransportHandle(self.next_handle);
        self.next_handle += 1;
        debug!(?handle, range = ?request.range_header(), uri = %request.uri, "发起请求");
        let join = self.runtime.spawn(fetch_range(FetchRangeParams {
            client: self.client.clone(),
            request,
            handle,
            sender: self.sender.clone(),
        }));
        self.requests.insert(handle, join);
        Ok(handle)
    }

    fn perform(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            // 已关闭句柄可能还有排队中的事件
            if self.requests.contains_key(&event.handle()) {
                events.push(event);
            }
        }
        events
    }

    fn close(&mut self, handle: TransportHandle) {
        if let Some(join) = self.requests.remove(&handle) {
            join.abort();
        }
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        for (_, join) in self.requests.drain() {
            join.abort();
        }
    }
}
