//! 内存传输：对已注册的资源做确定性的区间响应，可注入失败、可控制每个 tick 推进哪些请求。
//!
//! 克隆共享同一份状态，调用方可以在把一份交给引擎后继续用另一份观察和操控。

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

use crate::internal::transfer::structs::{
    RangeRequest, ResponseInfo, StatusClass, TransferError, TransportEvent, TransportHandle,
};
use crate::internal::transfer::traits::Transport;

/// 默认每步交付的字节数
pub const DEFAULT_MEMORY_CHUNK: usize = 64;

/// 一个可下载的内存资源
#[derive(Debug, Clone)]
pub struct MemoryResource {
    pub body: Bytes,
    /// 是否支持区间请求
    pub accept_ranges: bool,
    /// 是否在响应头里给出长度
    pub report_length: bool,
    pub mime_type: Option<String>,
    pub last_modified: Option<DateTime<FixedOffset>>,
}

impl MemoryResource {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            accept_ranges: true,
            report_length: true,
            mime_type: None,
            last_modified: None,
        }
    }

    /// 服务器忽略 Range，总是返回完整内容
    pub fn without_ranges(mut self) -> Self {
        self.accept_ranges = false;
        self
    }

    /// 不给 Content-Length / Content-Range
    pub fn without_length(mut self) -> Self {
        self.report_length = false;
        self
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn last_modified(mut self, time: DateTime<FixedOffset>) -> Self {
        self.last_modified = Some(time);
        self
    }
}

type Stepper = Box<dyn FnMut(&[TransportHandle]) -> Vec<TransportHandle>>;

struct InFlight {
    request: RangeRequest,
    /// 还没发出响应头
    pending_response: bool,
    cursor: u64,
    end: u64,
    delivered: u64,
    /// 交付这么多字节后以失败结束
    fail_after: Option<u64>,
    done: bool,
}

#[derive(Default)]
struct MemoryState {
    resources: HashMap<String, MemoryResource>,
    requests: BTreeMap<TransportHandle, InFlight>,
    next_handle: u64,
    chunk_size: usize,
    fail_open: bool,
    failure_plans: VecDeque<u64>,
    stepper: Option<Stepper>,
    opened: Vec<RangeRequest>,
    closed: Vec<TransportHandle>,
}

#[derive(Clone)]
pub struct MemoryTransport {
    state: Rc<RefCell<MemoryState>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryTransport")
            .field("resources", &state.resources.len())
            .field("in_flight", &state.requests.len())
            .finish()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MemoryState {
                chunk_size: DEFAULT_MEMORY_CHUNK,
                ..MemoryState::default()
            })),
        }
    }

    pub fn add_resource(&self, uri: impl Into<String>, resource: MemoryResource) {
        self.state.borrow_mut().resources.insert(uri.into(), resource);
    }

    /// 每个请求每步交付的字节数（至少 1）
    pub fn set_chunk_size(&self, size: usize) {
        self.state.borrow_mut().chunk_size = size.max(1);
    }

    /// 之后的 `open` 全部失败
    pub fn set_fail_open(&self, fail: bool) {
        self.state.borrow_mut().fail_open = fail;
    }

    /// 接下来打开的一个请求在交付 `after_bytes` 字节后以失败结束；可多次调用排队。
    pub fn fail_next_request(&self, after_bytes: u64) {
        self.state.borrow_mut().failure_plans.push_back(after_bytes);
    }

    /// 每步从就绪请求中挑出要推进的那些（默认全部推进）。
    pub fn set_stepper<F>(&self, stepper: F)
    where
        F: FnMut(&[TransportHandle]) -> Vec<TransportHandle> + 'static,
    {
        self.state.borrow_mut().stepper = Some(Box::new(stepper));
    }

    /// 按打开顺序记录的全部请求
    pub fn opened_requests(&self) -> Vec<RangeRequest> {
        self.state.borrow().opened.clone()
    }

    /// 按关闭顺序记录的全部句柄（含重复关闭）
    pub fn closed_handles(&self) -> Vec<TransportHandle> {
        self.state.borrow().closed.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.state.borrow().requests.len()
    }
}

impl MemoryState {
    /// 推进一个请求一步，产生的事件追加到 `events`。
    fn step(&mut self, handle: TransportHandle, events: &mut Vec<TransportEvent>) {
        let chunk_size = self.chunk_size as u64;
        let Some(flight) = self.requests.get_mut(&handle) else {
            return;
        };
        if flight.done {
            return;
        }
        let Some(resource) = self.resources.get(&flight.request.uri) else {
            flight.done = true;
            events.push(TransportEvent::Response {
                handle,
                info: ResponseInfo {
                    status: 404,
                    ..ResponseInfo::default()
                },
            });
            events.push(TransportEvent::Complete {
                handle,
                status: StatusClass::Failure,
            });
            return;
        };

        if flight.pending_response {
            flight.pending_response = false;
            let total = resource.body.len() as u64;
            let ranged = resource.accept_ranges && flight.request.range_header().is_some();
            if ranged && flight.request.start >= total && total > 0 {
                flight.done = true;
                events.push(TransportEvent::Response {
                    handle,
                    info: ResponseInfo {
                        status: 416,
                        ..ResponseInfo::default()
                    },
                });
                events.push(TransportEvent::Complete {
                    handle,
                    status: StatusClass::Failure,
                });
                return;
            }
            let (start, end) = if ranged {
                let end = flight.request.end().unwrap_or(total).min(total);
                (flight.request.start, end)
            } else {
                (0, total)
            };
            flight.cursor = start;
            flight.end = end;
            let info = ResponseInfo {
                status: if ranged { 206 } else { 200 },
                content_length: resource.report_length.then_some(end - start),
                total_length: (ranged && resource.report_length).then_some(total),
                accept_ranges: resource.accept_ranges,
                mime_type: resource.mime_type.clone(),
                last_modified: resource.last_modified,
            };
            events.push(TransportEvent::Response { handle, info });
            return;
        }

        if let Some(limit) = flight.fail_after {
            if flight.delivered >= limit {
                flight.done = true;
                events.push(TransportEvent::Complete {
                    handle,
                    status: StatusClass::Failure,
                });
                return;
            }
        }

        let mut take = chunk_size.min(flight.end - flight.cursor);
        if let Some(limit) = flight.fail_after {
            take = take.min(limit - flight.delivered);
        }
        if take > 0 {
            let from = flight.cursor as usize;
            let bytes = resource.body.slice(from..from + take as usize);
            flight.cursor += take;
            flight.delivered += take;
            events.push(TransportEvent::Data { handle, bytes });
        }
        if flight.cursor >= flight.end {
            flight.done = true;
            let status = if flight.fail_after.is_some() {
                StatusClass::Failure
            } else {
                StatusClass::Success
            };
            events.push(TransportEvent::Complete { handle, status });
        }
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self, request: RangeRequest) -> Result<TransportHandle, TransferError> {
        let mut state = self.state.borrow_mut();
        if state.fail_open {
            return Err(TransferError::TransportSetup(format!(
                "无法建立连接: {}",
                request.uri
            )));
        }
        let handle = TransportHandle(state.next_handle);
        state.next_handle += 1;
        let fail_after = state.failure_plans.pop_front();
        state.opened.push(request.clone());
        state.requests.insert(
            handle,
            InFlight {
                request,
                pending_response: true,
                cursor: 0,
                end: 0,
                delivered: 0,
                fail_after,
                done: false,
            },
        );
        Ok(handle)
    }

    fn perform(&mut self) -> Vec<TransportEvent> {
        let mut state = self.state.borrow_mut();
        let ready: Vec<TransportHandle> = state
            .requests
            .iter()
            .filter(|(_, f)| !f.done)
            .map(|(h, _)| *h)
            .collect();
        let chosen = match state.stepper.as_mut() {
            Some(stepper) => stepper(&ready),
            None => ready,
        };
        let mut events = Vec::new();
        for handle in chosen {
            state.step(handle, &mut events);
        }
        events
    }

    fn close(&mut self, handle: TransportHandle) {
        let mut state = self.state.borrow_mut();
        state.requests.remove(&handle);
        state.closed.push(handle);
    }
}
