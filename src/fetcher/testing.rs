//! 测试用内存传输桩

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::resource::RawResponse;
use super::transport::HttpTransport;
use crate::error::{WebhuntError, WhResult};

/// 按URL返回预置响应，记录调用次数；未预置的URL返回FetchError
#[derive(Debug, Default)]
pub struct StubTransport {
    pages: HashMap<String, RawResponse>,
    panic_on: Option<String>,
    calls: AtomicUsize,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, status: u16, body: &str) -> Self {
        self.response(url, RawResponse { status, headers: Vec::new(), body: body.as_bytes().to_vec() })
    }

    pub fn response(mut self, url: &str, raw: RawResponse) -> Self {
        self.pages.insert(url.to_string(), raw);
        self
    }

    /// 请求该URL时直接panic，用于验证worker隔离
    pub fn panic_on(mut self, url: &str) -> Self {
        self.panic_on = Some(url.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn get(&self, url: &str) -> WhResult<RawResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.as_deref() == Some(url) {
            panic!("stub transport asked to fail hard for {}", url);
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| WebhuntError::FetchError(format!("no stub page for {}", url)))
    }
}
