//! 资源获取模块：HTTP请求 + 结构化解析 + 请求缓存
pub mod cache;
pub mod resource;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing::{debug, warn};

pub use self::cache::RequestCache;
pub use self::resource::{FetchedResource, RawResponse};
pub use self::transport::{HttpTransport, ReqwestTransport};

use crate::error::WhResult;

/// 带缓存的资源获取器
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<RequestCache>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, cache: Arc<RequestCache>) -> Self {
        Self { transport, cache }
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    /// 获取URL对应的结构化结果；命中缓存时不发起请求，失败时不写缓存
    pub async fn fetch(&self, url: &str) -> WhResult<Arc<FetchedResource>> {
        if let Some(hit) = self.cache.get(url) {
            debug!("请求缓存命中：{}", url);
            return Ok(hit);
        }

        let raw = match self.transport.get(url).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("请求失败：{}，错误：{}", url, e);
                return Err(e);
            }
        };

        let resource = Arc::new(FetchedResource::from_raw(url, raw));
        debug!("请求完成：{}，状态码：{}", url, resource.status);
        self.cache.insert(url, resource.clone());
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubTransport;
    use super::*;

    #[tokio::test]
    async fn test_fetch_is_cached() {
        let stub = Arc::new(StubTransport::new().page("http://127.0.0.1/", 200, "<title>Home</title>"));
        let fetcher = Fetcher::new(stub.clone(), Arc::new(RequestCache::new()));

        let first = fetcher.fetch("http://127.0.0.1/").await.unwrap();
        let second = fetcher.fetch("http://127.0.0.1/").await.unwrap();

        assert_eq!(stub.calls(), 1);
        assert_eq!(*first, *second);
        assert_eq!(second.title, "Home");
        assert!(fetcher.cache().contains("http://127.0.0.1/"));
    }

    #[tokio::test]
    async fn test_failed_fetch_not_cached() {
        let stub = Arc::new(StubTransport::new());
        let fetcher = Fetcher::new(stub.clone(), Arc::new(RequestCache::new()));

        assert!(fetcher.fetch("http://127.0.0.1/missing").await.is_err());
        assert!(fetcher.fetch("http://127.0.0.1/missing").await.is_err());

        assert_eq!(stub.calls(), 2);
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_shared_cache_between_fetchers() {
        let cache = Arc::new(RequestCache::new());
        let stub = Arc::new(StubTransport::new().page("http://127.0.0.1/", 200, "body"));
        let a = Fetcher::new(stub.clone(), cache.clone());
        let b = Fetcher::new(stub.clone(), cache.clone());

        a.fetch("http://127.0.0.1/").await.unwrap();
        b.fetch("http://127.0.0.1/").await.unwrap();
        assert_eq!(stub.calls(), 1);
        assert_eq!(cache.len(), 1);
    }
}
