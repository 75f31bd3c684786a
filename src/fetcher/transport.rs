//! HTTP传输层
//! 扫描只依赖 HttpTransport 这一接缝，生产环境使用 reqwest，测试使用内存桩

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use tracing::debug;

use super::resource::RawResponse;
use crate::config::ScanConfig;
use crate::error::{WebhuntError, WhResult};
use crate::utils::HeaderConverter;

// 允许跟随的最大重定向次数
const MAX_REDIRECTS: usize = 10;

/// 发起一次GET请求并返回原始响应
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> WhResult<RawResponse>;
}

/// 基于reqwest的传输实现（证书校验始终关闭）
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 按扫描配置构建客户端，配置非法时返回 ConfigError
    pub fn new(config: &ScanConfig) -> WhResult<Self> {
        let redirect = if config.allow_redirect {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };

        let mut builder = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(true)
            .redirect(redirect)
            .default_headers(config.header_map()?);

        if let Some(spec) = config.proxy_spec()? {
            let proxy_url = spec.to_url();
            let proxy = Proxy::all(&proxy_url)
                .map_err(|e| WebhuntError::ConfigError(format!("代理配置无效：{}，错误：{}", proxy_url, e)))?;
            debug!("使用代理：{}://{}:{}", proxy_url.split("://").next().unwrap_or(""), spec.addr, spec.port);
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| WebhuntError::ConfigError(format!("HTTP客户端初始化失败：{}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> WhResult<RawResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let headers = HeaderConverter::to_pairs(response.headers());
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse { status, headers, body })
    }
}
