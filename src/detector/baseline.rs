//! 基础信息采集：页面标题、目标主机IP，失败时退化为空值

use std::net::IpAddr;
use std::time::Duration;

use tracing::debug;
use url::{Host, Url};

use crate::fetcher::Fetcher;

/// 目标页面标题，请求失败时为空串
pub async fn page_title(fetcher: &Fetcher, target: &str) -> String {
    match fetcher.fetch(target).await {
        Ok(resource) => resource.title.clone(),
        Err(e) => {
            debug!("获取标题失败：{}，错误：{}", target, e);
            String::new()
        }
    }
}

/// 解析目标主机的IP列表，去重并保留解析顺序；解析失败或超时返回空列表
pub async fn resolve_ips(target: &Url, timeout: Duration) -> Vec<String> {
    let host = match target.host() {
        Some(Host::Ipv4(ip)) => return vec![IpAddr::V4(ip).to_string()],
        Some(Host::Ipv6(ip)) => return vec![IpAddr::V6(ip).to_string()],
        Some(Host::Domain(domain)) => domain.to_string(),
        None => return Vec::new(),
    };
    let port = target.port_or_known_default().unwrap_or(80);

    let addrs = match tokio::time::timeout(timeout, tokio::net::lookup_host((host.as_str(), port))).await {
        Ok(Ok(addrs)) => addrs,
        Ok(Err(e)) => {
            debug!("DNS解析失败：{}，错误：{}", host, e);
            return Vec::new();
        }
        Err(_) => {
            debug!("DNS解析超时：{}", host);
            return Vec::new();
        }
    };

    let mut ips: Vec<String> = Vec::new();
    for addr in addrs {
        let ip = addr.ip().to_string();
        if !ips.contains(&ip) {
            ips.push(ip);
        }
    }
    ips
}
