//! 请求缓存
//! 以URL的MD5为键保存结构化响应；查询与写入分别加锁，请求本身不持锁

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::resource::FetchedResource;
use crate::utils::md5_hex;

/// 单次扫描内有效的请求缓存
#[derive(Debug, Default)]
pub struct RequestCache {
    entries: Mutex<HashMap<String, Arc<FetchedResource>>>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 缓存键：URL的MD5
    pub fn key(url: &str) -> String {
        md5_hex(url)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<FetchedResource>>> {
        // 写入的都是完整快照，锁中毒后数据依然可用
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, url: &str) -> Option<Arc<FetchedResource>> {
        self.entries().get(&Self::key(url)).cloned()
    }

    /// 写入缓存；并发首次请求同一URL时后写入者覆盖，内容等价
    pub fn insert(&self, url: &str, resource: Arc<FetchedResource>) {
        self.entries().insert(Self::key(url), resource);
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries().contains_key(&Self::key(url))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
