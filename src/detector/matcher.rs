//! 单条 match 的匹配器
//! 负责选取待检测资源、确定搜索范围，并依次校验 status/md5/text/regexp

use std::sync::Arc;

use tracing::debug;

use crate::fetcher::{FetchedResource, Fetcher};
use crate::rule::{MatchDescriptor, RulePattern, SearchScope};
use crate::utils::compose_url;

/// 单条 match 的匹配结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub matched: bool,
    pub version: Option<String>,
}

impl MatchOutcome {
    pub fn miss() -> Self {
        Self::default()
    }

    pub fn hit(version: Option<String>) -> Self {
        Self { matched: true, version }
    }
}

/// 搜索上下文：单个字符串或字符串列表（script）
#[derive(Debug, Clone, Copy)]
enum SearchContext<'a> {
    Text(&'a str),
    List(&'a [String]),
}

impl<'a> SearchContext<'a> {
    /// 按 search 选择器从资源中取出上下文，指定的子字段不存在时返回None
    fn resolve(resource: &'a FetchedResource, scope: &SearchScope) -> Option<Self> {
        let ctx = match scope {
            SearchScope::Body => SearchContext::Text(&resource.body),
            SearchScope::All => SearchContext::Text(&resource.raw_response),
            SearchScope::Headers => SearchContext::Text(&resource.raw_headers),
            SearchScope::Script => SearchContext::List(&resource.script),
            SearchScope::Title => SearchContext::Text(&resource.title),
            SearchScope::Cookies => SearchContext::Text(&resource.raw_cookies),
            SearchScope::Header(key) => SearchContext::Text(resource.header(key)?),
            SearchScope::Meta(key) => SearchContext::Text(resource.meta.get(key)?),
            SearchScope::Cookie(key) => SearchContext::Text(resource.cookies.get(key)?),
        };
        Some(ctx)
    }

    /// 子串包含：列表时逐个元素判断
    fn contains(&self, needle: &str) -> bool {
        match self {
            SearchContext::Text(text) => text.contains(needle),
            SearchContext::List(items) => items.iter().any(|item| item.contains(needle)),
        }
    }

    fn candidates(&self) -> Vec<&'a str> {
        match self {
            SearchContext::Text(text) => vec![*text],
            SearchContext::List(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// match 匹配器，绑定一个扫描目标
#[derive(Clone)]
pub struct MatchEvaluator {
    fetcher: Fetcher,
    target: String,
    aggression: bool,
}

impl MatchEvaluator {
    pub fn new(fetcher: Fetcher, target: String, aggression: bool) -> Self {
        Self { fetcher, target, aggression }
    }

    /// 检测单条 match
    pub async fn check_match(&self, descriptor: &MatchDescriptor) -> MatchOutcome {
        if !descriptor.has_predicate() {
            return MatchOutcome::miss();
        }

        let Some(resource) = self.resolve_resource(descriptor).await else {
            return MatchOutcome::miss();
        };

        match Self::check_resource(descriptor, &resource) {
            Some(version) => MatchOutcome::hit(version),
            None => MatchOutcome::miss(),
        }
    }

    /// 选取待检测资源；附加路径只在攻击模式下请求
    async fn resolve_resource(&self, descriptor: &MatchDescriptor) -> Option<Arc<FetchedResource>> {
        let url = match descriptor.extra_path() {
            None => self.target.clone(),
            Some(path) if self.aggression => match compose_url(&self.target, path) {
                Ok(url) => url,
                Err(e) => {
                    debug!("拼接URL失败：{} + {}，错误：{}", self.target, path, e);
                    return None;
                }
            },
            Some(path) => {
                debug!("match 含有 url({}) 字段，但未开启攻击模式，跳过", path);
                return None;
            }
        };

        self.fetcher.fetch(&url).await.ok()
    }

    /// 对已获取的资源校验全部谓词；命中时返回 Some(版本)
    fn check_resource(descriptor: &MatchDescriptor, resource: &FetchedResource) -> Option<Option<String>> {
        let context = SearchContext::resolve(resource, &descriptor.search_scope())?;
        let mut version = descriptor.version.clone();

        if let Some(status) = descriptor.status {
            if status != resource.status {
                return None;
            }
        }

        if let Some(md5) = &descriptor.md5 {
            if *md5 != resource.md5 {
                return None;
            }
        }

        if let Some(text) = &descriptor.text {
            if !context.contains(text) {
                return None;
            }
        }

        if descriptor.regexp.is_some() {
            // 正则编译失败视为未命中（错误已在编译时记录）
            let pattern = descriptor.compiled_pattern()?;
            let captured = context
                .candidates()
                .into_iter()
                .find_map(|candidate| Self::first_match(pattern, candidate, descriptor.offset))?;
            if let Some(extracted) = captured {
                version = Some(extracted);
            }
        }

        Some(version)
    }

    /// 在单个候选串中查找第一处匹配
    ///
    /// 无分组时取整体匹配，单分组取该分组，多分组按 offset 取分组，
    /// offset 越界时拼接全部分组。未给 offset 时只有单分组的正则提取版本，
    /// 其余情况保留 match 中的 version。
    fn first_match(pattern: &RulePattern, candidate: &str, offset: Option<usize>) -> Option<Option<String>> {
        let groups = pattern.captures(candidate)?;
        let group_count = groups.len() - 1;

        let offset = match offset {
            Some(offset) => offset,
            None if group_count == 1 => 0,
            None => return Some(None),
        };

        let extracted = match group_count {
            0 => groups[0].clone(),
            1 => groups[1].clone(),
            n if offset < n => groups[offset + 1].clone(),
            _ => groups[1..].concat(),
        };
        Some(Some(extracted))
    }
}
