//! 规则加载管理器
//! 负责从本地规则目录读取全部组件规则，扫描开始前一次性加载，扫描期间只读

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::model::{ComponentType, Rule};
use crate::error::{WebhuntError, WhResult};

// 遍历规则目录时跳过的子目录
const IGNORED_DIRS: &[&str] = &["tests"];

/// 规则库（保持加载顺序）
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    rules: Vec<Arc<Rule>>,
    // 规则名 -> 第一次出现的下标
    by_name: HashMap<String, usize>,
}

impl RuleStore {
    /// 从内存中的规则构建
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        let mut store = Self::default();
        for rule in rules {
            store.push(rule);
        }
        store
    }

    /// 从JSON数组字符串构建
    pub fn from_json_str(raw: &str) -> WhResult<Self> {
        let rules: Vec<Rule> = serde_json::from_str(raw)?;
        Ok(Self::from_rules(rules))
    }

    /// 递归加载目录下所有 *.json 规则文件，单个文件解析失败只记录日志
    pub fn load_dir(dir: &Path) -> WhResult<Self> {
        if !dir.is_dir() {
            return Err(WebhuntError::RuleLoadError(format!("规则目录不存在：{}", dir.display())));
        }

        let start = Instant::now();
        let mut store = Self::default();
        let mut skipped = 0usize;

        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() > 0
                    && entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| IGNORED_DIRS.contains(&name)))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("遍历规则目录失败：{}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match Self::load_file(path) {
                Ok(rule) => {
                    debug!("加载规则：{}", rule);
                    store.push(rule);
                }
                Err(e) => {
                    skipped += 1;
                    warn!("规则文件 '{}' 解析失败，已跳过：{}", path.display(), e);
                }
            }
        }

        debug!(
            "规则目录加载完成，耗时{:?}，规则数：{}，跳过：{}",
            start.elapsed(),
            store.len(),
            skipped
        );
        Ok(store)
    }

    /// 读取单个规则文件
    pub fn load_file(path: &Path) -> WhResult<Rule> {
        let raw = std::fs::read_to_string(path)?;
        let mut rule: Rule = serde_json::from_str(&raw)
            .map_err(|e| WebhuntError::RuleParseError(format!("{}：{}", path.display(), e)))?;
        rule.source = Some(path.to_path_buf());
        Ok(rule)
    }

    fn push(&mut self, rule: Rule) {
        self.by_name.entry(rule.name.clone()).or_insert(self.rules.len());
        self.rules.push(Arc::new(rule));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.iter()
    }

    /// 按名称查找（同名时取加载顺序中的第一条）
    pub fn get(&self, name: &str) -> Option<&Arc<Rule>> {
        self.by_name.get(name).map(|&idx| &self.rules[idx])
    }

    /// 按加载顺序筛选出指定名称的规则
    pub fn select<'a>(&'a self, names: &'a [String]) -> impl Iterator<Item = &'a Arc<Rule>> + 'a {
        self.rules.iter().filter(move |rule| names.iter().any(|n| n == &rule.name))
    }

    /// 各类型规则数量
    pub fn count_by_type(&self) -> BTreeMap<ComponentType, usize> {
        let mut counts = BTreeMap::new();
        for rule in &self.rules {
            *counts.entry(rule.kind).or_insert(0) += 1;
        }
        counts
    }

    /// 按名称搜索：规则名（忽略大小写）包含于任一关键字中即命中
    pub fn search(&self, needles: &[String]) -> Vec<&Arc<Rule>> {
        let needles: Vec<String> = needles.iter().map(|n| n.to_lowercase()).collect();
        let mut hits = Vec::new();
        for rule in &self.rules {
            let name = rule.name.to_lowercase();
            for needle in &needles {
                if needle.contains(&name) {
                    hits.push(rule);
                }
            }
        }
        hits
    }
}
