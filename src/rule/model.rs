//! 规则数据模型定义
//! 规则本身只存数据，正则按需懒编译；检测结果模型也定义在这里

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::pattern::RulePattern;

/// 组件类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    #[default]
    Others,
    Cms,
    Os,
    Middleware,
    Database,
    Device,
    Service,
    ServiceProvider,
    General,
}

impl ComponentType {
    pub const ALL: [ComponentType; 9] = [
        ComponentType::Others,
        ComponentType::Cms,
        ComponentType::Os,
        ComponentType::Middleware,
        ComponentType::Database,
        ComponentType::Device,
        ComponentType::Service,
        ComponentType::ServiceProvider,
        ComponentType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Others => "others",
            ComponentType::Cms => "cms",
            ComponentType::Os => "os",
            ComponentType::Middleware => "middleware",
            ComponentType::Database => "database",
            ComponentType::Device => "device",
            ComponentType::Service => "service",
            ComponentType::ServiceProvider => "service_provider",
            ComponentType::General => "general",
        }
    }

    /// 宽松解析：忽略大小写，未知或缺失时归为 others
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return ComponentType::Others;
        };
        let lowered = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .unwrap_or(ComponentType::Others)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 搜索范围（match 的 search 字段）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    Body,
    All,
    Headers,
    Script,
    Title,
    Cookies,
    Header(String),
    Meta(String),
    Cookie(String),
}

impl SearchScope {
    /// 解析search选择器，无法识别时退回Body
    pub fn parse(raw: &str) -> Self {
        match raw {
            "all" => return SearchScope::All,
            "headers" => return SearchScope::Headers,
            "script" => return SearchScope::Script,
            "title" => return SearchScope::Title,
            "cookies" => return SearchScope::Cookies,
            "body" => return SearchScope::Body,
            _ => {}
        }

        if let Some(inner) = raw.strip_suffix(']') {
            if let Some(key) = inner.strip_prefix("headers[") {
                return SearchScope::Header(key.to_string());
            }
            if let Some(key) = inner.strip_prefix("meta[") {
                return SearchScope::Meta(key.to_string());
            }
            if let Some(key) = inner.strip_prefix("cookies[") {
                return SearchScope::Cookie(key.to_string());
            }
        }
        SearchScope::Body
    }
}

/// 单条匹配描述
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MatchDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    // 懒编译的正则，编译失败记为None
    #[serde(skip)]
    compiled: OnceCell<Option<RulePattern>>,
}

impl MatchDescriptor {
    /// 至少包含 status/md5/text/regexp 之一才可能命中
    pub fn has_predicate(&self) -> bool {
        self.status.is_some() || self.md5.is_some() || self.text.is_some() || self.regexp.is_some()
    }

    /// 需要额外请求的路径（url 为 "/" 时直接复用目标页）
    pub fn extra_path(&self) -> Option<&str> {
        self.url.as_deref().filter(|path| *path != "/")
    }

    pub fn search_scope(&self) -> SearchScope {
        self.search
            .as_deref()
            .map(SearchScope::parse)
            .unwrap_or(SearchScope::Body)
    }

    /// 获取编译后的正则（忽略大小写），首次调用时编译
    pub fn compiled_pattern(&self) -> Option<&RulePattern> {
        let pattern = self.regexp.as_deref()?;
        self.compiled
            .get_or_init(|| match RulePattern::compile(pattern) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!("正则编译失败，跳过该模式：{}，错误：{}", pattern, e);
                    None
                }
            })
            .as_ref()
    }
}

/// 组件指纹规则
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Rule {
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "de_component_type")]
    pub kind: ComponentType,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub producer: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub properties: Option<Value>,
    #[serde(default, deserialize_with = "de_null_default")]
    pub matches: Vec<MatchDescriptor>,
    #[serde(default, deserialize_with = "de_name_set")]
    pub implies: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de_name_set")]
    pub excludes: Option<Vec<String>>,

    // 未声明的字段原样保留
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,

    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Rule {
    /// desc 为空时回退到 description
    pub fn desc(&self) -> Option<&str> {
        self.desc
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.description.as_deref())
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn implies(&self) -> &[String] {
        self.implies.as_deref().unwrap_or_default()
    }

    pub fn excludes(&self) -> &[String] {
        self.excludes.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = self.desc().unwrap_or("");
        if desc.chars().count() < 50 {
            write!(f, "[{}] {}: {}", self.kind, self.name, desc)
        } else {
            let short: String = desc.chars().take(50).collect();
            write!(f, "[{}] {}: {}...", self.kind, self.name, short)
        }
    }
}

fn de_component_type<'de, D>(deserializer: D) -> Result<ComponentType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(ComponentType::parse_lenient(raw.as_ref().and_then(Value::as_str)))
}

fn de_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// implies/excludes 兼容单个字符串与字符串数组
fn de_name_set<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NameSet {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<NameSet>::deserialize(deserializer)? {
        None => None,
        Some(NameSet::One(name)) if name.is_empty() => None,
        Some(NameSet::One(name)) => Some(vec![name]),
        Some(NameSet::Many(names)) => Some(names.into_iter().filter(|n| !n.is_empty()).collect()),
    })
}

/// 组件命中结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Detection {
    pub fn from_name(name: String) -> Self {
        Self { name, version: None }
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) if !v.is_empty() => write!(f, "{} {}", self.name, v),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// 扫描结果中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScanRecord {
    Title { name: String, title: String },
    Ip { name: String, ips: Vec<String> },
    Component(Detection),
}

impl ScanRecord {
    pub fn title(title: String) -> Self {
        ScanRecord::Title { name: "title".to_string(), title }
    }

    pub fn ip(ips: Vec<String>) -> Self {
        ScanRecord::Ip { name: "ip".to_string(), ips }
    }

    pub fn name(&self) -> &str {
        match self {
            ScanRecord::Title { name, .. } | ScanRecord::Ip { name, .. } => name,
            ScanRecord::Component(detection) => &detection.name,
        }
    }

    pub fn as_detection(&self) -> Option<&Detection> {
        match self {
            ScanRecord::Component(detection) => Some(detection),
            _ => None,
        }
    }
}

impl From<Detection> for ScanRecord {
    fn from(detection: Detection) -> Self {
        ScanRecord::Component(detection)
    }
}
