//! webhunt - 基于规则的Web组件指纹识别引擎

// 导出全局错误类型
pub use self::error::{WebhuntError, WhResult};

// 导出配置模块
pub use self::config::{ConfigManager, CustomConfigBuilder, ProxyKind, ProxySpec, ScanConfig};

// 导出规则模块核心接口
pub use self::rule::{
    ComponentType, Detection, MatchDescriptor, Rule, RulePattern, RuleStore, ScanRecord, SearchScope
};

// 导出提取模块核心接口
pub use self::extractor::{HtmlDocument, HtmlExtractor};

// 导出工具模块核心接口
pub use self::utils::{compose_url, md5_hex, HeaderConverter};

// 导出请求模块核心接口
pub use self::fetcher::{
    FetchedResource, Fetcher, HttpTransport, RawResponse, ReqwestTransport, RequestCache
};

// 导出检测模块核心接口
pub use self::detector::{
    resolve_implies, MatchEvaluator, MatchOutcome, RuleEvaluator, ScanPhase, ScanState, Scanner
};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod extractor;
pub mod utils;
pub mod fetcher;
pub mod condition;
pub mod detector;
