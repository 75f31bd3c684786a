//! 规则模块：负责规则的加载与数据模型定义
pub mod model;
pub mod loader;
pub mod pattern;

// 导出核心接口
pub use self::model::{
    ComponentType, Detection, MatchDescriptor, Rule, ScanRecord, SearchScope
};
pub use self::loader::RuleStore;
pub use self::pattern::RulePattern;
