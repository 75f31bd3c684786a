//! 检测模块：单条match匹配、规则判定、共享状态、implies推导与扫描调度
pub mod baseline;
pub mod evaluator;
pub mod matcher;
pub mod resolver;
pub mod scheduler;
pub mod state;

// 导出核心接口
pub use self::evaluator::RuleEvaluator;
pub use self::matcher::{MatchEvaluator, MatchOutcome};
pub use self::resolver::resolve_implies;
pub use self::scheduler::{ScanPhase, Scanner};
pub use self::state::ScanState;
