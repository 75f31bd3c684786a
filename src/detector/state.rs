//! 扫描共享状态
//! results/implies/excludes 由同一把锁保护；排除检查只作用于之后的追加，已追加的结果不会被撤回

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::rule::{Detection, ScanRecord};

#[derive(Debug, Default)]
struct StateInner {
    results: Vec<ScanRecord>,
    implies: BTreeSet<String>,
    excludes: BTreeSet<String>,
}

/// 单次扫描的共享状态
#[derive(Debug, Default)]
pub struct ScanState {
    inner: Mutex<StateInner>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        // 结果只追加，锁中毒时沿用已有数据
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 写入基础信息（title/ip），不做排除检查
    pub fn push_baseline(&self, record: ScanRecord) {
        self.lock().results.push(record);
    }

    /// 合并 implies/excludes 后追加结果；名称已被排除时不追加，返回是否追加
    pub fn record(&self, implies: &[String], excludes: &[String], detection: Detection) -> bool {
        let mut inner = self.lock();
        inner.implies.extend(implies.iter().cloned());
        inner.excludes.extend(excludes.iter().cloned());

        if inner.excludes.contains(&detection.name) {
            debug!("组件 [{}] 已被排除，不写入结果", detection.name);
            return false;
        }
        inner.results.push(ScanRecord::Component(detection));
        true
    }

    pub fn implies(&self) -> Vec<String> {
        self.lock().implies.iter().cloned().collect()
    }

    pub fn excludes(&self) -> Vec<String> {
        self.lock().excludes.iter().cloned().collect()
    }

    pub fn results(&self) -> Vec<ScanRecord> {
        self.lock().results.clone()
    }

    pub fn into_results(self) -> Vec<ScanRecord> {
        self.inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(records: &[ScanRecord]) -> Vec<&str> {
        records.iter().map(ScanRecord::name).collect()
    }

    #[test]
    fn test_exclusion_is_not_retroactive() {
        let state = ScanState::new();
        assert!(state.record(&[], &[], Detection::from_name("Joomla".to_string())));
        assert!(state.record(&[], &["Joomla".to_string()], Detection::from_name("WordPress".to_string())));
        // 之后再出现的 Joomla 被排除，之前的保留
        assert!(!state.record(&[], &[], Detection::from_name("Joomla".to_string())));
        assert_eq!(names(&state.results()), vec!["Joomla", "WordPress"]);
    }

    #[test]
    fn test_self_exclusion_and_implies_merge() {
        let state = ScanState::new();
        let appended = state.record(
            &["PHP".to_string(), "MySQL".to_string()],
            &["Legacy".to_string()],
            Detection::from_name("Legacy".to_string()),
        );
        assert!(!appended);
        assert_eq!(state.implies(), vec!["MySQL".to_string(), "PHP".to_string()]);
        assert_eq!(state.excludes(), vec!["Legacy".to_string()]);
        assert!(state.into_results().is_empty());
    }
}
