//! implies 推导：扫描结束后把被其它组件隐含、且规则库中存在的组件补入结果

use tracing::debug;

use super::state::ScanState;
use crate::rule::{Detection, RuleStore};

/// 处理累计的 implies 集合，返回实际追加的数量
pub fn resolve_implies(store: &RuleStore, state: &ScanState) -> usize {
    let mut appended = 0;

    for name in state.implies() {
        let Some(rule) = store.get(&name) else {
            debug!("隐含组件 [{}] 不在规则库中，已忽略", name);
            continue;
        };
        // 被推导的组件自身的 excludes 同样生效，其 implies 不再展开
        if state.record(&[], rule.excludes(), Detection::from_name(name)) {
            appended += 1;
        }
    }

    appended
}
