//! 规则级检测：逐条执行 match，按条件表达式（或默认的"任一命中"）判定规则是否命中

use tracing::debug;

use super::matcher::MatchEvaluator;
use super::state::ScanState;
use crate::condition;
use crate::error::WhResult;
use crate::rule::{Detection, Rule};

/// 规则检测器
#[derive(Clone)]
pub struct RuleEvaluator {
    matcher: MatchEvaluator,
}

impl RuleEvaluator {
    pub fn new(matcher: MatchEvaluator) -> Self {
        Self { matcher }
    }

    /// 检测单条规则，命中时返回结果；条件表达式非法时返回 ConditionError
    pub async fn check_matches(&self, rule: &Rule) -> WhResult<Option<Detection>> {
        let mut hits = Vec::with_capacity(rule.matches.len());
        let mut version = None;

        for descriptor in &rule.matches {
            let outcome = self.matcher.check_match(descriptor).await;
            hits.push(outcome.matched);
            // 后出现的非空版本覆盖先前的
            if let Some(v) = outcome.version.filter(|v| !v.is_empty()) {
                version = Some(v);
            }
        }

        let matched = match rule.condition() {
            None => condition::any_match(&hits),
            Some(expr) => condition::evaluate(expr, &hits)?,
        };
        debug!("规则 [{}] 检测结果：{:?} -> {}", rule.name, hits, matched);

        Ok(matched.then(|| Detection { name: rule.name.clone(), version }))
    }

    /// 检测规则并写入共享状态
    pub async fn process_rule(&self, rule: &Rule, state: &ScanState) -> WhResult<bool> {
        let Some(detection) = self.check_matches(rule).await? else {
            return Ok(false);
        };
        Ok(state.record(rule.implies(), rule.excludes(), detection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WebhuntError;
    use crate::fetcher::testing::StubTransport;
    use crate::fetcher::{Fetcher, RequestCache};
    use std::sync::Arc;

    const TARGET: &str = "http://127.0.0.1/";

    fn evaluator() -> RuleEvaluator {
        let stub = Arc::new(StubTransport::new().page(TARGET, 200, "Powered by Foo v1.2 | Bar 2.0"));
        let fetcher = Fetcher::new(stub, Arc::new(RequestCache::new()));
        RuleEvaluator::new(MatchEvaluator::new(fetcher, TARGET.to_string(), false))
    }

    fn rule(raw: &str) -> Rule {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn test_default_or_policy() {
        let eval = evaluator();
        let hit = rule(r#"{"name":"Foo","matches":[{"text":"absent"},{"text":"Foo"}]}"#);
        let miss = rule(r#"{"name":"Foo","matches":[{"text":"absent"},{"status":500}]}"#);
        let empty = rule(r#"{"name":"Empty","matches":[]}"#);

        assert!(eval.check_matches(&hit).await.unwrap().is_some());
        assert!(eval.check_matches(&miss).await.unwrap().is_none());
        assert!(eval.check_matches(&empty).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_condition_expression() {
        let eval = evaluator();
        let both = rule(r#"{"name":"Foo","condition":"0 and 1","matches":[{"text":"Foo"},{"text":"absent"}]}"#);
        let negated = rule(r#"{"name":"Foo","condition":"0 & !1","matches":[{"text":"Foo"},{"text":"absent"}]}"#);
        assert!(eval.check_matches(&both).await.unwrap().is_none());
        assert!(eval.check_matches(&negated).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_bad_condition_is_an_error() {
        let eval = evaluator();
        let bad = rule(r#"{"name":"Foo","condition":"0 | 3","matches":[{"text":"Foo"}]}"#);
        assert!(matches!(eval.check_matches(&bad).await, Err(WebhuntError::ConditionError(_))));
    }

    #[tokio::test]
    async fn test_later_version_wins() {
        let eval = evaluator();
        let r = rule(
            r#"{"name":"Foo","matches":[
                {"regexp":"Foo v([0-9.]+)"},
                {"text":"Bar","version":""},
                {"regexp":"Bar ([0-9.]+)"},
                {"text":"absent","version":"9.9"}
            ]}"#,
        );
        let detection = eval.check_matches(&r).await.unwrap().unwrap();
        assert_eq!(detection.version.as_deref(), Some("2.0"));
    }

    #[tokio::test]
    async fn test_process_rule_updates_state() {
        let eval = evaluator();
        let state = ScanState::new();
        let r = rule(r#"{"name":"Foo","implies":["PHP"],"excludes":"Bar","matches":[{"text":"Foo"}]}"#);
        let miss = rule(r#"{"name":"Baz","implies":"Nope","matches":[{"text":"absent"}]}"#);

        assert!(eval.process_rule(&r, &state).await.unwrap());
        assert!(!eval.process_rule(&miss, &state).await.unwrap());
        assert_eq!(state.implies(), vec!["PHP".to_string()]);
        assert_eq!(state.excludes(), vec!["Bar".to_string()]);
        assert_eq!(state.results().len(), 1);
    }
}
