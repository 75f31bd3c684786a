//! 规则正则
//! 规则中的正则按 Python re 语法编写，regex 不支持的语法（环视、反向引用）退回 fancy-regex

use regex::{Regex, RegexBuilder};
use tracing::debug;

/// 编译后的规则正则（均忽略大小写）
#[derive(Debug, Clone)]
pub enum RulePattern {
    Plain(Regex),
    Fancy(fancy_regex::Regex),
}

impl RulePattern {
    /// 优先用 regex 编译，失败时尝试 fancy-regex；两者都失败时返回 fancy-regex 的错误
    pub fn compile(pattern: &str) -> Result<Self, fancy_regex::Error> {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => Ok(RulePattern::Plain(regex)),
            Err(e) => {
                debug!("regex 不支持该正则，改用 fancy-regex：{}，原因：{}", pattern, e);
                fancy_regex::Regex::new(&format!("(?i){}", pattern)).map(RulePattern::Fancy)
            }
        }
    }

    /// 捕获分组数量（不含整体匹配）
    pub fn group_count(&self) -> usize {
        match self {
            RulePattern::Plain(regex) => regex.captures_len() - 1,
            RulePattern::Fancy(regex) => regex.captures_len() - 1,
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.captures(text).is_some()
    }

    /// 第一处匹配的全部分组，下标 0 为整体匹配，未参与匹配的分组为空串
    pub fn captures(&self, text: &str) -> Option<Vec<String>> {
        let total = self.group_count() + 1;
        match self {
            RulePattern::Plain(regex) => {
                let caps = regex.captures(text)?;
                Some((0..total).map(|i| caps.get(i).map_or("", |m| m.as_str()).to_string()).collect())
            }
            RulePattern::Fancy(regex) => match regex.captures(text) {
                Ok(Some(caps)) => {
                    Some((0..total).map(|i| caps.get(i).map_or("", |m| m.as_str()).to_string()).collect())
                }
                Ok(None) => None,
                Err(e) => {
                    // 回溯超限按未命中处理
                    debug!("fancy-regex 匹配失败：{}", e);
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_pattern() {
        let pattern = RulePattern::compile("Powered BY (\\w+)").unwrap();
        assert!(matches!(pattern, RulePattern::Plain(_)));
        assert_eq!(pattern.group_count(), 1);
        assert_eq!(
            pattern.captures("x powered by nginx"),
            Some(vec!["powered by nginx".to_string(), "nginx".to_string()])
        );
    }

    #[test]
    fn test_lookaround_and_backreference_fall_back() {
        let lookbehind = RulePattern::compile("(?<=Foo) v1").unwrap();
        assert!(matches!(lookbehind, RulePattern::Fancy(_)));
        assert!(lookbehind.is_match("Foo v1"));
        assert!(!lookbehind.is_match("Bar v1"));

        let backref = RulePattern::compile(r#"<(\w+)>[^<]*</\1>"#).unwrap();
        assert_eq!(backref.captures("<b>x</b>").map(|c| c[1].clone()), Some("b".to_string()));
        assert!(!backref.is_match("<b>x</i>"));

        let lookahead = RulePattern::compile("jquery(?=-1)").unwrap();
        assert!(lookahead.is_match("jquery-1.12"));
        assert!(!lookahead.is_match("jquery-3.0"));
    }

    #[test]
    fn test_broken_pattern() {
        assert!(RulePattern::compile("(unclosed").is_err());
    }
}
