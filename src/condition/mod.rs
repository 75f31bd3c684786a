//! 条件模块：组合单条规则内各 match 命中结果的布尔表达式
pub mod expr;
pub mod parser;

pub use self::expr::Expr;
pub use self::parser::Condition;

use crate::error::WhResult;

/// 解析并求值条件表达式
pub fn evaluate(expression: &str, results: &[bool]) -> WhResult<bool> {
    Condition::parse(expression)?.eval(results)
}

/// 未配置条件时的默认策略：任一 match 命中即可
pub fn any_match(results: &[bool]) -> bool {
    results.iter().any(|&hit| hit)
}
