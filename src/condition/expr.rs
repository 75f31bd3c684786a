//! 条件表达式语法树

use crate::error::{WebhuntError, WhResult};

/// 条件表达式节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// 第 n 条 match 的命中结果
    Index(usize),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// 按 match 命中结果求值；引用了不存在的下标时报错
    pub fn eval(&self, results: &[bool]) -> WhResult<bool> {
        match self {
            Expr::Index(idx) => results.get(*idx).copied().ok_or_else(|| {
                WebhuntError::ConditionError(format!(
                    "条件引用了不存在的match下标 {}（共{}条）",
                    idx,
                    results.len()
                ))
            }),
            Expr::Not(inner) => Ok(!inner.eval(results)?),
            // 两侧都求值，保证非法下标总能被发现
            Expr::And(lhs, rhs) => {
                let l = lhs.eval(results)?;
                let r = rhs.eval(results)?;
                Ok(l && r)
            }
            Expr::Or(lhs, rhs) => {
                let l = lhs.eval(results)?;
                let r = rhs.eval(results)?;
                Ok(l || r)
            }
        }
    }
}
