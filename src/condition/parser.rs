//! 条件表达式解析器（递归下降）
//!
//! 语法：
//! ```text
//! expr   := term ( OR term )*
//! term   := factor ( AND factor )*
//! factor := NOT factor | '(' expr ')' | INDEX
//! ```
//! OR 为 `|`/`||`/`or`，AND 为 `&`/`&&`/`and`，NOT 为 `!`/`not`，关键字不区分大小写。

use super::expr::Expr;
use crate::error::{WebhuntError, WhResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Index(usize),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> WhResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '&' | '|' => {
                // && 与 || 视同单字符
                let doubled = chars.get(i + 1) == Some(&c);
                tokens.push(if c == '&' { Token::And } else { Token::Or });
                i += if doubled { 2 } else { 1 };
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let idx = literal
                    .parse::<usize>()
                    .map_err(|_| WebhuntError::ConditionError(format!("下标超出范围：{}", literal)))?;
                tokens.push(Token::Index(idx));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
                let token = match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => {
                        return Err(WebhuntError::ConditionError(format!(
                            "不支持的符号 '{}'（位置 {}）",
                            word, start
                        )));
                    }
                };
                tokens.push(token);
            }
            other => {
                return Err(WebhuntError::ConditionError(format!(
                    "不支持的字符 '{}'（位置 {}）",
                    other, i
                )));
            }
        }
    }

    Ok(tokens)
}

// 括号与取反的最大嵌套层数
const MAX_DEPTH: usize = 256;

/// 条件表达式解析器
pub struct Condition {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Condition {
    /// 解析表达式字符串为语法树
    pub fn parse(input: &str) -> WhResult<Expr> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(WebhuntError::ConditionError("条件表达式为空".to_string()));
        }

        let mut parser = Self { tokens, pos: 0, depth: 0 };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(WebhuntError::ConditionError(format!(
                "表达式 '{}' 在位置 {} 处存在多余的符号 {:?}",
                input, parser.pos, token
            )));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> WhResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> WhResult<Expr> {
        let mut lhs = self.parse_factor()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_factor()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> WhResult<Expr> {
        if self.depth >= MAX_DEPTH {
            return Err(WebhuntError::ConditionError(format!("表达式嵌套超过{}层", MAX_DEPTH)));
        }
        self.depth += 1;
        let expr = self.parse_primary();
        self.depth -= 1;
        expr
    }

    fn parse_primary(&mut self) -> WhResult<Expr> {
        match self.next() {
            Some(Token::Index(idx)) => Ok(Expr::Index(idx)),
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.parse_factor()?))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(WebhuntError::ConditionError("括号未闭合".to_string())),
                }
            }
            Some(token) => Err(WebhuntError::ConditionError(format!(
                "位置 {} 处出现意外的符号 {:?}",
                self.pos - 1,
                token
            ))),
            None => Err(WebhuntError::ConditionError("表达式意外结束".to_string())),
        }
    }
}
