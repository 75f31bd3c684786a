//! Header格式转换工具
//! 负责把响应Header整理为有序键值对、原始Header文本以及Cookie映射

use std::collections::HashMap;

use reqwest::header::HeaderMap;
use tracing::warn;

// Header数量上限，超出部分丢弃
const MAX_HEADER_COUNT: usize = 1000;

/// Header转换工具
pub struct HeaderConverter;

impl HeaderConverter {
    /// 将HeaderMap转换为有序的 (name, value) 列表，非UTF-8值按有损方式转换
    pub fn to_pairs(header_map: &HeaderMap) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(header_map.len());

        for (key, value) in header_map.iter() {
            if pairs.len() >= MAX_HEADER_COUNT {
                warn!("Header数量超过{}条，剩余部分已丢弃", MAX_HEADER_COUNT);
                break;
            }
            let value_str = match value.to_str() {
                Ok(v) => v.to_string(),
                Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
            };
            pairs.push((key.as_str().to_string(), value_str));
        }

        pairs
    }

    /// 拼接原始Header文本（"k: v" 按行拼接）
    pub fn raw_block(pairs: &[(String, String)]) -> String {
        pairs
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 查找Header（名称忽略大小写），取第一个
    pub fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 所有Set-Cookie拼接后的原始文本
    pub fn raw_cookies(pairs: &[(String, String)]) -> String {
        pairs
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 解析Set-Cookie得到 name -> value（只取每条的第一个键值对）
    pub fn parse_cookies(pairs: &[(String, String)]) -> HashMap<String, String> {
        let mut cookies = HashMap::new();
        for (_, value) in pairs.iter().filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie")) {
            let first = value.split(';').next().unwrap_or("");
            if let Some((name, val)) = first.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    cookies.insert(name.to_string(), val.trim().to_string());
                }
            }
        }
        cookies
    }
}
