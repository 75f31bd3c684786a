//! 请求结果模型
//! FetchedResource 一经写入缓存即不可变，以 Arc 形式在worker之间共享

use std::collections::HashMap;

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::extractor::HtmlExtractor;
use crate::utils::{HeaderConverter, md5_hex};

// 只在响应体开头查找 meta 声明的编码
const CHARSET_SNIFF_LEN: usize = 1024;

static META_CHARSET_REGEX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([a-z0-9_\-:.]+)"#).ok()
});

/// 传输层返回的原始响应
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// 结构化后的请求结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub url: String,
    pub body: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub script: Vec<String>,
    pub meta: HashMap<String, String>,
    pub title: String,
    pub cookies: HashMap<String, String>,
    pub raw_cookies: String,
    pub raw_response: String,
    pub raw_headers: String,
    pub md5: String,
}

impl FetchedResource {
    /// 解析原始响应
    pub fn from_raw(url: &str, raw: RawResponse) -> Self {
        let body = decode_body(&raw.headers, &raw.body);
        let doc = HtmlExtractor::new().extract(&body);
        let raw_headers = HeaderConverter::raw_block(&raw.headers);

        Self {
            url: url.to_string(),
            status: raw.status,
            script: doc.script_srcs,
            meta: doc.meta,
            title: doc.title,
            cookies: HeaderConverter::parse_cookies(&raw.headers),
            raw_cookies: HeaderConverter::raw_cookies(&raw.headers),
            raw_response: format!("{}{}", raw_headers, body),
            raw_headers,
            md5: md5_hex(&raw.body),
            headers: raw.headers,
            body,
        }
    }

    /// Header查找（名称忽略大小写）
    pub fn header(&self, name: &str) -> Option<&str> {
        HeaderConverter::lookup(&self.headers, name)
    }
}

/// 按 Content-Type 的 charset 解码响应体，其次参考 meta 声明，默认 UTF-8；无法解码的字节替换为 U+FFFD
fn decode_body(headers: &[(String, String)], body: &[u8]) -> String {
    let encoding = HeaderConverter::lookup(headers, "content-type")
        .and_then(charset_from_content_type)
        .or_else(|| sniff_meta_charset(body))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Encoding::for_label(value.trim().trim_matches(|c: char| c == '"' || c == '\'').as_bytes())
    })
}

fn sniff_meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&body[..body.len().min(CHARSET_SNIFF_LEN)]);
    let regex = META_CHARSET_REGEX.as_ref()?;
    let label = regex.captures(&head)?.get(1)?.as_str().to_string();
    Encoding::for_label(label.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        let raw = RawResponse {
            status: 200,
            headers: vec![
                ("Server".to_string(), "Apache".to_string()),
                ("Set-Cookie".to_string(), "sid=1; Path=/".to_string()),
            ],
            body: b"<title> Hi </title><script src=\"/a.js\"></script>".to_vec(),
        };
        let res = FetchedResource::from_raw("http://127.0.0.1/", raw);
        assert_eq!(res.status, 200);
        assert_eq!(res.title, "Hi");
        assert_eq!(res.script, vec!["/a.js".to_string()]);
        assert_eq!(res.header("server"), Some("Apache"));
        assert_eq!(res.raw_cookies, "sid=1; Path=/");
        assert_eq!(res.cookies.get("sid").map(String::as_str), Some("1"));
        assert_eq!(res.raw_headers, "Server: Apache\nSet-Cookie: sid=1; Path=/");
        assert!(res.raw_response.starts_with("Server: Apache\n"));
        assert!(res.raw_response.ends_with("</script>"));
        assert_eq!(res.md5, md5_hex(res.body.as_bytes()));
    }

    fn gbk_page(content_type: Option<&str>, head: &[u8]) -> RawResponse {
        let mut body = head.to_vec();
        // "管理" 的 GBK 编码
        body.extend_from_slice(b"<title>\xb9\xdc\xc0\xed</title>");
        RawResponse {
            status: 200,
            headers: content_type
                .map(|ct| vec![("Content-Type".to_string(), ct.to_string())])
                .unwrap_or_default(),
            body,
        }
    }

    #[test]
    fn test_decode_by_header_charset() {
        let raw = gbk_page(Some("text/html; charset=\"GBK\""), b"");
        let digest = md5_hex(&raw.body);
        let res = FetchedResource::from_raw("http://127.0.0.1/", raw);
        assert_eq!(res.title, "管理");
        assert!(res.body.contains("管理"));
        // md5 仍按原始字节计算
        assert_eq!(res.md5, digest);
    }

    #[test]
    fn test_decode_by_meta_charset() {
        let raw = gbk_page(Some("text/html"), br#"<meta http-equiv="Content-Type" content="text/html; charset=gb2312">"#);
        assert_eq!(FetchedResource::from_raw("http://127.0.0.1/", raw).title, "管理");

        let raw = gbk_page(None, b"<meta charset=gbk>");
        assert_eq!(FetchedResource::from_raw("http://127.0.0.1/", raw).title, "管理");
    }

    #[test]
    fn test_default_utf8_is_lossy() {
        let raw = gbk_page(None, b"");
        let res = FetchedResource::from_raw("http://127.0.0.1/", raw);
        assert!(res.title.contains('\u{fffd}'));
        assert_ne!(res.title, "管理");

        let raw = gbk_page(Some("text/html; charset=utf-8"), "中文".as_bytes());
        assert!(FetchedResource::from_raw("http://127.0.0.1/", raw).body.starts_with("中文"));
    }
}
