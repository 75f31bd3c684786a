//! URL拼接工具

use url::Url;

use crate::error::WhResult;

/// 以目标URL为基准拼接相对路径（标准的相对URL解析规则）
pub fn compose_url(base: &str, path: &str) -> WhResult<String> {
    let base = Url::parse(base)?;
    Ok(base.join(path)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_url() {
        assert_eq!(compose_url("https://a.com/b", "/x").unwrap(), "https://a.com/x");
        assert_eq!(compose_url("https://a.com/b", "x").unwrap(), "https://a.com/x");
        assert_eq!(
            compose_url("https://github.com/torvalds/linux", "/test").unwrap(),
            "https://github.com/test"
        );
        assert_eq!(
            compose_url("https://github.com/torvalds/linux", "test").unwrap(),
            "https://github.com/torvalds/test"
        );
    }

    #[test]
    fn test_compose_url_invalid_base() {
        assert!(compose_url("not a url", "/x").is_err());
    }
}
