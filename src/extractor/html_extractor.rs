//! HTML标签提取器
//! 负责从HTML中提取script-src、meta标签和title

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts
};
use markup5ever::interface::Attribute;
use tendril::StrTendril;

/// 提取结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlDocument {
    /// script-src，按文档顺序
    pub script_srcs: Vec<String>,
    /// meta name -> content，重复时后者覆盖
    pub meta: HashMap<String, String>,
    /// 第一个title的文本（已去除首尾空白）
    pub title: String,
}

#[derive(Debug, Default, Clone)]
pub struct HtmlExtractor {
    script_srcs: RefCell<Vec<String>>,
    meta: RefCell<HashMap<String, String>>,
    title: RefCell<Option<String>>,
    in_title: Cell<bool>,
}

impl TokenSink for HtmlExtractor {
    type Handle = ();

    fn process_token(&self, token: Token, _line: u64) -> TokenSinkResult<()> {
        match token {
            Token::TagToken(Tag { kind: TagKind::StartTag, name, attrs, .. }) => match name.as_ref() {
                // 标签内容按原始文本处理，内联脚本中的标记不会被当作真实标签
                "script" => {
                    self.extract_script_src(&attrs);
                    return TokenSinkResult::RawData(RawKind::ScriptData);
                }
                "meta" => self.extract_meta_tag(&attrs),
                "title" => {
                    if self.title.borrow().is_none() {
                        *self.title.borrow_mut() = Some(String::new());
                        self.in_title.set(true);
                    }
                    return TokenSinkResult::RawData(RawKind::Rcdata);
                }
                "textarea" => return TokenSinkResult::RawData(RawKind::Rcdata),
                "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                    return TokenSinkResult::RawData(RawKind::Rawtext);
                }
                _ => {}
            },
            Token::TagToken(Tag { kind: TagKind::EndTag, name, .. }) if name.as_ref() == "title" => {
                self.in_title.set(false);
            }
            Token::CharacterTokens(text) if self.in_title.get() => {
                if let Some(title) = self.title.borrow_mut().as_mut() {
                    title.push_str(&text);
                }
            }
            _ => {}
        }
        TokenSinkResult::Continue
    }
}

impl HtmlExtractor {
    /// 创建新的提取器
    pub fn new() -> Self {
        Self::default()
    }

    /// 从HTML字符串提取标签
    pub fn extract(&self, html: &str) -> HtmlDocument {
        let tokenizer = Tokenizer::new(self.clone(), TokenizerOpts::default());
        let queue = BufferQueue::default();
        queue.push_back(StrTendril::from(html));

        let _ = tokenizer.feed(&queue);
        tokenizer.end();

        tokenizer.sink.into_document()
    }

    fn into_document(self) -> HtmlDocument {
        HtmlDocument {
            script_srcs: self.script_srcs.into_inner(),
            meta: self.meta.into_inner(),
            title: self.title.into_inner().map(|t| t.trim().to_string()).unwrap_or_default(),
        }
    }

    /// 提取script-src
    fn extract_script_src(&self, attrs: &[Attribute]) {
        for attr in attrs {
            if attr.name.local.as_ref() == "src" {
                self.script_srcs.borrow_mut().push(attr.value.to_string());
                break;
            }
        }
    }

    /// 提取meta标签，缺少content时记为空串
    fn extract_meta_tag(&self, attrs: &[Attribute]) {
        let mut name = None;
        let mut content = None;

        for attr in attrs {
            match attr.name.local.as_ref() {
                "name" => name = Some(attr.value.to_string()),
                "content" => content = Some(attr.value.to_string()),
                _ => {}
            }
        }

        if let Some(n) = name.filter(|n| !n.is_empty()) {
            self.meta.borrow_mut().insert(n, content.unwrap_or_default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_extractor() {
        let html = r#"
            <html><head>
            <title>
                Example Portal
            </title>
            <script src="/jquery.min.js"></script>
            <meta name="author" content="test_user">
            <meta name="generator" content="WordPress 5.0" />
            <meta name="generator" content="WordPress 6.0" />
            <meta name="robots">
            <script>var inline = 1;</script>
            <script src="/vue.global.js"></script>
            </head></html>
        "#;

        let doc = HtmlExtractor::new().extract(html);

        assert_eq!(
            doc.script_srcs,
            vec!["/jquery.min.js".to_string(), "/vue.global.js".to_string()]
        );
        assert_eq!(doc.meta.get("author").map(String::as_str), Some("test_user"));
        assert_eq!(doc.meta.get("generator").map(String::as_str), Some("WordPress 6.0"));
        assert_eq!(doc.meta.get("robots").map(String::as_str), Some(""));
        assert_eq!(doc.title, "Example Portal");
    }

    #[test]
    fn test_markup_inside_inline_script_is_ignored() {
        let html = r#"<script>var t="<title>"; document.write('<script src="/fake.js"></scr'+'ipt>'); var m="<meta name='generator' content='Fake'>";</script><title>Real &amp; <b>bold</b></title><style>a { content: "<meta name='x' content='y'>" }</style>"#;

        let doc = HtmlExtractor::new().extract(html);

        assert!(doc.script_srcs.is_empty());
        assert!(doc.meta.is_empty());
        assert_eq!(doc.title, "Real & <b>bold</b>");
    }

    #[test]
    fn test_html_extractor_empty() {
        let doc = HtmlExtractor::new().extract("");
        assert_eq!(doc, HtmlDocument::default());
    }
}
