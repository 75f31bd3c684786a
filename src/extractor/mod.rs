//! 提取模块：从HTML中提取结构化字段
pub mod html_extractor;

pub use self::html_extractor::{HtmlDocument, HtmlExtractor};
