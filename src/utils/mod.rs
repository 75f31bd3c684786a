//! 工具模块
pub mod digest;
pub mod header_converter;
pub mod url_composer;

pub use self::digest::md5_hex;
pub use self::header_converter::HeaderConverter;
pub use self::url_composer::compose_url;
