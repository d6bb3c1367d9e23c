use thiserror::Error;

/// 文档层错误类型
#[derive(Error, Debug)]
pub enum DocumentError {
    /// 资源读写错误
    #[error("IO error on '{resource}': {source}")]
    Io {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    /// XML 解析/写出错误
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// 属性语法错误
    #[error("Attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// 非 UTF-8 内容
    #[error("Encoding error: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// 结束标签与开始标签不匹配
    #[error("Unexpected end tag </{0}>")]
    MismatchedEnd(String),

    /// 文档缺少根元素
    #[error("Document has no root element")]
    NoRoot,

    /// 资源不存在
    #[error("Resource not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, DocumentError>;
