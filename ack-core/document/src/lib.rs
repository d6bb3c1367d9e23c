//! ACK 文档层
//!
//! 认证运行文件的结构化文档抽象：读取节点属性、遍历子元素、读写文本、
//! 按标签查找节点，以及把整棵树写回资源。模型层只依赖这里暴露的操作。

mod error;
mod node;
mod store;
mod xml;

pub use error::{DocumentError, Result};
pub use node::{Attribute, Element, Node, NodePath, Text};
pub use store::{modify, DocumentStore, FileStore, MemoryStore};
pub use xml::Document;
