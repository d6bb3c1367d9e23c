//! 文档资源存储
//!
//! 持久化采用"读取-修改-整体写回"模型，同一资源上的并发写回必须串行化：
//! 所有修改都应通过 [`modify`] 在存储的互斥区内完成。

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::{Document, DocumentError, Result};

/// 文档存储 trait
///
/// 资源以字符串标识，具体含义由实现决定 (文件路径、内存键等)。
pub trait DocumentStore: Send + Sync {
    /// 读取并解析资源
    fn load(&self, resource: &str) -> Result<Document>;

    /// 序列化文档并整体写回资源
    fn store(&self, resource: &str, document: &Document) -> Result<()>;

    /// 进入写回互斥区
    fn lock(&self) -> MutexGuard<'_, ()>;
}

/// 在互斥区内对资源执行一次完整的读取-修改-写回
///
/// 闭包返回错误时不会写回。
pub fn modify<S, T, E, F>(store: &S, resource: &str, f: F) -> std::result::Result<T, E>
where
    S: DocumentStore + ?Sized,
    E: From<DocumentError>,
    F: FnOnce(&mut Document) -> std::result::Result<T, E>,
{
    let _guard = store.lock();
    let mut document = store.load(resource)?;
    let output = f(&mut document)?;
    store.store(resource, &document)?;
    Ok(output)
}

fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    // 互斥锁不保护数据，中毒后可直接继续使用
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 基于文件系统的存储，资源即文件路径
#[derive(Debug, Default)]
pub struct FileStore {
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for FileStore {
    fn load(&self, resource: &str) -> Result<Document> {
        let content = fs::read_to_string(Path::new(resource)).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                DocumentError::NotFound(resource.to_string())
            } else {
                DocumentError::Io {
                    resource: resource.to_string(),
                    source,
                }
            }
        })?;
        Document::parse(&content)
    }

    fn store(&self, resource: &str, document: &Document) -> Result<()> {
        let xml = document.to_xml()?;
        fs::write(Path::new(resource), xml).map_err(|source| DocumentError::Io {
            resource: resource.to_string(),
            source,
        })?;
        debug!("文档已写回: {}", resource);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        acquire(&self.write_lock)
    }
}

/// 内存存储，资源为任意键
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, String>>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以原始 XML 文本预置资源
    pub fn insert(&self, resource: &str, xml: impl Into<String>) {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(resource.to_string(), xml.into());
    }

    /// 读取资源当前的原始 XML 文本
    pub fn contents(&self, resource: &str) -> Option<String> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(resource)
            .cloned()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, resource: &str) -> Result<Document> {
        let xml = self
            .contents(resource)
            .ok_or_else(|| DocumentError::NotFound(resource.to_string()))?;
        Document::parse(&xml)
    }

    fn store(&self, resource: &str, document: &Document) -> Result<()> {
        let xml = document.to_xml()?;
        self.insert(resource, xml);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        acquire(&self.write_lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_modify() {
        let store = MemoryStore::new();
        store.insert("run", r#"<run><global_config rerun="3"/></run>"#);

        modify(&store, "run", |doc| -> Result<()> {
            let config = doc.root_mut().at_path_mut(&[0]).unwrap();
            config.set_attribute("rerun", "2");
            Ok(())
        })
        .unwrap();

        assert_eq!(
            store.contents("run").unwrap(),
            r#"<run><global_config rerun="2"/></run>"#
        );
    }

    #[test]
    fn test_modify_error_skips_store() {
        let store = MemoryStore::new();
        store.insert("run", "<run/>");

        let result = modify(&store, "run", |doc| -> Result<()> {
            doc.root_mut().set_attribute("touched", "yes");
            Err(DocumentError::NoRoot)
        });

        assert!(result.is_err());
        assert_eq!(store.contents("run").unwrap(), "<run/>");
    }

    #[test]
    fn test_missing_resource() {
        let store = MemoryStore::new();
        assert!(matches!(store.load("nope"), Err(DocumentError::NotFound(_))));

        let files = FileStore::new();
        assert!(matches!(
            files.load("/nonexistent/ack/run.xml"),
            Err(DocumentError::NotFound(_))
        ));
    }
}
