use std::path::{Path, PathBuf};

use croquis_core::sketch::{Element, Sketch};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod directory;
mod fallback;
pub mod legacy;
mod memory;

pub use directory::JsonDirectoryStore;
pub use fallback::FallbackStore;
pub use legacy::LegacyFacade;
pub use memory::MemorySketchStore;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid sketch data in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error("sketch {0} not found")]
    NotFound(String),
    #[error("invalid sketch id {0:?}: only ASCII letters, digits, '-' and '_' are allowed")]
    InvalidId(String),
    #[error("sketch {id} was only written to the local cache: {source}")]
    CachedOnly {
        id: String,
        #[source]
        source: Box<IoError>,
    },
}

impl IoError {
    /// 保存未完成但已分配的 id。调用方应记住它，重试时整体替换而不是再次新建。
    pub fn assigned_id(&self) -> Option<&str> {
        match self {
            IoError::CachedOnly { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// 草图列表中的一项。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchSummary {
    pub id: String,
    pub name: String,
    pub element_count: usize,
}

/// 草图持久化边界。编辑器只依赖该接口，具体存储以参数方式注入。
pub trait SketchStore {
    /// 按最近修改时间倒序列出草图。无法读取的条目被跳过而不是报错。
    fn list(&self) -> Result<Vec<SketchSummary>, IoError>;
    fn load(&self, id: &str) -> Result<Sketch, IoError>;
    /// `id` 为空表示新建，否则整体替换（不存在时创建）。返回最终的 id。
    fn save(&mut self, name: &str, elements: &[Element], id: Option<&str>) -> Result<String, IoError>;
    fn delete(&mut self, id: &str) -> Result<(), IoError>;
    fn rename(&mut self, id: &str, name: &str) -> Result<(), IoError>;
}

impl<S: SketchStore + ?Sized> SketchStore for Box<S> {
    fn list(&self) -> Result<Vec<SketchSummary>, IoError> {
        (**self).list()
    }

    fn load(&self, id: &str) -> Result<Sketch, IoError> {
        (**self).load(id)
    }

    fn save(&mut self, name: &str, elements: &[Element], id: Option<&str>) -> Result<String, IoError> {
        (**self).save(name, elements, id)
    }

    fn delete(&mut self, id: &str) -> Result<(), IoError> {
        (**self).delete(id)
    }

    fn rename(&mut self, id: &str, name: &str) -> Result<(), IoError> {
        (**self).rename(id, name)
    }
}

/// 从单个文件读取草图，用于导入外部数据。
pub trait SketchLoader {
    fn load(&self, path: &Path) -> Result<Sketch, IoError>;
}

/// 生成新的草图 id。
pub fn new_sketch_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 草图 id 会作为文件名使用，只允许 `[A-Za-z0-9_-]+`。
pub fn validate_sketch_id(id: &str) -> Result<(), IoError> {
    let valid = !id.is_empty()
        && id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
    if valid {
        Ok(())
    } else {
        Err(IoError::InvalidId(id.to_string()))
    }
}

/// 落盘格式：草图 id、名称与元素序列。
#[derive(Debug, Serialize)]
struct SketchRecordRef<'a> {
    id: &'a str,
    name: &'a str,
    elements: &'a [Element],
}

#[derive(Debug, Deserialize)]
struct SketchRecord {
    id: String,
    name: String,
    #[serde(default)]
    elements: Vec<Element>,
}

impl SketchRecord {
    fn into_sketch(self) -> Sketch {
        Sketch::from_elements(Some(self.id), self.name, self.elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sketch_ids_are_validated() {
        assert!(validate_sketch_id("abc-123_X").is_ok());
        assert!(matches!(validate_sketch_id(""), Err(IoError::InvalidId(_))));
        assert!(matches!(
            validate_sketch_id("../escape"),
            Err(IoError::InvalidId(_))
        ));
        assert!(validate_sketch_id("with space").is_err());
    }

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let first = new_sketch_id();
        let second = new_sketch_id();
        assert_ne!(first, second);
        assert!(validate_sketch_id(&first).is_ok());
    }
}
