use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use croquis_core::sketch::{Element, Sketch};
use tracing::{debug, info, warn};

use crate::{
    IoError, SketchRecord, SketchRecordRef, SketchStore, SketchSummary, new_sketch_id,
    validate_sketch_id,
};

const EXTENSION: &str = "json";

/// 每个草图一个 `<id>.json` 文件的目录存储。
#[derive(Debug, Clone)]
pub struct JsonDirectoryStore {
    root: PathBuf,
}

impl JsonDirectoryStore {
    /// 不检查目录是否存在；缺失的目录在首次保存时创建。
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 创建目录（若不存在）后返回存储。
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, IoError> {
        let store = Self::new(root);
        store.ensure_root()?;
        Ok(store)
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<(), IoError> {
        fs::create_dir_all(&self.root).map_err(|source| IoError::WriteError {
            path: self.root.clone(),
            source,
        })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, IoError> {
        validate_sketch_id(id)?;
        Ok(self.root.join(format!("{id}.{EXTENSION}")))
    }

    fn read_record(path: &Path) -> Result<SketchRecord, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| IoError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_existing(&self, id: &str) -> Result<(PathBuf, SketchRecord), IoError> {
        let path = self.path_for(id)?;
        if !path.is_file() {
            return Err(IoError::NotFound(id.to_string()));
        }
        let record = Self::read_record(&path)?;
        Ok((path, record))
    }

    /// 先写临时文件再改名，避免中途失败留下半截文件。
    fn write_record(&self, path: &Path, record: &SketchRecordRef<'_>) -> Result<(), IoError> {
        self.ensure_root()?;
        let data = serde_json::to_string_pretty(record).map_err(|source| IoError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, data).map_err(|source| IoError::WriteError {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, path).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl SketchStore for JsonDirectoryStore {
    fn list(&self) -> Result<Vec<SketchSummary>, IoError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(IoError::ReadError {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut found: Vec<(SystemTime, SketchSummary)> = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            match Self::read_record(&path) {
                Ok(record) => found.push((
                    modified,
                    SketchSummary {
                        id: record.id,
                        name: record.name,
                        element_count: record.elements.len(),
                    },
                )),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "跳过无法读取的草图文件");
                }
            }
        }

        found.sort_by(|(a_time, a), (b_time, b)| b_time.cmp(a_time).then_with(|| a.id.cmp(&b.id)));
        Ok(found.into_iter().map(|(_, summary)| summary).collect())
    }

    fn load(&self, id: &str) -> Result<Sketch, IoError> {
        let (path, record) = self.read_existing(id)?;
        let sketch = record.into_sketch();
        debug!(path = %path.display(), elements = sketch.len(), "已读取草图文件");
        Ok(sketch)
    }

    fn save(&mut self, name: &str, elements: &[Element], id: Option<&str>) -> Result<String, IoError> {
        let id = match id {
            Some(id) => id.to_string(),
            None => new_sketch_id(),
        };
        let path = self.path_for(&id)?;
        self.write_record(
            &path,
            &SketchRecordRef {
                id: &id,
                name,
                elements,
            },
        )?;
        info!(id = %id, elements = elements.len(), "草图已保存");
        Ok(id)
    }

    fn delete(&mut self, id: &str) -> Result<(), IoError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(id, "草图已删除");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(IoError::NotFound(id.to_string())),
            Err(source) => Err(IoError::WriteError { path, source }),
        }
    }

    fn rename(&mut self, id: &str, name: &str) -> Result<(), IoError> {
        let (path, record) = self.read_existing(id)?;
        self.write_record(
            &path,
            &SketchRecordRef {
                id: &record.id,
                name,
                elements: &record.elements,
            },
        )?;
        info!(id, name, "草图已重命名");
        Ok(())
    }
}
