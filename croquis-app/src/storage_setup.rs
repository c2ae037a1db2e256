use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use croquis_config::StorageConfig;
use croquis_frontend::store_locator::StoreLocator;
use tracing::info;

/// 确保存储目录与缓存目录存在；`auto_create` 关闭时缺失目录视为错误。
pub fn prepare_storage(config: &StorageConfig) -> Result<Vec<PathBuf>, StorageSetupError> {
    let locator = StoreLocator::from_config(config);
    prepare_dirs(
        [locator.root(), locator.cache_root()].into_iter().flatten(),
        config.auto_create,
    )
}

fn prepare_dirs<'a, I>(dirs: I, auto_create: bool) -> Result<Vec<PathBuf>, StorageSetupError>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut prepared = Vec::new();
    for dir in dirs {
        let target = normalize_path(dir)?;
        if !target.is_dir() {
            if !auto_create {
                return Err(StorageSetupError::AutoCreateDisabled { target });
            }
            fs::create_dir_all(&target).map_err(|error| StorageSetupError::CreateFailed {
                target: target.clone(),
                error,
            })?;
            info!(target = %target.display(), "已创建草图存储目录");
        }
        prepared.push(target);
    }
    Ok(prepared)
}

fn normalize_path(path: &Path) -> Result<PathBuf, StorageSetupError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = env::current_dir().map_err(|error| StorageSetupError::Io { error })?;
        Ok(cwd.join(path))
    }
}

#[derive(Debug)]
pub enum StorageSetupError {
    AutoCreateDisabled {
        target: PathBuf,
    },
    CreateFailed {
        target: PathBuf,
        error: std::io::Error,
    },
    Io {
        error: std::io::Error,
    },
}

impl Display for StorageSetupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageSetupError::AutoCreateDisabled { target } => {
                write!(
                    f,
                    "目录 {} 不存在且 auto_create 已关闭",
                    target.display()
                )
            }
            StorageSetupError::CreateFailed { target, error } => {
                write!(f, "创建目录 {} 失败: {}", target.display(), error)
            }
            StorageSetupError::Io { error } => {
                write!(f, "I/O 错误: {error}")
            }
        }
    }
}

impl Error for StorageSetupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dirs_are_created_when_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let cache = dir.path().join("nested").join("cache");

        let prepared = prepare_dirs([store.as_path(), cache.as_path()], true).unwrap();
        assert_eq!(prepared, vec![store.clone(), cache.clone()]);
        assert!(store.is_dir());
        assert!(cache.is_dir());
    }

    #[test]
    fn missing_dir_is_an_error_without_auto_create() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let err = prepare_dirs([store.as_path()], false).unwrap_err();
        assert!(matches!(err, StorageSetupError::AutoCreateDisabled { .. }));
        assert!(!store.exists());

        // 已存在的目录不受 auto_create 影响
        assert_eq!(prepare_dirs([dir.path()], false).unwrap().len(), 1);
    }
}
