use std::env;
use std::path::{Path, PathBuf};

use croquis_config::StorageConfig;
use croquis_io::{FallbackStore, JsonDirectoryStore, MemorySketchStore, SketchStore};
use tracing::{debug, info};

const STORE_DIR_ENV: &str = "CROQUIS_STORE_DIR";

/// 决定草图存储的位置：环境变量优先于配置文件。
#[derive(Debug, Clone, Default)]
pub struct StoreLocator {
    root: Option<PathBuf>,
    cache_root: Option<PathBuf>,
}

impl StoreLocator {
    pub fn from_config(config: &StorageConfig) -> Self {
        let root = match env::var_os(STORE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => {
                let dir = PathBuf::from(dir);
                debug!(root = %dir.display(), "使用环境变量指定的存储目录");
                Some(dir)
            }
            _ => config.root.clone(),
        };
        Self::with_roots(root, config.cache_root.clone())
    }

    pub fn with_roots(root: Option<PathBuf>, cache_root: Option<PathBuf>) -> Self {
        // 缓存与主目录相同时没有意义
        let cache_root = cache_root.filter(|cache| Some(cache) != root.as_ref());
        Self { root, cache_root }
    }

    #[inline]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    #[inline]
    pub fn cache_root(&self) -> Option<&Path> {
        self.cache_root.as_deref()
    }

    #[inline]
    pub fn is_persistent(&self) -> bool {
        self.root.is_some() || self.cache_root.is_some()
    }

    /// 按配置组合存储：主目录加缓存目录、单一目录，或者进程内存储。
    pub fn open(&self) -> Box<dyn SketchStore> {
        match (&self.root, &self.cache_root) {
            (Some(root), Some(cache)) => {
                info!(root = %root.display(), cache = %cache.display(), "使用目录存储并启用本地缓存");
                Box::new(FallbackStore::new(
                    JsonDirectoryStore::new(root),
                    JsonDirectoryStore::new(cache),
                ))
            }
            (Some(root), None) | (None, Some(root)) => {
                info!(root = %root.display(), "使用目录存储");
                Box::new(JsonDirectoryStore::new(root))
            }
            (None, None) => {
                info!("未配置存储目录，草图只保存在内存中");
                Box::new(MemorySketchStore::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_equal_to_root_is_dropped() {
        let locator = StoreLocator::with_roots(Some("data".into()), Some("data".into()));
        assert_eq!(locator.root(), Some(Path::new("data")));
        assert!(locator.cache_root().is_none());
        assert!(locator.is_persistent());
        assert!(!StoreLocator::default().is_persistent());
    }

    #[test]
    fn opened_stores_share_the_same_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("remote");
        let cache = dir.path().join("cache");
        let locator = StoreLocator::with_roots(Some(root.clone()), Some(cache.clone()));

        let mut store = locator.open();
        let id = store.save("Barrio", &[], None).unwrap();
        assert!(root.join(format!("{id}.json")).is_file());
        assert!(cache.join(format!("{id}.json")).is_file());

        let mut memory = StoreLocator::default().open();
        let id = memory.save("Temporal", &[], None).unwrap();
        assert_eq!(memory.load(&id).unwrap().name, "Temporal");
    }
}
