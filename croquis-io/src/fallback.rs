use croquis_core::sketch::{Element, Sketch};
use tracing::{debug, warn};

use crate::{IoError, SketchStore, SketchSummary, new_sketch_id};

/// 主存储加本地缓存的组合。
///
/// 读操作优先访问主存储，失败时改由缓存提供并记录警告。
/// 保存总是同步到缓存；主存储失败时返回带有已分配 id 的 [`IoError::CachedOnly`]，
/// 调用方据此保留未保存状态并在重试时沿用该 id。删除与重命名只在主存储成功后同步缓存。
#[derive(Debug, Clone)]
pub struct FallbackStore<P, C> {
    primary: P,
    cache: C,
}

impl<P, C> FallbackStore<P, C>
where
    P: SketchStore,
    C: SketchStore,
{
    pub fn new(primary: P, cache: C) -> Self {
        Self { primary, cache }
    }

    #[inline]
    pub fn primary(&self) -> &P {
        &self.primary
    }

    #[inline]
    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn into_parts(self) -> (P, C) {
        (self.primary, self.cache)
    }

    fn mirror(&mut self, name: &str, elements: &[Element], id: &str) -> bool {
        match self.cache.save(name, elements, Some(id)) {
            Ok(_) => true,
            Err(err) => {
                warn!(id, error = %err, "写入本地缓存失败");
                false
            }
        }
    }
}

impl<P, C> SketchStore for FallbackStore<P, C>
where
    P: SketchStore,
    C: SketchStore,
{
    fn list(&self) -> Result<Vec<SketchSummary>, IoError> {
        match self.primary.list() {
            Ok(list) => Ok(list),
            Err(err) => {
                warn!(error = %err, "主存储不可用，改用本地缓存列出草图");
                self.cache.list()
            }
        }
    }

    fn load(&self, id: &str) -> Result<Sketch, IoError> {
        match self.primary.load(id) {
            Ok(sketch) => Ok(sketch),
            Err(err) => {
                warn!(id, error = %err, "主存储读取失败，改用本地缓存");
                self.cache.load(id)
            }
        }
    }

    fn save(&mut self, name: &str, elements: &[Element], id: Option<&str>) -> Result<String, IoError> {
        // 新建时预先分配 id，保证主存储与缓存使用同一个 id
        let id = id.map_or_else(new_sketch_id, str::to_string);
        let result = self.primary.save(name, elements, Some(id.as_str()));
        let cached = self.mirror(name, elements, &id);
        match result {
            Ok(saved) => {
                debug!(id = %saved, "草图已同步到缓存");
                Ok(saved)
            }
            Err(err) if cached => {
                warn!(id = %id, error = %err, "主存储保存失败，仅写入本地缓存");
                Err(IoError::CachedOnly {
                    id,
                    source: Box::new(err),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// 主存储删除成功后才清理缓存；主存储没有该草图时（离线新建）只删除缓存。
    fn delete(&mut self, id: &str) -> Result<(), IoError> {
        match self.primary.delete(id) {
            Ok(()) => {
                match self.cache.delete(id) {
                    Ok(()) | Err(IoError::NotFound(_)) => {}
                    Err(err) => warn!(id, error = %err, "从本地缓存删除失败"),
                }
                Ok(())
            }
            Err(IoError::NotFound(_)) => self.cache.delete(id),
            Err(err) => Err(err),
        }
    }

    fn rename(&mut self, id: &str, name: &str) -> Result<(), IoError> {
        match self.primary.rename(id, name) {
            Ok(()) => {
                match self.cache.rename(id, name) {
                    Ok(()) | Err(IoError::NotFound(_)) => {}
                    Err(err) => warn!(id, error = %err, "本地缓存重命名失败"),
                }
                Ok(())
            }
            Err(IoError::NotFound(_)) => self.cache.rename(id, name),
            Err(err) => Err(err),
        }
    }
}
