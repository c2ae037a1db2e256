use croquis_core::sketch::Sketch;
use croquis_engine::scene::{CloseOutcome, EditorSettings, Scene};
use croquis_io::{SketchStore, SketchSummary};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 切换草图时如何处理当前未保存的修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsavedChanges {
    /// 存在未保存修改时拒绝切换，返回 [`FrontendError::UnsavedChanges`]。
    Keep,
    /// 用户已确认放弃。
    Discard,
}

/// 打开的编辑器与注入的草图存储。
///
/// 存储失败不会改动编辑器状态：保存失败时脏标记保持不变，可以重试。
pub struct Workspace<S> {
    store: S,
    scene: Scene,
}

impl<S: SketchStore> Workspace<S> {
    pub fn new(store: S, settings: EditorSettings) -> Self {
        Self {
            store,
            scene: Scene::with_settings(settings),
        }
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn list(&self) -> Result<Vec<SketchSummary>, FrontendError> {
        Ok(self.store.list()?)
    }

    /// 开始一张未保存的新草图。
    pub fn new_sketch(
        &mut self,
        name: impl Into<String>,
        unsaved: UnsavedChanges,
    ) -> Result<(), FrontendError> {
        self.leave(unsaved)?;
        self.scene.load_sketch(Sketch::new(name));
        Ok(())
    }

    /// 读取失败时保留当前草图。
    pub fn open(&mut self, id: &str, unsaved: UnsavedChanges) -> Result<(), FrontendError> {
        self.leave(unsaved)?;
        let sketch = self.store.load(id).inspect_err(|err| {
            warn!(id, error = %err, "打开草图失败，保留当前编辑内容");
        })?;
        self.scene.load_sketch(sketch);
        Ok(())
    }

    /// 整体保存当前草图：首次保存创建新条目，之后替换原条目。
    pub fn save(&mut self) -> Result<String, FrontendError> {
        let sketch = self.scene.sketch();
        let result = self
            .store
            .save(&sketch.name, sketch.as_slice(), sketch.id.as_deref());
        match result {
            Ok(id) => {
                info!(id = %id, elements = sketch.len(), "草图已保存");
                self.scene.mark_saved(id.clone());
                Ok(id)
            }
            Err(err) => {
                warn!(error = %err, "保存草图失败，修改仍保留在编辑器中");
                // 已分配的 id 要留在草图上，重试时整体替换，避免重复新建
                if let Some(id) = err.assigned_id() {
                    self.scene.assign_id(id);
                }
                Err(err.into())
            }
        }
    }

    /// 重命名当前草图；已保存的草图同时更新存储。
    pub fn rename(&mut self, name: &str) -> Result<(), FrontendError> {
        if let Some(id) = self.scene.sketch().id.clone() {
            self.store.rename(&id, name)?;
        }
        self.scene.set_name(name);
        Ok(())
    }

    /// 删除存储中的草图；若正在编辑该草图，则切换为空草图。
    pub fn delete(&mut self, id: &str) -> Result<(), FrontendError> {
        self.store.delete(id)?;
        if self.scene.sketch().id.as_deref() == Some(id) {
            self.scene.reset();
        }
        Ok(())
    }

    /// 离开编辑器：提交未完成的图形并报告是否需要确认未保存的修改。
    pub fn close(&mut self) -> CloseOutcome {
        let outcome = self.scene.close();
        if outcome.needs_confirmation {
            info!(name = %self.scene.sketch().name, "存在未保存的修改");
        }
        outcome
    }

    fn leave(&mut self, unsaved: UnsavedChanges) -> Result<CloseOutcome, FrontendError> {
        let outcome = self.close();
        if outcome.needs_confirmation && unsaved == UnsavedChanges::Keep {
            return Err(FrontendError::UnsavedChanges {
                name: self.scene.sketch().name.clone(),
            });
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use croquis_core::geometry::Point2;
    use croquis_core::sketch::{Element, Sketch};
    use croquis_engine::draw::Tool;
    use croquis_io::{FallbackStore, IoError, MemorySketchStore};

    use super::*;

    /// 可以切换为失败状态的存储。
    #[derive(Default)]
    struct FlakyStore {
        inner: MemorySketchStore,
        offline: Rc<Cell<bool>>,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), IoError> {
            if self.offline.get() {
                Err(IoError::UnsupportedFeature("offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl SketchStore for FlakyStore {
        fn list(&self) -> Result<Vec<SketchSummary>, IoError> {
            self.check()?;
            self.inner.list()
        }

        fn load(&self, id: &str) -> Result<Sketch, IoError> {
            self.check()?;
            self.inner.load(id)
        }

        fn save(
            &mut self,
            name: &str,
            elements: &[Element],
            id: Option<&str>,
        ) -> Result<String, IoError> {
            self.check()?;
            self.inner.save(name, elements, id)
        }

        fn delete(&mut self, id: &str) -> Result<(), IoError> {
            self.check()?;
            self.inner.delete(id)
        }

        fn rename(&mut self, id: &str, name: &str) -> Result<(), IoError> {
            self.check()?;
            self.inner.rename(id, name)
        }
    }

    fn add_house(workspace: &mut Workspace<FlakyStore>, x: f64) {
        let scene = workspace.scene_mut();
        scene.set_tool(Tool::House);
        scene.pointer_down(Point2::new(x, 0.0));
    }

    #[test]
    fn save_clears_dirty_and_reuses_id() {
        let mut workspace = Workspace::new(FlakyStore::default(), EditorSettings::default());
        workspace
            .new_sketch("Barrio Sur", UnsavedChanges::Keep)
            .unwrap();
        add_house(&mut workspace, 0.0);
        assert!(workspace.scene().is_dirty());

        let id = workspace.save().expect("save");
        assert!(!workspace.scene().is_dirty());
        assert_eq!(workspace.scene().sketch().id.as_deref(), Some(id.as_str()));

        add_house(&mut workspace, 50.0);
        let again = workspace.save().unwrap();
        assert_eq!(again, id);
        let list = workspace.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].element_count, 2);
    }

    #[test]
    fn failed_save_keeps_edits_and_dirty_flag() {
        let mut workspace = Workspace::new(FlakyStore::default(), EditorSettings::default());
        add_house(&mut workspace, 0.0);
        workspace.store.offline.set(true);

        let err = workspace.save().unwrap_err();
        assert!(matches!(err, FrontendError::Store(_)));
        assert!(workspace.scene().is_dirty());
        assert_eq!(workspace.scene().sketch().len(), 1);

        assert!(workspace.open("whatever", UnsavedChanges::Discard).is_err());
        assert_eq!(workspace.scene().sketch().len(), 1);

        workspace.store.offline.set(false);
        workspace.save().expect("retry succeeds");
        assert!(!workspace.scene().is_dirty());
    }

    #[test]
    fn open_rename_delete_round_trip() {
        let mut workspace = Workspace::new(FlakyStore::default(), EditorSettings::default());
        workspace
            .new_sketch("Centro", UnsavedChanges::Keep)
            .unwrap();
        add_house(&mut workspace, 0.0);
        let id = workspace.save().unwrap();

        workspace
            .new_sketch("Otro", UnsavedChanges::Keep)
            .unwrap();
        assert!(workspace.scene().sketch().is_empty());
        workspace.open(&id, UnsavedChanges::Keep).unwrap();
        assert_eq!(workspace.scene().sketch().len(), 1);
        assert!(!workspace.scene().is_dirty());

        workspace.rename("Centro Histórico").unwrap();
        assert_eq!(workspace.list().unwrap()[0].name, "Centro Histórico");
        assert_eq!(workspace.scene().sketch().name, "Centro Histórico");

        workspace.delete(&id).unwrap();
        assert!(workspace.scene().sketch().is_empty());
        assert!(workspace.list().unwrap().is_empty());
    }

    #[test]
    fn close_reports_unsaved_changes() {
        let mut workspace = Workspace::new(FlakyStore::default(), EditorSettings::default());
        let scene = workspace.scene_mut();
        scene.set_tool(Tool::Street);
        scene.pointer_down(Point2::new(0.0, 0.0));
        scene.pointer_down(Point2::new(100.0, 0.0));

        let outcome = workspace.close();
        assert!(outcome.committed.is_some());
        assert!(outcome.needs_confirmation);

        workspace.save().unwrap();
        let outcome = workspace.close();
        assert!(outcome.committed.is_none());
        assert!(!outcome.needs_confirmation);
    }

    #[test]
    fn open_with_unsaved_edits_is_refused() {
        let mut workspace = Workspace::new(FlakyStore::default(), EditorSettings::default());
        workspace
            .new_sketch("Guardado", UnsavedChanges::Keep)
            .unwrap();
        let saved = workspace.save().unwrap();

        workspace
            .new_sketch("Borrador", UnsavedChanges::Keep)
            .unwrap();
        add_house(&mut workspace, 0.0);
        let scene = workspace.scene_mut();
        scene.set_tool(Tool::Street);
        scene.pointer_down(Point2::new(0.0, 50.0));
        scene.pointer_down(Point2::new(100.0, 50.0));

        let err = workspace.open(&saved, UnsavedChanges::Keep).unwrap_err();
        assert!(matches!(err, FrontendError::UnsavedChanges { ref name } if name == "Borrador"));
        // 未完成的街道已提交，房屋仍在
        assert_eq!(workspace.scene().sketch().name, "Borrador");
        assert_eq!(workspace.scene().sketch().len(), 2);
        assert!(workspace.scene().pending_points().is_empty());
        assert!(workspace.scene().is_dirty());

        assert!(matches!(
            workspace.new_sketch("Nuevo", UnsavedChanges::Keep),
            Err(FrontendError::UnsavedChanges { .. })
        ));
        assert_eq!(workspace.scene().sketch().len(), 2);

        workspace.open(&saved, UnsavedChanges::Discard).unwrap();
        assert_eq!(workspace.scene().sketch().name, "Guardado");
        assert!(!workspace.scene().is_dirty());
    }

    #[test]
    fn retried_create_keeps_a_single_cached_copy() {
        let offline = Rc::new(Cell::new(true));
        let store = FallbackStore::new(
            FlakyStore {
                offline: Rc::clone(&offline),
                ..FlakyStore::default()
            },
            MemorySketchStore::new(),
        );
        let mut workspace = Workspace::new(store, EditorSettings::default());
        workspace
            .new_sketch("Barrio", UnsavedChanges::Keep)
            .unwrap();
        let scene = workspace.scene_mut();
        scene.set_tool(Tool::House);
        scene.pointer_down(Point2::new(0.0, 0.0));

        for _ in 0..3 {
            assert!(matches!(
                workspace.save(),
                Err(FrontendError::Store(IoError::CachedOnly { .. }))
            ));
            assert!(workspace.scene().is_dirty());
        }
        let id = workspace.scene().sketch().id.clone().expect("cached id");
        let list = workspace.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);

        offline.set(false);
        assert_eq!(workspace.save().unwrap(), id);
        assert!(!workspace.scene().is_dirty());
        assert_eq!(workspace.store().primary().list().unwrap().len(), 1);
        assert_eq!(workspace.store().cache().list().unwrap().len(), 1);
    }
}
