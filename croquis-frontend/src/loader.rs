use std::env;

use croquis_config::{AppConfig, EditorConfig};
use croquis_engine::scene::{DemoElements, EditorSettings};
use croquis_io::SketchStore;
use tracing::{info, warn};

use crate::store_locator::StoreLocator;
use crate::workspace::{UnsavedChanges, Workspace};

const SKETCH_ID_ENV: &str = "CROQUIS_SKETCH_ID";

/// 草图来源，便于前端呈现加载信息。
#[derive(Debug, Clone)]
pub enum SketchSource {
    Stored(String),
    Demo,
}

/// 统一封装加载后的工作区与元信息。
pub struct LoadedWorkspace {
    pub workspace: Workspace<Box<dyn SketchStore>>,
    pub source: SketchSource,
    pub demo_elements: Option<DemoElements>,
}

pub fn editor_settings(config: &EditorConfig) -> EditorSettings {
    EditorSettings {
        snap_threshold: config.snap_threshold,
        focus_radius: config.focus_radius,
        canvas_width: config.canvas_width,
        canvas_height: config.canvas_height,
    }
}

/// 打开指定的草图（未指定时读取环境变量 `CROQUIS_SKETCH_ID`），
/// 若都没有或读取失败则回退到内置示例。
pub fn load_workspace_or_demo(config: &AppConfig, sketch_id: Option<&str>) -> LoadedWorkspace {
    let store = StoreLocator::from_config(&config.storage).open();
    let mut workspace = Workspace::new(store, editor_settings(&config.editor));

    let requested = sketch_id
        .map(str::to_string)
        .or_else(|| env::var_os(SKETCH_ID_ENV).map(|id| id.to_string_lossy().into_owned()));
    if let Some(id) = requested {
        match workspace.open(&id, UnsavedChanges::Keep) {
            Ok(()) => {
                info!(id = %id, "从存储加载草图成功");
                return LoadedWorkspace {
                    workspace,
                    source: SketchSource::Stored(id),
                    demo_elements: None,
                };
            }
            Err(err) => {
                warn!(id = %id, error = %err, "加载草图失败，回退到内置示例");
            }
        }
    }

    let scene = workspace.scene_mut();
    let demo_elements = scene.populate_demo();
    scene.set_name("Croquis de ejemplo");
    if let Some(ids) = &demo_elements {
        if let Err(err) = scene.select(&ids.neighborhood) {
            warn!(error = %err, "无法选中示例社区");
        }
    }
    scene.focus_on_selection();

    LoadedWorkspace {
        workspace,
        source: SketchSource::Demo,
        demo_elements,
    }
}

#[cfg(test)]
mod tests {
    use croquis_core::sketch::ElementKind;

    use super::*;

    #[test]
    fn missing_sketch_falls_back_to_focused_demo() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.root = Some(dir.path().to_path_buf());

        let loaded = load_workspace_or_demo(&config, Some("desconocido"));
        assert!(matches!(loaded.source, SketchSource::Demo));
        let ids = loaded.demo_elements.expect("demo ids");

        let scene = loaded.workspace.scene();
        assert_eq!(scene.sketch().name, "Croquis de ejemplo");
        let selected = scene.selected_element().expect("neighborhood selected");
        assert_eq!(selected.id(), &ids.neighborhood);
        assert_eq!(selected.kind(), ElementKind::Neighborhood);
    }
}
