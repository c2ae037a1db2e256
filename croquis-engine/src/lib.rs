pub mod command;
pub mod draw;
pub mod history;
pub mod query;

pub mod errors {
    use croquis_core::sketch::ElementKind;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("element with id {0} not found")]
        ElementNotFound(String),
        #[error("element {id} is a {actual}, expected a {expected}")]
        UnexpectedKind {
            id: String,
            expected: ElementKind,
            actual: ElementKind,
        },
    }
}

pub mod scene {
    use croquis_core::geometry::{Bounds2D, Point2, Vector2};
    use croquis_core::sketch::{Attributes, Element, ElementId, Sketch};
    use tracing::{debug, info};

    use crate::draw::{DEFAULT_SNAP_THRESHOLD, DrawSession, PointerOutcome, Tool};
    use crate::errors::EngineError;
    use crate::history::History;
    use crate::query::{self, BlockSelection, FOCUS_RADIUS};

    const DEFAULT_ZOOM: f64 = 1.0;
    const MIN_ZOOM: f64 = 0.01;
    const MAX_ZOOM: f64 = 1_000.0;

    /// 记录视口状态（中心点与缩放）。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct ViewportState {
        pub center: Point2,
        pub zoom: f64,
    }

    impl ViewportState {
        #[inline]
        fn clamp_zoom(value: f64) -> f64 {
            value.clamp(MIN_ZOOM, MAX_ZOOM)
        }
    }

    impl Default for ViewportState {
        fn default() -> Self {
            Self {
                center: Point2::new(0.0, 0.0),
                zoom: DEFAULT_ZOOM,
            }
        }
    }

    /// 编辑器参数，通常由配置文件提供。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct EditorSettings {
        pub snap_threshold: f64,
        pub focus_radius: f64,
        pub canvas_width: f64,
        pub canvas_height: f64,
    }

    impl Default for EditorSettings {
        fn default() -> Self {
            Self {
                snap_threshold: DEFAULT_SNAP_THRESHOLD,
                focus_radius: FOCUS_RADIUS,
                canvas_width: 1280.0,
                canvas_height: 800.0,
            }
        }
    }

    /// 关闭编辑器前的结果：自动提交的图形以及是否需要确认未保存的修改。
    #[derive(Debug, Clone, PartialEq)]
    pub struct CloseOutcome {
        pub committed: Option<ElementId>,
        pub needs_confirmation: bool,
    }

    #[derive(Debug, Clone)]
    pub struct DemoElements {
        pub neighborhood: ElementId,
        pub blocks: [ElementId; 3],
        pub street: ElementId,
        pub reference: ElementId,
    }

    /// 一个打开的草图编辑器实例：草图、绘制会话、历史、视口与脏标记。
    ///
    /// 所有修改都经由这里，每次提交后记录历史快照。
    #[derive(Debug)]
    pub struct Scene {
        sketch: Sketch,
        session: DrawSession,
        history: History,
        viewport: ViewportState,
        settings: EditorSettings,
        dirty: bool,
    }

    impl Scene {
        pub fn new() -> Self {
            Self::with_settings(EditorSettings::default())
        }

        pub fn with_settings(settings: EditorSettings) -> Self {
            Self {
                sketch: Sketch::default(),
                session: DrawSession::new(settings.snap_threshold),
                history: History::new(),
                viewport: ViewportState::default(),
                settings,
                dirty: false,
            }
        }

        /// 清空草图、历史与会话。
        pub fn reset(&mut self) {
            self.load_sketch(Sketch::default());
        }

        /// 替换当前草图并重置运行时状态。加载结果作为历史首条，不计为修改。
        pub fn load_sketch(&mut self, sketch: Sketch) {
            self.sketch = sketch;
            self.session.reset();
            self.history.seed(self.sketch.as_slice());
            self.dirty = false;
            self.viewport = ViewportState::default();

            if let Some(bounds) = self.sketch.bounds() {
                self.viewport.center = bounds.center();
            }
            info!(
                id = self.sketch.id.as_deref().unwrap_or("<未保存>"),
                elements = self.sketch.len(),
                "已加载草图"
            );
        }

        #[inline]
        pub fn sketch(&self) -> &Sketch {
            &self.sketch
        }

        #[inline]
        pub fn settings(&self) -> EditorSettings {
            self.settings
        }

        #[inline]
        pub fn session(&self) -> &DrawSession {
            &self.session
        }

        #[inline]
        pub fn history(&self) -> &History {
            &self.history
        }

        #[inline]
        pub fn tool(&self) -> Tool {
            self.session.tool()
        }

        #[inline]
        pub fn pending_points(&self) -> &[Point2] {
            self.session.pending_points()
        }

        /// 自加载或上次保存以来是否有提交。
        #[inline]
        pub fn is_dirty(&self) -> bool {
            self.dirty
        }

        /// 保存成功后调用：记录持久化 id 并清除脏标记。
        pub fn mark_saved(&mut self, id: impl Into<String>) {
            self.sketch.id = Some(id.into());
            self.dirty = false;
        }

        /// 存储已为草图分配 id 但未确认保存：记录 id，脏标记保持不变。
        pub fn assign_id(&mut self, id: impl Into<String>) {
            self.sketch.id = Some(id.into());
        }

        pub fn set_name(&mut self, name: impl Into<String>) {
            self.sketch.name = name.into();
        }

        pub fn set_tool(&mut self, tool: Tool) -> Option<ElementId> {
            let committed = self.session.set_tool(&mut self.sketch, tool);
            if committed.is_some() {
                self.commit();
            }
            committed
        }

        pub fn pointer_down(&mut self, point: Point2) -> PointerOutcome {
            let outcome = self.session.pointer_down(&mut self.sketch, point);
            if matches!(outcome, PointerOutcome::Committed(_)) {
                self.commit();
            }
            outcome
        }

        pub fn finish_drawing(&mut self) -> Option<ElementId> {
            let committed = self.session.finish(&mut self.sketch);
            if committed.is_some() {
                self.commit();
            }
            committed
        }

        #[inline]
        pub fn remove_last_point(&mut self) -> Option<Point2> {
            self.session.remove_last_point()
        }

        /// 当前选中元素；引用已删除元素时视为未选中。
        #[inline]
        pub fn selected_element(&self) -> Option<&Element> {
            self.session.selected(&self.sketch)
        }

        /// 选中指定元素。若元素不存在则返回错误。
        pub fn select(&mut self, id: &ElementId) -> Result<(), EngineError> {
            if !self.sketch.contains(id) {
                return Err(EngineError::ElementNotFound(id.to_string()));
            }
            self.session.select(Some(id.clone()));
            Ok(())
        }

        #[inline]
        pub fn clear_selection(&mut self) {
            self.session.select(None);
        }

        pub fn update_attributes(
            &mut self,
            id: &ElementId,
            patch: Attributes,
        ) -> Result<(), EngineError> {
            if !self.sketch.update_attributes(id, patch) {
                return Err(EngineError::ElementNotFound(id.to_string()));
            }
            self.commit();
            Ok(())
        }

        /// 删除元素（含级联），返回全部被删除的 id。
        pub fn remove_element(&mut self, id: &ElementId) -> Result<Vec<ElementId>, EngineError> {
            let removed = self.sketch.remove(id);
            if removed.is_empty() {
                return Err(EngineError::ElementNotFound(id.to_string()));
            }
            if self
                .session
                .selected_id()
                .is_some_and(|selected| removed.contains(selected))
            {
                self.session.select(None);
            }
            info!(id = %id, cascade = removed.len() - 1, "已删除元素");
            self.commit();
            Ok(removed)
        }

        /// 删除当前选中元素；没有有效选中时不做任何事。
        pub fn delete_selected(&mut self) -> Vec<ElementId> {
            let Some(id) = self.selected_element().map(|element| element.id().clone()) else {
                self.session.select(None);
                return Vec::new();
            };
            self.remove_element(&id).unwrap_or_default()
        }

        pub fn undo(&mut self) -> bool {
            match self.history.undo() {
                Some(elements) => {
                    self.sketch.replace_elements(elements);
                    debug!(cursor = ?self.history.cursor(), "撤销");
                    true
                }
                None => false,
            }
        }

        pub fn redo(&mut self) -> bool {
            match self.history.redo() {
                Some(elements) => {
                    self.sketch.replace_elements(elements);
                    debug!(cursor = ?self.history.cursor(), "重做");
                    true
                }
                None => false,
            }
        }

        #[inline]
        pub fn can_undo(&self) -> bool {
            self.history.can_undo()
        }

        #[inline]
        pub fn can_redo(&self) -> bool {
            self.history.can_redo()
        }

        /// 选择社区并返回默认全选的街区集合。
        pub fn select_neighborhood(&self, id: &ElementId) -> Result<BlockSelection, EngineError> {
            BlockSelection::for_neighborhood(&self.sketch, id)
        }

        /// 聚焦操作：以配置半径选取全草图范围内的街区，并把视口适配到半径圆。
        pub fn focus_on_point(&mut self, point: Point2) -> BlockSelection {
            let query = query::blocks_in_radius(&self.sketch, point, self.settings.focus_radius);
            self.fit_viewport(&query.viewport);
            BlockSelection::for_focus(&query)
        }

        /// 关闭前调用：自动提交不少于 2 个顶点的图形，返回是否需要确认。
        pub fn close(&mut self) -> CloseOutcome {
            let committed = if self.session.pending_points().len() >= 2 {
                self.finish_drawing()
            } else {
                None
            };
            self.session.reset();
            CloseOutcome {
                committed,
                needs_confirmation: self.dirty,
            }
        }

        /// 获取当前视口状态。
        #[inline]
        pub fn viewport(&self) -> ViewportState {
            self.viewport
        }

        #[inline]
        pub fn reset_viewport(&mut self) {
            self.viewport = ViewportState::default();
        }

        #[inline]
        pub fn set_viewport_center(&mut self, center: Point2) {
            self.viewport.center = center;
        }

        pub fn pan_viewport(&mut self, delta: Vector2) {
            self.viewport.center = self.viewport.center.translate(delta);
        }

        /// 设置缩放倍数（自动限制在合法范围内）。
        pub fn set_viewport_zoom(&mut self, zoom: f64) {
            self.viewport.zoom = ViewportState::clamp_zoom(zoom);
        }

        pub fn scale_viewport_zoom(&mut self, factor: f64) {
            let current = self.viewport.zoom;
            let target = if factor.is_finite() {
                current * factor
            } else {
                current
            };
            self.set_viewport_zoom(target);
        }

        /// 让范围完整落入画布。
        pub fn fit_viewport(&mut self, bounds: &Bounds2D) {
            if bounds.is_empty() {
                return;
            }
            self.viewport.center = bounds.center();
            let (width, height) = (bounds.width(), bounds.height());
            if width > f64::EPSILON && height > f64::EPSILON {
                let zoom = (self.settings.canvas_width / width).min(self.settings.canvas_height / height);
                self.set_viewport_zoom(zoom);
            }
        }

        /// 当前视口在草图坐标下覆盖的范围。
        pub fn visible_bounds(&self) -> Bounds2D {
            let half_width = self.settings.canvas_width * 0.5 / self.viewport.zoom;
            let half_height = self.settings.canvas_height * 0.5 / self.viewport.zoom;
            let center = self.viewport.center;
            Bounds2D::new(
                Point2::new(center.x() - half_width, center.y() - half_height),
                Point2::new(center.x() + half_width, center.y() + half_height),
            )
        }

        /// 聚焦当前选中元素，若为空则退化到整个草图范围。
        pub fn focus_on_selection(&mut self) {
            let target = self
                .selected_element()
                .map(Element::bounds)
                .or_else(|| self.sketch.bounds());
            if let Some(bounds) = target {
                if !bounds.is_empty() {
                    self.viewport.center = bounds.center();
                }
            }
        }

        /// 通过绘制流程填充一组示例元素：一个社区包含两个街区，第三个街区在社区外。
        pub fn populate_demo(&mut self) -> Option<DemoElements> {
            self.reset();

            let neighborhood = self.trace(
                Tool::Neighborhood,
                &[(0.0, 0.0), (260.0, 0.0), (260.0, 120.0), (0.0, 120.0)],
            )?;
            let first = self.trace(
                Tool::Block,
                &[(10.0, 10.0), (110.0, 10.0), (110.0, 110.0), (10.0, 110.0)],
            )?;
            let second = self.trace(
                Tool::Block,
                &[(130.0, 10.0), (250.0, 10.0), (250.0, 110.0), (130.0, 110.0)],
            )?;
            let third = self.trace(
                Tool::Block,
                &[(400.0, 10.0), (500.0, 10.0), (500.0, 110.0), (400.0, 110.0)],
            )?;
            let street = self.trace(Tool::Street, &[(0.0, 130.0), (520.0, 130.0)])?;

            self.set_tool(Tool::House);
            for (x, y) in [(30.0, 30.0), (60.0, 60.0), (90.0, 90.0), (150.0, 40.0), (200.0, 80.0), (450.0, 60.0)] {
                self.pointer_down(Point2::new(x, y));
            }

            self.set_tool(Tool::Reference);
            let PointerOutcome::Committed(reference) = self.pointer_down(Point2::new(50.0, 90.0)) else {
                return None;
            };
            self.sketch.update_attributes(&reference, Attributes::labelled("Escuela"));
            self.commit();

            let ids = DemoElements {
                neighborhood,
                blocks: [first, second, third],
                street,
                reference,
            };
            debug!(elements = self.sketch.len(), "已创建演示草图");
            Some(ids)
        }

        fn trace(&mut self, tool: Tool, points: &[(f64, f64)]) -> Option<ElementId> {
            self.set_tool(tool);
            for (x, y) in points {
                self.pointer_down(Point2::new(*x, *y));
            }
            self.finish_drawing()
        }

        fn commit(&mut self) {
            if self.history.push(self.sketch.as_slice()) {
                self.dirty = true;
            }
        }
    }

    impl Default for Scene {
        fn default() -> Self {
            Self::new()
        }
    }

    #[cfg(test)]
    mod tests {
        use croquis_core::sketch::ElementKind;

        use super::*;

        #[test]
        fn demo_population_creates_elements() {
            let mut scene = Scene::new();
            let ids = scene.populate_demo().expect("demo sketch");
            let sketch = scene.sketch();
            assert_eq!(sketch.blocks().count(), 3);
            assert_eq!(sketch.house_count(), 6);
            assert_eq!(sketch.element(&ids.street).unwrap().kind(), ElementKind::Street);
            assert_eq!(scene.tool(), Tool::Select);
            assert!(scene.is_dirty());

            let first = sketch.element(&ids.blocks[0]).unwrap();
            assert_eq!(sketch.houses_in_block(first), 3);
            assert_eq!(sketch.reference_for_block(first), Some("Escuela"));
        }

        #[test]
        fn commits_raise_dirty_until_saved() {
            let mut scene = Scene::new();
            assert!(!scene.is_dirty());
            scene.set_tool(Tool::House);
            scene.pointer_down(Point2::new(1.0, 1.0));
            assert!(scene.is_dirty());

            scene.mark_saved("abc");
            assert!(!scene.is_dirty());
            assert_eq!(scene.sketch().id.as_deref(), Some("abc"));

            // 无变化的属性更新不会产生历史条目
            let id = scene.sketch().houses().next().unwrap().id().clone();
            scene
                .update_attributes(&id, Attributes::labelled("1"))
                .unwrap();
            assert!(!scene.is_dirty());
            assert_eq!(scene.history().len(), 1);
        }

        #[test]
        fn selection_operations_work() {
            let mut scene = Scene::new();
            let ids = scene.populate_demo().unwrap();

            assert!(scene.selected_element().is_none());
            scene.select(&ids.street).expect("select street");
            assert_eq!(scene.selected_element().map(Element::id), Some(&ids.street));

            let missing = ElementId::new("house-999");
            let err = scene.select(&missing).unwrap_err();
            assert!(matches!(err, EngineError::ElementNotFound(_)));

            let removed = scene.delete_selected();
            assert_eq!(removed, vec![ids.street.clone()]);
            assert!(scene.selected_element().is_none());
            assert!(scene.delete_selected().is_empty());
        }

        #[test]
        fn undo_restores_and_stale_selection_is_ignored() {
            let mut scene = Scene::new();
            scene.set_tool(Tool::House);
            scene.pointer_down(Point2::new(1.0, 1.0));
            scene.set_tool(Tool::Select);
            scene.pointer_down(Point2::new(1.0, 1.0));
            assert!(scene.selected_element().is_some());

            assert!(scene.undo());
            assert!(scene.sketch().is_empty());
            assert!(scene.selected_element().is_none());
            assert!(!scene.undo());

            assert!(scene.redo());
            assert_eq!(scene.sketch().len(), 1);
            assert!(!scene.redo());
        }

        #[test]
        fn close_auto_commits_pending_shape() {
            let mut scene = Scene::new();
            scene.set_tool(Tool::Street);
            scene.pointer_down(Point2::new(0.0, 0.0));
            scene.pointer_down(Point2::new(50.0, 0.0));

            let outcome = scene.close();
            let committed = outcome.committed.expect("pending street committed");
            assert_eq!(scene.sketch().element(&committed).unwrap().kind(), ElementKind::Street);
            assert!(outcome.needs_confirmation);
            assert!(scene.pending_points().is_empty());

            let mut clean = Scene::new();
            clean.set_tool(Tool::Block);
            clean.pointer_down(Point2::new(0.0, 0.0));
            let outcome = clean.close();
            assert_eq!(
                outcome,
                CloseOutcome {
                    committed: None,
                    needs_confirmation: false
                }
            );
        }

        #[test]
        fn load_sketch_resets_state_and_recenters_viewport() {
            let mut scene = Scene::new();
            scene.populate_demo().unwrap();
            scene.set_viewport_zoom(42.0);

            let mut sketch = Sketch::new("Otro");
            sketch.add(
                croquis_core::sketch::Shape::anchor(ElementKind::House, Point2::new(-10.0, 10.0))
                    .unwrap(),
                Attributes::labelled("1"),
            );
            sketch.add(
                croquis_core::sketch::Shape::anchor(ElementKind::House, Point2::new(10.0, 30.0))
                    .unwrap(),
                Attributes::labelled("2"),
            );
            scene.load_sketch(sketch);

            assert!(!scene.is_dirty());
            assert_eq!(scene.tool(), Tool::Select);
            assert_eq!(scene.history().len(), 1);
            let viewport = scene.viewport();
            assert!((viewport.zoom - 1.0).abs() < f64::EPSILON);
            assert!((viewport.center.x()).abs() < 1e-9);
            assert!((viewport.center.y() - 20.0).abs() < 1e-9);

            // 加载的状态同样可以撤销到空草图
            assert!(scene.undo());
            assert!(scene.sketch().is_empty());
        }

        #[test]
        fn viewport_state_clamps_zoom_and_fits_bounds() {
            let mut scene = Scene::new();
            scene.set_viewport_center(Point2::new(10.0, -5.0));
            scene.pan_viewport(Vector2::new(5.0, 5.0));
            assert_eq!(scene.viewport().center, Point2::new(15.0, 0.0));

            scene.set_viewport_zoom(0.0001);
            assert!((scene.viewport().zoom - MIN_ZOOM).abs() < f64::EPSILON);
            scene.set_viewport_zoom(10_000.0);
            assert!((scene.viewport().zoom - MAX_ZOOM).abs() < f64::EPSILON);
            scene.set_viewport_zoom(2.0);
            scene.scale_viewport_zoom(0.5);
            assert!((scene.viewport().zoom - 1.0).abs() < f64::EPSILON);

            scene.fit_viewport(&Bounds2D::around(Point2::new(100.0, 100.0), 500.0));
            let viewport = scene.viewport();
            assert_eq!(viewport.center, Point2::new(100.0, 100.0));
            assert!((viewport.zoom - 0.8).abs() < 1e-9);
            let visible = scene.visible_bounds();
            assert!((visible.height() - 1000.0).abs() < 1e-9);

            scene.reset_viewport();
            assert_eq!(scene.viewport(), ViewportState::default());
        }
    }
}
