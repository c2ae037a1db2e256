use croquis_core::geometry::{self, Point2};
use croquis_core::sketch::{
    Attributes, Element, ElementId, ElementKind, ReferenceKind, Shape, Sketch, StreetKind,
};
use tracing::debug;

/// 街道吸附的默认距离。
pub const DEFAULT_SNAP_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Select,
    Pan,
    Street,
    Block,
    House,
    Neighborhood,
    Reference,
}

impl Tool {
    pub const ALL: [Tool; 7] = [
        Tool::Select,
        Tool::Pan,
        Tool::Street,
        Tool::Block,
        Tool::House,
        Tool::Neighborhood,
        Tool::Reference,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Pan => "pan",
            Tool::Street => "street",
            Tool::Block => "block",
            Tool::House => "house",
            Tool::Neighborhood => "neighborhood",
            Tool::Reference => "reference",
        }
    }

    /// 解析工具名，同时接受界面上的西语别名（manzana / vivienda / barrio / calle）。
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name() == name)
            .or(match name.as_str() {
                "calle" => Some(Tool::Street),
                "manzana" => Some(Tool::Block),
                "vivienda" => Some(Tool::House),
                "barrio" => Some(Tool::Neighborhood),
                _ => None,
            })
    }

    /// 工具到行为的分派表，所有指针事件都经由这里决定处理方式。
    fn behavior(self) -> ToolBehavior {
        match self {
            Tool::Select => ToolBehavior::Pick,
            Tool::Pan => ToolBehavior::Navigate,
            Tool::Street => ToolBehavior::Trace {
                kind: ElementKind::Street,
                snap: true,
            },
            Tool::Block => ToolBehavior::Trace {
                kind: ElementKind::Block,
                snap: false,
            },
            Tool::Neighborhood => ToolBehavior::Trace {
                kind: ElementKind::Neighborhood,
                snap: false,
            },
            Tool::House => ToolBehavior::Stamp {
                kind: ElementKind::House,
                then: None,
            },
            Tool::Reference => ToolBehavior::Stamp {
                kind: ElementKind::Reference,
                then: Some(Tool::Select),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolBehavior {
    Pick,
    Navigate,
    /// 逐点累积，显式完成或切换工具时提交。
    Trace { kind: ElementKind, snap: bool },
    /// 单击即提交，可选地切回另一个工具。
    Stamp { kind: ElementKind, then: Option<Tool> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawState<'a> {
    Idle(Tool),
    Drawing { tool: Tool, pending: &'a [Point2] },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    Ignored,
    PointAdded { point: Point2, snapped: bool },
    Committed(ElementId),
    Selected(Option<ElementId>),
}

/// 绘制会话：当前工具、待提交的顶点与选中元素。不持久化。
#[derive(Debug, Clone)]
pub struct DrawSession {
    tool: Tool,
    pending: Vec<Point2>,
    selected: Option<ElementId>,
    snap_threshold: f64,
}

impl DrawSession {
    pub fn new(snap_threshold: f64) -> Self {
        Self {
            tool: Tool::Select,
            pending: Vec::new(),
            selected: None,
            snap_threshold,
        }
    }

    #[inline]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[inline]
    pub fn pending_points(&self) -> &[Point2] {
        &self.pending
    }

    #[inline]
    pub fn snap_threshold(&self) -> f64 {
        self.snap_threshold
    }

    pub fn state(&self) -> DrawState<'_> {
        if self.pending.is_empty() {
            DrawState::Idle(self.tool)
        } else {
            DrawState::Drawing {
                tool: self.tool,
                pending: &self.pending,
            }
        }
    }

    #[inline]
    pub fn selected_id(&self) -> Option<&ElementId> {
        self.selected.as_ref()
    }

    /// 解析选中元素；已被删除的 id 视为未选中。
    pub fn selected<'s>(&self, sketch: &'s Sketch) -> Option<&'s Element> {
        self.selected.as_ref().and_then(|id| sketch.element(id))
    }

    #[inline]
    pub fn select(&mut self, id: Option<ElementId>) {
        self.selected = id;
    }

    pub fn pointer_down(&mut self, sketch: &mut Sketch, point: Point2) -> PointerOutcome {
        match self.tool.behavior() {
            ToolBehavior::Pick => {
                let hit = sketch.element_at(point).map(|element| element.id().clone());
                self.selected = hit.clone();
                PointerOutcome::Selected(hit)
            }
            ToolBehavior::Navigate => PointerOutcome::Ignored,
            ToolBehavior::Trace { snap, .. } => {
                let result = if snap {
                    geometry::snap_to_nearest_street_point(
                        point,
                        sketch.street_paths(),
                        self.snap_threshold,
                    )
                } else {
                    geometry::SnapResult {
                        point,
                        snapped: false,
                    }
                };
                self.pending.push(result.point);
                PointerOutcome::PointAdded {
                    point: result.point,
                    snapped: result.snapped,
                }
            }
            ToolBehavior::Stamp { kind, then } => {
                let id = stamp(sketch, kind, point);
                if let Some(next) = then {
                    self.pending.clear();
                    self.tool = next;
                }
                PointerOutcome::Committed(id)
            }
        }
    }

    /// 提交待定顶点。不足 2 个顶点时静默丢弃并返回 `None`。
    pub fn finish(&mut self, sketch: &mut Sketch) -> Option<ElementId> {
        let pending = std::mem::take(&mut self.pending);
        let ToolBehavior::Trace { kind, .. } = self.tool.behavior() else {
            return None;
        };
        let vertices = pending.len();
        let attributes = default_path_attributes(sketch, kind);
        let shape = Shape::path(kind, pending)?;
        let id = sketch.add(shape, attributes);
        debug!(kind = %kind, id = %id, vertices, "提交绘制图形");
        Some(id)
    }

    /// 切换工具。已有不少于 2 个顶点时先用旧工具提交。
    pub fn set_tool(&mut self, sketch: &mut Sketch, tool: Tool) -> Option<ElementId> {
        let committed = if self.pending.len() >= 2 {
            self.finish(sketch)
        } else {
            None
        };
        self.pending.clear();
        self.tool = tool;
        committed
    }

    #[inline]
    pub fn remove_last_point(&mut self) -> Option<Point2> {
        self.pending.pop()
    }

    /// 丢弃会话状态（保留吸附阈值）。
    pub fn reset(&mut self) {
        self.tool = Tool::Select;
        self.pending.clear();
        self.selected = None;
    }
}

impl Default for DrawSession {
    fn default() -> Self {
        Self::new(DEFAULT_SNAP_THRESHOLD)
    }
}

fn default_path_attributes(sketch: &Sketch, kind: ElementKind) -> Attributes {
    match kind {
        ElementKind::Street => Attributes {
            street_kind: Some(StreetKind::Road),
            ..Attributes::labelled("Calle")
        },
        ElementKind::Block => Attributes {
            block_number: Some(sketch.next_block_number().to_string()),
            ..Attributes::default()
        },
        ElementKind::Neighborhood => Attributes::labelled("Barrio Nuevo"),
        ElementKind::House | ElementKind::Reference => Attributes::default(),
    }
}

fn stamp(sketch: &mut Sketch, kind: ElementKind, point: Point2) -> ElementId {
    let (shape, attributes) = match kind {
        ElementKind::Reference => (
            Shape::Reference { position: point },
            Attributes {
                reference_kind: Some(ReferenceKind::Other),
                ..Attributes::labelled("Ref")
            },
        ),
        _ => {
            // 编号为创建时快照，之后只在删除级联时重排。
            let number = sketch.next_house_number(point);
            (
                Shape::House { position: point },
                Attributes::labelled(number.to_string()),
            )
        }
    };
    let id = sketch.add(shape, attributes);
    debug!(kind = %kind, id = %id, x = point.x(), y = point.y(), "放置标记");
    id
}
