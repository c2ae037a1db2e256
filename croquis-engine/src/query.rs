use std::cmp::Ordering;
use std::collections::BTreeSet;

use croquis_core::geometry::{self, Bounds2D, Point2};
use croquis_core::sketch::{Element, ElementId, ElementKind, Sketch};
use tracing::debug;

use crate::errors::EngineError;

/// 聚焦操作的固定半径（约 500 米的展示口径）。
pub const FOCUS_RADIUS: f64 = 500.0;

/// 供分配表单与报表使用的街区摘要。
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSummary {
    pub id: ElementId,
    pub label: String,
    pub house_count: usize,
    pub reference_label: Option<String>,
    pub inhabitants: Option<u32>,
    pub centroid: Option<Point2>,
}

impl BlockSummary {
    pub fn from_block(sketch: &Sketch, block: &Element) -> Self {
        Self {
            id: block.id().clone(),
            label: block.block_label(),
            house_count: sketch.houses_in_block(block),
            reference_label: sketch.reference_for_block(block).map(str::to_string),
            inhabitants: block.attributes.inhabitants_count(),
            centroid: block.polygon().and_then(geometry::polygon_centroid),
        }
    }
}

/// 首个顶点落在社区多边形内的全部街区。
pub fn blocks_in_neighborhood(
    sketch: &Sketch,
    neighborhood_id: &ElementId,
) -> Result<Vec<BlockSummary>, EngineError> {
    let neighborhood = sketch
        .element(neighborhood_id)
        .ok_or_else(|| EngineError::ElementNotFound(neighborhood_id.to_string()))?;
    if neighborhood.kind() != ElementKind::Neighborhood {
        return Err(EngineError::UnexpectedKind {
            id: neighborhood_id.to_string(),
            expected: ElementKind::Neighborhood,
            actual: neighborhood.kind(),
        });
    }

    let blocks: Vec<BlockSummary> = sketch
        .blocks()
        .filter(|block| {
            block
                .first_vertex()
                .is_some_and(|vertex| neighborhood.contains_point(vertex))
        })
        .map(|block| BlockSummary::from_block(sketch, block))
        .collect();
    debug!(neighborhood = %neighborhood_id, count = blocks.len(), "社区街区查询");
    Ok(blocks)
}

/// 半径查询结果，附带适配半径圆的视口范围。
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusQuery {
    pub center: Point2,
    pub radius: f64,
    pub blocks: Vec<BlockSummary>,
    pub viewport: Bounds2D,
}

/// 扫描整张草图（不限于当前社区），至少有一个顶点落在半径内的街区入选。
pub fn blocks_in_radius(sketch: &Sketch, center: Point2, radius: f64) -> RadiusQuery {
    let blocks: Vec<BlockSummary> = sketch
        .blocks()
        .filter(|block| geometry::any_vertex_within_radius(center, block.points(), radius))
        .map(|block| BlockSummary::from_block(sketch, block))
        .collect();
    debug!(
        x = center.x(),
        y = center.y(),
        radius,
        count = blocks.len(),
        "半径街区查询"
    );
    RadiusQuery {
        center,
        radius,
        blocks,
        viewport: Bounds2D::around(center, radius),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionSource {
    Neighborhood { id: ElementId, name: Option<String> },
    Focus { center: Point2, radius: f64 },
}

/// 分配表单的街区选择状态：可选街区与已选编号。
#[derive(Debug, Clone)]
pub struct BlockSelection {
    source: SelectionSource,
    available: Vec<BlockSummary>,
    selected: BTreeSet<String>,
}

impl BlockSelection {
    /// 选择社区后，其内全部街区默认选中。
    pub fn for_neighborhood(
        sketch: &Sketch,
        neighborhood_id: &ElementId,
    ) -> Result<Self, EngineError> {
        let available = blocks_in_neighborhood(sketch, neighborhood_id)?;
        let name = sketch
            .element(neighborhood_id)
            .and_then(Element::label)
            .map(str::to_string);
        Ok(Self::preselected(
            SelectionSource::Neighborhood {
                id: neighborhood_id.clone(),
                name,
            },
            available,
        ))
    }

    /// 聚焦模式用半径内的街区替换可选集合，并全部选中。
    pub fn for_focus(query: &RadiusQuery) -> Self {
        Self::preselected(
            SelectionSource::Focus {
                center: query.center,
                radius: query.radius,
            },
            query.blocks.clone(),
        )
    }

    fn preselected(source: SelectionSource, available: Vec<BlockSummary>) -> Self {
        let selected = available.iter().map(|block| block.label.clone()).collect();
        Self {
            source,
            available,
            selected,
        }
    }

    #[inline]
    pub fn source(&self) -> &SelectionSource {
        &self.source
    }

    #[inline]
    pub fn available(&self) -> &[BlockSummary] {
        &self.available
    }

    #[inline]
    pub fn is_selected(&self, label: &str) -> bool {
        self.selected.contains(label)
    }

    /// 切换选中状态，返回切换后的状态。不在可选集合中的编号保持未选中。
    pub fn toggle(&mut self, label: &str) -> bool {
        if !self.available.iter().any(|block| block.label == label) {
            return false;
        }
        if self.selected.remove(label) {
            false
        } else {
            self.selected.insert(label.to_string());
            true
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self
            .available
            .iter()
            .map(|block| block.label.clone())
            .collect();
    }

    #[inline]
    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// 已选编号，数字编号按数值排序并排在前面。
    pub fn selected_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.selected.iter().cloned().collect();
        labels.sort_by(|a, b| compare_labels(a, b));
        labels
    }

    pub fn selected_blocks(&self) -> impl Iterator<Item = &BlockSummary> {
        self.available
            .iter()
            .filter(|block| self.selected.contains(&block.label))
    }

    pub fn selected_house_total(&self) -> usize {
        self.selected_blocks().map(|block| block.house_count).sum()
    }

    /// 表单中序列化用的街区列表，例如 `1, 2, 10`。
    pub fn manzana_list(&self) -> String {
        self.selected_labels().join(", ")
    }
}

fn compare_labels(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
