//! 旧版扁平元素格式的导入。
//!
//! 旧格式是一个 JSON 数组，每个元素形如
//! `{"id", "type", "points": [x0, y0, x1, y1, ...], "x", "y", "data": {...}, "style": {...}}`，
//! `type` 取值为 `street|manzana|vivienda|barrio|reference`。

use std::fs;
use std::path::Path;

use croquis_core::geometry::Point2;
use croquis_core::sketch::{
    Attributes, Element, ElementId, ElementKind, ReferenceKind, Shape, Sketch, StreetKind, Style,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{IoError, SketchLoader};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyElement {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    points: Vec<f64>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    data: LegacyData,
    #[serde(default)]
    style: Option<LegacyStyle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyData {
    #[serde(default)]
    label: Option<Value>,
    #[serde(default)]
    inhabitants: Option<Value>,
    #[serde(default)]
    house_count: Option<Value>,
    #[serde(default)]
    street_type: Option<String>,
    #[serde(default)]
    reference_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyStyle {
    #[serde(default)]
    stroke: Option<String>,
    #[serde(default)]
    fill: Option<String>,
    #[serde(default)]
    stroke_width: Option<f64>,
}

/// 导入结果：草图与被跳过的条目数。
#[derive(Debug, Clone)]
pub struct LegacyImport {
    pub sketch: Sketch,
    pub skipped: usize,
}

/// 解析旧格式文本。格式错误的单个元素会被跳过并记录警告；整体不是数组时报错。
pub fn import_str(source: &str, name: &str) -> Result<LegacyImport, IoError> {
    let raw: Vec<Value> = serde_json::from_str(source)
        .map_err(|err| IoError::InvalidDocument(format!("旧版草图必须是元素数组: {err}")))?;

    let mut sketch = Sketch::new(name);
    let mut skipped = 0;
    for (index, value) in raw.into_iter().enumerate() {
        let converted = serde_json::from_value::<LegacyElement>(value)
            .map_err(|err| IoError::InvalidDocument(err.to_string()))
            .and_then(|legacy| convert_element(&mut sketch, legacy));
        match converted {
            Ok(element) => {
                if !sketch.insert(element) {
                    warn!(index, "旧版元素重复或形状不合法，已跳过");
                    skipped += 1;
                }
            }
            Err(err) => {
                warn!(index, error = %err, "旧版元素无法转换，已跳过");
                skipped += 1;
            }
        }
    }

    info!(elements = sketch.len(), skipped, "旧版草图导入完成");
    Ok(LegacyImport { sketch, skipped })
}

fn convert_element(sketch: &mut Sketch, legacy: LegacyElement) -> Result<Element, IoError> {
    let kind = match legacy.kind.as_str() {
        "street" => ElementKind::Street,
        "manzana" => ElementKind::Block,
        "vivienda" => ElementKind::House,
        "barrio" => ElementKind::Neighborhood,
        "reference" => ElementKind::Reference,
        other => return Err(IoError::UnsupportedFeature(format!("元素类型 {other}"))),
    };

    let shape = if kind.is_anchor() {
        let (Some(x), Some(y)) = (legacy.x, legacy.y) else {
            return Err(IoError::InvalidDocument(format!("{kind} 缺少 x/y 坐标")));
        };
        Shape::anchor(kind, Point2::new(x, y))
    } else {
        if legacy.points.len() % 2 != 0 {
            return Err(IoError::InvalidDocument(format!(
                "{kind} 的坐标数量为奇数: {}",
                legacy.points.len()
            )));
        }
        let points = legacy
            .points
            .chunks_exact(2)
            .map(|pair| Point2::new(pair[0], pair[1]))
            .collect();
        Shape::path(kind, points)
    };
    let shape = shape.ok_or_else(|| IoError::InvalidDocument(format!("{kind} 的顶点不足")))?;

    let id = match legacy.id.filter(|id| !id.is_empty()) {
        Some(id) if !sketch.contains(&ElementId::new(id.as_str())) => ElementId::new(id),
        _ => sketch.next_id(kind),
    };

    let mut element = Element::new(id, shape).with_attributes(convert_data(kind, legacy.data));
    if let Some(style) = legacy.style {
        let defaults = Style::for_kind(kind);
        element = element.with_style(Style {
            stroke: style.stroke.or(defaults.stroke),
            fill: style.fill.or(defaults.fill),
            stroke_width: style.stroke_width.or(defaults.stroke_width),
        });
    }
    Ok(element)
}

fn convert_data(kind: ElementKind, data: LegacyData) -> Attributes {
    let label = data.label.as_ref().and_then(scalar_text);
    // 旧版街区编号写在标签里，形如 `M-3`
    let block_number = if kind == ElementKind::Block {
        label
            .as_deref()
            .map(|label| label.strip_prefix("M-").unwrap_or(label).trim().to_string())
    } else {
        None
    };
    Attributes {
        label,
        block_number,
        inhabitants: data.inhabitants.as_ref().and_then(scalar_text),
        house_count: data.house_count.as_ref().and_then(scalar_text),
        street_kind: data.street_type.as_deref().and_then(street_kind),
        reference_kind: data.reference_type.as_deref().and_then(reference_kind),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn street_kind(raw: &str) -> Option<StreetKind> {
    match raw {
        "calle" => Some(StreetKind::Road),
        "carretera" => Some(StreetKind::Highway),
        "camino" => Some(StreetKind::Path),
        _ => None,
    }
}

fn reference_kind(raw: &str) -> Option<ReferenceKind> {
    match raw {
        "tienda" => Some(ReferenceKind::Shop),
        "escuela" => Some(ReferenceKind::School),
        "parque" => Some(ReferenceKind::Park),
        "iglesia" => Some(ReferenceKind::Church),
        "otro" => Some(ReferenceKind::Other),
        _ => None,
    }
}

/// 从文件导入旧版草图，文件名（不含扩展名）作为草图名称。
pub struct LegacyFacade;

impl LegacyFacade {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LegacyFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl SketchLoader for LegacyFacade {
    fn load(&self, path: &Path) -> Result<Sketch, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("Croquis importado");
        import_str(&data, name).map(|import| import.sketch)
    }
}
