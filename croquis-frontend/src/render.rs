//! 将草图栅格化为 PNG 快照，用于嵌入打印报表。

use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use croquis_config::RenderConfig;
use croquis_core::geometry::{Bounds2D, Point2};
use croquis_core::sketch::{Element, ElementKind, MARKER_HIT_RADIUS, Sketch, Style};
use image::{ImageFormat, RgbaImage};
use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Paint, Path as SkPath, PathBuilder, Pixmap, Stroke,
    Transform,
};
use tracing::debug;

use crate::errors::FrontendError;

const HIGHLIGHT_FILL: &str = "rgba(250, 204, 21, 0.6)";
const HIGHLIGHT_STROKE: &str = "#2563eb";
const MIN_STROKE_PX: f32 = 1.0;
const MIN_MARKER_PX: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOptions {
    pub width: u32,
    pub height: u32,
}

impl From<&RenderConfig> for SnapshotOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
        }
    }
}

/// PNG 编码后的快照。
#[derive(Debug, Clone)]
pub struct SnapshotImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl SnapshotImage {
    pub fn write_to(&self, path: &Path) -> Result<(), FrontendError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| FrontendError::WriteSnapshot {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, &self.png).map_err(|source| FrontendError::WriteSnapshot {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// 草图坐标到像素坐标的等比映射，视口居中。
#[derive(Debug, Clone, Copy)]
struct ViewTransform {
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl ViewTransform {
    fn fit(bounds: &Bounds2D, width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        let scale = (w / bounds.width()).min(h / bounds.height());
        let min = bounds.min();
        Self {
            scale,
            offset_x: (w - bounds.width() * scale) * 0.5 - min.x() * scale,
            offset_y: (h - bounds.height() * scale) * 0.5 - min.y() * scale,
        }
    }

    fn apply(&self, point: Point2) -> (f32, f32) {
        (
            (point.x() * self.scale + self.offset_x) as f32,
            (point.y() * self.scale + self.offset_y) as f32,
        )
    }

    fn length(&self, value: f64) -> f32 {
        (value * self.scale) as f32
    }
}

/// 渲染草图快照。`selected_labels` 中的街区编号会高亮显示。
///
/// 视口为空或退化时改用整张草图的范围；草图也为空时输出空白画布。
pub fn render_snapshot(
    sketch: &Sketch,
    selected_labels: &[String],
    viewport: &Bounds2D,
    options: SnapshotOptions,
) -> Result<SnapshotImage, FrontendError> {
    let SnapshotOptions { width, height } = options;
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| FrontendError::Render(format!("无效的图片尺寸 {width}x{height}")))?;
    pixmap.fill(Color::WHITE);

    let bounds = [Some(*viewport), sketch.bounds()]
        .into_iter()
        .flatten()
        .find(is_drawable)
        .unwrap_or_else(|| {
            Bounds2D::new(
                Point2::new(0.0, 0.0),
                Point2::new(f64::from(width), f64::from(height)),
            )
        });
    let view = ViewTransform::fit(&bounds, width, height);
    let selected: HashSet<&str> = selected_labels.iter().map(String::as_str).collect();

    for kind in [
        ElementKind::Neighborhood,
        ElementKind::Block,
        ElementKind::Street,
        ElementKind::House,
        ElementKind::Reference,
    ] {
        for element in sketch.elements_of(kind) {
            let highlighted = kind == ElementKind::Block && selected.contains(element.block_label().as_str());
            draw_element(&mut pixmap, &view, element, highlighted);
        }
    }

    let png = encode_png(&pixmap)?;
    debug!(width, height, bytes = png.len(), "快照渲染完成");
    Ok(SnapshotImage { width, height, png })
}

fn is_drawable(bounds: &Bounds2D) -> bool {
    !bounds.is_empty() && bounds.width() > f64::EPSILON && bounds.height() > f64::EPSILON
}

fn draw_element(pixmap: &mut Pixmap, view: &ViewTransform, element: &Element, highlighted: bool) {
    let defaults = Style::for_kind(element.kind());
    let style = &element.style;
    let fill = style
        .fill
        .as_deref()
        .or(defaults.fill.as_deref())
        .and_then(parse_color);
    let stroke = style
        .stroke
        .as_deref()
        .or(defaults.stroke.as_deref())
        .and_then(parse_color);
    let stroke_width = style.stroke_width.or(defaults.stroke_width).unwrap_or(1.0);

    match element.kind() {
        ElementKind::Block | ElementKind::Neighborhood => {
            let Some(path) = polygon_path(view, element.points()) else {
                return;
            };
            let (fill, stroke, width) = if highlighted {
                (
                    parse_color(HIGHLIGHT_FILL),
                    parse_color(HIGHLIGHT_STROKE),
                    view.length(stroke_width).max(3.0),
                )
            } else {
                (fill, stroke, view.length(stroke_width).max(MIN_STROKE_PX))
            };
            fill_path(pixmap, &path, fill);
            stroke_path(pixmap, &path, stroke, width);
        }
        ElementKind::Street => {
            let Some(path) = polyline_path(view, element.points()) else {
                return;
            };
            stroke_path(pixmap, &path, stroke, view.length(stroke_width).max(MIN_STROKE_PX));
        }
        ElementKind::House | ElementKind::Reference => {
            let Some(anchor) = element.anchor() else {
                return;
            };
            let (x, y) = view.apply(anchor);
            let radius = view.length(MARKER_HIT_RADIUS).max(MIN_MARKER_PX);
            let Some(path) = PathBuilder::from_circle(x, y, radius) else {
                return;
            };
            fill_path(pixmap, &path, fill);
            stroke_path(pixmap, &path, stroke, MIN_STROKE_PX);
        }
    }
}

fn polyline_path(view: &ViewTransform, points: &[Point2]) -> Option<SkPath> {
    let (first, rest) = points.split_first()?;
    let mut builder = PathBuilder::new();
    let (x, y) = view.apply(*first);
    builder.move_to(x, y);
    for point in rest {
        let (x, y) = view.apply(*point);
        builder.line_to(x, y);
    }
    builder.finish()
}

fn polygon_path(view: &ViewTransform, points: &[Point2]) -> Option<SkPath> {
    if points.len() < 3 {
        return polyline_path(view, points);
    }
    let (first, rest) = points.split_first()?;
    let mut builder = PathBuilder::new();
    let (x, y) = view.apply(*first);
    builder.move_to(x, y);
    for point in rest {
        let (x, y) = view.apply(*point);
        builder.line_to(x, y);
    }
    builder.close();
    builder.finish()
}

fn fill_path(pixmap: &mut Pixmap, path: &SkPath, color: Option<Color>) {
    let Some(color) = color else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    pixmap.fill_path(path, &paint, FillRule::Winding, Transform::identity(), None);
}

fn stroke_path(pixmap: &mut Pixmap, path: &SkPath, color: Option<Color>, width: f32) {
    let Some(color) = color else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    let stroke = Stroke {
        width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    pixmap.stroke_path(path, &paint, &stroke, Transform::identity(), None);
}

fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, FrontendError> {
    let mut raw = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    let image = RgbaImage::from_raw(pixmap.width(), pixmap.height(), raw)
        .ok_or_else(|| FrontendError::Render("像素缓冲区大小不匹配".to_string()))?;
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// 解析样式中的颜色：`#rgb`、`#rrggbb`、`rgb(r, g, b)` 与 `rgba(r, g, b, a)`。
fn parse_color(raw: &str) -> Option<Color> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        let channel = |index: usize, len: usize| u8::from_str_radix(hex.get(index..index + len)?, 16).ok();
        return match hex.len() {
            6 => Some(Color::from_rgba8(channel(0, 2)?, channel(2, 2)?, channel(4, 2)?, 255)),
            3 => {
                let expand = |index: usize| channel(index, 1).map(|value| value * 17);
                Some(Color::from_rgba8(expand(0)?, expand(1)?, expand(2)?, 255))
            }
            _ => None,
        };
    }

    let inner = raw
        .strip_prefix("rgba(")
        .or_else(|| raw.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let rgb = |index: usize| parts.get(index)?.parse::<u8>().ok();
    let alpha = match parts.len() {
        3 => 1.0,
        4 => parts[3].parse::<f32>().ok()?.clamp(0.0, 1.0),
        _ => return None,
    };
    Some(Color::from_rgba8(rgb(0)?, rgb(1)?, rgb(2)?, (alpha * 255.0).round() as u8))
}

#[cfg(test)]
mod tests {
    use croquis_core::sketch::{Attributes, Shape};

    use super::*;

    fn single_block() -> Sketch {
        let mut sketch = Sketch::new("Prueba");
        sketch.add(
            Shape::path(
                ElementKind::Block,
                vec![
                    Point2::new(0.0, 0.0),
                    Point2::new(100.0, 0.0),
                    Point2::new(100.0, 100.0),
                    Point2::new(0.0, 100.0),
                ],
            )
            .unwrap(),
            Attributes {
                block_number: Some("1".to_string()),
                ..Attributes::default()
            },
        );
        sketch
    }

    fn pixel(snapshot: &SnapshotImage, x: u32, y: u32) -> [u8; 4] {
        let decoded = image::load_from_memory(&snapshot.png).expect("decode png");
        decoded.to_rgba8().get_pixel(x, y).0
    }

    #[test]
    fn colors_are_parsed() {
        assert_eq!(parse_color("#ff0000"), Some(Color::from_rgba8(255, 0, 0, 255)));
        assert_eq!(parse_color("#0f0"), Some(Color::from_rgba8(0, 255, 0, 255)));
        assert_eq!(
            parse_color("rgba(209, 213, 219, 0.5)"),
            Some(Color::from_rgba8(209, 213, 219, 128))
        );
        assert_eq!(parse_color("rgb(1, 2, 3)"), Some(Color::from_rgba8(1, 2, 3, 255)));
        assert!(parse_color("blue").is_none());
        assert!(parse_color("#12345").is_none());
    }

    #[test]
    fn selected_blocks_are_highlighted() {
        let sketch = single_block();
        let viewport = Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(100.0, 100.0));
        let options = SnapshotOptions {
            width: 100,
            height: 100,
        };

        let plain = render_snapshot(&sketch, &[], &viewport, options).unwrap();
        assert_eq!((plain.width, plain.height), (100, 100));
        let [_, _, blue, _] = pixel(&plain, 50, 50);
        assert!(blue > 200, "未选中的街区为浅灰色");

        let highlighted = render_snapshot(&sketch, &["1".to_string()], &viewport, options).unwrap();
        let [red, _, blue, _] = pixel(&highlighted, 50, 50);
        assert!(red > 240);
        assert!(blue < 150, "选中的街区应显示为黄色");
    }

    #[test]
    fn degenerate_viewport_falls_back_to_sketch_bounds() {
        let sketch = single_block();
        let options = SnapshotOptions {
            width: 200,
            height: 100,
        };
        let snapshot =
            render_snapshot(&sketch, &["1".to_string()], &Bounds2D::empty(), options).unwrap();
        // 街区居中，左右留白
        let [_, _, blue, _] = pixel(&snapshot, 100, 50);
        assert!(blue < 150);
        assert_eq!(pixel(&snapshot, 5, 50), [255, 255, 255, 255]);

        let blank = render_snapshot(&Sketch::new("Vacío"), &[], &Bounds2D::empty(), options).unwrap();
        assert_eq!(pixel(&blank, 10, 10), [255, 255, 255, 255]);
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let err = render_snapshot(
            &single_block(),
            &[],
            &Bounds2D::empty(),
            SnapshotOptions {
                width: 0,
                height: 10,
            },
        )
        .unwrap_err();
        assert!(matches!(err, FrontendError::Render(_)));
    }

    #[test]
    fn snapshot_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("croquis.png");
        let snapshot = render_snapshot(
            &single_block(),
            &[],
            &Bounds2D::empty(),
            SnapshotOptions {
                width: 32,
                height: 32,
            },
        )
        .unwrap();
        snapshot.write_to(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), snapshot.png);
    }
}
