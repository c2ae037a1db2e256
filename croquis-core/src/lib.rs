pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。坐标为草图本地单位（约 10 单位 = 1 米），不做地理换算。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn distance_squared(self, other: Point2) -> f64 {
            self.0.distance_squared(other.0)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，目前用于视口平移。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }
    }

    /// 轴对齐边界框，用于估算草图/元素范围以及视口适配。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        /// 圆的外接正方形。
        pub fn around(center: Point2, radius: f64) -> Self {
            let radius = radius.abs();
            Self {
                min: Point2::new(center.x() - radius, center.y() - radius),
                max: Point2::new(center.x() + radius, center.y() + radius),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.x() - self.min.x()
            }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.y() - self.min.y()
            }
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }

    /// 射线法判定点是否位于多边形内（首尾自动闭合）。
    ///
    /// 少于 3 个顶点的“多边形”恒为 `false`。恰好落在边上的点归属未定义，
    /// 取决于浮点比较结果，调用方不应依赖。
    pub fn point_in_polygon(point: Point2, polygon: &[Point2]) -> bool {
        if polygon.len() < 3 {
            return false;
        }
        let (x, y) = (point.x(), point.y());
        let mut inside = false;
        let mut j = polygon.len() - 1;
        for i in 0..polygon.len() {
            let (xi, yi) = (polygon[i].x(), polygon[i].y());
            let (xj, yj) = (polygon[j].x(), polygon[j].y());
            // 跨越判定保证 yi != yj，水平边不会参与除法。
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// 基于鞋带公式的多边形质心。面积为零时退化为第一个顶点，空输入返回 `None`。
    pub fn polygon_centroid(polygon: &[Point2]) -> Option<Point2> {
        let first = *polygon.first()?;
        let mut twice_area = 0.0;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        for (index, current) in polygon.iter().enumerate() {
            let next = polygon[(index + 1) % polygon.len()];
            let cross = current.x() * next.y() - next.x() * current.y();
            twice_area += cross;
            sum_x += (current.x() + next.x()) * cross;
            sum_y += (current.y() + next.y()) * cross;
        }
        if twice_area.abs() <= f64::EPSILON {
            return Some(first);
        }
        let factor = 1.0 / (3.0 * twice_area);
        Some(Point2::new(sum_x * factor, sum_y * factor))
    }

    /// 点在线段上的投影，参数截断到 [0, 1]；零长度线段返回起点。
    pub fn nearest_point_on_segment(point: Point2, start: Point2, end: Point2) -> Point2 {
        let segment = end.as_vec2() - start.as_vec2();
        let length_squared = segment.length_squared();
        if length_squared <= f64::EPSILON {
            return start;
        }
        let t = ((point.as_vec2() - start.as_vec2()).dot(segment) / length_squared).clamp(0.0, 1.0);
        Point2::from_vec(start.as_vec2() + segment * t)
    }

    /// 点到折线的最短距离，空折线返回无穷大。
    pub fn distance_to_polyline(point: Point2, polyline: &[Point2]) -> f64 {
        match polyline {
            [] => f64::INFINITY,
            [single] => point.distance(*single),
            _ => polyline
                .windows(2)
                .map(|segment| point.distance(nearest_point_on_segment(point, segment[0], segment[1])))
                .fold(f64::INFINITY, f64::min),
        }
    }

    /// 吸附结果；未吸附时 `point` 为原始输入。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct SnapResult {
        pub point: Point2,
        pub snapped: bool,
    }

    /// 在所有街道线段中寻找全局最近的投影点，距离严格小于 `threshold` 才吸附。
    pub fn snap_to_nearest_street_point<'a, I>(point: Point2, streets: I, threshold: f64) -> SnapResult
    where
        I: IntoIterator<Item = &'a [Point2]>,
    {
        let mut result = SnapResult {
            point,
            snapped: false,
        };
        let mut best_distance = threshold;
        for street in streets {
            for segment in street.windows(2) {
                let candidate = nearest_point_on_segment(point, segment[0], segment[1]);
                let distance = point.distance(candidate);
                if distance < best_distance {
                    best_distance = distance;
                    result = SnapResult {
                        point: candidate,
                        snapped: true,
                    };
                }
            }
        }
        result
    }

    /// 欧氏距离判定，边界包含在内。
    #[inline]
    pub fn within_radius(center: Point2, point: Point2, radius: f64) -> bool {
        center.distance_squared(point) <= radius * radius
    }

    #[inline]
    pub fn any_vertex_within_radius(center: Point2, vertices: &[Point2], radius: f64) -> bool {
        vertices
            .iter()
            .any(|vertex| within_radius(center, *vertex, radius))
    }

}

pub mod sketch {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{self, Bounds2D, Point2};

    /// 房屋/参考点的拾取半径，与绘制时的标记半径一致。
    pub const MARKER_HIT_RADIUS: f64 = 8.0;

    /// 元素的不透明唯一标识，在单个草图内唯一。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ElementId(String);

    impl ElementId {
        #[inline]
        pub fn new(raw: impl Into<String>) -> Self {
            Self(raw.into())
        }

        #[inline]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for ElementId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ElementKind {
        Street,
        Block,
        House,
        Neighborhood,
        Reference,
    }

    impl ElementKind {
        pub fn id_prefix(self) -> &'static str {
            match self {
                ElementKind::Street => "street",
                ElementKind::Block => "block",
                ElementKind::House => "house",
                ElementKind::Neighborhood => "neighborhood",
                ElementKind::Reference => "ref",
            }
        }

        /// 闭合多边形类元素（街区、社区）。
        #[inline]
        pub fn is_polygon(self) -> bool {
            matches!(self, ElementKind::Block | ElementKind::Neighborhood)
        }

        /// 以单个锚点表示的元素（房屋、参考点）。
        #[inline]
        pub fn is_anchor(self) -> bool {
            matches!(self, ElementKind::House | ElementKind::Reference)
        }
    }

    impl fmt::Display for ElementKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.id_prefix())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum StreetKind {
        Road,
        Highway,
        Path,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ReferenceKind {
        Shop,
        School,
        Park,
        Church,
        Other,
    }

    /// 可识别的元素属性。更新时按字段合并，`None` 表示保持原值。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Attributes {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub label: Option<String>,
        /// 街区的打印编号，与内部 id 无关。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub block_number: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub inhabitants: Option<String>,
        /// 旧版手工录入的房屋数量，新计算一律忽略。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub house_count: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub street_kind: Option<StreetKind>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub reference_kind: Option<ReferenceKind>,
    }

    impl Attributes {
        pub fn labelled(label: impl Into<String>) -> Self {
            Self {
                label: Some(label.into()),
                ..Self::default()
            }
        }

        pub fn merge(&mut self, patch: Attributes) {
            if let Some(label) = patch.label {
                self.label = Some(label);
            }
            if let Some(block_number) = patch.block_number {
                self.block_number = Some(block_number);
            }
            if let Some(inhabitants) = patch.inhabitants {
                self.inhabitants = Some(inhabitants);
            }
            if let Some(house_count) = patch.house_count {
                self.house_count = Some(house_count);
            }
            if let Some(street_kind) = patch.street_kind {
                self.street_kind = Some(street_kind);
            }
            if let Some(reference_kind) = patch.reference_kind {
                self.reference_kind = Some(reference_kind);
            }
        }

        /// 解析字符串形式的居民数，非数字返回 `None`。
        pub fn inhabitants_count(&self) -> Option<u32> {
            self.inhabitants.as_deref()?.trim().parse().ok()
        }
    }

    /// 仅用于呈现的样式，不承载任何不变量。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Style {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub stroke: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub fill: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub stroke_width: Option<f64>,
    }

    impl Style {
        pub fn for_kind(kind: ElementKind) -> Self {
            let (stroke, fill, stroke_width) = match kind {
                ElementKind::Street => ("#4b5563", None, 20.0),
                ElementKind::Block => ("#1f2937", Some("rgba(209, 213, 219, 0.5)"), 2.0),
                ElementKind::House => ("#991b1b", Some("#ef4444"), 1.0),
                ElementKind::Neighborhood => ("#2563eb", Some("rgba(59, 130, 246, 0.1)"), 2.0),
                ElementKind::Reference => ("#15803d", Some("#16a34a"), 1.0),
            };
            Self {
                stroke: Some(stroke.to_string()),
                fill: fill.map(str::to_string),
                stroke_width: Some(stroke_width),
            }
        }
    }

    /// 按类型区分的几何表示。类型在元素创建后不可变。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "lowercase")]
    pub enum Shape {
        Street { points: Vec<Point2> },
        Block { points: Vec<Point2> },
        Neighborhood { points: Vec<Point2> },
        House { position: Point2 },
        Reference { position: Point2 },
    }

    impl Shape {
        /// 构造折线/多边形形状，至少需要 2 个顶点；锚点类型返回 `None`。
        pub fn path(kind: ElementKind, points: Vec<Point2>) -> Option<Self> {
            if points.len() < 2 {
                return None;
            }
            match kind {
                ElementKind::Street => Some(Shape::Street { points }),
                ElementKind::Block => Some(Shape::Block { points }),
                ElementKind::Neighborhood => Some(Shape::Neighborhood { points }),
                ElementKind::House | ElementKind::Reference => None,
            }
        }

        /// 构造单锚点形状；折线/多边形类型返回 `None`。
        pub fn anchor(kind: ElementKind, position: Point2) -> Option<Self> {
            match kind {
                ElementKind::House => Some(Shape::House { position }),
                ElementKind::Reference => Some(Shape::Reference { position }),
                _ => None,
            }
        }

        pub fn kind(&self) -> ElementKind {
            match self {
                Shape::Street { .. } => ElementKind::Street,
                Shape::Block { .. } => ElementKind::Block,
                Shape::Neighborhood { .. } => ElementKind::Neighborhood,
                Shape::House { .. } => ElementKind::House,
                Shape::Reference { .. } => ElementKind::Reference,
            }
        }

        pub fn points(&self) -> &[Point2] {
            match self {
                Shape::Street { points } | Shape::Block { points } | Shape::Neighborhood { points } => {
                    points
                }
                Shape::House { position } | Shape::Reference { position } => {
                    std::slice::from_ref(position)
                }
            }
        }

        /// 反序列化得到的数据可能不满足构造约束，加载时需要检查。
        pub fn is_well_formed(&self) -> bool {
            let points = self.points();
            let enough = if self.kind().is_anchor() {
                points.len() == 1
            } else {
                points.len() >= 2
            };
            enough && points.iter().all(|point| point.is_finite())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Element {
        id: ElementId,
        shape: Shape,
        #[serde(default)]
        pub attributes: Attributes,
        #[serde(default)]
        pub style: Style,
    }

    impl Element {
        /// 以默认样式创建元素。
        pub fn new(id: ElementId, shape: Shape) -> Self {
            let style = Style::for_kind(shape.kind());
            Self {
                id,
                shape,
                attributes: Attributes::default(),
                style,
            }
        }

        pub fn with_attributes(mut self, attributes: Attributes) -> Self {
            self.attributes = attributes;
            self
        }

        pub fn with_style(mut self, style: Style) -> Self {
            self.style = style;
            self
        }

        #[inline]
        pub fn id(&self) -> &ElementId {
            &self.id
        }

        #[inline]
        pub fn kind(&self) -> ElementKind {
            self.shape.kind()
        }

        #[inline]
        pub fn shape(&self) -> &Shape {
            &self.shape
        }

        #[inline]
        pub fn points(&self) -> &[Point2] {
            self.shape.points()
        }

        pub fn anchor(&self) -> Option<Point2> {
            match self.shape {
                Shape::House { position } | Shape::Reference { position } => Some(position),
                _ => None,
            }
        }

        /// 街区/社区的多边形顶点。
        pub fn polygon(&self) -> Option<&[Point2]> {
            match &self.shape {
                Shape::Block { points } | Shape::Neighborhood { points } => Some(points),
                _ => None,
            }
        }

        #[inline]
        pub fn first_vertex(&self) -> Option<Point2> {
            self.points().first().copied()
        }

        #[inline]
        pub fn label(&self) -> Option<&str> {
            self.attributes.label.as_deref()
        }

        /// 街区的打印编号：优先 `blockNumber`，其次 `label`，最后退化为 id。
        pub fn block_label(&self) -> String {
            let non_empty = |value: &Option<String>| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            };
            non_empty(&self.attributes.block_number)
                .or_else(|| non_empty(&self.attributes.label))
                .unwrap_or_else(|| self.id.to_string())
        }

        /// 房屋标签的数值部分，无法解析时按 0 处理。
        pub fn house_number(&self) -> i64 {
            self.label()
                .and_then(|label| label.trim().parse().ok())
                .unwrap_or(0)
        }

        pub fn contains_point(&self, point: Point2) -> bool {
            self.polygon()
                .is_some_and(|polygon| geometry::point_in_polygon(point, polygon))
        }

        /// 拾取判定：锚点按半径，街道按线宽，多边形按包含关系。
        pub fn hit_test(&self, point: Point2, marker_radius: f64) -> bool {
            match &self.shape {
                Shape::House { position } | Shape::Reference { position } => {
                    geometry::within_radius(*position, point, marker_radius)
                }
                Shape::Street { points } => {
                    let half_width = self.style.stroke_width.unwrap_or(20.0) * 0.5;
                    geometry::distance_to_polyline(point, points) <= half_width.max(marker_radius)
                }
                Shape::Block { points } | Shape::Neighborhood { points } => {
                    geometry::point_in_polygon(point, points)
                }
            }
        }

        pub fn bounds(&self) -> Bounds2D {
            let mut bounds = Bounds2D::empty();
            for point in self.points() {
                bounds.include_point(*point);
            }
            bounds
        }
    }

    /// 单个草图（croquis）：有序元素集合及其派生视图。
    ///
    /// 派生视图（房屋数量、参考点等）每次按需计算，不做缓存。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Sketch {
        /// 首次保存前为空。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<String>,
        pub name: String,
        #[serde(default)]
        elements: Vec<Element>,
        #[serde(default)]
        next_element_id: u64,
    }

    impl Sketch {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                ..Self::default()
            }
        }

        /// 从外部数据构建草图，重复 id 或不合法的形状会被丢弃。
        pub fn from_elements<I>(id: Option<String>, name: impl Into<String>, elements: I) -> Self
        where
            I: IntoIterator<Item = Element>,
        {
            let mut sketch = Self::new(name);
            sketch.id = id;
            for element in elements {
                sketch.insert(element);
            }
            sketch
        }

        #[inline]
        pub fn elements(&self) -> impl DoubleEndedIterator<Item = &Element> {
            self.elements.iter()
        }

        #[inline]
        pub fn as_slice(&self) -> &[Element] {
            &self.elements
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.elements.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.elements.is_empty()
        }

        pub fn element(&self, id: &ElementId) -> Option<&Element> {
            self.elements.iter().find(|element| element.id() == id)
        }

        #[inline]
        pub fn contains(&self, id: &ElementId) -> bool {
            self.element(id).is_some()
        }

        pub fn elements_of(&self, kind: ElementKind) -> impl DoubleEndedIterator<Item = &Element> {
            self.elements
                .iter()
                .filter(move |element| element.kind() == kind)
        }

        #[inline]
        pub fn blocks(&self) -> impl DoubleEndedIterator<Item = &Element> {
            self.elements_of(ElementKind::Block)
        }

        #[inline]
        pub fn houses(&self) -> impl DoubleEndedIterator<Item = &Element> {
            self.elements_of(ElementKind::House)
        }

        #[inline]
        pub fn neighborhoods(&self) -> impl DoubleEndedIterator<Item = &Element> {
            self.elements_of(ElementKind::Neighborhood)
        }

        pub fn street_paths(&self) -> impl Iterator<Item = &[Point2]> {
            self.elements_of(ElementKind::Street).map(Element::points)
        }

        /// 生成未被占用的元素 id，形如 `block-3`。
        pub fn next_id(&mut self, kind: ElementKind) -> ElementId {
            loop {
                let candidate = ElementId::new(format!("{}-{}", kind.id_prefix(), self.next_element_id));
                self.next_element_id += 1;
                if !self.contains(&candidate) {
                    return candidate;
                }
            }
        }

        /// 追加已有元素。id 冲突或形状不合法时拒绝并返回 `false`。
        pub fn insert(&mut self, element: Element) -> bool {
            if !element.shape().is_well_formed() || self.contains(element.id()) {
                return false;
            }
            self.elements.push(element);
            true
        }

        /// 以新 id 追加元素，返回该 id。
        pub fn add(&mut self, shape: Shape, attributes: Attributes) -> ElementId {
            let id = self.next_id(shape.kind());
            self.elements
                .push(Element::new(id.clone(), shape).with_attributes(attributes));
            id
        }

        /// 用快照整体替换元素序列（撤销/重做恢复）。
        pub fn replace_elements(&mut self, elements: Vec<Element>) {
            self.elements = elements;
        }

        pub fn clear(&mut self) {
            self.elements.clear();
        }

        /// 按字段合并属性，元素不存在时返回 `false`。
        pub fn update_attributes(&mut self, id: &ElementId, patch: Attributes) -> bool {
            match self.elements.iter_mut().find(|element| element.id() == id) {
                Some(element) => {
                    element.attributes.merge(patch);
                    true
                }
                None => false,
            }
        }

        /// 删除元素并执行级联，返回所有被删除的 id（不存在时为空）。
        ///
        /// 删除街区会一并删除其内部房屋；删除房屋会把所在街区剩余房屋重新编号为 1..N。
        pub fn remove(&mut self, id: &ElementId) -> Vec<ElementId> {
            let Some(index) = self.elements.iter().position(|element| element.id() == id) else {
                return Vec::new();
            };
            let removed = self.elements.remove(index);
            let mut removed_ids = vec![removed.id().clone()];

            match removed.kind() {
                ElementKind::Block => {
                    if let Some(polygon) = removed.polygon() {
                        self.elements.retain(|element| {
                            let inside = element.kind() == ElementKind::House
                                && element
                                    .anchor()
                                    .is_some_and(|anchor| geometry::point_in_polygon(anchor, polygon));
                            if inside {
                                removed_ids.push(element.id().clone());
                            }
                            !inside
                        });
                    }
                }
                ElementKind::House => {
                    if let Some(position) = removed.anchor() {
                        self.renumber_houses_around(position);
                    }
                }
                _ => {}
            }

            removed_ids
        }

        fn renumber_houses_around(&mut self, position: Point2) {
            let Some(polygon) = self
                .block_containing(position)
                .and_then(Element::polygon)
                .map(<[Point2]>::to_vec)
            else {
                return;
            };

            let mut siblings: Vec<(i64, usize)> = self
                .elements
                .iter()
                .enumerate()
                .filter(|(_, element)| {
                    element.kind() == ElementKind::House
                        && element
                            .anchor()
                            .is_some_and(|anchor| geometry::point_in_polygon(anchor, &polygon))
                })
                .map(|(index, element)| (element.house_number(), index))
                .collect();
            // 稳定排序：编号相同时保持存储顺序。
            siblings.sort_by_key(|(number, _)| *number);

            for (rank, (_, index)) in siblings.into_iter().enumerate() {
                self.elements[index].attributes.label = Some((rank + 1).to_string());
            }
        }

        /// 位于街区多边形内的房屋。
        pub fn houses_within<'a>(&'a self, block: &'a Element) -> impl Iterator<Item = &'a Element> + 'a {
            let polygon = block.polygon().unwrap_or(&[]);
            self.houses().filter(move |house| {
                house
                    .anchor()
                    .is_some_and(|anchor| geometry::point_in_polygon(anchor, polygon))
            })
        }

        /// 街区内的房屋数量，这是唯一权威的计数（忽略旧版 `houseCount`）。
        pub fn houses_in_block(&self, block: &Element) -> usize {
            if block.kind() != ElementKind::Block {
                return 0;
            }
            self.houses_within(block).count()
        }

        /// 街区内第一个参考点的标签；多个参考点时取存储顺序中的第一个，该顺序不保证稳定。
        pub fn reference_for_block(&self, block: &Element) -> Option<&str> {
            let polygon = block.polygon()?;
            self.elements_of(ElementKind::Reference)
                .find(|reference| {
                    reference
                        .anchor()
                        .is_some_and(|anchor| geometry::point_in_polygon(anchor, polygon))
                })
                .and_then(Element::label)
        }

        /// 街区首个顶点是否落在任一社区内。社区外的街区不参与编号与分配。
        pub fn block_is_inside_any_neighborhood(&self, block: &Element) -> bool {
            let Some(vertex) = block.first_vertex() else {
                return false;
            };
            self.neighborhoods()
                .any(|neighborhood| neighborhood.contains_point(vertex))
        }

        /// 包含该点的最上层（最后插入的）街区。
        pub fn block_containing(&self, point: Point2) -> Option<&Element> {
            self.blocks().rev().find(|block| block.contains_point(point))
        }

        #[inline]
        pub fn house_count(&self) -> usize {
            self.houses().count()
        }

        /// 新房屋的编号：落在街区内时为该街区已有房屋数 + 1，否则为全草图房屋数 + 1。
        pub fn next_house_number(&self, point: Point2) -> usize {
            match self.block_containing(point) {
                Some(block) => self.houses_in_block(block) + 1,
                None => self.house_count() + 1,
            }
        }

        /// 新街区的默认编号。删除后可能与现有编号重复，不做修复。
        pub fn next_block_number(&self) -> usize {
            self.blocks().count() + 1
        }

        /// 自上而下的拾取。
        pub fn element_at(&self, point: Point2) -> Option<&Element> {
            self.elements
                .iter()
                .rev()
                .find(|element| element.hit_test(point, MARKER_HIT_RADIUS))
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            for element in &self.elements {
                bounds.include_bounds(&element.bounds());
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point2> {
            vec![
                Point2::new(x0, y0),
                Point2::new(x1, y0),
                Point2::new(x1, y1),
                Point2::new(x0, y1),
            ]
        }

        fn add_block(sketch: &mut Sketch, points: Vec<Point2>, number: &str) -> ElementId {
            let shape = Shape::path(ElementKind::Block, points).unwrap();
            sketch.add(
                shape,
                Attributes {
                    block_number: Some(number.to_string()),
                    ..Attributes::default()
                },
            )
        }

        fn add_house(sketch: &mut Sketch, x: f64, y: f64) -> ElementId {
            let position = Point2::new(x, y);
            let number = sketch.next_house_number(position);
            sketch.add(
                Shape::anchor(ElementKind::House, position).unwrap(),
                Attributes::labelled(number.to_string()),
            )
        }

        fn house_labels(sketch: &Sketch) -> Vec<String> {
            sketch
                .houses()
                .map(|house| house.label().unwrap_or_default().to_string())
                .collect()
        }

        #[test]
        fn shapes_enforce_vertex_counts() {
            assert!(Shape::path(ElementKind::Street, vec![Point2::new(0.0, 0.0)]).is_none());
            assert!(Shape::path(ElementKind::House, rect(0.0, 0.0, 1.0, 1.0)).is_none());
            assert!(Shape::anchor(ElementKind::Block, Point2::new(0.0, 0.0)).is_none());

            let street = Shape::path(
                ElementKind::Street,
                vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)],
            )
            .unwrap();
            assert_eq!(street.kind(), ElementKind::Street);
            assert!(street.is_well_formed());

            let broken = Shape::Block {
                points: vec![Point2::new(f64::NAN, 0.0), Point2::new(1.0, 1.0)],
            };
            assert!(!broken.is_well_formed());
        }

        #[test]
        fn ids_are_unique_and_prefixed() {
            let mut sketch = Sketch::new("Barrio Sur");
            let first = add_block(&mut sketch, rect(0.0, 0.0, 10.0, 10.0), "1");
            let second = add_house(&mut sketch, 5.0, 5.0);
            assert_eq!(first.as_str(), "block-0");
            assert_eq!(second.as_str(), "house-1");

            // 已被占用的 id 会被跳过
            let taken = Element::new(
                ElementId::new("house-2"),
                Shape::anchor(ElementKind::House, Point2::new(1.0, 1.0)).unwrap(),
            );
            assert!(sketch.insert(taken.clone()));
            assert!(!sketch.insert(taken));
            let next = sketch.next_id(ElementKind::House);
            assert_eq!(next.as_str(), "house-3");
        }

        #[test]
        fn houses_are_counted_by_containment() {
            let mut sketch = Sketch::new("Demo");
            let block = add_block(&mut sketch, rect(0.0, 0.0, 100.0, 100.0), "1");
            let other = add_block(&mut sketch, rect(200.0, 0.0, 300.0, 100.0), "2");
            add_house(&mut sketch, 10.0, 10.0);
            add_house(&mut sketch, 50.0, 50.0);
            add_house(&mut sketch, 90.0, 90.0);

            let block = sketch.element(&block).unwrap();
            let other = sketch.element(&other).unwrap();
            assert_eq!(sketch.houses_in_block(block), 3);
            assert_eq!(sketch.houses_in_block(other), 0);
            assert_eq!(house_labels(&sketch), vec!["1", "2", "3"]);
        }

        #[test]
        fn legacy_house_count_is_ignored() {
            let mut sketch = Sketch::new("Demo");
            let block = add_block(&mut sketch, rect(0.0, 0.0, 100.0, 100.0), "1");
            sketch.update_attributes(
                &block,
                Attributes {
                    house_count: Some("42".to_string()),
                    ..Attributes::default()
                },
            );
            add_house(&mut sketch, 10.0, 10.0);
            let block = sketch.element(&block).unwrap();
            assert_eq!(sketch.houses_in_block(block), 1);
        }

        #[test]
        fn house_numbering_outside_blocks_uses_global_count() {
            let mut sketch = Sketch::new("Demo");
            add_block(&mut sketch, rect(0.0, 0.0, 100.0, 100.0), "1");
            add_house(&mut sketch, 10.0, 10.0);
            add_house(&mut sketch, 20.0, 20.0);
            assert_eq!(sketch.next_house_number(Point2::new(500.0, 500.0)), 3);
            assert_eq!(sketch.next_house_number(Point2::new(50.0, 50.0)), 3);
        }

        #[test]
        fn topmost_block_wins_on_overlap() {
            let mut sketch = Sketch::new("Demo");
            add_block(&mut sketch, rect(0.0, 0.0, 100.0, 100.0), "1");
            let upper = add_block(&mut sketch, rect(50.0, 50.0, 150.0, 150.0), "2");
            let hit = sketch.block_containing(Point2::new(75.0, 75.0)).unwrap();
            assert_eq!(hit.id(), &upper);
        }

        #[test]
        fn removing_block_cascades_to_its_houses() {
            let mut sketch = Sketch::new("Demo");
            let block = add_block(&mut sketch, rect(0.0, 0.0, 100.0, 100.0), "1");
            add_block(&mut sketch, rect(200.0, 0.0, 300.0, 100.0), "2");
            add_house(&mut sketch, 10.0, 10.0);
            add_house(&mut sketch, 20.0, 20.0);
            let outside = add_house(&mut sketch, 250.0, 50.0);

            let removed = sketch.remove(&block);
            assert_eq!(removed.len(), 3);
            assert_eq!(removed[0], block);
            assert_eq!(sketch.house_count(), 1);
            assert!(sketch.contains(&outside));
            assert_eq!(sketch.blocks().count(), 1);
        }

        #[test]
        fn removing_house_renumbers_siblings_densely() {
            let mut sketch = Sketch::new("Demo");
            add_block(&mut sketch, rect(0.0, 0.0, 100.0, 100.0), "1");
            add_block(&mut sketch, rect(200.0, 0.0, 300.0, 100.0), "2");
            add_house(&mut sketch, 10.0, 10.0);
            let second = add_house(&mut sketch, 50.0, 50.0);
            add_house(&mut sketch, 90.0, 90.0);
            add_house(&mut sketch, 210.0, 10.0);
            add_house(&mut sketch, 220.0, 10.0);

            let removed = sketch.remove(&second);
            assert_eq!(removed, vec![second]);
            assert_eq!(house_labels(&sketch), vec!["1", "2", "1", "2"]);
        }

        #[test]
        fn remove_missing_element_is_noop() {
            let mut sketch = Sketch::new("Demo");
            add_block(&mut sketch, rect(0.0, 0.0, 10.0, 10.0), "1");
            assert!(sketch.remove(&ElementId::new("house-99")).is_empty());
            assert_eq!(sketch.len(), 1);
        }

        #[test]
        fn attributes_merge_instead_of_replace() {
            let mut sketch = Sketch::new("Demo");
            let block = add_block(&mut sketch, rect(0.0, 0.0, 10.0, 10.0), "7");
            assert!(sketch.update_attributes(
                &block,
                Attributes {
                    inhabitants: Some("25".to_string()),
                    ..Attributes::default()
                },
            ));
            let element = sketch.element(&block).unwrap();
            assert_eq!(element.attributes.block_number.as_deref(), Some("7"));
            assert_eq!(element.attributes.inhabitants_count(), Some(25));
            assert_eq!(element.block_label(), "7");
            assert!(!sketch.update_attributes(&ElementId::new("missing"), Attributes::default()));
        }

        #[test]
        fn reference_and_neighborhood_views() {
            let mut sketch = Sketch::new("Demo");
            let inner = add_block(&mut sketch, rect(10.0, 10.0, 50.0, 50.0), "1");
            let outer = add_block(&mut sketch, rect(500.0, 500.0, 600.0, 600.0), "2");
            sketch.add(
                Shape::path(ElementKind::Neighborhood, rect(0.0, 0.0, 100.0, 100.0)).unwrap(),
                Attributes::labelled("Centro"),
            );
            sketch.add(
                Shape::anchor(ElementKind::Reference, Point2::new(20.0, 20.0)).unwrap(),
                Attributes::labelled("Escuela"),
            );
            sketch.add(
                Shape::anchor(ElementKind::Reference, Point2::new(30.0, 30.0)).unwrap(),
                Attributes::labelled("Tienda"),
            );

            let inner = sketch.element(&inner).unwrap();
            let outer = sketch.element(&outer).unwrap();
            assert_eq!(sketch.reference_for_block(inner), Some("Escuela"));
            assert_eq!(sketch.reference_for_block(outer), None);
            assert!(sketch.block_is_inside_any_neighborhood(inner));
            assert!(!sketch.block_is_inside_any_neighborhood(outer));
        }

        #[test]
        fn hit_testing_prefers_topmost_element() {
            let mut sketch = Sketch::new("Demo");
            let block = add_block(&mut sketch, rect(0.0, 0.0, 100.0, 100.0), "1");
            let house = add_house(&mut sketch, 50.0, 50.0);
            let street = sketch.add(
                Shape::path(
                    ElementKind::Street,
                    vec![Point2::new(0.0, 120.0), Point2::new(100.0, 120.0)],
                )
                .unwrap(),
                Attributes::labelled("Calle"),
            );

            assert_eq!(sketch.element_at(Point2::new(53.0, 52.0)).map(Element::id), Some(&house));
            assert_eq!(sketch.element_at(Point2::new(20.0, 20.0)).map(Element::id), Some(&block));
            assert_eq!(sketch.element_at(Point2::new(40.0, 128.0)).map(Element::id), Some(&street));
            assert!(sketch.element_at(Point2::new(400.0, 400.0)).is_none());
        }

        #[test]
        fn sketch_serializes_with_tagged_shapes() {
            let mut sketch = Sketch::new("Demo");
            add_block(&mut sketch, rect(0.0, 0.0, 10.0, 10.0), "1");
            let json = serde_json::to_value(&sketch).unwrap();
            assert_eq!(json["elements"][0]["shape"]["kind"], "block");
            assert_eq!(json["elements"][0]["attributes"]["blockNumber"], "1");
            assert!(json.get("id").is_none());

            let restored: Sketch = serde_json::from_value(json).unwrap();
            assert_eq!(restored, sketch);
        }
    }
}
