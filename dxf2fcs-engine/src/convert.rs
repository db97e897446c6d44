//! 实体分派与面域组装。
//!
//! [`Converter`] 持有一次转换所需的全部可变状态：变换栈、编号分配器、
//! 输出缓冲与统计。每次调用 [`Converter::convert`] 都会重置这些状态。

use dxf2fcs_core::document::{Document, Entity, Hatch, Insert, Mesh};
use dxf2fcs_core::geometry::Point3;
use dxf2fcs_core::units::DrawingUnits;
use tracing::{debug, info, warn};

use crate::emitter::{Helper, ScriptBuffer};
use crate::errors::EngineError;
use crate::format::{LinearUnit, NumberFormat, VertexStyle};
use crate::ids::{CurveId, IdAllocator};
use crate::options::ConvertOptions;
use crate::sampler::{self, ArcSample};
use crate::stitcher::{self, ChainPiece, Segment};
use crate::transform::TransformStack;

/// 一次转换的计数。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConversionStats {
    pub curves: u64,
    pub areas: u64,
    /// 写出的坐标点数，包括命名顶点与点数组中的点。
    pub vertices: u64,
    pub unsupported: usize,
    /// 因几何退化或块引用无效而跳过的实体。
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ConvertedScript {
    pub script: String,
    pub stats: ConversionStats,
}

/// 尚未写出的面域：一条边界环路加若干孔洞环路。
#[derive(Debug)]
struct PendingArea {
    boundary: Vec<CurveId>,
    openings: Vec<Vec<CurveId>>,
}

impl PendingArea {
    fn new(boundary: Vec<CurveId>) -> Self {
        Self {
            boundary,
            openings: Vec::new(),
        }
    }

    fn curve_count(&self) -> usize {
        self.boundary.len() + self.openings.iter().map(Vec::len).sum::<usize>()
    }
}

/// 正在展开的块；`units` 是其内部实体所在空间的单位。
#[derive(Debug)]
struct ActiveBlock {
    name: String,
    units: DrawingUnits,
}

#[derive(Debug)]
pub struct Converter {
    options: ConvertOptions,
    format: NumberFormat,
    stack: TransformStack,
    ids: IdAllocator,
    buffer: ScriptBuffer,
    stats: ConversionStats,
    active_blocks: Vec<ActiveBlock>,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        let options = options.clamped();
        let format = NumberFormat::new(options.precision);
        let stack = TransformStack::new(options.unit.scale());
        Self {
            options,
            format,
            stack,
            ids: IdAllocator::new(),
            buffer: ScriptBuffer::new(),
            stats: ConversionStats::default(),
            active_blocks: Vec::new(),
        }
    }

    /// 当前变换栈深度；转换结束后总为 1。
    #[inline]
    pub fn transform_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn convert(&mut self, document: &Document) -> Result<ConvertedScript, EngineError> {
        self.reset();
        if let LinearUnit::Unrecognized(code) = &self.options.unit {
            warn!(unit = %code, "无法识别的输出单位，坐标比例按 1.0 处理");
        }

        for (id, entity) in document.entities() {
            debug!(entity = id.get(), kind = entity.kind_name(), "转换实体");
            self.convert_entity(document, entity)?;
        }

        self.stats.curves = self.ids.curves_allocated();
        self.stats.areas = self.ids.areas_allocated();
        let stats = self.stats;
        let script = std::mem::take(&mut self.buffer).finish();
        info!(
            curves = stats.curves,
            areas = stats.areas,
            unsupported = stats.unsupported,
            skipped = stats.skipped,
            "转换完成"
        );
        Ok(ConvertedScript { script, stats })
    }

    fn reset(&mut self) {
        self.format = NumberFormat::new(self.options.precision);
        self.stack = TransformStack::new(self.options.unit.scale());
        self.ids = IdAllocator::new();
        self.buffer = ScriptBuffer::new();
        self.stats = ConversionStats::default();
        self.active_blocks.clear();
    }

    fn convert_entities(
        &mut self,
        document: &Document,
        entities: &[Entity],
    ) -> Result<Vec<CurveId>, EngineError> {
        let mut curves = Vec::new();
        for entity in entities {
            curves.extend(self.convert_entity(document, entity)?);
        }
        Ok(curves)
    }

    /// 按实体类型分派，返回该实体生成的曲线编号。
    /// 网格只生成面域，块参照递归展开，二者都不返回编号。
    fn convert_entity(
        &mut self,
        document: &Document,
        entity: &Entity,
    ) -> Result<Vec<CurveId>, EngineError> {
        match entity {
            Entity::Line(line) => Ok(vec![self.emit_line(line.start, line.end)?]),
            Entity::Arc(arc) => match sampler::sample_arc(arc) {
                ArcSample::Partial(sample) => {
                    Ok(vec![self.emit_arc(sample.start, sample.mid, sample.end)?])
                }
                ArcSample::FullCircle => self.emit_circle(arc.center, arc.radius),
            },
            Entity::Circle(circle) => self.emit_circle(circle.center, circle.radius),
            Entity::Ellipse(ellipse) => {
                let (segments, is_closed) = sampler::ellipse_segments(
                    ellipse,
                    self.options.ellipse_segments_per_quadrant,
                );
                self.emit_stitched(&segments, is_closed, entity)
            }
            Entity::Spline(spline) => {
                let points = sampler::sample_spline(
                    spline,
                    self.options.spline_samples_per_control_point,
                );
                if points.len() < 2 {
                    return Ok(self.skip_malformed(entity));
                }
                Ok(vec![self.emit_point_run(&points)?])
            }
            Entity::Polyline(polyline) => {
                let mut points = polyline.vertices.clone();
                if points.len() < 2 {
                    return Ok(self.skip_malformed(entity));
                }
                if polyline.is_closed && !stitcher::coincident(points[0], points[points.len() - 1])
                {
                    points.push(points[0]);
                }
                Ok(vec![self.emit_point_run(&points)?])
            }
            Entity::LwPolyline(polyline) => {
                let segments = sampler::explode_lwpolyline(polyline);
                self.emit_stitched(&segments, polyline.is_closed, entity)
            }
            Entity::Mesh(mesh) => {
                self.emit_mesh(mesh)?;
                Ok(Vec::new())
            }
            Entity::Insert(insert) => {
                self.expand_insert(document, insert)?;
                Ok(Vec::new())
            }
            Entity::Hatch(hatch) => self.assemble_hatch(document, hatch),
            Entity::Unsupported(other) => {
                warn!(kind = %other.kind, layer = %other.layer, "不支持的实体类型，已跳过");
                self.stats.unsupported += 1;
                Ok(Vec::new())
            }
        }
    }

    fn skip_malformed(&mut self, entity: &Entity) -> Vec<CurveId> {
        debug!(kind = entity.kind_name(), layer = entity.layer_name(), "几何展开为空，跳过实体");
        self.stats.skipped += 1;
        Vec::new()
    }

    fn expand_insert(&mut self, document: &Document, insert: &Insert) -> Result<(), EngineError> {
        let Some(block) = document.block(&insert.block_name) else {
            warn!(block = %insert.block_name, "块定义不存在，跳过块参照");
            self.stats.skipped += 1;
            return Ok(());
        };
        if self
            .active_blocks
            .iter()
            .any(|active| active.name.eq_ignore_ascii_case(&block.name))
        {
            let path: Vec<&str> = self.active_blocks.iter().map(|active| active.name.as_str()).collect();
            warn!(block = %block.name, path = %path.join(" > "), "块参照形成循环，跳过");
            self.stats.skipped += 1;
            return Ok(());
        }

        // 父帧已把外层块单位换算为图形单位，这里只换算到外层空间
        let enclosing_units = self
            .active_blocks
            .last()
            .map_or(document.units(), |active| active.units);
        let unit_factor = DrawingUnits::conversion_factor(block.units, enclosing_units);
        let (linear, translation) = insert.placement(block.base_point, unit_factor);
        self.stack.push(linear, translation);
        self.active_blocks.push(ActiveBlock {
            name: block.name.clone(),
            units: block.units,
        });

        let result = self.convert_entities(document, &block.entities);

        self.active_blocks.pop();
        self.stack.pop()?;
        result.map(|_| ())
    }

    /// 逐条转换填充边界。非 outermost 的环路开启新面域，
    /// outermost 环路作为孔洞并入当前面域。
    fn assemble_hatch(
        &mut self,
        document: &Document,
        hatch: &Hatch,
    ) -> Result<Vec<CurveId>, EngineError> {
        let mut curves = Vec::new();
        let mut pending: Option<PendingArea> = None;

        for (index, path) in hatch.paths.iter().enumerate() {
            let mut path_curves = Vec::new();
            for edge in &path.edges {
                let entity = edge.to_entity(&hatch.layer);
                path_curves.extend(self.convert_entity(document, &entity)?);
            }
            if path_curves.is_empty() {
                debug!(path = index, flags = path.flags, "填充边界没有生成曲线");
                continue;
            }
            curves.extend_from_slice(&path_curves);

            if path.is_outermost() {
                match pending.as_mut() {
                    Some(area) => area.openings.push(path_curves),
                    None => pending = Some(PendingArea::new(path_curves)),
                }
            } else {
                if let Some(area) = pending.take() {
                    self.flush_area(area);
                }
                pending = Some(PendingArea::new(path_curves));
            }
        }

        if let Some(area) = pending.take() {
            self.flush_area(area);
        }
        Ok(curves)
    }

    fn flush_area(&mut self, area: PendingArea) {
        let id = self.ids.next_area();
        let mut line = format!("area {{{id}}} boundary curve {}", curve_list(&area.boundary));
        for opening in &area.openings {
            line.push_str(" opening curve ");
            line.push_str(&curve_list(opening));
        }
        if area.curve_count() == 4 {
            line.push_str(" mapping Linear");
        }
        self.buffer.push_line(line);
    }

    fn emit_mesh(&mut self, mesh: &Mesh) -> Result<(), EngineError> {
        for (index, face) in mesh.faces.iter().enumerate() {
            let mut ring = mesh.face_points(face);
            if ring.len() < 3 {
                debug!(face = index, layer = %mesh.layer, "网格面顶点不足，跳过");
                continue;
            }
            ring.push(ring[0]);
            let curve = self.emit_point_run(&ring)?;
            let area = self.ids.next_area();
            self.buffer
                .push_line(format!("area {{{area}}} boundary curve {{{curve}}}"));
        }
        Ok(())
    }

    fn emit_stitched(
        &mut self,
        segments: &[Segment],
        is_closed: bool,
        entity: &Entity,
    ) -> Result<Vec<CurveId>, EngineError> {
        let pieces = stitcher::split_runs(&stitcher::stitch(segments, is_closed));
        if pieces.is_empty() {
            return Ok(self.skip_malformed(entity));
        }

        let mut curves = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let id = match piece {
                ChainPiece::Straight(points) => self.emit_point_run(&points)?,
                ChainPiece::Arc { start, mid, end } => self.emit_arc(start, mid, end)?,
            };
            curves.push(id);
        }
        Ok(curves)
    }

    fn emit_line(&mut self, start: Point3, end: Point3) -> Result<CurveId, EngineError> {
        let id = self.ids.next_curve();
        let a = id.vertex_name('a');
        let b = id.vertex_name('b');
        self.emit_vertex(&a, start)?;
        self.emit_vertex(&b, end)?;
        self.buffer
            .push_line(format!("curve {{{id}}} vertex {{{a}}} {{{b}}}"));
        Ok(id)
    }

    fn emit_arc(&mut self, start: Point3, mid: Point3, end: Point3) -> Result<CurveId, EngineError> {
        let id = self.ids.next_curve();
        let a = id.vertex_name('a');
        let b = id.vertex_name('b');
        let c = id.vertex_name('c');
        self.emit_vertex(&a, start)?;
        self.emit_vertex(&b, end)?;
        self.emit_vertex(&c, mid)?;
        self.buffer
            .push_line(format!("curve {{{id}}} arc vertex {{{a}}} {{{c}}} {{{b}}}"));
        Ok(id)
    }

    /// 整圆拆成两段半圆，共用四个顶点。
    fn emit_circle(&mut self, center: Point3, radius: f64) -> Result<Vec<CurveId>, EngineError> {
        let [pa, pb, pc, pd] = sampler::circle_quadrants(center, radius);
        let first = self.ids.next_curve();
        let a = first.vertex_name('a');
        let b = first.vertex_name('b');
        let c = first.vertex_name('c');
        let d = first.vertex_name('d');
        self.emit_vertex(&a, pa)?;
        self.emit_vertex(&b, pb)?;
        self.emit_vertex(&c, pc)?;
        self.emit_vertex(&d, pd)?;

        self.buffer
            .push_line(format!("curve {{{first}}} arc vertex {{{a}}} {{{c}}} {{{b}}}"));
        let second = self.ids.next_curve();
        self.buffer
            .push_line(format!("curve {{{second}}} arc vertex {{{b}}} {{{d}}} {{{a}}}"));
        Ok(vec![first, second])
    }

    fn emit_vertex(&mut self, name: &str, point: Point3) -> Result<(), EngineError> {
        let [x, y, z] = self.format_point(point)?;
        match self.options.vertex_style {
            VertexStyle::Compact => {
                self.buffer.use_helper(Helper::Vertex);
                self.buffer.push_line(format!("{name} = v({x},{y},{z})"));
            }
            VertexStyle::Verbose => {
                self.buffer
                    .push_line(format!("vertex {{{name}}} xyz {x} {y} {z}"));
            }
        }
        self.stats.vertices += 1;
        Ok(())
    }

    /// 写出点数组与 filletedpoly 曲线。设置了圆角半径时内部点带半径列，
    /// 否则所有点 z 为 0 时省略 z。
    fn emit_point_run(&mut self, points: &[Point3]) -> Result<CurveId, EngineError> {
        let id = self.ids.next_curve();
        let name = id.points_name();
        let formatted = points
            .iter()
            .map(|point| self.format_point(*point))
            .collect::<Result<Vec<_>, _>>()?;

        let helper = if self.options.corner_radius != 0.0 {
            Helper::PointsXyzRadius
        } else if formatted.iter().all(|[_, _, z]| z == "0") {
            Helper::PointsXy
        } else {
            Helper::PointsXyz
        };
        let radius = self.format.format(self.options.corner_radius)?;
        let last = formatted.len().saturating_sub(1);

        let items: Vec<String> = formatted
            .iter()
            .enumerate()
            .map(|(index, [x, y, z])| match helper {
                Helper::PointsXy => format!("[{x},{y}]"),
                Helper::PointsXyzRadius => {
                    let r = if index == 0 || index == last { "0" } else { radius.as_str() };
                    format!("[{x},{y},{z},{r}]")
                }
                Helper::PointsXyz | Helper::Vertex => format!("[{x},{y},{z}]"),
            })
            .collect();

        self.buffer.use_helper(helper);
        self.buffer
            .push_line(format!("{name} = [ {} ]", items.join(", ")));
        self.buffer.push_line(format!(
            "curve {{{id}}} filletedpoly items ({}({name}))",
            helper.name()
        ));
        self.stats.vertices += formatted.len() as u64;
        Ok(id)
    }

    fn format_point(&self, point: Point3) -> Result<[String; 3], EngineError> {
        let world = self.stack.apply(point);
        Ok([
            self.format.format(world.x)?,
            self.format.format(world.y)?,
            self.format.format(world.z)?,
        ])
    }
}

fn curve_list(curves: &[CurveId]) -> String {
    curves
        .iter()
        .enumerate()
        .map(|(index, id)| {
            if index == 0 {
                format!("{{{id}}}")
            } else {
                format!("+{{{id}}}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxf2fcs_core::document::{BlockDefinition, PolylineVertex};
    use dxf2fcs_core::geometry::Vector3;

    fn p(x: f64, y: f64) -> Point3 {
        Point3::new(x, y, 0.0)
    }

    fn meters() -> ConvertOptions {
        ConvertOptions {
            unit: LinearUnit::Meters,
            ..ConvertOptions::default()
        }
    }

    #[test]
    fn curve_list_joins_with_plus_prefix() {
        let mut ids = IdAllocator::new();
        let curves: Vec<CurveId> = (0..3).map(|_| ids.next_curve()).collect();
        assert_eq!(curve_list(&curves), "{c1} +{c2} +{c3}");
        assert_eq!(curve_list(&curves[..1]), "{c1}");
    }

    #[test]
    fn reconverting_resets_counters() {
        let mut document = Document::new();
        document.add_line(p(0.0, 0.0), p(1.0, 0.0), "0");
        let mut converter = Converter::new(meters());

        let first = converter.convert(&document).expect("first run");
        let second = converter.convert(&document).expect("second run");
        assert_eq!(first.script, second.script);
        assert_eq!(second.stats.curves, 1);
        assert_eq!(converter.transform_depth(), 1);
    }

    #[test]
    fn missing_block_is_skipped_and_counted() {
        let mut document = Document::new();
        document.add_insert("GHOST", p(0.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 0.0, "0");
        let converted = Converter::new(meters()).convert(&document).expect("convert");
        assert_eq!(converted.stats.skipped, 1);
        assert!(converted.script.is_empty());
    }

    #[test]
    fn corner_radius_is_written_for_interior_points_only() {
        let mut document = Document::new();
        document.add_lwpolyline(
            [
                PolylineVertex::new(p(0.0, 0.0)),
                PolylineVertex::new(p(1.0, 0.0)),
                PolylineVertex::new(p(1.0, 1.0)),
            ],
            false,
            "0",
        );
        let options = ConvertOptions {
            corner_radius: 0.25,
            ..meters()
        };
        let converted = Converter::new(options).convert(&document).expect("convert");
        assert!(converted.script.starts_with("vxyzr = "));
        assert!(converted
            .script
            .contains("vs1 = [ [0,0,0,0], [1,0,0,0.25], [1,1,0,0] ]"));
        assert!(converted
            .script
            .contains("curve {c1} filletedpoly items (vxyzr(vs1))"));
    }

    #[test]
    fn block_containing_itself_terminates() {
        let mut document = Document::new();
        let mut block = BlockDefinition::new("LOOP", p(0.0, 0.0));
        block.entities.push(Entity::Line(dxf2fcs_core::document::Line {
            start: p(0.0, 0.0),
            end: p(1.0, 0.0),
            layer: "0".to_string(),
        }));
        block.entities.push(Entity::Insert(Insert {
            block_name: "LOOP".to_string(),
            insert: p(5.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: 0.0,
            layer: "0".to_string(),
        }));
        document.add_block_definition(block);
        document.add_insert("LOOP", p(0.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 0.0, "0");

        let mut converter = Converter::new(meters());
        let converted = converter.convert(&document).expect("convert");
        assert_eq!(converted.stats.curves, 1);
        assert_eq!(converted.stats.skipped, 1);
        assert_eq!(converter.transform_depth(), 1);
    }
}
