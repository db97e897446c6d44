use std::collections::HashMap;
use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use dxf2fcs_core::{
    document::{
        Arc, BlockDefinition, Circle, Document, Ellipse, Entity, Hatch, HatchBoundaryPath,
        HatchEdge, Insert, Line, LwPolyline, Mesh, Polyline, PolylineVertex, Spline,
        UnsupportedEntity, path_flags,
    },
    geometry::{Point3, Vector3},
    units::DrawingUnits,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

/// ASCII DXF 读取入口。
#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 直接解析内存中的 DXF 文本。
    pub fn load_from_str(&self, source: &str) -> Result<Document, IoError> {
        let parser = DxfParser::new(source);
        parser.parse().map_err(|err| match err {
            DxfError::Unsupported { feature } => IoError::UnsupportedFeature(feature),
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
        })
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_from_str(&data)
    }
}

#[derive(Debug)]
enum DxfError {
    Unsupported { feature: String },
    Invalid { message: String },
}

impl DxfError {
    fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
    block_units: HashMap<String, DrawingUnits>,
}

enum PolyfaceRecord {
    Coordinate(Point3),
    Face { indices: [i32; 4] },
    Ignored,
}

struct HeavyVertex {
    position: Point3,
    bulge: f64,
    flags: i16,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
            block_units: HashMap::new(),
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "HEADER" => self.parse_header(&mut document)?,
                        "TABLES" => self.parse_tables()?,
                        "BLOCKS" => self.parse_blocks(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }

        // BLOCK_RECORD 可能出现在 BLOCKS 之后，统一在末尾回填块单位。
        for (name, units) in std::mem::take(&mut self.block_units) {
            if let Some(block) = document.block_mut(&name) {
                block.units = units;
            }
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_header(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let mut variable: Option<String> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some((9, name)) => variable = Some(name.trim().to_string()),
                Some((70, value)) if variable.as_deref() == Some("$INSUNITS") => {
                    let code = parse_i16(&value, "HEADER $INSUNITS（组码 70）")?;
                    document.set_units(DrawingUnits::from_code(code));
                }
                Some(_) => continue,
                None => return Err(DxfError::invalid("HEADER 段未找到 ENDSEC 终止标记")),
            }
        }
        Ok(())
    }

    fn parse_tables(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "ENDSEC" => break,
                    "BLOCK_RECORD" => {
                        if let Some((name, units)) = self.parse_block_record()? {
                            self.block_units.insert(name, units);
                        }
                    }
                    _ => continue,
                },
                Some(_) => continue,
                None => return Err(DxfError::invalid("TABLES 段未找到 ENDSEC 终止标记")),
            }
        }
        Ok(())
    }

    fn parse_block_record(&mut self) -> Result<Option<(String, DrawingUnits)>, DxfError> {
        let mut name = None;
        let mut units = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    2 => name = Some(value.trim().to_string()),
                    70 => {
                        units = Some(DrawingUnits::from_code(parse_i16(
                            &value,
                            "BLOCK_RECORD 插入单位（组码 70）",
                        )?))
                    }
                    _ => {}
                },
                None => return Err(DxfError::invalid("BLOCK_RECORD 未正确结束")),
            }
        }
        Ok(name.map(|name| (name, units.unwrap_or_default())))
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.trim() {
                "ENDSEC" => break,
                kind => {
                    if let Some(entity) = self.parse_entity(kind)? {
                        document.add_entity(entity);
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_blocks(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("BLOCKS 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "BLOCKS 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.trim() {
                "ENDSEC" => break,
                "BLOCK" => {
                    let definition = self.parse_block_definition()?;
                    document.add_block_definition(definition);
                }
                _ => {
                    // 未预期的条目，直接跳过
                    self.skip_entity_body()?;
                }
            }
        }
        Ok(())
    }

    fn parse_block_definition(&mut self) -> Result<BlockDefinition, DxfError> {
        let mut name: Option<String> = None;
        let mut base = [0.0_f64; 3];
        let mut entities: Vec<Entity> = Vec::new();

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "ENDBLK" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    kind => {
                        if let Some(entity) = self.parse_entity(kind)? {
                            entities.push(entity);
                        }
                    }
                },
                Some((code, value)) => match code {
                    2 => name = Some(value.trim().to_string()),
                    10 => base[0] = parse_f64(&value, "BLOCK 基点 X")?,
                    20 => base[1] = parse_f64(&value, "BLOCK 基点 Y")?,
                    30 => base[2] = parse_f64(&value, "BLOCK 基点 Z")?,
                    _ => {}
                },
                None => {
                    return Err(DxfError::invalid("BLOCK 定义未找到 ENDBLK 终止标记"));
                }
            }
        }

        let name = name.ok_or_else(|| DxfError::invalid("BLOCK 缺少名称（组码 2）"))?;
        let mut definition = BlockDefinition::new(name, Point3::new(base[0], base[1], base[2]));
        definition.entities = entities;
        Ok(definition)
    }

    /// 解析一个实体；序列尾记录（SEQEND 等）返回 `None`。
    fn parse_entity(&mut self, kind: &str) -> Result<Option<Entity>, DxfError> {
        let entity = match kind {
            "LINE" => self.parse_line()?,
            "CIRCLE" => self.parse_circle()?,
            "ARC" => self.parse_arc()?,
            "ELLIPSE" => self.parse_ellipse()?,
            "SPLINE" => self.parse_spline()?,
            "LWPOLYLINE" => self.parse_lwpolyline()?,
            "POLYLINE" => self.parse_polyline_entity()?,
            "3DFACE" => self.parse_3dface()?,
            "INSERT" => self.parse_insert()?,
            "HATCH" => self.parse_hatch()?,
            "SEQEND" | "VERTEX" | "ATTRIB" => {
                self.skip_entity_body()?;
                return Ok(None);
            }
            other => self.parse_unsupported(other)?,
        };
        Ok(Some(entity))
    }

    fn parse_unsupported(&mut self, kind: &str) -> Result<Entity, DxfError> {
        let mut layer = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((8, value)) => layer = Some(value.trim().to_string()),
                Some(_) => continue,
                None => break,
            }
        }
        debug!(kind, "读取到暂不支持的实体，保留占位");
        Ok(Entity::Unsupported(UnsupportedEntity {
            kind: kind.to_string(),
            layer: layer.unwrap_or_else(|| "0".to_string()),
        }))
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut start = [None; 3];
        let mut end = [None; 3];
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut start[0], &value, "LINE 起点 X（组码 10）")?,
                    20 => assign_coord(&mut start[1], &value, "LINE 起点 Y（组码 20）")?,
                    30 => assign_coord(&mut start[2], &value, "LINE 起点 Z（组码 30）")?,
                    11 => assign_coord(&mut end[0], &value, "LINE 终点 X（组码 11）")?,
                    21 => assign_coord(&mut end[1], &value, "LINE 终点 Y（组码 21）")?,
                    31 => assign_coord(&mut end[2], &value, "LINE 终点 Z（组码 31）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("LINE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let sx = start[0].ok_or_else(|| DxfError::invalid("LINE 缺少起点 X（组码 10）"))?;
        let sy = start[1].ok_or_else(|| DxfError::invalid("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end[0].ok_or_else(|| DxfError::invalid("LINE 缺少终点 X（组码 11）"))?;
        let ey = end[1].ok_or_else(|| DxfError::invalid("LINE 缺少终点 Y（组码 21）"))?;

        Ok(Entity::Line(Line {
            start: Point3::new(sx, sy, start[2].unwrap_or(0.0)),
            end: Point3::new(ex, ey, end[2].unwrap_or(0.0)),
            layer,
        }))
    }

    fn parse_circle(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center = [None; 3];
        let mut radius = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center[0], &value, "CIRCLE 圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center[1], &value, "CIRCLE 圆心 Y（组码 20）")?,
                    30 => assign_coord(&mut center[2], &value, "CIRCLE 圆心 Z（组码 30）")?,
                    40 => assign_coord(&mut radius, &value, "CIRCLE 半径（组码 40）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("CIRCLE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center[0].ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 X（组码 10）"))?;
        let cy = center[1].ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("CIRCLE 缺少半径（组码 40）"))?;

        Ok(Entity::Circle(Circle {
            center: Point3::new(cx, cy, center[2].unwrap_or(0.0)),
            radius,
            layer,
        }))
    }

    fn parse_arc(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center = [None; 3];
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center[0], &value, "ARC 圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center[1], &value, "ARC 圆心 Y（组码 20）")?,
                    30 => assign_coord(&mut center[2], &value, "ARC 圆心 Z（组码 30）")?,
                    40 => assign_coord(&mut radius, &value, "ARC 半径（组码 40）")?,
                    50 => assign_coord(&mut start_angle, &value, "ARC 起始角（组码 50）")?,
                    51 => assign_coord(&mut end_angle, &value, "ARC 终止角（组码 51）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("ARC 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center[0].ok_or_else(|| DxfError::invalid("ARC 缺少圆心 X（组码 10）"))?;
        let cy = center[1].ok_or_else(|| DxfError::invalid("ARC 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("ARC 缺少半径（组码 40）"))?;
        let start_angle =
            start_angle.ok_or_else(|| DxfError::invalid("ARC 缺少起始角（组码 50）"))?;
        let end_angle = end_angle.ok_or_else(|| DxfError::invalid("ARC 缺少终止角（组码 51）"))?;

        Ok(Entity::Arc(Arc {
            center: Point3::new(cx, cy, center[2].unwrap_or(0.0)),
            radius,
            start_angle: start_angle.to_radians(),
            end_angle: end_angle.to_radians(),
            layer,
        }))
    }

    fn parse_ellipse(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center = [None; 3];
        let mut major = [None; 3];
        let mut ratio = None;
        let mut start_parameter = None;
        let mut end_parameter = None;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center[0], &value, "ELLIPSE 圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center[1], &value, "ELLIPSE 圆心 Y（组码 20）")?,
                    30 => assign_coord(&mut center[2], &value, "ELLIPSE 圆心 Z（组码 30）")?,
                    11 => assign_coord(&mut major[0], &value, "ELLIPSE 主轴向量 X（组码 11）")?,
                    21 => assign_coord(&mut major[1], &value, "ELLIPSE 主轴向量 Y（组码 21）")?,
                    31 => assign_coord(&mut major[2], &value, "ELLIPSE 主轴向量 Z（组码 31）")?,
                    40 => assign_coord(&mut ratio, &value, "ELLIPSE 半径比（组码 40）")?,
                    41 => assign_coord(&mut start_parameter, &value, "ELLIPSE 起始参数（组码 41）")?,
                    42 => assign_coord(&mut end_parameter, &value, "ELLIPSE 终止参数（组码 42）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("ELLIPSE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center[0].ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心 X（组码 10）"))?;
        let cy = center[1].ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心 Y（组码 20）"))?;
        let mx = major[0].ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量 X（组码 11）"))?;
        let my = major[1].ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量 Y（组码 21）"))?;
        let major_axis = Vector3::new(mx, my, major[2].unwrap_or(0.0));

        if major_axis.0.length() < f64::EPSILON {
            return Err(DxfError::invalid("ELLIPSE 主轴向量长度为 0，无法创建实体"));
        }

        let ratio = ratio.unwrap_or(1.0);
        if ratio <= 0.0 {
            return Err(DxfError::invalid(format!(
                "ELLIPSE 半径比必须为正数，实际为 {ratio}"
            )));
        }

        Ok(Entity::Ellipse(Ellipse {
            center: Point3::new(cx, cy, center[2].unwrap_or(0.0)),
            major_axis,
            ratio,
            start_parameter: start_parameter.unwrap_or(0.0),
            end_parameter: end_parameter.unwrap_or(std::f64::consts::TAU),
            layer,
        }))
    }

    fn parse_spline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut flags: i16 = 0;
        let mut degree: Option<i16> = None;
        let mut knot_values: Vec<f64> = Vec::new();
        let mut weights: Vec<f64> = Vec::new();
        let mut control_points: Vec<Point3> = Vec::new();
        let mut fit_points: Vec<Point3> = Vec::new();

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => flags = parse_i16(&value, "SPLINE 类型标志（组码 70）")?,
                    71 => degree = Some(parse_i16(&value, "SPLINE 阶数（组码 71）")?),
                    40 => knot_values.push(parse_f64(&value, "SPLINE 节点值（组码 40）")?),
                    41 => weights.push(parse_f64(&value, "SPLINE 权重（组码 41）")?),
                    10 => control_points.push(Point3::new(
                        parse_f64(&value, "SPLINE 控制点 X（组码 10）")?,
                        0.0,
                        0.0,
                    )),
                    20 => {
                        let y = parse_f64(&value, "SPLINE 控制点 Y（组码 20）")?;
                        let point = control_points.last_mut().ok_or_else(|| {
                            DxfError::invalid("SPLINE 控制点 Y（组码 20）缺少对应的 X")
                        })?;
                        point.0.y = y;
                    }
                    30 => {
                        let z = parse_f64(&value, "SPLINE 控制点 Z（组码 30）")?;
                        if let Some(point) = control_points.last_mut() {
                            point.0.z = z;
                        }
                    }
                    11 => fit_points.push(Point3::new(
                        parse_f64(&value, "SPLINE 拟合点 X（组码 11）")?,
                        0.0,
                        0.0,
                    )),
                    21 => {
                        let y = parse_f64(&value, "SPLINE 拟合点 Y（组码 21）")?;
                        let point = fit_points.last_mut().ok_or_else(|| {
                            DxfError::invalid("SPLINE 拟合点 Y（组码 21）缺少对应的 X")
                        })?;
                        point.0.y = y;
                    }
                    31 => {
                        let z = parse_f64(&value, "SPLINE 拟合点 Z（组码 31）")?;
                        if let Some(point) = fit_points.last_mut() {
                            point.0.z = z;
                        }
                    }
                    _ => {}
                },
                None => return Err(DxfError::invalid("SPLINE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let degree = degree.ok_or_else(|| DxfError::invalid("SPLINE 缺少阶数（组码 71）"))? as i32;

        Ok(Entity::Spline(Spline {
            degree,
            is_closed: flags & 0x01 != 0,
            is_periodic: flags & 0x02 != 0,
            is_rational: flags & 0x04 != 0,
            control_points,
            weights,
            knot_values,
            fit_points,
            layer,
        }))
    }

    fn parse_lwpolyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut is_closed = false;
        let mut elevation = 0.0;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_y = false;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => {
                        let flag = parse_i32(&value, "LWPOLYLINE 标志（组码 70）")?;
                        is_closed = flag & 0x01 == 0x01;
                    }
                    38 => elevation = parse_f64(&value, "LWPOLYLINE 标高（组码 38）")?,
                    10 => {
                        if pending_y {
                            return Err(DxfError::invalid(
                                "LWPOLYLINE 顶点缺少对应的 Y（组码 20）",
                            ));
                        }
                        let x = parse_f64(&value, "LWPOLYLINE 顶点 X（组码 10）")?;
                        vertices.push(PolylineVertex::new(Point3::new(x, 0.0, 0.0)));
                        pending_y = true;
                    }
                    20 => {
                        let y = parse_f64(&value, "LWPOLYLINE 顶点 Y（组码 20）")?;
                        match vertices.last_mut() {
                            Some(vertex) if pending_y => {
                                vertex.position.0.y = y;
                                pending_y = false;
                            }
                            _ => {
                                return Err(DxfError::invalid(
                                    "LWPOLYLINE 顶点缺少对应的 X（组码 10）",
                                ));
                            }
                        }
                    }
                    42 => {
                        let bulge = parse_f64(&value, "LWPOLYLINE 顶点 bulge（组码 42）")?;
                        let vertex = vertices.last_mut().ok_or_else(|| {
                            DxfError::invalid("LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）")
                        })?;
                        vertex.bulge = bulge;
                    }
                    _ => {}
                },
                None => return Err(DxfError::invalid("LWPOLYLINE 未正确结束")),
            }
        }

        if pending_y {
            return Err(DxfError::invalid(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }

        for vertex in &mut vertices {
            vertex.position.0.z = elevation;
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        Ok(Entity::LwPolyline(LwPolyline {
            vertices,
            is_closed,
            layer,
        }))
    }

    fn parse_polyline_entity(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut flags: Option<i16> = None;
        let mut mesh_rows: Option<i16> = None;
        let mut mesh_cols: Option<i16> = None;
        let mut elevation = 0.0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    30 => elevation = parse_f64(&value, "POLYLINE 标高（组码 30）")?,
                    70 => flags = Some(parse_i16(&value, "POLYLINE 标志（组码 70）")?),
                    71 => mesh_rows = Some(parse_i16(&value, "POLYLINE 网格行数（组码 71）")?),
                    72 => mesh_cols = Some(parse_i16(&value, "POLYLINE 网格列数（组码 72）")?),
                    _ => {}
                },
                None => return Err(DxfError::invalid("POLYLINE 未正确结束")),
            }
        }

        let flags = flags.unwrap_or(0);
        let layer = layer.unwrap_or_else(|| "0".to_string());
        if flags & 0x40 != 0 {
            return self.parse_polyface_mesh(layer);
        }

        if flags & 0x10 != 0 {
            let rows =
                mesh_rows.ok_or_else(|| DxfError::invalid("POLYLINE 网格缺少行数（组码 71）"))?;
            let cols =
                mesh_cols.ok_or_else(|| DxfError::invalid("POLYLINE 网格缺少列数（组码 72）"))?;
            let wrap_m = flags & 0x01 != 0;
            let wrap_n = flags & 0x20 != 0;
            return self.parse_polygon_mesh(
                layer,
                rows.max(0) as usize,
                cols.max(0) as usize,
                wrap_m,
                wrap_n,
            );
        }

        self.parse_heavy_polyline(layer, flags & 0x01 != 0, flags & 0x08 != 0, elevation)
    }

    fn parse_heavy_polyline(
        &mut self,
        layer: String,
        is_closed: bool,
        is_3d: bool,
        elevation: f64,
    ) -> Result<Entity, DxfError> {
        let mut vertices: Vec<HeavyVertex> = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => vertices.push(self.parse_heavy_vertex()?),
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => {
                    return Err(DxfError::invalid(
                        "POLYLINE 遇到无效的记录，期望 VERTEX/SEQEND",
                    ));
                }
                None => {
                    return Err(DxfError::invalid(
                        "POLYLINE 缺少 SEQEND（组码 0, 值为 SEQEND）",
                    ));
                }
            }
        }

        // 0x10：样条框架控制点，不属于实际轮廓。
        vertices.retain(|vertex| vertex.flags & 0x10 == 0);
        if !is_3d {
            for vertex in &mut vertices {
                vertex.position.0.z = elevation;
            }
        }

        if vertices.iter().any(|vertex| vertex.bulge.abs() > f64::EPSILON) {
            // 二维多段线带 bulge 时按轻量多段线处理，圆弧段由引擎展开。
            return Ok(Entity::LwPolyline(LwPolyline {
                vertices: vertices
                    .iter()
                    .map(|vertex| PolylineVertex::with_bulge(vertex.position, vertex.bulge))
                    .collect(),
                is_closed,
                layer,
            }));
        }

        Ok(Entity::Polyline(Polyline {
            vertices: vertices.iter().map(|vertex| vertex.position).collect(),
            is_closed,
            layer,
        }))
    }

    fn parse_heavy_vertex(&mut self) -> Result<HeavyVertex, DxfError> {
        let mut coords = [None; 3];
        let mut bulge = 0.0;
        let mut flags: i16 = 0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    10 => assign_coord(&mut coords[0], &value, "VERTEX X（组码 10）")?,
                    20 => assign_coord(&mut coords[1], &value, "VERTEX Y（组码 20）")?,
                    30 => assign_coord(&mut coords[2], &value, "VERTEX Z（组码 30）")?,
                    42 => bulge = parse_f64(&value, "VERTEX bulge（组码 42）")?,
                    70 => flags = parse_i16(&value, "VERTEX 标志（组码 70）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("VERTEX 未正确结束")),
            }
        }
        let x = coords[0].ok_or_else(|| DxfError::invalid("VERTEX 缺少 X（组码 10）"))?;
        let y = coords[1].ok_or_else(|| DxfError::invalid("VERTEX 缺少 Y（组码 20）"))?;
        Ok(HeavyVertex {
            position: Point3::new(x, y, coords[2].unwrap_or(0.0)),
            bulge,
            flags,
        })
    }

    fn parse_polyface_mesh(&mut self, layer: String) -> Result<Entity, DxfError> {
        let mut vertices: Vec<Point3> = Vec::new();
        let mut faces: Vec<Vec<usize>> = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => match self.parse_polyface_vertex_record()? {
                        PolyfaceRecord::Coordinate(point) => vertices.push(point),
                        PolyfaceRecord::Face { indices } => {
                            if let Some(face) = build_polyface_face(vertices.len(), indices)? {
                                faces.push(face);
                            }
                        }
                        PolyfaceRecord::Ignored => {}
                    },
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => {
                    return Err(DxfError::invalid(
                        "POLYLINE 遇到无效的记录，期望 VERTEX/SEQEND",
                    ));
                }
                None => {
                    return Err(DxfError::invalid(
                        "POLYLINE 缺少 SEQEND（组码 0, 值为 SEQEND）",
                    ));
                }
            }
        }
        Ok(Entity::Mesh(Mesh {
            vertices,
            faces,
            layer,
        }))
    }

    fn parse_polygon_mesh(
        &mut self,
        layer: String,
        rows: usize,
        cols: usize,
        wrap_m: bool,
        wrap_n: bool,
    ) -> Result<Entity, DxfError> {
        if rows < 2 || cols < 2 {
            return Err(DxfError::invalid(
                "POLYLINE 网格至少需要 2x2 个顶点才能构成面",
            ));
        }

        let mut vertices: Vec<Point3> = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => {
                        let vertex = self.parse_heavy_vertex()?;
                        vertices.push(vertex.position);
                    }
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => return Err(DxfError::invalid("POLYLINE 网格遇到无效记录")),
                None => {
                    return Err(DxfError::invalid(
                        "POLYLINE 网格缺少 SEQEND（组码 0, 值为 SEQEND）",
                    ));
                }
            }
        }

        let expected = rows * cols;
        if vertices.len() < expected {
            return Err(DxfError::invalid(format!(
                "POLYLINE 网格顶点不足：期望至少 {expected} 个，实际为 {}",
                vertices.len()
            )));
        }
        vertices.truncate(expected);

        let row_iterations = if wrap_m { rows } else { rows - 1 };
        let col_iterations = if wrap_n { cols } else { cols - 1 };
        let mut faces = Vec::with_capacity(row_iterations * col_iterations);
        for row in 0..row_iterations {
            let next_row = (row + 1) % rows;
            for col in 0..col_iterations {
                let next_col = (col + 1) % cols;
                faces.push(vec![
                    row * cols + col,
                    next_row * cols + col,
                    next_row * cols + next_col,
                    row * cols + next_col,
                ]);
            }
        }

        Ok(Entity::Mesh(Mesh {
            vertices,
            faces,
            layer,
        }))
    }

    fn parse_polyface_vertex_record(&mut self) -> Result<PolyfaceRecord, DxfError> {
        let mut x = None;
        let mut y = None;
        let mut z = None;
        let mut flags: i16 = 0;
        let mut indices = [0i32; 4];

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    10 => x = Some(parse_f64(&value, "POLYFACE 顶点 X（组码 10）")?),
                    20 => y = Some(parse_f64(&value, "POLYFACE 顶点 Y（组码 20）")?),
                    30 => z = Some(parse_f64(&value, "POLYFACE 顶点 Z（组码 30）")?),
                    70 => flags = parse_i16(&value, "VERTEX 标志（组码 70）")?,
                    71 => indices[0] = parse_i32(&value, "POLYFACE 面顶点 1（组码 71）")?,
                    72 => indices[1] = parse_i32(&value, "POLYFACE 面顶点 2（组码 72）")?,
                    73 => indices[2] = parse_i32(&value, "POLYFACE 面顶点 3（组码 73）")?,
                    74 => indices[3] = parse_i32(&value, "POLYFACE 面顶点 4（组码 74）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("VERTEX 未正确结束")),
            }
        }

        if flags & 0x80 != 0 && flags & 0x40 != 0 {
            let point = Point3::new(
                x.ok_or_else(|| DxfError::invalid("POLYFACE 顶点缺少 X（组码 10）"))?,
                y.ok_or_else(|| DxfError::invalid("POLYFACE 顶点缺少 Y（组码 20）"))?,
                z.unwrap_or(0.0),
            );
            Ok(PolyfaceRecord::Coordinate(point))
        } else if flags & 0x80 != 0 {
            Ok(PolyfaceRecord::Face { indices })
        } else {
            Ok(PolyfaceRecord::Ignored)
        }
    }

    fn parse_3dface(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut vx = [None; 4];
        let mut vy = [None; 4];
        let mut vz = [None; 4];

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut vx[0], &value, "3DFACE 顶点 1 X（组码 10）")?,
                    20 => assign_coord(&mut vy[0], &value, "3DFACE 顶点 1 Y（组码 20）")?,
                    30 => assign_coord(&mut vz[0], &value, "3DFACE 顶点 1 Z（组码 30）")?,
                    11 => assign_coord(&mut vx[1], &value, "3DFACE 顶点 2 X（组码 11）")?,
                    21 => assign_coord(&mut vy[1], &value, "3DFACE 顶点 2 Y（组码 21）")?,
                    31 => assign_coord(&mut vz[1], &value, "3DFACE 顶点 2 Z（组码 31）")?,
                    12 => assign_coord(&mut vx[2], &value, "3DFACE 顶点 3 X（组码 12）")?,
                    22 => assign_coord(&mut vy[2], &value, "3DFACE 顶点 3 Y（组码 22）")?,
                    32 => assign_coord(&mut vz[2], &value, "3DFACE 顶点 3 Z（组码 32）")?,
                    13 => assign_coord(&mut vx[3], &value, "3DFACE 顶点 4 X（组码 13）")?,
                    23 => assign_coord(&mut vy[3], &value, "3DFACE 顶点 4 Y（组码 23）")?,
                    33 => assign_coord(&mut vz[3], &value, "3DFACE 顶点 4 Z（组码 33）")?,
                    _ => {}
                },
                None => return Err(DxfError::invalid("3DFACE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let mut vertices = Vec::with_capacity(4);
        for index in 0..4 {
            match build_face_vertex(index + 1, vx[index], vy[index], vz[index])? {
                Some(vertex) => vertices.push(vertex),
                None if index < 3 => {
                    return Err(DxfError::invalid(format!(
                        "3DFACE 缺少第 {} 个顶点",
                        index + 1
                    )));
                }
                None => {}
            }
        }
        // 第四点与第三点重合时为三角面。
        if vertices.len() == 4 && vertices[3] == vertices[2] {
            vertices.pop();
        }

        let faces = vec![(0..vertices.len()).collect()];
        Ok(Entity::Mesh(Mesh {
            vertices,
            faces,
            layer,
        }))
    }

    fn parse_insert(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut name = None;
        let mut insert = [None; 3];
        let mut scale = [None; 3];
        let mut rotation_deg: f64 = 0.0;
        let mut has_attributes = false;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    2 => {
                        if name.is_some() {
                            return Err(DxfError::invalid("INSERT 遇到重复的块名（组码 2）"));
                        }
                        name = Some(value.trim().to_string());
                    }
                    10 => assign_coord(&mut insert[0], &value, "INSERT 插入点 X（组码 10）")?,
                    20 => assign_coord(&mut insert[1], &value, "INSERT 插入点 Y（组码 20）")?,
                    30 => assign_coord(&mut insert[2], &value, "INSERT 插入点 Z（组码 30）")?,
                    41 => assign_coord(&mut scale[0], &value, "INSERT 缩放 X（组码 41）")?,
                    42 => assign_coord(&mut scale[1], &value, "INSERT 缩放 Y（组码 42）")?,
                    43 => assign_coord(&mut scale[2], &value, "INSERT 缩放 Z（组码 43）")?,
                    50 => rotation_deg = parse_f64(&value, "INSERT 旋转角（组码 50）")?,
                    66 => has_attributes = parse_i16(&value, "INSERT 属性标志（组码 66）")? != 0,
                    _ => {}
                },
                None => return Err(DxfError::invalid("INSERT 未正确结束")),
            }
        }

        let name = name.ok_or_else(|| DxfError::invalid("INSERT 缺少块名（组码 2）"))?;
        let ix = insert[0].ok_or_else(|| DxfError::invalid("INSERT 缺少插入点 X（组码 10）"))?;
        let iy = insert[1].ok_or_else(|| DxfError::invalid("INSERT 缺少插入点 Y（组码 20）"))?;

        if has_attributes {
            self.skip_attribute_sequence()?;
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        Ok(Entity::Insert(Insert {
            block_name: name,
            insert: Point3::new(ix, iy, insert[2].unwrap_or(0.0)),
            scale: Vector3::new(
                scale[0].unwrap_or(1.0),
                scale[1].unwrap_or(1.0),
                scale[2].unwrap_or(1.0),
            ),
            rotation: rotation_deg.to_radians(),
            layer,
        }))
    }

    fn skip_attribute_sequence(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "ATTRIB" => self.skip_entity_body()?,
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some((code, value)) => {
                    return Err(DxfError::invalid(format!(
                        "INSERT 属性段出现意外组码 {code} 值 {value}"
                    )));
                }
                None => break,
            }
        }
        Ok(())
    }

    fn parse_hatch(&mut self) -> Result<Entity, DxfError> {
        struct PartialPath {
            flags: i32,
            has_bulge: bool,
            is_closed: bool,
            expected_vertices: Option<usize>,
            poly_vertices: Vec<PolylineVertex>,
            edges: Vec<HatchEdge>,
        }

        impl PartialPath {
            fn new(flags: i32) -> Self {
                Self {
                    flags,
                    has_bulge: false,
                    is_closed: true,
                    expected_vertices: None,
                    poly_vertices: Vec::new(),
                    edges: Vec::new(),
                }
            }

            fn is_polyline(&self) -> bool {
                self.flags & path_flags::POLYLINE != 0
            }

            fn finalize_edge_builder(
                &mut self,
                builder: Option<EdgeBuilder>,
            ) -> Result<(), DxfError> {
                if let Some(edge_builder) = builder {
                    self.edges.push(edge_builder.finish()?);
                }
                Ok(())
            }

            fn finalize(mut self) -> Result<HatchBoundaryPath, DxfError> {
                if self.is_polyline() {
                    if let Some(expected) = self.expected_vertices {
                        if expected != self.poly_vertices.len() {
                            return Err(DxfError::invalid(format!(
                                "HATCH 多段线环路声明的顶点数量 {expected} 与实际数量 {} 不符",
                                self.poly_vertices.len()
                            )));
                        }
                    }
                    if !self.has_bulge {
                        for vertex in &mut self.poly_vertices {
                            vertex.bulge = 0.0;
                        }
                    }
                    self.edges.push(HatchEdge::Polyline {
                        vertices: self.poly_vertices,
                        is_closed: self.is_closed,
                    });
                }
                Ok(HatchBoundaryPath {
                    flags: self.flags,
                    edges: self.edges,
                })
            }
        }

        enum EdgeBuilder {
            Line {
                start: Option<Point3>,
                end: Option<Point3>,
            },
            Arc {
                center: Option<Point3>,
                radius: Option<f64>,
                start_angle: Option<f64>,
                end_angle: Option<f64>,
                is_counter_clockwise: bool,
            },
            Ellipse {
                center: Option<Point3>,
                major_axis: Option<Vector3>,
                minor_ratio: Option<f64>,
                start_angle: Option<f64>,
                end_angle: Option<f64>,
                is_counter_clockwise: bool,
            },
            Spline(SplineBuilder),
        }

        impl EdgeBuilder {
            fn new(edge_type: i32) -> Result<Self, DxfError> {
                match edge_type {
                    1 => Ok(Self::Line {
                        start: None,
                        end: None,
                    }),
                    2 => Ok(Self::Arc {
                        center: None,
                        radius: None,
                        start_angle: None,
                        end_angle: None,
                        is_counter_clockwise: true,
                    }),
                    3 => Ok(Self::Ellipse {
                        center: None,
                        major_axis: None,
                        minor_ratio: None,
                        start_angle: None,
                        end_angle: None,
                        is_counter_clockwise: true,
                    }),
                    4 => Ok(Self::Spline(SplineBuilder::default())),
                    other => Err(DxfError::unsupported(format!(
                        "HATCH 不支持的边界类型 {other}"
                    ))),
                }
            }

            fn finish(self) -> Result<HatchEdge, DxfError> {
                match self {
                    EdgeBuilder::Line { start, end } => {
                        let start =
                            start.ok_or_else(|| DxfError::invalid("HATCH 直线边缺少起点"))?;
                        let end = end.ok_or_else(|| DxfError::invalid("HATCH 直线边缺少终点"))?;
                        Ok(HatchEdge::Line { start, end })
                    }
                    EdgeBuilder::Arc {
                        center,
                        radius,
                        start_angle,
                        end_angle,
                        is_counter_clockwise,
                    } => {
                        let center =
                            center.ok_or_else(|| DxfError::invalid("HATCH 圆弧边缺少圆心"))?;
                        let radius =
                            radius.ok_or_else(|| DxfError::invalid("HATCH 圆弧边缺少半径"))?;
                        let start_angle = start_angle
                            .ok_or_else(|| DxfError::invalid("HATCH 圆弧边缺少起始角"))?;
                        let end_angle =
                            end_angle.ok_or_else(|| DxfError::invalid("HATCH 圆弧边缺少终止角"))?;
                        Ok(HatchEdge::Arc {
                            center,
                            radius,
                            start_angle: start_angle.to_radians(),
                            end_angle: end_angle.to_radians(),
                            is_counter_clockwise,
                        })
                    }
                    EdgeBuilder::Ellipse {
                        center,
                        major_axis,
                        minor_ratio,
                        start_angle,
                        end_angle,
                        is_counter_clockwise,
                    } => {
                        let center =
                            center.ok_or_else(|| DxfError::invalid("HATCH 椭圆边缺少圆心"))?;
                        let major_axis = major_axis
                            .ok_or_else(|| DxfError::invalid("HATCH 椭圆边缺少主轴向量"))?;
                        let minor_ratio =
                            minor_ratio.ok_or_else(|| DxfError::invalid("HATCH 椭圆边缺少轴比"))?;
                        let start_angle = start_angle
                            .ok_or_else(|| DxfError::invalid("HATCH 椭圆边缺少起始角"))?;
                        let end_angle =
                            end_angle.ok_or_else(|| DxfError::invalid("HATCH 椭圆边缺少终止角"))?;
                        Ok(HatchEdge::Ellipse {
                            center,
                            major_axis,
                            minor_ratio,
                            start_angle: start_angle.to_radians(),
                            end_angle: end_angle.to_radians(),
                            is_counter_clockwise,
                        })
                    }
                    EdgeBuilder::Spline(builder) => builder.finish(),
                }
            }
        }

        #[derive(Default)]
        struct SplineBuilder {
            control_points: Vec<Point3>,
            fit_points: Vec<Point3>,
            knot_values: Vec<f64>,
            weights: Vec<f64>,
            degree: Option<i32>,
            is_rational: bool,
            is_periodic: bool,
            pending_control_x: Option<f64>,
            pending_fit_x: Option<f64>,
        }

        impl SplineBuilder {
            fn push_control_x(&mut self, value: f64) -> Result<(), DxfError> {
                if self.pending_control_x.replace(value).is_some() {
                    Err(DxfError::invalid(
                        "HATCH 样条边遇到重复的控制点 X（组码 10）",
                    ))
                } else {
                    Ok(())
                }
            }

            fn push_control_y(&mut self, value: f64) -> Result<(), DxfError> {
                let x = self
                    .pending_control_x
                    .take()
                    .ok_or_else(|| DxfError::invalid("HATCH 样条边缺少控制点 X（组码 10）"))?;
                self.control_points.push(Point3::new(x, value, 0.0));
                Ok(())
            }

            fn push_fit_x(&mut self, value: f64) -> Result<(), DxfError> {
                if self.pending_fit_x.replace(value).is_some() {
                    Err(DxfError::invalid(
                        "HATCH 样条边遇到重复的拟合点 X（组码 11）",
                    ))
                } else {
                    Ok(())
                }
            }

            fn push_fit_y(&mut self, value: f64) -> Result<(), DxfError> {
                let x = self
                    .pending_fit_x
                    .take()
                    .ok_or_else(|| DxfError::invalid("HATCH 样条边缺少拟合点 X（组码 11）"))?;
                self.fit_points.push(Point3::new(x, value, 0.0));
                Ok(())
            }

            fn finish(mut self) -> Result<HatchEdge, DxfError> {
                if let Some(x) = self.pending_control_x.take() {
                    return Err(DxfError::invalid(format!(
                        "HATCH 样条边控制点 X={x} 缺少对应的 Y 坐标"
                    )));
                }
                if let Some(x) = self.pending_fit_x.take() {
                    return Err(DxfError::invalid(format!(
                        "HATCH 样条边拟合点 X={x} 缺少对应的 Y 坐标"
                    )));
                }
                Ok(HatchEdge::Spline {
                    degree: self.degree.unwrap_or(3),
                    is_rational: self.is_rational,
                    is_periodic: self.is_periodic,
                    control_points: self.control_points,
                    weights: self.weights,
                    knot_values: self.knot_values,
                    fit_points: self.fit_points,
                })
            }
        }

        fn finalize_path(
            current_path: &mut Option<PartialPath>,
            paths: &mut Vec<HatchBoundaryPath>,
            edge_builder: &mut Option<EdgeBuilder>,
        ) -> Result<(), DxfError> {
            if let Some(mut path) = current_path.take() {
                path.finalize_edge_builder(edge_builder.take())?;
                paths.push(path.finalize()?);
            }
            Ok(())
        }

        let mut layer = None;
        let mut pattern_name = "SOLID".to_string();
        let mut is_solid = false;
        let mut paths: Vec<HatchBoundaryPath> = Vec::new();
        let mut current_path: Option<PartialPath> = None;
        let mut edge_builder: Option<EdgeBuilder> = None;
        // 边界数据之后是填充样式、图案定义与种子点，其中的 10/20 等组码不再属于边界。
        let mut boundary_done = false;

        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some((0, value)) => {
                    finalize_path(&mut current_path, &mut paths, &mut edge_builder)?;
                    self.reader.put_back((0, value));
                    break;
                }
                Some(pair) => pair,
                None => return Err(DxfError::invalid("HATCH 未正确结束")),
            };

            match code {
                8 => layer = Some(value.trim().to_string()),
                2 => pattern_name = value.trim().to_string(),
                70 => {
                    let flag = parse_i16(&value, "HATCH 填充标志（组码 70）")?;
                    is_solid = flag & 1 != 0;
                }
                75 | 76 | 98 => {
                    finalize_path(&mut current_path, &mut paths, &mut edge_builder)?;
                    boundary_done = true;
                }
                _ if boundary_done => {}
                92 => {
                    finalize_path(&mut current_path, &mut paths, &mut edge_builder)?;
                    let flags = parse_i32(&value, "HATCH 环路类型（组码 92）")?;
                    current_path = Some(PartialPath::new(flags));
                }
                93 => {
                    if let Some(path) = current_path.as_mut() {
                        path.expected_vertices =
                            Some(parse_i32(&value, "HATCH 边计数（组码 93）")?.max(0) as usize);
                    }
                }
                72 => {
                    let path = current_path.as_mut().ok_or_else(|| {
                        DxfError::invalid("HATCH 在缺少环路的情况下出现了边定义（组码 72）")
                    })?;
                    if path.is_polyline() {
                        path.has_bulge =
                            parse_i32(&value, "HATCH 多段线 bulge 标记（组码 72）")? != 0;
                    } else {
                        path.finalize_edge_builder(edge_builder.take())?;
                        edge_builder = Some(EdgeBuilder::new(parse_i32(
                            &value,
                            "HATCH 边类型（组码 72）",
                        )?)?);
                    }
                }
                73 => {
                    if let Some(path) = current_path.as_mut() {
                        if path.is_polyline() {
                            path.is_closed =
                                parse_i32(&value, "HATCH 多段线闭合标记（组码 73）")? != 0;
                        } else if let Some(builder) = edge_builder.as_mut() {
                            match builder {
                                EdgeBuilder::Arc {
                                    is_counter_clockwise,
                                    ..
                                }
                                | EdgeBuilder::Ellipse {
                                    is_counter_clockwise,
                                    ..
                                } => {
                                    *is_counter_clockwise =
                                        parse_i32(&value, "HATCH 边方向标记（组码 73）")? != 0;
                                }
                                EdgeBuilder::Spline(spline) => {
                                    spline.is_rational =
                                        parse_i32(&value, "HATCH 样条有理标记（组码 73）")? != 0;
                                }
                                EdgeBuilder::Line { .. } => {}
                            }
                        }
                    }
                }
                74 => {
                    if let Some(EdgeBuilder::Spline(spline)) = edge_builder.as_mut() {
                        spline.is_periodic =
                            parse_i32(&value, "HATCH 样条周期标记（组码 74）")? != 0;
                    }
                }
                94 => {
                    if let Some(EdgeBuilder::Spline(spline)) = edge_builder.as_mut() {
                        spline.degree = Some(parse_i32(&value, "HATCH 样条阶数（组码 94）")?);
                    }
                }
                10 => {
                    let Some(path) = current_path.as_mut() else {
                        continue;
                    };
                    let x = parse_f64(&value, "HATCH 坐标 X（组码 10）")?;
                    if path.is_polyline() {
                        path.poly_vertices
                            .push(PolylineVertex::new(Point3::new(x, 0.0, 0.0)));
                    } else if let Some(builder) = edge_builder.as_mut() {
                        match builder {
                            EdgeBuilder::Line { start, .. } => {
                                start.get_or_insert(Point3::ORIGIN).0.x = x;
                            }
                            EdgeBuilder::Arc { center, .. } | EdgeBuilder::Ellipse { center, .. } => {
                                center.get_or_insert(Point3::ORIGIN).0.x = x;
                            }
                            EdgeBuilder::Spline(spline) => spline.push_control_x(x)?,
                        }
                    }
                }
                20 => {
                    let Some(path) = current_path.as_mut() else {
                        continue;
                    };
                    let y = parse_f64(&value, "HATCH 坐标 Y（组码 20）")?;
                    if path.is_polyline() {
                        let vertex = path.poly_vertices.last_mut().ok_or_else(|| {
                            DxfError::invalid("HATCH 顶点 Y 前未读取到对应的 X 值（组码 20）")
                        })?;
                        vertex.position.0.y = y;
                    } else if let Some(builder) = edge_builder.as_mut() {
                        match builder {
                            EdgeBuilder::Line { start, .. } => {
                                start.get_or_insert(Point3::ORIGIN).0.y = y;
                            }
                            EdgeBuilder::Arc { center, .. } | EdgeBuilder::Ellipse { center, .. } => {
                                center.get_or_insert(Point3::ORIGIN).0.y = y;
                            }
                            EdgeBuilder::Spline(spline) => spline.push_control_y(y)?,
                        }
                    }
                }
                11 | 21 => {
                    let Some(builder) = edge_builder.as_mut() else {
                        continue;
                    };
                    let raw = parse_f64(&value, "HATCH 坐标（组码 11/21）")?;
                    match builder {
                        EdgeBuilder::Line { end, .. } => {
                            let end = end.get_or_insert(Point3::ORIGIN);
                            if code == 11 {
                                end.0.x = raw;
                            } else {
                                end.0.y = raw;
                            }
                        }
                        EdgeBuilder::Ellipse { major_axis, .. } => {
                            let axis = major_axis.get_or_insert(Vector3::new(0.0, 0.0, 0.0));
                            if code == 11 {
                                axis.0.x = raw;
                            } else {
                                axis.0.y = raw;
                            }
                        }
                        EdgeBuilder::Spline(spline) => {
                            if code == 11 {
                                spline.push_fit_x(raw)?;
                            } else {
                                spline.push_fit_y(raw)?;
                            }
                        }
                        EdgeBuilder::Arc { .. } => {}
                    }
                }
                40 => {
                    if let Some(builder) = edge_builder.as_mut() {
                        let raw = parse_f64(&value, "HATCH 边数据（组码 40）")?;
                        match builder {
                            EdgeBuilder::Arc { radius, .. } => *radius = Some(raw),
                            EdgeBuilder::Ellipse { minor_ratio, .. } => *minor_ratio = Some(raw),
                            EdgeBuilder::Spline(spline) => spline.knot_values.push(raw),
                            EdgeBuilder::Line { .. } => {}
                        }
                    }
                }
                42 => {
                    let raw = parse_f64(&value, "HATCH bulge/权重（组码 42）")?;
                    if let Some(EdgeBuilder::Spline(spline)) = edge_builder.as_mut() {
                        spline.weights.push(raw);
                    } else if let Some(path) = current_path.as_mut() {
                        if let Some(vertex) = path.poly_vertices.last_mut() {
                            vertex.bulge = raw;
                        }
                    }
                }
                50 | 51 => {
                    if let Some(builder) = edge_builder.as_mut() {
                        let raw = parse_f64(&value, "HATCH 边角度（组码 50/51）")?;
                        match builder {
                            EdgeBuilder::Arc {
                                start_angle,
                                end_angle,
                                ..
                            }
                            | EdgeBuilder::Ellipse {
                                start_angle,
                                end_angle,
                                ..
                            } => {
                                if code == 50 {
                                    *start_angle = Some(raw);
                                } else {
                                    *end_angle = Some(raw);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {
                    // 其它字段（关联对象句柄、计数等）直接忽略
                }
            }
        }

        if paths.is_empty() {
            return Err(DxfError::invalid("HATCH 缺少边界定义"));
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        Ok(Entity::Hatch(Hatch {
            pattern_name,
            is_solid,
            paths,
            layer,
        }))
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        // 跳过文件末尾的空行
        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只能回退一次");
        self.buffer = Some(pair);
    }
}

fn build_polyface_face(
    coordinate_count: usize,
    indices: [i32; 4],
) -> Result<Option<Vec<usize>>, DxfError> {
    let mut face = Vec::with_capacity(4);
    for index in indices {
        // 0 表示未使用的槽位，负值只标记隐藏边。
        if index == 0 {
            continue;
        }
        let idx = index.unsigned_abs() as usize;
        if idx > coordinate_count {
            return Err(DxfError::invalid(format!(
                "POLYFACE 面引用了不存在的顶点索引 {index}"
            )));
        }
        face.push(idx - 1);
    }
    if face.len() < 3 {
        return Ok(None);
    }
    Ok(Some(face))
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn build_face_vertex(
    index: usize,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
) -> Result<Option<Point3>, DxfError> {
    match (x, y, z) {
        (None, None, None) => Ok(None),
        (Some(x), Some(y), z) => Ok(Some(Point3::new(x, y, z.unwrap_or(0.0)))),
        _ => Err(DxfError::invalid(format!(
            "3DFACE 顶点 {index} 缺少完整的 XY 坐标"
        ))),
    }
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Document {
        DxfFacade::new()
            .load_from_str(source)
            .expect("解析内联 DXF 失败")
    }

    #[test]
    fn header_units_and_block_record_units_are_applied() {
        let source = "0\nSECTION\n2\nHEADER\n9\n$ACADVER\n1\nAC1027\n9\n$INSUNITS\n70\n6\n0\nENDSEC\n\
0\nSECTION\n2\nTABLES\n0\nTABLE\n2\nBLOCK_RECORD\n70\n1\n0\nBLOCK_RECORD\n2\nPART\n70\n4\n0\nENDTAB\n0\nENDSEC\n\
0\nSECTION\n2\nBLOCKS\n0\nBLOCK\n2\nPART\n10\n1.0\n20\n2.0\n30\n0.0\n0\nLINE\n8\n0\n10\n0\n20\n0\n11\n1\n21\n0\n0\nENDBLK\n0\nENDSEC\n\
0\nEOF\n";
        let doc = parse(source);
        assert_eq!(doc.units(), DrawingUnits::Meters);
        let block = doc.block("PART").expect("缺少块 PART");
        assert_eq!(block.units, DrawingUnits::Millimeters);
        assert_eq!(block.entities.len(), 1);
        assert!((block.base_point.x() - 1.0).abs() < 1e-12);
        assert!((block.base_point.y() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_entity_becomes_unsupported_placeholder() {
        let source = "0\nSECTION\n2\nENTITIES\n0\nTEXT\n8\nNOTES\n10\n0\n20\n0\n1\nhello\n0\nLINE\n10\n0\n20\n0\n11\n5\n21\n5\n0\nENDSEC\n0\nEOF\n";
        let doc = parse(source);
        let entities: Vec<&Entity> = doc.entities().map(|(_, entity)| entity).collect();
        assert_eq!(entities.len(), 2);
        match entities[0] {
            Entity::Unsupported(other) => {
                assert_eq!(other.kind, "TEXT");
                assert_eq!(other.layer, "NOTES");
            }
            other => panic!("unexpected entity: {other:?}"),
        }
        assert!(matches!(entities[1], Entity::Line(_)));
    }

    #[test]
    fn polyface_faces_resolve_one_based_indices() {
        assert_eq!(
            build_polyface_face(4, [1, -2, 3, 0]).expect("索引有效"),
            Some(vec![0, 1, 2])
        );
        assert!(build_polyface_face(2, [1, 2, 0, 0]).expect("索引有效").is_none());
        assert!(build_polyface_face(2, [1, 2, 5, 0]).is_err());
    }

    #[test]
    fn malformed_number_is_reported_as_invalid_document() {
        let source = "0\nSECTION\n2\nENTITIES\n0\nCIRCLE\n10\nabc\n20\n0\n40\n1\n0\nENDSEC\n0\nEOF\n";
        match DxfFacade::new().load_from_str(source) {
            Err(IoError::InvalidDocument(message)) => assert!(message.contains("CIRCLE")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
