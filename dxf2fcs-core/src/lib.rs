pub mod geometry {
    use glam::DVec3;

    /// 三维点，内部以 `glam::DVec3` 表示。二维实体的 Z 取标高（默认 0）。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        pub const ORIGIN: Point3 = Point3(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn from_vec(vec: DVec3) -> Self {
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
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn translate(self, offset: Vector3) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self::from_vec(value)
        }
    }

    /// 三维向量，用于椭圆主轴、块参照缩放等。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Vector3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }
}

pub mod units {

    const METERS_PER_MILLIMETER: f64 = 0.001;

    /// DXF 图形单位（`$INSUNITS` 与 BLOCK_RECORD 组码 70 共用同一套编码）。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum DrawingUnits {
        #[default]
        Unitless,
        Inches,
        Feet,
        Miles,
        Millimeters,
        Centimeters,
        Meters,
        Kilometers,
        Microinches,
        Mils,
        Yards,
        Angstroms,
        Nanometers,
        Microns,
        Decimeters,
        Decameters,
        Hectometers,
        Gigameters,
        AstronomicalUnits,
        LightYears,
        Parsecs,
        Unknown(i16),
    }

    impl DrawingUnits {
        pub fn from_code(code: i16) -> Self {
            match code {
                0 => Self::Unitless,
                1 => Self::Inches,
                2 => Self::Feet,
                3 => Self::Miles,
                4 => Self::Millimeters,
                5 => Self::Centimeters,
                6 => Self::Meters,
                7 => Self::Kilometers,
                8 => Self::Microinches,
                9 => Self::Mils,
                10 => Self::Yards,
                11 => Self::Angstroms,
                12 => Self::Nanometers,
                13 => Self::Microns,
                14 => Self::Decimeters,
                15 => Self::Decameters,
                16 => Self::Hectometers,
                17 => Self::Gigameters,
                18 => Self::AstronomicalUnits,
                19 => Self::LightYears,
                20 => Self::Parsecs,
                other => Self::Unknown(other),
            }
        }

        /// 每单位对应的米数；无单位或未知编码返回 `None`。
        pub fn meters_per_unit(self) -> Option<f64> {
            let factor = match self {
                Self::Unitless | Self::Unknown(_) => return None,
                Self::Inches => 0.0254,
                Self::Feet => 0.3048,
                Self::Miles => 1_609.344,
                Self::Millimeters => METERS_PER_MILLIMETER,
                Self::Centimeters => 0.01,
                Self::Meters => 1.0,
                Self::Kilometers => 1_000.0,
                Self::Microinches => 0.0254e-6,
                Self::Mils => 0.0254e-3,
                Self::Yards => 0.9144,
                Self::Angstroms => 1.0e-10,
                Self::Nanometers => 1.0e-9,
                Self::Microns => 1.0e-6,
                Self::Decimeters => 0.1,
                Self::Decameters => 10.0,
                Self::Hectometers => 100.0,
                Self::Gigameters => 1.0e9,
                Self::AstronomicalUnits => 1.495_978_707e11,
                Self::LightYears => 9.460_730_472_580_8e15,
                Self::Parsecs => 3.085_677_581_49e16,
            };
            Some(factor)
        }

        /// 块单位到图形单位的换算系数，未定义的一侧按毫米处理。
        pub fn conversion_factor(from: DrawingUnits, to: DrawingUnits) -> f64 {
            let from = from.meters_per_unit().unwrap_or(METERS_PER_MILLIMETER);
            let to = to.meters_per_unit().unwrap_or(METERS_PER_MILLIMETER);
            from / to
        }
    }
}

pub mod document {
    use std::collections::HashMap;

    use glam::{DMat3, DVec3};

    use crate::geometry::{Point3, Vector3};
    use crate::units::DrawingUnits;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 转换器能识别的实体集合。新增类型时同时扩展此枚举与引擎中的分派 `match`。
    #[derive(Debug, Clone)]
    pub enum Entity {
        Line(Line),
        Arc(Arc),
        Circle(Circle),
        Ellipse(Ellipse),
        Spline(Spline),
        Polyline(Polyline),
        LwPolyline(LwPolyline),
        Mesh(Mesh),
        Insert(Insert),
        Hatch(Hatch),
        Unsupported(UnsupportedEntity),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Ellipse(ellipse) => &ellipse.layer,
                Entity::Spline(spline) => &spline.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::LwPolyline(polyline) => &polyline.layer,
                Entity::Mesh(mesh) => &mesh.layer,
                Entity::Insert(insert) => &insert.layer,
                Entity::Hatch(hatch) => &hatch.layer,
                Entity::Unsupported(other) => &other.layer,
            }
        }

        /// DXF 中的实体类型名，用于日志。
        pub fn kind_name(&self) -> &str {
            match self {
                Entity::Line(_) => "LINE",
                Entity::Arc(_) => "ARC",
                Entity::Circle(_) => "CIRCLE",
                Entity::Ellipse(_) => "ELLIPSE",
                Entity::Spline(_) => "SPLINE",
                Entity::Polyline(_) => "POLYLINE",
                Entity::LwPolyline(_) => "LWPOLYLINE",
                Entity::Mesh(_) => "MESH",
                Entity::Insert(_) => "INSERT",
                Entity::Hatch(_) => "HATCH",
                Entity::Unsupported(other) => &other.kind,
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Line {
        pub start: Point3,
        pub end: Point3,
        pub layer: String,
    }

    /// 圆弧实体，角度以弧度储存，绕 +Z 逆时针。
    #[derive(Debug, Clone)]
    pub struct Arc {
        pub center: Point3,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    impl Arc {
        #[inline]
        pub fn point_at(&self, angle: f64) -> Point3 {
            let offset = Vector3::new(self.radius * angle.cos(), self.radius * angle.sin(), 0.0);
            self.center.translate(offset)
        }
    }

    #[derive(Debug, Clone)]
    pub struct Circle {
        pub center: Point3,
        pub radius: f64,
        pub layer: String,
    }

    /// 椭圆实体，记录主轴向量与参数范围（弧度）。
    #[derive(Debug, Clone)]
    pub struct Ellipse {
        pub center: Point3,
        pub major_axis: Vector3,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
        pub layer: String,
    }

    impl Ellipse {
        /// 次轴向量：主轴绕 +Z 旋转 90° 后乘以轴比。
        pub fn minor_axis(&self) -> Vector3 {
            let major = self.major_axis.as_vec3();
            Vector3(DVec3::Z.cross(major) * self.ratio)
        }

        pub fn point_at(&self, parameter: f64) -> Point3 {
            let major = self.major_axis.as_vec3();
            let minor = self.minor_axis().as_vec3();
            Point3(self.center.as_vec3() + major * parameter.cos() + minor * parameter.sin())
        }
    }

    #[derive(Debug, Clone)]
    pub struct Spline {
        pub degree: i32,
        pub is_closed: bool,
        pub is_periodic: bool,
        pub is_rational: bool,
        pub control_points: Vec<Point3>,
        pub weights: Vec<f64>,
        pub knot_values: Vec<f64>,
        pub fit_points: Vec<Point3>,
        pub layer: String,
    }

    /// 重型多段线（POLYLINE 2D/3D），顶点直接使用，不含 bulge。
    #[derive(Debug, Clone)]
    pub struct Polyline {
        pub vertices: Vec<Point3>,
        pub is_closed: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct PolylineVertex {
        pub position: Point3,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point3) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point3, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// 轻量多段线（LWPOLYLINE），每个顶点的 bulge 描述到下一顶点的圆弧段。
    #[derive(Debug, Clone)]
    pub struct LwPolyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
    }

    /// 网格：共享顶点数组，面以顶点索引列表表示（3 或 4 个顶点）。
    #[derive(Debug, Clone)]
    pub struct Mesh {
        pub vertices: Vec<Point3>,
        pub faces: Vec<Vec<usize>>,
        pub layer: String,
    }

    impl Mesh {
        /// 按索引解析面的顶点，越界索引被忽略。
        pub fn face_points(&self, face: &[usize]) -> Vec<Point3> {
            face.iter()
                .filter_map(|&index| self.vertices.get(index).copied())
                .collect()
        }
    }

    #[derive(Debug, Clone)]
    pub struct Insert {
        pub block_name: String,
        pub insert: Point3,
        pub scale: Vector3,
        pub rotation: f64,
        pub layer: String,
    }

    impl Insert {
        /// 旋转与缩放部分，`unit_factor` 为块单位到图形单位的换算。
        pub fn transformation(&self, unit_factor: f64) -> DMat3 {
            DMat3::from_rotation_z(self.rotation)
                * DMat3::from_diagonal(self.scale.as_vec3() * unit_factor)
        }

        /// 块局部坐标到父坐标的映射：`p ↦ M·p + t`，块基点落在插入点上。
        pub fn placement(&self, base_point: Point3, unit_factor: f64) -> (DMat3, DVec3) {
            let linear = self.transformation(unit_factor);
            let translation = self.insert.as_vec3() - linear * base_point.as_vec3();
            (linear, translation)
        }
    }

    #[derive(Debug, Clone)]
    pub enum HatchEdge {
        Line {
            start: Point3,
            end: Point3,
        },
        Arc {
            center: Point3,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            is_counter_clockwise: bool,
        },
        Ellipse {
            center: Point3,
            major_axis: Vector3,
            minor_ratio: f64,
            start_angle: f64,
            end_angle: f64,
            is_counter_clockwise: bool,
        },
        Spline {
            degree: i32,
            is_rational: bool,
            is_periodic: bool,
            control_points: Vec<Point3>,
            weights: Vec<f64>,
            knot_values: Vec<f64>,
            fit_points: Vec<Point3>,
        },
        Polyline {
            vertices: Vec<PolylineVertex>,
            is_closed: bool,
        },
    }

    impl HatchEdge {
        /// 把边界边还原为普通实体，顺时针的弧/椭圆弧翻转为等价的逆时针形式。
        pub fn to_entity(&self, layer: &str) -> Entity {
            let layer = layer.to_string();
            match self {
                HatchEdge::Line { start, end } => Entity::Line(Line {
                    start: *start,
                    end: *end,
                    layer,
                }),
                HatchEdge::Arc {
                    center,
                    radius,
                    start_angle,
                    end_angle,
                    is_counter_clockwise,
                } => {
                    let (start_angle, end_angle) = if *is_counter_clockwise {
                        (*start_angle, *end_angle)
                    } else {
                        (-*end_angle, -*start_angle)
                    };
                    Entity::Arc(Arc {
                        center: *center,
                        radius: *radius,
                        start_angle,
                        end_angle,
                        layer,
                    })
                }
                HatchEdge::Ellipse {
                    center,
                    major_axis,
                    minor_ratio,
                    start_angle,
                    end_angle,
                    is_counter_clockwise,
                } => {
                    let (start_parameter, end_parameter) = if *is_counter_clockwise {
                        (*start_angle, *end_angle)
                    } else {
                        (-*end_angle, -*start_angle)
                    };
                    Entity::Ellipse(Ellipse {
                        center: *center,
                        major_axis: *major_axis,
                        ratio: *minor_ratio,
                        start_parameter,
                        end_parameter,
                        layer,
                    })
                }
                HatchEdge::Spline {
                    degree,
                    is_rational,
                    is_periodic,
                    control_points,
                    weights,
                    knot_values,
                    fit_points,
                } => Entity::Spline(Spline {
                    degree: *degree,
                    is_closed: false,
                    is_periodic: *is_periodic,
                    is_rational: *is_rational,
                    control_points: control_points.clone(),
                    weights: weights.clone(),
                    knot_values: knot_values.clone(),
                    fit_points: fit_points.clone(),
                    layer,
                }),
                HatchEdge::Polyline {
                    vertices,
                    is_closed,
                } => Entity::LwPolyline(LwPolyline {
                    vertices: vertices.clone(),
                    is_closed: *is_closed,
                    layer,
                }),
            }
        }
    }

    /// HATCH 边界环路类型（组码 92）中的位标志。
    pub mod path_flags {
        pub const EXTERNAL: i32 = 0x01;
        pub const POLYLINE: i32 = 0x02;
        pub const DERIVED: i32 = 0x04;
        pub const TEXTBOX: i32 = 0x08;
        pub const OUTERMOST: i32 = 0x10;
    }

    #[derive(Debug, Clone)]
    pub struct HatchBoundaryPath {
        pub flags: i32,
        pub edges: Vec<HatchEdge>,
    }

    impl HatchBoundaryPath {
        #[inline]
        pub fn is_polyline(&self) -> bool {
            self.flags & path_flags::POLYLINE != 0
        }

        /// 标记为 outermost 的环路在转换时作为孔洞（opening）处理。
        #[inline]
        pub fn is_outermost(&self) -> bool {
            self.flags & path_flags::OUTERMOST != 0
        }
    }

    #[derive(Debug, Clone)]
    pub struct Hatch {
        pub pattern_name: String,
        pub is_solid: bool,
        pub paths: Vec<HatchBoundaryPath>,
        pub layer: String,
    }

    /// 读取器无法转换的实体，保留类型名以便转换时报告。
    #[derive(Debug, Clone)]
    pub struct UnsupportedEntity {
        pub kind: String,
        pub layer: String,
    }

    #[derive(Debug, Clone)]
    pub struct BlockDefinition {
        pub name: String,
        pub base_point: Point3,
        pub units: DrawingUnits,
        pub entities: Vec<Entity>,
    }

    impl BlockDefinition {
        pub fn new(name: impl Into<String>, base_point: Point3) -> Self {
            Self {
                name: name.into(),
                base_point,
                units: DrawingUnits::Unitless,
                entities: Vec::new(),
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    pub struct Document {
        units: DrawingUnits,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        blocks: HashMap<String, BlockDefinition>,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        #[inline]
        pub fn units(&self) -> DrawingUnits {
            self.units
        }

        #[inline]
        pub fn set_units(&mut self, units: DrawingUnits) {
            self.units = units;
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn add_line(&mut self, start: Point3, end: Point3, layer: impl Into<String>) -> EntityId {
            self.add_entity(Entity::Line(Line {
                start,
                end,
                layer: layer.into(),
            }))
        }

        pub fn add_circle(
            &mut self,
            center: Point3,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Circle(Circle {
                center,
                radius,
                layer: layer.into(),
            }))
        }

        pub fn add_arc(
            &mut self,
            center: Point3,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
                layer: layer.into(),
            }))
        }

        pub fn add_lwpolyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            self.add_entity(Entity::LwPolyline(LwPolyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
                layer: layer.into(),
            }))
        }

        pub fn add_insert(
            &mut self,
            block_name: impl Into<String>,
            insert: Point3,
            scale: Vector3,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Insert(Insert {
                block_name: block_name.into(),
                insert,
                scale,
                rotation,
                layer: layer.into(),
            }))
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        /// 块名不区分大小写，同名（忽略大小写）的后一个定义覆盖前一个。
        pub fn add_block_definition(&mut self, definition: BlockDefinition) {
            self.blocks.insert(block_key(&definition.name), definition);
        }

        #[inline]
        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(&block_key(name))
        }

        #[inline]
        pub fn block_mut(&mut self, name: &str) -> Option<&mut BlockDefinition> {
            self.blocks.get_mut(&block_key(name))
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    #[inline]
    fn block_key(name: &str) -> String {
        name.to_ascii_uppercase()
    }

}
