use std::collections::BTreeSet;

/// 脚本中可选的辅助函数。枚举顺序即前导定义的输出顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Helper {
    /// `v(x,y,z)` 顶点构造。
    Vertex,
    /// `[x,y]` 数组，z 固定为 0。
    PointsXy,
    /// `[x,y,z]` 数组。
    PointsXyz,
    /// `[x,y,z,r]` 数组，带圆角半径列。
    PointsXyzRadius,
}

impl Helper {
    pub fn name(self) -> &'static str {
        match self {
            Helper::Vertex => "v",
            Helper::PointsXy => "vxy",
            Helper::PointsXyz => "vxyz",
            Helper::PointsXyzRadius => "vxyzr",
        }
    }

    pub fn definition(self) -> &'static str {
        match self {
            Helper::Vertex => "v = (x,y,z) => Fcs.Geometry.Vertex3D(x,y,z)",
            Helper::PointsXy => {
                "vxy = ps => ps.Select(p => { Vertex = Fcs.Geometry.Vertex3D(p[0], p[1], 0), Radius = 0 })"
            }
            Helper::PointsXyz => {
                "vxyz = ps => ps.Select(p => { Vertex = Fcs.Geometry.Vertex3D(p[0], p[1], p[2]), Radius = 0 })"
            }
            Helper::PointsXyzRadius => {
                "vxyzr = ps => ps.Select(p => { Vertex = Fcs.Geometry.Vertex3D(p[0], p[1], p[2]), Radius = p[3] })"
            }
        }
    }
}

/// 输出缓冲：正文按写入顺序累积，辅助函数在首次使用时登记，
/// 结束时只为登记过的辅助函数生成前导定义。
#[derive(Debug, Default, Clone)]
pub struct ScriptBuffer {
    body: String,
    helpers: BTreeSet<Helper>,
}

impl ScriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: impl AsRef<str>) {
        self.body.push_str(line.as_ref());
        self.body.push('\n');
    }

    #[inline]
    pub fn use_helper(&mut self, helper: Helper) {
        self.helpers.insert(helper);
    }

    pub fn finish(self) -> String {
        let mut script = String::with_capacity(self.body.len() + 128 * self.helpers.len());
        for helper in &self.helpers {
            script.push_str(helper.definition());
            script.push('\n');
        }
        script.push_str(&self.body);
        script
    }
}
