use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurveId(u64);

impl CurveId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// 顶点名由曲线编号加单字母后缀组成，例如 `v3a`。
    pub fn vertex_name(self, suffix: char) -> String {
        format!("v{}{suffix}", self.0)
    }

    /// 点数组变量名，例如 `vs3`。
    pub fn points_name(self) -> String {
        format!("vs{}", self.0)
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AreaId(u64);

impl AreaId {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// 曲线与面域各自独立递增的编号，先加一再返回，首个编号为 1。
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    next_curve_id: u64,
    next_area_id: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_curve(&mut self) -> CurveId {
        self.next_curve_id += 1;
        CurveId(self.next_curve_id)
    }

    pub fn next_area(&mut self) -> AreaId {
        self.next_area_id += 1;
        AreaId(self.next_area_id)
    }

    #[inline]
    pub fn curves_allocated(&self) -> u64 {
        self.next_curve_id
    }

    #[inline]
    pub fn areas_allocated(&self) -> u64 {
        self.next_area_id
    }
}
