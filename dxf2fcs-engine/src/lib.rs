pub mod convert;
pub mod emitter;
pub mod format;
pub mod ids;
pub mod sampler;
pub mod stitcher;
pub mod transform;

pub use convert::{ConversionStats, ConvertedScript, Converter};
pub use format::{LinearUnit, VertexStyle};

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("coordinate is not finite: {0}")]
        NonFiniteCoordinate(f64),
        #[error("transform stack underflow: the identity frame cannot be popped")]
        TransformUnderflow,
    }
}

pub mod options {
    use crate::format::{LinearUnit, VertexStyle};

    pub const DEFAULT_PRECISION: usize = 5;
    pub const DEFAULT_SPLINE_SAMPLES_PER_CONTROL_POINT: usize = 8;
    pub const DEFAULT_ELLIPSE_SEGMENTS_PER_QUADRANT: usize = 12;
    pub const MAX_SPLINE_SAMPLES_PER_CONTROL_POINT: usize = 256;
    pub const MAX_ELLIPSE_SEGMENTS_PER_QUADRANT: usize = 1024;

    /// 单次转换的参数。
    #[derive(Debug, Clone, PartialEq)]
    pub struct ConvertOptions {
        /// 小数位数。
        pub precision: usize,
        pub unit: LinearUnit,
        pub vertex_style: VertexStyle,
        /// 直线段内部拐角写出的圆角半径（输出单位）；0 表示不写半径列。
        pub corner_radius: f64,
        pub spline_samples_per_control_point: usize,
        pub ellipse_segments_per_quadrant: usize,
    }

    impl Default for ConvertOptions {
        fn default() -> Self {
            Self {
                precision: DEFAULT_PRECISION,
                unit: LinearUnit::Millimeters,
                vertex_style: VertexStyle::Compact,
                corner_radius: 0.0,
                spline_samples_per_control_point: DEFAULT_SPLINE_SAMPLES_PER_CONTROL_POINT,
                ellipse_segments_per_quadrant: DEFAULT_ELLIPSE_SEGMENTS_PER_QUADRANT,
            }
        }
    }

    impl ConvertOptions {
        /// 把采样密度限制在 `1..=MAX_*` 之内。
        pub fn clamped(mut self) -> Self {
            self.spline_samples_per_control_point = self
                .spline_samples_per_control_point
                .clamp(1, MAX_SPLINE_SAMPLES_PER_CONTROL_POINT);
            self.ellipse_segments_per_quadrant = self
                .ellipse_segments_per_quadrant
                .clamp(1, MAX_ELLIPSE_SEGMENTS_PER_QUADRANT);
            self
        }
    }

}

pub use options::ConvertOptions;

use dxf2fcs_core::document::Document;

use crate::errors::EngineError;

/// 以给定参数把整份文档转换为脚本文本。
pub fn convert(
    document: &Document,
    options: &ConvertOptions,
) -> Result<ConvertedScript, EngineError> {
    Converter::new(options.clone()).convert(document)
}
