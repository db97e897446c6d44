use std::fmt;

use crate::errors::EngineError;

/// 输出脚本使用的长度单位；坐标在写出前乘以 [`LinearUnit::scale`]。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinearUnit {
    Millimeters,
    Meters,
    /// 无法识别的单位代码，比例退回 1.0。
    Unrecognized(String),
}

impl LinearUnit {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" => Self::Millimeters,
            "m" | "meter" | "meters" => Self::Meters,
            _ => Self::Unrecognized(raw.trim().to_string()),
        }
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        match self {
            Self::Millimeters => 0.001,
            Self::Meters | Self::Unrecognized(_) => 1.0,
        }
    }
}

impl fmt::Display for LinearUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millimeters => f.write_str("mm"),
            Self::Meters => f.write_str("m"),
            Self::Unrecognized(code) => write!(f, "{code}"),
        }
    }
}

/// 顶点声明的两种写法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VertexStyle {
    /// `v1a = v(x,y,z)`，需要 `v` 辅助函数。
    #[default]
    Compact,
    /// `vertex {v1a} xyz x y z`
    Verbose,
}

impl VertexStyle {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "verbose" => Some(Self::Verbose),
            _ => None,
        }
    }
}

/// 固定小数位四舍五入，去掉末尾的 0 与小数点。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    precision: usize,
}

impl NumberFormat {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }

    pub fn format(&self, value: f64) -> Result<String, EngineError> {
        if !value.is_finite() {
            return Err(EngineError::NonFiniteCoordinate(value));
        }
        let mut text = format!("{:.*}", self.precision, value);
        if text.contains('.') {
            let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
            text.truncate(trimmed);
        }
        if text == "-0" {
            text = "0".to_string();
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_trimmed_fraction() {
        let format = NumberFormat::new(5);
        assert_eq!(format.format(1.0).unwrap(), "1");
        assert_eq!(format.format(0.5).unwrap(), "0.5");
        assert_eq!(format.format(0.123456).unwrap(), "0.12346");
        assert_eq!(format.format(-0.000001).unwrap(), "0");
        assert_eq!(format.format(1500.0).unwrap(), "1500");
        assert_eq!(NumberFormat::new(0).format(2.6).unwrap(), "3");
    }

    #[test]
    fn rounded_values_reparse_within_precision() {
        for precision in 0..7 {
            let format = NumberFormat::new(precision);
            for value in [0.1, -3.14159265, 12345.678901, 1e-4, 987.0005] {
                let text = format.format(value).unwrap();
                let parsed: f64 = text.parse().unwrap();
                let tolerance = 10f64.powi(-(precision as i32));
                assert!(
                    (parsed - value).abs() <= tolerance,
                    "{value} @ {precision} -> {text}"
                );
            }
        }
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let format = NumberFormat::new(3);
        assert!(matches!(
            format.format(f64::NAN),
            Err(EngineError::NonFiniteCoordinate(_))
        ));
        assert!(format.format(f64::INFINITY).is_err());
    }

    #[test]
    fn unit_codes_map_to_scale_factors() {
        assert_eq!(LinearUnit::parse("mm"), LinearUnit::Millimeters);
        assert_eq!(LinearUnit::parse("Meters"), LinearUnit::Meters);
        assert!((LinearUnit::parse("mm").scale() - 0.001).abs() < 1e-15);
        let unknown = LinearUnit::parse("ft");
        assert_eq!(unknown, LinearUnit::Unrecognized("ft".to_string()));
        assert!((unknown.scale() - 1.0).abs() < f64::EPSILON);
        assert_eq!(VertexStyle::parse("VERBOSE"), Some(VertexStyle::Verbose));
        assert_eq!(VertexStyle::parse("fancy"), None);
    }
}
