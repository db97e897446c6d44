use std::path::{Path, PathBuf};

use dxf2fcs_config::{AppConfig, VertexStyle as ConfiguredVertexStyle};
use dxf2fcs_engine::{ConvertOptions, LinearUnit, VertexStyle};

use crate::errors::FrontendError;

/// 一次文件转换的完整输入：路径、转换参数与默认输出扩展名。
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub options: ConvertOptions,
    pub output_extension: String,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            options: ConvertOptions::default(),
            output_extension: "fcs".to_string(),
        }
    }

    /// 以配置文件中的转换参数为基础构建请求，采样密度按上限截断。
    pub fn from_config(input: impl Into<PathBuf>, config: &AppConfig) -> Self {
        let conversion = &config.conversion;
        let vertex_style = match conversion.vertex_style {
            ConfiguredVertexStyle::Compact => VertexStyle::Compact,
            ConfiguredVertexStyle::Verbose => VertexStyle::Verbose,
        };
        let options = ConvertOptions {
            precision: conversion.precision,
            unit: LinearUnit::parse(&conversion.unit),
            vertex_style,
            corner_radius: conversion.corner_radius,
            spline_samples_per_control_point: conversion.spline_samples_per_control_point,
            ellipse_segments_per_quadrant: conversion.ellipse_segments_per_quadrant,
        }
        .clamped();
        Self {
            input: input.into(),
            output: None,
            options,
            output_extension: config.output.extension.clone(),
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.options.precision = precision;
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.options.unit = LinearUnit::parse(unit);
        self
    }

    pub fn with_vertex_style(mut self, style: &str) -> Result<Self, FrontendError> {
        self.options.vertex_style = VertexStyle::parse(style)
            .ok_or_else(|| FrontendError::InvalidVertexStyle(style.to_string()))?;
        Ok(self)
    }

    /// 显式输出路径，或把输入文件扩展名替换为配置的扩展名。
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input, &self.output_extension))
    }
}

pub fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    input.with_extension(extension.trim_start_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxf2fcs_engine::options::MAX_SPLINE_SAMPLES_PER_CONTROL_POINT;

    #[test]
    fn output_replaces_input_extension() {
        let request = ConversionRequest::new("drawings/plan.dxf");
        assert_eq!(request.output_path(), PathBuf::from("drawings/plan.fcs"));

        let explicit = request.with_output("out/result.txt");
        assert_eq!(explicit.output_path(), PathBuf::from("out/result.txt"));

        assert_eq!(
            default_output_path(Path::new("plan.DXF"), ".script"),
            PathBuf::from("plan.script")
        );
    }

    #[test]
    fn config_values_become_options() {
        let config = AppConfig::from_toml_str(
            r#"
            [conversion]
            precision = 2
            unit = "m"
            vertex_style = "verbose"

            [output]
            extension = "txt"
            "#,
        )
        .expect("parse config");

        let request = ConversionRequest::from_config("a.dxf", &config).with_precision(4);
        assert_eq!(request.options.precision, 4);
        assert_eq!(request.options.unit, LinearUnit::Meters);
        assert_eq!(request.options.vertex_style, VertexStyle::Verbose);
        assert_eq!(request.output_path(), PathBuf::from("a.txt"));
    }

    #[test]
    fn configured_sampling_density_is_capped() {
        let config = AppConfig::from_toml_str(
            r#"
            [conversion]
            spline_samples_per_control_point = 1000000
            ellipse_segments_per_quadrant = 0
            "#,
        )
        .expect("parse config");

        let request = ConversionRequest::from_config("a.dxf", &config);
        assert_eq!(
            request.options.spline_samples_per_control_point,
            MAX_SPLINE_SAMPLES_PER_CONTROL_POINT
        );
        assert_eq!(request.options.ellipse_segments_per_quadrant, 1);
    }

    #[test]
    fn unknown_vertex_style_is_rejected() {
        let err = ConversionRequest::new("a.dxf")
            .with_vertex_style("fancy")
            .expect_err("should reject");
        assert!(matches!(err, FrontendError::InvalidVertexStyle(_)));
    }
}
