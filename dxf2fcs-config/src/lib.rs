use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV_VAR: &str = "DXF2FCS_CONFIG";

/// 应用配置的根结构，各节均可省略。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件：优先读取环境变量 `DXF2FCS_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 顶点声明写法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexStyle {
    #[default]
    Compact,
    Verbose,
}

/// 转换参数。单位保留原始字符串，无法识别的单位由前端按比例 1.0 处理。
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    #[serde(default = "ConversionConfig::default_precision")]
    pub precision: usize,
    #[serde(default = "ConversionConfig::default_unit")]
    pub unit: String,
    #[serde(default)]
    pub vertex_style: VertexStyle,
    #[serde(default)]
    pub corner_radius: f64,
    #[serde(default = "ConversionConfig::default_spline_samples")]
    pub spline_samples_per_control_point: usize,
    #[serde(default = "ConversionConfig::default_ellipse_segments")]
    pub ellipse_segments_per_quadrant: usize,
}

impl ConversionConfig {
    fn default_precision() -> usize {
        5
    }

    fn default_unit() -> String {
        "mm".to_string()
    }

    fn default_spline_samples() -> usize {
        8
    }

    fn default_ellipse_segments() -> usize {
        12
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            precision: Self::default_precision(),
            unit: Self::default_unit(),
            vertex_style: VertexStyle::default(),
            corner_radius: 0.0,
            spline_samples_per_control_point: Self::default_spline_samples(),
            ellipse_segments_per_quadrant: Self::default_ellipse_segments(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// 未指定输出路径时替换输入文件的扩展名。
    #[serde(default = "OutputConfig::default_extension")]
    pub extension: String,
}

impl OutputConfig {
    fn default_extension() -> String {
        "fcs".to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            extension: Self::default_extension(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
