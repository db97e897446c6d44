use std::path::PathBuf;

use clap::Parser;
use dxf2fcs_config::{AppConfig, ConfigError};
use dxf2fcs_frontend::{ConversionRequest, ConversionSummary, convert_file, errors::FrontendError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Convert a DXF drawing into an FCS geometry script.
#[derive(Debug, Parser)]
#[command(name = "dxf2fcs", version, about)]
struct Cli {
    /// DXF file to convert
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (default: input path with the configured extension)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Number of decimal places written for coordinates
    #[arg(short, long, value_name = "N")]
    precision: Option<usize>,

    /// Output length unit: mm or m
    #[arg(short, long, value_name = "UNIT")]
    unit: Option<String>,

    /// Vertex declaration style: compact or verbose
    #[arg(long, value_name = "STYLE")]
    vertex_style: Option<String>,

    /// Configuration file (default: $DXF2FCS_CONFIG or ./config/default.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `dxf2fcs_engine=debug`
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let mut config = load_configuration(cli.config.clone());
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_logging(&config);
    info!(input = %cli.input.display(), "启动 dxf2fcs");

    match run(&cli, &config) {
        Ok(summary) => {
            println!("Done.");
            println!("{}", summary.describe());
        }
        Err(err) => {
            error!(error = %err, "转换失败");
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}

/// 命令行参数覆盖配置文件中的同名设置。
fn run(cli: &Cli, config: &AppConfig) -> Result<ConversionSummary, FrontendError> {
    let mut request = ConversionRequest::from_config(&cli.input, config);
    if let Some(output) = &cli.output {
        request = request.with_output(output);
    }
    if let Some(precision) = cli.precision {
        request = request.with_precision(precision);
    }
    if let Some(unit) = &cli.unit {
        request = request.with_unit(unit);
    }
    if let Some(style) = &cli.vertex_style {
        request = request.with_vertex_style(style)?;
    }
    convert_file(&request)
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            eprintln!("加载指定配置 {} 失败，使用默认配置：{err}", path.display());
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        eprintln!("加载默认配置 {} 失败，使用内建默认值：{err}", path.display());
                    }
                    ConfigError::Context { .. } => {
                        eprintln!("加载默认配置失败，使用内建默认值：{err}");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| {
        EnvFilter::new("info")
    });
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        warn!("日志系统已初始化");
    }
}
