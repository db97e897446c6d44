pub mod errors;
pub mod request;

use std::fs;
use std::path::{Path, PathBuf};

use dxf2fcs_engine::{ConversionStats, Converter};
use dxf2fcs_io::{DocumentLoader, DxfFacade};
use errors::FrontendError;
use tracing::info;

pub use request::ConversionRequest;

/// 一次成功转换的结果概要。
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub stats: ConversionStats,
}

impl ConversionSummary {
    /// 单行概要，供命令行输出。
    pub fn describe(&self) -> String {
        format!(
            "{} -> {}: {} curves, {} areas, {} unsupported, {} skipped",
            self.input.display(),
            self.output.display(),
            self.stats.curves,
            self.stats.areas,
            self.stats.unsupported,
            self.stats.skipped
        )
    }
}

/// 读取 DXF、在内存中完成整份转换后一次性写出脚本。
/// 任何一步失败都不会留下输出文件。
pub fn convert_file(request: &ConversionRequest) -> Result<ConversionSummary, FrontendError> {
    if !request.input.is_file() {
        return Err(FrontendError::InputNotFound(request.input.clone()));
    }
    let output = request.output_path();
    ensure_output_writable(&output)?;

    info!(input = %request.input.display(), "读取 DXF 文档");
    let document = DxfFacade::new().load(&request.input)?;

    let converted = Converter::new(request.options.clone()).convert(&document)?;

    fs::write(&output, converted.script).map_err(|source| FrontendError::Write {
        path: output.clone(),
        source,
    })?;
    info!(output = %output.display(), "脚本已写出");

    Ok(ConversionSummary {
        input: request.input.clone(),
        output,
        stats: converted.stats,
    })
}

/// 读取前先确认输出位置可写，避免整份转换完成后才失败。
fn ensure_output_writable(output: &Path) -> Result<(), FrontendError> {
    let not_writable = |reason: &str| FrontendError::OutputNotWritable {
        path: output.to_path_buf(),
        reason: reason.to_string(),
    };

    if output.is_dir() {
        return Err(not_writable("path is a directory"));
    }
    if let Ok(metadata) = fs::metadata(output) {
        if metadata.permissions().readonly() {
            return Err(not_writable("existing file is read-only"));
        }
        return Ok(());
    }

    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match fs::metadata(parent) {
        Ok(metadata) if !metadata.is_dir() => Err(not_writable("parent is not a directory")),
        Ok(metadata) if metadata.permissions().readonly() => {
            Err(not_writable("parent directory is read-only"))
        }
        Ok(_) => Ok(()),
        Err(_) => Err(not_writable("parent directory does not exist")),
    }
}
