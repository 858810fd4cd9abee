// This module is the file-level driver behind the `decodegen` binary. It reads a table from
// disk, runs parse, validation, formatting and generation entirely in memory, and only then
// touches the filesystem: the canonical table is written back and the splice target is
// rewritten, each through a temporary sibling file that is renamed into place. Files whose
// contents would not change are left alone so build tools do not see spurious modifications.
// An optional follow-up command (typically the build and test of the crate that includes the
// generated decoder) runs through `sh -c` after the writes and its exit status is reported.

//! Filesystem pipeline for the command-line tool.

use crate::codegen::{emit_module, generate};
use crate::core::{Anchors, CodegenConfig, DecodegenError, Result, SessionStats};
use crate::splice::splice_with_stats;
use crate::table::InstructionSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Read a file, attaching the path to any error.
pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| DecodegenError::io(path.display().to_string(), e))
}

/// Write `contents` to a sibling temporary file and rename it over `path`.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.decodegen"));
    let wrap = |e| DecodegenError::io(path.display().to_string(), e);

    fs::write(&temp, contents).map_err(wrap)?;
    fs::rename(&temp, path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        wrap(e)
    })?;
    log::debug!("wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Parse and validate the table at `path`.
pub fn load_table(path: &Path) -> Result<(String, InstructionSet)> {
    let text = read_file(path)?;
    let set = InstructionSet::parse(&text)?;
    set.validate()?;
    log::info!("loaded {} instructions from {}", set.len(), path.display());
    Ok((text, set))
}

/// Canonicalise the table file. Returns whether its text changed.
///
/// With `check`, nothing is written.
pub fn format_file(path: &Path, check: bool) -> Result<bool> {
    let (text, set) = load_table(path)?;
    let formatted = set.format();
    let changed = formatted != text;
    if changed && !check {
        write_file(path, &formatted)?;
    }
    Ok(changed)
}

/// Run every in-memory stage without writing anything.
pub fn check_file(path: &Path, config: &CodegenConfig) -> Result<SessionStats> {
    let (_, set) = load_table(path)?;
    Ok(generate(&set, config)?.stats)
}

/// Generate a standalone decoder module. Writes to `output` when given.
pub fn generate_file(table: &Path, output: Option<&Path>, config: &CodegenConfig) -> Result<String> {
    let (_, set) = load_table(table)?;
    let module = emit_module(&set, config)?;
    if let Some(output) = output {
        write_if_changed(output, &module)?;
    }
    Ok(module)
}

/// Format, splice and optionally build.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub table: PathBuf,
    pub target: PathBuf,
    pub anchors: Anchors,
    pub config: CodegenConfig,
    /// Write the canonical table back.
    pub format_table: bool,
    /// Shell command run after the files are written.
    pub then: Option<String>,
}

/// What a pipeline run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub table_changed: bool,
    pub target_changed: bool,
    pub stats: SessionStats,
}

impl Pipeline {
    pub fn new(table: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            target: target.into(),
            anchors: Anchors::default(),
            config: CodegenConfig::default(),
            format_table: true,
            then: None,
        }
    }

    pub fn run(&self) -> Result<PipelineReport> {
        let (text, set) = load_table(&self.table)?;
        let formatted = set.format();
        let source = read_file(&self.target)?;
        let (spliced, stats) = splice_with_stats(&source, &self.anchors, &set, &self.config)?;

        let table_changed = self.format_table && formatted != text;
        if table_changed {
            write_file(&self.table, &formatted)?;
        }
        let target_changed = spliced != source;
        if target_changed {
            write_file(&self.target, &spliced)?;
        } else {
            log::info!("{} is up to date", self.target.display());
        }

        if let Some(command) = &self.then {
            run_command(command)?;
        }

        Ok(PipelineReport {
            table_changed,
            target_changed,
            stats,
        })
    }
}

fn write_if_changed(path: &Path, contents: &str) -> Result<()> {
    match fs::read_to_string(path) {
        Ok(existing) if existing == contents => {
            log::info!("{} is up to date", path.display());
            Ok(())
        }
        _ => write_file(path, contents),
    }
}

/// Run `command` through the shell, failing on a non-zero exit.
pub fn run_command(command: &str) -> Result<()> {
    log::info!("running `{command}`");
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .map_err(|e| DecodegenError::io("sh", e))?;
    if status.success() {
        Ok(())
    } else {
        Err(DecodegenError::Command {
            command: command.to_string(),
            status: status.to_string(),
        })
    }
}
