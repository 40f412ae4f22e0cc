pub mod block;
pub mod build;
pub mod compiler;
pub mod condition;
pub mod error;
pub mod graph;
pub mod ids;
pub mod names;
pub mod opcodes;
pub mod resolve;
pub mod sb3;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

pub use block::{Block, BlockId, Input, Script};
pub use compiler::{compile, compile_with, CompileOptions};
pub use error::CompileError;
pub use names::{KnownNames, NameTable};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    use ids::{IdSource, SequentialIds, UuidIds};

    let total_stages = 4 + usize::from(args.names.is_some());
    let progress = CliProgress::new("Compile", total_stages);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Resolving input path");
    let input = canonicalize_file(&args.input)?;

    let names = match &args.names {
        Some(path) => {
            stage += 1;
            progress.emit(stage, "Loading known names");
            load_names(path)?
        }
        None => KnownNames::default(),
    };

    stage += 1;
    progress.emit(stage, "Compiling pseudocode");
    let source = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read '{}'.", pretty_path(&input)))?;
    let options = CompileOptions {
        max_nesting: args.max_nesting,
    };
    let mut sequential = SequentialIds::default();
    let mut uuids = UuidIds;
    let ids: &mut dyn IdSource = if args.uuid_ids { &mut uuids } else { &mut sequential };
    let scripts = compile_with(&source, &names, ids, &options)
        .map_err(|e| anyhow::anyhow!("{} (file '{}')", e, pretty_path(&input)))?;

    stage += 1;
    let rendered = if args.sb3 {
        progress.emit(stage, "Rendering Scratch 3 blocks");
        sb3::scripts_to_blocks_json(&scripts)?
    } else {
        progress.emit(stage, "Rendering block graph");
        serde_json::to_string_pretty(&scripts)?
    };

    stage += 1;
    match &args.output {
        Some(output) => {
            progress.emit(stage, "Writing output");
            std::fs::write(output, rendered.as_bytes())
                .with_context(|| format!("Failed to write '{}'.", pretty_path(output)))?;
        }
        None => {
            progress.emit(stage, "Writing output to stdout");
            println!("{}", rendered);
        }
    }

    Ok(())
}

/// Compiles in-memory pseudocode against a JSON name table and renders the
/// block graph as JSON.
pub fn compile_source_to_json(source: &str, names_json: Option<&str>) -> Result<String> {
    let names = parse_names(names_json)?;
    let scripts = compile(source, &names)?;
    Ok(serde_json::to_string(&scripts)?)
}

/// Same as [`compile_source_to_json`], rendered as a Scratch 3 `blocks` object.
pub fn compile_source_to_sb3_json(source: &str, names_json: Option<&str>) -> Result<String> {
    let names = parse_names(names_json)?;
    let scripts = compile(source, &names)?;
    let blocks = sb3::scripts_to_blocks(&scripts)?;
    Ok(serde_json::to_string(&blocks)?)
}

pub fn load_names(path: &Path) -> Result<KnownNames> {
    let path = canonicalize_file(path)?;
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read '{}'.", pretty_path(&path)))?;
    let table = NameTable::from_json(&text)
        .with_context(|| format!("Invalid name table in '{}'.", pretty_path(&path)))?;
    Ok(KnownNames::from(&table))
}

fn parse_names(names_json: Option<&str>) -> Result<KnownNames> {
    match names_json.map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => {
            let table = NameTable::from_json(text).context("Invalid name table.")?;
            Ok(KnownNames::from(&table))
        }
        None => Ok(KnownNames::default()),
    }
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

fn pretty_path(path: &Path) -> String {
    let raw = path.display().to_string();
    if let Some(stripped) = raw.strip_prefix(r"\\?\") {
        stripped.to_string()
    } else {
        raw
    }
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!("[{}] {}... ({}/{}) {}", self.prefix, label, step, self.total, bar);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
