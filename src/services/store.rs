use crate::error::Result;
use crate::types::MetricsRecord;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT: &str = "assets/scholar.json";

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

/// Overwrite `path` with the pretty-printed record.
pub fn write_record(path: &Path, record: &MetricsRecord) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn read_record(path: &Path) -> Result<MetricsRecord> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

/// `<output>.debug.html`, next to the output file.
pub fn debug_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".debug.html");
    PathBuf::from(name)
}

/// Save raw page content for offline diagnosis.
pub fn save_debug_html(output: &Path, page: &str) -> anyhow::Result<PathBuf> {
    let path = debug_path(output);
    ensure_parent(&path)
        .with_context(|| format!("creating directory for {}", path.display()))?;
    fs::write(&path, page).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
