use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PredictorResult;

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// Resolve `path` against `root` unless it is already absolute.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub fn read_csv(file_path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()
}

pub fn write_csv(df: &mut DataFrame, file_path: &Path) -> PredictorResult<()> {
    let mut file = fs::File::create(file_path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(file_path: &Path) -> PredictorResult<T> {
    let text = fs::read_to_string(file_path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn write_json_pretty<T: Serialize>(value: &T, file_path: &Path) -> PredictorResult<()> {
    fs::write(file_path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
