//! Dataset input and output for CSV and Parquet files

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Load a dataset from a file (CSV or Parquet based on extension)
///
/// # Arguments
/// * `path` - Input file
/// * `infer_schema_length` - CSV rows used for type inference, `None` scans everything
pub fn load_dataset(path: &Path, infer_schema_length: Option<usize>) -> Result<DataFrame> {
    let lf = match extension(path).as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(infer_schema_length)
            .finish()
            .with_context(|| format!("Failed to load CSV file: {}", path.display()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        other => anyhow::bail!(
            "Unsupported file format: '{}'. Supported formats: csv, parquet",
            other
        ),
    };
    lf.collect()
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Save a dataset to a file (CSV or Parquet based on extension)
pub fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let ext = extension(path);
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    match ext.as_str() {
        "csv" => {
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        other => anyhow::bail!(
            "Unsupported output format: '{}'. Supported formats: csv, parquet",
            other
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_csv_and_parquet_round_trip() {
        let dir = tempdir().unwrap();
        let mut df = df!("x" => &[1.0, 2.5, 3.0], "c" => &["a", "b", "a"]).unwrap();
        for name in ["data.csv", "data.parquet"] {
            let path = dir.path().join(name);
            save_dataset(&mut df, &path).unwrap();
            let loaded = load_dataset(&path, Some(100)).unwrap();
            assert_eq!(loaded.shape(), (3, 2));
        }
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempdir().unwrap();
        assert!(load_dataset(&dir.path().join("data.xlsx"), None).is_err());
    }
}
