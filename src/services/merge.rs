use futures::future::try_join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

/// One CSV data row, keyed by column name
pub type CsvRow = HashMap<String, String>;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Failed to list {}: {source}", dir.display())]
    ListDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Parsed contents of a single CSV file
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub file: String,
    /// Column names in header order, first occurrence wins
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No CSV files besides the output were found
    NoInputs,
    /// The first file has no data rows to take a header from
    NoData,
    Merged {
        files: usize,
        rows: usize,
        output: PathBuf,
    },
}

/// Concatenates every CSV in a directory into one output file inside it
pub struct CsvMergeService {
    dir: PathBuf,
    output_name: String,
}

impl CsvMergeService {
    pub fn new(dir: impl Into<PathBuf>, output_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            output_name: output_name.into(),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.join(&self.output_name)
    }

    /// Lists `*.csv` files (case-insensitive) in name order, skipping the
    /// merge output itself.
    pub async fn find_csv_files(&self) -> Result<Vec<PathBuf>, MergeError> {
        let list_err = |source| MergeError::ListDir {
            dir: self.dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(list_err)?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_lowercase().ends_with(".csv") || name == self.output_name {
                continue;
            }
            let file_type = entry.file_type().await.map_err(list_err)?;
            if file_type.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Reads and merges all input files. Inputs are read concurrently; the
    /// output is written only after every input parsed successfully.
    pub async fn merge_all(&self) -> Result<MergeOutcome, MergeError> {
        info!("Starting CSV merge process...");
        let csv_files = self.find_csv_files().await?;

        if csv_files.is_empty() {
            info!("No CSV files found in {}.", self.dir.display());
            return Ok(MergeOutcome::NoInputs);
        }
        info!("Found {} CSV files.", csv_files.len());

        let tables = try_join_all(csv_files.iter().map(|path| read_csv_file(path))).await?;

        let Some((headers, rows)) = merge_tables(&tables) else {
            info!("No data found in CSV files.");
            return Ok(MergeOutcome::NoData);
        };

        let output = self.output_path();
        let row_count = rows.len();
        let target = output.clone();
        tokio::task::spawn_blocking(move || write_csv(&target, &headers, &rows)).await??;

        info!(
            "Successfully merged {} rows into {}",
            row_count,
            output.display()
        );
        Ok(MergeOutcome::Merged {
            files: tables.len(),
            rows: row_count,
            output,
        })
    }
}

pub async fn read_csv_file(path: &Path) -> Result<CsvTable, MergeError> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let data = tokio::fs::read(path).await.map_err(|source| MergeError::Read {
        file: file.clone(),
        source,
    })?;

    tokio::task::spawn_blocking(move || parse_csv(&file, &data)).await?
}

/// Parses CSV bytes whose first record is the header. Short rows leave the
/// missing columns out of the row map; fields beyond the header are dropped.
pub fn parse_csv(file: &str, data: &[u8]) -> Result<CsvTable, MergeError> {
    let parse_err = |source| MergeError::Parse {
        file: file.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data);

    let columns: Vec<String> = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(parse_err)?;
        let row: CsvRow = columns
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.clone(), value.to_string()))
            .collect();
        rows.push(row);
    }

    let mut headers: Vec<String> = Vec::with_capacity(columns.len());
    for column in columns {
        if !headers.contains(&column) {
            headers.push(column);
        }
    }

    info!("Processing {} with {} rows", file, rows.len());
    Ok(CsvTable {
        file: file.to_string(),
        headers,
        rows,
    })
}

/// Lines up every row under the first table's header. Returns `None` when
/// the first table has no data rows.
pub fn merge_tables(tables: &[CsvTable]) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let first = tables.first()?;
    if first.rows.is_empty() {
        return None;
    }
    let headers = first.headers.clone();

    let rows = tables
        .iter()
        .flat_map(|table| table.rows.iter())
        .map(|row| {
            headers
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    Some((headers, rows))
}

/// Writes through a temp file in the same directory so a failed write
/// never leaves a truncated output behind.
fn write_csv(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<(), MergeError> {
    let write_err = |source| MergeError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(temp);

    writer.write_record(headers).map_err(|e| write_err(e.into()))?;
    for row in rows {
        writer.write_record(row).map_err(|e| write_err(e.into()))?;
    }

    let temp = writer
        .into_inner()
        .map_err(|e| write_err(e.into_error()))?;
    temp.as_file().sync_all().map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(file: &str, csv: &str) -> CsvTable {
        parse_csv(file, csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_csv() {
        let parsed = table("people.csv", "name,age\nada,36\n\"lovelace, a\",\"3\"\"6\"\n");
        assert_eq!(parsed.headers, vec!["name", "age"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1]["name"], "lovelace, a");
        assert_eq!(parsed.rows[1]["age"], "3\"6");
    }

    #[test]
    fn test_parse_csv_short_and_long_rows() {
        let parsed = table("ragged.csv", "a,b,c\n1\n1,2,3,4\n");
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].len(), 1);
        assert!(!parsed.rows[0].contains_key("b"));
        assert_eq!(parsed.rows[1].len(), 3);
    }

    #[test]
    fn test_parse_csv_header_only() {
        let parsed = table("empty.csv", "a,b\n");
        assert_eq!(parsed.headers, vec!["a", "b"]);
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn test_parse_csv_rejects_invalid_utf8() {
        let err = parse_csv("bad.csv", b"a,b\n\xff\xfe,1\n").err().unwrap();
        assert!(matches!(err, MergeError::Parse { ref file, .. } if file == "bad.csv"));
    }

    #[test]
    fn test_merge_tables_uses_first_header() {
        let tables = vec![
            table("a.csv", "name,val\nx,1\n"),
            table("b.csv", "val,name,extra\n2,y,z\n"),
            table("c.csv", "name\nw\n"),
        ];
        let (headers, rows) = merge_tables(&tables).unwrap();
        assert_eq!(headers, vec!["name", "val"]);
        assert_eq!(
            rows,
            vec![
                vec!["x".to_string(), "1".to_string()],
                vec!["y".to_string(), "2".to_string()],
                vec!["w".to_string(), String::new()],
            ]
        );
    }

    #[test]
    fn test_merge_tables_requires_first_file_data() {
        assert!(merge_tables(&[]).is_none());

        let tables = vec![table("a.csv", "name\n"), table("b.csv", "name\ny\n")];
        assert!(merge_tables(&tables).is_none());
    }

    #[test]
    fn test_write_csv_quotes_and_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(
            &path,
            &["name".to_string(), "note".to_string()],
            &[vec!["x".to_string(), "a,b".to_string()]],
        )
        .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "name,note\nx,\"a,b\"\n");
    }
}
