use crate::error::{PipelineError, Result};
use crate::models::RawTable;
use crate::utils::constants::MMAP_THRESHOLD_BYTES;
use encoding_rs::WINDOWS_1252;
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Reads delimited text into a `RawTable` without interpreting cell values
pub struct CsvTableReader {
    delimiter: u8,
}

impl CsvTableReader {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read a CSV file, or the first CSV inside a zip archive
    pub fn read_path(&self, path: &Path) -> Result<RawTable> {
        if !path.exists() {
            return Err(PipelineError::SourceNotFound(path.display().to_string()));
        }

        let is_zip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
        if is_zip {
            return self.read_zip(path);
        }

        let file = File::open(path)?;
        let size = file.metadata()?.len();

        if size >= MMAP_THRESHOLD_BYTES {
            debug!(path = %path.display(), size, "reading CSV through memory map");
            let mmap = unsafe { Mmap::map(&file)? };
            self.read_bytes(&mmap)
        } else {
            let mut buffer = Vec::with_capacity(size as usize);
            let mut file = file;
            file.read_to_end(&mut buffer)?;
            self.read_bytes(&buffer)
        }
    }

    /// Decode as UTF-8, falling back to Latin-1 for legacy Danish exports
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<RawTable> {
        let text = decode_text(bytes);
        self.parse_text(&text)
    }

    fn parse_text(&self, text: &str) -> Result<RawTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(PipelineError::InvalidFormat(
                "CSV input has no header row".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(|v| v.to_string()).collect();
            // Ragged rows are padded or cut to the header width
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(RawTable::new(headers, rows))
    }

    fn read_zip(&self, path: &Path) -> Result<RawTable> {
        let file = File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if !entry.name().to_lowercase().ends_with(".csv") {
                continue;
            }

            debug!(archive = %path.display(), entry = entry.name(), "reading CSV from archive");
            let mut buffer = Vec::new();
            entry.read_to_end(&mut buffer)?;
            return self.read_bytes(&buffer);
        }

        Err(PipelineError::MissingData(format!(
            "no CSV file inside archive {}",
            path.display()
        )))
    }
}

impl Default for CsvTableReader {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            warn!("input is not valid UTF-8, decoding as Latin-1");
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_utf8_with_bom() {
        let reader = CsvTableReader::new();
        let table = reader
            .read_bytes(b"\xEF\xBB\xBFtimestamp,count\n2024-01-01 07:00,5\n")
            .unwrap();
        assert_eq!(table.headers(), &["timestamp".to_string(), "count".to_string()]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_latin1_fallback() {
        // "Køretøj" in Latin-1
        let bytes = b"K\xF8ret\xF8j,antal\nbil,3\n";
        let table = CsvTableReader::new().read_bytes(bytes).unwrap();
        assert_eq!(table.headers()[0], "Køretøj");
        assert_eq!(table.cell(0, 1), Some("3"));
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let table = CsvTableReader::new()
            .read_bytes(b"a,b,c\n1,2\n1,2,3,4\n")
            .unwrap();
        assert_eq!(table.rows()[0].len(), 3);
        assert_eq!(table.rows()[1].len(), 3);
        assert_eq!(table.cell(0, 2), None);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let table = CsvTableReader::new()
            .with_delimiter(b';')
            .read_bytes(b"dato;antal\n2024-01-01;7\n")
            .unwrap();
        assert_eq!(table.cell(0, 1), Some("7"));
    }

    #[test]
    fn test_missing_file() {
        let result = CsvTableReader::new().read_path(Path::new("/nonexistent/raw.csv"));
        assert!(matches!(result, Err(PipelineError::SourceNotFound(_))));
    }

    #[test]
    fn test_read_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "date,time,n,road_name").unwrap();
        writeln!(file, "2014-06-02,7-8,120,Nørrebrogade").unwrap();
        let table = CsvTableReader::new().read_path(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 3), Some("Nørrebrogade"));
    }

    #[test]
    fn test_read_zip_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let zip_path = dir.path().join("bike-traffic.zip");
        {
            let file = File::create(&zip_path).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            zip.start_file("README.txt", zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(b"not data").unwrap();
            zip.start_file("bike_traffic.csv", zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(b"date,time,n,road_name\n2014-06-02,7-8,120,Jagtvej\n")
                .unwrap();
            zip.finish().unwrap();
        }

        let table = CsvTableReader::new().read_path(&zip_path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 3), Some("Jagtvej"));
    }
}
