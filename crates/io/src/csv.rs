// CSV lead import

use std::io::Read;
use std::path::{Path, PathBuf};

use leadsync_core::Lead;

/// Expected column order. The header row itself is skipped, not checked.
pub const HEADER: [&str; 4] = ["Name", "Email", "Company", "Source"];

const UTF8_BOM: &str = "\u{feff}";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("line {line}: expected 4 fields (Name, Email, Company, Source), found {fields}")]
    ShortRecord { line: u64, fields: usize },
}

impl SourceError {
    /// True when the file could not be read at all, as opposed to being
    /// readable but malformed.
    pub fn is_unreadable(&self) -> bool {
        match self {
            Self::Io { .. } => true,
            Self::Csv(e) => matches!(e.kind(), ::csv::ErrorKind::Io(_)),
            Self::ShortRecord { .. } => false,
        }
    }
}

/// Read leads from a CSV file with a header row.
pub fn read_leads(path: &Path) -> Result<Vec<Lead>, SourceError> {
    let content = read_file_as_utf8(path)?;
    read_leads_from(content.as_bytes())
}

/// Read leads from any CSV byte stream. The first row is the header.
///
/// Field values are taken verbatim; validation belongs to the engine.
/// Extra trailing columns are ignored.
pub fn read_leads_from<R: Read>(reader: R) -> Result<Vec<Lead>, SourceError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut leads = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() < HEADER.len() {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(SourceError::ShortRecord { line, fields: record.len() });
        }
        leads.push(Lead::new(&record[0], &record[1], &record[2], &record[3]));
    }
    Ok(leads)
}

/// Read file and convert to UTF-8 if needed (Excel exports are often
/// Windows-1252). A leading byte-order mark is dropped.
fn read_file_as_utf8(path: &Path) -> Result<String, SourceError> {
    let io_err = |source| SourceError::Io { path: path.to_path_buf(), source };

    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            decoded.into_owned()
        }
    };

    Ok(match text.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => text,
    })
}
