use crate::catalog::EntitySpec;
use std::fmt;
use std::io::Read;

/// Why a CSV header does not satisfy its entity's column contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMismatch {
    pub expected: Vec<String>,
    pub found: Vec<String>,
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
}

impl HeaderMismatch {
    /// Same columns, different order.
    pub fn is_reordered(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.expected != self.found
    }
}

impl fmt::Display for HeaderMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected [{}], found [{}]",
            self.expected.join(", "),
            self.found.join(", ")
        )?;
        if !self.missing.is_empty() {
            write!(f, "; missing {}", self.missing.join(", "))?;
        }
        if !self.unexpected.is_empty() {
            write!(f, "; unexpected {}", self.unexpected.join(", "))?;
        }
        if self.is_reordered() {
            write!(f, "; columns are out of order")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("file is empty, expected a header row")]
    Missing,
    #[error("header row must be on line 1, found it on line {0} after blank lines")]
    NotOnFirstLine(u64),
    #[error("header row is not valid CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Reads only the first record of a CSV source.
///
/// The record must sit on the first physical line: `COPY ... HEADER true`
/// skips exactly one line, while the csv reader skips blank ones.
pub fn read_header<R: Read>(reader: R) -> Result<Vec<String>, HeaderError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut record = csv::StringRecord::new();
    if !csv_reader.read_record(&mut record)? {
        return Err(HeaderError::Missing);
    }
    if let Some(line) = record.position().map(|position| position.line()) {
        if line != 1 {
            return Err(HeaderError::NotOnFirstLine(line));
        }
    }

    let header: Vec<String> = record
        .iter()
        .map(|cell| cell.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    if header.iter().all(String::is_empty) {
        return Err(HeaderError::Missing);
    }
    Ok(header)
}

/// Exact, order-sensitive comparison against the contract.
pub fn validate_header(spec: &EntitySpec, found: &[String]) -> Result<(), HeaderMismatch> {
    if found.iter().map(String::as_str).eq(spec.columns.iter().copied()) {
        return Ok(());
    }

    let missing = spec
        .columns
        .iter()
        .filter(|column| !found.iter().any(|cell| cell == *column))
        .map(|column| column.to_string())
        .collect();
    let unexpected = found
        .iter()
        .filter(|cell| !spec.columns.contains(&cell.as_str()))
        .cloned()
        .collect();

    Err(HeaderMismatch {
        expected: spec.columns.iter().map(|column| column.to_string()).collect(),
        found: found.to_vec(),
        missing,
        unexpected,
    })
}
