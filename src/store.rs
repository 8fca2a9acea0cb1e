//! Tabular data store: loads the two input tables once and hands out
//! shared references for the rest of the process.
//!
//! Structure:
//! - `DataSource`: where tables come from (CSV files, or memory in tests)
//! - `DataStore`: memoizing wrapper, one load per table per process
//! - `Dataset`: borrowed view of both loaded tables, passed to views

use std::cell::OnceCell;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use csv::{ByteRecord, ReaderBuilder};
use tracing::{debug, info, warn};

use crate::error::DataSourceError;
use crate::types::{DataConfig, Encoding, GeoCode, GeoLocation, Record, Table, Year};

// ============================================================================
// COLUMN NAMES
// ============================================================================

pub const COL_UBIGEO: &str = "UBIGEO";
pub const COL_PERIOD: &str = "PERIODO";
pub const COL_DEPARTMENT: &str = "DEPARTAMENTO";
pub const COL_PROVINCE: &str = "PROVINCIA";
pub const COL_DISTRICT: &str = "DISTRITO";
pub const COL_PER_CAPITA: &str = "GPC_DOM";
pub const COL_DOMESTIC: &str = "QRESIDUOS_DOM";
pub const COL_NON_DOMESTIC: &str = "QRESIDUOS_NO_DOM";
pub const COL_MUNICIPAL: &str = "QRESIDUOS_MUN";

pub const COL_GEO_CODE: &str = "ubigeo_inei";
pub const COL_LATITUDE: &str = "latitud";
pub const COL_LONGITUDE: &str = "longitud";

// ============================================================================
// SOURCES
// ============================================================================

/// Something that can produce the two input tables.
pub trait DataSource {
    fn load_primary(&self) -> Result<Table<Record>, DataSourceError>;
    fn load_geo(&self) -> Result<Table<GeoLocation>, DataSourceError>;
}

/// Delimited-text files on disk.
#[derive(Debug, Clone)]
pub struct CsvSource {
    config: DataConfig,
}

impl CsvSource {
    pub fn new(config: DataConfig) -> Self {
        CsvSource { config }
    }

    pub fn config(&self) -> &DataConfig {
        &self.config
    }
}

impl DataSource for CsvSource {
    fn load_primary(&self) -> Result<Table<Record>, DataSourceError> {
        let started = Instant::now();
        let config = &self.config;
        let table = read_primary(&config.primary_path, config.delimiter, config.encoding)?;
        info!(
            path = %self.config.primary_path.display(),
            rows = table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded primary table"
        );
        Ok(table)
    }

    fn load_geo(&self) -> Result<Table<GeoLocation>, DataSourceError> {
        let started = Instant::now();
        let config = &self.config;
        let table = read_geo(&config.geo_path, config.delimiter, config.encoding)?;

        let mut seen = HashSet::new();
        let duplicates = table.iter().filter(|g| !seen.insert(g.geo_code)).count();
        if duplicates > 0 {
            warn!(
                path = %self.config.geo_path.display(),
                duplicates,
                "geo table repeats ubigeo codes; first occurrence wins when joining"
            );
        }

        info!(
            path = %self.config.geo_path.display(),
            rows = table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded geo table"
        );
        Ok(table)
    }
}

/// Tables already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub records: Vec<Record>,
    pub geo: Vec<GeoLocation>,
}

impl DataSource for MemorySource {
    fn load_primary(&self) -> Result<Table<Record>, DataSourceError> {
        Ok(Table::new(self.records.clone()))
    }

    fn load_geo(&self) -> Result<Table<GeoLocation>, DataSourceError> {
        Ok(Table::new(self.geo.clone()))
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Loads each table at most once and keeps it for the store's lifetime.
///
/// A failed load is not remembered; the next call tries again.
#[derive(Debug)]
pub struct DataStore<S> {
    source: S,
    primary: OnceCell<Table<Record>>,
    geo: OnceCell<Table<GeoLocation>>,
}

impl<S: DataSource> DataStore<S> {
    pub fn new(source: S) -> Self {
        DataStore {
            source,
            primary: OnceCell::new(),
            geo: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn load_primary(&self) -> Result<&Table<Record>, DataSourceError> {
        if let Some(table) = self.primary.get() {
            debug!("primary table served from cache");
            return Ok(table);
        }
        let table = self.source.load_primary()?;
        Ok(self.primary.get_or_init(|| table))
    }

    pub fn load_geo(&self) -> Result<&Table<GeoLocation>, DataSourceError> {
        if let Some(table) = self.geo.get() {
            debug!("geo table served from cache");
            return Ok(table);
        }
        let table = self.source.load_geo()?;
        Ok(self.geo.get_or_init(|| table))
    }

    /// Load both tables (if needed) and borrow them together.
    pub fn dataset(&self) -> Result<Dataset<'_>, DataSourceError> {
        Ok(Dataset {
            records: self.load_primary()?,
            geo: self.load_geo()?,
        })
    }
}

/// Both loaded tables, borrowed from a `DataStore`.
///
/// This is the only way views reach the data.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    pub records: &'a Table<Record>,
    pub geo: &'a Table<GeoLocation>,
}

// ============================================================================
// CSV READING
// ============================================================================

/// Header positions for one file, resolved by name.
struct Header {
    path: PathBuf,
    names: Vec<String>,
}

impl Header {
    fn index(&self, column: &'static str) -> Result<usize, DataSourceError> {
        self.names
            .iter()
            .position(|n| n == column)
            .ok_or_else(|| DataSourceError::MissingColumn {
                path: self.path.clone(),
                column,
            })
    }
}

/// One data row plus what is needed to report errors against it.
struct Row<'a> {
    path: &'a Path,
    line: u64,
    encoding: Encoding,
    record: &'a ByteRecord,
}

impl Row<'_> {
    fn text(&self, index: usize) -> Result<String, DataSourceError> {
        let bytes = self.record.get(index).unwrap_or_default();
        decode(bytes, self.encoding).ok_or_else(|| DataSourceError::Decode {
            path: self.path.to_path_buf(),
            line: self.line,
        })
    }

    fn malformed(&self, column: &'static str, value: &str) -> DataSourceError {
        DataSourceError::Malformed {
            path: self.path.to_path_buf(),
            line: self.line,
            column,
            value: value.to_string(),
        }
    }

    /// Numeric cell. Blank cells count as zero, like a skipped NaN in a sum.
    fn number(&self, index: usize, column: &'static str) -> Result<f64, DataSourceError> {
        Ok(self.optional_number(index, column)?.unwrap_or(0.0))
    }

    /// Numeric cell where blank means missing.
    fn optional_number(
        &self,
        index: usize,
        column: &'static str,
    ) -> Result<Option<f64>, DataSourceError> {
        let raw = self.text(index)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(Some)
            .ok_or_else(|| self.malformed(column, trimmed))
    }

    fn integral(&self, index: usize, column: &'static str) -> Result<i64, DataSourceError> {
        let raw = self.text(index)?;
        parse_integral(raw.trim()).ok_or_else(|| self.malformed(column, raw.trim()))
    }

    fn year(&self, index: usize) -> Result<Year, DataSourceError> {
        let raw = self.text(index)?;
        match parse_integral(raw.trim()) {
            Some(n @ 1000..=9999) => Ok(Year(n as i32)),
            _ => Err(self.malformed(COL_PERIOD, raw.trim())),
        }
    }

    fn geo_code(&self, index: usize, column: &'static str) -> Result<GeoCode, DataSourceError> {
        let n = self.integral(index, column)?;
        u32::try_from(n)
            .map(GeoCode)
            .map_err(|_| self.malformed(column, &n.to_string()))
    }
}

/// Accepts "2014" and spreadsheet-style "2014.0".
fn parse_integral(s: &str) -> Option<i64> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    let x = s.parse::<f64>().ok()?;
    (x.is_finite() && x.fract() == 0.0 && x.abs() < i64::MAX as f64).then_some(x as i64)
}

fn decode(bytes: &[u8], encoding: Encoding) -> Option<String> {
    match encoding {
        // Latin-1 maps each byte to the code point of the same value.
        Encoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        Encoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
    }
}

fn open_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<File>, DataSourceError> {
    let file = File::open(path).map_err(|source| DataSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(file))
}

fn read_header(
    reader: &mut csv::Reader<File>,
    path: &Path,
    encoding: Encoding,
) -> Result<Header, DataSourceError> {
    let raw = reader.byte_headers().map_err(|source| DataSourceError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let mut names = Vec::with_capacity(raw.len());
    for field in raw.iter() {
        let name = decode(field, encoding).ok_or_else(|| DataSourceError::Decode {
            path: path.to_path_buf(),
            line: 1,
        })?;
        // Strip a byte-order mark however it was decoded.
        let name = name.trim_start_matches('\u{feff}').trim_start_matches("ï»¿");
        names.push(name.trim().to_string());
    }

    Ok(Header {
        path: path.to_path_buf(),
        names,
    })
}

/// Resolve columns from the header, then call `parse` on each data row.
/// Rows for which `parse` returns `None` are skipped and counted.
fn read_rows<T, C: Copy>(
    path: &Path,
    delimiter: u8,
    encoding: Encoding,
    resolve: impl FnOnce(&Header) -> Result<C, DataSourceError>,
    mut parse: impl FnMut(C, &Row<'_>) -> Result<Option<T>, DataSourceError>,
) -> Result<Table<T>, DataSourceError> {
    let mut reader = open_reader(path, delimiter)?;
    let header = read_header(&mut reader, path, encoding)?;
    let columns = resolve(&header)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    let mut record = ByteRecord::new();
    loop {
        let more = reader
            .read_byte_record(&mut record)
            .map_err(|source| DataSourceError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        if !more {
            break;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row = Row {
            path,
            line,
            encoding,
            record: &record,
        };
        match parse(columns, &row)? {
            Some(parsed) => rows.push(parsed),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "rows with missing values skipped");
    }
    Ok(Table::new(rows))
}

/// Read the primary waste table.
///
/// # Errors
/// Fails if the file is unreadable, a required column is missing, or a
/// cell cannot be parsed.
pub fn read_primary(
    path: &Path,
    delimiter: u8,
    encoding: Encoding,
) -> Result<Table<Record>, DataSourceError> {
    read_rows(
        path,
        delimiter,
        encoding,
        primary_columns,
        |[ubigeo, period, dep, prov, dist, gpc, dom, no_dom, mun], row| {
            Ok(Some(Record {
                ubigeo: row.geo_code(ubigeo, COL_UBIGEO)?,
                period: row.year(period)?,
                department: row.text(dep)?.trim().to_string(),
                province: row.text(prov)?.trim().to_string(),
                district: row.text(dist)?.trim().to_string(),
                domestic_waste: row.number(dom, COL_DOMESTIC)?,
                non_domestic_waste: row.number(no_dom, COL_NON_DOMESTIC)?,
                municipal_waste: row.number(mun, COL_MUNICIPAL)?,
                per_capita_domestic: row.number(gpc, COL_PER_CAPITA)?,
            }))
        },
    )
}

fn primary_columns(header: &Header) -> Result<[usize; 9], DataSourceError> {
    Ok([
        header.index(COL_UBIGEO)?,
        header.index(COL_PERIOD)?,
        header.index(COL_DEPARTMENT)?,
        header.index(COL_PROVINCE)?,
        header.index(COL_DISTRICT)?,
        header.index(COL_PER_CAPITA)?,
        header.index(COL_DOMESTIC)?,
        header.index(COL_NON_DOMESTIC)?,
        header.index(COL_MUNICIPAL)?,
    ])
}

/// Read the ubigeo → coordinates table.
///
/// # Errors
/// Same conditions as [`read_primary`]. A row with a blank coordinate is
/// skipped, so it never joins.
pub fn read_geo(
    path: &Path,
    delimiter: u8,
    encoding: Encoding,
) -> Result<Table<GeoLocation>, DataSourceError> {
    read_rows(path, delimiter, encoding, geo_columns, |[code, lat, lon], row| {
        let geo_code = row.geo_code(code, COL_GEO_CODE)?;
        let latitude = row.optional_number(lat, COL_LATITUDE)?;
        let longitude = row.optional_number(lon, COL_LONGITUDE)?;
        Ok(latitude.zip(longitude).map(|(latitude, longitude)| GeoLocation {
            geo_code,
            latitude,
            longitude,
        }))
    })
}

fn geo_columns(header: &Header) -> Result<[usize; 3], DataSourceError> {
    Ok([
        header.index(COL_GEO_CODE)?,
        header.index(COL_LATITUDE)?,
        header.index(COL_LONGITUDE)?,
    ])
}

// ============================================================================
// TESTS
// ============================================================================
