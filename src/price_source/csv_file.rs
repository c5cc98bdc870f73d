use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{JournalError, Result};
use crate::models::{Candle, CandleSeries};
use crate::price_source::{from_wall_clock, window_bounds, PriceSource};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Serialize)]
struct CsvRow {
    #[serde(rename = "Datetime")]
    datetime: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume")]
    volume: f64,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub symbol: String,
    pub path: PathBuf,
    pub imported: usize,
    pub total: usize,
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

/// File holding the imported bars for `symbol`.
pub fn symbol_path(data_dir: &Path, symbol: &str) -> PathBuf {
    data_dir.join(format!("{}.csv", symbol.trim().to_uppercase()))
}

/// Accepts RFC 3339, `+00:00`-suffixed and naive timestamps; naive ones are
/// read as wall-clock time in `tz`.
pub fn parse_datetime(raw: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return from_wall_clock(&naive, tz);
        }
    }
    Err(JournalError::validation(format!(
        "unrecognized Datetime value {:?}",
        raw
    )))
}

/// Reads bars from CSV with a header row. Column names are matched
/// case-insensitively; Volume may be absent.
pub fn read_bars<R: Read>(reader: R, tz: Tz) -> Result<Vec<Candle>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let col = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let required = |name: &str| {
        col(name).ok_or_else(|| {
            JournalError::validation(format!("CSV is missing the {} column", name))
        })
    };

    let dt_idx = required("Datetime")?;
    let open_idx = required("Open")?;
    let high_idx = required("High")?;
    let low_idx = required("Low")?;
    let close_idx = required("Close")?;
    let volume_idx = col("Volume");

    let mut candles = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let number = |idx: usize, name: &str| -> Result<f64> {
            field(idx).parse::<f64>().map_err(|_| {
                JournalError::validation(format!(
                    "line {}: {} value {:?} is not a number",
                    line,
                    name,
                    field(idx)
                ))
            })
        };

        let timestamp = parse_datetime(field(dt_idx), tz)
            .map_err(|e| JournalError::validation(format!("line {}: {}", line, e)))?;
        let volume = match volume_idx {
            Some(idx) if !field(idx).is_empty() => number(idx, "Volume")?,
            _ => 0.0,
        };
        candles.push(Candle {
            timestamp,
            open: number(open_idx, "Open")?,
            high: number(high_idx, "High")?,
            low: number(low_idx, "Low")?,
            close: number(close_idx, "Close")?,
            volume,
        });
    }
    Ok(candles)
}

fn write_bars(path: &Path, series: &CandleSeries) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for c in series {
        wtr.serialize(CsvRow {
            datetime: c.timestamp.to_rfc3339(),
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Validates an uploaded bar file and merges it into the symbol's stored bars.
/// Rows from the new file win on duplicate timestamps.
pub fn import_csv(src: &Path, symbol: &str, data_dir: &Path, tz: Tz) -> Result<ImportSummary> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(JournalError::validation("symbol is required"));
    }

    let file = std::fs::File::open(src)?;
    let mut incoming = read_bars(file, tz)?;
    if incoming.is_empty() {
        return Err(JournalError::EmptyInput(format!(
            "{} contains no rows",
            src.display()
        )));
    }
    let imported = incoming.len();

    std::fs::create_dir_all(data_dir)?;
    let dest = symbol_path(data_dir, &symbol);
    if dest.exists() {
        let existing = read_bars(std::fs::File::open(&dest)?, Tz::UTC)?;
        incoming.extend(existing);
    }
    let merged = CandleSeries::normalized(incoming);
    write_bars(&dest, &merged)?;

    let (first, last) = match (merged.first(), merged.last()) {
        (Some(f), Some(l)) => (f.timestamp, l.timestamp),
        _ => return Err(JournalError::EmptyInput(format!("no bars for {}", symbol))),
    };
    info!(
        "Imported {} bars for {} into {} ({} total)",
        imported,
        symbol,
        dest.display(),
        merged.len()
    );
    Ok(ImportSummary {
        symbol,
        path: dest,
        imported,
        total: merged.len(),
        first,
        last,
    })
}

/// Serves bars previously stored by [`import_csv`].
pub struct CsvSource {
    data_dir: PathBuf,
    cache: HashMap<String, CandleSeries>,
}

impl CsvSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: HashMap::new(),
        }
    }

    fn series(&mut self, symbol: &str) -> Result<&CandleSeries> {
        let key = symbol.trim().to_uppercase();
        if !self.cache.contains_key(&key) {
            let path = symbol_path(&self.data_dir, &key);
            let file = std::fs::File::open(&path).map_err(|e| {
                JournalError::ExternalSource(format!(
                    "no imported bars for {} at {}: {}",
                    key,
                    path.display(),
                    e
                ))
            })?;
            let series = CandleSeries::normalized(read_bars(file, Tz::UTC)?);
            debug!("Loaded {} bars for {} from {}", series.len(), key, path.display());
            self.cache.insert(key.clone(), series);
        }
        Ok(&self.cache[&key])
    }
}

#[async_trait]
impl PriceSource for CsvSource {
    async fn get_window(
        &mut self,
        symbol: &str,
        center: DateTime<Utc>,
        minutes_before: i64,
        minutes_after: i64,
    ) -> Result<CandleSeries> {
        let (start, end) = window_bounds(center, minutes_before, minutes_after);
        Ok(self.series(symbol)?.window(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_datetime_column_is_rejected() {
        let body = "Open,High,Low,Close,Volume\n1,2,0.5,1.5,10\n";
        let err = read_bars(body.as_bytes(), Tz::UTC).unwrap_err();
        match err {
            JournalError::Validation(msg) => assert!(msg.contains("Datetime")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn headers_match_case_insensitively_and_volume_is_optional() {
        let body = "datetime,OPEN,high,Low,close\n2024-01-15 12:00:00,1,2,0.5,1.5\n";
        let bars = read_bars(body.as_bytes(), Tz::UTC).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 0.0);
        assert_eq!(bars[0].timestamp.to_rfc3339(), "2024-01-15T12:00:00+00:00");
    }

    #[test]
    fn bad_number_reports_line() {
        let body = "Datetime,Open,High,Low,Close\n2024-01-15 12:00,1,2,0.5,1.5\n2024-01-15 12:01,x,2,0.5,1.5\n";
        let err = read_bars(body.as_bytes(), Tz::UTC).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn datetime_formats() {
        let ny = chrono_tz::America::New_York;
        let a = parse_datetime("2024-01-15T13:00:00Z", ny).unwrap();
        let b = parse_datetime("2024-01-15 08:00:00-05:00", ny).unwrap();
        let c = parse_datetime("2024-01-15 08:00", ny).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(parse_datetime("15/01/2024", ny).is_err());
    }

    #[test]
    fn nonexistent_local_time_is_rejected() {
        // Clocks jump from 02:00 to 03:00 on this date in New York.
        let err = parse_datetime("2024-03-10 02:30", chrono_tz::America::New_York).unwrap_err();
        assert!(matches!(err, JournalError::Validation(_)));
    }

    #[test]
    fn import_merges_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_file(
            dir.path(),
            "a.csv",
            "Datetime,Open,High,Low,Close,Volume\n\
             2024-01-15 12:01,2,3,1,2.5,5\n\
             2024-01-15 12:00,1,2,0.5,1.5,5\n",
        );
        let second = write_file(
            dir.path(),
            "b.csv",
            "Datetime,Open,High,Low,Close,Volume\n\
             2024-01-15 12:01,9,9,9,9,9\n\
             2024-01-15 12:02,3,4,2,3.5,5\n",
        );
        let data_dir = dir.path().join("data");

        let s1 = import_csv(&first, "xauusd", &data_dir, Tz::UTC).unwrap();
        assert_eq!(s1.symbol, "XAUUSD");
        assert_eq!(s1.total, 2);

        let s2 = import_csv(&second, "XAUUSD", &data_dir, Tz::UTC).unwrap();
        assert_eq!(s2.imported, 2);
        assert_eq!(s2.total, 3);

        let stored = read_bars(std::fs::File::open(&s2.path).unwrap(), Tz::UTC).unwrap();
        let opens: Vec<f64> = stored.iter().map(|c| c.open).collect();
        assert_eq!(opens, vec![1.0, 9.0, 3.0]);
    }

    #[test]
    fn import_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "empty.csv", "Datetime,Open,High,Low,Close\n");
        let err = import_csv(&path, "EURUSD", dir.path(), Tz::UTC).unwrap_err();
        assert!(matches!(err, JournalError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn csv_source_serves_imported_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = String::from("Datetime,Open,High,Low,Close,Volume\n");
        for m in 0..10 {
            body.push_str(&format!("2024-01-15 12:{:02}:00,1,2,0.5,1.5,1\n", m));
        }
        let src = write_file(dir.path(), "bars.csv", &body);
        let data_dir = dir.path().join("data");
        import_csv(&src, "EURUSD", &data_dir, Tz::UTC).unwrap();

        let mut source = CsvSource::new(&data_dir);
        let center = parse_datetime("2024-01-15 12:05", Tz::UTC).unwrap();
        let w = source.get_window("eurusd", center, 2, 2).await.unwrap();
        assert_eq!(w.len(), 5);

        let err = source.get_window("GBPUSD", center, 2, 2).await.unwrap_err();
        assert!(matches!(err, JournalError::ExternalSource(_)));
    }
}
