use crate::config::AppConfig;
use crate::error::DataLoadError;
use crate::sample::SampleSource;
use crate::types::{Country, Gender, Indicator, Observation};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

pub const HEADER: [&str; 5] = ["Country", "Year", "Indicator", "Gender", "Value"];

/// Anything that can produce the backing table for a store.
pub trait ObservationSource: Send + Sync {
    fn describe(&self) -> String;
    fn load(&self) -> Result<Vec<Observation>, DataLoadError>;
}

/// Reads observations from a delimited file with a `HEADER` row.
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ObservationSource for CsvFileSource {
    fn describe(&self) -> String {
        format!("CSV file {:?}", self.path)
    }

    fn load(&self) -> Result<Vec<Observation>, DataLoadError> {
        info!(path = ?self.path, "Loading observations");
        let file = File::open(&self.path).map_err(|source| DataLoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let observations = read_observations(file)?;
        info!(count = observations.len(), "Loaded observations from CSV");
        Ok(observations)
    }
}

/// Picks the configured source: a CSV file if one is set, the sample generator otherwise.
pub fn source_from_config(config: &AppConfig) -> Box<dyn ObservationSource> {
    match &config.input.data_csv {
        Some(path) => Box::new(CsvFileSource::new(path)),
        None => Box::new(SampleSource::new(config.generator.clone())),
    }
}

pub fn read_observations<R: Read>(reader: R) -> Result<Vec<Observation>, DataLoadError> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.len() != HEADER.len() || headers.iter().zip(HEADER).any(|(h, e)| h != e) {
        return Err(DataLoadError::Header {
            found: headers.iter().map(str::to_string).collect(),
            expected: HEADER.to_vec(),
        });
    }

    let mut observations = Vec::new();
    for result in rdr.records() {
        let record = result?;
        observations.push(parse_record(&record)?);
    }

    Ok(observations)
}

fn parse_record(record: &StringRecord) -> Result<Observation, DataLoadError> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    if record.len() != HEADER.len() {
        return Err(DataLoadError::ColumnCount {
            line,
            expected: HEADER.len(),
            found: record.len(),
        });
    }

    let country: Country = parse_field(record, line, 0)?;
    let year: u16 = parse_field(record, line, 1)?;
    let indicator: Indicator = parse_field(record, line, 2)?;
    let gender: Gender = parse_field(record, line, 3)?;
    let value: f64 = parse_field(record, line, 4)?;

    if !(0.0..=100.0).contains(&value) {
        return Err(DataLoadError::OutOfRange {
            context: format!("line {}", line),
            value,
        });
    }

    Ok(Observation {
        country,
        year,
        indicator,
        gender,
        value,
    })
}

fn parse_field<T>(record: &StringRecord, line: u64, idx: usize) -> Result<T, DataLoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = record.get(idx).unwrap_or("");
    raw.parse().map_err(|e: T::Err| DataLoadError::InvalidField {
        line,
        field: HEADER[idx],
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = "\
Country,Year,Indicator,Gender,Value
Singapore,2023,Internet Usage (%),all,95.0
Papua New Guinea,2022,ICT Employment (%),female,0.0
";

    #[test]
    fn test_reads_valid_rows_in_order() {
        let observations = read_observations(VALID.as_bytes()).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].country, Country::Singapore);
        assert_eq!(observations[0].value, 95.0);
        assert_eq!(observations[1].country, Country::PapuaNewGuinea);
        assert_eq!(observations[1].indicator, Indicator::IctEmployment);
        assert_eq!(observations[1].gender, Gender::Female);
        assert_eq!(observations[1].value, 0.0);
    }

    #[test]
    fn test_rejects_wrong_header() {
        let input = "Country,Year,Indicator,Sex,Value\n";
        let err = read_observations(input.as_bytes()).unwrap_err();
        assert!(matches!(err, DataLoadError::Header { .. }));
    }

    #[test]
    fn test_rejects_wrong_column_count() {
        let input = "Country,Year,Indicator,Gender,Value\nSingapore,2023,Internet Usage (%),all\n";
        let err = read_observations(input.as_bytes()).unwrap_err();
        match err {
            DataLoadError::ColumnCount { line, found, .. } => {
                assert_eq!(line, 2);
                assert_eq!(found, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_non_numeric_value() {
        let input = "Country,Year,Indicator,Gender,Value\nSingapore,2023,Internet Usage (%),all,high\n";
        let err = read_observations(input.as_bytes()).unwrap_err();
        match err {
            DataLoadError::InvalidField { field, value, .. } => {
                assert_eq!(field, "Value");
                assert_eq!(value, "high");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_non_integer_year() {
        for year in ["20x3", "-1", "2023.5"] {
            let input = format!(
                "Country,Year,Indicator,Gender,Value\nLaos,{year},Internet Usage (%),all,50\n"
            );
            let err = read_observations(input.as_bytes()).unwrap_err();
            match err {
                DataLoadError::InvalidField { line, field, value, .. } => {
                    assert_eq!(line, 2);
                    assert_eq!(field, "Year");
                    assert_eq!(value, year);
                }
                other => panic!("unexpected error for {year}: {other}"),
            }
        }
    }

    #[test]
    fn test_rejects_unknown_country() {
        let input = "Country,Year,Indicator,Gender,Value\nAtlantis,2023,Internet Usage (%),all,50\n";
        let err = read_observations(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Atlantis"));
        assert!(matches!(err, DataLoadError::InvalidField { field: "Country", .. }));
    }

    #[test]
    fn test_rejects_unknown_gender() {
        let input = "Country,Year,Indicator,Gender,Value\nLaos,2023,Internet Usage (%),other,50\n";
        let err = read_observations(input.as_bytes()).unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidField { field: "Gender", .. }));
    }

    #[test]
    fn test_rejects_out_of_range_value() {
        let input = "Country,Year,Indicator,Gender,Value\nLaos,2023,Internet Usage (%),all,100.5\n";
        let err = read_observations(input.as_bytes()).unwrap_err();
        assert!(matches!(err, DataLoadError::OutOfRange { .. }));

        let input = "Country,Year,Indicator,Gender,Value\nLaos,2023,Internet Usage (%),all,NaN\n";
        let err = read_observations(input.as_bytes()).unwrap_err();
        assert!(matches!(err, DataLoadError::OutOfRange { .. }));
    }

    #[test]
    fn test_csv_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();

        let source = CsvFileSource::new(file.path());
        assert_eq!(source.load().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let source = CsvFileSource::new("/nonexistent/observations.csv");
        assert!(matches!(source.load(), Err(DataLoadError::Io { .. })));
    }

    #[test]
    fn test_source_from_config() {
        let mut config = AppConfig::default();
        assert!(source_from_config(&config).describe().contains("sample"));

        config.input.data_csv = Some(PathBuf::from("data/observations.csv"));
        assert!(source_from_config(&config).describe().contains("observations.csv"));
    }
}
