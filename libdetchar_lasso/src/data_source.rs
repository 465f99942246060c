use std::path::{Path, PathBuf};

use super::error::DataSourceError;
use super::series::{ChannelSeries, ChannelSet};

/// The time-series data collaborator.
///
/// `fetch` returns equal-length, equally sampled series aligned to `[start, end)`.
/// `selector` is passed through untouched (a frame type for frame-based sources).
pub trait DataSource: Sync {
    /// Channels the source can provide, for live channel discovery
    fn available_channels(&self, selector: Option<&str>) -> Result<Vec<String>, DataSourceError>;

    fn fetch(
        &self,
        channels: &[String],
        start: f64,
        end: f64,
        selector: Option<&str>,
    ) -> Result<ChannelSet, DataSourceError>;
}

/// A data source backed by one comma-separated table.
///
/// The header is `time,<channel>,<channel>,...`; each following row is one sample time.
/// Blank lines and lines starting with `#` are ignored. The sample rate is taken from
/// the spacing of the first two rows in the window.
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    path: PathBuf,
}

struct Table {
    header: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl CsvDataSource {
    pub fn new(path: &Path) -> Result<Self, DataSourceError> {
        if !path.exists() {
            return Err(DataSourceError::BadFilePath(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn read_table(&self) -> Result<Table, DataSourceError> {
        let contents = std::fs::read_to_string(&self.path)?;
        let mut lines = contents
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty() && !l.starts_with('#'));

        let header: Vec<String> = match lines.next() {
            Some((_, line)) => line.split(',').map(|s| s.trim().to_string()).collect(),
            None => return Err(DataSourceError::BadFileFormat(1)),
        };
        if header.len() < 2 {
            return Err(DataSourceError::BadFileFormat(1));
        }

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (line_no, line) in lines {
            let entries: Vec<&str> = line.split(',').collect();
            if entries.len() != header.len() {
                return Err(DataSourceError::BadFileFormat(line_no + 1));
            }
            let mut row = Vec::with_capacity(entries.len());
            // The time column must parse; a bad sample only spoils its own channel
            row.push(entries[0].trim().parse::<f64>()?);
            for entry in entries.iter().skip(1) {
                row.push(entry.trim().parse::<f64>().unwrap_or(f64::NAN));
            }
            rows.push(row);
        }
        Ok(Table { header, rows })
    }
}

impl DataSource for CsvDataSource {
    fn available_channels(&self, _selector: Option<&str>) -> Result<Vec<String>, DataSourceError> {
        Ok(self.read_table()?.header.into_iter().skip(1).collect())
    }

    fn fetch(
        &self,
        channels: &[String],
        start: f64,
        end: f64,
        _selector: Option<&str>,
    ) -> Result<ChannelSet, DataSourceError> {
        let table = self.read_table()?;
        let mut columns: Vec<usize> = Vec::with_capacity(channels.len());
        let mut missing: Vec<String> = Vec::new();
        for channel in channels {
            match table.header.iter().skip(1).position(|h| h == channel) {
                Some(col) => columns.push(col + 1),
                None => missing.push(channel.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(DataSourceError::MissingChannels(missing));
        }

        let window: Vec<&Vec<f64>> = table
            .rows
            .iter()
            .filter(|row| row[0] >= start && row[0] < end)
            .collect();
        if window.is_empty() {
            return Err(DataSourceError::EmptyWindow(start, end));
        }
        let t0 = window[0][0];
        let sample_rate = match window.get(1) {
            Some(next) if next[0] > t0 => 1.0 / (next[0] - t0),
            _ => 1.0,
        };

        Ok(channels
            .iter()
            .zip(columns.iter())
            .map(|(name, col)| {
                let values = window.iter().map(|row| row[*col]).collect();
                ChannelSeries::new(name, t0, sample_rate, values)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_table(dir: &Path) -> PathBuf {
        let path = dir.join("data.csv");
        std::fs::write(
            &path,
            "time,L1:RANGE,L1:A,L1:B\n# comment\n0,1.0,2.0,nan\n\
             60,1.5,2.5,3.0\n120,2.0,3.0,3.5\n180,2.5,3.5,4.0\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_fetch_window() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvDataSource::new(&write_table(dir.path())).unwrap();
        assert_eq!(
            source.available_channels(None).unwrap(),
            vec!["L1:RANGE", "L1:A", "L1:B"]
        );
        let set = source
            .fetch(&[String::from("L1:B"), String::from("L1:A")], 60.0, 180.0, None)
            .unwrap();
        assert_eq!(set.names(), vec!["L1:B", "L1:A"]);
        let a = set.get("L1:A").unwrap();
        assert_eq!(a.values, vec![2.5, 3.0]);
        assert_eq!(a.t0, 60.0);
        assert!((a.sample_rate - 1.0 / 60.0).abs() < 1e-15);

        let full = source.fetch(&[String::from("L1:B")], 0.0, 240.0, None).unwrap();
        assert!(full.get("L1:B").unwrap().values[0].is_nan());
    }

    #[test]
    fn test_bad_cells_become_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holes.csv");
        std::fs::write(
            &path,
            "time,L1:A,L1:B,L1:C\n0,1.0,,2.0\n60,1.5,x,\n120,2.0,3.0,4.0\n",
        )
        .unwrap();
        let source = CsvDataSource::new(&path).unwrap();
        let names = vec![String::from("L1:A"), String::from("L1:B"), String::from("L1:C")];
        let set = source.fetch(&names, 0.0, 180.0, None).unwrap();
        assert_eq!(set.get("L1:A").unwrap().values, vec![1.0, 1.5, 2.0]);
        let b = &set.get("L1:B").unwrap().values;
        assert!(b[0].is_nan() && b[1].is_nan());
        assert_eq!(b[2], 3.0);
        assert!(set.get("L1:C").unwrap().values[1].is_nan());

        std::fs::write(&path, "time,L1:A,L1:B\n0,1.0,2.0\n60,1.5\n").unwrap();
        assert!(matches!(
            source.fetch(&names[..1], 0.0, 180.0, None),
            Err(DataSourceError::BadFileFormat(3))
        ));
    }

    #[test]
    fn test_fetch_errors() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvDataSource::new(&write_table(dir.path())).unwrap();
        match source.fetch(
            &[
                String::from("L1:NOPE"),
                String::from("L1:A"),
                String::from("L1:GONE"),
            ],
            0.0,
            240.0,
            None,
        ) {
            Err(DataSourceError::MissingChannels(names)) => {
                assert_eq!(names, vec!["L1:NOPE", "L1:GONE"])
            }
            other => panic!("expected missing channels, got {other:?}"),
        }
        assert!(matches!(
            source.fetch(&[String::from("L1:A")], 1000.0, 2000.0, None),
            Err(DataSourceError::EmptyWindow(_, _))
        ));
        assert!(matches!(
            CsvDataSource::new(&dir.path().join("missing.csv")),
            Err(DataSourceError::BadFilePath(_))
        ));
    }
}
