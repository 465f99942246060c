use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::cluster::ClusterEntry;
use super::error::TableWriterError;
use super::ranking::RegressionResult;

pub const SELECTED_TABLE: &str = "SELECTED";
pub const ZEROED_TABLE: &str = "ZEROED";
pub const FLAT_TABLE: &str = "FLAT";
pub const BAD_TABLE: &str = "BAD";

/// Write channels and their Lasso coefficients, one per line
pub fn write_coefficient_table(
    path: &Path,
    results: &[RegressionResult],
) -> Result<(), TableWriterError> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "channel\tcoefficient")?;
    for result in results {
        writeln!(w, "{}\t{:e}", result.channel, result.coefficient)?;
    }
    w.flush()?;
    Ok(())
}

/// Write a bare list of channel names
pub fn write_channel_list(path: &Path, channels: &[String]) -> Result<(), TableWriterError> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "channel")?;
    for channel in channels {
        writeln!(w, "{channel}")?;
    }
    w.flush()?;
    Ok(())
}

/// Write every member of a cluster, not just the displayed ones
pub fn write_cluster_table(path: &Path, entry: &ClusterEntry) -> Result<(), TableWriterError> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "# anchor: {}", entry.anchor)?;
    writeln!(w, "channel\tcorrelation")?;
    for member in entry.members.iter() {
        writeln!(w, "{}\t{:.6}", member.channel, member.correlation)?;
    }
    w.flush()?;
    Ok(())
}
