use fxhash::FxHashMap;

use super::stats;

/// A uniformly sampled record of a single channel over `[t0, t0 + len / sample_rate)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    pub name: String,
    pub t0: f64,
    pub sample_rate: f64,
    pub values: Vec<f64>,
}

impl ChannelSeries {
    pub fn new(name: &str, t0: f64, sample_rate: f64, values: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            t0,
            sample_rate,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The half-open span covered by the samples
    pub fn span(&self) -> (f64, f64) {
        (self.t0, self.t0 + self.len() as f64 / self.sample_rate)
    }

    /// Sample times
    pub fn times(&self) -> Vec<f64> {
        (0..self.len())
            .map(|idx| self.t0 + idx as f64 / self.sample_rate)
            .collect()
    }

    pub fn variance(&self) -> f64 {
        stats::variance(&self.values)
    }

    /// Size of the sample buffer in bytes, for logging
    pub fn size_bytes(&self) -> usize {
        self.values.len() * std::mem::size_of::<f64>()
    }
}

/// An insertion-ordered set of channels with lookup by name.
///
/// Insertion order is meaningful: it is the tie-break order used when ranking.
#[derive(Debug, Clone, Default)]
pub struct ChannelSet {
    channels: Vec<ChannelSeries>,
    index: FxHashMap<String, usize>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series. A series with an existing name replaces the old one in place.
    pub fn insert(&mut self, series: ChannelSeries) {
        if let Some(idx) = self.index.get(&series.name) {
            self.channels[*idx] = series;
        } else {
            self.index.insert(series.name.clone(), self.channels.len());
            self.channels.push(series);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ChannelSeries> {
        self.index.get(name).map(|idx| &self.channels[*idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChannelSeries> {
        self.channels.iter()
    }

    pub fn total_size_bytes(&self) -> usize {
        self.channels.iter().map(|c| c.size_bytes()).sum()
    }

    /// Split the set in two, keeping order within each half
    pub fn partition<F>(self, mut keep: F) -> (ChannelSet, ChannelSet)
    where
        F: FnMut(&ChannelSeries) -> bool,
    {
        let mut kept = ChannelSet::new();
        let mut dropped = ChannelSet::new();
        for series in self.channels {
            if keep(&series) {
                kept.insert(series);
            } else {
                dropped.insert(series);
            }
        }
        (kept, dropped)
    }
}

impl FromIterator<ChannelSeries> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = ChannelSeries>>(iter: I) -> Self {
        let mut set = ChannelSet::new();
        for series in iter {
            set.insert(series);
        }
        set
    }
}

impl IntoIterator for ChannelSet {
    type Item = ChannelSeries;
    type IntoIter = std::vec::IntoIter<ChannelSeries>;
    fn into_iter(self) -> Self::IntoIter {
        self.channels.into_iter()
    }
}

/// A zero-mean, unit-variance copy of a channel which remembers how to undo itself.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedSeries {
    pub name: String,
    pub mean: f64,
    pub std: f64,
    pub values: Vec<f64>,
}

impl StandardizedSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Invert the standardization, returning values in the original units
    pub fn descale(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|v| v * self.std + self.mean)
            .collect()
    }

    /// Map an arbitrary standardized value back to the original units
    pub fn descale_value(&self, value: f64) -> f64 {
        value * self.std + self.mean
    }
}
