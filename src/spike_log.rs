//! Spike-time logs: plain-text tables where each row holds an event time and the index of
//! the neuron that fired.
//!
//! # Examples
//!
//! ```rust
//! use rusty_brunel::spike_log::SpikeLog;
//!
//! let log = SpikeLog::parse("# time neuron\n12 3\n15 64\n20 3\n".as_bytes()).unwrap();
//! assert_eq!(log.len(), 3);
//!
//! // Keep the first neurons only and express the times in ms
//! let selected = log.select_neurons_below(50).scale_time(0.1);
//! assert_eq!(selected.neurons(), vec![3, 3]);
//! assert_eq!(selected.time_range(), Some((1.2000000000000002, 2.0)));
//! ```
use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::SNNError;

/// The largest neuron index accepted in a spike log.
pub const MAX_NEURON_INDEX: usize = u32::MAX as usize;

/// A single event of a spike log.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SpikeRecord {
    /// The time of the event, in the unit of the log.
    pub time: f64,
    /// The index of the neuron that fired.
    pub neuron: usize,
}

impl SpikeRecord {
    pub fn new(time: f64, neuron: usize) -> Self {
        SpikeRecord { time, neuron }
    }
}

/// An ordered collection of spike records.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct SpikeLog {
    records: Vec<SpikeRecord>,
}

impl SpikeLog {
    /// Creates a spike log from records, keeping their order.
    pub fn from_records(records: Vec<SpikeRecord>) -> Self {
        SpikeLog { records }
    }

    /// Read a whitespace-delimited spike log.
    ///
    /// Blank lines and lines starting with `#` are skipped. The first column is the time, the
    /// second the neuron index (written as a non-negative integer, possibly with a zero
    /// fractional part); further columns are ignored.
    pub fn parse<R: Read>(reader: R) -> Result<Self, SNNError> {
        let mut records = vec![];
        for (i, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            records.push(parse_record(line, i + 1)?);
        }
        Ok(SpikeLog { records })
    }

    /// Load a spike log from a file. See [`SpikeLog::parse`] for the format.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SNNError::IOError(format!("{}: {}", path.display(), e)))?;
        let log = SpikeLog::parse(file)?;
        log::info!("Loaded {} spikes from {}", log.len(), path.display());
        Ok(log)
    }

    /// Save the spike log in the format read by [`SpikeLog::load`].
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let mut writer = BufWriter::new(File::create(path)?);
        for record in self.records.iter() {
            writeln!(writer, "{}\t{}", record.time, record.neuron)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn records(&self) -> &[SpikeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The times of the events.
    pub fn times(&self) -> Vec<f64> {
        self.records.iter().map(|record| record.time).collect()
    }

    /// The neuron indices of the events.
    pub fn neurons(&self) -> Vec<usize> {
        self.records.iter().map(|record| record.neuron).collect()
    }

    /// The earliest and latest event times, if any.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        match self
            .records
            .iter()
            .map(|record| record.time)
            .minmax_by(|a, b| a.total_cmp(b))
        {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(t) => Some((t, t)),
            MinMaxResult::MinMax(min, max) => Some((min, max)),
        }
    }

    /// The records satisfying the predicate, in their original order.
    pub fn select<F: Fn(&SpikeRecord) -> bool>(&self, predicate: F) -> Self {
        SpikeLog {
            records: self
                .records
                .iter()
                .filter(|&record| predicate(record))
                .cloned()
                .collect(),
        }
    }

    /// The records of the neurons whose index is strictly below `max_neuron`.
    pub fn select_neurons_below(&self, max_neuron: usize) -> Self {
        self.select(|record| record.neuron < max_neuron)
    }

    /// The records whose time lies in the closed interval `[start, end]`.
    pub fn within(&self, start: f64, end: f64) -> Self {
        self.select(|record| record.time >= start && record.time <= end)
    }

    /// Multiply every event time by `factor`, e.g., to convert simulation steps to ms.
    pub fn scale_time(mut self, factor: f64) -> Self {
        self.records.iter_mut().for_each(|record| record.time *= factor);
        self
    }
}

fn parse_record(line: &str, line_number: usize) -> Result<SpikeRecord, SNNError> {
    let invalid = |reason: String| SNNError::InvalidSpikeLog {
        line: line_number,
        reason,
    };

    let mut fields = line.split_whitespace();
    let (time, neuron) = match (fields.next(), fields.next()) {
        (Some(time), Some(neuron)) => (time, neuron),
        _ => return Err(invalid("expected two columns".to_string())),
    };

    let time: f64 = time
        .parse()
        .map_err(|_| invalid(format!("invalid time {:?}", time)))?;
    if !time.is_finite() {
        return Err(invalid(format!("time must be finite, got {}", time)));
    }

    let index = match neuron.parse::<usize>() {
        Ok(index) if index <= MAX_NEURON_INDEX => Some(index),
        Ok(_) => None,
        Err(_) => match neuron.parse::<f64>() {
            Ok(value)
                if value >= 0.0 && value.fract() == 0.0 && value <= MAX_NEURON_INDEX as f64 =>
            {
                Some(value as usize)
            }
            _ => None,
        },
    };
    let neuron = index.ok_or_else(|| invalid(format!("invalid neuron index {:?}", neuron)))?;

    Ok(SpikeRecord { time, neuron })
}
