//! Spike recording during a simulation.
//!
//! The network reports every spike and the spike count of every step to a [`SpikeRecorder`].
//! Two recorders are provided: [`MemoryRecorder`] keeps everything in memory, and
//! [`GdfRecorder`] streams the spike log (GDF format, one `step<TAB>neuron` row per spike,
//! with 1-based neuron ids) and the population activity trace to writers.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::SNNError;
use crate::spike_log::{SpikeLog, SpikeRecord};
use crate::DT;

/// File name of the spike log written by [`GdfRecorder::create`].
pub const SPIKES_FILE: &str = "spikes.gdf";
/// File name of the population activity trace written by [`GdfRecorder::create`].
pub const POPULATION_FILE: &str = "spikes2.txt";

/// A sink for the spikes emitted during a simulation.
pub trait SpikeRecorder {
    /// Record a spike emitted by `neuron_id` (0-based) at simulation step `step`.
    fn record_spike(&mut self, step: usize, neuron_id: usize) -> Result<(), SNNError>;

    /// Record the total number of spikes emitted during simulation step `step`.
    fn record_step(&mut self, _step: usize, _num_spikes: usize) -> Result<(), SNNError> {
        Ok(())
    }
}

/// Records spikes and population activity in memory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryRecorder {
    spikes: Vec<(usize, usize)>,
    population: Vec<usize>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded `(step, neuron_id)` pairs, in emission order.
    pub fn spikes(&self) -> &[(usize, usize)] {
        &self.spikes
    }

    /// The number of spikes of each recorded step.
    pub fn population(&self) -> &[usize] {
        &self.population
    }

    /// Convert the recorded spikes to a spike log, as it would be read back from a GDF file.
    pub fn to_spike_log(&self) -> SpikeLog {
        SpikeLog::from_records(
            self.spikes
                .iter()
                .map(|&(step, neuron_id)| SpikeRecord::new(step as f64, neuron_id + 1))
                .collect(),
        )
    }
}

impl SpikeRecorder for MemoryRecorder {
    fn record_spike(&mut self, step: usize, neuron_id: usize) -> Result<(), SNNError> {
        self.spikes.push((step, neuron_id));
        Ok(())
    }

    fn record_step(&mut self, _step: usize, num_spikes: usize) -> Result<(), SNNError> {
        self.population.push(num_spikes);
        Ok(())
    }
}

/// Writes the spike log and the population activity trace as text.
pub struct GdfRecorder<W: Write> {
    spikes: W,
    population: W,
}

impl GdfRecorder<BufWriter<File>> {
    /// Create the spike log and population trace files in `dir`.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self, SNNError> {
        let dir = dir.as_ref();
        let spikes = File::create(dir.join(SPIKES_FILE))
            .map_err(|e| SNNError::IOError(format!("{}: {}", dir.join(SPIKES_FILE).display(), e)))?;
        let population = File::create(dir.join(POPULATION_FILE)).map_err(|e| {
            SNNError::IOError(format!("{}: {}", dir.join(POPULATION_FILE).display(), e))
        })?;
        GdfRecorder::new(BufWriter::new(spikes), BufWriter::new(population))
    }
}

impl<W: Write> GdfRecorder<W> {
    /// Wrap two writers; the header of the population trace is written immediately.
    pub fn new(spikes: W, mut population: W) -> Result<Self, SNNError> {
        writeln!(population, "dt,spikes")?;
        Ok(GdfRecorder { spikes, population })
    }

    /// Flush both writers and give them back.
    pub fn finish(mut self) -> Result<(W, W), SNNError> {
        self.spikes.flush()?;
        self.population.flush()?;
        Ok((self.spikes, self.population))
    }
}

impl<W: Write> SpikeRecorder for GdfRecorder<W> {
    fn record_spike(&mut self, step: usize, neuron_id: usize) -> Result<(), SNNError> {
        writeln!(self.spikes, "{}\t{}", step, neuron_id + 1)?;
        Ok(())
    }

    fn record_step(&mut self, step: usize, num_spikes: usize) -> Result<(), SNNError> {
        writeln!(self.population, "{:.1} {}", step as f64 * DT, num_spikes)?;
        Ok(())
    }
}
