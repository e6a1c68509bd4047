//! Network-related structures.
//!
//! A [`Network`] owns its neurons and the outgoing connections of each of them. All neurons
//! share a clock and a pair of ring buffer indices: spikes emitted at step `t` are written
//! `DELAY_STEPS` slots ahead of the slot read at step `t`, hence received at `t + DELAY_STEPS`.
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::Poisson;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::SNNError;
use crate::neuron::Neuron;
use crate::recorder::SpikeRecorder;
use crate::{AMPLITUDE, DELAY_STEPS, DT, MIN_PARALLEL_NEURONS, TAU, THRESHOLD};

/// Smallest network for which the Brunel connectivity is used by [`Topology::for_size`].
pub const MIN_BRUNEL_NEURONS: usize = 50;
/// Fraction of excitatory neurons (and of excitatory inputs per neuron).
pub const EXCITATORY_FRACTION: f64 = 0.8;
/// Fraction of inhibitory neurons (and of inhibitory inputs per neuron).
pub const INHIBITORY_FRACTION: f64 = 0.2;
/// Tolerance used when converting durations to a number of steps.
const STEP_TOLERANCE: f64 = 1e-9;

/// The connectivity of a network.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Every neuron projects to every other neuron, without external input.
    AllToAll,
    /// Sparse random connectivity with 20% inhibitory neurons and external Poisson input.
    Brunel,
}

impl Topology {
    /// Small networks are fully connected, larger ones follow Brunel's model.
    pub fn for_size(num_neurons: usize) -> Self {
        if num_neurons < MIN_BRUNEL_NEURONS {
            Topology::AllToAll
        } else {
            Topology::Brunel
        }
    }
}

/// Parameters of Brunel's balanced network model.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct BrunelParams {
    /// Relative strength of inhibitory synapses.
    #[serde(default = "BrunelParams::default_g")]
    pub g: f64,
    /// External drive relative to the rate needed to reach threshold.
    #[serde(default = "BrunelParams::default_eta")]
    pub eta: f64,
    /// Fraction of the network projecting to each neuron.
    #[serde(default = "BrunelParams::default_connection_fraction")]
    pub connection_fraction: f64,
}

impl BrunelParams {
    fn default_g() -> f64 {
        5.0
    }
    fn default_eta() -> f64 {
        2.0
    }
    fn default_connection_fraction() -> f64 {
        0.1
    }

    /// Returns an error if any parameter is out of its valid range.
    pub fn validate(&self) -> Result<(), SNNError> {
        if !self.g.is_finite() || self.g < 0.0 {
            return Err(SNNError::InvalidParameter(format!(
                "g must be finite and non-negative, got {}",
                self.g
            )));
        }
        if !self.eta.is_finite() || self.eta <= 0.0 {
            return Err(SNNError::InvalidParameter(format!(
                "eta must be finite and positive, got {}",
                self.eta
            )));
        }
        if !(self.connection_fraction > 0.0 && self.connection_fraction <= 1.0) {
            return Err(SNNError::InvalidParameter(format!(
                "connection fraction must be in (0, 1], got {}",
                self.connection_fraction
            )));
        }
        Ok(())
    }

    /// The external input frequency per external synapse [1/ms].
    pub fn external_rate(&self) -> f64 {
        THRESHOLD * self.eta / (AMPLITUDE * TAU)
    }

    /// The mean number of external spikes received by a neuron in one step.
    pub fn poisson_mean(&self) -> f64 {
        DT * self.external_rate()
    }
}

impl Default for BrunelParams {
    fn default() -> Self {
        BrunelParams {
            g: Self::default_g(),
            eta: Self::default_eta(),
            connection_fraction: Self::default_connection_fraction(),
        }
    }
}

/// Converts a duration [ms] into a number of simulation steps.
pub fn num_steps(duration: f64) -> usize {
    (duration / DT + STEP_TOLERANCE).floor().max(0.0) as usize
}

/// A network of leaky integrate-and-fire neurons with delayed synaptic transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    neurons: Vec<Neuron>,
    /// The targets of each source neuron (multapses allowed).
    targets: Vec<Vec<usize>>,
    topology: Topology,
    params: BrunelParams,
    read_box: usize,
    write_box: usize,
    clock: usize,
    #[serde(skip)]
    poisson: Option<Poisson<f64>>,
}

impl Network {
    /// Create a network from the given neurons and wire it according to the topology.
    ///
    /// With [`Topology::Brunel`], the first fifth of the neurons become inhibitory and each
    /// neuron draws its excitatory and inhibitory sources uniformly at random.
    pub fn new<R: Rng>(
        mut neurons: Vec<Neuron>,
        topology: Topology,
        params: BrunelParams,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        if neurons.is_empty() {
            return Err(SNNError::InvalidParameter(
                "A network needs at least one neuron".to_string(),
            ));
        }
        params.validate()?;

        let num_neurons = neurons.len();
        let mut targets = vec![vec![]; num_neurons];

        match topology {
            Topology::AllToAll => {
                for (source_id, source_targets) in targets.iter_mut().enumerate() {
                    source_targets.extend((0..num_neurons).filter(|&id| id != source_id));
                }
            }
            Topology::Brunel => {
                let num_inhibitory = num_neurons / 5;
                let num_excitatory = num_neurons - num_inhibitory;
                neurons
                    .iter_mut()
                    .take(num_inhibitory)
                    .for_each(|neuron| neuron.set_inhibitory(true));

                let num_inh_inputs = num_connections(num_neurons, &params, INHIBITORY_FRACTION);
                let num_exc_inputs = num_connections(num_neurons, &params, EXCITATORY_FRACTION);
                if num_inh_inputs > 0 && num_inhibitory == 0 {
                    return Err(SNNError::InvalidParameter(
                        "Inhibitory inputs requested without inhibitory neurons".to_string(),
                    ));
                }

                let inh_dist = Uniform::new(0, num_inhibitory.max(1));
                let exc_dist = Uniform::new(num_inhibitory, num_inhibitory + num_excitatory);
                for target_id in 0..num_neurons {
                    for _ in 0..num_inh_inputs {
                        targets[inh_dist.sample(rng)].push(target_id);
                    }
                    for _ in 0..num_exc_inputs {
                        targets[exc_dist.sample(rng)].push(target_id);
                    }
                }
            }
        }

        let mut network = Network {
            neurons,
            targets,
            topology,
            params,
            read_box: 0,
            write_box: DELAY_STEPS,
            clock: 0,
            poisson: None,
        };
        network.init_poisson()?;

        log::info!(
            "Network created: {} neurons ({} inhibitory), {} connections, {:?} topology",
            network.num_neurons(),
            network.num_inhibitory(),
            network.num_connections(),
            network.topology
        );
        Ok(network)
    }

    fn init_poisson(&mut self) -> Result<(), SNNError> {
        self.poisson = match self.topology {
            Topology::Brunel => Some(Poisson::new(self.params.poisson_mean()).map_err(|e| {
                SNNError::InvalidParameter(format!("Invalid external input distribution: {}", e))
            })?),
            Topology::AllToAll => None,
        };
        Ok(())
    }

    /// Returns a slice of the neurons of the network.
    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    /// A reference to a specific neuron in the network.
    /// Returns `None` if the neuron is not found.
    pub fn neuron(&self, neuron_id: usize) -> Option<&Neuron> {
        self.neurons.get(neuron_id)
    }

    /// A mutable reference to a specific neuron in the network.
    /// Returns `None` if the neuron is not found.
    pub fn neuron_mut(&mut self, neuron_id: usize) -> Option<&mut Neuron> {
        self.neurons.get_mut(neuron_id)
    }

    /// The targets of a neuron. Returns an error if the neuron is not found.
    pub fn targets(&self, source_id: usize) -> Result<&[usize], SNNError> {
        self.targets
            .get(source_id)
            .map(|targets| &targets[..])
            .ok_or_else(|| SNNError::OutOfBounds(format!("Neuron {} not found", source_id)))
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn params(&self) -> &BrunelParams {
        &self.params
    }

    /// The number of neurons in the network.
    pub fn num_neurons(&self) -> usize {
        self.neurons.len()
    }

    /// The number of inhibitory neurons in the network.
    pub fn num_inhibitory(&self) -> usize {
        self.neurons.iter().filter(|neuron| neuron.is_inhibitory()).count()
    }

    /// The number of excitatory neurons in the network.
    pub fn num_excitatory(&self) -> usize {
        self.num_neurons() - self.num_inhibitory()
    }

    /// The number of excitatory inputs of each neuron in Brunel's model.
    pub fn num_excitatory_connections(&self) -> usize {
        num_connections(self.num_neurons(), &self.params, EXCITATORY_FRACTION)
    }

    /// The number of inhibitory inputs of each neuron in Brunel's model.
    pub fn num_inhibitory_connections(&self) -> usize {
        num_connections(self.num_neurons(), &self.params, INHIBITORY_FRACTION)
    }

    /// The number of external synapses of each neuron, equal to the number of excitatory inputs.
    pub fn num_external_connections(&self) -> usize {
        self.num_excitatory_connections()
    }

    /// The total number of connections in the network.
    pub fn num_connections(&self) -> usize {
        self.targets.iter().map(|targets| targets.len()).sum()
    }

    /// The index of the buffer slot read at the current step.
    pub fn read_box(&self) -> usize {
        self.read_box
    }

    /// The index of the buffer slot written at the current step.
    pub fn write_box(&self) -> usize {
        self.write_box
    }

    /// The number of steps simulated so far.
    pub fn clock(&self) -> usize {
        self.clock
    }

    /// The simulated time [ms].
    pub fn time(&self) -> f64 {
        self.clock as f64 * DT
    }

    /// Move both buffer indices one slot forward, wrapping around the ring.
    pub fn update_buffer_index(&mut self) {
        let size = DELAY_STEPS + 1;
        self.read_box = (self.read_box + 1) % size;
        self.write_box = (self.write_box + 1) % size;
    }

    /// The total number of spikes emitted by the neurons.
    pub fn total_spikes(&self) -> usize {
        self.neurons.iter().map(|neuron| neuron.num_spikes()).sum()
    }

    /// The mean firing rate of a neuron over the simulated time [Hz].
    pub fn mean_rate(&self) -> f64 {
        if self.clock == 0 {
            return 0.0;
        }
        self.total_spikes() as f64 / (self.num_neurons() as f64 * self.time() * 1e-3)
    }

    /// Simulate one time step.
    pub fn step<R: Rng, W: SpikeRecorder>(
        &mut self,
        rng: &mut R,
        recorder: &mut W,
    ) -> Result<(), SNNError> {
        let read_box = self.read_box;
        let write_box = self.write_box;

        if self.num_neurons() >= MIN_PARALLEL_NEURONS {
            self.neurons
                .par_iter_mut()
                .for_each(|neuron| neuron.update(read_box));
        } else {
            self.neurons
                .iter_mut()
                .for_each(|neuron| neuron.update(read_box));
        }

        let mut num_spikes = 0;
        for source_id in 0..self.neurons.len() {
            if let Some(poisson) = &self.poisson {
                let external_spikes: f64 = poisson.sample(rng);
                self.neurons[source_id].receive(external_spikes, write_box);
            }

            if self.neurons[source_id].has_spike() {
                num_spikes += 1;
                recorder.record_spike(self.clock, source_id)?;

                let weight = if self.neurons[source_id].is_inhibitory() {
                    -self.params.g
                } else {
                    1.0
                };
                for &target_id in self.targets[source_id].iter() {
                    self.neurons[target_id].receive(weight, write_box);
                }
            }
        }

        self.update_buffer_index();
        recorder.record_step(self.clock, num_spikes)?;
        self.clock += 1;
        Ok(())
    }

    /// Run the simulation for the specified number of steps.
    pub fn run<R: Rng, W: SpikeRecorder>(
        &mut self,
        num_steps: usize,
        rng: &mut R,
        recorder: &mut W,
    ) -> Result<(), SNNError> {
        log::info!("Starting simulation of {} steps...", num_steps);

        let log_interval = (num_steps / 100).max(1);
        for i in 0..num_steps {
            self.step(rng, recorder)?;

            if (i + 1) % log_interval == 0 {
                log::debug!(
                    "Simulation progress: {:.0}% (Time: {:.1} ms, {} spikes)",
                    100.0 * (i + 1) as f64 / num_steps as f64,
                    self.time(),
                    self.total_spikes()
                );
            }
        }

        log::info!(
            "Simulation completed successfully! {} spikes, mean rate {:.2} Hz",
            self.total_spikes(),
            self.mean_rate()
        );
        Ok(())
    }

    /// Run the simulation until the clock reaches the stop time [ms].
    pub fn run_until<R: Rng, W: SpikeRecorder>(
        &mut self,
        stop_time: f64,
        rng: &mut R,
        recorder: &mut W,
    ) -> Result<(), SNNError> {
        if !stop_time.is_finite() {
            return Err(SNNError::InvalidParameter(format!(
                "stop time must be finite, got {}",
                stop_time
            )));
        }
        let remaining = num_steps(stop_time).saturating_sub(self.clock);
        self.run(remaining, rng, recorder)
    }

    /// Save the network as JSON.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    /// Load a network saved with [`Network::save_to`].
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Network, SNNError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut network: Network =
            serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))?;

        network.params.validate()?;
        let size = DELAY_STEPS + 1;
        if network.read_box >= size
            || network.write_box != (network.read_box + DELAY_STEPS) % size
        {
            return Err(SNNError::OutOfBounds(format!(
                "Invalid buffer indices: read box {}, write box {}",
                network.read_box, network.write_box
            )));
        }
        if let Some(neuron_id) = network
            .neurons
            .iter()
            .position(|neuron| neuron.buffer().len() != size)
        {
            return Err(SNNError::OutOfBounds(format!(
                "The buffer of neuron {} does not have {} slots",
                neuron_id, size
            )));
        }
        if network.targets.len() != network.neurons.len()
            || network
                .targets
                .iter()
                .flatten()
                .any(|&target_id| target_id >= network.neurons.len())
        {
            return Err(SNNError::OutOfBounds(
                "Connection to a neuron outside the network".to_string(),
            ));
        }
        network.init_poisson()?;
        Ok(network)
    }
}

/// The number of inputs of each neuron coming from a population making up `fraction` of the network.
fn num_connections(num_neurons: usize, params: &BrunelParams, fraction: f64) -> usize {
    (num_neurons as f64 * params.connection_fraction * fraction + STEP_TOLERANCE).floor() as usize
}
