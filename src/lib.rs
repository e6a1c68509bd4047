//! This crate provides tools for simulating Brunel's balanced network of
//! leaky integrate-and-fire neurons and for analysing the resulting spike logs.
//!
//! # Simulating Networks
//!
//! ```rust
//! use rusty_brunel::network::{BrunelParams, Network, Topology};
//! use rusty_brunel::neuron::Neuron;
//! use rusty_brunel::recorder::MemoryRecorder;
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let neurons = vec![Neuron::default(); 100];
//! let mut network = Network::new(neurons, Topology::Brunel, BrunelParams::default(), &mut rng).unwrap();
//!
//! // 20 inhibitory neurons, each neuron receives 8 excitatory and 2 inhibitory inputs
//! assert_eq!(network.num_inhibitory(), 20);
//! assert_eq!(network.num_excitatory_connections(), 8);
//! assert_eq!(network.num_inhibitory_connections(), 2);
//!
//! // Simulate 10 ms of activity
//! let mut recorder = MemoryRecorder::new();
//! network.run_until(10.0, &mut rng, &mut recorder).unwrap();
//! assert_eq!(network.clock(), 100);
//! ```
//!
//! # Analysing Spike Logs
//!
//! ```rust
//! use rusty_brunel::spike_log::SpikeLog;
//! use rusty_brunel::histogram::Histogram;
//!
//! let log = SpikeLog::parse("1000\t3\n1010\t72\n1500\t12\n".as_bytes()).unwrap();
//! let selected = log.select_neurons_below(50).scale_time(0.1);
//! assert_eq!(selected.times(), vec![100.0, 150.0]);
//!
//! let histogram = Histogram::new(&selected.times(), 5).unwrap();
//! assert_eq!(histogram.counts(), &[1, 0, 0, 0, 1]);
//! ```

pub mod config;
pub mod error;
pub mod figure;
pub mod histogram;
pub mod network;
pub mod neuron;
pub mod recorder;
pub mod spike_log;

/// The simulation time step [ms].
pub const DT: f64 = 0.1;
/// The membrane potential above which a neuron fires [mV].
pub const THRESHOLD: f64 = 20.0;
/// The membrane potential held during the refractory period [mV].
pub const POTENTIAL_RESET: f64 = 0.0;
/// The membrane resistance.
pub const RESISTANCE: f64 = 20.0;
/// The membrane capacity.
pub const CAPACITY: f64 = 1.0;
/// The membrane time constant [ms].
pub const TAU: f64 = RESISTANCE * CAPACITY;
/// The refractory period [ms].
pub const REFRACTORY_PERIOD: f64 = 2.0;
/// The refractory period expressed in simulation steps.
pub const REFRACTORY_STEPS: usize = 20;
/// The post-synaptic potential amplitude of one excitatory spike [mV].
pub const AMPLITUDE: f64 = 0.1;
/// The synaptic transmission delay [ms].
pub const DELAY: f64 = 1.5;
/// The synaptic transmission delay expressed in simulation steps.
pub const DELAY_STEPS: usize = 15;
/// Minimum number of neurons to update the network in parallel.
pub const MIN_PARALLEL_NEURONS: usize = 100;
