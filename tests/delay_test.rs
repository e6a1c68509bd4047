use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use rusty_brunel::network::{BrunelParams, Network, Topology};
use rusty_brunel::neuron::Neuron;
use rusty_brunel::recorder::MemoryRecorder;
use rusty_brunel::DELAY_STEPS;

/// A driven neuron connected to a silent one.
fn two_neuron_network(inhibitory_source: bool) -> Network {
    let mut rng = StdRng::seed_from_u64(0);
    let neurons = vec![Neuron::new(1.01, 0.0), Neuron::default()];
    let mut network =
        Network::new(neurons, Topology::AllToAll, BrunelParams::default(), &mut rng).unwrap();
    network
        .neuron_mut(0)
        .unwrap()
        .set_inhibitory(inhibitory_source);
    network
}

fn run_to_first_arrival(network: &mut Network) -> MemoryRecorder {
    let mut rng = StdRng::seed_from_u64(0);
    let mut recorder = MemoryRecorder::new();
    network.run_until(93.9, &mut rng, &mut recorder).unwrap();
    recorder
}

#[test]
fn test_spike_is_delivered_after_delay() {
    let mut network = two_neuron_network(false);
    let recorder = run_to_first_arrival(&mut network);

    assert_eq!(recorder.spikes(), &[(924, 0)]);
    assert_eq!(network.clock(), 924 + DELAY_STEPS);
    assert_eq!(network.neuron(0).unwrap().num_spikes(), 1);
    assert_eq!(network.neuron(1).unwrap().potential(), 0.0);

    let read_box = network.read_box();
    let neuron = network.neuron_mut(1).unwrap();
    neuron.update(read_box);
    assert_relative_eq!(neuron.potential(), 0.1);
}

#[test]
fn test_inhibitory_spike_is_delivered_after_delay() {
    let mut network = two_neuron_network(true);
    run_to_first_arrival(&mut network);

    assert_eq!(network.neuron(0).unwrap().num_spikes(), 1);
    assert_eq!(network.neuron(1).unwrap().potential(), 0.0);

    let read_box = network.read_box();
    let neuron = network.neuron_mut(1).unwrap();
    neuron.update(read_box);
    assert_relative_eq!(neuron.potential(), -0.5);
}

#[test]
fn test_spike_does_not_arrive_early() {
    let mut network = two_neuron_network(false);
    let mut rng = StdRng::seed_from_u64(0);
    let mut recorder = MemoryRecorder::new();
    network.run_until(93.8, &mut rng, &mut recorder).unwrap();

    let read_box = network.read_box();
    let neuron = network.neuron_mut(1).unwrap();
    neuron.update(read_box);
    assert_eq!(neuron.potential(), 0.0);
}
