//! This module provides the `Neuron` structure which composes the `Network` structure.
//!
//! A neuron is a current-based leaky integrate-and-fire unit. Its membrane equation is
//! integrated exactly over one time step for a constant external current, and the spikes it
//! receives are accumulated in a ring buffer whose length covers the synaptic delay.

use serde::{Deserialize, Serialize};

use super::{AMPLITUDE, DELAY_STEPS, DT, POTENTIAL_RESET, REFRACTORY_STEPS, RESISTANCE, TAU, THRESHOLD};

/// Represents a leaky integrate-and-fire neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Neuron {
    // The membrane potential [mV].
    potential: f64,
    // The external current.
    iext: f64,
    // The number of steps left in the refractory period.
    refractory_steps: usize,
    // The number of spikes emitted so far.
    num_spikes: usize,
    // Whether the neuron fired during the last update.
    has_spike: bool,
    // Whether the neuron is inhibitory (excitatory otherwise).
    is_inhibitory: bool,
    // The propagator exp(-dt/tau) of the membrane equation.
    #[serde(skip, default = "Neuron::default_decay")]
    decay: f64,
    // Weighted input spikes, one slot per step of delay (plus the slot being read).
    buffer: Vec<f64>,
}

impl Default for Neuron {
    fn default() -> Self {
        Neuron::new(0.0, 0.0)
    }
}

impl Neuron {
    /// Create a new excitatory neuron with the given external current and initial potential.
    pub fn new(iext: f64, potential: f64) -> Self {
        Neuron {
            potential,
            iext,
            refractory_steps: 0,
            num_spikes: 0,
            has_spike: false,
            is_inhibitory: false,
            decay: Self::default_decay(),
            buffer: vec![0.0; DELAY_STEPS + 1],
        }
    }

    fn default_decay() -> f64 {
        (-DT / TAU).exp()
    }

    /// Returns the membrane potential.
    pub fn potential(&self) -> f64 {
        self.potential
    }

    /// Set the membrane potential.
    pub fn set_potential(&mut self, potential: f64) {
        self.potential = potential;
    }

    /// Returns the external current.
    pub fn iext(&self) -> f64 {
        self.iext
    }

    /// Set the external current.
    pub fn set_iext(&mut self, iext: f64) {
        self.iext = iext;
    }

    /// Returns the number of spikes emitted by the neuron.
    pub fn num_spikes(&self) -> usize {
        self.num_spikes
    }

    /// Returns the number of steps left before the neuron leaves its refractory period.
    pub fn refractory_steps(&self) -> usize {
        self.refractory_steps
    }

    /// Returns whether the neuron fired during its last update.
    pub fn has_spike(&self) -> bool {
        self.has_spike
    }

    /// Returns whether the neuron is inhibitory.
    pub fn is_inhibitory(&self) -> bool {
        self.is_inhibitory
    }

    /// Set the neuron type.
    pub fn set_inhibitory(&mut self, is_inhibitory: bool) {
        self.is_inhibitory = is_inhibitory;
    }

    /// Returns the ring buffer of received spikes.
    pub fn buffer(&self) -> &[f64] {
        &self.buffer
    }

    /// Returns the potential after one step of the membrane equation.
    ///
    /// The equation is solved exactly for a constant current over the step; the spikes read
    /// from the buffer add an instantaneous jump of `AMPLITUDE` per unit of weight.
    ///
    /// # Panics
    /// Panics if `read_box` is not a valid buffer slot.
    pub fn membrane_eq(&self, read_box: usize) -> f64 {
        self.decay * self.potential
            + self.iext * RESISTANCE * (1.0 - self.decay)
            + self.buffer[read_box] * AMPLITUDE
    }

    /// Advance the neuron by one time step, reading its inputs from the `read_box` slot.
    ///
    /// A refractory neuron is clamped to the reset potential. A neuron above threshold fires
    /// and becomes refractory (its potential is left untouched for that step). Otherwise the
    /// membrane equation is integrated. The slot is emptied once consumed, so spikes arriving
    /// during the refractory period are lost.
    ///
    /// # Panics
    /// Panics if `read_box` is not a valid buffer slot.
    pub fn update(&mut self, read_box: usize) {
        self.has_spike = false;

        if self.refractory_steps > 0 {
            self.potential = POTENTIAL_RESET;
            self.refractory_steps -= 1;
        } else if self.potential > THRESHOLD {
            self.has_spike = true;
            self.num_spikes += 1;
            self.refractory_steps = REFRACTORY_STEPS;
        } else {
            self.potential = self.membrane_eq(read_box);
        }

        self.buffer[read_box] = 0.0;
    }

    /// Add a weighted input spike to the `write_box` slot of the buffer.
    ///
    /// # Panics
    /// Panics if `write_box` is not a valid buffer slot.
    pub fn receive(&mut self, weight: f64, write_box: usize) {
        self.buffer[write_box] += weight;
    }
}
