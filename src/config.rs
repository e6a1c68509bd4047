//! Configuration of simulations and figures, stored as JSON.
//!
//! Every field has a default so that partial configuration files are accepted.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::SNNError;
use crate::network::{BrunelParams, Topology};
use crate::DT;

/// Where the rate histogram bins are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HistogramRange {
    /// Over the range of the selected spike times.
    #[default]
    Data,
    /// Over the displayed time window.
    Window,
}

/// Parameters of a network simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "SimulationConfig::default_num_neurons")]
    pub num_neurons: usize,
    /// The end of the simulation [ms].
    #[serde(default = "SimulationConfig::default_stop_time")]
    pub stop_time: f64,
    #[serde(default = "SimulationConfig::default_seed")]
    pub seed: u64,
    /// The external current injected in every neuron.
    #[serde(default)]
    pub iext: f64,
    /// The connectivity; chosen from the network size when absent.
    #[serde(default)]
    pub topology: Option<Topology>,
    #[serde(default)]
    pub params: BrunelParams,
    /// Whether to render a figure of the simulated activity.
    #[serde(default = "SimulationConfig::default_plot")]
    pub plot: bool,
    #[serde(default)]
    pub figure: FigureConfig,
}

impl SimulationConfig {
    fn default_num_neurons() -> usize {
        12_500
    }
    fn default_stop_time() -> f64 {
        500.0
    }
    fn default_seed() -> u64 {
        42
    }
    fn default_plot() -> bool {
        true
    }

    /// The topology of the simulated network.
    pub fn topology(&self) -> Topology {
        self.topology
            .unwrap_or_else(|| Topology::for_size(self.num_neurons))
    }

    /// The figure of the simulated activity, with the time window cut at the stop time.
    ///
    /// A window starting after the stop time is replaced by `[0, stop_time]`.
    pub fn figure_config(&self) -> FigureConfig {
        let mut figure = FigureConfig {
            network_size: Some(self.num_neurons),
            ..self.figure.clone()
        };
        figure.window_end = figure.window_end.min(self.stop_time);
        if figure.window_start >= figure.window_end {
            figure.window_start = 0.0;
        }
        figure
    }

    pub fn validate(&self) -> Result<(), SNNError> {
        if self.num_neurons == 0 {
            return Err(SNNError::InvalidParameter(
                "The number of neurons must be positive".to_string(),
            ));
        }
        if !(self.stop_time.is_finite() && self.stop_time > 0.0) {
            return Err(SNNError::InvalidParameter(format!(
                "The stop time must be positive, got {}",
                self.stop_time
            )));
        }
        if !self.iext.is_finite() {
            return Err(SNNError::InvalidParameter(format!(
                "The external current must be finite, got {}",
                self.iext
            )));
        }
        self.params.validate()?;
        if self.plot {
            self.figure_config().validate()?;
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            num_neurons: Self::default_num_neurons(),
            stop_time: Self::default_stop_time(),
            seed: Self::default_seed(),
            iext: 0.0,
            topology: None,
            params: BrunelParams::default(),
            plot: Self::default_plot(),
            figure: FigureConfig::default(),
        }
    }
}

/// Layout of the raster and rate figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureConfig {
    /// Start of the displayed time window [ms].
    #[serde(default = "FigureConfig::default_window_start")]
    pub window_start: f64,
    /// End of the displayed time window [ms].
    #[serde(default = "FigureConfig::default_window_end")]
    pub window_end: f64,
    /// Only the neurons with a smaller index are displayed.
    #[serde(default = "FigureConfig::default_max_neuron")]
    pub max_neuron: usize,
    /// Factor converting the logged times to ms.
    #[serde(default = "FigureConfig::default_time_scale")]
    pub time_scale: f64,
    #[serde(default = "FigureConfig::default_bins")]
    pub bins: usize,
    /// Upper limit of the histogram axis.
    #[serde(default = "FigureConfig::default_rate_ylim")]
    pub rate_ylim: f64,
    /// The id of the first neuron in the logs (1 for the GDF files written by a simulation).
    #[serde(default = "FigureConfig::default_first_neuron_id")]
    pub first_neuron_id: usize,
    /// The number of neurons in the logged network, when known.
    #[serde(default)]
    pub network_size: Option<usize>,
    #[serde(default)]
    pub histogram_range: HistogramRange,
    #[serde(default = "FigureConfig::default_width")]
    pub width: u32,
    #[serde(default = "FigureConfig::default_height")]
    pub height: u32,
}

impl FigureConfig {
    fn default_window_start() -> f64 {
        100.0
    }
    fn default_window_end() -> f64 {
        300.0
    }
    fn default_max_neuron() -> usize {
        50
    }
    fn default_first_neuron_id() -> usize {
        1
    }
    fn default_time_scale() -> f64 {
        DT
    }
    fn default_bins() -> usize {
        50
    }
    fn default_rate_ylim() -> f64 {
        70.0
    }
    fn default_width() -> u32 {
        1200
    }
    fn default_height() -> u32 {
        900
    }

    /// The number of neurons whose ids are kept by the `max_neuron` filter.
    pub fn num_neurons(&self) -> usize {
        let end = match self.network_size {
            Some(network_size) => self.max_neuron.min(self.first_neuron_id + network_size),
            None => self.max_neuron,
        };
        end.saturating_sub(self.first_neuron_id)
    }

    pub fn validate(&self) -> Result<(), SNNError> {
        if !(self.window_start.is_finite()
            && self.window_end.is_finite()
            && self.window_start < self.window_end)
        {
            return Err(SNNError::InvalidParameter(format!(
                "Invalid time window [{}, {}]",
                self.window_start, self.window_end
            )));
        }
        if self.num_neurons() == 0 {
            return Err(SNNError::InvalidParameter(format!(
                "No neuron id in [{}, {}) can be displayed",
                self.first_neuron_id, self.max_neuron
            )));
        }
        if !(self.time_scale.is_finite() && self.time_scale > 0.0) {
            return Err(SNNError::InvalidParameter(format!(
                "The time scale must be positive, got {}",
                self.time_scale
            )));
        }
        if self.bins == 0 {
            return Err(SNNError::InvalidParameter(
                "The histogram needs at least one bin".to_string(),
            ));
        }
        if !(self.rate_ylim.is_finite() && self.rate_ylim > 0.0) {
            return Err(SNNError::InvalidParameter(format!(
                "The histogram axis limit must be positive, got {}",
                self.rate_ylim
            )));
        }
        if self.width < 200 || self.height < 200 {
            return Err(SNNError::InvalidParameter(format!(
                "The figure is too small: {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for FigureConfig {
    fn default() -> Self {
        FigureConfig {
            window_start: Self::default_window_start(),
            window_end: Self::default_window_end(),
            max_neuron: Self::default_max_neuron(),
            time_scale: Self::default_time_scale(),
            first_neuron_id: Self::default_first_neuron_id(),
            network_size: None,
            bins: Self::default_bins(),
            rate_ylim: Self::default_rate_ylim(),
            histogram_range: HistogramRange::default(),
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

/// Load a configuration from a JSON file.
pub fn load<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, SNNError> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| SNNError::IOError(format!("{}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| SNNError::InvalidParameter(format!("{}: {}", path.display(), e)))
}

/// Save a configuration as pretty JSON.
pub fn save_to<T: Serialize, P: AsRef<Path>>(config: &T, path: P) -> Result<(), SNNError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, config)
        .map_err(|e| SNNError::IOError(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_simulation_config() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"num_neurons": 100, "params": {"g": 4.5}}"#).unwrap();
        assert_eq!(config.num_neurons, 100);
        assert_eq!(config.stop_time, 500.0);
        assert_eq!(config.params.g, 4.5);
        assert_eq!(config.params.eta, 2.0);
        assert_eq!(config.topology(), Topology::Brunel);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_topology_override() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"num_neurons": 100, "topology": "all-to-all"}"#).unwrap();
        assert_eq!(config.topology(), Topology::AllToAll);

        let config = SimulationConfig { num_neurons: 10, ..Default::default() };
        assert_eq!(config.topology(), Topology::AllToAll);
    }

    #[test]
    fn test_figure_config_of_simulation() {
        let config = SimulationConfig { num_neurons: 1_000, ..Default::default() };
        let figure = config.figure_config();
        assert_eq!((figure.window_start, figure.window_end), (100.0, 300.0));
        assert_eq!(figure.network_size, Some(1_000));

        let config = SimulationConfig { stop_time: 200.0, ..Default::default() };
        let figure = config.figure_config();
        assert_eq!((figure.window_start, figure.window_end), (100.0, 200.0));

        let config = SimulationConfig { stop_time: 50.0, ..Default::default() };
        let figure = config.figure_config();
        assert_eq!((figure.window_start, figure.window_end), (0.0, 50.0));

        let config: SimulationConfig =
            serde_json::from_str(r#"{"figure": {"window_start": 10.0, "bins": 20}}"#).unwrap();
        let figure = config.figure_config();
        assert_eq!((figure.window_start, figure.window_end), (10.0, 300.0));
        assert_eq!(figure.bins, 20);
    }

    #[test]
    fn test_simulation_config_validate() {
        let config = SimulationConfig { num_neurons: 0, ..Default::default() };
        assert!(config.validate().is_err());
        let config = SimulationConfig { stop_time: -1.0, ..Default::default() };
        assert!(config.validate().is_err());
        let config = SimulationConfig {
            params: BrunelParams { eta: -1.0, ..Default::default() },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_figure_config_validate() {
        assert_eq!(FigureConfig::default().validate(), Ok(()));
        let config = FigureConfig { window_start: 300.0, window_end: 100.0, ..Default::default() };
        assert!(config.validate().is_err());
        let config = FigureConfig { bins: 0, ..Default::default() };
        assert!(config.validate().is_err());
        let config = FigureConfig { rate_ylim: 0.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_num_neurons() {
        // Ids 1 to 49 pass the default filter
        assert_eq!(FigureConfig::default().num_neurons(), 49);

        let config = FigureConfig { first_neuron_id: 0, ..Default::default() };
        assert_eq!(config.num_neurons(), 50);

        let config = FigureConfig { network_size: Some(10), ..Default::default() };
        assert_eq!(config.num_neurons(), 10);
        let config = FigureConfig { network_size: Some(12_500), ..Default::default() };
        assert_eq!(config.num_neurons(), 49);

        let config = FigureConfig { max_neuron: 1, ..Default::default() };
        assert_eq!(config.num_neurons(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure.json");
        let config = FigureConfig {
            window_start: 0.0,
            window_end: 500.0,
            histogram_range: HistogramRange::Window,
            ..Default::default()
        };
        save_to(&config, &path).unwrap();
        let loaded: FigureConfig = load(&path).unwrap();
        assert_eq!(loaded, config);

        let missing: Result<FigureConfig, SNNError> = load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(SNNError::IOError(_))));
    }
}
