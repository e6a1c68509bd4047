//! Raster and rate figures of a spike log.
//!
//! The figure stacks two panels sharing the same time window: a raster plot of the firing
//! events of the first neurons, and a histogram of their spike count over time.
//!
//! # Examples
//!
//! ```rust
//! use rusty_brunel::config::FigureConfig;
//! use rusty_brunel::figure::{render, FigureData};
//! use rusty_brunel::spike_log::SpikeLog;
//!
//! let log = SpikeLog::parse("1500\t3\n1510\t7\n2400\t64\n".as_bytes()).unwrap();
//! let config = FigureConfig::default();
//!
//! let data = FigureData::prepare(&log, &config).unwrap();
//! assert_eq!(data.raster().len(), 2);
//!
//! let image = render(&data, &config).unwrap();
//! assert_eq!(image.dimensions(), (config.width, config.height));
//! ```
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    Blend,
};
use imageproc::rect::Rect;
use std::path::Path;

use crate::config::{FigureConfig, HistogramRange};
use crate::error::SNNError;
use crate::histogram::Histogram;
use crate::spike_log::SpikeLog;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXES: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Scatter points, alpha 0.8.
const POINTS: Rgba<u8> = Rgba([31, 119, 180, 204]);
/// Histogram bars, alpha 0.75.
const BARS: Rgba<u8> = Rgba([31, 119, 180, 191]);

const MARGIN_LEFT: f32 = 80.0;
const MARGIN_RIGHT: f32 = 40.0;
const MARGIN_TOP: f32 = 40.0;
const MARGIN_BOTTOM: f32 = 60.0;
const PANEL_GAP: f32 = 80.0;
const TICK_LENGTH: f32 = 8.0;
const NUM_TICKS: usize = 5;

/// The data shown in a figure: the selected events and their histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureData {
    raster: SpikeLog,
    histogram: Histogram,
    num_neurons: usize,
}

impl FigureData {
    /// Select the events of the neurons below `max_neuron`, convert their times to ms and bin them.
    pub fn prepare(log: &SpikeLog, config: &FigureConfig) -> Result<Self, SNNError> {
        config.validate()?;

        let raster = log
            .select_neurons_below(config.max_neuron)
            .scale_time(config.time_scale);
        let times = raster.times();
        let histogram = match config.histogram_range {
            HistogramRange::Data => Histogram::new(&times, config.bins)?,
            HistogramRange::Window => {
                Histogram::with_range(&times, config.bins, (config.window_start, config.window_end))?
            }
        };

        log::info!(
            "{} of {} spikes selected (neurons below {}), at most {} per bin of {:.2} ms",
            raster.len(),
            log.len(),
            config.max_neuron,
            histogram.max_count(),
            histogram.bin_width()
        );
        Ok(FigureData {
            raster,
            histogram,
            num_neurons: config.num_neurons(),
        })
    }

    /// The selected events, with times in ms.
    pub fn raster(&self) -> &SpikeLog {
        &self.raster
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// The number of neurons the selected events may come from.
    pub fn num_neurons(&self) -> usize {
        self.num_neurons
    }

    /// The population firing rate in each histogram bin [Hz].
    pub fn rates(&self) -> Result<Vec<f64>, SNNError> {
        self.histogram.rates(self.num_neurons)
    }
}

/// A rectangular plotting area mapping data coordinates to pixels.
#[derive(Debug, Clone, PartialEq)]
struct Panel {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
    x_range: (f64, f64),
    y_range: (f64, f64),
}

impl Panel {
    fn x(&self, x: f64) -> f32 {
        let (lo, hi) = self.x_range;
        self.left + ((x - lo) / (hi - lo)) as f32 * self.width
    }

    fn y(&self, y: f64) -> f32 {
        let (lo, hi) = self.y_range;
        self.top + self.height - ((y - lo) / (hi - lo)) as f32 * self.height
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_range.0 && x <= self.x_range.1 && y >= self.y_range.0 && y <= self.y_range.1
    }

    fn draw_axes(&self, canvas: &mut Blend<RgbaImage>) {
        let frame = Rect::at(self.left as i32, self.top as i32)
            .of_size(self.width.max(1.0) as u32, self.height.max(1.0) as u32);
        draw_hollow_rect_mut(canvas, frame, AXES);

        let bottom = self.top + self.height;
        for tick in ticks(self.x_range) {
            let x = self.x(tick);
            draw_line_segment_mut(canvas, (x, bottom), (x, bottom + TICK_LENGTH), AXES);
        }
        for tick in ticks(self.y_range) {
            let y = self.y(tick);
            draw_line_segment_mut(canvas, (self.left - TICK_LENGTH, y), (self.left, y), AXES);
        }
    }
}

/// The raster (top) and histogram (bottom) panels of a figure.
fn layout(config: &FigureConfig) -> (Panel, Panel) {
    let width = config.width as f32 - MARGIN_LEFT - MARGIN_RIGHT;
    let height = (config.height as f32 - MARGIN_TOP - MARGIN_BOTTOM - PANEL_GAP) / 2.0;
    let x_range = (config.window_start, config.window_end);

    let raster = Panel {
        left: MARGIN_LEFT,
        top: MARGIN_TOP,
        width,
        height,
        x_range,
        y_range: (0.0, config.max_neuron as f64),
    };
    let histogram = Panel {
        top: MARGIN_TOP + height + PANEL_GAP,
        y_range: (0.0, config.rate_ylim),
        ..raster.clone()
    };
    (raster, histogram)
}

/// Evenly spaced round values covering the range.
fn ticks(range: (f64, f64)) -> Vec<f64> {
    let (lo, hi) = range;
    let raw_step = (hi - lo) / NUM_TICKS as f64;
    let magnitude = 10_f64.powi(raw_step.log10().floor() as i32);
    let step = match raw_step / magnitude {
        r if r < 1.5 => magnitude,
        r if r < 3.0 => 2.0 * magnitude,
        r if r < 7.0 => 5.0 * magnitude,
        _ => 10.0 * magnitude,
    };

    let first = (lo / step).ceil() as i64;
    let last = (hi / step + 1e-9).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

/// Draw the raster and histogram panels.
pub fn render(data: &FigureData, config: &FigureConfig) -> Result<RgbaImage, SNNError> {
    config.validate()?;
    let (raster_panel, histogram_panel) = layout(config);
    let mut canvas = Blend(RgbaImage::from_pixel(config.width, config.height, BACKGROUND));

    let radius = (raster_panel.height / config.max_neuron as f32 * 0.3).clamp(1.0, 5.0) as i32;
    let mut num_points = 0;
    for record in data.raster.records() {
        let neuron = record.neuron as f64;
        if raster_panel.contains(record.time, neuron) {
            let center = (
                raster_panel.x(record.time).round() as i32,
                raster_panel.y(neuron).round() as i32,
            );
            draw_filled_circle_mut(&mut canvas, center, radius, POINTS);
            num_points += 1;
        }
    }

    let histogram = &data.histogram;
    for (i, &count) in histogram.counts().iter().enumerate() {
        let lo = histogram.edges()[i].max(config.window_start);
        let hi = histogram.edges()[i + 1].min(config.window_end);
        let level = (count as f64).min(config.rate_ylim);
        if hi <= lo || level <= 0.0 {
            continue;
        }

        let (x0, x1) = (histogram_panel.x(lo), histogram_panel.x(hi));
        let (y0, y1) = (histogram_panel.y(level), histogram_panel.y(0.0));
        let bar = Rect::at(x0.round() as i32, y0.round() as i32).of_size(
            ((x1 - x0).round() as u32).max(1),
            ((y1 - y0).round() as u32).max(1),
        );
        draw_filled_rect_mut(&mut canvas, bar, BARS);
    }

    raster_panel.draw_axes(&mut canvas);
    histogram_panel.draw_axes(&mut canvas);

    log::debug!(
        "Rendered {} points and {} bins in [{}, {}] ms",
        num_points,
        histogram.num_bins(),
        config.window_start,
        config.window_end
    );
    Ok(canvas.0)
}

/// Save a figure as PNG.
pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<(), SNNError> {
    let path = path.as_ref();
    image
        .save(path)
        .map_err(|e| SNNError::IOError(format!("{}: {}", path.display(), e)))?;
    log::info!("Figure saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spike_log::SpikeRecord;

    fn is_background(image: &RgbaImage, x: f32, y: f32) -> bool {
        *image.get_pixel(x.round() as u32, y.round() as u32) == BACKGROUND
    }

    #[test]
    fn test_prepare() {
        let log = SpikeLog::from_records(vec![
            SpikeRecord::new(1000.0, 1),
            SpikeRecord::new(1500.0, 50),
            SpikeRecord::new(2000.0, 49),
            SpikeRecord::new(3000.0, 0),
        ]);
        let config = FigureConfig { bins: 4, ..Default::default() };
        let data = FigureData::prepare(&log, &config).unwrap();

        assert_eq!(data.raster().times(), vec![100.0, 200.0, 300.0]);
        assert_eq!(data.histogram().edges(), &[100.0, 150.0, 200.0, 250.0, 300.0]);
        assert_eq!(data.histogram().counts(), &[1, 0, 1, 1]);

        let config = FigureConfig {
            bins: 2,
            window_start: 0.0,
            window_end: 400.0,
            histogram_range: HistogramRange::Window,
            ..Default::default()
        };
        let data = FigureData::prepare(&log, &config).unwrap();
        assert_eq!(data.histogram().counts(), &[1, 2]);
    }

    #[test]
    fn test_rates_count_selected_neurons() {
        // Neurons 1 to 50 fire once at step 0, a single bin of 4 ms
        let log = SpikeLog::from_records((1..=50).map(|id| SpikeRecord::new(0.0, id)).collect());
        let config = FigureConfig {
            window_start: 0.0,
            window_end: 4.0,
            bins: 1,
            histogram_range: HistogramRange::Window,
            ..Default::default()
        };
        let data = FigureData::prepare(&log, &config).unwrap();
        assert_eq!(data.histogram().counts(), &[49]);
        assert_eq!(data.num_neurons(), 49);
        approx::assert_relative_eq!(data.rates().unwrap()[0], 250.0);

        // A network of 20 neurons
        let log = SpikeLog::from_records((1..=20).map(|id| SpikeRecord::new(0.0, id)).collect());
        let config = FigureConfig { network_size: Some(20), ..config };
        let data = FigureData::prepare(&log, &config).unwrap();
        assert_eq!(data.num_neurons(), 20);
        approx::assert_relative_eq!(data.rates().unwrap()[0], 250.0);
    }

    #[test]
    fn test_prepare_invalid_config() {
        let config = FigureConfig { bins: 0, ..Default::default() };
        let result = FigureData::prepare(&SpikeLog::default(), &config);
        assert!(matches!(result, Err(SNNError::InvalidParameter(_))));
    }

    #[test]
    fn test_ticks() {
        assert_eq!(ticks((100.0, 300.0)), vec![100.0, 150.0, 200.0, 250.0, 300.0]);
        assert_eq!(ticks((0.0, 50.0)), vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(ticks((0.0, 70.0)), vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0]);
        assert_eq!(ticks((0.0, 500.0)), vec![0.0, 100.0, 200.0, 300.0, 400.0, 500.0]);
    }

    #[test]
    fn test_layout() {
        let config = FigureConfig::default();
        let (raster, histogram) = layout(&config);
        assert_eq!(raster.x(100.0), MARGIN_LEFT);
        assert_eq!(raster.x(300.0), config.width as f32 - MARGIN_RIGHT);
        assert_eq!(raster.y(50.0), MARGIN_TOP);
        assert_eq!(histogram.y(0.0), config.height as f32 - MARGIN_BOTTOM);
        assert!(histogram.top > raster.top + raster.height);
    }

    #[test]
    fn test_render_clips_to_window() {
        let log = SpikeLog::from_records(vec![
            SpikeRecord::new(2000.0, 25),
            SpikeRecord::new(2000.0, 20),
            SpikeRecord::new(500.0, 25),
        ]);
        let config = FigureConfig {
            histogram_range: HistogramRange::Window,
            ..Default::default()
        };
        let data = FigureData::prepare(&log, &config).unwrap();
        let image = render(&data, &config).unwrap();
        let (raster, histogram) = layout(&config);

        assert_eq!(image.dimensions(), (config.width, config.height));
        assert!(!is_background(&image, raster.x(200.0), raster.y(25.0)));
        assert!(!is_background(&image, raster.x(200.0), raster.y(20.0)));
        assert!(is_background(&image, raster.x(150.0), raster.y(25.0)));

        // Two spikes in the bin [200, 204)
        assert!(!is_background(&image, histogram.x(202.0), histogram.y(1.0)));
        assert!(is_background(&image, histogram.x(202.0), histogram.y(10.0)));
        assert!(is_background(&image, histogram.x(150.0), histogram.y(1.0)));
    }

    #[test]
    fn test_save_png() {
        let config = FigureConfig { width: 300, height: 240, ..Default::default() };
        let data = FigureData::prepare(&SpikeLog::default(), &config).unwrap();
        let image = render(&data, &config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("figure.png");
        save_png(&image, &path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (300, 240));
    }
}
