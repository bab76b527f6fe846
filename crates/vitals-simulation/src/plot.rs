//! Renderable plot view of the reading history
//!
//! A front-end neutral figure: stacked panels of named `(x, y)` series.
//! Serialize it with [`VitalsPlot::to_json`] and hand it to whatever
//! draws charts.

use serde::{Deserialize, Serialize};
use vitals_core::{Reading, VitalsResult};

/// Figure height used for the vitals view
pub const PLOT_HEIGHT: u32 = 800;

/// One named line series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSeries {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl PlotSeries {
    fn from_readings(name: &str, readings: &[Reading], value: impl Fn(&Reading) -> u16) -> Self {
        Self {
            name: name.to_string(),
            x: readings.iter().map(|r| r.timestamp).collect(),
            y: readings.iter().map(|r| f64::from(value(r))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// One subplot row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPanel {
    pub title: String,
    pub series: Vec<PlotSeries>,
}

/// Multi-panel figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsPlot {
    pub title: String,
    pub height: u32,
    pub show_legend: bool,
    pub panels: Vec<PlotPanel>,
}

impl Default for VitalsPlot {
    fn default() -> Self {
        Self::empty()
    }
}

impl VitalsPlot {
    /// Placeholder figure with no panels
    pub fn empty() -> Self {
        Self {
            title: "Medical Device Data".to_string(),
            height: PLOT_HEIGHT,
            show_legend: true,
            panels: Vec::new(),
        }
    }

    /// Heart rate, systolic pressure and SpO2 against timestamp.
    /// Empty input yields [`VitalsPlot::empty`].
    pub fn from_readings(readings: &[Reading]) -> Self {
        let mut plot = Self::empty();
        if readings.is_empty() {
            return plot;
        }

        plot.panels = vec![
            PlotPanel {
                title: "Heart Rate".to_string(),
                series: vec![PlotSeries::from_readings("Heart Rate", readings, |r| r.heart_rate)],
            },
            PlotPanel {
                title: "Blood Pressure".to_string(),
                series: vec![PlotSeries::from_readings("Systolic", readings, |r| {
                    r.blood_pressure.systolic
                })],
            },
            PlotPanel {
                title: "SpO2".to_string(),
                series: vec![PlotSeries::from_readings("SpO2", readings, |r| r.spo2)],
            },
        ];
        plot
    }

    pub fn is_empty(&self) -> bool {
        self.panels.iter().all(|p| p.series.iter().all(PlotSeries::is_empty))
    }

    pub fn panel(&self, title: &str) -> Option<&PlotPanel> {
        self.panels.iter().find(|p| p.title == title)
    }

    pub fn to_json(&self) -> VitalsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
