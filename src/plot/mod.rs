// Plot module
// Decoding-accuracy-over-time charts

pub mod chart;

pub use chart::{parse_color, render_decoding_chart, ChartSeries, PlotError, PlotResult};
