// Diagnostic plots - Full-day irradiance with the flare window marked
use crate::application::report_sink::WindowRenderer;
use crate::domain::flare::ARCHIVE_DATE_FORMAT;
use crate::domain::integration::IntegrationResult;
use crate::domain::samples::{Channel, Extraction};
use anyhow::Context;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlotError {
    #[cfg(not(feature = "plotting"))]
    #[error("flare-energy was built without the \"plotting\" feature; rebuild with it to write plots")]
    NoPlottingFeature,

    #[error("Error from the plotters library: {0}")]
    Draw(String),
}

/// `{YYYYMMDD}_{HHMMSS}_{file stem}.svg`
pub fn plot_file_name(result: &IntegrationResult) -> String {
    let stem = Path::new(&result.file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| result.file.clone());
    format!(
        "{}_{}_{}.svg",
        result.event.date.format(ARCHIVE_DATE_FORMAT),
        result.event.start.format("%H%M%S"),
        stem
    )
}

/// Axis bounds covering every finite value, never zero-height.
fn value_range(values: &[f64]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return (0.0, 1.0);
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - pad, hi + pad)
}

pub struct SvgPlotter {
    dir: PathBuf,
}

impl SvgPlotter {
    #[cfg(feature = "plotting")]
    pub fn new(dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self { dir })
    }

    #[cfg(not(feature = "plotting"))]
    pub fn new(_dir: PathBuf) -> anyhow::Result<Self> {
        Err(PlotError::NoPlottingFeature.into())
    }
}

impl WindowRenderer for SvgPlotter {
    fn render(&self, extraction: &Extraction, result: &IntegrationResult) -> anyhow::Result<PathBuf> {
        let path = self.dir.join(plot_file_name(result));
        #[cfg(feature = "plotting")]
        drawing::draw(&path, extraction, result)
            .with_context(|| format!("drawing {}", path.display()))?;
        #[cfg(not(feature = "plotting"))]
        let _ = extraction;
        Ok(path)
    }
}

#[cfg(feature = "plotting")]
mod drawing {
    use super::*;
    use plotters::prelude::*;

    const WIDTH: u32 = 1200;
    const HEIGHT: u32 = 900;

    pub(super) fn draw(path: &Path, extraction: &Extraction, result: &IntegrationResult) -> Result<(), PlotError> {
        let root = SVGBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| PlotError::Draw(e.to_string()))?;
        let panels = root.split_evenly((2, 1));
        for (panel, channel) in panels.iter().zip(Channel::ALL) {
            draw_channel(panel, extraction, result, channel)?;
        }
        root.present().map_err(|e| PlotError::Draw(e.to_string()))?;
        Ok(())
    }

    fn draw_channel<DB: DrawingBackend>(
        area: &DrawingArea<DB, plotters::coord::Shift>,
        extraction: &Extraction,
        result: &IntegrationResult,
        channel: Channel,
    ) -> Result<(), PlotError> {
        let day = extraction.day_window;
        let hours = |t: f64| (t - day.start) / 3600.0;
        let day_hours = hours(day.end).max(1.0);
        let values = extraction.context.channel(channel);
        let (y_min, y_max) = value_range(values);
        let event = &result.event;

        let mut chart = ChartBuilder::on(area)
            .caption(
                format!(
                    "Channel {} - {} flare {} {}-{}",
                    channel.label(),
                    event.class,
                    event.catalog_date(),
                    event.start,
                    event.end
                ),
                ("sans-serif", 22),
            )
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(0.0..day_hours, y_min..y_max)
            .map_err(|e| PlotError::Draw(e.to_string()))?;

        chart
            .configure_mesh()
            .x_desc("Hours since local midnight")
            .y_desc("Irradiance")
            .draw()
            .map_err(|e| PlotError::Draw(e.to_string()))?;

        let day_points = extraction
            .context
            .timestamps()
            .iter()
            .zip(values)
            .filter(|(_, v)| v.is_finite())
            .map(|(&t, &v)| (hours(t), v));
        chart
            .draw_series(LineSeries::new(day_points, &BLUE))
            .map_err(|e| PlotError::Draw(e.to_string()))?
            .label("Full day")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

        let flare_points = extraction
            .flare
            .timestamps()
            .iter()
            .zip(extraction.flare.channel(channel))
            .map(|(&t, &v)| (hours(t), v));
        chart
            .draw_series(LineSeries::new(flare_points, BLACK.stroke_width(2)))
            .map_err(|e| PlotError::Draw(e.to_string()))?
            .label("Flare window (quality)")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));

        let window = extraction.flare_window;
        for (t, colour, label) in [(window.start, RED, "Flare start"), (window.end, GREEN, "Flare end")] {
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(hours(t), y_min), (hours(t), y_max)],
                    colour,
                )))
                .map_err(|e| PlotError::Draw(e.to_string()))?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], colour));
        }

        if let Some(line) = result.channel(channel).background {
            let ends = [window.start, window.end].map(|t| (hours(t), line.at(t)));
            chart
                .draw_series(LineSeries::new(ends, MAGENTA))
                .map_err(|e| PlotError::Draw(e.to_string()))?
                .label("Background")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], MAGENTA));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| PlotError::Draw(e.to_string()))?;
        Ok(())
    }
}
