// Energy integrator - Area under the irradiance curve, raw and above background
use crate::domain::flare::FlareEvent;
use crate::domain::integration::{
    BackgroundLine, BackgroundMethod, ChannelAreas, IntegrationMode, IntegrationResult,
    IntegrationRule, RuleAreas,
};
use crate::domain::samples::{Channel, SampleSeries};

/// Composite trapezoid rule over a non-uniform grid.
pub fn trapezoid(t: &[f64], y: &[f64]) -> f64 {
    let n = t.len().min(y.len());
    (1..n)
        .map(|i| 0.5 * (t[i] - t[i - 1]) * (y[i] + y[i - 1]))
        .sum()
}

/// Composite Simpson rule over a non-uniform grid.
///
/// Consecutive interval pairs are integrated with the three-point
/// parabola. With an even number of samples the last interval is covered
/// by the parabola through the final three samples, evaluated over that
/// interval only. Two samples fall back to the trapezoid, and a pair with
/// a zero-width interval is integrated as two trapezoids.
pub fn simpson(t: &[f64], y: &[f64]) -> f64 {
    let n = t.len().min(y.len());
    if n < 3 {
        return trapezoid(&t[..n], &y[..n]);
    }

    let paired = if n % 2 == 1 { n } else { n - 1 };
    let mut area = 0.0;
    let mut i = 0;
    while i + 2 < paired {
        area += simpson_pair([t[i], t[i + 1], t[i + 2]], [y[i], y[i + 1], y[i + 2]]);
        i += 2;
    }
    if n % 2 == 0 {
        area += last_interval([t[n - 3], t[n - 2], t[n - 1]], [y[n - 3], y[n - 2], y[n - 1]]);
    }
    area
}

fn simpson_pair(t: [f64; 3], y: [f64; 3]) -> f64 {
    let h0 = t[1] - t[0];
    let h1 = t[2] - t[1];
    if h0 <= 0.0 || h1 <= 0.0 {
        return 0.5 * h0 * (y[0] + y[1]) + 0.5 * h1 * (y[1] + y[2]);
    }
    let span = h0 + h1;
    span / 6.0
        * ((2.0 - h1 / h0) * y[0] + span * span / (h0 * h1) * y[1] + (2.0 - h0 / h1) * y[2])
}

/// Integral over `[t1, t2]` of the parabola through the three points.
fn last_interval(t: [f64; 3], y: [f64; 3]) -> f64 {
    let h0 = t[1] - t[0];
    let h1 = t[2] - t[1];
    if h0 <= 0.0 || h1 <= 0.0 {
        return 0.5 * h1 * (y[1] + y[2]);
    }
    let alpha = (2.0 * h1 * h1 + 3.0 * h0 * h1) / (6.0 * (h0 + h1));
    let beta = (h1 * h1 + 3.0 * h0 * h1) / (6.0 * h0);
    let eta = h1 * h1 * h1 / (6.0 * h0 * (h0 + h1));
    alpha * y[2] + beta * y[1] - eta * y[0]
}

/// Line through the first and last sample; `None` for an empty series.
pub fn endpoint_background(t: &[f64], y: &[f64]) -> Option<BackgroundLine> {
    let n = t.len().min(y.len());
    if n == 0 {
        return None;
    }
    Some(BackgroundLine::through(t[0], y[0], t[n - 1], y[n - 1]))
}

/// `y - line`, with negative excess clamped to zero.
pub fn subtract_background(t: &[f64], y: &[f64], line: &BackgroundLine) -> Vec<f64> {
    t.iter()
        .zip(y)
        .map(|(&t, &y)| (y - line.at(t)).max(0.0))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct EnergyIntegrator {
    mode: IntegrationMode,
}

impl EnergyIntegrator {
    pub fn new(mode: IntegrationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &IntegrationMode {
        &self.mode
    }

    fn areas(&self, t: &[f64], y: &[f64]) -> RuleAreas {
        RuleAreas {
            trapezoid: self
                .mode
                .uses(IntegrationRule::Trapezoid)
                .then(|| trapezoid(t, y)),
            simpson: self.mode.uses(IntegrationRule::Simpson).then(|| simpson(t, y)),
        }
    }

    pub fn integrate_channel(&self, t: &[f64], y: &[f64]) -> ChannelAreas {
        let raw = self.areas(t, y);
        match self.mode.background {
            BackgroundMethod::None => ChannelAreas {
                raw,
                above_background: None,
                background: None,
            },
            BackgroundMethod::LinearEndpoints => {
                let background = endpoint_background(t, y);
                let above = match &background {
                    Some(line) => self.areas(t, &subtract_background(t, y, line)),
                    None => RuleAreas::zeroed(&self.mode),
                };
                ChannelAreas {
                    raw,
                    above_background: Some(above),
                    background,
                }
            }
        }
    }

    pub fn integrate(&self, event: &FlareEvent, file: &str, flare: &SampleSeries) -> IntegrationResult {
        let t = flare.timestamps();
        IntegrationResult {
            event: event.clone(),
            file: file.to_string(),
            sample_count: flare.len(),
            channel_a: self.integrate_channel(t, flare.channel(Channel::A)),
            channel_c: self.integrate_channel(t, flare.channel(Channel::C)),
        }
    }
}
