// Integration result domain model
use super::flare::FlareEvent;
use super::samples::Channel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundMethod {
    None,
    LinearEndpoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationRule {
    Trapezoid,
    Simpson,
}

/// Which areas a run computes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationMode {
    pub background: BackgroundMethod,
    pub rules: Vec<IntegrationRule>,
}

impl IntegrationMode {
    pub fn uses(&self, rule: IntegrationRule) -> bool {
        self.rules.contains(&rule)
    }

    pub fn subtracts_background(&self) -> bool {
        self.background != BackgroundMethod::None
    }
}

impl Default for IntegrationMode {
    fn default() -> Self {
        Self {
            background: BackgroundMethod::LinearEndpoints,
            rules: vec![IntegrationRule::Trapezoid, IntegrationRule::Simpson],
        }
    }
}

/// Straight line through the first and last sample of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundLine {
    pub t0: f64,
    pub y0: f64,
    pub slope: f64,
}

impl BackgroundLine {
    /// Flat when both endpoints share a timestamp.
    pub fn through(t0: f64, y0: f64, t1: f64, y1: f64) -> Self {
        let slope = if t1 > t0 { (y1 - y0) / (t1 - t0) } else { 0.0 };
        Self { t0, y0, slope }
    }

    pub fn at(&self, t: f64) -> f64 {
        self.y0 + self.slope * (t - self.t0)
    }
}

/// Areas under one curve; a rule that was not requested is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RuleAreas {
    pub trapezoid: Option<f64>,
    pub simpson: Option<f64>,
}

impl RuleAreas {
    pub fn get(&self, rule: IntegrationRule) -> Option<f64> {
        match rule {
            IntegrationRule::Trapezoid => self.trapezoid,
            IntegrationRule::Simpson => self.simpson,
        }
    }

    /// All requested rules set to zero.
    pub fn zeroed(mode: &IntegrationMode) -> Self {
        Self {
            trapezoid: mode.uses(IntegrationRule::Trapezoid).then_some(0.0),
            simpson: mode.uses(IntegrationRule::Simpson).then_some(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChannelAreas {
    pub raw: RuleAreas,
    pub above_background: Option<RuleAreas>,
    #[serde(skip)]
    pub background: Option<BackgroundLine>,
}

impl ChannelAreas {
    pub fn zeroed(mode: &IntegrationMode) -> Self {
        Self {
            raw: RuleAreas::zeroed(mode),
            above_background: mode.subtracts_background().then(|| RuleAreas::zeroed(mode)),
            background: None,
        }
    }
}

/// One output row: the areas computed for a matched window.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationResult {
    pub event: FlareEvent,
    pub file: String,
    pub sample_count: usize,
    pub channel_a: ChannelAreas,
    pub channel_c: ChannelAreas,
}

impl IntegrationResult {
    /// Result for a window with no quality-passing samples.
    pub fn empty(event: FlareEvent, file: String, mode: &IntegrationMode) -> Self {
        Self {
            event,
            file,
            sample_count: 0,
            channel_a: ChannelAreas::zeroed(mode),
            channel_c: ChannelAreas::zeroed(mode),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn channel(&self, channel: Channel) -> &ChannelAreas {
        match channel {
            Channel::A => &self.channel_a,
            Channel::C => &self.channel_c,
        }
    }
}
