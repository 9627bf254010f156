// Decoded sample series
use super::errors::DecodeError;
use super::flare::TimeWindow;

/// Quality flag value of a usable measurement.
pub const GOOD_QUALITY: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    C,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::A, Channel::C];

    pub fn label(self) -> &'static str {
        match self {
            Channel::A => "A",
            Channel::C => "C",
        }
    }
}

/// Parallel per-sample arrays from one data file.
///
/// All four sequences have the same length and timestamps never decrease.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSeries {
    timestamps: Vec<f64>,
    flag: Vec<i64>,
    channel_a: Vec<f64>,
    channel_c: Vec<f64>,
}

impl SampleSeries {
    pub fn new(
        timestamps: Vec<f64>,
        flag: Vec<i64>,
        channel_a: Vec<f64>,
        channel_c: Vec<f64>,
    ) -> Result<Self, DecodeError> {
        let n = timestamps.len();
        if flag.len() != n || channel_a.len() != n || channel_c.len() != n {
            return Err(DecodeError::InconsistentSeries(format!(
                "lengths differ: time={} flag={} a={} c={}",
                n,
                flag.len(),
                channel_a.len(),
                channel_c.len()
            )));
        }
        if let Some(i) = timestamps.windows(2).position(|w| !(w[0] <= w[1])) {
            return Err(DecodeError::InconsistentSeries(format!(
                "timestamps decrease (or are NaN) at sample {}",
                i + 1
            )));
        }
        Ok(Self {
            timestamps,
            flag,
            channel_a,
            channel_c,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn flags(&self) -> &[i64] {
        &self.flag
    }

    pub fn channel(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::A => &self.channel_a,
            Channel::C => &self.channel_c,
        }
    }

    pub fn first_timestamp(&self) -> Option<f64> {
        self.timestamps.first().copied()
    }

    /// Samples inside `window` (inclusive) whose flag is good.
    pub fn quality_window(&self, window: &TimeWindow) -> SampleSeries {
        self.select(|i| window.contains(self.timestamps[i]) && self.flag[i] == GOOD_QUALITY)
    }

    /// Every sample inside `window` (half-open), regardless of flag.
    pub fn context_window(&self, window: &TimeWindow) -> SampleSeries {
        self.select(|i| window.contains_half_open(self.timestamps[i]))
    }

    /// Every sample with a good flag.
    pub fn good_quality(&self) -> SampleSeries {
        self.select(|i| self.flag[i] == GOOD_QUALITY)
    }

    fn select(&self, keep: impl Fn(usize) -> bool) -> SampleSeries {
        let mut out = SampleSeries::default();
        for i in (0..self.len()).filter(|&i| keep(i)) {
            out.timestamps.push(self.timestamps[i]);
            out.flag.push(self.flag[i]);
            out.channel_a.push(self.channel_a[i]);
            out.channel_c.push(self.channel_c[i]);
        }
        out
    }
}

/// The selections made from one downloaded file for one flare.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub file: String,
    pub flare_window: TimeWindow,
    pub day_window: TimeWindow,
    /// Quality-passing samples inside the flare window.
    pub flare: SampleSeries,
    /// Every sample of the civil day, for plotting.
    pub context: SampleSeries,
}
