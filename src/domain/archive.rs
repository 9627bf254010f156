// Archive domain model
use super::flare::FlareEvent;
use reqwest::Url;
use std::fmt;
use std::str::FromStr;

/// A data file listed in one archive directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub directory_url: Url,
    pub filename: String,
}

impl ArchiveEntry {
    pub fn new(directory_url: Url, filename: String) -> Self {
        Self {
            directory_url,
            filename,
        }
    }

    pub fn file_url(&self) -> Option<Url> {
        self.directory_url.join(&self.filename).ok()
    }
}

/// A flare paired with the archive file covering its date.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedWindow {
    pub event: FlareEvent,
    pub file_url: Url,
}

impl MatchedWindow {
    pub fn new(event: FlareEvent, file_url: Url) -> Self {
        Self { event, file_url }
    }

    /// Last path segment of the file URL.
    pub fn file_name(&self) -> String {
        self.file_url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.file_url.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year = year
            .parse::<i32>()
            .map_err(|e| format!("bad year in '{}': {}", s, e))?;
        let month = month
            .parse::<u32>()
            .map_err(|e| format!("bad month in '{}': {}", s, e))?;
        Self::new(year, month).ok_or_else(|| format!("month out of range in '{}'", s))
    }
}

/// Inclusive range of calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    start: YearMonth,
    end: YearMonth,
}

impl MonthRange {
    pub fn new(start: YearMonth, end: YearMonth) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn months(&self) -> impl Iterator<Item = YearMonth> + '_ {
        std::iter::successors(Some(self.start), |m| Some(m.next())).take_while(|m| *m <= self.end)
    }
}
