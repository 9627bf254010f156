// CSV report writer - One flushed row per matched window
use crate::application::report_sink::ReportSink;
use crate::domain::flare::CATALOG_TIME_FORMAT;
use crate::domain::integration::{IntegrationMode, IntegrationResult, IntegrationRule};
use crate::domain::samples::Channel;
use anyhow::Context;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    StartTime,
    EndTime,
    Duration,
    File,
    Area {
        above_background: bool,
        rule: IntegrationRule,
        channel: Channel,
    },
}

impl Column {
    fn header(self) -> String {
        match self {
            Column::Date => "Date".to_string(),
            Column::StartTime => "StartTime".to_string(),
            Column::EndTime => "EndTime".to_string(),
            Column::Duration => "Duration".to_string(),
            Column::File => "File".to_string(),
            Column::Area {
                above_background,
                rule,
                channel,
            } => {
                let rule = match rule {
                    IntegrationRule::Trapezoid => "Trapz",
                    IntegrationRule::Simpson => "Simpson",
                };
                let prefix = if above_background { "AreaAboveBackground" } else { "Area" };
                format!("{}{}{}", prefix, rule, channel.label())
            }
        }
    }

    fn value(self, result: &IntegrationResult) -> String {
        let event = &result.event;
        match self {
            Column::Date => event.catalog_date(),
            Column::StartTime => event.start.format(CATALOG_TIME_FORMAT).to_string(),
            Column::EndTime => event.end.format(CATALOG_TIME_FORMAT).to_string(),
            Column::Duration => event.duration_label(),
            Column::File => result.file.clone(),
            Column::Area {
                above_background,
                rule,
                channel,
            } => {
                let areas = result.channel(channel);
                let rules = if above_background {
                    areas.above_background
                } else {
                    Some(areas.raw)
                };
                rules
                    .and_then(|r| r.get(rule))
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            }
        }
    }
}

/// Columns present for a mode: identity first, then raw areas, then areas
/// above background, each grouped by channel.
fn columns(mode: &IntegrationMode) -> Vec<Column> {
    let mut columns = vec![
        Column::Date,
        Column::StartTime,
        Column::EndTime,
        Column::Duration,
        Column::File,
    ];
    let passes: &[bool] = if mode.subtracts_background() { &[false, true] } else { &[false] };
    for &above_background in passes {
        for channel in Channel::ALL {
            for rule in [IntegrationRule::Trapezoid, IntegrationRule::Simpson] {
                if mode.uses(rule) {
                    columns.push(Column::Area {
                        above_background,
                        rule,
                        channel,
                    });
                }
            }
        }
    }
    columns
}

pub struct CsvReport<W: Write> {
    writer: csv::Writer<W>,
    columns: Vec<Column>,
}

impl CsvReport<File> {
    pub fn create(path: &Path, mode: &IntegrationMode) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        Self::new(file, mode)
    }
}

impl<W: Write> CsvReport<W> {
    /// Writes the header straight away so an empty run still leaves one.
    pub fn new(out: W, mode: &IntegrationMode) -> anyhow::Result<Self> {
        let columns = columns(mode);
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(columns.iter().map(|c| c.header()))?;
        writer.flush()?;
        Ok(Self { writer, columns })
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header()).collect()
    }
}

impl<W: Write + Send> ReportSink for CsvReport<W> {
    fn record(&mut self, result: &IntegrationResult) -> anyhow::Result<()> {
        self.writer
            .write_record(self.columns.iter().map(|c| c.value(result)))?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
