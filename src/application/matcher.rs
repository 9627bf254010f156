// Matcher - Pairs catalog events with the archive file for their date
use crate::domain::archive::{ArchiveEntry, MatchedWindow};
use crate::domain::flare::FlareEvent;

#[derive(Debug, Default, PartialEq)]
pub struct MatchReport {
    pub windows: Vec<MatchedWindow>,
    pub unmatched: Vec<FlareEvent>,
}

/// For each event, the first entry (in the given order) whose filename
/// contains the event date as `YYYYMMDD`. Events keep catalog order.
pub fn match_events(events: &[FlareEvent], entries: &[ArchiveEntry]) -> MatchReport {
    let mut report = MatchReport::default();

    for event in events {
        let key = event.archive_date_key();
        let file_url = entries
            .iter()
            .filter(|entry| entry.filename.contains(&key))
            .find_map(ArchiveEntry::file_url);
        match file_url {
            Some(url) => report.windows.push(MatchedWindow::new(event.clone(), url)),
            None => {
                tracing::debug!(
                    "No archive file for {} flare on {} at {}",
                    event.class,
                    event.catalog_date(),
                    event.start
                );
                report.unmatched.push(event.clone());
            }
        }
    }

    report
}
