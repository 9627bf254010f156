// Catalog reader - Turns the fixed-format flare table into FlareEvents
use crate::domain::errors::CatalogError;
use crate::domain::flare::{CATALOG_DATE_FORMAT, CATALOG_TIME_FORMAT, FlareEvent};
use crate::infrastructure::config::CatalogSettings;
use chrono::{NaiveDate, NaiveTime};
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Fewest whitespace-separated fields a data line may have.
const MIN_FIELDS: usize = 4;

#[derive(Debug, Clone)]
pub struct CatalogReader {
    settings: CatalogSettings,
}

impl CatalogReader {
    pub fn new(settings: CatalogSettings) -> Self {
        Self { settings }
    }

    /// Opens the configured catalog file and reads it lazily.
    pub fn open(
        &self,
    ) -> Result<impl Iterator<Item = Result<FlareEvent, CatalogError>>, CatalogError> {
        let file = File::open(&self.settings.path)?;
        Ok(self.read(BufReader::new(file)))
    }

    /// Events of the wanted classes, in file order. Blank lines and lines of
    /// other classes are skipped without comment; a line that is not valid
    /// UTF-8 is malformed.
    pub fn read<R: BufRead>(
        &self,
        reader: R,
    ) -> impl Iterator<Item = Result<FlareEvent, CatalogError>> {
        reader
            .split(b'\n')
            .enumerate()
            .skip(self.settings.header_lines)
            .filter_map(move |(index, line)| {
                let mut raw = match line {
                    Ok(raw) => raw,
                    Err(e) => return Some(Err(CatalogError::Io(e))),
                };
                if raw.last() == Some(&b'\r') {
                    raw.pop();
                }
                match String::from_utf8(raw) {
                    Ok(line) => self.parse_line(index + 1, &line),
                    Err(e) => Some(Err(CatalogError::malformed(
                        index + 1,
                        &String::from_utf8_lossy(e.as_bytes()),
                        "not valid UTF-8",
                    ))),
                }
            })
    }

    /// `None` when the line is blank or not of a wanted class.
    pub fn parse_line(&self, line_no: usize, line: &str) -> Option<Result<FlareEvent, CatalogError>> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            return None;
        }

        let s = &self.settings;
        let needed = [s.date_column, s.start_column, s.end_column, s.class_column.unwrap_or(0)]
            .into_iter()
            .max()
            .map_or(MIN_FIELDS, |col| (col + 1).max(MIN_FIELDS));
        if fields.len() < needed {
            return Some(Err(CatalogError::malformed(
                line_no,
                line,
                format!("expected at least {} fields, found {}", needed, fields.len()),
            )));
        }

        let class = match s.class_column {
            Some(col) => fields[col],
            None => fields[fields.len() - 1],
        };
        if !s.classes.iter().any(|prefix| class.starts_with(prefix.as_str())) {
            return None;
        }

        Some(self.parse_fields(line_no, line, &fields, class))
    }

    fn parse_fields(
        &self,
        line_no: usize,
        line: &str,
        fields: &[&str],
        class: &str,
    ) -> Result<FlareEvent, CatalogError> {
        let s = &self.settings;
        let date = NaiveDate::parse_from_str(fields[s.date_column], CATALOG_DATE_FORMAT)
            .map_err(|e| CatalogError::malformed(line_no, line, format!("bad date: {}", e)))?;
        let start = NaiveTime::parse_from_str(fields[s.start_column], CATALOG_TIME_FORMAT)
            .map_err(|e| CatalogError::malformed(line_no, line, format!("bad start time: {}", e)))?;
        let end = NaiveTime::parse_from_str(fields[s.end_column], CATALOG_TIME_FORMAT)
            .map_err(|e| CatalogError::malformed(line_no, line, format!("bad end time: {}", e)))?;

        FlareEvent::new(date, start, end, class.to_string())
            .ok_or_else(|| CatalogError::malformed(line_no, line, "end time is not after start time"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::flare::ARCHIVE_DATE_FORMAT;
    use std::io::{Cursor, Write};
    use std::path::PathBuf;

    fn settings(header_lines: usize) -> CatalogSettings {
        CatalogSettings {
            path: PathBuf::from("unused"),
            header_lines,
            classes: vec!["M".to_string(), "X".to_string()],
            date_column: 0,
            start_column: 1,
            end_column: 3,
            class_column: None,
        }
    }

    fn read_all(reader: &CatalogReader, text: &str) -> Vec<Result<FlareEvent, CatalogError>> {
        reader.read(Cursor::new(text.to_string())).collect()
    }

    #[test]
    fn test_parses_wanted_classes_after_header() {
        let reader = CatalogReader::new(settings(2));
        let text = "\
Catalog of flares
date start peak end class
01/02/2023 14:00:00 14:05:00 14:10:00 M1.0
01/03/2023 09:00:00 09:02:00 09:30:00 C4.2
01/04/2023 22:15:30 22:20:00 23:01:00 X2.1
";
        let events: Vec<FlareEvent> = read_all(&reader, text).into_iter().map(Result::unwrap).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].class, "M1.0");
        assert_eq!(events[0].start, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert_eq!(events[0].end, NaiveTime::from_hms_opt(14, 10, 0).unwrap());
        assert_eq!(events[1].class, "X2.1");
        assert_eq!(events[1].archive_date_key(), "20230104");
    }

    #[test]
    fn test_parsed_events_are_ordered_and_round_trip() {
        let reader = CatalogReader::new(settings(0));
        let text = "03/15/2023 01:00:00 01:10:00 01:20:00 M5.5\n12/31/2023 23:00:00 23:30:00 23:59:59 X1.0\n";
        for event in read_all(&reader, text) {
            let event = event.unwrap();
            assert!(event.start < event.end);
            let key = event.archive_date_key();
            assert_eq!(NaiveDate::parse_from_str(&key, ARCHIVE_DATE_FORMAT).unwrap(), event.date);
        }
    }

    #[test]
    fn test_malformed_lines_are_reported_and_reading_continues() {
        let reader = CatalogReader::new(settings(0));
        let text = "\
13/45/2023 14:00:00 14:05:00 14:10:00 M1.0
01/02/2023 14:00:00 M1.0

01/02/2023 14:20:00 14:15:00 14:10:00 M1.0
01/05/2023 10:00:00 10:05:00 10:10:00 M3.3
";
        let results = read_all(&reader, text);
        assert_eq!(results.len(), 4);
        for (result, expected_line) in results.iter().take(3).zip([1, 2, 4]) {
            match result {
                Err(CatalogError::MalformedLine { line_no, .. }) => assert_eq!(*line_no, expected_line),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(results[3].as_ref().unwrap().class, "M3.3");
    }

    #[test]
    fn test_non_utf8_line_is_malformed_not_fatal() {
        let reader = CatalogReader::new(settings(1));
        let mut bytes = b"Liste des \xe9ruptions\r\n".to_vec();
        bytes.extend_from_slice(b"01/02/2023 14:00:00 14:05:00 14:10:00 M1.0 caf\xe9\r\n");
        bytes.extend_from_slice(b"01/03/2023 09:00:00 09:05:00 09:10:00 X1.0\r\n");
        let results: Vec<_> = reader.read(Cursor::new(bytes)).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(CatalogError::MalformedLine { line_no: 2, .. })));
        assert_eq!(results[1].as_ref().unwrap().class, "X1.0");
    }

    #[test]
    fn test_configurable_columns() {
        let mut custom = settings(0);
        custom.date_column = 1;
        custom.start_column = 2;
        custom.end_column = 3;
        custom.class_column = Some(0);
        let reader = CatalogReader::new(custom);
        let events = read_all(&reader, "X9.3 02/06/2023 07:00:00 07:45:00 extra\n");
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.class, "X9.3");
        assert_eq!(event.duration_label(), "0:45:00");
    }

    #[test]
    fn test_open_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header").unwrap();
        writeln!(file, "01/02/2023 14:00:00 14:05:00 14:10:00 M1.0").unwrap();
        let mut s = settings(1);
        s.path = file.path().to_path_buf();
        let reader = CatalogReader::new(s);
        let events: Vec<_> = reader.open().unwrap().collect();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_ok());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let mut s = settings(0);
        s.path = PathBuf::from("/no/such/catalog.txt");
        assert!(matches!(CatalogReader::new(s).open(), Err(CatalogError::Io(_))));
    }
}
