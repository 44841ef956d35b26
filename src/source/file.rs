//! Video-id files: one id or URL per line, or a channel index CSV.

use super::{dedupe_and_cap, parse_video_id, Item, ItemResolver, SourceSpec};
use crate::error::{Result, YtsumError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Reads items from a text file. Blank lines and `#` comments are skipped.
///
/// A file whose first line is a CSV header with a `video_id` column is read
/// as a channel index instead; `title` and `published_at` columns are
/// carried onto the items when present.
pub struct FileResolver;

impl FileResolver {
    /// Parse file contents into items.
    pub fn parse(contents: &str) -> Vec<Item> {
        let records = csv_records(contents);
        if let Some(header) = records.first() {
            if let Some(id_col) = column(header, "video_id") {
                debug!("Reading channel index with {} rows", records.len() - 1);
                return Self::parse_index(&records[1..], header, id_col);
            }
        }
        Self::parse_lines(contents)
    }

    fn parse_index(rows: &[Vec<String>], header: &[String], id_col: usize) -> Vec<Item> {
        let title_col = column(header, "title");
        let published_col = column(header, "published_at");
        let field = |row: &Vec<String>, col: Option<usize>| {
            col.and_then(|c| row.get(c)).map(|v| v.trim().to_string())
        };

        rows.iter()
            .filter(|row| row.iter().any(|f| !f.trim().is_empty()))
            .filter_map(|row| {
                let raw = field(row, Some(id_col)).unwrap_or_default();
                let Some(id) = parse_video_id(&raw) else {
                    warn!("Skipping index row without a video id: {:?}", raw);
                    return None;
                };
                let mut item = Item::from_id(id);
                if let Some(title) = field(row, title_col).filter(|t| !t.is_empty()) {
                    item = item.with_title(title);
                }
                let published = field(row, published_col).and_then(|p| parse_published(&p));
                Some(item.with_published_at(published))
            })
            .collect()
    }

    fn parse_lines(contents: &str) -> Vec<Item> {
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| match parse_video_id(line) {
                Some(id) => Some(Item::from_id(id)),
                None => {
                    warn!("Skipping unrecognised line: {}", line);
                    None
                }
            })
            .collect()
    }
}

fn column(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn parse_published(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Split CSV text into records. Quoted fields may hold commas, doubled
/// quotes, and line breaks.
fn csv_records(contents: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = contents.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' if quoted => quoted = false,
            '"' if field.is_empty() => quoted = true,
            ',' if !quoted => record.push(std::mem::take(&mut field)),
            '\r' if !quoted => {}
            '\n' if !quoted => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

#[async_trait]
impl ItemResolver for FileResolver {
    fn can_handle(&self, spec: &SourceSpec) -> bool {
        matches!(spec, SourceSpec::File(_))
    }

    async fn resolve(&self, spec: &SourceSpec, limit: Option<usize>) -> Result<Vec<Item>> {
        let SourceSpec::File(path) = spec else {
            return Err(YtsumError::InvalidInput(format!(
                "not a video-id file: {}",
                spec
            )));
        };

        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            YtsumError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
        })?;

        Ok(dedupe_and_cap(Self::parse(&contents), limit))
    }
}
