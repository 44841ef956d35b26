//! Per-item artifact files under the output directory.
//!
//! ```text
//! <output>/transcripts/<id>.json   segments
//! <output>/transcripts/<id>.txt    flattened text
//! <output>/summaries/<id>.json     structured summary
//! <output>/summaries/<id>.md       Markdown summary
//! <output>/ledger.db               ledger
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place, so a
//! reader never observes a half-written artifact.

use crate::error::{Result, YtsumError};
use crate::summarize::Summary;
use crate::transcript::{SourceStrategy, TranscriptResult, TranscriptSegment};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// On-disk form of a transcript.
#[derive(Debug, Serialize, Deserialize)]
struct TranscriptFile {
    video_id: String,
    language: String,
    #[serde(default)]
    translated_from: Option<String>,
    source_strategy: SourceStrategy,
    segments: Vec<TranscriptSegment>,
}

/// Reads and writes the artifacts of one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create the store, making sure its directories exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { root: root.into() };
        std::fs::create_dir_all(store.transcripts_dir())?;
        std::fs::create_dir_all(store.summaries_dir())?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root.join("ledger.db")
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.root.join("transcripts")
    }

    pub fn summaries_dir(&self) -> PathBuf {
        self.root.join("summaries")
    }

    pub fn transcript_json_path(&self, id: &str) -> PathBuf {
        self.transcripts_dir().join(format!("{}.json", id))
    }

    pub fn transcript_text_path(&self, id: &str) -> PathBuf {
        self.transcripts_dir().join(format!("{}.txt", id))
    }

    pub fn summary_json_path(&self, id: &str) -> PathBuf {
        self.summaries_dir().join(format!("{}.json", id))
    }

    pub fn summary_markdown_path(&self, id: &str) -> PathBuf {
        self.summaries_dir().join(format!("{}.md", id))
    }

    /// Persist both transcript artifacts.
    pub fn write_transcript(&self, transcript: &TranscriptResult) -> Result<()> {
        let file = TranscriptFile {
            video_id: transcript.video_id.clone(),
            language: transcript.language.clone(),
            translated_from: transcript.translated_from.clone(),
            source_strategy: transcript.source_strategy,
            segments: transcript.segments.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        write_atomic(&self.transcript_json_path(&transcript.video_id), &json)?;
        write_atomic(
            &self.transcript_text_path(&transcript.video_id),
            transcript.text().as_bytes(),
        )?;
        debug!("Wrote transcript artifacts for {}", transcript.video_id);
        Ok(())
    }

    /// Load a transcript written by an earlier run, if both files exist.
    pub fn load_transcript(&self, id: &str) -> Result<Option<TranscriptResult>> {
        let json_path = self.transcript_json_path(id);
        if !json_path.exists() || !self.transcript_text_path(id).exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&json_path)?;
        let file: TranscriptFile = serde_json::from_str(&content).map_err(|e| {
            YtsumError::Artifact(format!("{}: {}", json_path.display(), e))
        })?;

        Ok(Some(
            TranscriptResult::new(file.video_id, file.segments, file.language, SourceStrategy::Cached)
                .with_translated_from(file.translated_from),
        ))
    }

    /// Persist the structured and Markdown summary.
    pub fn write_summary(&self, summary: &Summary) -> Result<()> {
        let json = serde_json::to_vec_pretty(summary)?;
        write_atomic(&self.summary_json_path(&summary.video_id), &json)?;
        write_atomic(
            &self.summary_markdown_path(&summary.video_id),
            summary.to_markdown().as_bytes(),
        )?;
        debug!("Wrote summary artifacts for {}", summary.video_id);
        Ok(())
    }

    /// Delete both summary files of `id`, if present.
    pub fn remove_summary(&self, id: &str) -> Result<()> {
        remove_if_exists(&self.summary_json_path(id))?;
        remove_if_exists(&self.summary_markdown_path(id))
    }

    /// Delete both transcript files of `id`, if present.
    pub fn remove_transcript(&self, id: &str) -> Result<()> {
        remove_if_exists(&self.transcript_json_path(id))?;
        remove_if_exists(&self.transcript_text_path(id))
    }

    pub fn read_summary(&self, id: &str) -> Result<Option<Summary>> {
        let path = self.summary_json_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn read_summary_markdown(&self, id: &str) -> Result<Option<String>> {
        let path = self.summary_markdown_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed stale artifact {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(YtsumError::Artifact(format!("{}: {}", path.display(), e))),
    }
}

/// Write `bytes` to `path` through a temp file in the same directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| YtsumError::Artifact(format!("no parent for {}", path.display())))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| YtsumError::Artifact(format!("{}: {}", path.display(), e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarize::NotableQuote;

    fn sample_transcript() -> TranscriptResult {
        TranscriptResult::new(
            "v1",
            vec![
                TranscriptSegment::new(0.0, 2.0, "hello"),
                TranscriptSegment::new(2.0, 2.0, "world"),
            ],
            "ja",
            SourceStrategy::WatchPage,
        )
        .with_translated_from(Some("en".into()))
    }

    #[test]
    fn test_transcript_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        assert!(store.load_transcript("v1").unwrap().is_none());
        store.write_transcript(&sample_transcript()).unwrap();

        let text = std::fs::read_to_string(store.transcript_text_path("v1")).unwrap();
        assert_eq!(text, "hello world");

        let loaded = store.load_transcript("v1").unwrap().unwrap();
        assert_eq!(loaded.text(), "hello world");
        assert_eq!(loaded.language_label(), "ja (translated from en)");
        assert_eq!(loaded.source_strategy, SourceStrategy::Cached);
    }

    #[test]
    fn test_summary_written_as_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let summary = Summary {
            video_id: "v1".into(),
            title: "T".into(),
            url: "https://www.youtube.com/watch?v=v1".into(),
            published_at: None,
            language: "ja".into(),
            summary: "S".into(),
            highlights: vec!["h".into()],
            new_insights: vec![],
            notable_quotes: vec![NotableQuote {
                timestamp: "00:05".into(),
                text: "q".into(),
            }],
            tokens_estimate: 10,
        };

        store.write_summary(&summary).unwrap();

        assert_eq!(store.read_summary("v1").unwrap().unwrap(), summary);
        let md = store.read_summary_markdown("v1").unwrap().unwrap();
        assert!(md.starts_with("# T"));

        // No temp files left behind.
        let names: Vec<String> = std::fs::read_dir(store.summaries_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_remove_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        store.write_transcript(&sample_transcript()).unwrap();
        std::fs::write(store.summary_json_path("v1"), "{}").unwrap();
        std::fs::write(store.summary_markdown_path("v1"), "# T").unwrap();

        store.remove_summary("v1").unwrap();
        assert!(!store.summary_json_path("v1").exists());
        assert!(!store.summary_markdown_path("v1").exists());
        assert!(store.transcript_json_path("v1").exists());

        store.remove_transcript("v1").unwrap();
        assert!(store.load_transcript("v1").unwrap().is_none());

        // Removing what is already gone is fine.
        store.remove_summary("v1").unwrap();
        store.remove_transcript("missing").unwrap();
    }
}
