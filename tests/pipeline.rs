//! End-to-end pipeline runs over fake transports and a scripted model.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use ytsum::artifacts::ArtifactStore;
use ytsum::chunking::ChunkingConfig;
use ytsum::config::Prompts;
use ytsum::ledger::{LedgerStatus, SqliteLedger};
use ytsum::orchestrator::{ItemOutcome, Orchestrator};
use ytsum::ratelimit::RateLimiter;
use ytsum::retry::RetryPolicy;
use ytsum::source::Item;
use ytsum::summarize::{CompletionRequest, LanguageModel, MapReduceSummarizer, SummarizerOptions};
use ytsum::transcript::{
    SourceStrategy, TrackInfo, TrackKind, TrackRequest, TranscriptAcquirer, TranscriptSegment,
    TranscriptTransport,
};
use ytsum::{Result, YtsumError};

#[derive(Clone)]
enum Video {
    Captions(String),
    NoCaptions,
}

/// Serves canned captions; can be switched to refuse every request.
struct FakeTransport {
    strategy: SourceStrategy,
    videos: HashMap<String, Video>,
    blocked: bool,
    calls: AtomicUsize,
}

impl FakeTransport {
    fn new(strategy: SourceStrategy, videos: &[(&str, Video)]) -> Arc<Self> {
        Arc::new(Self {
            strategy,
            videos: videos
                .iter()
                .map(|(id, v)| (id.to_string(), v.clone()))
                .collect(),
            blocked: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn blocked(strategy: SourceStrategy) -> Arc<Self> {
        Arc::new(Self {
            strategy,
            videos: HashMap::new(),
            blocked: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptTransport for FakeTransport {
    fn strategy(&self) -> SourceStrategy {
        self.strategy
    }

    async fn list_tracks(&self, video_id: &str) -> Result<Vec<TrackInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.blocked {
            return Err(YtsumError::AccessBlocked("captcha".into()));
        }
        match self.videos.get(video_id) {
            Some(Video::Captions(_)) => Ok(vec![TrackInfo::new("en", TrackKind::Manual)]),
            Some(Video::NoCaptions) => Ok(Vec::new()),
            None => Err(YtsumError::Unavailable("video unavailable".into())),
        }
    }

    async fn fetch_track(
        &self,
        video_id: &str,
        _request: &TrackRequest,
    ) -> Result<Vec<TranscriptSegment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.videos.get(video_id) {
            Some(Video::Captions(text)) => Ok(vec![TranscriptSegment::new(0.0, 60.0, text.clone())]),
            _ => Err(YtsumError::Unavailable("no such track".into())),
        }
    }
}

/// Answers "MAP" prompts with one key point and anything else with a summary.
struct FakeModel {
    fail_map: bool,
    map_delay: Duration,
    map_calls: AtomicUsize,
    reduce_calls: AtomicUsize,
}

impl FakeModel {
    fn new(fail_map: bool) -> Arc<Self> {
        Arc::new(Self {
            fail_map,
            map_delay: Duration::ZERO,
            map_calls: AtomicUsize::new(0),
            reduce_calls: AtomicUsize::new(0),
        })
    }

    fn slow(map_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fail_map: false,
            map_delay,
            map_calls: AtomicUsize::new(0),
            reduce_calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> (usize, usize) {
        (
            self.map_calls.load(Ordering::SeqCst),
            self.reduce_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    fn name(&self) -> String {
        "fake".into()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if request.prompt.starts_with("MAP") {
            self.map_calls.fetch_add(1, Ordering::SeqCst);
            if !self.map_delay.is_zero() {
                tokio::time::sleep(self.map_delay).await;
            }
            if self.fail_map {
                return Err(YtsumError::MalformedRequest("context too long".into()));
            }
            return Ok(r#"{"key_points": ["a point"], "quotes": [], "insights": []}"#.into());
        }
        self.reduce_calls.fetch_add(1, Ordering::SeqCst);
        Ok(r#"{"summary": "It is about x.", "highlights": ["x"], "new_insights": [], "notable_quotes": []}"#.into())
    }
}

fn orchestrator(
    dir: &Path,
    primary: Arc<FakeTransport>,
    secondary: Option<Arc<FakeTransport>>,
    model: Arc<FakeModel>,
) -> Orchestrator {
    let limiter = Arc::new(RateLimiter::with_interval("test", Duration::ZERO, 1));

    let mut acquirer =
        TranscriptAcquirer::new(primary, vec!["en".into()], limiter.clone(), RetryPolicy::none());
    if let Some(secondary) = secondary {
        acquirer = acquirer.with_secondary(secondary, false);
    }

    let mut prompts = Prompts::default();
    prompts.map.user = "MAP {{index}}/{{total}} {{chunk}}".into();
    prompts.reduce.user = "REDUCE {{partials}}".into();
    let summarizer = MapReduceSummarizer::new(
        model,
        limiter,
        RetryPolicy::none(),
        prompts,
        SummarizerOptions {
            chunking: ChunkingConfig::new(60, 10).unwrap(),
            ..Default::default()
        },
    );

    let store = ArtifactStore::new(dir).unwrap();
    let ledger = Arc::new(SqliteLedger::new(&store.ledger_path()).unwrap());
    Orchestrator::with_components(Arc::new(acquirer), Arc::new(summarizer), ledger, store, 1)
}

fn items(ids: &[&str]) -> Vec<Item> {
    ids.iter().map(|id| Item::from_id(*id).with_title(format!("Video {}", id))).collect()
}

async fn run(orchestrator: &Orchestrator, ids: &[&str], force: bool) -> ytsum::ledger::RunReport {
    orchestrator
        .run(&items(ids), force, CancellationToken::new(), |_| {})
        .await
        .unwrap()
}

#[tokio::test]
async fn test_summarizes_new_item() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new(
        SourceStrategy::WatchPage,
        &[("v1", Video::Captions("x".repeat(100)))],
    );
    let model = FakeModel::new(false);
    let orch = orchestrator(dir.path(), transport, None, model.clone());

    let report = run(&orch, &["v1"], false).await;

    // 100 chars at 60/10 is two chunks, so two map calls and one reduce.
    assert_eq!(model.calls(), (2, 1));
    assert_eq!(report.summarized, 1);

    let record = orch.ledger().get("v1").await.unwrap().unwrap();
    assert_eq!(record.status, LedgerStatus::Summarized);
    assert_eq!(record.transcript_chars, 100);
    assert_eq!(record.tokens_estimate, 25);
    assert_eq!(record.language.as_deref(), Some("en"));
    assert_eq!(record.title, "Video v1");
    assert!(record.error.is_none());

    let store = orch.artifacts();
    assert!(store.transcript_json_path("v1").exists());
    assert_eq!(
        std::fs::read_to_string(store.transcript_text_path("v1")).unwrap(),
        "x".repeat(100)
    );
    let summary = store.read_summary("v1").unwrap().unwrap();
    assert_eq!(summary.summary, "It is about x.");
    assert!(store
        .read_summary_markdown("v1")
        .unwrap()
        .unwrap()
        .contains("It is about x."));
}

#[tokio::test]
async fn test_video_without_captions_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new(SourceStrategy::WatchPage, &[("v2", Video::NoCaptions)]);
    let model = FakeModel::new(false);
    let orch = orchestrator(dir.path(), transport, None, model.clone());

    let report = run(&orch, &["v2"], false).await;

    assert_eq!(report.transcript_unavailable, 1);
    assert_eq!(model.calls(), (0, 0));

    let record = orch.ledger().get("v2").await.unwrap().unwrap();
    assert_eq!(record.status, LedgerStatus::TranscriptUnavailable);
    assert!(record.error.is_some());
    assert!(!orch.artifacts().summary_json_path("v2").exists());
    assert!(!orch.artifacts().summary_markdown_path("v2").exists());
}

#[tokio::test]
async fn test_rerun_only_processes_new_items() {
    let dir = tempfile::tempdir().unwrap();
    let videos = [
        ("v1", Video::Captions("x".repeat(100))),
        ("v3", Video::Captions("y".repeat(50))),
    ];

    let first = orchestrator(
        dir.path(),
        FakeTransport::new(SourceStrategy::WatchPage, &videos),
        None,
        FakeModel::new(false),
    );
    run(&first, &["v1"], false).await;
    let summary_before =
        std::fs::read_to_string(first.artifacts().summary_markdown_path("v1")).unwrap();
    drop(first);

    let transport = FakeTransport::new(SourceStrategy::WatchPage, &videos);
    let model = FakeModel::new(false);
    let second = orchestrator(dir.path(), transport.clone(), None, model.clone());
    let report = run(&second, &["v1", "v3"], false).await;

    // Only v3 reaches the transport: list + fetch, one chunk, one reduce.
    assert_eq!(transport.calls(), 2);
    assert_eq!(model.calls(), (1, 1));
    assert_eq!(report.skipped, 1);
    assert_eq!(report.summarized, 2);

    let summary_after =
        std::fs::read_to_string(second.artifacts().summary_markdown_path("v1")).unwrap();
    assert_eq!(summary_before, summary_after);

    let ids: Vec<String> = second
        .ledger()
        .records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["v1", "v3"]);
}

#[tokio::test]
async fn test_force_reprocesses_complete_items() {
    let dir = tempfile::tempdir().unwrap();
    let videos = [("v1", Video::Captions("x".repeat(100)))];
    let transport = FakeTransport::new(SourceStrategy::WatchPage, &videos);
    let model = FakeModel::new(false);
    let orch = orchestrator(dir.path(), transport.clone(), None, model.clone());

    run(&orch, &["v1"], false).await;
    run(&orch, &["v1"], true).await;

    assert_eq!(transport.calls(), 4);
    assert_eq!(model.calls(), (4, 2));
    assert_eq!(orch.ledger().records().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_blocked_primary_falls_back_to_secondary() {
    let dir = tempfile::tempdir().unwrap();
    let primary = FakeTransport::blocked(SourceStrategy::WatchPage);
    let secondary = FakeTransport::new(
        SourceStrategy::YtDlp,
        &[("v1", Video::Captions("z".repeat(40)))],
    );
    let orch = orchestrator(
        dir.path(),
        primary.clone(),
        Some(secondary.clone()),
        FakeModel::new(false),
    );

    let report = run(&orch, &["v1"], false).await;

    assert_eq!(report.summarized, 1);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 2);
    let cached = orch.artifacts().load_transcript("v1").unwrap().unwrap();
    assert_eq!(cached.char_count(), 40);
}

#[tokio::test]
async fn test_blocked_everywhere_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        dir.path(),
        FakeTransport::blocked(SourceStrategy::WatchPage),
        Some(FakeTransport::blocked(SourceStrategy::YtDlp)),
        FakeModel::new(false),
    );

    let report = run(&orch, &["v1"], false).await;
    assert_eq!(report.transcript_unavailable, 1);
}

#[tokio::test]
async fn test_all_map_failures_mark_item_failed_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new(
        SourceStrategy::WatchPage,
        &[
            ("v1", Video::Captions("x".repeat(100))),
            ("v2", Video::NoCaptions),
        ],
    );
    let model = FakeModel::new(true);
    let orch = orchestrator(dir.path(), transport, None, model.clone());

    let report = run(&orch, &["v1", "v2"], false).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.transcript_unavailable, 1);
    assert_eq!(model.calls(), (2, 0));

    let record = orch.ledger().get("v1").await.unwrap().unwrap();
    assert_eq!(record.status, LedgerStatus::Failed);
    assert!(record.error.unwrap().contains("map calls failed"));
    assert!(!orch.artifacts().summary_json_path("v1").exists());
}

#[tokio::test]
async fn test_failed_item_retries_from_saved_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let videos = [("v1", Video::Captions("x".repeat(100)))];

    let failing = orchestrator(
        dir.path(),
        FakeTransport::new(SourceStrategy::WatchPage, &videos),
        None,
        FakeModel::new(true),
    );
    run(&failing, &["v1"], false).await;
    drop(failing);

    let transport = FakeTransport::new(SourceStrategy::WatchPage, &videos);
    let orch = orchestrator(dir.path(), transport.clone(), None, FakeModel::new(false));
    let report = run(&orch, &["v1"], false).await;

    assert_eq!(report.summarized, 1);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_process_item_skips_completed() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new(
        SourceStrategy::WatchPage,
        &[("v1", Video::Captions("x".repeat(30)))],
    );
    let orch = orchestrator(dir.path(), transport, None, FakeModel::new(false));
    let item = Item::from_id("v1");

    assert_eq!(
        orch.process_item(&item, false).await.unwrap(),
        ItemOutcome::Summarized
    );
    assert_eq!(
        orch.process_item(&item, false).await.unwrap(),
        ItemOutcome::Skipped
    );
}

#[tokio::test]
async fn test_cancelled_run_starts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new(
        SourceStrategy::WatchPage,
        &[("v1", Video::Captions("x".repeat(30)))],
    );
    let orch = orchestrator(dir.path(), transport.clone(), None, FakeModel::new(false));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = orch
        .run(&items(&["v1"]), false, cancel, |_| {})
        .await
        .unwrap();

    assert_eq!(transport.calls(), 0);
    assert_eq!(report.pending, 1);
    assert!(orch.ledger().get("v1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_forced_rerun_that_fails_removes_old_summary() {
    let dir = tempfile::tempdir().unwrap();
    let videos = [("v1", Video::Captions("x".repeat(100)))];

    let first = orchestrator(
        dir.path(),
        FakeTransport::new(SourceStrategy::WatchPage, &videos),
        None,
        FakeModel::new(false),
    );
    run(&first, &["v1"], false).await;
    assert!(first.artifacts().summary_json_path("v1").exists());
    drop(first);

    let orch = orchestrator(
        dir.path(),
        FakeTransport::new(SourceStrategy::WatchPage, &videos),
        None,
        FakeModel::new(true),
    );
    let report = run(&orch, &["v1"], true).await;

    assert_eq!(report.failed, 1);
    let record = orch.ledger().get("v1").await.unwrap().unwrap();
    assert_eq!(record.status, LedgerStatus::Failed);

    let store = orch.artifacts();
    assert!(!store.summary_json_path("v1").exists());
    assert!(!store.summary_markdown_path("v1").exists());
    // The transcript stays for the next retry.
    assert!(store.transcript_json_path("v1").exists());
}

#[tokio::test]
async fn test_forced_rerun_without_captions_removes_old_artifacts() {
    let dir = tempfile::tempdir().unwrap();

    let first = orchestrator(
        dir.path(),
        FakeTransport::new(
            SourceStrategy::WatchPage,
            &[("v1", Video::Captions("x".repeat(100)))],
        ),
        None,
        FakeModel::new(false),
    );
    run(&first, &["v1"], false).await;
    drop(first);

    let orch = orchestrator(
        dir.path(),
        FakeTransport::new(SourceStrategy::WatchPage, &[("v1", Video::NoCaptions)]),
        None,
        FakeModel::new(false),
    );
    let report = run(&orch, &["v1"], true).await;

    assert_eq!(report.transcript_unavailable, 1);
    let record = orch.ledger().get("v1").await.unwrap().unwrap();
    assert_eq!(record.status, LedgerStatus::TranscriptUnavailable);

    let store = orch.artifacts();
    assert!(!store.summary_json_path("v1").exists());
    assert!(!store.summary_markdown_path("v1").exists());
    assert!(!store.transcript_json_path("v1").exists());
    assert!(!store.transcript_text_path("v1").exists());
}

#[tokio::test]
async fn test_cancel_during_summarization_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let transport = FakeTransport::new(
        SourceStrategy::WatchPage,
        &[("v1", Video::Captions("x".repeat(100)))],
    );
    let model = FakeModel::slow(Duration::from_secs(30));
    let orch = orchestrator(dir.path(), transport, None, model.clone());

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        orch.run(&items(&["v1"]), false, cancel, |_| {}),
    )
    .await
    .expect("cancellation should interrupt the map call")
    .unwrap();
    canceller.await.unwrap();

    let (map_calls, reduce_calls) = model.calls();
    assert!(map_calls >= 1);
    assert_eq!(reduce_calls, 0);
    assert_eq!(report.summarized, 0);
    assert!(orch.ledger().get("v1").await.unwrap().is_none());

    let leftovers: Vec<_> = std::fs::read_dir(orch.artifacts().summaries_dir())
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
}
