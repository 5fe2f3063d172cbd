//! Batch conversion integration tests.
//!
//! These tests run whole batches through the converter queue with a mock
//! engine and an in-memory filesystem:
//! - Concurrency limits and FIFO start order
//! - Moving outputs into place, numbering taken names
//! - Error handling, temp cleanup and notifications
//! - Aggregate progress and aborts

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use sonata_core::{
    engine::EngineEvent,
    fs::FileSystem,
    media::{MediaItem, TagValue},
    notify::{Notification, NotificationEnvelope, Notifier},
    testing::{fixtures::tagged_item, MemoryFs, MockEngine, Script},
    ConversionSettings, ConverterQueue, NamingConfig, QueueConfig, QueueError,
};

/// Test helper wiring a converter queue to mocks.
struct TestHarness {
    queue: ConverterQueue,
    engine: MockEngine,
    fs: Arc<MemoryFs>,
    notifications: mpsc::Receiver<NotificationEnvelope>,
}

impl TestHarness {
    fn new(engine: MockEngine, max_concurrency: usize) -> Self {
        Self::with_settings(engine, max_concurrency, ConversionSettings::default())
    }

    fn with_settings(engine: MockEngine, max_concurrency: usize, settings: ConversionSettings) -> Self {
        let fs = Arc::new(MemoryFs::new());
        let engine = engine.writing_to(fs.clone());
        let (notifier, notifications) = Notifier::channel(64);
        let config = QueueConfig {
            max_concurrency,
            progress_interval_ms: 10,
        };

        let queue = ConverterQueue::new(
            Arc::new(engine.clone()),
            fs.clone(),
            settings,
            naming(),
            &config,
        )
        .expect("Failed to create queue")
        .with_notifier(notifier);

        Self {
            queue,
            engine,
            fs,
            notifications,
        }
    }

    /// Adds an input file tagged as a track of "Foo Bar".
    fn add(&mut self, path: &str, track: i64, title: &str) {
        self.fs.touch(path);
        self.queue
            .add(track_item(path, track, title))
            .expect("Failed to queue item");
    }

    fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.notifications.try_recv() {
            out.push(envelope.notification);
        }
        out
    }

    fn temp_files(&self) -> Vec<PathBuf> {
        self.fs
            .files()
            .into_iter()
            .filter(|p| p.to_string_lossy().ends_with("~SC~"))
            .collect()
    }
}

/// An input below `/in` tagged as a track of "Foo Bar".
fn track_item(path: &str, track: i64, title: &str) -> MediaItem {
    let file = path.strip_prefix("/in/").expect("inputs live below /in");
    tagged_item(
        file,
        &[
            ("artist", "Foo Bar".into()),
            ("title", title.into()),
            ("track-number", TagValue::Integer(track)),
        ],
    )
}

fn naming() -> NamingConfig {
    NamingConfig {
        same_folder_as_input: false,
        selected_folder: Some("/music".into()),
        create_subfolders: true,
        subfolder_pattern: "%(artist)s".into(),
        basename_pattern: "%(track-number)02d-%(title)s".into(),
        ..Default::default()
    }
}

/// The `filesink` path of a launched description.
fn sink_of(description: &str) -> PathBuf {
    let start = description
        .rfind("filesink location=\"")
        .expect("description has a sink")
        + 19;
    let rest = &description[start..];
    PathBuf::from(&rest[..rest.find('"').expect("sink location is quoted")])
}

/// Writes the output of the pipeline reading `input` and ends its stream.
fn finish_input(engine: &MockEngine, fs: &MemoryFs, input: &str) {
    let source = format!("location=\"{}\"", input);
    let description = engine
        .launched()
        .into_iter()
        .find(|d| d.contains(&source))
        .expect("input was launched");
    fs.touch(sink_of(&description));
    assert_eq!(engine.emit(&source, EngineEvent::EndOfStream), 1);
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_batch_converts_and_places_outputs() {
    let mut h = TestHarness::new(MockEngine::new().with_default(Script::success(180.0)), 2);
    h.add("/in/a.flac", 1, "Hi Ho");
    h.add("/in/b.flac", 2, "Let's Go");

    let report = h.queue.run().await.expect("batch runs");

    assert!(report.is_success());
    assert_eq!(report.converted.len(), 2);
    assert_eq!(report.duration_processed, 360.0);
    assert!(report.status.starts_with("Conversion done in"));
    assert!(h.fs.is_file("/music/Foo Bar/01-Hi Ho.ogg"));
    assert!(h.fs.is_file("/music/Foo Bar/02-Let's Go.ogg"));
    assert!(h.temp_files().is_empty());
    assert!(h.fs.is_file("/in/a.flac"), "originals are kept by default");

    let notifications = h.drain_notifications();
    assert_eq!(
        notifications,
        vec![Notification::BatchDone {
            message: report.status.clone(),
            error_count: 0,
        }]
    );
}

#[tokio::test]
async fn test_concurrency_limit_and_fifo_order() {
    let mut h = TestHarness::new(MockEngine::new().with_default(Script::held(Some(10.0))), 2);
    for (n, name) in ["a", "b", "c", "d"].iter().enumerate() {
        h.add(&format!("/in/{}.flac", name), n as i64 + 1, name);
    }

    let engine = h.engine.clone();
    let fs = h.fs.clone();
    let controller = tokio::spawn(async move {
        let mut launched_counts = Vec::new();
        settle().await;
        launched_counts.push(engine.launched().len());

        finish_input(&engine, &fs, "/in/a.flac");
        settle().await;
        launched_counts.push(engine.launched().len());

        for input in ["/in/b.flac", "/in/c.flac", "/in/d.flac"] {
            finish_input(&engine, &fs, input);
            settle().await;
        }
        (launched_counts, engine.launched())
    });

    let report = h.queue.run().await.expect("batch runs");
    let (launched_counts, launched) = controller.await.unwrap();

    assert_eq!(launched_counts, vec![2, 3]);
    let order: Vec<bool> = ["a", "b", "c", "d"]
        .iter()
        .zip(&launched)
        .map(|(name, d)| d.contains(&format!("/in/{}.flac", name)))
        .collect();
    assert_eq!(order, vec![true; 4]);
    assert_eq!(report.converted.len(), 4);
    assert_eq!(report.error_count, 0);
}

#[tokio::test]
async fn test_taken_names_are_numbered() {
    let mut h = TestHarness::new(MockEngine::new().with_default(Script::success(60.0)), 1);
    h.fs.touch("/music/Foo Bar/03-Same.ogg");
    h.add("/in/x/a.flac", 3, "Same");
    h.add("/in/y/a.flac", 3, "Same");

    let report = h.queue.run().await.expect("batch runs");

    assert_eq!(report.error_count, 0);
    let targets: Vec<PathBuf> = report.converted.iter().map(|(_, t)| t.clone()).collect();
    assert_eq!(
        targets,
        vec![
            PathBuf::from("/music/Foo Bar/03-Same (1).ogg"),
            PathBuf::from("/music/Foo Bar/03-Same (2).ogg"),
        ]
    );
    assert!(h.fs.is_file("/music/Foo Bar/03-Same.ogg"));
}

#[tokio::test]
async fn test_concurrent_outputs_with_same_name_are_numbered() {
    let mut h = TestHarness::new(MockEngine::new().with_default(Script::held(Some(10.0))), 2);
    h.add("/in/x/a.flac", 3, "Same");
    h.add("/in/y/a.flac", 3, "Same");

    let engine = h.engine.clone();
    let fs = h.fs.clone();
    let controller = tokio::spawn(async move {
        settle().await;
        let running = engine.launched().len();
        // both end before either output is moved into place
        finish_input(&engine, &fs, "/in/x/a.flac");
        finish_input(&engine, &fs, "/in/y/a.flac");
        running
    });

    let report = h.queue.run().await.expect("batch runs");
    assert_eq!(controller.await.unwrap(), 2);

    assert_eq!(report.error_count, 0);
    let mut targets: Vec<PathBuf> = report.converted.iter().map(|(_, t)| t.clone()).collect();
    targets.sort();
    assert_eq!(
        targets,
        vec![
            PathBuf::from("/music/Foo Bar/03-Same (1).ogg"),
            PathBuf::from("/music/Foo Bar/03-Same.ogg"),
        ]
    );
    assert!(h.temp_files().is_empty());
}

#[tokio::test]
async fn test_failed_conversion_leaves_no_temp() {
    let engine = MockEngine::new().with_default(Script::success(60.0));
    engine.script("bad.flac", Script::runtime_error("Could not decode stream."));
    let mut h = TestHarness::new(engine, 2);
    h.add("/in/bad.flac", 1, "Broken");
    h.add("/in/good.flac", 2, "Fine");

    let report = h.queue.run().await.expect("batch runs");

    assert_eq!(report.error_count, 1);
    assert_eq!(report.converted.len(), 1);
    assert!(report.errors[0].contains("/in/bad.flac"));
    assert!(report.status.ends_with(", 1 error(s)"));
    assert!(h.temp_files().is_empty());
    assert!(!h.fs.is_file("/music/Foo Bar/01-Broken.ogg"));
    assert!(h.fs.is_file("/music/Foo Bar/02-Fine.ogg"));

    let notifications = h.drain_notifications();
    assert_eq!(notifications.len(), 2);
    assert!(matches!(
        &notifications[0],
        Notification::Error { item: Some(name), .. } if name == "bad.flac"
    ));
    assert!(matches!(
        notifications[1],
        Notification::BatchDone { error_count: 1, .. }
    ));
}

#[tokio::test]
async fn test_launch_failure_does_not_stop_batch() {
    let engine = MockEngine::new().with_default(Script::success(60.0));
    engine.script(
        "odd.flac",
        Script {
            launch_error: Some("no element \"decodebin\"".into()),
            ..Default::default()
        },
    );
    let mut h = TestHarness::new(engine, 1);
    h.add("/in/odd.flac", 1, "Odd");
    h.add("/in/even.flac", 2, "Even");

    let report = h.queue.run().await.expect("batch runs");

    assert_eq!(report.error_count, 1);
    assert_eq!(report.converted.len(), 1);
    assert!(h.temp_files().is_empty());
}

#[tokio::test]
async fn test_ignored_errors_still_count_as_failures() {
    let engine = MockEngine::new().with_default(Script::runtime_error("Internal data stream error."));
    let settings = ConversionSettings {
        ignore_errors: true,
        ..ConversionSettings::default()
    };
    let mut h = TestHarness::with_settings(engine, 1, settings);
    h.add("/in/a.flac", 1, "Hi Ho");

    let report = h.queue.run().await.expect("batch runs");

    assert_eq!(report.error_count, 1);
    assert!(report.converted.is_empty());
    // only the batch notification, the error itself was ignored
    assert_eq!(h.drain_notifications().len(), 1);
}

#[tokio::test]
async fn test_rename_failure_keeps_temp() {
    let mut h = TestHarness::new(MockEngine::new().with_default(Script::success(60.0)), 1);
    h.fs.make_directory(Path::new("/music/Foo Bar")).unwrap();
    h.fs.fail_renames_into("/music/Foo Bar");
    h.add("/in/a.flac", 1, "Hi Ho");

    let report = h.queue.run().await.expect("batch runs");

    assert_eq!(report.error_count, 1);
    assert!(report.converted.is_empty());
    assert_eq!(h.temp_files().len(), 1);
    assert!(h.fs.is_file("/in/a.flac"));
}

#[tokio::test]
async fn test_delete_original_after_success() {
    let settings = ConversionSettings {
        delete_original: true,
        ..ConversionSettings::default()
    };
    let mut h = TestHarness::with_settings(
        MockEngine::new().with_default(Script::success(60.0)),
        1,
        settings,
    );
    h.add("/in/a.flac", 1, "Hi Ho");

    let report = h.queue.run().await.expect("batch runs");

    assert!(report.is_success());
    assert!(!h.fs.is_file("/in/a.flac"));
    assert!(h.fs.is_file("/music/Foo Bar/01-Hi Ho.ogg"));
}

#[tokio::test]
async fn test_aggregate_progress_never_decreases() {
    let mut h = TestHarness::new(MockEngine::new().with_default(Script::held(Some(10.0))), 2);
    h.add("/in/a.flac", 1, "A");
    h.add("/in/b.flac", 2, "B");
    let mut progress = h.queue.subscribe_progress();

    let engine = h.engine.clone();
    let fs = h.fs.clone();
    let controller = tokio::spawn(async move {
        let mut seen = Vec::new();
        settle().await;
        engine.set_position("/in/a.flac", 5.0);
        settle().await;
        seen.push(progress.borrow().fraction);

        // the engine reporting an earlier position must not move progress back
        engine.set_position("/in/a.flac", 1.0);
        settle().await;
        seen.push(progress.borrow().fraction);

        finish_input(&engine, &fs, "/in/a.flac");
        settle().await;
        seen.push(progress.borrow().fraction);

        finish_input(&engine, &fs, "/in/b.flac");
        settle().await;
        seen.push(progress.borrow().fraction);
        seen
    });

    let report = h.queue.run().await.expect("batch runs");
    let seen = controller.await.unwrap();

    assert!(report.is_success());
    assert!((seen[0] - 0.25).abs() < 1e-9, "got {:?}", seen);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "got {:?}", seen);
    assert_eq!(*seen.last().unwrap(), 1.0);
}

#[tokio::test]
async fn test_abort_cancels_running_and_drops_waiting() {
    let mut h = TestHarness::new(MockEngine::new().with_default(Script::held(Some(10.0))), 1);
    h.add("/in/a.flac", 1, "A");
    h.add("/in/b.flac", 2, "B");
    let handle = h.queue.handle();

    let engine = h.engine.clone();
    let fs = h.fs.clone();
    tokio::spawn(async move {
        settle().await;
        // a partially written output
        fs.touch(sink_of(&engine.launched()[0]));
        handle.abort();
    });

    let result = h.queue.run().await;

    assert!(matches!(result, Err(QueueError::Aborted)));
    assert_eq!(h.engine.launched().len(), 1);
    assert_eq!(h.engine.stop_count(), 1);
    assert!(h.temp_files().is_empty());
    assert!(h.queue.is_empty());
    // no batch-done notification for an aborted batch
    assert!(h.drain_notifications().is_empty());
}

#[tokio::test]
async fn test_empty_batch_finishes_immediately() {
    let mut h = TestHarness::new(MockEngine::new(), 2);

    let report = h.queue.run().await.expect("batch runs");

    assert!(report.is_success());
    assert!(report.converted.is_empty());
    assert_eq!(h.drain_notifications().len(), 1);
}

#[tokio::test]
async fn test_queue_is_reusable_after_a_batch() {
    let mut h = TestHarness::new(MockEngine::new().with_default(Script::success(30.0)), 1);
    h.add("/in/a.flac", 1, "A");
    let first = h.queue.run().await.expect("first batch runs");
    assert_eq!(first.converted.len(), 1);

    h.add("/in/b.flac", 2, "B");
    let second = h.queue.run().await.expect("second batch runs");
    assert_eq!(second.converted.len(), 1);
    assert_eq!(second.duration_processed, 30.0);
}

#[tokio::test]
async fn test_queue_from_config_with_messy_chars_replaced() {
    let config = sonata_core::load_config_from_str(
        r#"
[naming]
same_folder_as_input = false
selected_folder = "/music"
create_subfolders = true
subfolder_pattern = "%(artist)s"
basename_pattern = "%(track-number)02d-%(title)s"
replace_messy_chars = true

[queue]
max_concurrency = 1
progress_interval_ms = 10
"#,
    )
    .expect("config parses");
    sonata_core::validate_config(&config).expect("config is valid");

    let fs = Arc::new(MemoryFs::new());
    let engine = MockEngine::new()
        .with_default(Script::success(60.0))
        .writing_to(fs.clone());
    let mut queue = ConverterQueue::from_config(&config, Arc::new(engine), fs.clone())
        .expect("Failed to create queue");

    for _ in 0..2 {
        fs.touch("/in/a.flac");
        queue
            .add(track_item("/in/a.flac", 1, "Hi Ho"))
            .expect("Failed to queue item");
    }

    let report = queue.run().await.expect("batch runs");

    assert_eq!(report.error_count, 0);
    assert!(fs.is_file("/music/Foo_Bar/01-Hi_Ho.ogg"));
    assert!(fs.is_file("/music/Foo_Bar/01-Hi_Ho_(1).ogg"));
}
