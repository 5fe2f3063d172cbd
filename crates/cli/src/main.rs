mod cli;
mod metrics;
mod scan;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sonata_core::{
    load_config_or_default, validate_config, Config, ConverterQueue, EncoderCapabilities,
    GstLaunchEngine, LocalFs, MediaEngine, MediaItem, Notification, Notifier, OutputFormat,
    TagReader, TaskQueue, TypeFinder,
};

use cli::Cli;

/// Buffer size for the notification channel
const NOTIFICATION_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config_path = cli.config_path();
    info!("Loading configuration from {:?}", config_path);
    let mut config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    apply_overrides(&mut config, &cli)?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Output format: {}", config.conversion.output.id());
    info!("Max concurrency: {}", config.queue.max_concurrency);

    // Create engine
    let gst = GstLaunchEngine::new(config.engine.clone());
    gst.validate()
        .await
        .context("GStreamer is not usable, is gst-launch-1.0 installed?")?;
    let engine: Arc<dyn MediaEngine> = Arc::new(gst);
    let capabilities = EncoderCapabilities::detect(engine.as_ref()).await;
    debug!(?capabilities, "Detected encoders");

    // Discover inputs
    let items = scan::scan(&cli.paths, !cli.no_recursive);
    let items = find_types(items, &engine, config.queue.max_concurrency).await;
    let items = read_tags(items, &engine, config.queue.max_concurrency).await;
    if items.is_empty() {
        warn!("Nothing to convert");
        return Ok(());
    }

    if cli.dry_run {
        for item in &items {
            println!("{}", item.uri());
        }
        return Ok(());
    }

    // Run the batch
    let (notifier, mut notifications) = Notifier::channel(NOTIFICATION_BUFFER_SIZE);
    let mut queue = ConverterQueue::from_config(&config, engine.clone(), Arc::new(LocalFs::new()))
        .context("Failed to create converter queue")?
        .with_capabilities(capabilities)
        .context("Output format not available")?
        .with_notifier(notifier);
    for item in items {
        let uri = item.uri().to_string();
        queue
            .add(item)
            .with_context(|| format!("Failed to queue {}", uri))?;
    }
    info!("Converting {} files", queue.len());

    let notification_printer = tokio::spawn(async move {
        while let Some(envelope) = notifications.recv().await {
            match envelope.notification {
                Notification::Error {
                    title,
                    message,
                    item,
                } => eprintln!("{}: {} ({})", title, message, item.unwrap_or_default()),
                Notification::BatchDone { message, .. } => eprintln!("{}", message),
            }
        }
    });

    let mut progress = queue.subscribe_progress();
    let progress_logger = tokio::spawn(async move {
        let mut last = -1;
        while progress.changed().await.is_ok() {
            let percent = (progress.borrow().fraction * 100.0) as i64;
            if percent / 10 != last / 10 {
                info!("Progress: {}%", percent);
            }
            last = percent;
        }
    });

    let handle = queue.handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Interrupted, aborting conversion");
            handle.abort();
        }
    });

    let result = queue.run().await;
    progress_logger.abort();
    drop(queue);
    let _ = notification_printer.await;

    let report = result.context("Conversion batch failed")?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (input, target) in &report.converted {
            println!("{} -> {}", input, target.display());
        }
        for message in &report.errors {
            println!("error: {}", message);
        }
    }

    if cli.metrics {
        print!("{}", metrics::encode_metrics()?);
    }

    if !report.is_success() {
        bail!("{} file(s) could not be converted", report.error_count);
    }
    Ok(())
}

/// Command line options win over the configuration file.
fn apply_overrides(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(output) = &cli.output {
        config.naming.same_folder_as_input = false;
        config.naming.selected_folder = Some(output.to_string_lossy().into_owned());
    }
    if let Some(format) = &cli.format {
        config.conversion.output =
            serde_json::from_value::<OutputFormat>(serde_json::json!({ "format": format }))
                .with_context(|| format!("Unknown format {}", format))?;
    }
    if let Some(jobs) = cli.jobs {
        config.queue.max_concurrency = jobs;
    }
    if cli.delete_original {
        config.conversion.delete_original = true;
    }
    Ok(())
}

/// Keeps the items whose detected type is worth converting.
async fn find_types(
    items: Vec<MediaItem>,
    engine: &Arc<dyn MediaEngine>,
    max_concurrency: usize,
) -> Vec<MediaItem> {
    let mut queue = TaskQueue::new(max_concurrency);
    for item in items {
        queue.add_task(TypeFinder::task(item, engine.clone()));
    }
    queue.run(&mut ()).await;

    queue
        .take_finished()
        .into_iter()
        .map(|slot| slot.task().item().clone())
        .filter(|item| {
            if item.mime_type.is_none() {
                debug!("Skipping {}", item.uri());
            }
            item.mime_type.is_some()
        })
        .collect()
}

async fn read_tags(
    items: Vec<MediaItem>,
    engine: &Arc<dyn MediaEngine>,
    max_concurrency: usize,
) -> Vec<MediaItem> {
    let mut queue = TaskQueue::new(max_concurrency);
    for item in items {
        queue.add_task(TagReader::task(item, engine.clone()));
    }
    queue.run(&mut ()).await;

    queue
        .take_finished()
        .into_iter()
        .map(|slot| {
            let task = slot.task();
            if !task.item().tags_read {
                warn!("No tags read from {}", task.item().uri());
            }
            task.item().clone()
        })
        .collect()
}
