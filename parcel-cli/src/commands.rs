use std::{path::PathBuf, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};
use parcel_core::{DownloadRequest, Downloader, DownloaderConfig, Event, Strategy};
use tokio::{sync::mpsc, task};

const BAR_TEMPLATE: &str = "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";
const SPINNER_TEMPLATE: &str = "{msg} {spinner} {bytes}";

pub async fn handle_download(
    url: String,
    output: Option<PathBuf>,
    concurrency: usize,
    timeout: Option<u64>,
) -> Result<(), ()> {
    let request = match DownloadRequest::new(url, output.unwrap_or_default(), concurrency) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}", e);
            return Err(());
        }
    };

    let mut config = match DownloaderConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return Err(());
        }
    };
    if let Some(secs) = timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let downloader = match Downloader::new(&config) {
        Ok(downloader) => downloader.with_events(tx),
        Err(e) => {
            eprintln!("{}", e);
            return Err(());
        }
    };

    let progress = task::spawn(render_progress(rx));
    let result = downloader.download(&request).await;
    // Closing the sender ends the progress task.
    drop(downloader);
    let _ = progress.await;

    match result {
        Ok(report) => {
            let how = match report.strategy {
                Strategy::Segmented { segments } => format!("{} segments", segments),
                Strategy::SingleStream => "a single stream".to_string(),
            };
            println!(
                "Saved {} ({} bytes, {})",
                report.path.display(),
                report.bytes,
                how
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Download failed: {}", e);
            Err(())
        }
    }
}

async fn render_progress(mut rx: mpsc::UnboundedReceiver<Event>) {
    let mut pb: Option<ProgressBar> = None;

    while let Some(event) = rx.recv().await {
        match event {
            Event::Started { total_size, segments } => {
                let bar = match total_size {
                    Some(total) => {
                        let bar = ProgressBar::new(total);
                        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
                            bar.set_style(style.progress_chars("#>-"));
                        }
                        bar
                    }
                    None => {
                        let bar = ProgressBar::new_spinner();
                        if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
                            bar.set_style(style);
                        }
                        bar
                    }
                };
                bar.set_message(format!("Downloading ({} segments)", segments));
                pb = Some(bar);
            }
            Event::Progress { bytes, .. } => {
                if let Some(bar) = &pb {
                    bar.inc(bytes);
                }
            }
            Event::SegmentFinished { .. } => {}
            Event::Merging => {
                if let Some(bar) = &pb {
                    bar.set_message("Merging");
                }
            }
            Event::Completed { .. } => {
                if let Some(bar) = &pb {
                    bar.finish_with_message("Done");
                }
            }
        }
    }

    if let Some(bar) = pb {
        if !bar.is_finished() {
            bar.abandon_with_message("Failed");
        }
    }
}
