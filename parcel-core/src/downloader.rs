use std::path::{Path, PathBuf};

use reqwest::Client;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::{
    config::DownloaderConfig,
    coordinator::fan_out,
    download::{probe, DownloadRequest, ResourceMetadata},
    errors::Result,
    event::{Event, Events},
    layout::{create_parts_dir, remove_file_if_exists, remove_parts_dir},
    merge::merge_parts,
    segment::partition,
    single::fetch_whole,
};

/// How a finished download was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Segmented { segments: usize },
    SingleStream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub bytes: u64,
    pub strategy: Strategy,
}

/// Runs download attempts with a shared HTTP client.
///
/// Holds no per-download state: every call to [`Downloader::download`] is
/// self-contained and takes its concurrency from the request.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    events: Events,
}

impl Downloader {
    pub fn new(config: &DownloaderConfig) -> Result<Self> {
        Ok(Downloader {
            client: config.build_client()?,
            events: Events::none(),
        })
    }

    pub fn with_client(client: Client) -> Self {
        Downloader {
            client,
            events: Events::none(),
        }
    }

    /// Sends progress events to `tx` for every later download.
    pub fn with_events(mut self, tx: UnboundedSender<Event>) -> Self {
        self.events = Events::new(tx);
        self
    }

    /// Downloads `request.url()` to `request.output_path()`.
    ///
    /// Succeeds only when the output file is complete. On any error no part
    /// files, parts directory or partial output remain on disk.
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadReport> {
        let url = request.url();
        let output_path = request.output_path();

        let metadata = probe(&self.client, url).await?;
        info!(%url, ?metadata, concurrency = request.concurrency(), "starting download");

        let (bytes, strategy) = match metadata {
            ResourceMetadata {
                total_size,
                range_supported: true,
            } if request.concurrency() > 1 => {
                let bytes = self
                    .download_segmented(url, output_path, total_size, request.concurrency())
                    .await?;
                let strategy = Strategy::Segmented {
                    segments: request.concurrency(),
                };
                (bytes, strategy)
            }
            _ => {
                if !metadata.range_supported {
                    warn!(%url, "server does not support byte ranges, using a single stream");
                }
                let bytes = self.download_single(url, output_path, metadata).await?;
                (bytes, Strategy::SingleStream)
            }
        };

        info!(path = %output_path.display(), bytes, ?strategy, "download complete");
        self.events.send(Event::Completed {
            path: output_path.to_path_buf(),
            bytes,
        });
        Ok(DownloadReport {
            path: output_path.to_path_buf(),
            bytes,
            strategy,
        })
    }

    async fn download_segmented(
        &self,
        url: &str,
        output_path: &Path,
        total_size: u64,
        concurrency: usize,
    ) -> Result<u64> {
        let segments = partition(total_size, concurrency);
        self.events.send(Event::Started {
            total_size: Some(total_size),
            segments: segments.len(),
        });

        create_parts_dir(output_path).await?;

        if let Err(e) = fan_out(&self.client, url, &segments, output_path, &self.events).await {
            // Cleanup errors are logged by remove_parts_dir; the fetch error wins.
            let _ = remove_parts_dir(output_path).await;
            return Err(e);
        }

        self.events.send(Event::Merging);
        match merge_parts(output_path, concurrency).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                remove_file_if_exists(output_path).await;
                Err(e)
            }
        }
    }

    async fn download_single(
        &self,
        url: &str,
        output_path: &Path,
        metadata: ResourceMetadata,
    ) -> Result<u64> {
        self.events.send(Event::Started {
            total_size: (metadata.total_size > 0).then(|| metadata.total_size),
            segments: 1,
        });
        fetch_whole(&self.client, url, output_path, &self.events).await
    }
}
