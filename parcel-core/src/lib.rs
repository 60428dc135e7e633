//! Segmented HTTP downloads.
//!
//! A resource that supports byte ranges is split into a fixed number of
//! segments, fetched concurrently into part files and merged back in order.
//! Anything else is fetched with a single plain GET.

pub mod config;
pub mod coordinator;
pub mod download;
pub mod downloader;
pub mod errors;
pub mod event;
pub mod fetcher;
pub mod layout;
pub mod merge;
pub mod segment;
pub mod single;

pub use config::DownloaderConfig;
pub use download::{DownloadRequest, ResourceMetadata};
pub use downloader::{DownloadReport, Downloader, Strategy};
pub use errors::{ParcelError, Result, Stage};
pub use event::Event;
pub use segment::{partition, Segment, SegmentState};
