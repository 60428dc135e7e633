use std::path::Path;

use futures_util::StreamExt;
use reqwest::{header, Client, StatusCode};
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tracing::debug;

use crate::{
    errors::{ParcelError, Result, Stage},
    event::{Event, Events},
    segment::Segment,
};

/// Downloads one segment into its part file and returns the number of bytes
/// written.
///
/// The part file is created (or truncated) even for a degenerate segment, in
/// which case no request is sent and the file stays empty. Anything other than
/// a `206 Partial Content` response carrying exactly the requested bytes is an
/// error.
pub async fn fetch_segment(
    client: &Client,
    url: &str,
    segment: Segment,
    part_path: &Path,
    events: &Events,
) -> Result<u64> {
    let stage = Stage::Fetch(segment.index);

    let file = File::create(part_path)
        .await
        .map_err(|e| ParcelError::filesystem(stage, part_path, e))?;

    let range = match segment.range_header() {
        Some(range) => range,
        None => {
            debug!(segment = segment.index, "degenerate segment, nothing to fetch");
            return Ok(0);
        }
    };

    let response = client
        .get(url)
        .header(header::RANGE, &range)
        .send()
        .await
        .map_err(|e| ParcelError::connectivity(stage, url, e))?;

    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Err(ParcelError::transfer(
            stage,
            format!(
                "expected 206 Partial Content for {}, got {}",
                range,
                response.status()
            ),
        ));
    }

    let mut writer = BufWriter::new(file);
    let mut bytes_stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(data) = bytes_stream.next().await {
        let bytes = data
            .map_err(|e| ParcelError::transfer(stage, format!("body read failed: {}", e)))?;
        writer
            .write_all(&bytes)
            .await
            .map_err(|e| ParcelError::filesystem(stage, part_path, e))?;
        written += bytes.len() as u64;
        events.send(Event::Progress {
            segment: segment.index,
            bytes: bytes.len() as u64,
        });
    }
    writer
        .flush()
        .await
        .map_err(|e| ParcelError::filesystem(stage, part_path, e))?;

    if written != segment.len() {
        return Err(ParcelError::transfer(
            stage,
            format!(
                "received {} bytes for {}, expected {}",
                written,
                range,
                segment.len()
            ),
        ));
    }

    debug!(segment = segment.index, bytes = written, "segment fetched");
    Ok(written)
}
