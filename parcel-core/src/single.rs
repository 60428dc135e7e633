use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tracing::debug;

use crate::{
    errors::{ParcelError, Result, Stage},
    event::{Event, Events},
    layout::remove_file_if_exists,
};

/// Downloads the whole resource with one plain GET straight into
/// `output_path`, creating or overwriting it. Returns the bytes written.
///
/// A failed transfer removes the partially written output.
pub async fn fetch_whole(
    client: &Client,
    url: &str,
    output_path: &Path,
    events: &Events,
) -> Result<u64> {
    let result = stream_to_file(client, url, output_path, events).await;
    if result.is_err() {
        remove_file_if_exists(output_path).await;
    }
    result
}

async fn stream_to_file(
    client: &Client,
    url: &str,
    output_path: &Path,
    events: &Events,
) -> Result<u64> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ParcelError::connectivity(Stage::Single, url, e))?;

    if !response.status().is_success() {
        return Err(ParcelError::transfer(
            Stage::Single,
            format!("server answered {}", response.status()),
        ));
    }
    let expected = response.content_length();

    let file = File::create(output_path)
        .await
        .map_err(|e| ParcelError::filesystem(Stage::Single, output_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut bytes_stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(data) = bytes_stream.next().await {
        let bytes = data.map_err(|e| {
            ParcelError::transfer(Stage::Single, format!("body read failed: {}", e))
        })?;
        writer
            .write_all(&bytes)
            .await
            .map_err(|e| ParcelError::filesystem(Stage::Single, output_path, e))?;
        written += bytes.len() as u64;
        events.send(Event::Progress {
            segment: 0,
            bytes: bytes.len() as u64,
        });
    }
    writer
        .flush()
        .await
        .map_err(|e| ParcelError::filesystem(Stage::Single, output_path, e))?;

    if let Some(expected) = expected {
        if expected != written {
            return Err(ParcelError::transfer(
                Stage::Single,
                format!("received {} bytes, expected {}", written, expected),
            ));
        }
    }

    debug!(%url, bytes = written, "single-stream fetch complete");
    Ok(written)
}
