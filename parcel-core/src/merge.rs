use std::path::Path;

use tokio::{
    fs::{self, File},
    io::{self, AsyncWriteExt, BufWriter},
};
use tracing::debug;

use crate::{
    errors::{ParcelError, Result, Stage},
    layout::{part_file_path, remove_parts_dir},
};

/// Concatenates part files `0..concurrency` into `output_path`, strictly in
/// index order, deleting each part once copied. Returns the size of the output.
///
/// The parts directory is removed on every exit path. On failure the output
/// file may be left truncated; callers must not treat it as complete.
pub async fn merge_parts(output_path: &Path, concurrency: usize) -> Result<u64> {
    let merged = concatenate_parts(output_path, concurrency).await;
    let cleanup = remove_parts_dir(output_path).await;

    let total = merged?;
    cleanup?;
    Ok(total)
}

async fn concatenate_parts(output_path: &Path, concurrency: usize) -> Result<u64> {
    let output = File::create(output_path)
        .await
        .map_err(|e| ParcelError::filesystem(Stage::Merge, output_path, e))?;
    let mut writer = BufWriter::new(output);
    let mut total = 0u64;

    for index in 0..concurrency {
        let part_path = part_file_path(output_path, index);
        let mut part = File::open(&part_path)
            .await
            .map_err(|e| ParcelError::filesystem(Stage::Merge, &part_path, e))?;

        let copied = io::copy(&mut part, &mut writer)
            .await
            .map_err(|e| ParcelError::filesystem(Stage::Merge, output_path, e))?;
        drop(part);
        fs::remove_file(&part_path)
            .await
            .map_err(|e| ParcelError::filesystem(Stage::Merge, &part_path, e))?;

        debug!(segment = index, bytes = copied, "merged part");
        total += copied;
    }

    writer
        .flush()
        .await
        .map_err(|e| ParcelError::filesystem(Stage::Merge, output_path, e))?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{create_parts_dir, parts_dir};
    use tempfile::tempdir;

    const PARTS: [&[u8]; 4] = [b"alpha-", b"", b"bravo-", b"charlie"];

    async fn write_parts(output: &Path, order: impl Iterator<Item = usize>) {
        create_parts_dir(output).await.unwrap();
        for index in order {
            fs::write(part_file_path(output, index), PARTS[index]).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_merge_is_ordered_by_index() {
        let dir = tempdir().unwrap();
        let forward = dir.path().join("forward.bin");
        let reverse = dir.path().join("reverse.bin");

        write_parts(&forward, 0..PARTS.len()).await;
        write_parts(&reverse, (0..PARTS.len()).rev()).await;

        let forward_len = merge_parts(&forward, PARTS.len()).await.unwrap();
        let reverse_len = merge_parts(&reverse, PARTS.len()).await.unwrap();

        let expected = PARTS.concat();
        assert_eq!(forward_len, expected.len() as u64);
        assert_eq!(reverse_len, expected.len() as u64);
        assert_eq!(fs::read(&forward).await.unwrap(), expected);
        assert_eq!(fs::read(&reverse).await.unwrap(), expected);
        assert!(!parts_dir(&forward).exists());
        assert!(!parts_dir(&reverse).exists());
    }

    #[tokio::test]
    async fn test_merge_overwrites_existing_output() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("file.bin");
        fs::write(&output, vec![b'x'; 1024]).await.unwrap();
        write_parts(&output, 0..PARTS.len()).await;

        merge_parts(&output, PARTS.len()).await.unwrap();

        assert_eq!(fs::read(&output).await.unwrap(), PARTS.concat());
    }

    #[tokio::test]
    async fn test_missing_part_fails_and_cleans_up() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("file.bin");
        write_parts(&output, [0, 1, 3].into_iter()).await;

        let err = merge_parts(&output, PARTS.len()).await.unwrap_err();

        assert!(matches!(err, ParcelError::Filesystem { stage: Stage::Merge, .. }));
        assert!(!parts_dir(&output).exists());
    }
}
