use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::fs;
use tracing::warn;

use crate::errors::{ParcelError, Result, Stage};

const PARTS_DIR_SUFFIX: &str = ".parts";

/// Scratch directory for the part files of `output_path`.
///
/// It sits next to the output and is named after the file name up to its
/// first `.`, so `out/video.tar.gz` uses `out/video.parts`.
pub fn parts_dir(output_path: &Path) -> PathBuf {
    let file_name = output_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match file_name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem,
        // Dotfiles like ".bashrc" have no stem before the first dot.
        _ => file_name.trim_start_matches('.'),
    };

    let mut dir_name = OsString::from(stem);
    dir_name.push(PARTS_DIR_SUFFIX);
    output_path.with_file_name(dir_name)
}

/// Path of the part file holding segment `index` of `output_path`.
pub fn part_file_path(output_path: &Path, index: usize) -> PathBuf {
    let mut part_name = output_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    part_name.push(format!("-{}", index));
    parts_dir(output_path).join(part_name)
}

/// Creates the parts directory (and any missing parents) before fan-out.
///
/// The directory itself must not exist yet: it is removed with everything in
/// it once the attempt ends, so a directory this call did not create is
/// refused with an `AlreadyExists` error.
pub async fn create_parts_dir(output_path: &Path) -> Result<PathBuf> {
    let dir = parts_dir(output_path);
    if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ParcelError::filesystem(Stage::Prepare, parent, e))?;
    }
    fs::create_dir(&dir)
        .await
        .map_err(|e| ParcelError::filesystem(Stage::Prepare, &dir, e))?;
    Ok(dir)
}

/// Removes the parts directory with whatever is left inside it. A directory
/// that is already gone is not an error.
pub async fn remove_parts_dir(output_path: &Path) -> Result<()> {
    let dir = parts_dir(output_path);
    match fs::remove_dir_all(&dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not remove parts directory");
            Err(ParcelError::filesystem(Stage::Merge, dir, e))
        }
    }
}

/// Removes a file if present, ignoring a missing one.
pub(crate) async fn remove_file_if_exists(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "could not remove file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parts_dir_strips_every_extension() {
        assert_eq!(
            parts_dir(Path::new("out/go1.18.3.linux-amd64.tar.gz")),
            PathBuf::from("out/go1.parts")
        );
        assert_eq!(parts_dir(Path::new("video.mp4")), PathBuf::from("video.parts"));
    }

    #[test]
    fn test_parts_dir_without_extension_differs_from_output() {
        let output = Path::new("downloads/data");
        assert_eq!(parts_dir(output), PathBuf::from("downloads/data.parts"));
        assert_ne!(parts_dir(output), output);
    }

    #[test]
    fn test_parts_dir_for_dotfile() {
        assert_eq!(parts_dir(Path::new(".bashrc")), PathBuf::from("bashrc.parts"));
    }

    #[test]
    fn test_part_file_path() {
        assert_eq!(
            part_file_path(Path::new("out/main.zip"), 3),
            PathBuf::from("out/main.parts/main.zip-3")
        );
    }

    #[tokio::test]
    async fn test_create_and_remove_parts_dir() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("nested").join("file.bin");

        let parts = create_parts_dir(&output).await.unwrap();
        assert!(parts.is_dir());
        fs::write(part_file_path(&output, 0), b"leftover").await.unwrap();

        remove_parts_dir(&output).await.unwrap();
        assert!(!parts.exists());

        // Second removal is a no-op.
        remove_parts_dir(&output).await.unwrap();
    }

    #[tokio::test]
    async fn test_existing_parts_dir_is_refused() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("report.pdf");
        let foreign = parts_dir(&output);
        std::fs::create_dir(&foreign).unwrap();
        std::fs::write(foreign.join("thesis.docx"), b"keep me").unwrap();

        let err = create_parts_dir(&output).await.unwrap_err();

        match err {
            ParcelError::Filesystem {
                stage: Stage::Prepare,
                source,
                ..
            } => assert_eq!(source.kind(), ErrorKind::AlreadyExists),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(std::fs::read(foreign.join("thesis.docx")).unwrap(), b"keep me");
    }
}
