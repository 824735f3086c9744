//! Result materialization - turns a finished operation into a local video.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::client::{VeoClient, VeoError};
use super::operation::OperationHandle;

/// File name used when saving a result into a directory.
pub const DOWNLOAD_FILENAME: &str = "timelapse.mp4";

/// A finished video held in a temporary file for the current session.
///
/// The file is deleted when the resource is released or dropped; paths
/// handed out earlier stop resolving at that point.
#[derive(Debug)]
pub struct VideoResource {
    file: NamedTempFile,
    size_bytes: u64,
    source_uri: String,
}

impl VideoResource {
    /// Local path of the video, valid until the resource is released.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Remote location the video was fetched from.
    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// Copy the video to `dest`.
    ///
    /// If `dest` is an existing directory the video is saved inside it as
    /// `timelapse.mp4`. Returns the path written.
    pub fn save_as(&self, dest: &Path) -> Result<PathBuf, std::io::Error> {
        let target = if dest.is_dir() {
            dest.join(DOWNLOAD_FILENAME)
        } else {
            dest.to_path_buf()
        };
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::copy(self.file.path(), &target)?;
        Ok(target)
    }

    /// Delete the backing file now.
    pub fn release(self) -> Result<(), std::io::Error> {
        log::debug!("Releasing video at {}", self.file.path().display());
        self.file.close()
    }
}

/// Download the result of a finished operation into a new `VideoResource`.
///
/// # Errors
///
/// - `VeoError::Operation` if the operation finished with an error
/// - `VeoError::ContentFiltered` if the provider filtered every video
/// - `VeoError::NoResult` if it finished without a result URI
/// - `VeoError::Download`, `VeoError::HttpError` or `VeoError::IoError`
///   if fetching or storing the video fails
pub async fn materialize(
    client: &VeoClient,
    handle: &OperationHandle,
) -> Result<VideoResource, VeoError> {
    let status = handle.status();

    if let Some(error) = status.error_info {
        log::error!("Operation {} failed: {}", handle.name(), error.message);
        return Err(VeoError::Operation {
            code: error.code,
            message: error.message,
        });
    }

    let Some(uri) = status.result_uri else {
        if !status.filtered_reasons.is_empty() {
            return Err(VeoError::ContentFiltered {
                reasons: status.filtered_reasons.join("; "),
            });
        }
        log::error!("Operation {} completed without a video URI", handle.name());
        return Err(VeoError::NoResult);
    };

    let temp = tempfile::Builder::new()
        .prefix("timelapse-")
        .suffix(".mp4")
        .tempfile()?;
    let mut file = tokio::fs::File::from_std(temp.reopen()?);

    log::info!("Downloading video from: {}", uri);
    let size_bytes = client.download_to(&uri, &mut file).await?;
    log::info!(
        "Video materialized at {} ({} bytes)",
        temp.path().display(),
        size_bytes
    );

    Ok(VideoResource {
        file: temp,
        size_bytes,
        source_uri: uri,
    })
}
