use super::sink::{AudioSink, SinkFactory};
use crate::error::StorageError;
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Raw PCM file writer
///
/// Bytes are appended exactly as captured: no container header, no
/// conversion. The file is flushed and synced to disk on close.
pub struct PcmFileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl PcmFileSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let file = File::create(&path).map_err(|source| StorageError::Create {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Created recording file {:?}", path);

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            bytes_written: 0,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl AudioSink for PcmFileSink {
    fn append(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            StorageError::Write(std::io::Error::other("recording file already closed"))
        })?;
        writer.write_all(bytes).map_err(StorageError::Write)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<(), StorageError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };

        let file = writer
            .into_inner()
            .map_err(|e| StorageError::Close(e.into_error()))?;
        file.sync_all().map_err(StorageError::Close)?;

        tracing::debug!(
            "Closed recording file {:?} ({} bytes)",
            self.path,
            self.bytes_written
        );
        Ok(())
    }
}

impl Drop for PcmFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                tracing::warn!("Failed to flush recording {:?} on drop: {}", self.path, e);
            }
        }
    }
}

/// Deterministic per-session file name: `<dir>/<unix millis>.pcm`
pub fn recording_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}.pcm", at.timestamp_millis()))
}

/// Creates a [`PcmFileSink`] per session
#[derive(Debug, Clone, Copy, Default)]
pub struct PcmFileFactory;

impl SinkFactory for PcmFileFactory {
    fn create(&self, path: &Path) -> Result<Box<dyn AudioSink>, StorageError> {
        Ok(Box::new(PcmFileSink::create(path)?))
    }
}
