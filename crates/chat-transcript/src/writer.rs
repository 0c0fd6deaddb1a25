use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::record::TranscriptRecord;

/// Rotated files kept next to the live one unless configured otherwise.
pub const DEFAULT_KEEP: usize = 3;

/// Queue depth between the bus and the writer task.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Where and how a transcript is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptConfig {
    pub path: PathBuf,
    /// Rotate once the live file would grow past this many bytes.
    pub max_bytes: Option<u64>,
    /// Rotated files to keep (`transcript.jsonl.1` is the newest).
    pub keep: usize,
    pub queue_capacity: usize,
}

impl TranscriptConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: None,
            keep: DEFAULT_KEEP,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_rotation(mut self, max_bytes: u64, keep: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self.keep = keep;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptWriteError {
    #[error("failed to create parent directories: {0}")]
    CreateDir(std::io::Error),

    #[error("failed to open transcript file: {0}")]
    OpenFile(std::io::Error),

    #[error("failed to serialize transcript record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write to transcript: {0}")]
    Write(std::io::Error),

    #[error("failed to flush transcript: {0}")]
    Flush(std::io::Error),

    #[error("failed to rotate transcript: {0}")]
    Rotate(std::io::Error),
}

/// Appends [`TranscriptRecord`]s as JSON lines, rotating the file by size.
pub struct TranscriptWriter {
    config: TranscriptConfig,
    file: BufWriter<File>,
    written: u64,
}

impl TranscriptWriter {
    /// Open (or create) the configured file in append mode. Bytes already in
    /// the file count towards the rotation threshold.
    pub async fn open(config: TranscriptConfig) -> Result<Self, TranscriptWriteError> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(TranscriptWriteError::CreateDir)?;
        }

        let file = open_append(&config.path).await?;
        let written = file
            .metadata()
            .await
            .map_err(TranscriptWriteError::OpenFile)?
            .len();

        Ok(Self {
            config,
            file: BufWriter::new(file),
            written,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub async fn write(&mut self, record: &TranscriptRecord) -> Result<(), TranscriptWriteError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        if let Some(max) = self.config.max_bytes {
            if self.written > 0 && self.written + line.len() as u64 > max {
                self.rotate().await?;
            }
        }

        self.file
            .write_all(&line)
            .await
            .map_err(TranscriptWriteError::Write)?;
        self.written += line.len() as u64;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), TranscriptWriteError> {
        self.file.flush().await.map_err(TranscriptWriteError::Flush)
    }

    /// Shift `path.N` to `path.N+1`, move the live file to `path.1` and start
    /// an empty live file. The oldest file beyond `keep` is discarded.
    async fn rotate(&mut self) -> Result<(), TranscriptWriteError> {
        self.flush().await?;
        let path = self.config.path.clone();

        if self.config.keep == 0 {
            remove_if_present(&path).await?;
        } else {
            remove_if_present(&rotated_path(&path, self.config.keep)).await?;
            for n in (1..self.config.keep).rev() {
                rename_if_present(&rotated_path(&path, n), &rotated_path(&path, n + 1)).await?;
            }
            rename_if_present(&path, &rotated_path(&path, 1)).await?;
        }

        self.file = BufWriter::new(open_append(&path).await?);
        self.written = 0;
        tracing::info!(path = %path.display(), keep = self.config.keep, "transcript rotated");
        Ok(())
    }
}

/// `transcript.jsonl` + 2 -> `transcript.jsonl.2`.
pub fn rotated_path(path: &Path, n: usize) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

async fn open_append(path: &Path) -> Result<File, TranscriptWriteError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(TranscriptWriteError::OpenFile)
}

async fn rename_if_present(from: &Path, to: &Path) -> Result<(), TranscriptWriteError> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(TranscriptWriteError::Rotate(err)),
    }
}

async fn remove_if_present(path: &Path) -> Result<(), TranscriptWriteError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(TranscriptWriteError::Rotate(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_names_append_a_counter() {
        assert_eq!(
            rotated_path(Path::new("logs/chat.jsonl"), 2),
            PathBuf::from("logs/chat.jsonl.2")
        );
    }

    #[test]
    fn queue_capacity_is_at_least_one() {
        assert_eq!(TranscriptConfig::new("t.jsonl").with_queue_capacity(0).queue_capacity, 1);
    }
}
