// crates/live/src/jsonl.rs
//! Replay a captured feed from a JSON Lines file, one record per line.
//!
//! Lines are read as bytes. Invalid UTF-8 is replaced rather than rejected, so
//! one damaged line becomes an undecodable record instead of ending the replay.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::SourceError;
use crate::source::{Connector, EventSource, ResumePoint};

pub struct JsonlSource {
    path: PathBuf,
    reader: BufReader<File>,
    line: Vec<u8>,
}

impl JsonlSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|e| SourceError::io(&path, e))?;
        Ok(Self {
            path,
            reader: BufReader::new(file),
            line: Vec::new(),
        })
    }
}

#[async_trait]
impl EventSource for JsonlSource {
    async fn next_record(&mut self) -> Result<Option<String>, SourceError> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.line)
                .await
                .map_err(|e| SourceError::io(&self.path, e))?;
            if read == 0 {
                return Ok(None);
            }

            let line = String::from_utf8_lossy(&self.line);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }
}

/// Opens the same file on every connect; replays always start from the top.
#[derive(Debug, Clone)]
pub struct JsonlConnector {
    path: PathBuf,
}

impl JsonlConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Connector for JsonlConnector {
    async fn connect(&self, _resume: &ResumePoint) -> Result<Box<dyn EventSource>, SourceError> {
        Ok(Box::new(JsonlSource::open(&self.path).await?))
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}
