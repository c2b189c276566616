use crate::snapshot::Snapshot;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::SystemTime;

pub struct SnapshotLog {
    writer: BufWriter<File>,
}

#[derive(Serialize)]
struct SnapshotEntry<'a> {
    timestamp: String,
    snapshot: &'a Snapshot,
}

#[derive(Serialize)]
struct ErrorEntry<'a> {
    timestamp: String,
    error: &'a str,
}

impl SnapshotLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn log_snapshot(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        self.write_line(&SnapshotEntry {
            timestamp: humantime::format_rfc3339_seconds(snapshot.timestamp).to_string(),
            snapshot,
        })
    }

    pub fn log_error(&mut self, error: &dyn std::fmt::Display) -> io::Result<()> {
        let text = error.to_string();
        self.write_line(&ErrorEntry {
            timestamp: humantime::format_rfc3339_seconds(SystemTime::now()).to_string(),
            error: &text,
        })
    }

    pub fn close(mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn write_line<T: Serialize>(&mut self, entry: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}
