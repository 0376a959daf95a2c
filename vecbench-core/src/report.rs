use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::{BackendKind, TargetDescriptor};
use crate::error::Result;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Keys the record always owns, whatever the descriptor carried
const TIMING_KEYS: [&str; 3] = ["start_time", "end_time", "duration"];

/// Wall-clock timestamps for the record, monotonic clock for the duration
pub struct Stopwatch {
    started_at: DateTime<Local>,
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started_at: Local::now(),
            start: Instant::now(),
        }
    }

    pub fn stop(self) -> Timing {
        let duration = self.start.elapsed();
        Timing {
            started_at: self.started_at,
            ended_at: Local::now(),
            duration,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub duration: Duration,
}

/// A target descriptor plus the timing of the run against it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(flatten)]
    pub target: TargetDescriptor,
    pub start_time: String,
    pub end_time: String,
    /// Seconds
    pub duration: f64,
}

impl ResultRecord {
    pub fn new(mut target: TargetDescriptor, timing: Timing) -> Self {
        for key in TIMING_KEYS {
            target.extra.remove(key);
        }

        Self {
            target,
            start_time: timing.started_at.format(TIMESTAMP_FORMAT).to_string(),
            end_time: timing.ended_at.format(TIMESTAMP_FORMAT).to_string(),
            duration: timing.duration.as_secs_f64(),
        }
    }
}

/// `{collection}_{db_type}_result.json`
pub fn load_result_name(collection: &str, kind: BackendKind) -> String {
    format!("{collection}_{kind}_result.json")
}

/// `search_{collection}_{db_type}_result.json`
pub fn search_result_name(collection: &str, kind: BackendKind) -> String {
    format!("search_{collection}_{kind}_result.json")
}

/// Serialize `record` as 4-space indented JSON into `out_dir/file_name`
pub fn write_result(out_dir: &Path, file_name: &str, record: &ResultRecord) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(file_name);

    let mut writer = BufWriter::new(File::create(&path)?);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    record.serialize(&mut serializer)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(path)
}
