//! CSV recorder
//!
//! The acquisition loop hands batches over a channel; a writing thread appends them to the
//! output file so disk latency never stretches the gap between sensor pings.

mod channel_messages;
mod writing_thread;

use crate::array::Batch;
use crate::error::{Error, Result};
use channel_messages::AcquisitionToWriterChannelMessage::{self, Data, EndThread};
use chrono::Local;
use crossbeam::channel::{unbounded, Sender};
use log::{error, info};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use writing_thread::{write_csv_header, writing_thread_logic};

pub struct Recorder {
    path: PathBuf,
    sender: Sender<AcquisitionToWriterChannelMessage>,
    writing_thread: Option<JoinHandle<std::io::Result<usize>>>,
}

impl Recorder {
    /// Creates the file (and missing parent directories), writes the header and starts the
    /// writing thread.
    pub fn create(path: &Path, sensor_names: &[String]) -> Result<Self> {
        let to_record_error = |source: std::io::Error| Error::Record {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(to_record_error)?;
        }
        let mut file = BufWriter::new(File::create(path).map_err(to_record_error)?);
        write_csv_header(&mut file, sensor_names).map_err(to_record_error)?;
        info!("Recording to {}", path.display());

        let (sender, receiver) = unbounded();
        let writing_thread = thread::spawn(move || writing_thread_logic(file, receiver));

        Ok(Recorder {
            path: path.to_path_buf(),
            sender,
            writing_thread: Some(writing_thread),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, batch: Batch) {
        if self.sender.send(Data(batch)).is_err() {
            error!("Writing thread for {} has stopped", self.path.display());
        }
    }

    /// Flushes outstanding batches and returns the number of rows written.
    pub fn finish(mut self) -> Result<usize> {
        self.join_writer()
    }

    fn join_writer(&mut self) -> Result<usize> {
        let Some(thread_handle) = self.writing_thread.take() else {
            return Ok(0);
        };
        // The writer may already be gone after an I/O error; its result is reported below.
        let _ = self.sender.send(EndThread);
        let source = match thread_handle.join() {
            Ok(Ok(rows)) => return Ok(rows),
            Ok(Err(err)) => err,
            Err(_) => std::io::Error::new(std::io::ErrorKind::Other, "writing thread panicked"),
        };
        Err(Error::Record {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(err) = self.join_writer() {
            error!("{err}");
        }
    }
}

/// Inserts a local date-time stamp before the extension, e.g. `run.csv` becomes
/// `run_20240501_142530.csv`.
pub fn timestamped_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "record".to_string());
    let file_name = match path.extension() {
        Some(extension) => format!("{stem}_{stamp}.{}", extension.to_string_lossy()),
        None => format!("{stem}_{stamp}"),
    };
    path.with_file_name(file_name)
}
