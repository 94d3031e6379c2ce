mod csv_utils;
use super::channel_messages::AcquisitionToWriterChannelMessage::{self, Data, EndThread};
use crossbeam::channel::Receiver;
use csv_utils::write_csv_row;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Result, Write};

pub(crate) use csv_utils::write_csv_header;

/// Appends one row per batch until `EndThread` arrives or every sender is gone.
/// Returns the number of rows written.
pub fn writing_thread_logic(
    mut file: BufWriter<File>,
    receiver: Receiver<AcquisitionToWriterChannelMessage>,
) -> Result<usize> {
    let mut rows = 0;

    for message in receiver {
        match message {
            EndThread => break,
            Data(batch) => {
                write_csv_row(&mut file, &batch)?;
                rows += 1;
            }
        }
    }

    file.flush()?;
    debug!("Writer finished after {rows} rows");
    Ok(rows)
}
