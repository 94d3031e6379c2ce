use crate::array::Batch;
use std::io::{Result, Write};

pub(crate) fn write_csv_header<W: Write>(writer: &mut W, sensor_names: &[String]) -> Result<()> {
    write!(writer, "Timestamp")?;
    for name in sensor_names {
        write!(writer, ",{name}")?;
    }
    writeln!(writer)
}

pub(crate) fn write_csv_row<W: Write>(writer: &mut W, batch: &Batch) -> Result<()> {
    write!(writer, "{:.3}", batch.timestamp.as_secs_f64())?;
    for distance_mm in batch.distances() {
        write!(writer, ",{:.3}", f64::from(distance_mm))?;
    }
    writeln!(writer)
}
