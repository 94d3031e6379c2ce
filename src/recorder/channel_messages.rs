use crate::array::Batch;

pub enum AcquisitionToWriterChannelMessage {
    Data(Batch),
    EndThread,
}
