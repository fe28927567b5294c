pub mod record;
pub mod sample;
pub mod seq;

pub use seq::{SampleSink, SeqWriter};
