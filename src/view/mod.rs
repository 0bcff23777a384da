pub mod latest;
pub mod spectrum;
pub mod waveform;
