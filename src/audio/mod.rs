//! Audio reassembly.

pub mod assemble;

pub use assemble::{parse_out_time, Assembler, EncodeProgress, DEFAULT_FFMPEG};
