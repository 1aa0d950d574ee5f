//! Audio format utilities.
//!
//! This module provides the conversions between the device and the file:
//! - Input downmix (interleaved f32 or i16 → mono f32)
//! - Sample quantization (f32 → 16-bit PCM)
//! - The canonical PCM WAV container

mod convert;
mod wav;

pub use convert::{dequantize_sample, downmix_into, i16_to_f32, quantize, quantize_sample};
pub use wav::{write_wav, write_wav_file, WAV_HEADER_SIZE};
