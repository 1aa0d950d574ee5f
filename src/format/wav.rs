//! Canonical PCM WAV writer.
//!
//! The whole window is materialized before writing, so the header is written
//! once with final sizes; no seeking back is needed.
//! See: http://soundfile.sapp.org/doc/WaveFormat/

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Size of the WAV header in bytes (RIFF + fmt + data chunk headers).
pub const WAV_HEADER_SIZE: usize = 44;

/// Size of the fmt chunk data (16 bytes for PCM).
const WAV_FMT_CHUNK_SIZE: u32 = 16;

/// Audio format code for PCM (uncompressed).
const WAV_FORMAT_PCM: u16 = 1;

/// Bits per sample for 16-bit audio.
const WAV_BITS_PER_SAMPLE: u16 = 16;

/// Bytes per sample (16-bit = 2 bytes).
const BYTES_PER_SAMPLE: usize = 2;

/// Writes a complete 16-bit PCM WAV stream: header, then little-endian samples.
///
/// # Errors
///
/// Returns an error if the data does not fit a WAV container (over 4 GiB) or
/// the writer fails.
pub fn write_wav<W: Write>(
    writer: &mut W,
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
) -> io::Result<()> {
    let data_size = u32::try_from(samples.len() * BYTES_PER_SAMPLE)
        .ok()
        .filter(|size| size.checked_add(WAV_HEADER_SIZE as u32).is_some())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "audio too long for WAV"))?;

    write_wav_header(writer, sample_rate, channels, data_size)?;
    for sample in samples {
        writer.write_all(&sample.to_le_bytes())?;
    }
    Ok(())
}

/// Creates (or truncates) `path` and writes a WAV file to it.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn write_wav_file(
    path: &Path,
    samples: &[i16],
    sample_rate: u32,
    channels: u16,
) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_wav(&mut writer, samples, sample_rate, channels)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

/// Writes the 44-byte header for `data_size` bytes of 16-bit PCM.
fn write_wav_header<W: Write>(
    writer: &mut W,
    sample_rate: u32,
    channels: u16,
    data_size: u32,
) -> io::Result<()> {
    // RIFF container header
    writer.write_all(b"RIFF")?;
    let file_size = WAV_HEADER_SIZE as u32 - 8 + data_size; // Total size minus RIFF header
    writer.write_all(&file_size.to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    // fmt subchunk (format specification)
    writer.write_all(b"fmt ")?;
    writer.write_all(&WAV_FMT_CHUNK_SIZE.to_le_bytes())?;
    writer.write_all(&WAV_FORMAT_PCM.to_le_bytes())?;
    writer.write_all(&channels.to_le_bytes())?;
    writer.write_all(&sample_rate.to_le_bytes())?;

    let bytes_per_sample = WAV_BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * u32::from(channels) * u32::from(bytes_per_sample);
    writer.write_all(&byte_rate.to_le_bytes())?;

    let block_align = channels * bytes_per_sample;
    writer.write_all(&block_align.to_le_bytes())?;
    writer.write_all(&WAV_BITS_PER_SAMPLE.to_le_bytes())?;

    // data subchunk header
    writer.write_all(b"data")?;
    writer.write_all(&data_size.to_le_bytes())?;

    Ok(())
}
