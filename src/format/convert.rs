//! Sample conversions: input downmix and output quantization.

/// Scale factor between `[-1.0, 1.0]` and 16-bit PCM.
const I16_SCALE: f32 = 32767.0;

/// Converts a 16-bit input sample to `f32` in `[-1.0, 1.0)`.
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Averages interleaved frames of `channels` samples into `out`.
///
/// Converts each sample with `to_f32` first. Writes at most `out.len()`
/// frames and returns how many were written; a trailing partial frame is
/// ignored. Never allocates, so it is safe to call from the audio callback.
pub fn downmix_into<S: Copy>(
    interleaved: &[S],
    channels: usize,
    to_f32: fn(S) -> f32,
    out: &mut [f32],
) -> usize {
    let channels = channels.max(1);
    let mut frames = 0;
    for (slot, frame) in out.iter_mut().zip(interleaved.chunks_exact(channels)) {
        let sum: f32 = frame.iter().map(|&s| to_f32(s)).sum();
        *slot = sum / channels as f32;
        frames += 1;
    }
    frames
}

/// Quantizes one `f32` sample to 16-bit PCM.
///
/// Computes `round(sample * 32767)` (half away from zero) and clamps to the
/// `i16` range. Uses × 32767 (not 32768) for symmetric scaling, so `1.0`
/// maps to `32767` and `-1.0` to `-32767`; only inputs below `-1.0` reach
/// `-32768`. NaN maps to `0`. No dithering: equal inputs give equal outputs.
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    (sample * I16_SCALE).round().clamp(-32768.0, 32767.0) as i16
}

/// Quantizes a slice of samples.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| quantize_sample(s)).collect()
}

/// Converts a 16-bit PCM sample back to `f32` using the same scale.
#[inline]
pub fn dequantize_sample(sample: i16) -> f32 {
    f32::from(sample) / I16_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_full_range() {
        assert_eq!(quantize_sample(1.0), 32767);
        assert_eq!(quantize_sample(-1.0), -32767);
        assert_eq!(quantize_sample(0.0), 0);
    }

    #[test]
    fn test_quantize_clamping() {
        assert_eq!(quantize_sample(1.0001), 32767);
        assert_eq!(quantize_sample(2.0), 32767);
        assert_eq!(quantize_sample(-1.00002), -32768);
        assert_eq!(quantize_sample(-2.0), -32768);
    }

    #[test]
    fn test_quantize_rounds_to_nearest() {
        // 0.5 * 32767 = 16383.5, rounded half away from zero
        assert_eq!(quantize_sample(0.5), 16384);
        assert_eq!(quantize_sample(-0.5), -16384);
        // 0.25 * 32767 = 8191.75
        assert_eq!(quantize_sample(0.25), 8192);
        assert_eq!(quantize_sample(1.0 / 32767.0), 1);
        assert_eq!(quantize_sample(0.4 / 32767.0), 0);
    }

    #[test]
    fn test_quantize_nan_is_silence() {
        assert_eq!(quantize_sample(f32::NAN), 0);
    }

    #[test]
    fn test_roundtrip_within_one_step() {
        let step = 1.0 / 32767.0;
        for i in -1000..=1000 {
            let original = i as f32 / 1000.0;
            let back = dequantize_sample(quantize_sample(original));
            assert!((original - back).abs() <= step, "{original} -> {back}");
        }
    }

    #[test]
    fn test_i16_to_f32_full_range() {
        assert_eq!(i16_to_f32(-32768), -1.0);
        assert_eq!(i16_to_f32(0), 0.0);
        assert!((i16_to_f32(32767) - 1.0).abs() < 1e-4);
        assert_eq!(i16_to_f32(16384), 0.5);
    }

    #[test]
    fn test_downmix_stereo_averages() {
        let stereo = [0.5_f32, 0.25, -1.0, 1.0, 0.2, 0.2];
        let mut out = [0.0; 8];
        let frames = downmix_into(&stereo, 2, std::convert::identity, &mut out);
        assert_eq!(frames, 3);
        assert_eq!(&out[..3], &[0.375, 0.0, 0.2]);
    }

    #[test]
    fn test_downmix_i16_input() {
        let stereo: [i16; 4] = [16384, 16384, -32768, 0];
        let mut out = [0.0; 2];
        let frames = downmix_into(&stereo, 2, i16_to_f32, &mut out);
        assert_eq!(frames, 2);
        assert_eq!(out, [0.5, -0.5]);
    }

    #[test]
    fn test_downmix_stops_at_output_len() {
        let mono = [0.1_f32; 10];
        let mut out = [0.0; 4];
        assert_eq!(downmix_into(&mono, 1, std::convert::identity, &mut out), 4);
        assert_eq!(out, [0.1; 4]);
    }

    #[test]
    fn test_downmix_ignores_partial_frame() {
        let data = [0.1_f32, 0.3, 0.5];
        let mut out = [0.0; 4];
        assert_eq!(downmix_into(&data, 2, std::convert::identity, &mut out), 1);
        assert!((out[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_batch_quantize() {
        let pcm = quantize(&[0.0, 0.5, -0.5, 1.0, -1.0]);
        assert_eq!(pcm, vec![0, 16384, -16384, 32767, -32767]);
    }
}
