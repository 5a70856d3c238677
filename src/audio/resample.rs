//! Downmix and sample-rate conversion for the capture boundary.
//!
//! The platform delivers interleaved stereo 16-bit PCM at 48 kHz; everything
//! downstream (VAD, segmentation, the worker protocol) runs on mono 16 kHz.
//! Linear interpolation is enough here: the upstream codec already
//! band-limits the signal, so there is nothing above Nyquist to alias.

use crate::error::{Result, VoicelogError};

/// Sample rate delivered by the capture source.
pub const SOURCE_SAMPLE_RATE: u32 = 48_000;
/// Canonical internal sample rate.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Collapses interleaved samples to mono.
///
/// Stereo averages left/right with a saturating clamp; mono is identity.
/// Any other channel count is a configuration error.
pub fn downmix(samples: &[i16], channels: u16) -> Result<Vec<i16>> {
    match channels {
        1 => Ok(samples.to_vec()),
        2 => Ok(samples
            .chunks_exact(2)
            .map(|pair| {
                let avg = (pair[0] as i32 + pair[1] as i32) / 2;
                avg.clamp(i16::MIN as i32, i16::MAX as i32) as i16
            })
            .collect()),
        other => Err(VoicelogError::InvalidFrame {
            message: format!("unsupported channel count: {other}"),
        }),
    }
}

/// Resamples mono PCM by linear interpolation.
///
/// Output length is `round(len * to_hz / from_hz)`, minimum 1.
pub fn resample(samples: &[i16], from_hz: u32, to_hz: u32) -> Vec<i16> {
    if samples.is_empty() || from_hz == to_hz {
        return samples.to_vec();
    }
    let out_len = ((samples.len() as f64 * to_hz as f64 / from_hz as f64).round() as usize).max(1);
    let step = from_hz as f64 / to_hz as f64;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let s = i as f64 * step;
        let i0 = (s.floor() as usize).min(samples.len() - 1);
        let i1 = (i0 + 1).min(samples.len() - 1);
        let t = s - i0 as f64;
        let v = samples[i0] as f64 * (1.0 - t) + samples[i1] as f64 * t;
        out.push(v.round() as i16);
    }
    out
}

/// Converts an interleaved stereo 48 kHz 16-bit LE byte buffer to mono
/// 16 kHz samples. An incomplete trailing sample is dropped.
pub fn stereo48_to_mono16(bytes: &[u8]) -> Result<Vec<i16>> {
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    let mono = downmix(&samples, 2)?;
    Ok(resample(&mono, SOURCE_SAMPLE_RATE, TARGET_SAMPLE_RATE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(rate: u32, secs: f64, freq: f64, amp: f64) -> Vec<i16> {
        let n = (rate as f64 * secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / rate as f64;
                (amp * (2.0 * std::f64::consts::PI * freq * t).sin()) as i16
            })
            .collect()
    }

    #[test]
    fn test_downmix_mono_is_identity() {
        let samples = vec![1i16, -2, 3, -4];
        assert_eq!(downmix(&samples, 1).unwrap(), samples);
    }

    #[test]
    fn test_downmix_stereo_averages() {
        let interleaved = vec![100i16, 200, -100, -300];
        assert_eq!(downmix(&interleaved, 2).unwrap(), vec![150, -200]);
    }

    #[test]
    fn test_downmix_extremes_stay_in_range() {
        let interleaved = vec![i16::MIN, i16::MIN, i16::MAX, i16::MAX];
        let mono = downmix(&interleaved, 2).unwrap();
        assert_eq!(mono, vec![i16::MIN, i16::MAX]);
    }

    #[test]
    fn test_downmix_rejects_other_channel_counts() {
        assert!(downmix(&[0i16; 6], 3).is_err());
        assert!(downmix(&[0i16; 6], 0).is_err());
    }

    #[test]
    fn test_resample_length_formula() {
        let input = vec![0i16; 4800];
        assert_eq!(resample(&input, 48_000, 16_000).len(), 1600);
        let input = vec![0i16; 160];
        assert_eq!(resample(&input, 16_000, 48_000).len(), 480);
        // Never empty
        assert_eq!(resample(&[7i16], 48_000, 16_000).len(), 1);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![5i16, -5, 10];
        assert_eq!(resample(&input, 16_000, 16_000), input);
    }

    #[test]
    fn test_stereo_roundtrip_within_one_lsb_rms() {
        // Synthesize a mono 16 kHz tone, upsample to 48 kHz stereo, run it
        // back through the capture path, and compare.
        let original = sine(16_000, 0.5, 440.0, 8000.0);
        let up = resample(&original, 16_000, 48_000);
        let mut bytes = Vec::with_capacity(up.len() * 4);
        for s in &up {
            bytes.extend_from_slice(&s.to_le_bytes());
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        let recovered = stereo48_to_mono16(&bytes).unwrap();
        assert_eq!(recovered.len(), original.len());

        let err_sq: f64 = original
            .iter()
            .zip(&recovered)
            .map(|(&a, &b)| {
                let d = a as f64 - b as f64;
                d * d
            })
            .sum();
        let rms = (err_sq / original.len() as f64).sqrt();
        // A 440 Hz tone is far below Nyquist at both rates; linear
        // interpolation error stays in the last bit.
        assert!(rms <= 1.0, "round-trip RMS error too large: {rms}");
    }

    #[test]
    fn test_stereo48_drops_incomplete_trailing_sample() {
        let bytes = vec![0u8; 13];
        // 13 bytes = 6 complete i16 samples = 3 stereo pairs
        let mono = stereo48_to_mono16(&bytes).unwrap();
        assert_eq!(mono.len(), 1); // round(3 / 3) = 1
    }
}
