//! # Silence Analysis
//!
//! Frame-level energy and zero-crossing-rate analysis with adaptive
//! per-segment thresholds. The signal is divided into five equal segments
//! and each segment gets its own (energy, ZCR) threshold pair at
//! mean + 3·stddev — absolute silence and noise floors drift across a long
//! call recording, so one global threshold misclassifies entire stretches.

/// Adaptive threshold pair for one signal segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentThresholds {
    pub energy: f64,
    pub zcr: f64,
}

/// Number of equal-length segments the signal is divided into for
/// threshold adaptation. The last segment absorbs any remainder.
pub const THRESHOLD_SEGMENTS: usize = 5;

/// Sum of squared samples over one frame.
pub fn frame_energy(frame: &[f32]) -> f64 {
    frame.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

/// Number of sign changes between consecutive samples in one frame.
pub fn frame_zcr(frame: &[f32]) -> f64 {
    frame
        .windows(2)
        .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
        .count() as f64
}

/// A signal shorter than `THRESHOLD_SEGMENTS` frames produces a zero
/// segment length; fall back to one segment spanning the whole signal.
fn effective_segment_length(segment_length_samples: usize, total_samples: usize) -> usize {
    if segment_length_samples == 0 {
        total_samples.max(1)
    } else {
        segment_length_samples
    }
}

/// Population mean and standard deviation.
fn mean_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|v| (v - mean) * (v - mean))
        .sum::<f64>()
        / values.len() as f64;
    (mean, variance.sqrt())
}

/// Compute the adaptive threshold pair for each signal segment.
///
/// Each segment is scanned in non-overlapping frames of
/// `frame_length_samples`; its thresholds are mean + 3·stddev of the
/// per-frame energy and ZCR distributions. A signal shorter than one
/// segment still yields thresholds from whatever samples exist.
pub fn compute_segment_thresholds(
    samples: &[f32],
    frame_length_samples: usize,
    segment_length_samples: usize,
) -> Vec<SegmentThresholds> {
    if samples.is_empty() {
        return vec![SegmentThresholds { energy: 0.0, zcr: 0.0 }];
    }

    let segment_length = effective_segment_length(segment_length_samples, samples.len());
    let segment_count = samples
        .len()
        .div_ceil(segment_length)
        .min(THRESHOLD_SEGMENTS);

    let mut thresholds = Vec::with_capacity(segment_count);
    for i in 0..segment_count {
        let start = i * segment_length;
        // The last segment absorbs any remainder.
        let end = if i + 1 == segment_count {
            samples.len()
        } else {
            ((i + 1) * segment_length).min(samples.len())
        };
        let segment = &samples[start..end];
        let n_frames = (segment.len() / frame_length_samples).max(1);

        let mut energies = Vec::with_capacity(n_frames);
        let mut zcrs = Vec::with_capacity(n_frames);
        for j in 0..n_frames {
            let frame_start = j * frame_length_samples;
            let frame_end = ((j + 1) * frame_length_samples).min(segment.len());
            energies.push(frame_energy(&segment[frame_start..frame_end]));
            zcrs.push(frame_zcr(&segment[frame_start..frame_end]));
        }

        let (energy_mean, energy_std) = mean_stddev(&energies);
        let (zcr_mean, zcr_std) = mean_stddev(&zcrs);
        thresholds.push(SegmentThresholds {
            energy: energy_mean + 3.0 * energy_std,
            zcr: zcr_mean + 3.0 * zcr_std,
        });
    }
    thresholds
}

/// Per-frame silence mask over the whole signal.
///
/// A frame is silent iff both its energy and its ZCR sit at or below the
/// thresholds of the segment it falls in.
pub fn silence_mask(
    samples: &[f32],
    frame_length_samples: usize,
    segment_length_samples: usize,
) -> Vec<bool> {
    let thresholds =
        compute_segment_thresholds(samples, frame_length_samples, segment_length_samples);
    let segment_length = effective_segment_length(segment_length_samples, samples.len());

    let mut mask = Vec::new();
    let mut offset = 0;
    while offset < samples.len() {
        let frame = &samples[offset..(offset + frame_length_samples).min(samples.len())];
        let segment_index = (offset / segment_length).min(thresholds.len() - 1);
        let bounds = thresholds[segment_index];

        let silent = frame_energy(frame) <= bounds.energy && frame_zcr(frame) <= bounds.zcr;
        mask.push(silent);
        offset += frame_length_samples;
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: usize = 480; // 30ms at 16kHz

    #[test]
    fn test_frame_energy_and_zcr() {
        let frame = [0.5_f32, -0.5, 0.5, -0.5];
        assert!((frame_energy(&frame) - 1.0).abs() < 1e-9);
        assert_eq!(frame_zcr(&frame), 3.0);

        let flat = [0.25_f32; 4];
        assert_eq!(frame_zcr(&flat), 0.0);
    }

    #[test]
    fn test_all_zero_signal_is_fully_silent() {
        let samples = vec![0.0_f32; FRAME * 100];
        let mask = silence_mask(&samples, FRAME, samples.len() / THRESHOLD_SEGMENTS);
        assert_eq!(mask.len(), 100);
        assert!(mask.iter().all(|&silent| silent));
    }

    /// A lone loud frame in a quiet segment is a >3σ energy outlier and
    /// must come out non-silent.
    #[test]
    fn test_isolated_burst_is_not_silent() {
        let mut samples = vec![0.0_f32; FRAME * 50];
        let burst_frame = 10;
        for sample in &mut samples[burst_frame * FRAME..(burst_frame + 1) * FRAME] {
            *sample = 0.8;
        }
        // One segment: thresholds adapt over all 50 frames.
        let mask = silence_mask(&samples, FRAME, samples.len());
        assert!(!mask[burst_frame]);
        assert!(mask[0]);
        assert!(mask[burst_frame + 1]);
    }

    /// Thresholds adapt per segment: a burst that would drown in a loud
    /// segment's statistics still stands out in its own quiet segment.
    #[test]
    fn test_thresholds_are_per_segment() {
        let segment_len = FRAME * 20;
        let mut samples = vec![0.0_f32; segment_len * THRESHOLD_SEGMENTS];
        // Loud first segment, quiet rest with one small burst in segment 3.
        for sample in &mut samples[..segment_len] {
            *sample = 0.6;
        }
        let burst_start = segment_len * 2 + 5 * FRAME;
        for sample in &mut samples[burst_start..burst_start + FRAME] {
            *sample = 0.1;
        }

        let thresholds = compute_segment_thresholds(&samples, FRAME, segment_len);
        assert_eq!(thresholds.len(), THRESHOLD_SEGMENTS);
        assert!(thresholds[0].energy > thresholds[2].energy);

        let mask = silence_mask(&samples, FRAME, segment_len);
        assert!(!mask[(burst_start / FRAME)]);
    }

    /// A non-divisible signal length still produces exactly five segments,
    /// with the last one absorbing the remainder.
    #[test]
    fn test_remainder_goes_to_last_segment() {
        let segment_len = FRAME * 10;
        let samples = vec![0.0_f32; segment_len * THRESHOLD_SEGMENTS + 3 * FRAME + 7];
        let thresholds = compute_segment_thresholds(&samples, FRAME, segment_len);
        assert_eq!(thresholds.len(), THRESHOLD_SEGMENTS);

        let mask = silence_mask(&samples, FRAME, segment_len);
        // Every frame resolves to a threshold, including the remainder's.
        assert_eq!(mask.len(), samples.len().div_ceil(FRAME));
    }

    #[test]
    fn test_short_signal_still_yields_thresholds() {
        // Shorter than a frame, let alone a segment.
        let samples = vec![0.1_f32; 7];
        let thresholds = compute_segment_thresholds(&samples, FRAME, 0);
        assert_eq!(thresholds.len(), 1);
        let mask = silence_mask(&samples, FRAME, 0);
        assert_eq!(mask.len(), 1);
    }
}
