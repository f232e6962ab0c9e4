//! # Audio Chunk Segmenter
//!
//! Splits a cleaned mono recording into playable sub-clips of bounded
//! duration using adaptive silence detection. The segmentation itself is a
//! pure function from a sample slice to a list of (start, end) spans; the
//! `writer` module materializes spans as independent WAV files and records
//! them as chunks.
//!
//! ## Pipeline:
//! 1. Per-segment energy/ZCR thresholds (`analysis`)
//! 2. Frame-by-frame silence mask
//! 3. Open-chunk state machine producing spans (this module)
//! 4. Parallel chunk-file writes + serialized record creation (`writer`)

pub mod analysis;
pub mod writer;

use analysis::{silence_mask, THRESHOLD_SEGMENTS};
use serde::{Deserialize, Serialize};

/// Segmenter tuning, all durations in milliseconds.
///
/// Defaults produce 3-7 second chunks from 16 kHz call audio with a two
/// second trailing overlap so clipped word endings stay audible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterSettings {
    pub min_chunk_length_ms: u32,
    pub max_chunk_length_ms: u32,
    pub frame_length_ms: u32,
    pub overlap_ms: u32,
    pub sample_rate: u32,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            min_chunk_length_ms: 3000,
            max_chunk_length_ms: 7000,
            frame_length_ms: 30,
            overlap_ms: 2000,
            sample_rate: 16000,
        }
    }
}

/// Round a chunk length up to the nearest whole number of frames.
fn adjust_to_frame_length(chunk_length_ms: u32, frame_length_ms: u32) -> u32 {
    chunk_length_ms.div_ceil(frame_length_ms) * frame_length_ms
}

fn samples_per_ms(sample_rate: u32, ms: u32) -> usize {
    (sample_rate as usize * ms as usize) / 1000
}

/// Sample-domain working parameters derived from `SegmenterSettings`.
#[derive(Debug, Clone, Copy)]
pub struct FrameParams {
    pub frame: usize,
    pub min_chunk: usize,
    pub max_chunk: usize,
    pub overlap: usize,
}

impl SegmenterSettings {
    pub fn frame_params(&self) -> FrameParams {
        FrameParams {
            frame: samples_per_ms(self.sample_rate, self.frame_length_ms),
            min_chunk: samples_per_ms(
                self.sample_rate,
                adjust_to_frame_length(self.min_chunk_length_ms, self.frame_length_ms),
            ),
            max_chunk: samples_per_ms(
                self.sample_rate,
                adjust_to_frame_length(self.max_chunk_length_ms, self.frame_length_ms),
            ),
            overlap: samples_per_ms(self.sample_rate, self.overlap_ms),
        }
    }
}

/// One emitted chunk span, in samples over the source signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

impl ChunkSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.len() as f64 / sample_rate as f64
    }
}

/// Run the open-chunk state machine over a per-frame silence mask.
///
/// ## Rules:
/// - A chunk opens at the first non-silent frame and `last_valid_end`
///   extends through non-silent frames only
/// - The chunk closes on the second of two consecutive silent frames, or
///   as soon as it has reached the maximum length
/// - On close, the chunk is emitted only if it reaches the minimum length;
///   too-short runs are discarded and the machine waits for the next
///   non-silent frame
/// - An emitted span extends `overlap` samples past `last_valid_end`,
///   clamped to the end of the signal
pub fn spans_from_mask(mask: &[bool], params: FrameParams, total_samples: usize) -> Vec<ChunkSpan> {
    let mut spans = Vec::new();
    let mut chunk_start: Option<usize> = None;
    let mut last_valid_end = 0usize;
    let mut previous_silent = false;

    for (index, &silent) in mask.iter().enumerate() {
        let frame_start = index * params.frame;
        let frame_end = (frame_start + params.frame).min(total_samples);

        if chunk_start.is_none() && !silent {
            chunk_start = Some(frame_start);
            last_valid_end = frame_end;
        }

        if let Some(start) = chunk_start {
            if silent {
                if previous_silent || frame_end - start >= params.max_chunk {
                    if last_valid_end - start >= params.min_chunk {
                        spans.push(ChunkSpan {
                            start,
                            end: (last_valid_end + params.overlap).min(total_samples),
                        });
                    }
                    chunk_start = None;
                }
            } else {
                last_valid_end = frame_end;
                if frame_end - start >= params.max_chunk {
                    spans.push(ChunkSpan {
                        start,
                        end: (last_valid_end + params.overlap).min(total_samples),
                    });
                    chunk_start = None;
                }
            }
        }

        previous_silent = silent;
    }

    // Flush a still-open chunk at end of signal under the same minimum rule.
    if let Some(start) = chunk_start {
        if last_valid_end - start >= params.min_chunk {
            spans.push(ChunkSpan {
                start,
                end: (last_valid_end + params.overlap).min(total_samples),
            });
        }
    }

    spans
}

/// Segment a cleaned mono signal into chunk spans.
pub fn segment_spans(samples: &[f32], settings: &SegmenterSettings) -> Vec<ChunkSpan> {
    let params = settings.frame_params();
    let segment_length = samples.len() / THRESHOLD_SEGMENTS;
    let mask = silence_mask(samples, params.frame, segment_length);
    spans_from_mask(&mask, params, samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small sample-domain parameters: 10-sample frames, 3-frame minimum,
    /// 7-frame maximum, 2-frame overlap.
    const PARAMS: FrameParams = FrameParams {
        frame: 10,
        min_chunk: 30,
        max_chunk: 70,
        overlap: 20,
    };

    fn mask(pattern: &str) -> Vec<bool> {
        // 's' = silent frame, 'v' = voiced frame
        pattern.chars().map(|c| c == 's').collect()
    }

    #[test]
    fn test_all_silent_mask_emits_nothing() {
        assert!(spans_from_mask(&mask("ssssssssssssssssssss"), PARAMS, 200).is_empty());
    }

    #[test]
    fn test_double_silence_closes_and_emits() {
        let spans = spans_from_mask(&mask("vvvvvsssssssssssssss"), PARAMS, 200);
        assert_eq!(spans, vec![ChunkSpan { start: 0, end: 70 }]);
    }

    /// An isolated silent frame keeps the chunk open; only the second
    /// consecutive one closes it, and the span stops at the last voiced
    /// frame plus overlap.
    #[test]
    fn test_single_silent_frame_does_not_close() {
        let spans = spans_from_mask(&mask("vvsvvsssssssssssssss"), PARAMS, 200);
        assert_eq!(spans, vec![ChunkSpan { start: 0, end: 70 }]);
    }

    /// Sub-minimum runs are discarded even when bounded by silence on both
    /// sides.
    #[test]
    fn test_too_short_run_is_discarded() {
        assert!(spans_from_mask(&mask("ssvvssssssssssssssss"), PARAMS, 200).is_empty());
    }

    #[test]
    fn test_max_length_close_splits_long_speech() {
        let spans = spans_from_mask(&mask("vvvvvvvvvv"), PARAMS, 100);
        assert_eq!(
            spans,
            vec![
                ChunkSpan { start: 0, end: 90 },
                // Reopened at 70; flushed at end of signal, clamped to 100.
                ChunkSpan { start: 70, end: 100 },
            ]
        );
    }

    #[test]
    fn test_open_chunk_flushes_at_end_of_signal() {
        let spans = spans_from_mask(&mask("ssvvvv"), PARAMS, 60);
        assert_eq!(spans, vec![ChunkSpan { start: 20, end: 60 }]);
    }

    #[test]
    fn test_no_span_exceeds_max_plus_overlap() {
        // Long alternating and sustained speech patterns.
        let patterns = [
            "vvvvvvvvvvvvvvvvvvvvvvvvvvvvvv",
            "vsvsvsvsvsvsvsvsvsvsvsvsvsvsvs",
            "vvvvvvvvssvvvvvvvvssvvvvvvvvss",
        ];
        for pattern in patterns {
            let frames = mask(pattern);
            let total = frames.len() * PARAMS.frame;
            for span in spans_from_mask(&frames, PARAMS, total) {
                assert!(
                    span.len() <= PARAMS.max_chunk + PARAMS.overlap,
                    "span {:?} too long for pattern {}",
                    span,
                    pattern
                );
                assert!(span.end <= total);
            }
        }
    }

    #[test]
    fn test_settings_round_up_to_frame_multiples() {
        let settings = SegmenterSettings {
            min_chunk_length_ms: 2995,
            max_chunk_length_ms: 7001,
            frame_length_ms: 30,
            overlap_ms: 2000,
            sample_rate: 16000,
        };
        let params = settings.frame_params();
        assert_eq!(params.frame, 480);
        assert_eq!(params.min_chunk, 3000 / 1000 * 16000);
        assert_eq!(params.max_chunk, samples_per_ms(16000, 7020));
        assert_eq!(params.overlap, 32000);
    }

    /// End-to-end over samples: fully silent input of any length yields
    /// zero chunks.
    #[test]
    fn test_all_silent_signal_yields_no_chunks() {
        let settings = SegmenterSettings::default();
        for seconds in [1usize, 5, 12] {
            let samples = vec![0.0_f32; 16000 * seconds];
            assert!(segment_spans(&samples, &settings).is_empty());
        }
    }

    #[test]
    fn test_chunk_span_duration() {
        let span = ChunkSpan { start: 16000, end: 80000 };
        assert_eq!(span.len(), 64000);
        assert!((span.duration_secs(16000) - 4.0).abs() < 1e-9);
    }
}
