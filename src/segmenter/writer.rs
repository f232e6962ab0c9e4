//! # Chunk Materialization
//!
//! Reads cleaned source audio, and writes emitted chunk spans out as
//! independent WAV files. File writes for different spans run in parallel
//! blocking tasks since the sample ranges are disjoint; record creation is
//! left to the caller, which serializes through the store's
//! insert-or-get-by-path operation.
//!
//! ## Format contract:
//! The GPU preprocessing stage emits 16 kHz mono audio, so inputs are
//! validated against that contract rather than resampled here. Both WAV
//! (16-bit PCM or 32-bit float) and headerless 16-bit little-endian PCM
//! are accepted.

use crate::segmenter::ChunkSpan;
use anyhow::{anyhow, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A chunk file written to disk, ready to be recorded in the store.
#[derive(Debug, Clone)]
pub struct MaterializedChunk {
    /// File name relative to the chunks directory
    pub file_name: String,
    pub duration_secs: f64,
}

/// Decode headerless 16-bit little-endian PCM into normalized samples.
pub fn decode_pcm_samples(data: &[u8]) -> Result<Vec<f32>> {
    if data.is_empty() {
        return Err(anyhow!("no audio data"));
    }
    if data.len() % 2 != 0 {
        return Err(anyhow!("PCM data length must be even for 16-bit samples"));
    }

    let mut cursor = Cursor::new(data);
    let mut samples = Vec::with_capacity(data.len() / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(sample as f32 / 32768.0);
    }
    Ok(samples)
}

/// Load a cleaned source file as normalized mono samples.
///
/// WAV input must be mono at `expected_sample_rate`; `.pcm`/`.raw` input is
/// assumed to already satisfy the contract since it carries no header.
pub fn load_mono_samples(path: &Path, expected_sample_rate: u32) -> Result<Vec<f32>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if extension == "pcm" || extension == "raw" {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return decode_pcm_samples(&data);
    }

    let mut file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let (header, data) = wav::read(&mut file)
        .with_context(|| format!("failed to parse WAV {}", path.display()))?;

    if header.channel_count != 1 {
        return Err(anyhow!(
            "expected mono audio, got {} channels",
            header.channel_count
        ));
    }
    if header.sampling_rate != expected_sample_rate {
        return Err(anyhow!(
            "expected {} Hz audio, got {} Hz",
            expected_sample_rate,
            header.sampling_rate
        ));
    }

    match data {
        wav::BitDepth::Sixteen(samples) => {
            Ok(samples.into_iter().map(|s| s as f32 / 32768.0).collect())
        }
        wav::BitDepth::ThirtyTwoFloat(samples) => Ok(samples),
        other => Err(anyhow!("unsupported WAV bit depth: {:?}", other)),
    }
}

/// Write one span of samples as a 16-bit PCM WAV file.
pub fn write_chunk_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let header = wav::Header::new(1, 1, sample_rate, 16);
    let track: Vec<i16> = samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect();

    let mut file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    wav::write(header, &wav::BitDepth::Sixteen(track), &mut file)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// File name for the chunk at `index` cut from `file_prefix`.
fn chunk_file_name(file_prefix: &str, index: usize) -> String {
    format!("{}_chunk_{:04}.wav", file_prefix, index)
}

/// Write every span as an independent chunk file under `chunks_dir`.
///
/// Spans have disjoint sample ranges, so the writes run as parallel
/// blocking tasks; the whole batch fails if any single write fails.
pub async fn write_chunk_files(
    chunks_dir: &Path,
    file_prefix: &str,
    samples: Arc<Vec<f32>>,
    spans: &[ChunkSpan],
    sample_rate: u32,
) -> Result<Vec<MaterializedChunk>> {
    std::fs::create_dir_all(chunks_dir)
        .with_context(|| format!("failed to create {}", chunks_dir.display()))?;

    let mut tasks = Vec::with_capacity(spans.len());
    for (index, span) in spans.iter().copied().enumerate() {
        let file_name = chunk_file_name(file_prefix, index);
        let path: PathBuf = chunks_dir.join(&file_name);
        let samples = Arc::clone(&samples);

        tasks.push(tokio::task::spawn_blocking(move || -> Result<MaterializedChunk> {
            let clip = &samples[span.start..span.end.min(samples.len())];
            write_chunk_wav(&path, clip, sample_rate)?;
            debug!(file = %path.display(), samples = clip.len(), "chunk file written");
            Ok(MaterializedChunk {
                file_name,
                duration_secs: clip.len() as f64 / sample_rate as f64,
            })
        }));
    }

    let mut written = Vec::with_capacity(tasks.len());
    for task in tasks {
        written.push(task.await.context("chunk writer task panicked")??);
    }
    Ok(written)
}
