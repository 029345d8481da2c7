use std::path::Path;
use std::sync::Arc;

use crate::assets::media::{MIX_SAMPLE_RATE, decode_audio_f32_stereo};
use crate::foundation::error::{GeoError, GeoResult};
use crate::player::storyboard::Storyboard;

/// Output channel count of the narration mix.
pub const MIX_CHANNELS: u16 = 2;

/// One decoded clip placed on the output timeline.
#[derive(Clone, Debug)]
pub struct NarrationSegment {
    /// First output sample frame the clip occupies.
    pub start_sample: u64,
    /// Decoded interleaved stereo PCM at the mix sample rate.
    pub pcm: Arc<Vec<f32>>,
}

/// Clips to mix plus the output length.
#[derive(Clone, Debug)]
pub struct NarrationTrack {
    pub sample_rate: u32,
    /// Output length in sample frames.
    pub total_samples: u64,
    pub segments: Vec<NarrationSegment>,
}

impl NarrationTrack {
    /// Decode the narration clip of every step. Clips that fail to decode are logged and
    /// left out. Returns `None` when no step has audio.
    pub fn from_storyboard(sb: &Storyboard) -> Option<Self> {
        let sample_rate = MIX_SAMPLE_RATE;
        let mut segments = Vec::new();
        for step in &sb.steps {
            let Some(path) = step.audio.as_deref() else {
                continue;
            };
            match decode_audio_f32_stereo(path, sample_rate) {
                Ok(pcm) => segments.push(NarrationSegment {
                    start_sample: secs_to_sample(step.window.start, sample_rate),
                    pcm: Arc::new(pcm.interleaved_f32),
                }),
                Err(e) => {
                    tracing::warn!(step = step.index, path = %path.display(), error = %e, "dropping narration clip");
                }
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(Self {
            sample_rate,
            total_samples: secs_to_sample(sb.duration_secs, sample_rate),
            segments,
        })
    }

    /// Sum all segments into interleaved stereo, clamped to `[-1, 1]`.
    pub fn mix(&self) -> Vec<f32> {
        let channels = usize::from(MIX_CHANNELS);
        let mut out = vec![0.0f32; self.total_samples as usize * channels];
        for seg in &self.segments {
            let start = seg.start_sample as usize * channels;
            if start >= out.len() {
                continue;
            }
            for (dst, src) in out[start..].iter_mut().zip(seg.pcm.iter()) {
                *dst += *src;
            }
        }
        for s in &mut out {
            *s = s.clamp(-1.0, 1.0);
        }
        out
    }
}

/// Nearest sample frame to `secs`.
pub fn secs_to_sample(secs: f64, sample_rate: u32) -> u64 {
    (secs.max(0.0) * f64::from(sample_rate)).round() as u64
}

/// Write interleaved `f32` PCM samples to a raw little-endian `.f32le` file.
pub fn write_mix_to_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> GeoResult<()> {
    crate::foundation::json::ensure_parent_dir(out_path)?;
    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        GeoError::render(format!(
            "failed to write mixed audio file '{}': {e}",
            out_path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_land_at_their_start_sample() {
        let track = NarrationTrack {
            sample_rate: 10,
            total_samples: 6,
            segments: vec![
                NarrationSegment {
                    start_sample: 1,
                    pcm: Arc::new(vec![0.5; 4]),
                },
                NarrationSegment {
                    start_sample: 2,
                    pcm: Arc::new(vec![0.75; 4]),
                },
            ],
        };
        let out = track.mix();
        assert_eq!(out.len(), 12);
        assert_eq!(&out[0..2], &[0.0, 0.0]);
        assert_eq!(&out[2..4], &[0.5, 0.5]);
        // Overlap is summed and clamped.
        assert_eq!(&out[4..6], &[1.0, 1.0]);
        assert_eq!(&out[6..8], &[0.75, 0.75]);
        assert_eq!(&out[8..12], &[0.0; 4]);
    }

    #[test]
    fn clips_past_the_end_are_truncated() {
        let track = NarrationTrack {
            sample_rate: 10,
            total_samples: 2,
            segments: vec![NarrationSegment {
                start_sample: 1,
                pcm: Arc::new(vec![0.1; 10]),
            }],
        };
        assert_eq!(track.mix().len(), 4);
    }

    #[test]
    fn secs_round_to_nearest_sample() {
        assert_eq!(secs_to_sample(1.5, 48_000), 72_000);
        assert_eq!(secs_to_sample(-1.0, 48_000), 0);
    }

    #[test]
    fn f32le_file_has_four_bytes_per_sample() {
        let path = Path::new("target/mix_tests/out.f32le");
        write_mix_to_f32le_file(&[0.0, 1.0, -1.0], path).unwrap();
        assert_eq!(std::fs::metadata(path).unwrap().len(), 12);
    }
}
