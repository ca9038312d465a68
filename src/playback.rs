//! Best-effort playback of synthesized audio replies.
//!
//! Playback is strictly fire-and-forget: failures are logged and never block
//! or abort the session. The output device sits behind the [`AudioPlayer`]
//! capability trait so headless runs and tests swap in [`NullPlayer`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Plays one audio data URI.
pub trait AudioPlayer {
    fn play(&mut self, data_uri: &str) -> Result<(), String>;
}

/// Discards playback requests; used headless and in tests.
#[derive(Debug, Default)]
pub struct NullPlayer;

impl AudioPlayer for NullPlayer {
    fn play(&mut self, data_uri: &str) -> Result<(), String> {
        debug!("discarding playback request ({} bytes)", data_uri.len());
        Ok(())
    }
}

/// Plays WAV data URIs on the default output device.
#[derive(Debug, Default)]
pub struct CpalPlayer;

impl AudioPlayer for CpalPlayer {
    fn play(&mut self, data_uri: &str) -> Result<(), String> {
        let (samples, sample_rate) = decode_wav_data_uri(data_uri)?;
        if samples.is_empty() {
            return Ok(());
        }
        // The worker owns the output stream; play() never blocks the caller.
        thread::spawn(move || {
            if let Err(err) = run_playback(samples, sample_rate) {
                warn!("audio playback failed: {err}");
            }
        });
        Ok(())
    }
}

fn run_playback(samples: Vec<f32>, sample_rate: u32) -> Result<(), String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| "no audio output device".to_string())?;
    let supported = device
        .default_output_config()
        .map_err(|err| format!("output config unavailable: {err}"))?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(format!(
            "unsupported output sample format: {:?}",
            supported.sample_format()
        ));
    }
    let config: cpal::StreamConfig = supported.into();
    let channels = usize::from(config.channels);
    let device_rate = config.sample_rate.0;

    let resampled = resample(&samples, sample_rate, device_rate);
    let total = resampled.len();
    let duration_ms = (total as u64).saturating_mul(1000) / u64::from(device_rate.max(1));

    let mut position = 0usize;
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = resampled.get(position).copied().unwrap_or(0.0);
                    position = position.saturating_add(1);
                    for slot in frame {
                        *slot = sample;
                    }
                }
            },
            |err| warn!("output stream error: {err}"),
            None,
        )
        .map_err(|err| format!("failed to open output stream: {err}"))?;
    stream
        .play()
        .map_err(|err| format!("failed to start output stream: {err}"))?;

    // Keep the stream alive until the buffer has drained.
    thread::sleep(Duration::from_millis(duration_ms + 200));
    drop(stream);
    Ok(())
}

/// Nearest-neighbor resampling; good enough for speech playback.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let out_len = (samples.len() as u64 * u64::from(to_rate) / u64::from(from_rate)) as usize;
    (0..out_len)
        .map(|i| {
            let src = (i as u64 * u64::from(from_rate) / u64::from(to_rate)) as usize;
            samples[src.min(samples.len() - 1)]
        })
        .collect()
}

/// Decode a `data:audio/...;base64,` URI into mono f32 samples.
pub fn decode_wav_data_uri(data_uri: &str) -> Result<(Vec<f32>, u32), String> {
    let rest = data_uri
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URI".to_string())?;
    let (header, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| "missing base64 payload".to_string())?;
    if !header.starts_with("audio/") {
        return Err(format!("not an audio payload: {header}"));
    }
    let bytes = BASE64
        .decode(payload)
        .map_err(|err| format!("invalid base64 payload: {err}"))?;
    parse_wav(&bytes)
}

fn parse_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32), String> {
    if bytes.len() < 12 || &bytes[..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err("not a WAV container".to_string());
    }

    let mut sample_rate = 0u32;
    let mut channels = 1u16;
    let mut bits = 16u16;
    let mut data: Option<&[u8]> = None;

    // Walk RIFF chunks; fmt must precede data in well-formed files but the
    // scan tolerates either order.
    let mut offset = 12usize;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = u32::from_le_bytes([
            bytes[offset + 4],
            bytes[offset + 5],
            bytes[offset + 6],
            bytes[offset + 7],
        ]) as usize;
        let body_start = offset + 8;
        let body_end = body_start.saturating_add(size).min(bytes.len());
        match id {
            b"fmt " if size >= 16 => {
                let body = &bytes[body_start..body_end];
                // The declared size can exceed the bytes actually present.
                if body.len() < 16 {
                    return Err("truncated fmt chunk".to_string());
                }
                channels = u16::from_le_bytes([body[2], body[3]]);
                sample_rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
                bits = u16::from_le_bytes([body[14], body[15]]);
            }
            b"data" => data = Some(&bytes[body_start..body_end]),
            _ => {}
        }
        offset = body_end + (size % 2); // chunks are word-aligned
    }

    let data = data.ok_or_else(|| "missing data chunk".to_string())?;
    if bits != 16 {
        return Err(format!("unsupported bit depth: {bits}"));
    }
    if sample_rate == 0 {
        return Err("missing fmt chunk".to_string());
    }

    let step = usize::from(channels.max(1));
    let samples: Vec<f32> = data
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();
    // Downmix interleaved channels to mono by taking the first channel.
    let mono: Vec<f32> = samples.iter().copied().step_by(step).collect();
    Ok((mono, sample_rate))
}
