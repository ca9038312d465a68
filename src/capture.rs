//! Microphone capture state machine so permission, recording, and encoding stay consistent.
//!
//! The platform microphone sits behind the [`MicrophoneSource`] capability
//! trait so the recording lifecycle is testable without hardware. The real
//! source runs a CPAL input stream on a dedicated worker thread and hands
//! sample chunks back over a channel; the worker owns the stream handle so it
//! is released on every exit path.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, unbounded, Receiver};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Audio payloads are tagged with one fixed container type regardless of the
/// platform codec that produced the samples.
pub const AUDIO_MIME: &str = "audio/wav";

/// Capture target: mono 16 kHz is plenty for speech and keeps payloads small.
pub const TARGET_RATE: u32 = 16_000;

const MIC_READY_TIMEOUT: Duration = Duration::from_secs(5);
const CAPTURE_IDLE_SLEEP_MS: u64 = 20;

/// Environment override used by integration tests to fake device enumeration.
pub const TEST_DEVICES_ENV: &str = "IKOCHAT_TEST_DEVICES";

/// Mirror of the platform's microphone authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Authorization has not been decided yet (or cannot be reported).
    Prompt,
    Granted,
    Denied,
}

/// Live capture handle. Dropping it releases the device.
pub trait CaptureHandle {
    /// Drain sample chunks buffered since the last call.
    fn drain(&mut self) -> Vec<Vec<f32>>;
    fn sample_rate(&self) -> u32;
}

/// Platform microphone capability.
pub trait MicrophoneSource {
    /// Report current authorization without prompting; sources that cannot
    /// report default to [`PermissionState::Prompt`].
    fn query_permission(&self) -> PermissionState;

    /// Actively prompt for access. This is a probe only: any acquired handle
    /// is released before returning. `Ok(false)` means the user (or platform)
    /// refused.
    fn request_permission(&mut self) -> Result<bool, String>;

    /// Acquire an exclusive capture handle.
    fn open(&mut self) -> Result<Box<dyn CaptureHandle>, String>;
}

/// One recording's encoded output: a self-describing WAV data URI.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAudio {
    pub data_uri: String,
    pub duration_ms: u64,
}

impl EncodedAudio {
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        let wav = encode_wav(samples, sample_rate);
        let duration_ms = if sample_rate == 0 {
            0
        } else {
            (samples.len() as u64).saturating_mul(1000) / u64::from(sample_rate)
        };
        Self {
            data_uri: format!("data:{AUDIO_MIME};base64,{}", BASE64.encode(wav)),
            duration_ms,
        }
    }
}

/// Owns permission state and the recording lifecycle.
///
/// State machine: `Prompt → Granted → recording → Granted` on stop, and
/// `Prompt → Denied` on refusal. `Denied` is not terminal: platform state can
/// change out-of-band, so a denied start re-prompts instead of failing
/// permanently. Every failure path lands back in a consistent non-recording
/// state.
pub struct Recorder {
    source: Box<dyn MicrophoneSource>,
    permission: PermissionState,
    handle: Option<Box<dyn CaptureHandle>>,
    chunks: Vec<Vec<f32>>,
}

impl Recorder {
    pub fn new(source: Box<dyn MicrophoneSource>) -> Self {
        let permission = source.query_permission();
        Self {
            source,
            permission,
            handle: None,
            chunks: Vec::new(),
        }
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn is_recording(&self) -> bool {
        self.handle.is_some()
    }

    /// Apply an externally observed authorization change. Revocation while
    /// recording aborts the capture and discards buffered chunks; returns
    /// true when that happened.
    pub fn observe_permission(&mut self, next: PermissionState) -> bool {
        self.permission = next;
        if next == PermissionState::Denied && self.handle.is_some() {
            self.handle = None;
            self.chunks.clear();
            debug!("recording aborted by permission revocation");
            return true;
        }
        false
    }

    /// Begin capturing. Rejects overlapping starts so a pending acquisition
    /// can never be interleaved with a second one.
    pub fn start(&mut self) -> Result<(), String> {
        if self.handle.is_some() {
            return Err("recording already in progress".to_string());
        }

        if self.permission != PermissionState::Granted {
            match self.source.request_permission() {
                Ok(true) => self.permission = PermissionState::Granted,
                Ok(false) => {
                    self.permission = PermissionState::Denied;
                    return Err("microphone permission denied".to_string());
                }
                Err(err) => return Err(format!("microphone permission request failed: {err}")),
            }
        }

        match self.source.open() {
            Ok(handle) => {
                self.chunks.clear();
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => Err(format!("microphone unavailable: {err}")),
        }
    }

    /// Pull buffered chunks from the live handle. No-op when idle.
    pub fn poll(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            self.chunks.extend(handle.drain());
        }
    }

    /// Finish the recording: flush remaining chunks, release the device, and
    /// encode everything captured into one audio object.
    pub fn stop(&mut self) -> Result<EncodedAudio, String> {
        let mut handle = self
            .handle
            .take()
            .ok_or_else(|| "no recording in progress".to_string())?;
        self.chunks.extend(handle.drain());
        let sample_rate = handle.sample_rate();
        drop(handle);

        let samples: Vec<f32> = self.chunks.drain(..).flatten().collect();
        debug!(samples = samples.len(), sample_rate, "recording finished");
        Ok(EncodedAudio::from_samples(&samples, sample_rate))
    }
}

/// Minimal 16-bit PCM mono WAV container around raw samples.
fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + samples.len() * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        out.extend_from_slice(&((clamped * 32767.0) as i16).to_le_bytes());
    }
    out
}

/// List audio input device names, honoring the test env override.
pub fn list_input_devices() -> Vec<String> {
    if let Ok(raw) = env::var(TEST_DEVICES_ENV) {
        return raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();
    }

    let host = cpal::default_host();
    let Ok(devices) = host.input_devices() else {
        return Vec::new();
    };
    devices.filter_map(|device| device.name().ok()).collect()
}

// ============================================================================
// CPAL-backed source
// ============================================================================

/// Real microphone source backed by the default CPAL host.
pub struct CpalMicrophone {
    preferred_device: Option<String>,
    permission: PermissionState,
}

impl CpalMicrophone {
    pub fn new(preferred_device: Option<&str>) -> Self {
        Self {
            preferred_device: preferred_device.map(String::from),
            permission: PermissionState::Prompt,
        }
    }
}

impl MicrophoneSource for CpalMicrophone {
    fn query_permission(&self) -> PermissionState {
        // Desktop hosts cannot report mic authorization without prompting, so
        // this mirrors the last observed outcome and starts at Prompt.
        self.permission
    }

    fn request_permission(&mut self) -> Result<bool, String> {
        if find_input_device(self.preferred_device.as_deref()).is_none() {
            self.permission = PermissionState::Denied;
            return Ok(false);
        }
        // Probe by briefly acquiring a stream, then release it immediately.
        let handle = self.open()?;
        drop(handle);
        self.permission = PermissionState::Granted;
        Ok(true)
    }

    fn open(&mut self) -> Result<Box<dyn CaptureHandle>, String> {
        let (chunk_tx, chunk_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let preferred = self.preferred_device.clone();

        thread::spawn(move || {
            run_capture_worker(preferred, &chunk_tx, &ready_tx, &worker_stop);
        });

        match ready_rx.recv_timeout(MIC_READY_TIMEOUT) {
            Ok(Ok(sample_rate)) => Ok(Box::new(CpalCaptureHandle {
                chunks: chunk_rx,
                stop,
                sample_rate,
            })),
            Ok(Err(err)) => {
                stop.store(true, Ordering::SeqCst);
                Err(err)
            }
            Err(_) => {
                stop.store(true, Ordering::SeqCst);
                Err("timed out waiting for microphone".to_string())
            }
        }
    }
}

struct CpalCaptureHandle {
    chunks: Receiver<Vec<f32>>,
    stop: Arc<AtomicBool>,
    sample_rate: u32,
}

impl CaptureHandle for CpalCaptureHandle {
    fn drain(&mut self) -> Vec<Vec<f32>> {
        self.chunks.try_iter().collect()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalCaptureHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn find_input_device(preferred: Option<&str>) -> Option<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = preferred {
        let devices = host.input_devices().ok()?;
        for device in devices {
            if device.name().map(|n| n == name).unwrap_or(false) {
                return Some(device);
            }
        }
        return None;
    }
    host.default_input_device()
}

/// Worker that owns the CPAL stream for one recording. Reports readiness (or
/// the build error) once, then idles until the stop flag flips.
fn run_capture_worker(
    preferred: Option<String>,
    chunk_tx: &crossbeam_channel::Sender<Vec<f32>>,
    ready_tx: &crossbeam_channel::Sender<Result<u32, String>>,
    stop: &Arc<AtomicBool>,
) {
    let Some(device) = find_input_device(preferred.as_deref()) else {
        let _ = ready_tx.send(Err("no audio input device detected".to_string()));
        return;
    };

    let supported = match device.default_input_config() {
        Ok(config) => config,
        Err(err) => {
            let _ = ready_tx.send(Err(format!("input config unavailable: {err}")));
            return;
        }
    };
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let channels = usize::from(config.channels);
    let sample_rate = config.sample_rate.0;

    let err_fn = |err: cpal::StreamError| {
        debug!("capture stream error: {err}");
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            let tx = chunk_tx.clone();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(downmix(data, channels));
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let tx = chunk_tx.clone();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<f32> =
                        data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                    let _ = tx.send(downmix(&converted, channels));
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::U16 => {
            let tx = chunk_tx.clone();
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<f32> = data
                        .iter()
                        .map(|&s| (f32::from(s) - 32768.0) / 32768.0)
                        .collect();
                    let _ = tx.send(downmix(&converted, channels));
                },
                err_fn,
                None,
            )
        }
        other => {
            let _ = ready_tx.send(Err(format!("unsupported sample format: {other:?}")));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready_tx.send(Err(format!("failed to open capture stream: {err}")));
            return;
        }
    };
    if let Err(err) = stream.play() {
        let _ = ready_tx.send(Err(format!("failed to start capture stream: {err}")));
        return;
    }
    let _ = ready_tx.send(Ok(sample_rate));

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(CAPTURE_IDLE_SLEEP_MS));
    }
    drop(stream);
}

fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
