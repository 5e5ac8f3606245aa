use super::format::AudioFormat;
use crate::error::DeviceError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapCons, HeapRb, traits::*};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

/// An opened capture device.
///
/// Dropping the handle releases the device. It is only ever used from the
/// thread that opened it.
pub trait CaptureDevice {
    /// Block until audio is available and copy it into `buf`.
    ///
    /// Returns the number of bytes written to `buf`; zero means the source
    /// produced nothing and should be considered unusable.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    /// Stop delivering audio. Release happens on drop.
    fn stop(&mut self);
}

/// Opens capture devices at a fixed format
pub trait CaptureBackend: Send + 'static {
    fn open(
        &self,
        format: AudioFormat,
        buffer_hint: usize,
    ) -> Result<Box<dyn CaptureDevice>, DeviceError>;
}

/// Default microphone via cpal
#[derive(Debug, Clone)]
pub struct MicrophoneBackend {
    read_timeout: Duration,
}

impl MicrophoneBackend {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl CaptureBackend for MicrophoneBackend {
    fn open(
        &self,
        format: AudioFormat,
        buffer_hint: usize,
    ) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        Ok(Box::new(MicrophoneCapture::open(
            format,
            buffer_hint,
            self.read_timeout,
        )?))
    }
}

/// Convert one f32 sample to signed 16-bit little-endian.
///
/// Input is clamped to [-1.0, 1.0]; NaN maps to silence.
pub fn sample_to_le_bytes(sample: f32) -> [u8; 2] {
    let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
    amplitude.to_le_bytes()
}

/// Live microphone capture
///
/// The cpal callback converts f32 samples to i16 LE bytes and pushes them into
/// a ring buffer, then unparks the reader thread. `read` drains the ring.
pub struct MicrophoneCapture {
    stream: cpal::Stream,
    consumer: HeapCons<u8>,
    faulted: Arc<AtomicBool>,
    dropped_samples: Arc<AtomicU64>,
    read_timeout: Duration,
}

impl MicrophoneCapture {
    pub fn open(
        format: AudioFormat,
        buffer_hint: usize,
        read_timeout: Duration,
    ) -> Result<Self, DeviceError> {
        let capacity = format.bytes_for_duration(10.0).max(buffer_hint);
        let ring = HeapRb::<u8>::new(capacity);
        let (mut producer, consumer) = ring.split();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(DeviceError::Unavailable)?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let faulted = Arc::new(AtomicBool::new(false));
        let faulted_callback = faulted.clone();
        let dropped_samples = Arc::new(AtomicU64::new(0));
        let dropped_callback = dropped_samples.clone();
        // The device is opened and read on the same worker thread.
        let reader: Thread = thread::current();
        let reader_on_error = reader.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        if producer.vacant_len() < AudioFormat::BYTES_PER_SAMPLE {
                            dropped_callback.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                        producer.push_slice(&sample_to_le_bytes(sample));
                    }
                    reader.unpark();
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                    faulted_callback.store(true, Ordering::Release);
                    reader_on_error.unpark();
                },
                None,
            )
            .map_err(|e| DeviceError::Open(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::Open(e.to_string()))?;

        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Audio capture started"
        );

        Ok(Self {
            stream,
            consumer,
            faulted,
            dropped_samples,
            read_timeout,
        })
    }
}

impl CaptureDevice for MicrophoneCapture {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        // Keep reads sample-aligned.
        let want = buf.len() - buf.len() % AudioFormat::BYTES_PER_SAMPLE;
        let deadline = Instant::now() + self.read_timeout;

        loop {
            if self.faulted.load(Ordering::Acquire) {
                return Err(DeviceError::Read("audio stream reported an error".into()));
            }

            let n = self.consumer.pop_slice(&mut buf[..want]);
            if n > 0 {
                return Ok(n);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!("No audio within {:?}", self.read_timeout);
                return Ok(0);
            }
            thread::park_timeout(deadline - now);
        }
    }

    fn stop(&mut self) {
        if let Err(e) = self.stream.pause() {
            tracing::warn!("Failed to pause audio stream: {}", e);
        }
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        let dropped = self.dropped_samples.load(Ordering::Relaxed);
        if dropped > 0 {
            tracing::warn!("Ring buffer overran, {} samples dropped", dropped);
        }
        tracing::info!("Audio capture released");
    }
}
