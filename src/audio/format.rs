// NOTE: The whole pipeline assumes mono, signed 16-bit little-endian PCM.
// The device callback, the capture buffer and the output file all use this layout;
// only the sample rate is chosen (once, at startup).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const BITS_PER_SAMPLE: u16 = 16;
    pub const BYTES_PER_SAMPLE: usize = (Self::BITS_PER_SAMPLE / 8) as usize;

    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }

    /// Bytes produced per second of audio
    pub fn byte_rate(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * Self::BYTES_PER_SAMPLE
    }

    /// Calculate number of bytes for a given duration in seconds
    pub fn bytes_for_duration(&self, seconds: f32) -> usize {
        let bytes = (self.byte_rate() as f32 * seconds) as usize;
        bytes - bytes % Self::BYTES_PER_SAMPLE
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::mono(44100)
    }
}
