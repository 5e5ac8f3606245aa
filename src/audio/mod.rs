pub mod capture;
pub mod format;
pub mod pcm_sink;
pub mod sink;

pub use capture::{CaptureBackend, CaptureDevice, MicrophoneBackend, MicrophoneCapture};
pub use format::AudioFormat;
pub use pcm_sink::{PcmFileFactory, PcmFileSink, recording_path};
pub use sink::{AudioSink, SinkFactory};
