use std::path::Path;

use crate::error::StorageError;

/// Trait for the durable destination of a recording
///
/// Implementations receive raw PCM bytes in the order they were captured and
/// write them as they arrive rather than buffering the whole session.
pub trait AudioSink {
    /// Append bytes (called once per capture-loop iteration)
    fn append(&mut self, bytes: &[u8]) -> Result<(), StorageError>;

    /// Flush and close the sink. Consumes it so it can only be closed once.
    fn close(self: Box<Self>) -> Result<(), StorageError>;
}

/// Creates one sink per recording session
pub trait SinkFactory: Send + 'static {
    fn create(&self, path: &Path) -> Result<Box<dyn AudioSink>, StorageError>;
}
