// Scripted capture devices and sinks for session/controller tests.
//
// Every fake counts its acquisitions and releases so tests can assert that
// nothing is leaked on any outcome path.

#![allow(dead_code)]

use async_trait::async_trait;
use pcm_recorder::{
    AudioFormat, AudioSink, CaptureBackend, CaptureDevice, DeviceError, FailureReason, Reporter,
    SinkFactory, StopSignal, StorageError,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Step {
    Data(Vec<u8>),
    Zero,
    Fail,
    Panic,
}

#[derive(Debug, Default)]
pub struct DeviceCounters {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
    pub stopped: AtomicUsize,
    pub reads: AtomicUsize,
    pub concurrent: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl DeviceCounters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }
}

/// Backend whose devices replay a script, then repeat `tail` forever
#[derive(Clone)]
pub struct FakeBackend {
    pub counters: Arc<DeviceCounters>,
    script: Vec<Step>,
    tail: Step,
    pace: Duration,
    fail_open: bool,
    raise_after: Option<(usize, StopSignal)>,
}

impl FakeBackend {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            counters: Arc::default(),
            script,
            tail: Step::Data(chunk(0, 64)),
            pace: Duration::ZERO,
            fail_open: false,
            raise_after: None,
        }
    }

    /// Produces `chunk(0, 64)` every `pace` until stopped
    pub fn endless(pace: Duration) -> Self {
        Self::new(Vec::new()).pace(pace)
    }

    pub fn tail(mut self, tail: Step) -> Self {
        self.tail = tail;
        self
    }

    pub fn pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Raise `stop` right after the `reads`-th read returns
    pub fn raise_after(mut self, reads: usize, stop: &StopSignal) -> Self {
        self.raise_after = Some((reads, stop.clone()));
        self
    }
}

impl CaptureBackend for FakeBackend {
    fn open(
        &self,
        _format: AudioFormat,
        _buffer_hint: usize,
    ) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        if self.fail_open {
            return Err(DeviceError::Unavailable);
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_concurrent.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(FakeDevice {
            counters: self.counters.clone(),
            steps: self.script.clone().into(),
            tail: self.tail.clone(),
            pace: self.pace,
            raise_after: self.raise_after.clone(),
            reads: 0,
        }))
    }
}

struct FakeDevice {
    counters: Arc<DeviceCounters>,
    steps: VecDeque<Step>,
    tail: Step,
    pace: Duration,
    raise_after: Option<(usize, StopSignal)>,
    reads: usize,
}

impl CaptureDevice for FakeDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        if !self.pace.is_zero() {
            std::thread::sleep(self.pace);
        }
        self.reads += 1;
        self.counters.reads.fetch_add(1, Ordering::SeqCst);

        if let Some((after, stop)) = &self.raise_after {
            if self.reads == *after {
                stop.raise();
            }
        }

        match self.steps.pop_front().unwrap_or_else(|| self.tail.clone()) {
            Step::Data(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Step::Zero => Ok(0),
            Step::Fail => Err(DeviceError::Read("scripted failure".into())),
            Step::Panic => panic!("scripted device panic"),
        }
    }

    fn stop(&mut self) {
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.counters.concurrent.fetch_sub(1, Ordering::SeqCst);
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct SinkCounters {
    pub created: AtomicUsize,
    pub appends: AtomicUsize,
    pub closed: AtomicUsize,
    pub dropped: AtomicUsize,
}

impl SinkCounters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// In-memory sink with injectable failures
#[derive(Clone, Default)]
pub struct MemorySinkFactory {
    pub counters: Arc<SinkCounters>,
    pub data: Arc<Mutex<Vec<u8>>>,
    fail_write_on: Option<usize>,
    fail_close: bool,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th append (1-based)
    pub fn failing_write_on(mut self, n: usize) -> Self {
        self.fail_write_on = Some(n);
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn create(&self, _path: &Path) -> Result<Box<dyn AudioSink>, StorageError> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySink {
            factory: self.clone(),
            appends: 0,
        }))
    }
}

struct MemorySink {
    factory: MemorySinkFactory,
    appends: usize,
}

impl AudioSink for MemorySink {
    fn append(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.appends += 1;
        if self.factory.fail_write_on == Some(self.appends) {
            return Err(StorageError::Write(std::io::Error::other("disk full")));
        }
        self.factory.counters.appends.fetch_add(1, Ordering::SeqCst);
        self.factory.data.lock().unwrap().extend_from_slice(bytes);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), StorageError> {
        self.factory.counters.closed.fetch_add(1, Ordering::SeqCst);
        if self.factory.fail_close {
            return Err(StorageError::Close(std::io::Error::other("close failed")));
        }
        Ok(())
    }
}

impl Drop for MemorySink {
    fn drop(&mut self) {
        self.factory.counters.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// `len` bytes all set to `value`
pub fn chunk(value: u8, len: usize) -> Vec<u8> {
    vec![value; len]
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Started(PathBuf),
    Success(Duration),
    Failure(FailureReason),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub reports: Vec<Report>,
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn on_started(&mut self, destination: &Path) {
        self.reports.push(Report::Started(destination.to_path_buf()));
    }

    async fn on_success(&mut self, elapsed: Duration) {
        self.reports.push(Report::Success(elapsed));
    }

    async fn on_failure(&mut self, reason: FailureReason) {
        self.reports.push(Report::Failure(reason));
    }
}
