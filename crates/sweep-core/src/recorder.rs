//! Artefact capture handles passed explicitly to evaluators.

use crate::value::Artifact;

/// Media type produced by [`MemoryRecorder`].
pub const RECORDING_MEDIA_TYPE: &str = "application/x-rerun-rrd";

/// Factory for recording sessions scoped to a single evaluation.
pub trait Recorder: Send + Sync {
    /// Opens a new session; the session is released when finished or dropped.
    fn open(&self, label: &str) -> Box<dyn RecordingSession + '_>;
}

/// Recording session owned by one evaluator invocation.
pub trait RecordingSession {
    /// Appends a payload logged under `entity`.
    fn log(&mut self, entity: &str, payload: &[u8]);

    /// Closes the session and returns the captured artefact.
    fn finish(self: Box<Self>) -> Artifact;
}

/// Recorder that captures every logged entity into an in-memory blob.
///
/// The blob layout is a label header followed by length-prefixed
/// `(entity, payload)` frames, all lengths little-endian `u32`/`u64`.
#[derive(Debug, Clone)]
pub struct MemoryRecorder {
    media_type: String,
}

impl MemoryRecorder {
    /// Creates a recorder producing [`RECORDING_MEDIA_TYPE`] artefacts.
    pub fn new() -> Self {
        Self::with_media_type(RECORDING_MEDIA_TYPE)
    }

    /// Creates a recorder tagging artefacts with `media_type`.
    pub fn with_media_type(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
        }
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for MemoryRecorder {
    fn open(&self, label: &str) -> Box<dyn RecordingSession + '_> {
        let mut buffer = Vec::new();
        push_frame(&mut buffer, label.as_bytes());
        Box::new(MemorySession {
            media_type: self.media_type.as_str(),
            buffer,
        })
    }
}

struct MemorySession<'a> {
    media_type: &'a str,
    buffer: Vec<u8>,
}

impl RecordingSession for MemorySession<'_> {
    fn log(&mut self, entity: &str, payload: &[u8]) {
        push_frame(&mut self.buffer, entity.as_bytes());
        self.buffer
            .extend_from_slice(&(payload.len() as u64).to_le_bytes());
        self.buffer.extend_from_slice(payload);
    }

    fn finish(self: Box<Self>) -> Artifact {
        Artifact::new(self.media_type, self.buffer)
    }
}

fn push_frame(buffer: &mut Vec<u8>, bytes: &[u8]) {
    buffer.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buffer.extend_from_slice(bytes);
}

/// Recorder discarding everything; sessions finish into an empty artefact.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn open(&self, _label: &str) -> Box<dyn RecordingSession + '_> {
        Box::new(NullSession)
    }
}

struct NullSession;

impl RecordingSession for NullSession {
    fn log(&mut self, _entity: &str, _payload: &[u8]) {}

    fn finish(self: Box<Self>) -> Artifact {
        Artifact::new("application/octet-stream", Vec::new())
    }
}
