//! Append-only capture buffer for one run.

use chrono::Local;

/// Combined output of every command executed during a run.
///
/// Bytes are only ever appended. Each command section starts with a
/// `"\n++ <timestamp> ++\n"` marker written by [`LogBuffer::mark`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    bytes: Vec<u8>,
}

impl LogBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section marker stamped with the current local time.
    pub fn mark(&mut self) {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S%.f %z");
        self.append(format!("\n++ {} ++\n", now).as_bytes());
    }

    /// Append raw output bytes.
    pub fn append(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Number of section markers written so far.
    pub fn sections(&self) -> usize {
        self.to_string_lossy().matches("\n++ ").count()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
