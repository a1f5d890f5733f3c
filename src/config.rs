//! Constraints the service enforces on payloads beyond the state tables
use super::error::{LedgerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Longest accepted free-text field (notes and farm provenance), in bytes.
    pub max_notes_len: usize,
    /// Most raw lots a single blend may consume.
    pub max_blend_inputs: usize,
    /// Persist notification events next to the records they describe.
    pub record_events: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_notes_len: 1024,
            max_blend_inputs: 64,
            record_events: true,
        }
    }
}

impl ChainConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_max_notes_len(mut self, len: usize) -> Self {
        self.max_notes_len = len;
        self
    }
    pub fn set_max_blend_inputs(mut self, count: usize) -> Self {
        self.max_blend_inputs = count;
        self
    }
    pub fn set_record_events(mut self, record: bool) -> Self {
        self.record_events = record;
        self
    }

    pub fn check_text(&self, field: &str, value: &str) -> Result<()> {
        if value.len() > self.max_notes_len {
            return Err(LedgerError::InvalidPayload(format!(
                "{field} is {} bytes, limit is {}",
                value.len(),
                self.max_notes_len
            )));
        }
        Ok(())
    }
}
