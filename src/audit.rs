//! Append-only decision trail
use super::error::WorkflowError;
use super::request::TimeStamp;
use chrono::Utc;

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct AuditLogEntry {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub at: TimeStamp<Utc>,
    // display name of the employee whose decision is being recorded
    #[n(2)]
    pub actor: String,
    #[n(3)]
    pub activity: String,
}

impl AuditLogEntry {
    // entries are keyed by their raw uuid7 bytes, which sort by creation
    // time; a reverse scan over the prefix is therefore newest-first
    pub fn storage_key(uuid_bytes: &[u8]) -> Vec<u8> {
        [b"log:".as_slice(), uuid_bytes].concat()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WorkflowError> {
        minicbor::to_vec(self).map_err(|e| WorkflowError::corrupt("audit entry", &self.id, e))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WorkflowError> {
        minicbor::decode(bytes).map_err(|e| WorkflowError::corrupt("audit entry", "<scan>", e))
    }
}

/// The most recent `limit` entries, newest first.
pub fn recent(tree: &sled::Tree, limit: usize) -> Result<Vec<AuditLogEntry>, WorkflowError> {
    let mut entries = Vec::new();

    for item in tree.scan_prefix(b"log:").rev().take(limit) {
        let (_, value) = item?;
        entries.push(AuditLogEntry::from_bytes(&value)?);
    }

    Ok(entries)
}
