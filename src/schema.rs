//! Schema records and the loaded bundle

use sha2::{Digest, Sha256};

/// A single schema to register
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRecord {
    /// Subject the schema is registered under (e.g., "orders-value")
    pub name: String,
    /// Registration payload, exactly as bundled
    pub body: String,
}

impl SchemaRecord {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// The ordered schema list produced at startup
#[derive(Debug, Clone)]
pub struct SchemaBundle {
    /// Records in registration order
    pub records: Vec<SchemaRecord>,
    /// SHA256 over every name and body, in order
    pub digest: String,
}

impl SchemaBundle {
    pub fn new(records: Vec<SchemaRecord>) -> Self {
        let mut hasher = Sha256::new();
        for record in &records {
            hasher.update(record.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(record.body.as_bytes());
            hasher.update([0u8]);
        }

        Self {
            records,
            digest: format!("{:x}", hasher.finalize()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Subject names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }
}
