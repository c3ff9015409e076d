//! Schema Loading
//!
//! Reads the bundled tree into the ordered list of records the coordinator
//! registers. Levels run from the highest number down to 0, so documents
//! mirrored as references (deeper levels) are registered before the
//! subjects that use them. Within a level, subjects are taken in name order.
//!
//! The highest level present fixes the depth of the bundle: every level from
//! there down to 0 must exist, and the bundle must hold at least one schema.

use tracing::debug;

use crate::error::{BootstrapError, Result};
use crate::schema::{SchemaBundle, SchemaRecord};
use crate::source::DocumentSource;

/// Load every bundled schema, highest level first
pub fn load_bundle(source: &dyn DocumentSource) -> Result<SchemaBundle> {
    let levels = source.levels()?;
    let highest = levels.iter().copied().max().ok_or(BootstrapError::EmptyBundle)?;

    let mut records = Vec::new();
    for level in (0..=highest).rev() {
        if !levels.contains(&level) {
            return Err(BootstrapError::MissingLevel { level });
        }

        let mut names = source.list(level)?;
        names.sort();

        for name in names {
            let bytes = source.read(level, &name)?;
            let body = String::from_utf8(bytes).map_err(|_| BootstrapError::InvalidEncoding {
                level,
                name: name.clone(),
            })?;

            debug!(level, subject = %name, bytes = body.len(), "loaded bundled schema");
            records.push(SchemaRecord { name, body });
        }
    }

    if records.is_empty() {
        return Err(BootstrapError::EmptyBundle);
    }
    Ok(SchemaBundle::new(records))
}
