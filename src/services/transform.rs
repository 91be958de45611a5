// src/services/transform.rs

//! Line-to-record transformer for package license exports.
//!
//! Export lines look like `name,version,license`. Anything else is dropped
//! without an error so one corrupt line never stops the rest of a file.

use crate::models::LicenseRecord;

/// Field separator in export lines.
pub const DELIMITER: char = ',';

/// License value the exporter writes when it could not determine one.
pub const UNKNOWN_LICENSE: &str = "unknown";

/// Parse one export line.
///
/// Returns `None` unless the line has exactly three non-empty fields and the
/// third is not [`UNKNOWN_LICENSE`].
pub fn transform_line(line: &str) -> Option<LicenseRecord> {
    let mut fields = line.split(DELIMITER);
    let (name, version, license) = (fields.next()?, fields.next()?, fields.next()?);
    if fields.next().is_some() {
        return None;
    }
    if name.is_empty() || version.is_empty() || license.is_empty() {
        return None;
    }
    if license == UNKNOWN_LICENSE {
        return None;
    }
    Some(LicenseRecord::new(name, version, license))
}
