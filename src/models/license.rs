//! Package license record.

use serde::{Deserialize, Serialize};

/// One package/version/license triple parsed from an export line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LicenseRecord {
    /// Package name
    pub name: String,

    /// Package version
    pub version: String,

    /// License expression as exported
    pub license: String,
}

impl LicenseRecord {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        license: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            license: license.into(),
        }
    }
}
