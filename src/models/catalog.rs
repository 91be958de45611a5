//! SPDX license list structures.

use serde::{Deserialize, Serialize};

/// Document served by the license list feed.
///
/// `licenseListVersion` and `licenses` are required; individual license
/// fields fall back to their zero values when absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    pub license_list_version: String,
    pub licenses: Vec<CatalogLicense>,
}

impl CatalogDocument {
    /// Stamp every license with the document's version.
    pub fn into_entries(self) -> (String, Vec<CatalogEntry>) {
        let version = self.license_list_version;
        let entries = self
            .licenses
            .into_iter()
            .map(|license| CatalogEntry::from_license(&version, license))
            .collect();
        (version, entries)
    }
}

/// A license object as it appears in the feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogLicense {
    pub reference: String,
    pub is_deprecated_license_id: bool,
    pub details_url: String,
    pub reference_number: i64,
    pub name: String,
    pub license_id: String,
    pub see_also: Vec<String>,
    pub is_osi_approved: bool,
}

/// A persisted catalog entry, versioned by `licenseListVersion`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub license_list_version: String,
    pub reference: String,
    pub is_deprecated_license_id: bool,
    pub details_url: String,
    pub reference_number: i64,
    pub name: String,
    pub license_id: String,
    pub see_also: Vec<String>,
    pub is_osi_approved: bool,
}

impl CatalogEntry {
    /// Field the version gate filters on.
    pub const VERSION_FIELD: &'static str = "licenseListVersion";

    pub fn from_license(version: &str, license: CatalogLicense) -> Self {
        Self {
            license_list_version: version.to_string(),
            reference: license.reference,
            is_deprecated_license_id: license.is_deprecated_license_id,
            details_url: license.details_url,
            reference_number: license.reference_number,
            name: license.name,
            license_id: license.license_id,
            see_also: license.see_also,
            is_osi_approved: license.is_osi_approved,
        }
    }
}
