//! License records and their JSON projection.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A license row as held by the persistence layer.
///
/// `license_key` is immutable and unique. `device_id` starts out `None` and
/// is set exactly once by the first successful validation; it never changes
/// afterwards. `is_active` is flipped only by administrative deactivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    /// Opaque unique key identifying one purchased entitlement.
    pub license_key: String,
    /// Device the license is bound to, once a validation has claimed it.
    pub device_id: Option<String>,
    /// Administrative kill switch.
    pub is_active: bool,
    /// Optional expiry. `None` means the license never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation time, set by the store on insert.
    pub created_at: DateTime<Utc>,
}

impl License {
    /// Returns true if the license is past its expiry at `now`.
    ///
    /// The comparison is exclusive: a validation arriving exactly at
    /// `expires_at` is still within the entitlement.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => false,
            Some(exp) => now > exp,
        }
    }

    /// Projects the record into its wire representation.
    #[must_use]
    pub fn to_view(&self) -> LicenseView {
        LicenseView {
            license_key: self.license_key.clone(),
            device_id: self.device_id.clone(),
            is_active: self.is_active,
            expires_at: self.expires_at.map(|t| t.to_rfc3339()),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// The JSON shape of a license as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseView {
    pub license_key: String,
    pub device_id: Option<String>,
    pub is_active: bool,
    /// RFC 3339 UTC, or null for perpetual licenses.
    pub expires_at: Option<String>,
    /// RFC 3339 UTC.
    pub created_at: String,
}

/// Parses a client-supplied expiry timestamp.
///
/// Accepts RFC 3339 (with offset or `Z`) and a bare
/// `YYYY-MM-DDTHH:MM:SS[.fff]`, which is interpreted as UTC. Returns `None`
/// when the string fits neither form.
#[must_use]
pub fn parse_expires_at(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(input) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}
