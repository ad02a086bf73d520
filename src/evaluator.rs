//! The entitlement evaluator: a license key plus a device id in, a single
//! decision out.
//!
//! The check order is part of the contract, not an optimization: a caller
//! probing an inactive license must see `Inactive` even when the license is
//! also expired or bound elsewhere, because each earlier state supersedes
//! the later ones. First-use binding is the only write on this path.

use crate::model::License;
use crate::store::{LicenseStore, StoreResult};
use chrono::{DateTime, Utc};

/// Outcome of evaluating one `(key, device)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No license with that key.
    NotFound,
    /// License exists but was administratively deactivated.
    Inactive,
    /// License exists but its expiry has passed.
    Expired,
    /// License is permanently bound to a different device.
    BoundElsewhere(String),
    /// The pairing is entitled; carries the current record.
    Granted(License),
}

/// Evaluates whether `(key, device)` is entitled, binding the license to
/// `device` if this is its first successful validation.
///
/// Callers must reject empty `key`/`device` before getting here; the
/// evaluator assumes both are non-empty. Store failures propagate as
/// errors and are never folded into a [`Decision`].
pub fn evaluate(
    store: &dyn LicenseStore,
    key: &str,
    device: &str,
    now: DateTime<Utc>,
) -> StoreResult<Decision> {
    let Some(license) = store.find_by_key(key)? else {
        return Ok(Decision::NotFound);
    };

    if !license.is_active {
        return Ok(Decision::Inactive);
    }

    if license.is_expired(now) {
        return Ok(Decision::Expired);
    }

    match license.device_id {
        None => {
            if store.try_bind_device(key, device)? {
                // We won the bind; re-read so the granted record carries it.
                match store.find_by_key(key)? {
                    Some(bound) => Ok(Decision::Granted(bound)),
                    None => Ok(Decision::NotFound),
                }
            } else {
                // Lost a first-use race. Re-fetch to see who won: the same
                // device retrying concurrently is still granted.
                match store.find_by_key(key)? {
                    None => Ok(Decision::NotFound),
                    Some(current) => match current.device_id.clone() {
                        Some(bound) if bound != device => {
                            Ok(Decision::BoundElsewhere(bound))
                        }
                        _ => Ok(Decision::Granted(current)),
                    },
                }
            }
        }
        Some(ref bound) if bound != device => Ok(Decision::BoundElsewhere(bound.clone())),
        Some(_) => Ok(Decision::Granted(license)),
    }
}
