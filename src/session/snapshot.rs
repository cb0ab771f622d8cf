//! The cached user snapshot and its lenient field handling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time copy of the user and payment fields the platform
/// reported, cached client-side.
///
/// The snapshot may be stale relative to the server; the entitlement
/// resolver tolerates that by preferring an explicit server-reported
/// status when one accompanies the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    /// The user ID
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,

    /// Whether the platform has confirmed payment
    #[serde(default)]
    pub payment_done: bool,

    /// The subscription status string as the platform reported it
    #[serde(default)]
    pub subscription_status: Option<String>,

    /// Trial start timestamp, carried as the raw wire value
    #[serde(default)]
    pub trial_start: Option<String>,

    /// Whether the one free trial has been consumed
    #[serde(default)]
    pub trial_used: bool,
}

impl UserSnapshot {
    /// Parse `trial_start` as an RFC 3339 timestamp.
    ///
    /// A malformed value behaves exactly like an absent one; a bad
    /// timestamp must never block resolution.
    pub fn trial_start_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.trial_start.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(err) => {
                log::debug!("unparseable trial_start {:?}: {}", raw, err);
                None
            }
        }
    }
}
