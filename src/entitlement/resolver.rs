//! The entitlement resolver: a pure function from session state and the
//! current time to a rendering instruction.
//!
//! The resolver performs no I/O and holds no state; everything it needs
//! arrives in the [`Session`] value. That keeps the gating logic testable
//! without a network and guarantees identical inputs produce identical
//! output.

use chrono::{DateTime, Utc};

use crate::session::{Session, UserSnapshot};

/// Length of the free trial, in days, measured from `trial_start`
pub const TRIAL_WINDOW_DAYS: i64 = 7;

/// The access tier in effect for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementDecision {
    /// Payment confirmed; full access
    Paid,

    /// Inside the trial window
    TrialActive {
        /// Whole days left in the window
        days_remaining: i64,
    },

    /// Trial window has elapsed without payment
    TrialExpired,

    /// No trial was ever started and no payment was made
    NoTrial,
}

/// What the presentation layer should do with a protected view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessInstruction {
    /// No session; send the user to login before anything else
    RequireLogin,

    /// Signed in but the profile has not arrived yet; render a loading state
    Pending,

    /// Render the protected content
    Allow,

    /// Block with the paywall (or the trial-activation variant of it when
    /// the decision is [`EntitlementDecision::NoTrial`])
    ShowPaywall,
}

/// The resolver's output: an instruction, and the decision behind it once
/// one could be made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// What the caller should render
    pub instruction: AccessInstruction,

    /// The access tier, absent until a snapshot is available
    pub decision: Option<EntitlementDecision>,
}

impl Resolution {
    fn without_decision(instruction: AccessInstruction) -> Self {
        Self {
            instruction,
            decision: None,
        }
    }
}

/// Resolve a session into a rendering instruction.
///
/// Precedence: an explicit server-reported status on the session wins over
/// anything derived from the cached snapshot fields; derivation is the
/// fallback for snapshots that arrived without one. A confirmed payment
/// wins over everything, including a contradictory server status.
pub fn resolve(session: &Session, now: DateTime<Utc>) -> Resolution {
    if session.token.is_none() {
        return Resolution::without_decision(AccessInstruction::RequireLogin);
    }

    let Some(user) = session.user.as_ref() else {
        return Resolution::without_decision(AccessInstruction::Pending);
    };

    let decision = match session.server_status {
        Some(status) => status,
        None => derive_status(user, now),
    };

    let (instruction, decision) = match decision {
        EntitlementDecision::Paid | EntitlementDecision::TrialActive { .. } => {
            (AccessInstruction::Allow, decision)
        }
        EntitlementDecision::TrialExpired | EntitlementDecision::NoTrial => {
            if user.payment_done {
                // Paid always wins, even against a contradictory status
                (AccessInstruction::Allow, EntitlementDecision::Paid)
            } else {
                (AccessInstruction::ShowPaywall, decision)
            }
        }
    };

    Resolution {
        instruction,
        decision: Some(decision),
    }
}

/// Derive the access tier from the snapshot fields alone
fn derive_status(user: &UserSnapshot, now: DateTime<Utc>) -> EntitlementDecision {
    if user.payment_done {
        return EntitlementDecision::Paid;
    }

    let Some(trial_start) = user.trial_start_at() else {
        return EntitlementDecision::NoTrial;
    };

    let days_elapsed = (now - trial_start).num_days();
    if days_elapsed < TRIAL_WINDOW_DAYS {
        EntitlementDecision::TrialActive {
            days_remaining: TRIAL_WINDOW_DAYS - days_elapsed,
        }
    } else {
        EntitlementDecision::TrialExpired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot() -> UserSnapshot {
        UserSnapshot {
            id: "user-1".to_string(),
            ..Default::default()
        }
    }

    fn session_with(user: UserSnapshot) -> Session {
        Session::new(Some("token".to_string()), Some(user), None)
    }

    fn trial_started(days_ago: i64, now: DateTime<Utc>) -> UserSnapshot {
        UserSnapshot {
            trial_start: Some((now - Duration::days(days_ago)).to_rfc3339()),
            ..snapshot()
        }
    }

    #[test]
    fn anonymous_session_requires_login() {
        let resolution = resolve(&Session::anonymous(), Utc::now());
        assert_eq!(resolution.instruction, AccessInstruction::RequireLogin);
        assert_eq!(resolution.decision, None);
    }

    #[test]
    fn no_token_requires_login() {
        let session = Session::new(None, Some(snapshot()), None);
        let resolution = resolve(&session, Utc::now());
        assert_eq!(resolution.instruction, AccessInstruction::RequireLogin);
        assert_eq!(resolution.decision, None);
    }

    #[test]
    fn token_without_snapshot_is_pending() {
        let session = Session::new(Some("token".to_string()), None, None);
        let resolution = resolve(&session, Utc::now());
        assert_eq!(resolution.instruction, AccessInstruction::Pending);
        assert_eq!(resolution.decision, None);
    }

    #[test]
    fn paid_allows_regardless_of_trial_fields() {
        let now = Utc::now();
        let user = UserSnapshot {
            payment_done: true,
            trial_used: true,
            ..trial_started(30, now)
        };
        let resolution = resolve(&session_with(user), now);
        assert_eq!(resolution.instruction, AccessInstruction::Allow);
        assert_eq!(resolution.decision, Some(EntitlementDecision::Paid));
    }

    #[test]
    fn unpaid_without_trial_hits_paywall() {
        let resolution = resolve(&session_with(snapshot()), Utc::now());
        assert_eq!(resolution.instruction, AccessInstruction::ShowPaywall);
        assert_eq!(resolution.decision, Some(EntitlementDecision::NoTrial));
    }

    #[test]
    fn three_day_old_trial_is_active_with_four_left() {
        let now = Utc::now();
        let resolution = resolve(&session_with(trial_started(3, now)), now);
        assert_eq!(resolution.instruction, AccessInstruction::Allow);
        assert_eq!(
            resolution.decision,
            Some(EntitlementDecision::TrialActive { days_remaining: 4 })
        );
    }

    #[test]
    fn eight_day_old_trial_is_expired() {
        let now = Utc::now();
        let resolution = resolve(&session_with(trial_started(8, now)), now);
        assert_eq!(resolution.instruction, AccessInstruction::ShowPaywall);
        assert_eq!(resolution.decision, Some(EntitlementDecision::TrialExpired));
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let now = Utc::now();
        let resolution = resolve(&session_with(trial_started(7, now)), now);
        assert_eq!(resolution.decision, Some(EntitlementDecision::TrialExpired));

        let resolution = resolve(&session_with(trial_started(6, now)), now);
        assert_eq!(
            resolution.decision,
            Some(EntitlementDecision::TrialActive { days_remaining: 1 })
        );
    }

    #[test]
    fn malformed_trial_start_acts_like_absent() {
        let now = Utc::now();
        let user = UserSnapshot {
            trial_start: Some("not-a-timestamp".to_string()),
            ..snapshot()
        };
        let resolution = resolve(&session_with(user), now);
        assert_eq!(resolution.instruction, AccessInstruction::ShowPaywall);
        assert_eq!(resolution.decision, Some(EntitlementDecision::NoTrial));
    }

    #[test]
    fn explicit_server_status_wins_over_derivation() {
        let now = Utc::now();
        // Snapshot fields alone would say the trial is long over
        let session = Session::new(
            Some("token".to_string()),
            Some(trial_started(30, now)),
            Some(EntitlementDecision::TrialActive { days_remaining: 2 }),
        );
        let resolution = resolve(&session, now);
        assert_eq!(resolution.instruction, AccessInstruction::Allow);
        assert_eq!(
            resolution.decision,
            Some(EntitlementDecision::TrialActive { days_remaining: 2 })
        );
    }

    #[test]
    fn paid_wins_over_contradictory_server_status() {
        let now = Utc::now();
        let user = UserSnapshot {
            payment_done: true,
            ..snapshot()
        };
        let session = Session::new(
            Some("token".to_string()),
            Some(user),
            Some(EntitlementDecision::TrialExpired),
        );
        let resolution = resolve(&session, now);
        assert_eq!(resolution.instruction, AccessInstruction::Allow);
        assert_eq!(resolution.decision, Some(EntitlementDecision::Paid));
    }

    #[test]
    fn resolution_is_idempotent() {
        let now = Utc::now();
        let session = session_with(trial_started(2, now));
        assert_eq!(resolve(&session, now), resolve(&session, now));
    }
}
