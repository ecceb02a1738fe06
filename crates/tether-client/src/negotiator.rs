//! Transport negotiator.
//!
//! Decides which transports to offer the server from a preference, whether
//! the platform is restricted, and whether the server forces full transport
//! support. The result is never empty.

use tether_core::{ConnectionConfig, TransportKind, TransportSet};

/// Widen `preferred` from its most capable transport downward, then apply the
/// platform rule.
///
/// An empty preference means every transport. On a restricted platform
/// WebSockets are removed unless `force_full_transport` is set.
pub fn negotiate(
    preferred: TransportSet,
    platform_restricted: bool,
    force_full_transport: bool,
) -> TransportSet {
    let widened = match preferred.most_capable() {
        None => TransportSet::all(),
        Some(top) => TransportKind::ALL
            .into_iter()
            .skip_while(|kind| *kind != top)
            .collect(),
    };
    apply_platform_rule(widened, platform_restricted, force_full_transport)
}

/// Keep `preferred` as-is after the platform rule, falling back to
/// [`negotiate`] when nothing would be left.
pub fn pin(
    preferred: TransportSet,
    platform_restricted: bool,
    force_full_transport: bool,
) -> TransportSet {
    let pinned = apply_platform_rule(preferred, platform_restricted, force_full_transport);
    if pinned.is_empty() {
        negotiate(preferred, platform_restricted, force_full_transport)
    } else {
        pinned
    }
}

fn apply_platform_rule(set: TransportSet, platform_restricted: bool, force: bool) -> TransportSet {
    if platform_restricted && !force {
        set.without(TransportKind::WebSockets)
    } else {
        set
    }
}

/// Local transport preferences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportPreferences {
    /// Locally preferred transports. Empty defers to the resolved config.
    pub preferred: TransportSet,
    /// Widen to less capable transports ([`negotiate`]) or keep the
    /// preference exact ([`pin`]).
    pub allow_fallback: bool,
    /// Whether the platform cannot sustain WebSockets.
    pub platform_restricted: bool,
}

impl Default for TransportPreferences {
    fn default() -> Self {
        Self {
            preferred: TransportSet::empty(),
            allow_fallback: true,
            platform_restricted: false,
        }
    }
}

/// Final transport decision for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportPlan {
    /// Transports to offer, most capable first.
    pub transports: TransportSet,
    /// Connect straight over WebSockets without the negotiate round-trip.
    pub skip_negotiation: bool,
}

/// Combine a resolved config with local preferences.
///
/// `skip_negotiation` survives only when the final set is exactly WebSockets.
pub fn plan(
    config: &ConnectionConfig,
    prefs: &TransportPreferences,
    force_full_transport: bool,
) -> TransportPlan {
    let preferred = if prefs.preferred.is_empty() {
        config.transports
    } else {
        prefs.preferred
    };
    let transports = if prefs.allow_fallback {
        negotiate(preferred, prefs.platform_restricted, force_full_transport)
    } else {
        pin(preferred, prefs.platform_restricted, force_full_transport)
    };
    TransportPlan {
        transports,
        skip_negotiation: config.skip_negotiation
            && transports.is_only(TransportKind::WebSockets),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
