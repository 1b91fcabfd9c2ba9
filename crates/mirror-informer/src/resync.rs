//! Resync period coercion.

use std::time::Duration;

use tracing::warn;

/// Smallest resync period a handler may request. Requests below this are
/// raised to it.
pub(crate) const MINIMUM_RESYNC_PERIOD: Duration = Duration::from_secs(1);

/// Coerce a handler's requested resync period against the informer's resync
/// check period.
///
/// - zero requested: resync disabled for that handler
/// - non-zero requested on an informer that never checks: disabled, with a
///   warning
/// - requested below the check period: raised to the check period, with a
///   warning (the check tick is the finest granularity available)
/// - otherwise: the requested period stands
pub(crate) fn determine_resync_period(desired: Duration, check: Duration) -> Duration {
    if desired.is_zero() {
        return desired;
    }
    if check.is_zero() {
        warn!(
            requested = ?desired,
            "requested resync period is invalid: this informer does not resync"
        );
        return Duration::ZERO;
    }
    if desired < check {
        warn!(
            requested = ?desired,
            check_period = ?check,
            "requested resync period raised to the resync check period"
        );
        return check;
    }
    desired
}
