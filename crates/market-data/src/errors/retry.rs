/// Classification for retry policy.
///
/// Used by the fallback chain to decide whether to move on to the next
/// provider and whether the failure should feed the asset's backoff.
///
/// | Class | Try Next Provider? | Counts as transient? |
/// |-------|-------------------|----------------------|
/// | `Never` | No | No |
/// | `WithBackoff` | Yes | Yes |
/// | `NextProvider` | Yes | No (permanent for this provider) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry. The request itself is invalid or was cancelled.
    Never,

    /// Transient failure (timeout, rate limit, network, bad payload).
    ///
    /// Fail over to the next provider now, and schedule the asset for a
    /// backoff retry if no provider succeeds.
    WithBackoff,

    /// The provider cannot serve this symbol (unknown symbol, unsupported
    /// operation). Another provider might.
    NextProvider,
}
