//! Errors surfaced by the resolver.

/// The only way a resolution fails outright.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A pass declared with [`LimitAction::Abort`](crate::LimitAction::Abort)
    /// reported more candidates than its limit.
    #[error("pass {pass:?} reported {found} candidates, above its limit of {limit}")]
    PassLimitExceeded {
        /// Name of the pass.
        pass: String,
        /// Declared maximum.
        limit: usize,
        /// Number of candidates reported.
        found: usize,
    },
}
