//! The fixed per-invocation phase order.

use core::fmt;

use serde::{Serialize, Serializer};

/// One named point in the execution order.
///
/// Variants are declared in execution order, so `Ord` follows it. `OnError`
/// and `OnSuccess` are terminal and mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Security dependencies. Always before any transaction.
    PreTxSecdep,
    /// Plain dependencies. Always before any transaction.
    PreTxDep,
    /// Payload preparation before the transaction opens.
    PreTxBegin,
    /// Transaction begin marker, then hooks inside the new transaction.
    StartTx,
    /// Input validation and other pre-handler work.
    PreHandler,
    /// The operation handler.
    Handler,
    /// Result shaping.
    PostHandler,
    /// Last chance to abort before commit.
    PreCommit,
    /// Commit marker, then post-commit hooks.
    EndTx,
    /// After the response is produced. Failures are logged and ignored.
    PostResponse,
    /// Runs after a failure, once rollback is done.
    OnError,
    /// Runs after success. Failures are logged and ignored.
    OnSuccess,
}

impl Phase {
    /// Every phase, in execution order.
    pub const ALL: [Phase; 12] = [
        Phase::PreTxSecdep,
        Phase::PreTxDep,
        Phase::PreTxBegin,
        Phase::StartTx,
        Phase::PreHandler,
        Phase::Handler,
        Phase::PostHandler,
        Phase::PreCommit,
        Phase::EndTx,
        Phase::PostResponse,
        Phase::OnError,
        Phase::OnSuccess,
    ];

    /// Wire name (`"PRE_TX_SECDEP"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreTxSecdep => "PRE_TX_SECDEP",
            Phase::PreTxDep => "PRE_TX_DEP",
            Phase::PreTxBegin => "PRE_TX_BEGIN",
            Phase::StartTx => "START_TX",
            Phase::PreHandler => "PRE_HANDLER",
            Phase::Handler => "HANDLER",
            Phase::PostHandler => "POST_HANDLER",
            Phase::PreCommit => "PRE_COMMIT",
            Phase::EndTx => "END_TX",
            Phase::PostResponse => "POST_RESPONSE",
            Phase::OnError => "ON_ERROR",
            Phase::OnSuccess => "ON_SUCCESS",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == name)
    }

    /// Phases that run before any transaction and whose failures are coerced
    /// into the authorization family.
    #[must_use]
    pub fn is_pre_tx(&self) -> bool {
        matches!(self, Phase::PreTxSecdep | Phase::PreTxDep)
    }

    /// Phases whose failures abort the invocation.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        *self <= Phase::EndTx
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_sorted_by_execution_order() {
        let mut sorted = Phase::ALL;
        sorted.sort();
        assert_eq!(sorted, Phase::ALL);
    }

    #[test]
    fn secdeps_precede_begin() {
        assert!(Phase::PreTxSecdep < Phase::PreTxBegin);
        assert!(Phase::PreTxDep < Phase::StartTx);
        assert!(Phase::StartTx < Phase::Handler);
        assert!(Phase::Handler < Phase::EndTx);
    }

    #[test]
    fn names_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(Phase::parse(phase.as_str()), Some(phase));
        }
    }

    #[test]
    fn only_terminal_phases_are_nonfatal() {
        let nonfatal: Vec<_> = Phase::ALL.into_iter().filter(|p| !p.is_fatal()).collect();
        assert_eq!(
            nonfatal,
            vec![Phase::PostResponse, Phase::OnError, Phase::OnSuccess]
        );
    }
}
