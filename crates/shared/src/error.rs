use thiserror::Error;

use crate::domain::ChainId;

/// Failure taxonomy for controller operations. Wallet and contract failures
/// are mapped into these variants at the operation boundary; nothing below
/// the controller leaks to the view layer.
#[derive(Debug, Error)]
pub enum DappError {
    #[error("connected chain {actual} does not match expected chain {expected}")]
    NetworkMismatch { expected: ChainId, actual: ChainId },
    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("contract read failed: {0}")]
    CallFailed(String),
    #[error("whitelist transaction failed: {0}")]
    TransactionFailed(String),
    #[error("wallet connection already in progress")]
    ConnectInProgress,
    #[error("operation requires a connected wallet")]
    NotConnected,
    #[error("a join transaction is already awaiting confirmation")]
    JoinPending,
    #[error("connected address is already whitelisted")]
    AlreadyWhitelisted,
}
