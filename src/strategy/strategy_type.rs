use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

/// Execution policy a client routes its calls through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrategyType {
    /// Plain calls
    #[default]
    Usual,
    /// Writes serialized by a distributed lock, contention races tolerated
    Contend,
    /// As `Contend`, multi-node writes committed as one transaction
    TransactionContend,
    /// Calls retried inline with backoff
    SyncRetry,
    /// Failed writes retried in the background
    AsyncRetry,
}

impl StrategyType {
    pub const ALL: [StrategyType; 5] = [
        StrategyType::Usual,
        StrategyType::Contend,
        StrategyType::TransactionContend,
        StrategyType::SyncRetry,
        StrategyType::AsyncRetry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::Usual => "USUAL",
            StrategyType::Contend => "CONTEND",
            StrategyType::TransactionContend => "TRANSACTION_CONTEND",
            StrategyType::SyncRetry => "SYNC_RETRY",
            StrategyType::AsyncRetry => "ASYNC_RETRY",
        }
    }

    /// Case-insensitive; any unknown name maps to [`StrategyType::Usual`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "USUAL" => StrategyType::Usual,
            "CONTEND" => StrategyType::Contend,
            "TRANSACTION_CONTEND" => StrategyType::TransactionContend,
            "SYNC_RETRY" => StrategyType::SyncRetry,
            "ASYNC_RETRY" => StrategyType::AsyncRetry,
            _ => {
                warn!("unknown strategy type {:?}, falling back to USUAL", name);
                StrategyType::Usual
            }
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StrategyType::parse(s))
    }
}

impl From<&str> for StrategyType {
    fn from(name: &str) -> Self {
        StrategyType::parse(name)
    }
}

impl From<String> for StrategyType {
    fn from(name: String) -> Self {
        StrategyType::parse(&name)
    }
}

impl From<StrategyType> for String {
    fn from(kind: StrategyType) -> Self {
        kind.as_str().to_string()
    }
}
