// 8.0.2: result types and errors for engine operations.

use crate::collateral::CollateralError;
use crate::config::ConfigError;
use crate::custody::CustodyError;
use crate::fee_pool::PerBucket;
use crate::liquidity::LiquidityError;
use crate::price_feed::OracleError;
use crate::types::{AccountId, Amount, Leg, PerLeg, Price, Side, Timestamp, TokenId, Usd};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct OpenResult {
    pub size_usd: Usd,
    pub entry_price: Price,
    // margin after fees, in margin tokens
    pub margin: Amount,
    pub opening_fee: Amount,
    pub leverage_fee: Amount,
}

#[derive(Debug, Clone)]
pub struct CloseResult {
    pub entry_price: Price,
    pub exit_price: Price,
    pub profit_usd: Usd,
    pub profit_tokens: Decimal,
    pub returned: Amount,
}

#[derive(Debug, Clone)]
pub struct LiquidationResult {
    pub trader: AccountId,
    pub exit_price: Price,
    pub loss_usd: Usd,
    pub margin_forfeited: Amount,
    pub margin_leg: Leg,
}

#[derive(Debug, Clone)]
pub struct FundingResult {
    pub rate: Decimal,
    pub paying_side: Option<Side>,
    pub collected: PerLeg<Amount>,
    pub lp_skim: PerLeg<Amount>, // LP cut
    pub distributed: PerLeg<Amount>,
    pub payers: usize,
    pub receivers: usize,
    pub liquidated: Vec<AccountId>,
}

#[derive(Debug, Clone)]
pub struct WithdrawResult {
    pub paid: PerLeg<Amount>,
    pub profit_released: PerLeg<Amount>,
}

#[derive(Debug, Clone)]
pub struct LpWithdrawal {
    pub claimed: PerLeg<PerBucket>,
}

impl LpWithdrawal {
    pub fn total(&self, leg: Leg) -> Amount {
        self.claimed[leg].total()
    }
}

/// Error taxonomy every `EngineError` falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InsufficientFunds,
    Unauthorized,
    Oracle,
    Timing,
    Transfer,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Leverage {requested} exceeds maximum {max}")]
    LeverageTooHigh { requested: Decimal, max: Decimal },

    #[error("Leverage {0} is below 1x")]
    InvalidLeverage(Decimal),

    #[error("Token {0:?} is not one of the pool currencies")]
    UnsupportedCurrency(TokenId),

    #[error("Trader {0:?} already holds a position")]
    PositionExists(AccountId),

    #[error("Trader {0:?} holds no position")]
    NoPosition(AccountId),

    #[error("Trader {0:?} must close their position first")]
    PositionOpen(AccountId),

    #[error("Trader {0:?} holds no collateral")]
    NoCollateral(AccountId),

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Insufficient collateral in {leg:?}: required {required}, available {available}")]
    InsufficientCollateral {
        leg: Leg,
        required: Amount,
        available: Amount,
    },

    #[error("Capacity exceeded: {locked} locked + {size} requested > {pooled} pooled")]
    CapacityExceeded { locked: Usd, size: Usd, pooled: Usd },

    #[error("Insufficient pool capital in {leg:?}: required {required}, available {available}")]
    InsufficientPoolCapital {
        leg: Leg,
        required: Amount,
        available: Amount,
    },

    #[error("Insufficient buffer capital in {leg:?}: required {required}, available {available}")]
    InsufficientBufferCapital {
        leg: Leg,
        required: Amount,
        available: Amount,
    },

    #[error("{0:?} is not the operator")]
    Unauthorized(AccountId),

    #[error("Stale price: {0}")]
    StalePrice(OracleError),

    #[error("Price feed mismatch: {0}")]
    PriceMismatch(OracleError),

    #[error("Too early: next distribution at {next_allowed:?}, now {now:?}")]
    TooEarly { next_allowed: Timestamp, now: Timestamp },

    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] CustodyError),

    #[error("Liquidity locked: {required} USD must stay, {remaining} USD would remain")]
    LiquidityLocked { required: Usd, remaining: Usd },

    #[error("Not liquidatable: loss {loss} below threshold {threshold}")]
    NotLiquidatable { loss: Amount, threshold: Amount },

    #[error("Invalid pool report: {0}")]
    InvalidPoolReport(LiquidityError),

    #[error("LP {lp:?} deposited {deposited} of {leg:?}, cannot remove {requested}")]
    InsufficientLpDeposit {
        lp: AccountId,
        leg: Leg,
        requested: Amount,
        deposited: Amount,
    },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::LeverageTooHigh { .. }
            | EngineError::InvalidLeverage(_)
            | EngineError::UnsupportedCurrency(_)
            | EngineError::PositionExists(_)
            | EngineError::NoPosition(_)
            | EngineError::PositionOpen(_)
            | EngineError::NoCollateral(_)
            | EngineError::InvalidAmount
            | EngineError::NotLiquidatable { .. }
            | EngineError::InvalidPoolReport(_)
            | EngineError::Config(_) => ErrorKind::Validation,

            EngineError::InsufficientCollateral { .. }
            | EngineError::CapacityExceeded { .. }
            | EngineError::InsufficientPoolCapital { .. }
            | EngineError::InsufficientBufferCapital { .. }
            | EngineError::LiquidityLocked { .. }
            | EngineError::InsufficientLpDeposit { .. } => ErrorKind::InsufficientFunds,

            EngineError::Unauthorized(_) => ErrorKind::Unauthorized,
            EngineError::StalePrice(_) | EngineError::PriceMismatch(_) => ErrorKind::Oracle,
            EngineError::TooEarly { .. } => ErrorKind::Timing,
            EngineError::TransferFailed(_) => ErrorKind::Transfer,
        }
    }
}

impl From<OracleError> for EngineError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Mismatch { .. } => EngineError::PriceMismatch(err),
            other => EngineError::StalePrice(other),
        }
    }
}

impl From<CollateralError> for EngineError {
    fn from(err: CollateralError) -> Self {
        match err {
            CollateralError::Insufficient {
                leg,
                required,
                available,
                ..
            } => EngineError::InsufficientCollateral {
                leg,
                required,
                available,
            },
        }
    }
}

impl From<LiquidityError> for EngineError {
    fn from(err: LiquidityError) -> Self {
        match err {
            LiquidityError::ExceedsDeposit {
                lp,
                leg,
                requested,
                deposited,
            } => EngineError::InsufficientLpDeposit {
                lp,
                leg,
                requested,
                deposited,
            },
            LiquidityError::Locked { required, remaining } => {
                EngineError::LiquidityLocked { required, remaining }
            }
            other @ LiquidityError::NegativeReserve { .. } => EngineError::InvalidPoolReport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn oracle_errors_split_by_kind() {
        let stale: EngineError = OracleError::NonPositive { answer: 0 }.into();
        assert!(matches!(stale, EngineError::StalePrice(_)));

        let mismatch: EngineError = OracleError::Mismatch {
            description: "BTC / USD".to_string(),
            symbol0: "WETH".to_string(),
            symbol1: "USDC".to_string(),
        }
        .into();
        assert!(matches!(mismatch, EngineError::PriceMismatch(_)));
        assert_eq!(mismatch.kind(), ErrorKind::Oracle);
    }

    #[test]
    fn taxonomy() {
        assert_eq!(EngineError::PositionExists(AccountId(1)).kind(), ErrorKind::Validation);
        assert_eq!(EngineError::Unauthorized(AccountId(1)).kind(), ErrorKind::Unauthorized);
        assert_eq!(
            EngineError::TooEarly {
                next_allowed: Timestamp::from_millis(10),
                now: Timestamp::from_millis(5),
            }
            .kind(),
            ErrorKind::Timing
        );
        let locked: EngineError = LiquidityError::Locked {
            required: Usd::new(dec!(2)),
            remaining: Usd::new(dec!(1)),
        }
        .into();
        assert_eq!(locked.kind(), ErrorKind::InsufficientFunds);
        let transfer: EngineError = CustodyError::Rejected { token: TokenId(0) }.into();
        assert_eq!(transfer.kind(), ErrorKind::Transfer);
    }
}
