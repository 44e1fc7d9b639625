// 10.0 config.rs: every ledger setting in one place. fees, funding, risk, oracle, liquidity.
// 10.1 presets per environment, validated before an engine is built.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::fee_pool::FeeParams;
use crate::funding::FundingParams;
use crate::liquidation::RiskParams;
use crate::liquidity::LiquidityParams;
use crate::price_feed::OracleParams;
use crate::types::{Bps, Leverage};

/// Complete parameter set for one pool's ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub fees: FeeParams,
    pub funding: FundingParams,
    pub risk: RiskParams,
    pub oracle: OracleParams,
    pub liquidity: LiquidityParams,
}

impl LedgerConfig {
    // looser limits and a fast funding clock for test deployments
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.risk.max_leverage = Leverage::new_unchecked(dec!(20));
        config.funding.interval_ms = 10 * 60 * 1000;
        config.fees.opening_fee = Bps::new(0);
        config
    }

    // lower leverage, a rent fee on borrowed capital and a buffer slice
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.risk.max_leverage = Leverage::new_unchecked(dec!(5));
        config.risk.liquidation_threshold = dec!(0.7);
        config.fees.leverage_fee = Bps::new(5);
        config.liquidity.buffer_fraction = dec!(0.05);
        config.oracle.max_staleness_ms = 15 * 60 * 1000;
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction_ok = |v: Decimal| v >= Decimal::ZERO && v < Decimal::ONE;

        // fees
        if self.fees.opening_fee.value() < 0 || self.fees.opening_fee.value() >= 10_000 {
            return Err(ConfigError::InvalidFees {
                reason: "opening fee must be in [0, 10000) bps".to_string(),
            });
        }
        let max_rent = self.fees.leverage_fee.as_fraction() * self.risk.max_leverage.borrowed_multiple();
        if self.fees.leverage_fee.value() < 0
            || self.fees.opening_fee.as_fraction() + max_rent >= Decimal::ONE
        {
            return Err(ConfigError::InvalidFees {
                reason: "fees at max leverage would consume the whole margin".to_string(),
            });
        }

        // funding
        if self.funding.interval_ms <= 0 {
            return Err(ConfigError::InvalidFunding {
                reason: "funding interval must be positive".to_string(),
            });
        }
        if self.funding.base_rate < Decimal::ZERO || self.funding.base_rate > self.funding.max_rate {
            return Err(ConfigError::InvalidFunding {
                reason: "need 0 <= base_rate <= max_rate".to_string(),
            });
        }
        // skim strictly inside (0, 1) so both LPs and receivers get something
        if self.funding.lp_skim <= Decimal::ZERO || self.funding.lp_skim >= Decimal::ONE {
            return Err(ConfigError::InvalidFunding {
                reason: "lp skim must be strictly between 0 and 1".to_string(),
            });
        }

        // risk
        if self.risk.liquidation_threshold <= Decimal::ZERO || self.risk.liquidation_threshold > Decimal::ONE {
            return Err(ConfigError::InvalidRisk {
                reason: "liquidation threshold must be in (0, 1]".to_string(),
            });
        }

        if self.oracle.max_staleness_ms <= 0 {
            return Err(ConfigError::InvalidOracle {
                reason: "max staleness must be positive".to_string(),
            });
        }

        if !fraction_ok(self.liquidity.buffer_fraction) {
            return Err(ConfigError::InvalidLiquidity {
                reason: "buffer fraction must be in [0, 1)".to_string(),
            });
        }

        Ok(())
    }

    pub fn max_leverage(&self) -> Decimal {
        self.risk.max_leverage.value()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid fees: {reason}")]
    InvalidFees { reason: String },
    #[error("invalid funding: {reason}")]
    InvalidFunding { reason: String },
    #[error("invalid risk: {reason}")]
    InvalidRisk { reason: String },
    #[error("invalid oracle: {reason}")]
    InvalidOracle { reason: String },
    #[error("invalid liquidity: {reason}")]
    InvalidLiquidity { reason: String },
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> LedgerConfig {
        match self {
            Environment::Development => LedgerConfig::default(),
            Environment::Testnet => LedgerConfig::testnet(),
            Environment::Mainnet => LedgerConfig::mainnet_conservative(),
        }
    }
}
