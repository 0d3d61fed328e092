//! Trading cost estimates attached to each proposed trade.

/// Per-trade cost: basis points of notional, floored at a minimum fee.
///
/// ```
/// use driftbook::CostModel;
///
/// let model = CostModel { commission_bps: 10, slippage_bps: 5, min_trade_fee: 1_00 };
/// // 15 bps on $10,000 = $15.00, above the $1.00 minimum
/// assert_eq!(model.estimate(10_000_00), 15_00);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostModel {
    pub commission_bps: u32,
    pub slippage_bps: u32,
    /// Minimum fee per trade (cents).
    pub min_trade_fee: i64,
}

impl CostModel {
    /// No fees, no slippage. Trades carry a zero cost estimate.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.commission_bps == 0 && self.slippage_bps == 0 && self.min_trade_fee == 0
    }

    /// Estimated cost (cents) of a trade with the given notional (cents).
    ///
    /// Zero-notional trades cost nothing, even with a minimum fee.
    pub fn estimate(&self, notional: i64) -> i64 {
        if self.is_zero() || notional == 0 {
            return 0;
        }
        let notional = notional.unsigned_abs() as u128;
        let bps = self.commission_bps as u128 + self.slippage_bps as u128;
        let bps_cost = (notional * bps / 10_000) as i64;
        bps_cost.max(self.min_trade_fee)
    }
}
