//! Deterministic pricing math for agent trades.
//!
//! A trade moves the market probability toward the agent's assessment,
//! weighted by the trade size against a liquidity constant. Small trades
//! nudge; they never teleport the price.

use rust_decimal::Decimal;

/// Liquidity constant: credits of virtual depth resisting a price move.
const LIQUIDITY_CREDITS: f64 = 400.0;

/// The new yes-probability after a trade of `amount` credits pushing the
/// market from `current` toward `assessed`.
pub fn move_toward(current: f64, assessed: f64, amount: Decimal) -> f64 {
    let amount: f64 = decimal_to_f64(amount).max(0.0);
    let weight = amount / (amount + LIQUIDITY_CREDITS);
    (assessed - current).mul_add(weight, current).clamp(0.0, 1.0)
}

/// Which side matches a probability assessment.
pub fn side_for(assessed_prob: f64) -> factico_types::TradeSide {
    if assessed_prob >= 0.5 {
        factico_types::TradeSide::Yes
    } else {
        factico_types::TradeSide::No
    }
}

/// Lossy `Decimal` to `f64` for probability math (credits fit easily).
fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use factico_types::TradeSide;

    #[test]
    fn trade_moves_price_toward_assessment() {
        let moved = move_toward(0.5, 0.62, Decimal::new(120, 0));
        assert!(moved > 0.5, "price must move up toward the assessment");
        assert!(moved < 0.62, "a bounded trade must not reach the assessment");
    }

    #[test]
    fn larger_trades_move_further() {
        let small = move_toward(0.5, 0.9, Decimal::new(50, 0));
        let large = move_toward(0.5, 0.9, Decimal::new(200, 0));
        assert!(large > small);
    }

    #[test]
    fn move_is_clamped_to_unit_interval() {
        let moved = move_toward(0.99, 1.5, Decimal::new(10_000, 0));
        assert!(moved <= 1.0);
    }

    #[test]
    fn side_selection_matches_majority() {
        assert_eq!(side_for(0.62), TradeSide::Yes);
        assert_eq!(side_for(0.5), TradeSide::Yes);
        assert_eq!(side_for(0.38), TradeSide::No);
    }
}
