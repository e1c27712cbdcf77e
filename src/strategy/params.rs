use crate::market::Outcome;
use crate::types::StrategyConfig;
use crate::utils::math::is_valid_price;

use super::StrategyKind;

/// Entry rule for one strategy, derived from the shared strategy config.
#[derive(Clone, Debug)]
pub struct StrategyParams {
    pub kind: StrategyKind,
    /// Price the rule compares against (0-1).
    pub threshold: f64,
    /// Shares requested per order.
    pub order_size: f64,
}

impl StrategyParams {
    pub fn from_config(kind: StrategyKind, cfg: &StrategyConfig) -> Self {
        let threshold = match kind {
            StrategyKind::Undervalued => cfg.undervalued_threshold,
            StrategyKind::Momentum => cfg.momentum_threshold,
        };
        Self {
            kind,
            threshold,
            order_size: cfg.order_size_shares,
        }
    }

    pub fn qualifies(&self, price: f64) -> bool {
        match self.kind {
            StrategyKind::Undervalued => price <= self.threshold,
            StrategyKind::Momentum => price >= self.threshold,
        }
    }

    /// Pick the side to buy given both observed prices.
    ///
    /// Only prices usable as a limit (strictly inside 0-1) are candidates.
    /// When both sides qualify the more extreme price wins (lowest for
    /// Undervalued, highest for Momentum); an exact tie goes to Up.
    pub fn select_side(&self, up_price: f64, down_price: f64) -> Option<(Outcome, f64)> {
        let eligible = |price: f64| is_valid_price(price) && self.qualifies(price);
        match (eligible(up_price), eligible(down_price)) {
            (false, false) => None,
            (true, false) => Some((Outcome::Up, up_price)),
            (false, true) => Some((Outcome::Down, down_price)),
            (true, true) => {
                let down_more_extreme = match self.kind {
                    StrategyKind::Undervalued => down_price < up_price,
                    StrategyKind::Momentum => down_price > up_price,
                };
                if down_more_extreme {
                    Some((Outcome::Down, down_price))
                } else {
                    Some((Outcome::Up, up_price))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(kind: StrategyKind) -> StrategyParams {
        StrategyParams::from_config(kind, &StrategyConfig::default())
    }

    #[test]
    fn undervalued_picks_cheap_side() {
        let p = params(StrategyKind::Undervalued);
        assert_eq!(p.select_side(0.47, 0.55), Some((Outcome::Up, 0.47)));
        assert_eq!(p.select_side(0.55, 0.48), Some((Outcome::Down, 0.48)));
        assert_eq!(p.select_side(0.49, 0.50), None);
    }

    #[test]
    fn momentum_picks_expensive_side() {
        let p = params(StrategyKind::Momentum);
        assert_eq!(p.select_side(0.52, 0.50), Some((Outcome::Up, 0.52)));
        assert_eq!(p.select_side(0.45, 0.56), Some((Outcome::Down, 0.56)));
        assert_eq!(p.select_side(0.51, 0.51), None);
    }

    #[test]
    fn both_sides_qualify_prefers_extreme_then_up() {
        let u = params(StrategyKind::Undervalued);
        assert_eq!(u.select_side(0.45, 0.40), Some((Outcome::Down, 0.40)));
        assert_eq!(u.select_side(0.45, 0.45), Some((Outcome::Up, 0.45)));

        let m = params(StrategyKind::Momentum);
        assert_eq!(m.select_side(0.60, 0.55), Some((Outcome::Up, 0.60)));
        assert_eq!(m.select_side(0.55, 0.60), Some((Outcome::Down, 0.60)));
        assert_eq!(m.select_side(0.55, 0.55), Some((Outcome::Up, 0.55)));
    }

    #[test]
    fn settled_prices_are_never_selected() {
        let momentum = params(StrategyKind::Momentum);
        assert_eq!(momentum.select_side(1.0, 0.60), Some((Outcome::Down, 0.60)));
        assert_eq!(momentum.select_side(1.0, 0.0), None);

        let undervalued = params(StrategyKind::Undervalued);
        assert_eq!(undervalued.select_side(0.0, 0.40), Some((Outcome::Down, 0.40)));
        assert_eq!(undervalued.select_side(f64::NAN, 0.45), Some((Outcome::Down, 0.45)));
    }
}
