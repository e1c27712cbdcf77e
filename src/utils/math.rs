/// Realized P&L of a binary position held to resolution, in quote currency.
///
/// A winning share pays out 1.0; a losing share expires worthless.
pub fn settlement_pnl(entry_price: f64, filled_size: f64, won: bool) -> f64 {
    if won {
        filled_size * (1.0 - entry_price)
    } else {
        -filled_size * entry_price
    }
}

/// `numerator / denominator * 100`, or 0 when the denominator is not positive.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}

/// True if `price` is a usable binary-market limit price.
pub fn is_valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0 && price < 1.0
}
