//! Money and quantity arithmetic over `rust_decimal`.
//!
//! All monetary amounts are computed as `Decimal` and rounded to two
//! fractional digits, half-up. Floating point never enters a money path.

use rust_decimal::prelude::*;

/// Currency precision (2 decimal places).
pub const CURRENCY_SCALE: u32 = 2;

/// Round a monetary value to currency precision, half-up.
#[inline]
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Line total for a quantity of units at a unit price.
///
/// Rounded once per line, so re-summing unchanged lines is drift-free.
#[inline]
pub fn line_total(quantity: i32, unit_price: Decimal) -> Decimal {
    round_currency(Decimal::from(quantity) * unit_price)
}

/// Invoice grand total: subtotal + tax - discount.
#[inline]
pub fn invoice_total(subtotal: Decimal, tax_amount: Decimal, discount_amount: Decimal) -> Decimal {
    round_currency(subtotal + tax_amount - discount_amount)
}

/// Unpaid remainder of an invoice, clamped at zero.
#[inline]
pub fn balance_due(total_amount: Decimal, amount_paid: Decimal) -> Decimal {
    round_currency((total_amount - amount_paid).max(Decimal::ZERO))
}
