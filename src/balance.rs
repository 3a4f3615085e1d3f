use std::collections::BTreeMap;
use std::fmt;
use std::ops::Neg;
use std::sync::Arc;

pub use rust_decimal::Decimal;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A currency or commodity with a fixed smallest representable fraction.
///
/// `scale` is always a positive power of 10; the smallest fraction of the
/// unit is `1/scale`, so `Unit { symbol: "USD", scale: 100 }` counts cents.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Unit {
    pub symbol: String,
    pub scale: i128,
}

impl Unit {
    pub fn new(symbol: &str, scale: i128) -> UnitRef {
        Arc::new(Unit {
            symbol: symbol.to_string(),
            scale,
        })
    }
}

/// A [`Unit`] wrapped in [`Arc`](std::sync::Arc); units are interned by the
/// builder and shared by every amount that refers to them.
pub type UnitRef = Arc<Unit>;

/// An exact quantity of a unit: `number` counts fractions of `1/unit.scale`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Amount {
    pub number: i128,
    pub unit: UnitRef,
}

impl Amount {
    /// Combines a raw decimal literal with a unit, rescaling exactly.
    ///
    /// A literal finer than the unit scale is accepted only if the extra
    /// fractional digits are zero; this never rounds.
    pub fn with_unit(number: Decimal, unit: &UnitRef) -> Result<Amount, String> {
        let mantissa = number.mantissa();
        let literal_scale = pow10(number.scale());
        if literal_scale > unit.scale {
            let excess = literal_scale / unit.scale;
            if mantissa % excess != 0 {
                Err(format!(
                    "fractions of {} too small for unit {} (scale {})",
                    number, unit.symbol, unit.scale
                ))
            } else {
                Ok(Amount {
                    number: mantissa / excess,
                    unit: unit.clone(),
                })
            }
        } else {
            Ok(Amount {
                number: mantissa * (unit.scale / literal_scale),
                unit: unit.clone(),
            })
        }
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        Amount {
            number: -self.number,
            unit: self.unit,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            format_scaled(self.number, self.unit.scale),
            self.unit.symbol
        )
    }
}

fn pow10(digits: u32) -> i128 {
    10i128.pow(digits)
}

fn frac_width(scale: i128) -> usize {
    let mut width = 0;
    let mut s = scale;
    while s > 1 {
        s /= 10;
        width += 1;
    }
    width
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && i % 3 == offset {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Formats `number/scale` as exact decimal text with digit grouping by
/// thousands. `scale` must be a power of 10; only integer arithmetic is used,
/// so the output is lossless for any scale.
pub fn format_scaled(number: i128, scale: i128) -> String {
    let magnitude = number.unsigned_abs();
    let scale = scale as u128;
    let int_part = group_thousands(&(magnitude / scale).to_string());
    let sign = if number < 0 { "-" } else { "" };
    let width = frac_width(scale as i128);
    if width == 0 {
        format!("{}{}", sign, int_part)
    } else {
        format!(
            "{}{}.{:0width$}",
            sign,
            int_part,
            magnitude % scale,
            width = width
        )
    }
}

/// A snapshot of amounts per unit; absent and zero entries are both
/// semantically empty, and each unit appears at most once.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balance {
    amounts: BTreeMap<UnitRef, i128>,
}

impl Balance {
    pub fn new() -> Self {
        Balance::default()
    }

    pub fn add(&mut self, amount: &Amount) {
        *self.amounts.entry(amount.unit.clone()).or_default() += amount.number;
    }

    pub fn sub(&mut self, amount: &Amount) {
        *self.amounts.entry(amount.unit.clone()).or_default() -= amount.number;
    }

    pub fn add_balance(&mut self, other: &Balance) {
        for (unit, number) in &other.amounts {
            *self.amounts.entry(unit.clone()).or_default() += number;
        }
    }

    pub fn sub_balance(&mut self, other: &Balance) {
        for (unit, number) in &other.amounts {
            *self.amounts.entry(unit.clone()).or_default() -= number;
        }
    }

    pub fn number(&self, unit: &UnitRef) -> i128 {
        self.amounts.get(unit).copied().unwrap_or(0)
    }

    /// True if every entry is zero.
    pub fn is_empty(&self) -> bool {
        self.amounts.values().all(|number| *number == 0)
    }

    /// Drops zero entries in place.
    pub fn clean(&mut self) {
        self.amounts.retain(|_, number| *number != 0);
    }

    pub fn clean_copy(&self) -> Balance {
        let mut copy = self.clone();
        copy.clean();
        copy
    }

    /// Non-zero amounts, ascending by unit symbol.
    pub fn amounts(&self) -> Vec<Amount> {
        self.amounts
            .iter()
            .filter(|(_, number)| **number != 0)
            .map(|(unit, number)| Amount {
                number: *number,
                unit: unit.clone(),
            })
            .collect()
    }

    /// True if `self` and `other` are equal after dropping zero entries.
    pub fn equal(&self, other: &Balance) -> bool {
        let mut diff = self.clone();
        diff.sub_balance(other);
        diff.is_empty()
    }
}

impl Neg for Balance {
    type Output = Balance;

    fn neg(mut self) -> Self::Output {
        for number in self.amounts.values_mut() {
            *number = -*number;
        }
        self
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amounts = self.amounts();
        if amounts.is_empty() {
            return write!(f, "0");
        }
        for (i, amount) in amounts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", amount)?;
        }
        Ok(())
    }
}
