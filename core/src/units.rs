use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of measurement units an ingredient can be tracked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Grams,
    Ml,
    Pcs,
}

pub const UNITS: &[Unit] = &[Unit::Grams, Unit::Ml, Unit::Pcs];

#[derive(Debug, Clone, Error)]
#[error("invalid unit '{0}'. Allowed units: grams, ml, pcs")]
pub struct UnknownUnit(pub String);

impl Unit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grams => "grams",
            Self::Ml => "ml",
            Self::Pcs => "pcs",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grams" => Ok(Self::Grams),
            "ml" => Ok(Self::Ml),
            "pcs" => Ok(Self::Pcs),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

impl ToSql for Unit {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Unit {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[must_use]
pub fn is_valid_unit(unit: &str) -> bool {
    unit.parse::<Unit>().is_ok()
}

/// Map a free-form quantity (as found in imported recipe files) onto the
/// unit catalog.
///
/// Mass goes to grams and volume to ml. Spoons are volume and therefore
/// approximate. A missing unit means a count of pieces.
/// Returns `(quantity, unit, is_approximate)`.
#[must_use]
pub fn normalize_quantity(quantity: f64, unit: Option<&str>) -> Option<(f64, Unit, bool)> {
    let lower = unit.map(|u| u.trim().to_lowercase()).unwrap_or_default();
    match lower.as_str() {
        "g" | "gram" | "grams" => Some((quantity, Unit::Grams, false)),
        "kg" | "kilogram" | "kilograms" => Some((quantity * 1000.0, Unit::Grams, false)),
        "lb" | "lbs" | "pound" | "pounds" => Some((quantity * 454.0, Unit::Grams, false)),
        "oz" | "ounce" | "ounces" => Some((quantity * 28.35, Unit::Grams, false)),
        "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
            Some((quantity, Unit::Ml, false))
        }
        "l" | "liter" | "liters" | "litre" | "litres" => Some((quantity * 1000.0, Unit::Ml, false)),
        "tbsp" | "tablespoon" | "tablespoons" => Some((quantity * 15.0, Unit::Ml, true)),
        "tsp" | "teaspoon" | "teaspoons" => Some((quantity * 5.0, Unit::Ml, true)),
        "" | "pc" | "pcs" | "piece" | "pieces" | "whole" => Some((quantity, Unit::Pcs, false)),
        _ => None,
    }
}
