use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::units::Unit;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub unit: Unit,
    pub created_at: String,
}

/// Ingredient listing row; `quantity` is `None` when the ingredient has
/// never been stocked (it exists only because a recipe names it).
#[derive(Debug, Clone, Serialize)]
pub struct IngredientListing {
    pub id: i64,
    pub name: String,
    pub unit: Unit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
}

/// One row of on-hand stock, joined with its ingredient's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub ingredient: String,
    pub quantity: f64,
    pub unit: Unit,
}

/// Result of a stocking operation: the ingredient and its stock afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct StockedIngredient {
    pub ingredient_id: i64,
    pub name: String,
    pub quantity: f64,
    pub unit: Unit,
    /// True when this call created the ingredient row.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeLine {
    pub id: i64,
    pub ingredient_id: i64,
    pub ingredient_name: String,
    pub quantity_needed: f64,
    pub unit: Unit,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub ingredients: Vec<RecipeLine>,
}

/// A requested recipe line before validation; the unit is still raw text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecipeLine {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<NewRecipeLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealPlan {
    pub id: i64,
    pub date: NaiveDate,
    pub recipe_id: i64,
    // Joined for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_name: Option<String>,
}

/// Gap between what a recipe needs and what is on hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shortfall {
    pub name: String,
    pub needed: f64,
    pub have: f64,
    pub unit: Unit,
}

impl Shortfall {
    /// Returns a shortfall only when stock does not cover the requirement.
    #[must_use]
    pub fn from_requirement(name: String, needed: f64, have: f64, unit: Unit) -> Option<Self> {
        (have < needed).then_some(Self {
            name,
            needed,
            have,
            unit,
        })
    }

    #[must_use]
    pub fn missing(&self) -> f64 {
        self.needed - self.have
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedShortfall {
    pub recipe: String,
    #[serde(flatten)]
    pub shortfall: Shortfall,
}

/// Rows removed alongside a deleted ingredient or recipe.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Cascade {
    pub inventory_rows: usize,
    pub recipe_lines: usize,
    pub meal_plans: usize,
}

// --- Export / Import types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecipe {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    pub ingredients: Vec<NewRecipeLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMealPlan {
    pub date: String,
    pub recipe: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    pub version: i64,
    pub exported_at: String,
    /// Every ingredient with its unit, including ones never stocked.
    #[serde(default)]
    pub ingredients: Vec<ExportIngredient>,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub recipes: Vec<ExportRecipe>,
    #[serde(default)]
    pub meal_plans: Vec<ExportMealPlan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportIngredient {
    pub name: String,
    pub unit: Unit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub ingredients_created: i64,
    pub inventory_merged: i64,
    pub recipes_imported: i64,
    pub recipes_skipped: i64,
    pub meal_plans_imported: i64,
    pub meal_plans_skipped: i64,
}

// --- Validation ---

/// Trim a name and reject it when nothing is left.
pub fn validate_name(kind: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{kind} name must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub fn parse_unit(unit: &str) -> Result<Unit> {
    unit.parse::<Unit>()
        .map_err(|e| Error::Validation(e.to_string()))
}

/// Quantities added to stock or required by a recipe must be positive.
pub fn validate_positive_quantity(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::validation(format!(
            "quantity must be a positive number (got {quantity})"
        )));
    }
    Ok(())
}

/// Corrected stock levels may be zero but never negative.
pub fn validate_stock_level(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(Error::validation(format!(
            "stock quantity cannot be negative (got {quantity})"
        )));
    }
    Ok(())
}

pub fn parse_plan_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|_| {
        Error::validation(format!("invalid date '{date}'. Must be YYYY-MM-DD"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortfall_only_when_short() {
        let s = Shortfall::from_requirement("Flour".into(), 200.0, 150.0, Unit::Grams).unwrap();
        assert!((s.missing() - 50.0).abs() < f64::EPSILON);
        assert!(Shortfall::from_requirement("Flour".into(), 200.0, 200.0, Unit::Grams).is_none());
        assert!(Shortfall::from_requirement("Flour".into(), 200.0, 500.0, Unit::Grams).is_none());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("recipe", "  Pancakes ").unwrap(), "Pancakes");
        assert!(matches!(
            validate_name("recipe", "   "),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_parse_unit() {
        assert_eq!(parse_unit("grams").unwrap(), Unit::Grams);
        assert!(matches!(parse_unit("kg"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validate_positive_quantity() {
        assert!(validate_positive_quantity(0.5).is_ok());
        assert!(validate_positive_quantity(0.0).is_err());
        assert!(validate_positive_quantity(-1.0).is_err());
        assert!(validate_positive_quantity(f64::NAN).is_err());
        assert!(validate_positive_quantity(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_stock_level() {
        assert!(validate_stock_level(0.0).is_ok());
        assert!(validate_stock_level(12.5).is_ok());
        assert!(validate_stock_level(-0.1).is_err());
        assert!(validate_stock_level(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_plan_date() {
        assert_eq!(
            parse_plan_date("2024-06-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
        assert!(matches!(
            parse_plan_date("15/06/2024"),
            Err(Error::Validation(_))
        ));
        assert!(parse_plan_date("2024-02-30").is_err());
    }

    #[test]
    fn test_planned_shortfall_serializes_flat() {
        let planned = PlannedShortfall {
            recipe: "Pancakes".into(),
            shortfall: Shortfall {
                name: "Eggs".into(),
                needed: 2.0,
                have: 0.0,
                unit: Unit::Pcs,
            },
        };
        let value = serde_json::to_value(&planned).unwrap();
        assert_eq!(value["recipe"], "Pancakes");
        assert_eq!(value["name"], "Eggs");
        assert_eq!(value["unit"], "pcs");
    }
}
