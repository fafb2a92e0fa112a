use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::db::{self, Database};
use crate::error::{Error, Result};
use crate::models::{NewRecipe, NewRecipeLine};
use crate::units::Unit;

pub const DEMO_RECIPE: &str = "Pancakes";

// (name, unit, needed by the demo recipe, initial stock)
const DEMO_INGREDIENTS: &[(&str, Unit, f64, f64)] = &[
    ("Flour", Unit::Grams, 200.0, 500.0),
    ("Milk", Unit::Ml, 300.0, 1000.0),
    ("Eggs", Unit::Pcs, 2.0, 6.0),
    ("Sugar", Unit::Grams, 50.0, 300.0),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedSummary {
    pub ingredients_created: usize,
    pub ingredients_restocked: usize,
    pub recipe_created: bool,
    pub meal_plan_created: bool,
}

/// Load the demo kitchen: four stocked ingredients, a pancake recipe, and a
/// meal plan for `today`.
///
/// Runs in one transaction. Stock is added to whatever is already there, an
/// existing recipe or meal plan is left alone.
pub fn seed_demo(db: &mut Database, today: NaiveDate) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();
    let mut tx = db.write_tx()?;

    for &(name, unit, _, stock) in DEMO_INGREDIENTS {
        let stocked = db::stock_tx(&tx, name, stock, unit)?;
        if stocked.created {
            summary.ingredients_created += 1;
        } else {
            summary.ingredients_restocked += 1;
        }
    }

    let recipe = NewRecipe {
        name: DEMO_RECIPE.to_string(),
        description: Some("Fluffy breakfast pancakes".to_string()),
        ingredients: DEMO_INGREDIENTS
            .iter()
            .map(|&(name, unit, needed, _)| NewRecipeLine {
                name: name.to_string(),
                quantity: needed,
                unit: unit.to_string(),
            })
            .collect(),
    };
    {
        let sp = tx.savepoint()?;
        match db::create_recipe_tx(&sp, &recipe) {
            Ok(_) => {
                sp.commit()?;
                summary.recipe_created = true;
            }
            Err(Error::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    let recipe_id = db::find_recipe(&tx, DEMO_RECIPE)?
        .ok_or_else(|| Error::NotFound(format!("recipe '{DEMO_RECIPE}'")))?
        .id;
    {
        let sp = tx.savepoint()?;
        match db::create_meal_plan_tx(&sp, today, recipe_id) {
            Ok(_) => {
                sp.commit()?;
                summary.meal_plan_created = true;
            }
            Err(Error::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    tx.commit()?;
    info!(
        created = summary.ingredients_created,
        restocked = summary.ingredients_restocked,
        recipe = summary.recipe_created,
        plan = summary.meal_plan_created,
        "demo data seeded"
    );
    Ok(summary)
}
