use std::io::Read;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::warn;

use crate::db::Database;
use crate::error::Result;
use crate::inventory_import::{self, InventoryImportSummary};
use crate::models::{
    ExportData, ImportSummary, IngredientListing, InventoryItem, MealPlan, NewRecipe,
    NewRecipeLine, PlannedShortfall, RecipeDetail, RecipeSummary, Shortfall, StockedIngredient,
};
use crate::seed::{self, SeedSummary};

/// The kitchen operations exposed to front ends.
///
/// Writers that report success as a `bool` return `Ok(false)` when the
/// target is missing or the row already exists, and `Err` for invalid
/// input or storage failures.
pub struct KitchenService {
    db: Database,
}

impl KitchenService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn with_busy_timeout(db_path: &Path, busy_timeout: Duration) -> Result<Self> {
        let db = Database::open_with(db_path, busy_timeout)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // --- Reads ---

    pub fn list_recipes(&self) -> Result<Vec<RecipeSummary>> {
        self.db.list_recipes()
    }

    pub fn get_recipe(&self, name: &str) -> Result<RecipeDetail> {
        self.db.get_recipe_detail(name)
    }

    pub fn list_ingredients(&self) -> Result<Vec<IngredientListing>> {
        self.db.list_ingredients()
    }

    pub fn load_inventory(&self) -> Result<Vec<InventoryItem>> {
        self.db.load_inventory()
    }

    pub fn list_meal_plans(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<MealPlan>> {
        self.db.list_meal_plans(from, to)
    }

    pub fn check_availability(&self, recipe_id: i64) -> Result<Vec<Shortfall>> {
        self.db.check_availability(recipe_id)
    }

    pub fn check_recipes(&self, recipe_ids: &[i64]) -> Result<Vec<Shortfall>> {
        self.db.check_recipes(recipe_ids)
    }

    pub fn check_plan_date(&self, date: NaiveDate) -> Result<Vec<PlannedShortfall>> {
        self.db.check_plan_date(date)
    }

    // --- Writers ---

    pub fn stock_ingredient(
        &mut self,
        name: &str,
        quantity: f64,
        unit: &str,
    ) -> Result<StockedIngredient> {
        self.db.stock_ingredient(name, quantity, unit)
    }

    pub fn create_recipe(
        &mut self,
        name: &str,
        description: Option<&str>,
        ingredients: &[NewRecipeLine],
    ) -> Result<bool> {
        let recipe = NewRecipe {
            name: name.to_string(),
            description: description.map(String::from),
            ingredients: ingredients.to_vec(),
        };
        soft(self.db.create_recipe(&recipe), "create_recipe")
    }

    pub fn create_meal_plan(&mut self, date: NaiveDate, recipe_id: i64) -> Result<bool> {
        soft(self.db.create_meal_plan(date, recipe_id), "create_meal_plan")
    }

    pub fn update_ingredient_quantity(&mut self, name: &str, quantity: f64) -> Result<bool> {
        soft(
            self.db.set_inventory_quantity(name, quantity),
            "update_ingredient_quantity",
        )
    }

    pub fn delete_ingredient(&mut self, name: &str) -> Result<bool> {
        soft(self.db.delete_ingredient(name), "delete_ingredient")
    }

    pub fn delete_recipe(&mut self, name: &str) -> Result<bool> {
        soft(self.db.delete_recipe(name), "delete_recipe")
    }

    // --- Bulk ---

    pub fn seed_demo(&mut self, today: NaiveDate) -> Result<SeedSummary> {
        seed::seed_demo(&mut self.db, today)
    }

    pub fn import_inventory_csv<R: Read>(
        &mut self,
        reader: R,
        dry_run: bool,
    ) -> anyhow::Result<InventoryImportSummary> {
        let items = inventory_import::parse_inventory_csv(reader)?;
        inventory_import::import_inventory(&mut self.db, &items, dry_run)
    }

    pub fn export_all(&self) -> Result<ExportData> {
        self.db.export_all()
    }

    pub fn import_all(&mut self, data: &ExportData) -> Result<ImportSummary> {
        self.db.import_all(data)
    }
}

fn soft<T>(result: Result<T>, operation: &str) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_soft_failure() => {
            warn!(operation, error = %e, "operation not applied");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::units::Unit;

    fn line(name: &str, quantity: f64, unit: &str) -> NewRecipeLine {
        NewRecipeLine {
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_create_recipe_reports_duplicate_as_false() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        let lines = [line("Flour", 200.0, "grams")];
        assert!(svc.create_recipe("Bread", None, &lines).unwrap());
        assert!(!svc.create_recipe("Bread", Some("again"), &lines).unwrap());
        assert_eq!(svc.list_recipes().unwrap().len(), 1);
    }

    #[test]
    fn test_create_recipe_existing_name_with_bad_unit_is_false() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        assert!(svc.create_recipe("Bread", None, &[line("Flour", 200.0, "grams")]).unwrap());
        let result = svc.create_recipe("Bread", None, &[line("Flour", 200.0, "kg")]);
        assert!(matches!(result, Ok(false)));
    }

    #[test]
    fn test_create_recipe_invalid_line_is_error() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        let lines = [line("Flour", 200.0, "cups")];
        assert!(matches!(
            svc.create_recipe("Bread", None, &lines),
            Err(Error::Validation(_))
        ));
        assert!(svc.list_recipes().unwrap().is_empty());
    }

    #[test]
    fn test_meal_plan_booleans() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        svc.create_recipe("Bread", None, &[line("Flour", 200.0, "grams")])
            .unwrap();
        let id = svc.list_recipes().unwrap()[0].id;

        assert!(svc.create_meal_plan(day(), id).unwrap());
        assert!(!svc.create_meal_plan(day(), id).unwrap());
        assert!(!svc.create_meal_plan(day(), id + 100).unwrap());
        assert_eq!(svc.list_meal_plans(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_update_and_delete_booleans() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        svc.stock_ingredient("Flour", 500.0, "grams").unwrap();

        assert!(svc.update_ingredient_quantity("Flour", 50.0).unwrap());
        assert!(!svc.update_ingredient_quantity("Salt", 50.0).unwrap());
        assert!(svc.update_ingredient_quantity("Flour", -1.0).is_err());

        assert!(svc.delete_ingredient("Flour").unwrap());
        assert!(!svc.delete_ingredient("Flour").unwrap());
        assert!(!svc.delete_recipe("Bread").unwrap());
    }

    #[test]
    fn test_check_flow() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        svc.create_recipe("Bread", None, &[line("flour", 200.0, "grams")])
            .unwrap();
        svc.stock_ingredient("flour", 150.0, "grams").unwrap();
        let id = svc.list_recipes().unwrap()[0].id;

        let missing = svc.check_availability(id).unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].unit, Unit::Grams);
        assert!((missing[0].missing() - 50.0).abs() < 0.01);

        svc.stock_ingredient("flour", 350.0, "grams").unwrap();
        assert!(svc.check_recipes(&[id]).unwrap().is_empty());
    }

    #[test]
    fn test_stock_unknown_unit_is_error() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        assert!(matches!(
            svc.stock_ingredient("Flour", 1.0, "kg"),
            Err(Error::Validation(_))
        ));
        assert!(svc.load_inventory().unwrap().is_empty());
    }

    #[test]
    fn test_seed_then_import_csv() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        svc.seed_demo(day()).unwrap();
        let csv = "name,quantity,unit\nEggs,6,pcs\n";
        let summary = svc.import_inventory_csv(csv.as_bytes(), false).unwrap();
        assert_eq!(summary.ingredients_restocked, 1);
        let eggs = svc
            .load_inventory()
            .unwrap()
            .into_iter()
            .find(|i| i.ingredient == "Eggs")
            .unwrap();
        assert!((eggs.quantity - 12.0).abs() < 0.01);
    }

    #[test]
    fn test_file_backed_service() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kitchen.db");
        {
            let mut svc = KitchenService::new(&path).unwrap();
            svc.seed_demo(day()).unwrap();
        }
        let svc = KitchenService::with_busy_timeout(&path, Duration::from_millis(100)).unwrap();
        assert_eq!(svc.get_recipe("Pancakes").unwrap().ingredients.len(), 4);
        assert_eq!(svc.check_plan_date(day()).unwrap().len(), 0);
    }
}
