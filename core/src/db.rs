use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{
    Cascade, DATE_FORMAT, ExportData, ExportIngredient, ExportMealPlan, ExportRecipe,
    ImportSummary, Ingredient, IngredientListing, InventoryItem, MealPlan, NewRecipe,
    NewRecipeLine, PlannedShortfall, Recipe, RecipeDetail, RecipeLine, RecipeSummary, Shortfall,
    StockedIngredient, parse_plan_date, parse_unit, validate_name, validate_positive_quantity,
    validate_stock_level,
};
use crate::units::Unit;

pub const EXPORT_VERSION: i64 = 1;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let open_error = |source| Error::Open {
            path: PathBuf::from(path),
            source,
        };
        let conn = Connection::open(path).map_err(open_error)?;
        conn.busy_timeout(busy_timeout).map_err(open_error)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            // (id, unit) is a key of its own so that stock rows and recipe
            // lines can only reference an ingredient in that ingredient's unit.
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
                    unit TEXT NOT NULL CHECK (unit IN ('grams', 'ml', 'pcs')),
                    created_at TEXT NOT NULL,
                    UNIQUE (id, unit)
                );

                CREATE TABLE IF NOT EXISTS inventory (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ingredient_id INTEGER NOT NULL UNIQUE,
                    quantity_in_stock REAL NOT NULL CHECK (quantity_in_stock >= 0),
                    unit TEXT NOT NULL CHECK (unit IN ('grams', 'ml', 'pcs')),
                    updated_at TEXT NOT NULL,
                    FOREIGN KEY (ingredient_id, unit) REFERENCES ingredients(id, unit)
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE CHECK (length(trim(name)) > 0),
                    description TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id),
                    ingredient_id INTEGER NOT NULL,
                    quantity_needed REAL NOT NULL CHECK (quantity_needed > 0),
                    unit TEXT NOT NULL CHECK (unit IN ('grams', 'ml', 'pcs')),
                    FOREIGN KEY (ingredient_id, unit) REFERENCES ingredients(id, unit),
                    UNIQUE (recipe_id, ingredient_id)
                );

                CREATE TABLE IF NOT EXISTS meal_plans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id),
                    created_at TEXT NOT NULL,
                    UNIQUE (date, recipe_id)
                );

                CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_ingredient ON recipe_ingredients(ingredient_id);
                CREATE INDEX IF NOT EXISTS idx_meal_plans_recipe ON meal_plans(recipe_id);

                PRAGMA user_version = 1;",
            )?;
            info!(version = 1, "database schema migrated");
        }

        Ok(())
    }

    /// Open a write transaction holding the database write lock from the
    /// start, so concurrent writers on the same file are serialized.
    pub(crate) fn write_tx(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    // --- Row mapping helpers ---

    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
        Ok(Ingredient {
            id: row.get(0)?,
            name: row.get(1)?,
            unit: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    // Expects columns:
    // 0: ri.id, 1: ri.ingredient_id, 2: i.name, 3: ri.quantity_needed, 4: ri.unit
    fn recipe_line_from_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeLine> {
        Ok(RecipeLine {
            id: row.get(0)?,
            ingredient_id: row.get(1)?,
            ingredient_name: row.get(2)?,
            quantity_needed: row.get(3)?,
            unit: row.get(4)?,
        })
    }

    // Expects columns: 0: mp.id, 1: mp.date, 2: mp.recipe_id, 3: r.name
    fn meal_plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealPlan> {
        let date: String = row.get(1)?;
        let date = NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(MealPlan {
            id: row.get(0)?,
            date,
            recipe_id: row.get(2)?,
            recipe_name: row.get(3)?,
        })
    }

    // --- Ingredients & inventory ---

    pub fn get_ingredient(&self, name: &str) -> Result<Option<Ingredient>> {
        find_ingredient(&self.conn, name.trim())
    }

    pub fn list_ingredients(&self) -> Result<Vec<IngredientListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.name, i.unit, inv.quantity_in_stock
             FROM ingredients i
             LEFT JOIN inventory inv ON inv.ingredient_id = i.id
             ORDER BY i.name",
        )?;
        let ingredients = stmt
            .query_map([], |row| {
                Ok(IngredientListing {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    unit: row.get(2)?,
                    quantity: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ingredients)
    }

    pub fn load_inventory(&self) -> Result<Vec<InventoryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.name, inv.quantity_in_stock, inv.unit
             FROM inventory inv
             JOIN ingredients i ON inv.ingredient_id = i.id
             ORDER BY i.name",
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok(InventoryItem {
                    ingredient: row.get(0)?,
                    quantity: row.get(1)?,
                    unit: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn get_inventory_item(&self, name: &str) -> Result<Option<InventoryItem>> {
        let item = self
            .conn
            .query_row(
                "SELECT i.name, inv.quantity_in_stock, inv.unit
                 FROM inventory inv
                 JOIN ingredients i ON inv.ingredient_id = i.id
                 WHERE i.name = ?1",
                params![name.trim()],
                |row| {
                    Ok(InventoryItem {
                        ingredient: row.get(0)?,
                        quantity: row.get(1)?,
                        unit: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(item)
    }

    /// Add stock for an ingredient, creating the ingredient on first use.
    /// Repeated calls accumulate.
    pub fn stock_ingredient(
        &mut self,
        name: &str,
        quantity: f64,
        unit: &str,
    ) -> Result<StockedIngredient> {
        let unit = parse_unit(unit)?;
        let tx = self.write_tx()?;
        let stocked = stock_tx(&tx, name, quantity, unit)?;
        tx.commit()?;
        Ok(stocked)
    }

    /// Stock several ingredients as one unit of work: either every item is
    /// merged or none is.
    pub fn stock_batch(&mut self, items: &[InventoryItem]) -> Result<Vec<StockedIngredient>> {
        let tx = self.write_tx()?;
        let mut stocked = Vec::with_capacity(items.len());
        for item in items {
            stocked.push(stock_tx(&tx, &item.ingredient, item.quantity, item.unit)?);
        }
        tx.commit()?;
        info!(items = stocked.len(), "inventory batch stocked");
        Ok(stocked)
    }

    /// Overwrite the stock level of an ingredient that already has an
    /// inventory row.
    pub fn set_inventory_quantity(&mut self, name: &str, quantity: f64) -> Result<InventoryItem> {
        let name = validate_name("ingredient", name)?;
        validate_stock_level(quantity)?;

        let tx = self.write_tx()?;
        let ingredient = find_ingredient(&tx, &name)?
            .ok_or_else(|| Error::NotFound(format!("ingredient '{name}'")))?;
        let rows = tx.execute(
            "UPDATE inventory SET quantity_in_stock = ?1, updated_at = ?2 WHERE ingredient_id = ?3",
            params![quantity, Local::now().to_rfc3339(), ingredient.id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("inventory for ingredient '{name}'")));
        }
        tx.commit()?;
        debug!(ingredient = %name, quantity, "inventory quantity overwritten");

        Ok(InventoryItem {
            ingredient: ingredient.name,
            quantity,
            unit: ingredient.unit,
        })
    }

    /// Remove an ingredient together with its stock row and every recipe
    /// line that uses it. Recipes themselves are kept.
    pub fn delete_ingredient(&mut self, name: &str) -> Result<Cascade> {
        let name = validate_name("ingredient", name)?;
        let tx = self.write_tx()?;
        let ingredient = find_ingredient(&tx, &name)?
            .ok_or_else(|| Error::NotFound(format!("ingredient '{name}'")))?;

        let inventory_rows = tx.execute(
            "DELETE FROM inventory WHERE ingredient_id = ?1",
            params![ingredient.id],
        )?;
        let recipe_lines = tx.execute(
            "DELETE FROM recipe_ingredients WHERE ingredient_id = ?1",
            params![ingredient.id],
        )?;
        tx.execute(
            "DELETE FROM ingredients WHERE id = ?1",
            params![ingredient.id],
        )?;
        tx.commit()?;
        debug!(ingredient = %name, inventory_rows, recipe_lines, "ingredient deleted");

        Ok(Cascade {
            inventory_rows,
            recipe_lines,
            meal_plans: 0,
        })
    }

    // --- Recipes ---

    pub fn list_recipes(&self) -> Result<Vec<RecipeSummary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM recipes ORDER BY id")?;
        let recipes = stmt
            .query_map([], |row| {
                Ok(RecipeSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    pub fn get_recipe(&self, name: &str) -> Result<Option<Recipe>> {
        find_recipe(&self.conn, name.trim())
    }

    pub fn get_recipe_by_id(&self, id: i64) -> Result<Recipe> {
        find_recipe_by_id(&self.conn, id)?.ok_or_else(|| Error::NotFound(format!("recipe {id}")))
    }

    pub fn get_recipe_lines(&self, recipe_id: i64) -> Result<Vec<RecipeLine>> {
        recipe_lines(&self.conn, recipe_id)
    }

    pub fn get_recipe_detail(&self, name: &str) -> Result<RecipeDetail> {
        let recipe = self
            .get_recipe(name)?
            .ok_or_else(|| Error::NotFound(format!("recipe '{}'", name.trim())))?;
        let ingredients = self.get_recipe_lines(recipe.id)?;
        Ok(RecipeDetail {
            id: recipe.id,
            name: recipe.name,
            description: recipe.description,
            ingredients,
        })
    }

    /// Create a recipe and all of its ingredient lines in one transaction.
    pub fn create_recipe(&mut self, recipe: &NewRecipe) -> Result<Recipe> {
        let tx = self.write_tx()?;
        let created = create_recipe_tx(&tx, recipe)?;
        tx.commit()?;
        Ok(created)
    }

    /// Remove a recipe with its ingredient lines and meal plans. Ingredients
    /// and stock are untouched.
    pub fn delete_recipe(&mut self, name: &str) -> Result<Cascade> {
        let name = validate_name("recipe", name)?;
        let tx = self.write_tx()?;
        let recipe =
            find_recipe(&tx, &name)?.ok_or_else(|| Error::NotFound(format!("recipe '{name}'")))?;

        let recipe_lines = tx.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
            params![recipe.id],
        )?;
        let meal_plans = tx.execute(
            "DELETE FROM meal_plans WHERE recipe_id = ?1",
            params![recipe.id],
        )?;
        tx.execute("DELETE FROM recipes WHERE id = ?1", params![recipe.id])?;
        tx.commit()?;
        debug!(recipe = %name, recipe_lines, meal_plans, "recipe deleted");

        Ok(Cascade {
            inventory_rows: 0,
            recipe_lines,
            meal_plans,
        })
    }

    // --- Availability ---

    /// Ingredients of a recipe whose stock does not cover the requirement,
    /// in the recipe's listing order. Missing stock counts as zero.
    pub fn check_availability(&self, recipe_id: i64) -> Result<Vec<Shortfall>> {
        if find_recipe_by_id(&self.conn, recipe_id)?.is_none() {
            return Err(Error::NotFound(format!("recipe {recipe_id}")));
        }
        shortfalls(&self.conn, recipe_id)
    }

    /// Run the availability check for each recipe in turn and concatenate
    /// the results. The same ingredient short in two recipes is reported
    /// twice.
    pub fn check_recipes(&self, recipe_ids: &[i64]) -> Result<Vec<Shortfall>> {
        let mut all = Vec::new();
        for &id in recipe_ids {
            all.extend(self.check_availability(id)?);
        }
        Ok(all)
    }

    pub fn check_plan_date(&self, date: NaiveDate) -> Result<Vec<PlannedShortfall>> {
        let plans = self.list_meal_plans(Some(date), Some(date))?;
        let mut all = Vec::new();
        for plan in plans {
            let recipe = plan.recipe_name.unwrap_or_default();
            all.extend(
                shortfalls(&self.conn, plan.recipe_id)?
                    .into_iter()
                    .map(|shortfall| PlannedShortfall {
                        recipe: recipe.clone(),
                        shortfall,
                    }),
            );
        }
        Ok(all)
    }

    // --- Meal plans ---

    pub fn create_meal_plan(&mut self, date: NaiveDate, recipe_id: i64) -> Result<MealPlan> {
        let tx = self.write_tx()?;
        let plan = create_meal_plan_tx(&tx, date, recipe_id)?;
        tx.commit()?;
        Ok(plan)
    }

    pub fn list_meal_plans(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<MealPlan>> {
        let from = from.map(|d| d.format(DATE_FORMAT).to_string());
        let to = to.map(|d| d.format(DATE_FORMAT).to_string());
        let mut stmt = self.conn.prepare(
            "SELECT mp.id, mp.date, mp.recipe_id, r.name
             FROM meal_plans mp
             JOIN recipes r ON mp.recipe_id = r.id
             WHERE (?1 IS NULL OR mp.date >= ?1) AND (?2 IS NULL OR mp.date <= ?2)
             ORDER BY mp.date, mp.id",
        )?;
        let plans = stmt
            .query_map(params![from, to], Self::meal_plan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    // --- Export / Import ---

    pub fn export_all(&self) -> Result<ExportData> {
        let ingredients = self
            .list_ingredients()?
            .into_iter()
            .map(|i| ExportIngredient {
                name: i.name,
                unit: i.unit,
            })
            .collect();

        let mut recipes: Vec<ExportRecipe> = Vec::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT r.id, r.name, r.description, i.name, ri.quantity_needed, ri.unit
                 FROM recipes r
                 LEFT JOIN recipe_ingredients ri ON ri.recipe_id = r.id
                 LEFT JOIN ingredients i ON ri.ingredient_id = i.id
                 ORDER BY r.id, ri.id",
            )?;
            let mut rows = stmt.query([])?;
            let mut current_id = None;
            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                if current_id != Some(id) {
                    current_id = Some(id);
                    recipes.push(ExportRecipe {
                        name: row.get(1)?,
                        description: row.get(2)?,
                        ingredients: Vec::new(),
                    });
                }
                let line_name: Option<String> = row.get(3)?;
                if let (Some(name), Some(recipe)) = (line_name, recipes.last_mut()) {
                    let unit: Unit = row.get(5)?;
                    recipe.ingredients.push(NewRecipeLine {
                        name,
                        quantity: row.get(4)?,
                        unit: unit.to_string(),
                    });
                }
            }
        }

        let meal_plans = self
            .list_meal_plans(None, None)?
            .into_iter()
            .map(|p| ExportMealPlan {
                date: p.date.format(DATE_FORMAT).to_string(),
                recipe: p.recipe_name.unwrap_or_default(),
            })
            .collect();

        Ok(ExportData {
            version: EXPORT_VERSION,
            exported_at: Local::now().to_rfc3339(),
            ingredients,
            inventory: self.load_inventory()?,
            recipes,
            meal_plans,
        })
    }

    /// Merge an export into this database in a single transaction.
    ///
    /// Stock is added to existing stock. Recipes whose name already exists
    /// and meal plans already booked are skipped and counted. Any other
    /// invalid row fails the whole import.
    pub fn import_all(&mut self, data: &ExportData) -> Result<ImportSummary> {
        if data.version != EXPORT_VERSION {
            return Err(Error::validation(format!(
                "unsupported export version {} (expected {EXPORT_VERSION})",
                data.version
            )));
        }

        let mut summary = ImportSummary::default();
        let mut tx = self.write_tx()?;

        for ingredient in &data.ingredients {
            let name = validate_name("ingredient", &ingredient.name)?;
            let (_, created) = ensure_ingredient(&tx, &name, ingredient.unit)?;
            if created {
                summary.ingredients_created += 1;
            }
        }

        for item in &data.inventory {
            validate_stock_level(item.quantity).map_err(|_| {
                Error::validation(format!(
                    "stock for '{}' cannot be negative (got {})",
                    item.ingredient, item.quantity
                ))
            })?;
            if item.quantity <= 0.0 {
                let name = validate_name("ingredient", &item.ingredient)?;
                let (ingredient, created) = ensure_ingredient(&tx, &name, item.unit)?;
                tx.execute(
                    "INSERT OR IGNORE INTO inventory (ingredient_id, quantity_in_stock, unit, updated_at)
                     VALUES (?1, 0, ?2, ?3)",
                    params![ingredient.id, ingredient.unit, Local::now().to_rfc3339()],
                )?;
                if created {
                    summary.ingredients_created += 1;
                }
            } else {
                let stocked = stock_tx(&tx, &item.ingredient, item.quantity, item.unit)?;
                if stocked.created {
                    summary.ingredients_created += 1;
                }
            }
            summary.inventory_merged += 1;
        }

        for recipe in &data.recipes {
            let name = validate_name("recipe", &recipe.name)?;
            if find_recipe(&tx, &name)?.is_some() {
                summary.recipes_skipped += 1;
                continue;
            }
            let new_recipe = NewRecipe {
                name,
                description: recipe.description.clone(),
                ingredients: recipe.ingredients.clone(),
            };
            create_recipe_tx(&tx, &new_recipe)?;
            summary.recipes_imported += 1;
        }

        for plan in &data.meal_plans {
            let date = parse_plan_date(&plan.date)?;
            let recipe = find_recipe(&tx, plan.recipe.trim())?.ok_or_else(|| {
                Error::validation(format!(
                    "meal plan on {} references unknown recipe '{}'",
                    plan.date, plan.recipe
                ))
            })?;
            let sp = tx.savepoint()?;
            match create_meal_plan_tx(&sp, date, recipe.id) {
                Ok(_) => {
                    sp.commit()?;
                    summary.meal_plans_imported += 1;
                }
                Err(Error::Conflict(_)) => summary.meal_plans_skipped += 1,
                Err(e) => return Err(e),
            }
        }

        tx.commit()?;
        info!(
            recipes = summary.recipes_imported,
            meal_plans = summary.meal_plans_imported,
            inventory = summary.inventory_merged,
            "export data imported"
        );
        Ok(summary)
    }
}

// --- Query and write procedures shared by single-operation writers and
// the batch paths (seed, import), all taking the connection or an open
// transaction ---

pub(crate) fn find_ingredient(conn: &Connection, name: &str) -> Result<Option<Ingredient>> {
    let ingredient = conn
        .query_row(
            "SELECT id, name, unit, created_at FROM ingredients WHERE name = ?1",
            params![name],
            Database::ingredient_from_row,
        )
        .optional()?;
    Ok(ingredient)
}

pub(crate) fn find_recipe(conn: &Connection, name: &str) -> Result<Option<Recipe>> {
    let recipe = conn
        .query_row(
            "SELECT id, name, description, created_at FROM recipes WHERE name = ?1",
            params![name],
            Database::recipe_from_row,
        )
        .optional()?;
    Ok(recipe)
}

fn find_recipe_by_id(conn: &Connection, id: i64) -> Result<Option<Recipe>> {
    let recipe = conn
        .query_row(
            "SELECT id, name, description, created_at FROM recipes WHERE id = ?1",
            params![id],
            Database::recipe_from_row,
        )
        .optional()?;
    Ok(recipe)
}

fn recipe_lines(conn: &Connection, recipe_id: i64) -> Result<Vec<RecipeLine>> {
    let mut stmt = conn.prepare(
        "SELECT ri.id, ri.ingredient_id, i.name, ri.quantity_needed, ri.unit
         FROM recipe_ingredients ri
         JOIN ingredients i ON ri.ingredient_id = i.id
         WHERE ri.recipe_id = ?1
         ORDER BY ri.id",
    )?;
    let lines = stmt
        .query_map(params![recipe_id], Database::recipe_line_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

fn shortfalls(conn: &Connection, recipe_id: i64) -> Result<Vec<Shortfall>> {
    let mut stmt = conn.prepare(
        "SELECT i.name, ri.quantity_needed, COALESCE(inv.quantity_in_stock, 0.0), ri.unit
         FROM recipe_ingredients ri
         JOIN ingredients i ON ri.ingredient_id = i.id
         LEFT JOIN inventory inv ON inv.ingredient_id = ri.ingredient_id
         WHERE ri.recipe_id = ?1
         ORDER BY ri.id",
    )?;
    let mut missing = Vec::new();
    let mut rows = stmt.query(params![recipe_id])?;
    while let Some(row) = rows.next()? {
        if let Some(shortfall) =
            Shortfall::from_requirement(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)
        {
            missing.push(shortfall);
        }
    }
    Ok(missing)
}

/// Look up an ingredient by name or create it in `unit`.
///
/// An existing ingredient tracked in a different unit is rejected; stock
/// and requirements are only comparable within one unit.
pub(crate) fn ensure_ingredient(
    conn: &Connection,
    name: &str,
    unit: Unit,
) -> Result<(Ingredient, bool)> {
    if let Some(existing) = find_ingredient(conn, name)? {
        if existing.unit != unit {
            return Err(Error::validation(format!(
                "ingredient '{name}' is tracked in {}, not {unit}",
                existing.unit
            )));
        }
        return Ok((existing, false));
    }

    let now = Local::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingredients (name, unit, created_at) VALUES (?1, ?2, ?3)",
        params![name, unit, now],
    )
    .map_err(|e| Error::unique_as_conflict(e, format!("ingredient '{name}'")))?;
    let id = conn.last_insert_rowid();
    debug!(ingredient = %name, %unit, "ingredient created");
    Ok((
        Ingredient {
            id,
            name: name.to_string(),
            unit,
            created_at: now,
        },
        true,
    ))
}

pub(crate) fn stock_tx(
    conn: &Connection,
    name: &str,
    quantity: f64,
    unit: Unit,
) -> Result<StockedIngredient> {
    let name = validate_name("ingredient", name)?;
    validate_positive_quantity(quantity)?;

    let (ingredient, created) = ensure_ingredient(conn, &name, unit)?;
    let now = Local::now().to_rfc3339();
    let merged = conn.execute(
        "UPDATE inventory SET quantity_in_stock = quantity_in_stock + ?1, updated_at = ?2
         WHERE ingredient_id = ?3",
        params![quantity, now, ingredient.id],
    )?;
    if merged == 0 {
        conn.execute(
            "INSERT INTO inventory (ingredient_id, quantity_in_stock, unit, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![ingredient.id, quantity, unit, now],
        )?;
    }
    let total: f64 = conn.query_row(
        "SELECT quantity_in_stock FROM inventory WHERE ingredient_id = ?1",
        params![ingredient.id],
        |row| row.get(0),
    )?;
    debug!(ingredient = %name, added = quantity, total, "ingredient stocked");

    Ok(StockedIngredient {
        ingredient_id: ingredient.id,
        name: ingredient.name,
        quantity: total,
        unit,
        created,
    })
}

pub(crate) fn create_recipe_tx(conn: &Connection, recipe: &NewRecipe) -> Result<Recipe> {
    let name = validate_name("recipe", &recipe.name)?;
    if find_recipe(conn, &name)?.is_some() {
        return Err(Error::Conflict(format!("recipe '{name}'")));
    }

    // Validate every line before the first write.
    let mut lines: Vec<(String, f64, Unit)> = Vec::with_capacity(recipe.ingredients.len());
    let mut seen = HashSet::new();
    for line in &recipe.ingredients {
        let ingredient = validate_name("ingredient", &line.name)?;
        let unit = line.unit.parse::<Unit>().map_err(|e| {
            Error::validation(format!("{e} (ingredient '{ingredient}')"))
        })?;
        validate_positive_quantity(line.quantity).map_err(|_| {
            Error::validation(format!(
                "quantity for ingredient '{ingredient}' must be positive (got {})",
                line.quantity
            ))
        })?;
        if !seen.insert(ingredient.clone()) {
            return Err(Error::Conflict(format!(
                "ingredient '{ingredient}' in recipe '{name}'"
            )));
        }
        lines.push((ingredient, line.quantity, unit));
    }

    let description = recipe
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from);
    let now = Local::now().to_rfc3339();
    conn.execute(
        "INSERT INTO recipes (name, description, created_at) VALUES (?1, ?2, ?3)",
        params![name, description, now],
    )
    .map_err(|e| Error::unique_as_conflict(e, format!("recipe '{name}'")))?;
    let recipe_id = conn.last_insert_rowid();

    for (ingredient_name, quantity, unit) in &lines {
        let (ingredient, _) = ensure_ingredient(conn, ingredient_name, *unit)?;
        conn.execute(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity_needed, unit)
             VALUES (?1, ?2, ?3, ?4)",
            params![recipe_id, ingredient.id, quantity, unit],
        )
        .map_err(|e| {
            Error::unique_as_conflict(
                e,
                format!("ingredient '{ingredient_name}' in recipe '{name}'"),
            )
        })?;
    }
    debug!(recipe = %name, lines = lines.len(), "recipe created");

    Ok(Recipe {
        id: recipe_id,
        name,
        description,
        created_at: now,
    })
}

pub(crate) fn create_meal_plan_tx(
    conn: &Connection,
    date: NaiveDate,
    recipe_id: i64,
) -> Result<MealPlan> {
    let recipe = find_recipe_by_id(conn, recipe_id)?
        .ok_or_else(|| Error::NotFound(format!("recipe {recipe_id}")))?;
    let date_str = date.format(DATE_FORMAT).to_string();

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM meal_plans WHERE date = ?1 AND recipe_id = ?2",
            params![date_str, recipe_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Err(Error::Conflict(format!(
            "meal plan {id} for '{}' on {date_str}",
            recipe.name
        )));
    }

    conn.execute(
        "INSERT INTO meal_plans (date, recipe_id, created_at) VALUES (?1, ?2, ?3)",
        params![date_str, recipe_id, Local::now().to_rfc3339()],
    )
    .map_err(|e| {
        Error::unique_as_conflict(e, format!("meal plan for '{}' on {date_str}", recipe.name))
    })?;
    let id = conn.last_insert_rowid();
    debug!(recipe = %recipe.name, date = %date_str, id, "meal plan created");

    Ok(MealPlan {
        id,
        date,
        recipe_id,
        recipe_name: Some(recipe.name),
    })
}
