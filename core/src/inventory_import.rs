use std::collections::{HashMap, HashSet};
use std::io::Read;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::db::Database;
use crate::models::{InventoryItem, validate_name, validate_positive_quantity};
use crate::units::Unit;

/// Summary of what an inventory import would do / did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InventoryImportSummary {
    pub rows_parsed: usize,
    pub ingredients_created: usize,
    pub ingredients_restocked: usize,
    pub dry_run: bool,
}

/// Parse and validate an inventory CSV from any reader.
///
/// Expected header: `name,quantity,unit` (any order, case-insensitive).
/// Extra columns are ignored and blank rows skipped. Every row is checked
/// before anything is returned, so a bad row anywhere rejects the file.
pub fn parse_inventory_csv<R: Read>(reader: R) -> Result<Vec<InventoryItem>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_name = col("name").context("Missing required column: name")?;
    let idx_quantity = col("quantity").context("Missing required column: quantity")?;
    let idx_unit = col("unit").context("Missing required column: unit")?;

    let mut items: Vec<InventoryItem> = Vec::new();
    let mut units: HashMap<String, Unit> = HashMap::new();

    for (line_num, result) in rdr.records().enumerate() {
        let row = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV row {row}"))?;

        let name = record.get(idx_name).unwrap_or("");
        let quantity = record.get(idx_quantity).unwrap_or("");
        let unit = record.get(idx_unit).unwrap_or("");
        if name.is_empty() && quantity.is_empty() && unit.is_empty() {
            continue;
        }

        let name = validate_name("ingredient", name).with_context(|| format!("Row {row}"))?;
        let quantity: f64 = quantity
            .parse()
            .with_context(|| format!("Row {row}: invalid quantity '{quantity}'"))?;
        validate_positive_quantity(quantity).with_context(|| format!("Row {row} ({name})"))?;
        let unit: Unit = unit.parse().with_context(|| format!("Row {row} ({name})"))?;

        if let Some(previous) = units.insert(name.clone(), unit) {
            if previous != unit {
                bail!("Row {row}: '{name}' listed in both {previous} and {unit}");
            }
        }

        items.push(InventoryItem {
            ingredient: name,
            quantity,
            unit,
        });
    }

    Ok(items)
}

/// Merge parsed rows into inventory in a single transaction.
///
/// When `dry_run` is true, units are checked against existing ingredients
/// and the counts reported, but nothing is written.
pub fn import_inventory(
    db: &mut Database,
    items: &[InventoryItem],
    dry_run: bool,
) -> Result<InventoryImportSummary> {
    let mut summary = InventoryImportSummary {
        rows_parsed: items.len(),
        dry_run,
        ..InventoryImportSummary::default()
    };

    if dry_run {
        let mut seen = HashSet::new();
        for item in items {
            match db.get_ingredient(&item.ingredient)? {
                Some(existing) if existing.unit != item.unit => bail!(
                    "'{}' is tracked in {}, not {}",
                    item.ingredient,
                    existing.unit,
                    item.unit
                ),
                Some(_) => summary.ingredients_restocked += 1,
                None if seen.contains(&item.ingredient) => summary.ingredients_restocked += 1,
                None => summary.ingredients_created += 1,
            }
            seen.insert(item.ingredient.clone());
        }
        return Ok(summary);
    }

    let stocked = db
        .stock_batch(items)
        .context("Inventory import rolled back")?;
    for s in &stocked {
        if s.created {
            summary.ingredients_created += 1;
        } else {
            summary.ingredients_restocked += 1;
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inventory_csv_basic() {
        let csv = "name,quantity,unit\nFlour,500,grams\nMilk,1000,ml\nEggs,6,pcs\n";
        let items = parse_inventory_csv(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].ingredient, "Flour");
        assert!((items[1].quantity - 1000.0).abs() < 0.01);
        assert_eq!(items[2].unit, Unit::Pcs);
    }

    #[test]
    fn test_parse_inventory_csv_reordered_and_extra_columns() {
        let csv = "Unit,Note,Name,Quantity\ngrams,top shelf,Sugar,300\n,,,\n";
        let items = parse_inventory_csv(csv.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].ingredient, "Sugar");
        assert_eq!(items[0].unit, Unit::Grams);
    }

    #[test]
    fn test_parse_inventory_csv_missing_column() {
        let csv = "name,quantity\nFlour,500\n";
        let err = parse_inventory_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unit"));
    }

    #[test]
    fn test_parse_inventory_csv_bad_rows() {
        let bad_unit = "name,quantity,unit\nFlour,500,kg\n";
        let err = parse_inventory_csv(bad_unit.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("Row 2"));

        let bad_quantity = "name,quantity,unit\nFlour,lots,grams\n";
        assert!(parse_inventory_csv(bad_quantity.as_bytes()).is_err());

        let negative = "name,quantity,unit\nFlour,-1,grams\n";
        assert!(parse_inventory_csv(negative.as_bytes()).is_err());

        let clash = "name,quantity,unit\nFlour,1,grams\nFlour,1,ml\n";
        assert!(parse_inventory_csv(clash.as_bytes()).is_err());
    }

    #[test]
    fn test_import_inventory_dry_run() {
        let mut db = Database::open_in_memory().unwrap();
        db.stock_ingredient("Flour", 100.0, "grams").unwrap();
        let csv = "name,quantity,unit\nFlour,500,grams\nMilk,1000,ml\n";
        let items = parse_inventory_csv(csv.as_bytes()).unwrap();

        let summary = import_inventory(&mut db, &items, true).unwrap();
        assert!(summary.dry_run);
        assert_eq!(summary.ingredients_created, 1);
        assert_eq!(summary.ingredients_restocked, 1);
        // Nothing written
        assert!(db.get_ingredient("Milk").unwrap().is_none());
        let flour = db.get_inventory_item("Flour").unwrap().unwrap();
        assert!((flour.quantity - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_import_inventory_actual() {
        let mut db = Database::open_in_memory().unwrap();
        db.stock_ingredient("Flour", 100.0, "grams").unwrap();
        let csv = "name,quantity,unit\nFlour,500,grams\nMilk,1000,ml\nMilk,250,ml\n";
        let items = parse_inventory_csv(csv.as_bytes()).unwrap();

        let summary = import_inventory(&mut db, &items, false).unwrap();
        assert_eq!(summary.rows_parsed, 3);
        assert_eq!(summary.ingredients_created, 1);
        assert_eq!(summary.ingredients_restocked, 2);
        let flour = db.get_inventory_item("Flour").unwrap().unwrap();
        assert!((flour.quantity - 600.0).abs() < 0.01);
        let milk = db.get_inventory_item("Milk").unwrap().unwrap();
        assert!((milk.quantity - 1250.0).abs() < 0.01);
    }

    #[test]
    fn test_import_inventory_unit_clash_with_db_rolls_back() {
        let mut db = Database::open_in_memory().unwrap();
        db.stock_ingredient("Eggs", 6.0, "pcs").unwrap();
        let csv = "name,quantity,unit\nButter,250,grams\nEggs,100,grams\n";
        let items = parse_inventory_csv(csv.as_bytes()).unwrap();

        assert!(import_inventory(&mut db, &items, true).is_err());
        assert!(import_inventory(&mut db, &items, false).is_err());
        assert!(db.get_ingredient("Butter").unwrap().is_none());
    }

    #[test]
    fn test_import_inventory_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pantry.csv");
        std::fs::write(&path, "name,quantity,unit\nRice,1000,grams\n").unwrap();

        let mut db = Database::open_in_memory().unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let items = parse_inventory_csv(file).unwrap();
        import_inventory(&mut db, &items, false).unwrap();
        assert!(db.get_inventory_item("Rice").unwrap().is_some());
    }
}
