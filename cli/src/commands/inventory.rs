use anyhow::{Context, Result};
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::service::KitchenService;

use super::helpers::{confirm, exit_soft_failure, format_quantity, truncate};

pub(crate) fn cmd_stock(
    svc: &mut KitchenService,
    name: &str,
    quantity: f64,
    unit: &str,
    json: bool,
) -> Result<()> {
    let stocked = svc.stock_ingredient(name, quantity, unit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stocked)?);
    } else {
        let total = format_quantity(stocked.quantity);
        let added = format_quantity(quantity);
        let unit = stocked.unit;
        let name = &stocked.name;
        if stocked.created {
            println!("Added new ingredient {name}: {total} {unit}");
        } else {
            println!("Stocked {added} {unit} of {name} (now {total} {unit})");
        }
    }
    Ok(())
}

pub(crate) fn cmd_inventory_list(svc: &KitchenService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct InventoryRow {
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Unit")]
        unit: String,
    }

    let items = svc.load_inventory()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        eprintln!("Inventory is empty. Add stock with: larder stock <name> <quantity> <unit>");
        return Ok(());
    }

    let rows: Vec<InventoryRow> = items
        .iter()
        .map(|i| InventoryRow {
            name: truncate(&i.ingredient, 35),
            quantity: format_quantity(i.quantity),
            unit: i.unit.to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(1)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_inventory_set(
    svc: &mut KitchenService,
    name: &str,
    quantity: f64,
    json: bool,
) -> Result<()> {
    if !svc.update_ingredient_quantity(name, quantity)? {
        exit_soft_failure(&format!("No inventory found for '{}'", name.trim()), json);
    }
    if json {
        println!(
            "{}",
            serde_json::json!({ "ingredient": name.trim(), "quantity": quantity })
        );
    } else {
        println!("Set {} to {}", name.trim(), format_quantity(quantity));
    }
    Ok(())
}

pub(crate) fn cmd_inventory_import(
    svc: &mut KitchenService,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let summary = svc.import_inventory_csv(file, dry_run)?;

    if summary.rows_parsed == 0 {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": "No rows found in CSV file" })
            );
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if dry_run {
        println!("Dry run, no changes made.\n");
        println!("  Rows parsed:          {}", summary.rows_parsed);
        println!("  Ingredients to add:   {}", summary.ingredients_created);
        println!("  Ingredients restocked: {}", summary.ingredients_restocked);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:          {}", summary.rows_parsed);
        println!("  Ingredients added:    {}", summary.ingredients_created);
        println!("  Ingredients restocked: {}", summary.ingredients_restocked);
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(svc: &KitchenService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Unit")]
        unit: String,
        #[tabled(rename = "In stock")]
        stock: String,
    }

    let ingredients = svc.list_ingredients()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ingredients)?);
        return Ok(());
    }
    if ingredients.is_empty() {
        eprintln!("No ingredients found");
        return Ok(());
    }

    let rows: Vec<IngredientRow> = ingredients
        .iter()
        .map(|i| IngredientRow {
            id: i.id,
            name: truncate(&i.name, 35),
            unit: i.unit.to_string(),
            stock: i.quantity.map_or("-".into(), format_quantity),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_ingredient_delete(
    svc: &mut KitchenService,
    name: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    let name = name.trim();
    if !yes
        && !json
        && !confirm(&format!(
            "Delete '{name}' from inventory and from every recipe that uses it?"
        ))?
    {
        eprintln!("Cancelled");
        return Ok(());
    }

    if !svc.delete_ingredient(name)? {
        exit_soft_failure(&format!("Ingredient '{name}' not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": name }));
    } else {
        println!("Deleted ingredient {name}");
    }
    Ok(())
}
