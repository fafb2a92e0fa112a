use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;

use larder_core::models::ExportData;
use larder_core::service::KitchenService;

pub(crate) fn cmd_seed(svc: &mut KitchenService, json: bool) -> Result<()> {
    let today = Local::now().date_naive();
    let summary = svc.seed_demo(today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Demo data loaded.\n");
    println!("  Ingredients added:     {}", summary.ingredients_created);
    println!("  Ingredients restocked: {}", summary.ingredients_restocked);
    println!(
        "  Recipe:                {}",
        if summary.recipe_created { "created" } else { "already present" }
    );
    println!(
        "  Meal plan for today:   {}",
        if summary.meal_plan_created { "created" } else { "already present" }
    );
    Ok(())
}

pub(crate) fn cmd_export(svc: &KitchenService, file: Option<&Path>) -> Result<()> {
    let data = svc.export_all()?;
    let body = serde_json::to_string_pretty(&data)?;

    match file {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("Failed to write file: {}", path.display()))?;
            eprintln!(
                "Exported {} ingredients, {} recipes, {} meal plans to {}",
                data.ingredients.len(),
                data.recipes.len(),
                data.meal_plans.len(),
                path.display()
            );
        }
        None => println!("{body}"),
    }
    Ok(())
}

pub(crate) fn cmd_import(svc: &mut KitchenService, path: &Path, json: bool) -> Result<()> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let data: ExportData = serde_json::from_str(&input)
        .with_context(|| format!("Invalid export file: {}", path.display()))?;

    let summary = svc.import_all(&data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Import complete.\n");
        println!("  Ingredients created: {}", summary.ingredients_created);
        println!("  Inventory merged:    {}", summary.inventory_merged);
        println!(
            "  Recipes imported:    {} ({} skipped)",
            summary.recipes_imported, summary.recipes_skipped
        );
        println!(
            "  Meal plans imported: {} ({} skipped)",
            summary.meal_plans_imported, summary.meal_plans_skipped
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_then_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("larder.json");

        let mut source = KitchenService::new_in_memory().unwrap();
        cmd_seed(&mut source, true).unwrap();
        cmd_export(&source, Some(&path)).unwrap();

        let mut target = KitchenService::new_in_memory().unwrap();
        cmd_import(&mut target, &path, true).unwrap();

        assert_eq!(target.list_recipes().unwrap().len(), 1);
        assert_eq!(target.load_inventory().unwrap().len(), 4);
        assert_eq!(target.list_meal_plans(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_import_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut svc = KitchenService::new_in_memory().unwrap();
        let err = cmd_import(&mut svc, &path, true).unwrap_err();
        assert!(err.to_string().contains("Invalid export file"));
    }
}
