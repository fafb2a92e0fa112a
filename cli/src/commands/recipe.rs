use anyhow::{Context, Result, bail};
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::models::NewRecipeLine;
use larder_core::service::KitchenService;
use larder_core::units::normalize_quantity;

use super::helpers::{
    confirm, exit_soft_failure, format_quantity, parse_ingredient_spec, print_shortfall_table,
    truncate,
};

pub(crate) fn cmd_recipe_create(
    svc: &mut KitchenService,
    name: &str,
    description: Option<&str>,
    ingredient_specs: &[String],
    json: bool,
) -> Result<()> {
    let lines = ingredient_specs
        .iter()
        .map(|s| parse_ingredient_spec(s))
        .collect::<Result<Vec<_>>>()?;

    create_and_report(svc, name, description, &lines, json)
}

fn create_and_report(
    svc: &mut KitchenService,
    name: &str,
    description: Option<&str>,
    lines: &[NewRecipeLine],
    json: bool,
) -> Result<()> {
    if !svc.create_recipe(name, description, lines)? {
        exit_soft_failure(
            &format!(
                "Recipe '{}' was not created: the name is taken or an ingredient is listed twice",
                name.trim()
            ),
            json,
        );
    }

    let detail = svc.get_recipe(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        let rname = &detail.name;
        let id = detail.id;
        let count = detail.ingredients.len();
        println!("Created recipe: {rname} (id: {id}, {count} ingredients)");
        if count == 0 {
            println!(
                "Add ingredients with: larder recipe create \"{rname}\" --ingredient name:qty:unit"
            );
        }
    }
    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &KitchenService, recipe_name: &str, json: bool) -> Result<()> {
    let detail = match svc.get_recipe(recipe_name) {
        Ok(d) => d,
        Err(e) if e.is_soft_failure() => exit_soft_failure(&format!("{e}"), json),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!("=== {} ===", detail.name);
    if let Some(description) = &detail.description {
        println!("  {description}");
    }
    println!("\n  INGREDIENTS:");
    if detail.ingredients.is_empty() {
        println!("    (none)");
    }
    for line in &detail.ingredients {
        let qty = format_quantity(line.quantity_needed);
        println!("    {} | {qty} {}", line.ingredient_name, line.unit);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_list(svc: &KitchenService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
    }

    let recipes = svc.list_recipes()?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            name: truncate(&r.name, 40),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_recipe_check(svc: &KitchenService, recipe_name: &str, json: bool) -> Result<()> {
    let detail = match svc.get_recipe(recipe_name) {
        Ok(d) => d,
        Err(e) if e.is_soft_failure() => exit_soft_failure(&format!("{e}"), json),
        Err(e) => return Err(e.into()),
    };
    let missing = svc.check_availability(detail.id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "recipe": detail.name,
                "can_cook": missing.is_empty(),
                "missing": missing,
            }))?
        );
    } else if missing.is_empty() {
        println!("All ingredients for {} are in stock.", detail.name);
    } else {
        println!("Missing for {}:", detail.name);
        print_shortfall_table(&missing);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_delete(
    svc: &mut KitchenService,
    recipe_name: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    let name = recipe_name.trim();
    if !yes
        && !json
        && !confirm(&format!(
            "Delete recipe '{name}' and all of its meal plans?"
        ))?
    {
        eprintln!("Cancelled");
        return Ok(());
    }

    if !svc.delete_recipe(name)? {
        exit_soft_failure(&format!("Recipe '{name}' not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": name }));
    } else {
        println!("Deleted recipe {name}");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_import(
    svc: &mut KitchenService,
    file: &Path,
    name_override: Option<String>,
    json: bool,
) -> Result<()> {
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let parsed = parse_cooklang(&input)?;

    let name = name_override
        .or(parsed.title)
        .or_else(|| file.file_stem().and_then(|s| s.to_str()).map(String::from))
        .context("Could not determine recipe name. Use --name to specify one")?;

    // Ingredients already tracked in another unit cannot be added to this recipe.
    let mut warnings = parsed.warnings;
    let mut lines = Vec::with_capacity(parsed.lines.len());
    for line in parsed.lines {
        if let Some(existing) = svc.database().get_ingredient(&line.name)? {
            if existing.unit.as_str() != line.unit {
                warnings.push(format!(
                    "  {}: tracked in {}, recipe uses {}; skipped",
                    line.name, existing.unit, line.unit
                ));
                continue;
            }
        }
        lines.push(line);
    }

    if lines.is_empty() {
        bail!("No importable ingredients found in recipe");
    }
    if !warnings.is_empty() {
        eprintln!("Import notes:");
        for w in &warnings {
            eprintln!("{w}");
        }
    }

    create_and_report(svc, &name, None, &lines, json)
}

struct CooklangRecipe {
    title: Option<String>,
    lines: Vec<NewRecipeLine>,
    warnings: Vec<String>,
}

/// Turn a Cooklang document into recipe lines in the unit catalog.
///
/// Quantities of one ingredient are summed when they normalize to the same
/// unit. Ingredients without a numeric quantity or with an unknown unit
/// are skipped with a warning.
fn parse_cooklang(input: &str) -> Result<CooklangRecipe> {
    let (recipe_data, _report) = cooklang::parse(input)
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to parse Cooklang file: {e}"))?;

    let title = recipe_data.metadata.title().map(String::from);
    let converter = cooklang::Converter::default();
    let grouped = recipe_data.group_ingredients(&converter);

    let mut lines: Vec<NewRecipeLine> = Vec::new();
    let mut warnings = Vec::new();

    for gi in &grouped {
        let name = gi.ingredient.display_name().to_string();
        let mut total: Option<(f64, larder_core::units::Unit)> = None;

        for qty in gi.quantity.iter() {
            let raw = match qty.value() {
                cooklang::Value::Number(n) => Some(n.value()),
                cooklang::Value::Range { start, .. } => Some(start.value()),
                cooklang::Value::Text(t) => t.trim().parse::<f64>().ok(),
            };
            let Some(raw) = raw else {
                warnings.push(format!("  {name}: quantity is not a number; ignored"));
                continue;
            };
            let unit = qty.unit();
            let Some((value, normalized, approximate)) = normalize_quantity(raw, unit) else {
                let unit = unit.unwrap_or_default();
                warnings.push(format!("  {name}: unknown unit '{unit}'; ignored"));
                continue;
            };
            if approximate {
                let unit = unit.unwrap_or_default();
                warnings.push(format!(
                    "  {name}: {raw} {unit} -> {} {normalized} (approximate)",
                    format_quantity(value)
                ));
            }
            match total {
                None => total = Some((value, normalized)),
                Some((sum, u)) if u == normalized => total = Some((sum + value, u)),
                Some((_, u)) => warnings.push(format!(
                    "  {name}: mixes {u} and {normalized}; extra quantity ignored"
                )),
            }
        }

        match total {
            Some((quantity, unit)) if quantity > 0.0 => lines.push(NewRecipeLine {
                name,
                quantity,
                unit: unit.to_string(),
            }),
            _ => warnings.push(format!("  {name}: no usable quantity; skipped")),
        }
    }

    Ok(CooklangRecipe {
        title,
        lines,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cooklang_units() {
        let input = "Whisk @flour{200%g} with @milk{0.3%l}.\nAdd @eggs{2} and season with @salt.\n";
        let parsed = parse_cooklang(input).unwrap();

        let flour = parsed.lines.iter().find(|l| l.name == "flour").unwrap();
        assert!((flour.quantity - 200.0).abs() < 0.01);
        assert_eq!(flour.unit, "grams");

        let milk = parsed.lines.iter().find(|l| l.name == "milk").unwrap();
        assert!((milk.quantity - 300.0).abs() < 0.01);
        assert_eq!(milk.unit, "ml");

        let eggs = parsed.lines.iter().find(|l| l.name == "eggs").unwrap();
        assert!((eggs.quantity - 2.0).abs() < 0.01);
        assert_eq!(eggs.unit, "pcs");

        assert!(parsed.lines.iter().all(|l| l.name != "salt"));
        assert!(parsed.warnings.iter().any(|w| w.contains("salt")));
    }

    #[test]
    fn test_parse_cooklang_unknown_unit_skipped() {
        let input = "Add @sugar{1%cup} and @butter{50%g}.\n";
        let parsed = parse_cooklang(input).unwrap();
        assert_eq!(parsed.lines.len(), 1);
        assert_eq!(parsed.lines[0].name, "butter");
        assert!(parsed.warnings.iter().any(|w| w.contains("sugar")));
    }

    #[test]
    fn test_import_creates_recipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crepes.cook");
        std::fs::write(&path, "Mix @flour{100%g} with @milk{200%ml}.\n").unwrap();

        let mut svc = KitchenService::new_in_memory().unwrap();
        cmd_recipe_import(&mut svc, &path, None, true).unwrap();

        let detail = svc.get_recipe("crepes").unwrap();
        assert_eq!(detail.ingredients.len(), 2);
    }

    #[test]
    fn test_import_skips_unit_clash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omelette.cook");
        std::fs::write(&path, "Beat @eggs{120%g} with @butter{10%g}.\n").unwrap();

        let mut svc = KitchenService::new_in_memory().unwrap();
        svc.stock_ingredient("eggs", 6.0, "pcs").unwrap();
        cmd_recipe_import(&mut svc, &path, Some("Omelette".into()), true).unwrap();

        let detail = svc.get_recipe("Omelette").unwrap();
        assert_eq!(detail.ingredients.len(), 1);
        assert_eq!(detail.ingredients[0].ingredient_name, "butter");
    }

    #[test]
    fn test_create_from_specs() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        let specs = vec!["Flour:200:grams".to_string(), "Eggs:2:pcs".to_string()];
        cmd_recipe_create(&mut svc, "Pancakes", Some("Breakfast"), &specs, true).unwrap();
        let detail = svc.get_recipe("Pancakes").unwrap();
        assert_eq!(detail.description.as_deref(), Some("Breakfast"));
        assert_eq!(detail.ingredients.len(), 2);
    }

    #[test]
    fn test_create_from_bad_spec_fails_before_writing() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        let specs = vec!["Flour:200".to_string()];
        assert!(cmd_recipe_create(&mut svc, "Pancakes", None, &specs, true).is_err());
        assert!(svc.list_recipes().unwrap().is_empty());
    }
}
