use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use larder_core::models::DATE_FORMAT;
use larder_core::service::KitchenService;

use super::helpers::{exit_soft_failure, parse_date, print_planned_shortfall_table, truncate};

pub(crate) fn cmd_plan_add(
    svc: &mut KitchenService,
    date: &str,
    recipe_name: &str,
    json: bool,
) -> Result<()> {
    let date = parse_date(Some(date.to_string()))?;
    let recipe = match svc.get_recipe(recipe_name) {
        Ok(r) => r,
        Err(e) if e.is_soft_failure() => exit_soft_failure(&format!("{e}"), json),
        Err(e) => return Err(e.into()),
    };

    let day = date.format(DATE_FORMAT);
    if !svc.create_meal_plan(date, recipe.id)? {
        exit_soft_failure(&format!("{} is already planned for {day}", recipe.name), json);
    }

    if json {
        println!(
            "{}",
            serde_json::json!({ "date": day.to_string(), "recipe": recipe.name })
        );
    } else {
        println!("Planned {} for {day}", recipe.name);
        let missing = svc.check_availability(recipe.id)?;
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|s| s.name.as_str()).collect();
            println!("  Short on: {}", names.join(", "));
        }
    }
    Ok(())
}

pub(crate) fn cmd_plan_list(
    svc: &KitchenService,
    from: Option<String>,
    to: Option<String>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Recipe")]
        recipe: String,
    }

    let from = from.map(|d| parse_date(Some(d))).transpose()?;
    let to = to.map(|d| parse_date(Some(d))).transpose()?;
    let plans = svc.list_meal_plans(from, to)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }
    if plans.is_empty() {
        eprintln!("No meal plans found");
        return Ok(());
    }

    let rows: Vec<PlanRow> = plans
        .iter()
        .map(|p| PlanRow {
            id: p.id,
            date: p.date.format(DATE_FORMAT).to_string(),
            recipe: truncate(p.recipe_name.as_deref().unwrap_or("?"), 40),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_plan_check(svc: &KitchenService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let day = date.format(DATE_FORMAT).to_string();
    let planned = svc.list_meal_plans(Some(date), Some(date))?;
    let missing = svc.check_plan_date(date)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "date": day,
                "recipes": planned.iter().filter_map(|p| p.recipe_name.as_deref()).collect::<Vec<_>>(),
                "missing": missing,
            }))?
        );
        return Ok(());
    }

    if planned.is_empty() {
        println!("Nothing planned for {day}.");
    } else if missing.is_empty() {
        println!("Everything planned for {day} can be cooked.");
    } else {
        println!("Shopping needed for {day}:");
        print_planned_shortfall_table(&missing);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use larder_core::models::NewRecipeLine;

    #[test]
    fn test_plan_add_and_list() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        let lines = [NewRecipeLine {
            name: "Bread".into(),
            quantity: 2.0,
            unit: "pcs".into(),
        }];
        svc.create_recipe("Toast", None, &lines).unwrap();

        cmd_plan_add(&mut svc, "2024-06-15", "Toast", true).unwrap();
        cmd_plan_list(&svc, Some("2024-06-01".into()), None, true).unwrap();
        cmd_plan_check(&svc, Some("2024-06-15".into()), true).unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let plans = svc.list_meal_plans(Some(day), Some(day)).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(svc.check_plan_date(day).unwrap().len(), 1);
    }

    #[test]
    fn test_plan_add_bad_date() {
        let mut svc = KitchenService::new_in_memory().unwrap();
        assert!(cmd_plan_add(&mut svc, "15/06/2024", "Toast", true).is_err());
    }
}
