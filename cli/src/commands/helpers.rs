use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::models::{NewRecipeLine, PlannedShortfall, Shortfall};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse `name:quantity:unit`. The name may itself contain colons.
pub(crate) fn parse_ingredient_spec(s: &str) -> Result<NewRecipeLine> {
    let mut parts = s.rsplitn(3, ':');
    let (Some(unit), Some(quantity), Some(name)) = (parts.next(), parts.next(), parts.next())
    else {
        bail!("Invalid ingredient '{s}'. Use 'name:quantity:unit' (e.g. 'Flour:200:grams')");
    };
    let quantity: f64 = quantity
        .trim()
        .parse()
        .with_context(|| format!("Invalid quantity '{quantity}' in '{s}'"))?;
    Ok(NewRecipeLine {
        name: name.trim().to_string(),
        quantity,
        unit: unit.trim().to_string(),
    })
}

pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N]: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let Some(line) = stdin.lock().lines().next() else {
        return Ok(false);
    };
    let answer = line?.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Report a missing target or a duplicate and exit with status 2.
pub(crate) fn exit_soft_failure(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn print_shortfall_table(shortfalls: &[Shortfall]) {
    #[derive(Tabled)]
    struct ShortfallRow {
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Needed")]
        needed: String,
        #[tabled(rename = "Have")]
        have: String,
        #[tabled(rename = "Missing")]
        missing: String,
    }

    let rows: Vec<ShortfallRow> = shortfalls
        .iter()
        .map(|s| ShortfallRow {
            name: truncate(&s.name, 30),
            needed: with_unit(s.needed, s),
            have: with_unit(s.have, s),
            missing: with_unit(s.missing(), s),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_planned_shortfall_table(shortfalls: &[PlannedShortfall]) {
    #[derive(Tabled)]
    struct PlannedRow {
        #[tabled(rename = "Recipe")]
        recipe: String,
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Needed")]
        needed: String,
        #[tabled(rename = "Have")]
        have: String,
        #[tabled(rename = "Missing")]
        missing: String,
    }

    let rows: Vec<PlannedRow> = shortfalls
        .iter()
        .map(|p| {
            let s = &p.shortfall;
            PlannedRow {
                recipe: truncate(&p.recipe, 25),
                name: truncate(&s.name, 25),
                needed: with_unit(s.needed, s),
                have: with_unit(s.have, s),
                missing: with_unit(s.missing(), s),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

fn with_unit(quantity: f64, shortfall: &Shortfall) -> String {
    format!("{} {}", format_quantity(quantity), shortfall.unit)
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Whole numbers without a fractional part, otherwise up to two decimals.
pub(crate) fn format_quantity(v: f64) -> String {
    let v = if v == 0.0 { 0.0 } else { v };
    if (v - v.round()).abs() < 1e-9 {
        format!("{v:.0}")
    } else {
        let s = format!("{v:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
        assert!(parse_date(Some("2024-13-01".to_string())).is_err());
    }

    #[test]
    fn test_parse_ingredient_spec() {
        let line = parse_ingredient_spec("Flour:200:grams").unwrap();
        assert_eq!(line.name, "Flour");
        assert!((line.quantity - 200.0).abs() < f64::EPSILON);
        assert_eq!(line.unit, "grams");

        let line = parse_ingredient_spec(" Soy sauce: 1.5 :ml").unwrap();
        assert_eq!(line.name, "Soy sauce");
        assert!((line.quantity - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_ingredient_spec_name_with_colon() {
        let line = parse_ingredient_spec("Cheese: aged:50:grams").unwrap();
        assert_eq!(line.name, "Cheese: aged");
    }

    #[test]
    fn test_parse_ingredient_spec_invalid() {
        assert!(parse_ingredient_spec("Flour").is_err());
        assert!(parse_ingredient_spec("Flour:200").is_err());
        assert!(parse_ingredient_spec("Flour:lots:grams").is_err());
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(200.0), "200");
        assert_eq!(format_quantity(1.5), "1.5");
        assert_eq!(format_quantity(28.35), "28.35");
        assert_eq!(format_quantity(-0.0), "0");
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("nope"), "{\"error\":\"nope\"}");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }
}
