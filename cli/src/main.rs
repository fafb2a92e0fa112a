mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_export, cmd_import, cmd_ingredient_delete, cmd_ingredient_list, cmd_inventory_import,
    cmd_inventory_list, cmd_inventory_set, cmd_plan_add, cmd_plan_check, cmd_plan_list,
    cmd_recipe_check, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_import, cmd_recipe_list,
    cmd_recipe_show, cmd_seed, cmd_stock,
};
use crate::config::Config;
use larder_core::service::KitchenService;

#[derive(Parser)]
#[command(
    name = "larder",
    version,
    about = "Track what's in the kitchen and whether planned meals can be cooked"
)]
struct Cli {
    /// Database file (overrides LARDER_DB and the default data directory)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add stock for an ingredient, creating it if needed
    Stock {
        /// Ingredient name
        name: String,
        /// Quantity to add (must be positive)
        #[arg(allow_negative_numbers = true)]
        quantity: f64,
        /// Unit: grams, ml, pcs
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show on-hand inventory, or correct / import it
    Inventory {
        #[command(subcommand)]
        command: Option<InventoryCommands>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage ingredients
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Manage recipes and check whether they can be cooked
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Schedule recipes on dates
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Load demo ingredients, a pancake recipe, and a meal plan for today
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export all data as JSON (to a file, or stdout)
    Export {
        /// Output file (default: stdout)
        file: Option<PathBuf>,
    },
    /// Merge a JSON export into this database
    Import {
        /// Path to the JSON export
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum InventoryCommands {
    /// Overwrite the stock level of an ingredient
    Set {
        /// Ingredient name
        name: String,
        /// New quantity (zero or more)
        #[arg(allow_negative_numbers = true)]
        quantity: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add stock from a CSV file with columns name,quantity,unit
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Validate and preview without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// List all ingredients with their stock
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an ingredient, its stock, and its recipe lines
    Delete {
        /// Ingredient name
        name: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create a recipe with its ingredients
    Create {
        /// Recipe name
        name: String,
        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
        /// Ingredient as "name:quantity:unit" (repeatable)
        #[arg(short, long = "ingredient", value_name = "NAME:QTY:UNIT")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a recipe from a Cooklang (.cook) file
    Import {
        /// Path to the .cook file
        file: PathBuf,
        /// Recipe name override (defaults to metadata title or filename)
        #[arg(long)]
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with its ingredients
    Show {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List ingredients that are short for a recipe
    Check {
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe and its meal plans
    Delete {
        /// Recipe name
        recipe: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Schedule a recipe on a date
    Add {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: String,
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List meal plans, optionally within a date range
    List {
        /// First date to include
        #[arg(long)]
        from: Option<String>,
        /// Last date to include
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List shortfalls for every recipe planned on a date
    Check {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_env("LARDER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let mut svc = KitchenService::with_busy_timeout(&config.db_path, config.busy_timeout)?;
    tracing::debug!(db = %config.db_path.display(), "database opened");

    match cli.command {
        Commands::Stock {
            name,
            quantity,
            unit,
            json,
        } => cmd_stock(&mut svc, &name, quantity, &unit, json),
        Commands::Inventory { command, json } => match command {
            None => cmd_inventory_list(&svc, json),
            Some(InventoryCommands::Set {
                name,
                quantity,
                json,
            }) => cmd_inventory_set(&mut svc, &name, quantity, json),
            Some(InventoryCommands::Import {
                file,
                dry_run,
                json,
            }) => cmd_inventory_import(&mut svc, &file, dry_run, json),
        },
        Commands::Ingredient { command } => match command {
            IngredientCommands::List { json } => cmd_ingredient_list(&svc, json),
            IngredientCommands::Delete { name, yes, json } => {
                cmd_ingredient_delete(&mut svc, &name, yes, json)
            }
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Create {
                name,
                description,
                ingredients,
                json,
            } => cmd_recipe_create(&mut svc, &name, description.as_deref(), &ingredients, json),
            RecipeCommands::Import { file, name, json } => {
                cmd_recipe_import(&mut svc, &file, name, json)
            }
            RecipeCommands::List { json } => cmd_recipe_list(&svc, json),
            RecipeCommands::Show { recipe, json } => cmd_recipe_show(&svc, &recipe, json),
            RecipeCommands::Check { recipe, json } => cmd_recipe_check(&svc, &recipe, json),
            RecipeCommands::Delete { recipe, yes, json } => {
                cmd_recipe_delete(&mut svc, &recipe, yes, json)
            }
        },
        Commands::Plan { command } => match command {
            PlanCommands::Add { date, recipe, json } => {
                cmd_plan_add(&mut svc, &date, &recipe, json)
            }
            PlanCommands::List { from, to, json } => cmd_plan_list(&svc, from, to, json),
            PlanCommands::Check { date, json } => cmd_plan_check(&svc, date, json),
        },
        Commands::Seed { json } => cmd_seed(&mut svc, json),
        Commands::Export { file } => cmd_export(&svc, file.as_deref()),
        Commands::Import { file, json } => cmd_import(&mut svc, &file, json),
    }
}
