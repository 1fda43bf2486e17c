use std::path::Path;

use anyhow::{Context, Result};
use tabled::{Table, Tabled, settings::Style};

use foodgram_core::service::FoodgramService;

use super::helpers::{exit_with, truncate};

pub(crate) fn cmd_ingredient_add(
    svc: &FoodgramService,
    name: &str,
    unit: &str,
    json: bool,
) -> Result<()> {
    let ingredient = svc.add_ingredient(name, unit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let id = ingredient.id;
        println!(
            "Added ingredient: {} ({}) (id: {id})",
            ingredient.name, ingredient.measurement_unit
        );
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(
    svc: &FoodgramService,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Unit")]
        unit: String,
    }

    let ingredients = match search {
        Some(q) => svc.search_ingredients(q)?,
        None => svc.list_ingredients()?,
    };
    if ingredients.is_empty() {
        exit_with("No ingredients found", json);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&ingredients)?);
        return Ok(());
    }

    let rows: Vec<IngredientRow> = ingredients
        .into_iter()
        .map(|i| IngredientRow {
            id: i.id,
            name: truncate(&i.name, 30),
            unit: i.measurement_unit,
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

pub(crate) fn cmd_ingredient_import(
    svc: &FoodgramService,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let summary = svc.import_ingredients_csv(&data, dry_run)?;
    if summary.rows_parsed == 0 {
        exit_with("No rows found in CSV file", json);
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dry_run": dry_run,
                "rows_parsed": summary.rows_parsed,
                "ingredients_created": summary.ingredients_created,
                "ingredients_existing": summary.ingredients_existing,
            })
        );
    } else {
        if dry_run {
            println!("Dry run, no changes made.\n");
            println!("  Rows parsed:          {}", summary.rows_parsed);
            println!("  Ingredients to create: {}", summary.ingredients_created);
        } else {
            println!("Import complete.\n");
            println!("  Rows parsed:         {}", summary.rows_parsed);
            println!("  Ingredients created: {}", summary.ingredients_created);
        }
        println!("  Already present:     {}", summary.ingredients_existing);
    }
    Ok(())
}
