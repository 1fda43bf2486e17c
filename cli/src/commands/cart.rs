use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use tracing::info;

use foodgram_core::service::FoodgramService;
use foodgram_core::shopping_list::FILE_NAME;

use super::helpers::{exit_with, print_recipe_table, truncate};

const EMPTY_CART: &str = "Shopping cart is empty";

pub(crate) fn cmd_cart_add(
    svc: &FoodgramService,
    username: &str,
    recipe_id: i64,
    json: bool,
) -> Result<()> {
    let user = svc.get_user_by_username(username)?;
    let Some(summary) = svc.add_to_cart(user.id, recipe_id)? else {
        exit_with(&format!("Recipe {recipe_id} is already in the shopping cart"), json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Added {} to {username}'s shopping cart", summary.name);
    }
    Ok(())
}

pub(crate) fn cmd_cart_remove(
    svc: &FoodgramService,
    username: &str,
    recipe_id: i64,
    json: bool,
) -> Result<()> {
    let user = svc.get_user_by_username(username)?;
    if !svc.remove_from_cart(user.id, recipe_id)? {
        exit_with(&format!("Recipe {recipe_id} is not in the shopping cart"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "removed": recipe_id }));
    } else {
        println!("Removed recipe {recipe_id} from {username}'s shopping cart");
    }
    Ok(())
}

/// Recipes in the cart followed by the aggregated shopping list.
pub(crate) fn cmd_cart_show(svc: &FoodgramService, username: &str, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Amount")]
        amount: i64,
        #[tabled(rename = "Unit")]
        unit: String,
    }

    let user = svc.get_user_by_username(username)?;
    let Some(list) = svc.shopping_list(user.id)? else {
        exit_with(EMPTY_CART, json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    print_recipe_table(&svc.list_cart(user.id)?);

    let rows: Vec<EntryRow> = list
        .entries
        .iter()
        .map(|e| EntryRow {
            name: truncate(&e.ingredient.name, 30),
            amount: e.total_quantity,
            unit: e.ingredient.measurement_unit.clone(),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("\n{table}");
    Ok(())
}

/// Write the rendered shopping list. `output` may name a file or an existing
/// directory; the default is `shopping_cart.txt` in the working directory.
pub(crate) fn cmd_cart_download(
    svc: &FoodgramService,
    username: &str,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let user = svc.get_user_by_username(username)?;
    let Some(text) = svc.shopping_list_text(user.id)? else {
        exit_with(EMPTY_CART, json);
    };

    let path = resolve_output(output);
    std::fs::write(&path, &text)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(user_id = user.id, path = %path.display(), "shopping list written");

    if json {
        println!(
            "{}",
            serde_json::json!({ "path": path.display().to_string(), "bytes": text.len() })
        );
    } else {
        println!("Shopping list written to {}", path.display());
    }
    Ok(())
}

fn resolve_output(output: Option<&Path>) -> PathBuf {
    match output {
        Some(p) if p.is_dir() => p.join(FILE_NAME),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(FILE_NAME),
    }
}
