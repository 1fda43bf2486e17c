use anyhow::Result;

use foodgram_core::service::FoodgramService;

use super::helpers::{exit_with, print_recipe_table};

pub(crate) fn cmd_favorite_add(
    svc: &FoodgramService,
    username: &str,
    recipe_id: i64,
    json: bool,
) -> Result<()> {
    let user = svc.get_user_by_username(username)?;
    let Some(summary) = svc.add_favorite(user.id, recipe_id)? else {
        exit_with(&format!("Recipe {recipe_id} is already in favorites"), json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Added {} to {username}'s favorites", summary.name);
    }
    Ok(())
}

pub(crate) fn cmd_favorite_remove(
    svc: &FoodgramService,
    username: &str,
    recipe_id: i64,
    json: bool,
) -> Result<()> {
    let user = svc.get_user_by_username(username)?;
    if !svc.remove_favorite(user.id, recipe_id)? {
        exit_with(&format!("Recipe {recipe_id} is not in favorites"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "removed": recipe_id }));
    } else {
        println!("Removed recipe {recipe_id} from {username}'s favorites");
    }
    Ok(())
}

pub(crate) fn cmd_favorite_list(svc: &FoodgramService, username: &str, json: bool) -> Result<()> {
    let user = svc.get_user_by_username(username)?;
    let favorites = svc.list_favorites(user.id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&favorites)?);
        return Ok(());
    }
    if favorites.is_empty() {
        exit_with("No favorites yet", false);
    }
    print_recipe_table(&favorites);
    Ok(())
}
