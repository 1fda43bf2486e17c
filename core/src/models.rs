use std::collections::HashSet;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Unit assigned to an ingredient when none is given.
pub const DEFAULT_MEASUREMENT_UNIT: &str = "г.";

pub const MAX_INGREDIENT_NAME_LEN: usize = 30;
pub const MAX_AMOUNT: i64 = 100_000;
pub const MAX_COOKING_TIME: i64 = 1440;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub slug: String,
    pub color: String,
}

/// An ingredient edge as shown inside a recipe: `id` is the ingredient id.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeIngredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub author: Option<User>,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub created_at: String,
}

/// Short recipe form returned after adding to favorites or the cart.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub cooking_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipeIngredient {
    pub ingredient_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    pub image: Option<String>,
    pub tag_ids: Vec<i64>,
    pub ingredients: Vec<NewRecipeIngredient>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author_id: Option<i64>,
    pub tag_slug: Option<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl RecipeFilter {
    /// Offset and row limit for SQL, with `page` counted from 1.
    #[must_use]
    pub fn window(&self) -> (i64, i64) {
        let limit = self.limit.filter(|l| *l > 0).unwrap_or(-1);
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);
        let offset = if limit > 0 {
            (page - 1).saturating_mul(limit)
        } else {
            0
        };
        (limit, offset)
    }
}

pub fn validate_ingredient_data(name: &str, measurement_unit: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Ingredient name must not be empty");
    }
    if name.chars().count() > MAX_INGREDIENT_NAME_LEN {
        bail!("Ingredient name must be at most {MAX_INGREDIENT_NAME_LEN} characters");
    }
    if measurement_unit.trim().is_empty() {
        bail!("Measurement unit must not be empty");
    }
    Ok(())
}

pub fn validate_amount(amount: i64) -> Result<()> {
    if !(0..=MAX_AMOUNT).contains(&amount) {
        bail!("Ingredient amount must be between 0 and {MAX_AMOUNT} (got {amount})");
    }
    Ok(())
}

pub fn validate_new_recipe(recipe: &NewRecipe) -> Result<()> {
    if recipe.name.trim().is_empty() {
        bail!("Recipe name must not be empty");
    }
    if !(1..=MAX_COOKING_TIME).contains(&recipe.cooking_time) {
        bail!("cooking_time must be between 1 and {MAX_COOKING_TIME} minutes");
    }
    if recipe.ingredients.is_empty() {
        bail!("A recipe needs at least one ingredient");
    }
    let mut seen = HashSet::new();
    for ing in &recipe.ingredients {
        if !seen.insert(ing.ingredient_id) {
            bail!("Ingredient {} is listed more than once", ing.ingredient_id);
        }
        validate_amount(ing.amount)?;
    }
    Ok(())
}
