use std::path::Path;

use anyhow::{Result, bail};
use tracing::info;

use crate::db::Database;
use crate::ingredient_import::{self, IngredientImportSummary};
use crate::models::{
    Ingredient, NewIngredient, NewRecipe, NewTag, NewUser, RecipeDetail, RecipeFilter,
    RecipeSummary, Tag, User, validate_ingredient_data, validate_new_recipe,
};
use crate::shopping_list::{CartSnapshot, ShoppingList};

/// Anything that can produce a user's cart with ingredient lines loaded.
///
/// Implementations must return recipes and their lines in a stable order
/// (the database returns ascending primary keys); the shopping list's
/// first-seen ordering is only reproducible on top of that.
pub trait CartSource {
    fn cart_snapshot(&self, user_id: i64) -> Result<CartSnapshot>;
}

impl CartSource for Database {
    fn cart_snapshot(&self, user_id: i64) -> Result<CartSnapshot> {
        Database::cart_snapshot(self, user_id)
    }
}

/// Build the aggregated list for a user, or `None` when their cart holds no
/// recipes. The emptiness check runs on the fully loaded snapshot.
pub fn build_shopping_list(source: &dyn CartSource, user_id: i64) -> Result<Option<ShoppingList>> {
    let snapshot = source.cart_snapshot(user_id)?;
    if snapshot.is_empty() {
        return Ok(None);
    }
    let list = ShoppingList::from_snapshot(&snapshot);
    info!(
        user_id,
        recipes = list.recipe_count,
        entries = list.entries.len(),
        "built shopping list"
    );
    Ok(Some(list))
}

pub struct FoodgramService {
    db: Database,
}

impl FoodgramService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    // --- Users ---

    pub fn create_user(&self, user: &NewUser, token_hash: &str) -> Result<User> {
        if user.username.trim().is_empty() {
            bail!("username must not be empty");
        }
        if !user.email.contains('@') {
            bail!("'{}' is not a valid email address", user.email);
        }
        self.db.create_user(user, token_hash)
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.db.get_user_by_id(id)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.db.get_user_by_username(username)
    }

    pub fn user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>> {
        self.db.get_user_by_token_hash(token_hash)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    // --- Ingredients ---

    pub fn add_ingredient(&self, name: &str, measurement_unit: &str) -> Result<Ingredient> {
        validate_ingredient_data(name, measurement_unit)?;
        self.db.insert_ingredient(&NewIngredient {
            name: name.trim().to_string(),
            measurement_unit: measurement_unit.trim().to_string(),
        })
    }

    /// Like `add_ingredient`, but returns the existing row for a known (name, unit).
    pub fn ensure_ingredient(&self, name: &str, measurement_unit: &str) -> Result<Ingredient> {
        validate_ingredient_data(name, measurement_unit)?;
        self.db.upsert_ingredient(&NewIngredient {
            name: name.trim().to_string(),
            measurement_unit: measurement_unit.trim().to_string(),
        })
    }

    pub fn get_ingredient(&self, id: i64) -> Result<Ingredient> {
        self.db.get_ingredient_by_id(id)
    }

    pub fn search_ingredients(&self, query: &str) -> Result<Vec<Ingredient>> {
        self.db.search_ingredients(query)
    }

    pub fn list_ingredients(&self) -> Result<Vec<Ingredient>> {
        self.db.list_ingredients()
    }

    pub fn import_ingredients_csv(
        &self,
        csv_data: &str,
        dry_run: bool,
    ) -> Result<IngredientImportSummary> {
        let rows = ingredient_import::parse_ingredients_csv(csv_data.as_bytes())?;
        ingredient_import::import_ingredients(&self.db, &rows, dry_run)
    }

    // --- Tags ---

    pub fn add_tag(&self, tag: &NewTag) -> Result<Tag> {
        if tag.slug.is_empty()
            || !tag
                .slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            bail!("Invalid slug '{}'", tag.slug);
        }
        self.db.insert_tag(tag)
    }

    pub fn get_tag(&self, id: i64) -> Result<Tag> {
        self.db.get_tag_by_id(id)
    }

    pub fn get_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        self.db.get_tag_by_slug(slug)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.db.list_tags()
    }

    // --- Recipes ---

    pub fn create_recipe(&self, author_id: i64, recipe: &NewRecipe) -> Result<RecipeDetail> {
        validate_new_recipe(recipe)?;
        let detail = self.db.create_recipe(author_id, recipe)?;
        info!(recipe_id = detail.id, author_id, "recipe created");
        Ok(detail)
    }

    pub fn replace_recipe(
        &self,
        recipe_id: i64,
        recipe: &NewRecipe,
        viewer: Option<i64>,
    ) -> Result<RecipeDetail> {
        validate_new_recipe(recipe)?;
        self.db.replace_recipe(recipe_id, recipe, viewer)
    }

    pub fn recipe_author_id(&self, recipe_id: i64) -> Result<Option<i64>> {
        self.db.get_recipe_author_id(recipe_id)
    }

    pub fn get_recipe(&self, recipe_id: i64, viewer: Option<i64>) -> Result<RecipeDetail> {
        self.db.get_recipe_detail(recipe_id, viewer)
    }

    pub fn get_recipe_summary(&self, recipe_id: i64) -> Result<RecipeSummary> {
        self.db.get_recipe_summary(recipe_id)
    }

    pub fn list_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<i64>,
    ) -> Result<Vec<RecipeDetail>> {
        self.db.list_recipes(filter, viewer)
    }

    pub fn count_recipes(&self) -> Result<i64> {
        self.db.count_recipes()
    }

    pub fn delete_recipe(&self, recipe_id: i64) -> Result<bool> {
        self.db.delete_recipe(recipe_id)
    }

    // --- Favorites ---

    /// `Ok(None)` when the recipe was already a favorite.
    pub fn add_favorite(&self, user_id: i64, recipe_id: i64) -> Result<Option<RecipeSummary>> {
        let summary = self.db.get_recipe_summary(recipe_id)?;
        Ok(self.db.add_favorite(user_id, recipe_id)?.then_some(summary))
    }

    pub fn remove_favorite(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        self.db.remove_favorite(user_id, recipe_id)
    }

    pub fn list_favorites(&self, user_id: i64) -> Result<Vec<RecipeSummary>> {
        self.db.list_favorites(user_id)
    }

    // --- Shopping cart ---

    /// `Ok(None)` when the recipe was already in the cart.
    pub fn add_to_cart(&self, user_id: i64, recipe_id: i64) -> Result<Option<RecipeSummary>> {
        let summary = self.db.get_recipe_summary(recipe_id)?;
        Ok(self.db.add_to_cart(user_id, recipe_id)?.then_some(summary))
    }

    pub fn remove_from_cart(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        self.db.remove_from_cart(user_id, recipe_id)
    }

    pub fn list_cart(&self, user_id: i64) -> Result<Vec<RecipeSummary>> {
        self.db.list_cart(user_id)
    }

    pub fn shopping_list(&self, user_id: i64) -> Result<Option<ShoppingList>> {
        build_shopping_list(&self.db, user_id)
    }

    /// Rendered download body, or `None` for an empty cart.
    pub fn shopping_list_text(&self, user_id: i64) -> Result<Option<String>> {
        Ok(self.shopping_list(user_id)?.map(|list| list.render()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRecipeIngredient;
    use crate::shopping_list::{CartRecipe, FOOTER, HEADER, IngredientLine, IngredientRef};

    struct FixedCart {
        snapshot: CartSnapshot,
    }

    impl CartSource for FixedCart {
        fn cart_snapshot(&self, _user_id: i64) -> Result<CartSnapshot> {
            Ok(self.snapshot.clone())
        }
    }

    fn svc_with_user() -> (FoodgramService, User) {
        let svc = FoodgramService::new_in_memory().unwrap();
        let user = svc
            .create_user(
                &NewUser {
                    username: "cook".to_string(),
                    email: "cook@example.com".to_string(),
                    first_name: String::new(),
                    last_name: String::new(),
                },
                "hash",
            )
            .unwrap();
        (svc, user)
    }

    fn recipe(name: &str, lines: Vec<(i64, i64)>) -> NewRecipe {
        NewRecipe {
            name: name.to_string(),
            text: "Mix".to_string(),
            cooking_time: 10,
            image: None,
            tag_ids: vec![],
            ingredients: lines
                .into_iter()
                .map(|(ingredient_id, amount)| NewRecipeIngredient {
                    ingredient_id,
                    amount,
                })
                .collect(),
        }
    }

    #[test]
    fn test_build_shopping_list_from_any_source() {
        let source = FixedCart {
            snapshot: CartSnapshot {
                recipes: vec![CartRecipe {
                    recipe_id: 1,
                    name: "Toast".to_string(),
                    lines: vec![IngredientLine {
                        ingredient: IngredientRef::new("Bread", "pcs"),
                        quantity: 2,
                    }],
                }],
            },
        };
        let list = build_shopping_list(&source, 7).unwrap().unwrap();
        assert_eq!(list.recipe_count, 1);
        assert_eq!(list.entries[0].total_quantity, 2);

        let empty = FixedCart {
            snapshot: CartSnapshot::default(),
        };
        assert!(build_shopping_list(&empty, 7).unwrap().is_none());
    }

    #[test]
    fn test_shopping_list_text_end_to_end() {
        let (svc, user) = svc_with_user();
        let flour = svc.add_ingredient("Мука", "г").unwrap();
        let milk = svc.add_ingredient("Молоко", "мл").unwrap();

        let a = svc
            .create_recipe(user.id, &recipe("Хлеб", vec![(flour.id, 200)]))
            .unwrap();
        let b = svc
            .create_recipe(user.id, &recipe("Блины", vec![(flour.id, 300), (milk.id, 150)]))
            .unwrap();

        assert!(svc.shopping_list_text(user.id).unwrap().is_none());

        svc.add_to_cart(user.id, a.id).unwrap();
        svc.add_to_cart(user.id, b.id).unwrap();

        let text = svc.shopping_list_text(user.id).unwrap().unwrap();
        assert_eq!(
            text,
            format!("{HEADER}Мука - 500г.\r\nМолоко - 150мл.\r\n{FOOTER}")
        );
    }

    #[test]
    fn test_cart_with_recipe_is_not_empty() {
        let (svc, user) = svc_with_user();
        let egg = svc.add_ingredient("Яйцо", "шт").unwrap();
        let r = svc
            .create_recipe(user.id, &recipe("Яйцо варёное", vec![(egg.id, 0)]))
            .unwrap();
        svc.add_to_cart(user.id, r.id).unwrap();

        let list = svc.shopping_list(user.id).unwrap().unwrap();
        assert_eq!(list.entries.len(), 1);
        assert_eq!(list.entries[0].total_quantity, 0);
    }

    #[test]
    fn test_add_to_cart_twice() {
        let (svc, user) = svc_with_user();
        let egg = svc.add_ingredient("Яйцо", "шт").unwrap();
        let r = svc
            .create_recipe(user.id, &recipe("Омлет", vec![(egg.id, 3)]))
            .unwrap();

        let first = svc.add_to_cart(user.id, r.id).unwrap();
        assert_eq!(first.unwrap().name, "Омлет");
        assert!(svc.add_to_cart(user.id, r.id).unwrap().is_none());
        assert!(svc.add_to_cart(user.id, 999).is_err());
    }

    #[test]
    fn test_add_favorite_twice() {
        let (svc, user) = svc_with_user();
        let egg = svc.add_ingredient("Яйцо", "шт").unwrap();
        let r = svc
            .create_recipe(user.id, &recipe("Омлет", vec![(egg.id, 3)]))
            .unwrap();

        assert!(svc.add_favorite(user.id, r.id).unwrap().is_some());
        assert!(svc.add_favorite(user.id, r.id).unwrap().is_none());
        assert!(svc.remove_favorite(user.id, r.id).unwrap());
    }

    #[test]
    fn test_create_recipe_is_validated() {
        let (svc, user) = svc_with_user();
        let err = svc
            .create_recipe(user.id, &recipe("Пусто", vec![]))
            .unwrap_err();
        assert!(err.to_string().contains("at least one ingredient"));
        assert_eq!(svc.count_recipes().unwrap(), 0);
    }

    #[test]
    fn test_create_user_validation() {
        let svc = FoodgramService::new_in_memory().unwrap();
        let bad = NewUser {
            username: "x".to_string(),
            email: "not-an-email".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        assert!(svc.create_user(&bad, "h").is_err());
    }

    #[test]
    fn test_add_tag_rejects_bad_slug() {
        let svc = FoodgramService::new_in_memory().unwrap();
        let tag = NewTag {
            name: "Ужин".to_string(),
            slug: "у жин".to_string(),
            color: "#8775D2".to_string(),
        };
        assert!(svc.add_tag(&tag).is_err());
    }

    #[test]
    fn test_ensure_ingredient_reuses_existing() {
        let svc = FoodgramService::new_in_memory().unwrap();
        let a = svc.ensure_ingredient("Соль", "г").unwrap();
        let b = svc.ensure_ingredient(" Соль ", "г").unwrap();
        assert_eq!(a.id, b.id);
        assert!(svc.add_ingredient("Соль", "г").is_err());
    }

    #[test]
    fn test_import_ingredients_csv() {
        let svc = FoodgramService::new_in_memory().unwrap();
        let summary = svc
            .import_ingredients_csv("name,measurement_unit\nмука,г\nсоль,г\n", false)
            .unwrap();
        assert_eq!(summary.ingredients_created, 2);
        assert_eq!(svc.list_ingredients().unwrap().len(), 2);
    }
}
