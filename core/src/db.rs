use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value};
use tracing::debug;

use crate::models::{
    Ingredient, NewIngredient, NewRecipe, NewTag, NewUser, RecipeDetail, RecipeFilter,
    RecipeIngredient, RecipeSummary, Tag, User,
};
use crate::shopping_list::{CartRecipe, CartSnapshot, IngredientLine, IngredientRef};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, created_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL UNIQUE,
                    first_name TEXT NOT NULL DEFAULT '',
                    last_name TEXT NOT NULL DEFAULT '',
                    token_hash TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    measurement_unit TEXT NOT NULL,
                    UNIQUE (name, measurement_unit)
                );

                CREATE TABLE IF NOT EXISTS tags (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    slug TEXT NOT NULL UNIQUE,
                    color TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    author_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                    name TEXT NOT NULL,
                    text TEXT NOT NULL,
                    cooking_time INTEGER NOT NULL,
                    image TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_tags (
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (recipe_id, tag_id)
                );

                CREATE TABLE IF NOT EXISTS recipe_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
                    amount INTEGER NOT NULL CHECK (amount >= 0)
                );

                CREATE TABLE IF NOT EXISTS favorites (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    UNIQUE (user_id, recipe_id)
                );

                CREATE TABLE IF NOT EXISTS shopping_cart (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    UNIQUE (user_id, recipe_id)
                );

                CREATE INDEX IF NOT EXISTS idx_ingredients_name ON ingredients(name);
                CREATE INDEX IF NOT EXISTS idx_recipes_author ON recipes(author_id);
                CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe ON recipe_ingredients(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_shopping_cart_user ON shopping_cart(user_id);
                CREATE INDEX IF NOT EXISTS idx_favorites_user ON favorites(user_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    // Expects USER_COLUMNS order
    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
        Ok(Ingredient {
            id: row.get(0)?,
            name: row.get(1)?,
            measurement_unit: row.get(2)?,
        })
    }

    fn tag_from_row(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            color: row.get(3)?,
        })
    }

    fn summary_from_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeSummary> {
        Ok(RecipeSummary {
            id: row.get(0)?,
            name: row.get(1)?,
            image: row.get(2)?,
            cooking_time: row.get(3)?,
        })
    }

    // --- Users ---

    pub fn create_user(&self, user: &NewUser, token_hash: &str) -> Result<User> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO users (username, email, first_name, last_name, token_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.username,
                    user.email,
                    user.first_name,
                    user.last_name,
                    token_hash,
                    now,
                ],
            )
            .with_context(|| format!("Failed to create user '{}'", user.username))?;
        let id = self.conn.last_insert_rowid();
        self.get_user_by_id(id)
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                Self::user_from_row,
            )
            .context("User not found")
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                Self::user_from_row,
            )
            .with_context(|| format!("User '{username}' not found"))
    }

    pub fn get_user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE token_hash = ?1"),
                params![token_hash],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // --- Ingredients ---

    pub fn insert_ingredient(&self, ingredient: &NewIngredient) -> Result<Ingredient> {
        self.conn
            .execute(
                "INSERT INTO ingredients (name, measurement_unit) VALUES (?1, ?2)",
                params![ingredient.name, ingredient.measurement_unit],
            )
            .with_context(|| {
                format!(
                    "Failed to insert ingredient '{}' ({})",
                    ingredient.name, ingredient.measurement_unit
                )
            })?;
        let id = self.conn.last_insert_rowid();
        self.get_ingredient_by_id(id)
    }

    /// Return the ingredient with this exact (name, unit), creating it if missing.
    pub fn upsert_ingredient(&self, ingredient: &NewIngredient) -> Result<Ingredient> {
        if let Some(existing) =
            self.find_ingredient(&ingredient.name, &ingredient.measurement_unit)?
        {
            return Ok(existing);
        }
        self.insert_ingredient(ingredient)
    }

    pub fn find_ingredient(
        &self,
        name: &str,
        measurement_unit: &str,
    ) -> Result<Option<Ingredient>> {
        let ingredient = self
            .conn
            .query_row(
                "SELECT id, name, measurement_unit FROM ingredients
                 WHERE name = ?1 AND measurement_unit = ?2",
                params![name, measurement_unit],
                Self::ingredient_from_row,
            )
            .optional()?;
        Ok(ingredient)
    }

    pub fn get_ingredient_by_id(&self, id: i64) -> Result<Ingredient> {
        self.conn
            .query_row(
                "SELECT id, name, measurement_unit FROM ingredients WHERE id = ?1",
                params![id],
                Self::ingredient_from_row,
            )
            .context("Ingredient not found")
    }

    pub fn list_ingredients(&self) -> Result<Vec<Ingredient>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, measurement_unit FROM ingredients ORDER BY name, id")?;
        let ingredients = stmt
            .query_map([], Self::ingredient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ingredients)
    }

    /// Case-insensitive search by name; names starting with the query come
    /// before names that only contain it.
    ///
    /// Filtering happens here rather than in SQL because SQLite's `LIKE`
    /// only folds ASCII case and the catalog is mostly Cyrillic.
    pub fn search_ingredients(&self, query: &str) -> Result<Vec<Ingredient>> {
        let needle = query.trim().to_lowercase();
        let all = self.list_ingredients()?;
        if needle.is_empty() {
            return Ok(all);
        }
        let (mut prefix, contains): (Vec<Ingredient>, Vec<Ingredient>) = all
            .into_iter()
            .filter(|i| i.name.to_lowercase().contains(&needle))
            .partition(|i| i.name.to_lowercase().starts_with(&needle));
        prefix.extend(contains);
        Ok(prefix)
    }

    // --- Tags ---

    pub fn insert_tag(&self, tag: &NewTag) -> Result<Tag> {
        self.conn
            .execute(
                "INSERT INTO tags (name, slug, color) VALUES (?1, ?2, ?3)",
                params![tag.name, tag.slug, tag.color],
            )
            .with_context(|| format!("Failed to insert tag '{}'", tag.slug))?;
        let id = self.conn.last_insert_rowid();
        self.get_tag_by_id(id)
    }

    pub fn get_tag_by_id(&self, id: i64) -> Result<Tag> {
        self.conn
            .query_row(
                "SELECT id, name, slug, color FROM tags WHERE id = ?1",
                params![id],
                Self::tag_from_row,
            )
            .context("Tag not found")
    }

    pub fn get_tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let tag = self
            .conn
            .query_row(
                "SELECT id, name, slug, color FROM tags WHERE slug = ?1",
                params![slug],
                Self::tag_from_row,
            )
            .optional()?;
        Ok(tag)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, slug, color FROM tags ORDER BY id")?;
        let tags = stmt
            .query_map([], Self::tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    // --- Recipes ---

    fn insert_recipe_edges(conn: &Connection, recipe_id: i64, recipe: &NewRecipe) -> Result<()> {
        for tag_id in &recipe.tag_ids {
            conn.execute(
                "INSERT OR IGNORE INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)",
                params![recipe_id, tag_id],
            )
            .with_context(|| format!("Tag {tag_id} not found"))?;
        }
        for ing in &recipe.ingredients {
            conn.execute(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?1, ?2, ?3)",
                params![recipe_id, ing.ingredient_id, ing.amount],
            )
            .with_context(|| format!("Ingredient {} not found", ing.ingredient_id))?;
        }
        Ok(())
    }

    pub fn create_recipe(&self, author_id: i64, recipe: &NewRecipe) -> Result<RecipeDetail> {
        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO recipes (author_id, name, text, cooking_time, image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                author_id,
                recipe.name.trim(),
                recipe.text,
                recipe.cooking_time,
                recipe.image,
                now,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        Self::insert_recipe_edges(&tx, id, recipe)?;
        tx.commit()?;
        self.get_recipe_detail(id, Some(author_id))
    }

    /// Overwrite a recipe's fields, tags, and ingredient lines.
    pub fn replace_recipe(
        &self,
        recipe_id: i64,
        recipe: &NewRecipe,
        viewer: Option<i64>,
    ) -> Result<RecipeDetail> {
        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE recipes SET name = ?1, text = ?2, cooking_time = ?3, image = COALESCE(?4, image),
             updated_at = ?5 WHERE id = ?6",
            params![
                recipe.name.trim(),
                recipe.text,
                recipe.cooking_time,
                recipe.image,
                now,
                recipe_id,
            ],
        )?;
        if rows == 0 {
            anyhow::bail!("Recipe {recipe_id} not found");
        }
        tx.execute(
            "DELETE FROM recipe_tags WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        tx.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        Self::insert_recipe_edges(&tx, recipe_id, recipe)?;
        tx.commit()?;
        self.get_recipe_detail(recipe_id, viewer)
    }

    /// `Ok(None)` when the recipe exists but its author was deleted.
    pub fn get_recipe_author_id(&self, recipe_id: i64) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT author_id FROM recipes WHERE id = ?1",
                params![recipe_id],
                |row| row.get(0),
            )
            .context("Recipe not found")
    }

    pub fn get_recipe_summary(&self, recipe_id: i64) -> Result<RecipeSummary> {
        self.conn
            .query_row(
                "SELECT id, name, image, cooking_time FROM recipes WHERE id = ?1",
                params![recipe_id],
                Self::summary_from_row,
            )
            .context("Recipe not found")
    }

    pub fn get_recipe_tags(&self, recipe_id: i64) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.name, t.slug, t.color
             FROM recipe_tags rt JOIN tags t ON rt.tag_id = t.id
             WHERE rt.recipe_id = ?1
             ORDER BY t.id",
        )?;
        let tags = stmt
            .query_map(params![recipe_id], Self::tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    pub fn get_recipe_ingredients(&self, recipe_id: i64) -> Result<Vec<RecipeIngredient>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.name, i.measurement_unit, ri.amount
             FROM recipe_ingredients ri
             JOIN ingredients i ON ri.ingredient_id = i.id
             WHERE ri.recipe_id = ?1
             ORDER BY ri.id",
        )?;
        let ingredients = stmt
            .query_map(params![recipe_id], |row| {
                Ok(RecipeIngredient {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    measurement_unit: row.get(2)?,
                    amount: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ingredients)
    }

    /// Full recipe view. `viewer` drives the favorite and cart flags; an
    /// anonymous viewer always sees both as false.
    pub fn get_recipe_detail(&self, recipe_id: i64, viewer: Option<i64>) -> Result<RecipeDetail> {
        let (author_id, name, text, cooking_time, image, created_at): (
            Option<i64>,
            String,
            String,
            i64,
            Option<String>,
            String,
        ) = self
            .conn
            .query_row(
                "SELECT author_id, name, text, cooking_time, image, created_at FROM recipes WHERE id = ?1",
                params![recipe_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .context("Recipe not found")?;

        let author = author_id.map(|id| self.get_user_by_id(id)).transpose()?;
        let (is_favorited, is_in_shopping_cart) = match viewer {
            Some(user_id) => (
                self.is_favorited(user_id, recipe_id)?,
                self.is_in_cart(user_id, recipe_id)?,
            ),
            None => (false, false),
        };

        Ok(RecipeDetail {
            id: recipe_id,
            author,
            name,
            text,
            cooking_time,
            image,
            tags: self.get_recipe_tags(recipe_id)?,
            ingredients: self.get_recipe_ingredients(recipe_id)?,
            is_favorited,
            is_in_shopping_cart,
            created_at,
        })
    }

    /// Newest first. The favorite and cart filters only apply when there is
    /// a viewer to apply them to.
    pub fn list_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<i64>,
    ) -> Result<Vec<RecipeDetail>> {
        let mut sql = String::from("SELECT DISTINCT r.id FROM recipes r");
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(slug) = &filter.tag_slug {
            sql.push_str(
                " JOIN recipe_tags rt ON rt.recipe_id = r.id JOIN tags t ON t.id = rt.tag_id",
            );
            clauses.push("t.slug = ?");
            args.push(Value::Text(slug.clone()));
        }
        if let Some(author_id) = filter.author_id {
            clauses.push("r.author_id = ?");
            args.push(Value::Integer(author_id));
        }
        if let Some(user_id) = viewer {
            if filter.is_favorited {
                clauses.push("r.id IN (SELECT recipe_id FROM favorites WHERE user_id = ?)");
                args.push(Value::Integer(user_id));
            }
            if filter.is_in_shopping_cart {
                clauses.push("r.id IN (SELECT recipe_id FROM shopping_cart WHERE user_id = ?)");
                args.push(Value::Integer(user_id));
            }
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY r.id DESC LIMIT ? OFFSET ?");
        let (limit, offset) = filter.window();
        args.push(Value::Integer(limit));
        args.push(Value::Integer(offset));

        let ids: Vec<i64> = {
            let mut stmt = self.conn.prepare(&sql)?;
            stmt.query_map(params_from_iter(args), |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?
        };
        ids.into_iter()
            .map(|id| self.get_recipe_detail(id, viewer))
            .collect()
    }

    pub fn count_recipes(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn delete_recipe(&self, recipe_id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        // Edges cascade with foreign_keys on; clear them anyway so an
        // older database opened without the pragma stays consistent.
        for table in ["recipe_ingredients", "recipe_tags", "favorites", "shopping_cart"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE recipe_id = ?1"),
                params![recipe_id],
            )?;
        }
        let rows = tx.execute("DELETE FROM recipes WHERE id = ?1", params![recipe_id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // --- Favorites ---

    /// Returns false when the recipe was already a favorite.
    pub fn add_favorite(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO favorites (user_id, recipe_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, recipe_id, now],
        )?;
        Ok(rows > 0)
    }

    pub fn remove_favorite(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND recipe_id = ?2",
            params![user_id, recipe_id],
        )?;
        Ok(rows > 0)
    }

    pub fn is_favorited(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = ?1 AND recipe_id = ?2)",
            params![user_id, recipe_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn list_favorites(&self, user_id: i64) -> Result<Vec<RecipeSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.name, r.image, r.cooking_time
             FROM favorites f JOIN recipes r ON f.recipe_id = r.id
             WHERE f.user_id = ?1
             ORDER BY f.id",
        )?;
        let recipes = stmt
            .query_map(params![user_id], Self::summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    // --- Shopping cart ---

    /// Returns false when the recipe was already in the cart.
    pub fn add_to_cart(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO shopping_cart (user_id, recipe_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, recipe_id, now],
        )?;
        Ok(rows > 0)
    }

    pub fn remove_from_cart(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM shopping_cart WHERE user_id = ?1 AND recipe_id = ?2",
            params![user_id, recipe_id],
        )?;
        Ok(rows > 0)
    }

    pub fn is_in_cart(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM shopping_cart WHERE user_id = ?1 AND recipe_id = ?2)",
            params![user_id, recipe_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn list_cart(&self, user_id: i64) -> Result<Vec<RecipeSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.name, r.image, r.cooking_time
             FROM shopping_cart sc JOIN recipes r ON sc.recipe_id = r.id
             WHERE sc.user_id = ?1
             ORDER BY r.id",
        )?;
        let recipes = stmt
            .query_map(params![user_id], Self::summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    /// Every recipe in the user's cart with its ingredient lines loaded.
    ///
    /// Ordering contract: recipes by ascending recipe id, lines within a
    /// recipe by ascending `recipe_ingredients` id (insertion order). The
    /// shopping list's first-seen ordering depends on it.
    pub fn cart_snapshot(&self, user_id: i64) -> Result<CartSnapshot> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.name, i.name, i.measurement_unit, ri.amount
             FROM shopping_cart sc
             JOIN recipes r ON r.id = sc.recipe_id
             LEFT JOIN recipe_ingredients ri ON ri.recipe_id = r.id
             LEFT JOIN ingredients i ON i.id = ri.ingredient_id
             WHERE sc.user_id = ?1
             ORDER BY r.id, ri.id",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut recipes: Vec<CartRecipe> = Vec::new();
        for (recipe_id, recipe_name, name, unit, amount) in rows {
            if recipes.last().is_none_or(|r| r.recipe_id != recipe_id) {
                recipes.push(CartRecipe {
                    recipe_id,
                    name: recipe_name,
                    lines: Vec::new(),
                });
            }
            if let (Some(name), Some(unit), Some(amount), Some(current)) =
                (name, unit, amount, recipes.last_mut())
            {
                current.lines.push(IngredientLine {
                    ingredient: IngredientRef::new(name, unit),
                    quantity: amount,
                });
            }
        }

        let snapshot = CartSnapshot { recipes };
        debug!(
            user_id,
            recipes = snapshot.recipes.len(),
            lines = snapshot.line_count(),
            "loaded cart snapshot"
        );
        Ok(snapshot)
    }
}
