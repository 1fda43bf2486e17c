use std::collections::HashMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

pub const HEADER: &str = "\nДля ваших кулинарных подвигов необходимо преобрести:\r\n\n";
pub const FOOTER: &str = "\n\nУдачных покупок и вкусных блюд!\n";
pub const FILE_NAME: &str = "shopping_cart.txt";
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Merge key for the shopping list. Two lines merge only when both the name
/// and the unit match exactly; there is no cross-unit conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngredientRef {
    pub name: String,
    pub measurement_unit: String,
}

impl IngredientRef {
    pub fn new(name: impl Into<String>, measurement_unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            measurement_unit: measurement_unit.into(),
        }
    }
}

/// One ingredient occurrence inside one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub ingredient: IngredientRef,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartRecipe {
    pub recipe_id: i64,
    pub name: String,
    pub lines: Vec<IngredientLine>,
}

/// Recipes currently in a user's cart, in the order the storage layer
/// returned them. Built per request and dropped after rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CartSnapshot {
    pub recipes: Vec<CartRecipe>,
}

impl CartSnapshot {
    /// True when the cart holds no recipes at all. A cart holding recipes
    /// without ingredient lines is not empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.recipes.iter().map(|r| r.lines.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedEntry {
    pub ingredient: IngredientRef,
    pub total_quantity: i64,
}

/// Structured form of the shopping list for JSON consumers.
#[derive(Debug, Clone, Serialize)]
pub struct ShoppingList {
    pub recipe_count: usize,
    pub entries: Vec<AggregatedEntry>,
}

impl ShoppingList {
    #[must_use]
    pub fn from_snapshot(cart: &CartSnapshot) -> Self {
        Self {
            recipe_count: cart.recipes.len(),
            entries: aggregate(cart),
        }
    }

    #[must_use]
    pub fn render(&self) -> String {
        render(&self.entries)
    }
}

/// Sum quantities per (name, unit) across every line of every recipe.
///
/// Entries come out in first-seen order: the position of a key is fixed the
/// first time it is met while scanning recipes and their lines front to back.
/// Quantities are summed as stored, so zero totals stay in the list and a
/// negative quantity is not clamped.
#[must_use]
pub fn aggregate(cart: &CartSnapshot) -> Vec<AggregatedEntry> {
    let mut positions: HashMap<&IngredientRef, usize> = HashMap::new();
    let mut entries: Vec<AggregatedEntry> = Vec::new();

    for line in cart.recipes.iter().flat_map(|r| r.lines.iter()) {
        if let Some(&idx) = positions.get(&line.ingredient) {
            entries[idx].total_quantity += line.quantity;
        } else {
            positions.insert(&line.ingredient, entries.len());
            entries.push(AggregatedEntry {
                ingredient: line.ingredient.clone(),
                total_quantity: line.quantity,
            });
        }
    }

    entries
}

/// Render the downloadable text body: header, one `name - {qty}{unit}.` line
/// per entry, footer. The unit is glued to the quantity with no space.
#[must_use]
pub fn render(entries: &[AggregatedEntry]) -> String {
    let mut body = String::from(HEADER);
    for entry in entries {
        let name = &entry.ingredient.name;
        let total = entry.total_quantity;
        let unit = &entry.ingredient.measurement_unit;
        let _ = write!(body, "{name} - {total}{unit}.\r\n");
    }
    body.push_str(FOOTER);
    body
}
