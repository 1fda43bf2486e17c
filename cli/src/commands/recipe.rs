use anyhow::{Context, Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use foodgram_core::models::{
    DEFAULT_MEASUREMENT_UNIT, NewRecipe, NewRecipeIngredient, RecipeFilter,
};
use foodgram_core::service::FoodgramService;

use super::helpers::{IngredientSpec, exit_with, parse_ingredient_spec, truncate};

pub(crate) struct RecipeArgs<'a> {
    pub author: &'a str,
    pub name: &'a str,
    pub cooking_time: i64,
    pub text: &'a str,
    pub ingredients: &'a [String],
    pub tags: &'a [String],
}

/// Resolve ingredient specs against the catalog, creating unknown
/// (name, unit) pairs, and tag slugs to ids.
fn build_recipe(
    svc: &FoodgramService,
    name: &str,
    text: &str,
    cooking_time: i64,
    specs: &[IngredientSpec],
    tags: &[String],
) -> Result<NewRecipe> {
    let mut ingredients = Vec::with_capacity(specs.len());
    for spec in specs {
        let unit = spec.unit.as_deref().unwrap_or(DEFAULT_MEASUREMENT_UNIT);
        let ingredient = svc.ensure_ingredient(&spec.name, unit)?;
        ingredients.push(NewRecipeIngredient {
            ingredient_id: ingredient.id,
            amount: spec.amount,
        });
    }

    let mut tag_ids = Vec::with_capacity(tags.len());
    for slug in tags {
        let tag = svc
            .get_tag_by_slug(slug)?
            .with_context(|| format!("Tag '{slug}' not found"))?;
        tag_ids.push(tag.id);
    }

    Ok(NewRecipe {
        name: name.to_string(),
        text: text.to_string(),
        cooking_time,
        image: None,
        tag_ids,
        ingredients,
    })
}

pub(crate) fn cmd_recipe_create(
    svc: &FoodgramService,
    args: &RecipeArgs,
    json: bool,
) -> Result<()> {
    let author = svc.get_user_by_username(args.author)?;
    let specs = args
        .ingredients
        .iter()
        .map(|s| parse_ingredient_spec(s))
        .collect::<Result<Vec<_>>>()?;
    let recipe = build_recipe(
        svc,
        args.name,
        args.text,
        args.cooking_time,
        &specs,
        args.tags,
    )?;
    let detail = svc.create_recipe(author.id, &recipe)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        let id = detail.id;
        let count = detail.ingredients.len();
        println!("Created recipe: {} (id: {id}, {count} ingredients)", detail.name);
        println!("Add it to a cart with: foodgram cart add <user> {id}");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &FoodgramService, id: i64, json: bool) -> Result<()> {
    let detail = svc.get_recipe(id, None)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let name = &detail.name;
    let minutes = detail.cooking_time;
    let author = detail
        .author
        .as_ref()
        .map_or("(deleted)", |a| a.username.as_str());
    println!("=== {name} ===");
    println!("  Author: {author}  |  Cooking time: {minutes} min");
    if !detail.tags.is_empty() {
        let tags: Vec<&str> = detail.tags.iter().map(|t| t.name.as_str()).collect();
        println!("  Tags: {}", tags.join(", "));
    }

    println!("\n  INGREDIENTS:");
    for ing in &detail.ingredients {
        println!("    {} - {}{}", ing.name, ing.amount, ing.measurement_unit);
    }
    if !detail.text.trim().is_empty() {
        println!("\n{}", detail.text.trim_end());
    }

    Ok(())
}

pub(crate) fn cmd_recipe_list(
    svc: &FoodgramService,
    author: Option<&str>,
    tag: Option<&str>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Author")]
        author: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
        #[tabled(rename = "Time")]
        cooking_time: String,
    }

    let author_id = author
        .map(|username| svc.get_user_by_username(username).map(|u| u.id))
        .transpose()?;
    let filter = RecipeFilter {
        author_id,
        tag_slug: tag.map(String::from),
        ..RecipeFilter::default()
    };
    let recipes = svc.list_recipes(&filter, None)?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        std::process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            name: truncate(&r.name, 30),
            author: r
                .author
                .as_ref()
                .map_or_else(|| "-".to_string(), |a| a.username.clone()),
            ingredients: r.ingredients.len(),
            cooking_time: format!("{} min", r.cooking_time),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_recipe_delete(svc: &FoodgramService, id: i64, json: bool) -> Result<()> {
    if !svc.delete_recipe(id)? {
        exit_with(&format!("Recipe {id} not found"), json);
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted recipe {id}");
    }
    Ok(())
}

/// Ingredients and title read from a Cooklang document. Quantities are
/// rounded to whole units; an ingredient without a numeric quantity gets 0.
struct CooklangRecipe {
    title: Option<String>,
    ingredients: Vec<IngredientSpec>,
}

fn parse_cooklang(input: &str) -> Result<CooklangRecipe> {
    let (recipe_data, _report) = cooklang::parse(input)
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to parse Cooklang file: {e}"))?;

    // No converter, so units stay as written and keep their merge key
    let converter = cooklang::Converter::empty();
    let grouped = recipe_data.group_ingredients(&converter);

    let ingredients = grouped.iter().map(cooklang_ingredient_spec).collect();

    Ok(CooklangRecipe {
        title: recipe_data.metadata.title().map(String::from),
        ingredients,
    })
}

fn round_amount(value: f64) -> i64 {
    value.max(0.0).round() as i64
}

fn cooklang_ingredient_spec(
    gi: &cooklang::ingredient_list::GroupedIngredient<'_>,
) -> IngredientSpec {
    // Only the first quantity of a grouped ingredient is kept
    let (amount, unit) =
        gi.quantity
            .iter()
            .next()
            .map_or((0, None), |qty: &cooklang::Quantity| {
                let amount = match qty.value() {
                    cooklang::Value::Number(n) => round_amount(n.value()),
                    cooklang::Value::Range { start, .. } => round_amount(start.value()),
                    cooklang::Value::Text(t) => t.trim().parse::<f64>().map_or(0, round_amount),
                };
                (amount, qty.unit().map(String::from))
            });

    IngredientSpec {
        name: gi.ingredient.display_name().to_string(),
        amount,
        unit,
    }
}

pub(crate) fn cmd_recipe_import(
    svc: &FoodgramService,
    author: &str,
    file: &std::path::Path,
    name_override: Option<String>,
    cooking_time: i64,
    json: bool,
) -> Result<()> {
    let author = svc.get_user_by_username(author)?;
    let input = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let parsed = parse_cooklang(&input)?;
    if parsed.ingredients.is_empty() {
        bail!("No ingredients found in recipe");
    }

    let name = name_override
        .or(parsed.title)
        .or_else(|| file.file_stem().and_then(|s| s.to_str()).map(String::from))
        .context("Could not determine recipe name. Use --name to specify one")?;

    let recipe = build_recipe(svc, &name, &input, cooking_time, &parsed.ingredients, &[])?;
    let detail = svc.create_recipe(author.id, &recipe)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        let rname = &detail.name;
        let id = detail.id;
        let ing_count = detail.ingredients.len();
        println!("Imported recipe: {rname} (id: {id}, {ing_count} ingredients)");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodgram_core::models::NewUser;

    fn svc_with_author() -> FoodgramService {
        let svc = FoodgramService::new_in_memory().unwrap();
        svc.create_user(
            &NewUser {
                username: "chef".to_string(),
                email: "chef@example.com".to_string(),
                first_name: String::new(),
                last_name: String::new(),
            },
            "hash",
        )
        .unwrap();
        svc
    }

    #[test]
    fn test_round_amount() {
        assert_eq!(round_amount(2.4), 2);
        assert_eq!(round_amount(2.5), 3);
        assert_eq!(round_amount(-1.0), 0);
    }

    #[test]
    fn test_parse_cooklang() {
        let parsed =
            parse_cooklang("Mix @flour{200%g} with @milk{150%ml}.\nAdd @salt{} to taste.\n")
                .unwrap();
        assert_eq!(parsed.ingredients.len(), 3);

        let flour = parsed.ingredients.iter().find(|i| i.name == "flour").unwrap();
        assert_eq!(flour.amount, 200);
        assert_eq!(flour.unit.as_deref(), Some("g"));

        let salt = parsed.ingredients.iter().find(|i| i.name == "salt").unwrap();
        assert_eq!(salt.amount, 0);
        assert!(salt.unit.is_none());
    }

    #[test]
    fn test_build_recipe_creates_missing_ingredients() {
        let svc = svc_with_author();
        let specs = vec![
            parse_ingredient_spec("Мука:200г").unwrap(),
            parse_ingredient_spec("Соль:1").unwrap(),
        ];
        let recipe = build_recipe(&svc, "Хлеб", "", 60, &specs, &[]).unwrap();
        assert_eq!(recipe.ingredients.len(), 2);

        let salt = svc.get_ingredient(recipe.ingredients[1].ingredient_id).unwrap();
        assert_eq!(salt.measurement_unit, DEFAULT_MEASUREMENT_UNIT);

        // Same (name, unit) resolves to the same catalog row
        let again = build_recipe(&svc, "Хлеб 2", "", 60, &specs[..1], &[]).unwrap();
        assert_eq!(again.ingredients[0].ingredient_id, recipe.ingredients[0].ingredient_id);
    }

    #[test]
    fn test_build_recipe_unknown_tag() {
        let svc = svc_with_author();
        let specs = vec![parse_ingredient_spec("Мука:200г").unwrap()];
        let err = build_recipe(&svc, "Хлеб", "", 60, &specs, &["dinner".to_string()]).unwrap_err();
        assert!(err.to_string().contains("dinner"));
    }

    #[test]
    fn test_import_cooklang_file() {
        let svc = svc_with_author();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pancakes.cook");
        std::fs::write(&path, "Whisk @egg{2} into @milk{0.5%l}.\n").unwrap();

        cmd_recipe_import(&svc, "chef", &path, None, 20, true).unwrap();

        let recipes = svc.list_recipes(&RecipeFilter::default(), None).unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].name, "pancakes");
        let milk = recipes[0].ingredients.iter().find(|i| i.name == "milk").unwrap();
        assert_eq!(milk.amount, 1);
        assert_eq!(milk.measurement_unit, "l");
    }
}
