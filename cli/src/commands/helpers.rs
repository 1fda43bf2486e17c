use anyhow::{Context, Result, bail};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use foodgram_core::models::RecipeSummary;

/// One `--ingredient` argument: `"<name>:<amount><unit>"` or `"<name>:<amount> <unit>"`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct IngredientSpec {
    pub name: String,
    pub amount: i64,
    pub unit: Option<String>,
}

pub(crate) fn parse_ingredient_spec(s: &str) -> Result<IngredientSpec> {
    let (name, quantity) = s
        .rsplit_once(':')
        .with_context(|| format!("Invalid ingredient '{s}'. Use '<name>:<amount><unit>'"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid ingredient '{s}': name is empty");
    }
    let (amount, unit) = split_number_unit(quantity.trim())
        .with_context(|| format!("Invalid amount in '{s}'. Use e.g. 'Мука:200г'"))?;
    Ok(IngredientSpec {
        name: name.to_string(),
        amount,
        unit,
    })
}

/// Split "200г." or "2 шт" into (200, Some("г.")) or (2, Some("шт")); a bare
/// number has no unit.
fn split_number_unit(s: &str) -> Option<(i64, Option<String>)> {
    let idx = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if idx == 0 {
        return None;
    }
    let (num_part, unit_part) = s.split_at(idx);
    let amount: i64 = num_part.parse().ok()?;
    let unit = unit_part.trim();
    Some((amount, (!unit.is_empty()).then(|| unit.to_string())))
}

pub(crate) fn print_recipe_table(recipes: &[RecipeSummary]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Time")]
        cooking_time: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            name: truncate(&r.name, 40),
            cooking_time: format!("{} min", r.cooking_time),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a soft failure (nothing to show, nothing to change) and exit with code 2.
pub(crate) fn exit_with(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    std::process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
