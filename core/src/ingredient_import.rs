use std::collections::HashSet;
use std::io::Read;

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::db::Database;
use crate::models::{DEFAULT_MEASUREMENT_UNIT, NewIngredient, validate_ingredient_data};

/// A single row parsed from an ingredients CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientRow {
    pub name: String,
    pub measurement_unit: String,
}

/// Summary of what an ingredient import would do / did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngredientImportSummary {
    pub rows_parsed: usize,
    pub ingredients_created: usize,
    pub ingredients_existing: usize,
}

/// Parse an ingredients CSV from any reader.
///
/// Expected header: `name,measurement_unit`. A blank unit falls back to
/// the default unit.
pub fn parse_ingredients_csv<R: Read>(reader: R) -> Result<Vec<IngredientRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let Some(idx_name) = col("name") else {
        bail!("Missing required column: name");
    };
    let idx_unit = col("measurement_unit");

    let mut rows = Vec::new();
    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

        let name = record.get(idx_name).unwrap_or("").trim().to_string();
        if name.is_empty() {
            continue;
        }
        let unit = idx_unit
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_MEASUREMENT_UNIT)
            .to_string();

        validate_ingredient_data(&name, &unit)
            .with_context(|| format!("Invalid ingredient on CSV row {}", line_num + 2))?;

        rows.push(IngredientRow {
            name,
            measurement_unit: unit,
        });
    }

    Ok(rows)
}

/// Import parsed rows into the catalog. Existing (name, unit) pairs are
/// counted, not duplicated. When `dry_run` is true, nothing is written.
pub fn import_ingredients(
    db: &Database,
    rows: &[IngredientRow],
    dry_run: bool,
) -> Result<IngredientImportSummary> {
    let mut summary = IngredientImportSummary {
        rows_parsed: rows.len(),
        ..IngredientImportSummary::default()
    };
    // Repeats inside the same file count as existing after the first
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for row in rows {
        let key = (row.name.as_str(), row.measurement_unit.as_str());
        let exists = !seen.insert(key) || db.find_ingredient(key.0, key.1)?.is_some();
        if exists {
            summary.ingredients_existing += 1;
            continue;
        }
        if !dry_run {
            db.insert_ingredient(&NewIngredient {
                name: row.name.clone(),
                measurement_unit: row.measurement_unit.clone(),
            })?;
        }
        summary.ingredients_created += 1;
    }

    info!(
        rows = summary.rows_parsed,
        created = summary.ingredients_created,
        existing = summary.ingredients_existing,
        dry_run,
        "ingredient import finished"
    );
    Ok(summary)
}
