use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use foodgram_core::models::NewTag;
use foodgram_core::service::FoodgramService;

use super::helpers::exit_with;

pub(crate) fn cmd_tag_add(svc: &FoodgramService, tag: &NewTag, json: bool) -> Result<()> {
    let created = svc.add_tag(tag)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        println!("Added tag: {} [{}] (id: {})", created.name, created.slug, created.id);
    }
    Ok(())
}

pub(crate) fn cmd_tag_list(svc: &FoodgramService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct TagRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Slug")]
        slug: String,
        #[tabled(rename = "Color")]
        color: String,
    }

    let tags = svc.list_tags()?;
    if tags.is_empty() {
        exit_with("No tags found", json);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }

    let rows: Vec<TagRow> = tags
        .into_iter()
        .map(|t| TagRow {
            id: t.id,
            name: t.name,
            slug: t.slug,
            color: t.color,
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}
