use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use crate::auth::{generate_token, hash_token};
use foodgram_core::models::NewUser;
use foodgram_core::service::FoodgramService;

pub(crate) fn cmd_user_add(
    svc: &FoodgramService,
    user: &NewUser,
    json: bool,
) -> Result<()> {
    let token = generate_token();
    let created = svc.create_user(user, &hash_token(&token))?;
    if json {
        println!(
            "{}",
            serde_json::json!({ "user": created, "token": token })
        );
    } else {
        let username = &created.username;
        let id = created.id;
        println!("Created user: {username} (id: {id})");
        println!("API token (shown once): {token}");
        println!("Include in requests: Authorization: Token {token}");
    }
    Ok(())
}

pub(crate) fn cmd_user_list(svc: &FoodgramService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct UserRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Username")]
        username: String,
        #[tabled(rename = "Email")]
        email: String,
        #[tabled(rename = "Name")]
        name: String,
    }

    let users = svc.list_users()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }
    if users.is_empty() {
        eprintln!("No users yet. Add one with: foodgram user add <username> <email>");
        return Ok(());
    }

    let rows: Vec<UserRow> = users
        .into_iter()
        .map(|u| UserRow {
            id: u.id,
            name: format!("{} {}", u.first_name, u.last_name).trim().to_string(),
            username: u.username,
            email: u.email,
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}
