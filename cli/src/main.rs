mod auth;
mod commands;
mod config;
mod server;
mod telemetry;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    RecipeArgs, cmd_cart_add, cmd_cart_download, cmd_cart_remove, cmd_cart_show,
    cmd_favorite_add, cmd_favorite_list, cmd_favorite_remove, cmd_ingredient_add,
    cmd_ingredient_import, cmd_ingredient_list, cmd_recipe_create, cmd_recipe_delete,
    cmd_recipe_import, cmd_recipe_list, cmd_recipe_show, cmd_tag_add, cmd_tag_list, cmd_user_add,
    cmd_user_list,
};
use crate::config::Config;
use foodgram_core::models::{NewTag, NewUser};
use foodgram_core::service::FoodgramService;

#[derive(Parser)]
#[command(
    name = "foodgram",
    version,
    about = "Recipes, favorites and a shopping list built from your cart"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// Manage users and their API tokens
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage the ingredient catalog
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Manage recipe tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Create, import and browse recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Manage a user's favorite recipes
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
    /// Manage a user's shopping cart and download the shopping list
    Cart {
        #[command(subcommand)]
        command: CartCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user and print a new API token
    Add {
        username: String,
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient to the catalog
    Add {
        /// Ingredient name
        name: String,
        /// Measurement unit (e.g. "г", "мл", "шт.")
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List or search the catalog
    List {
        /// Search query (names starting with it come first)
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import ingredients from a CSV file with `name,measurement_unit` columns
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// Add a tag
    Add {
        name: String,
        slug: String,
        /// Hex color, e.g. "#E26C2D"
        color: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tags
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create a recipe
    Create {
        /// Author username
        author: String,
        /// Recipe name
        name: String,
        /// Cooking time in minutes
        #[arg(short, long)]
        time: i64,
        /// Ingredient as "<name>:<amount><unit>", e.g. "Мука:200г" (repeatable)
        #[arg(short, long = "ingredient", required = true)]
        ingredients: Vec<String>,
        /// Recipe description
        #[arg(long, default_value = "")]
        text: String,
        /// Tag slug (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a recipe from a Cooklang (.cook) file
    Import {
        /// Author username
        author: String,
        /// Path to the .cook file
        file: PathBuf,
        /// Recipe name override (defaults to metadata title or filename)
        #[arg(long)]
        name: Option<String>,
        /// Cooking time in minutes
        #[arg(short, long, default_value = "30")]
        time: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with its ingredients
    Show {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recipes, newest first
    List {
        /// Only recipes by this author
        #[arg(long)]
        author: Option<String>,
        /// Only recipes with this tag slug
        #[arg(long)]
        tag: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Add a recipe to a user's favorites
    Add {
        user: String,
        recipe_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a recipe from a user's favorites
    Remove {
        user: String,
        recipe_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a user's favorites
    List {
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CartCommands {
    /// Add a recipe to a user's shopping cart
    Add {
        user: String,
        recipe_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a recipe from a user's shopping cart
    Remove {
        user: String,
        recipe_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the cart and the aggregated shopping list
    Show {
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the shopping list to a text file
    Download {
        user: String,
        /// File or directory to write to (default: ./shopping_cart.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    telemetry::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = FoodgramService::new(&config.db_path)?;

    match cli.command {
        Commands::Serve { port, bind } => server::start_server(svc, port, &bind).await,
        Commands::User { command } => match command {
            UserCommands::Add {
                username,
                email,
                first_name,
                last_name,
                json,
            } => cmd_user_add(
                &svc,
                &NewUser {
                    username,
                    email,
                    first_name,
                    last_name,
                },
                json,
            ),
            UserCommands::List { json } => cmd_user_list(&svc, json),
        },
        Commands::Ingredient { command } => match command {
            IngredientCommands::Add { name, unit, json } => {
                cmd_ingredient_add(&svc, &name, &unit, json)
            }
            IngredientCommands::List { search, json } => {
                cmd_ingredient_list(&svc, search.as_deref(), json)
            }
            IngredientCommands::Import {
                file,
                dry_run,
                json,
            } => cmd_ingredient_import(&svc, &file, dry_run, json),
        },
        Commands::Tag { command } => match command {
            TagCommands::Add {
                name,
                slug,
                color,
                json,
            } => cmd_tag_add(&svc, &NewTag { name, slug, color }, json),
            TagCommands::List { json } => cmd_tag_list(&svc, json),
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Create {
                author,
                name,
                time,
                ingredients,
                text,
                tags,
                json,
            } => cmd_recipe_create(
                &svc,
                &RecipeArgs {
                    author: &author,
                    name: &name,
                    cooking_time: time,
                    text: &text,
                    ingredients: &ingredients,
                    tags: &tags,
                },
                json,
            ),
            RecipeCommands::Import {
                author,
                file,
                name,
                time,
                json,
            } => cmd_recipe_import(&svc, &author, &file, name, time, json),
            RecipeCommands::Show { id, json } => cmd_recipe_show(&svc, id, json),
            RecipeCommands::List { author, tag, json } => {
                cmd_recipe_list(&svc, author.as_deref(), tag.as_deref(), json)
            }
            RecipeCommands::Delete { id, json } => cmd_recipe_delete(&svc, id, json),
        },
        Commands::Favorite { command } => match command {
            FavoriteCommands::Add {
                user,
                recipe_id,
                json,
            } => cmd_favorite_add(&svc, &user, recipe_id, json),
            FavoriteCommands::Remove {
                user,
                recipe_id,
                json,
            } => cmd_favorite_remove(&svc, &user, recipe_id, json),
            FavoriteCommands::List { user, json } => cmd_favorite_list(&svc, &user, json),
        },
        Commands::Cart { command } => match command {
            CartCommands::Add {
                user,
                recipe_id,
                json,
            } => cmd_cart_add(&svc, &user, recipe_id, json),
            CartCommands::Remove {
                user,
                recipe_id,
                json,
            } => cmd_cart_remove(&svc, &user, recipe_id, json),
            CartCommands::Show { user, json } => cmd_cart_show(&svc, &user, json),
            CartCommands::Download { user, output, json } => {
                cmd_cart_download(&svc, &user, output.as_deref(), json)
            }
        },
    }
}
