pub mod db;
pub mod ingredient_import;
pub mod models;
pub mod service;
pub mod shopping_list;
