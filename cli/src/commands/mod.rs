mod cart;
mod favorite;
mod helpers;
mod ingredient;
mod recipe;
mod tag;
mod user;

pub(crate) use cart::{cmd_cart_add, cmd_cart_download, cmd_cart_remove, cmd_cart_show};
pub(crate) use favorite::{cmd_favorite_add, cmd_favorite_list, cmd_favorite_remove};
pub(crate) use ingredient::{cmd_ingredient_add, cmd_ingredient_import, cmd_ingredient_list};
pub(crate) use recipe::{
    RecipeArgs, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_import, cmd_recipe_list,
    cmd_recipe_show,
};
pub(crate) use tag::{cmd_tag_add, cmd_tag_list};
pub(crate) use user::{cmd_user_add, cmd_user_list};
