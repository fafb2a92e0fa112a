mod helpers;
mod inventory;
mod plan;
mod recipe;
mod transfer;

pub(crate) use inventory::{
    cmd_ingredient_delete, cmd_ingredient_list, cmd_inventory_import, cmd_inventory_list,
    cmd_inventory_set, cmd_stock,
};
pub(crate) use plan::{cmd_plan_add, cmd_plan_check, cmd_plan_list};
pub(crate) use recipe::{
    cmd_recipe_check, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_import, cmd_recipe_list,
    cmd_recipe_show,
};
pub(crate) use transfer::{cmd_export, cmd_import, cmd_seed};
