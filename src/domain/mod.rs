pub mod links;
pub mod rules;
pub mod tile;
