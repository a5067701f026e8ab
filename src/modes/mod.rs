//! Mode resolution: enumeration, request parsing, matching, switching and the menu cache

pub mod catalog;
pub mod matcher;
pub mod menu;
pub mod parser;
pub mod switcher;

pub use catalog::{CatalogSnapshot, DisplayModes, ModeCatalog};
pub use matcher::best_match;
pub use menu::{DisplayMenu, MenuEntry, MenuFilter, MenuModel};
pub use parser::parse_resolution;
pub use switcher::ModeSwitcher;
