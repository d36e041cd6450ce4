//! Recipe catalog.
//!
//! The catalog is an external, read-only collaborator: the engine only ever
//! calls [`RecipeCatalog::lookup`]. [`StaticCatalog::standard`] carries the
//! four house flans.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Simulated milliseconds per minute of real recipe time.
const MS_PER_RECIPE_MINUTE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub base_duration_ms: u64,
    pub required_temperature: i64,
    pub ingredients: BTreeMap<String, String>,
}

pub trait RecipeCatalog: Send + Sync {
    fn lookup(&self, recipe_id: &str) -> Option<Recipe>;

    /// Every recipe, sorted by id.
    fn list(&self) -> Vec<Recipe>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    recipes: BTreeMap<String, Recipe>,
}

impl StaticCatalog {
    pub fn new<I>(recipes: I) -> Self
    where
        I: IntoIterator<Item = Recipe>,
    {
        Self {
            recipes: recipes.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn standard() -> Self {
        Self::new([
            recipe(
                "flan_vanille",
                "Vanilla Flan",
                "🍮",
                40,
                150,
                &[("eggs", "4"), ("milk", "500mL"), ("sugar", "100g"), ("vanilla", "1 pod")],
            ),
            recipe(
                "flan_orange",
                "Orange Flan",
                "🍊",
                45,
                150,
                &[
                    ("eggs", "4"),
                    ("milk", "500mL"),
                    ("sugar", "100g"),
                    ("oranges", "2"),
                    ("vanilla", "1 pod"),
                ],
            ),
            recipe(
                "flan_chocolat",
                "Chocolate Flan",
                "🍫",
                50,
                160,
                &[("eggs", "4"), ("milk", "500mL"), ("sugar", "80g"), ("chocolate", "150g")],
            ),
            recipe(
                "flan_caramel",
                "Caramel Flan",
                "🥧",
                55,
                150,
                &[("eggs", "6"), ("milk", "750mL"), ("sugar", "150g"), ("caramel", "100g")],
            ),
        ])
    }
}

impl RecipeCatalog for StaticCatalog {
    fn lookup(&self, recipe_id: &str) -> Option<Recipe> {
        self.recipes.get(recipe_id).cloned()
    }

    fn list(&self) -> Vec<Recipe> {
        self.recipes.values().cloned().collect()
    }
}

fn recipe(
    id: &str,
    name: &str,
    emoji: &str,
    minutes: u64,
    required_temperature: i64,
    ingredients: &[(&str, &str)],
) -> Recipe {
    Recipe {
        id: id.to_string(),
        name: name.to_string(),
        emoji: emoji.to_string(),
        base_duration_ms: minutes * MS_PER_RECIPE_MINUTE,
        required_temperature,
        ingredients: ingredients
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}
