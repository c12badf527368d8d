use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Marketplace category labels. Serialized with their display label, e.g.
/// `"Animals/Wildlife"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Abstract,
    #[serde(rename = "Animals/Wildlife")]
    AnimalsWildlife,
    Arts,
    #[serde(rename = "Backgrounds/Textures")]
    BackgroundsTextures,
    #[serde(rename = "Beauty/Fashion")]
    BeautyFashion,
    #[serde(rename = "Buildings/Landmarks")]
    BuildingsLandmarks,
    #[serde(rename = "Business/Finance")]
    BusinessFinance,
    Education,
    #[serde(rename = "Food and drink")]
    FoodAndDrink,
    #[serde(rename = "Healthcare/Medical")]
    HealthcareMedical,
    Holidays,
    Industrial,
    Interiors,
    Nature,
    Objects,
    #[serde(rename = "Parks/Outdoor")]
    ParksOutdoor,
    People,
    Religion,
    Science,
    #[serde(rename = "Signs/Symbols")]
    SignsSymbols,
    #[serde(rename = "Sports/Recreation")]
    SportsRecreation,
    Technology,
    Transportation,
    Vintage,
}

impl Category {
    pub const ALL: [Category; 24] = [
        Category::Abstract,
        Category::AnimalsWildlife,
        Category::Arts,
        Category::BackgroundsTextures,
        Category::BeautyFashion,
        Category::BuildingsLandmarks,
        Category::BusinessFinance,
        Category::Education,
        Category::FoodAndDrink,
        Category::HealthcareMedical,
        Category::Holidays,
        Category::Industrial,
        Category::Interiors,
        Category::Nature,
        Category::Objects,
        Category::ParksOutdoor,
        Category::People,
        Category::Religion,
        Category::Science,
        Category::SignsSymbols,
        Category::SportsRecreation,
        Category::Technology,
        Category::Transportation,
        Category::Vintage,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Abstract => "Abstract",
            Category::AnimalsWildlife => "Animals/Wildlife",
            Category::Arts => "Arts",
            Category::BackgroundsTextures => "Backgrounds/Textures",
            Category::BeautyFashion => "Beauty/Fashion",
            Category::BuildingsLandmarks => "Buildings/Landmarks",
            Category::BusinessFinance => "Business/Finance",
            Category::Education => "Education",
            Category::FoodAndDrink => "Food and drink",
            Category::HealthcareMedical => "Healthcare/Medical",
            Category::Holidays => "Holidays",
            Category::Industrial => "Industrial",
            Category::Interiors => "Interiors",
            Category::Nature => "Nature",
            Category::Objects => "Objects",
            Category::ParksOutdoor => "Parks/Outdoor",
            Category::People => "People",
            Category::Religion => "Religion",
            Category::Science => "Science",
            Category::SignsSymbols => "Signs/Symbols",
            Category::SportsRecreation => "Sports/Recreation",
            Category::Technology => "Technology",
            Category::Transportation => "Transportation",
            Category::Vintage => "Vintage",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// One row of the rule table: if `trigger` occurs anywhere in the caption,
/// the caption is filed under `categories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub trigger: String,
    pub categories: [Category; 2],
}

impl CategoryRule {
    pub fn new(trigger: &str, first: Category, second: Category) -> Self {
        Self {
            trigger: trigger.to_string(),
            categories: [first, second],
        }
    }
}

pub fn default_rules() -> Vec<CategoryRule> {
    use Category::*;
    vec![
        CategoryRule::new("flower", Nature, ParksOutdoor),
        CategoryRule::new("plant", Nature, Objects),
        CategoryRule::new("animal", AnimalsWildlife, Nature),
        CategoryRule::new("bird", AnimalsWildlife, Nature),
        CategoryRule::new("person", People, Objects),
        CategoryRule::new("face", People, Objects),
        CategoryRule::new("temple", BuildingsLandmarks, Religion),
        CategoryRule::new("building", BuildingsLandmarks, Objects),
        CategoryRule::new("firework", Holidays, ParksOutdoor),
        CategoryRule::new("texture", BackgroundsTextures, Abstract),
    ]
}

pub const DEFAULT_CATEGORIES: (Category, Category) = (Category::Objects, Category::Nature);

/// First-match-wins classifier over an ordered rule table.
pub struct CategoryClassifier<'a> {
    rules: &'a [CategoryRule],
    fallback: (Category, Category),
}

impl<'a> CategoryClassifier<'a> {
    pub fn new(rules: &'a [CategoryRule], fallback: (Category, Category)) -> Self {
        Self { rules, fallback }
    }

    /// Rules are matched as plain substrings, so "plant" also fires on
    /// "planted" and "face" on "surface".
    pub fn choose_categories(&self, text: &str) -> (Category, Category) {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| text.contains(&rule.trigger))
            .map(|rule| (rule.categories[0], rule.categories[1]))
            .unwrap_or(self.fallback)
    }
}
