use crate::core::category::{self, Category, CategoryRule};
use crate::core::metadata;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {message}")]
    Invalid { message: String },
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "so", "yet",
    "of", "in", "on", "at", "by", "for", "to", "from", "with", "without",
    "this", "that", "these", "those", "it", "its", "their", "his", "her",
    "is", "are", "was", "were", "be", "been", "being",
    "has", "have", "had", "do", "does", "did",
    "photo", "photograph", "photography", "image", "picture",
    "shot", "capture", "captured",
    "high", "quality", "best", "beautiful", "nice",
    "scene", "view", "perspective", "angle",
    "background", "foreground",
];

const ENRICHMENT: &[&str] = &[
    "natural", "outdoor", "texture", "detail", "environment",
    "realistic", "scenic", "composition", "visual", "surface",
];

const FILLER: &[&str] = &[
    "aesthetic", "documentation", "travel", "design",
    "material", "context", "pattern", "background",
    "color", "light", "creative", "artistic",
    "closeup", "element", "style", "daylight",
];

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Curation and metadata policy. Built once per run and shared read-only.
///
/// Every field can be overridden from a JSON file; missing fields keep their
/// defaults. List order is significant for `enrichment`, `filler` and
/// `category_rules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Policy {
    pub min_pixels: u64,
    pub min_keywords: usize,
    pub max_keywords: usize,
    pub min_description_words: usize,
    pub description_filler: String,
    pub image_extensions: Vec<String>,
    pub stopwords: Vec<String>,
    pub enrichment: Vec<String>,
    pub filler: Vec<String>,
    pub category_rules: Vec<CategoryRule>,
    pub default_categories: (Category, Category),
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_pixels: 4_000_000,
            min_keywords: 20,
            max_keywords: 50,
            min_description_words: 10,
            description_filler: "natural outdoor environment with realistic visual detail"
                .to_string(),
            image_extensions: strings(&["jpg", "jpeg", "png"]),
            stopwords: strings(STOPWORDS),
            enrichment: strings(ENRICHMENT),
            filler: strings(FILLER),
            category_rules: category::default_rules(),
            default_categories: category::DEFAULT_CATEGORIES,
        }
    }
}

impl Policy {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let policy: Policy = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        policy.normalized().validate()
    }

    /// Lowercase everything that is compared against normalized caption text.
    fn normalized(mut self) -> Self {
        let lower = |v: &mut Vec<String>| {
            for s in v.iter_mut() {
                *s = s.trim().to_lowercase();
            }
        };
        lower(&mut self.image_extensions);
        lower(&mut self.stopwords);
        lower(&mut self.enrichment);
        lower(&mut self.filler);
        for ext in self.image_extensions.iter_mut() {
            *ext = ext.trim_start_matches('.').to_string();
        }
        for rule in self.category_rules.iter_mut() {
            rule.trigger = rule.trigger.to_lowercase();
        }
        self.description_filler = metadata::normalize(&self.description_filler);
        self
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        let invalid =
            |message: String| -> Result<Self, ConfigError> { Err(ConfigError::Invalid { message }) };

        if self.max_keywords < self.min_keywords {
            return invalid(format!(
                "max_keywords ({}) is below min_keywords ({})",
                self.max_keywords, self.min_keywords
            ));
        }
        if self.description_filler.split_whitespace().next().is_none() {
            return invalid("description_filler must contain at least one word".to_string());
        }
        if self.image_extensions.is_empty() {
            return invalid("image_extensions must not be empty".to_string());
        }
        if let Some(rule) = self.category_rules.iter().find(|r| r.trigger.is_empty()) {
            return invalid(format!("category rule {:?} has an empty trigger", rule.categories));
        }

        let padding: HashSet<&str> = self
            .enrichment
            .iter()
            .chain(self.filler.iter())
            .map(String::as_str)
            .filter(|w| !w.is_empty())
            .collect();
        if padding.len() < self.min_keywords {
            return invalid(format!(
                "enrichment and filler provide {} distinct terms, need at least {}",
                padding.len(),
                self.min_keywords
            ));
        }

        Ok(self)
    }

    pub fn stopword_set(&self) -> HashSet<&str> {
        self.stopwords.iter().map(String::as_str).collect()
    }

    pub fn accepts_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.image_extensions.iter().any(|e| *e == ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_policy_is_valid() {
        let policy = Policy::default().validate().unwrap();
        assert_eq!(policy.min_pixels, 4_000_000);
        assert_eq!(policy.category_rules.len(), 10);
        assert_eq!(policy.category_rules[0].trigger, "flower");
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let file = write_config(r#"{ "min_pixels": 100, "image_extensions": [".JPG", "webp"] }"#);
        let policy = Policy::from_file(file.path()).unwrap();

        assert_eq!(policy.min_pixels, 100);
        assert_eq!(policy.min_keywords, 20);
        assert!(policy.accepts_extension("JPG"));
        assert!(policy.accepts_extension("webp"));
        assert!(!policy.accepts_extension("png"));
    }

    #[test]
    fn test_rule_override_preserves_order() {
        let file = write_config(
            r#"{ "category_rules": [
                { "trigger": "Boat", "categories": ["Transportation", "Nature"] },
                { "trigger": "sea", "categories": ["Nature", "Parks/Outdoor"] }
            ] }"#,
        );
        let policy = Policy::from_file(file.path()).unwrap();
        let triggers: Vec<&str> = policy
            .category_rules
            .iter()
            .map(|r| r.trigger.as_str())
            .collect();
        assert_eq!(triggers, vec!["boat", "sea"]);
    }

    #[test]
    fn test_rejects_unknown_category() {
        let file = write_config(
            r#"{ "category_rules": [ { "trigger": "x", "categories": ["Nope", "Nature"] } ] }"#,
        );
        assert!(matches!(
            Policy::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_rejects_unreachable_keyword_minimum() {
        let file = write_config(r#"{ "enrichment": ["a", "b"], "filler": ["b", "c"] }"#);
        assert!(matches!(
            Policy::from_file(file.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_rejects_inverted_keyword_bounds() {
        let policy = Policy {
            max_keywords: 5,
            ..Policy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_description_filler() {
        let policy = Policy {
            description_filler: "   ".to_string(),
            ..Policy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_description_filler_is_normalized() {
        let file = write_config(r#"{ "description_filler": "Natural, OUTDOOR light!" }"#);
        let policy = Policy::from_file(file.path()).unwrap();
        assert_eq!(policy.description_filler, "natural outdoor light");

        let file = write_config(r#"{ "description_filler": "?!" }"#);
        assert!(matches!(
            Policy::from_file(file.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Policy::from_file(Path::new("/definitely/not/here.json")),
            Err(ConfigError::Read { .. })
        ));
    }
}
