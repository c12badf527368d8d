use crate::core::category::{Category, CategoryClassifier};
use crate::core::metadata::CaptionProcessor;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub const HEADER: [&str; 5] = ["Filename", "Description", "Category 1", "Category 2", "Keywords"];

/// One upload row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub filename: String,
    pub description: String,
    pub categories: (Category, Category),
    pub keywords: Vec<String>,
}

impl ListingRecord {
    /// Derive description, keywords and categories from a raw caption.
    pub fn from_caption(
        filename: String,
        caption: &str,
        processor: &CaptionProcessor,
        classifier: &CategoryClassifier,
    ) -> Self {
        Self {
            filename,
            description: processor.build_description(caption),
            categories: classifier.choose_categories(caption),
            keywords: processor.extract_keywords(caption),
        }
    }

    pub fn keywords_field(&self) -> String {
        self.keywords.join(", ")
    }
}

/// Write the header and one row per record. Fields are quoted as needed.
pub fn write_records<W: Write>(writer: W, records: &[ListingRecord]) -> Result<(), ListingError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;
    for record in records {
        csv.write_record([
            record.filename.as_str(),
            record.description.as_str(),
            record.categories.0.label(),
            record.categories.1.label(),
            record.keywords_field().as_str(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, records: &[ListingRecord]) -> Result<(), ListingError> {
    let file = File::create(path)?;
    write_records(file, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(filename: &str) -> ListingRecord {
        ListingRecord {
            filename: filename.to_string(),
            description: "A cat sleeping".to_string(),
            categories: (Category::AnimalsWildlife, Category::Nature),
            keywords: vec!["cat".to_string(), "sleeping".to_string()],
        }
    }

    #[test]
    fn test_from_caption() {
        let policy = crate::config::Policy::default();
        let processor = CaptionProcessor::new(&policy);
        let classifier =
            CategoryClassifier::new(&policy.category_rules, policy.default_categories);

        let record = ListingRecord::from_caption(
            "tulips.jpg".to_string(),
            "A field of red flowers under a blue sky",
            &processor,
            &classifier,
        );
        assert_eq!(record.filename, "tulips.jpg");
        assert!(record.description.starts_with("A field of red flowers"));
        assert_eq!(record.categories, (Category::Nature, Category::ParksOutdoor));
        assert_eq!(&record.keywords[..5], &["field", "red", "flowers", "under", "blue"]);
        assert_eq!(record.keywords.len(), 20);
    }

    #[test]
    fn test_header_and_rows() {
        let mut out = Vec::new();
        write_records(&mut out, &[record("cat.jpg")]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Filename,Description,Category 1,Category 2,Keywords\n\
             cat.jpg,A cat sleeping,Animals/Wildlife,Nature,\"cat, sleeping\"\n"
        );
    }

    #[test]
    fn test_fields_are_escaped() {
        let mut out = Vec::new();
        write_records(&mut out, &[record("say \"cheese\", please.jpg")]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"say \"\"cheese\"\", please.jpg\""));

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "say \"cheese\", please.jpg");
        assert_eq!(&row[4], "cat, sleeping");
    }

    #[test]
    fn test_empty_output_still_has_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.csv");
        write_csv(&path, &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Filename,Description,Category 1,Category 2,Keywords\n"
        );
    }
}
