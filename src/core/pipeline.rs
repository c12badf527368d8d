use crate::config::Policy;
use crate::core::caption::{Captioner, load_rgb};
use crate::core::category::CategoryClassifier;
use crate::core::duplicate::{DuplicateResolver, Verdict};
use crate::core::hash::HashService;
use crate::core::listing::{self, ListingError, ListingRecord};
use crate::core::metadata::CaptionProcessor;
use crate::core::resolution::{Resolution, ResolutionFilter};
use crate::core::scanner::{ScanError, file_name, list_images};
use crate::history::{History, HistoryError, MoveEntry, Stage};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Failed to write listings: {0}")]
    Listing(#[from] ListingError),
}

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Destination already exists: {0}")]
    DestinationExists(String),

    #[error("Failed to move {from} -> {to}: {source}")]
    Io {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },
}

/// The four directories assets travel between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    pub source: PathBuf,
    pub valid: PathBuf,
    pub too_small: PathBuf,
    pub duplicates: PathBuf,
}

impl Buckets {
    pub fn under(root: &Path) -> Self {
        Self {
            source: root.join("images"),
            valid: root.join("images_valid"),
            too_small: root.join("too_small"),
            duplicates: root.join("duplicates"),
        }
    }
}

/// Moves files between buckets and remembers what it moved. In dry-run mode
/// it only reports where files would go.
struct BucketMover {
    dry_run: bool,
    moves: Vec<MoveEntry>,
}

impl BucketMover {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            moves: Vec::new(),
        }
    }

    fn relocate(&mut self, path: &Path, dest_dir: &Path) -> Result<PathBuf, MoveError> {
        let dest = dest_dir.join(path.file_name().unwrap_or_default());
        if self.dry_run {
            return Ok(dest);
        }
        if dest.exists() {
            return Err(MoveError::DestinationExists(dest.display().to_string()));
        }

        let io_err = |source: std::io::Error| MoveError::Io {
            from: path.display().to_string(),
            to: dest.display().to_string(),
            source,
        };
        match fs::rename(path, &dest) {
            Ok(()) => {}
            // rename cannot cross filesystems; fall back to copy + delete.
            Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
                // The asset must end up in exactly one bucket.
                if let Err(e) = fs::copy(path, &dest).and_then(|_| fs::remove_file(path)) {
                    let _ = fs::remove_file(&dest);
                    return Err(io_err(e));
                }
            }
            Err(e) => return Err(io_err(e)),
        }

        self.moves.push(MoveEntry {
            from: path.to_path_buf(),
            to: dest.clone(),
        });
        Ok(dest)
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct FilterReport {
    pub valid: Vec<String>,
    pub too_small: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateMove {
    pub moved: String,
    pub kept: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct DedupReport {
    pub scanned: usize,
    pub duplicates: Vec<DuplicateMove>,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ListingReport {
    pub records: Vec<ListingRecord>,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    pub filter: FilterReport,
    pub dedup: DedupReport,
    pub listing: ListingReport,
}

/// Filter -> dedup -> caption -> listing, over one directory snapshot.
pub struct Pipeline<'a> {
    policy: &'a Policy,
    buckets: Buckets,
    hash_service: HashService,
    history: Option<History>,
    dry_run: bool,
    show_progress: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(policy: &'a Policy, buckets: Buckets) -> Self {
        Self {
            policy,
            buckets,
            hash_service: HashService::new(),
            history: None,
            dry_run: false,
            show_progress: false,
        }
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    fn ensure_dirs(&self, dirs: &[&Path]) -> Result<(), PipelineError> {
        if self.dry_run {
            return Ok(());
        }
        for dir in dirs {
            fs::create_dir_all(dir).map_err(|source| PipelineError::CreateDir {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    fn journal(&self, stage: Stage, mover: BucketMover) -> Result<(), PipelineError> {
        if let (Some(history), false) = (&self.history, mover.dry_run) {
            history.append(stage, mover.moves)?;
        }
        Ok(())
    }

    /// Move every source image into the valid or too-small bucket. Images
    /// whose dimensions cannot be read stay where they are.
    pub fn filter_images(&self) -> Result<FilterReport, PipelineError> {
        let images = list_images(&self.buckets.source, self.policy)?;
        self.ensure_dirs(&[self.buckets.valid.as_path(), self.buckets.too_small.as_path()])?;

        let filter = ResolutionFilter::new(self.policy.min_pixels);
        let mut mover = BucketMover::new(self.dry_run);
        let mut report = FilterReport::default();

        for path in images {
            let name = file_name(&path);
            let resolution = match filter.inspect(&path) {
                Ok(resolution) => resolution,
                Err(e) => {
                    log::warn!("{}", e);
                    report.errors.push(name);
                    continue;
                }
            };

            let dest_dir = match resolution {
                Resolution::Valid => &self.buckets.valid,
                Resolution::TooSmall => &self.buckets.too_small,
            };
            if let Err(e) = mover.relocate(&path, dest_dir) {
                log::warn!("{}", e);
                report.errors.push(name);
                continue;
            }

            match resolution {
                Resolution::Valid => report.valid.push(name),
                Resolution::TooSmall => report.too_small.push(name),
            }
        }

        self.journal(Stage::Filter, mover)?;
        Ok(report)
    }

    /// Keep one image per content fingerprint in the valid bucket and move
    /// the rest to the duplicates bucket.
    ///
    /// Hashing runs in parallel; verdicts are applied sequentially in
    /// directory-listing order.
    pub fn remove_duplicates(&self) -> Result<DedupReport, PipelineError> {
        let images = list_images(&self.buckets.valid, self.policy)?;
        self.ensure_dirs(&[self.buckets.duplicates.as_path()])?;

        let fingerprints = self.hash_service.fingerprint_batch(&images);
        let mut resolver = DuplicateResolver::new();
        let mut mover = BucketMover::new(self.dry_run);
        let mut report = DedupReport {
            scanned: images.len(),
            ..Default::default()
        };

        for (path, fingerprint) in fingerprints {
            let name = file_name(&path);
            let fingerprint = match fingerprint {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    log::warn!("Duplicate check error on {}: {}", name, e);
                    report.errors.push(name);
                    continue;
                }
            };

            match resolver.observe(&name, fingerprint.clone()) {
                Verdict::Kept => {}
                Verdict::Duplicate { kept } => match mover.relocate(&path, &self.buckets.duplicates) {
                    Ok(_) => report.duplicates.push(DuplicateMove { moved: name, kept }),
                    Err(e) => {
                        log::warn!("Duplicate check error on {}: {}", name, e);
                        report.errors.push(name);
                    }
                },
                Verdict::Supersedes { replaced } => {
                    let replaced_path = self.buckets.valid.join(&replaced);
                    match mover.relocate(&replaced_path, &self.buckets.duplicates) {
                        Ok(_) => report.duplicates.push(DuplicateMove {
                            moved: replaced,
                            kept: name,
                        }),
                        Err(e) => {
                            log::warn!("Duplicate check error on {}: {}", replaced, e);
                            resolver.revert(&fingerprint, &replaced);
                            report.errors.push(replaced);
                        }
                    }
                }
            }
        }

        self.journal(Stage::Dedup, mover)?;
        Ok(report)
    }

    /// Caption every image left in the valid bucket and build its listing.
    /// Images that fail to decode or caption are reported and left out.
    pub fn generate_listings(&self, captioner: &dyn Captioner) -> Result<ListingReport, PipelineError> {
        let images = list_images(&self.buckets.valid, self.policy)?;
        let processor = CaptionProcessor::new(self.policy);
        let classifier =
            CategoryClassifier::new(&self.policy.category_rules, self.policy.default_categories);

        let progress = if self.show_progress {
            let pb = ProgressBar::new(images.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40.green} {pos}/{len} {msg}") {
                pb.set_style(style);
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut report = ListingReport::default();
        for path in images {
            let name = file_name(&path);
            progress.set_message(name.clone());

            let caption = load_rgb(&path)
                .map_err(|e| e.to_string())
                .and_then(|image| captioner.caption(&image).map_err(|e| e.to_string()));
            progress.inc(1);

            match caption {
                Ok(caption) => {
                    log::debug!("{}: {}", name, caption);
                    report
                        .records
                        .push(ListingRecord::from_caption(name, &caption, &processor, &classifier));
                }
                Err(e) => {
                    log::warn!("Metadata error on {}: {}", name, e);
                    report.errors.push(name);
                }
            }
        }
        progress.finish_and_clear();

        Ok(report)
    }

    /// Run every stage and write the listing CSV to `output`.
    pub fn run(&self, captioner: &dyn Captioner, output: &Path) -> Result<RunReport, PipelineError> {
        let filter = self.filter_images()?;
        let dedup = self.remove_duplicates()?;
        let listing = self.generate_listings(captioner)?;
        listing::write_csv(output, &listing.records)?;
        Ok(RunReport {
            filter,
            dedup,
            listing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::caption::CaptionError;
    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::TempDir;

    fn small_policy() -> Policy {
        Policy {
            min_pixels: 100,
            ..Policy::default()
        }
    }

    fn write_png(dir: &Path, name: &str, w: u32, h: u32, shade: u8) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, Rgb([shade, 0, 0]))
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        path
    }

    fn setup() -> (TempDir, Buckets) {
        let temp_dir = TempDir::new().unwrap();
        let buckets = Buckets::under(temp_dir.path());
        fs::create_dir_all(&buckets.source).unwrap();
        (temp_dir, buckets)
    }

    #[test]
    fn test_filter_moves_into_buckets() {
        let (_tmp, buckets) = setup();
        write_png(&buckets.source, "big.png", 10, 10, 1);
        write_png(&buckets.source, "small.png", 9, 11, 2);
        fs::write(buckets.source.join("broken.jpg"), b"garbage").unwrap();
        fs::write(buckets.source.join("notes.txt"), b"ignored").unwrap();

        let policy = small_policy();
        let report = Pipeline::new(&policy, buckets.clone()).filter_images().unwrap();

        assert_eq!(report.valid, vec!["big.png"]);
        assert_eq!(report.too_small, vec!["small.png"]);
        assert_eq!(report.errors, vec!["broken.jpg"]);
        assert!(buckets.valid.join("big.png").exists());
        assert!(buckets.too_small.join("small.png").exists());
        assert!(buckets.source.join("broken.jpg").exists());
        assert!(buckets.source.join("notes.txt").exists());
    }

    #[test]
    fn test_filter_dry_run_moves_nothing() {
        let (_tmp, buckets) = setup();
        write_png(&buckets.source, "big.png", 10, 10, 1);

        let policy = small_policy();
        let report = Pipeline::new(&policy, buckets.clone())
            .with_dry_run(true)
            .filter_images()
            .unwrap();

        assert_eq!(report.valid, vec!["big.png"]);
        assert!(buckets.source.join("big.png").exists());
        assert!(!buckets.valid.exists());
    }

    #[test]
    fn test_filter_requires_source_dir() {
        let temp_dir = TempDir::new().unwrap();
        let policy = small_policy();
        let result = Pipeline::new(&policy, Buckets::under(temp_dir.path())).filter_images();
        assert!(matches!(result, Err(PipelineError::Scan(_))));
    }

    #[test]
    fn test_dedup_copy_name_loses() {
        let (_tmp, buckets) = setup();
        fs::create_dir_all(&buckets.valid).unwrap();
        fs::write(buckets.valid.join("sunset copy.jpg"), b"same bytes").unwrap();
        fs::write(buckets.valid.join("sunset.jpg"), b"same bytes").unwrap();
        fs::write(buckets.valid.join("other.jpg"), b"other bytes").unwrap();

        let policy = small_policy();
        let report = Pipeline::new(&policy, buckets.clone())
            .remove_duplicates()
            .unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(
            report.duplicates,
            vec![DuplicateMove {
                moved: "sunset copy.jpg".to_string(),
                kept: "sunset.jpg".to_string()
            }]
        );
        assert!(buckets.valid.join("sunset.jpg").exists());
        assert!(buckets.valid.join("other.jpg").exists());
        assert!(buckets.duplicates.join("sunset copy.jpg").exists());
        assert!(!buckets.valid.join("sunset copy.jpg").exists());
    }

    #[test]
    fn test_dedup_existing_destination_is_an_error() {
        let (_tmp, buckets) = setup();
        fs::create_dir_all(&buckets.valid).unwrap();
        fs::create_dir_all(&buckets.duplicates).unwrap();
        fs::write(buckets.valid.join("a.jpg"), b"same").unwrap();
        fs::write(buckets.valid.join("a copy.jpg"), b"same").unwrap();
        fs::write(buckets.duplicates.join("a copy.jpg"), b"older").unwrap();

        let policy = small_policy();
        let report = Pipeline::new(&policy, buckets.clone())
            .remove_duplicates()
            .unwrap();

        assert!(report.duplicates.is_empty());
        assert_eq!(report.errors, vec!["a copy.jpg"]);
        assert_eq!(fs::read(buckets.duplicates.join("a copy.jpg")).unwrap(), b"older");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_move_leaves_asset_in_source_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, buckets) = setup();
        write_png(&buckets.source, "big.png", 10, 10, 1);
        fs::set_permissions(&buckets.source, fs::Permissions::from_mode(0o555)).unwrap();
        // Permission bits do not bind a privileged user.
        if fs::write(buckets.source.join(".writable"), b"").is_ok() {
            fs::set_permissions(&buckets.source, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let policy = small_policy();
        let pipeline = Pipeline::new(&policy, buckets.clone());
        let report = pipeline.filter_images().unwrap();
        assert_eq!(report.errors, vec!["big.png"]);
        assert!(report.valid.is_empty());
        assert!(buckets.source.join("big.png").exists());
        assert!(!buckets.valid.join("big.png").exists());

        fs::set_permissions(&buckets.source, fs::Permissions::from_mode(0o755)).unwrap();
        let report = pipeline.filter_images().unwrap();
        assert_eq!(report.valid, vec!["big.png"]);
        assert!(report.errors.is_empty());
        assert!(!buckets.source.join("big.png").exists());
    }

    #[test]
    fn test_journal_records_applied_moves() {
        let (tmp, buckets) = setup();
        write_png(&buckets.source, "big.png", 10, 10, 1);
        let history = History::new(tmp.path().join(".history.jsonl"));

        let policy = small_policy();
        let pipeline = Pipeline::new(&policy, buckets.clone()).with_history(history);
        pipeline.filter_images().unwrap();
        pipeline.remove_duplicates().unwrap();

        let records = History::new(tmp.path().join(".history.jsonl")).load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stage, Stage::Filter);
        assert_eq!(records[0].moves[0].to, buckets.valid.join("big.png"));
    }

    #[test]
    fn test_listings_skip_caption_failures() {
        let (_tmp, buckets) = setup();
        fs::create_dir_all(&buckets.valid).unwrap();
        write_png(&buckets.valid, "bird.png", 10, 10, 10);
        write_png(&buckets.valid, "fail.png", 10, 10, 20);
        fs::write(buckets.valid.join("corrupt.png"), b"garbage").unwrap();

        // Shade of the red channel tells the images apart.
        let captioner = |image: &DynamicImage| -> Result<String, CaptionError> {
            match image.to_rgb8().get_pixel(0, 0)[0] {
                10 => Ok("a bird on a branch".to_string()),
                _ => Err(CaptionError::Empty),
            }
        };

        let policy = small_policy();
        let report = Pipeline::new(&policy, buckets.clone())
            .generate_listings(&captioner)
            .unwrap();

        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert_eq!(record.filename, "bird.png");
        assert!(record.keywords.starts_with(&["bird".to_string(), "branch".to_string()]));

        let mut errors = report.errors.clone();
        errors.sort();
        assert_eq!(errors, vec!["corrupt.png", "fail.png"]);
    }
}
