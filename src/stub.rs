//! Detection of placeholder ("no image available") covers.
//!
//! A candidate cover is compared against a library of known placeholders laid
//! out as `<root>/<category>/<pattern-file>`. Both images are reduced to 8-bit
//! grayscale and, when their dimensions agree, scored with the mean structural
//! similarity index.

use super::ParserError;
use crate::portals::Portals;
use image::{GrayImage, ImageReader};
use image_compare::{gray_similarity_structure, Algorithm};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Dissimilarity below which a cover counts as a placeholder.
pub const DEFAULT_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// Dissimilarity in `[0, 100]`, where 0 means identical.
    Score(f64),
    DimensionMismatch,
    Failed(String),
}

impl Comparison {
    pub fn score(&self) -> Option<f64> {
        match self {
            Comparison::Score(score) => Some(*score),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StubDetector {
    threshold: f64,
}

impl Default for StubDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl StubDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn is_match(&self, score: f64) -> bool {
        score < self.threshold
    }

    /// An unreadable candidate is an error. Unreadable patterns are reported
    /// and skipped, and a missing library means nothing matches.
    #[instrument(skip(self, portals))]
    pub fn is_stub(
        &self,
        candidate: &Path,
        library: &Path,
        portals: &impl Portals,
    ) -> Result<bool, ParserError> {
        let candidate = load_gray(candidate)?;

        let categories = match sorted_entries(library) {
            Ok(categories) => categories,
            Err(e) => {
                warn!("stub library {} unavailable: {e}", library.display());
                return Ok(false);
            }
        };

        for category in categories.iter().filter(|p| p.is_dir()) {
            let patterns = match sorted_entries(category) {
                Ok(patterns) => patterns,
                Err(e) => {
                    warn!("stub category {} unavailable: {e}", category.display());
                    continue;
                }
            };
            for pattern in patterns.iter().filter(|p| p.is_file()) {
                let comparison = self.compare_loaded(&candidate, pattern, portals);
                debug!(pattern = %pattern.display(), ?comparison);
                if comparison.score().is_some_and(|s| self.is_match(s)) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    pub fn compare(
        &self,
        candidate: &Path,
        reference: &Path,
        portals: &impl Portals,
    ) -> Comparison {
        match load_gray(candidate) {
            Ok(candidate) => self.compare_loaded(&candidate, reference, portals),
            Err(e) => report(portals, e),
        }
    }

    fn compare_loaded(
        &self,
        candidate: &GrayImage,
        reference: &Path,
        portals: &impl Portals,
    ) -> Comparison {
        match dissimilarity(candidate, reference) {
            Ok(Some(score)) => Comparison::Score(score),
            Ok(None) => Comparison::DimensionMismatch,
            Err(e) => report(portals, e),
        }
    }
}

fn report(portals: &impl Portals, e: impl std::fmt::Display) -> Comparison {
    let message = format!("Problem occurred during filtering stubs: \"{e}\".");
    portals.error(&message);
    Comparison::Failed(message)
}

fn dissimilarity(candidate: &GrayImage, reference: &Path) -> Result<Option<f64>, String> {
    let reference = load_gray(reference).map_err(|e| e.to_string())?;
    if candidate.dimensions() != reference.dimensions() {
        return Ok(None);
    }
    let similarity = gray_similarity_structure(&Algorithm::MSSIMSimple, candidate, &reference)
        .map_err(|e| e.to_string())?;
    Ok(Some((100.0 - similarity.score * 100.0).clamp(0.0, 100.0)))
}

// Downloaded covers carry no extension, so the format is sniffed from content.
fn load_gray(path: &Path) -> Result<GrayImage, ParserError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image.to_luma8())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Luma;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Recorder {
        fn errors(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Portals for Recorder {
        fn request_error(&self, _status: u16, _message: &str) {}
        fn title_not_found(&self, _slug: &str) {}
        fn chapter_skipped(&self, _slug: &str, _chapter_id: u64) {}
        fn covers_unstubbed(&self, _slug: &str) {}
        fn collect_progress_by_page(&self, _page: u32) {}
        fn error(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let value = (x * 3 + y * 2) % 256;
            Luma([value as u8])
        })
    }

    fn checkerboard(size: u32, inverted: bool) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let white = ((x / 8) + (y / 8)) % 2 == 0;
            Luma([if white != inverted { 255 } else { 0 }])
        })
    }

    fn save(image: &GrayImage, path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        image.save(path).unwrap();
    }

    #[test]
    fn test_identical_copy_scores_zero() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("cover.png");
        let library = dir.path().join("Filters");
        let reference = library.join("blank/pattern.png");
        save(&gradient(64, 64), &candidate);
        save(&gradient(64, 64), &reference);

        let detector = StubDetector::default();
        let portals = Recorder::default();
        let comparison = detector.compare(&candidate, &reference, &portals);
        let score = comparison.score().unwrap();
        assert!(score.abs() < 1e-3, "score was {score}");
        let stub = detector.is_stub(&candidate, &library, &portals);
        assert!(stub.unwrap());
    }

    #[test]
    fn test_dimension_mismatch_has_no_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("cover.png");
        let reference = dir.path().join("pattern.png");
        save(&gradient(64, 64), &candidate);
        save(&gradient(64, 48), &reference);

        let portals = Recorder::default();
        let detector = StubDetector::default();
        let comparison = detector.compare(&candidate, &reference, &portals);
        assert_eq!(comparison, Comparison::DimensionMismatch);
        assert_eq!(comparison.score(), None);
    }

    #[test]
    fn test_threshold_is_strict() {
        let detector = StubDetector::default();
        assert!(!detector.is_match(50.0));
        assert!(detector.is_match(49.999));
        assert!(StubDetector::new(10.0).is_match(9.0));
        assert!(!StubDetector::new(10.0).is_match(20.0));
    }

    #[test]
    fn test_no_match_in_library() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("cover.png");
        let library = dir.path().join("Filters");
        let inverted = library.join("inverted/pattern.png");
        save(&checkerboard(64, false), &candidate);
        save(&checkerboard(64, true), &inverted);
        let small = library.join("small/pattern.png");
        save(&checkerboard(32, false), &small);

        let detector = StubDetector::default();
        let portals = Recorder::default();
        let comparison = detector.compare(&candidate, &inverted, &portals);
        let score = comparison.score().unwrap();
        assert!(score >= 50.0, "score was {score}");
        assert!(!detector.is_stub(&candidate, &library, &portals).unwrap());
        assert!(portals.errors().is_empty());
    }

    #[test]
    fn test_corrupt_reference_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("cover.png");
        let library = dir.path().join("Filters");
        let broken = library.join("a_broken/pattern.png");
        save(&gradient(64, 64), &candidate);
        fs::create_dir_all(broken.parent().unwrap()).unwrap();
        fs::write(&broken, b"definitely not a png").unwrap();
        save(&gradient(64, 64), &library.join("b_blank/pattern.png"));

        let detector = StubDetector::default();
        let portals = Recorder::default();
        assert!(detector.is_stub(&candidate, &library, &portals).unwrap());
        let errors = portals.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Problem occurred"));
    }

    #[test]
    fn test_empty_or_missing_library() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("cover.png");
        let library = dir.path().join("Filters");
        let missing = dir.path().join("missing");
        save(&gradient(64, 64), &candidate);
        fs::create_dir_all(library.join("empty")).unwrap();

        let detector = StubDetector::default();
        let portals = Recorder::default();
        assert!(!detector.is_stub(&candidate, &library, &portals).unwrap());
        assert!(!detector.is_stub(&candidate, &missing, &portals).unwrap());
        assert!(portals.errors().is_empty());
    }

    #[test]
    fn test_unreadable_candidate_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("cover");
        fs::write(&candidate, b"garbage").unwrap();

        let portals = Recorder::default();
        let detector = StubDetector::default();
        let result = detector.is_stub(&candidate, dir.path(), &portals);
        assert!(result.is_err());
    }
}
