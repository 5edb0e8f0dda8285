pub mod extract;
pub mod lookup;

use std::path::Path;

use crate::loader::{LoadError, Loader};
use crate::report::Reporter;
use extract::{ExtractOptions, Extraction, Extractor};

/// Two-step pipeline: file → JSON tree → normalized records.
pub fn process_file(
    path: &Path,
    reporter: &dyn Reporter,
    options: ExtractOptions,
) -> Result<Extraction, LoadError> {
    let payload = Loader::new(reporter).load(path)?;
    Ok(Extractor::new(reporter, options).extract(&payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::testing::Recorder;

    #[test]
    fn fixture_end_to_end() {
        let rec = Recorder::default();
        let out = process_file(
            Path::new("tests/fixtures/search_response.json"),
            &rec,
            ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(out.records.len(), 3);
        assert_eq!(rec.events().len(), 3); // loaded, skipped, done
    }

    #[test]
    fn missing_file_is_reported_not_panicked() {
        let rec = Recorder::default();
        let res = process_file(Path::new("tests/fixtures/absent.json"), &rec, ExtractOptions::default());
        assert!(matches!(res, Err(LoadError::NotFound { .. })));
    }
}
