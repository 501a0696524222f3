use std::collections::{BTreeMap, BTreeSet, HashMap};

use ndarray::{ArrayD, IxDyn};

use crate::error::{Result, StorageError};

// ---------------------------------------------------------------------------
// Stream handles – the acquisition side of the assembler
// ---------------------------------------------------------------------------

/// A single result stream that can be fetched in full once acquisition is done.
pub trait StreamHandle {
    fn fetch_all(&self) -> Result<ArrayD<f64>>;
}

/// Already-fetched data behaves like a handle.
impl StreamHandle for ArrayD<f64> {
    fn fetch_all(&self) -> Result<ArrayD<f64>> {
        Ok(self.clone())
    }
}

impl StreamHandle for Vec<f64> {
    fn fetch_all(&self) -> Result<ArrayD<f64>> {
        Ok(ArrayD::from_shape_vec(IxDyn(&[self.len()]), self.clone())?)
    }
}

impl<H: StreamHandle + ?Sized> StreamHandle for Box<H> {
    fn fetch_all(&self) -> Result<ArrayD<f64>> {
        (**self).fetch_all()
    }
}

/// The collection of named result streams of one job, e.g. `I1`, `Q1`, `I2`…
pub trait ResultHandles {
    type Handle: StreamHandle;

    fn stream_names(&self) -> Vec<&str>;

    fn get(&self, name: &str) -> Option<&Self::Handle>;

    /// Fetch a stream by name; a missing name is an error.
    fn fetch(&self, name: &str) -> Result<ArrayD<f64>> {
        self.get(name)
            .ok_or_else(|| StorageError::MissingStream(name.to_string()))?
            .fetch_all()
    }
}

impl<H: StreamHandle> ResultHandles for BTreeMap<String, H> {
    type Handle = H;

    fn stream_names(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }

    fn get(&self, name: &str) -> Option<&H> {
        BTreeMap::get(self, name)
    }
}

impl<H: StreamHandle> ResultHandles for HashMap<String, H> {
    type Handle = H;

    fn stream_names(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }

    fn get(&self, name: &str) -> Option<&H> {
        HashMap::get(self, name)
    }
}

// ---------------------------------------------------------------------------
// Stream-name parsing
// ---------------------------------------------------------------------------

/// Prefix of `name` before its first decimal digit (`"I1"` → `"I"`).
///
/// Returns `None` when there is no digit, or when the name starts with one.
pub fn extract_prefix(name: &str) -> Option<&str> {
    match name.find(|c: char| c.is_ascii_digit()) {
        Some(0) | None => None,
        Some(index) => Some(&name[..index]),
    }
}

/// Distinct measurement-variable names found among the stream names, sorted.
pub fn measurement_variables<R: ResultHandles + ?Sized>(handles: &R) -> Vec<String> {
    handles
        .stream_names()
        .into_iter()
        .filter_map(extract_prefix)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Stream name of `variable` for the qubit at 0-based `position`.
pub fn stream_name(variable: &str, position: usize) -> String {
    format!("{variable}{}", position + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_stops_at_first_digit() {
        assert_eq!(extract_prefix("I1"), Some("I"));
        assert_eq!(extract_prefix("state12"), Some("state"));
        assert_eq!(extract_prefix("iq_abs3x4"), Some("iq_abs"));
        assert_eq!(extract_prefix("Q"), None);
        assert_eq!(extract_prefix("1I"), None);
        assert_eq!(extract_prefix(""), None);
    }

    #[test]
    fn prefix_is_case_sensitive_and_ascii_only() {
        assert_eq!(extract_prefix("Ii2"), Some("Ii"));
        // Arabic-Indic digit is not a decimal digit here
        assert_eq!(extract_prefix("I\u{0661}"), None);
    }

    #[test]
    fn variables_are_deduplicated_and_sorted() {
        let handles: HashMap<String, Vec<f64>> = ["Q2", "I1", "Q1", "I2", "n", "3x"]
            .into_iter()
            .map(|k| (k.to_string(), vec![0.0]))
            .collect();
        assert_eq!(measurement_variables(&handles), vec!["I", "Q"]);
    }

    #[test]
    fn fetch_reports_missing_stream() {
        let handles: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let err = handles.fetch("I1").unwrap_err();
        assert!(matches!(err, StorageError::MissingStream(ref k) if k == "I1"));
    }

    #[test]
    fn stream_names_are_one_based() {
        assert_eq!(stream_name("I", 0), "I1");
        assert_eq!(stream_name("state", 9), "state10");
    }
}
