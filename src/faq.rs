//! FAQ source file handling.
//!
//! The source of truth is a JSON array of `{question, answer, topic}`
//! objects. Each entry becomes one indexed document whose id is derived from
//! its position in the file and whose text is a fixed `Q: … A: … (Topic: …)`
//! rendering of the entry.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::models::{DocumentMetadata, FaqEntry};

/// Entries read from the source file plus a digest of its raw bytes.
#[derive(Debug, Clone)]
pub struct FaqDataset {
    pub entries: Vec<FaqEntry>,
    pub digest: String,
}

/// Read the FAQ file.
///
/// Returns `Ok(None)` when the file does not exist. The top level must be a
/// JSON array of objects; individual fields may be missing, `null` or
/// non-string (see [`FaqEntry`]).
///
/// # Errors
///
/// Any other I/O failure, malformed JSON, or a non-array top level.
pub fn load_faq_file(path: &Path) -> Result<Option<FaqDataset>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read FAQ file: {}", path.display()))
        }
    };

    let entries: Vec<FaqEntry> = serde_json::from_slice(&bytes).with_context(|| {
        format!(
            "FAQ file {} must be a JSON array of {{question, answer, topic}} objects",
            path.display()
        )
    })?;

    Ok(Some(FaqDataset {
        entries,
        digest: sha256_hex(&bytes),
    }))
}

/// Positional document id. Reordering the source file remaps ids.
pub fn document_id(position: usize) -> String {
    format!("faq_{}", position)
}

pub fn document_text(entry: &FaqEntry) -> String {
    format!(
        "Q: {}. A: {} (Topic: {})",
        entry.question, entry.answer, entry.topic
    )
}

pub fn document_metadata(entry: &FaqEntry, text: &str) -> DocumentMetadata {
    DocumentMetadata {
        topic: entry.topic.clone(),
        original_text: text.to_string(),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn document_text_matches_fixed_format() {
        let entry = FaqEntry {
            question: "Do you accept Aetna insurance".to_string(),
            answer: "Yes, we accept most Aetna plans.".to_string(),
            topic: "Insurance".to_string(),
        };
        assert_eq!(
            document_text(&entry),
            "Q: Do you accept Aetna insurance. A: Yes, we accept most Aetna plans. (Topic: Insurance)"
        );
    }

    #[test]
    fn missing_topic_renders_general() {
        let entry: FaqEntry =
            serde_json::from_str(r#"{"question": "Hours?", "answer": "9 to 5"}"#).unwrap();
        assert_eq!(document_text(&entry), "Q: Hours?. A: 9 to 5 (Topic: General)");
        let meta = document_metadata(&entry, &document_text(&entry));
        assert_eq!(meta.topic, "General");
    }

    #[test]
    fn ids_are_positional() {
        assert_eq!(document_id(0), "faq_0");
        assert_eq!(document_id(41), "faq_41");
    }

    #[test]
    fn missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let result = load_faq_file(&tmp.path().join("absent.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn loads_entries_and_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faq.json");
        std::fs::write(
            &path,
            r#"[{"question": "a", "answer": "b", "topic": "c"}, {"question": "d", "answer": "e"}]"#,
        )
        .unwrap();

        let dataset = load_faq_file(&path).unwrap().unwrap();
        assert_eq!(dataset.entries.len(), 2);
        assert_eq!(dataset.entries[1].topic, "General");
        assert_eq!(dataset.digest.len(), 64);

        let again = load_faq_file(&path).unwrap().unwrap();
        assert_eq!(dataset.digest, again.digest);
    }

    #[test]
    fn null_and_numeric_fields_still_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faq.json");
        std::fs::write(
            &path,
            r#"[
                {"question": null, "answer": "Walk-ins welcome", "topic": null},
                {"question": "Copay?", "answer": 25, "topic": 7},
                {"answer": "Closed on holidays", "topic": "Hours"}
            ]"#,
        )
        .unwrap();

        let dataset = load_faq_file(&path).unwrap().unwrap();
        assert_eq!(dataset.entries.len(), 3);
        assert_eq!(
            document_text(&dataset.entries[0]),
            "Q: . A: Walk-ins welcome (Topic: General)"
        );
        assert_eq!(
            document_text(&dataset.entries[1]),
            "Q: Copay?. A: 25 (Topic: 7)"
        );
        assert_eq!(dataset.entries[2].question, "");
    }

    #[test]
    fn non_array_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faq.json");
        std::fs::write(&path, r#"{"question": "a"}"#).unwrap();
        assert!(load_faq_file(&path).is_err());
    }
}
