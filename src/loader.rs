use crate::document::Document;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Instant;

/// Load a JSON document collection, decompressing `.gz` files on the fly
pub fn load_documents<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let start = Instant::now();

    let file = File::open(path)?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |ext| ext == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let documents = parse_documents(BufReader::new(reader))?;
    tracing::info!(
        "Loaded {} documents from {} in {:?}",
        documents.len(),
        path.display(),
        start.elapsed()
    );
    Ok(documents)
}

/// Parse `{"movies": [...]}` or a bare array of document records
pub fn parse_documents<R: Read>(reader: R) -> Result<Vec<Document>> {
    let value: Value = serde_json::from_reader(reader)
        .map_err(|e| Error::InvalidInput(format!("malformed document collection: {}", e)))?;

    let records = match value {
        Value::Object(mut map) => map.remove("movies"),
        array @ Value::Array(_) => Some(array),
        _ => None,
    };
    let records = match records {
        Some(Value::Array(records)) => records,
        _ => {
            return Err(Error::InvalidInput(
                "expected a \"movies\" array or a bare array of documents".to_string(),
            ))
        }
    };

    // Convert record by record so a mistyped field names its document
    records
        .into_iter()
        .enumerate()
        .map(|(position, record)| {
            serde_json::from_value::<Document>(record)
                .map_err(|e| Error::InvalidInput(format!("document #{}: {}", position, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_parse_wrapped_collection() {
        let json = r#"{"movies": [
            {"id": 1, "title": "Brave", "description": "bear forest", "year": 2012},
            {"id": 2, "title": "Knight", "description": "castle"}
        ]}"#;
        let docs = parse_documents(json.as_bytes()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0], Document::new(1, "Brave", "bear forest"));
    }

    #[test]
    fn test_parse_bare_array() {
        let json = r#"[{"id": 5, "title": "Up", "description": "balloons"}]"#;
        let docs = parse_documents(json.as_bytes()).unwrap();
        assert_eq!(docs, vec![Document::new(5, "Up", "balloons")]);
    }

    #[test]
    fn test_non_string_field_is_rejected() {
        let json = r#"{"movies": [
            {"id": 1, "title": "Brave", "description": "ok"},
            {"id": 2, "title": 42, "description": "castle"}
        ]}"#;
        match parse_documents(json.as_bytes()) {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("#1"), "{}", msg),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        assert!(matches!(
            parse_documents("{\"movies\": [".as_bytes()),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(parse_documents("42".as_bytes()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_gzipped_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.json.gz");

        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(br#"{"movies": [{"id": 3, "title": "Cars", "description": "race"}]}"#)
            .unwrap();
        encoder.finish().unwrap();

        let docs = load_documents(&path).unwrap();
        assert_eq!(docs, vec![Document::new(3, "Cars", "race")]);
    }
}
