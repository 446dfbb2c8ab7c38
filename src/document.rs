use serde::{Deserialize, Serialize};

pub type DocId = u64;

/// Document represents a searchable record (a movie in the bundled data set)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub description: String,
}

impl Document {
    pub fn new(id: DocId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Get the full searchable text (title + description)
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searchable_text_joins_fields() {
        let doc = Document::new(7, "Brave", "A bear in the forest");
        assert_eq!(doc.searchable_text(), "Brave A bear in the forest");
    }
}
