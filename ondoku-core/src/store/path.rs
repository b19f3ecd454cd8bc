//! Addresses inside the document store.
//!
//! ```text
//! users/<identity-id>/settings/columns      single document
//! users/<identity-id>/entries/<entry-id>    one document per entry
//! ```

use std::fmt;

use crate::error::StoreError;
use crate::models::EntryId;

/// Rejects segments that could escape a directory-backed store.
pub(crate) fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty()
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains("..")
        || segment.starts_with('.')
    {
        return Err(StoreError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

/// A collection of documents, e.g. `users/u1/entries`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    pub fn new<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StoreError::InvalidPath(String::new()));
        }
        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Address of the document `id` inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath, StoreError> {
        validate_segment(id)?;
        Ok(DocumentPath {
            collection: self.clone(),
            id: id.to_string(),
        })
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// A single document, e.g. `users/u1/settings/columns`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// The subtree of the store owned by one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    identity_id: String,
}

impl Partition {
    pub fn new(identity_id: impl Into<String>) -> Result<Self, StoreError> {
        let identity_id = identity_id.into();
        validate_segment(&identity_id)?;
        Ok(Self { identity_id })
    }

    pub fn identity_id(&self) -> &str {
        &self.identity_id
    }

    pub fn columns(&self) -> DocumentPath {
        DocumentPath {
            collection: CollectionPath {
                segments: vec![
                    "users".to_string(),
                    self.identity_id.clone(),
                    "settings".to_string(),
                ],
            },
            id: "columns".to_string(),
        }
    }

    pub fn entries(&self) -> CollectionPath {
        CollectionPath {
            segments: vec![
                "users".to_string(),
                self.identity_id.clone(),
                "entries".to_string(),
            ],
        }
    }

    pub fn entry(&self, id: &EntryId) -> Result<DocumentPath, StoreError> {
        self.entries().doc(id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_layout() {
        let partition = Partition::new("abc123").unwrap();
        assert_eq!(partition.columns().to_string(), "users/abc123/settings/columns");
        assert_eq!(partition.entries().to_string(), "users/abc123/entries");
        assert_eq!(
            partition.entry(&EntryId::from("1700")).unwrap().to_string(),
            "users/abc123/entries/1700"
        );
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(Partition::new("../etc").is_err());
        assert!(Partition::new("a/b").is_err());
        assert!(Partition::new("").is_err());
        assert!(Partition::new(".hidden").is_err());
        let partition = Partition::new("u1").unwrap();
        assert!(partition.entry(&EntryId::from("..")).is_err());
    }

    #[test]
    fn test_collection_requires_segments() {
        assert!(CollectionPath::new(Vec::<String>::new()).is_err());
        let path = CollectionPath::new(["users", "u1", "entries"]).unwrap();
        assert_eq!(path.doc("9").unwrap().collection(), &path);
    }
}
