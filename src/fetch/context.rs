//! Query context: the filter the result set belongs to.

use std::fmt;

/// Active folder filter. `folder_id = None` means every item in the library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    pub folder_id: Option<String>,
}

impl QueryContext {
    pub fn all() -> Self {
        Self { folder_id: None }
    }

    pub fn folder(id: impl Into<String>) -> Self {
        Self {
            folder_id: Some(id.into()),
        }
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.folder_id {
            Some(id) => write!(f, "folder {id}"),
            None => f.write_str("all images"),
        }
    }
}
