//! Image items as held in the result set, and placeholder ids for items the
//! backend returned without one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::Serialize;

/// Prefix shared by every synthesized id.
pub const PLACEHOLDER_PREFIX: &str = "generated-";

const SUFFIX_LEN: usize = 7;
const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static NEXT_PLACEHOLDER: AtomicU64 = AtomicU64::new(0);

/// One image in the result set. `id` is the identity key and is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: String,
    pub url: String,
    /// Set when `id` was synthesized locally rather than sent by the backend.
    #[serde(skip)]
    placeholder: bool,
}

impl Item {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            placeholder: false,
        }
    }

    /// Build an item from backend fields, synthesizing an id when the backend
    /// sent none (or only whitespace).
    pub fn from_wire(id: Option<&str>, url: Option<&str>) -> Self {
        let (id, placeholder) = match id {
            Some(id) if !id.trim().is_empty() => (id.to_string(), false),
            _ => (placeholder_id(), true),
        };
        Self {
            id,
            url: url.unwrap_or_default().to_string(),
            placeholder,
        }
    }

    /// Whether the id was synthesized (the backend sent none).
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// `generated-{unix_millis}-{counter}-{suffix}`.
///
/// The counter alone makes ids unique within the process; the timestamp and
/// random suffix keep them distinct from anything the backend could send.
pub fn placeholder_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let counter = NEXT_PLACEHOLDER.fetch_add(1, Ordering::Relaxed);
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{PLACEHOLDER_PREFIX}{millis}-{counter}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn real_id_is_kept() {
        let item = Item::from_wire(Some("LX1"), Some("http://x/thumb.png"));
        assert_eq!(item.id, "LX1");
        assert_eq!(item.url, "http://x/thumb.png");
        assert!(!item.is_placeholder());
    }

    #[test]
    fn missing_id_gets_placeholder() {
        let item = Item::from_wire(None, Some("u"));
        assert!(item.is_placeholder());
        assert!(!item.id.is_empty());
    }

    #[test]
    fn blank_id_gets_placeholder() {
        assert!(Item::from_wire(Some(""), None).is_placeholder());
        assert!(Item::from_wire(Some("   "), None).is_placeholder());
    }

    #[test]
    fn backend_id_with_generated_prefix_is_real() {
        let item = Item::from_wire(Some("generated-1700000000000-0-abcdefg"), Some("u"));
        assert!(!item.is_placeholder());
        assert!(!Item::new("generated-x", "u").is_placeholder());
    }

    #[test]
    fn missing_url_is_empty() {
        let item = Item::from_wire(Some("a"), None);
        assert_eq!(item.url, "");
    }

    #[test]
    fn placeholders_are_unique() {
        let ids: HashSet<String> = (0..500).map(|_| placeholder_id()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn placeholder_shape() {
        let id = placeholder_id();
        let rest = id.strip_prefix(PLACEHOLDER_PREFIX).unwrap();
        let parts: Vec<&str> = rest.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].parse::<u128>().is_ok());
        assert!(parts[1].parse::<u64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| SUFFIX_ALPHABET.contains(&b)));
    }
}
