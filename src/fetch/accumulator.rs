//! Result set merging: identity-deduplicated, first-seen order.

use std::collections::HashMap;

use crate::item::Item;

/// Overlay `incoming` onto `existing`.
///
/// Ids already present keep their position and take the incoming value;
/// new ids are appended in `incoming` order. Duplicates inside `incoming`
/// collapse the same way (last value wins, first position kept).
pub fn merge(existing: &[Item], incoming: &[Item]) -> Vec<Item> {
    let mut merged: Vec<Item> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(merged.capacity());

    for item in existing.iter().chain(incoming) {
        match index.get(&item.id) {
            Some(&pos) => merged[pos] = item.clone(),
            None => {
                index.insert(item.id.clone(), merged.len());
                merged.push(item.clone());
            }
        }
    }
    merged
}

/// An empty page is the only exhaustion signal; the backend reports no total.
pub fn is_exhausted(incoming: &[Item]) -> bool {
    incoming.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn item(id: &str, url: &str) -> Item {
        Item::new(id, url)
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn overlapping_pages_merge_in_first_seen_order() {
        let first = vec![item("a", "a1"), item("b", "b1")];
        let second = vec![item("b", "b2"), item("c", "c2")];
        let merged = merge(&first, &second);
        assert_eq!(ids(&merged), vec!["a", "b", "c"]);
        assert_eq!(merged[1].url, "b2");
    }

    #[test]
    fn empty_existing() {
        let merged = merge(&[], &[item("x", "1"), item("y", "2")]);
        assert_eq!(ids(&merged), vec!["x", "y"]);
    }

    #[test]
    fn empty_incoming_is_identity() {
        let existing = vec![item("x", "1"), item("y", "2")];
        assert_eq!(merge(&existing, &[]), existing);
    }

    #[test]
    fn duplicates_within_incoming_collapse() {
        let merged = merge(&[], &[item("a", "1"), item("b", "1"), item("a", "2")]);
        assert_eq!(ids(&merged), vec!["a", "b"]);
        assert_eq!(merged[0].url, "2");
    }

    #[test]
    fn overwrite_never_moves_position() {
        let mut acc = Vec::new();
        let pages = [
            vec![item("a", "1"), item("b", "1"), item("c", "1")],
            vec![item("c", "2"), item("d", "2")],
            vec![item("a", "3"), item("e", "3"), item("b", "3")],
        ];
        for page in &pages {
            acc = merge(&acc, page);
        }
        assert_eq!(ids(&acc), vec!["a", "b", "c", "d", "e"]);
        let unique: HashSet<&str> = acc.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(unique.len(), acc.len());
        assert_eq!(acc[0].url, "3");
        assert_eq!(acc[2].url, "2");
    }

    #[test]
    fn placeholder_items_never_collide() {
        let a = Item::from_wire(None, Some("u"));
        let b = Item::from_wire(Some(""), Some("u"));
        let merged = merge(&[a], &[b]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn exhaustion_only_on_empty_page() {
        assert!(is_exhausted(&[]));
        assert!(!is_exhausted(&[item("a", "")]));
    }
}
