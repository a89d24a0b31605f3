//! Stylesheet targets: an ordered in-memory rule list plus replica fan-out.
//!
//! The engine owns one primary [`MemorySheet`]; every connected shadow root
//! gets a replica that mirrors the primary insert-for-insert, so all targets
//! hold the same rules at the same indices.

use std::collections::HashMap;

use tracing::warn;

use crate::dom::NodeId;

/// A rule a sheet refuses to hold (unbalanced braces) is replaced by this
/// placeholder so index bookkeeping stays aligned with the rule list.
const PLACEHOLDER: &str = ":root{}";

/// An ordered list of inserted rule texts.
#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    texts: Vec<String>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rule text at `index`, returning what was actually stored.
    pub fn insert(&mut self, text: &str, index: usize) -> &str {
        let stored = if is_balanced(text) {
            text.to_owned()
        } else {
            warn!(rule = text, "rejected malformed rule, keeping placeholder");
            PLACEHOLDER.to_owned()
        };
        let index = index.min(self.texts.len());
        self.texts.insert(index, stored);
        &self.texts[index]
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// The whole sheet as one CSS string.
    pub fn css(&self) -> String {
        self.texts.join("")
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn clear(&mut self) {
        self.texts.clear();
    }
}

fn is_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for b in text.bytes() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// The primary sheet plus its per-root replicas.
#[derive(Debug, Default)]
pub struct SheetGroup {
    primary: MemorySheet,
    replicas: HashMap<NodeId, MemorySheet>,
}

impl SheetGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary(&self) -> &MemorySheet {
        &self.primary
    }

    pub fn replica(&self, root: NodeId) -> Option<&MemorySheet> {
        self.replicas.get(&root)
    }

    /// Insert into the primary, then mirror whatever the primary actually
    /// stored into every replica.
    pub fn insert(&mut self, text: &str, index: usize) {
        let stored = self.primary.insert(text, index).to_owned();
        for replica in self.replicas.values_mut() {
            replica.insert(&stored, index);
        }
    }

    /// Register a replica for `root`, seeded with the primary's contents.
    pub fn connect(&mut self, root: NodeId) {
        self.replicas.insert(root, self.primary.clone());
    }

    pub fn disconnect(&mut self, root: NodeId) {
        self.replicas.remove(&root);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.primary.texts.clone()
    }

    /// Reset the primary and every replica to a snapshot.
    pub fn restore(&mut self, texts: Vec<String>) {
        for replica in self.replicas.values_mut() {
            replica.texts = texts.clone();
        }
        self.primary.texts = texts;
    }

    pub fn clear(&mut self) {
        self.primary.clear();
        for replica in self.replicas.values_mut() {
            replica.clear();
        }
    }

    /// Clear everything and drop all replicas.
    pub fn destroy(&mut self) {
        self.primary.clear();
        self.replicas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;

    // ── memory sheet ─────────────────────────────────────────────────

    #[test]
    fn insert_keeps_index_order() {
        let mut sheet = MemorySheet::new();
        sheet.insert(".b{x:1}", 0);
        sheet.insert(".a{x:1}", 0);
        sheet.insert(".c{x:1}", 2);
        assert_eq!(sheet.texts(), &[".a{x:1}", ".b{x:1}", ".c{x:1}"]);
    }

    #[test]
    fn malformed_rule_becomes_placeholder() {
        let mut sheet = MemorySheet::new();
        sheet.insert(".a{x:1}", 0);
        sheet.insert(".broken{x:1", 1);
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.texts()[1], ":root{}");
    }

    #[test]
    fn out_of_range_index_clamps_to_end() {
        let mut sheet = MemorySheet::new();
        sheet.insert(".a{x:1}", 99);
        assert_eq!(sheet.texts(), &[".a{x:1}"]);
    }

    // ── replication ──────────────────────────────────────────────────

    #[test]
    fn connect_seeds_replica_from_primary() {
        let mut dom = Dom::new();
        let root = dom.create_element("x-app");
        let mut group = SheetGroup::new();
        group.insert(".a{x:1}", 0);
        group.connect(root);
        assert_eq!(group.replica(root).map(MemorySheet::len), Some(1));
    }

    #[test]
    fn inserts_mirror_into_replicas() {
        let mut dom = Dom::new();
        let a = dom.create_element("x-a");
        let b = dom.create_element("x-b");
        let mut group = SheetGroup::new();
        group.connect(a);
        group.connect(b);
        group.insert(".p{x:1}", 0);
        group.insert(".q{x:1}", 0);
        for root in [a, b] {
            let replica = group.replica(root).expect("replica");
            assert_eq!(replica.texts(), group.primary().texts());
        }
    }

    #[test]
    fn replicas_mirror_the_placeholder_too() {
        let mut dom = Dom::new();
        let root = dom.create_element("x-app");
        let mut group = SheetGroup::new();
        group.connect(root);
        group.insert(".broken{", 0);
        assert_eq!(group.replica(root).expect("replica").texts()[0], ":root{}");
    }

    #[test]
    fn restore_resets_all_targets() {
        let mut dom = Dom::new();
        let root = dom.create_element("x-app");
        let mut group = SheetGroup::new();
        group.insert(".a{x:1}", 0);
        let snap = group.snapshot();
        group.connect(root);
        group.insert(".b{x:1}", 1);
        group.restore(snap);
        assert_eq!(group.primary().len(), 1);
        assert_eq!(group.replica(root).map(MemorySheet::len), Some(1));
    }

    #[test]
    fn destroy_drops_replicas() {
        let mut dom = Dom::new();
        let root = dom.create_element("x-app");
        let mut group = SheetGroup::new();
        group.connect(root);
        group.insert(".a{x:1}", 0);
        group.destroy();
        assert!(group.primary().is_empty());
        assert!(group.replica(root).is_none());
    }
}
