//! A minimal element tree backed by a slotmap arena.
//!
//! Nodes live in a [`SlotMap`]; structure lives in secondary maps keyed by
//! the same [`NodeId`], so removing a subtree never invalidates other ids.
//! Observers registered on a root receive [`Mutation`] records for class
//! attribute writes and child insertions anywhere under that root.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::observe::{Mutation, MutationQueue};

new_key_type! {
    /// Arena key for a DOM node.
    pub struct NodeId;
}

#[derive(Debug, Clone)]
pub struct NodeData {
    tag: String,
    attributes: HashMap<String, String>,
    shadow_root: bool,
}

impl NodeData {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn has_shadow_root(&self) -> bool {
        self.shadow_root
    }
}

#[derive(Default)]
pub struct Dom {
    nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parents: SecondaryMap<NodeId, NodeId>,
    observers: Vec<(NodeId, Rc<RefCell<MutationQueue>>)>,
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = self.nodes.insert(NodeData {
            tag: tag.to_owned(),
            attributes: HashMap::new(),
            shadow_root: false,
        });
        self.children.insert(id, Vec::new());
        id
    }

    pub fn get(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node)
    }

    pub fn attach_shadow(&mut self, node: NodeId) {
        if let Some(data) = self.nodes.get_mut(node) {
            data.shadow_root = true;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let at = self.children(parent).len();
        self.insert_child(parent, child, at);
    }

    pub fn insert_child(&mut self, parent: NodeId, child: NodeId, index: usize) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return;
        }
        self.detach(child);
        let Some(entry) = self.children.entry(parent) else {
            return;
        };
        let siblings = entry.or_default();
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.parents.insert(child, parent);
        self.record(parent, &Mutation::ChildList { added: vec![child] });
    }

    /// Remove a node and its whole subtree from the arena.
    pub fn remove(&mut self, node: NodeId) {
        self.detach(node);
        for id in self.subtree(node) {
            self.nodes.remove(id);
            self.children.remove(id);
            self.parents.remove(id);
        }
        self.observers.retain(|(root, _)| *root != node);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parents.remove(node) {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.retain(|c| *c != node);
            }
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(node).copied()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children.get(node).map_or(&[], Vec::as_slice)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(node)?.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let Some(data) = self.nodes.get_mut(node) else {
            return;
        };
        data.attributes.insert(name.to_owned(), value.to_owned());
        // Observers filter on the class attribute.
        if name == "class" {
            self.record(node, &Mutation::Attribute { node });
        }
    }

    /// Whether `node` is `root` or lies under it.
    pub fn contains(&self, root: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == root {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Preorder walk of `root` and everything under it.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.nodes.contains_key(id) {
                continue;
            }
            out.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub(crate) fn register_observer(&mut self, root: NodeId, queue: Rc<RefCell<MutationQueue>>) {
        self.observers.push((root, queue));
    }

    pub(crate) fn unregister_observer(&mut self, root: NodeId) {
        self.observers.retain(|(r, _)| *r != root);
    }

    fn record(&self, node: NodeId, mutation: &Mutation) {
        for (root, queue) in &self.observers {
            if self.contains(*root, node) {
                queue.borrow_mut().enqueue(mutation.clone());
            }
        }
    }
}

impl std::fmt::Debug for Dom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dom")
            .field("nodes", &self.nodes.len())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}
