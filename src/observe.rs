//! Mutation reaction: queue, drain loop, and class rewriting.
//!
//! The DOM enqueues [`Mutation`] records for observed roots; a [`Reactor`]
//! drains the queue, compiles every touched class attribute, and writes the
//! compiled class list back. The write itself enqueues another attribute
//! record; the engine's output memo makes the second compile the identity,
//! so the loop settles after one extra pass.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use tracing::trace;

use crate::dom::{Dom, NodeId};
use crate::engine::{Engine, EngineError};

#[derive(Debug, Clone)]
pub enum Mutation {
    /// The class attribute of a node changed.
    Attribute { node: NodeId },
    /// Nodes were inserted somewhere under an observed root.
    ChildList { added: Vec<NodeId> },
}

/// Pending mutation records for one reactor. Paused queues drop records, the
/// way a disconnected observer would.
#[derive(Debug, Default)]
pub struct MutationQueue {
    records: VecDeque<Mutation>,
    paused: bool,
}

impl MutationQueue {
    pub fn enqueue(&mut self, mutation: Mutation) {
        if !self.paused {
            self.records.push_back(mutation);
        }
    }

    pub fn take(&mut self) -> Option<Mutation> {
        self.records.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if paused {
            self.records.clear();
        }
    }
}

/// Watches observed roots and keeps their class attributes compiled.
#[derive(Default)]
pub struct Reactor {
    queue: Rc<RefCell<MutationQueue>>,
    roots: Vec<NodeId>,
    draining: bool,
}

impl Reactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start observing `root`: every current and future class attribute in
    /// its subtree gets compiled.
    pub fn observe(
        &mut self,
        dom: &mut Dom,
        engine: &mut Engine,
        root: NodeId,
    ) -> Result<(), EngineError> {
        self.roots.push(root);
        dom.register_observer(root, Rc::clone(&self.queue));
        self.apply_deep(dom, engine, root)?;
        self.flush(dom, engine)
    }

    pub fn unobserve(&mut self, dom: &mut Dom, root: NodeId) {
        self.roots.retain(|r| *r != root);
        dom.unregister_observer(root);
    }

    /// Compile every class attribute in a subtree, observed or not. Used for
    /// the initial pass and for content prepared while detached.
    pub fn apply_deep(
        &mut self,
        dom: &mut Dom,
        engine: &mut Engine,
        root: NodeId,
    ) -> Result<(), EngineError> {
        for node in dom.subtree(root) {
            self.process_node(dom, engine, node)?;
        }
        Ok(())
    }

    /// Drain the queue until it stays empty. Re-entrant calls and paused
    /// queues return immediately.
    pub fn flush(&mut self, dom: &mut Dom, engine: &mut Engine) -> Result<(), EngineError> {
        if self.draining || self.queue.borrow().is_paused() {
            return Ok(());
        }
        self.draining = true;
        let result = self.drain(dom, engine);
        self.draining = false;
        result
    }

    fn drain(&mut self, dom: &mut Dom, engine: &mut Engine) -> Result<(), EngineError> {
        // Subtrees already walked in this drain; insertion records may
        // repeat nodes.
        let mut walked: HashSet<NodeId> = HashSet::new();
        loop {
            let record = self.queue.borrow_mut().take();
            match record {
                None => return Ok(()),
                Some(Mutation::Attribute { node }) => {
                    self.process_node(dom, engine, node)?;
                }
                Some(Mutation::ChildList { added }) => {
                    for node in added {
                        if walked.insert(node) {
                            for id in dom.subtree(node) {
                                self.process_node(dom, engine, id)?;
                            }
                        }
                    }
                }
            }
        }
    }

    fn process_node(
        &mut self,
        dom: &mut Dom,
        engine: &mut Engine,
        node: NodeId,
    ) -> Result<(), EngineError> {
        let Some(class) = dom.attribute(node, "class").map(str::to_owned) else {
            return Ok(());
        };
        if class.trim().is_empty() {
            return Ok(());
        }
        let compiled = engine.compile(&class)?;
        if differs_sorted(&class, &compiled) {
            trace!(from = %class, to = %compiled, "rewrite class attribute");
            dom.set_attribute(node, "class", &compiled);
        }
        Ok(())
    }

    /// Stop recording; mutations made while paused are dropped.
    pub fn pause(&mut self) {
        self.queue.borrow_mut().set_paused(true);
    }

    /// Resume recording and recompile every observed subtree to catch up on
    /// whatever changed while paused.
    pub fn resume(&mut self, dom: &mut Dom, engine: &mut Engine) -> Result<(), EngineError> {
        self.queue.borrow_mut().set_paused(false);
        for root in self.roots.clone() {
            self.apply_deep(dom, engine, root)?;
        }
        self.flush(dom, engine)
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("roots", &self.roots.len())
            .field("draining", &self.draining)
            .finish_non_exhaustive()
    }
}

/// Whether two class strings differ once tokens are sorted; equal lists skip
/// the attribute write so reaction settles. Duplicate tokens count, so a
/// repeated class still gets rewritten to its compiled form.
fn differs_sorted(a: &str, b: &str) -> bool {
    let mut left: Vec<&str> = a.split_whitespace().collect();
    let mut right: Vec<&str> = b.split_whitespace().collect();
    left.sort_unstable();
    right.sort_unstable();
    left != right
}
