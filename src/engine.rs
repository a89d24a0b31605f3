//! The compilation engine: class strings in, sorted stylesheet out.
//!
//! [`Engine::compile`] parses a class string, translates it through the rule
//! table, finalizes each compiled rule, inserts new CSS at its cascade
//! position, and returns the class list to write back (finalized names plus
//! untouched passthrough tokens). Results are memoized both ways, so
//! compiling an already-compiled result is the identity.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{resolve, Config, PreflightItem, ResolvedConfig};
use crate::context::Context;
use crate::dom::NodeId;
use crate::precedence::{insertion_index, CompiledRule, Layer, Precedence};
use crate::rules::{apply_classes, translate};
use crate::serialize::{css_text, serialize, RuleMeta};
use crate::sheet::SheetGroup;
use crate::theme::Theme;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine has been destroyed")]
    Destroyed,
}

/// Everything needed to rewind an engine to an earlier state.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    texts: Vec<String>,
    ordered: Vec<CompiledRule>,
    inserted: HashSet<String>,
    classes: HashMap<String, String>,
}

pub struct Engine {
    ctx: Context,
    sheet: SheetGroup,
    /// Compiled rules in sheet order; the index source for inserts.
    ordered: Vec<CompiledRule>,
    /// CSS texts already in the sheet.
    inserted: HashSet<String>,
    /// Memo of input class strings and of our own outputs.
    classes: HashMap<String, String>,
    destroyed: bool,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self::with_resolved(resolve(config))
    }

    pub fn with_resolved(config: ResolvedConfig) -> Self {
        Self {
            ctx: Context::new(config),
            sheet: SheetGroup::new(),
            ordered: Vec::new(),
            inserted: HashSet::new(),
            classes: HashMap::new(),
            destroyed: false,
        }
    }

    pub fn theme(&self) -> &Theme {
        self.ctx.theme()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The whole stylesheet as one CSS string.
    pub fn css(&self) -> String {
        self.sheet.primary().css()
    }

    pub fn sheet(&self) -> &SheetGroup {
        &self.sheet
    }

    /// Compile a class string and return the class list to use in its place.
    pub fn compile(&mut self, input: &str) -> Result<String, EngineError> {
        if self.destroyed {
            return Err(EngineError::Destroyed);
        }
        if let Some(hit) = self.classes.get(input) {
            return Ok(hit.clone());
        }
        // First compile on a fresh engine seeds the preflight.
        if self.classes.is_empty() {
            self.insert_preflight();
        }

        let specs = self.ctx.parse(input);
        let rules = translate(&specs, &self.ctx);

        let mut names: Vec<String> = Vec::new();
        let mut push_unique = |names: &mut Vec<String>, name: &str| {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        };
        for rule in rules {
            if let Some(token) = &rule.class_token {
                push_unique(&mut names, token);
                continue;
            }
            let rule = self.ctx.finalize(rule);
            if let Some(name) = &rule.name {
                push_unique(&mut names, name);
            }
            self.insert_rule(rule);
        }

        let result = names.join(" ");
        trace!(input, result = %result, "compiled");
        self.classes.insert(input.to_owned(), result.clone());
        // Compiling our own output must be a no-op.
        self.classes.insert(result.clone(), result.clone());
        Ok(result)
    }

    fn insert_preflight(&mut self) {
        let items: Vec<PreflightItem> = self.ctx.preflight().to_vec();
        for item in items {
            let rules = match item {
                PreflightItem::Styles(obj) => {
                    serialize(&obj, RuleMeta::anonymous(Layer::Base), &self.ctx)
                }
                PreflightItem::Classes(classes) => apply_classes(
                    None,
                    Precedence::of(Layer::Base),
                    &classes,
                    &self.ctx,
                    &[],
                    false,
                ),
            };
            for rule in rules {
                let rule = self.ctx.finalize(rule);
                self.insert_rule(rule);
            }
        }
    }

    fn insert_rule(&mut self, rule: CompiledRule) {
        let Some(css) = css_text(&rule) else {
            return;
        };
        if !self.inserted.insert(css.clone()) {
            return;
        }
        let at = insertion_index(&self.ordered, &rule);
        debug!(css = %css, index = at, "insert");
        self.sheet.insert(&css, at);
        self.ordered.insert(at, rule);
    }

    /// Mirror the stylesheet into a shadow root's own sheet.
    pub fn connect(&mut self, root: NodeId) {
        self.sheet.connect(root);
    }

    pub fn disconnect(&mut self, root: NodeId) {
        self.sheet.disconnect(root);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            texts: self.sheet.snapshot(),
            ordered: self.ordered.clone(),
            inserted: self.inserted.clone(),
            classes: self.classes.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: EngineSnapshot) {
        self.sheet.restore(snapshot.texts);
        self.ordered = snapshot.ordered;
        self.inserted = snapshot.inserted;
        self.classes = snapshot.classes;
    }

    /// Drop every rule and memo; the next compile reseeds the preflight.
    pub fn clear(&mut self) {
        self.sheet.clear();
        self.ordered.clear();
        self.inserted.clear();
        self.classes.clear();
    }

    /// Tear the engine down; all further compiles fail.
    pub fn destroy(&mut self) {
        self.clear();
        self.sheet.destroy();
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("rules", &self.ordered.len())
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}
