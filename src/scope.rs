//! The top-level handle tying an engine to observed hosts.
//!
//! A [`Scope`] owns one [`Engine`] and one [`Reactor`]. Attaching a host
//! root mirrors the stylesheet into it and starts compiling its class
//! attributes; any number of hosts share the same engine, so they all see
//! identical rules in identical order.

use crate::config::Config;
use crate::dom::{Dom, NodeId};
use crate::engine::{Engine, EngineError};
use crate::observe::Reactor;

pub struct Scope {
    engine: Engine,
    reactor: Reactor,
}

impl Scope {
    pub fn new(config: Config) -> Self {
        Self {
            engine: Engine::new(config),
            reactor: Reactor::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Attach a host root: replicate the stylesheet into it and begin
    /// observing its subtree.
    pub fn attach(&mut self, dom: &mut Dom, root: NodeId) -> Result<(), EngineError> {
        self.engine.connect(root);
        self.reactor.observe(dom, &mut self.engine, root)
    }

    /// Detach a host root; its replica and observation both stop.
    pub fn detach(&mut self, dom: &mut Dom, root: NodeId) {
        self.reactor.unobserve(dom, root);
        self.engine.disconnect(root);
    }

    /// Compile a class string directly, without involving the DOM.
    pub fn compile(&mut self, input: &str) -> Result<String, EngineError> {
        self.engine.compile(input)
    }

    /// Process pending DOM mutations.
    pub fn flush(&mut self, dom: &mut Dom) -> Result<(), EngineError> {
        self.reactor.flush(dom, &mut self.engine)
    }

    pub fn pause(&mut self) {
        self.reactor.pause();
    }

    pub fn resume(&mut self, dom: &mut Dom) -> Result<(), EngineError> {
        self.reactor.resume(dom, &mut self.engine)
    }

    /// Tear everything down; further compiles fail.
    pub fn destroy(&mut self) {
        self.engine.destroy();
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").finish_non_exhaustive()
    }
}
