//! Scene integration tests
//!
//! Lifecycle ordering is observed through [`Recorder`] behaviours appending
//! to a shared log.

mod pipeline;

use crate::context::Context;
use crate::core::config::ApplicationConfig;
use crate::scene::{HookResult, Node, NodeBehaviour};
use std::cell::RefCell;
use std::rc::Rc;

pub(super) type Log = Rc<RefCell<Vec<String>>>;

pub(super) fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub(super) fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

pub(super) fn context() -> Context {
    Context::new(&ApplicationConfig::default())
}

/// Appends `"<node>:<hook>"` for every hook it receives
pub(super) struct Recorder {
    pub(super) log: Log,
}

impl Recorder {
    fn push(&self, node: &Node, hook: &str) {
        self.log.borrow_mut().push(format!("{}:{}", node.name(), hook));
    }
}

impl NodeBehaviour for Recorder {
    fn on_init(&mut self, node: &Node, _ctx: &mut Context) -> HookResult {
        self.push(node, "init");
        Ok(())
    }

    fn on_ready(&mut self, node: &Node, _ctx: &mut Context) -> HookResult {
        self.push(node, "ready");
        Ok(())
    }

    fn on_process(&mut self, node: &Node, _ctx: &mut Context, _delta: f32) -> HookResult {
        self.push(node, "process");
        Ok(())
    }

    fn on_child_added(&mut self, node: &Node, child: &Node, _ctx: &mut Context) -> HookResult {
        self.push(node, &format!("child_added({})", child.name()));
        Ok(())
    }

    fn on_destroy(&mut self, node: &Node, _ctx: &mut Context) -> HookResult {
        self.push(node, "destroy");
        Ok(())
    }
}

/// Build a node carrying a [`Recorder`]
pub(super) fn recorded(name: &str, log: &Log, ctx: &mut Context) -> Node {
    Node::builder(name)
        .behaviour(Recorder { log: log.clone() })
        .build(ctx)
        .unwrap()
}
