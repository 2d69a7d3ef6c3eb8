//! Listener dispatch: two fixed tables (enter/exit) indexed by grammar-id
//! (spec §4.3). The walk flattens the tree into an ordered cursor and
//! applies the matching handler at each step; unregistered GIDs are
//! no-ops. There is no recursive call stack here — `walk` drives a flat
//! loop over the precomputed cursor rather than recursing into
//! `Node::children` (spec §5: "no recursive C-style call stack").
//!
//! A handler that determines a statement needs other pools (spec §4.4)
//! returns `ExitAction::Forward` instead of sending itself; the caller
//! (`state::Runtime`) owns the actual `Pools::send_pkg` fan-out and the
//! merge step, since only it holds a live `Pools` handle.

use std::collections::HashMap;

use super::context::LocalData;
use super::error::QueryError;
use super::gid::Gid;
use super::node::{flatten, Node, Phase};
use super::query::{Entity, Query};

pub type EnterFn = fn(&mut Query, &LocalData, &Node) -> Result<(), QueryError>;
pub type ExitFn = fn(&mut Query, &LocalData, &Node) -> Result<ExitAction, QueryError>;

/// What a statement needs forwarded to peer pools, and which merge
/// strategy applies to the responses (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardKind {
    ListEntity(Entity),
    CountEntity(Entity),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitAction {
    Continue,
    Forward { pkg: Vec<u8>, kind: ForwardKind },
}

/// A pending forward request gathered during one walk, keyed by the
/// exit node that raised it (statements only ever forward once, but
/// nothing here assumes that).
pub struct ForwardRequest {
    pub gid: Gid,
    pub pkg: Vec<u8>,
    pub kind: ForwardKind,
}

#[derive(Default)]
pub struct ListenerTables {
    on_enter: HashMap<Gid, EnterFn>,
    on_exit: HashMap<Gid, ExitFn>,
}

impl ListenerTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enter(mut self, gid: Gid, f: EnterFn) -> Self {
        self.on_enter.insert(gid, f);
        self
    }

    pub fn on_exit(mut self, gid: Gid, f: ExitFn) -> Self {
        self.on_exit.insert(gid, f);
        self
    }
}

/// Walk `tree`, driving `query` through every registered handler in
/// strict DFS pre/post order (spec §5). Stops visiting further nodes as
/// soon as a handler fails (`query.err_msg` is set); returns whatever
/// forward requests were raised before that point.
pub fn walk(tables: &ListenerTables, tree: &Node, query: &mut Query, local: &LocalData) -> Vec<ForwardRequest> {
    let mut forwards = Vec::new();

    for step in flatten(tree) {
        if query.has_failed() {
            break;
        }
        match step.phase {
            Phase::Enter => {
                if let Some(handler) = tables.on_enter.get(&step.node.gid) {
                    if let Err(err) = handler(query, local, step.node) {
                        query.fail(err.to_string());
                    }
                }
            }
            Phase::Exit => {
                if let Some(handler) = tables.on_exit.get(&step.node.gid) {
                    match handler(query, local, step.node) {
                        Ok(ExitAction::Continue) => {}
                        Ok(ExitAction::Forward { pkg, kind }) => forwards.push(ForwardRequest {
                            gid: step.node.gid,
                            pkg,
                            kind,
                        }),
                        Err(err) => query.fail(err.to_string()),
                    }
                }
            }
        }
    }

    forwards
}
