//! Parse-tree shape the dispatch layer walks (spec §1: "we depend only
//! on a parse-tree shape", the grammar itself is out of scope). A `Node`
//! carries a `Gid`, optional literal text (an identifier, number, or
//! operator token) and an ordered list of children.

use super::gid::Gid;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub gid: Gid,
    pub text: Option<String>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(gid: Gid) -> Self {
        Self {
            gid,
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(gid: Gid, text: impl Into<String>) -> Self {
        Self {
            gid,
            text: Some(text.into()),
            children: Vec::new(),
        }
    }

    pub fn with_children(gid: Gid, children: Vec<Node>) -> Self {
        Self {
            gid,
            text: None,
            children,
        }
    }

    pub fn push(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }
}

/// Which half of the DFS walk a step represents (spec §4.3: "the walk
/// flattens the tree into an ordered cursor of `(node, phase)` pairs").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Exit,
}

pub struct Step<'a> {
    pub node: &'a Node,
    pub phase: Phase,
}

/// Flatten `root` into its enter/exit cursor, strictly DFS pre/post
/// order (spec §5: "enter/exit handlers run in DFS pre/post order
/// strictly").
pub fn flatten(root: &Node) -> Vec<Step<'_>> {
    let mut steps = Vec::new();
    flatten_into(root, &mut steps);
    steps
}

fn flatten_into<'a>(node: &'a Node, steps: &mut Vec<Step<'a>>) {
    steps.push(Step {
        node,
        phase: Phase::Enter,
    });
    for child in &node.children {
        flatten_into(child, steps);
    }
    steps.push(Step {
        node,
        phase: Phase::Exit,
    });
}
