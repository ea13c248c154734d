use std::fmt;

use cuegraph_fixtures::FixtureMap;

use crate::remote::{ContinueMode, CueKind, GroupMode};
use crate::timecode::TimeUnits;

/// Identifies a compiled node so start and stop cues can reference their targets before any
/// remote handle exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: usize,
}

impl NodeIdAllocator {
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Group {
        mode: GroupMode,
        number: Option<String>,
        color: Option<String>,
    },
    Light {
        fixtures: FixtureMap,
        duration: TimeUnits,
    },
    Wait {
        duration: TimeUnits,
    },
    Start {
        target: NodeId,
    },
    Stop {
        target: NodeId,
    },
    NetworkCommand {
        patch: u32,
        command: String,
    },
}

/// One cue of a compiled graph. Children are emitted in order, after their parent.
#[derive(Clone, Debug, PartialEq)]
pub struct CueGraphNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub pre_wait: Option<TimeUnits>,
    pub continue_mode: Option<ContinueMode>,
    pub children: Vec<CueGraphNode>,
}

impl CueGraphNode {
    pub fn new(id: NodeId, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            pre_wait: None,
            continue_mode: None,
            children: Vec::new(),
        }
    }

    pub fn group(id: NodeId, name: impl Into<String>, mode: GroupMode) -> Self {
        Self::new(
            id,
            name,
            NodeKind::Group {
                mode,
                number: None,
                color: None,
            },
        )
    }

    pub fn with_pre_wait(mut self, pre_wait: TimeUnits) -> Self {
        self.pre_wait = Some(pre_wait);
        self
    }

    pub fn with_continue_mode(mut self, mode: ContinueMode) -> Self {
        self.continue_mode = Some(mode);
        self
    }

    pub fn with_children(mut self, children: Vec<CueGraphNode>) -> Self {
        self.children = children;
        self
    }

    pub fn push(&mut self, child: CueGraphNode) {
        self.children.push(child);
    }

    pub fn cue_kind(&self) -> CueKind {
        match self.kind {
            NodeKind::Group { .. } => CueKind::Group,
            NodeKind::Light { .. } => CueKind::Light,
            NodeKind::Wait { .. } => CueKind::Wait,
            NodeKind::Start { .. } => CueKind::Start,
            NodeKind::Stop { .. } => CueKind::Stop,
            NodeKind::NetworkCommand { .. } => CueKind::Network,
        }
    }

    /// Nodes in emission order: each node before its children, siblings in order.
    pub fn walk(&self) -> Vec<&CueGraphNode> {
        let mut nodes = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.children.iter().rev());
        }
        nodes
    }

    pub fn find(&self, name: &str) -> Option<&CueGraphNode> {
        self.walk().into_iter().find(|node| node.name == name)
    }

    /// Number of cues this node and its descendants create.
    pub fn node_count(&self) -> usize {
        self.walk().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_is_preorder() {
        let mut ids = NodeIdAllocator::default();
        let root = CueGraphNode::group(ids.allocate(), "root", GroupMode::Timeline).with_children(
            vec![
                CueGraphNode::group(ids.allocate(), "a", GroupMode::FireFirstEnter).with_children(
                    vec![CueGraphNode::new(
                        ids.allocate(),
                        "a1",
                        NodeKind::Wait { duration: 0 },
                    )],
                ),
                CueGraphNode::new(ids.allocate(), "b", NodeKind::Wait { duration: 0 }),
            ],
        );

        let order: Vec<&str> = root.walk().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(order, vec!["root", "a", "a1", "b"]);
        assert_eq!(root.node_count(), 4);
        assert_eq!(root.find("a1").map(|n| n.id), Some(NodeId(2)));
    }
}
