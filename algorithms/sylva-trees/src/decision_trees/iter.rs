use std::collections::VecDeque;
use std::iter::Iterator;

use super::{NodeIndex, TreeNode};

/// Level-order (BFT) iterator of nodes in a decision tree
pub struct NodeIter<'a> {
    nodes: &'a [TreeNode],
    queue: VecDeque<NodeIndex>,
}

impl<'a> NodeIter<'a> {
    pub fn new(nodes: &'a [TreeNode]) -> Self {
        let queue = if nodes.is_empty() {
            VecDeque::new()
        } else {
            VecDeque::from(vec![NodeIndex::ROOT])
        };
        NodeIter { nodes, queue }
    }
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front().map(|index| {
            let node = &self.nodes[index.index()];
            if let Some((left, right)) = node.children() {
                self.queue.push_back(left);
                self.queue.push_back(right);
            }

            node
        })
    }
}
