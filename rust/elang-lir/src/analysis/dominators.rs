//! Dominator and post-dominator trees.
//!
//! Iterative algorithm over reverse postorder (Cooper, Harvey and
//! Kennedy, "A Simple, Fast Dominance Algorithm"). The post-dominator
//! variant runs the same computation over the reversed CFG rooted at
//! the exit block.

use crate::function::{BlockId, Function};
use std::collections::HashMap;

pub struct DominatorTree {
    root: BlockId,
    idom: HashMap<BlockId, BlockId>,
    children: HashMap<BlockId, Vec<BlockId>>,
    rpo_number: HashMap<BlockId, usize>,
}

impl DominatorTree {
    pub fn compute(function: &Function) -> Self {
        Self::build(
            function,
            function.entry_block,
            |f, b| f.block(b).successors.clone(),
            |f, b| f.block(b).predecessors.clone(),
        )
    }

    pub fn compute_post(function: &Function) -> Self {
        Self::build(
            function,
            function.exit_block,
            |f, b| f.block(b).predecessors.clone(),
            |f, b| f.block(b).successors.clone(),
        )
    }

    fn build(
        function: &Function,
        root: BlockId,
        forward: fn(&Function, BlockId) -> Vec<BlockId>,
        backward: fn(&Function, BlockId) -> Vec<BlockId>,
    ) -> Self {
        // Depth-first postorder from the root, restricted to reachable
        // blocks.
        let mut postorder = Vec::new();
        let mut visited: std::collections::HashSet<BlockId> = std::collections::HashSet::new();
        visited.insert(root);
        let mut stack: Vec<(BlockId, usize)> = vec![(root, 0)];
        loop {
            let Some(&(block, next)) = stack.last() else {
                break;
            };
            let successors = forward(function, block);
            if next < successors.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 = next + 1;
                }
                let successor = successors[next];
                if visited.insert(successor) {
                    stack.push((successor, 0));
                }
                continue;
            }
            postorder.push(block);
            stack.pop();
        }

        let mut rpo: Vec<BlockId> = postorder.clone();
        rpo.reverse();
        let rpo_number: HashMap<BlockId, usize> =
            rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
        idom.insert(root, root);
        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for pred in backward(function, block) {
                    if !idom.contains_key(&pred) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &rpo_number, pred, current),
                    });
                }
                let Some(new_idom) = new_idom else {
                    continue;
                };
                if idom.get(&block) != Some(&new_idom) {
                    idom.insert(block, new_idom);
                    changed = true;
                }
            }
        }

        let mut children: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for (&block, &parent) in &idom {
            if block != parent {
                children.entry(parent).or_default().push(block);
            }
        }
        // Deterministic child order.
        for list in children.values_mut() {
            list.sort_by_key(|b| rpo_number.get(b).copied().unwrap_or(usize::MAX));
        }

        Self {
            root,
            idom,
            children,
            rpo_number,
        }
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.idom.contains_key(&block)
    }

    pub fn idom_of(&self, block: BlockId) -> Option<BlockId> {
        if block == self.root {
            return None;
        }
        self.idom.get(&block).copied()
    }

    pub fn children_of(&self, block: BlockId) -> &[BlockId] {
        self.children.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reflexive dominance test by walking the idom chain.
    pub fn dominates(&self, dominator: BlockId, block: BlockId) -> bool {
        let mut current = block;
        loop {
            if current == dominator {
                return true;
            }
            match self.idom_of(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Dominator-tree preorder starting at the root.
    pub fn preorder(&self) -> Vec<BlockId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(block) = stack.pop() {
            order.push(block);
            for &child in self.children_of(block).iter().rev() {
                stack.push(child);
            }
        }
        order
    }
}

fn intersect(
    idom: &HashMap<BlockId, BlockId>,
    rpo_number: &HashMap<BlockId, usize>,
    a: BlockId,
    b: BlockId,
) -> BlockId {
    let mut finger1 = a;
    let mut finger2 = b;
    while finger1 != finger2 {
        while rpo_number[&finger1] > rpo_number[&finger2] {
            finger1 = idom[&finger1];
        }
        while rpo_number[&finger2] > rpo_number[&finger1] {
            finger2 = idom[&finger2];
        }
    }
    finger1
}
