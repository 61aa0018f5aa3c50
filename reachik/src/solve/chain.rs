use crate::{Error, NodeId, NodeTree};

/// One kinematic chain, ordered base (nearer the root) to tip. The tip is an
/// effector node or a branch point; each child chain shares its first node
/// with this chain's tip.
#[derive(Clone, Debug)]
pub(crate) struct Chain {
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) children: Vec<Chain>,
}

/// The full set of chains derived from one node tree. Root chains are either
/// anchored at the tree root or at the base of a chain-length-limited island.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChainForest {
    pub(crate) roots: Vec<Chain>,
    pub(crate) effectors: Vec<NodeId>,
}

impl ChainForest {
    pub(crate) fn empty() -> Self {
        Self::default()
    }
}

/// Decomposes the tree into a chain forest.
///
/// Mark phase: every effector walks upward, marking at most
/// `chain_length` parents (0 = unlimited). Build phase: each island of marked
/// nodes grows chains downward; a chain ends at an effector node or where the
/// marked subtree branches, and every marked child of the tip starts a child
/// chain that begins at the tip itself. Child chains follow child insertion
/// order.
pub(crate) fn build(tree: &NodeTree) -> Result<ChainForest, Error> {
    let mut effectors = Vec::new();
    for (id, node) in tree.iter() {
        if node.effector().is_some() {
            effectors.push(id);
        }
    }
    if effectors.is_empty() {
        return Ok(ChainForest::empty());
    }

    let mut marked = vec![false; tree.slot_count()];
    for &effector in &effectors {
        let limit = tree
            .node(effector)
            .effector()
            .map(|e| e.chain_length)
            .unwrap_or(0);
        let mut remaining = limit;
        let mut visited = 0usize;
        let mut cursor = Some(effector);
        while let Some(id) = cursor {
            visited += 1;
            if visited > tree.len() {
                return Err(Error::ChainBuildFailure {
                    message: format!(
                        "parent links of node {} do not terminate at a root",
                        tree.node(effector).user_id()
                    ),
                });
            }
            marked[id.index()] = true;
            if limit != 0 {
                if remaining == 0 {
                    break;
                }
                remaining -= 1;
            }
            cursor = tree.parent(id);
        }
    }

    let mut roots = Vec::new();
    for (id, _) in tree.iter() {
        if !marked[id.index()] {
            continue;
        }
        let island_root = match tree.parent(id) {
            None => true,
            Some(parent) => !marked[parent.index()],
        };
        if island_root {
            roots.push(build_chain(tree, &marked, id, None));
        }
    }

    Ok(ChainForest { roots, effectors })
}

fn build_chain(tree: &NodeTree, marked: &[bool], base: NodeId, first: Option<NodeId>) -> Chain {
    let mut nodes = vec![base];
    let mut cursor = base;
    if let Some(first) = first {
        nodes.push(first);
        cursor = first;
    }
    loop {
        // A chain ends at its effector; anything below continues as child
        // chains. The shared first node of a child chain is never re-checked.
        if tree.node(cursor).effector().is_some() {
            break;
        }
        let mut only_child = None;
        let mut marked_children = 0usize;
        for &child in tree.children(cursor) {
            if marked[child.index()] {
                marked_children += 1;
                only_child = Some(child);
            }
        }
        if marked_children != 1 {
            break;
        }
        let Some(next) = only_child else { break };
        nodes.push(next);
        cursor = next;
    }

    let children = tree
        .children(cursor)
        .iter()
        .filter(|c| marked[c.index()])
        .map(|&c| build_chain(tree, marked, cursor, Some(c)))
        .collect();

    Chain { nodes, children }
}

/// Recomputes every node's cached distance to its parent from current
/// positions. Rebuild does this once; rigs with translational joint motion
/// re-invoke it whenever positions change outside the solver.
pub(crate) fn update_distances(tree: &mut NodeTree) {
    let ids: Vec<NodeId> = tree.iter().map(|(id, _)| id).collect();
    for id in ids {
        let dist = match tree.parent(id) {
            Some(parent) => tree.node(parent).position.distance(tree.node(id).position),
            None => 0.0,
        };
        tree.node_mut(id).set_dist_to_parent(dist);
    }
}
