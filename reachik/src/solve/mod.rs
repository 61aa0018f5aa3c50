pub(crate) mod chain;
mod fabrik;
mod rotations;

use self::chain::{Chain, ChainForest};
use crate::{Error, Node, NodeTree};
use bitflags::bitflags;

bitflags! {
    /// Optional solver behaviors, effective on the next `solve`.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct SolverFeatures: u8 {
        /// Clamp re-derived rotations with attached constraints.
        const CONSTRAINTS = 0x01;
        /// Blend effector target rotations into their tip nodes.
        const TARGET_ROTATIONS = 0x02;
        /// Re-derive joint rotations from solved positions (poles apply
        /// during this derivation).
        const JOINT_ROTATIONS = 0x04;
    }
}

/// Orchestrates chain decomposition and the iterative solve.
///
/// The solver owns the node tree between [`set_tree`](Self::set_tree) and
/// [`unlink_tree`](Self::unlink_tree). Structural changes made through
/// [`tree_mut`](Self::tree_mut) (adding/removing nodes, attaching/detaching
/// effectors) invalidate the chain forest; call [`rebuild`](Self::rebuild)
/// before the next [`solve`](Self::solve). Pose and target updates need no
/// rebuild.
pub struct Solver {
    tree: Option<NodeTree>,
    forest: ChainForest,
    built: bool,
    max_iterations: u16,
    tolerance: f32,
    features: SolverFeatures,
}

impl Solver {
    pub fn new() -> Self {
        Self {
            tree: None,
            forest: ChainForest::empty(),
            built: false,
            max_iterations: 20,
            tolerance: 1.0e-3,
            features: SolverFeatures::all(),
        }
    }

    /// Links a tree to the solver, returning any previously linked tree.
    /// Invalidates the chain forest.
    pub fn set_tree(&mut self, tree: NodeTree) -> Option<NodeTree> {
        self.invalidate();
        self.tree.replace(tree)
    }

    /// Returns the linked tree to the caller. Invalidates the chain forest.
    pub fn unlink_tree(&mut self) -> Option<NodeTree> {
        self.invalidate();
        self.tree.take()
    }

    pub fn tree(&self) -> Option<&NodeTree> {
        self.tree.as_ref()
    }

    pub fn tree_mut(&mut self) -> Option<&mut NodeTree> {
        self.tree.as_mut()
    }

    /// Decomposes the linked tree into chains and refreshes cached segment
    /// lengths. Must be called after every structural change. On failure the
    /// previous forest storage is kept but the solver is no longer solvable
    /// until a rebuild succeeds.
    pub fn rebuild(&mut self) -> Result<(), Error> {
        let Some(tree) = self.tree.as_mut() else {
            self.built = false;
            return Err(Error::InvalidTree);
        };
        chain::update_distances(tree);
        match chain::build(tree) {
            Ok(forest) => {
                log::debug!(
                    "rebuilt chain forest: {} root chains, {} effectors",
                    forest.roots.len(),
                    forest.effectors.len()
                );
                self.forest = forest;
                self.built = true;
                Ok(())
            }
            Err(err) => {
                self.built = false;
                Err(err)
            }
        }
    }

    /// Recomputes cached segment lengths from current node positions. Rigs
    /// with translational joint motion call this every frame; others never
    /// need it outside [`rebuild`](Self::rebuild).
    pub fn update_distances(&mut self) {
        if let Some(tree) = self.tree.as_mut() {
            chain::update_distances(tree);
        }
    }

    /// Runs the iterative solve and the rotation post-pass, mutating node
    /// positions and rotations in place. Returns how many effectors ended
    /// within `tolerance` of their (weight-blended) target; 0 simply means
    /// every target was out of reach.
    pub fn solve(&mut self) -> Result<u32, Error> {
        if !self.built {
            return Err(Error::NotBuilt);
        }
        let Some(tree) = self.tree.as_mut() else {
            return Err(Error::NotBuilt);
        };
        let snapshot = fabrik::snapshot(tree);
        let reached = fabrik::solve(
            tree,
            &self.forest,
            &snapshot,
            self.max_iterations,
            self.tolerance,
        );
        rotations::apply(tree, &self.forest, &snapshot, self.features);
        log::debug!(
            "solve: {reached}/{} effectors reached",
            self.forest.effectors.len()
        );
        Ok(reached)
    }

    pub fn max_iterations(&self) -> u16 {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: u16) -> Result<(), Error> {
        if max_iterations == 0 {
            return Err(Error::InvalidValue {
                message: "max_iterations must be greater than zero".to_string(),
            });
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f32) -> Result<(), Error> {
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(Error::InvalidValue {
                message: "tolerance must be a positive number".to_string(),
            });
        }
        self.tolerance = tolerance;
        Ok(())
    }

    pub fn features(&self) -> SolverFeatures {
        self.features
    }

    pub fn enable_features(&mut self, features: SolverFeatures) {
        self.features |= features;
    }

    pub fn disable_features(&mut self, features: SolverFeatures) {
        self.features -= features;
    }

    pub fn has_features(&self, features: SolverFeatures) -> bool {
        self.features.contains(features)
    }

    /// Every node of the linked tree, pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.tree
            .as_ref()
            .into_iter()
            .flat_map(|tree| tree.iter().map(|(_, node)| node))
    }

    /// Every chain member, forest order, each node exactly once (shared
    /// branch nodes are reported by their parent chain).
    pub fn affected_nodes(&self) -> AffectedNodes<'_> {
        AffectedNodes {
            tree: self.tree.as_ref(),
            stack: self.forest.roots.iter().rev().map(|c| (c, 0)).collect(),
        }
    }

    /// The base node of each root chain: tree-root anchors and the anchored
    /// bases of chain-length-limited islands.
    pub fn base_nodes(&self) -> impl Iterator<Item = &Node> {
        self.forest.roots.iter().filter_map(|chain| {
            let &base = chain.nodes.first()?;
            self.tree.as_ref()?.get(base)
        })
    }

    fn invalidate(&mut self) {
        self.forest = ChainForest::empty();
        self.built = false;
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy traversal over the chain forest; restartable by calling
/// [`Solver::affected_nodes`] again. Invalidated, like the forest itself, by
/// structural tree changes.
pub struct AffectedNodes<'a> {
    tree: Option<&'a NodeTree>,
    stack: Vec<(&'a Chain, usize)>,
}

impl<'a> Iterator for AffectedNodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree?;
        loop {
            let advanced = {
                let (chain, cursor) = self.stack.last_mut()?;
                if *cursor < chain.nodes.len() {
                    let id = chain.nodes[*cursor];
                    *cursor += 1;
                    if let Some(node) = tree.get(id) {
                        return Some(node);
                    }
                    true
                } else {
                    false
                }
            };
            if !advanced {
                if let Some((chain, _)) = self.stack.pop() {
                    for child in chain.children.iter().rev() {
                        // Skip the shared first node; the parent chain
                        // already yielded it.
                        self.stack.push((child, 1));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod chain_tests;
