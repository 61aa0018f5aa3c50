use super::chain::{Chain, ChainForest};
use crate::{NodeId, NodeTree};
use glam::{Quat, Vec3};

/// Node positions and rotations captured at solve start, indexed by slot.
/// Anchors the backward pass and feeds rotation re-derivation.
pub(crate) struct Snapshot {
    pub(crate) positions: Vec<Vec3>,
    pub(crate) rotations: Vec<Quat>,
}

pub(crate) fn snapshot(tree: &NodeTree) -> Snapshot {
    let mut positions = vec![Vec3::ZERO; tree.slot_count()];
    let mut rotations = vec![Quat::IDENTITY; tree.slot_count()];
    for (id, node) in tree.iter() {
        positions[id.index()] = node.position;
        rotations[id.index()] = node.rotation;
    }
    Snapshot {
        positions,
        rotations,
    }
}

/// Iterative forward/backward relaxation over the chain forest.
///
/// Mutates node positions in place; rotations are left for the
/// post-processor. Returns the number of effectors whose residual distance to
/// their blended target is within `tolerance` (0 is valid: out-of-reach
/// targets are not an error).
pub(crate) fn solve(
    tree: &mut NodeTree,
    forest: &ChainForest,
    snapshot: &Snapshot,
    max_iterations: u16,
    tolerance: f32,
) -> u32 {
    if forest.roots.is_empty() {
        return 0;
    }

    // Blend each target by its effector weight once, from the captured tip
    // position. Weight scales the step, not the convergence rate.
    let mut targets: Vec<Option<Vec3>> = vec![None; tree.slot_count()];
    let mut goals: Vec<(NodeId, Vec3)> = Vec::with_capacity(forest.effectors.len());
    for &id in &forest.effectors {
        let Some(effector) = tree.node(id).effector() else {
            continue;
        };
        let weight = effector.weight.clamp(0.0, 1.0);
        let origin = snapshot.positions[id.index()];
        let goal = origin.lerp(effector.target_position, weight);
        targets[id.index()] = Some(goal);
        goals.push((id, goal));
    }

    for _ in 0..max_iterations {
        for chain in &forest.roots {
            // The proposed base position is discarded: root bases are
            // anchored by the backward pass.
            forward(tree, chain, &targets);
        }
        for chain in &forest.roots {
            let Some(&base) = chain.nodes.first() else {
                continue;
            };
            backward(tree, chain, snapshot.positions[base.index()]);
        }
        if reached_count(tree, &goals, tolerance) == goals.len() as u32 {
            break;
        }
    }

    reached_count(tree, &goals, tolerance)
}

/// Tip-to-base pass. Child chains run first; a branch tip is set to the
/// average of the positions its child chains propose for it (an effector on
/// the branch tip contributes its own target to that average). Returns the
/// position this chain proposes for its base node without writing it.
fn forward(tree: &mut NodeTree, chain: &Chain, targets: &[Option<Vec3>]) -> Vec3 {
    let Some(&tip) = chain.nodes.last() else {
        return Vec3::ZERO;
    };

    let mut proposal_sum = Vec3::ZERO;
    let mut proposal_count = 0u32;
    for child in &chain.children {
        proposal_sum += forward(tree, child, targets);
        proposal_count += 1;
    }
    if let Some(goal) = targets[tip.index()] {
        proposal_sum += goal;
        proposal_count += 1;
    }
    let tip_target = if proposal_count == 0 {
        tree.node(tip).position
    } else {
        proposal_sum / proposal_count as f32
    };

    if chain.nodes.len() == 1 {
        return tip_target;
    }
    tree.node_mut(tip).position = tip_target;

    let mut proposed_base = tip_target;
    for i in (0..chain.nodes.len() - 1).rev() {
        let parent = chain.nodes[i];
        let child = chain.nodes[i + 1];
        let child_pos = tree.node(child).position;
        let parent_pos = tree.node(parent).position;
        let segment = tree.node(child).dist_to_parent();
        let moved = match (parent_pos - child_pos).try_normalize() {
            Some(direction) => child_pos + direction * segment,
            // Coincident nodes: no direction to preserve, identity move.
            None => parent_pos,
        };
        if i == 0 {
            proposed_base = moved;
        } else {
            tree.node_mut(parent).position = moved;
        }
    }
    proposed_base
}

/// Base-to-tip pass. Re-anchors the base, restores segment lengths walking
/// outward, then recurses into child chains from the shared tip position.
fn backward(tree: &mut NodeTree, chain: &Chain, base_position: Vec3) {
    let Some(&base) = chain.nodes.first() else {
        return;
    };
    tree.node_mut(base).position = base_position;

    for i in 1..chain.nodes.len() {
        let parent = chain.nodes[i - 1];
        let child = chain.nodes[i];
        let parent_pos = tree.node(parent).position;
        let child_pos = tree.node(child).position;
        let segment = tree.node(child).dist_to_parent();
        let moved = match (child_pos - parent_pos).try_normalize() {
            Some(direction) => parent_pos + direction * segment,
            None => child_pos,
        };
        tree.node_mut(child).position = moved;
    }

    let tip_position = match chain.nodes.last() {
        Some(&tip) => tree.node(tip).position,
        None => base_position,
    };
    for child in &chain.children {
        backward(tree, child, tip_position);
    }
}

fn reached_count(tree: &NodeTree, goals: &[(NodeId, Vec3)], tolerance: f32) -> u32 {
    goals
        .iter()
        .filter(|(id, goal)| tree.node(*id).position.distance(*goal) <= tolerance)
        .count() as u32
}
