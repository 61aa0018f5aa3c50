use super::chain::{Chain, ChainForest};
use super::fabrik::Snapshot;
use super::SolverFeatures;
use crate::{Constraint, NodeId, NodeTree};
use glam::{Quat, Vec3};
use std::f32::consts::{PI, TAU};

/// Post-solve rotation pass. Position-only solving loses orientation for
/// joints without an explicit target rotation, so rotations are re-derived
/// from the solved positions, biased by poles, then clamped by constraints.
/// Constraints run only after all positions are final, never mid-iteration.
pub(crate) fn apply(
    tree: &mut NodeTree,
    forest: &ChainForest,
    snapshot: &Snapshot,
    features: SolverFeatures,
) {
    if features.contains(SolverFeatures::JOINT_ROTATIONS) {
        for chain in &forest.roots {
            derive_chain(tree, chain, snapshot, true);
        }
    }
    if features.contains(SolverFeatures::TARGET_ROTATIONS) {
        apply_target_rotations(tree, forest);
    }
    if features.contains(SolverFeatures::CONSTRAINTS) {
        apply_constraints(tree, forest, snapshot);
    }
}

/// Derives each joint's rotation from the segment to its chain child: the
/// rotation mapping the original bone direction onto the solved bone
/// direction, composed onto the joint's original rotation. The tip inherits
/// its parent segment's delta. Child chains skip their shared first node;
/// the parent chain owns it.
fn derive_chain(tree: &mut NodeTree, chain: &Chain, snapshot: &Snapshot, is_root: bool) {
    let count = chain.nodes.len();
    let start = if is_root { 0 } else { 1 };
    let mut last_delta = Quat::IDENTITY;

    for i in 0..count.saturating_sub(1) {
        let parent = chain.nodes[i];
        let child = chain.nodes[i + 1];
        let old_dir = snapshot.positions[child.index()] - snapshot.positions[parent.index()];
        let new_dir = tree.node(child).position - tree.node(parent).position;
        let delta = match (old_dir.try_normalize(), new_dir.try_normalize()) {
            (Some(old_dir), Some(new_dir)) => Quat::from_rotation_arc(old_dir, new_dir),
            _ => Quat::IDENTITY,
        };
        last_delta = delta;
        if i >= start {
            let derived = (delta * snapshot.rotations[parent.index()]).normalize();
            let derived = bias_toward_pole(tree, parent, child, derived);
            tree.node_mut(parent).rotation = derived;
        }
    }

    if count >= 1 && count - 1 >= start {
        let tip = chain.nodes[count - 1];
        tree.node_mut(tip).rotation = (last_delta * snapshot.rotations[tip.index()]).normalize();
    }

    for child in &chain.children {
        derive_chain(tree, child, snapshot, false);
    }
}

/// Rolls the derived rotation about the solved bone axis so the joint's
/// reference axis points toward the pole target.
fn bias_toward_pole(tree: &NodeTree, node: NodeId, child: NodeId, rotation: Quat) -> Quat {
    let Some(pole) = tree.node(node).pole() else {
        return rotation;
    };
    let node_pos = tree.node(node).position;
    let Some(bone_axis) = (tree.node(child).position - node_pos).try_normalize() else {
        return rotation;
    };
    let to_pole = (pole.target_position - node_pos).reject_from_normalized(bone_axis);
    let reference = (rotation * pole.kind.reference_axis()).reject_from_normalized(bone_axis);
    let (Some(to_pole), Some(reference)) = (to_pole.try_normalize(), reference.try_normalize())
    else {
        return rotation;
    };
    let roll = reference
        .cross(to_pole)
        .dot(bone_axis)
        .atan2(reference.dot(to_pole));
    (Quat::from_axis_angle(bone_axis, roll + pole.angle) * rotation).normalize()
}

fn apply_target_rotations(tree: &mut NodeTree, forest: &ChainForest) {
    for &id in &forest.effectors {
        let Some(effector) = tree.node(id).effector() else {
            continue;
        };
        let Some(target_rotation) = effector.target_rotation else {
            continue;
        };
        let weight = effector.weight.clamp(0.0, 1.0);
        let current = tree.node(id).rotation;
        tree.node_mut(id).rotation = current.slerp(target_rotation, weight).normalize();
    }
}

fn apply_constraints(tree: &mut NodeTree, forest: &ChainForest, snapshot: &Snapshot) {
    for chain in &forest.roots {
        constrain_chain(tree, chain, snapshot, true);
    }
}

fn constrain_chain(tree: &mut NodeTree, chain: &Chain, snapshot: &Snapshot, is_root: bool) {
    let start = if is_root { 0 } else { 1 };
    for &id in &chain.nodes[start.min(chain.nodes.len())..] {
        constrain_node(tree, id, snapshot);
    }
    for child in &chain.children {
        constrain_chain(tree, child, snapshot, false);
    }
}

fn constrain_node(tree: &mut NodeTree, id: NodeId, snapshot: &Snapshot) {
    let Some(constraint) = tree.node(id).constraint().cloned() else {
        return;
    };
    let derived = tree.node(id).rotation;
    let adjusted = match constraint {
        Constraint::Stiff => snapshot.rotations[id.index()],
        Constraint::Hinge {
            axis,
            min_angle,
            max_angle,
        } => clamp_hinge(derived, axis, min_angle, max_angle),
        Constraint::Cone { angle } => clamp_cone(snapshot.rotations[id.index()], derived, angle),
        Constraint::Custom(callback) => {
            let mut rotation = derived;
            let node = tree.node(id);
            match callback(node, &mut rotation) {
                Ok(()) => rotation.normalize(),
                Err(message) => {
                    log::warn!(
                        "constraint callback failed for node {}: {message}",
                        node.user_id()
                    );
                    derived
                }
            }
        }
    };
    tree.node_mut(id).rotation = adjusted;
}

fn clamp_hinge(rotation: Quat, axis: Vec3, min_angle: f32, max_angle: f32) -> Quat {
    let Some(axis) = axis.try_normalize() else {
        return rotation;
    };
    let vector = Vec3::new(rotation.x, rotation.y, rotation.z);
    let mut angle = 2.0 * vector.dot(axis).atan2(rotation.w);
    if angle > PI {
        angle -= TAU;
    } else if angle < -PI {
        angle += TAU;
    }
    Quat::from_axis_angle(axis, angle.clamp(min_angle, max_angle))
}

fn clamp_cone(original: Quat, rotation: Quat, max_angle: f32) -> Quat {
    let deviation = original.angle_between(rotation);
    if deviation <= max_angle || deviation <= f32::EPSILON {
        return rotation;
    }
    original.slerp(rotation, max_angle / deviation).normalize()
}
