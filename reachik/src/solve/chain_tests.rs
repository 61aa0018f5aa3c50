use super::chain::{self, Chain};
use crate::{Effector, NodeId, NodeTree};
use glam::Vec3;

/// Chain-tree structure reduced to user ids, for whole-forest comparisons.
#[derive(Debug, PartialEq, Eq)]
struct Shape {
    nodes: Vec<u32>,
    children: Vec<Shape>,
}

fn shape(tree: &NodeTree, chain: &Chain) -> Shape {
    Shape {
        nodes: chain
            .nodes
            .iter()
            .map(|&id| tree.node(id).user_id())
            .collect(),
        children: chain.children.iter().map(|c| shape(tree, c)).collect(),
    }
}

fn linear_chain(segments: u32) -> (NodeTree, NodeId) {
    let mut tree = NodeTree::new(0);
    let mut parent = tree.root();
    for i in 1..=segments {
        parent = tree.create_child(parent, i).unwrap();
        tree.node_mut(parent).position = Vec3::new(0.0, i as f32, 0.0);
    }
    (tree, parent)
}

/// Spine 0-1-2-3 with two arms off node 3: 4-5-6 and 7-8-9.
fn two_arm_rig() -> (NodeTree, NodeId, NodeId) {
    let (mut tree, spine_top) = linear_chain(3);
    let mut guid = 4;
    let mut tips = [None, None];
    for (side_index, side) in [-1.0f32, 1.0].into_iter().enumerate() {
        let mut arm = spine_top;
        for i in 1..=3 {
            arm = tree.create_child(arm, guid).unwrap();
            guid += 1;
            tree.node_mut(arm).position = Vec3::new(side * i as f32, 3.0 + i as f32, 0.0);
        }
        tips[side_index] = Some(arm);
    }
    (tree, tips[0].unwrap(), tips[1].unwrap())
}

#[test]
fn no_effectors_builds_an_empty_forest() {
    let (tree, _) = linear_chain(4);
    let forest = chain::build(&tree).unwrap();
    assert!(forest.roots.is_empty());
    assert!(forest.effectors.is_empty());
}

#[test]
fn unlimited_effector_chains_to_the_root() {
    let (mut tree, tip) = linear_chain(4);
    tree.attach_effector(tip, Effector::reaching(Vec3::X)).unwrap();

    let forest = chain::build(&tree).unwrap();
    assert_eq!(forest.roots.len(), 1);
    assert_eq!(
        shape(&tree, &forest.roots[0]),
        Shape {
            nodes: vec![0, 1, 2, 3, 4],
            children: vec![],
        }
    );
    assert_eq!(forest.effectors.len(), 1);
}

#[test]
fn chain_length_limit_carves_an_island() {
    let (mut tree, tip) = linear_chain(4);
    tree.attach_effector(
        tip,
        Effector {
            target_position: Vec3::X,
            chain_length: 2,
            ..Effector::default()
        },
    )
    .unwrap();

    let forest = chain::build(&tree).unwrap();
    assert_eq!(forest.roots.len(), 1);
    // Limit 2 => tip plus two parents; the island base is node 2, not the
    // tree root.
    assert_eq!(
        shape(&tree, &forest.roots[0]),
        Shape {
            nodes: vec![2, 3, 4],
            children: vec![],
        }
    );
}

#[test]
fn two_arms_share_one_base_chain() {
    let (mut tree, left, right) = two_arm_rig();
    tree.attach_effector(left, Effector::reaching(Vec3::X)).unwrap();
    tree.attach_effector(right, Effector::reaching(Vec3::Y)).unwrap();

    let forest = chain::build(&tree).unwrap();
    assert_eq!(forest.roots.len(), 1);
    assert_eq!(
        shape(&tree, &forest.roots[0]),
        Shape {
            nodes: vec![0, 1, 2, 3],
            children: vec![
                Shape {
                    nodes: vec![3, 4, 5, 6],
                    children: vec![],
                },
                Shape {
                    nodes: vec![3, 7, 8, 9],
                    children: vec![],
                },
            ],
        }
    );
}

#[test]
fn three_way_branch_follows_child_insertion_order() {
    let mut tree = NodeTree::new(0);
    let hub = tree.create_child(tree.root(), 1).unwrap();
    tree.node_mut(hub).position = Vec3::new(0.0, 1.0, 0.0);
    for (i, offset) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().enumerate() {
        let finger = tree.create_child(hub, 10 + i as u32).unwrap();
        tree.node_mut(finger).position = Vec3::new(0.0, 1.0, 0.0) + offset;
        tree.attach_effector(finger, Effector::reaching(offset * 2.0))
            .unwrap();
    }

    let forest = chain::build(&tree).unwrap();
    assert_eq!(forest.roots.len(), 1);
    let root = shape(&tree, &forest.roots[0]);
    assert_eq!(root.nodes, vec![0, 1]);
    assert_eq!(root.children.len(), 3);
    assert_eq!(root.children[0].nodes, vec![1, 10]);
    assert_eq!(root.children[1].nodes, vec![1, 11]);
    assert_eq!(root.children[2].nodes, vec![1, 12]);
}

#[test]
fn effector_on_the_root_forms_a_single_node_chain() {
    let mut tree = NodeTree::new(0);
    tree.create_child(tree.root(), 1).unwrap();
    tree.attach_effector(tree.root(), Effector::reaching(Vec3::X))
        .unwrap();

    let forest = chain::build(&tree).unwrap();
    assert_eq!(forest.roots.len(), 1);
    assert_eq!(
        shape(&tree, &forest.roots[0]),
        Shape {
            nodes: vec![0],
            children: vec![],
        }
    );
}

#[test]
fn effector_midway_splits_the_chain_into_sections() {
    let (mut tree, tip) = linear_chain(4);
    let mid = tree.find(2).unwrap();
    tree.attach_effector(mid, Effector::reaching(Vec3::X)).unwrap();
    tree.attach_effector(tip, Effector::reaching(Vec3::Y)).unwrap();

    let forest = chain::build(&tree).unwrap();
    assert_eq!(forest.roots.len(), 1);
    assert_eq!(
        shape(&tree, &forest.roots[0]),
        Shape {
            nodes: vec![0, 1, 2],
            children: vec![Shape {
                nodes: vec![2, 3, 4],
                children: vec![],
            }],
        }
    );
}

#[test]
fn rebuild_after_detach_and_identical_reattach_reproduces_the_forest() {
    let (mut tree, left, right) = two_arm_rig();
    tree.attach_effector(left, Effector::reaching(Vec3::X)).unwrap();
    tree.attach_effector(right, Effector::reaching(Vec3::Y)).unwrap();

    let first = chain::build(&tree).unwrap();
    let first_shapes: Vec<Shape> = first.roots.iter().map(|c| shape(&tree, c)).collect();

    let effector = tree.detach_effector(left).unwrap();
    let without = chain::build(&tree).unwrap();
    assert_eq!(without.roots.len(), 1);
    assert!(shape(&tree, &without.roots[0]).children.is_empty());

    tree.attach_effector(left, effector).unwrap();
    let second = chain::build(&tree).unwrap();
    let second_shapes: Vec<Shape> = second.roots.iter().map(|c| shape(&tree, c)).collect();

    assert_eq!(first_shapes, second_shapes);
    assert_eq!(first.effectors, second.effectors);
}

#[test]
fn update_distances_caches_segment_lengths() {
    let (mut tree, tip) = linear_chain(3);
    tree.node_mut(tip).position = Vec3::new(0.0, 5.0, 0.0);

    chain::update_distances(&mut tree);

    assert_eq!(tree.node(tree.root()).dist_to_parent(), 0.0);
    let a = tree.find(1).unwrap();
    let b = tree.find(2).unwrap();
    assert_eq!(tree.node(a).dist_to_parent(), 1.0);
    assert_eq!(tree.node(b).dist_to_parent(), 1.0);
    // Node 3 was moved from y=3 to y=5 before caching.
    assert_eq!(tree.node(tip).dist_to_parent(), 3.0);
}

#[test]
fn chain_link_distances_match_positions_at_build_time() {
    let (mut tree, left, right) = two_arm_rig();
    tree.attach_effector(left, Effector::reaching(Vec3::X)).unwrap();
    tree.attach_effector(right, Effector::reaching(Vec3::Y)).unwrap();

    chain::update_distances(&mut tree);
    let forest = chain::build(&tree).unwrap();

    fn assert_links(tree: &NodeTree, chain: &Chain) {
        for pair in chain.nodes.windows(2) {
            let parent = tree.node(pair[0]);
            let child = tree.node(pair[1]);
            let measured = parent.position.distance(child.position);
            assert!(
                (measured - child.dist_to_parent()).abs() <= 1.0e-6,
                "link {} -> {}: cached {} measured {measured}",
                parent.user_id(),
                child.user_id(),
                child.dist_to_parent()
            );
        }
        for child in &chain.children {
            assert_links(tree, child);
        }
    }
    for chain in &forest.roots {
        assert_links(&tree, chain);
    }
}
