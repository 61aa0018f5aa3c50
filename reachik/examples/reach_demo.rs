use glam::Vec3;
use reachik::{Effector, NodeTree, Solver};

/// Builds a two-arm rig: a three-segment spine with two three-segment arms
/// hanging off the top, one effector per hand.
fn build_rig() -> NodeTree {
    let mut tree = NodeTree::new(0);
    let mut guid = 1u32;

    let mut spine = tree.root();
    for i in 1..=3 {
        spine = tree.create_child(spine, guid).expect("fresh guid");
        guid += 1;
        tree.node_mut(spine).position = Vec3::new(0.0, i as f32, 0.0);
    }

    for side in [-1.0f32, 1.0] {
        let mut arm = spine;
        for i in 1..=3 {
            arm = tree.create_child(arm, guid).expect("fresh guid");
            guid += 1;
            tree.node_mut(arm).position = Vec3::new(side * i as f32, 3.0 + i as f32, 0.0);
        }
        tree.attach_effector(
            arm,
            Effector::reaching(Vec3::new(side * 2.0, 5.0, 1.5)),
        )
        .expect("hand has no effector yet");
    }

    tree
}

fn main() {
    env_logger::init();

    let mut solver = Solver::new();
    solver.set_tree(build_rig());
    solver.rebuild().expect("rig has a root and effectors");

    let reached = solver.solve().expect("solver was rebuilt");
    println!("effectors reached: {reached}");

    for node in solver.affected_nodes() {
        let p = node.position;
        println!("node {:>2}: ({:+.3}, {:+.3}, {:+.3})", node.user_id(), p.x, p.y, p.z);
    }
}
