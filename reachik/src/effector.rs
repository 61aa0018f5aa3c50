use glam::{Quat, Vec3};

/// A target attached to a node, requesting that the node reach a world-space
/// goal.
#[derive(Clone, Debug)]
pub struct Effector {
    /// World-space position the node should reach.
    pub target_position: Vec3,
    /// Optional rotation for the node once the target is reached. Applied
    /// only when the solver's `TARGET_ROTATIONS` feature is enabled.
    pub target_rotation: Option<Quat>,
    /// How many parent nodes participate in this effector's chain. `0` means
    /// unlimited: the chain runs all the way to the tree root. A limit of `n`
    /// yields a chain of at most `n + 1` nodes counted from the effector node
    /// toward the root.
    pub chain_length: u32,
    /// Blend factor toward the target, clamped to `[0, 1]` at solve time.
    /// With `0.5` the solved pose reaches halfway from the current tip
    /// position to the target.
    pub weight: f32,
}

impl Effector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effector reaching for `target` with default length and weight.
    pub fn reaching(target: Vec3) -> Self {
        Self {
            target_position: target,
            ..Self::default()
        }
    }
}

impl Default for Effector {
    fn default() -> Self {
        Self {
            target_position: Vec3::ZERO,
            target_rotation: None,
            chain_length: 0,
            weight: 1.0,
        }
    }
}
