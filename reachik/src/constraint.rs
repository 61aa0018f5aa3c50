use crate::Node;
use glam::{Quat, Vec3};
use std::fmt;
use std::sync::Arc;

/// Signature of a user-supplied constraint. The callback receives the node
/// (post-solve state) and the derived rotation, which it may rewrite freely.
/// An `Err` is reported as a per-node warning and leaves the rotation
/// unmodified; it never fails the solve.
pub type CustomConstraintFn = dyn Fn(&Node, &mut Quat) -> Result<(), String> + Send + Sync;

/// A per-node rule restricting the node's allowed rotation.
///
/// Constraints are evaluated after the positional solve, once all positions
/// are final. They are pure: a constraint adjusts the rotation handed to it
/// and must not touch tree structure. Angles are radians.
#[derive(Clone)]
pub enum Constraint {
    /// Locks the node to the rotation it had when the solve started.
    Stiff,
    /// Projects the rotation onto a rotation about `axis` and clamps the
    /// signed angle to `[min_angle, max_angle]`.
    Hinge {
        axis: Vec3,
        min_angle: f32,
        max_angle: f32,
    },
    /// Limits the deviation from the rotation at solve start to at most
    /// `angle`.
    Cone { angle: f32 },
    /// User-supplied callback. Shared so trees carrying custom constraints
    /// stay cloneable and duplicable.
    Custom(Arc<CustomConstraintFn>),
}

impl Constraint {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Node, &mut Quat) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stiff => f.write_str("Stiff"),
            Self::Hinge {
                axis,
                min_angle,
                max_angle,
            } => f
                .debug_struct("Hinge")
                .field("axis", axis)
                .field("min_angle", min_angle)
                .field("max_angle", max_angle)
                .finish(),
            Self::Cone { angle } => f.debug_struct("Cone").field("angle", angle).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
