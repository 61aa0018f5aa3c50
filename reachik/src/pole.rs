use glam::Vec3;

/// Which reference basis vector the roll derivation uses. The conventions
/// differ per host package; all three share the same roll math.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PoleKind {
    #[default]
    Generic,
    Blender,
    Maya,
}

impl PoleKind {
    pub(crate) fn reference_axis(self) -> Vec3 {
        match self {
            Self::Generic => Vec3::Z,
            Self::Blender => Vec3::Y,
            Self::Maya => Vec3::X,
        }
    }
}

/// An auxiliary target biasing the twist of a joint about its bone axis.
///
/// During rotation derivation, the joint's reference axis and the direction
/// to `target_position` are both projected onto the plane perpendicular to
/// the solved bone direction; the joint is rolled by the signed angle between
/// them, plus `angle` (radians) on top.
#[derive(Clone, Debug)]
pub struct Pole {
    pub kind: PoleKind,
    pub target_position: Vec3,
    pub angle: f32,
}

impl Pole {
    pub fn new(kind: PoleKind, target: Vec3) -> Self {
        Self {
            kind,
            target_position: target,
            angle: 0.0,
        }
    }
}

impl Default for Pole {
    fn default() -> Self {
        Self {
            kind: PoleKind::Generic,
            target_position: Vec3::ZERO,
            angle: 0.0,
        }
    }
}
