/*!
Core collision types and math aliases shared by the collision submodules.

This module contains no algorithms. It defines the data exchanged between
- world:   body registration, stepping and queries
- sensor:  ghost trigger volumes and their overlap state
- ledger:  creation/destruction bookkeeping

Notes
- The player is the only body in the player group. Ghost colliders filter on that group
  alone, so a ghost can only ever overlap the player.
- Static and kinematic geometry share one group; the character controller collides with
  it and ignores ghosts.
*/

use nalgebra as na;
use rapier3d::prelude::{ColliderHandle, Group, InteractionGroups, RigidBodyHandle};

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Point3 = na::Point3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// How a registered body moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// Zero-mass, never moves.
    Static,
    /// Moved by the caller through `CollisionWorld::set_kinematic_pose`; never sleeps.
    Kinematic,
}

/// Per-body metadata recovered through the collider's user data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollisionObjectRef {
    /// Owning mesh name, used when logging.
    pub name: Option<String>,
    /// Surface tag used to pick landing and footstep sounds.
    pub material_class: Option<String>,
}

impl CollisionObjectRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            material_class: None,
        }
    }

    pub fn with_material(mut self, material_class: impl Into<String>) -> Self {
        self.material_class = Some(material_class.into());
        self
    }
}

/// Handle to a body registered through `CollisionWorld::add_collision_object`.
///
/// Cloning the handle does not clone the body; removing either clone removes it once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyHandle {
    pub(crate) body: RigidBodyHandle,
    pub(crate) collider: ColliderHandle,
    pub(crate) ref_id: Option<u64>,
    pub(crate) name: Option<String>,
    pub(crate) kind: BodyKind,
    /// World reset count at creation.
    pub(crate) epoch: u64,
}

impl BodyHandle {
    pub fn ref_id(&self) -> Option<u64> {
        self.ref_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }
}

pub const PLAYER_GROUP: Group = Group::GROUP_1;
pub const STATIC_GROUP: Group = Group::GROUP_2;
pub const SENSOR_GROUP: Group = Group::GROUP_3;

/// Groups of the player collider: collides with everything, ghosts included.
pub fn player_groups() -> InteractionGroups {
    InteractionGroups::all()
        .with_memberships(PLAYER_GROUP)
        .with_filter(Group::ALL)
}

/// Groups of static and kinematic geometry.
pub fn static_groups() -> InteractionGroups {
    InteractionGroups::all()
        .with_memberships(STATIC_GROUP)
        .with_filter(Group::ALL)
}

/// Groups of ghost colliders: symmetric with the player, nothing else.
pub fn sensor_groups() -> InteractionGroups {
    InteractionGroups::all()
        .with_memberships(SENSOR_GROUP)
        .with_filter(PLAYER_GROUP)
}

/// Rapier tests `a.memberships & b.filter` both ways.
pub fn groups_interact(a: InteractionGroups, b: InteractionGroups) -> bool {
    a.memberships.intersects(b.filter) && b.memberships.intersects(a.filter)
}
