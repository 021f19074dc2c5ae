//! Rapier-backed collision world.
//!
//! `CollisionWorld` owns every engine structure of the active scene: body and collider sets,
//! broad/narrow phases, the physics pipeline, the sensor registry and the ref-id registry used
//! to recover per-body metadata from a collider's user data.
//!
//! Design
//! - All bodies are fixed or kinematic-position-based. Nothing is simulated dynamically; the
//!   pipeline step only moves kinematic bodies to their next pose and refreshes the phases.
//! - `step_simulation` runs a fixed-step accumulator. A `StepAction` gets control before each
//!   sub-step so the character controller can move its body at the fixed rate.
//! - Removal tolerates stale handles: a second removal logs and returns `false`.
//! - `reset` drops sensors first, then removes every body through the ledger and rebuilds the
//!   sets and phases. Handles issued before a reset carry an older epoch and are ignored.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use rapier3d::prelude::*;

use crate::{
    collision::{
        BodyHandle, BodyKind, CollisionObjectRef, Iso, Quat, ResourceKind, ResourceLedger,
        SensorSystem, Vec3, player_groups, static_groups,
    },
    commands::SceneCommands,
    constants::DEFAULT_MATERIAL_CLASS,
    error::WorldError,
    shape::{HeightSampler, HeightfieldBounds, ShapeDescriptor, build_heightfield_from_sampler},
};

/// Engine structures, split from `CollisionWorld` so the sensor registry can borrow them
/// mutably alongside itself.
pub struct PhysicsState {
    pub(crate) gravity: Vec3,
    pub(crate) integration_parameters: IntegrationParameters,
    pub(crate) pipeline: PhysicsPipeline,
    pub(crate) islands: IslandManager,
    pub(crate) broad_phase: BroadPhaseBvh,
    pub(crate) narrow_phase: NarrowPhase,
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    pub(crate) impulse_joints: ImpulseJointSet,
    pub(crate) multibody_joints: MultibodyJointSet,
    pub(crate) ccd_solver: CCDSolver,
    pub(crate) ledger: ResourceLedger,
}

impl PhysicsState {
    fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            ledger: ResourceLedger::new(),
        }
    }

    /// Insert a body with one attached collider.
    pub(crate) fn insert(
        &mut self,
        body: RigidBody,
        collider: Collider,
    ) -> (RigidBodyHandle, ColliderHandle) {
        let ghost = collider.is_sensor();
        let body = self.bodies.insert(body);
        let collider = self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies);

        self.ledger.created(ResourceKind::Body);
        self.ledger.created(ResourceKind::Shape);
        self.ledger.created(if ghost {
            ResourceKind::Ghost
        } else {
            ResourceKind::Collider
        });
        (body, collider)
    }

    /// Remove a body and its colliders. Returns `false` if the body was already gone.
    pub(crate) fn remove(&mut self, handle: RigidBodyHandle, owner: Option<&str>) -> bool {
        let Some(body) = self.bodies.get(handle) else {
            self.ledger.failed(ResourceKind::Body, owner);
            return false;
        };
        let attached: Vec<bool> = body
            .colliders()
            .iter()
            .filter_map(|c| self.colliders.get(*c).map(Collider::is_sensor))
            .collect();

        if self
            .bodies
            .remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_none()
        {
            self.ledger.failed(ResourceKind::Body, owner);
            return false;
        }

        self.ledger.destroyed(ResourceKind::Body);
        for ghost in attached {
            self.ledger.destroyed(ResourceKind::Shape);
            self.ledger.destroyed(if ghost {
                ResourceKind::Ghost
            } else {
                ResourceKind::Collider
            });
        }
        true
    }

    /// A zero `dt` only refreshes the broad and narrow phases.
    fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    /// Throw away every set and phase. Pipelines, integration parameters and the CCD solver
    /// are kept. The broad and narrow phases index colliders by handle, so they go with the
    /// sets.
    fn rebuild(&mut self) {
        self.islands = IslandManager::new();
        self.broad_phase = BroadPhaseBvh::new();
        self.narrow_phase = NarrowPhase::new();
        self.bodies = RigidBodySet::new();
        self.colliders = ColliderSet::new();
        self.impulse_joints = ImpulseJointSet::new();
        self.multibody_joints = MultibodyJointSet::new();
    }

    /// Borrowed query view, as used by the character controller.
    pub fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }
}

/// Body and collider of the registered player.
#[derive(Clone)]
pub struct PlayerBody {
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
    pub shape: SharedShape,
}

/// Hook run before every fixed sub-step.
pub trait StepAction {
    fn before_sub_step(&mut self, world: &mut CollisionWorld, dt: f32);
}

impl StepAction for () {
    fn before_sub_step(&mut self, _world: &mut CollisionWorld, _dt: f32) {}
}

pub struct CollisionWorld {
    pub(crate) physics: PhysicsState,
    pub(crate) sensors: SensorSystem,
    refs: BTreeMap<u64, CollisionObjectRef>,
    next_ref_id: u64,
    player: Option<PlayerBody>,
    accumulator: f32,
    epoch: u64,
}

impl CollisionWorld {
    /// Build an empty world with vertical gravity `gravity_y`.
    pub fn init(gravity_y: f32) -> Self {
        info!("collision world: init (gravity {gravity_y})");
        Self {
            physics: PhysicsState::new(Vec3::new(0.0, gravity_y, 0.0)),
            sensors: SensorSystem::new(),
            refs: BTreeMap::new(),
            next_ref_id: 1,
            player: None,
            accumulator: 0.0,
            epoch: 0,
        }
    }

    pub fn gravity(&self) -> f32 {
        self.physics.gravity.y
    }

    /// Single gravity setter. The controller reads gravity from here every sub-step.
    pub fn set_gravity(&mut self, gravity_y: f32) {
        self.physics.gravity = Vec3::new(0.0, gravity_y, 0.0);
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.physics.ledger
    }

    pub fn sensors(&self) -> &SensorSystem {
        &self.sensors
    }

    pub fn physics(&self) -> &PhysicsState {
        &self.physics
    }

    pub fn player(&self) -> Option<&PlayerBody> {
        self.player.as_ref()
    }

    /// Advance by `dt_seconds` in sub-steps of `1 / fixed_step_hz`.
    ///
    /// Leftover time carries into the next call. When more than `max_sub_steps` steps are
    /// due, only `max_sub_steps` run and the excess time is dropped. Returns the number of
    /// sub-steps taken.
    pub fn step_simulation(
        &mut self,
        dt_seconds: f32,
        fixed_step_hz: f32,
        max_sub_steps: u32,
        action: &mut dyn StepAction,
    ) -> u32 {
        if !(dt_seconds >= 0.0) || !(fixed_step_hz > 0.0) {
            warn!("step_simulation: ignoring dt {dt_seconds} at {fixed_step_hz} Hz");
            return 0;
        }
        let fixed_dt = 1.0 / fixed_step_hz;

        self.accumulator += dt_seconds;
        let due = (self.accumulator / fixed_dt).floor() as u32;
        self.accumulator -= due as f32 * fixed_dt;
        let steps = due.min(max_sub_steps);
        if due > steps {
            debug!("step_simulation: dropping {} sub-steps", due - steps);
        }

        for _ in 0..steps {
            action.before_sub_step(self, fixed_dt);
            self.physics.step(fixed_dt);
        }
        steps
    }

    /// Register a static or kinematic body.
    pub fn add_collision_object(
        &mut self,
        shape: &ShapeDescriptor,
        position: Vec3,
        rotation: Quat,
        object_ref: Option<CollisionObjectRef>,
        kind: BodyKind,
    ) -> Result<BodyHandle, WorldError> {
        let shared = shape.to_shared_shape()?;
        let name = object_ref.as_ref().and_then(|r| r.name.clone());
        let ref_id = object_ref.map(|r| {
            let id = self.next_ref_id;
            self.next_ref_id += 1;
            self.refs.insert(id, r);
            id
        });

        let pose = Iso::from_parts(position.into(), rotation);
        let body = match kind {
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Kinematic => RigidBodyBuilder::kinematic_position_based().can_sleep(false),
        }
        .pose(pose)
        .build();
        let collider = ColliderBuilder::new(shared)
            .collision_groups(static_groups())
            .user_data(u128::from(ref_id.unwrap_or(0)))
            .build();

        let (body, collider) = self.physics.insert(body, collider);
        debug!(
            "collision world: added {kind:?} body `{}`",
            name.as_deref().unwrap_or("<unnamed>")
        );
        Ok(BodyHandle {
            body,
            collider,
            ref_id,
            name,
            kind,
            epoch: self.epoch,
        })
    }

    /// Sample terrain heights and register them as static geometry.
    pub fn add_heightfield(
        &mut self,
        sampler: &dyn HeightSampler,
        grid_x: usize,
        grid_z: usize,
        bounds: HeightfieldBounds,
        object_ref: Option<CollisionObjectRef>,
    ) -> Result<BodyHandle, WorldError> {
        let shape = build_heightfield_from_sampler(sampler, grid_x, grid_z, bounds)?;
        self.add_collision_object(
            &shape,
            bounds.center(),
            Quat::identity(),
            object_ref,
            BodyKind::Static,
        )
    }

    /// Remove a body. A stale or already removed handle logs and returns `false`.
    pub fn remove_collision_object(&mut self, handle: &BodyHandle) -> bool {
        if handle.epoch != self.epoch {
            self.physics
                .ledger
                .failed(ResourceKind::Body, handle.name.as_deref());
            return false;
        }
        let removed = self.physics.remove(handle.body, handle.name.as_deref());
        if removed {
            if let Some(id) = handle.ref_id {
                self.refs.remove(&id);
            }
        }
        removed
    }

    /// Drive a kinematic body. The move happens during the next sub-step.
    pub fn set_kinematic_pose(
        &mut self,
        handle: &BodyHandle,
        position: Vec3,
        rotation: Quat,
    ) -> bool {
        if handle.epoch != self.epoch {
            return false;
        }
        match self.physics.bodies.get_mut(handle.body) {
            Some(body) if body.is_kinematic() => {
                body.set_next_kinematic_translation(position);
                body.set_next_kinematic_rotation(rotation);
                true
            }
            _ => {
                warn!(
                    "set_kinematic_pose: `{}` is not a live kinematic body",
                    handle.name.as_deref().unwrap_or("<unnamed>")
                );
                false
            }
        }
    }

    pub fn body_position(&self, handle: &BodyHandle) -> Option<Vec3> {
        if handle.epoch != self.epoch {
            return None;
        }
        self.physics
            .bodies
            .get(handle.body)
            .map(|body| *body.translation())
    }

    /// Refresh the broad phase after a batch of static inserts, without advancing time.
    pub fn optimize(&mut self) {
        self.physics.step(0.0);
    }

    /// Drop all sensors, then every body, then rebuild the world.
    pub fn reset(&mut self) {
        self.sensors.clear(&mut self.physics);

        let handles: Vec<RigidBodyHandle> = self.physics.bodies.iter().map(|(h, _)| h).collect();
        for handle in handles {
            self.physics.remove(handle, None);
        }
        self.physics.rebuild();

        self.refs.clear();
        self.player = None;
        self.accumulator = 0.0;
        self.epoch += 1;
        info!("collision world: reset ({})", self.physics.ledger);
    }

    /// Register the single player body.
    pub fn register_player(
        &mut self,
        shape: SharedShape,
        position: Vec3,
    ) -> Result<PlayerBody, WorldError> {
        if self.player.is_some() {
            return Err(WorldError::PlayerAlreadyRegistered);
        }
        let body = RigidBodyBuilder::kinematic_position_based()
            .can_sleep(false)
            .translation(position)
            .build();
        let collider = ColliderBuilder::new(shape.clone())
            .collision_groups(player_groups())
            .active_collision_types(
                ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_FIXED,
            )
            .build();
        let (body, collider) = self.physics.insert(body, collider);
        let player = PlayerBody {
            body,
            collider,
            shape,
        };
        self.player = Some(player.clone());
        Ok(player)
    }

    pub fn unregister_player(&mut self) -> bool {
        match self.player.take() {
            Some(player) => self.physics.remove(player.body, Some("player")),
            None => false,
        }
    }

    pub fn player_position(&self) -> Option<Vec3> {
        let player = self.player.as_ref()?;
        self.physics.bodies.get(player.body).map(|b| *b.translation())
    }

    /// Warp the player immediately, bypassing interpolation.
    pub(crate) fn place_player(&mut self, position: Vec3) -> Result<(), WorldError> {
        let player = self.player.as_ref().ok_or(WorldError::PlayerNotRegistered)?;
        let body = self
            .physics
            .bodies
            .get_mut(player.body)
            .ok_or(WorldError::PlayerNotRegistered)?;
        body.set_translation(position, true);
        body.set_next_kinematic_translation(position);
        Ok(())
    }

    /// First non-sensor collider hit by a ray, ignoring the player.
    pub fn cast_ray(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_toi: f32,
    ) -> Option<(ColliderHandle, f32)> {
        let mut filter = QueryFilter::default().exclude_sensors();
        if let Some(player) = &self.player {
            filter = filter.exclude_rigid_body(player.body);
        }
        let ray = Ray::new(origin.into(), dir);
        self.physics
            .query_pipeline(filter)
            .cast_ray(&ray, max_toi, true)
    }

    pub fn object_ref(&self, ref_id: u64) -> Option<&CollisionObjectRef> {
        self.refs.get(&ref_id)
    }

    /// Ref-id stored in a collider's user data.
    pub fn ref_id_of(&self, collider: ColliderHandle) -> Option<u64> {
        let id = self.physics.colliders.get(collider)?.user_data as u64;
        (id != 0).then_some(id)
    }

    /// Material class of the floor collider; untagged or unknown floors use the default.
    pub fn material_class_of(&self, collider: ColliderHandle) -> &str {
        self.ref_id_of(collider)
            .and_then(|id| self.refs.get(&id))
            .and_then(|r| r.material_class.as_deref())
            .unwrap_or(DEFAULT_MATERIAL_CLASS)
    }

    /// Velocity of the body owning `collider`, when it is kinematic.
    pub(crate) fn kinematic_velocity_of(&self, collider: ColliderHandle) -> Option<Vec3> {
        let parent = self.physics.colliders.get(collider)?.parent()?;
        let body = self.physics.bodies.get(parent)?;
        body.is_kinematic().then(|| *body.linvel())
    }

    /// Evaluate all sensors against the player and queue the callbacks' commands.
    pub fn update_sensors(&mut self, commands: &mut SceneCommands) {
        self.sensors
            .update(&self.physics, self.player.as_ref(), commands);
    }
}

impl Drop for CollisionWorld {
    fn drop(&mut self) {
        debug!("collision world: dropped ({})", self.physics.ledger);
    }
}
