//! Kinematic character controller.
//!
//! Wraps rapier's `KinematicCharacterController` around the single player body registered in
//! the `CollisionWorld`. Rapier's controller only resolves a desired translation against the
//! world; everything with a time dimension lives here:
//! - walk velocity from the mapped input, scaled by ground/air speed,
//! - vertical velocity integrated from the world gravity (zero while flying),
//! - external velocity from jumps and dashes, damped per sub-step (air vs ground factors),
//! - linear carry from a kinematic platform the player stands on.
//!
//! The controller moves its body once per fixed sub-step through `StepAction`, so movement
//! runs at the simulation rate, not the frame rate.
//!
//! Notes
//! - Snap distance and max slope come from `constants`. The autostep height comes from the
//!   player config and defaults to `STEP_HEIGHT`.
//! - Ground state comes from the rapier controller's own grounded flag. The floor collider is
//!   found with a short downward ray and used for landing/footstep material lookup.

use log::{debug, info};
use rapier3d::{
    control::{CharacterAutostep, CharacterLength, KinematicCharacterController},
    prelude::*,
};

use crate::{
    collision::{CollisionWorld, PlayerBody, Quat, StepAction, Vec3},
    commands::SceneCommands,
    config::{ColliderShapeKind, PlayerConfig, SceneConfig, SimulationConfig},
    constants::{
        CONTROLLER_OFFSET, DASH_ACTIVE_SECONDS, DEFAULT_MATERIAL_CLASS, GROUND_PROBE_DISTANCE,
        JUMP_MOVE_DIRECTION_BIAS, MAX_PENETRATION_DEPTH, MAX_SLOPE_RADIANS,
        MIN_DASH_DELAY_SECONDS, MIN_JUMP_DELAY_SECONDS, STEP_MIN_WIDTH, WALKING_SPEED_EPS,
    },
    error::{ShapeError, WorldError},
    input::MoveVector,
    shape::ShapeDescriptor,
    utils::planar_direction,
};

/// Persistent controller flags and timers.
#[derive(Clone, Debug, PartialEq)]
pub struct CharacterControllerState {
    pub last_jump_time: Option<f32>,
    pub last_dash_time: Option<f32>,
    pub fly_mode: bool,
    /// Unit walk direction of the last tick, zero when standing still.
    pub move_direction: Vec3,
    /// Grounded and moving; edges drive footstep sounds.
    pub walking: bool,
    pub air_damping: Vec3,
    pub ground_damping: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JumpEvent {
    pub time: f32,
    pub velocity: f32,
}

pub type JumpCallback = Box<dyn FnMut(&JumpEvent)>;

/// Reported on the airborne to grounded transition.
#[derive(Clone, Debug, PartialEq)]
pub struct LandingEvent {
    pub material_class: String,
    /// Downward speed right before touching down (m/s).
    pub impact_speed: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FootstepEvent {
    Started { material_class: String },
    Stopped,
}

/// What one `tick` did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub sub_steps: u32,
    pub grounded: bool,
    pub landed: Option<LandingEvent>,
    pub footstep: Option<FootstepEvent>,
}

/// At least `MIN_JUMP_DELAY_SECONDS` since the last accepted jump.
pub fn jump_allowed(last_jump_time: Option<f32>, cur_time: f32) -> bool {
    last_jump_time.is_none_or(|last| cur_time - last >= MIN_JUMP_DELAY_SECONDS)
}

/// At least `MIN_DASH_DELAY_SECONDS` since the last accepted dash.
pub fn dash_allowed(last_dash_time: Option<f32>, cur_time: f32) -> bool {
    last_dash_time.is_none_or(|last| cur_time - last >= MIN_DASH_DELAY_SECONDS)
}

pub struct CharacterController {
    kcc: KinematicCharacterController,
    player: PlayerBody,
    player_config: PlayerConfig,
    simulation: SimulationConfig,
    /// Gravity restored when fly mode ends.
    scene_gravity: f32,
    state: CharacterControllerState,
    walk_velocity: Vec3,
    vertical_velocity: f32,
    external_velocity: Vec3,
    grounded: bool,
    floor: Option<ColliderHandle>,
    /// Lowest vertical velocity seen while airborne.
    fall_speed: f32,
    jump_callbacks: Vec<JumpCallback>,
}

impl CharacterController {
    /// Build the player body and register it. Only one controller may exist per world.
    pub fn new(world: &mut CollisionWorld, config: &SceneConfig) -> Result<Self, WorldError> {
        let player_config = config.player.clone();
        let player = world.register_player(
            player_shape(&player_config)?,
            player_config.spawn_position(),
        )?;
        world.set_gravity(config.gravity);
        info!(
            "character controller: spawned at {:?}",
            player_config.spawn_position
        );

        Ok(Self {
            kcc: build_kcc(player_config.step_height),
            player,
            state: CharacterControllerState {
                last_jump_time: None,
                last_dash_time: None,
                fly_mode: false,
                move_direction: Vec3::zeros(),
                walking: false,
                air_damping: player_config.air_damping(),
                ground_damping: player_config.ground_damping(),
            },
            player_config,
            simulation: config.simulation,
            scene_gravity: config.gravity,
            walk_velocity: Vec3::zeros(),
            vertical_velocity: 0.0,
            external_velocity: Vec3::zeros(),
            grounded: false,
            floor: None,
            fall_speed: 0.0,
            jump_callbacks: Vec::new(),
        })
    }

    pub fn state(&self) -> &CharacterControllerState {
        &self.state
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn is_flying(&self) -> bool {
        self.state.fly_mode
    }

    pub fn vertical_velocity(&self) -> f32 {
        self.vertical_velocity
    }

    pub fn external_velocity(&self) -> Vec3 {
        self.external_velocity
    }

    pub fn floor(&self) -> Option<ColliderHandle> {
        self.floor
    }

    /// Total height of the player collider.
    pub fn collider_height(&self) -> f32 {
        let size = &self.player_config.collider_size;
        match size.shape {
            ColliderShapeKind::Sphere => 2.0 * size.radius,
            ColliderShapeKind::Capsule | ColliderShapeKind::Cylinder => size.height,
        }
    }

    pub fn position(&self, world: &CollisionWorld) -> Option<Vec3> {
        world.player_position()
    }

    /// Airborne and still rising from an accepted jump.
    pub fn is_jumping(&self) -> bool {
        !self.grounded && self.vertical_velocity > 0.0 && self.state.last_jump_time.is_some()
    }

    /// Within `DASH_ACTIVE_SECONDS` of a dash whose momentum has not been damped away.
    pub fn is_dashing(&self, cur_time: f32) -> bool {
        self.state
            .last_dash_time
            .is_some_and(|last| cur_time - last < DASH_ACTIVE_SECONDS)
            && Vec3::new(self.external_velocity.x, 0.0, self.external_velocity.z).norm()
                > WALKING_SPEED_EPS
    }

    pub fn on_jump(&mut self, callback: JumpCallback) {
        self.jump_callbacks.push(callback);
    }

    /// Set the walk direction, step the world and re-evaluate sensors.
    pub fn tick(
        &mut self,
        world: &mut CollisionWorld,
        dt_seconds: f32,
        movement: &MoveVector,
        commands: &mut SceneCommands,
    ) -> TickReport {
        let speed = if self.grounded || self.state.fly_mode {
            self.player_config.move_speed.on_ground
        } else {
            self.player_config.move_speed.in_air
        };

        let mut direction = movement.direction;
        if self.player_config.easy_movement && direction != Vec3::zeros() {
            direction = direction.normalize() * (movement.forward + movement.left).norm();
        }
        if !self.state.fly_mode {
            direction.y = 0.0;
        }
        self.walk_velocity = direction * speed;
        self.state.move_direction = direction
            .try_normalize(WALKING_SPEED_EPS)
            .unwrap_or_else(Vec3::zeros);

        self.reset_forced_rotation(world);

        let was_grounded = self.grounded;
        self.fall_speed = 0.0;
        let sub_steps = world.step_simulation(
            dt_seconds,
            self.simulation.fixed_step_hz,
            self.simulation.max_sub_steps,
            self,
        );
        world.update_sensors(commands);

        let mut report = TickReport {
            sub_steps,
            grounded: self.grounded,
            ..TickReport::default()
        };
        if sub_steps == 0 {
            return report;
        }

        self.floor = self.probe_floor(world);
        let material = || {
            self.floor
                .map(|floor| world.material_class_of(floor).to_owned())
                .unwrap_or_else(|| DEFAULT_MATERIAL_CLASS.to_owned())
        };

        if !was_grounded && self.grounded {
            let landing = LandingEvent {
                material_class: material(),
                impact_speed: -self.fall_speed,
            };
            debug!("character controller: landed on `{}`", landing.material_class);
            report.landed = Some(landing);
        }

        let planar_speed = Vec3::new(self.walk_velocity.x, 0.0, self.walk_velocity.z).norm();
        let walking = self.grounded && !self.state.fly_mode && planar_speed > WALKING_SPEED_EPS;
        if walking != self.state.walking {
            self.state.walking = walking;
            report.footstep = Some(if walking {
                FootstepEvent::Started {
                    material_class: material(),
                }
            } else {
                FootstepEvent::Stopped
            });
        }
        report
    }

    /// Jump if grounded and off cooldown. Part of the impulse is redirected along the current
    /// move direction.
    pub fn jump(&mut self, cur_time: f32, impulse: f32) -> bool {
        if !self.grounded || !jump_allowed(self.state.last_jump_time, cur_time) {
            return false;
        }

        self.vertical_velocity = impulse;
        if let Some(dir) = planar_direction(&self.state.move_direction) {
            self.external_velocity += dir * impulse * JUMP_MOVE_DIRECTION_BIAS;
        }
        self.grounded = false;
        self.state.last_jump_time = Some(cur_time);

        let event = JumpEvent {
            time: cur_time,
            velocity: impulse,
        };
        for callback in &mut self.jump_callbacks {
            callback(&event);
        }
        true
    }

    /// Dash along the move direction if off cooldown. Standing still does not dash.
    pub fn dash(&mut self, cur_time: f32, velocity: f32) -> bool {
        if !dash_allowed(self.state.last_dash_time, cur_time) {
            return false;
        }
        let Some(dir) = planar_direction(&self.state.move_direction) else {
            return false;
        };
        self.external_velocity += dir * velocity;
        self.state.last_dash_time = Some(cur_time);
        true
    }

    /// Enable, disable (`Some`) or toggle (`None`) fly mode. Returns the new state.
    ///
    /// Flying zeroes gravity on the world; landing restores the scene gravity.
    pub fn set_fly_mode(&mut self, world: &mut CollisionWorld, enabled: Option<bool>) -> bool {
        let enabled = enabled.unwrap_or(!self.state.fly_mode);
        if enabled == self.state.fly_mode {
            return enabled;
        }

        self.state.fly_mode = enabled;
        self.vertical_velocity = 0.0;
        world.set_gravity(if enabled { 0.0 } else { self.scene_gravity });
        info!("character controller: fly mode {}", if enabled { "on" } else { "off" });
        enabled
    }

    /// Change the scene gravity. While flying the world stays at zero until fly mode ends.
    pub fn set_scene_gravity(&mut self, world: &mut CollisionWorld, gravity_y: f32) {
        self.scene_gravity = gravity_y;
        if !self.state.fly_mode {
            world.set_gravity(gravity_y);
        }
    }

    /// Warp to `position`, clearing all momentum and the ground flag.
    pub fn teleport(
        &mut self,
        world: &mut CollisionWorld,
        position: Vec3,
    ) -> Result<(), WorldError> {
        world.place_player(position)?;
        self.reset_motion();
        Ok(())
    }

    /// Clear velocities, ground flag and walking state.
    pub fn reset_motion(&mut self) {
        self.walk_velocity = Vec3::zeros();
        self.vertical_velocity = 0.0;
        self.external_velocity = Vec3::zeros();
        self.grounded = false;
        self.floor = None;
        self.state.walking = false;
        self.state.move_direction = Vec3::zeros();
    }

    /// Register a fresh player body after a world reset.
    pub fn reattach(
        &mut self,
        world: &mut CollisionWorld,
        position: Vec3,
    ) -> Result<(), WorldError> {
        self.player = world.register_player(self.player.shape.clone(), position)?;
        world.set_gravity(if self.state.fly_mode {
            0.0
        } else {
            self.scene_gravity
        });
        self.reset_motion();
        Ok(())
    }

    fn reset_forced_rotation(&self, world: &mut CollisionWorld) {
        if let Some(body) = world.physics.bodies.get_mut(self.player.body) {
            if body.rotation() != &Quat::identity() {
                body.set_next_kinematic_rotation(Quat::identity());
            }
        }
    }

    fn probe_floor(&self, world: &CollisionWorld) -> Option<ColliderHandle> {
        if !self.grounded {
            return None;
        }
        let origin = world.player_position()?;
        world
            .cast_ray(
                origin,
                Vec3::new(0.0, -1.0, 0.0),
                0.5 * self.collider_height() + GROUND_PROBE_DISTANCE,
            )
            .map(|(collider, _)| collider)
    }

    #[cfg(test)]
    pub(crate) fn force_grounded(&mut self) {
        self.grounded = true;
    }
}

impl StepAction for CharacterController {
    fn before_sub_step(&mut self, world: &mut CollisionWorld, dt: f32) {
        if self.state.fly_mode {
            self.vertical_velocity = 0.0;
        } else {
            self.vertical_velocity += world.gravity() * dt;
        }

        let carry = self
            .floor
            .filter(|_| self.grounded)
            .and_then(|floor| world.kinematic_velocity_of(floor))
            .unwrap_or_else(Vec3::zeros);

        let desired = (self.walk_velocity
            + self.external_velocity
            + carry
            + Vec3::new(0.0, self.vertical_velocity, 0.0))
            * dt;

        let Some(current) = world
            .physics
            .bodies
            .get(self.player.body)
            .map(|b| *b.position())
        else {
            return;
        };
        self.fall_speed = self.fall_speed.min(self.vertical_velocity);
        let filter = QueryFilter::default()
            .exclude_sensors()
            .exclude_rigid_body(self.player.body);
        let corrected = {
            let query_pipeline = world.physics.query_pipeline(filter);
            self.kcc.move_shape(
                dt,
                &query_pipeline,
                &*self.player.shape,
                &current,
                desired,
                |_| {},
            )
        };

        self.grounded = corrected.grounded;
        if self.grounded && self.vertical_velocity < 0.0 {
            self.vertical_velocity = 0.0;
        }
        // Bumped a ceiling.
        if desired.y > 0.0 && corrected.translation.y < desired.y * 0.5 {
            self.vertical_velocity = 0.0;
        }

        let damping = if self.grounded {
            self.state.ground_damping
        } else {
            self.state.air_damping
        };
        self.external_velocity = self
            .external_velocity
            .component_mul(&(Vec3::repeat(1.0) - damping));

        if self.grounded {
            self.floor = world
                .cast_ray(
                    current.translation.vector + corrected.translation,
                    Vec3::new(0.0, -1.0, 0.0),
                    0.5 * self.collider_height() + GROUND_PROBE_DISTANCE,
                )
                .map(|(collider, _)| collider);
        }

        if let Some(body) = world.physics.bodies.get_mut(self.player.body) {
            body.set_next_kinematic_translation(
                current.translation.vector + corrected.translation,
            );
        }
    }
}

fn player_shape(config: &PlayerConfig) -> Result<SharedShape, WorldError> {
    let size = &config.collider_size;
    let shape = match size.shape {
        ColliderShapeKind::Capsule => ShapeDescriptor::capsule(size.height, size.radius)?,
        ColliderShapeKind::Cylinder => {
            for (what, value) in [
                ("cylinder height", size.height),
                ("cylinder radius", size.radius),
            ] {
                if !(value > 0.0) {
                    return Err(ShapeError::InvalidDimension { what, value }.into());
                }
            }
            SharedShape::cylinder(0.5 * size.height, size.radius)
        }
        ColliderShapeKind::Sphere => ShapeDescriptor::Sphere {
            radius: size.radius,
        }
        .to_shared_shape()?,
    };
    Ok(shape)
}

fn build_kcc(step_height: f32) -> KinematicCharacterController {
    KinematicCharacterController {
        offset: CharacterLength::Absolute(CONTROLLER_OFFSET),
        max_slope_climb_angle: MAX_SLOPE_RADIANS,
        snap_to_ground: Some(CharacterLength::Absolute(MAX_PENETRATION_DEPTH)),
        autostep: (step_height > 0.0).then(|| CharacterAutostep {
            max_height: CharacterLength::Absolute(step_height),
            min_width: CharacterLength::Absolute(STEP_MIN_WIDTH),
            include_dynamic_bodies: false,
        }),
        ..KinematicCharacterController::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{BodyKind, CollisionObjectRef};
    use approx::assert_relative_eq;

    const FRAME: f32 = 1.0 / 60.0;

    fn scene() -> (CollisionWorld, CharacterController) {
        let _ = env_logger::builder().is_test(true).try_init();
        let config = SceneConfig::default();
        let mut world = CollisionWorld::init(config.gravity);
        world
            .add_collision_object(
                &ShapeDescriptor::Box {
                    half_extents: Vec3::new(20.0, 0.5, 20.0),
                },
                Vec3::new(0.0, -0.5, 0.0),
                Quat::identity(),
                Some(CollisionObjectRef::named("floor").with_material("stone")),
                BodyKind::Static,
            )
            .unwrap();
        world.optimize();
        let controller = CharacterController::new(&mut world, &config).unwrap();
        (world, controller)
    }

    fn still() -> MoveVector {
        MoveVector {
            direction: Vec3::zeros(),
            forward: Vec3::new(0.0, 0.0, -1.0),
            left: Vec3::new(-1.0, 0.0, 0.0),
        }
    }

    fn run(
        world: &mut CollisionWorld,
        controller: &mut CharacterController,
        frames: u32,
        movement: &MoveVector,
    ) -> Vec<TickReport> {
        let mut commands = SceneCommands::new();
        (0..frames)
            .map(|_| controller.tick(world, FRAME, movement, &mut commands))
            .collect()
    }

    #[test]
    fn falls_and_lands_on_tagged_floor() {
        let (mut world, mut controller) = scene();
        let reports = run(&mut world, &mut controller, 90, &still());

        assert!(controller.is_grounded());
        let y = controller.position(&world).unwrap().y;
        assert!((0.85..1.0).contains(&y), "resting height {y}");

        let landings: Vec<_> = reports.iter().filter_map(|r| r.landed.as_ref()).collect();
        assert_eq!(landings.len(), 1);
        assert_eq!(landings[0].material_class, "stone");
        assert!(landings[0].impact_speed > 1.0);
    }

    #[test]
    fn walking_moves_along_direction_and_emits_footsteps() {
        let (mut world, mut controller) = scene();
        run(&mut world, &mut controller, 90, &still());
        let start = controller.position(&world).unwrap();

        let mut forward = still();
        forward.direction = forward.forward;
        let reports = run(&mut world, &mut controller, 60, &forward);
        let end = controller.position(&world).unwrap();

        assert!(start.z - end.z > 4.0, "moved {}", start.z - end.z);
        // Shape casts against the floor report slightly tilted normals, and sliding along
        // them drifts a few millimetres sideways over the walk.
        assert_relative_eq!(end.x, start.x, epsilon = 1.0e-2);
        assert!(matches!(
            reports[0].footstep,
            Some(FootstepEvent::Started { ref material_class }) if material_class == "stone"
        ));

        let reports = run(&mut world, &mut controller, 1, &still());
        assert_eq!(reports[0].footstep, Some(FootstepEvent::Stopped));
    }

    #[test]
    fn easy_movement_gives_straight_input_diagonal_speed() {
        let config = SceneConfig {
            player: PlayerConfig {
                easy_movement: true,
                ..PlayerConfig::default()
            },
            ..SceneConfig::default()
        };
        let mut world = CollisionWorld::init(config.gravity);
        let mut controller = CharacterController::new(&mut world, &config).unwrap();
        controller.set_fly_mode(&mut world, Some(true));

        let mut forward = still();
        forward.direction = forward.forward;
        controller.tick(&mut world, 0.0, &forward, &mut SceneCommands::new());
        assert_relative_eq!(
            controller.walk_velocity.norm(),
            config.player.move_speed.on_ground * 2.0_f32.sqrt(),
            epsilon = 1.0e-4
        );
    }

    #[test]
    fn jump_cooldown_allows_one_impulse_per_quarter_second() {
        assert!(jump_allowed(None, 0.0));
        assert!(!jump_allowed(Some(1.0), 1.1));
        assert!(jump_allowed(Some(1.0), 1.3));

        let (_world, mut controller) = scene();
        let jumps = std::rc::Rc::new(std::cell::Cell::new(0));
        let counter = std::rc::Rc::clone(&jumps);
        controller.on_jump(Box::new(move |_| counter.set(counter.get() + 1)));

        controller.force_grounded();
        assert!(controller.jump(0.0, 6.0));
        controller.force_grounded();
        assert!(!controller.jump(0.1, 6.0));
        assert_eq!(jumps.get(), 1);

        controller.force_grounded();
        assert!(controller.jump(0.3, 6.0));
        assert_eq!(jumps.get(), 2);
    }

    #[test]
    fn airborne_jump_is_rejected() {
        let (_world, mut controller) = scene();
        assert!(!controller.is_grounded());
        assert!(!controller.jump(10.0, 6.0));
    }

    #[test]
    fn jump_leaves_the_ground_and_lands_again() {
        let (mut world, mut controller) = scene();
        run(&mut world, &mut controller, 90, &still());
        let rest = controller.position(&world).unwrap().y;

        assert!(controller.jump(2.0, 6.0));
        assert!(controller.is_jumping());
        run(&mut world, &mut controller, 20, &still());
        assert!(controller.position(&world).unwrap().y > rest + 0.5);

        run(&mut world, &mut controller, 90, &still());
        assert!(controller.is_grounded());
        assert_relative_eq!(controller.position(&world).unwrap().y, rest, epsilon = 0.05);
    }

    #[test]
    fn dash_has_cooldown_and_needs_a_direction() {
        let (_world, mut controller) = scene();
        assert!(!controller.dash(0.0, 12.0));

        controller.state.move_direction = Vec3::new(1.0, 0.0, 0.0);
        assert!(controller.dash(0.0, 12.0));
        assert!(controller.is_dashing(0.1));
        assert!(!controller.dash(0.5, 12.0));
        assert!(controller.dash(1.0, 12.0));
        assert_relative_eq!(controller.external_velocity().x, 24.0);
    }

    #[test]
    fn external_velocity_is_damped_in_air() {
        let config = SceneConfig::default();
        let mut world = CollisionWorld::init(config.gravity);
        let mut controller = CharacterController::new(&mut world, &config).unwrap();
        controller.external_velocity = Vec3::new(10.0, 0.0, 10.0);

        world.step_simulation(1.0 / 160.0, 160.0, 1, &mut controller);
        assert_relative_eq!(controller.external_velocity().x, 9.8, epsilon = 1.0e-4);
        assert_relative_eq!(controller.external_velocity().z, 9.8, epsilon = 1.0e-4);
    }

    #[test]
    fn fly_mode_is_idempotent_and_toggles() {
        let (mut world, mut controller) = scene();
        assert!(controller.set_fly_mode(&mut world, Some(true)));
        assert_eq!(world.gravity(), 0.0);
        assert!(controller.set_fly_mode(&mut world, Some(true)));
        assert!(controller.is_flying());

        assert!(!controller.set_fly_mode(&mut world, None));
        assert_relative_eq!(world.gravity(), -9.81);
        assert!(controller.set_fly_mode(&mut world, None));
    }

    #[test]
    fn flying_player_hovers() {
        let (mut world, mut controller) = scene();
        controller.set_fly_mode(&mut world, Some(true));
        let start = controller.position(&world).unwrap();
        run(&mut world, &mut controller, 30, &still());
        assert_relative_eq!(controller.position(&world).unwrap(), start, epsilon = 1.0e-4);
    }

    #[test]
    fn teleport_clears_motion() {
        let (mut world, mut controller) = scene();
        run(&mut world, &mut controller, 90, &still());
        controller.external_velocity = Vec3::new(3.0, 0.0, 0.0);

        controller
            .teleport(&mut world, Vec3::new(5.0, 3.0, -2.0))
            .unwrap();
        assert_eq!(controller.position(&world).unwrap(), Vec3::new(5.0, 3.0, -2.0));
        assert_eq!(controller.external_velocity(), Vec3::zeros());
        assert_eq!(controller.vertical_velocity(), 0.0);
        assert!(!controller.is_grounded());
    }

    #[test]
    fn second_controller_is_rejected() {
        let (mut world, _controller) = scene();
        assert!(matches!(
            CharacterController::new(&mut world, &SceneConfig::default()),
            Err(WorldError::PlayerAlreadyRegistered)
        ));
    }

    #[test]
    fn platform_carries_grounded_player() {
        let config = SceneConfig {
            player: PlayerConfig {
                spawn_position: [0.0, 1.2, 0.0],
                ..PlayerConfig::default()
            },
            ..SceneConfig::default()
        };
        let mut world = CollisionWorld::init(config.gravity);
        let platform = world
            .add_collision_object(
                &ShapeDescriptor::Box {
                    half_extents: Vec3::new(3.0, 0.25, 3.0),
                },
                Vec3::new(0.0, 0.0, 0.0),
                Quat::identity(),
                None,
                BodyKind::Kinematic,
            )
            .unwrap();
        let mut controller = CharacterController::new(&mut world, &config).unwrap();
        run(&mut world, &mut controller, 60, &still());
        assert!(controller.is_grounded());
        let start = controller.position(&world).unwrap();

        let mut commands = SceneCommands::new();
        for frame in 1..=30 {
            let x = frame as f32 * 0.02;
            world.set_kinematic_pose(&platform, Vec3::new(x, 0.0, 0.0), Quat::identity());
            controller.tick(&mut world, FRAME, &still(), &mut commands);
        }
        let carried = controller.position(&world).unwrap().x - start.x;
        assert!(carried > 0.3, "carried {carried}");
    }
}
