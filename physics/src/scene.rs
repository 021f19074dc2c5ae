/*!
Frame driver for a playable scene.

`PlayableScene` owns the collision world, the character controller, the camera rig and the
debug console, and runs one frame in a fixed order:

1. mouse look, then the move vector from the held keys
2. jump and dash requests
3. controller tick: walk direction, fixed sub-steps, sensor re-evaluation
4. out-of-bounds respawn
5. camera derivation from the stepped player position
6. deferred commands queued by sensor callbacks and the console

Sensor callbacks and console commands never mutate the world in place; whatever they queue
runs in step 6, after everything that reads the stepped state.
*/

use log::{error, info, warn};

use crate::{
    camera::{CameraPose, CameraRig},
    collision::{CollisionWorld, Quat, ResourceLedger, Vec3},
    commands::{SceneCommand, SceneCommands},
    config::SceneConfig,
    controller::{CharacterController, TickReport},
    debug::{DebugCommandRegistry, DebugOutput},
    error::{DebugCommandError, SceneError},
    input::{InputMapper, KeyState, MouseDelta},
};

/// Everything observable about one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub tick: TickReport,
    pub jumped: bool,
    pub dashed: bool,
    /// Fell below the out-of-bounds threshold and was moved back to spawn.
    pub respawned: bool,
    /// The world was reset; static geometry must be registered again.
    pub reset: bool,
    pub camera: CameraPose,
}

pub struct PlayableScene {
    config: SceneConfig,
    world: CollisionWorld,
    controller: CharacterController,
    camera: CameraRig,
    input: InputMapper,
    console: DebugCommandRegistry,
    commands: SceneCommands,
    keys: KeyState,
    time: f32,
}

impl PlayableScene {
    pub fn new(config: SceneConfig, console: DebugCommandRegistry) -> Result<Self, SceneError> {
        config.validate()?;
        let mut world = CollisionWorld::init(config.gravity);
        let controller = CharacterController::new(&mut world, &config)?;
        let camera = CameraRig::new(config.view_mode.clone(), controller.collider_height());
        info!("playable scene: ready ({:?})", config.view_mode);

        Ok(Self {
            config,
            world,
            controller,
            camera,
            input: InputMapper::default(),
            console,
            commands: SceneCommands::new(),
            keys: KeyState::default(),
            time: 0.0,
        })
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn world(&self) -> &CollisionWorld {
        &self.world
    }

    /// For registering level geometry and sensors.
    pub fn world_mut(&mut self) -> &mut CollisionWorld {
        &mut self.world
    }

    pub fn controller(&self) -> &CharacterController {
        &self.controller
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraRig {
        &mut self.camera
    }

    pub fn input_mapper_mut(&mut self) -> &mut InputMapper {
        &mut self.input
    }

    pub fn keys_mut(&mut self) -> &mut KeyState {
        &mut self.keys
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn player_position(&self) -> Option<Vec3> {
        self.world.player_position()
    }

    /// Change gravity for the world and the controller together.
    pub fn set_gravity(&mut self, gravity_y: f32) {
        self.config.gravity = gravity_y;
        self.controller.set_scene_gravity(&mut self.world, gravity_y);
    }

    /// Queue a mutation for the end of the next frame.
    pub fn defer(&mut self, command: SceneCommand) {
        self.commands.push(command);
    }

    pub fn teleport(&mut self, position: Vec3, rotation: Option<Quat>) {
        self.defer(SceneCommand::Teleport { position, rotation });
    }

    /// Run a console line. World mutations apply at the end of the next frame.
    pub fn run_debug_command(&mut self, line: &str) -> Result<DebugOutput, DebugCommandError> {
        let position = self.world.player_position();
        self.console.execute(line, position, &mut self.commands)
    }

    /// Advance one render frame.
    pub fn tick(&mut self, dt_seconds: f32, mouse: MouseDelta) -> FrameReport {
        self.time += dt_seconds.max(0.0);
        let view_mode = self.camera.view_mode().clone();

        let look = self.input.compute_look_delta(&mouse, &view_mode);
        self.camera.apply_look(look);
        let player = self.world.player_position().unwrap_or_else(Vec3::zeros);
        let camera_forward =
            self.camera.compute_camera_rotation(player, &view_mode) * Vec3::new(0.0, 0.0, -1.0);
        let movement = self.input.compute_move_vector(
            &self.keys,
            &view_mode,
            camera_forward,
            self.controller.is_flying(),
        );

        let jumped = self.keys.jump
            && !self.controller.is_flying()
            && self.controller.jump(self.time, self.config.player.jump_velocity);
        let dashed =
            self.keys.dash && self.controller.dash(self.time, self.config.player.dash_velocity);

        let tick = self
            .controller
            .tick(&mut self.world, dt_seconds, &movement, &mut self.commands);

        let respawned = self.respawn_if_out_of_bounds();

        let player = self.world.player_position().unwrap_or_else(Vec3::zeros);
        let camera = self.camera.update(player, dt_seconds);

        let reset = self.apply_commands();

        FrameReport {
            tick,
            jumped,
            dashed,
            respawned,
            reset,
            camera,
        }
    }

    /// Tear the world down and return the final resource counts.
    pub fn teardown(mut self) -> ResourceLedger {
        self.world.reset();
        self.world.ledger().clone()
    }

    fn respawn_if_out_of_bounds(&mut self) -> bool {
        let Some(position) = self.world.player_position() else {
            return false;
        };
        if position.y >= self.config.player.oob_y_threshold {
            return false;
        }

        warn!("playable scene: player fell out of bounds at {position:?}, respawning");
        if let Err(err) = self
            .controller
            .teleport(&mut self.world, self.config.player.spawn_position())
        {
            error!("playable scene: respawn failed: {err}");
            return false;
        }
        true
    }

    /// Returns `true` when a reset ran.
    fn apply_commands(&mut self) -> bool {
        let mut reset = false;
        for command in self.commands.drain() {
            match command {
                SceneCommand::Reset => {
                    self.reset();
                    reset = true;
                }
                SceneCommand::Teleport { position, rotation } => {
                    if let Err(err) = self.controller.teleport(&mut self.world, position) {
                        error!("playable scene: teleport failed: {err}");
                        continue;
                    }
                    if let Some(rotation) = rotation {
                        if self.camera.view_mode().is_first_person() {
                            self.camera.set_rotation(rotation);
                        }
                    }
                }
                SceneCommand::SetFlyMode(enabled) => {
                    self.controller.set_fly_mode(&mut self.world, enabled);
                }
                SceneCommand::RemoveSensor(handle) => {
                    self.world.remove_contact_region(handle, true);
                }
                SceneCommand::SetGravity(gravity_y) => self.set_gravity(gravity_y),
            }
        }
        reset
    }

    fn reset(&mut self) {
        self.world.reset();
        self.keys = KeyState::default();
        if let Err(err) = self
            .controller
            .reattach(&mut self.world, self.config.player.spawn_position())
        {
            error!("playable scene: player re-registration failed: {err}");
        }
    }
}
