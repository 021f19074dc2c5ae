pub mod camera;
pub mod collision;
pub mod commands;
pub mod config;
pub mod constants;
pub mod controller;
pub mod debug;
pub mod error;
pub mod input;
pub mod scene;
pub mod shape;
pub mod utils;

pub use camera::{CameraPose, CameraRig};
pub use collision::{
    BodyHandle, BodyKind, CollisionObjectRef, CollisionWorld, ContactRegion, ResourceKind,
    ResourceLedger, SensorCallback, SensorEvent, SensorHandle, SensorRemoval, StepAction,
};
pub use commands::{SceneCommand, SceneCommands};
pub use config::{
    CameraFocusPoint, ColliderShapeKind, ColliderSizeConfig, MoveSpeedConfig, PlayerConfig,
    SceneConfig, SimulationConfig, ViewMode,
};
pub use constants::{
    DEFAULT_MIN_PENETRATION_DEPTH, MAX_PENETRATION_DEPTH, MAX_SLOPE_RADIANS,
    MIN_DASH_DELAY_SECONDS, MIN_JUMP_DELAY_SECONDS, STEP_HEIGHT,
};
pub use controller::{
    CharacterController, CharacterControllerState, FootstepEvent, JumpEvent, LandingEvent,
    TickReport,
};
pub use debug::{DebugAction, DebugCommandRegistry, DebugOutput};
pub use error::{
    CallbackError, ConfigError, DebugCommandError, SceneError, SensorError, ShapeError,
    WorldError,
};
pub use input::{InputMapper, KeyState, LookDelta, MouseDelta, MoveVector};
pub use scene::{FrameReport, PlayableScene};
pub use shape::{
    GeometryKind, HeightSampler, HeightfieldBounds, MeshGeometry, ShapeDescriptor,
    build_from_mesh, build_heightfield,
};
