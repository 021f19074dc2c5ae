//! Error types.
//!
//! Setup-time failures (bad configuration, unsupported geometry, invariant violations)
//! surface as these errors and abort scene initialization. Per-frame failures never
//! reach the render loop: they are logged where they happen.

use thiserror::Error;

/// Failures while converting render geometry into a collision shape.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("mesh `{mesh}`: quantized (16-bit) vertex buffers are not supported")]
    QuantizedVertices { mesh: String },

    #[error("mesh `{mesh}`: position buffer length {len} is not a multiple of 3")]
    MalformedPositions { mesh: String, len: usize },

    #[error("mesh `{mesh}`: index buffer length {len} is not a multiple of 3")]
    MalformedIndices { mesh: String, len: usize },

    #[error("mesh `{mesh}`: index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        mesh: String,
        index: u32,
        vertex_count: usize,
    },

    #[error("mesh `{mesh}` has no vertices")]
    Empty { mesh: String },

    #[error("could not compute a convex hull (degenerate point set)")]
    DegenerateHull,

    #[error("triangle mesh rejected by the physics engine: {0}")]
    TriMesh(String),

    #[error("heightfield expects {expected} samples ({grid_x}x{grid_z}), got {actual}")]
    HeightfieldSamples {
        expected: usize,
        actual: usize,
        grid_x: usize,
        grid_z: usize,
    },

    #[error("invalid {what}: {value}")]
    InvalidDimension { what: &'static str, value: f32 },

    #[error("compound shape has no children")]
    EmptyCompound,

    #[error("compound children must be convex primitives or hulls")]
    NestedComposite,
}

/// Failures while loading or validating the scene configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Collision world invariant violations and registration failures.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("a character controller is already registered in this world")]
    PlayerAlreadyRegistered,

    #[error("no character controller body is registered in this world")]
    PlayerNotRegistered,

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Sensor registration failures.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("a contact region needs at least one of `on_enter` / `on_leave`")]
    NoCallbacks,

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Debug console failures.
#[derive(Debug, Error)]
pub enum DebugCommandError {
    #[error("unknown debug command `{0}`")]
    Unknown(String),

    #[error("empty debug command")]
    Empty,

    #[error("`{command}`: {reason}")]
    InvalidArguments { command: String, reason: String },
}

/// Anything that can abort scene setup.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Sensor(#[from] SensorError),
}

/// Error type returned by user callbacks (sensor enter/leave).
///
/// These are logged at the callback boundary and never propagated.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;
