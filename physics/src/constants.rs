/*!
Character controller, sensor and simulation tuning constants.

These constants centralize the parameters used by the kinematic controller, the
sensor overlap test and the fixed-step simulation loop. Keeping them together makes
tuning easier and keeps call sites free of magic numbers.

Notes
- Distances are in meters, time in seconds, angles in radians.
- The controller values were picked empirically: lower values let the capsule clip
  through thin geometry, higher values make it jitter or stick to walls and ledges.
- Scene configuration may override the step height; everything else is fixed.
*/

/// Minimum time between two accepted jump requests (seconds).
pub const MIN_JUMP_DELAY_SECONDS: f32 = 0.25;

/// Minimum time between two accepted dash requests (seconds).
pub const MIN_DASH_DELAY_SECONDS: f32 = 1.0;

/// How long after a dash the controller still reports itself as dashing (seconds).
pub const DASH_ACTIVE_SECONDS: f32 = 0.3;

/// Share of the jump velocity that is redirected along the current move direction.
pub const JUMP_MOVE_DIRECTION_BIAS: f32 = 0.3;

/// Default autostep height of the character controller (meters).
pub const STEP_HEIGHT: f32 = 0.05;

/// Maximum penetration depth tolerated before the controller reports ground contact
/// and snaps down onto it (meters).
pub const MAX_PENETRATION_DEPTH: f32 = 0.075;

/// Maximum climbable slope (radians).
pub const MAX_SLOPE_RADIANS: f32 = 0.8;

/// Gap preserved between the controller shape and the geometry it slides against (meters).
pub const CONTROLLER_OFFSET: f32 = 0.01;

/// Minimum autostep width: the free space required on top of a step (meters).
pub const STEP_MIN_WIDTH: f32 = 0.05;

/// Length of the downward ray used to identify the floor collider under the player (meters).
pub const GROUND_PROBE_DISTANCE: f32 = 0.2;

/// Planar speed below which the player is not considered walking (m/s).
pub const WALKING_SPEED_EPS: f32 = 1.0e-3;

/// Default sensor trigger threshold (meters of penetration).
pub const DEFAULT_MIN_PENETRATION_DEPTH: f32 = 0.04;

/// Default upper bound on fixed sub-steps per rendered frame.
pub const DEFAULT_MAX_SUB_STEPS: u32 = 20;

/// Default fixed simulation rate (Hz).
pub const DEFAULT_FIXED_STEP_HZ: f32 = 160.0;

/// Material class reported for floors without a tag.
pub const DEFAULT_MATERIAL_CLASS: &str = "default";

/// Icosahedra at or above this subdivision level are collided as spheres.
pub const SPHERE_MIN_ICOSAHEDRON_DETAIL: u32 = 3;

/// Relative tolerance used when deciding whether a mesh scale is uniform.
pub const UNIFORM_SCALE_EPS: f32 = 1.0e-4;

/// Pitch limit for the first-person camera (radians).
pub const MAX_CAMERA_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Minimum planar motion required to derive a yaw.
pub const YAW_EPS: f32 = 1.0e-6;
