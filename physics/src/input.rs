//! Raw key and mouse state to movement and look intent.
//!
//! The mapper is stateless apart from the mouse sensitivity. It never reads devices; the host
//! fills `KeyState`/`MouseDelta` from whatever input layer it has.

use crate::{
    collision::Vec3,
    config::ViewMode,
    utils::planar_direction,
};

/// Keys the scene reacts to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyState {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    /// Fly mode only.
    pub up: bool,
    /// Fly mode only.
    pub down: bool,
    pub jump: bool,
    pub dash: bool,
}

/// Mouse motion since the last frame, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MouseDelta {
    pub dx: f32,
    pub dy: f32,
}

/// Movement intent in world space.
///
/// `direction` is the sum of the pressed axes, so a diagonal is `sqrt(2)` long. `forward` and
/// `left` are the unit basis it was built from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveVector {
    pub direction: Vec3,
    pub forward: Vec3,
    pub left: Vec3,
}

impl MoveVector {
    pub fn is_zero(&self) -> bool {
        self.direction == Vec3::zeros()
    }
}

/// Yaw and pitch change (radians).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LookDelta {
    pub yaw: f32,
    pub pitch: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputMapper {
    /// Radians per pixel of mouse motion.
    pub mouse_sensitivity: f32,
}

impl Default for InputMapper {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 0.002,
        }
    }
}

impl InputMapper {
    pub fn new(mouse_sensitivity: f32) -> Self {
        Self { mouse_sensitivity }
    }

    /// First person moves relative to the camera's horizontal heading; top-down uses fixed
    /// world axes (forward is -Z, left is -X). `fly` adds the up/down keys along Y.
    pub fn compute_move_vector(
        &self,
        keys: &KeyState,
        view_mode: &ViewMode,
        camera_forward: Vec3,
        fly: bool,
    ) -> MoveVector {
        let up = Vec3::y();
        let forward = match view_mode {
            ViewMode::FirstPerson => {
                planar_direction(&camera_forward).unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0))
            }
            ViewMode::TopDown { .. } => Vec3::new(0.0, 0.0, -1.0),
        };
        let left = up.cross(&forward);

        let mut direction = Vec3::zeros();
        if keys.forward {
            direction += forward;
        }
        if keys.backward {
            direction -= forward;
        }
        if keys.left {
            direction += left;
        }
        if keys.right {
            direction -= left;
        }
        if fly {
            if keys.up {
                direction += up;
            }
            if keys.down {
                direction -= up;
            }
        }

        MoveVector {
            direction,
            forward,
            left,
        }
    }

    /// Mouse motion to look rotation. Top-down cameras do not look around.
    pub fn compute_look_delta(&self, mouse: &MouseDelta, view_mode: &ViewMode) -> LookDelta {
        match view_mode {
            ViewMode::FirstPerson => LookDelta {
                yaw: -mouse.dx * self.mouse_sensitivity,
                pitch: -mouse.dy * self.mouse_sensitivity,
            },
            ViewMode::TopDown { .. } => LookDelta::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraFocusPoint;
    use approx::assert_relative_eq;

    fn top_down() -> ViewMode {
        ViewMode::TopDown {
            camera_offset: [0.0, 20.0, 0.0],
            camera_focus_point: CameraFocusPoint::Player,
        }
    }

    #[test]
    fn first_person_projects_camera_forward() {
        let keys = KeyState {
            forward: true,
            ..KeyState::default()
        };
        let mv = InputMapper::default().compute_move_vector(
            &keys,
            &ViewMode::FirstPerson,
            Vec3::new(1.0, -1.0, 0.0),
            false,
        );
        assert_relative_eq!(mv.direction, Vec3::new(1.0, 0.0, 0.0), epsilon = 1.0e-6);
        assert_relative_eq!(mv.left, Vec3::new(0.0, 0.0, -1.0), epsilon = 1.0e-6);
    }

    #[test]
    fn top_down_uses_world_axes() {
        let keys = KeyState {
            forward: true,
            left: true,
            ..KeyState::default()
        };
        let mv = InputMapper::default().compute_move_vector(
            &keys,
            &top_down(),
            Vec3::new(1.0, 0.0, 0.0),
            false,
        );
        assert_relative_eq!(mv.direction, Vec3::new(-1.0, 0.0, -1.0), epsilon = 1.0e-6);
    }

    #[test]
    fn opposite_keys_cancel() {
        let keys = KeyState {
            forward: true,
            backward: true,
            ..KeyState::default()
        };
        let mv = InputMapper::default().compute_move_vector(
            &keys,
            &ViewMode::FirstPerson,
            Vec3::new(0.0, 0.0, -1.0),
            false,
        );
        assert!(mv.is_zero());
    }

    #[test]
    fn vertical_keys_only_count_when_flying() {
        let keys = KeyState {
            up: true,
            ..KeyState::default()
        };
        let mapper = InputMapper::default();
        let walking = mapper.compute_move_vector(&keys, &ViewMode::FirstPerson, -Vec3::z(), false);
        let flying = mapper.compute_move_vector(&keys, &ViewMode::FirstPerson, -Vec3::z(), true);
        assert!(walking.is_zero());
        assert_eq!(flying.direction, Vec3::y());
    }

    #[test]
    fn look_delta_scales_and_ignores_top_down() {
        let mapper = InputMapper::new(0.01);
        let mouse = MouseDelta { dx: 10.0, dy: -5.0 };
        let look = mapper.compute_look_delta(&mouse, &ViewMode::FirstPerson);
        assert_relative_eq!(look.yaw, -0.1);
        assert_relative_eq!(look.pitch, 0.05);
        assert_eq!(mapper.compute_look_delta(&mouse, &top_down()), LookDelta::default());
    }
}
