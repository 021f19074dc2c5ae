/*!
Camera pose derived from the player and the active view mode.

- First person: the eye sits half the collider height above the player origin and the
  rotation is yaw then pitch, driven by mouse look.
- Top down: the camera sits at `focus + camera_offset` and looks at the focus, which is the
  player or a fixed point.

View-mode transitions blend from the pose at the time of the request to the target mode's
pose: position is lerped, rotation slerped. Only one transition runs at a time; a second
request while one is active is logged and ignored.
*/

use log::warn;

use crate::{
    collision::{Quat, Vec3},
    config::{CameraFocusPoint, ViewMode},
    constants::MAX_CAMERA_PITCH,
    input::LookDelta,
    utils::{rotation_from_yaw_pitch, yaw_pitch_from_rotation},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl CameraPose {
    /// Direction the camera looks along (-Z in camera space).
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::new(0.0, 0.0, -1.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct Transition {
    from: CameraPose,
    to: ViewMode,
    elapsed: f32,
    duration: f32,
}

#[derive(Clone, Debug)]
pub struct CameraRig {
    view_mode: ViewMode,
    collider_height: f32,
    yaw: f32,
    pitch: f32,
    pose: CameraPose,
    transition: Option<Transition>,
}

impl CameraRig {
    pub fn new(view_mode: ViewMode, collider_height: f32) -> Self {
        Self {
            view_mode,
            collider_height,
            yaw: 0.0,
            pitch: 0.0,
            pose: CameraPose {
                position: Vec3::zeros(),
                rotation: Quat::identity(),
            },
            transition: None,
        }
    }

    pub fn view_mode(&self) -> &ViewMode {
        &self.view_mode
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    pub fn forward(&self) -> Vec3 {
        self.pose.forward()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Camera position for `player_pos` under `view_mode`.
    pub fn compute_camera_pos(&self, player_pos: Vec3, view_mode: &ViewMode) -> Vec3 {
        match view_mode {
            ViewMode::FirstPerson => player_pos + Vec3::new(0.0, 0.5 * self.collider_height, 0.0),
            ViewMode::TopDown {
                camera_offset,
                camera_focus_point,
            } => focus_point(player_pos, camera_focus_point) + Vec3::from(*camera_offset),
        }
    }

    /// Camera rotation for `player_pos` under `view_mode`.
    pub fn compute_camera_rotation(&self, player_pos: Vec3, view_mode: &ViewMode) -> Quat {
        match view_mode {
            ViewMode::FirstPerson => rotation_from_yaw_pitch(self.yaw, self.pitch),
            ViewMode::TopDown {
                camera_offset,
                camera_focus_point,
            } => {
                let focus = focus_point(player_pos, camera_focus_point);
                look_rotation(focus - (focus + Vec3::from(*camera_offset)))
            }
        }
    }

    /// Apply mouse look. Pitch is clamped short of straight up/down.
    pub fn apply_look(&mut self, delta: LookDelta) {
        self.yaw += delta.yaw;
        self.pitch = (self.pitch + delta.pitch).clamp(-MAX_CAMERA_PITCH, MAX_CAMERA_PITCH);
    }

    /// Point the first-person camera along `rotation`.
    pub fn set_rotation(&mut self, rotation: Quat) {
        let (yaw, pitch) = yaw_pitch_from_rotation(&rotation);
        self.yaw = yaw;
        self.pitch = pitch.clamp(-MAX_CAMERA_PITCH, MAX_CAMERA_PITCH);
    }

    /// Start blending to `target` over `duration` seconds.
    ///
    /// Returns `false` without effect while another transition is running.
    pub fn begin_transition(&mut self, target: ViewMode, duration: f32) -> bool {
        if self.transition.is_some() {
            warn!("camera: view-mode transition already in progress, ignoring request");
            return false;
        }
        if !(duration > 0.0) {
            self.view_mode = target;
            return true;
        }
        self.transition = Some(Transition {
            from: self.pose,
            to: target,
            elapsed: 0.0,
            duration,
        });
        true
    }

    /// Derive this frame's pose from the freshly stepped player position.
    pub fn update(&mut self, player_pos: Vec3, dt: f32) -> CameraPose {
        let Some(mut transition) = self.transition.take() else {
            self.pose = CameraPose {
                position: self.compute_camera_pos(player_pos, &self.view_mode),
                rotation: self.compute_camera_rotation(player_pos, &self.view_mode),
            };
            return self.pose;
        };

        transition.elapsed += dt.max(0.0);
        let t = (transition.elapsed / transition.duration).min(1.0);
        let target = CameraPose {
            position: self.compute_camera_pos(player_pos, &transition.to),
            rotation: self.compute_camera_rotation(player_pos, &transition.to),
        };
        self.pose = CameraPose {
            position: transition.from.position.lerp(&target.position, t),
            rotation: transition
                .from
                .rotation
                .try_slerp(&target.rotation, t, 1.0e-6)
                .unwrap_or(target.rotation),
        };

        if t >= 1.0 {
            self.view_mode = transition.to;
        } else {
            self.transition = Some(transition);
        }
        self.pose
    }
}

fn focus_point(player_pos: Vec3, focus: &CameraFocusPoint) -> Vec3 {
    match focus {
        CameraFocusPoint::Player => player_pos,
        CameraFocusPoint::Fixed(point) => Vec3::from(*point),
    }
}

/// Rotation whose -Z axis points along `dir`. Straight down keeps -Z as screen up.
fn look_rotation(dir: Vec3) -> Quat {
    let Some(dir) = dir.try_normalize(1.0e-6) else {
        return Quat::identity();
    };
    let up = if dir.y.abs() > 0.999 {
        Vec3::new(0.0, 0.0, -1.0)
    } else {
        Vec3::y()
    };
    Quat::look_at_rh(&dir, &up).inverse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fixed_top_down() -> ViewMode {
        ViewMode::TopDown {
            camera_offset: [0.0, 20.0, 0.0],
            camera_focus_point: CameraFocusPoint::Fixed([10.0, 0.0, 10.0]),
        }
    }

    #[test]
    fn fixed_focus_ignores_player_position() {
        let rig = CameraRig::new(fixed_top_down(), 1.8);
        for player in [Vec3::zeros(), Vec3::new(-40.0, 3.0, 7.5), Vec3::new(1.0e3, -5.0, 2.0)] {
            assert_eq!(
                rig.compute_camera_pos(player, &fixed_top_down()),
                Vec3::new(10.0, 20.0, 10.0)
            );
        }
    }

    #[test]
    fn first_person_eye_is_half_height_up() {
        let rig = CameraRig::new(ViewMode::FirstPerson, 1.8);
        let pos = rig.compute_camera_pos(Vec3::new(1.0, 2.0, 3.0), &ViewMode::FirstPerson);
        assert_relative_eq!(pos, Vec3::new(1.0, 2.9, 3.0), epsilon = 1.0e-6);
    }

    #[test]
    fn top_down_looks_at_focus() {
        let mode = ViewMode::TopDown {
            camera_offset: [0.0, 10.0, 10.0],
            camera_focus_point: CameraFocusPoint::Player,
        };
        let mut rig = CameraRig::new(mode, 1.8);
        let pose = rig.update(Vec3::new(2.0, 0.0, 0.0), 0.016);
        assert_relative_eq!(pose.position, Vec3::new(2.0, 10.0, 10.0), epsilon = 1.0e-6);
        let expected = Vec3::new(0.0, -1.0, -1.0).normalize();
        assert_relative_eq!(pose.forward(), expected, epsilon = 1.0e-5);

        let straight_down = CameraRig::new(fixed_top_down(), 1.8).update(Vec3::zeros(), 0.016);
        assert_relative_eq!(straight_down.forward(), -Vec3::y(), epsilon = 1.0e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut rig = CameraRig::new(ViewMode::FirstPerson, 1.8);
        rig.apply_look(LookDelta {
            yaw: 0.3,
            pitch: 10.0,
        });
        let pose = rig.update(Vec3::zeros(), 0.016);
        assert!(pose.forward().y < 1.0);
        assert_relative_eq!(pose.forward().y, MAX_CAMERA_PITCH.sin(), epsilon = 1.0e-5);
    }

    #[test]
    fn second_transition_is_rejected_until_first_finishes() {
        let mut rig = CameraRig::new(ViewMode::FirstPerson, 1.8);
        rig.update(Vec3::zeros(), 0.0);

        assert!(rig.begin_transition(fixed_top_down(), 1.0));
        assert!(!rig.begin_transition(ViewMode::FirstPerson, 1.0));

        let halfway = rig.update(Vec3::zeros(), 0.5);
        assert_relative_eq!(halfway.position, Vec3::new(5.0, 10.45, 5.0), epsilon = 1.0e-5);
        assert!(rig.is_transitioning());

        let done = rig.update(Vec3::zeros(), 0.5);
        assert_relative_eq!(done.position, Vec3::new(10.0, 20.0, 10.0), epsilon = 1.0e-5);
        assert!(!rig.is_transitioning());
        assert_eq!(*rig.view_mode(), fixed_top_down());
        assert!(rig.begin_transition(ViewMode::FirstPerson, 1.0));
    }

    #[test]
    fn set_rotation_round_trips_through_yaw_pitch() {
        let mut rig = CameraRig::new(ViewMode::FirstPerson, 1.8);
        let rotation = rotation_from_yaw_pitch(0.7, -0.2);
        rig.set_rotation(rotation);
        let pose = rig.update(Vec3::zeros(), 0.016);
        assert_relative_eq!(pose.rotation.angle_to(&rotation), 0.0, epsilon = 1.0e-4);
    }
}
