use nalgebra::Vector2;

use crate::{
    collision::{Quat, Vec3},
    constants::YAW_EPS,
};

/// Yaw (radians, about +Y) of a planar direction. Zero yaw faces -Z.
pub fn yaw_from_xz(xz: Vector2<f32>) -> Option<f32> {
    if xz.norm_squared() > YAW_EPS {
        return Some((-xz[0]).atan2(-xz[1]));
    }

    None
}

#[inline]
pub fn to_planar(v: &Vec3) -> Vector2<f32> {
    Vector2::new(v.x, v.z)
}

/// Horizontal part of `v`, normalized. `None` when `v` is (nearly) vertical.
pub fn planar_direction(v: &Vec3) -> Option<Vec3> {
    Vec3::new(v.x, 0.0, v.z).try_normalize(YAW_EPS)
}

/// Yaw about +Y, then pitch about the local +X.
pub fn rotation_from_yaw_pitch(yaw: f32, pitch: f32) -> Quat {
    Quat::from_axis_angle(&Vec3::y_axis(), yaw) * Quat::from_axis_angle(&Vec3::x_axis(), pitch)
}

/// Inverse of `rotation_from_yaw_pitch` for the camera's -Z forward.
pub fn yaw_pitch_from_rotation(rotation: &Quat) -> (f32, f32) {
    let forward = rotation * Vec3::new(0.0, 0.0, -1.0);
    let yaw = yaw_from_xz(to_planar(&forward)).unwrap_or(0.0);
    let pitch = forward.y.clamp(-1.0, 1.0).asin();
    (yaw, pitch)
}
