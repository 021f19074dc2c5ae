//! Scene configuration.
//!
//! The playable scene is configured by a single TOML document. Keys are camelCase so the
//! same document can be shared with the scene editor, e.g.
//!
//! ```toml
//! gravity = -9.81
//!
//! [player]
//! jumpVelocity = 6.0
//! moveSpeed = { onGround = 6.0, inAir = 4.8 }
//! colliderSize = { height = 1.8, radius = 0.35, shape = "capsule" }
//!
//! [viewMode]
//! mode = "topDown"
//! cameraOffset = [0.0, 20.0, 0.0]
//! cameraFocusPoint = { fixed = [10.0, 0.0, 10.0] }
//! ```
//!
//! Every field has a default, so an empty document is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    collision::Vec3,
    constants::{DEFAULT_FIXED_STEP_HZ, DEFAULT_MAX_SUB_STEPS, STEP_HEIGHT},
    error::ConfigError,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneConfig {
    /// Vertical gravity (m/s^2). Negative pulls down.
    pub gravity: f32,
    pub player: PlayerConfig,
    pub view_mode: ViewMode,
    pub simulation: SimulationConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            gravity: -9.81,
            player: PlayerConfig::default(),
            view_mode: ViewMode::FirstPerson,
            simulation: SimulationConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Vertical velocity applied by a jump (m/s).
    pub jump_velocity: f32,
    /// Horizontal velocity applied by a dash (m/s).
    pub dash_velocity: f32,
    pub move_speed: MoveSpeedConfig,
    pub collider_size: ColliderSizeConfig,
    /// Autostep height (meters).
    pub step_height: f32,
    /// Falling below this height respawns the player.
    pub oob_y_threshold: f32,
    /// Per-axis share of external velocity removed per fixed step while airborne.
    pub external_velocity_air_damping_factor: [f32; 3],
    /// Per-axis share of external velocity removed per fixed step while grounded.
    pub external_velocity_ground_damping_factor: [f32; 3],
    pub spawn_position: [f32; 3],
    /// Rescale straight (non-diagonal) input so it reaches diagonal speed.
    pub easy_movement: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            jump_velocity: 6.0,
            dash_velocity: 12.0,
            move_speed: MoveSpeedConfig::default(),
            collider_size: ColliderSizeConfig::default(),
            step_height: STEP_HEIGHT,
            oob_y_threshold: -50.0,
            external_velocity_air_damping_factor: [0.02, 0.0, 0.02],
            external_velocity_ground_damping_factor: [0.15, 0.0, 0.15],
            spawn_position: [0.0, 2.0, 0.0],
            easy_movement: false,
        }
    }
}

impl PlayerConfig {
    pub fn spawn_position(&self) -> Vec3 {
        Vec3::from(self.spawn_position)
    }

    pub fn air_damping(&self) -> Vec3 {
        Vec3::from(self.external_velocity_air_damping_factor)
    }

    pub fn ground_damping(&self) -> Vec3 {
        Vec3::from(self.external_velocity_ground_damping_factor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MoveSpeedConfig {
    pub on_ground: f32,
    pub in_air: f32,
}

impl Default for MoveSpeedConfig {
    fn default() -> Self {
        Self {
            on_ground: 6.0,
            in_air: 4.8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColliderSizeConfig {
    /// Total height of the player collider (meters).
    pub height: f32,
    pub radius: f32,
    pub shape: ColliderShapeKind,
}

impl Default for ColliderSizeConfig {
    fn default() -> Self {
        Self {
            height: 1.8,
            radius: 0.35,
            shape: ColliderShapeKind::Capsule,
        }
    }
}

/// Supported player collider shapes. Any other value fails to parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColliderShapeKind {
    Capsule,
    Cylinder,
    Sphere,
}

/// Active camera/view mode.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ViewMode {
    FirstPerson,
    #[serde(rename_all = "camelCase")]
    TopDown {
        camera_offset: [f32; 3],
        camera_focus_point: CameraFocusPoint,
    },
}

impl ViewMode {
    pub fn is_first_person(&self) -> bool {
        matches!(self, ViewMode::FirstPerson)
    }
}

/// What a top-down camera looks at.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraFocusPoint {
    /// Follow the player.
    Player,
    /// Stay on a fixed world-space point.
    Fixed([f32; 3]),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    pub fixed_step_hz: f32,
    pub max_sub_steps: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_step_hz: DEFAULT_FIXED_STEP_HZ,
            max_sub_steps: DEFAULT_MAX_SUB_STEPS,
        }
    }
}

impl SceneConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Reject values the controller cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravity.is_finite() {
            return Err(invalid("gravity", "must be finite"));
        }

        let size = &self.player.collider_size;
        if !(size.height > 0.0) {
            return Err(invalid("player.colliderSize.height", "must be positive"));
        }
        if !(size.radius > 0.0) {
            return Err(invalid("player.colliderSize.radius", "must be positive"));
        }
        if size.shape == ColliderShapeKind::Capsule && size.height < 2.0 * size.radius {
            return Err(invalid(
                "player.colliderSize.height",
                "a capsule must be at least twice as tall as its radius",
            ));
        }

        let speed = &self.player.move_speed;
        if speed.on_ground < 0.0 || speed.in_air < 0.0 {
            return Err(invalid("player.moveSpeed", "speeds must not be negative"));
        }
        if self.player.step_height < 0.0 {
            return Err(invalid("player.stepHeight", "must not be negative"));
        }

        let damping = self
            .player
            .external_velocity_air_damping_factor
            .iter()
            .chain(self.player.external_velocity_ground_damping_factor.iter());
        for factor in damping {
            if !(0.0..=1.0).contains(factor) {
                return Err(invalid(
                    "player.externalVelocityDampingFactor",
                    "factors must lie in [0, 1]",
                ));
            }
        }

        if !(self.simulation.fixed_step_hz > 0.0) {
            return Err(invalid("simulation.fixedStepHz", "must be positive"));
        }
        if self.simulation.max_sub_steps == 0 {
            return Err(invalid("simulation.maxSubSteps", "must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SceneConfig::from_toml_str("").unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn parses_top_down_view_mode_with_fixed_focus() {
        let source = r#"
            gravity = -20.0

            [player]
            jumpVelocity = 8.0
            moveSpeed = { onGround = 5.0, inAir = 3.0 }
            colliderSize = { height = 2.0, radius = 0.4, shape = "cylinder" }

            [viewMode]
            mode = "topDown"
            cameraOffset = [0.0, 20.0, 0.0]
            cameraFocusPoint = { fixed = [10.0, 0.0, 10.0] }
        "#;

        let config = SceneConfig::from_toml_str(source).unwrap();
        assert_eq!(config.gravity, -20.0);
        assert_eq!(config.player.jump_velocity, 8.0);
        assert_eq!(config.player.move_speed.in_air, 3.0);
        assert_eq!(config.player.collider_size.shape, ColliderShapeKind::Cylinder);
        assert_eq!(
            config.view_mode,
            ViewMode::TopDown {
                camera_offset: [0.0, 20.0, 0.0],
                camera_focus_point: CameraFocusPoint::Fixed([10.0, 0.0, 10.0]),
            }
        );
    }

    #[test]
    fn player_focus_point_parses_from_plain_string() {
        let source = r#"
            [viewMode]
            mode = "topDown"
            cameraOffset = [0.0, 12.0, 6.0]
            cameraFocusPoint = "player"
        "#;
        let config = SceneConfig::from_toml_str(source).unwrap();
        assert!(matches!(
            config.view_mode,
            ViewMode::TopDown {
                camera_focus_point: CameraFocusPoint::Player,
                ..
            }
        ));
    }

    #[test]
    fn unsupported_view_mode_is_rejected() {
        let source = r#"
            [viewMode]
            mode = "isometric"
        "#;
        assert!(matches!(
            SceneConfig::from_toml_str(source),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn unsupported_collider_shape_is_rejected() {
        let source = r#"
            [player]
            colliderSize = { height = 1.8, radius = 0.3, shape = "cone" }
        "#;
        assert!(matches!(
            SceneConfig::from_toml_str(source),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn capsule_shorter_than_its_diameter_is_invalid() {
        let mut config = SceneConfig::default();
        config.player.collider_size.height = 0.5;
        config.player.collider_size.radius = 0.4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "player.colliderSize.height",
                ..
            })
        ));
    }

    #[test]
    fn damping_outside_unit_range_is_invalid() {
        let mut config = SceneConfig::default();
        config.player.external_velocity_air_damping_factor = [0.1, 1.5, 0.1];
        assert!(config.validate().is_err());
    }
}
