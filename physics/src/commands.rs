//! Deferred scene mutations.
//!
//! Sensor callbacks and debug commands run while the world is borrowed mid-frame. Anything
//! that would restructure the world (reset, teleport, removing a sensor) is queued here and
//! applied by the scene once the frame's camera has been derived.

use crate::collision::{Quat, SensorHandle, Vec3};

#[derive(Clone, Debug, PartialEq)]
pub enum SceneCommand {
    /// Tear down and rebuild the collision world, then respawn the player.
    Reset,
    Teleport {
        position: Vec3,
        rotation: Option<Quat>,
    },
    /// `None` toggles.
    SetFlyMode(Option<bool>),
    RemoveSensor(SensorHandle),
    SetGravity(f32),
}

#[derive(Debug, Default)]
pub struct SceneCommands {
    queue: Vec<SceneCommand>,
}

impl SceneCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: SceneCommand) {
        self.queue.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Take every queued command, oldest first.
    pub fn drain(&mut self) -> Vec<SceneCommand> {
        std::mem::take(&mut self.queue)
    }
}
