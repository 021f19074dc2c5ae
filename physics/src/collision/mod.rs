/*!
Collision root module.

- types:  math aliases, handles, body metadata and collision groups
- ledger: creation/destruction bookkeeping for engine resources
- world:  the rapier world, fixed-step loop, body registration and queries
- sensor: ghost trigger volumes with edge-triggered enter/leave callbacks
*/

pub mod ledger;
pub mod sensor;
pub mod types;
pub mod world;

pub use ledger::{LedgerCounts, ResourceKind, ResourceLedger};
pub use sensor::{
    ContactRegion, SensorCallback, SensorEvent, SensorHandle, SensorRemoval, SensorState,
    SensorSystem,
};
pub use types::{
    BodyHandle, BodyKind, CollisionObjectRef, Iso, Point3, Quat, Vec3,
    groups_interact, player_groups, sensor_groups, static_groups,
};
pub use world::{CollisionWorld, PhysicsState, PlayerBody, StepAction};
