/*!
Trigger volumes built from ghost colliders.

Rapier sensors report intersections, but only for the collision types enabled on both
colliders and only after a full pipeline step. The scene needs something simpler: for every
registered region, did the player start or stop overlapping it this frame. That is tracked
here with one `is_overlapping` flag per sensor.

Per-frame update
- Broad phase: count player colliders whose AABB overlaps the ghost's AABB (after the group
  check). A zero count settles the sensor as "not overlapping" without a shape query.
- Narrow phase: only for a non-zero count, run a contact query between the ghost shape and
  the player shape. The sensor overlaps when the penetration depth, plus the region's
  margin, reaches `min_penetration_depth`.
- Edge trigger: the result is compared to `is_overlapping`; `on_enter` fires on false to
  true, `on_leave` on true to false. Nothing fires when the state is unchanged.

Notes
- Callbacks receive a `SensorEvent` with access to the deferred command queue. They must not
  mutate the world directly; structural changes are applied at the end of the frame.
- Callback errors are logged and never reach the render loop.
*/

use std::collections::BTreeMap;

use log::{debug, warn};
use rapier3d::{
    parry::{bounding_volume::BoundingVolume, query},
    prelude::*,
};

use crate::{
    collision::{
        CollisionWorld, Iso, Point3, Quat, ResourceKind, Vec3, groups_interact,
        world::{PhysicsState, PlayerBody},
        sensor_groups,
    },
    commands::{SceneCommand, SceneCommands},
    constants::DEFAULT_MIN_PENETRATION_DEPTH,
    error::{CallbackError, SensorError, ShapeError},
    shape::{MeshGeometry, ShapeDescriptor, build_from_mesh},
};

/// Opaque sensor id. Never reused, not even across world resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SensorHandle(u64);

impl SensorHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Context passed to enter/leave callbacks.
pub struct SensorEvent<'a> {
    pub sensor: SensorHandle,
    /// `true` for enter, `false` for leave.
    pub entered: bool,
    commands: &'a mut SceneCommands,
}

impl SensorEvent<'_> {
    /// Queue a mutation for the end of the frame.
    pub fn defer(&mut self, command: SceneCommand) {
        self.commands.push(command);
    }
}

pub type SensorCallback = Box<dyn FnMut(&mut SensorEvent<'_>) -> Result<(), CallbackError>>;

/// Shape and pose of a trigger volume.
#[derive(Clone, Debug, PartialEq)]
pub enum ContactRegion {
    Box {
        pos: Vec3,
        half_extents: Vec3,
        quat: Option<Quat>,
    },
    /// The mesh itself, placed at its own transform.
    Mesh {
        mesh: MeshGeometry,
        margin: Option<f32>,
        scale: Option<Vec3>,
    },
    /// Convex hull of the mesh vertices.
    ConvexHull {
        mesh: MeshGeometry,
        scale: Option<Vec3>,
    },
    /// World-axis-aligned box around the transformed mesh vertices.
    Aabb {
        mesh: MeshGeometry,
        scale: Option<Vec3>,
    },
    Sphere {
        pos: Vec3,
        radius: f32,
    },
}

impl ContactRegion {
    /// Shape, world pose and contact margin of the ghost.
    fn build(&self) -> Result<(ShapeDescriptor, Iso, f32), SensorError> {
        match self {
            ContactRegion::Box {
                pos,
                half_extents,
                quat,
            } => Ok((
                ShapeDescriptor::Box {
                    half_extents: *half_extents,
                },
                Iso::from_parts((*pos).into(), quat.unwrap_or_else(Quat::identity)),
                0.0,
            )),

            ContactRegion::Mesh {
                mesh,
                margin,
                scale,
            } => Ok((
                build_from_mesh(mesh, *scale)?,
                mesh_pose(mesh),
                margin.unwrap_or(0.0),
            )),

            ContactRegion::ConvexHull { mesh, scale } => {
                let vertices = mesh.vertices()?;
                let indices = mesh.triangles(vertices.len())?;
                let scale = scale.map_or(mesh.scale, |s| mesh.scale.component_mul(&s));
                Ok((
                    ShapeDescriptor::ConvexHull {
                        vertices,
                        indices,
                        scale,
                    },
                    mesh_pose(mesh),
                    0.0,
                ))
            }

            ContactRegion::Aabb { mesh, scale } => {
                let scale = scale.map_or(mesh.scale, |s| mesh.scale.component_mul(&s));
                let pose = mesh_pose(mesh);
                let world: Vec<Point3> = mesh
                    .vertices()?
                    .iter()
                    .map(|p| pose * Point3::from(p.coords.component_mul(&scale)))
                    .collect();
                let Some(first) = world.first() else {
                    return Err(ShapeError::Empty {
                        mesh: mesh.name.clone(),
                    }
                    .into());
                };
                let (min, max) = world.iter().fold((*first, *first), |(lo, hi), p| {
                    (lo.inf(p), hi.sup(p))
                });
                let half_extents = (0.5 * (max - min)).map(|h| h.max(MIN_AABB_HALF_EXTENT));
                Ok((
                    ShapeDescriptor::Box { half_extents },
                    Iso::translation(
                        0.5 * (min.x + max.x),
                        0.5 * (min.y + max.y),
                        0.5 * (min.z + max.z),
                    ),
                    0.0,
                ))
            }

            ContactRegion::Sphere { pos, radius } => Ok((
                ShapeDescriptor::Sphere { radius: *radius },
                Iso::translation(pos.x, pos.y, pos.z),
                0.0,
            )),
        }
    }

    fn name(&self) -> Option<&str> {
        match self {
            ContactRegion::Mesh { mesh, .. }
            | ContactRegion::ConvexHull { mesh, .. }
            | ContactRegion::Aabb { mesh, .. } => Some(&mesh.name),
            ContactRegion::Box { .. } | ContactRegion::Sphere { .. } => None,
        }
    }
}

/// Flat meshes still get a box with some thickness.
const MIN_AABB_HALF_EXTENT: f32 = 1.0e-3;

fn mesh_pose(mesh: &MeshGeometry) -> Iso {
    Iso::from_parts(mesh.translation.into(), mesh.rotation)
}

/// Overlap state of one sensor.
pub struct SensorState {
    pub is_overlapping: bool,
    pub min_penetration_depth: f32,
    on_enter: Option<SensorCallback>,
    on_leave: Option<SensorCallback>,
}

struct Sensor {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    margin: f32,
    name: Option<String>,
    state: SensorState,
}

/// What `remove_contact_region` did.
pub enum SensorRemoval {
    /// Ghost and host body were destroyed.
    Destroyed,
    /// Ghost was unregistered and handed back to the caller.
    Detached(Collider),
    /// The handle did not name a live sensor.
    Unknown,
}

#[derive(Default)]
pub struct SensorSystem {
    sensors: BTreeMap<SensorHandle, Sensor>,
    next_id: u64,
}

impl SensorSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn contains(&self, handle: SensorHandle) -> bool {
        self.sensors.contains_key(&handle)
    }

    pub fn is_overlapping(&self, handle: SensorHandle) -> Option<bool> {
        self.sensors.get(&handle).map(|s| s.state.is_overlapping)
    }

    pub(crate) fn add(
        &mut self,
        physics: &mut PhysicsState,
        region: &ContactRegion,
        on_enter: Option<SensorCallback>,
        on_leave: Option<SensorCallback>,
        min_penetration_depth: Option<f32>,
    ) -> Result<SensorHandle, SensorError> {
        if on_enter.is_none() && on_leave.is_none() {
            return Err(SensorError::NoCallbacks);
        }
        let (descriptor, pose, margin) = region.build()?;
        let shape = descriptor.to_shared_shape()?;

        let body = RigidBodyBuilder::fixed().pose(pose).build();
        let collider = ColliderBuilder::new(shape)
            .sensor(true)
            .collision_groups(sensor_groups())
            .active_collision_types(
                ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_FIXED,
            )
            .build();
        let (body, collider) = physics.insert(body, collider);

        self.next_id += 1;
        let handle = SensorHandle(self.next_id);
        self.sensors.insert(
            handle,
            Sensor {
                body,
                collider,
                margin,
                name: region.name().map(str::to_owned),
                state: SensorState {
                    is_overlapping: false,
                    min_penetration_depth: min_penetration_depth
                        .unwrap_or(DEFAULT_MIN_PENETRATION_DEPTH),
                    on_enter,
                    on_leave,
                },
            },
        );
        debug!("sensor {}: registered", handle.0);
        Ok(handle)
    }

    pub(crate) fn remove(
        &mut self,
        physics: &mut PhysicsState,
        handle: SensorHandle,
        destroy_native: bool,
    ) -> SensorRemoval {
        let Some(sensor) = self.sensors.remove(&handle) else {
            warn!("remove_contact_region: unknown sensor {}", handle.0);
            return SensorRemoval::Unknown;
        };

        if destroy_native {
            physics.remove(sensor.body, sensor.name.as_deref());
            return SensorRemoval::Destroyed;
        }

        let detached = physics.colliders.remove(
            sensor.collider,
            &mut physics.islands,
            &mut physics.bodies,
            false,
        );
        physics.remove(sensor.body, sensor.name.as_deref());
        match detached {
            Some(collider) => {
                physics.ledger.destroyed(ResourceKind::Ghost);
                physics.ledger.destroyed(ResourceKind::Shape);
                SensorRemoval::Detached(collider)
            }
            None => {
                physics
                    .ledger
                    .failed(ResourceKind::Ghost, sensor.name.as_deref());
                SensorRemoval::Destroyed
            }
        }
    }

    /// Destroy every sensor.
    pub(crate) fn clear(&mut self, physics: &mut PhysicsState) {
        let handles: Vec<SensorHandle> = self.sensors.keys().copied().collect();
        for handle in handles {
            self.remove(physics, handle, true);
        }
    }

    /// Player colliders whose AABB overlaps the ghost's.
    pub fn broadphase_overlap_count(
        &self,
        physics: &PhysicsState,
        handle: SensorHandle,
        player: Option<&PlayerBody>,
    ) -> usize {
        let (Some(sensor), Some(player)) = (self.sensors.get(&handle), player) else {
            return 0;
        };
        let (Some(ghost), Some(player)) = (
            physics.colliders.get(sensor.collider),
            physics.colliders.get(player.collider),
        ) else {
            return 0;
        };
        if !groups_interact(ghost.collision_groups(), player.collision_groups()) {
            return 0;
        }
        let ghost_aabb = ghost.compute_aabb().loosened(sensor.margin.max(0.0));
        usize::from(ghost_aabb.intersects(&player.compute_aabb()))
    }

    fn narrowphase_overlap(physics: &PhysicsState, sensor: &Sensor, player: &PlayerBody) -> bool {
        let (Some(ghost), Some(player)) = (
            physics.colliders.get(sensor.collider),
            physics.colliders.get(player.collider),
        ) else {
            return false;
        };
        let threshold = sensor.margin - sensor.state.min_penetration_depth;
        match query::contact(
            ghost.position(),
            ghost.shape(),
            player.position(),
            player.shape(),
            threshold.max(0.0),
        ) {
            Ok(Some(contact)) => contact.dist <= threshold,
            Ok(None) => false,
            Err(err) => {
                warn!("sensor contact query unsupported: {err:?}");
                false
            }
        }
    }

    /// Re-evaluate every sensor against the player and fire edge callbacks.
    pub(crate) fn update(
        &mut self,
        physics: &PhysicsState,
        player: Option<&PlayerBody>,
        commands: &mut SceneCommands,
    ) {
        let handles: Vec<SensorHandle> = self.sensors.keys().copied().collect();
        for handle in handles {
            let overlapping = match player {
                Some(player)
                    if self.broadphase_overlap_count(physics, handle, Some(player)) > 0 =>
                {
                    self.sensors
                        .get(&handle)
                        .is_some_and(|s| Self::narrowphase_overlap(physics, s, player))
                }
                _ => false,
            };

            let Some(sensor) = self.sensors.get_mut(&handle) else {
                continue;
            };
            if overlapping == sensor.state.is_overlapping {
                continue;
            }
            sensor.state.is_overlapping = overlapping;

            let callback = if overlapping {
                sensor.state.on_enter.as_mut()
            } else {
                sensor.state.on_leave.as_mut()
            };
            let Some(callback) = callback else {
                continue;
            };
            let mut event = SensorEvent {
                sensor: handle,
                entered: overlapping,
                commands: &mut *commands,
            };
            if let Err(err) = callback(&mut event) {
                warn!(
                    "sensor {} `{}` callback failed: {err}",
                    handle.0,
                    sensor.name.as_deref().unwrap_or("<unnamed>")
                );
            }
        }
    }
}

impl CollisionWorld {
    /// Register a trigger volume. At least one callback is required.
    ///
    /// `min_penetration_depth` defaults to `DEFAULT_MIN_PENETRATION_DEPTH`.
    pub fn add_contact_region(
        &mut self,
        region: &ContactRegion,
        on_enter: Option<SensorCallback>,
        on_leave: Option<SensorCallback>,
        min_penetration_depth: Option<f32>,
    ) -> Result<SensorHandle, SensorError> {
        self.sensors.add(
            &mut self.physics,
            region,
            on_enter,
            on_leave,
            min_penetration_depth,
        )
    }

    /// Unregister a trigger volume; with `destroy_native == false` the ghost collider is
    /// returned instead of destroyed. Unknown handles log and return `Unknown`.
    pub fn remove_contact_region(
        &mut self,
        handle: SensorHandle,
        destroy_native: bool,
    ) -> SensorRemoval {
        self.sensors.remove(&mut self.physics, handle, destroy_native)
    }

    pub fn sensor_overlap_count(&self, handle: SensorHandle) -> usize {
        self.sensors
            .broadphase_overlap_count(&self.physics, handle, self.player())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::shape::{GeometryKind, ShapeDescriptor};

    fn world_with_player(at: Vec3) -> CollisionWorld {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut world = CollisionWorld::init(-9.81);
        let shape = ShapeDescriptor::capsule(1.8, 0.35).unwrap();
        world.register_player(shape, at).unwrap();
        world.step_simulation(1.0 / 64.0, 64.0, 1, &mut ());
        world
    }

    fn move_player(world: &mut CollisionWorld, to: Vec3) {
        world.place_player(to).unwrap();
        world.step_simulation(1.0 / 64.0, 64.0, 1, &mut ());
    }

    fn counter() -> (Rc<Cell<u32>>, SensorCallback) {
        let count = Rc::new(Cell::new(0));
        let inner = Rc::clone(&count);
        let callback: SensorCallback = Box::new(move |_event| {
            inner.set(inner.get() + 1);
            Ok(())
        });
        (count, callback)
    }

    fn unit_box() -> ContactRegion {
        ContactRegion::Box {
            pos: Vec3::zeros(),
            half_extents: Vec3::new(1.0, 1.0, 1.0),
            quat: None,
        }
    }

    #[test]
    fn region_without_callbacks_is_rejected() {
        let mut world = CollisionWorld::init(-9.81);
        assert!(matches!(
            world.add_contact_region(&unit_box(), None, None, None),
            Err(SensorError::NoCallbacks)
        ));
        assert!(world.ledger().is_balanced());
    }

    #[test]
    fn enter_and_leave_fire_once_per_transition() {
        let mut world = world_with_player(Vec3::new(0.0, 5.0, 0.0));
        let (entered, on_enter) = counter();
        let (left, on_leave) = counter();
        let sensor = world
            .add_contact_region(&unit_box(), Some(on_enter), Some(on_leave), None)
            .unwrap();
        let mut commands = SceneCommands::new();

        world.update_sensors(&mut commands);
        assert_eq!((entered.get(), left.get()), (0, 0));

        move_player(&mut world, Vec3::new(0.0, 0.5, 0.0));
        world.update_sensors(&mut commands);
        world.update_sensors(&mut commands);
        assert_eq!((entered.get(), left.get()), (1, 0));
        assert_eq!(world.sensors().is_overlapping(sensor), Some(true));

        move_player(&mut world, Vec3::new(0.0, 5.0, 0.0));
        world.update_sensors(&mut commands);
        world.update_sensors(&mut commands);
        assert_eq!((entered.get(), left.get()), (1, 1));
    }

    #[test]
    fn aabb_overlap_alone_does_not_enter() {
        let mut world = world_with_player(Vec3::new(1.2, 0.0, 1.2));
        let (entered, on_enter) = counter();
        let sensor = world
            .add_contact_region(
                &ContactRegion::Sphere {
                    pos: Vec3::zeros(),
                    radius: 1.0,
                },
                Some(on_enter),
                None,
                None,
            )
            .unwrap();
        world.optimize();

        assert_eq!(world.sensor_overlap_count(sensor), 1);
        world.update_sensors(&mut SceneCommands::new());
        assert_eq!(entered.get(), 0);
    }

    #[test]
    fn shallow_contact_below_threshold_does_not_enter() {
        // Capsule side grazes the box by 0.02, under the 0.04 default.
        let mut world = world_with_player(Vec3::new(1.33, 0.0, 0.0));
        let (entered, on_enter) = counter();
        world
            .add_contact_region(&unit_box(), Some(on_enter), None, None)
            .unwrap();
        world.update_sensors(&mut SceneCommands::new());
        assert_eq!(entered.get(), 0);

        move_player(&mut world, Vec3::new(1.25, 0.0, 0.0));
        world.update_sensors(&mut SceneCommands::new());
        assert_eq!(entered.get(), 1);
    }

    #[test]
    fn callback_errors_are_logged_and_state_still_advances() {
        let mut world = world_with_player(Vec3::zeros());
        let failing: SensorCallback = Box::new(|_event| Err("speaker unavailable".into()));
        let sensor = world
            .add_contact_region(&unit_box(), Some(failing), None, None)
            .unwrap();
        world.update_sensors(&mut SceneCommands::new());
        assert_eq!(world.sensors().is_overlapping(sensor), Some(true));
    }

    #[test]
    fn callbacks_defer_commands() {
        let mut world = world_with_player(Vec3::zeros());
        let on_enter: SensorCallback = Box::new(|event| {
            event.defer(SceneCommand::RemoveSensor(event.sensor));
            event.defer(SceneCommand::Reset);
            Ok(())
        });
        let sensor = world
            .add_contact_region(&unit_box(), Some(on_enter), None, None)
            .unwrap();

        let mut commands = SceneCommands::new();
        world.update_sensors(&mut commands);
        assert!(world.sensors().contains(sensor));
        assert_eq!(
            commands.drain(),
            vec![SceneCommand::RemoveSensor(sensor), SceneCommand::Reset]
        );
    }

    #[test]
    fn removal_is_tolerant_and_balanced() {
        let mut world = CollisionWorld::init(-9.81);
        let (_, on_enter) = counter();
        let sensor = world
            .add_contact_region(&unit_box(), Some(on_enter), None, None)
            .unwrap();

        assert!(matches!(
            world.remove_contact_region(sensor, true),
            SensorRemoval::Destroyed
        ));
        assert!(matches!(
            world.remove_contact_region(sensor, true),
            SensorRemoval::Unknown
        ));
        assert!(world.ledger().is_balanced());
    }

    #[test]
    fn detached_ghost_is_handed_back() {
        let mut world = CollisionWorld::init(-9.81);
        let (_, on_leave) = counter();
        let sensor = world
            .add_contact_region(&unit_box(), None, Some(on_leave), None)
            .unwrap();

        match world.remove_contact_region(sensor, false) {
            SensorRemoval::Detached(collider) => assert!(collider.is_sensor()),
            _ => panic!("expected a detached collider"),
        }
        assert!(world.ledger().is_balanced());
        assert!(world.sensors().is_empty());
    }

    #[test]
    fn aabb_region_encloses_rotated_mesh() {
        let mesh = MeshGeometry::new("door", GeometryKind::Generic)
            .with_positions(
                vec![
                    -1.0, 0.0, 0.0, //
                    1.0, 0.0, 0.0, //
                    0.0, 2.0, 0.0,
                ],
                None,
            )
            .at(
                Vec3::new(5.0, 0.0, 0.0),
                Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2),
            );
        let (shape, pose, _) = ContactRegion::Aabb { mesh, scale: None }.build().unwrap();

        match shape {
            ShapeDescriptor::Box { half_extents } => {
                approx::assert_relative_eq!(
                    half_extents,
                    Vec3::new(MIN_AABB_HALF_EXTENT, 1.0, 1.0),
                    epsilon = 1.0e-5
                );
            }
            other => panic!("expected box, got {other:?}"),
        }
        approx::assert_relative_eq!(
            pose.translation.vector,
            Vec3::new(5.0, 1.0, 0.0),
            epsilon = 1.0e-5
        );
    }

    fn cube_mesh(name: &str, half: f32) -> MeshGeometry {
        let positions = [
            [-half, -half, -half],
            [half, -half, -half],
            [half, half, -half],
            [-half, half, -half],
            [-half, -half, half],
            [half, -half, half],
            [half, half, half],
            [-half, half, half],
        ]
        .concat();
        let indices = vec![
            0, 3, 2, 0, 2, 1, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 7, 6, 3, 6, 2, // +y
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
        ];
        MeshGeometry::new(name, GeometryKind::Generic).with_positions(positions, Some(indices))
    }

    #[test]
    fn trimesh_region_enters_when_capsule_crosses_a_face() {
        let mut world = world_with_player(Vec3::new(0.0, 5.0, 0.0));
        let (entered, on_enter) = counter();
        let (left, on_leave) = counter();
        world
            .add_contact_region(
                &ContactRegion::Mesh {
                    mesh: cube_mesh("crate", 1.0),
                    margin: None,
                    scale: None,
                },
                Some(on_enter),
                Some(on_leave),
                None,
            )
            .unwrap();
        let mut commands = SceneCommands::new();
        world.update_sensors(&mut commands);
        assert_eq!(entered.get(), 0);

        move_player(&mut world, Vec3::new(0.0, 1.0, 0.0));
        world.update_sensors(&mut commands);
        assert_eq!((entered.get(), left.get()), (1, 0));

        move_player(&mut world, Vec3::new(0.0, 5.0, 0.0));
        world.update_sensors(&mut commands);
        assert_eq!((entered.get(), left.get()), (1, 1));
    }

    #[test]
    fn hull_region_enters_when_capsule_is_inside() {
        let mut world = world_with_player(Vec3::zeros());
        let (entered, on_enter) = counter();
        let sensor = world
            .add_contact_region(
                &ContactRegion::ConvexHull {
                    mesh: cube_mesh("room", 2.0),
                    scale: None,
                },
                Some(on_enter),
                None,
                None,
            )
            .unwrap();
        world.update_sensors(&mut SceneCommands::new());
        assert_eq!(entered.get(), 1);
        assert_eq!(world.sensors().is_overlapping(sensor), Some(true));
    }

    #[test]
    fn reset_clears_sensors_first() {
        let mut world = world_with_player(Vec3::zeros());
        let (_, on_enter) = counter();
        world
            .add_contact_region(&unit_box(), Some(on_enter), None, None)
            .unwrap();
        world.reset();
        assert!(world.sensors().is_empty());
        assert!(world.ledger().is_balanced());
    }
}
