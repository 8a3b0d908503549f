//! # Render Queue
//!
//! Per-frame draw list built from the registry. The queue is the only thing a
//! backend needs besides the registry itself, and it carries no scene-graph
//! knowledge.
//!
//! ## Ordering
//!
//! - **Opaque**: grouped into one batch per material (material id order),
//!   front-to-back inside a batch for early depth rejection
//! - **Transparent**: one flat list, back-to-front for alpha blending
//! - **Lights**: every enabled light that has received a world transform

use super::registry::RenderRegistry;
use super::resources::{LightId, LightKind, MaterialId, MeshId, MeshInstanceId, VertexBufferId};
use crate::foundation::math::{Mat4, Vec3};
use crate::scene::CameraMatrices;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Type of draw for sorting and batching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    /// Opaque objects rendered front-to-back
    Opaque,
    /// Transparent objects rendered back-to-front
    Transparent,
}

/// One resolved mesh instance ready for submission
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    /// Source instance
    pub instance: MeshInstanceId,
    /// Mesh drawn
    pub mesh: MeshId,
    /// Buffer the draw range reads from
    pub vertex_buffer: VertexBufferId,
    /// First vertex
    pub first: u32,
    /// Vertex count
    pub count: u32,
    /// Resolved material (override, mesh material or default)
    pub material: MaterialId,
    /// World transform last pushed by the owning node
    pub world: Mat4,
    /// Distance from the camera to the centre of the world-space bounds
    pub depth: f32,
    /// Opaque or transparent
    pub command_type: CommandType,
}

/// Opaque draws sharing one material
#[derive(Debug, Clone)]
pub struct RenderBatch {
    /// Material bound once for the batch
    pub material: MaterialId,
    /// Draws in front-to-back order
    pub items: Vec<DrawItem>,
}

/// A light resolved to world space
#[derive(Debug, Clone, Copy)]
pub struct LightItem {
    /// Source light
    pub light: LightId,
    /// Kind of light
    pub kind: LightKind,
    /// Linear RGB colour pre-multiplied by intensity
    pub radiance: Vec3,
    /// World position
    pub position: Vec3,
    /// World direction
    pub direction: Vec3,
}

/// Collection of draws organized for submission
#[derive(Debug, Clone, Default)]
pub struct RenderQueue {
    view_projection: Mat4,
    camera_position: Vec3,
    opaque_batches: Vec<RenderBatch>,
    transparent_items: Vec<DrawItem>,
    lights: Vec<LightItem>,
    skipped: usize,
}

impl RenderQueue {
    /// Collect every visible, already-positioned instance and every enabled light
    pub fn build(registry: &RenderRegistry, camera: &CameraMatrices) -> Self {
        let mut queue = Self {
            view_projection: camera.projection * camera.view,
            camera_position: camera.position,
            ..Self::default()
        };

        let mut opaque: BTreeMap<MaterialId, Vec<DrawItem>> = BTreeMap::new();

        for (id, instance) in registry.mesh_instances() {
            if !instance.visible {
                continue;
            }
            // Instances that were never pushed have no meaningful transform yet
            let Some(world) = instance.world else {
                queue.skipped += 1;
                continue;
            };
            let Some(mesh) = registry.get_mesh(instance.mesh) else {
                log::warn!("Instance {:?} refers to missing mesh {:?}", id, instance.mesh);
                queue.skipped += 1;
                continue;
            };

            let material = registry.resolve_material(instance);
            let transparent = registry
                .get_material(material)
                .map_or(false, |m| m.desc.transparent);
            let depth = (mesh.bounds.transformed(&world).center() - camera.position).norm();

            let item = DrawItem {
                instance: id,
                mesh: instance.mesh,
                vertex_buffer: mesh.vertex_buffer,
                first: mesh.first,
                count: mesh.count,
                material,
                world,
                depth,
                command_type: if transparent { CommandType::Transparent } else { CommandType::Opaque },
            };

            if transparent {
                queue.transparent_items.push(item);
            } else {
                opaque.entry(material).or_default().push(item);
            }
        }

        queue.opaque_batches = opaque
            .into_iter()
            .map(|(material, mut items)| {
                items.sort_by(|a, b| a.depth.partial_cmp(&b.depth).unwrap_or(Ordering::Equal));
                RenderBatch { material, items }
            })
            .collect();
        queue
            .transparent_items
            .sort_by(|a, b| b.depth.partial_cmp(&a.depth).unwrap_or(Ordering::Equal));

        queue.lights = registry
            .lights()
            .filter(|(_, light)| light.enabled)
            .filter_map(|(id, light)| {
                Some(LightItem {
                    light: id,
                    kind: light.kind,
                    radiance: light.color * light.intensity,
                    position: light.world_position()?,
                    direction: light.world_direction()?,
                })
            })
            .collect();

        log::trace!(
            "Built render queue: {} opaque batches, {} transparent, {} lights, {} skipped",
            queue.opaque_batches.len(),
            queue.transparent_items.len(),
            queue.lights.len(),
            queue.skipped
        );
        queue
    }

    /// Combined projection * view of the camera the queue was built for
    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    /// World position of the camera
    pub fn camera_position(&self) -> Vec3 {
        self.camera_position
    }

    /// Opaque batches in material order
    pub fn opaque_batches(&self) -> &[RenderBatch] {
        &self.opaque_batches
    }

    /// Transparent draws in back-to-front order
    pub fn transparent_items(&self) -> &[DrawItem] {
        &self.transparent_items
    }

    /// Lights contributing to the frame
    pub fn lights(&self) -> &[LightItem] {
        &self.lights
    }

    /// Visible instances left out because they had no transform yet
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Total number of draws
    pub fn command_count(&self) -> usize {
        self.opaque_batches.iter().map(|batch| batch.items.len()).sum::<usize>()
            + self.transparent_items.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.command_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::AABB;
    use crate::render::resources::{LightDesc, MaterialDesc, MeshDesc};

    fn camera_at_origin() -> CameraMatrices {
        CameraMatrices {
            view: Mat4::identity(),
            projection: Mat4::identity(),
            position: Vec3::zeros(),
        }
    }

    fn setup() -> (RenderRegistry, MeshId) {
        let mut registry = RenderRegistry::default();
        let vertices: [[f32; 3]; 3] = [[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let vertex_buffer = registry.create_vertex_buffer(&vertices).unwrap();
        let mesh = registry
            .create_mesh(MeshDesc { vertex_buffer, first: 0, count: 3, material: None, bounds: AABB::default() })
            .unwrap();
        (registry, mesh)
    }

    fn place(registry: &mut RenderRegistry, mesh: MeshId, material: Option<MaterialId>, z: f32) -> MeshInstanceId {
        let id = registry.create_mesh_instance(mesh, material).unwrap();
        registry
            .set_instance_transform(id, Mat4::new_translation(&Vec3::new(0.0, 0.0, z)))
            .unwrap();
        id
    }

    #[test]
    fn test_unpushed_and_hidden_instances_are_not_drawn() {
        let (mut registry, mesh) = setup();
        registry.create_mesh_instance(mesh, None).unwrap();
        let hidden = place(&mut registry, mesh, None, -1.0);
        registry.set_instance_visible(hidden, false).unwrap();

        let queue = RenderQueue::build(&registry, &camera_at_origin());
        assert!(queue.is_empty());
        assert_eq!(queue.skipped(), 1);
    }

    #[test]
    fn test_opaque_batches_by_material_front_to_back() {
        let (mut registry, mesh) = setup();
        let red = registry.create_material(MaterialDesc::colored("red", [1.0, 0.0, 0.0, 1.0]));
        let far = place(&mut registry, mesh, Some(red), -10.0);
        let near = place(&mut registry, mesh, Some(red), -2.0);
        place(&mut registry, mesh, None, -5.0);

        let queue = RenderQueue::build(&registry, &camera_at_origin());
        assert_eq!(queue.opaque_batches().len(), 2);
        assert_eq!(queue.command_count(), 3);

        let red_batch = queue
            .opaque_batches()
            .iter()
            .find(|batch| batch.material == red)
            .unwrap();
        assert_eq!(red_batch.items[0].instance, near);
        assert_eq!(red_batch.items[1].instance, far);
    }

    #[test]
    fn test_transparent_items_back_to_front() {
        let (mut registry, mesh) = setup();
        let glass = registry.create_material(MaterialDesc::colored("glass", [1.0, 1.0, 1.0, 0.3]));
        let near = place(&mut registry, mesh, Some(glass), -1.0);
        let far = place(&mut registry, mesh, Some(glass), -8.0);

        let queue = RenderQueue::build(&registry, &camera_at_origin());
        let order: Vec<_> = queue.transparent_items().iter().map(|item| item.instance).collect();
        assert_eq!(order, vec![far, near]);
        assert!(queue.opaque_batches().is_empty());
    }

    #[test]
    fn test_depth_measures_to_world_bounds_centre() {
        let (mut registry, mesh) = setup();
        let vertex_buffer = registry.get_mesh(mesh).unwrap().vertex_buffer;
        let offset = registry
            .create_mesh(MeshDesc {
                vertex_buffer,
                first: 0,
                count: 3,
                material: None,
                bounds: AABB::new(Vec3::new(-1.0, -1.0, -12.0), Vec3::new(1.0, 1.0, -8.0)),
            })
            .unwrap();
        place(&mut registry, offset, None, -1.0);

        let queue = RenderQueue::build(&registry, &camera_at_origin());
        let item = queue.opaque_batches()[0].items[0];
        assert!((item.depth - 11.0).abs() < 1e-5);
    }

    #[test]
    fn test_only_enabled_positioned_lights_are_gathered() {
        let (mut registry, _) = setup();
        let lit = registry.create_light(LightDesc::point(Vec3::new(1.0, 0.5, 0.0), 2.0, 5.0)).unwrap();
        registry.set_light_transform(lit, Mat4::new_translation(&Vec3::new(0.0, 3.0, 0.0))).unwrap();
        registry.create_light(LightDesc::directional(Vec3::new(1.0, 1.0, 1.0), 1.0)).unwrap();

        let queue = RenderQueue::build(&registry, &camera_at_origin());
        assert_eq!(queue.lights().len(), 1);
        assert_eq!(queue.lights()[0].radiance, Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(queue.lights()[0].position, Vec3::new(0.0, 3.0, 0.0));
    }
}
