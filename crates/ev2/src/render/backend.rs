//! Draw-side backend abstraction
//!
//! A backend consumes the registry and a built [`RenderQueue`]. GPU-side
//! state derived from materials is keyed by material id and rebuilt when the
//! material's generation moves.

use super::registry::RenderRegistry;
use super::render_queue::{DrawItem, RenderQueue};
use super::resources::MaterialId;
use std::collections::HashMap;
use thiserror::Error;

/// High-level rendering error types
#[derive(Error, Debug)]
pub enum RenderError {
    /// A draw referenced data the registry no longer holds
    #[error("Invalid draw: {0}")]
    InvalidDraw(String),

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Per-frame counters reported by a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Draw calls issued
    pub draw_calls: usize,
    /// Material binds (one per opaque batch, one per transparent material change)
    pub material_binds: usize,
    /// Triangles submitted
    pub triangles: usize,
    /// Lights uploaded
    pub lights: usize,
    /// Materials whose derived state was rebuilt this frame
    pub material_rebuilds: usize,
}

/// Renderer backend interface
pub trait RenderBackend {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Submit one frame
    fn draw(&mut self, registry: &RenderRegistry, queue: &RenderQueue) -> RenderResult<FrameStats>;
}

/// Backend that validates and counts draws without a GPU
///
/// Used by tests and by the headless demo.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    material_generations: HashMap<MaterialId, u32>,
    frames: u64,
    total_rebuilds: usize,
    last_stats: FrameStats,
}

impl HeadlessBackend {
    /// Create a backend with an empty material cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames submitted so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Material rebuilds over the backend's lifetime
    pub fn total_rebuilds(&self) -> usize {
        self.total_rebuilds
    }

    /// Stats of the most recent frame
    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Number of materials with cached derived state
    pub fn cached_materials(&self) -> usize {
        self.material_generations.len()
    }

    fn bind_material(
        &mut self,
        registry: &RenderRegistry,
        material: MaterialId,
        stats: &mut FrameStats,
    ) -> RenderResult<()> {
        let generation = registry
            .get_material(material)
            .map(|m| m.generation)
            .ok_or_else(|| RenderError::InvalidDraw(format!("material {material:?} is gone")))?;

        if self.material_generations.insert(material, generation) != Some(generation) {
            log::trace!("Rebuilding material {:?} at generation {}", material, generation);
            stats.material_rebuilds += 1;
        }
        stats.material_binds += 1;
        Ok(())
    }

    fn submit(registry: &RenderRegistry, item: &DrawItem, stats: &mut FrameStats) -> RenderResult<()> {
        let buffer = registry.get_vertex_buffer(item.vertex_buffer).ok_or_else(|| {
            RenderError::InvalidDraw(format!("vertex buffer {:?} is gone", item.vertex_buffer))
        })?;
        if item.first + item.count > buffer.vertex_count {
            return Err(RenderError::InvalidDraw(format!(
                "range {}+{} outside buffer of {}",
                item.first, item.count, buffer.vertex_count
            )));
        }
        stats.draw_calls += 1;
        stats.triangles += (item.count / 3) as usize;
        Ok(())
    }
}

impl RenderBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn draw(&mut self, registry: &RenderRegistry, queue: &RenderQueue) -> RenderResult<FrameStats> {
        // Forget derived state of destroyed materials
        self.material_generations
            .retain(|id, _| registry.get_material(*id).is_some());

        let mut stats = FrameStats { lights: queue.lights().len(), ..FrameStats::default() };

        for batch in queue.opaque_batches() {
            self.bind_material(registry, batch.material, &mut stats)?;
            for item in &batch.items {
                Self::submit(registry, item, &mut stats)?;
            }
        }

        let mut bound: Option<MaterialId> = None;
        for item in queue.transparent_items() {
            if bound != Some(item.material) {
                self.bind_material(registry, item.material, &mut stats)?;
                bound = Some(item.material);
            }
            Self::submit(registry, item, &mut stats)?;
        }

        self.frames += 1;
        self.total_rebuilds += stats.material_rebuilds;
        self.last_stats = stats;
        log::trace!("Headless frame {}: {:?}", self.frames, stats);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3, AABB};
    use crate::render::resources::{MaterialDesc, MaterialProperty, MeshDesc};
    use crate::scene::CameraMatrices;

    fn camera() -> CameraMatrices {
        CameraMatrices { view: Mat4::identity(), projection: Mat4::identity(), position: Vec3::zeros() }
    }

    #[test]
    fn test_material_rebuilt_only_when_generation_moves() {
        let mut registry = RenderRegistry::default();
        let vertices = [[0.0_f32; 3]; 6];
        let vertex_buffer = registry.create_vertex_buffer(&vertices).unwrap();
        let mesh = registry
            .create_mesh(MeshDesc { vertex_buffer, first: 0, count: 6, material: None, bounds: AABB::default() })
            .unwrap();
        let material = registry.create_material(MaterialDesc::colored("paint", [0.2, 0.4, 0.6, 1.0]));
        let instance = registry.create_mesh_instance(mesh, Some(material)).unwrap();
        registry.set_instance_transform(instance, Mat4::identity()).unwrap();

        let mut backend = HeadlessBackend::new();
        let first = backend.draw(&registry, &RenderQueue::build(&registry, &camera())).unwrap();
        assert_eq!(first.material_rebuilds, 1);
        assert_eq!(first.draw_calls, 1);
        assert_eq!(first.triangles, 2);

        let second = backend.draw(&registry, &RenderQueue::build(&registry, &camera())).unwrap();
        assert_eq!(second.material_rebuilds, 0);

        registry
            .set_material_property(material, MaterialProperty::BaseColor([1.0, 1.0, 1.0, 1.0]))
            .unwrap();
        let third = backend.draw(&registry, &RenderQueue::build(&registry, &camera())).unwrap();
        assert_eq!(third.material_rebuilds, 1);
        assert_eq!(backend.total_rebuilds(), 2);
        assert_eq!(backend.frames(), 3);
    }
}
