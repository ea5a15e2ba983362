//! GPU-side mirrors of scene geometry and textures
//!
//! Each record remembers the version it last uploaded. A record is
//! re-uploaded when the scene object's version moves and released when the
//! scene disposes the object. After a context loss the records are forgotten
//! without touching the device.

use std::collections::BTreeMap;

use slotmap::SecondaryMap;

use crate::render::device::{BufferHandle, BufferKind, DeviceResult, GraphicsDevice, TextureHandle};
use crate::scene::{AttributeSemantic, Geometry, GeometryId, Texture, TextureId};

#[derive(Debug, Clone, Copy)]
struct GpuBuffer {
    handle: BufferHandle,
    version: u32,
    item_size: usize,
}

#[derive(Debug, Clone, Copy)]
struct DerivedTangents {
    buffer: Option<GpuBuffer>,
    geometry_version: u32,
}

#[derive(Debug, Default)]
struct GpuGeometry {
    attributes: BTreeMap<AttributeSemantic, GpuBuffer>,
    index: Option<GpuBuffer>,
    tangents: Option<DerivedTangents>,
    tangent_failure_warned: bool,
}

impl GpuGeometry {
    fn buffers(&self) -> impl Iterator<Item = BufferHandle> + '_ {
        self.attributes
            .values()
            .chain(self.index.iter())
            .chain(self.tangents.iter().filter_map(|t| t.buffer.as_ref()))
            .map(|buffer| buffer.handle)
    }
}

#[derive(Debug, Clone, Copy)]
struct GpuTexture {
    handle: TextureHandle,
    version: u32,
}

/// Buffers and textures uploaded for the scene
#[derive(Debug, Default)]
pub struct GpuResources {
    geometries: SecondaryMap<GeometryId, GpuGeometry>,
    textures: SecondaryMap<TextureId, GpuTexture>,
}

fn upload<D: GraphicsDevice>(
    device: &mut D,
    existing: Option<GpuBuffer>,
    kind: BufferKind,
    bytes: &[u8],
    version: u32,
    item_size: usize,
) -> DeviceResult<GpuBuffer> {
    match existing {
        Some(buffer) if buffer.version == version => Ok(buffer),
        Some(buffer) => {
            device.update_buffer(buffer.handle, bytes)?;
            Ok(GpuBuffer { version, item_size, ..buffer })
        }
        None => Ok(GpuBuffer {
            handle: device.create_buffer(kind, bytes)?,
            version,
            item_size,
        }),
    }
}

impl GpuResources {
    /// Nothing uploaded yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring a geometry's buffers up to date with its attribute versions
    pub fn update_geometry<D: GraphicsDevice>(&mut self, device: &mut D, id: GeometryId, geometry: &Geometry) -> DeviceResult<()> {
        if !self.geometries.contains_key(id) {
            self.geometries.insert(id, GpuGeometry::default());
        }
        let Some(record) = self.geometries.get_mut(id) else {
            return Ok(());
        };

        let stale: Vec<AttributeSemantic> = record
            .attributes
            .keys()
            .copied()
            .filter(|semantic| !geometry.has_attribute(*semantic))
            .collect();
        for semantic in stale {
            if let Some(buffer) = record.attributes.remove(&semantic) {
                device.destroy_buffer(buffer.handle);
            }
        }

        for (semantic, attribute) in geometry.attributes() {
            let existing = record.attributes.get(&semantic).copied();
            let buffer = upload(
                device,
                existing,
                BufferKind::Vertex,
                bytemuck::cast_slice(&attribute.data),
                attribute.version,
                attribute.item_size,
            )?;
            record.attributes.insert(semantic, buffer);
        }

        match geometry.index() {
            Some(index) => {
                let buffer = upload(
                    device,
                    record.index,
                    BufferKind::Index,
                    bytemuck::cast_slice(&index.data),
                    index.version,
                    1,
                )?;
                record.index = Some(buffer);
            }
            None => {
                if let Some(buffer) = record.index.take() {
                    device.destroy_buffer(buffer.handle);
                }
            }
        }
        Ok(())
    }

    /// Make tangents bindable for a geometry, deriving them when it stores none.
    ///
    /// Returns false when they cannot be derived; the failure is logged once
    /// per geometry.
    pub fn ensure_tangents<D: GraphicsDevice>(&mut self, device: &mut D, id: GeometryId, geometry: &Geometry) -> DeviceResult<bool> {
        if geometry.has_attribute(AttributeSemantic::Tangent) {
            return Ok(true);
        }
        if !self.geometries.contains_key(id) {
            self.geometries.insert(id, GpuGeometry::default());
        }
        let Some(record) = self.geometries.get_mut(id) else {
            return Ok(false);
        };

        let version = geometry.version();
        if let Some(derived) = record.tangents.filter(|derived| derived.geometry_version == version) {
            return Ok(derived.buffer.is_some());
        }

        let previous = record.tangents.take().and_then(|derived| derived.buffer);
        match geometry.compute_tangents() {
            Ok(tangents) => {
                let bytes: &[u8] = bytemuck::cast_slice(&tangents);
                let handle = match previous {
                    Some(buffer) => {
                        device.update_buffer(buffer.handle, bytes)?;
                        buffer.handle
                    }
                    None => device.create_buffer(BufferKind::Vertex, bytes)?,
                };
                record.tangents = Some(DerivedTangents {
                    buffer: Some(GpuBuffer {
                        handle,
                        version,
                        item_size: AttributeSemantic::Tangent.default_item_size(),
                    }),
                    geometry_version: version,
                });
                Ok(true)
            }
            Err(error) => {
                if let Some(buffer) = previous {
                    device.destroy_buffer(buffer.handle);
                }
                if !record.tangent_failure_warned {
                    log::warn!("Cannot derive tangents for geometry '{}': {}", geometry.name, error);
                    record.tangent_failure_warned = true;
                }
                record.tangents = Some(DerivedTangents {
                    buffer: None,
                    geometry_version: version,
                });
                Ok(false)
            }
        }
    }

    /// Bind a geometry's vertex buffers and index buffer.
    ///
    /// Returns whether the draw is indexed, or `None` if the geometry was never uploaded.
    pub fn bind<D: GraphicsDevice>(&self, device: &mut D, id: GeometryId, with_tangents: bool) -> Option<bool> {
        let record = self.geometries.get(id)?;
        for (semantic, buffer) in &record.attributes {
            if *semantic == AttributeSemantic::Tangent && !with_tangents {
                continue;
            }
            device.bind_vertex_buffer(semantic.name(), buffer.handle, buffer.item_size);
        }
        if with_tangents && !record.attributes.contains_key(&AttributeSemantic::Tangent) {
            if let Some(buffer) = record.tangents.and_then(|derived| derived.buffer) {
                device.bind_vertex_buffer(AttributeSemantic::Tangent.name(), buffer.handle, buffer.item_size);
            }
        }
        device.bind_index_buffer(record.index.map(|buffer| buffer.handle));
        Some(record.index.is_some())
    }

    /// Upload a texture if it is new or changed
    pub fn texture<D: GraphicsDevice>(&mut self, device: &mut D, id: TextureId, texture: &Texture) -> DeviceResult<TextureHandle> {
        match self.textures.get(id).copied() {
            Some(gpu) if gpu.version == texture.version() => Ok(gpu.handle),
            Some(gpu) => {
                device.update_texture(gpu.handle, &texture.data)?;
                self.textures.insert(id, GpuTexture { version: texture.version(), ..gpu });
                Ok(gpu.handle)
            }
            None => {
                let handle = device.create_texture(&texture.descriptor(), Some(&texture.data))?;
                self.textures.insert(
                    id,
                    GpuTexture {
                        handle,
                        version: texture.version(),
                    },
                );
                Ok(handle)
            }
        }
    }

    /// Release a geometry's buffers; returns false if nothing was uploaded
    pub fn dispose_geometry<D: GraphicsDevice>(&mut self, device: &mut D, id: GeometryId) -> bool {
        let Some(record) = self.geometries.remove(id) else {
            return false;
        };
        for buffer in record.buffers() {
            device.destroy_buffer(buffer);
        }
        true
    }

    /// Release a texture; returns false if it was never uploaded
    pub fn dispose_texture<D: GraphicsDevice>(&mut self, device: &mut D, id: TextureId) -> bool {
        match self.textures.remove(id) {
            Some(gpu) => {
                device.destroy_texture(gpu.handle);
                true
            }
            None => false,
        }
    }

    /// Drop every record without touching the device
    pub fn forget(&mut self) {
        self.geometries.clear();
        self.textures.clear();
    }

    /// Release everything
    pub fn destroy_all<D: GraphicsDevice>(&mut self, device: &mut D) {
        for (_, record) in self.geometries.drain() {
            for buffer in record.buffers() {
                device.destroy_buffer(buffer);
            }
        }
        for (_, gpu) in self.textures.drain() {
            device.destroy_texture(gpu.handle);
        }
    }

    /// Geometries with uploaded buffers
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Uploaded textures
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::{DeviceCommand, RecordingDevice};
    use crate::scene::Scene;

    fn triangle() -> Geometry {
        Geometry::new(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
            .with_attribute(AttributeSemantic::Normal, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0])
    }

    #[test]
    fn test_upload_once_until_version_changes() {
        let mut device = RecordingDevice::new();
        let mut scene = Scene::new();
        let mut resources = GpuResources::new();
        let id = scene.add_geometry(triangle().with_index(vec![0, 1, 2]));

        let geometry = scene.geometry(id).expect("geometry");
        resources.update_geometry(&mut device, id, geometry).expect("upload");
        resources.update_geometry(&mut device, id, geometry).expect("upload");
        assert_eq!(device.live_buffers(), 3);
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::CreateBuffer(..))), 3);

        scene
            .geometry_mut(id)
            .expect("geometry")
            .set_index(vec![2, 1, 0]);
        device.clear_commands();
        let geometry = scene.geometry(id).expect("geometry");
        resources.update_geometry(&mut device, id, geometry).expect("upload");
        assert_eq!(device.commands().len(), 1);
        assert!(matches!(device.commands()[0], DeviceCommand::UpdateBuffer(..)));
    }

    #[test]
    fn test_bind_reports_indexed_draws() {
        let mut device = RecordingDevice::new();
        let mut scene = Scene::new();
        let mut resources = GpuResources::new();
        let plain = scene.add_geometry(triangle());
        let indexed = scene.add_geometry(triangle().with_index(vec![0, 1, 2]));

        assert_eq!(resources.bind(&mut device, plain, false), None);
        for id in [plain, indexed] {
            let geometry = scene.geometry(id).expect("geometry");
            resources.update_geometry(&mut device, id, geometry).expect("upload");
        }
        assert_eq!(resources.bind(&mut device, plain, false), Some(false));
        assert_eq!(resources.bind(&mut device, indexed, false), Some(true));
    }

    #[test]
    fn test_derived_tangents_and_single_failure_warning() {
        let mut device = RecordingDevice::new();
        let mut scene = Scene::new();
        let mut resources = GpuResources::new();
        let with_uv = scene.add_geometry(Geometry::plane(1.0, 1.0));
        let without_uv = scene.add_geometry(triangle());

        let geometry = scene.geometry(with_uv).expect("geometry");
        assert!(resources.ensure_tangents(&mut device, with_uv, geometry).expect("derive"));
        let created = device.count(|c| matches!(c, DeviceCommand::CreateBuffer(..)));
        assert!(resources.ensure_tangents(&mut device, with_uv, geometry).expect("derive"));
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::CreateBuffer(..))), created);

        let geometry = scene.geometry(without_uv).expect("geometry");
        assert!(!resources.ensure_tangents(&mut device, without_uv, geometry).expect("derive"));
        assert!(!resources.ensure_tangents(&mut device, without_uv, geometry).expect("derive"));
    }

    #[test]
    fn test_dispose_and_forget() {
        let mut device = RecordingDevice::new();
        let mut scene = Scene::new();
        let mut resources = GpuResources::new();
        let geometry_id = scene.add_geometry(triangle());
        let texture_id = scene.add_texture(Texture::rgba8(1, 1, vec![255; 4]));

        let geometry = scene.geometry(geometry_id).expect("geometry");
        resources.update_geometry(&mut device, geometry_id, geometry).expect("upload");
        let texture = scene.texture(texture_id).expect("texture");
        resources.texture(&mut device, texture_id, texture).expect("upload");
        assert_eq!(device.live_textures(), 1);

        assert!(resources.dispose_geometry(&mut device, geometry_id));
        assert!(!resources.dispose_geometry(&mut device, geometry_id));
        assert_eq!(device.live_buffers(), 0);

        resources.forget();
        assert_eq!(resources.texture_count(), 0);
        assert_eq!(device.live_textures(), 1);
    }
}
