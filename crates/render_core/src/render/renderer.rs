//! # Renderer
//!
//! Turns a [`Scene`] seen through a camera node into device commands, once
//! per call to [`Renderer::render`].
//!
//! ## Architecture
//!
//! - **RenderListBuilder / RenderList**: culled, bucketed, sorted draws
//! - **ProgramCache**: shared programs keyed by derived parameters
//! - **PipelineStateCache**: fixed-function state diffing
//! - **GpuResources**: buffers and textures mirrored from the scene
//! - **ShadowMapper**: depth targets and shadow cameras
//! - **LightsState**: per-frame light uniforms
//!
//! ## Frame
//!
//! 1. Apply queued scene disposals, suspend or resume on context changes
//! 2. Update world matrices and snapshot the camera
//! 3. Build the main list, collecting lights and shadow casters
//! 4. Prepare shadow maps and the light snapshot, then run shadow passes
//! 5. Sort, clear, and draw opaque, transmissive and transparent buckets

use std::collections::HashMap;

use crate::config::{RendererConfig, ShadowMapType};
use crate::render::device::{
    ClearFlags, CompileStatus, DeviceError, DrawCall, DrawMode, FenceHandle, GraphicsDevice,
    ProgramHandle, RenderTargetHandle, Viewport, WaitStatus,
};
use crate::render::error::{RenderError, RenderResult};
use crate::render::info::RenderInfo;
use crate::render::lights::{LightCounts, LightsState};
use crate::render::programs::{
    MaterialKey, ParameterInputs, ProgramCache, ProgramId, ProgramParameters, SyncStamp,
};
use crate::render::render_list::{
    painter_sort_stable, reverse_painter_sort_stable, Bucket, BuildMode, RenderItem,
    RenderItemComparator, RenderList, RenderListBuilder,
};
use crate::render::resources::GpuResources;
use crate::render::shadow::ShadowMapper;
use crate::render::state::PipelineStateCache;
use crate::render::uniforms::{
    self, DistanceReference, MaterialContext, SamplerSource, SamplerTable, UniformSet,
};
use crate::scene::{CameraView, Disposal, Material, MaterialKind, NodeId, Primitive, Scene, Side};

/// Nanoseconds a readback waits on its fence per attempt
const READBACK_WAIT_NS: u64 = 1_000_000;

/// Attempts before a readback gives up on its fence
const READBACK_MAX_WAITS: u32 = 100;

/// Whether the renderer can talk to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// Drawing normally
    Active,
    /// Context lost; draws are suppressed until it comes back
    Suspended,
}

/// Notifications for the host, drained with [`Renderer::drain_events`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEvent {
    /// The device context was lost
    ContextLost,
    /// The device context is back; resources are re-created lazily
    ContextRestored,
    /// A program failed to compile or link
    ShaderError {
        /// Program name
        name: String,
        /// Driver info log
        log: String,
    },
}

/// Program currently chosen for one material (and face side)
#[derive(Debug, Default)]
struct MaterialRecord {
    program: Option<ProgramId>,
    parameters: Option<ProgramParameters>,
}

/// Records are per material and rendered side; double-sided transparent
/// surfaces draw with a back-face and a front-face program
type RecordKey = (MaterialKey, Side);

/// One camera's worth of draws
#[derive(Debug, Clone, Copy)]
struct ViewPass {
    view: CameraView,
    counter: u64,
    shadow: bool,
    distance: Option<DistanceReference>,
}

/// Deletes its fence when dropped, whatever path the readback took
struct FenceGuard<'a, D: GraphicsDevice> {
    device: &'a mut D,
    fence: FenceHandle,
}

impl<'a, D: GraphicsDevice> FenceGuard<'a, D> {
    fn insert(device: &'a mut D) -> Self {
        let fence = device.fence_sync();
        Self { device, fence }
    }

    fn wait(&mut self) -> WaitStatus {
        let mut status = WaitStatus::TimeoutExpired;
        for _ in 0..READBACK_MAX_WAITS {
            status = self.device.client_wait_sync(self.fence, READBACK_WAIT_NS);
            if status != WaitStatus::TimeoutExpired {
                break;
            }
        }
        status
    }

    fn device(&mut self) -> &mut D {
        self.device
    }
}

impl<D: GraphicsDevice> Drop for FenceGuard<'_, D> {
    fn drop(&mut self) {
        self.device.delete_sync(self.fence);
    }
}

/// Scene renderer over a [`GraphicsDevice`]
pub struct Renderer<D: GraphicsDevice> {
    device: D,
    config: RendererConfig,
    state: RendererState,
    events: Vec<RendererEvent>,

    size: (u32, u32),
    viewport: Viewport,
    scissor: Viewport,
    scissor_test: bool,
    opaque_sort: RenderItemComparator,
    transparent_sort: RenderItemComparator,

    pipeline: PipelineStateCache,
    programs: ProgramCache,
    records: HashMap<RecordKey, MaterialRecord>,
    resources: GpuResources,
    lights: LightsState,
    shadows: ShadowMapper,

    builder: RenderListBuilder,
    list: RenderList,
    shadow_list: RenderList,
    samplers: SamplerTable,

    info: RenderInfo,
    view_counter: u64,
    bound_camera: Option<(ProgramHandle, u64)>,
}

impl<D: GraphicsDevice> Renderer<D> {
    /// Create a renderer drawing into a `width` x `height` output
    pub fn new(device: D, config: RendererConfig, width: u32, height: u32) -> RenderResult<Self> {
        config.validate()?;
        log::info!(
            "Creating renderer {}x{} (shadows: {}, sorting: {})",
            width,
            height,
            config.shadow_map.enabled,
            config.sort_objects
        );

        let full = Viewport::new(0, 0, width, height);
        Ok(Self {
            device,
            shadows: ShadowMapper::new(config.shadow_map.clone()),
            config,
            state: RendererState::Active,
            events: Vec::new(),
            size: (width, height),
            viewport: full,
            scissor: full,
            scissor_test: false,
            opaque_sort: painter_sort_stable,
            transparent_sort: reverse_painter_sort_stable,
            pipeline: PipelineStateCache::new(),
            programs: ProgramCache::new(),
            records: HashMap::new(),
            resources: GpuResources::new(),
            lights: LightsState::new(),
            builder: RenderListBuilder::new(),
            list: RenderList::new(),
            shadow_list: RenderList::new(),
            samplers: SamplerTable::new(),
            info: RenderInfo::default(),
            view_counter: 0,
            bound_camera: None,
        })
    }

    // === Accessors ===

    /// Settings in use
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Replace the settings
    pub fn set_config(&mut self, config: RendererConfig) -> RenderResult<()> {
        config.validate()?;
        self.shadows.set_config(config.shadow_map.clone());
        self.config = config;
        self.prune_shadow_records();
        Ok(())
    }

    /// Underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Underlying device, mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Statistics of the last frame
    pub fn info(&self) -> &RenderInfo {
        &self.info
    }

    /// Reset the per-frame counters by hand (when `auto_reset_info` is off)
    pub fn reset_info(&mut self) {
        self.info.reset();
    }

    /// Active or suspended
    pub fn state(&self) -> RendererState {
        self.state
    }

    /// Shadow maps, e.g. to request a one-off update
    pub fn shadow_map_mut(&mut self) -> &mut ShadowMapper {
        &mut self.shadows
    }

    /// Shadow maps
    pub fn shadow_map(&self) -> &ShadowMapper {
        &self.shadows
    }

    /// Shared programs
    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    /// Main render list of the last frame
    pub fn render_list(&self) -> &RenderList {
        &self.list
    }

    /// Light snapshot of the last frame
    pub fn lights(&self) -> &LightsState {
        &self.lights
    }

    /// Take queued events
    pub fn drain_events(&mut self) -> Vec<RendererEvent> {
        std::mem::take(&mut self.events)
    }

    // === Output ===

    /// Output size in logical pixels
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Resize the output; viewport and scissor reset to cover it
    pub fn set_size(&mut self, width: u32, height: u32) {
        log::info!("Renderer resized to {width}x{height}");
        self.size = (width, height);
        self.viewport = Viewport::new(0, 0, width, height);
        self.scissor = self.viewport;
    }

    /// Match a camera's aspect ratio to the output size
    pub fn update_camera_aspect(&self, scene: &mut Scene, camera: NodeId) -> RenderResult<()> {
        let (width, height) = self.size;
        let camera_data = scene
            .node_mut(camera)
            .and_then(|node| node.as_camera_mut())
            .ok_or(RenderError::InvalidCamera(camera))?;
        if height > 0 {
            camera_data.set_aspect(width as f32 / height as f32);
        }
        Ok(())
    }

    /// Drawing rectangle in logical pixels
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Scissor rectangle in logical pixels
    pub fn set_scissor(&mut self, scissor: Viewport) {
        self.scissor = scissor;
    }

    /// Enable or disable the scissor test
    pub fn set_scissor_test(&mut self, enabled: bool) {
        self.scissor_test = enabled;
    }

    /// Replace the opaque ordering
    pub fn set_opaque_sort(&mut self, comparator: Option<RenderItemComparator>) {
        self.opaque_sort = comparator.unwrap_or(painter_sort_stable);
    }

    /// Replace the transmissive and transparent ordering
    pub fn set_transparent_sort(&mut self, comparator: Option<RenderItemComparator>) {
        self.transparent_sort = comparator.unwrap_or(reverse_painter_sort_stable);
    }

    // === Context ===

    /// Bring the renderer in line with the device context.
    ///
    /// Returns true if drawing is possible.
    fn sync_context(&mut self) -> bool {
        if self.device.is_context_lost() {
            if self.state == RendererState::Active {
                self.suspend();
            }
            return false;
        }
        if self.state == RendererState::Suspended {
            self.resume();
        }
        true
    }

    fn suspend(&mut self) {
        log::warn!("Graphics context lost; rendering suspended");
        self.state = RendererState::Suspended;
        self.programs.forget_all();
        self.records.clear();
        self.resources.forget();
        self.shadows.forget_targets();
        self.pipeline.reset();
        self.bound_camera = None;
        self.events.push(RendererEvent::ContextLost);
    }

    fn resume(&mut self) {
        log::info!("Graphics context restored; resources will be re-created");
        self.state = RendererState::Active;
        self.pipeline.reset();
        self.bound_camera = None;
        self.events.push(RendererEvent::ContextRestored);
    }

    /// Resume after the host restored the context; returns false while it is still lost
    pub fn restore_context(&mut self) -> bool {
        self.sync_context()
    }

    // === Disposal ===

    fn apply_disposals(&mut self, scene: &mut Scene) {
        for disposal in scene.drain_disposals() {
            if self.state == RendererState::Suspended {
                continue;
            }
            match disposal {
                Disposal::Geometry(id) => {
                    if self.resources.dispose_geometry(&mut self.device, id) {
                        log::debug!("Released buffers of geometry {id:?}");
                    }
                }
                Disposal::Texture(id) => {
                    if self.resources.dispose_texture(&mut self.device, id) {
                        self.pipeline.forget_texture_units();
                        log::debug!("Released texture {id:?}");
                    }
                }
                Disposal::Material(id) => self.release_material(MaterialKey::Scene(id)),
                Disposal::Node(id) => {
                    if self.shadows.release_light(&mut self.device, id) {
                        self.pipeline.forget_texture_units();
                    }
                }
            }
        }
    }

    fn release_material(&mut self, material: MaterialKey) {
        let keys: Vec<RecordKey> = self.records.keys().filter(|(key, _)| *key == material).copied().collect();
        for key in keys {
            self.release_record(key);
        }
    }

    fn release_record(&mut self, key: RecordKey) {
        if let Some(program) = self.records.remove(&key).and_then(|record| record.program) {
            self.release_program(program);
        }
    }

    /// Release the records of sides a material no longer draws
    fn release_unused_sides(&mut self, material: MaterialKey, sides: &[Side]) {
        for side in [Side::Front, Side::Back, Side::Double] {
            if !sides.contains(&side) {
                self.release_record((material, side));
            }
        }
    }

    /// Release the records of depth variants the shadow mapper dropped
    fn prune_shadow_records(&mut self) {
        let shadows = &self.shadows;
        let stale = |key: &RecordKey| matches!(key.0, MaterialKey::Shadow(id) if shadows.variant(id).is_none());
        if !self.records.keys().any(stale) {
            return;
        }
        let keys: Vec<RecordKey> = self.records.keys().copied().filter(stale).collect();
        log::debug!("Releasing {} records of dropped depth variants", keys.len());
        for key in keys {
            self.release_record(key);
        }
    }

    fn release_program(&mut self, program: ProgramId) {
        let handle = self.programs.get(program).map(|p| p.handle());
        if self.programs.release(&mut self.device, program) {
            if let Some(handle) = handle {
                self.pipeline.forget_program(handle);
                if self.bound_camera.is_some_and(|(bound, _)| bound == handle) {
                    self.bound_camera = None;
                }
            }
        }
    }

    /// Release every device resource the renderer owns. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.state == RendererState::Active && !self.device.is_context_lost() {
            self.programs.destroy_all(&mut self.device);
            self.resources.destroy_all(&mut self.device);
            self.shadows.destroy_all(&mut self.device);
        } else {
            self.programs.forget_all();
            self.resources.forget();
            self.shadows.forget_targets();
        }
        self.records.clear();
        self.pipeline.reset();
        self.bound_camera = None;
        log::debug!("Renderer disposed");
    }

    // === Frame ===

    /// Draw `scene` as seen from the `camera` node.
    ///
    /// While the context is lost this returns `Ok` without drawing; the loss is
    /// reported through [`RendererEvent::ContextLost`].
    pub fn render(&mut self, scene: &mut Scene, camera: NodeId) -> RenderResult<()> {
        let usable = self.sync_context();
        self.apply_disposals(scene);
        if !usable {
            return Ok(());
        }
        self.prune_shadow_records();

        let view = self.prepare_camera(scene, camera)?;

        if self.config.auto_reset_info {
            self.info.reset();
        }
        self.info.frame += 1;

        self.builder.build(scene, &view, &mut self.list, BuildMode::Main);

        let due = self
            .shadows
            .prepare(&mut self.device, scene, self.builder.shadow_lights(), view.layers)?;
        self.lights.setup(scene, self.builder.lights(), &self.shadows, &self.config.max_lights);

        let output = self.viewport.scaled(self.config.pixel_ratio);
        let result = if output.is_empty() {
            log::trace!("Empty viewport; frame {} skipped", self.info.frame);
            Ok(())
        } else {
            self.render_frame(scene, view, &due, output)
        };

        self.list.finish();
        self.shadow_list.finish();
        self.info.programs = self.programs.len();
        self.info.geometries = self.resources.geometry_count();
        self.info.textures = self.resources.texture_count();
        result
    }

    fn prepare_camera(&mut self, scene: &mut Scene, camera: NodeId) -> RenderResult<CameraView> {
        let valid = scene
            .node(camera)
            .and_then(|node| node.as_camera())
            .is_some_and(|data| data.projection().is_valid());
        if !valid {
            log::error!("Cannot render through {camera:?}: not a camera with a valid projection");
            return Err(RenderError::InvalidCamera(camera));
        }

        scene.update_matrix_world(scene.root(), false);
        if !scene.is_attached(camera) {
            scene.update_world_matrix(camera, true, false);
        }

        let world = scene.world_matrix(camera);
        let node = scene.node_mut(camera).ok_or(RenderError::InvalidCamera(camera))?;
        let layers = node.layers;
        let data = node.as_camera_mut().ok_or(RenderError::InvalidCamera(camera))?;
        data.update_view(&world);
        Ok(data.snapshot(layers))
    }

    fn render_frame(&mut self, scene: &mut Scene, view: CameraView, due: &[NodeId], output: Viewport) -> RenderResult<()> {
        if !due.is_empty() {
            self.render_shadows(scene, due)?;
        }

        if self.config.sort_objects {
            self.list.sort(self.opaque_sort, self.transparent_sort);
        }

        self.pipeline.bind_render_target(&mut self.device, None);
        self.pipeline.set_viewport(&mut self.device, output);
        self.pipeline.set_scissor_test(&mut self.device, self.scissor_test);
        if self.scissor_test {
            self.pipeline
                .set_scissor(&mut self.device, self.scissor.scaled(self.config.pixel_ratio));
        }
        if self.config.auto_clear {
            self.pipeline.set_clear_color(&mut self.device, self.config.clear_color);
            self.pipeline.set_color_mask(&mut self.device, true);
            self.pipeline.set_depth_mask(&mut self.device, true);
            self.device.clear(ClearFlags::all());
        }

        let pass = ViewPass {
            view,
            counter: self.next_view(),
            shadow: false,
            distance: None,
        };

        for bucket in [Bucket::Opaque, Bucket::Transmissive, Bucket::Transparent] {
            for position in 0..self.list.bucket_len(bucket) {
                let Some(item) = self.list.item(bucket, position) else {
                    continue;
                };
                self.draw_scene_item(scene, &item, &pass, bucket)?;
            }
        }
        Ok(())
    }

    fn next_view(&mut self) -> u64 {
        self.view_counter += 1;
        self.view_counter
    }

    fn draw_scene_item(&mut self, scene: &Scene, item: &RenderItem, pass: &ViewPass, bucket: Bucket) -> RenderResult<()> {
        let material_id = scene.override_material.unwrap_or(item.material);
        let Some(material) = scene.material(material_id) else {
            return Ok(());
        };
        let key = MaterialKey::Scene(material_id);

        let sides = draw_sides(bucket, material);
        self.release_unused_sides(key, sides);
        for &side in sides {
            self.draw_item(scene, item, pass, key, material, side)?;
        }
        Ok(())
    }

    fn render_shadows(&mut self, scene: &mut Scene, due: &[NodeId]) -> RenderResult<()> {
        // Depth variants stay borrowed from the mapper while they draw
        let mut shadows = std::mem::take(&mut self.shadows);
        let result = self.render_shadow_maps(&mut shadows, scene, due);
        self.shadows = shadows;
        result
    }

    fn render_shadow_maps(&mut self, shadows: &mut ShadowMapper, scene: &mut Scene, due: &[NodeId]) -> RenderResult<()> {
        let vsm = shadows.config().shadow_type == ShadowMapType::Vsm;
        let frame = self.info.frame;

        for &light in due {
            let Some(map) = shadows.map(light) else {
                continue;
            };
            let target = map.target();
            let (width, height) = map.target_size();
            let face_count = map.faces().len();
            let distance = map.is_point().then(|| {
                let (near, far) = map.clip_range();
                DistanceReference {
                    position: map.light_position(),
                    near,
                    far,
                }
            });

            self.pipeline.bind_render_target(&mut self.device, Some(target));
            self.pipeline.set_viewport(&mut self.device, Viewport::new(0, 0, width, height));
            self.pipeline.set_scissor_test(&mut self.device, false);
            self.pipeline.set_depth_mask(&mut self.device, true);
            if vsm {
                self.pipeline.set_color_mask(&mut self.device, true);
                self.pipeline.set_clear_color(&mut self.device, [1.0, 1.0, 1.0, 1.0]);
                self.device.clear(ClearFlags::COLOR | ClearFlags::DEPTH);
            } else {
                self.device.clear(ClearFlags::DEPTH);
            }

            for face_index in 0..face_count {
                let Some(face) = shadows.map(light).and_then(|map| map.faces().get(face_index)).copied() else {
                    continue;
                };
                self.pipeline.set_viewport(&mut self.device, face.viewport);
                let pass = ViewPass {
                    view: face.view,
                    counter: self.next_view(),
                    shadow: true,
                    distance,
                };

                self.builder
                    .build(scene, &face.view, &mut self.shadow_list, BuildMode::ShadowCasters);
                if self.config.sort_objects {
                    self.shadow_list.sort(self.opaque_sort, self.transparent_sort);
                }
                for position in 0..self.shadow_list.bucket_len(Bucket::Opaque) {
                    let Some(item) = self.shadow_list.item(Bucket::Opaque, position) else {
                        continue;
                    };
                    let Some(material) = scene.material(item.material) else {
                        continue;
                    };
                    let variant_id = shadows.depth_variant(material, distance.is_some());
                    let Some(variant) = shadows.variant(variant_id) else {
                        continue;
                    };
                    self.draw_item(scene, &item, &pass, MaterialKey::Shadow(variant_id), variant, variant.side)?;
                }
            }

            shadows.mark_rendered(light, frame);
            if let Some(data) = scene.node_mut(light).and_then(|node| node.as_light_mut()) {
                data.shadow.needs_update = false;
            }
            log::trace!("Rendered shadow map of {light:?} ({face_count} faces)");
        }
        shadows.needs_update = false;
        Ok(())
    }

    // === Draw ===

    fn draw_item(
        &mut self,
        scene: &Scene,
        item: &RenderItem,
        pass: &ViewPass,
        key: MaterialKey,
        material: &Material,
        side: Side,
    ) -> RenderResult<()> {
        let Some(node) = scene.node(item.node) else {
            return Ok(());
        };
        let Some(mesh) = node.as_mesh() else {
            return Ok(());
        };
        let Some(geometry) = scene.geometry(item.geometry) else {
            return Ok(());
        };

        self.resources.update_geometry(&mut self.device, item.geometry, geometry)?;
        let depth_only = matches!(material.kind, MaterialKind::Depth | MaterialKind::Distance);
        let tangents_available = material.textures.normal_map.is_some()
            && !depth_only
            && self.resources.ensure_tangents(&mut self.device, item.geometry, geometry)?;

        let parameters = ProgramParameters::derive(&ParameterInputs {
            material,
            side,
            receive_shadow: node.receive_shadow && !pass.shadow,
            tangents_available,
            fog: if pass.shadow { None } else { scene.fog.as_ref() },
            lights: if pass.shadow { LightCounts::default() } else { self.lights.counts() },
            config: &self.config,
        });

        let Some(program_id) = self.resolve_program((key, side), &parameters)? else {
            return Ok(());
        };
        let Some(handle) = self.programs.get(program_id).map(|program| program.handle()) else {
            return Ok(());
        };

        let flip_winding = node.matrix_world().determinant() < 0.0;
        self.pipeline.set_material(&mut self.device, material, side, flip_winding);
        let program_changed = self.pipeline.use_program(&mut self.device, handle);

        let camera_changed = program_changed || self.bound_camera != Some((handle, pass.counter));
        if camera_changed {
            self.upload(handle, uniforms::camera_uniforms(&pass.view));
            self.bound_camera = Some((handle, pass.counter));
        }

        self.samplers.fill(material, self.lights.uniforms(), parameters.receive_shadow);
        bind_textures(
            &mut self.device,
            &mut self.resources,
            &mut self.pipeline,
            scene,
            self.samplers.sources(),
        )?;

        let stamp = SyncStamp {
            material: key,
            version: material.version(),
            lights_version: self.lights.version(),
        };
        let synced = self.programs.get(program_id).and_then(|program| program.synced);
        if synced != Some(stamp) || (camera_changed && pass.distance.is_some()) {
            let context = MaterialContext {
                exposure: self.config.tone_mapping_exposure,
                local_clipping: self.config.local_clipping_enabled,
                distance: pass.distance,
            };
            let mut values = uniforms::material_uniforms(material, &context);
            if parameters.kind.is_lit() {
                values.extend(uniforms::light_uniforms(self.lights.uniforms(), parameters.receive_shadow));
            }
            if let (Some(fog), Some(_)) = (scene.fog.as_ref(), parameters.fog) {
                values.extend(uniforms::fog_uniforms(fog));
            }
            for (name, value) in self.samplers.uniform_values() {
                values.set(name, value);
            }
            self.upload(handle, values);
            if let Some(program) = self.programs.get_mut(program_id) {
                program.synced = Some(stamp);
            }
        }

        for (name, value) in &uniforms::object_uniforms(node.matrix_world(), &pass.view) {
            self.device.set_uniform(handle, name, value);
        }

        let Some(indexed) = self.resources.bind(&mut self.device, item.geometry, parameters.vertex_tangents) else {
            return Ok(());
        };

        let total = u32::try_from(geometry.element_count()).unwrap_or(u32::MAX);
        let range = geometry.draw_range();
        let mut start = range.start.min(total);
        let mut end = range.count.map_or(total, |count| range.start.saturating_add(count)).min(total);
        if let Some(group) = item.group {
            start = start.max(group.start);
            end = end.min(group.start.saturating_add(group.count));
        }
        if end <= start {
            return Ok(());
        }

        let mode = match mesh.primitive {
            Primitive::Triangles => DrawMode::Triangles,
            Primitive::Lines => DrawMode::Lines,
            Primitive::Points => DrawMode::Points,
        };
        let call = DrawCall {
            mode,
            first: start,
            count: end - start,
            indexed,
            instances: 1,
        };
        self.device.draw(&call);
        self.info.record_draw(call.mode, call.count, call.instances);
        log::trace!(
            "Draw {:?} material {} ({} elements from {})",
            item.node,
            material.kind.name(),
            call.count,
            call.first
        );
        Ok(())
    }

    fn upload(&mut self, program: ProgramHandle, values: UniformSet) {
        for (name, value) in values.values() {
            self.device.set_uniform(program, name, value);
        }
    }

    /// Pick the program for a material record, acquiring a new one when the
    /// derived parameters changed.
    ///
    /// Returns `None` when the draw has to be skipped this frame.
    fn resolve_program(&mut self, key: RecordKey, parameters: &ProgramParameters) -> RenderResult<Option<ProgramId>> {
        let current = self.acquire_record(key, parameters)?;

        let block = !self.config.parallel_shader_compile;
        let status = self.programs.poll(&mut self.device, current, block).cloned();
        match status {
            Some(CompileStatus::Ready) => Ok(Some(current)),
            Some(CompileStatus::Pending) => {
                log::trace!("Program for {key:?} still compiling; draw deferred");
                Ok(None)
            }
            Some(CompileStatus::Failed(info_log)) => {
                let name = parameters.kind.name().to_string();
                if let Some(program) = self.programs.get_mut(current) {
                    if !program.error_reported {
                        program.error_reported = true;
                        log::error!("Shader program '{}' failed to compile: {}", name, info_log);
                        self.events.push(RendererEvent::ShaderError {
                            name: name.clone(),
                            log: info_log.clone(),
                        });
                    }
                }
                if self.config.strict_diagnostics {
                    Err(RenderError::ShaderCompilation { name, log: info_log })
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Program held by a record; a new one is acquired, and the old one
    /// released, when the derived parameters changed
    fn acquire_record(&mut self, key: RecordKey, parameters: &ProgramParameters) -> RenderResult<ProgramId> {
        let record = self.records.entry(key).or_default();
        if let Some(program) = record.program.filter(|_| record.parameters.as_ref() == Some(parameters)) {
            return Ok(program);
        }

        let program = self
            .programs
            .acquire(&mut self.device, parameters, parameters.cache_key())?;
        let previous = record.program.replace(program);
        record.parameters = Some(*parameters);
        if let Some(previous) = previous {
            self.release_program(previous);
        }
        Ok(program)
    }

    /// Acquire and submit programs for everything visible from `camera`
    /// without drawing. Returns the number of programs now cached.
    pub fn compile(&mut self, scene: &mut Scene, camera: NodeId) -> RenderResult<usize> {
        if !self.sync_context() {
            return Err(RenderError::ContextLost);
        }
        let view = self.prepare_camera(scene, camera)?;
        self.builder.build(scene, &view, &mut self.list, BuildMode::Main);
        self.lights.setup(scene, self.builder.lights(), &self.shadows, &self.config.max_lights);

        for bucket in [Bucket::Opaque, Bucket::Transmissive, Bucket::Transparent] {
            for position in 0..self.list.bucket_len(bucket) {
                let Some(item) = self.list.item(bucket, position) else {
                    continue;
                };
                let material_id = scene.override_material.unwrap_or(item.material);
                let (Some(node), Some(material)) = (scene.node(item.node), scene.material(material_id)) else {
                    continue;
                };
                let tangents_available = match scene.geometry(item.geometry) {
                    Some(geometry) if material.textures.normal_map.is_some() => {
                        self.resources.ensure_tangents(&mut self.device, item.geometry, geometry)?
                    }
                    _ => false,
                };

                let key = MaterialKey::Scene(material_id);
                let sides = draw_sides(bucket, material);
                self.release_unused_sides(key, sides);
                for &side in sides {
                    let parameters = ProgramParameters::derive(&ParameterInputs {
                        material,
                        side,
                        receive_shadow: node.receive_shadow,
                        tangents_available,
                        fog: scene.fog.as_ref(),
                        lights: self.lights.counts(),
                        config: &self.config,
                    });
                    self.acquire_record((key, side), &parameters)?;
                }
            }
        }
        self.list.finish();
        Ok(self.programs.len())
    }

    // === Readback ===

    /// Read RGBA8 pixels from a render target (`None` for the default framebuffer).
    ///
    /// Waits on a fence so the read sees every submitted draw.
    pub fn read_render_target_pixels(&mut self, target: Option<RenderTargetHandle>, rect: Viewport) -> RenderResult<Vec<u8>> {
        if !self.sync_context() {
            return Err(RenderError::ContextLost);
        }
        if rect.is_empty() {
            return Ok(Vec::new());
        }
        self.pipeline.bind_render_target(&mut self.device, target);

        let mut fence = FenceGuard::insert(&mut self.device);
        match fence.wait() {
            WaitStatus::AlreadySignaled | WaitStatus::ConditionSatisfied => {}
            WaitStatus::TimeoutExpired => {
                return Err(DeviceError::OperationFailed("readback fence timed out".to_string()).into());
            }
            WaitStatus::WaitFailed => return Err(RenderError::ContextLost),
        }
        Ok(fence.device().read_pixels(rect)?)
    }
}

/// Faces drawn for one item; double-sided blended surfaces draw their back
/// faces first, then their front faces
fn draw_sides(bucket: Bucket, material: &Material) -> &'static [Side] {
    if bucket != Bucket::Opaque && material.side == Side::Double && !material.force_single_pass {
        return &[Side::Back, Side::Front];
    }
    match material.side {
        Side::Front => &[Side::Front],
        Side::Back => &[Side::Back],
        Side::Double => &[Side::Double],
    }
}

/// Bind each source to the texture unit matching its position
fn bind_textures<D: GraphicsDevice>(
    device: &mut D,
    resources: &mut GpuResources,
    pipeline: &mut PipelineStateCache,
    scene: &Scene,
    sources: &[SamplerSource],
) -> RenderResult<()> {
    for (unit, source) in (0u32..).zip(sources) {
        let handle = match *source {
            SamplerSource::Texture(id) => match scene.texture(id) {
                Some(texture) => Some(resources.texture(device, id, texture)?),
                None => None,
            },
            SamplerSource::Handle(handle) => handle,
        };
        pipeline.bind_texture(device, unit, handle);
    }
    Ok(())
}
