//! Reference-counted program cache
//!
//! Programs are shared by every material whose [`ProgramParameters`] produce
//! the same [`ProgramCacheKey`]. Each material record holding a program counts
//! as one use; the device program is destroyed when the last use is released.

use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};

use super::parameters::{ProgramCacheKey, ProgramParameters};
use super::shader_lib;
use crate::render::device::{CompileStatus, DeviceResult, GraphicsDevice, ProgramHandle};
use crate::render::shadow::ShadowVariantId;
use crate::scene::MaterialId;

new_key_type! {
    /// Key of a cached program
    pub struct ProgramId;
}

/// Material a program last had its uniforms uploaded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKey {
    /// Scene material
    Scene(MaterialId),
    /// Renderer-owned shadow depth material
    Shadow(ShadowVariantId),
}

/// Upload stamp: uniforms on the program match this material at these versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStamp {
    /// Material uploaded
    pub material: MaterialKey,
    /// Material version at upload
    pub version: u32,
    /// Light state version at upload
    pub lights_version: u32,
}

/// A compiled (or compiling) program
#[derive(Debug)]
pub struct Program {
    key: ProgramCacheKey,
    parameters: ProgramParameters,
    handle: ProgramHandle,
    status: CompileStatus,
    used_times: u32,
    pub(crate) synced: Option<SyncStamp>,
    pub(crate) error_reported: bool,
}

impl Program {
    /// Cache key
    pub fn key(&self) -> &ProgramCacheKey {
        &self.key
    }

    /// Parameters it was generated from
    pub fn parameters(&self) -> &ProgramParameters {
        &self.parameters
    }

    /// Device handle
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Last observed build status
    pub fn status(&self) -> &CompileStatus {
        &self.status
    }

    /// Number of holders
    pub fn used_times(&self) -> u32 {
        self.used_times
    }

    /// Linked and usable
    pub fn is_ready(&self) -> bool {
        self.status == CompileStatus::Ready
    }
}

/// Programs keyed by their cache key
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: SlotMap<ProgramId, Program>,
    by_key: HashMap<ProgramCacheKey, ProgramId>,
}

impl ProgramCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one use of the program for `parameters`, compiling it on first use
    pub fn acquire<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        parameters: &ProgramParameters,
        key: ProgramCacheKey,
    ) -> DeviceResult<ProgramId> {
        if let Some(&id) = self.by_key.get(&key) {
            if let Some(program) = self.programs.get_mut(id) {
                program.used_times += 1;
                return Ok(id);
            }
        }

        let source = shader_lib::generate(parameters);
        let handle = device.compile_program(&source)?;
        log::debug!("Compiling program {} ({})", source.name, key);

        let id = self.programs.insert(Program {
            key: key.clone(),
            parameters: *parameters,
            handle,
            status: CompileStatus::Pending,
            used_times: 1,
            synced: None,
            error_reported: false,
        });
        self.by_key.insert(key, id);
        Ok(id)
    }

    /// Drop one use; the device program is destroyed when none remain.
    /// Returns true if the program was destroyed.
    pub fn release<D: GraphicsDevice>(&mut self, device: &mut D, id: ProgramId) -> bool {
        let Some(program) = self.programs.get_mut(id) else {
            return false;
        };
        program.used_times = program.used_times.saturating_sub(1);
        if program.used_times > 0 {
            return false;
        }

        if let Some(program) = self.programs.remove(id) {
            self.by_key.remove(&program.key);
            device.destroy_program(program.handle);
            log::debug!("Destroyed program {}", program.key);
        }
        true
    }

    /// Refresh the build status, blocking until it completes when `block` is set
    pub fn poll<D: GraphicsDevice>(&mut self, device: &mut D, id: ProgramId, block: bool) -> Option<&CompileStatus> {
        let program = self.programs.get_mut(id)?;
        if program.status == CompileStatus::Pending {
            program.status = if block {
                device.finish_program(program.handle)
            } else {
                device.program_status(program.handle)
            };
        }
        Some(&program.status)
    }

    /// Program by id
    pub fn get(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: ProgramId) -> Option<&mut Program> {
        self.programs.get_mut(id)
    }

    /// Program by key
    pub fn find(&self, key: &ProgramCacheKey) -> Option<ProgramId> {
        self.by_key.get(key).copied()
    }

    /// Live programs
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// True when no programs are cached
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Iterate programs
    pub fn iter(&self) -> impl Iterator<Item = (ProgramId, &Program)> {
        self.programs.iter()
    }

    /// Destroy every program regardless of use counts
    pub fn destroy_all<D: GraphicsDevice>(&mut self, device: &mut D) {
        for (_, program) in self.programs.drain() {
            device.destroy_program(program.handle);
        }
        self.by_key.clear();
    }

    /// Forget every program without touching the device; handles died with the context
    pub fn forget_all(&mut self) {
        self.programs.clear();
        self.by_key.clear();
    }
}
