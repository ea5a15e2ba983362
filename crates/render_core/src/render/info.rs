//! Frame statistics

use crate::render::device::DrawMode;

/// Counters for the last frame plus live resource totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Frames rendered since creation
    pub frame: u64,
    /// Draw calls
    pub calls: u32,
    /// Triangles submitted
    pub triangles: u32,
    /// Points submitted
    pub points: u32,
    /// Line segments submitted
    pub lines: u32,
    /// Live programs
    pub programs: usize,
    /// Geometries with device buffers
    pub geometries: usize,
    /// Uploaded textures
    pub textures: usize,
}

impl RenderInfo {
    /// Zero the per-frame counters
    pub fn reset(&mut self) {
        self.calls = 0;
        self.triangles = 0;
        self.points = 0;
        self.lines = 0;
    }

    /// Account for one draw of `count` elements
    pub fn record_draw(&mut self, mode: DrawMode, count: u32, instances: u32) {
        self.calls += 1;
        let total = count.saturating_mul(instances.max(1));
        match mode {
            DrawMode::Triangles => self.triangles += total / 3,
            DrawMode::Lines => self.lines += total / 2,
            DrawMode::Points => self.points += total,
        }
    }
}
