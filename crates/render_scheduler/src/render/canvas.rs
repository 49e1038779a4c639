//! # World-space UI Canvases
//!
//! A fixed number of indexed canvas slots. Each frame the scene sets up the
//! slots it uses with a world position and settings; at drain time the slots
//! are sorted relative to the camera and drained around the transparent list.

use std::cmp::Ordering;
use std::sync::Arc;

use bitflags::bitflags;

use crate::foundation::math::Vec3;

bitflags! {
    /// Per-canvas drawing options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CanvasSettings: u16 {
        /// Drain this canvas before the transparent list instead of after it
        const RENDER_BEFORE_TRANSPARENT = 1 << 0;
    }
}

/// Per-frame state of one canvas slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiCanvasEntry {
    /// Slot index
    pub index: usize,
    /// World position of the canvas
    pub world_position: Vec3,
    /// Drawing options
    pub settings: CanvasSettings,
}

impl UiCanvasEntry {
    fn empty(index: usize) -> Self {
        Self {
            index,
            world_position: Vec3::zeros(),
            settings: CanvasSettings::empty(),
        }
    }

    /// Whether the canvas is drained before the transparent list
    pub fn renders_before_transparent(&self) -> bool {
        self.settings.contains(CanvasSettings::RENDER_BEFORE_TRANSPARENT)
    }
}

/// Caller-supplied canvas ordering; canvases comparing `Less` are drained first
pub type CanvasSortFn = Arc<dyn Fn(&UiCanvasEntry, &UiCanvasEntry) -> Ordering + Send + Sync>;

/// Every canvas slot
#[derive(Debug, Clone)]
pub struct CanvasEntries {
    entries: Vec<UiCanvasEntry>,
}

impl CanvasEntries {
    /// Create `count` empty slots
    pub fn new(count: usize) -> Self {
        Self {
            entries: (0..count).map(UiCanvasEntry::empty).collect(),
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no slots
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slot state
    pub fn get(&self, index: usize) -> Option<&UiCanvasEntry> {
        self.entries.get(index)
    }

    /// Set up a slot for this frame
    ///
    /// # Panics
    ///
    /// Panics when `index` is not a valid slot.
    pub fn setup(&mut self, index: usize, world_position: Vec3, settings: CanvasSettings) {
        assert!(
            index < self.entries.len(),
            "canvas index {index} out of range ({} slots)",
            self.entries.len()
        );
        self.entries[index] = UiCanvasEntry {
            index,
            world_position,
            settings,
        };
    }

    /// Return every slot to its empty state
    pub fn reset(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            *entry = UiCanvasEntry::empty(index);
        }
    }

    /// Slots in drain order
    ///
    /// Uses `custom` when given, otherwise farthest from the camera first.
    pub fn sorted(&self, camera_position: &Vec3, custom: Option<&CanvasSortFn>) -> Vec<UiCanvasEntry> {
        let mut sorted = self.entries.clone();
        match custom {
            Some(compare) => sorted.sort_by(|a, b| compare(a, b)),
            None => sorted.sort_by(|a, b| {
                let distance_a = (a.world_position - camera_position).norm_squared();
                let distance_b = (b.world_position - camera_position).norm_squared();
                distance_b.total_cmp(&distance_a)
            }),
        }
        sorted
    }
}
