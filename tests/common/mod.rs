#![allow(dead_code)]

use std::time::Duration;

use ecu_marker::{ChangeSink, Editor, EditorConfig, Mark, MarkId, ModuleLibrary, NormPos, Tool, Viewport};
use egui::{pos2, vec2, Rect};

/// Records every notification the editor sends.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub dirty: usize,
    pub renders: usize,
    pub transforms: Vec<Viewport>,
}

impl ChangeSink for RecordingSink {
    fn mark_dirty(&mut self) {
        self.dirty += 1;
    }

    fn render_marks(&mut self) {
        self.renders += 1;
    }

    fn apply_viewport_transform(&mut self, viewport: &Viewport) {
        self.transforms.push(*viewport);
    }
}

pub const STAGE_W: f32 = 1000.0;
pub const STAGE_H: f32 = 500.0;

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// One module with a photo laid out on a 1000x500 stage at the origin.
pub fn editor() -> Editor<RecordingSink> {
    let mut editor = Editor::new(
        EditorConfig::default(),
        ModuleLibrary::default(),
        RecordingSink::default(),
    );
    editor.create_module();
    editor.set_active_photo("/photos/ecu.jpg");
    editor.set_stage(Some(Rect::from_min_size(pos2(0.0, 0.0), vec2(STAGE_W, STAGE_H))));
    editor
}

pub fn place(editor: &mut Editor<RecordingSink>, x: f32, y: f32, tool: Tool) -> MarkId {
    let id = editor
        .create_mark(NormPos::new(x, y), tool)
        .expect("position is on the photo");
    editor.close_dialog();
    id
}

pub fn marks(editor: &Editor<RecordingSink>) -> Vec<Mark> {
    editor
        .active_module()
        .map(|module| module.marks.iter().cloned().collect())
        .unwrap_or_default()
}

pub fn mark(editor: &Editor<RecordingSink>, id: &MarkId) -> Mark {
    editor
        .active_module()
        .and_then(|module| module.marks.get(id))
        .cloned()
        .expect("mark exists")
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "expected {expected}, got {actual}"
    );
}
