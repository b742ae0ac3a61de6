use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mark::DEFAULT_MIN_TEXT_EXTENT;
use crate::module::{Module, ModuleId, ModuleLibrary};

const MODULES_FILE: &str = "modules.json";
const LAST_MODULE_FILE: &str = "last_module";

#[derive(Serialize)]
struct PayloadRef<'a> {
    modules: &'a [Module],
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    modules: Vec<Module>,
}

/// Older files may carry marks off the photo or without text extents.
fn clamp_modules(mut modules: Vec<Module>) -> Vec<Module> {
    for module in &mut modules {
        let adjusted = module.marks.clamp_to_photo(DEFAULT_MIN_TEXT_EXTENT);
        if adjusted > 0 {
            log::warn!(
                "event=marks_clamped module=storage status=ok module_id={} marks={}",
                module.id,
                adjusted
            );
        }
    }
    modules
}

/// Platform directories for data (`modules.json`) and `config.json`.
pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "ecumarker", "ecu-marker")
}

/// Local, on-disk copy of every module. This is the source of truth; any
/// remote sync happens on top of it.
#[derive(Clone, Debug)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Result<Self> {
        let dirs = project_dirs().context("cannot resolve data directory")?;
        Ok(Self::new(dirs.data_dir()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn modules_path(&self) -> PathBuf {
        self.dir.join(MODULES_FILE)
    }

    fn last_module_path(&self) -> PathBuf {
        self.dir.join(LAST_MODULE_FILE)
    }

    /// Reads the saved library; a store that was never written is empty.
    pub fn load(&self) -> Result<ModuleLibrary> {
        let path = self.modules_path();
        if !path.exists() {
            return Ok(ModuleLibrary::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read `{}`", path.display()))?;
        let payload: Payload = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt module file `{}`", path.display()))?;

        let last = std::fs::read_to_string(self.last_module_path())
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(|raw| ModuleId::from(raw.as_str()));

        log::info!(
            "event=storage_load module=storage status=ok modules={}",
            payload.modules.len()
        );
        Ok(ModuleLibrary::from_modules(clamp_modules(payload.modules), last))
    }

    pub fn save(&self, library: &ModuleLibrary) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create `{}`", self.dir.display()))?;
        let json = serde_json::to_string_pretty(&PayloadRef {
            modules: library.modules(),
        })?;
        let path = self.modules_path();
        std::fs::write(&path, json).with_context(|| format!("cannot write `{}`", path.display()))?;
        if let Some(id) = library.current_id() {
            std::fs::write(self.last_module_path(), id.as_str())
                .context("cannot record last module")?;
        }
        log::info!(
            "event=storage_save module=storage status=ok modules={}",
            library.modules().len()
        );
        Ok(())
    }
}

/// Serializes modules in the exchange format `{ "modules": [...] }`.
pub fn export_json(modules: &[Module]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&PayloadRef { modules })?)
}

/// Parses an exchange file; `modules` must be present and an array.
pub fn import_json(text: &str) -> Result<Vec<Module>> {
    let value: Value = serde_json::from_str(text).context("import is not valid JSON")?;
    let Some(modules) = value.get("modules") else {
        bail!("invalid format: missing `modules`");
    };
    if !modules.is_array() {
        bail!("invalid format: `modules` must be an array");
    }
    let payload: Payload = serde_json::from_value(value).context("invalid module data")?;
    Ok(clamp_modules(payload.modules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NormPos;
    use crate::mark::{
        MarkShape, ResizeHandle, Tool, DEFAULT_TEXT_HEIGHT, DEFAULT_TEXT_WIDTH, MAX_POINT_SIZE,
    };
    use egui::vec2;

    fn sample_library() -> ModuleLibrary {
        let mut library = ModuleLibrary::default();
        library.create_module();
        let module = library.active_module_mut().expect("active module");
        module.name = "Delphi MT05".into();
        module.notes = "bench pinout".into();
        module.photo = "/photos/mt05.jpg".into();
        let point = module
            .marks
            .create_mark(NormPos::new(0.123_457, 0.654_321), Tool::Point)
            .expect("inside");
        module.marks.set_label(&point, "K-line");
        module.marks.resize_point_scale(&point, 0.7);
        let text = module
            .marks
            .create_mark(NormPos::new(0.3, 0.4), Tool::Text)
            .expect("inside");
        module
            .marks
            .resize_mark(&text, ResizeHandle::Nw, vec2(-0.033_333, 0.017), 0.05);
        library
    }

    #[test]
    fn save_then_load_restores_library() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = LocalStore::new(dir.path().join("nested"));
        let library = sample_library();

        store.save(&library).expect("save succeeds");
        let loaded = store.load().expect("load succeeds");
        assert_eq!(loaded, library);
    }

    #[test]
    fn missing_store_loads_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let loaded = LocalStore::new(dir.path()).load().expect("empty load");
        assert!(loaded.modules().is_empty());
        assert!(loaded.current_id().is_none());
    }

    #[test]
    fn export_import_round_trip_is_exact() {
        let library = sample_library();
        let json = export_json(library.modules()).expect("export");
        let imported = import_json(&json).expect("import");
        assert_eq!(imported, library.modules());

        let value: Value = serde_json::from_str(&json).expect("valid json");
        let marks = &value["modules"][0]["marks"];
        assert_eq!(marks[0]["type"], "point");
        assert_eq!(marks[1]["type"], "text");
        assert!(marks[1].get("size").is_none());
    }

    #[test]
    fn import_accepts_legacy_text_marks_and_clamps_positions() {
        let json = r#"{
            "modules": [{
                "id": "mod_legacy",
                "name": "Siemens SIM2K",
                "photo": "",
                "marks": [
                    { "id": "mk_t", "type": "text", "x": 0.25, "y": 0.25, "label": "TEXT", "size": 1 },
                    { "id": "mk_p", "type": "point", "x": 1.5, "y": -0.2, "label": "B+", "size": 12 },
                    { "id": "mk_e", "type": "text", "x": 0.95, "y": 0.1, "width": 0.2, "height": 0.1 }
                ]
            }]
        }"#;
        let modules = import_json(json).expect("legacy export imports");
        let marks: Vec<_> = modules[0].marks.iter().collect();

        assert_eq!(
            marks[0].shape,
            MarkShape::Text {
                width: DEFAULT_TEXT_WIDTH,
                height: DEFAULT_TEXT_HEIGHT
            }
        );
        assert_eq!(marks[0].label, "TEXT");
        assert_eq!((marks[1].x, marks[1].y), (1.0, 0.0));
        assert_eq!(marks[1].shape, MarkShape::Point { size: MAX_POINT_SIZE });
        let edge = marks[2].text_box().expect("text mark");
        assert!(edge.x + edge.width <= 1.0 + 1e-6);
        assert!(edge.width >= DEFAULT_MIN_TEXT_EXTENT - 1e-6);
    }

    #[test]
    fn load_clamps_marks_written_off_the_photo() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join(MODULES_FILE),
            r#"{ "modules": [{ "id": "mod_a", "marks": [
                { "id": "mk_a", "type": "point", "x": 2.0, "y": 0.5 }
            ] }] }"#,
        )
        .expect("write modules");
        let library = LocalStore::new(dir.path()).load().expect("load");
        let module = library.active_module().expect("first module active");
        let mark = module.marks.iter().next().expect("mark kept");
        assert_eq!(mark.x, 1.0);
        assert_eq!(mark.shape, MarkShape::Point { size: 1.0 });
    }

    #[test]
    fn import_rejects_non_array_modules() {
        assert!(import_json(r#"{ "modules": {} }"#).is_err());
        assert!(import_json(r#"{ "projects": [] }"#).is_err());
        assert!(import_json("[1, 2").is_err());
        assert!(import_json(r#"{ "modules": [] }"#)
            .expect("empty list is valid")
            .is_empty());
    }
}
