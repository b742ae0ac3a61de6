use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::MarkStore;

pub const NEW_MODULE_NAME: &str = "New module";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn generate() -> Self {
        Self(format!("mod_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One annotated photo: an ECU board and its marks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
    /// The photo as a `data:image/...;base64,` URL or a file path; empty
    /// when none was attached.
    #[serde(default)]
    pub photo: String,
    #[serde(default)]
    pub marks: MarkStore,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ModuleId::generate(),
            name: name.into(),
            notes: String::new(),
            photo: String::new(),
            marks: MarkStore::new(),
        }
    }

    pub fn has_photo(&self) -> bool {
        !self.photo.trim().is_empty()
    }

    /// Module list search: name or any mark label, case-insensitive.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&query)
            || self
                .marks
                .iter()
                .any(|mark| mark.label.to_lowercase().contains(&query))
    }
}

/// All modules plus which one is being edited.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModuleLibrary {
    modules: Vec<Module>,
    current: Option<ModuleId>,
}

impl ModuleLibrary {
    /// Builds a library, activating `last` when it still exists and the
    /// first module otherwise.
    pub fn from_modules(modules: Vec<Module>, last: Option<ModuleId>) -> Self {
        let current = last
            .filter(|id| modules.iter().any(|module| &module.id == id))
            .or_else(|| modules.first().map(|module| module.id.clone()));
        Self { modules, current }
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn current_id(&self) -> Option<&ModuleId> {
        self.current.as_ref()
    }

    pub fn active_module(&self) -> Option<&Module> {
        let id = self.current.as_ref()?;
        self.modules.iter().find(|module| &module.id == id)
    }

    pub fn active_module_mut(&mut self) -> Option<&mut Module> {
        let id = self.current.as_ref()?;
        self.modules.iter_mut().find(|module| &module.id == id)
    }

    pub fn get(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.iter().find(|module| &module.id == id)
    }

    /// New modules go to the front of the list and become active.
    pub fn create_module(&mut self) -> ModuleId {
        let module = Module::new(NEW_MODULE_NAME);
        let id = module.id.clone();
        self.modules.insert(0, module);
        self.current = Some(id.clone());
        log::info!("event=module_create module=library status=ok id={}", id);
        id
    }

    pub fn select(&mut self, id: &ModuleId) -> bool {
        if self.current.as_ref() == Some(id) || self.get(id).is_none() {
            return false;
        }
        self.current = Some(id.clone());
        true
    }

    /// Removes a module; if it was active, the first remaining one takes over.
    pub fn remove(&mut self, id: &ModuleId) -> bool {
        let Some(index) = self.modules.iter().position(|module| &module.id == id) else {
            return false;
        };
        self.modules.remove(index);
        if self.current.as_ref() == Some(id) {
            self.current = self.modules.first().map(|module| module.id.clone());
        }
        log::info!("event=module_delete module=library status=ok id={}", id);
        true
    }

    /// Replaces every module, as an import does.
    pub fn replace_all(&mut self, modules: Vec<Module>) {
        *self = Self::from_modules(modules, None);
    }

    pub fn filtered<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a Module> + 'a {
        self.modules
            .iter()
            .filter(move |module| module.matches_query(query))
    }
}
