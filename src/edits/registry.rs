use std::collections::HashMap;

use crate::edits::builtin::{GrayscaleEdit, InvertEdit, ResizeEdit, RotateEdit, StripMetadataEdit, SubtitleEdit};
use crate::edits::ImageEdit;

type EditFactory = Box<dyn Fn() -> Box<dyn ImageEdit> + Send + Sync>;

/// Registry for managing available image edits
///
/// Edits are registered by name and looked up when a pipeline is built.
pub struct EditRegistry {
    edits: HashMap<String, EditFactory>,
}

impl EditRegistry {
    /// Create a new registry with all built-in edits
    pub fn new() -> Self {
        let mut registry = Self {
            edits: HashMap::new(),
        };
        registry.register_builtin_edits();
        registry
    }

    fn register_builtin_edits(&mut self) {
        self.register("rotate", || Box::new(RotateEdit));
        self.register("invert", || Box::new(InvertEdit));
        self.register("strip-metadata", || Box::new(StripMetadataEdit));
        self.register("resize", || Box::new(ResizeEdit));
        self.register("subtitle", || Box::new(SubtitleEdit));
        self.register("grayscale", || Box::new(GrayscaleEdit));
    }

    /// Register a custom edit
    ///
    /// # Arguments
    ///
    /// * `name` - Unique name for the edit
    /// * `factory` - Function that creates new instances of the edit
    pub fn register<N, F>(&mut self, name: N, factory: F)
    where
        N: Into<String>,
        F: Fn() -> Box<dyn ImageEdit> + Send + Sync + 'static,
    {
        self.edits.insert(name.into(), Box::new(factory));
    }

    /// Get an edit by name
    ///
    /// Returns a new instance of the requested edit, or None if the edit
    /// is not registered.
    pub fn get_edit(&self, name: &str) -> Option<Box<dyn ImageEdit>> {
        self.edits.get(name).map(|factory| factory())
    }

    /// Get all available edit names, sorted
    pub fn available_edits(&self) -> Vec<String> {
        let mut names: Vec<String> = self.edits.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if an edit is available
    pub fn has_edit(&self, name: &str) -> bool {
        self.edits.contains_key(name)
    }

    /// Get the number of registered edits
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

impl Default for EditRegistry {
    fn default() -> Self {
        Self::new()
    }
}
