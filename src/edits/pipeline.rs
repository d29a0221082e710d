use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::edits::traits::{ConfigValue, EditConfig, EditContext, ImageEdit};
use crate::edits::EditRegistry;
use crate::error::{EditError, EditorError, Result};
use crate::video::types::Frame;

/// One named edit with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditStep {
    pub name: String,
    #[serde(default)]
    pub config: EditConfig,
}

impl EditStep {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            config: EditConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EditConfig) -> Self {
        self.config = config;
        self
    }
}

/// `name` or `name:key=value,key=value`
impl FromStr for EditStep {
    type Err = EditorError;

    fn from_str(spec: &str) -> Result<Self> {
        let (name, params) = match spec.split_once(':') {
            Some((name, params)) => (name.trim(), params),
            None => (spec.trim(), ""),
        };
        if name.is_empty() {
            return Err(EditError::UnknownEdit { name: spec.to_string() }.into());
        }

        let mut config = EditConfig::default();
        for pair in params.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| EditError::InvalidParameters {
                edit: name.to_string(),
                details: format!("expected key=value, got {:?}", pair),
            })?;
            config = config.set(key.trim(), ConfigValue::parse(value.trim()));
        }

        Ok(Self {
            name: name.to_string(),
            config,
        })
    }
}

/// Ordered edits applied to every image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditPipeline {
    pub steps: Vec<EditStep>,
}

impl EditPipeline {
    pub fn new(steps: Vec<EditStep>) -> Self {
        Self { steps }
    }

    /// Parse `--edit` arguments
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let steps = specs
            .iter()
            .map(|spec| spec.as_ref().parse())
            .collect::<Result<Vec<EditStep>>>()?;
        Ok(Self { steps })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look every step up and validate its parameters
    pub fn resolve(&self, registry: &EditRegistry) -> Result<ResolvedPipeline> {
        let mut edits = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let edit = registry.get_edit(&step.name).ok_or_else(|| EditError::UnknownEdit {
                name: step.name.clone(),
            })?;
            edit.validate_config(&step.config)?;
            edits.push((edit, step.config.clone()));
        }
        Ok(ResolvedPipeline { edits })
    }
}

/// A pipeline whose edits have been looked up and validated
pub struct ResolvedPipeline {
    edits: Vec<(Box<dyn ImageEdit>, EditConfig)>,
}

impl ResolvedPipeline {
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.edits.iter().map(|(edit, _)| edit.name()).collect()
    }

    pub fn apply(&self, frame: &mut Frame, context: &EditContext<'_>) -> Result<()> {
        for (edit, config) in &self.edits {
            edit.apply(frame, context, config).map_err(|e| EditError::Failed {
                edit: edit.name().to_string(),
                path: context.source.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parse_steps() {
        let pipeline = EditPipeline::parse(&["rotate:degrees=180", "invert", "resize:width=64, height=32"]).unwrap();
        assert_eq!(pipeline.steps.len(), 3);
        assert_eq!(pipeline.steps[0].config.get_i32("degrees"), Some(180));
        assert_eq!(pipeline.steps[1].name, "invert");
        assert_eq!(pipeline.steps[2].config.get_i32("height"), Some(32));
    }

    #[test]
    fn test_malformed_parameter() {
        assert!("rotate:degrees".parse::<EditStep>().is_err());
        assert!(":x=1".parse::<EditStep>().is_err());
    }

    #[test]
    fn test_unknown_edit_fails_on_resolve() {
        let pipeline = EditPipeline::parse(&["invert", "sepia"]).unwrap();
        let err = pipeline.resolve(&EditRegistry::new()).err().unwrap();
        assert!(matches!(err, EditorError::Edit(EditError::UnknownEdit { ref name }) if name == "sepia"));
    }

    #[test]
    fn test_apply_in_order() {
        let pipeline = EditPipeline::parse(&["rotate", "invert"]).unwrap();
        let resolved = pipeline.resolve(&EditRegistry::new()).unwrap();
        assert_eq!(resolved.names(), vec!["rotate", "invert"]);

        let mut frame = Frame::new_black(4, 2);
        let context = EditContext {
            source: Path::new("a.png"),
            painter: None,
            subtitle_fraction: 0.1,
        };
        resolved.apply(&mut frame, &context).unwrap();
        assert_eq!(frame.dimensions(), (2, 4));
        assert_eq!(frame.get_pixel(0, 0), [255, 255, 255]);
    }
}
