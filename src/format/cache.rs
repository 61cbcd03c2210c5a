//! Parsed-template cache keyed by template text

use super::template::FormatTemplate;
use super::FormatError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_TEMPLATE_CACHE_CAPACITY: usize = 1024;

/// Shared cache of parsed templates.
///
/// Call sites usually pass the same literal on every invocation, so after the
/// first call a lookup is a read-locked hash probe. Once `capacity` distinct
/// templates are stored, new ones are parsed on every use but not retained.
#[derive(Debug)]
pub struct TemplateCache {
    templates: RwLock<HashMap<String, Arc<FormatTemplate>>>,
    capacity: usize,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TEMPLATE_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Return the parsed form of `template`, parsing it on first use.
    /// Malformed templates are reported every time and never stored.
    pub fn get_or_parse(&self, template: &str) -> Result<Arc<FormatTemplate>, FormatError> {
        if let Some(parsed) = self.templates.read().get(template) {
            return Ok(Arc::clone(parsed));
        }

        let parsed = Arc::new(FormatTemplate::parse(template)?);

        let mut templates = self.templates.write();
        if let Some(existing) = templates.get(template) {
            return Ok(Arc::clone(existing));
        }
        if templates.len() < self.capacity {
            templates.insert(template.to_string(), Arc::clone(&parsed));
        }
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    pub fn clear(&self) {
        self.templates.write().clear();
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}
