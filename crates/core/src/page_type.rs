//! Page types and the start-up registry that resolves them.
//!
//! A page type declares an ordered blueprint of attributes. The registry maps
//! identifiers to page types and attribute types; it is assembled once with
//! [`PageTypeRegistryBuilder`] and is read-only afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attribute::{AttributeType, Boolean, Integer, TextArea, TextLine};
use crate::error::{CoreError, FieldErrors};

/// Attribute payload of a page version: identifier → canonical value.
pub type Attributes = Map<String, Value>;

/// One entry in a page type blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub identifier: String,
    /// Human-readable label used in validation messages.
    pub name: String,
    /// Identifier of the [`AttributeType`] holding this attribute's value.
    #[serde(rename = "type")]
    pub type_identifier: String,
    #[serde(default)]
    pub required: bool,
}

impl AttributeSpec {
    pub fn new(identifier: &str, name: &str, type_identifier: &str, required: bool) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            type_identifier: type_identifier.to_string(),
            required,
        }
    }
}

/// Capability interface for a kind of page.
pub trait PageType: Send + Sync {
    fn identifier(&self) -> &str;

    fn name(&self) -> &str;

    /// Ordered attribute declarations.
    fn blueprint(&self) -> &[AttributeSpec];

    /// Attribute whose rendered value names the page and seeds its slug.
    fn name_attribute(&self) -> &str;

    fn allows_sub_pages(&self) -> bool {
        true
    }
}

/// A data-driven page type, loadable from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTypeDefinition {
    pub identifier: String,
    pub name: String,
    pub attributes: Vec<AttributeSpec>,
    /// Defaults to the first attribute in the blueprint.
    #[serde(default)]
    pub name_attribute: Option<String>,
    #[serde(default = "default_allows_sub_pages")]
    pub allows_sub_pages: bool,
}

fn default_allows_sub_pages() -> bool {
    true
}

impl PageTypeDefinition {
    pub fn new(identifier: &str, name: &str, attributes: Vec<AttributeSpec>) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: name.to_string(),
            attributes,
            name_attribute: None,
            allows_sub_pages: true,
        }
    }

    /// Parse a JSON array of definitions.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The generic page type used when nothing else is configured.
    pub fn default_page() -> Self {
        Self::new(
            "page",
            "Page",
            vec![
                AttributeSpec::new("name", "Name", "textline", true),
                AttributeSpec::new("content", "Content", "textarea", false),
            ],
        )
    }
}

impl PageType for PageTypeDefinition {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn blueprint(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    fn name_attribute(&self) -> &str {
        self.name_attribute
            .as_deref()
            .or_else(|| self.attributes.first().map(|a| a.identifier.as_str()))
            .unwrap_or_default()
    }

    fn allows_sub_pages(&self) -> bool {
        self.allows_sub_pages
    }
}

/// Problems found while assembling a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("attribute type '{0}' registered twice")]
    DuplicateAttributeType(String),

    #[error("page type '{0}' registered twice")]
    DuplicatePageType(String),

    #[error("page type '{page_type}' uses unknown attribute type '{attribute_type}'")]
    UnknownAttributeType {
        page_type: String,
        attribute_type: String,
    },

    #[error("page type '{page_type}' declares attribute '{attribute}' twice")]
    DuplicateAttribute { page_type: String, attribute: String },

    #[error("page type '{page_type}' names itself from undeclared attribute '{attribute}'")]
    UnknownNameAttribute { page_type: String, attribute: String },
}

/// Collects attribute and page types before freezing them into a registry.
#[derive(Default)]
pub struct PageTypeRegistryBuilder {
    attribute_types: Vec<Arc<dyn AttributeType>>,
    page_types: Vec<Arc<dyn PageType>>,
}

impl PageTypeRegistryBuilder {
    /// Register the built-in attribute types (`textline`, `textarea`,
    /// `boolean`, `integer`).
    pub fn with_builtin_attribute_types(self) -> Self {
        self.attribute_type(TextLine)
            .attribute_type(TextArea)
            .attribute_type(Boolean)
            .attribute_type(Integer)
    }

    pub fn attribute_type(mut self, attribute_type: impl AttributeType + 'static) -> Self {
        self.attribute_types.push(Arc::new(attribute_type));
        self
    }

    pub fn page_type(mut self, page_type: impl PageType + 'static) -> Self {
        self.page_types.push(Arc::new(page_type));
        self
    }

    pub fn page_types(mut self, definitions: impl IntoIterator<Item = PageTypeDefinition>) -> Self {
        for definition in definitions {
            self.page_types.push(Arc::new(definition));
        }
        self
    }

    /// Check every cross-reference and freeze the registry.
    pub fn build(self) -> Result<PageTypeRegistry, RegistryError> {
        let mut attribute_types = HashMap::new();
        for attribute_type in self.attribute_types {
            let id = attribute_type.identifier().to_string();
            if attribute_types.insert(id.clone(), attribute_type).is_some() {
                return Err(RegistryError::DuplicateAttributeType(id));
            }
        }

        let mut page_types: HashMap<String, Arc<dyn PageType>> = HashMap::new();
        for page_type in self.page_types {
            let type_id = page_type.identifier().to_string();

            let mut seen = HashSet::new();
            for spec in page_type.blueprint() {
                if !attribute_types.contains_key(&spec.type_identifier) {
                    return Err(RegistryError::UnknownAttributeType {
                        page_type: type_id,
                        attribute_type: spec.type_identifier.clone(),
                    });
                }
                if !seen.insert(spec.identifier.as_str()) {
                    return Err(RegistryError::DuplicateAttribute {
                        page_type: type_id,
                        attribute: spec.identifier.clone(),
                    });
                }
            }

            let name_attribute = page_type.name_attribute();
            if !seen.contains(name_attribute) {
                return Err(RegistryError::UnknownNameAttribute {
                    page_type: type_id,
                    attribute: name_attribute.to_string(),
                });
            }

            if page_types.insert(type_id.clone(), page_type).is_some() {
                return Err(RegistryError::DuplicatePageType(type_id));
            }
        }

        Ok(PageTypeRegistry {
            attribute_types,
            page_types,
        })
    }
}

/// Read-only lookup of page types and attribute types.
pub struct PageTypeRegistry {
    attribute_types: HashMap<String, Arc<dyn AttributeType>>,
    page_types: HashMap<String, Arc<dyn PageType>>,
}

impl std::fmt::Debug for PageTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageTypeRegistry")
            .field("attribute_types", &self.attribute_types.keys().collect::<Vec<_>>())
            .field("page_types", &self.page_types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PageTypeRegistry {
    pub fn builder() -> PageTypeRegistryBuilder {
        PageTypeRegistryBuilder::default()
    }

    /// Built-in attribute types plus the generic `page` type.
    pub fn with_defaults() -> Self {
        Self::builder()
            .with_builtin_attribute_types()
            .page_type(PageTypeDefinition::default_page())
            .build()
            .expect("built-in page types are consistent")
    }

    pub fn page_type(&self, identifier: &str) -> Result<&dyn PageType, CoreError> {
        self.page_types
            .get(identifier)
            .map(|t| t.as_ref())
            .ok_or_else(|| CoreError::PageTypeNotFound(identifier.to_string()))
    }

    pub fn attribute_type(&self, identifier: &str) -> Option<&dyn AttributeType> {
        self.attribute_types.get(identifier).map(|t| t.as_ref())
    }

    /// Registered page type identifiers, sorted.
    pub fn page_type_identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.page_types.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Validate a submitted payload against a page type's blueprint.
    ///
    /// Every problem is collected: undeclared identifiers, values their
    /// attribute type rejects, and required attributes left empty. On success
    /// the canonical payload holds exactly the declared attributes.
    pub fn validate_attributes(
        &self,
        page_type: &dyn PageType,
        input: &Attributes,
    ) -> Result<Attributes, CoreError> {
        let blueprint = page_type.blueprint();
        let mut errors = FieldErrors::new();

        for key in input.keys() {
            if !blueprint.iter().any(|spec| &spec.identifier == key) {
                errors.add(key.as_str(), "Unknown attribute");
            }
        }

        let mut canonical = Attributes::new();
        for spec in blueprint {
            let Some(attribute_type) = self.attribute_type(&spec.type_identifier) else {
                return Err(CoreError::Internal(format!(
                    "attribute type '{}' disappeared from the registry",
                    spec.type_identifier
                )));
            };

            let raw = input.get(&spec.identifier).unwrap_or(&Value::Null);
            match attribute_type.validate(raw) {
                Ok(value) => {
                    if spec.required && attribute_type.is_empty(&value) {
                        errors.add(spec.identifier.as_str(), format!("{} is required", spec.name));
                    } else {
                        canonical.insert(spec.identifier.clone(), value);
                    }
                }
                Err(message) => errors.add(spec.identifier.as_str(), message),
            }
        }

        errors.into_result()?;
        Ok(canonical)
    }

    /// Plain-text page name rendered from the page type's name attribute.
    ///
    /// `None` when the attribute is missing or renders to blank text.
    pub fn page_name(&self, page_type: &dyn PageType, attributes: &Attributes) -> Option<String> {
        let name_attribute = page_type.name_attribute();
        let spec = page_type
            .blueprint()
            .iter()
            .find(|spec| spec.identifier == name_attribute)?;
        let attribute_type = self.attribute_type(&spec.type_identifier)?;
        let value = attributes.get(name_attribute)?;
        let rendered = attribute_type.render(value);
        let trimmed = rendered.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
