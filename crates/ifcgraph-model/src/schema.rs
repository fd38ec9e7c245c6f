//! Schema descriptors for typed entity models.
//!
//! A schema lists entity types with their supertype, their ordered explicit
//! attributes and the inverse attributes they expose. It is what turns the
//! positional arguments of a STEP instance into named, classified attributes
//! and what makes inverse back-references computable.
//!
//! Schemas are written in TOML (or JSON):
//!
//! ```toml
//! [[entity]]
//! name = "IfcRelAggregates"
//! supertype = "IfcRelDecomposes"
//! attributes = [
//!     { name = "RelatingObject", kind = "entity" },
//!     { name = "RelatedObjects", kind = "aggregate" },
//! ]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ModelReadError;

const IFC_CORE: &str = include_str!("../schemas/ifc_core.toml");

/// Declared role of an explicit attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeRole {
    Literal,
    Entity,
    Aggregate,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    pub kind: AttributeRole,
}

/// An inverse attribute: the entities of `source_type` whose
/// `source_attribute` points at the declaring entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InverseDecl {
    pub name: String,
    pub source_type: String,
    pub source_attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    #[serde(default)]
    pub supertype: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDecl>,
    #[serde(default)]
    pub inverses: Vec<InverseDecl>,
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "entity")]
    entities: Vec<EntityType>,
}

/// A validated set of entity types. Lookups are case-insensitive because
/// STEP files spell type names in upper case.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    types: Vec<EntityType>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema, checking that supertypes exist and are acyclic.
    pub fn new(name: impl Into<String>, types: Vec<EntityType>) -> Result<Self, ModelReadError> {
        let mut index = HashMap::with_capacity(types.len());
        for (i, ty) in types.iter().enumerate() {
            if index.insert(ty.name.to_ascii_uppercase(), i).is_some() {
                return Err(ModelReadError::Schema(format!("type {} declared twice", ty.name)));
            }
        }

        let schema = Self {
            name: name.into(),
            types,
            index,
        };

        for ty in &schema.types {
            let mut seen = 0;
            let mut current = ty.supertype.as_deref();
            while let Some(parent) = current {
                let parent_ty = schema.entity(parent).ok_or_else(|| {
                    ModelReadError::Schema(format!(
                        "type {} has unknown supertype {}",
                        ty.name, parent
                    ))
                })?;
                seen += 1;
                if seen > schema.types.len() {
                    return Err(ModelReadError::Schema(format!(
                        "supertype cycle through {}",
                        ty.name
                    )));
                }
                current = parent_ty.supertype.as_deref();
            }
        }

        Ok(schema)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ModelReadError> {
        let file: SchemaFile =
            toml::from_str(text).map_err(|e| ModelReadError::Schema(e.to_string()))?;
        Self::new(file.name.unwrap_or_default(), file.entities)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ModelReadError> {
        let file: SchemaFile = serde_json::from_str(text)?;
        Self::new(file.name.unwrap_or_default(), file.entities)
    }

    /// Load a schema file; `.json` files are read as JSON, anything else as TOML.
    pub fn load(path: &Path) -> Result<Self, ModelReadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ModelReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    /// The bundled IFC4 subset.
    pub fn ifc_core() -> Result<Self, ModelReadError> {
        Self::from_toml_str(IFC_CORE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[EntityType] {
        &self.types
    }

    pub fn entity(&self, name: &str) -> Option<&EntityType> {
        self.index
            .get(&name.to_ascii_uppercase())
            .map(|&i| &self.types[i])
    }

    /// Supertypes of `name`, nearest first, excluding `name` itself.
    pub fn ancestors(&self, name: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.entity(name).and_then(|t| t.supertype.as_deref());
        while let Some(parent) = current {
            match self.entity(parent) {
                Some(ty) => {
                    out.push(ty.name.as_str());
                    current = ty.supertype.as_deref();
                }
                None => break,
            }
        }
        out
    }

    /// `name` and its supertypes, root first.
    fn lineage(&self, name: &str) -> Vec<&EntityType> {
        let mut chain: Vec<&EntityType> = self
            .ancestors(name)
            .into_iter()
            .filter_map(|a| self.entity(a))
            .collect();
        chain.reverse();
        if let Some(ty) = self.entity(name) {
            chain.push(ty);
        }
        chain
    }

    /// Explicit attributes in STEP argument order: inherited first.
    pub fn all_attributes(&self, name: &str) -> Vec<&AttributeDecl> {
        self.lineage(name)
            .into_iter()
            .flat_map(|t| t.attributes.iter())
            .collect()
    }

    /// Inverse attributes, inherited first.
    pub fn all_inverses(&self, name: &str) -> Vec<&InverseDecl> {
        self.lineage(name)
            .into_iter()
            .flat_map(|t| t.inverses.iter())
            .collect()
    }

    pub fn is_subtype_of(&self, name: &str, ancestor: &str) -> bool {
        name.eq_ignore_ascii_case(ancestor)
            || self
                .ancestors(name)
                .iter()
                .any(|a| a.eq_ignore_ascii_case(ancestor))
    }

    /// Declared spelling of a type name, if the schema knows it.
    pub fn canonical_name<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.entity(name).map(|t| t.name.as_str())
    }
}
