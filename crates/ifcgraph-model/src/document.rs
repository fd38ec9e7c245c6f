//! JSON model documents.
//!
//! A lightweight interchange format for models that were parsed elsewhere:
//!
//! ```json
//! {
//!   "ancestors": { "Wall": ["Element"] },
//!   "entities": [
//!     { "id": 2, "type": "OwnerHistory", "attributes": [] },
//!     { "id": 5, "type": "Wall", "attributes": [
//!         { "name": "Name", "literal": "Wall-1" },
//!         { "name": "OwnerHistory", "ref": 2 },
//!         { "name": "Placement", "ref": { "type": "LocalPlacement", "attributes": [] } },
//!         { "name": "Openings", "refs": [7, 8] },
//!         { "name": "Volume", "derived": true }
//!     ],
//!       "inverses": [ { "name": "UsedIn", "sources": [9] } ] }
//!   ]
//! }
//! ```
//!
//! References to ids that are not in the document load as unresolved.
//! `"derived": false` is an omitted value and loads as a null literal.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ModelReadError;
use crate::memory::MemoryModel;
use crate::model::{Attribute, AttributeKind, EntityHandle};
use crate::value::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDocument {
    #[serde(default)]
    pub ancestors: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub entities: Vec<EntityDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityDoc {
    pub id: u64,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDoc>,
    #[serde(default)]
    pub inverses: Vec<InverseDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributeDoc {
    pub name: String,
    #[serde(flatten)]
    pub value: AttributeValueDoc,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeValueDoc {
    Literal(serde_json::Value),
    Ref(Option<RefDoc>),
    Refs(Vec<Option<RefDoc>>),
    Derived(bool),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RefDoc {
    Key(u64),
    Inline(InlineDoc),
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineDoc {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDoc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InverseDoc {
    pub name: String,
    pub sources: Vec<u64>,
}

impl ModelDocument {
    pub fn from_json_str(text: &str) -> Result<Self, ModelReadError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ModelReadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ModelReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Build the model. All ids are declared first so references may point
    /// forward in the document.
    pub fn into_model(self) -> Result<MemoryModel, ModelReadError> {
        let mut model = MemoryModel::new();

        let mut handles = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            handles.push(model.declare(entity.id, entity.type_name.clone())?);
        }

        for (entity, &handle) in self.entities.iter().zip(&handles) {
            for attribute in &entity.attributes {
                let converted = convert_attribute(&mut model, handle, attribute)?;
                model.push_attribute(handle, converted)?;
            }
        }

        for (entity, &handle) in self.entities.iter().zip(&handles) {
            for inverse in &entity.inverses {
                let sources: Vec<EntityHandle> = inverse
                    .sources
                    .iter()
                    .filter_map(|&id| model.resolve(id))
                    .collect();
                for source in sources {
                    model.add_inverse(handle, inverse.name.clone(), source)?;
                }
            }
        }

        for (type_name, ancestors) in self.ancestors {
            model.set_ancestors(type_name, ancestors);
        }

        Ok(model)
    }
}

fn convert_attribute(
    model: &mut MemoryModel,
    owner: EntityHandle,
    attribute: &AttributeDoc,
) -> Result<Attribute, ModelReadError> {
    let kind = match &attribute.value {
        AttributeValueDoc::Literal(v) => AttributeKind::Literal(Value::from_json(v)),
        AttributeValueDoc::Ref(r) => {
            AttributeKind::EntityRef(convert_ref(model, owner, &attribute.name, 0, r.as_ref())?)
        }
        AttributeValueDoc::Refs(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                elements.push(convert_ref(model, owner, &attribute.name, index, item.as_ref())?);
            }
            AttributeKind::AggregateRef(elements)
        }
        AttributeValueDoc::Derived(true) => AttributeKind::Derived,
        AttributeValueDoc::Derived(false) => AttributeKind::Literal(Value::Null),
    };
    Ok(Attribute {
        name: attribute.name.clone(),
        kind,
    })
}

fn convert_ref(
    model: &mut MemoryModel,
    owner: EntityHandle,
    attribute: &str,
    index: usize,
    reference: Option<&RefDoc>,
) -> Result<Option<EntityHandle>, ModelReadError> {
    match reference {
        None => Ok(None),
        Some(RefDoc::Key(id)) => Ok(model.resolve(*id)),
        Some(RefDoc::Inline(inline)) => {
            let handle =
                model.add_inline(owner, attribute, index, inline.type_name.clone(), Vec::new())?;
            for nested in &inline.attributes {
                let converted = convert_attribute(model, handle, nested)?;
                model.push_attribute(handle, converted)?;
            }
            Ok(Some(handle))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityModel;

    const DOC: &str = r#"{
        "ancestors": { "Wall": ["Element"] },
        "entities": [
            { "id": 5, "type": "Wall", "attributes": [
                { "name": "Name", "literal": "Wall-1" },
                { "name": "OwnerHistory", "ref": 2 },
                { "name": "Placement", "ref": { "type": "LocalPlacement", "attributes": [
                    { "name": "Location", "ref": { "type": "CartesianPoint", "attributes": [
                        { "name": "Coordinates", "literal": [0.0, 1.5, 0.0] }
                    ] } }
                ] } },
                { "name": "Openings", "refs": [7, 99, null] },
                { "name": "Volume", "derived": true }
            ], "inverses": [ { "name": "UsedIn", "sources": [7] } ] },
            { "id": 2, "type": "OwnerHistory" },
            { "id": 7, "type": "Opening" }
        ]
    }"#;

    #[test]
    fn test_load_document() {
        let model = ModelDocument::from_json_str(DOC).unwrap().into_model().unwrap();
        let wall = model.resolve(5).unwrap();
        let history = model.resolve(2).unwrap();
        let opening = model.resolve(7).unwrap();

        assert_eq!(model.top_level_entities(), vec![wall, history, opening]);
        assert_eq!(model.len(), 5);

        let attributes = model.attributes(wall).unwrap();
        assert_eq!(attributes[0].kind, AttributeKind::Literal(Value::from("Wall-1")));
        assert_eq!(attributes[1].kind, AttributeKind::EntityRef(Some(history)));
        assert_eq!(
            attributes[3].kind,
            AttributeKind::AggregateRef(vec![Some(opening), None, None])
        );
        assert_eq!(attributes[4].kind, AttributeKind::Derived);

        let placement = match attributes[2].kind {
            AttributeKind::EntityRef(Some(h)) => h,
            ref other => panic!("unexpected {:?}", other),
        };
        assert_eq!(model.type_name(placement).unwrap(), "LocalPlacement");
        assert_eq!(model.inline_origin(placement).unwrap().unwrap().parent, wall);

        assert_eq!(model.ancestor_types(wall).unwrap(), vec!["Element".to_string()]);
        assert_eq!(
            model.inverse_attributes(wall).unwrap(),
            vec![("UsedIn".to_string(), vec![opening])]
        );
    }

    #[test]
    fn test_derived_flag_is_honoured() {
        let doc = r#"{"entities": [{"id": 1, "type": "Wall", "attributes": [
            { "name": "Volume", "derived": true },
            { "name": "Area", "derived": false }
        ]}]}"#;
        let model = ModelDocument::from_json_str(doc).unwrap().into_model().unwrap();
        let attributes = model.attributes(model.resolve(1).unwrap()).unwrap();
        assert_eq!(attributes[0].kind, AttributeKind::Derived);
        assert_eq!(attributes[1].kind, AttributeKind::Literal(Value::Null));
    }

    #[test]
    fn test_duplicate_id_is_error() {
        let doc = r#"{"entities": [{"id": 1, "type": "A"}, {"id": 1, "type": "B"}]}"#;
        let err = ModelDocument::from_json_str(doc)
            .unwrap()
            .into_model()
            .unwrap_err();
        assert!(matches!(err, ModelReadError::DuplicateKey(1)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, DOC).unwrap();
        let model = ModelDocument::load(&path).unwrap().into_model().unwrap();
        assert_eq!(model.top_level_entities().len(), 3);

        let missing = ModelDocument::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, ModelReadError::Io { .. }));
    }
}
