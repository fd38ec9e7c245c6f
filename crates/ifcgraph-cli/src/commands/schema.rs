use std::path::PathBuf;

use anyhow::Result;
use console::style;
use ifcgraph_model::Schema;
use serde::Serialize;

use crate::config::Config;
use crate::ui;

#[derive(Serialize)]
struct TypeRow {
    name: String,
    supertype: Option<String>,
    attributes: usize,
    inverses: usize,
}

pub fn run(schema: Option<PathBuf>, json: bool, config: &Config) -> Result<()> {
    let schema = config.load_schema(schema)?;
    let rows = type_rows(&schema);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    ui::header(&format!("{} ({} types)", schema.name(), rows.len()));
    for row in &rows {
        let parent = row
            .supertype
            .as_deref()
            .map(|s| format!(" : {}", s))
            .unwrap_or_default();
        println!(
            "  {:<40} {}",
            format!("{}{}", row.name, parent),
            style(format!("{} attributes, {} inverses", row.attributes, row.inverses)).dim()
        );
    }
    println!();
    Ok(())
}

/// Attribute and inverse counts include everything inherited.
fn type_rows(schema: &Schema) -> Vec<TypeRow> {
    let mut rows: Vec<TypeRow> = schema
        .types()
        .iter()
        .map(|entity| TypeRow {
            name: entity.name.clone(),
            supertype: entity.supertype.clone(),
            attributes: schema.all_attributes(&entity.name).len(),
            inverses: schema.all_inverses(&entity.name).len(),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_include_inherited_attributes() {
        let schema = Schema::ifc_core().unwrap();
        let rows = type_rows(&schema);

        let wall = rows.iter().find(|r| r.name == "IfcWall").unwrap();
        assert_eq!(wall.supertype.as_deref(), Some("IfcBuildingElement"));
        assert_eq!(wall.attributes, 9);
        assert!(wall.inverses >= 3);

        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
