use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use ifcgraph_graph::{
    BuildPhase, BuildSummary, CypherScriptStore, GraphBuilder, GraphStoreAdapter,
    InverseDirection, ProjectionConfig, SqliteGraphStore,
};
use ifcgraph_model::{step, MemoryModel, ModelDocument, Schema};
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::ui;

pub struct LoadArgs {
    pub model: PathBuf,
    pub schema: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub cypher: Option<PathBuf>,
    pub hierarchy: bool,
    pub inverse_direction: Option<InverseDirection>,
    pub keep_existing: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct LoadReport<'a> {
    model: &'a Path,
    target: String,
    entities: usize,
    #[serde(flatten)]
    summary: &'a BuildSummary,
}

pub async fn run(args: LoadArgs, config: &Config) -> Result<()> {
    let schema = config.load_schema(args.schema.clone())?;

    let spinner = if args.json {
        ProgressBar::hidden()
    } else {
        ui::spinner(&format!("Reading {}", args.model.display()))
    };
    let model = read_model(&args.model, &schema)?;
    spinner.finish_and_clear();
    info!("Loaded {} entities from {}", model.len(), args.model.display());

    let projection = projection_config(&config.projection, &args);

    let (summary, target) = match &args.cypher {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let store = CypherScriptStore::new(BufWriter::new(file));
            store.write_preamble().await?;
            if !args.keep_existing {
                store.write_reset().await?;
            }
            let summary = build(&model, &store, projection, args.json).await?;
            store.into_inner()?;
            (summary, path.display().to_string())
        }
        None => {
            let db_path = config.database_path(args.db.clone());
            let store = SqliteGraphStore::open(&db_path)
                .await
                .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
            if !args.keep_existing {
                store.clear().await?;
            }
            let summary = build(&model, &store, projection, args.json).await?;
            (summary, db_path.display().to_string())
        }
    };

    if args.json {
        let report = LoadReport {
            model: &args.model,
            target,
            entities: model.len(),
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    ui::success(&format!(
        "Loaded {} into {}",
        style(args.model.display()).bold(),
        style(&target).bold()
    ));
    ui::info(&format!(
        "{} nodes ({} anonymous), {} relationships",
        summary.nodes, summary.anonymous, summary.relationships
    ));
    ui::info(&format!(
        "{} relationships pruned, took {}ms",
        summary.pruned,
        summary.duration_ms()
    ));
    Ok(())
}

/// `.json` files are model documents; everything else is read as STEP.
fn read_model(path: &Path, schema: &Schema) -> Result<MemoryModel> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let document = ModelDocument::load(path)?;
        return document
            .into_model()
            .with_context(|| format!("Invalid model document: {}", path.display()));
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model: {}", path.display()))?;
    step::load(&text, schema).with_context(|| format!("Failed to load model: {}", path.display()))
}

fn projection_config(base: &ProjectionConfig, args: &LoadArgs) -> ProjectionConfig {
    let mut config = base.clone();
    if args.hierarchy {
        config.include_hierarchy = true;
    }
    if let Some(direction) = args.inverse_direction {
        config.inverse_direction = direction;
    }
    config
}

async fn build<S: GraphStoreAdapter>(
    model: &MemoryModel,
    store: &S,
    config: ProjectionConfig,
    quiet: bool,
) -> Result<BuildSummary> {
    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        ui::progress_bar(0, ui::phase_message(BuildPhase::NodePass))
    };
    let sink = |phase: BuildPhase, index: usize, total: usize| {
        if index == 1 {
            bar.set_message(ui::phase_message(phase));
            bar.set_length(total as u64);
        }
        bar.set_position(index as u64);
    };

    let mut builder = GraphBuilder::new(config);
    let result = builder.build(model, store, &sink).await;
    bar.finish_and_clear();
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(model: &str) -> LoadArgs {
        LoadArgs {
            model: PathBuf::from(model),
            schema: None,
            db: None,
            cypher: None,
            hierarchy: false,
            inverse_direction: None,
            keep_existing: false,
            json: true,
        }
    }

    const STEP: &str = "ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#5=IFCOWNERHISTORY($,$,$,.ADDED.,$,$,$,0);
#10=IFCPROJECT('p',#5,'Demo',$,$,$,$,$,$);
#21=IFCWALL('w',#5,'W1',$,$,$,$,$,$);
ENDSEC;
END-ISO-10303-21;
";

    #[test]
    fn test_flags_override_config() {
        let base = ProjectionConfig::default();
        let mut a = args("m.ifc");
        a.hierarchy = true;
        a.inverse_direction = Some(InverseDirection::Incoming);
        let merged = projection_config(&base, &a);
        assert!(merged.include_hierarchy);
        assert_eq!(merged.inverse_direction, InverseDirection::Incoming);
        assert_eq!(merged.root_type, "IfcProject");
    }

    #[test]
    fn test_read_model_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::ifc_core().unwrap();

        let step_path = dir.path().join("model.ifc");
        std::fs::write(&step_path, STEP).unwrap();
        assert_eq!(read_model(&step_path, &schema).unwrap().len(), 3);

        let json_path = dir.path().join("model.json");
        std::fs::write(&json_path, r#"{"entities": [{"id": 1, "type": "Wall"}]}"#).unwrap();
        assert_eq!(read_model(&json_path, &schema).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_into_database_and_script() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.ifc");
        std::fs::write(&model_path, STEP).unwrap();
        let config = Config::default();

        let mut to_db = args(model_path.to_str().unwrap());
        to_db.db = Some(dir.path().join("graph.db"));
        run(to_db, &config).await.unwrap();

        let store = SqliteGraphStore::open(&dir.path().join("graph.db")).await.unwrap();
        assert_eq!(store.node_count().await.unwrap(), 3);
        assert_eq!(store.relationship_count().await.unwrap(), 1);

        let mut to_script = args(model_path.to_str().unwrap());
        let script_path = dir.path().join("graph.cypher");
        to_script.cypher = Some(script_path.clone());
        run(to_script, &config).await.unwrap();

        let script = std::fs::read_to_string(&script_path).unwrap();
        let lines: Vec<&str> = script.lines().collect();
        assert!(lines[0].starts_with("CREATE INDEX"));
        assert_eq!(lines[1], "MATCH (n:Entity) DETACH DELETE n;");
        assert_eq!(lines.iter().filter(|l| l.starts_with("MERGE")).count(), 3);
        assert_eq!(lines.iter().filter(|l| l.contains(" CREATE (a)-")).count(), 1);
    }

    #[tokio::test]
    async fn test_keep_existing_skips_script_reset() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.ifc");
        std::fs::write(&model_path, STEP).unwrap();

        let mut to_script = args(model_path.to_str().unwrap());
        let script_path = dir.path().join("graph.cypher");
        to_script.cypher = Some(script_path.clone());
        to_script.keep_existing = true;
        run(to_script, &Config::default()).await.unwrap();

        let script = std::fs::read_to_string(&script_path).unwrap();
        assert!(!script.contains("DETACH DELETE"));
        assert_eq!(script.lines().filter(|l| l.starts_with("MERGE")).count(), 3);
    }
}
