use anyhow::Context;
use clap::Parser;
use formloom::adapters::{render_form, OutlineRenderer};
use formloom::cli::{Cli, Command, DocsCommand};
use formloom::config::{Settings, StorageBackend};
use formloom::domain::FormTree;
use formloom::engine::{FormStore, FormSubmit, SubmitOutcome};
use formloom::persistence::{self, DocumentStore, FormDocument};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::new_with_cli(&cli)?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(settings.log_level())
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Check { pattern } => check(pattern),
        Command::Inspect { schema, values } => inspect(&settings, schema, values.as_deref()).await,
        Command::Validate { schema, values } => validate(&settings, schema, values).await,
        Command::Docs { action } => docs(&settings, action).await,
    }
}

/// Read a JSON or YAML file by extension
fn load_value(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    Ok(value)
}

fn load_tree(path: &Path) -> anyhow::Result<FormTree> {
    let value = load_value(path)?;
    FormTree::from_value(value).with_context(|| format!("Invalid form definition {}", path.display()))
}

fn build_store(settings: &Settings, tree: impl Into<Arc<FormTree>>, values: Option<Value>) -> FormStore {
    let mut builder = FormStore::builder(tree)
        .mode(settings.form.mode)
        .revalidate_mode(settings.form.revalidate_mode);
    if let Some(values) = values {
        builder = builder.default_values(values);
    }
    builder.build()
}

fn check(pattern: &str) -> anyhow::Result<()> {
    let mut checked = 0;
    let mut failed = 0;

    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) => {
                let ext = path.extension().and_then(|e| e.to_str());
                if !matches!(ext, Some("json" | "yaml" | "yml")) {
                    continue;
                }
                checked += 1;
                match load_tree(&path) {
                    Ok(tree) => println!("ok     {} ({} fields)", path.display(), tree.template_paths().len()),
                    Err(e) => {
                        failed += 1;
                        println!("error  {}: {:#}", path.display(), e);
                    }
                }
            }
            Err(e) => warn!("Failed to read glob entry: {}", e),
        }
    }

    if checked == 0 {
        warn!("No definition files matched '{}'", pattern);
    }
    if failed > 0 {
        anyhow::bail!("{} of {} definition files are invalid", failed, checked);
    }
    Ok(())
}

async fn inspect(settings: &Settings, schema: &Path, values: Option<&Path>) -> anyhow::Result<()> {
    let tree = Arc::new(load_tree(schema)?);
    let values = values.map(load_value).transpose()?;
    let store = build_store(settings, Arc::clone(&tree), values);
    store.settle().await;

    let mut outline = OutlineRenderer::new();
    render_form(&tree, &store, &mut outline);
    print!("{}", outline.finish());
    Ok(())
}

async fn validate(settings: &Settings, schema: &Path, values: &Path) -> anyhow::Result<()> {
    let tree = load_tree(schema)?;
    let values = load_value(values)?;
    let store = build_store(settings, tree, Some(values));

    match store.handle_submit(&mut FormSubmit::default()).await? {
        SubmitOutcome::Invalid(errors) => {
            for (path, path_errors) in errors.iter() {
                for error in path_errors {
                    println!("{}: {}", path, error.message);
                }
            }
            anyhow::bail!("{} fields are invalid", errors.len());
        }
        _ => {
            println!("valid");
            Ok(())
        }
    }
}

async fn docs(settings: &Settings, action: &DocsCommand) -> anyhow::Result<()> {
    if settings.storage.backend == StorageBackend::Memory {
        warn!("Memory storage backend does not persist between runs");
    }
    let store = persistence::create_store(&settings.storage)?;

    match action {
        DocsCommand::List => {
            for summary in store.list().await? {
                println!("{}  {}  {}", summary.form_id, summary.updated_at.to_rfc3339(), summary.form_name);
            }
        }
        DocsCommand::Save { schema, name, id } => {
            let fields = load_value(schema)?;
            FormTree::from_value(fields.clone())
                .with_context(|| format!("Invalid form definition {}", schema.display()))?;

            let name = name.clone().unwrap_or_else(|| {
                schema
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "Untitled form".to_string())
            });
            let document = match id {
                Some(id) => match store.load(id).await? {
                    Some(mut document) => {
                        document.form_name = name;
                        document.fields = fields;
                        document.touch();
                        document
                    }
                    None => FormDocument {
                        form_id: id.clone(),
                        ..FormDocument::new(name, fields)
                    },
                },
                None => FormDocument::new(name, fields),
            };
            store.save(&document).await?;
            info!("Saved form document {}", document.form_id);
            println!("{}", document.form_id);
        }
        DocsCommand::Show { id } => match store.load(id).await? {
            Some(document) => println!("{}", serde_json::to_string_pretty(&document)?),
            None => anyhow::bail!("Form document '{}' not found", id),
        },
        DocsCommand::Remove { id } => {
            if !store.remove(id).await? {
                anyhow::bail!("Form document '{}' not found", id);
            }
            println!("removed {}", id);
        }
    }
    Ok(())
}
