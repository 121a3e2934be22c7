//! `vigil check`: analyze a set of files as one project.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result, bail};
use vigil_analyzers::CancellationToken;
use vigil_config::VigilConfig;
use vigil_engine::{
    AnalyzeError, DiagnosticAnalyzerService, DiagnosticsEvent, DiagnosticsMirror,
    ExceptionDiagnosticUpdateSource, InMemoryWorkspace,
};
use vigil_types::{EntityId, LanguageTag};

use crate::CheckArgs;
use crate::report::Report;
use crate::sources::{self, SourceFile};

/// Id of the project entity grouping every checked file.
const PROJECT_ID: &str = "<project>";

pub async fn run(args: &CheckArgs, cancel: &CancellationToken) -> Result<Report> {
    let config = VigilConfig::load(args.config.as_deref()).context("loading configuration")?;
    let references = config
        .build_references()
        .context("building analyzer references")?;
    let settings = config.engine_settings().context("reading engine settings")?;

    let roots = if args.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.paths.clone()
    };
    let files = sources::collect(&roots);
    if files.is_empty() {
        bail!("no readable files found");
    }
    tracing::info!(files = files.len(), "Collected sources");

    let workspace = Arc::new(build_workspace(&config, files)?);
    let faults = Arc::new(ExceptionDiagnosticUpdateSource::new());
    let service = DiagnosticAnalyzerService::new(
        references,
        faults,
        Arc::<InMemoryWorkspace>::clone(&workspace),
        workspace,
        settings,
    );

    let mirror = Arc::new(Mutex::new(DiagnosticsMirror::new()));
    let sink = Arc::clone(&mirror);
    service.subscribe(move |event: &DiagnosticsEvent| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(event);
    });

    let analyzed = service.analyze_all(cancel).await;
    service.shutdown();
    let diagnostics = match analyzed {
        Ok(diagnostics) => diagnostics,
        Err(AnalyzeError::Cancelled) => bail!("analysis interrupted"),
        Err(err) => return Err(err).context("analyzing workspace"),
    };

    let status = mirror
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .status_string();
    Ok(Report {
        diagnostics,
        faults: service.query_faults(),
        status,
    })
}

fn build_workspace(config: &VigilConfig, files: Vec<SourceFile>) -> Result<InMemoryWorkspace> {
    let languages: Vec<LanguageTag> = files
        .iter()
        .map(|file| config.language_for(&file.path))
        .collect();
    let project_language = match languages.split_first() {
        Some((first, rest)) if rest.iter().all(|l| l == first) => first.clone(),
        _ => LanguageTag::Other("mixed".to_string()),
    };

    let workspace = InMemoryWorkspace::new();
    let project = EntityId::new(PROJECT_ID);
    workspace.add_project(project.clone(), project_language)?;
    for (file, language) in files.into_iter().zip(languages) {
        tracing::debug!(path = %file.display, language = language.as_str(), "Opening document");
        workspace.open_document(Some(&project), EntityId::new(&file.display), language, file.text)?;
    }
    Ok(workspace)
}
