//! CLI definition and command dispatch for Normativa.
//!
//! This module defines the command-line interface using `clap` and provides
//! the `run()` function that dispatches commands to the engine.
//!
//! ## Configuration Precedence
//!
//! Configuration is resolved with the following precedence (highest to lowest):
//! 1. CLI flags (e.g., `--config`, `--corpus`, `--verbose`)
//! 2. Environment variables (`NORMATIVA_CONFIG`, `NORMATIVA_CORPUS`, ...)
//! 3. Config file (`~/.normativa/config.yaml` or path from `--config`)
//! 4. Built-in defaults

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::ui::{format, table, ColorMode, MessageType, Style};

use normativa_core::{
    AnswerResult, AskRequest, ConfidenceValidator, Evidence, GovernanceCriteria, NormativaConfig,
    NormativaEngine, NormativaError, RetrievalRequest, RetrievalResult, RetrievalStrategy,
};

// ============================================================================
// CLI Definition
// ============================================================================

/// Hybrid retrieval and confidence-graded answers over regulatory documents
#[derive(Parser, Debug)]
#[command(name = "normativa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, env = "NORMATIVA_VERBOSE")]
    pub verbose: bool,

    /// Suppress informational messages and warnings
    #[arg(short, long, global = true, env = "NORMATIVA_QUIET")]
    pub quiet: bool,

    /// Path to configuration file (default: ~/.normativa/config.yaml)
    #[arg(long, global = true, env = "NORMATIVA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Corpus snapshot (JSONL), overriding the configured one
    #[arg(long, global = true, env = "NORMATIVA_CORPUS")]
    pub corpus: Option<PathBuf>,

    /// Color output mode: always, never, or auto (default: auto)
    #[arg(long, global = true, env = "NORMATIVA_COLOR", default_value = "auto")]
    pub color: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Governance filters shared by `retrieve` and `ask`.
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Required document status (default: retrieval.statusFilterDefault)
    #[arg(long)]
    pub status: Option<String>,

    /// Maximum precedence to keep (lower is more authoritative)
    #[arg(long)]
    pub max_precedence: Option<u32>,

    /// Keep documents valid from this date on (YYYY-MM-DD)
    #[arg(long)]
    pub valid_from: Option<String>,

    /// Keep documents whose validity ends by this date (YYYY-MM-DD)
    #[arg(long)]
    pub valid_until: Option<String>,

    /// Allowed document types (repeatable)
    #[arg(long = "type", value_name = "TYPE")]
    pub types: Vec<String>,
}

impl FilterArgs {
    /// Governance criteria for the request.
    ///
    /// Criteria are always sent, so the default status filter applies even
    /// when no flag is given.
    pub fn criteria(&self) -> GovernanceCriteria {
        let mut criteria = GovernanceCriteria::new()
            .with_validity(self.valid_from.as_deref(), self.valid_until.as_deref())
            .with_document_types(self.types.clone());
        if let Some(status) = &self.status {
            criteria = criteria.with_status(status.clone());
        }
        if let Some(max) = self.max_precedence {
            criteria = criteria.with_max_precedence(max);
        }
        criteria
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show retriever readiness (indexes, reranker, weights)
    #[command(after_help = r#"EXAMPLES:
    normativa diagnostics
    normativa diagnostics --json
"#)]
    Diagnostics {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Retrieve ranked passages for a query
    #[command(after_help = r#"EXAMPLES:
    # Hybrid retrieval with reranking (default)
    normativa retrieve "prazo do relatório mensal"

    # Lexical only, top 3
    normativa retrieve "dia 10" --strategy bm25_only -k 3

    # Only resolutions with precedence up to 2
    normativa retrieve "acreditação" --type Resolução --max-precedence 2
"#)]
    Retrieve {
        /// The query text
        query: String,

        /// Number of results (default: retrieval.defaultK)
        #[arg(short)]
        k: Option<usize>,

        /// Strategy: vector_only, bm25_only, hybrid, hybrid_rerank
        #[arg(long, default_value = "hybrid_rerank")]
        strategy: String,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Answer a question with cited evidence and a confidence level
    #[command(after_help = r#"EXAMPLES:
    normativa ask "Qual o prazo de entrega do relatório mensal?"
    normativa ask "Quem emite o parecer?" --method bm25 --reasoning
    normativa ask "Qual o prazo?" --json
"#)]
    Ask {
        /// The question to answer
        question: String,

        /// Number of documents to retrieve (default: retrieval.defaultK)
        #[arg(short)]
        k: Option<usize>,

        /// Strategy: vector_only, bm25_only, hybrid, hybrid_rerank
        #[arg(long, conflicts_with = "method")]
        strategy: Option<String>,

        /// Legacy retrieval method: vector, bm25, hybrid
        #[arg(long)]
        method: Option<String>,

        /// Ask the generator for a reasoning section
        #[arg(long)]
        reasoning: bool,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate a question, or grade an answer against retrieved evidence
    #[command(after_help = r#"EXAMPLES:
    # Check the question only
    normativa validate "Qual o prazo?"

    # Grade an externally produced answer
    normativa validate "Qual o prazo?" --answer "O prazo é de 30 dias [1]."
    normativa validate "Qual o prazo?" --answer-file resposta.txt --json
"#)]
    Validate {
        /// The question
        question: String,

        /// Answer text to grade
        #[arg(long, conflicts_with = "answer_file")]
        answer: Option<String>,

        /// File holding the answer text to grade
        #[arg(long)]
        answer_file: Option<PathBuf>,

        /// Number of documents to retrieve (default: retrieval.defaultK)
        #[arg(short)]
        k: Option<usize>,

        /// Strategy: vector_only, bm25_only, hybrid, hybrid_rerank
        #[arg(long, default_value = "hybrid_rerank")]
        strategy: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration and report warnings and errors
    Check {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved configuration
    Show {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Entry point
// ============================================================================

/// Parse arguments, install logging, dispatch the command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Warnings always show unless --quiet; debug only with --verbose.
    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = format!("normativa_core={},normativa_cli={}", log_level, log_level);

    tracing_subscriber::fmt()
        .with_env_filter(&filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color_mode = ColorMode::from_str(&cli.color).unwrap_or(ColorMode::Auto);
    let style = Style::new(color_mode);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            let hint = match &cli.config {
                Some(path) => format!("Check your config at {}", path.display()),
                None => "Check your config at ~/.normativa/config.yaml".to_string(),
            };
            eprintln!(
                "{}",
                style.error_with_context(
                    "Failed to load configuration",
                    Some(&e.to_string()),
                    Some(&hint),
                )
            );
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Diagnostics { json } => {
            build_engine(config).and_then(|engine| handle_diagnostics(&style, &engine, json))
        }
        Command::Retrieve {
            query,
            k,
            strategy,
            filters,
            json,
        } => build_engine(config).and_then(|engine| {
            handle_retrieve(&style, &engine, query, k, strategy, filters, json, cli.quiet)
        }),
        Command::Ask {
            question,
            k,
            strategy,
            method,
            reasoning,
            filters,
            json,
        } => build_engine(config).and_then(|engine| {
            handle_ask(
                &style, &engine, question, k, strategy, method, reasoning, filters, json,
                cli.verbose,
            )
        }),
        Command::Validate {
            question,
            answer,
            answer_file,
            k,
            strategy,
            json,
        } => handle_validate(&style, config, question, answer, answer_file, k, strategy, json),
        Command::Config { action } => match action {
            ConfigAction::Check { json } => handle_config_check(&style, &config, json),
            ConfigAction::Show { json } => handle_config_show(&style, &config, json),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&style, &e));
            ExitCode::FAILURE
        }
    }
}

/// Resolve the configuration file and apply the `--corpus` override.
fn load_config(cli: &Cli) -> anyhow::Result<NormativaConfig> {
    let config = match &cli.config {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            NormativaConfig::from_path(path)?
        }
        None => NormativaConfig::load_default()?,
    };
    Ok(match &cli.corpus {
        Some(corpus) => config.with_corpus(corpus.clone()),
        None => config,
    })
}

fn build_engine(config: NormativaConfig) -> anyhow::Result<NormativaEngine> {
    NormativaEngine::from_config(config).context("Failed to initialize engine")
}

/// Styled error line, with a hint for the errors a user can fix.
fn render_error(style: &Style, error: &anyhow::Error) -> String {
    let domain = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<NormativaError>());

    let hint = match domain {
        Some(NormativaError::InvalidConfiguration { hint, .. }) => Some(hint.clone()),
        Some(NormativaError::CorpusNotConfigured) => Some(
            "Set `corpus:` in config.yaml, pass --corpus, or export NORMATIVA_CORPUS".to_string(),
        ),
        Some(NormativaError::CorpusNotFound(_)) => {
            Some("Check the corpus path; relative paths resolve against the config file".to_string())
        }
        Some(NormativaError::InvalidStrategy(_)) => Some(format!(
            "Valid strategies: {}",
            RetrievalStrategy::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
        _ => None,
    };

    let cause = error.chain().skip(1).map(|c| c.to_string()).last();
    match (cause, hint) {
        (None, None) => style.message(MessageType::Err, &error.to_string()),
        (cause, hint) => {
            style.error_with_context(&error.to_string(), cause.as_deref(), hint.as_deref())
        }
    }
}

fn parse_strategy(value: &str) -> anyhow::Result<RetrievalStrategy> {
    Ok(value.parse::<RetrievalStrategy>()?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn evidence_rows(evidence: &[Evidence]) -> Vec<table::EvidenceRow> {
    evidence
        .iter()
        .enumerate()
        .map(|(i, e)| table::EvidenceRow {
            citation: i + 1,
            source: e.source.clone(),
            page: e.page,
            document_type: e.document_type.clone(),
            score: e.score,
        })
        .collect()
}

fn print_warnings(style: &Style, warnings: &[String]) {
    for warning in warnings {
        println!("{}", style.message(MessageType::Warn, warning));
    }
}

// ============================================================================
// Command handlers
// ============================================================================

fn handle_diagnostics(style: &Style, engine: &NormativaEngine, json: bool) -> anyhow::Result<()> {
    let diagnostics = engine.diagnostics();

    if json {
        return print_json(&diagnostics);
    }

    println!("{}", style.section("DIAGNOSTICS"));
    println!();
    if let Some(path) = engine.corpus().path() {
        println!("  {}", style.key_value("Corpus", &path.display().to_string()));
    }
    println!(
        "  {}",
        style.key_value("Documents", &diagnostics.corpus_size.to_string())
    );
    println!(
        "  {}",
        style.key_value("Lexical index", &style.flag(diagnostics.lexical_ready))
    );
    println!(
        "  {}",
        style.key_value("Vector backend", &style.flag(diagnostics.vector_ready))
    );
    println!(
        "  {}",
        style.key_value("Reranker", &style.flag(diagnostics.reranker_enabled))
    );
    println!(
        "  {}",
        style.key_value(
            "Weights",
            &format!(
                "vector {:.2} / bm25 {:.2}",
                diagnostics.weights.vector_weight, diagnostics.weights.bm25_weight
            )
        )
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_retrieve(
    style: &Style,
    engine: &NormativaEngine,
    query: String,
    k: Option<usize>,
    strategy: String,
    filters: FilterArgs,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut request = RetrievalRequest::new(query)
        .with_strategy(parse_strategy(&strategy)?)
        .with_filters(filters.criteria());
    request.k = k;

    let result = engine.retrieve(&request)?;

    if json {
        return print_json(&result);
    }

    print_retrieval(style, &result, quiet);
    Ok(())
}

fn print_retrieval(style: &Style, result: &RetrievalResult, quiet: bool) {
    if !quiet {
        print_warnings(style, &result.diagnostics.warnings);
        if let Some(report) = &result.diagnostics.governance {
            print_warnings(style, &report.warnings);
        }
    }

    if result.is_empty() {
        println!(
            "{}",
            style.message(MessageType::Info, "No documents matched the query.")
        );
        return;
    }

    let rows: Vec<table::ResultRow> = result
        .iter()
        .enumerate()
        .map(|(i, (doc, score))| table::ResultRow {
            rank: i + 1,
            score,
            source: doc.metadata.source.clone().unwrap_or_else(|| "-".to_string()),
            page: doc.metadata.page,
            document_type: doc
                .metadata
                .document_type
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            status: doc.metadata.status.clone().unwrap_or_else(|| "-".to_string()),
            excerpt: doc.content.clone(),
        })
        .collect();

    println!("{}", table::render_results_table(&rows, 60));

    if !quiet {
        println!();
        println!(
            "{}",
            style.message(
                MessageType::Info,
                &format!(
                    "{} result(s) with {} in {}",
                    result.len(),
                    result.strategy,
                    format::format_duration_ms(result.elapsed_ms)
                )
            )
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_ask(
    style: &Style,
    engine: &NormativaEngine,
    question: String,
    k: Option<usize>,
    strategy: Option<String>,
    method: Option<String>,
    reasoning: bool,
    filters: FilterArgs,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut request = AskRequest::new(question)
        .with_filters(filters.criteria())
        .with_reasoning(reasoning);
    if let Some(strategy) = strategy {
        request = request.with_strategy(parse_strategy(&strategy)?);
    }
    if let Some(method) = method {
        request = request.with_method(method);
    }
    if let Some(k) = k {
        request = request.with_k(k);
    }

    let result = engine.ask(&request)?;

    if json {
        return print_json(&result);
    }

    print_answer(style, &result, verbose);
    Ok(())
}

fn print_answer(style: &Style, result: &AnswerResult, verbose: bool) {
    println!("{}", style.section("ANSWER"));
    println!();
    println!("{}", result.answer);
    println!();
    println!(
        "{}",
        style.key_value("Confidence", &style.confidence(result.confidence))
    );

    if let Some(reasoning) = &result.reasoning {
        println!();
        println!("{}", style.section("REASONING"));
        println!("{}", reasoning);
    }

    if !result.evidence.is_empty() {
        println!();
        println!("{}", style.section("EVIDENCE"));
        println!("{}", table::render_evidence_table(&evidence_rows(&result.evidence)));
    }

    if verbose && !result.component_scores.is_empty() {
        println!();
        println!("{}", table::render_scores_table(&result.component_scores));
    }

    if !result.warnings.is_empty() {
        println!();
        print_warnings(style, &result.warnings);
    }

    if verbose {
        if let Some(metadata) = &result.metadata {
            println!();
            println!(
                "{}",
                style.message(
                    MessageType::Info,
                    &format!(
                        "Timing: retrieval {}, generation {} ({} via {}) at {}",
                        format::format_duration_ms(metadata.retrieval_ms),
                        format::format_duration_ms(metadata.generation_ms),
                        metadata.retrieval_strategy,
                        metadata.model,
                        format::format_timestamp(result.answered_at)
                    )
                )
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_validate(
    style: &Style,
    config: NormativaConfig,
    question: String,
    answer: Option<String>,
    answer_file: Option<PathBuf>,
    k: Option<usize>,
    strategy: String,
    json: bool,
) -> anyhow::Result<()> {
    let answer = match (answer, answer_file) {
        (Some(text), _) => Some(text),
        (None, Some(path)) => Some(
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read answer file {}", path.display()))?,
        ),
        (None, None) => None,
    };

    let Some(answer) = answer else {
        let validator = ConfidenceValidator::new(&config.validator)?;
        let check = validator.validate_question(&question);
        if json {
            print_json(&check)?;
        } else {
            for error in &check.errors {
                println!("{}", style.message(MessageType::Err, error));
            }
            print_warnings(style, &check.warnings);
            if check.is_valid {
                println!("{}", style.message(MessageType::Ok, "Question is valid"));
            }
        }
        if !check.is_valid {
            return Err(NormativaError::InvalidArgument(format!(
                "question rejected: {}",
                check.errors.join("; ")
            ))
            .into());
        }
        return Ok(());
    };

    let engine = build_engine(config)?;
    let mut request = AskRequest::new(question).with_strategy(parse_strategy(&strategy)?);
    if let Some(k) = k {
        request = request.with_k(k);
    }
    let evaluation = engine.evaluate(&request, &answer)?;

    if json {
        return print_json(&evaluation);
    }

    let validation = &evaluation.validation;
    println!("{}", style.section("VALIDATION"));
    println!();
    println!(
        "{}",
        style.key_value("Confidence", &style.confidence(validation.confidence))
    );
    if !validation.component_scores.is_empty() {
        println!();
        println!("{}", table::render_scores_table(&validation.component_scores));
    }
    if !evaluation.evidence.is_empty() {
        println!();
        println!("{}", style.section("EVIDENCE"));
        println!(
            "{}",
            table::render_evidence_table(&evidence_rows(&evaluation.evidence))
        );
    }
    if !validation.warnings.is_empty() {
        println!();
        print_warnings(style, &validation.warnings);
    }
    Ok(())
}

fn handle_config_check(style: &Style, config: &NormativaConfig, json: bool) -> anyhow::Result<()> {
    let outcome = config.validate();

    if json {
        let report = match &outcome {
            Ok(warnings) => serde_json::json!({ "valid": true, "warnings": warnings, "errors": [] }),
            Err(e) => serde_json::json!({ "valid": false, "warnings": [], "errors": [e.to_string()] }),
        };
        print_json(&report)?;
    } else {
        match &outcome {
            Ok(warnings) if warnings.is_empty() => {
                println!("{}", style.message(MessageType::Ok, "Configuration is valid"));
            }
            Ok(warnings) => {
                print_warnings(style, warnings);
                println!(
                    "{}",
                    style.message(MessageType::Ok, "Configuration is valid with warnings")
                );
            }
            Err(_) => {}
        }
    }

    outcome.map(|_| ()).map_err(anyhow::Error::from)
}

fn handle_config_show(style: &Style, config: &NormativaConfig, json: bool) -> anyhow::Result<()> {
    if !json {
        println!("{}", style.message(MessageType::Info, "Resolved configuration:"));
        println!();
    }
    print_json(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_filter_args_to_criteria() {
        let filters = FilterArgs {
            status: Some("Revogado".to_string()),
            max_precedence: Some(2),
            valid_from: Some("2020-01-01".to_string()),
            valid_until: None,
            types: vec!["Resolução".to_string()],
        };
        let criteria = filters.criteria();
        assert_eq!(criteria.status.as_deref(), Some("Revogado"));
        assert_eq!(criteria.max_precedence, Some(2));
        assert_eq!(criteria.valid_from.as_deref(), Some("2020-01-01"));
        assert_eq!(criteria.document_types, vec!["Resolução"]);
    }

    #[test]
    fn test_empty_filters_use_default_status() {
        assert_eq!(FilterArgs::default().criteria(), GovernanceCriteria::new());
    }

    #[test]
    fn test_parse_ask_with_filters() {
        let cli = Cli::try_parse_from([
            "normativa", "ask", "Qual o prazo?", "-k", "3", "--method", "bm25", "--type", "Resolução",
            "--type", "Portaria",
        ])
        .unwrap();
        match cli.command {
            Command::Ask { k, method, filters, .. } => {
                assert_eq!(k, Some(3));
                assert_eq!(method.as_deref(), Some("bm25"));
                assert_eq!(filters.types.len(), 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_strategy_and_method_conflict() {
        let parsed = Cli::try_parse_from([
            "normativa", "ask", "Qual o prazo?", "--strategy", "hybrid", "--method", "bm25",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_render_error_with_hint() {
        let style = Style::new(ColorMode::Never);
        let error = anyhow::Error::from(NormativaError::CorpusNotConfigured)
            .context("Failed to initialize engine");
        let output = render_error(&style, &error);
        assert!(output.contains("[err] Failed to initialize engine"));
        assert!(output.contains("Hint: Set `corpus:`"));
    }
}
