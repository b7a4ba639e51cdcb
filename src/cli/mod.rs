pub mod commands;

use std::io::{self, Write};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::api::routes::parse_upload_metadata;
use crate::assistant::{
    files::ModelListing,
    models::{AssistantFile, FileMetadata, FilterOptions, ResponseMetadata},
    AssistantChat, AssistantClient, AssistantError,
};
use crate::chat::{
    enrichment::format_metric,
    session::file_matches_reference,
    ChatOptions, ChatRelay, ChatSession,
};
use crate::cli::commands::{ChatArgs, Commands, FileAction};
use crate::config::{AppConfig, FeatureFlags};

pub async fn run_cli(command: Commands, config_path: String) {
    let config = match AppConfig::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            return;
        }
    };
    let client = Arc::new(AssistantClient::new(config.assistant.clone()));

    match command {
        Commands::Serve => {
            eprintln!("Serve command should be intercepted by main.rs to boot actix-web");
        }
        Commands::Files { action } => run_files(&client, action).await,
        Commands::Models => match visible_models(&client, &config.features).await {
            Ok(Some(listing)) => {
                let (note, models) = match listing {
                    ModelListing::Upstream(m) => ("", m),
                    ModelListing::Sample(m) => (" (sample data, API not available)", m),
                    ModelListing::Unavailable => (" (API returned an unexpected format)", Vec::new()),
                };
                println!("{} chat model(s){}", models.len(), note);
                for m in models {
                    println!("{:<30} | {:<10} | {}", m.name, m.provider, m.description);
                }
            }
            Ok(None) => println!("Model listing is disabled. Set SHOW_MODELS=true to enable it."),
            Err(e) => eprintln!("Error: {}", e),
        },
        Commands::Config => match client.assistant_config().await {
            Ok(cfg) => println!("{}", serde_json::to_string_pretty(&cfg).unwrap_or_default()),
            Err(e) => eprintln!("Error: {}", e),
        },
        Commands::Chat(args) => run_repl(config, client, args).await,
    }
}

/// The model listing, or `None` without any request when `SHOW_MODELS` is off.
pub async fn visible_models(
    client: &AssistantClient,
    features: &FeatureFlags,
) -> Result<Option<ModelListing>, AssistantError> {
    if !features.show_models {
        return Ok(None);
    }
    client.list_models().await.map(Some)
}

async fn run_files(client: &AssistantClient, action: FileAction) {
    match action {
        FileAction::List => match client.list_files().await {
            Ok(files) => {
                if files.is_empty() {
                    println!("No files found.");
                } else {
                    println!("{:<38} | {:<12} | {}", "ID", "Status", "Name");
                    println!("{:-<38}-+-{:-<12}-+-{:-<20}", "", "", "");
                    for f in files {
                        println!(
                            "{:<38} | {:<12} | {}",
                            f.id,
                            f.status.as_deref().unwrap_or("-"),
                            f.name
                        );
                    }
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        },
        FileAction::Upload { path, metadata } => {
            let metadata = match parse_upload_metadata(metadata.as_deref()) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("Invalid metadata format: {}", e);
                    return;
                }
            };
            let bytes = match std::fs::read(&path) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("Failed to read {}: {}", path, e);
                    return;
                }
            };
            let name = std::path::Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.clone());
            match client.upload_file(&name, bytes, metadata).await {
                Ok(uploaded) => println!(
                    "File '{}' uploaded successfully ({})",
                    name,
                    uploaded.id.as_deref().unwrap_or("no id returned")
                ),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
        FileAction::Delete { id } => match client.delete_file(&id).await {
            Ok(()) => println!("Deleted file {}", id),
            Err(e) => eprintln!("Error: {}", e),
        },
        FileAction::UpdateMetadata { id, metadata } => {
            let metadata: FileMetadata = match serde_json::from_str(&metadata) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("Invalid metadata format: {}", e);
                    return;
                }
            };
            match client.update_file_metadata(&id, metadata).await {
                Ok(_) => println!("Updated metadata of file {}", id),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
    }
}

pub fn chat_options(config: &AppConfig, args: ChatArgs) -> ChatOptions {
    let mut options = ChatOptions::from_config(&config.chat, &config.assistant);
    if let Some(model) = args.model {
        options.model = model;
    }
    if let Some(t) = args.temperature {
        options.temperature = t;
    }
    if args.no_history {
        options.include_message_history = false;
    }
    options.include_highlights |= args.highlights;
    options.citations_in_content = args.citations;
    options.auto_categorize = !args.no_auto_categorize;
    if args.snippet_size.is_some() {
        options.context.snippet_size = args.snippet_size;
    }
    if args.top_k.is_some() {
        options.context.top_k = args.top_k;
    }
    options.evaluate = args.ground_truth.is_some();
    options.ground_truth_answer = args.ground_truth;
    options.filter = FilterOptions {
        specialty: args.filter.specialty,
        document_type: args.filter.document_type,
        user_role: args.filter.user_role,
        resource: args.filter.resource,
        department: args.filter.department,
        priority: args.filter.priority,
        date_range: args.filter.date_range,
    };
    options
}

async fn run_repl(config: AppConfig, client: Arc<AssistantClient>, args: ChatArgs) {
    if let Err(e) = client.require_credentials() {
        eprintln!("{}", e);
        return;
    }

    let files = if config.features.show_assistant_files {
        client.list_files().await.unwrap_or_else(|e| {
            warn!("Could not load assistant files: {}", e);
            Vec::new()
        })
    } else {
        Vec::new()
    };

    let api: Arc<dyn AssistantChat> = client.clone();
    let relay = Arc::new(ChatRelay::new(api, config.features.clone()));
    let mut session = ChatSession::new(chat_options(&config, args));

    println!("--- docassist terminal chat ---");
    println!("Assistant: {}", client.assistant_name());
    println!("Type /exit to quit, /truth <text> to set a ground-truth answer.");
    println!("-------------------------------");

    loop {
        print!("\nUser> ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let text = input.trim();

        if text.is_empty() { continue; }
        if text == "/exit" || text == "/quit" { break; }
        if let Some(truth) = text.strip_prefix("/truth") {
            let truth = truth.trim();
            session.options.evaluate = !truth.is_empty();
            session.options.ground_truth_answer = (!truth.is_empty()).then(|| truth.to_string());
            println!("Evaluation {}", if truth.is_empty() { "disabled" } else { "enabled" });
            continue;
        }

        if let Err(e) = session.set_input(text) {
            eprintln!("Error: {}", e);
            continue;
        }

        print!("Assistant> ");
        let _ = io::stdout().flush();

        match session.run_exchange(&relay, |content| print!("{}", content)).await {
            Ok(_) => println!(),
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        }

        if let Some(meta) = session.metadata() {
            print_metadata(meta);
        }
        print_referenced_files(&files, session.referenced_files());
    }
}

fn print_metadata(meta: &ResponseMetadata) {
    println!("---");
    if let Some(model) = &meta.model {
        println!("Model: {}", model);
    }
    if let Some(usage) = &meta.usage {
        println!(
            "Tokens: {} total ({} prompt + {} completion)",
            usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
        );
    }
    for (i, citation) in meta.citations.iter().enumerate() {
        for reference in &citation.references {
            println!("[{}] {}", i + 1, reference.file.name);
        }
    }
    if let Some(eval) = &meta.evaluation_data {
        let metrics = [
            ("Correctness", eval.metrics.correctness),
            ("Completeness", eval.metrics.completeness),
            ("Alignment", eval.metrics.alignment),
        ];
        for (name, value) in metrics {
            let (pct, band) = format_metric(value);
            println!("{}: {} ({:?})", name, pct, band);
        }
        for fact in &eval.reasoning.evaluated_facts {
            println!("  {} - {}", fact.entailment.label(), fact.fact.content);
        }
    }
    if let Some(context) = &meta.context_data {
        for (i, m) in context.matches.iter().take(3).enumerate() {
            let source = m
                .metadata
                .as_ref()
                .and_then(|md| md.get("filename"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Source {}", i + 1));
            println!("Context {}: {:.1}%", source, m.score * 100.0);
        }
    }
}

fn print_referenced_files(files: &[AssistantFile], references: &[String]) {
    let matched: Vec<&AssistantFile> = files
        .iter()
        .filter(|f| references.iter().any(|r| file_matches_reference(&f.name, r)))
        .collect();
    if !matched.is_empty() {
        println!("Referenced files:");
        for f in matched {
            println!("  * {}", f.name);
        }
    }
}
