use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use docsearch_client::api::ApiClient;
use docsearch_client::chat::{ChatSession, SessionUpdate};
use docsearch_client::config::Config;
use docsearch_client::models::{indexer_label, ChatRequest, Proposal};
use docsearch_client::search::{SearchController, SearchView};

#[derive(Parser)]
#[command(name = "docsearch", version, about = "Search and chat with the documentation backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask questions, one per line; answers stream as they are generated
    Chat {
        /// Number of documents used as context (1-10)
        #[arg(short, long)]
        k: Option<u8>,
        #[arg(short, long)]
        model: Option<String>,
        #[arg(short, long)]
        indexer: Option<String>,
    },
    /// Search as you type: each stdin line is the current input value,
    /// `:indexer <id>` switches indexer
    Search {
        #[arg(short, long)]
        indexer: Option<String>,
    },
    /// List chat models
    Models,
    /// List search indexers
    Indexers,
    /// Show one document
    Doc { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout carries answers
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::info!("Backend: {}", config.api_url);

    let client = ApiClient::new(config.clone())?;

    match cli.command {
        Command::Chat { k, model, indexer } => {
            let model = match model.or(config.model.clone()) {
                Some(m) => m,
                None => first(client.list_models().await?, "model")?,
            };
            let indexer = match indexer.or(config.indexer.clone()) {
                Some(i) => i,
                None => first(client.list_indexers().await?, "indexer")?,
            };
            let k = k.unwrap_or(config.default_k);
            run_chat(&client, k, &model, &indexer).await
        }
        Command::Search { indexer } => {
            let indexer = match indexer.or(config.indexer.clone()) {
                Some(i) => i,
                None => first(client.list_indexers().await?, "indexer")?,
            };
            run_search(client, indexer).await
        }
        Command::Models => {
            for model in client.list_models().await? {
                println!("{model}");
            }
            Ok(())
        }
        Command::Indexers => {
            for indexer in client.list_indexers().await? {
                println!("{indexer:<16} {}", indexer_label(&indexer));
            }
            Ok(())
        }
        Command::Doc { name } => {
            let doc = client.document(&name).await?;
            println!("{}", doc.full_name.as_deref().unwrap_or(&doc.name));
            if let Some(description) = &doc.description {
                println!("\n{description}");
            }
            println!("\n{}", doc.content);
            Ok(())
        }
    }
}

fn first(items: Vec<String>, what: &str) -> anyhow::Result<String> {
    items
        .into_iter()
        .next()
        .with_context(|| format!("Backend offers no {what}"))
}

async fn run_chat(client: &ApiClient, k: u8, model: &str, indexer: &str) -> anyhow::Result<()> {
    let (session, mut updates) = ChatSession::with_updates();
    let mut session = session.idle_timeout(client.config().idle_timeout);
    eprintln!("Chatting with {model} over {} (k = {k})", indexer_label(indexer));

    let printer = tokio::spawn(async move {
        let mut proposals: Vec<Proposal> = Vec::new();
        while let Some(update) = updates.recv().await {
            match update {
                SessionUpdate::Submitted { .. } => {}
                SessionUpdate::Proposals(items) => proposals = items,
                SessionUpdate::Delta(delta) => {
                    print!("{delta}");
                    let _ = std::io::stdout().flush();
                }
                SessionUpdate::Finished(message) => {
                    println!();
                    if let Some(elapsed) = message.elapsed_seconds {
                        println!("({elapsed:.1}s)");
                    }
                    print_sources(&proposals);
                }
                SessionUpdate::Failed(message) => eprintln!("\n{message}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request = ChatRequest::new(line, k, model, indexer);

        let cancel = CancellationToken::new();
        let on_ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };
        let result = session.exchange_with_cancel(client, &request, cancel).await;
        on_ctrl_c.abort();

        if let Err(e) = result {
            tracing::debug!("Exchange ended without an answer: {e}");
        }
    }

    session.close();
    drop(session);
    printer.await?;
    Ok(())
}

async fn run_search(client: ApiClient, mut indexer: String) -> anyhow::Result<()> {
    let debounce = client.config().debounce;
    let settle = client.config().request_timeout;
    let mut controller = SearchController::new(Arc::new(client)).with_debounce(debounce);

    let mut views = controller.subscribe();
    let printer = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            if !view.is_searching() {
                render(&view);
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(rest) = line.strip_prefix(":indexer ") {
            indexer = rest.trim().to_string();
            controller.on_indexer_change(indexer.clone());
        } else {
            controller.on_input(line, indexer.clone());
        }
    }

    // Let the last debounced request fire and answer
    tokio::time::sleep(debounce + Duration::from_millis(50)).await;
    let _ = tokio::time::timeout(settle, async {
        while controller.is_searching() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    controller.shutdown();
    printer.abort();
    Ok(())
}

fn render(view: &SearchView) {
    if view.query.is_empty() {
        return;
    }
    println!("── {} [{}]", view.query, indexer_label(&view.indexer));
    if let Some(error) = &view.error {
        eprintln!("{error}");
    }
    if let Some(corrected) = &view.corrected_query {
        println!("Did you mean: {corrected}?");
    }
    for proposal in &view.proposals {
        println!("  {} (score: {:.2})", proposal.document, proposal.score);
    }
}

fn print_sources(proposals: &[Proposal]) {
    if proposals.is_empty() {
        return;
    }
    println!("Sources:");
    for proposal in proposals {
        println!("  {} (score: {:.2})", proposal.document, proposal.score);
    }
}
