use anyhow::Result;
use clap::{Parser, Subcommand};
use product_analyzer::app::App;
use product_analyzer::models::{story_failure_message, AnalysisResult, ProductRecord, StoryStyle};
use product_analyzer::Error;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "product-analyzer")]
#[command(about = "Identify products in photos and write stories about them")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a product photo and store the result.
    Analyze {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        /// Also write a story in this style after analysis.
        #[arg(long, requires = "prompt")]
        style: Option<String>,
        /// What the story should be about.
        #[arg(long, requires = "style")]
        prompt: Option<String>,
    },
    /// Write a story for an analyzed record.
    Story {
        #[arg(value_name = "ID")]
        id: Uuid,
        #[arg(long)]
        style: String,
        #[arg(long)]
        prompt: String,
    },
    /// Show one record.
    Show {
        #[arg(value_name = "ID")]
        id: Uuid,
    },
    /// List records, newest first.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List the available story styles.
    Styles,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "product_analyzer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    if let Command::Styles = args.command {
        print_json(&styles_json());
        return Ok(());
    }

    let app = match App::new().await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let response = run(&app, args.command).await;
    let ok = response["success"].as_bool().unwrap_or(false);
    print_json(&response);

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app: &App, command: Command) -> Value {
    match command {
        Command::Analyze {
            image,
            style,
            prompt,
        } => {
            info!("Analyzing {}", image.display());
            let record = match app.analyze_image(&image).await {
                Ok(record) => record,
                Err(e) => return analysis_failure(&e),
            };

            match (style, prompt) {
                (Some(style), Some(prompt)) => story_response(
                    app.generate_story(record.id, &style, &prompt).await,
                    Some(&record),
                ),
                _ => success(&record),
            }
        }
        Command::Story { id, style, prompt } => {
            story_response(app.generate_story(id, &style, &prompt).await, None)
        }
        Command::Show { id } => match app.record(id).await {
            Ok(record) => success(&record),
            Err(e) => failure(e.to_string()),
        },
        Command::History { limit } => match app.history(Some(limit)).await {
            Ok(records) => json!({ "success": true, "data": records }),
            Err(e) => failure(e.to_string()),
        },
        Command::Styles => styles_json(),
    }
}

fn success(record: &ProductRecord) -> Value {
    json!({ "success": true, "data": record })
}

fn failure(message: String) -> Value {
    json!({ "success": false, "error": message })
}

fn analysis_failure(e: &Error) -> Value {
    let record_id = match e {
        Error::Analysis { record_id, .. } => Some(*record_id),
        _ => None,
    };
    json!({
        "success": false,
        "error": format!("分析失敗: {}", e),
        "data": {
            "id": record_id,
            "analysis": AnalysisResult::failure_fallback(e),
        }
    })
}

/// `analyzed` is the record from the same invocation, if any; a failed
/// story still reports it so the caller keeps its id.
fn story_response(
    result: product_analyzer::Result<ProductRecord>,
    analyzed: Option<&ProductRecord>,
) -> Value {
    match result {
        Ok(record) => success(&record),
        Err(e) => {
            let mut response = failure(story_failure_message(&e));
            if let Some(record) = analyzed {
                response["data"] = json!(record);
            }
            response
        }
    }
}

fn styles_json() -> Value {
    let styles: Vec<Value> = StoryStyle::ALL
        .iter()
        .map(|style| json!({ "key": style.key(), "label": style.label() }))
        .collect();
    json!({ "success": true, "data": styles })
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error!("Failed to render output: {}", e),
    }
}
