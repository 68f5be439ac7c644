use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use cliclack::spinner;
use console::style;
use converse::envelope::ResponseEnvelope;
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;

const DEFAULT_URL: &str = "http://127.0.0.1:3000/invoke";
const CHUNK_SIZE: usize = 50;
const CHUNK_DELAY: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Invocation endpoint of a running conversed
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Request a bedtime story through the /api/story route
    Story {
        #[arg(default_value = "a robot learning to paint")]
        topic: String,
    },
    /// Ask a question directly, grounded with web search
    Ask {
        #[arg(default_value = "What is the weather today?")]
        question: String,

        /// Model to use instead of the server default
        #[arg(short, long)]
        model: Option<String>,

        /// Use the streaming path
        #[arg(long)]
        stream: bool,
    },
    /// Check that the service is up
    Health,
}

fn story_payload(topic: &str) -> Value {
    json!({
        "httpMethod": "POST",
        "path": "/api/story",
        "headers": {"Content-Type": "application/json"},
        "body": json!({ "topic": topic }).to_string(),
    })
}

fn ask_payload(question: &str, model: Option<&str>, stream: bool) -> Value {
    let mut payload = json!({ "question": question });
    if let Some(model) = model {
        payload["model_id"] = json!(model);
    }
    if stream {
        payload["stream"] = json!(true);
    }
    payload
}

fn health_payload() -> Value {
    json!({ "httpMethod": "GET", "path": "/health" })
}

/// Split text into pieces of at most `size` characters
fn chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

async fn fetch_envelope(url: &str, payload: &Value) -> Result<ResponseEnvelope> {
    let response = reqwest::Client::new()
        .post(url)
        .json(payload)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", url))?;
    response.json().await.context("invalid envelope")
}

async fn invoke(url: &str, payload: &Value) -> Result<Value> {
    let spin = spinner();
    spin.start("awaiting reply");
    let envelope = fetch_envelope(url, payload).await;
    spin.stop(if envelope.is_ok() { "" } else { "request failed" });
    let envelope = envelope?;

    let body = envelope.body_json().context("envelope body is not JSON")?;
    if !envelope.is_success() {
        return Err(anyhow!(
            "invocation failed ({}): {}",
            envelope.status_code,
            body.get("error").and_then(|e| e.as_str()).unwrap_or("unknown error")
        ));
    }
    Ok(body)
}

async fn print_streamed(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    for chunk in chunks(text, CHUNK_SIZE) {
        write!(stdout, "{}", chunk)?;
        stdout.flush()?;
        tokio::time::sleep(CHUNK_DELAY).await;
    }
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Story { topic } => {
            println!("{} {}", style("Topic:").bold(), topic);
            let body = invoke(&cli.url, &story_payload(&topic)).await?;

            let story = body
                .get("story")
                .and_then(|s| s.as_str())
                .ok_or_else(|| anyhow!("no story in response: {}", body))?;
            print_streamed(story).await?;

            println!("\n{}", style("Stream completed").green());
            println!(
                "Total chunks from upstream: {}",
                body.get("chunks").map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
            );
            if body.get("complete") == Some(&json!(false)) {
                let warning = "The upstream stream ended early; the story may be truncated.";
                println!("{}", style(warning).yellow());
            }
        }
        Command::Ask {
            question,
            model,
            stream,
        } => {
            println!("{} {}", style("Question:").bold(), question);
            let body = invoke(&cli.url, &ask_payload(&question, model.as_deref(), stream)).await?;

            match body.get("response") {
                Some(Value::String(text)) => print_streamed(text).await?,
                Some(message) => println!("{}", serde_json::to_string_pretty(message)?),
                None => println!("{}", body),
            }
            if let Some(request_id) = body.get("requestId").and_then(|r| r.as_str()) {
                println!("{}", style(format!("request id: {}", request_id)).dim());
            }
        }
        Command::Health => {
            let body = invoke(&cli.url, &health_payload()).await?;
            println!("{}", body);
        }
    }

    Ok(())
}
