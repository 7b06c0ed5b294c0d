use console::{style, Term};
use serde_json::{json, Value};
use ssechain_core::origin::{CHAT, SEARCH};
use ssechain_core::{consume, relay, ConsumeSummary, EventKind, EventSource, Handlers, RelayConfig, SourceRequest, StreamEvent};
use ssechain_http::relay_client;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::render::{error_lines, result_lines, rule};

pub struct ClientOptions {
    /// Relay service base URL
    pub backend: String,
    pub relay: RelayConfig,
}

fn header(icon: &str, title: &str, details: &[String]) {
    println!();
    println!("{}", rule('='));
    println!("{} {}", icon, style(title).bold());
    println!("{}", rule('='));
    for line in details {
        println!("{}", line);
    }
    println!("{}\n", rule('-'));
}

fn print_error(event: &StreamEvent, backend: &str) {
    println!();
    for line in error_lines(event, backend) {
        println!("{}", style(format!("❌ {}", line)).red());
    }
}

/// Open `request` on the relay service and drain it through `handlers`.
/// The response is wrapped in a local relay so a dead or silent backend still
/// ends with a terminal error instead of a hang.
async fn run(options: &ClientOptions, request: SourceRequest, mut handlers: Handlers) -> anyhow::Result<Option<ConsumeSummary>> {
    let upstream = relay_client(&options.backend).open(request).await?;
    let events = relay(upstream, options.relay.clone(), "client");

    tokio::select! {
        summary = consume(events, &mut handlers) => Ok(Some(summary?)),
        _ = tokio::signal::ctrl_c() => {
            println!("\n\n⚠️  Interrupted by user");
            Ok(None)
        }
    }
}

/// Search mode: progress line rewritten in place, then the result listing
pub async fn stream_search(options: &ClientOptions, query: &str) -> anyhow::Result<()> {
    header("🔍", "SEARCH STREAMING TEST", &[format!("Query: '{}'", query)]);

    let term = Term::stdout();
    let current = Arc::new(Mutex::new(String::new()));

    let show_progress = {
        let term = term.clone();
        let current = current.clone();
        move |event: &StreamEvent| {
            let message = event.payload.get("message").and_then(Value::as_str).unwrap_or_default();
            let mut current = current.lock().unwrap_or_else(|e| e.into_inner());
            if *current != message {
                let _ = term.clear_line();
                let _ = term.write_str(&format!("🔄 {}", message));
                *current = message.to_string();
            }
        }
    };
    let clear_progress = {
        let term = term.clone();
        let current = current.clone();
        move || {
            let mut current = current.lock().unwrap_or_else(|e| e.into_inner());
            if !current.is_empty() {
                let _ = term.clear_line();
                current.clear();
            }
        }
    };

    let backend = options.backend.clone();
    let on_result = {
        let clear_progress = clear_progress.clone();
        move |event: &StreamEvent| {
            clear_progress();
            println!("{}", rule('='));
            println!("✅ {}", style("SEARCH RESULTS:").bold().green());
            println!("{}", rule('='));
            for line in result_lines(&event.payload) {
                println!("{}", line);
            }
            println!();
        }
    };
    let on_error = move |event: &StreamEvent| {
        clear_progress();
        print_error(event, &backend);
    };

    let handlers = Handlers::new()
        .on(EventKind::ProgressChar, show_progress.clone())
        .on(EventKind::Progress, show_progress)
        .on(EventKind::Result, on_result)
        .on(EventKind::Error, on_error)
        .on_unknown(|event: &StreamEvent| debug!("Ignoring '{}' event #{}", event.kind, event.seq));

    let request = SourceRequest::new(SEARCH, json!({ "query": query }));
    if let Some(summary) = run(options, request, handlers).await? {
        debug!("Search stream ended after {} events", summary.delivered);
        finish(&summary);
    }
    Ok(())
}

/// Chat mode: tokens printed inline as they arrive
pub async fn stream_chat(options: &ClientOptions, question: &str) -> anyhow::Result<()> {
    let property = sample_property();
    header(
        "💬",
        "CHAT STREAMING TEST",
        &[
            format!("Question: {}", question),
            format!("Property: {}", property["address"].as_str().unwrap_or("N/A")),
        ],
    );
    print!("💬 ");
    let _ = std::io::stdout().flush();

    let backend = options.backend.clone();
    let handlers = Handlers::new()
        .on(EventKind::Token, |event: &StreamEvent| {
            let content = event.payload.get("content").and_then(Value::as_str).unwrap_or_default();
            print!("{}", content);
            let _ = std::io::stdout().flush();
        })
        .on(EventKind::Done, |_: &StreamEvent| {
            println!("\n\n✅ {}", style("[Chat response complete]").green());
        })
        .on(EventKind::Error, move |event: &StreamEvent| print_error(event, &backend));

    let request = SourceRequest::new(
        CHAT,
        json!({
            "property_details": property,
            "user_question": question,
            "chat_history": [],
        }),
    );
    if let Some(summary) = run(options, request, handlers).await? {
        finish(&summary);
    }
    Ok(())
}

fn finish(summary: &ConsumeSummary) {
    println!("\n{}", rule('='));
    if summary.succeeded() {
        println!("Test completed ({} events).", summary.delivered);
    } else {
        println!("Test failed after {} events.", summary.delivered);
    }
    println!("{}", rule('='));
}

fn sample_property() -> Value {
    json!({
        "id": "123",
        "address": "123 Main Street, San Francisco, CA",
        "price": 500000,
        "bedrooms": 3,
        "bathrooms": 2,
        "square_feet": 1500,
        "year_built": 2015,
        "property_type": "Condo",
        "schools": [
            { "name": "Lincoln High School", "rating": 8.5, "distance": "0.3 miles", "grade": "9-12" },
            { "name": "Roosevelt Elementary", "rating": 9.2, "distance": "0.5 miles", "grade": "K-5" },
            { "name": "Washington Middle School", "rating": 8.8, "distance": "0.7 miles", "grade": "6-8" },
            { "name": "Stanford University", "rating": 9.8, "distance": "15 miles", "grade": "University" }
        ]
    })
}
