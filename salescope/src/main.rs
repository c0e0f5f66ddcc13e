//! salescope - natural-language OLAP analytics over sales data
//!
//! Interactive prompt: type a business question, get a narrative answer
//! assembled from the executed analysis plan.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use salescope_core::{Config, Database, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, not stdout since we own the prompt)
    let _log_guard =
        salescope_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("salescope starting up");

    let db_path = config.database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let mut session = Orchestrator::new(db, config.planner.as_ref())
        .context("failed to create orchestrator")?;
    if config.planner.is_none() {
        println!("No [planner] configured; using the rule-based planner.");
    }

    println!("salescope - ask a question about the sales data.");
    println!("Commands: :reset clears conversation context, :quit exits.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush().context("failed to flush stdout")?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("failed to read input")? == 0 {
            break; // EOF
        }
        let query = line.trim();

        match query {
            "" => continue,
            ":quit" | ":exit" => break,
            ":reset" => {
                session.reset_context();
                println!("Conversation context cleared.\n");
                continue;
            }
            _ => {}
        }

        let result = session.process(query).await;

        println!("\n{}\n", result.narrative);
        for record in &result.steps_executed {
            let status = if record.success { "ok" } else { "failed" };
            println!(
                "  [{}] {}.{} ({} rows)",
                status, record.agent, record.operation, record.row_count
            );
        }
        if !result.suggested_followups.is_empty() {
            println!("\nYou could also ask:");
            for followup in &result.suggested_followups {
                println!("  - {}", followup);
            }
        }
        println!();
    }

    tracing::info!("salescope shutting down");
    Ok(())
}
