//! One-shot commands that print to the terminal instead of opening the TUI.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Select};
use std::path::Path;

use cortex_core::analyst::GREETING_PROMPT;
use cortex_core::samples::{all_samples, EXAMPLE_QUESTIONS};
use cortex_core::{
    export, Analyst, AnalystClient, Config, ConnectedSessions, RenderedBlock, RenderedResponse,
    Renderer, ResultViews, SessionLeg, TurnOutcome, TurnProcessor, TurnTrigger,
};

/// Rows printed per result before truncating.
const PRINT_ROWS: usize = 20;

pub async fn ask(
    config: &Config,
    sessions: &ConnectedSessions,
    trigger: TurnTrigger,
    export_results: bool,
) -> Result<()> {
    let analyst = AnalystClient::new(sessions.get(SessionLeg::Analyst), &config.semantic_model_path());
    let renderer = Renderer::new(sessions.get(config.sql_session));
    let mut processor = TurnProcessor::new();

    println!("{} {}", "You:".bold().cyan(), trigger.prompt());
    println!("{}", "Analyzing your question...".dimmed());

    match processor.process(&trigger, &analyst).await? {
        TurnOutcome::Succeeded { response, .. } => {
            for warning in &response.warnings {
                println!("{} {}", "warning:".yellow(), warning);
            }
            let rendered = renderer
                .render(&response.content, response.request_id.as_deref())
                .await;
            print_rendered(&rendered);

            if export_results {
                for (i, (_, outcome)) in rendered.results().enumerate() {
                    if let Ok(views) = outcome {
                        let dir = config.export_dir();
                        let path = export::write_csv(&dir, &views.result, Utc::now())
                            .with_context(|| format!("exporting result {} to {}", i + 1, dir.display()))?;
                        println!("{} {}", "Exported:".green(), path.display());
                    }
                }
            }
            Ok(())
        }
        TurnOutcome::Failed { error } => {
            println!("{} {}", "Error:".bold().red(), error);
            bail!("Cortex Analyst request failed")
        }
    }
}

fn print_rendered(rendered: &RenderedResponse) {
    print!("\n{}", "Analyst".bold().yellow());
    match &rendered.request_id {
        Some(id) => println!(" {}", format!("(request id: {})", id).dimmed()),
        None => println!(),
    }

    for block in &rendered.blocks {
        match block {
            RenderedBlock::Prose(text) => println!("{}\n", text),
            RenderedBlock::Sql { statement, outcome } => {
                println!("{}", "Generated SQL:".bold().blue());
                for line in statement.lines() {
                    println!("  {}", line.dimmed());
                }
                match outcome {
                    Ok(views) => print_table(views),
                    Err(err) => println!("{} {}", "Error executing SQL:".red(), err),
                }
                println!();
            }
            RenderedBlock::Suggestions(items) => {
                println!("{}", "Suggested follow-ups:".bold().magenta());
                for item in items {
                    println!("  • {}", item);
                }
                println!();
            }
        }
    }
}

fn print_table(views: &ResultViews) {
    let result = &views.result;
    let names = result.column_names();
    let widths: Vec<usize> = names
        .iter()
        .enumerate()
        .map(|(col, name)| {
            result
                .rows
                .iter()
                .take(PRINT_ROWS)
                .map(|row| row.get(col).and_then(|c| c.as_deref()).unwrap_or("NULL").chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
                .min(40)
        })
        .collect();

    let header: Vec<String> = names
        .iter()
        .zip(&widths)
        .map(|(name, w)| format!("{:<w$}", name, w = *w))
        .collect();
    println!("  {}", header.join("  ").bold());

    for row in result.rows.iter().take(PRINT_ROWS) {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(col, w)| {
                let value: String = row
                    .get(col)
                    .and_then(|c| c.as_deref())
                    .unwrap_or("NULL")
                    .chars()
                    .take(*w)
                    .collect();
                format!("{:<w$}", value, w = *w)
            })
            .collect();
        println!("  {}", cells.join("  "));
    }

    if result.row_count() > PRINT_ROWS {
        println!("  {}", format!("... {} more rows", result.row_count() - PRINT_ROWS).dimmed());
    }
    let views_offered: Vec<&str> = views.available().iter().map(|v| v.label()).collect();
    println!(
        "  {}",
        format!("{} rows · views: {}", result.row_count(), views_offered.join(", ")).dimmed()
    );
}

/// Interactive picker over the sample questions; returns the chosen one.
pub fn pick_sample() -> Result<TurnTrigger> {
    let items: Vec<String> = EXAMPLE_QUESTIONS
        .iter()
        .map(|q| format!("Example: {}", q))
        .chain(all_samples().map(|(category, q)| format!("{}: {}", category, q)))
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Pick a question to ask")
        .items(&items)
        .default(0)
        .interact()?;

    let question = EXAMPLE_QUESTIONS
        .iter()
        .copied()
        .chain(all_samples().map(|(_, q)| q))
        .nth(selection)
        .context("selection out of range")?;
    Ok(TurnTrigger::Example(question.to_string()))
}

/// Greeting round-trip against the analyst, like the setup guide's test button.
pub async fn check(config: &Config, sessions: &ConnectedSessions) -> Result<()> {
    if let Some(identity) = sessions.query.identity() {
        println!(
            "{} connected as {} with role {}",
            "✓".green(),
            identity.user.bold(),
            identity.role.bold()
        );
    }

    let analyst = AnalystClient::new(sessions.get(SessionLeg::Analyst), &config.semantic_model_path());
    println!(
        "Sending greeting to {} (model {})",
        analyst.endpoint().dimmed(),
        analyst.semantic_model_file().dimmed()
    );

    match analyst.ask(GREETING_PROMPT).await {
        Ok(response) => {
            println!(
                "{} Cortex Analyst connection successful (request id: {})",
                "✓".green(),
                response.request_id.as_deref().unwrap_or("none")
            );
            for block in &response.content {
                if let cortex_core::ContentBlock::Text { text } = block {
                    println!("{}", text);
                }
            }
            Ok(())
        }
        Err(err) => {
            println!("{} {}", "✗ Connection test failed:".red(), err);
            bail!("Cortex Analyst connection test failed")
        }
    }
}

pub fn show_config(config: &Config, path: &Path) -> Result<()> {
    println!("{} {}", "Config file:".bold(), path.display());
    if !path.exists() {
        println!("  {}", "(not found, using defaults and environment)".dimmed());
    }

    let mut shown = config.clone();
    if shown.password.is_some() {
        shown.password = Some("<set>".to_string());
    }
    if shown.token.is_some() {
        shown.token = Some("<set>".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    println!("{} {}", "Semantic model:".bold(), config.semantic_model_path());
    match config.auth_method() {
        Ok(method) => println!("{} {}", "Authentication:".bold(), method.display_name()),
        Err(err) => println!("{} {}", "Authentication:".bold(), err.to_string().yellow()),
    }
    match config.base_url() {
        Ok(url) => println!("{} {}", "Endpoint:".bold(), url),
        Err(err) => println!("{} {}", "Endpoint:".bold(), err.to_string().yellow()),
    }
    Ok(())
}

pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    Config::new()
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{} {}", "Wrote default config to".green(), path.display());
    println!("Set account and user there, and the password or token via SNOWFLAKE_PASSWORD / SNOWFLAKE_TOKEN.");
    Ok(())
}
