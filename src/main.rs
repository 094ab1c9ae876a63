use clap::{Parser, Subcommand};
use dotenv::dotenv;
use labprompt::ai::agents::PromptAgents;
use labprompt::ai::client::GeminiClient;
use labprompt::config::AppConfig;
use labprompt::core::feedback::OptimizationPair;
use labprompt::core::form::PromptForm;
use labprompt::core::{composer, tokens};
use labprompt::upload;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "labprompt", about = "Compose, test and optimize LLM system prompts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a form as a Markdown system prompt without calling the model
    Draft { form: PathBuf },
    /// Estimate the token count of a text file
    Tokens { file: PathBuf },
    /// Generate a Master Prompt from a form
    Generate { form: PathBuf },
    /// Rewrite a prompt using a JSON list of corrections
    Optimize { prompt: PathBuf, corrections: PathBuf },
    /// Score a prompt and list suggestions
    Evaluate { prompt: PathBuf },
    /// Pre-fill form fields from a document
    Extract { document: PathBuf },
}

#[derive(Deserialize)]
struct CorrectionInput {
    query: String,
    bad_response: String,
    corrected_response: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::builder().filter_level(log::LevelFilter::Info).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Draft { form } => {
            let form = read_form(&form)?;
            form.validate()?;
            println!("{}", composer::compose_draft(&form));
            log::info!("Form completeness: {}%", form.completeness());
        }
        Command::Tokens { file } => {
            let text = std::fs::read_to_string(file)?;
            let estimate = tokens::estimate(&text);
            println!("chars: {}\nwords: {}\ntokens (est.): {}", estimate.chars, estimate.words, estimate.tokens);
        }
        Command::Generate { form } => {
            let form = read_form(&form)?;
            let (_, agents) = agents()?;
            let prompt = agents.generate_master_prompt(&form).await?;
            println!("{prompt}");
            log::info!("Generated {} tokens", tokens::estimate(&prompt).tokens);
        }
        Command::Optimize { prompt, corrections } => {
            let current = std::fs::read_to_string(prompt)?;
            let inputs: Vec<CorrectionInput> = serde_json::from_str(&std::fs::read_to_string(corrections)?)?;
            let pairs: Vec<OptimizationPair> = inputs
                .into_iter()
                .map(|c| OptimizationPair::new(c.query, c.bad_response, c.corrected_response))
                .collect();
            let (_, agents) = agents()?;
            let improved = agents.optimize_prompt(&current, &pairs).await?;
            println!("{improved}");
        }
        Command::Evaluate { prompt } => {
            let text = std::fs::read_to_string(prompt)?;
            let (_, agents) = agents()?;
            let evaluation = agents.evaluate_prompt(&text).await?;
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
        Command::Extract { document } => {
            let (config, agents) = agents()?;
            let bytes = std::fs::read(&document)?;
            let doc = upload::validate_upload(&document.to_string_lossy(), bytes, config.max_upload_bytes)?;
            let updates = agents.extract_fields(&doc).await?;
            let mut form = PromptForm::default();
            for update in &updates {
                if let Err(e) = form.apply(update) {
                    log::warn!("Skipped {:?}: {e}", update.field);
                }
            }
            println!("{}", serde_json::to_string_pretty(&form)?);
        }
    }

    Ok(())
}

fn agents() -> Result<(AppConfig, PromptAgents<GeminiClient>), labprompt::LabError> {
    let config = AppConfig::from_env()?;
    log::info!("Using model {}", config.model);
    let agents = PromptAgents::new(GeminiClient::new(&config)?);
    Ok((config, agents))
}

fn read_form(path: &Path) -> Result<PromptForm, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
