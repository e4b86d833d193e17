//! Menu-driven mode used when no subcommand is given.

use std::path::PathBuf;

use bus_directory_cli_utils::MultiProgress;
use bus_directory_search::SearchParams;
use dialoguer::{Confirm, Input, Select};

use crate::commands;

/// Top-level actions in the interactive menu.
enum Action {
    Serve,
    Import,
    SearchTrip,
    SearchText,
    Check,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Serve,
        Self::Import,
        Self::SearchTrip,
        Self::SearchText,
        Self::Check,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Serve => "Start server",
            Self::Import => "Import buses from JSON",
            Self::SearchTrip => "Find buses for a trip",
            Self::SearchText => "Search buses by text",
            Self::Check => "Check store configuration",
        }
    }
}

/// Prompts for an action and runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected action fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Bus Directory");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Serve => crate::serve(true).await?,
        Action::Import => {
            let (config, repo) = commands::open_store().await?;
            let path: String = Input::new()
                .with_prompt("JSON file")
                .default("buses.json".to_string())
                .interact_text()?;
            let path = PathBuf::from(path);

            if Confirm::new()
                .with_prompt(format!("Import {} into the {} store?", path.display(), config.backend))
                .default(true)
                .interact()?
            {
                commands::import(multi, repo.as_ref(), &path).await?;
            } else {
                println!("Cancelled.");
            }
        }
        Action::SearchTrip => {
            let (_, repo) = commands::open_store().await?;
            let from: String = Input::new().with_prompt("From").interact_text()?;
            let to: String = Input::new().with_prompt("To").interact_text()?;
            let verified_only = Confirm::new()
                .with_prompt("Verified buses only?")
                .default(false)
                .interact()?;

            let params = SearchParams {
                directional: true,
                from: Some(from),
                to: Some(to),
                verified_only,
                ..SearchParams::default()
            };
            commands::search(repo.as_ref(), &params).await?;
        }
        Action::SearchText => {
            let (_, repo) = commands::open_store().await?;
            let query: String = Input::new()
                .with_prompt("Search")
                .allow_empty(true)
                .interact_text()?;

            let params = SearchParams {
                query: Some(query),
                ..SearchParams::default()
            };
            commands::search(repo.as_ref(), &params).await?;
        }
        Action::Check => {
            let (config, repo) = commands::open_store().await?;
            commands::check(&config, repo.as_ref()).await?;
        }
    }

    Ok(())
}
