use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use weav_application::{GenerationOrchestrator, PreferenceStore, SessionDirectory};
use weav_core::session::SessionKind;
use weav_infrastructure::FilePreferenceStorage;
use weav_interaction::{ApiConfig, HttpApi};

mod commands;

#[derive(Parser)]
#[command(name = "weav")]
#[command(about = "weav - creative assistant client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// List the available chat and image models
    Models,
    /// Send a chat prompt to a session and wait for the reply
    Chat {
        session_id: i64,
        prompt: String,
        /// Model to use; remembered for the session
        #[arg(long)]
        model: Option<String>,
    },
    /// Generate images in a session and wait for the result
    Image {
        session_id: i64,
        prompt: String,
        /// Model to use; remembered for the session
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        aspect_ratio: Option<String>,
        #[arg(long)]
        count: Option<u32>,
        #[arg(long)]
        resolution: Option<String>,
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        seed: Option<i64>,
        /// Reference a prior image record by id
        #[arg(long, conflicts_with = "reference_url")]
        reference_id: Option<i64>,
        /// Reference an uploaded image by URL
        #[arg(long)]
        reference_url: Option<String>,
    },
    /// Resubmit the last exchange of a session
    Regenerate {
        #[command(subcommand)]
        action: RegenerateAction,
    },
    /// Upload a reference image and print its URL
    UploadReference { file: PathBuf },
}

#[derive(Subcommand)]
enum SessionAction {
    /// List sessions, newest first
    List {
        #[arg(long)]
        kind: Option<SessionKind>,
    },
    /// Create a session
    Create {
        kind: SessionKind,
        #[arg(long)]
        title: Option<String>,
    },
    /// Rename a session
    Rename { session_id: i64, title: String },
    /// Delete a session
    Delete { session_id: i64 },
    /// Show a session with its messages or images
    Show { session_id: i64 },
}

#[derive(Subcommand)]
enum RegenerateAction {
    /// Regenerate the last chat reply, optionally with an edited prompt
    Chat {
        session_id: i64,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Regenerate the most recent image with adjusted options
    Image {
        session_id: i64,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        aspect_ratio: Option<String>,
        #[arg(long)]
        resolution: Option<String>,
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        seed: Option<i64>,
    },
}

/// The assembled client stack.
pub struct App {
    pub directory: Arc<SessionDirectory>,
    pub preferences: Arc<PreferenceStore>,
    pub orchestrator: GenerationOrchestrator,
    pub api: Arc<HttpApi>,
}

impl App {
    fn new(config: &ApiConfig) -> Result<Self> {
        let api = Arc::new(HttpApi::new(config)?);
        let storage = Arc::new(FilePreferenceStorage::at_default_location()?);
        let directory = Arc::new(SessionDirectory::new(api.clone()));
        let preferences = Arc::new(PreferenceStore::new(storage));
        let orchestrator =
            GenerationOrchestrator::new(api.clone(), directory.clone(), preferences.clone());
        Ok(Self {
            directory,
            preferences,
            orchestrator,
            api,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::new(&ApiConfig::from_env())?;

    match cli.command {
        Commands::Sessions { action } => match action {
            SessionAction::List { kind } => commands::sessions::list(&app, kind).await?,
            SessionAction::Create { kind, title } => {
                commands::sessions::create(&app, kind, title).await?
            }
            SessionAction::Rename { session_id, title } => {
                commands::sessions::rename(&app, session_id, &title).await?
            }
            SessionAction::Delete { session_id } => {
                commands::sessions::delete(&app, session_id).await?
            }
            SessionAction::Show { session_id } => commands::sessions::show(&app, session_id).await?,
        },
        Commands::Models => commands::models::list(),
        Commands::Chat {
            session_id,
            prompt,
            model,
        } => commands::generate::chat(&app, session_id, &prompt, model).await?,
        Commands::Image {
            session_id,
            prompt,
            model,
            aspect_ratio,
            count,
            resolution,
            format,
            seed,
            reference_id,
            reference_url,
        } => {
            commands::generate::image(
                &app,
                session_id,
                &prompt,
                model,
                commands::generate::ImageArgs {
                    aspect_ratio,
                    count,
                    resolution,
                    format,
                    seed,
                    reference_id,
                    reference_url,
                },
            )
            .await?
        }
        Commands::Regenerate { action } => match action {
            RegenerateAction::Chat {
                session_id,
                prompt,
                model,
            } => commands::generate::regenerate_chat(&app, session_id, prompt, model).await?,
            RegenerateAction::Image {
                session_id,
                prompt,
                aspect_ratio,
                resolution,
                format,
                seed,
            } => {
                commands::generate::regenerate_image(
                    &app,
                    session_id,
                    prompt,
                    commands::generate::ImageArgs {
                        aspect_ratio,
                        resolution,
                        format,
                        seed,
                        ..Default::default()
                    },
                )
                .await?
            }
        },
        Commands::UploadReference { file } => commands::generate::upload_reference(&app, &file).await?,
    }

    Ok(())
}
