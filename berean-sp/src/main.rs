//! berean-sp - Sermon Processing service
//!
//! Runs one processing pass: loads sermons with a pending track and
//! drives each through transcription and study guide generation against
//! the configured remote services.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use berean_common::events::EventBus;
use berean_sp::config::SpConfig;
use berean_sp::services::{
    SermonProcessor, StudyGuideClient, TranscriptionClient, VerificationEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting berean-sp (Sermon Processing)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve root folder and configuration
    let root_folder =
        berean_common::config::resolve_root_folder(None, "BEREAN_ROOT_FOLDER", Some("root_folder"))?;
    berean_common::config::ensure_root_folder(&root_folder)?;
    let config = SpConfig::load(Some(&root_folder.join("berean-sp.toml")))?;

    // Open or create the local database
    let db_path = berean_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db_pool = berean_sp::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Open the bundled verse database read-only
    let bible_path = root_folder.join("BibleData.sqlite");
    let bible = berean_sp::db::bible::BibleDatabase::open(&bible_path).await?;
    info!("Verse database: {}", bible_path.display());

    // Event bus for progress broadcasting
    let event_bus = EventBus::new(1000);

    // Remote job clients
    let transcriber = Arc::new(TranscriptionClient::new(
        config.transcription_url.clone(),
        config.poll_interval(),
    )?);
    let generator = Arc::new(StudyGuideClient::new(
        config.generation_url.clone(),
        config.poll_interval(),
    )?);
    let verifier = VerificationEngine::new(Arc::new(bible));

    let processor = SermonProcessor::new(
        db_pool.clone(),
        event_bus,
        transcriber,
        generator,
        verifier,
        config.job_timeout(),
        config.anchor_similarity_threshold,
    );

    // One processing pass over all pending sermons
    let pending = berean_sp::db::sermons::load_pending_sermons(&db_pool).await?;
    info!(count = pending.len(), "Pending sermons loaded");

    let cancel_token = CancellationToken::new();
    for sermon in pending {
        match processor.process_sermon(sermon.id, &cancel_token).await {
            Ok(processed) => info!(
                sermon_id = %processed.id,
                transcription = ?processed.transcription_status,
                study_guide = ?processed.study_guide_status,
                complete = processed.is_complete(),
                "Sermon processed"
            ),
            Err(e) => warn!(sermon_id = %sermon.id, error = %e, "Sermon processing error"),
        }
    }

    Ok(())
}
