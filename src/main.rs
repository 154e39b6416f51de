//! Headless BINGO client (default binary).
//!
//! Joins one session and logs draws, players and the result until the
//! session finishes, the connection gives up, or Ctrl-C.
//!
//! ```text
//! BINGO_TOKEN=ana RUST_LOG=info bingo-client <session-id>
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bingo_session::adapter::{
    Capabilities, ClientConfig, Collaborators, GameSessionController, LocalCardCatalog,
    OfflinePurchases, PassthroughAuth, SessionChannel,
};
use bingo_session::core::{CardGenerator, EventOutcome};
use bingo_session::types::call_label;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let session_id = std::env::args()
        .nth(1)
        .context("usage: bingo-client <session-id>")?;
    let token = std::env::var("BINGO_TOKEN").unwrap_or_else(|_| "guest".to_string());

    let config = ClientConfig::from_env();
    let cache_path = config.cache_path.clone();
    info!(server = %config.server_label(), %session_id, "starting");

    let channel = Arc::new(SessionChannel::new(config));
    let collaborators = Collaborators {
        auth: Arc::new(PassthroughAuth::default()),
        purchases: Arc::new(OfflinePurchases),
        catalog: Arc::new(LocalCardCatalog::from_generator(CardGenerator::default())),
    };
    let mut controller =
        GameSessionController::new(channel, collaborators, Capabilities::default());

    if let Some(path) = &cache_path {
        if controller.load_cache(path)? {
            info!(path = %path.display(), "restored local cache");
        }
    }

    controller.authenticate(&token).await?;
    controller.join(&session_id).await?;

    let result = run(&mut controller).await;

    controller.leave();
    if let Some(path) = &cache_path {
        controller.persist(path)?;
    }
    result
}

async fn run(controller: &mut GameSessionController) -> Result<()> {
    loop {
        let outcome = tokio::select! {
            outcome = controller.next_event() => outcome?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        };

        match outcome {
            EventOutcome::Baseline => {
                if let Some(state) = controller.session_state() {
                    info!(
                        status = ?state.status,
                        players = state.players.len(),
                        drawn = state.drawn_set.len(),
                        prize_pool = state.prize_pool,
                        "session snapshot"
                    );
                }
            }
            EventOutcome::Drawn(number) => {
                let drawn = controller
                    .session_state()
                    .map(|s| s.drawn_set.len())
                    .unwrap_or_default();
                info!(
                    call = %call_label(number).unwrap_or_default(),
                    drawn,
                    "number drawn"
                );
            }
            EventOutcome::PlayerJoined(id) => info!(player_id = %id, "player joined"),
            EventOutcome::PlayerLeft(id) => info!(player_id = %id, "player left"),
            EventOutcome::Chat(message) => {
                info!(sender = %message.sender, "{}", message.text)
            }
            EventOutcome::Finished(winner) => {
                info!(
                    player_id = %winner.player_id,
                    pattern = %winner.pattern,
                    prize = winner.prize,
                    "winner announced"
                );
                return Ok(());
            }
            EventOutcome::DuplicateDraw(_)
            | EventOutcome::InvalidDraw(_)
            | EventOutcome::UnknownPlayer(_)
            | EventOutcome::NoBaseline => {}
        }
    }
}
