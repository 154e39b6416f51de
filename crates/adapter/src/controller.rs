//! Game session controller - the single owner of a player's session state
//!
//! The controller ties the pure core to the network: local rules (selection,
//! pricing, card validation) run synchronously and reject before anything is
//! sent; session intents go through the shared [`SessionChannel`]; inbound
//! events are folded into a [`SessionStore`] and every owned card is
//! re-evaluated whenever the drawn set changes.
//!
//! All mutating methods take `&mut self`, so selection and session state have
//! exactly one writer.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

use bingo_core::{
    price_for, validate_card, CardView, EventOutcome, PriceQuote, SelectionManager,
    SessionState, SessionStore,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::LocalCache;
use crate::channel::{ChannelStatus, InboundEvent, SessionChannel, Subscription};
use crate::collaborators::{
    AuthRequest, AuthService, CardCatalog, CatalogRequest, PurchaseRequest, PurchaseService,
    UserProfile,
};
use crate::error::{ChannelError, SessionError};
use crate::protocol::{EventTag, Intent};
use crate::types::{Card, ChatMessage, CHAT_LOG_LIMIT};

/// Platform features available to the host application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub haptics: bool,
}

/// Tactile cue for the host to play. Only produced when haptics are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Selection,
    Purchase,
    /// A drawn number is on one of the player's cards.
    Match,
    Win,
}

/// External services used by the controller.
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn AuthService>,
    pub purchases: Arc<dyn PurchaseService>,
    pub catalog: Arc<dyn CardCatalog>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub session_id: String,
    pub card_ids: Vec<String>,
    pub quote: PriceQuote,
    pub balance: u64,
}

/// Read-only view of everything a renderer needs.
#[derive(Debug, Clone)]
pub struct ControllerSnapshot {
    pub session_id: Option<String>,
    pub session: Option<SessionState>,
    pub cards: Vec<CardView>,
    pub selection: Vec<Card>,
    pub price: PriceQuote,
    pub user: Option<UserProfile>,
    pub balance: u64,
    pub channel: ChannelStatus,
    pub chat: Vec<ChatMessage>,
    pub last_feedback: Option<Feedback>,
}

struct ActiveSession {
    id: String,
    store: SessionStore,
    subscription: Subscription,
    /// Connection epoch the join was sent on.
    epoch: Option<u64>,
}

enum Step {
    Event(Option<InboundEvent>),
    StatusChanged(bool),
}

pub struct GameSessionController {
    channel: Arc<SessionChannel>,
    collaborators: Collaborators,
    capabilities: Capabilities,
    status_rx: watch::Receiver<ChannelStatus>,
    token: Option<String>,
    user: Option<UserProfile>,
    balance: u64,
    selection: SelectionManager,
    owned: BTreeMap<String, Vec<Card>>,
    session: Option<ActiveSession>,
    games: Vec<String>,
    chat: VecDeque<ChatMessage>,
    views: Vec<CardView>,
    last_feedback: Option<Feedback>,
}

impl GameSessionController {
    pub fn new(
        channel: Arc<SessionChannel>,
        collaborators: Collaborators,
        capabilities: Capabilities,
    ) -> Self {
        let status_rx = channel.watch_status();
        Self {
            channel,
            collaborators,
            capabilities,
            status_rx,
            token: None,
            user: None,
            balance: 0,
            selection: SelectionManager::new(),
            owned: BTreeMap::new(),
            session: None,
            games: Vec::new(),
            chat: VecDeque::new(),
            views: Vec::new(),
            last_feedback: None,
        }
    }

    // ============== Identity ==============

    pub async fn authenticate(&mut self, credential: &str) -> Result<UserProfile, SessionError> {
        let response = self
            .collaborators
            .auth
            .authenticate(AuthRequest {
                session_credential: credential.to_string(),
            })
            .await
            .map_err(|e| SessionError::AuthFailed(e.to_string()))?;

        if !response.success || response.token.is_empty() {
            return Err(SessionError::AuthFailed("credential rejected".to_string()));
        }
        let user = response
            .user
            .ok_or_else(|| SessionError::AuthFailed("no user profile returned".to_string()))?;

        info!(user_id = %user.id, balance = user.balance, "authenticated");
        self.token = Some(response.token);
        self.balance = user.balance;
        self.user = Some(user.clone());
        Ok(user)
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    // ============== Session Lifecycle ==============

    /// Join a session. Connects first if needed; the server's snapshot
    /// arrives as the first event.
    ///
    /// Joining the current session again reconnects a channel that has given
    /// up or been disconnected.
    pub async fn join(&mut self, session_id: &str) -> Result<(), SessionError> {
        let token = self.token.clone().ok_or(SessionError::NotAuthenticated)?;
        if self.session.as_ref().is_some_and(|s| s.id == session_id) {
            return self.reconnect(token).await;
        }
        if self.session.is_some() {
            self.leave();
        }

        self.channel.connect(token)?;
        self.channel.wait_connected().await?;

        // Subscribe before sending so the snapshot cannot be missed.
        let subscription = self.channel.subscribe(&EventTag::ALL);
        self.channel.send(Intent::Join {
            session_id: session_id.to_string(),
        })?;

        let epoch = match *self.status_rx.borrow_and_update() {
            ChannelStatus::Connected { epoch } => Some(epoch),
            _ => None,
        };
        self.session = Some(ActiveSession {
            id: session_id.to_string(),
            store: SessionStore::new(),
            subscription,
            epoch,
        });
        if !self.games.iter().any(|g| g == session_id) {
            self.games.push(session_id.to_string());
        }
        self.chat.clear();
        self.views.clear();
        info!(session_id, "joined session");
        Ok(())
    }

    /// Reconnect a stopped channel for the current session and re-join it.
    /// Nothing to do while the channel is connecting or connected.
    async fn reconnect(&mut self, token: String) -> Result<(), SessionError> {
        let live = matches!(
            self.channel.status(),
            ChannelStatus::Connecting { .. } | ChannelStatus::Connected { .. }
        );
        if live {
            return Ok(());
        }

        info!(session_id = self.session_id().unwrap_or_default(), "reconnecting");
        self.channel.connect(token)?;
        self.channel.wait_connected().await?;
        if let Some(session) = self.session.as_mut() {
            session.epoch = None;
        }
        // Sends `join` on the new connection; the snapshot follows.
        self.sync_connection()
    }

    /// Leave the current session. Local state is discarded even if the
    /// `leave` intent cannot be sent.
    pub fn leave(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = self.channel.send(Intent::Leave {
                session_id: session.id.clone(),
            }) {
                debug!(session_id = %session.id, error = %e, "leave not delivered");
            }
            info!(session_id = %session.id, "left session");
        }
        self.channel.disconnect();
        self.views.clear();
        self.chat.clear();
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    pub fn session_state(&self) -> Option<&SessionState> {
        self.session.as_ref().and_then(|s| s.store.state())
    }

    /// Session ids joined so far, oldest first.
    pub fn games(&self) -> &[String] {
        &self.games
    }

    // ============== Inbound Events ==============

    /// Apply every event already received, without waiting.
    pub fn process_events(&mut self) -> Result<Vec<EventOutcome>, SessionError> {
        self.sync_connection()?;
        let mut outcomes = Vec::new();
        loop {
            let Some(session) = self.session.as_mut() else {
                break;
            };
            let Some(event) = session.subscription.try_recv() else {
                break;
            };
            outcomes.push(self.apply(event));
        }
        Ok(outcomes)
    }

    /// Wait for the next event and apply it.
    ///
    /// Rejoins the session after a reconnect; fails once the channel gives up.
    pub async fn next_event(&mut self) -> Result<EventOutcome, SessionError> {
        loop {
            self.sync_connection()?;
            let session = self.session.as_mut().ok_or(SessionError::NotInSession)?;

            let step = tokio::select! {
                event = session.subscription.recv() => Step::Event(event),
                changed = self.status_rx.changed() => Step::StatusChanged(changed.is_ok()),
            };

            match step {
                Step::Event(Some(event)) => return Ok(self.apply(event)),
                Step::Event(None) | Step::StatusChanged(false) => {
                    return Err(ChannelError::Closed.into())
                }
                Step::StatusChanged(true) => continue,
            }
        }
    }

    fn sync_connection(&mut self) -> Result<(), SessionError> {
        let status = self.status_rx.borrow_and_update().clone();
        match status {
            ChannelStatus::Exhausted { attempts } => {
                Err(ChannelError::ConnectionExhausted { attempts }.into())
            }
            ChannelStatus::Rejected { code, message } => {
                Err(ChannelError::Rejected { code, message }.into())
            }
            ChannelStatus::Disconnected if self.session.is_some() => {
                Err(ChannelError::NotConnected.into())
            }
            ChannelStatus::Connected { epoch } => {
                let Some(session) = self.session.as_mut() else {
                    return Ok(());
                };
                if session.epoch != Some(epoch) {
                    // The server sends a fresh snapshot on re-join.
                    info!(session_id = %session.id, epoch, "rejoining after reconnect");
                    session.epoch = Some(epoch);
                    self.channel.send(Intent::Join {
                        session_id: session.id.clone(),
                    })?;
                }
                Ok(())
            }
            ChannelStatus::Disconnected | ChannelStatus::Connecting { .. } => Ok(()),
        }
    }

    fn apply(&mut self, inbound: InboundEvent) -> EventOutcome {
        let Some(session) = self.session.as_mut() else {
            return EventOutcome::NoBaseline;
        };
        let outcome = session.store.apply(inbound.event);

        match &outcome {
            EventOutcome::Baseline => debug!(seq = inbound.seq, "session snapshot applied"),
            EventOutcome::Drawn(number) => {
                debug!(number, "number drawn");
                let session_id = session.id.clone();
                let matched = self
                    .owned
                    .get(&session_id)
                    .is_some_and(|cards| cards.iter().any(|c| c.contains(*number)));
                if matched {
                    self.cue(Feedback::Match);
                }
            }
            EventOutcome::DuplicateDraw(number) => warn!(number, "ignoring duplicate draw"),
            EventOutcome::InvalidDraw(number) => warn!(number, "ignoring out-of-range draw"),
            EventOutcome::PlayerJoined(id) => debug!(player_id = %id, "player joined"),
            EventOutcome::PlayerLeft(id) => debug!(player_id = %id, "player left"),
            EventOutcome::UnknownPlayer(id) => debug!(player_id = %id, "unknown player left"),
            EventOutcome::Finished(winner) => {
                info!(player_id = %winner.player_id, pattern = %winner.pattern, prize = winner.prize, "session finished");
                if self.user.as_ref().is_some_and(|u| u.id == winner.player_id) {
                    self.cue(Feedback::Win);
                }
            }
            EventOutcome::Chat(message) => {
                if self.chat.len() == CHAT_LOG_LIMIT {
                    self.chat.pop_front();
                }
                self.chat.push_back(message.clone());
            }
            EventOutcome::NoBaseline => debug!(seq = inbound.seq, "event before snapshot dropped"),
        }

        if outcome.affects_draws() {
            self.refresh_views();
        }
        outcome
    }

    /// Re-evaluate every owned card of the current session.
    fn refresh_views(&mut self) {
        let Some(session) = self.session.as_ref() else {
            self.views.clear();
            return;
        };
        let Some(state) = session.store.state() else {
            self.views.clear();
            return;
        };
        let cards = self.owned.get(&session.id).map(Vec::as_slice).unwrap_or(&[]);

        let views: Vec<CardView> = cards
            .iter()
            .map(|card| CardView::evaluate(card, &state.drawn_set))
            .collect();

        let mut completed = false;
        for view in views.iter().filter(|v| v.has_won()) {
            let before = self.views.iter().find(|v| v.card.id() == view.card.id());
            let newly: Vec<String> = match before {
                Some(prev) => view.wins.newly_completed(&prev.wins).map(|t| t.to_string()).collect(),
                None => view.wins.patterns().iter().map(|t| t.to_string()).collect(),
            };
            if !newly.is_empty() {
                info!(card_id = view.card.id(), patterns = ?newly, "card completed a line");
                completed = true;
            }
        }

        self.views = views;
        if completed {
            self.cue(Feedback::Win);
        }
    }

    // ============== Selection & Purchase ==============

    pub fn select_card(&mut self, card: Card) -> Result<PriceQuote, SessionError> {
        validate_card(&card)?;
        let quote = self.selection.select(card)?;
        self.cue(Feedback::Selection);
        Ok(quote)
    }

    pub fn deselect_card(&mut self, card_id: &str) -> PriceQuote {
        self.selection.deselect(card_id)
    }

    pub fn clear_selection(&mut self) -> PriceQuote {
        self.selection.clear()
    }

    /// Fetch `count` fresh cards from the catalog and select them in order.
    ///
    /// Stops at the first card that cannot be selected; earlier cards stay
    /// selected and the error reports how many made it.
    pub async fn quick_select(&mut self, count: usize) -> Result<PriceQuote, SessionError> {
        if count == 0 {
            return Ok(self.selection.quote());
        }

        let response = self
            .collaborators
            .catalog
            .fetch(CatalogRequest { count })
            .await
            .map_err(|e| SessionError::Catalog(e.to_string()))?;
        if response.cards.len() != count {
            warn!(requested = count, received = response.cards.len(), "catalog returned a different number of cards");
        }
        for card in &response.cards {
            validate_card(card)?;
        }

        let quote = self.selection.select_all(response.cards)?;
        self.cue(Feedback::Selection);
        Ok(quote)
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    /// Buy the selected cards for `session_id`.
    ///
    /// Empty selection and insufficient balance are rejected locally. On
    /// success the cards become owned and the selection is cleared; on
    /// failure the selection is left untouched.
    pub async fn purchase(&mut self, session_id: &str) -> Result<PurchaseReceipt, SessionError> {
        if self.selection.is_empty() {
            return Err(SessionError::EmptySelection);
        }
        let quote = price_for(self.selection.len())?;
        let required = u64::from(quote.total_price);
        if self.balance < required {
            return Err(SessionError::InsufficientBalance {
                balance: self.balance,
                required,
            });
        }

        let card_ids = self.selection.card_ids();
        let response = self
            .collaborators
            .purchases
            .purchase(PurchaseRequest {
                session_id: session_id.to_string(),
                card_ids: card_ids.clone(),
            })
            .await
            .map_err(|e| {
                warn!(session_id, error = %e, "purchase failed");
                SessionError::PurchaseFailed(e.to_string())
            })?;
        if !response.success {
            warn!(session_id, "purchase declined");
            return Err(SessionError::PurchaseFailed(
                "declined by purchase service".to_string(),
            ));
        }

        self.balance = response
            .balance
            .unwrap_or_else(|| self.balance.saturating_sub(required));
        if let Some(user) = self.user.as_mut() {
            user.balance = self.balance;
        }

        let cards = self.selection.take_all();
        self.owned
            .entry(session_id.to_string())
            .or_default()
            .extend(cards);
        info!(
            session_id,
            cards = card_ids.len(),
            price = required,
            balance = self.balance,
            "purchase complete"
        );

        if self.session_id() == Some(session_id) {
            self.refresh_views();
        }
        self.cue(Feedback::Purchase);

        Ok(PurchaseReceipt {
            session_id: session_id.to_string(),
            card_ids,
            quote,
            balance: self.balance,
        })
    }

    /// Cards bought for a session.
    pub fn owned_cards(&self, session_id: &str) -> &[Card] {
        self.owned.get(session_id).map(Vec::as_slice).unwrap_or(&[])
    }

    // ============== Outbound Intents ==============

    pub fn draw_number(&self) -> Result<(), SessionError> {
        let session_id = self.require_session()?;
        self.channel.send(Intent::DrawNumber { session_id })?;
        Ok(())
    }

    pub fn send_chat(&self, message: &str) -> Result<(), SessionError> {
        let session_id = self.require_session()?;
        self.channel.send(Intent::Chat {
            session_id,
            message: message.to_string(),
        })?;
        Ok(())
    }

    /// Tell the server the player marked `number` on an owned card.
    pub fn mark_number(&self, card_id: &str, number: u8) -> Result<(), SessionError> {
        let session_id = self.require_session()?;
        if !self.owned_cards(&session_id).iter().any(|c| c.id() == card_id) {
            return Err(SessionError::UnknownCard(card_id.to_string()));
        }
        self.channel.send(Intent::MarkNumber {
            session_id,
            card_id: card_id.to_string(),
            number,
        })?;
        Ok(())
    }

    fn require_session(&self) -> Result<String, SessionError> {
        self.session_id()
            .map(str::to_string)
            .ok_or(SessionError::NotInSession)
    }

    // ============== Snapshot & Feedback ==============

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            session_id: self.session_id().map(str::to_string),
            session: self.session_state().cloned(),
            cards: self.views.clone(),
            selection: self.selection.cards().to_vec(),
            price: self.selection.quote(),
            user: self.user.clone(),
            balance: self.balance,
            channel: self.channel.status(),
            chat: self.chat.iter().cloned().collect(),
            last_feedback: self.last_feedback,
        }
    }

    pub fn chat(&self) -> impl Iterator<Item = &ChatMessage> {
        self.chat.iter()
    }

    /// Take the pending feedback cue, if any.
    pub fn take_feedback(&mut self) -> Option<Feedback> {
        self.last_feedback.take()
    }

    fn cue(&mut self, feedback: Feedback) {
        if self.capabilities.haptics {
            self.last_feedback = Some(feedback);
        }
    }

    // ============== Local Cache ==============

    pub fn to_cache(&self) -> LocalCache {
        LocalCache {
            user: self.user.clone(),
            balance: self.balance,
            selected_cards: self.selection.cards().to_vec(),
            games: self.games.clone(),
        }
    }

    /// Replace profile, balance, selection and game list with cached values.
    pub fn restore(&mut self, cache: LocalCache) -> Result<(), SessionError> {
        for card in &cache.selected_cards {
            validate_card(card)?;
        }
        let mut selection = SelectionManager::new();
        selection.select_all(cache.selected_cards)?;

        self.selection = selection;
        self.user = cache.user;
        self.balance = cache.balance;
        self.games = cache.games;
        Ok(())
    }

    /// Restore from `path` if it exists. Returns whether anything was loaded.
    pub fn load_cache(&mut self, path: &Path) -> Result<bool, SessionError> {
        match LocalCache::load(path).map_err(|e| SessionError::Cache(format!("{:#}", e)))? {
            Some(cache) => {
                self.restore(cache)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn persist(&self, path: &Path) -> Result<(), SessionError> {
        self.to_cache()
            .save(path)
            .map_err(|e| SessionError::Cache(format!("{:#}", e)))
    }
}

impl Drop for GameSessionController {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.leave();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        CatalogResponse, LocalCardCatalog, PassthroughAuth, PurchaseResponse,
    };
    use crate::config::ClientConfig;
    use async_trait::async_trait;
    use bingo_core::{CardGenerator, SelectionError};
    use bingo_types::Cell;
    use parking_lot::Mutex;

    struct ScriptedPurchases {
        response: Mutex<Option<anyhow::Result<PurchaseResponse>>>,
        calls: Mutex<Vec<PurchaseRequest>>,
    }

    impl ScriptedPurchases {
        fn new(response: anyhow::Result<PurchaseResponse>) -> Arc<Self> {
            Arc::new(Self {
                response: Mutex::new(Some(response)),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PurchaseService for ScriptedPurchases {
        async fn purchase(&self, request: PurchaseRequest) -> anyhow::Result<PurchaseResponse> {
            self.calls.lock().push(request);
            self.response
                .lock()
                .take()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response")))
        }
    }

    struct FixedCatalog(Vec<Card>);

    #[async_trait]
    impl CardCatalog for FixedCatalog {
        async fn fetch(&self, _request: CatalogRequest) -> anyhow::Result<CatalogResponse> {
            Ok(CatalogResponse {
                cards: self.0.clone(),
            })
        }
    }

    fn controller(
        purchases: Arc<dyn PurchaseService>,
        catalog: Arc<dyn CardCatalog>,
    ) -> GameSessionController {
        GameSessionController::new(
            Arc::new(SessionChannel::new(ClientConfig::default())),
            Collaborators {
                auth: Arc::new(PassthroughAuth::default()),
                purchases,
                catalog,
            },
            Capabilities { haptics: true },
        )
    }

    fn ok_purchase(balance: Option<u64>) -> Arc<ScriptedPurchases> {
        ScriptedPurchases::new(Ok(PurchaseResponse {
            success: true,
            balance,
        }))
    }

    #[tokio::test]
    async fn test_purchase_moves_selection_to_owned() {
        let purchases = ok_purchase(None);
        let mut ctl = controller(purchases.clone(), Arc::new(LocalCardCatalog::new(1)));
        ctl.authenticate("ana").await.unwrap();
        ctl.quick_select(3).await.unwrap();

        let receipt = ctl.purchase("s1").await.unwrap();
        assert_eq!(receipt.quote.total_price, 27);
        assert_eq!(receipt.balance, 73);
        assert_eq!(ctl.balance(), 73);
        assert!(ctl.selection().is_empty());
        assert_eq!(ctl.owned_cards("s1").len(), 3);
        assert_eq!(purchases.calls.lock()[0].card_ids, receipt.card_ids);
        assert_eq!(ctl.take_feedback(), Some(Feedback::Purchase));
    }

    #[tokio::test]
    async fn test_purchase_trusts_reported_balance() {
        let mut ctl = controller(ok_purchase(Some(500)), Arc::new(LocalCardCatalog::new(1)));
        ctl.authenticate("ana").await.unwrap();
        ctl.quick_select(1).await.unwrap();
        ctl.purchase("s1").await.unwrap();
        assert_eq!(ctl.balance(), 500);
        assert_eq!(ctl.user().unwrap().balance, 500);
    }

    #[tokio::test]
    async fn test_insufficient_balance_never_calls_service() {
        let purchases = ok_purchase(None);
        let mut ctl = controller(purchases.clone(), Arc::new(LocalCardCatalog::new(1)));
        ctl.quick_select(2).await.unwrap();

        let err = ctl.purchase("s1").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InsufficientBalance {
                balance: 0,
                required: 20
            }
        ));
        assert!(err.is_local_rejection());
        assert!(purchases.calls.lock().is_empty());
        assert_eq!(ctl.selection().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_purchase_keeps_selection() {
        let purchases = ScriptedPurchases::new(Err(anyhow::anyhow!("card declined")));
        let mut ctl = controller(purchases, Arc::new(LocalCardCatalog::new(1)));
        ctl.authenticate("ana").await.unwrap();
        ctl.quick_select(5).await.unwrap();

        let err = ctl.purchase("s1").await.unwrap_err();
        assert!(matches!(err, SessionError::PurchaseFailed(_)));
        assert_eq!(ctl.selection().len(), 5);
        assert_eq!(ctl.balance(), 100);
        assert!(ctl.owned_cards("s1").is_empty());
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected() {
        let mut ctl = controller(ok_purchase(None), Arc::new(LocalCardCatalog::new(1)));
        assert!(matches!(
            ctl.purchase("s1").await,
            Err(SessionError::EmptySelection)
        ));
    }

    #[tokio::test]
    async fn test_quick_select_reports_partial_selection() {
        let mut ctl = controller(ok_purchase(None), Arc::new(LocalCardCatalog::new(1)));
        ctl.quick_select(18).await.unwrap();

        let err = ctl.quick_select(4).await.unwrap_err();
        match err {
            SessionError::Selection(SelectionError::PartialSelection {
                selected,
                requested,
                ..
            }) => {
                assert_eq!((selected, requested), (2, 4));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(ctl.selection().len(), 20);
    }

    #[tokio::test]
    async fn test_quick_select_rejects_invalid_catalog_cards() {
        let mut cards = CardGenerator::new(4).generate_many(2);
        let mut grid = *cards[1].numbers();
        grid[0][0] = Cell::Number(70);
        cards[1] = Card::new(cards[1].id(), grid);

        let mut ctl = controller(ok_purchase(None), Arc::new(FixedCatalog(cards)));
        let err = ctl.quick_select(2).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidCard(_)));
        assert!(ctl.selection().is_empty());
    }

    #[tokio::test]
    async fn test_intents_require_session() {
        let ctl = controller(ok_purchase(None), Arc::new(LocalCardCatalog::new(1)));
        assert!(matches!(ctl.draw_number(), Err(SessionError::NotInSession)));
        assert!(matches!(ctl.send_chat("hi"), Err(SessionError::NotInSession)));
        assert!(matches!(
            ctl.mark_number("CARD_1", 5),
            Err(SessionError::NotInSession)
        ));
    }

    #[tokio::test]
    async fn test_join_requires_authentication() {
        let mut ctl = controller(ok_purchase(None), Arc::new(LocalCardCatalog::new(1)));
        assert!(matches!(
            ctl.join("s1").await,
            Err(SessionError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_cache_round_trip_through_controller() {
        let mut ctl = controller(ok_purchase(None), Arc::new(LocalCardCatalog::new(1)));
        ctl.authenticate("ana").await.unwrap();
        ctl.quick_select(4).await.unwrap();
        let cache = ctl.to_cache();

        let mut restored = controller(ok_purchase(None), Arc::new(LocalCardCatalog::new(2)));
        restored.restore(cache.clone()).unwrap();
        assert_eq!(restored.selection().card_ids(), ctl.selection().card_ids());
        assert_eq!(restored.balance(), 100);
        assert_eq!(restored.to_cache(), cache);
    }
}
