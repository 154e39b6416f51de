//! External services the controller consumes: authentication, purchases and
//! the card catalog.
//!
//! Each is an `async_trait` object so applications plug in their own backends
//! and tests plug in scripted ones. [`PassthroughAuth`] and [`LocalCardCatalog`]
//! cover offline play.

use async_trait::async_trait;
use bingo_core::CardGenerator;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::Card;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub session_credential: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub session_id: String,
    pub card_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub success: bool,
    /// Authoritative balance after the purchase, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRequest {
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub cards: Vec<Card>,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn authenticate(&self, request: AuthRequest) -> anyhow::Result<AuthResponse>;
}

#[async_trait]
pub trait PurchaseService: Send + Sync {
    async fn purchase(&self, request: PurchaseRequest) -> anyhow::Result<PurchaseResponse>;
}

#[async_trait]
pub trait CardCatalog: Send + Sync {
    async fn fetch(&self, request: CatalogRequest) -> anyhow::Result<CatalogResponse>;
}

/// Accepts any non-empty credential and uses it as the token.
#[derive(Debug, Clone)]
pub struct PassthroughAuth {
    pub balance: u64,
}

impl Default for PassthroughAuth {
    fn default() -> Self {
        Self { balance: 100 }
    }
}

#[async_trait]
impl AuthService for PassthroughAuth {
    async fn authenticate(&self, request: AuthRequest) -> anyhow::Result<AuthResponse> {
        let credential = request.session_credential.trim();
        if credential.is_empty() {
            return Ok(AuthResponse {
                success: false,
                token: String::new(),
                user: None,
            });
        }
        Ok(AuthResponse {
            success: true,
            token: credential.to_string(),
            user: Some(UserProfile {
                id: credential.to_string(),
                display_name: credential.to_string(),
                balance: self.balance,
            }),
        })
    }
}

/// Purchase service for clients without a payment backend; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflinePurchases;

#[async_trait]
impl PurchaseService for OfflinePurchases {
    async fn purchase(&self, request: PurchaseRequest) -> anyhow::Result<PurchaseResponse> {
        anyhow::bail!(
            "purchases are unavailable offline (session {}, {} cards)",
            request.session_id,
            request.card_ids.len()
        )
    }
}

/// Card catalog backed by a local [`CardGenerator`].
#[derive(Debug)]
pub struct LocalCardCatalog {
    generator: Mutex<CardGenerator>,
}

impl LocalCardCatalog {
    pub fn new(seed: u32) -> Self {
        Self::from_generator(CardGenerator::new(seed))
    }

    pub fn from_generator(generator: CardGenerator) -> Self {
        Self {
            generator: Mutex::new(generator),
        }
    }

    pub fn issued(&self) -> u64 {
        self.generator.lock().issued()
    }
}

#[async_trait]
impl CardCatalog for LocalCardCatalog {
    async fn fetch(&self, request: CatalogRequest) -> anyhow::Result<CatalogResponse> {
        let cards = self.generator.lock().generate_many(request.count);
        Ok(CatalogResponse { cards })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_catalog_issues_unique_ids() {
        let catalog = LocalCardCatalog::new(7);
        let first = catalog.fetch(CatalogRequest { count: 2 }).await.unwrap();
        let second = catalog.fetch(CatalogRequest { count: 1 }).await.unwrap();
        let ids: Vec<&str> = first
            .cards
            .iter()
            .chain(second.cards.iter())
            .map(|c| c.id())
            .collect();
        assert_eq!(ids, vec!["CARD_1", "CARD_2", "CARD_3"]);
        assert_eq!(catalog.issued(), 3);
    }

    #[tokio::test]
    async fn test_passthrough_auth() {
        let auth = PassthroughAuth::default();
        let ok = auth
            .authenticate(AuthRequest {
                session_credential: "ana".into(),
            })
            .await
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.user.unwrap().balance, 100);

        let denied = auth
            .authenticate(AuthRequest {
                session_credential: "  ".into(),
            })
            .await
            .unwrap();
        assert!(!denied.success);
    }

    #[tokio::test]
    async fn test_offline_purchases_fail() {
        let err = OfflinePurchases
            .purchase(PurchaseRequest {
                session_id: "s1".into(),
                card_ids: vec!["CARD_1".into()],
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unavailable offline"));
    }

    #[test]
    fn test_purchase_response_balance_is_optional() {
        let r: PurchaseResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(r.balance, None);
        let r: PurchaseResponse = serde_json::from_str(r#"{"success":true,"balance":55}"#).unwrap();
        assert_eq!(r.balance, Some(55));
    }
}
