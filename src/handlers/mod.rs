//! HTTP handlers and shared request plumbing.
//!
//! Identity arrives as `X-User-Id`/`X-User-Role` headers injected by the
//! upstream auth proxy; there is no local credential handling.

pub mod bookings;
pub mod cart;
pub mod payments;
pub mod pricing;
pub mod settlements;
pub mod sites;

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{
        bookings::BookingService,
        cart::CartService,
        freshness::{self, FreshnessScope, FreshnessService},
        payments::{PaymentGateway, PaymentService},
        reconciliation::ReconciliationService,
        settlements::SettlementService,
        sites::SiteService,
    },
    ApiResponse,
};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActorRole {
    Buyer,
    Vendor,
    Admin,
}

impl FromStr for ActorRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buyer" | "user" => Ok(Self::Buyer),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

/// Caller identity, extracted from proxy-injected headers.
#[derive(Copy, Clone, Debug)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Admin, or the given principal itself.
    pub fn can_act_for(&self, principal: Uuid) -> bool {
        self.is_admin() || self.id == principal
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("missing or malformed X-User-Id header".into())
            })?;
        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| ActorRole::from_str(v).ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("missing or malformed X-User-Role header".into())
            })?;
        Ok(Actor { id, role })
    }
}

/// Service bundle shared by all handlers.
#[derive(Clone)]
pub struct AppServices {
    pub payments: PaymentService,
    pub bookings: BookingService,
    pub cart: CartService,
    pub settlements: SettlementService,
    pub reconciliation: ReconciliationService,
    pub freshness: FreshnessService,
    pub sites: SiteService,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            payments: PaymentService::new(
                db.clone(),
                gateway,
                config.gateway.key_secret.clone(),
                config.gateway.currency.clone(),
                event_sender.clone(),
            ),
            bookings: BookingService::new(
                db.clone(),
                event_sender.clone(),
                config.cancellation_window_hours,
            ),
            cart: CartService::new(db.clone()),
            settlements: SettlementService::new(db.clone(), event_sender.clone()),
            reconciliation: ReconciliationService::new(db.clone(), event_sender),
            freshness: FreshnessService::new(db.clone()),
            sites: SiteService::new(db),
        }
    }
}

fn apply_cache_headers(headers: &mut HeaderMap, last: DateTime<Utc>) -> Result<(), ServiceError> {
    let last_modified = HeaderValue::from_str(&freshness::format_http_date(last))
        .map_err(|e| ServiceError::InternalError(format!("invalid header value: {}", e)))?;
    headers.insert(header::LAST_MODIFIED, last_modified);
    let cache_control = HeaderValue::from_str(&format!("max-age={}", freshness::CACHE_MAX_AGE_SECS))
        .map_err(|e| ServiceError::InternalError(format!("invalid header value: {}", e)))?;
    headers.insert(header::CACHE_CONTROL, cache_control);
    Ok(())
}

/// Runs a read behind `If-Modified-Since`: answers 304 without executing the
/// load when nothing in the scope changed since the client's stamp, otherwise
/// 200 with `Last-Modified` and `Cache-Control` set from the freshness index.
pub(crate) async fn conditional_json<T, F>(
    freshness: &FreshnessService,
    scope: FreshnessScope,
    headers: &HeaderMap,
    load: F,
) -> Result<Response, ServiceError>
where
    T: Serialize,
    F: Future<Output = Result<T, ServiceError>>,
{
    let last = freshness.max_mutated_at(scope).await?;
    let client_stamp = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(freshness::parse_http_date);

    if let (Some(last), Some(since)) = (last, client_stamp) {
        if freshness::is_not_modified(last, since) {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            apply_cache_headers(response.headers_mut(), last)?;
            return Ok(response);
        }
    }

    let data = load.await?;
    let mut response = Json(ApiResponse::success(data)).into_response();
    if let Some(last) = last {
        apply_cache_headers(response.headers_mut(), last)?;
    }
    Ok(response)
}
