//! SMS notice sent whenever a staff member signs in.

use crate::{
    config::SmsConfig,
    db::DbPool,
    entities::staff_user::{self, normalize_username},
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use metrics::counter;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::clock::Clock;

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers a text message to one phone number.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, to: &str, message: &str) -> Result<(), SmsError>;
}

/// Used when no gateway is configured. Messages are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSmsGateway;

#[async_trait]
impl SmsGateway for NoopSmsGateway {
    async fn send(&self, to: &str, _message: &str) -> Result<(), SmsError> {
        debug!(%to, "SMS gateway disabled, dropping message");
        Ok(())
    }
}

#[derive(Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    message: &'a str,
    sender: &'a str,
}

/// JSON-over-HTTP gateway authenticated with a bearer key.
#[derive(Clone)]
pub struct HttpSmsGateway {
    client: reqwest::Client,
    url: String,
    api_key: String,
    sender: String,
}

impl HttpSmsGateway {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        sender: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SmsError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
            api_key: api_key.into(),
            sender: sender.into(),
        })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    #[instrument(skip(self, message))]
    async fn send(&self, to: &str, message: &str) -> Result<(), SmsError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&SmsPayload {
                to,
                message,
                sender: &self.sender,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SmsError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Builds the gateway described by `cfg`, or a no-op one when disabled.
pub fn gateway_from_config(cfg: &SmsConfig) -> Result<Arc<dyn SmsGateway>, ServiceError> {
    let Some(url) = cfg.gateway_url.as_deref().filter(|_| cfg.is_enabled()) else {
        return Ok(Arc::new(NoopSmsGateway));
    };
    let gateway = HttpSmsGateway::new(
        url.trim(),
        cfg.api_key.clone().unwrap_or_default(),
        cfg.sender.clone(),
        Duration::from_secs(cfg.timeout_secs),
    )
    .map_err(|e| ServiceError::InternalError(format!("SMS client: {e}")))?;
    Ok(Arc::new(gateway))
}

pub fn login_message(username: &str, at: NaiveDateTime) -> String {
    format!(
        "Admin login detected:\nUser: {username}\nTime: {}",
        at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// What a login notice did, for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginNotice {
    pub message: String,
    pub recipients: Vec<String>,
    pub delivered: usize,
}

#[derive(Clone)]
pub struct LoginNotifier {
    db_pool: Arc<DbPool>,
    clock: Arc<dyn Clock>,
    gateway: Arc<dyn SmsGateway>,
    manager_phone: Option<String>,
}

impl LoginNotifier {
    pub fn new(
        db_pool: Arc<DbPool>,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn SmsGateway>,
        manager_phone: Option<String>,
    ) -> Self {
        Self {
            db_pool,
            clock,
            gateway,
            manager_phone: manager_phone.filter(|p| !p.trim().is_empty()),
        }
    }

    /// Texts the user and the manager. Delivery failures are logged only.
    #[instrument(skip(self))]
    pub async fn notify(&self, username: &str) -> Result<LoginNotice, ServiceError> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(ServiceError::ValidationError(
                "username must not be blank".into(),
            ));
        }

        let user = staff_user::Entity::find()
            .filter(staff_user::Column::Username.eq(username.as_str()))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        let destination = user
            .as_ref()
            .map(|u| u.sms_destination().to_string())
            .unwrap_or_else(|| username.clone());

        let message = login_message(&username, self.clock.now_local());
        let mut recipients = vec![destination];
        recipients.extend(self.manager_phone.clone());

        let mut delivered = 0;
        for to in &recipients {
            match self.gateway.send(to, &message).await {
                Ok(()) => {
                    delivered += 1;
                    counter!("forwarder.sms.sent", 1);
                }
                Err(err) => {
                    warn!(%to, error = %err, "login SMS not delivered");
                    counter!("forwarder.sms.failed", 1);
                }
            }
        }

        Ok(LoginNotice {
            message,
            recipients,
            delivered,
        })
    }
}
