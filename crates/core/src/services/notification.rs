//! Notification dispatcher.
//!
//! A notification row is written as `pending` inside the caller's unit of
//! work. After commit, delivery is attempted once on its channel and the row
//! moves to `sent` or `failed`. Dispatch never fails the caller.

use admissions_common::{AppError, AppResult, IdGenerator};
use admissions_db::{
    entities::notification::{self, NotificationChannel, NotificationStatus},
    repositories::{NotificationRepository, UserRepository},
};
use chrono::Utc;
use sea_orm::{Set, TransactionTrait};
use serde::Serialize;
use serde_json::json;

use super::{email::EmailService, sms::SmsService};

/// Default page size for a user's notification list.
const DEFAULT_LIST_LIMIT: u64 = 50;

/// A notification to dispatch.
#[derive(Debug, Clone)]
pub struct OutboundNotification {
    pub user_id: String,
    pub channel: NotificationChannel,
    pub title: String,
    pub message: String,
    pub related_to: Option<String>,
}

/// Outcome of a dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    /// Stored notification, if the row could be written.
    pub notification_id: Option<String>,
    pub status: NotificationStatus,
    pub error: Option<String>,
}

impl DeliveryResult {
    /// Whether the notification reached its channel.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.status == NotificationStatus::Sent
    }
}

/// Notification service.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    user_repo: UserRepository,
    email: EmailService,
    sms: SmsService,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(
        notification_repo: NotificationRepository,
        user_repo: UserRepository,
        email: EmailService,
        sms: SmsService,
    ) -> Self {
        Self {
            notification_repo,
            user_repo,
            email,
            sms,
            id_gen: IdGenerator::new(),
        }
    }

    /// Store `outbound` as a `pending` row on `conn`, typically the caller's
    /// open transaction.
    ///
    /// The row is written inside a savepoint so a failed insert leaves the
    /// caller's transaction usable. Delivery happens in [`Self::dispatch`]
    /// once the caller has committed.
    pub async fn enqueue<C: TransactionTrait>(
        &self,
        conn: &C,
        outbound: &OutboundNotification,
    ) -> Option<notification::Model> {
        match self.try_enqueue(conn, outbound).await {
            Ok(pending) => Some(pending),
            Err(e) => {
                tracing::error!(user_id = %outbound.user_id, error = %e, "Failed to store notification");
                None
            }
        }
    }

    /// Attempt delivery of a `pending` row once and record `sent` or `failed`
    /// on the pool.
    pub async fn dispatch(&self, pending: notification::Model) -> DeliveryResult {
        let outcome = self.deliver(&pending).await;

        let notification_id = pending.id.clone();
        let user_id = pending.user_id.clone();
        let mut active: notification::ActiveModel = pending.into();
        let now = Utc::now();
        active.updated_at = Set(Some(now.into()));
        let (status, error) = match outcome {
            Ok(()) => {
                active.sent_at = Set(Some(now.into()));
                (NotificationStatus::Sent, None)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(user_id = %user_id, error = %message, "Notification delivery failed");
                active.metadata = Set(Some(json!({ "error": message })));
                (NotificationStatus::Failed, Some(message))
            }
        };
        active.status = Set(status);

        if let Err(e) = self.notification_repo.update(active).await {
            tracing::error!(
                notification_id = %notification_id,
                error = %e,
                "Failed to record notification outcome"
            );
        }

        DeliveryResult {
            notification_id: Some(notification_id),
            status,
            error,
        }
    }

    /// Store and deliver `outbound` on `conn` in one step.
    ///
    /// For callers outside a unit of work; inside one, use [`Self::enqueue`]
    /// and [`Self::dispatch`] after commit.
    pub async fn send<C: TransactionTrait>(
        &self,
        conn: &C,
        outbound: OutboundNotification,
    ) -> DeliveryResult {
        match self.try_enqueue(conn, &outbound).await {
            Ok(pending) => self.dispatch(pending).await,
            Err(e) => {
                tracing::error!(user_id = %outbound.user_id, error = %e, "Failed to store notification");
                DeliveryResult {
                    notification_id: None,
                    status: NotificationStatus::Failed,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_enqueue<C: TransactionTrait>(
        &self,
        conn: &C,
        outbound: &OutboundNotification,
    ) -> AppResult<notification::Model> {
        let savepoint = conn.begin().await?;
        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(outbound.user_id.clone()),
            channel: Set(outbound.channel),
            title: Set(outbound.title.clone()),
            message: Set(outbound.message.clone()),
            related_to: Set(outbound.related_to.clone()),
            status: Set(NotificationStatus::Pending),
            is_read: Set(false),
            sent_at: Set(None),
            read_at: Set(None),
            metadata: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        let pending = self.notification_repo.create_in(&savepoint, model).await?;
        savepoint.commit().await?;
        Ok(pending)
    }

    async fn deliver(&self, pending: &notification::Model) -> AppResult<()> {
        if pending.channel == NotificationChannel::InApp {
            return Ok(());
        }

        let user = self
            .user_repo
            .find_by_id(&pending.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        match pending.channel {
            NotificationChannel::InApp => Ok(()),
            NotificationChannel::Email => {
                self.email
                    .send(&user.email, &pending.title, &pending.message)
                    .await
            }
            NotificationChannel::Sms => {
                let phone = user
                    .phone
                    .ok_or_else(|| AppError::Validation("User has no phone number".to_string()))?;
                self.sms
                    .send(&phone, &format!("{}: {}", pending.title, pending.message))
                    .await
            }
        }
    }

    /// Notifications of `user_id`, newest first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: Option<u64>,
    ) -> AppResult<Vec<notification::Model>> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 100);
        self.notification_repo.find_by_user(user_id, limit, false).await
    }

    /// Unread notifications of `user_id`.
    pub async fn unread_for_user(&self, user_id: &str) -> AppResult<Vec<notification::Model>> {
        self.notification_repo
            .find_by_user(user_id, DEFAULT_LIST_LIMIT, true)
            .await
    }

    /// Mark one notification as read. Other users' notifications are `NotFound`.
    pub async fn mark_as_read(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> AppResult<notification::Model> {
        let notification = self
            .notification_repo
            .find_by_id(notification_id)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if notification.is_read {
            return Ok(notification);
        }

        self.notification_repo.mark_as_read(notification).await
    }

    /// Mark every unread notification of `user_id` as read.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }
}
