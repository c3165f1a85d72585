// Domain types - pure, no database access
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Delivery status of a scheduled post.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum,
)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown post status '{}'", other)),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum,
)]
#[serde(rename_all = "lowercase")]
pub enum CharacterRole {
    Owner,
    Manager,
    Mascot,
}

impl CharacterRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Manager => "manager",
            Self::Mascot => "mascot",
        }
    }
}

impl FromStr for CharacterRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "manager" => Ok(Self::Manager),
            "mascot" => Ok(Self::Mascot),
            other => Err(format!("unknown character role '{}'", other)),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, async_graphql::Enum,
)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Video,
    Gif,
    Pdf,
    Interactive,
    Other,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Gif => "gif",
            Self::Pdf => "pdf",
            Self::Interactive => "interactive",
            Self::Other => "other",
        }
    }

    /// Best guess from an upload's MIME type.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime == "image/gif" {
            Self::Gif
        } else if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else if mime == "application/pdf" {
            Self::Pdf
        } else {
            Self::Other
        }
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "gif" => Ok(Self::Gif),
            "pdf" => Ok(Self::Pdf),
            "interactive" => Ok(Self::Interactive),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown file type '{}'", other)),
        }
    }
}

/// What the delivery worker reports back for a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed { error_message: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} a post that is {from}")]
    NotAllowed {
        action: &'static str,
        from: PostStatus,
    },

    #[error("post has no scheduled time yet")]
    Unscheduled,

    #[error("a failed delivery must include an error message")]
    MissingErrorMessage,
}

/// The workflow-relevant part of a scheduled post.
///
/// Every transition consumes the state and returns the next one, so callers
/// persist exactly what the state machine produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostState {
    pub status: PostStatus,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl PostState {
    /// A freshly created post. `None` means it still needs scheduling.
    pub fn new(scheduled_time: Option<DateTime<Utc>>) -> Self {
        Self {
            status: PostStatus::Pending,
            scheduled_time,
            error_message: None,
            sent_at: None,
        }
    }

    pub fn needs_scheduling(&self) -> bool {
        self.status == PostStatus::Pending && self.scheduled_time.is_none()
    }

    /// Pending with a send time that has arrived. Matches the worker's due
    /// list, so a post handed out at `now` also reads as overdue.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Pending && self.scheduled_time.is_some_and(|t| t <= now)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, PostStatus::Sent | PostStatus::Cancelled)
    }

    /// Set the send time. A failed post is re-armed as pending.
    pub fn schedule(self, time: DateTime<Utc>) -> Result<Self, TransitionError> {
        match self.status {
            PostStatus::Pending | PostStatus::Failed => Ok(Self {
                status: PostStatus::Pending,
                scheduled_time: Some(time),
                error_message: None,
                sent_at: None,
            }),
            from => Err(TransitionError::NotAllowed {
                action: "schedule",
                from,
            }),
        }
    }

    /// Move a pending post back to "needs scheduling".
    pub fn unschedule(self) -> Result<Self, TransitionError> {
        match self.status {
            PostStatus::Pending => Ok(Self {
                scheduled_time: None,
                ..self
            }),
            from => Err(TransitionError::NotAllowed {
                action: "unschedule",
                from,
            }),
        }
    }

    /// One-way: there is no path out of `Cancelled`.
    pub fn cancel(self) -> Result<Self, TransitionError> {
        match self.status {
            PostStatus::Pending => Ok(Self {
                status: PostStatus::Cancelled,
                ..self
            }),
            from => Err(TransitionError::NotAllowed {
                action: "cancel",
                from,
            }),
        }
    }

    pub fn record_delivery(
        self,
        outcome: DeliveryOutcome,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        if self.status != PostStatus::Pending {
            return Err(TransitionError::NotAllowed {
                action: "record a delivery for",
                from: self.status,
            });
        }
        if self.scheduled_time.is_none() {
            return Err(TransitionError::Unscheduled);
        }

        match outcome {
            DeliveryOutcome::Sent => Ok(Self {
                status: PostStatus::Sent,
                error_message: None,
                sent_at: Some(now),
                ..self
            }),
            DeliveryOutcome::Failed { error_message } => {
                let message = error_message
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .ok_or(TransitionError::MissingErrorMessage)?;
                Ok(Self {
                    status: PostStatus::Failed,
                    error_message: Some(message),
                    sent_at: None,
                    ..self
                })
            }
        }
    }

    /// Content edits are allowed until the post is sent or cancelled.
    pub fn ensure_editable(&self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::NotAllowed {
                action: "edit",
                from: self.status,
            });
        }
        Ok(())
    }

    /// Cancelled posts are kept as a record and cannot be deleted.
    pub fn ensure_deletable(&self) -> Result<(), TransitionError> {
        if self.status == PostStatus::Cancelled {
            return Err(TransitionError::NotAllowed {
                action: "delete",
                from: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(hours_from_now: i64) -> DateTime<Utc> {
        Utc::now() + Duration::hours(hours_from_now)
    }

    #[test]
    fn new_post_without_time_needs_scheduling() {
        let state = PostState::new(None);
        assert_eq!(state.status, PostStatus::Pending);
        assert!(state.needs_scheduling());

        let scheduled = PostState::new(Some(at(2)));
        assert!(!scheduled.needs_scheduling());
    }

    #[test]
    fn schedule_then_unschedule() {
        let time = at(3);
        let state = PostState::new(None).schedule(time).unwrap();
        assert_eq!(state.scheduled_time, Some(time));
        assert_eq!(state.status, PostStatus::Pending);

        let state = state.unschedule().unwrap();
        assert!(state.needs_scheduling());
    }

    #[test]
    fn cancel_only_from_pending() {
        let cancelled = PostState::new(Some(at(1))).cancel().unwrap();
        assert_eq!(cancelled.status, PostStatus::Cancelled);

        let sent = PostState::new(Some(at(-1)))
            .record_delivery(DeliveryOutcome::Sent, Utc::now())
            .unwrap();
        assert!(matches!(
            sent.cancel(),
            Err(TransitionError::NotAllowed { action: "cancel", from: PostStatus::Sent })
        ));

        let failed = PostState::new(Some(at(-1)))
            .record_delivery(
                DeliveryOutcome::Failed {
                    error_message: Some("rate limited".into()),
                },
                Utc::now(),
            )
            .unwrap();
        assert!(failed.cancel().is_err());
    }

    #[test]
    fn cancelled_is_terminal() {
        let cancelled = PostState::new(Some(at(1))).cancel().unwrap();

        assert!(cancelled.clone().schedule(at(5)).is_err());
        assert!(cancelled.clone().unschedule().is_err());
        assert!(cancelled.clone().cancel().is_err());
        assert!(cancelled
            .clone()
            .record_delivery(DeliveryOutcome::Sent, Utc::now())
            .is_err());
        assert!(cancelled.ensure_editable().is_err());
        assert!(cancelled.ensure_deletable().is_err());
    }

    #[test]
    fn sent_records_timestamp() {
        let now = Utc::now();
        let state = PostState::new(Some(at(-1)))
            .record_delivery(DeliveryOutcome::Sent, now)
            .unwrap();
        assert_eq!(state.status, PostStatus::Sent);
        assert_eq!(state.sent_at, Some(now));
        assert!(state.ensure_editable().is_err());
        assert!(state.ensure_deletable().is_ok());
    }

    #[test]
    fn failure_requires_message() {
        let result = PostState::new(Some(at(-1))).record_delivery(
            DeliveryOutcome::Failed {
                error_message: Some("   ".into()),
            },
            Utc::now(),
        );
        assert_eq!(result, Err(TransitionError::MissingErrorMessage));

        let result = PostState::new(Some(at(-1))).record_delivery(
            DeliveryOutcome::Failed {
                error_message: None,
            },
            Utc::now(),
        );
        assert_eq!(result, Err(TransitionError::MissingErrorMessage));
    }

    #[test]
    fn delivery_requires_scheduled_time() {
        let result = PostState::new(None).record_delivery(DeliveryOutcome::Sent, Utc::now());
        assert_eq!(result, Err(TransitionError::Unscheduled));
    }

    #[test]
    fn rescheduling_failed_post_rearms_it() {
        let failed = PostState::new(Some(at(-2)))
            .record_delivery(
                DeliveryOutcome::Failed {
                    error_message: Some("token expired".into()),
                },
                Utc::now(),
            )
            .unwrap();
        assert!(failed.ensure_editable().is_ok());

        let time = at(4);
        let rearmed = failed.schedule(time).unwrap();
        assert_eq!(rearmed.status, PostStatus::Pending);
        assert_eq!(rearmed.error_message, None);
        assert_eq!(rearmed.scheduled_time, Some(time));
    }

    #[test]
    fn overdue_only_for_pending_in_the_past() {
        let now = Utc::now();
        assert!(PostState::new(Some(at(-1))).is_overdue(now));
        assert!(!PostState::new(Some(at(1))).is_overdue(now));
        assert!(!PostState::new(None).is_overdue(now));
        let cancelled = PostState::new(Some(at(-1))).cancel().unwrap();
        assert!(!cancelled.is_overdue(now));
    }

    #[test]
    fn post_due_exactly_now_is_overdue() {
        let now = at(0);
        assert!(PostState::new(Some(now)).is_overdue(now));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            PostStatus::Pending,
            PostStatus::Sent,
            PostStatus::Failed,
            PostStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<PostStatus>(), Ok(status));
        }
        assert!("queued".parse::<PostStatus>().is_err());
    }

    #[test]
    fn file_type_from_mime() {
        assert_eq!(FileType::from_mime("image/png"), FileType::Image);
        assert_eq!(FileType::from_mime("IMAGE/GIF"), FileType::Gif);
        assert_eq!(FileType::from_mime("video/mp4"), FileType::Video);
        assert_eq!(FileType::from_mime("application/pdf"), FileType::Pdf);
        assert_eq!(FileType::from_mime("text/plain"), FileType::Other);
    }
}
