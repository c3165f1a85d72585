use serde::Serialize;
use tokio::sync::broadcast;

/// Signals pushed to open dashboards so they re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DashboardEvent {
    /// Something about scheduled posts changed.
    RefreshScheduledContent,
    /// A library item was turned into a post that needs a time.
    ScheduleContent { media_id: String, post_id: String },
}

impl DashboardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RefreshScheduledContent => "refresh-scheduled-content",
            Self::ScheduleContent { .. } => "schedule-content",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DashboardEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire and forget. Having no listeners is normal.
    pub fn publish(&self, event: DashboardEvent) {
        let receivers = self.sender.send(event.clone()).unwrap_or(0);
        tracing::debug!(event = event.name(), receivers, "Published dashboard event");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kebab_case_tag() {
        let json = serde_json::to_value(DashboardEvent::RefreshScheduledContent).unwrap();
        assert_eq!(json, serde_json::json!({"type": "refresh-scheduled-content"}));

        let json = serde_json::to_value(DashboardEvent::ScheduleContent {
            media_id: "m1".into(),
            post_id: "p1".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "schedule-content", "media_id": "m1", "post_id": "p1"})
        );
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(DashboardEvent::RefreshScheduledContent);
        assert_eq!(rx.recv().await.unwrap(), DashboardEvent::RefreshScheduledContent);
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        EventBus::default().publish(DashboardEvent::RefreshScheduledContent);
    }
}
