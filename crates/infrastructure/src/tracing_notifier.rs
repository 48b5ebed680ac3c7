use matchdesk_application::{Notification, NotificationLevel, Notifier};
use tracing::{info, warn};

/// Notification surface that writes toasts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                info!(title = %notification.title, "{}", notification.message);
            }
            NotificationLevel::Error => {
                warn!(title = %notification.title, "{}", notification.message);
            }
        }
    }
}
