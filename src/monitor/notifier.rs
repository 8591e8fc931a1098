//! Notification formatting and delivery.
//!
//! Messages use Telegram's HTML parse mode; every user-supplied name is
//! escaped before it is embedded.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::NaiveDate;
use tracing::{debug, error, warn};

use crate::common::error::MessagingError;
use crate::common::types::{MonitoredPermit, PermitEntry, PollTarget};
use crate::telegram::Messenger;

/// Events announced on the messaging channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The process started monitoring.
    Startup {
        permits: Vec<MonitoredPermit>,
        interval: Duration,
    },
    /// First fetch of a target: counts only.
    Summary {
        target: PollTarget,
        available: usize,
    },
    /// Dates that were not available at the previous fetch.
    NewDates {
        target: PollTarget,
        dates: Vec<(NaiveDate, u32)>,
    },
    PermitAdded {
        permit_id: String,
        entry: PermitEntry,
    },
    PermitRemoved {
        permit_id: String,
        name: String,
    },
    DivisionAdded {
        permit_id: String,
        permit_name: String,
        division_id: String,
        division_name: String,
    },
    DivisionRemoved {
        permit_id: String,
        division_id: String,
        division_name: String,
    },
}

/// Direct booking page for a permit.
pub fn booking_url(permit_id: &str) -> String {
    format!(
        "https://www.recreation.gov/permits/{}/registration/detailed-availability?type=overnight-permit",
        permit_id
    )
}

/// Render a notification as an HTML message.
pub fn format_notification(notification: &Notification) -> String {
    match notification {
        Notification::Startup { permits, interval } => {
            let mut message = String::from("<b>River Permit Monitor Started</b>\n\n");
            if permits.is_empty() {
                message.push_str("No permits are being monitored. Use /monitor to add one.\n");
            }
            for permit in permits {
                message.push_str(&format!(
                    "<b>{}</b> (#{})\n",
                    escape_html(&permit.entry.name),
                    permit.id
                ));
                for name in permit.entry.divisions.values() {
                    message.push_str(&format!("• {}\n", escape_html(name)));
                }
            }
            message.push_str(&format!("\nCheck interval: every {} seconds", interval.as_secs()));
            message
        }
        Notification::Summary { target, available } => format!(
            "<b>{}</b>: {} dates available\n\nMonitoring active - will notify of NEW availability only",
            escape_html(&target.label()),
            available
        ),
        Notification::NewDates { target, dates } => {
            let mut message = format!(
                "<b>New Availability: {}</b>\n\n",
                escape_html(&target.label())
            );
            for (date, spots) in dates {
                message.push_str(&format!("• {} - {} spots\n", format_date(*date), spots));
            }
            message.push_str(&format!(
                "\n<a href='{}'>Book Now</a>",
                booking_url(&target.permit_id)
            ));
            message
        }
        Notification::PermitAdded { permit_id, entry } => {
            let mut message = format!(
                "Now monitoring <b>{}</b> (#{})",
                escape_html(&entry.name),
                permit_id
            );
            if entry.divisions.is_empty() {
                message.push_str("\nNo divisions found - the permit will be checked as a whole.");
            } else {
                message.push_str("\nDivisions:");
                for (id, name) in &entry.divisions {
                    message.push_str(&format!("\n• {} ({})", escape_html(name), id));
                }
            }
            message
        }
        Notification::PermitRemoved { permit_id, name } => format!(
            "Stopped monitoring <b>{}</b> (#{})",
            escape_html(name),
            permit_id
        ),
        Notification::DivisionAdded {
            permit_id,
            permit_name,
            division_id,
            division_name,
        } => format!(
            "Now monitoring division <b>{}</b> ({}) of {} (#{})",
            escape_html(division_name),
            division_id,
            escape_html(permit_name),
            permit_id
        ),
        Notification::DivisionRemoved {
            permit_id,
            division_id,
            division_name,
        } => format!(
            "Stopped monitoring division <b>{}</b> ({}) of permit #{}",
            escape_html(division_name),
            division_id,
            permit_id
        ),
    }
}

/// Render the `/list` reply.
pub fn format_permit_list(permits: &[MonitoredPermit]) -> String {
    if permits.is_empty() {
        return "No permits are being monitored.".to_string();
    }

    let mut message = String::from("<b>Monitored permits</b>\n");
    for permit in permits {
        message.push_str(&format!(
            "\n<b>{}</b> (#{})",
            escape_html(&permit.entry.name),
            permit.id
        ));
        if permit.entry.divisions.is_empty() {
            message.push_str("\n• whole permit");
        }
        for (id, name) in &permit.entry.divisions {
            message.push_str(&format!("\n• {} ({})", escape_html(name), id));
        }
    }
    message
}

/// Format a date as e.g. "Jul 20, 2025".
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Delivers messages to the configured channel, retrying transient
/// failures a few times.
pub struct Notifier<M> {
    messenger: Arc<M>,
    channel_id: String,
    backoff: ExponentialBuilder,
}

impl<M: Messenger> Notifier<M> {
    pub fn new(messenger: Arc<M>, channel_id: impl Into<String>) -> Self {
        Self {
            messenger,
            channel_id: channel_id.into(),
            backoff: ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(5))
                .with_max_times(3),
        }
    }

    /// Announce an event on the configured channel.
    pub async fn notify(&self, notification: &Notification) -> Result<(), MessagingError> {
        self.deliver(&self.channel_id, &format_notification(notification))
            .await
    }

    /// Send `text` to `chat_id`.
    pub async fn deliver(&self, chat_id: &str, text: &str) -> Result<(), MessagingError> {
        let result = (|| self.messenger.send_message(chat_id, text))
            .retry(self.backoff)
            .notify(|e: &MessagingError, delay: Duration| {
                warn!("Failed to send message ({}), retrying in {:?}", e, delay);
            })
            .await;

        match &result {
            Ok(()) => debug!("Message delivered to {}", chat_id),
            Err(e) => error!("Giving up on message to {}: {}", chat_id, e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use futures::future::{BoxFuture, FutureExt};

    use crate::common::types::Division;
    use crate::telegram::types::Update;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn target() -> PollTarget {
        PollTarget {
            permit_id: "250014".to_string(),
            permit_name: "Green River".to_string(),
            division: Some(Division {
                id: "371".to_string(),
                name: "Dearlodge".to_string(),
            }),
        }
    }

    #[test]
    fn test_summary_has_counts_only() {
        let message = format_notification(&Notification::Summary {
            target: target(),
            available: 2,
        });
        assert!(message.contains("Green River - Dearlodge"));
        assert!(message.contains("2 dates available"));
        assert!(!message.contains("Book Now"));
    }

    #[test]
    fn test_new_dates_lists_each_date_with_link() {
        let message = format_notification(&Notification::NewDates {
            target: target(),
            dates: vec![(date("2025-07-20"), 1), (date("2025-08-02"), 3)],
        });

        assert!(message.starts_with("<b>New Availability: Green River - Dearlodge</b>"));
        assert!(message.contains("• Jul 20, 2025 - 1 spots"));
        assert!(message.contains("• Aug 02, 2025 - 3 spots"));
        assert!(message.contains(&booking_url("250014")));
        let first = message.find("Jul 20").unwrap();
        let second = message.find("Aug 02").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_permit_added_without_divisions() {
        let message = format_notification(&Notification::PermitAdded {
            permit_id: "445856".to_string(),
            entry: PermitEntry::new("Desolation <Gray>"),
        });
        assert!(message.contains("Desolation &lt;Gray&gt;"));
        assert!(message.contains("checked as a whole"));
    }

    #[test]
    fn test_list_format() {
        let permits = vec![MonitoredPermit {
            id: "621743".to_string(),
            entry: PermitEntry::new("Rio Chama River").with_division("1", "Rio Chama"),
        }];
        let message = format_permit_list(&permits);
        assert!(message.contains("<b>Rio Chama River</b> (#621743)"));
        assert!(message.contains("• Rio Chama (1)"));
        assert_eq!(format_permit_list(&[]), "No permits are being monitored.");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("A & B <c>"), "A &amp; B &lt;c&gt;");
    }

    /// Fails the first `failures` sends, then records messages.
    struct FlakyMessenger {
        failures: Mutex<u32>,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl Messenger for FlakyMessenger {
        fn send_message<'a>(
            &'a self,
            chat_id: &'a str,
            text: &'a str,
        ) -> BoxFuture<'a, Result<(), MessagingError>> {
            let mut failures = self.failures.lock().unwrap();
            let result = if *failures > 0 {
                *failures -= 1;
                Err(MessagingError::Api {
                    description: "Too Many Requests".to_string(),
                })
            } else {
                self.sent
                    .lock()
                    .unwrap()
                    .push((chat_id.to_string(), text.to_string()));
                Ok(())
            };
            async move { result }.boxed()
        }

        fn get_updates(&self, _offset: Option<i64>) -> BoxFuture<'_, Result<Vec<Update>, MessagingError>> {
            async { Ok(Vec::new()) }.boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_retries_transient_failures() {
        let messenger = Arc::new(FlakyMessenger {
            failures: Mutex::new(2),
            sent: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(messenger.clone(), "-100200");

        notifier
            .notify(&Notification::Summary {
                target: target(),
                available: 0,
            })
            .await
            .unwrap();

        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "-100200");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_gives_up_eventually() {
        let messenger = Arc::new(FlakyMessenger {
            failures: Mutex::new(10),
            sent: Mutex::new(Vec::new()),
        });
        let notifier = Notifier::new(messenger.clone(), "-100200");

        assert!(notifier.deliver("-100200", "hello").await.is_err());
        assert!(messenger.sent.lock().unwrap().is_empty());
    }
}
