//! Chat commands (/monitor, /unmonitor, /list, etc).
//!
//! Handles command parsing and execution for commands sent from the trusted
//! Telegram chat. Commands from any other chat are ignored.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::common::error::RegistryError;
use crate::common::types::{PermitEntry, WHOLE_PERMIT_KEY};
use crate::monitor::notifier::{format_notification, format_permit_list, Notification, Notifier};
use crate::monitor::{SharedRegistry, SharedStore};
use crate::recreation::{AvailabilitySource, DivisionDiscovery};
use crate::telegram::Messenger;

pub const HELP_TEXT: &str = "<b>Available Commands:</b>
• /monitor &lt;permit_id&gt; [name] - Monitor a permit (divisions are discovered)
• /monitor &lt;permit_id&gt; &lt;division_id&gt; [name] - Monitor a permit with one known division
• /unmonitor &lt;permit_id&gt; - Stop monitoring a permit
• /monitor_division &lt;permit_id&gt; &lt;division_id&gt; [name] - Monitor one more division
• /unmonitor_division &lt;permit_id&gt; &lt;division_id&gt; - Stop monitoring a division
• /list - Show monitored permits
• /help - Show this help message";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Monitor {
        permit_id: String,
        /// Skips discovery when given.
        division_id: Option<String>,
        name: Option<String>,
    },
    Unmonitor {
        permit_id: String,
    },
    MonitorDivision {
        permit_id: String,
        division_id: String,
        name: Option<String>,
    },
    UnmonitorDivision {
        permit_id: String,
        division_id: String,
    },
    List,
    Help,
}

/// A recognised verb with missing or invalid arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    pub usage: &'static str,
}

/// Parse a chat message.
///
/// Returns `None` for text that is not a slash command. Unknown verbs
/// parse as [`Command::Help`].
pub fn parse_command(text: &str) -> Option<Result<Command, UsageError>> {
    let text = text.trim();
    let body = text.strip_prefix('/')?;

    let mut parts = body.split_whitespace();
    let verb = parts.next()?;
    // "/monitor@RiverPermitBot" addresses a specific bot in group chats.
    let verb = verb.split('@').next().unwrap_or(verb).to_lowercase().replace('-', "_");
    let args: Vec<&str> = parts.collect();

    let command = match verb.as_str() {
        "monitor" => match args.as_slice() {
            [permit_id, division_id, rest @ ..] if is_id(permit_id) && is_id(division_id) => {
                Ok(Command::Monitor {
                    permit_id: permit_id.to_string(),
                    division_id: Some(division_id.to_string()),
                    name: join_name(rest),
                })
            }
            [permit_id, rest @ ..] if is_id(permit_id) => Ok(Command::Monitor {
                permit_id: permit_id.to_string(),
                division_id: None,
                name: join_name(rest),
            }),
            _ => Err(UsageError {
                usage: "/monitor <permit_id> [division_id] [name]",
            }),
        },
        "unmonitor" => match args.as_slice() {
            [permit_id] if is_id(permit_id) => Ok(Command::Unmonitor {
                permit_id: permit_id.to_string(),
            }),
            _ => Err(UsageError {
                usage: "/unmonitor <permit_id>",
            }),
        },
        "monitor_division" => match args.as_slice() {
            [permit_id, division_id, rest @ ..] if is_id(permit_id) && is_id(division_id) => {
                Ok(Command::MonitorDivision {
                    permit_id: permit_id.to_string(),
                    division_id: division_id.to_string(),
                    name: join_name(rest),
                })
            }
            _ => Err(UsageError {
                usage: "/monitor_division <permit_id> <division_id> [name]",
            }),
        },
        "unmonitor_division" => match args.as_slice() {
            [permit_id, division_id] if is_id(permit_id) && is_id(division_id) => {
                Ok(Command::UnmonitorDivision {
                    permit_id: permit_id.to_string(),
                    division_id: division_id.to_string(),
                })
            }
            _ => Err(UsageError {
                usage: "/unmonitor_division <permit_id> <division_id>",
            }),
        },
        "list" => Ok(Command::List),
        _ => Ok(Command::Help),
    };

    Some(command)
}

fn is_id(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn join_name(words: &[&str]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Polls the messaging channel for commands and applies them to the
/// registry.
pub struct CommandProcessor<S, M> {
    messenger: Arc<M>,
    notifier: Arc<Notifier<M>>,
    discovery: DivisionDiscovery<S>,
    registry: SharedRegistry,
    store: SharedStore,
    trusted_channel: String,
    interval: Duration,
    offset: Option<i64>,
}

impl<S: AvailabilitySource, M: Messenger> CommandProcessor<S, M> {
    pub fn new(
        messenger: Arc<M>,
        notifier: Arc<Notifier<M>>,
        discovery: DivisionDiscovery<S>,
        registry: SharedRegistry,
        store: SharedStore,
        trusted_channel: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            messenger,
            notifier,
            discovery,
            registry,
            store,
            trusted_channel: trusted_channel.into(),
            interval,
            offset: None,
        }
    }

    /// Poll for commands forever.
    pub async fn run(mut self) {
        info!("Command processor polling every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// Fetch pending updates and handle each once. Returns the number of
    /// commands handled.
    pub async fn poll_once(&mut self) -> usize {
        let updates = match self.messenger.get_updates(self.offset).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Failed to fetch Telegram updates: {}", e);
                return 0;
            }
        };

        let mut handled = 0;
        for update in updates {
            self.offset = Some(update.update_id + 1);

            let Some(message) = update.into_message() else {
                continue;
            };
            if !message.chat.matches(&self.trusted_channel) {
                debug!("Ignoring message from untrusted chat {}", message.chat.id);
                continue;
            }
            let Some(text) = message.text else {
                continue;
            };

            let chat_id = message.chat.id.to_string();
            let Some(reply) = self.handle_text(&chat_id, &text).await else {
                continue;
            };

            handled += 1;
            if let Err(e) = self.notifier.deliver(&chat_id, &reply).await {
                error!("Failed to reply to command: {}", e);
            }
        }
        handled
    }

    /// Handle one message from the trusted chat `chat_id`, returning the
    /// reply.
    pub async fn handle_text(&self, chat_id: &str, text: &str) -> Option<String> {
        let reply = match parse_command(text)? {
            Ok(command) => {
                info!("Command received: {:?}", command);
                self.execute(chat_id, command).await
            }
            Err(usage) => {
                debug!("Malformed command '{}'", text);
                format!("Usage: {}\n\n{}", usage.usage, HELP_TEXT)
            }
        };
        Some(reply)
    }

    pub async fn execute(&self, chat_id: &str, command: Command) -> String {
        let result = match command {
            Command::Monitor {
                permit_id,
                division_id,
                name,
            } => self.monitor(chat_id, &permit_id, division_id, name).await,
            Command::Unmonitor { permit_id } => self.unmonitor(&permit_id).await,
            Command::MonitorDivision {
                permit_id,
                division_id,
                name,
            } => self.monitor_division(&permit_id, &division_id, name).await,
            Command::UnmonitorDivision {
                permit_id,
                division_id,
            } => self.unmonitor_division(&permit_id, &division_id).await,
            Command::List => Ok(format_permit_list(&self.registry.read().await.list())),
            Command::Help => Ok(HELP_TEXT.to_string()),
        };

        result.unwrap_or_else(|e| {
            warn!("Command failed: {}", e);
            e.to_string()
        })
    }

    async fn monitor(
        &self,
        chat_id: &str,
        permit_id: &str,
        division_id: Option<String>,
        name: Option<String>,
    ) -> Result<String, RegistryError> {
        if self.registry.read().await.contains(permit_id) {
            return Err(RegistryError::AlreadyMonitored {
                permit_id: permit_id.to_string(),
            });
        }

        let (divisions, reported_name) = match division_id {
            Some(division_id) => {
                let hit = self.discovery.probe(permit_id, &division_id).await;
                let division_name = hit
                    .as_ref()
                    .map(|hit| hit.division_name.clone())
                    .unwrap_or_else(|| format!("Division {}", division_id));
                let permit_name = hit.and_then(|hit| hit.permit_name);
                (BTreeMap::from([(division_id, division_name)]), permit_name)
            }
            None => {
                let progress = format!("Discovering divisions for permit #{}...", permit_id);
                if let Err(e) = self.notifier.deliver(chat_id, &progress).await {
                    debug!("Progress message not sent: {}", e);
                }
                let found = self.discovery.discover(permit_id).await;
                (found.divisions, found.permit_name)
            }
        };

        let entry = PermitEntry {
            name: name
                .or(reported_name)
                .unwrap_or_else(|| format!("Permit {}", permit_id)),
            divisions,
        };

        self.registry
            .write()
            .await
            .add_permit(permit_id, entry.clone())
            .await?;
        info!("Now monitoring permit {} ({})", permit_id, entry.name);

        Ok(format_notification(&Notification::PermitAdded {
            permit_id: permit_id.to_string(),
            entry,
        }))
    }

    /// Store records are cleared first; if that fails the permit stays
    /// registered.
    async fn unmonitor(&self, permit_id: &str) -> Result<String, RegistryError> {
        let mut registry = self.registry.write().await;
        if !registry.contains(permit_id) {
            return Err(RegistryError::NotMonitored {
                permit_id: permit_id.to_string(),
            });
        }

        self.store.lock().await.forget_permit(permit_id).await?;
        let removed = registry.remove_permit(permit_id).await?;
        info!("Stopped monitoring permit {} ({})", permit_id, removed.name);

        Ok(format_notification(&Notification::PermitRemoved {
            permit_id: permit_id.to_string(),
            name: removed.name,
        }))
    }

    async fn monitor_division(
        &self,
        permit_id: &str,
        division_id: &str,
        name: Option<String>,
    ) -> Result<String, RegistryError> {
        self.check_division(permit_id, division_id, false).await?;

        let division_name = match name {
            Some(name) => name,
            None => self
                .discovery
                .probe(permit_id, division_id)
                .await
                .map(|hit| hit.division_name)
                .unwrap_or_else(|| format!("Division {}", division_id)),
        };

        let mut registry = self.registry.write().await;
        let was_whole_permit = registry
            .get(permit_id)
            .is_some_and(|entry| entry.divisions.is_empty());
        if was_whole_permit {
            self.store
                .lock()
                .await
                .forget_division(permit_id, WHOLE_PERMIT_KEY)
                .await?;
        }
        registry
            .add_division(permit_id, division_id, &division_name)
            .await?;
        let permit_name = registry
            .get(permit_id)
            .map(|entry| entry.name.clone())
            .unwrap_or_default();
        info!("Now monitoring division {} of permit {}", division_id, permit_id);

        Ok(format_notification(&Notification::DivisionAdded {
            permit_id: permit_id.to_string(),
            permit_name,
            division_id: division_id.to_string(),
            division_name,
        }))
    }

    async fn unmonitor_division(
        &self,
        permit_id: &str,
        division_id: &str,
    ) -> Result<String, RegistryError> {
        self.check_division(permit_id, division_id, true).await?;

        let mut registry = self.registry.write().await;
        self.store
            .lock()
            .await
            .forget_division(permit_id, division_id)
            .await?;
        let division_name = registry.remove_division(permit_id, division_id).await?;
        info!("Stopped monitoring division {} of permit {}", division_id, permit_id);

        Ok(format_notification(&Notification::DivisionRemoved {
            permit_id: permit_id.to_string(),
            division_id: division_id.to_string(),
            division_name,
        }))
    }

    /// Fail unless the permit is registered and the division's presence
    /// matches `expect_present`.
    async fn check_division(
        &self,
        permit_id: &str,
        division_id: &str,
        expect_present: bool,
    ) -> Result<(), RegistryError> {
        let registry = self.registry.read().await;
        let entry = registry
            .get(permit_id)
            .ok_or_else(|| RegistryError::UnknownPermit {
                permit_id: permit_id.to_string(),
            })?;

        match (entry.divisions.contains_key(division_id), expect_present) {
            (true, false) => Err(RegistryError::DivisionAlreadyMonitored {
                permit_id: permit_id.to_string(),
                division_id: division_id.to_string(),
            }),
            (false, true) => Err(RegistryError::UnknownDivision {
                permit_id: permit_id.to_string(),
                division_id: division_id.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
