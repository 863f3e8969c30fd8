//! Event router: maps inbound events to handlers.
//!
//! Routes are either keyword routes (`hears`: case-insensitive patterns matched
//! anywhere in the text, limited to some message scopes) or event routes (`on`:
//! any event of the listed kinds). The first matching route in registration
//! order wins, so catch-all routes are registered last.

use crate::error::{ConfigError, Result};
use crate::{InboundMessage, MessageContent, MessageScope};
use regex::{Regex, RegexBuilder};

/// Event classes a route can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DirectMessage,
    DirectMention,
    Mention,
    Ambient,
    ChannelJoined,
    Interaction,
    DialogSubmission,
}

impl From<MessageScope> for EventKind {
    fn from(scope: MessageScope) -> Self {
        match scope {
            MessageScope::DirectMessage => EventKind::DirectMessage,
            MessageScope::DirectMention => EventKind::DirectMention,
            MessageScope::Mention => EventKind::Mention,
            MessageScope::Ambient => EventKind::Ambient,
        }
    }
}

impl EventKind {
    pub fn of(content: &MessageContent) -> Self {
        match content {
            MessageContent::Text { scope, .. } => (*scope).into(),
            MessageContent::Interaction { .. } => EventKind::Interaction,
            MessageContent::DialogSubmission { .. } => EventKind::DialogSubmission,
            MessageContent::ChannelJoined => EventKind::ChannelJoined,
        }
    }
}

#[derive(Debug)]
enum Trigger {
    Hears {
        patterns: Vec<Regex>,
        kinds: Vec<EventKind>,
    },
    On {
        kinds: Vec<EventKind>,
    },
}

impl Trigger {
    fn matches(&self, message: &InboundMessage) -> bool {
        let kind = EventKind::of(&message.content);
        match self {
            Trigger::Hears { patterns, kinds } => {
                let MessageContent::Text { text, .. } = &message.content else {
                    return false;
                };
                kinds.contains(&kind) && patterns.iter().any(|pattern| pattern.is_match(text))
            }
            Trigger::On { kinds } => kinds.contains(&kind),
        }
    }
}

/// Ordered route table.
#[derive(Debug)]
pub struct Router<H> {
    routes: Vec<(Trigger, H)>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Route text messages in `scopes` that match any of `patterns`.
    pub fn hears<P: AsRef<str>>(
        mut self,
        patterns: &[P],
        scopes: &[MessageScope],
        handler: H,
    ) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|error| {
                        ConfigError::Invalid(format!("invalid keyword pattern `{pattern}`: {error}"))
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let kinds = scopes.iter().map(|scope| EventKind::from(*scope)).collect();

        self.routes.push((Trigger::Hears { patterns, kinds }, handler));
        Ok(self)
    }

    /// Route every event of the listed kinds.
    pub fn on(mut self, kinds: &[EventKind], handler: H) -> Self {
        self.routes.push((
            Trigger::On {
                kinds: kinds.to_vec(),
            },
            handler,
        ));
        self
    }

    /// First route matching `message`, if any.
    pub fn resolve(&self, message: &InboundMessage) -> Option<&H> {
        self.routes
            .iter()
            .find(|(trigger, _)| trigger.matches(message))
            .map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
