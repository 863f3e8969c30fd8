//! The bot: event loop, route table, and the bug-report handlers.

use crate::bug_report::dialog::bug_report_dialog;
use crate::bug_report::format::{Submission, format_report};
use crate::bug_report::prompt::{ACCEPT_VALUE, BugReportPrompt, DECLINE_VALUE};
use crate::bug_report::{CallbackTag, DialogDefinition, IssueTracker, submit_detached};
use crate::config::BugReportConfig;
use crate::error::Result;
use crate::messaging::{InboundStream, MessagingDyn};
use crate::router::{EventKind, Router};
use crate::{InboundMessage, MessageContent, MessageScope, OutboundResponse};

use futures::StreamExt as _;
use std::sync::Arc;

const JOINED_TEXT: &str = "I'm here!";
const HELLO_TEXT: &str = "Hello!";
const DISMISSED_TEXT: &str = "Must have resolved itself... or a refresh did the trick.";
const FILING_TEXT: &str = "Problem is being filed.";
const THANKS_TEXT: &str = "Thanks for you help, the problem will be filed now!";
const FALLBACK_TEXT: &str = "Didn't quite understand that";
const FALLBACK_REACTION: &str = "robot_face";

/// What to do with a routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    AnnounceJoin,
    Greet,
    OfferBugReport,
    Interaction,
    DialogSubmission,
    Fallback,
}

/// Build the bot's route table. Order matters: the fallback must stay last.
pub fn routes(config: &BugReportConfig) -> Result<Router<Handler>> {
    let router = Router::new()
        .on(&[EventKind::ChannelJoined], Handler::AnnounceJoin)
        .hears(&["hello"], &[MessageScope::DirectMessage], Handler::Greet)?
        .hears(
            config.keywords.as_slice(),
            &[MessageScope::DirectMessage, MessageScope::DirectMention],
            Handler::OfferBugReport,
        )?
        .on(&[EventKind::Interaction], Handler::Interaction)
        .on(&[EventKind::DialogSubmission], Handler::DialogSubmission)
        .on(
            &[
                EventKind::DirectMessage,
                EventKind::Mention,
                EventKind::DirectMention,
            ],
            Handler::Fallback,
        );
    Ok(router)
}

pub struct Bot {
    messaging: Arc<dyn MessagingDyn>,
    tracker: Arc<dyn IssueTracker>,
    router: Router<Handler>,
    dialog: DialogDefinition,
}

impl Bot {
    pub fn new(
        messaging: Arc<dyn MessagingDyn>,
        tracker: Arc<dyn IssueTracker>,
        config: &BugReportConfig,
    ) -> Result<Self> {
        let router = routes(config)?;
        tracing::debug!(
            routes = router.len(),
            keywords = config.keywords.len(),
            "bot routes registered"
        );
        Ok(Self {
            messaging,
            tracker,
            router,
            dialog: bug_report_dialog().validate()?,
        })
    }

    /// Handle inbound events one at a time until the stream ends.
    pub async fn run(&self, mut inbound: InboundStream) {
        while let Some(message) = inbound.next().await {
            self.handle(&message).await;
        }
        tracing::info!(adapter = %self.messaging.name(), "inbound stream closed");
    }

    /// Route and handle a single event. Returns the handler that ran, if any.
    pub async fn handle(&self, message: &InboundMessage) -> Option<Handler> {
        let Some(handler) = self.router.resolve(message).copied() else {
            tracing::trace!(message_id = %message.id, "no route for inbound event");
            return None;
        };
        tracing::debug!(message_id = %message.id, ?handler, content = %message.content, "routing inbound event");

        match handler {
            Handler::AnnounceJoin => {
                self.reply(message, OutboundResponse::Text(JOINED_TEXT.into()))
                    .await;
            }
            Handler::Greet => {
                self.reply(message, OutboundResponse::Text(HELLO_TEXT.into()))
                    .await;
            }
            Handler::OfferBugReport => {
                tracing::info!(sender_id = %message.sender_id, "someone is calling for help");
                self.reply(message, BugReportPrompt::new().into_response())
                    .await;
            }
            Handler::Interaction => self.handle_interaction(message).await,
            Handler::DialogSubmission => self.handle_dialog_submission(message).await,
            Handler::Fallback => {
                if let Err(error) = self
                    .messaging
                    .respond(message, OutboundResponse::Reaction(FALLBACK_REACTION.into()))
                    .await
                {
                    tracing::warn!(%error, "failed to add fallback reaction");
                }
                self.reply(message, OutboundResponse::Text(FALLBACK_TEXT.into()))
                    .await;
            }
        }

        Some(handler)
    }

    async fn handle_interaction(&self, message: &InboundMessage) {
        let MessageContent::Interaction {
            block_id, value, ..
        } = &message.content
        else {
            return;
        };

        match block_id.as_deref().and_then(CallbackTag::parse) {
            Some(CallbackTag::BugReport) => {}
            Some(CallbackTag::SubmitReport) | None => {
                tracing::debug!(?block_id, "interaction belongs to no button flow, ignoring");
                return;
            }
        }

        let value = value.as_deref().unwrap_or_default();
        tracing::info!(value, "bug report button pressed");

        if value == DECLINE_VALUE {
            self.reply(message, OutboundResponse::ReplaceOriginal(DISMISSED_TEXT.into()))
                .await;
            return;
        }

        // Anything but the decline value counts as acceptance.
        if value != ACCEPT_VALUE {
            tracing::warn!(value, "unexpected bug report action value, treating it as yes");
        }

        self.reply(message, OutboundResponse::ReplaceOriginal(FILING_TEXT.into()))
            .await;
        self.reply(
            message,
            OutboundResponse::OpenDialog {
                view: self.dialog.to_modal_view(),
            },
        )
        .await;
    }

    async fn handle_dialog_submission(&self, message: &InboundMessage) {
        let MessageContent::DialogSubmission {
            callback_id,
            values,
        } = &message.content
        else {
            return;
        };

        if CallbackTag::parse(callback_id) != Some(self.dialog.callback_id) {
            tracing::warn!(
                callback_id = %callback_id,
                expected = %self.dialog.callback_id,
                "dialog submission for another dialog, acknowledging and dropping"
            );
            self.reply(message, OutboundResponse::DialogAck).await;
            return;
        }

        self.reply(message, OutboundResponse::Text(THANKS_TEXT.into()))
            .await;
        // The surface reports an error to the user unless every submission is acked.
        self.reply(message, OutboundResponse::DialogAck).await;

        let request = format_report(&Submission::from_values(values));
        drop(submit_detached(self.tracker.clone(), request));
    }

    /// Send a response; failures are logged and never stop the bot.
    async fn reply(&self, message: &InboundMessage, response: OutboundResponse) {
        let variant = response.variant_name();
        if let Err(error) = self.messaging.respond(message, response).await {
            tracing::warn!(
                %error,
                variant,
                adapter = %self.messaging.name(),
                message_id = %message.id,
                "failed to send response"
            );
        }
    }
}
