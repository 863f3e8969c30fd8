//! Slack messaging adapter using slack-morphism.
//!
//! ## Features
//!
//! **Inbound** (Socket Mode)
//! - Channel and DM messages, classified as direct message / ambient
//! - `app_mention` events, classified as direct mention or mention
//! - `member_joined_channel` for the bot user itself
//! - Button clicks (`block_actions`), one inbound message per action
//! - Modal submissions (`view_submission`), held open until the bot acknowledges
//!
//! **Outbound**
//! - Plain text replies (threaded when the trigger was threaded)
//! - Block Kit messages, optionally inside a colored attachment
//! - Replacing the message that carried a clicked button (`chat.update`)
//! - Opening modals (`views.open`)
//! - Emoji reactions

use crate::messaging::traits::{InboundStream, Messaging};
use crate::{InboundMessage, MessageContent, MessageScope, OutboundResponse};

use anyhow::Context as _;
use slack_morphism::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};

/// Slack gives up on a view submission after 3 seconds; leave room for the ack envelope.
const DIALOG_ACK_TIMEOUT: Duration = Duration::from_millis(2_500);

/// Map of inbound message id → waiter for the bot's dialog acknowledgment.
type PendingAcks = Arc<Mutex<HashMap<String, oneshot::Sender<()>>>>;

/// State shared with socket mode callbacks via `SlackClientEventsUserState`.
struct SlackAdapterState {
    inbound_tx: mpsc::Sender<InboundMessage>,
    bot_user_id: String,
    pending_acks: PendingAcks,
}

/// Slack adapter.
pub struct SlackAdapter {
    app_token: String,
    /// Shared HTTP client for all Web API calls.
    client: Arc<SlackHyperClient>,
    /// Pre-built API token wrapping the bot token.
    token: SlackApiToken,
    pending_acks: PendingAcks,
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
}

impl SlackAdapter {
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> anyhow::Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new().context("failed to create slack HTTP connector")?,
        ));
        let token = SlackApiToken::new(SlackApiTokenValue(bot_token.into()));
        Ok(Self {
            app_token: app_token.into(),
            client,
            token,
            pending_acks: Arc::new(Mutex::new(HashMap::new())),
            shutdown_tx: Arc::new(RwLock::new(None)),
        })
    }

    fn session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.token)
    }
}

// ---------------------------------------------------------------------------
// Inbound event handlers (slack-morphism takes fn pointers)
// ---------------------------------------------------------------------------

async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> UserCallbackResult<()> {
    let state_guard = states.read().await;
    let Some(adapter_state) = state_guard.get_user_state::<Arc<SlackAdapterState>>() else {
        tracing::error!("slack adapter state missing from listener environment");
        return Ok(());
    };
    let adapter_state = adapter_state.clone();
    drop(state_guard);

    let team_id = event.team_id.0.clone();
    match event.event {
        SlackEventCallbackBody::Message(msg) => {
            handle_message_event(msg, &team_id, &adapter_state).await;
        }
        SlackEventCallbackBody::AppMention(mention) => {
            handle_app_mention_event(mention, &team_id, &adapter_state).await;
        }
        SlackEventCallbackBody::MemberJoinedChannel(joined) => {
            if joined.user.0 == adapter_state.bot_user_id {
                let channel_id = joined.channel.0.clone();
                tracing::info!(channel_id = %channel_id, "bot joined slack channel");
                let metadata = base_metadata(&team_id, &channel_id, None);
                send_inbound(
                    &adapter_state.inbound_tx,
                    format!("join:{channel_id}"),
                    format!("slack:{team_id}:{channel_id}"),
                    joined.user.0.clone(),
                    MessageContent::ChannelJoined,
                    metadata,
                )
                .await;
            }
        }
        _ => {}
    }

    Ok(())
}

async fn handle_message_event(
    msg_event: SlackMessageEvent,
    team_id: &str,
    adapter_state: &SlackAdapterState,
) {
    // Skip message edits / deletes / bot_message subtypes
    if msg_event.subtype.is_some() {
        return;
    }

    let Some(user_id) = msg_event.sender.user.as_ref().map(|u| u.0.clone()) else {
        return; // system message
    };
    if user_id == adapter_state.bot_user_id {
        return;
    }

    let channel_id = msg_event
        .origin
        .channel
        .as_ref()
        .map(|c| c.0.clone())
        .unwrap_or_default();
    let text = msg_event
        .content
        .as_ref()
        .and_then(|c| c.text.clone())
        .unwrap_or_default();

    // Channel messages that mention the bot also arrive as `app_mention`.
    let Some(scope) = classify_message(&channel_id, &text, &adapter_state.bot_user_id) else {
        return;
    };

    let ts = msg_event.origin.ts.0.clone();
    let thread_ts = msg_event.origin.thread_ts.as_ref().map(|t| t.0.clone());
    let conversation_id = conversation_id(team_id, &channel_id, thread_ts.as_deref());
    let mut metadata = base_metadata(team_id, &channel_id, Some(&user_id));
    insert_str(&mut metadata, "slack_message_ts", &ts);
    if let Some(thread_ts) = &thread_ts {
        insert_str(&mut metadata, "slack_thread_ts", thread_ts);
    }

    send_inbound(
        &adapter_state.inbound_tx,
        ts,
        conversation_id,
        user_id,
        MessageContent::Text { text, scope },
        metadata,
    )
    .await;
}

/// `SlackAppMentionEvent` has a flat `user` and `channel` (not nested in `sender` / `origin`).
async fn handle_app_mention_event(
    mention: SlackAppMentionEvent,
    team_id: &str,
    adapter_state: &SlackAdapterState,
) {
    let user_id = mention.user.0.clone();
    if user_id == adapter_state.bot_user_id {
        return;
    }

    let channel_id = mention.channel.0.clone();
    let ts = mention.origin.ts.0.clone();
    let thread_ts = mention.origin.thread_ts.as_ref().map(|t| t.0.clone());

    let raw_text = mention.content.text.clone().unwrap_or_default();
    let scope = mention_scope(&raw_text, &adapter_state.bot_user_id);
    let text = strip_bot_mention(&raw_text, &adapter_state.bot_user_id);

    let conversation_id = conversation_id(team_id, &channel_id, thread_ts.as_deref());
    let mut metadata = base_metadata(team_id, &channel_id, Some(&user_id));
    insert_str(&mut metadata, "slack_message_ts", &ts);
    if let Some(thread_ts) = &thread_ts {
        insert_str(&mut metadata, "slack_thread_ts", thread_ts);
    }

    send_inbound(
        &adapter_state.inbound_tx,
        ts,
        conversation_id,
        user_id,
        MessageContent::Text { text, scope },
        metadata,
    )
    .await;
}

fn slack_error_handler(
    err: Box<dyn std::error::Error + Send + Sync>,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> HttpStatusCode {
    tracing::warn!(error = %err, "slack socket mode error");
    HttpStatusCode::OK
}

/// Handle Block Kit button clicks and modal submissions.
///
/// slack-morphism acknowledges the Socket Mode envelope when this callback
/// returns. For view submissions the callback therefore waits until the bot sends
/// `OutboundResponse::DialogAck` (or the ack timeout passes) so the modal only
/// closes once the submission has been accepted.
async fn handle_interaction_event(
    event: SlackInteractionEvent,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> UserCallbackResult<()> {
    let state_guard = states.read().await;
    let Some(adapter_state) = state_guard.get_user_state::<Arc<SlackAdapterState>>() else {
        tracing::error!("slack adapter state missing from listener environment");
        return Ok(());
    };
    let adapter_state = adapter_state.clone();
    drop(state_guard);

    match event {
        SlackInteractionEvent::BlockActions(block_actions) => {
            handle_block_actions(block_actions, &adapter_state).await;
        }
        SlackInteractionEvent::ViewSubmission(submission) => {
            let Some(submission) = read_view_submission(&submission) else {
                tracing::warn!("slack view submission missing required fields, ignoring");
                return Ok(());
            };
            handle_view_submission(submission, &adapter_state).await;
        }
        _ => {
            tracing::debug!("received unhandled slack interaction event, ignoring");
        }
    }

    Ok(())
}

async fn handle_block_actions(
    block_actions: SlackInteractionBlockActionsEvent,
    adapter_state: &SlackAdapterState,
) {
    let messages = block_action_messages(block_actions);
    if messages.is_empty() {
        tracing::debug!("block_actions interaction had no actions, ignoring");
        return;
    }
    for message in messages {
        if let Err(error) = adapter_state.inbound_tx.send(message).await {
            tracing::warn!(%error, "failed to send inbound message from Slack");
        }
    }
}

/// One inbound message per clicked action.
fn block_action_messages(block_actions: SlackInteractionBlockActionsEvent) -> Vec<InboundMessage> {
    let user_id = block_actions
        .user
        .as_ref()
        .map(|u| u.id.0.clone())
        .unwrap_or_default();
    let team_id = block_actions.team.id.0.clone();
    let channel_id = block_actions
        .channel
        .as_ref()
        .map(|c| c.id.0.clone())
        .unwrap_or_default();

    let message_ts = match &block_actions.container {
        SlackInteractionActionContainer::Message(msg_container) => {
            Some(msg_container.message_ts.0.clone())
        }
        _ => None,
    };
    // Set when the clicked message lives in a thread; replies and modals stay there.
    let thread_ts = block_actions
        .message
        .as_ref()
        .and_then(|m| m.origin.thread_ts.as_ref())
        .map(|t| t.0.clone());

    // trigger_id identifies this interaction turn; views.open needs it too.
    let trigger_id = block_actions.trigger_id.0.clone();
    let conversation_id = conversation_id(&team_id, &channel_id, thread_ts.as_deref());

    block_actions
        .actions
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(idx, action)| {
            let action_id = action.action_id.0.clone();
            let block_id = action.block_id.as_ref().map(|b| b.0.clone());

            let id = if idx == 0 {
                trigger_id.clone()
            } else {
                format!("{}:{}", trigger_id, idx)
            };

            let mut metadata = base_metadata(&team_id, &channel_id, Some(&user_id));
            insert_str(&mut metadata, "slack_trigger_id", &trigger_id);
            insert_str(&mut metadata, "slack_action_id", &action_id);
            if let Some(ts) = &message_ts {
                insert_str(&mut metadata, "slack_message_ts", ts);
            }
            if let Some(ts) = &thread_ts {
                insert_str(&mut metadata, "slack_thread_ts", ts);
            }
            if let Some(block_id) = &block_id {
                insert_str(&mut metadata, "slack_block_id", block_id);
            }

            let content = MessageContent::Interaction {
                block_id,
                action_id,
                value: action.value.clone(),
                message_ts: message_ts.clone(),
            };

            inbound(
                id,
                conversation_id.clone(),
                user_id.clone(),
                content,
                metadata,
            )
        })
        .collect()
}

async fn handle_view_submission(submission: ViewSubmission, adapter_state: &SlackAdapterState) {
    let id = submission
        .trigger_id
        .clone()
        .unwrap_or_else(|| format!("view:{}", chrono::Utc::now().timestamp_micros()));

    let channel_id = submission.channel_id.clone().unwrap_or_default();
    let mut metadata = base_metadata(&submission.team_id, &channel_id, Some(&submission.user_id));
    if let Some(thread_ts) = &submission.thread_ts {
        insert_str(&mut metadata, "slack_thread_ts", thread_ts);
    }
    if channel_id.is_empty() {
        metadata.remove("slack_channel_id");
    }

    let (ack_tx, ack_rx) = oneshot::channel();
    adapter_state
        .pending_acks
        .lock()
        .await
        .insert(id.clone(), ack_tx);

    send_inbound(
        &adapter_state.inbound_tx,
        id.clone(),
        conversation_id(
            &submission.team_id,
            &channel_id,
            submission.thread_ts.as_deref(),
        ),
        submission.user_id,
        MessageContent::DialogSubmission {
            callback_id: submission.callback_id,
            values: submission.values,
        },
        metadata,
    )
    .await;

    match tokio::time::timeout(DIALOG_ACK_TIMEOUT, ack_rx).await {
        Ok(Ok(())) => tracing::debug!(message_id = %id, "view submission acknowledged"),
        _ => {
            adapter_state.pending_acks.lock().await.remove(&id);
            tracing::warn!(message_id = %id, "view submission was not acknowledged in time");
        }
    }
}

// ---------------------------------------------------------------------------
// Messaging trait impl
// ---------------------------------------------------------------------------

impl Messaging for SlackAdapter {
    fn name(&self) -> &str {
        "slack"
    }

    async fn start(&self) -> crate::Result<InboundStream> {
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let auth_response = self
            .session()
            .auth_test()
            .await
            .context("failed to call auth.test for bot user ID")?;
        let bot_user_id = auth_response.user_id.0.clone();
        tracing::info!(bot_user_id = %bot_user_id, "slack bot user ID resolved");

        let adapter_state = Arc::new(SlackAdapterState {
            inbound_tx,
            bot_user_id,
            pending_acks: self.pending_acks.clone(),
        });

        let callbacks = SlackSocketModeListenerCallbacks::new()
            .with_push_events(handle_push_event)
            .with_interaction_events(handle_interaction_event);

        // The socket mode listener owns its own client for the lifetime of the
        // WebSocket connection. The shared `self.client` is for REST calls only.
        let listener_client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new()
                .context("failed to create slack socket mode connector")?,
        ));

        let listener_environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(listener_client)
                .with_error_handler(slack_error_handler)
                .with_user_state(adapter_state),
        );

        let listener = SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment,
            callbacks,
        );

        let app_token = SlackApiToken::new(SlackApiTokenValue(self.app_token.clone()));

        tokio::spawn(async move {
            if let Err(error) = listener.listen_for(&app_token).await {
                tracing::error!(%error, "failed to start slack socket mode listener");
                return;
            }

            tracing::info!("slack socket mode connected");

            tokio::select! {
                exit_code = listener.serve() => {
                    tracing::info!(exit_code, "slack socket mode listener stopped");
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("slack socket mode shutting down");
                    listener.shutdown().await;
                }
            }
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(
            inbound_rx,
        )))
    }

    async fn respond(
        &self,
        message: &InboundMessage,
        response: OutboundResponse,
    ) -> crate::Result<()> {
        // Acks never leave the process; a modal-only submission has no channel either.
        if let OutboundResponse::DialogAck = response {
            match self.pending_acks.lock().await.remove(&message.id) {
                Some(ack_tx) => {
                    let _ = ack_tx.send(());
                }
                None => {
                    tracing::debug!(message_id = %message.id, "no pending slack view submission to acknowledge");
                }
            }
            return Ok(());
        }

        let session = self.session();
        let channel_id = extract_channel_id(message)?;

        match response {
            OutboundResponse::Text(text) => {
                let req = SlackApiChatPostMessageRequest::new(
                    channel_id,
                    SlackMessageContent::new().with_text(text),
                )
                .opt_thread_ts(extract_thread_ts(message));
                session
                    .chat_post_message(&req)
                    .await
                    .context("failed to send slack message")?;
            }

            OutboundResponse::RichMessage {
                text,
                blocks,
                color,
            } => {
                let content = rich_content(text, &blocks, color.as_deref());
                let req = SlackApiChatPostMessageRequest::new(channel_id, content)
                    .opt_thread_ts(extract_thread_ts(message));
                session
                    .chat_post_message(&req)
                    .await
                    .context("failed to send slack rich message")?;
            }

            OutboundResponse::ReplaceOriginal(text) => {
                let ts = extract_message_ts(message)
                    .context("missing slack_message_ts for replacing the original message")?;
                let req = replacement_request(channel_id, text, ts);
                session
                    .chat_update(&req)
                    .await
                    .context("failed to replace slack message")?;
            }

            OutboundResponse::OpenDialog { view } => {
                let trigger_id = message
                    .metadata_str("slack_trigger_id")
                    .map(|s| SlackTriggerId(s.to_string()))
                    .context("missing slack_trigger_id for opening a modal")?;
                let view: SlackView =
                    serde_json::from_value(with_dialog_context(message, &channel_id, view))
                        .context("invalid slack modal view")?;
                session
                    .views_open(&SlackApiViewsOpenRequest::new(trigger_id, view))
                    .await
                    .context("failed to open slack modal")?;
            }

            OutboundResponse::Reaction(emoji) => {
                let ts =
                    extract_message_ts(message).context("missing slack_message_ts for reaction")?;
                let req = SlackApiReactionsAddRequest::new(
                    channel_id,
                    SlackReactionName(sanitize_reaction_name(&emoji)),
                    ts,
                );
                session
                    .reactions_add(&req)
                    .await
                    .context("failed to add slack reaction")?;
            }

            OutboundResponse::DialogAck => {}
        }

        Ok(())
    }

    async fn health_check(&self) -> crate::Result<()> {
        self.session()
            .api_test(&SlackApiTestRequest::new())
            .await
            .context("slack health check failed")?;
        Ok(())
    }

    async fn shutdown(&self) -> crate::Result<()> {
        self.pending_acks.lock().await.clear();
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(()).await;
        }
        tracing::info!("slack adapter shut down");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Fields of a `view_submission` payload, read from its wire JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ViewSubmission {
    callback_id: String,
    team_id: String,
    user_id: String,
    trigger_id: Option<String>,
    channel_id: Option<String>,
    thread_ts: Option<String>,
    /// `action_id` → typed text or selected option value.
    values: HashMap<String, String>,
}

fn parse_view_submission(payload: &serde_json::Value) -> Option<ViewSubmission> {
    let str_at = |value: &serde_json::Value, key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let view = payload.get("view")?;
    let callback_id = str_at(view, "callback_id")?;
    let user_id = payload.get("user").and_then(|u| str_at(u, "id"))?;
    let team_id = payload
        .get("team")
        .and_then(|t| str_at(t, "id"))
        .or_else(|| str_at(view, "team_id"))
        .unwrap_or_default();

    let (channel_id, thread_ts) = str_at(view, "private_metadata")
        .map(|raw| decode_dialog_context(&raw))
        .unwrap_or((None, None));

    let mut values = HashMap::new();
    if let Some(blocks) = view
        .get("state")
        .and_then(|s| s.get("values"))
        .and_then(|v| v.as_object())
    {
        for actions in blocks.values().filter_map(|a| a.as_object()) {
            for (action_id, state) in actions {
                let value = state
                    .get("value")
                    .and_then(|v| v.as_str())
                    .or_else(|| {
                        state
                            .get("selected_option")
                            .and_then(|o| o.get("value"))
                            .and_then(|v| v.as_str())
                    });
                if let Some(value) = value {
                    values.insert(action_id.clone(), value.to_string());
                }
            }
        }
    }

    Some(ViewSubmission {
        callback_id,
        team_id,
        user_id,
        trigger_id: str_at(payload, "trigger_id"),
        channel_id,
        thread_ts,
        values,
    })
}

/// Read a typed submission back through its wire JSON.
fn read_view_submission(event: &SlackInteractionViewSubmissionEvent) -> Option<ViewSubmission> {
    match serde_json::to_value(event) {
        Ok(payload) => parse_view_submission(&payload),
        Err(error) => {
            tracing::warn!(%error, "failed to read slack view submission");
            None
        }
    }
}

/// Stamp the originating conversation into a modal view before it is opened.
fn with_dialog_context(
    message: &InboundMessage,
    channel_id: &SlackChannelId,
    mut view: serde_json::Value,
) -> serde_json::Value {
    let thread_ts = extract_thread_ts(message);
    if let Some(fields) = view.as_object_mut() {
        fields.insert(
            "private_metadata".into(),
            serde_json::Value::String(encode_dialog_context(
                &channel_id.0,
                thread_ts.as_ref().map(|t| t.0.as_str()),
            )),
        );
    }
    view
}

/// `chat.update` replacing a prompt with plain text. Slack keeps fields that are
/// left out, so blocks and attachments are both sent empty to drop the buttons.
fn replacement_request(
    channel_id: SlackChannelId,
    text: String,
    ts: SlackTs,
) -> SlackApiChatUpdateRequest {
    let content = SlackMessageContent::new()
        .with_text(text)
        .with_blocks(Vec::new())
        .with_attachments(Vec::new());
    SlackApiChatUpdateRequest::new(channel_id, content, ts)
}

/// `private_metadata` of an opened modal: `channel` or `channel:thread_ts`.
fn encode_dialog_context(channel_id: &str, thread_ts: Option<&str>) -> String {
    match thread_ts {
        Some(ts) => format!("{channel_id}:{ts}"),
        None => channel_id.to_string(),
    }
}

fn decode_dialog_context(raw: &str) -> (Option<String>, Option<String>) {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    match raw.split_once(':') {
        Some((channel, ts)) => (non_empty(channel), non_empty(ts)),
        None => (non_empty(raw), None),
    }
}

/// Scope of a plain `message` event, or `None` when `app_mention` will deliver it.
fn classify_message(channel_id: &str, text: &str, bot_user_id: &str) -> Option<MessageScope> {
    if channel_id.starts_with('D') {
        return Some(MessageScope::DirectMessage);
    }
    if text.contains(&format!("<@{bot_user_id}>")) {
        return None;
    }
    Some(MessageScope::Ambient)
}

fn mention_scope(text: &str, bot_user_id: &str) -> MessageScope {
    if text.trim_start().starts_with(&format!("<@{bot_user_id}>")) {
        MessageScope::DirectMention
    } else {
        MessageScope::Mention
    }
}

/// Strip the leading `<@BOT_USER_ID>` mention (and a trailing `:`) from mention text.
fn strip_bot_mention(text: &str, bot_user_id: &str) -> String {
    let mention = format!("<@{}>", bot_user_id);
    text.trim_start()
        .trim_start_matches(mention.as_str())
        .trim_start_matches(':')
        .trim_start()
        .to_string()
}

/// Sanitize an emoji name for Slack reactions (strip colons, lowercase).
fn sanitize_reaction_name(emoji: &str) -> String {
    emoji
        .trim()
        .trim_start_matches(':')
        .trim_end_matches(':')
        .to_lowercase()
}

fn conversation_id(team_id: &str, channel_id: &str, thread_ts: Option<&str>) -> String {
    match thread_ts {
        Some(ts) => format!("slack:{}:{}:{}", team_id, channel_id, ts),
        None => format!("slack:{}:{}", team_id, channel_id),
    }
}

fn insert_str(metadata: &mut HashMap<String, serde_json::Value>, key: &str, value: &str) {
    metadata.insert(key.into(), serde_json::Value::String(value.into()));
}

fn base_metadata(
    team_id: &str,
    channel_id: &str,
    user_id: Option<&str>,
) -> HashMap<String, serde_json::Value> {
    let mut metadata = HashMap::new();
    insert_str(&mut metadata, "slack_workspace_id", team_id);
    insert_str(&mut metadata, "slack_channel_id", channel_id);
    if let Some(uid) = user_id {
        insert_str(&mut metadata, "slack_user_id", uid);
        insert_str(&mut metadata, "sender_id", uid);
    }
    metadata
}

fn inbound(
    id: String,
    conversation_id: String,
    sender_id: String,
    content: MessageContent,
    metadata: HashMap<String, serde_json::Value>,
) -> InboundMessage {
    InboundMessage {
        id,
        source: "slack".into(),
        conversation_id,
        sender_id,
        content,
        timestamp: chrono::Utc::now(),
        metadata,
    }
}

async fn send_inbound(
    tx: &mpsc::Sender<InboundMessage>,
    id: String,
    conversation_id: String,
    sender_id: String,
    content: MessageContent,
    metadata: HashMap<String, serde_json::Value>,
) {
    let message = inbound(id, conversation_id, sender_id, content, metadata);
    if let Err(error) = tx.send(message).await {
        tracing::warn!(%error, "failed to send inbound message from Slack");
    }
}

fn extract_channel_id(message: &InboundMessage) -> anyhow::Result<SlackChannelId> {
    message
        .metadata_str("slack_channel_id")
        .filter(|s| !s.is_empty())
        .map(|s| SlackChannelId(s.to_string()))
        .context("missing slack_channel_id in metadata")
}

fn extract_message_ts(message: &InboundMessage) -> Option<SlackTs> {
    message
        .metadata_str("slack_message_ts")
        .map(|s| SlackTs(s.to_string()))
}

fn extract_thread_ts(message: &InboundMessage) -> Option<SlackTs> {
    message
        .metadata_str("slack_thread_ts")
        .map(|s| SlackTs(s.to_string()))
}

/// Deserialise raw Block Kit JSON, skipping (and logging) blocks Slack types reject.
fn deserialize_blocks(values: &[serde_json::Value]) -> Vec<SlackBlock> {
    values
        .iter()
        .filter_map(|v| match serde_json::from_value::<SlackBlock>(v.clone()) {
            Ok(block) => Some(block),
            Err(err) => {
                tracing::warn!(error = %err, "failed to deserialise slack block, skipping");
                None
            }
        })
        .collect()
}

/// Message content for a Block Kit message. With a color the blocks move into an
/// attachment so Slack draws the side bar.
fn rich_content(
    text: String,
    blocks: &[serde_json::Value],
    color: Option<&str>,
) -> SlackMessageContent {
    if let Some(color) = color {
        let raw = serde_json::json!({
            "text": text,
            "attachments": [{ "color": color, "fallback": text, "blocks": blocks }],
        });
        match serde_json::from_value::<SlackMessageContent>(raw) {
            Ok(content) => return content,
            Err(error) => {
                tracing::warn!(%error, "failed to build slack attachment, sending blocks without color");
            }
        }
    }

    let slack_blocks = deserialize_blocks(blocks);
    if slack_blocks.is_empty() {
        SlackMessageContent::new().with_text(text)
    } else {
        SlackMessageContent::new()
            .with_text(text)
            .with_blocks(slack_blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOT: &str = "U0BOT";

    fn submission_payload(private_metadata: &str) -> serde_json::Value {
        json!({
            "team": { "id": "T1", "domain": "acme" },
            "user": { "id": "U123", "team_id": "T1" },
            "trigger_id": "123.456.abc",
            "view": {
                "id": "V1",
                "team_id": "T1",
                "type": "modal",
                "callback_id": "submit_report",
                "private_metadata": private_metadata,
                "hash": "1700000000.abc",
                "state": {
                    "values": {
                        "title": { "title": { "type": "plain_text_input", "value": "Crash on export" } },
                        "severity": { "severity": {
                            "type": "static_select",
                            "selected_option": { "text": { "type": "plain_text", "text": "It's bad, dude" }, "value": "crit2" }
                        } },
                        "problem": { "problem": { "type": "plain_text_input", "value": "App crashes" } },
                        "reproduce": { "reproduce": { "type": "plain_text_input", "value": null } }
                    }
                }
            }
        })
    }

    #[test]
    fn view_submission_values_are_extracted() {
        let parsed = parse_view_submission(&submission_payload("C456:1700000000.000100"))
            .expect("payload parses");

        assert_eq!(parsed.callback_id, "submit_report");
        assert_eq!(parsed.team_id, "T1");
        assert_eq!(parsed.user_id, "U123");
        assert_eq!(parsed.trigger_id.as_deref(), Some("123.456.abc"));
        assert_eq!(parsed.channel_id.as_deref(), Some("C456"));
        assert_eq!(parsed.thread_ts.as_deref(), Some("1700000000.000100"));
        assert_eq!(parsed.values.get("title").map(String::as_str), Some("Crash on export"));
        assert_eq!(parsed.values.get("severity").map(String::as_str), Some("crit2"));
        assert!(!parsed.values.contains_key("reproduce"));
    }

    #[test]
    fn view_submission_without_thread_uses_channel_only() {
        let parsed = parse_view_submission(&submission_payload("D789")).expect("payload parses");
        assert_eq!(parsed.channel_id.as_deref(), Some("D789"));
        assert_eq!(parsed.thread_ts, None);
    }

    #[test]
    fn view_submission_missing_fields_is_rejected() {
        assert_eq!(parse_view_submission(&json!({ "type": "view_submission" })), None);
        assert_eq!(
            parse_view_submission(&json!({ "view": { "callback_id": "submit_report" } })),
            None
        );
    }

    #[test]
    fn dialog_context_round_trips() {
        let encoded = encode_dialog_context("C1", Some("1700000000.000100"));
        assert_eq!(
            decode_dialog_context(&encoded),
            (Some("C1".into()), Some("1700000000.000100".into()))
        );
        assert_eq!(decode_dialog_context("C1"), (Some("C1".into()), None));
    }

    #[test]
    fn messages_are_classified_by_channel_and_mention() {
        assert_eq!(classify_message("D1", "bug", BOT), Some(MessageScope::DirectMessage));
        assert_eq!(classify_message("C1", "bug", BOT), Some(MessageScope::Ambient));
        assert_eq!(classify_message("C1", "<@U0BOT> bug", BOT), None);
    }

    #[test]
    fn mentions_at_the_start_are_direct() {
        assert_eq!(mention_scope("<@U0BOT> a bug", BOT), MessageScope::DirectMention);
        assert_eq!(mention_scope("hey <@U0BOT> a bug", BOT), MessageScope::Mention);
    }

    #[test]
    fn strips_leading_mention_and_colon() {
        assert_eq!(strip_bot_mention("<@U0BOT>: found a bug", BOT), "found a bug");
        assert_eq!(strip_bot_mention("hey <@U0BOT>", BOT), "hey <@U0BOT>");
    }

    #[test]
    fn reaction_names_are_sanitized() {
        assert_eq!(sanitize_reaction_name(" :Robot_Face: "), "robot_face");
    }

    #[test]
    fn replacement_clears_blocks_and_attachments() {
        let req = replacement_request(
            SlackChannelId("C1".into()),
            "Problem is being filed.".into(),
            SlackTs("1700000000.000200".into()),
        );
        let wire = serde_json::to_value(&req).expect("request serializes");

        assert_eq!(wire["text"], "Problem is being filed.");
        assert_eq!(wire["blocks"], json!([]));
        assert_eq!(wire["attachments"], json!([]));
        assert_eq!(wire["ts"], "1700000000.000200");
    }

    fn threaded_click_payload() -> serde_json::Value {
        json!({
            "type": "block_actions",
            "user": { "id": "U123", "username": "ada", "name": "ada", "team_id": "T1" },
            "api_app_id": "A1",
            "token": "verification",
            "container": {
                "type": "message",
                "message_ts": "1700000000.000200",
                "channel_id": "C456",
                "is_ephemeral": false
            },
            "trigger_id": "123.456.abc",
            "team": { "id": "T1", "domain": "acme" },
            "channel": { "id": "C456", "name": "general" },
            "message": {
                "type": "message",
                "user": "U0BOT",
                "bot_id": "B1",
                "ts": "1700000000.000200",
                "thread_ts": "1700000000.000100",
                "text": "Would you like to report a problem?"
            },
            "response_url": "https://hooks.slack.com/actions/T1/1/abc",
            "actions": [{
                "type": "button",
                "action_id": "yes",
                "block_id": "bug_report",
                "text": { "type": "plain_text", "text": "Yes", "emoji": true },
                "value": "yes",
                "style": "primary",
                "action_ts": "1700000001.000300"
            }]
        })
    }

    #[test]
    fn threaded_click_keeps_the_thread_for_the_modal() {
        let event: SlackInteractionEvent =
            serde_json::from_value(threaded_click_payload()).expect("block_actions parses");
        let SlackInteractionEvent::BlockActions(block_actions) = event else {
            panic!("expected block_actions");
        };

        let messages = block_action_messages(block_actions);
        assert_eq!(messages.len(), 1);
        let click = &messages[0];
        assert_eq!(click.id, "123.456.abc");
        assert_eq!(click.metadata_str("slack_thread_ts"), Some("1700000000.000100"));
        assert_eq!(click.metadata_str("slack_message_ts"), Some("1700000000.000200"));
        assert_eq!(click.conversation_id, "slack:T1:C456:1700000000.000100");
        assert!(matches!(
            &click.content,
            MessageContent::Interaction { block_id: Some(block), value: Some(value), .. }
                if block == "bug_report" && value == "yes"
        ));

        let channel_id = extract_channel_id(click).expect("channel present");
        let view = with_dialog_context(click, &channel_id, json!({ "type": "modal" }));
        assert_eq!(view["private_metadata"], "C456:1700000000.000100");
    }

    #[test]
    fn typed_view_submission_keeps_values_and_channel() {
        let payload = json!({
            "type": "view_submission",
            "team": { "id": "T1", "domain": "acme" },
            "user": { "id": "U123", "username": "ada", "name": "ada", "team_id": "T1" },
            "api_app_id": "A1",
            "token": "verification",
            "trigger_id": "123.456.def",
            "view": {
                "id": "V1",
                "team_id": "T1",
                "type": "modal",
                "blocks": [],
                "private_metadata": "C456:1700000000.000100",
                "callback_id": "submit_report",
                "state": {
                    "values": {
                        "title": { "title": { "type": "plain_text_input", "value": "Crash on export" } },
                        "severity": { "severity": {
                            "type": "static_select",
                            "selected_option": {
                                "text": { "type": "plain_text", "text": "It's bad, dude", "emoji": true },
                                "value": "crit2"
                            }
                        } }
                    }
                },
                "hash": "1700000002.abc",
                "title": { "type": "plain_text", "text": "Bug Report", "emoji": true },
                "clear_on_close": false,
                "notify_on_close": false,
                "close": { "type": "plain_text", "text": "Cancel", "emoji": true },
                "submit": { "type": "plain_text", "text": "Submit", "emoji": true },
                "root_view_id": "V1",
                "app_id": "A1",
                "external_id": "",
                "app_installed_team_id": "T1",
                "bot_id": "B1"
            },
            "response_urls": []
        });

        let event: SlackInteractionEvent =
            serde_json::from_value(payload).expect("view_submission parses");
        let SlackInteractionEvent::ViewSubmission(submission) = event else {
            panic!("expected view_submission");
        };

        let parsed = read_view_submission(&submission).expect("submission is readable");
        assert_eq!(parsed.callback_id, "submit_report");
        assert_eq!(parsed.user_id, "U123");
        assert_eq!(parsed.trigger_id.as_deref(), Some("123.456.def"));
        assert_eq!(parsed.channel_id.as_deref(), Some("C456"));
        assert_eq!(parsed.thread_ts.as_deref(), Some("1700000000.000100"));
        assert_eq!(parsed.values.get("title").map(String::as_str), Some("Crash on export"));
        assert_eq!(parsed.values.get("severity").map(String::as_str), Some("crit2"));
    }
}
