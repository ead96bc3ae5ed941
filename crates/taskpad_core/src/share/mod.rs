//! Share-text rendering and channel dispatch.
//!
//! # Responsibility
//! - Render a task into its fixed two-line share text.
//! - Map the closed set of share channels to clipboard or URL handoff.
//! - Dispatch through a caller-provided sink and report failures.
//!
//! # Invariants
//! - Each share call targets exactly one channel; there is no fallback to
//!   another channel and no retry.
//! - Sharing never touches task state.

use crate::model::task::{Task, TaskId};
use crate::repo::task_repo::TaskRepository;
use crate::store::KeyValueStore;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Channel string value for copy-to-clipboard.
pub const SHARE_CHANNEL_CLIPBOARD: &str = "clipboard";
/// Channel string value for WhatsApp handoff.
pub const SHARE_CHANNEL_WHATSAPP: &str = "whatsapp";
/// Channel string value for Telegram handoff.
pub const SHARE_CHANNEL_TELEGRAM: &str = "telegram";
/// Channel string value for Facebook handoff.
pub const SHARE_CHANNEL_FACEBOOK: &str = "facebook";
/// Channel string value for VK handoff.
pub const SHARE_CHANNEL_VK: &str = "vk";

const SUPPORTED_SHARE_CHANNEL_STRINGS: &[&str] = &[
    SHARE_CHANNEL_CLIPBOARD,
    SHARE_CHANNEL_WHATSAPP,
    SHARE_CHANNEL_TELEGRAM,
    SHARE_CHANNEL_FACEBOOK,
    SHARE_CHANNEL_VK,
];

/// Destination of a share action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareChannel {
    Clipboard,
    WhatsApp,
    Telegram,
    Facebook,
    Vk,
}

impl ShareChannel {
    /// Stable string id used by the UI.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clipboard => SHARE_CHANNEL_CLIPBOARD,
            Self::WhatsApp => SHARE_CHANNEL_WHATSAPP,
            Self::Telegram => SHARE_CHANNEL_TELEGRAM,
            Self::Facebook => SHARE_CHANNEL_FACEBOOK,
            Self::Vk => SHARE_CHANNEL_VK,
        }
    }

    /// User-facing notice shown when the channel cannot be reached.
    pub fn unavailable_notice(self) -> &'static str {
        match self {
            Self::Clipboard => "Clipboard not available",
            Self::WhatsApp => "WhatsApp not installed",
            Self::Telegram => "Telegram not installed",
            Self::Facebook => "Facebook not available",
            Self::Vk => "VK not available",
        }
    }

    /// Builds the handoff URL for `text`; `None` for the clipboard.
    pub fn url_for(self, text: &str) -> Option<String> {
        let encoded = urlencoding::encode(text);
        match self {
            Self::Clipboard => None,
            Self::WhatsApp => Some(format!("whatsapp://send?text={encoded}")),
            Self::Telegram => Some(format!("tg://msg?text={encoded}")),
            Self::Facebook => Some(format!(
                "https://www.facebook.com/sharer/sharer.php?u={encoded}"
            )),
            Self::Vk => Some(format!("https://vk.com/share.php?comment={encoded}")),
        }
    }
}

impl Display for ShareChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns supported channel strings.
pub fn supported_share_channel_strings() -> &'static [&'static str] {
    SUPPORTED_SHARE_CHANNEL_STRINGS
}

/// Parses one channel from its UI string value.
pub fn parse_share_channel(value: &str) -> Result<ShareChannel, ShareError> {
    match value.trim() {
        SHARE_CHANNEL_CLIPBOARD => Ok(ShareChannel::Clipboard),
        SHARE_CHANNEL_WHATSAPP => Ok(ShareChannel::WhatsApp),
        SHARE_CHANNEL_TELEGRAM => Ok(ShareChannel::Telegram),
        SHARE_CHANNEL_FACEBOOK => Ok(ShareChannel::Facebook),
        SHARE_CHANNEL_VK => Ok(ShareChannel::Vk),
        other => Err(ShareError::UnsupportedChannel(other.to_string())),
    }
}

/// Renders the two-line share text for one task.
pub fn format_task(task: &Task) -> String {
    format!("Task: {}\n Description: {}", task.title, task.about)
}

/// Rendered share request for one task and channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
    pub channel: ShareChannel,
    pub text: String,
    /// Set for URL-scheme channels.
    pub url: Option<String>,
}

impl SharePayload {
    pub fn new(task: &Task, channel: ShareChannel) -> Self {
        let text = format_task(task);
        let url = channel.url_for(&text);
        Self { channel, text, url }
    }
}

/// Platform integration that performs the actual handoff.
pub trait ShareSink {
    fn copy_to_clipboard(&self, text: &str) -> Result<(), String>;
    fn open_url(&self, url: &str) -> Result<(), String>;
}

/// Share failures, reported per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    TaskNotFound(TaskId),
    UnsupportedChannel(String),
    ChannelUnavailable {
        channel: ShareChannel,
        reason: String,
    },
}

impl Display for ShareError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::UnsupportedChannel(value) => write!(
                f,
                "unsupported share channel `{value}`; expected {}",
                SUPPORTED_SHARE_CHANNEL_STRINGS.join("|")
            ),
            Self::ChannelUnavailable { channel, reason } => {
                write!(f, "{}: {reason}", channel.unavailable_notice())
            }
        }
    }
}

impl Error for ShareError {}

/// Renders and dispatches one task to one channel.
///
/// # Errors
/// - `TaskNotFound` when `id` is not in the collection.
/// - `ChannelUnavailable` when the sink rejects the handoff.
pub fn share_task<K: KeyValueStore>(
    repo: &TaskRepository<K>,
    id: TaskId,
    channel: ShareChannel,
    sink: &dyn ShareSink,
) -> Result<SharePayload, ShareError> {
    let task = repo.get(id).ok_or(ShareError::TaskNotFound(id))?;
    let payload = SharePayload::new(&task, channel);

    let dispatched = match payload.url.as_deref() {
        Some(url) => sink.open_url(url),
        None => sink.copy_to_clipboard(&payload.text),
    };

    match dispatched {
        Ok(()) => {
            info!("event=task_share module=share status=ok id={id} channel={channel}");
            Ok(payload)
        }
        Err(reason) => {
            warn!(
                "event=task_share module=share status=error id={id} channel={channel} error_code=channel_unavailable"
            );
            Err(ShareError::ChannelUnavailable { channel, reason })
        }
    }
}
