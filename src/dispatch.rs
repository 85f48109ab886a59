//! Delivery of the rendered report to the destination channel.
//!
//! The destination is an external messaging service. A [`ChannelConnector`]
//! turns the configured credentials into a [`MessageChannel`];
//! [`ChannelSession`] owns that channel for one run and must be closed with
//! [`ChannelSession::close`].

use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::ChannelConfig;

/// Hard per-message size limit of the destination channel, in characters.
pub const MESSAGE_LIMIT: usize = 4000;
pub const CHUNK_PAUSE: Duration = Duration::from_secs(1);

#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send_message(&self, destination: &str, text: &str) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
}

/// Splits `report` into pieces of whole lines, each at most `limit` characters.
///
/// Line terminators stay attached to their line, so concatenating the chunks
/// gives back `report` exactly. A single line longer than `limit` is the only
/// thing ever cut, at character boundaries.
pub fn split_into_chunks(report: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in report.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                let piece: String = piece.iter().collect();
                if piece.chars().count() == limit {
                    chunks.push(piece);
                } else {
                    current_len = piece.chars().count();
                    current = piece;
                }
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { chunks: usize },
    Skipped(String),
    Failed(String),
}

/// An open channel plus the destination it posts to.
pub struct ChannelSession<C: MessageChannel> {
    channel: C,
    destination: String,
}

impl<C: MessageChannel> ChannelSession<C> {
    pub fn new(channel: C, destination: String) -> Self {
        Self {
            channel,
            destination,
        }
    }

    pub async fn close(self) {
        match self.channel.disconnect().await {
            Ok(()) => println!("🔚 Channel client disconnected"),
            Err(e) => warn!(error = %e, "Failed to disconnect channel client"),
        }
    }
}

/// Sends the report, chunked when it exceeds [`MESSAGE_LIMIT`].
///
/// Without a session or destination this is a no-op that says why.
pub async fn dispatch<C: MessageChannel>(
    session: Option<&ChannelSession<C>>,
    report: &str,
    record_count: usize,
) -> DispatchOutcome {
    let Some(session) = session else {
        return DispatchOutcome::Skipped("channel client is not initialized".to_string());
    };
    if session.destination.trim().is_empty() {
        return DispatchOutcome::Skipped("no destination channel configured".to_string());
    }

    let chunks = if report.chars().count() > MESSAGE_LIMIT {
        split_into_chunks(report, MESSAGE_LIMIT)
    } else {
        vec![report.to_string()]
    };

    for (index, chunk) in chunks.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(CHUNK_PAUSE).await;
        }
        if let Err(e) = session
            .channel
            .send_message(&session.destination, chunk)
            .await
        {
            warn!(chunk = index + 1, total = chunks.len(), error = %e, "Failed to send report");
            return DispatchOutcome::Failed(e.to_string());
        }
    }

    info!(
        destination = %session.destination,
        chunks = chunks.len(),
        vacancies = record_count,
        "Report sent to channel"
    );
    DispatchOutcome::Sent {
        chunks: chunks.len(),
    }
}

/// Opens a live [`MessageChannel`] from the configured credentials.
///
/// This is where a client for the destination messaging service plugs in.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    type Channel: MessageChannel;

    async fn connect(&self, config: &ChannelConfig) -> Result<Self::Channel>;
}

/// Channel type with no values: nothing can be sent through it.
pub enum Unlinked {}

#[async_trait]
impl MessageChannel for Unlinked {
    async fn send_message(&self, _destination: &str, _text: &str) -> Result<()> {
        match *self {}
    }

    async fn disconnect(&self) -> Result<()> {
        match *self {}
    }
}

/// Connector used while no messaging client is linked into the binary.
pub struct UnlinkedConnector;

#[async_trait]
impl ChannelConnector for UnlinkedConnector {
    type Channel = Unlinked;

    async fn connect(&self, config: &ChannelConfig) -> Result<Unlinked> {
        Err(anyhow!(
            "no messaging client is linked into this build (destination {})",
            config.destination
        ))
    }
}

/// Opens the channel; any connection failure downgrades to `None`.
pub async fn open_session<K: ChannelConnector>(
    connector: &K,
    config: &ChannelConfig,
) -> Option<ChannelSession<K::Channel>> {
    debug!(channel = ?config, "Opening channel session");
    match connector.connect(config).await {
        Ok(channel) => {
            println!("✅ Channel client initialized");
            Some(ChannelSession::new(channel, config.destination.clone()))
        }
        Err(e) => {
            println!("❌ Channel client initialization failed: {:#}", e);
            None
        }
    }
}
