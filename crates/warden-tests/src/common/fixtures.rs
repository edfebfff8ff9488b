// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Temporary directories with token and configuration files, plus
//! ready-made gateway events.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use warden_config::WardenConfig;
use warden_core::gateway::{DeletedMessage, GatewayEvent, MemberInfo, MessageInfo};
use warden_core::types::{ChannelId, MessageId, UserId};

/// Token written by [`TestDir::with_token`].
pub const TEST_TOKEN: &str = "mock.token-0001";

// =============================================================================
// TestDir
// =============================================================================

/// A temporary directory laid out like a bot installation.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    /// Creates an empty directory.
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("warden-test")
            .tempdir()
            .expect("Failed to create temp directory");
        Self { dir }
    }

    /// Creates a directory holding a valid token file.
    pub fn with_token() -> Self {
        let dir = Self::new();
        dir.write_token(&format!("{}\n", TEST_TOKEN));
        dir
    }

    /// Root of the directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Data directory (not created).
    pub fn data_dir(&self) -> PathBuf {
        self.path().join("data")
    }

    /// Token file path.
    pub fn token_path(&self) -> PathBuf {
        self.path().join("token.txt")
    }

    /// Writes the token file verbatim.
    pub fn write_token(&self, content: &str) -> PathBuf {
        let path = self.token_path();
        std::fs::write(&path, content).expect("Failed to write token file");
        path
    }

    /// Writes `content` to `name` inside the directory.
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// A configuration pointing at this directory with short timeouts.
    pub fn config(&self) -> WardenConfig {
        let mut config = WardenConfig::default();
        config.bot.token_path = self.token_path();
        config.bot.data_dir = self.data_dir();
        config.gateway.connect_timeout_ms = 1_000;
        config.gateway.ready_timeout_ms = 1_000;
        config.gateway.initial_backoff_ms = 10;
        config.gateway.max_backoff_ms = 50;
        config.shutdown.step_timeout_ms = 2_000;
        config
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Configuration documents in each supported format.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// A complete TOML document.
    pub fn toml() -> &'static str {
        r#"
[bot]
name = "warden-toml"
token_path = "secrets/token.txt"
data_dir = "var/data"

[gateway]
url = "wss://gateway.example/ws"
retry_mode = "transient"
max_retries = 3

[runtime]
worker_threads = 2

[shutdown]
step_timeout_ms = 5000

[logging]
level = "debug"
format = "json"
"#
    }

    /// A YAML document with a placeholder default.
    pub fn yaml() -> &'static str {
        r#"
bot:
  name: warden-yaml
gateway:
  url: "${WARDEN_TEST_UNSET_GATEWAY:wss://fallback.example/ws}"
  retry_mode: never
logging:
  level: warn
"#
    }

    /// A JSON document.
    pub fn json() -> &'static str {
        r#"{
  "bot": { "name": "warden-json", "data_dir": "json-data" },
  "runtime": { "worker_threads": 8 }
}"#
    }
}

// =============================================================================
// Event Fixtures
// =============================================================================

/// Gateway events for driving subsystems.
pub struct EventFixtures;

impl EventFixtures {
    /// A member joined.
    pub fn join(user: u64, name: &str) -> GatewayEvent {
        GatewayEvent::MemberJoined(Self::member(user, name))
    }

    /// A member left.
    pub fn leave(user: u64, name: &str) -> GatewayEvent {
        GatewayEvent::MemberLeft(Self::member(user, name))
    }

    /// A message posted by a human in `channel`.
    pub fn message(channel: u64, author: u64, content: &str) -> GatewayEvent {
        GatewayEvent::MessageCreated(Self::message_info(channel, author, content))
    }

    /// A deleted message.
    pub fn deleted(channel: u64, message: u64) -> GatewayEvent {
        GatewayEvent::MessageDeleted(DeletedMessage {
            message_id: MessageId::new(message),
            channel_id: ChannelId::new(channel),
        })
    }

    /// Message payload.
    pub fn message_info(channel: u64, author: u64, content: &str) -> MessageInfo {
        MessageInfo {
            message_id: MessageId::new(author * 1_000 + channel),
            channel_id: ChannelId::new(channel),
            author_id: UserId::new(author),
            author_is_bot: false,
            content: content.to_string(),
        }
    }

    fn member(user: u64, name: &str) -> MemberInfo {
        MemberInfo {
            user_id: UserId::new(user),
            username: name.to_string(),
            bot: false,
        }
    }
}
