//! CLI command implementations

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::db::{DecodeFailure, DiskRecord, RecordStore};
use crate::observability::Logger;
use crate::web::{Connection, Server};

use super::errors::{CliError, CliResult};

/// The domain the stock server persists: one line of text per record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Message {
    index: u64,
    body: String,
}

impl Message {
    fn new(body: &str) -> Self {
        Self {
            index: 0,
            body: body.to_string(),
        }
    }
}

impl DiskRecord for Message {
    fn index(&self) -> u64 {
        self.index
    }

    fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    fn serialize(&self) -> String {
        format!("{} {}", self.index, self.body)
    }

    fn deserialize(text: &str) -> Result<Self, DecodeFailure> {
        let (raw_index, body) = text
            .split_once(' ')
            .ok_or_else(|| DecodeFailure::new("expected \"<index> <body>\""))?;
        let index = raw_index
            .parse()
            .map_err(|_| DecodeFailure::new(format!("bad index {:?}", raw_index)))?;
        Ok(Self {
            index,
            body: body.to_string(),
        })
    }
}

/// Write a default configuration file.
///
/// Refuses to clobber an existing config. The data directory itself is not
/// created here; each record store creates its own domain directory on
/// first use.
pub fn init(config_path: &Path) -> CliResult<()> {
    if config_path.exists() {
        return Err(CliError::AlreadyInitialized(
            config_path.display().to_string(),
        ));
    }

    let config = Config::default();
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| ConfigError::Malformed(e.to_string()))?;
    fs::write(config_path, json + "\n")?;

    Logger::info(
        "SYSTEM_INITIALIZED",
        &[
            ("config", &config_path.display().to_string()),
            ("data_dir", &config.data_dir),
        ],
    );
    Ok(())
}

/// Boot the stack and serve until interrupted.
///
/// Wiring order: load config, open the record store (lazy, no disk touched
/// yet), start the async runtime and the socket server, park on ctrl-c.
/// Shutdown order is the reverse, and the store's queue gets a full drain so
/// an orderly exit loses nothing.
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    Logger::info(
        "SYSTEM_STARTING",
        &[
            ("at", &chrono::Utc::now().to_rfc3339()),
            ("config", &config_path.display().to_string()),
        ],
    );

    let store = Arc::new(RecordStore::<Message>::open(
        config.data_path().join("messages"),
    )?);

    let rt = tokio::runtime::Runtime::new()?;
    let addr = config.socket_addr();
    let handler_store = store.clone();
    rt.block_on(async move {
        let server = Server::start(addr.as_str(), move |conn| {
            let store = handler_store.clone();
            async move { converse(conn, store).await }
        })
        .await?;

        tokio::signal::ctrl_c().await?;
        server.shutdown().await;
        Ok::<(), io::Error>(())
    })?;

    store.stop();
    Logger::info("SYSTEM_STOPPED", &[]);
    Ok(())
}

/// One conversation: a line-oriented protocol over a single connection.
///
/// PING answers PONG, `PUT <text>` persists a message and answers its
/// assigned index, LIST answers the stored bodies, QUIT ends the
/// conversation, anything else is echoed back.
async fn converse(mut conn: Connection, store: Arc<RecordStore<Message>>) {
    loop {
        let line = match conn.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };

        let reply = match line.trim() {
            "QUIT" => {
                let _ = conn.close().await;
                return;
            }
            "PING" => "PONG".to_string(),
            "LIST" => match store.stream() {
                Ok(messages) => {
                    let bodies: Vec<&str> =
                        messages.iter().map(|m| m.body.as_str()).collect();
                    format!("{} stored: [{}]", bodies.len(), bodies.join(", "))
                }
                Err(e) => format!("ERR {}", e),
            },
            other => match other.strip_prefix("PUT ") {
                Some(body) => match store.persist(Message::new(body)) {
                    Ok(message) => format!("OK {}", message.index),
                    Err(e) => format!("ERR {}", e),
                },
                None => other.to_string(),
            },
        };

        if conn.send_line(&reply).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_round_trip() {
        let mut message = Message::new("hello there");
        message.set_index(12);
        assert_eq!(Message::deserialize(&message.serialize()).unwrap(), message);
    }

    #[test]
    fn test_init_refuses_existing_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("shaledb.json");
        fs::write(&config_path, "{}").unwrap();

        let result = init(&config_path);
        assert!(matches!(result, Err(CliError::AlreadyInitialized(_))));
    }

    #[test]
    fn test_init_writes_loadable_config_and_nothing_else() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("shaledb.json");

        init(&config_path).unwrap();
        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.port, Config::default().port);

        // The config file is init's only filesystem effect; domain
        // directories appear when a record store first uses them.
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("shaledb.json")]);
    }
}
