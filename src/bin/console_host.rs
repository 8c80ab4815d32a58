//! Minimal stdin host for trying the plugin locally.
//!
//! Usage: `jiahao-console [data_dir] [config.json]`
//! Each input line is `<group|-> <sender> <text>`; `-` means a private chat.
//! `jhdj` and `开鹿` are treated as commands, everything else as chat.

use std::path::PathBuf;
use std::sync::Arc;

use jiahao::audio::wav::WavCodec;
use jiahao::{ChatEvent, HostError, JhdjPlugin, OutgoingMessage, PluginConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

struct ConsoleEvent {
    group: Option<String>,
    sender: String,
    text: String,
}

impl ChatEvent for ConsoleEvent {
    fn group_id(&self) -> Option<String> {
        self.group.clone()
    }

    fn origin_id(&self) -> String {
        match &self.group {
            Some(g) => format!("group:{g}"),
            None => format!("private:{}", self.sender),
        }
    }

    fn sender_id(&self) -> String {
        self.sender.clone()
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn reply(&self, message: OutgoingMessage) -> Result<(), HostError> {
        let origin = self.origin_id();
        match message {
            OutgoingMessage::Plain(text) => println!("[{origin}] {text}"),
            OutgoingMessage::Voice(path) => println!("[{origin}] <voice {}>", path.display()),
            OutgoingMessage::ImageWithText { image, text } => {
                println!("[{origin}] <image {}> {text}", image.display())
            }
        }
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<ConsoleEvent> {
    let mut parts = line.splitn(3, ' ');
    let group = parts.next()?;
    let sender = parts.next()?;
    let text = parts.next().unwrap_or_default();
    Some(ConsoleEvent {
        group: (group != "-").then(|| group.to_string()),
        sender: sender.to_string(),
        text: text.to_string(),
    })
}

#[tokio::main]
async fn main() {
    jiahao::init_tracing();

    let mut args = std::env::args().skip(1);
    let data_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data"));
    let config = match args.next() {
        Some(path) => PluginConfig::load_from_file(&PathBuf::from(path)).unwrap_or_else(|e| {
            warn!(error = %e, "config load failed, using defaults");
            PluginConfig::default()
        }),
        None => PluginConfig::default(),
    };

    let plugin = Arc::new(JhdjPlugin::new(config, data_dir, Arc::new(WavCodec)));
    info!("console host ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };
        let Some(event) = parse_line(line.trim()) else {
            continue;
        };
        let event: Arc<dyn ChatEvent> = Arc::new(event);
        match event.text().trim() {
            "jhdj" => {
                let plugin = Arc::clone(&plugin);
                tokio::spawn(async move { plugin.handle_jhdj(event).await });
            }
            "开鹿" => {
                let plugin = Arc::clone(&plugin);
                tokio::spawn(async move { plugin.handle_kailu(event).await });
            }
            _ => {
                plugin.dispatch(event.as_ref());
            }
        }
    }

    plugin.terminate();
    // let session tasks post their leaderboards
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
}
