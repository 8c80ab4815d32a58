//! The plugin object the host loads: owns config, milestone table, session
//! registry and audio codec, and exposes the two command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{error, info, warn};

use crate::audio::{self, AudioCodec};
use crate::config::PluginConfig;
use crate::error::{PluginError, Resource};
use crate::host::{ChatEvent, OutgoingMessage};
use crate::listener::{self, Flow, IncomingMessage, ListenOutcome};
use crate::milestone::{MilestoneTable, MILESTONE_FILE};
use crate::session::{
    render_leaderboard, KeywordRules, MessageKind, SessionRegistry, PROMPT_IMAGE_FILE,
    STOP_PHRASE,
};
use crate::state_machine::EndReason;

const OUTPUT_PREFIX: &str = "processed_";

/// Removes the processed clip when the handler exits.
struct TempOutput(PathBuf);

impl Drop for TempOutput {
    fn drop(&mut self) {
        if !self.0.exists() {
            return;
        }
        match std::fs::remove_file(&self.0) {
            Ok(()) => info!(path = %self.0.display(), "temp output removed"),
            Err(e) => error!(path = %self.0.display(), error = %e, "temp output cleanup failed"),
        }
    }
}

pub struct JhdjPlugin {
    config: PluginConfig,
    data_dir: PathBuf,
    milestones: MilestoneTable,
    rules: KeywordRules,
    sessions: SessionRegistry,
    codec: Arc<dyn AudioCodec>,
}

impl JhdjPlugin {
    /// Validate config, create the data directory and load the milestone table.
    pub fn new(
        config: PluginConfig,
        data_dir: impl Into<PathBuf>,
        codec: Arc<dyn AudioCodec>,
    ) -> Self {
        let config = config.validated();
        let data_dir = data_dir.into();
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            warn!(path = %data_dir.display(), error = %e, "data directory could not be created");
        }
        let milestones = MilestoneTable::load(&data_dir.join(MILESTONE_FILE));

        let vc = &config.volume_config;
        info!(
            min_volume = vc.min_volume,
            max_volume = vc.max_volume,
            min_speed_ms = vc.min_speed_ms,
            max_speed_ms = vc.max_speed_ms,
            game_minutes = config.kailu_game_duration,
            milestones = milestones.len(),
            "jiahao plugin loaded"
        );

        Self {
            config,
            data_dir,
            milestones,
            rules: KeywordRules::default(),
            sessions: SessionRegistry::new(),
            codec,
        }
    }

    pub fn with_keyword_rules(mut self, rules: KeywordRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Replies are best-effort; a failed delivery is logged and dropped.
    fn reply(event: &dyn ChatEvent, message: OutgoingMessage) {
        if let Err(e) = event.reply(message) {
            error!(origin = %event.origin_id(), error = %e, "reply failed");
        }
    }

    fn reject(event: &dyn ChatEvent, e: PluginError) {
        Self::reply(event, OutgoingMessage::Plain(e.user_message()));
    }

    // --- jhdj ---

    /// Candidate source clips: files the codec accepts, excluding in-flight outputs.
    pub fn source_clips(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.data_dir.display(), error = %e, "data directory unreadable");
                return Vec::new();
            }
        };
        let mut clips: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && self.codec.accepts(p))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| !n.starts_with(OUTPUT_PREFIX))
            })
            .collect();
        clips.sort();
        clips
    }

    /// `jhdj`: envelope a random clip and send it back as a voice message.
    pub async fn handle_jhdj(&self, event: Arc<dyn ChatEvent>) {
        if let Err(e) = self.run_jhdj(event.as_ref()).await {
            error!(error = %e, "jhdj failed");
            Self::reject(event.as_ref(), e);
        }
    }

    async fn run_jhdj(&self, event: &dyn ChatEvent) -> Result<(), PluginError> {
        let clips = self.source_clips();
        let input = clips
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(PluginError::ResourceMissing(Resource::AudioClips))?;
        let input_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self::reply(
            event,
            OutgoingMessage::Plain(format!(
                "收到请求，正在处理音频 '{input_name}'，这可能需要一些时间，请稍候..."
            )),
        );

        let output = self.data_dir.join(format!(
            "{OUTPUT_PREFIX}{}_{input_name}",
            uuid::Uuid::new_v4().simple()
        ));
        let _cleanup = TempOutput(output.clone());

        let codec = Arc::clone(&self.codec);
        let volume = self.config.volume_config;
        let out = output.clone();
        tokio::task::spawn_blocking(move || {
            let mut rng = StdRng::from_entropy();
            audio::process_file(codec.as_ref(), &input, &out, &volume, &mut rng)
        })
        .await
        .map_err(|e| PluginError::Worker(e.to_string()))??;

        info!(path = %output.display(), "sending processed clip as voice");
        event.reply(OutgoingMessage::Voice(output))?;
        Ok(())
    }

    // --- 开鹿 ---

    /// `开鹿`: run one tally game for the invoking group until stop, timeout or error.
    pub async fn handle_kailu(&self, event: Arc<dyn ChatEvent>) {
        let group = match event.group_id().filter(|g| !g.is_empty()) {
            Some(g) => g,
            None => return Self::reject(event.as_ref(), PluginError::NotInGroup),
        };

        if self.sessions.is_running(&group) {
            return Self::reject(event.as_ref(), PluginError::SessionConflict);
        }

        let image = self.data_dir.join(PROMPT_IMAGE_FILE);
        if !image.is_file() {
            warn!(path = %image.display(), "prompt image missing");
            return Self::reject(event.as_ref(), PluginError::ResourceMissing(Resource::PromptImage));
        }

        let (handle, listener) = listener::scoped(self.config.game_duration());
        if let Err(e) = self.sessions.try_start(&group, handle) {
            return Self::reject(event.as_ref(), e);
        }
        let guard = self.sessions.guard(&group);
        let minutes = self.config.kailu_game_duration;
        info!(group = %group, minutes, "kailu session started");

        let prompt = OutgoingMessage::ImageWithText {
            image,
            text: format!("导管室开放！持续时间 {minutes} 分钟。\n发送“{STOP_PHRASE}”可以提前迫降。"),
        };
        let outcome = match event.reply(prompt) {
            Ok(()) => {
                listener
                    .listen(|message| self.on_session_message(&group, event.as_ref(), message))
                    .await
            }
            Err(e) => ListenOutcome::Failed(PluginError::from(e)),
        };

        let mut failure = None;
        let reason = match outcome {
            ListenOutcome::Stopped => EndReason::ManualStop,
            ListenOutcome::TimedOut => {
                Self::reply(
                    event.as_ref(),
                    OutgoingMessage::Plain(format!("{minutes} 分钟时间到，航班降落！")),
                );
                EndReason::Timeout
            }
            ListenOutcome::Cancelled => EndReason::Shutdown,
            ListenOutcome::Failed(e) => {
                error!(group = %group, error = %e, "kailu session failed");
                failure = Some(PluginError::UnexpectedSession(e.to_string()));
                EndReason::ForcedStop
            }
        };

        let leaderboard = guard
            .finish()
            .map(|session| session.leaderboard())
            .unwrap_or_default();
        info!(group = %group, reason = %reason, players = leaderboard.len(), "kailu session ended");
        Self::reply(event.as_ref(), OutgoingMessage::Plain(render_leaderboard(&leaderboard)));
        if let Some(e) = failure {
            Self::reply(event.as_ref(), OutgoingMessage::Plain(e.user_message()));
        }
    }

    /// Per-message step of a running session.
    fn on_session_message(
        &self,
        group: &str,
        event: &dyn ChatEvent,
        message: IncomingMessage,
    ) -> Result<Flow, PluginError> {
        match self.rules.classify(&message.text) {
            MessageKind::Stop => {
                event.reply(OutgoingMessage::plain("本次航班已紧急迫降。"))?;
                Ok(Flow::Stop)
            }
            MessageKind::Keyword => {
                let count = self.sessions.tally(group, &message.sender_id).ok_or_else(|| {
                    PluginError::UnexpectedSession(format!("session for {group} vanished"))
                })?;
                info!(group, sender = %message.sender_id, count, "tally");
                if let Some(text) = self.milestones.get(count) {
                    event.reply(OutgoingMessage::plain(text))?;
                }
                Ok(Flow::Continue)
            }
            MessageKind::Other => Ok(Flow::Continue),
        }
    }

    // --- host plumbing ---

    /// Route a non-command message to the session of its group (or origin).
    /// Returns true if a running session took it.
    pub fn dispatch(&self, event: &dyn ChatEvent) -> bool {
        let key = event.session_key();
        self.sessions.route(
            &key,
            IncomingMessage {
                sender_id: event.sender_id(),
                text: event.text(),
            },
        )
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.sessions.is_running(key)
    }

    /// Plugin unload: end every running session. Leaderboards are still sent.
    pub fn terminate(&self) {
        let cancelled = self.sessions.cancel_all();
        info!(cancelled, "jiahao plugin terminating");
    }
}
