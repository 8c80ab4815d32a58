//! Plugin-level errors. Every variant is turned into a single chat reply at the
//! command-handler boundary; nothing reaches the host as a fault.

use crate::audio::AudioError;
use crate::host::HostError;
use crate::session::PROMPT_IMAGE_FILE;

/// Static resource a command needs from the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    AudioClips,
    PromptImage,
}

#[derive(Debug)]
pub enum PluginError {
    /// Game command used outside a group.
    NotInGroup,
    ResourceMissing(Resource),
    DecodeEncode(AudioError),
    /// A session is already running for the group.
    SessionConflict,
    UnexpectedSession(String),
    Host(HostError),
    /// Worker thread panicked or was cancelled.
    Worker(String),
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginError::NotInGroup => write!(f, "game requested outside a group"),
            PluginError::ResourceMissing(r) => write!(f, "resource missing: {r:?}"),
            PluginError::DecodeEncode(e) => write!(f, "audio processing failed: {e}"),
            PluginError::SessionConflict => write!(f, "session already running"),
            PluginError::UnexpectedSession(msg) => write!(f, "unexpected session error: {msg}"),
            PluginError::Host(e) => write!(f, "{e}"),
            PluginError::Worker(msg) => write!(f, "worker failed: {msg}"),
        }
    }
}

impl std::error::Error for PluginError {}

impl From<AudioError> for PluginError {
    fn from(e: AudioError) -> Self {
        PluginError::DecodeEncode(e)
    }
}

impl From<HostError> for PluginError {
    fn from(e: HostError) -> Self {
        PluginError::Host(e)
    }
}

impl PluginError {
    /// Text shown to the chat user.
    pub fn user_message(&self) -> String {
        match self {
            PluginError::NotInGroup => "不要一个人偷偷鹿。".to_string(),
            PluginError::ResourceMissing(Resource::AudioClips) => {
                "错误：data 目录中没有找到任何音频文件。".to_string()
            }
            PluginError::ResourceMissing(Resource::PromptImage) => {
                format!("错误：开鹿图片 '{PROMPT_IMAGE_FILE}' 不存在于 data 目录中。")
            }
            PluginError::SessionConflict => "机长正在执行航班计划！".to_string(),
            PluginError::UnexpectedSession(_) => "导管室出现未知错误，已强制关闭。".to_string(),
            PluginError::DecodeEncode(_) | PluginError::Host(_) | PluginError::Worker(_) => {
                "处理音频时发生严重错误，请检查后台日志。".to_string()
            }
        }
    }
}
