use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub signaling: SignalingConfig,
    pub media: MediaConfig,
    pub transcription: TranscriptionConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the session REST service, e.g. "http://localhost:8080/api"
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SignalingConfig {
    /// Signaling broker URL, e.g. "nats://localhost:4222"
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaConfig {
    /// STUN servers handed to the platform WebRTC engine
    #[serde(default = "default_stun_servers")]
    pub stun_servers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionConfig {
    /// Initial recognition locale, e.g. "en-US"
    pub locale: String,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Directory for the scheduled-sessions list and transcript backups
    pub dir: String,
}

fn default_stun_servers() -> Vec<String> {
    vec![
        "stun:stun.l.google.com:19302".to_string(),
        "stun:stun1.l.google.com:19302".to_string(),
        "stun:stun2.l.google.com:19302".to_string(),
        "stun:stun3.l.google.com:19302".to_string(),
        "stun:stun4.l.google.com:19302".to_string(),
    ]
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
