use serde::{Deserialize, Serialize};

/// Stream parameters advertised with the publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOptions {
    pub codec: String,
    pub resolution: String,
    #[serde(rename = "bandwidth")]
    pub bandwidth_kbps: u32,
    #[serde(rename = "audio")]
    pub audio_enabled: bool,
    #[serde(rename = "video")]
    pub video_enabled: bool,
    #[serde(rename = "screen")]
    pub screen_share: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            codec: "VP8".to_owned(),
            resolution: "hd".to_owned(),
            bandwidth_kbps: 1024,
            audio_enabled: true,
            video_enabled: true,
            screen_share: false,
        }
    }
}
