//! Encoder and muxer capability detection.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::MediaEngine;

/// Optional elements detected on the system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    pub flacenc: bool,
    pub wavenc: bool,
    pub vorbisenc: bool,
    pub lamemp3enc: bool,
    pub faac: bool,
    pub avenc_aac: bool,
    pub opusenc: bool,
    pub oggmux: bool,
    pub mp4mux: bool,
    /// VBR header writer for MP3
    pub xingmux: bool,
    pub id3mux: bool,
    pub id3v2mux: bool,
}

const OPTIONAL_ELEMENTS: [&str; 12] = [
    "flacenc",
    "wavenc",
    "vorbisenc",
    "lamemp3enc",
    "faac",
    "avenc_aac",
    "opusenc",
    "oggmux",
    "mp4mux",
    "xingmux",
    "id3mux",
    "id3v2mux",
];

impl EncoderCapabilities {
    /// Asks the engine about every optional element concurrently.
    pub async fn detect(engine: &dyn MediaEngine) -> Self {
        let found = join_all(OPTIONAL_ELEMENTS.iter().map(|e| engine.has_element(e))).await;
        let has = |name: &str| {
            OPTIONAL_ELEMENTS
                .iter()
                .position(|p| *p == name)
                .and_then(|i| found.get(i).copied())
                .unwrap_or(false)
        };

        let caps = Self {
            flacenc: has("flacenc"),
            wavenc: has("wavenc"),
            vorbisenc: has("vorbisenc"),
            lamemp3enc: has("lamemp3enc"),
            faac: has("faac"),
            avenc_aac: has("avenc_aac"),
            opusenc: has("opusenc"),
            oggmux: has("oggmux"),
            mp4mux: has("mp4mux"),
            xingmux: has("xingmux"),
            id3mux: has("id3mux"),
            id3v2mux: has("id3v2mux"),
        };
        debug!(engine = engine.name(), ?caps, "Detected encoder capabilities");
        caps
    }

    /// Everything available, for engines that cannot be queried.
    pub fn all() -> Self {
        Self {
            flacenc: true,
            wavenc: true,
            vorbisenc: true,
            lamemp3enc: true,
            faac: true,
            avenc_aac: true,
            opusenc: true,
            oggmux: true,
            mp4mux: true,
            xingmux: true,
            id3mux: true,
            id3v2mux: true,
        }
    }

    /// Preferred AAC encoder element.
    pub fn aac_encoder(&self) -> Option<&'static str> {
        if self.faac {
            Some("faac")
        } else if self.avenc_aac {
            Some("avenc_aac")
        } else {
            None
        }
    }

    /// Preferred ID3 tag muxer element.
    pub fn id3_muxer(&self) -> Option<&'static str> {
        if self.id3mux {
            Some("id3mux")
        } else if self.id3v2mux {
            Some("id3v2mux")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;

    #[test]
    fn test_default_capabilities() {
        let caps = EncoderCapabilities::default();
        assert!(!caps.flacenc);
        assert_eq!(caps.aac_encoder(), None);
        assert_eq!(caps.id3_muxer(), None);
    }

    #[test]
    fn test_aac_encoder_fallback() {
        let caps = EncoderCapabilities {
            avenc_aac: true,
            ..Default::default()
        };
        assert_eq!(caps.aac_encoder(), Some("avenc_aac"));

        let caps = EncoderCapabilities {
            faac: true,
            avenc_aac: true,
            id3v2mux: true,
            ..Default::default()
        };
        assert_eq!(caps.aac_encoder(), Some("faac"));
        assert_eq!(caps.id3_muxer(), Some("id3v2mux"));
    }

    #[tokio::test]
    async fn test_detect_from_engine() {
        let engine = MockEngine::new().with_elements(&["flacenc", "oggmux", "vorbisenc"]);
        let caps = EncoderCapabilities::detect(&engine).await;
        assert!(caps.flacenc);
        assert!(caps.vorbisenc);
        assert!(!caps.lamemp3enc);
        assert!(!caps.xingmux);
    }
}
