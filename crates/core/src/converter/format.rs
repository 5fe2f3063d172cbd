//! Output formats and the encoder stages producing them.

use serde::{Deserialize, Serialize};

use crate::engine::EncoderCapabilities;
use crate::pipeline::{PipelineError, Stage};

/// How lamemp3enc spends its bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mp3Mode {
    /// Constant bitrate; `quality` is the bitrate in kbps.
    Cbr,
    /// Average bitrate; `quality` is the bitrate in kbps.
    Abr,
    /// Variable bitrate; `quality` is the lame VBR quality, 0 (best) to 9.
    #[default]
    Vbr,
}

/// Target format with its quality knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum OutputFormat {
    /// Lossless compressed.
    Flac {
        #[serde(default = "default_flac_compression")]
        compression: u8,
    },
    /// Uncompressed.
    Wav {
        /// Bits per sample: 8, 16, 24 or 32.
        #[serde(default = "default_wav_sample_width")]
        sample_width: u8,
    },
    /// Lossy, constant quality.
    Vorbis {
        /// -0.1 to 1.0
        #[serde(default = "default_vorbis_quality")]
        quality: f64,
    },
    Mp3 {
        #[serde(default)]
        mode: Mp3Mode,
        #[serde(default = "default_mp3_quality")]
        quality: u32,
    },
    Aac {
        #[serde(default = "default_aac_bitrate")]
        bitrate_kbps: u32,
    },
    Opus {
        #[serde(default = "default_opus_bitrate")]
        bitrate_kbps: u32,
    },
}

fn default_flac_compression() -> u8 {
    8
}

fn default_wav_sample_width() -> u8 {
    16
}

fn default_vorbis_quality() -> f64 {
    0.6
}

fn default_mp3_quality() -> u32 {
    3
}

fn default_aac_bitrate() -> u32 {
    192
}

fn default_opus_bitrate() -> u32 {
    96
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Vorbis {
            quality: default_vorbis_quality(),
        }
    }
}

impl OutputFormat {
    /// Short identifier, as used in configuration.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Flac { .. } => "flac",
            Self::Wav { .. } => "wav",
            Self::Vorbis { .. } => "vorbis",
            Self::Mp3 { .. } => "mp3",
            Self::Aac { .. } => "aac",
            Self::Opus { .. } => "opus",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Flac { .. } => "audio/x-flac",
            Self::Wav { .. } => "audio/x-wav",
            Self::Vorbis { .. } => "audio/x-vorbis",
            Self::Mp3 { .. } => "audio/mpeg",
            Self::Aac { .. } => "audio/x-m4a",
            Self::Opus { .. } => "audio/ogg; codecs=opus",
        }
    }

    /// File extension without dot. Vorbis may use `oga` instead of `ogg`.
    pub fn extension(&self, vorbis_oga: bool) -> &'static str {
        match self {
            Self::Flac { .. } => "flac",
            Self::Wav { .. } => "wav",
            Self::Vorbis { .. } if vorbis_oga => "oga",
            Self::Vorbis { .. } => "ogg",
            Self::Mp3 { .. } => "mp3",
            Self::Aac { .. } => "m4a",
            Self::Opus { .. } => "opus",
        }
    }

    /// Whether the elements this format needs were detected.
    pub fn is_available(&self, caps: &EncoderCapabilities) -> bool {
        match self {
            Self::Flac { .. } => caps.flacenc,
            Self::Wav { .. } => caps.wavenc,
            Self::Vorbis { .. } => caps.vorbisenc && caps.oggmux,
            Self::Mp3 { .. } => caps.lamemp3enc,
            Self::Aac { .. } => caps.aac_encoder().is_some() && caps.mp4mux,
            Self::Opus { .. } => caps.opusenc && caps.oggmux,
        }
    }

    /// Checks the quality knob, returning a description of what is wrong.
    pub fn check(&self) -> Result<(), String> {
        match *self {
            Self::Flac { compression } if compression > 8 => {
                Err(format!("flac compression must be 0-8, got {}", compression))
            }
            Self::Wav { sample_width } if wav_sample_format(sample_width).is_none() => Err(
                format!("wav sample width must be 8, 16, 24 or 32, got {}", sample_width),
            ),
            Self::Vorbis { quality } if !(-0.1..=1.0).contains(&quality) => {
                Err(format!("vorbis quality must be -0.1 to 1.0, got {}", quality))
            }
            Self::Mp3 {
                mode: Mp3Mode::Vbr,
                quality,
            } if quality > 9 => Err(format!("mp3 vbr quality must be 0-9, got {}", quality)),
            Self::Mp3 {
                mode: Mp3Mode::Cbr | Mp3Mode::Abr,
                quality: 0,
            }
            | Self::Aac { bitrate_kbps: 0 }
            | Self::Opus { bitrate_kbps: 0 } => {
                Err(format!("{} bitrate must be positive", self.id()))
            }
            _ => Ok(()),
        }
    }

    /// The encoder (and muxer) stages, ending right before the sink.
    pub fn encoder_stages(&self, caps: &EncoderCapabilities) -> Result<Vec<Stage>, PipelineError> {
        let stages = match *self {
            Self::Flac { compression } => vec![Stage::element("flacenc")
                .prop("mid-side-stereo", "true")
                .prop("quality", compression)],
            Self::Wav { sample_width } => {
                let format = wav_sample_format(sample_width).ok_or_else(|| {
                    PipelineError::construction(format!(
                        "unsupported wav sample width {}",
                        sample_width
                    ))
                })?;
                vec![
                    Stage::element("audioconvert"),
                    Stage::caps(format!("audio/x-raw,format={}", format)),
                    Stage::element("wavenc"),
                ]
            }
            Self::Vorbis { quality } => vec![
                Stage::element("vorbisenc").prop("quality", quality),
                Stage::element("oggmux"),
            ],
            Self::Mp3 { mode, quality } => {
                let encoder = Stage::element("lamemp3enc").prop("encoding-engine-quality", 2);
                let encoder = match mode {
                    Mp3Mode::Cbr => encoder
                        .prop("target", "bitrate")
                        .prop("cbr", "true")
                        .prop("bitrate", quality),
                    Mp3Mode::Abr => encoder
                        .prop("target", "bitrate")
                        .prop("cbr", "false")
                        .prop("bitrate", quality),
                    Mp3Mode::Vbr => encoder
                        .prop("target", "quality")
                        .prop("cbr", "false")
                        .prop("quality", quality),
                };
                let mut stages = vec![encoder];
                if caps.xingmux && mode != Mp3Mode::Cbr {
                    stages.push(Stage::element("xingmux"));
                }
                if let Some(muxer) = caps.id3_muxer() {
                    stages.push(Stage::element(muxer));
                }
                stages
            }
            Self::Aac { bitrate_kbps } => vec![
                Stage::element(caps.aac_encoder().unwrap_or("avenc_aac"))
                    .prop("bitrate", bitrate_kbps * 1000),
                Stage::element("mp4mux"),
            ],
            Self::Opus { bitrate_kbps } => vec![
                Stage::element("opusenc")
                    .prop("bitrate", bitrate_kbps * 1000)
                    .prop("bitrate-type", "vbr")
                    .prop("bandwidth", "auto"),
                Stage::element("oggmux"),
            ],
        };
        Ok(stages)
    }
}

fn wav_sample_format(width: u8) -> Option<&'static str> {
    match width {
        8 => Some("U8"),
        16 => Some("S16LE"),
        24 => Some("S24LE"),
        32 => Some("S32LE"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::describe;

    fn render(format: &OutputFormat, caps: &EncoderCapabilities) -> String {
        describe(&format.encoder_stages(caps).unwrap())
    }

    #[test]
    fn test_encoder_descriptions() {
        let caps = EncoderCapabilities::all();
        assert_eq!(
            render(&OutputFormat::Flac { compression: 5 }, &caps),
            "flacenc mid-side-stereo=true quality=5"
        );
        assert_eq!(
            render(&OutputFormat::Wav { sample_width: 24 }, &caps),
            "audioconvert ! audio/x-raw,format=S24LE ! wavenc"
        );
        assert_eq!(
            render(&OutputFormat::default(), &caps),
            "vorbisenc quality=0.6 ! oggmux"
        );
        assert_eq!(
            render(&OutputFormat::Opus { bitrate_kbps: 96 }, &caps),
            "opusenc bitrate=96000 bitrate-type=vbr bandwidth=auto ! oggmux"
        );
    }

    #[test]
    fn test_mp3_muxers_follow_capabilities() {
        let vbr = OutputFormat::Mp3 {
            mode: Mp3Mode::Vbr,
            quality: 3,
        };
        assert_eq!(
            render(&vbr, &EncoderCapabilities::all()),
            "lamemp3enc encoding-engine-quality=2 target=quality cbr=false quality=3 ! xingmux ! id3mux"
        );
        assert_eq!(
            render(&vbr, &EncoderCapabilities::default()),
            "lamemp3enc encoding-engine-quality=2 target=quality cbr=false quality=3"
        );

        let cbr = OutputFormat::Mp3 {
            mode: Mp3Mode::Cbr,
            quality: 320,
        };
        let caps = EncoderCapabilities {
            xingmux: true,
            id3v2mux: true,
            ..Default::default()
        };
        assert_eq!(
            render(&cbr, &caps),
            "lamemp3enc encoding-engine-quality=2 target=bitrate cbr=true bitrate=320 ! id3v2mux"
        );
    }

    #[test]
    fn test_aac_encoder_fallback() {
        let aac = OutputFormat::Aac { bitrate_kbps: 192 };
        assert_eq!(
            render(&aac, &EncoderCapabilities::default()),
            "avenc_aac bitrate=192000 ! mp4mux"
        );
        assert_eq!(
            render(&aac, &EncoderCapabilities::all()),
            "faac bitrate=192000 ! mp4mux"
        );
    }

    #[test]
    fn test_invalid_wav_width_is_a_construction_error() {
        let wav = OutputFormat::Wav { sample_width: 12 };
        assert!(matches!(
            wav.encoder_stages(&EncoderCapabilities::all()),
            Err(PipelineError::Construction { .. })
        ));
        assert!(wav.check().is_err());
    }

    #[test]
    fn test_check() {
        assert!(OutputFormat::default().check().is_ok());
        assert!(OutputFormat::Vorbis { quality: 1.5 }.check().is_err());
        assert!(OutputFormat::Flac { compression: 9 }.check().is_err());
        assert!(OutputFormat::Mp3 {
            mode: Mp3Mode::Vbr,
            quality: 0
        }
        .check()
        .is_ok());
        assert!(OutputFormat::Mp3 {
            mode: Mp3Mode::Abr,
            quality: 0
        }
        .check()
        .is_err());
        assert!(OutputFormat::Aac { bitrate_kbps: 0 }.check().is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(OutputFormat::default().extension(false), "ogg");
        assert_eq!(OutputFormat::default().extension(true), "oga");
        assert_eq!(OutputFormat::Aac { bitrate_kbps: 128 }.extension(true), "m4a");
    }

    #[test]
    fn test_availability() {
        let caps = EncoderCapabilities {
            vorbisenc: true,
            ..Default::default()
        };
        assert!(!OutputFormat::default().is_available(&caps));
        let caps = EncoderCapabilities {
            vorbisenc: true,
            oggmux: true,
            ..Default::default()
        };
        assert!(OutputFormat::default().is_available(&caps));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let format: OutputFormat = toml::from_str("format = \"mp3\"").unwrap();
        assert_eq!(
            format,
            OutputFormat::Mp3 {
                mode: Mp3Mode::Vbr,
                quality: 3
            }
        );
        let format: OutputFormat = toml::from_str("format = \"flac\"\ncompression = 5").unwrap();
        assert_eq!(format, OutputFormat::Flac { compression: 5 });
    }
}
