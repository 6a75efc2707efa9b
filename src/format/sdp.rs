//! SDP session descriptions: lenient parsing of DESCRIBE bodies and
//! generation of ANNOUNCE bodies.
//!
//! The two directions are mutually round-trippable for every codec the
//! transport supports; `parse` additionally tolerates attribute orderings
//! and spacing quirks seen on real cameras.

use crate::av::CodecType;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Session-level SDP information.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub uri: String,
}

/// One `m=` section and the attributes that apply to it.
#[derive(Debug, Clone, Default)]
pub struct Media {
    /// "video" or "audio".
    pub kind: String,
    pub codec: Option<CodecType>,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// RTP clock rate from the rtpmap line.
    pub time_scale: u32,
    pub control: String,
    pub channel_count: u8,
    /// MPEG-4 AudioSpecificConfig bytes from `config=`.
    pub config: Vec<u8>,
    /// H.264 `sprop-parameter-sets`, decoded: [SPS, PPS].
    pub sprop_parameter_sets: Vec<Vec<u8>>,
    pub sprop_vps: Vec<u8>,
    pub sprop_sps: Vec<u8>,
    pub sprop_pps: Vec<u8>,
    pub payload_type: u8,
    pub size_length: u32,
    pub index_length: u32,
}

const STATIC_PT_PCMU: u8 = 0;
const STATIC_PT_PCMA: u8 = 8;

fn parse_media_line(value: &str) -> Option<Media> {
    let mut fields = value.splitn(2, ' ');
    let kind = fields.next()?;
    if kind != "audio" && kind != "video" {
        return None;
    }

    let mut media = Media {
        kind: kind.to_string(),
        ..Default::default()
    };

    // m=<media> <port> <proto> <fmt>
    if let Some(rest) = fields.next() {
        if let Some(pt) = rest.split(' ').nth(2) {
            media.payload_type = pt.parse().unwrap_or(0);
        }
    }

    match media.payload_type {
        STATIC_PT_PCMU => media.codec = Some(CodecType::PcmUlaw),
        STATIC_PT_PCMA => media.codec = Some(CodecType::PcmAlaw),
        _ => {}
    }

    Some(media)
}

fn parse_codec_name(media: &mut Media, key: &str, parts: &[&str]) {
    match key.to_uppercase().as_str() {
        "MPEG4-GENERIC" => {
            media.codec = Some(CodecType::Aac);
            parse_channel_count(media, parts);
        }
        "L16" => {
            media.codec = Some(CodecType::Pcm);
            parse_channel_count(media, parts);
        }
        "OPUS" => {
            media.codec = Some(CodecType::Opus);
            parse_channel_count(media, parts);
        }
        "H264" => media.codec = Some(CodecType::H264),
        "JPEG" | "MJPEG" => media.codec = Some(CodecType::Mjpeg),
        "H265" | "HEVC" => media.codec = Some(CodecType::H265),
        "PCMA" => {
            media.codec = Some(CodecType::PcmAlaw);
            media.channel_count = 1;
        }
        "PCMU" => {
            media.codec = Some(CodecType::PcmUlaw);
            media.channel_count = 1;
        }
        _ => {}
    }

    if parts.len() > 1 {
        if let Ok(scale) = parts[1].parse() {
            media.time_scale = scale;
        }
    }
}

fn parse_channel_count(media: &mut Media, parts: &[&str]) {
    if parts.len() > 2 {
        if let Ok(channels) = parts[2].parse() {
            media.channel_count = channels;
        }
    }
}

fn parse_fmtp_entry(media: &mut Media, key: &str, val: &str) {
    match key {
        "config" => media.config = decode_hex(val),
        "sizelength" => media.size_length = val.parse().unwrap_or(0),
        "indexlength" => media.index_length = val.parse().unwrap_or(0),
        "sprop-vps" => {
            if let Ok(decoded) = BASE64.decode(val) {
                media.sprop_vps = decoded;
            }
        }
        "sprop-sps" => {
            if let Ok(decoded) = BASE64.decode(val) {
                media.sprop_sps = decoded;
            }
        }
        "sprop-pps" => {
            if let Ok(decoded) = BASE64.decode(val) {
                media.sprop_pps = decoded;
            }
        }
        "sprop-parameter-sets" => {
            for field in val.split(',') {
                if field.is_empty() {
                    continue;
                }
                if let Ok(decoded) = BASE64.decode(field) {
                    media.sprop_parameter_sets.push(decoded);
                }
            }
        }
        _ => {}
    }
}

fn parse_attribute(media: &mut Media, value: &str) {
    let fields: Vec<&str> = value.splitn(2, ' ').collect();

    for field in fields {
        // key:value attributes
        if let Some((key, val)) = field.split_once(':') {
            match key {
                "control" => media.control = val.to_string(),
                "x-framerate" => media.fps = val.parse().unwrap_or(0),
                "x-dimensions" => {
                    if let Some((w, h)) = val.split_once(',') {
                        media.width = w.trim().parse().unwrap_or(0);
                        media.height = h.trim().parse().unwrap_or(0);
                    }
                }
                _ => {}
            }
        }

        // ENC/clock[/channels] after rtpmap
        let parts: Vec<&str> = field.split('/').collect();
        if parts.len() >= 2 {
            parse_codec_name(media, parts[0], &parts);
        }

        // key=value;key=value fmtp parameter lists
        let entries: Vec<&str> = field.split(';').collect();
        if entries.len() > 1 {
            for entry in entries {
                if let Some((key, val)) = entry.split_once('=') {
                    parse_fmtp_entry(media, key.trim(), val);
                }
            }
        }
    }
}

/// Parses an SDP document into session info and media sections.
///
/// Unknown lines and attributes are skipped rather than rejected; an SDP
/// with no recognizable media simply yields an empty list.
pub fn parse(content: &str) -> (Session, Vec<Media>) {
    let mut session = Session::default();
    let mut medias: Vec<Media> = Vec::new();

    for raw_line in content.split('\n') {
        let mut line = raw_line.trim().to_string();
        // Some cameras emit "a=x-framerate: 25" with stray spaces.
        if line.contains("x-framerate") {
            line = line.replace(' ', "");
        }

        let Some((typ, value)) = line.split_once('=') else {
            continue;
        };

        match typ {
            "m" => {
                if let Some(media) = parse_media_line(value) {
                    medias.push(media);
                }
            }
            "u" => session.uri = value.to_string(),
            "a" => {
                if let Some(media) = medias.last_mut() {
                    parse_attribute(media, value);
                }
            }
            _ => {}
        }
    }

    (session, medias)
}

/// Builds an SDP document suitable for RTSP ANNOUNCE, round-trippable by
/// [`parse`]. Media sections are ordered video-first, then by payload
/// type, so interleaved channel assignment is deterministic.
pub fn generate(session: &Session, medias: &[Media]) -> String {
    let mut lines: Vec<String> = vec![
        "v=0".into(),
        "o=- 0 0 IN IP4 127.0.0.1".into(),
        "s=rtspio".into(),
        "t=0 0".into(),
    ];
    if !session.uri.is_empty() {
        lines.push(format!("u={}", session.uri));
    }
    lines.push("a=control:*".into());

    let mut sorted: Vec<&Media> = medias.iter().collect();
    sorted.sort_by_key(|m| (kind_priority(&m.kind), m.payload_type));

    for media in sorted {
        marshal_media(media, &mut lines);
    }

    lines.join("\r\n") + "\r\n"
}

fn kind_priority(kind: &str) -> u8 {
    match kind {
        "video" => 0,
        "audio" => 1,
        _ => 2,
    }
}

fn marshal_media(m: &Media, lines: &mut Vec<String>) {
    let kind = if m.kind.is_empty() {
        m.codec
            .map(|c| if c.is_audio() { "audio" } else { "video" })
            .unwrap_or("video")
    } else {
        m.kind.as_str()
    };

    let pt = if m.payload_type == 0 && m.codec != Some(CodecType::PcmUlaw) {
        default_payload_type(m.codec)
    } else {
        m.payload_type
    };

    let ts = if m.time_scale == 0 {
        default_time_scale(m.codec)
    } else {
        m.time_scale
    };

    lines.push(format!("m={} 0 RTP/AVP {}", kind, pt));

    if let Some(enc) = rtpmap_encoding(m.codec) {
        if m.codec.map(|c| c.is_audio()).unwrap_or(false) {
            let channels = if m.channel_count == 0 {
                default_channels(m.codec)
            } else {
                m.channel_count
            };
            lines.push(format!("a=rtpmap:{} {}/{}/{}", pt, enc, ts, channels));
        } else {
            lines.push(format!("a=rtpmap:{} {}/{}", pt, enc, ts));
        }
    }

    if let Some(fmtp) = fmtp_line(m, pt) {
        lines.push(format!("a=fmtp:{}", fmtp));
    }

    if m.fps > 0 {
        lines.push(format!("a=x-framerate:{}", m.fps));
    }
    if m.width > 0 && m.height > 0 {
        lines.push(format!("a=x-dimensions:{},{}", m.width, m.height));
    }
    if !m.control.is_empty() {
        lines.push(format!("a=control:{}", m.control));
    }
}

fn fmtp_line(m: &Media, pt: u8) -> Option<String> {
    match m.codec? {
        CodecType::H264 => {
            let (sps, pps) = if m.sprop_parameter_sets.len() >= 2 {
                (&m.sprop_parameter_sets[0], &m.sprop_parameter_sets[1])
            } else {
                return None;
            };
            if sps.is_empty() || pps.is_empty() {
                return None;
            }
            Some(format!(
                "{} sprop-parameter-sets={},{};packetization-mode=1",
                pt,
                BASE64.encode(sps),
                BASE64.encode(pps)
            ))
        }
        CodecType::H265 => {
            if m.sprop_vps.is_empty() || m.sprop_sps.is_empty() || m.sprop_pps.is_empty() {
                return None;
            }
            Some(format!(
                "{} sprop-vps={};sprop-sps={};sprop-pps={}",
                pt,
                BASE64.encode(&m.sprop_vps),
                BASE64.encode(&m.sprop_sps),
                BASE64.encode(&m.sprop_pps)
            ))
        }
        CodecType::Aac => {
            if m.config.is_empty() {
                return None;
            }
            let size_length = if m.size_length == 0 { 13 } else { m.size_length };
            let index_length = if m.index_length == 0 { 3 } else { m.index_length };
            Some(format!(
                "{} config={};sizelength={};indexlength={}",
                pt,
                encode_hex_upper(&m.config),
                size_length,
                index_length
            ))
        }
        _ => None,
    }
}

fn rtpmap_encoding(codec: Option<CodecType>) -> Option<&'static str> {
    Some(match codec? {
        CodecType::Aac => "MPEG4-GENERIC",
        CodecType::Opus => "OPUS",
        CodecType::Pcm => "L16",
        CodecType::PcmAlaw => "PCMA",
        CodecType::PcmUlaw => "PCMU",
        CodecType::H264 => "H264",
        CodecType::H265 => "H265",
        CodecType::Mjpeg => "JPEG",
    })
}

fn default_time_scale(codec: Option<CodecType>) -> u32 {
    match codec {
        Some(CodecType::Opus) | Some(CodecType::Aac) => 48000,
        Some(CodecType::Pcm) | Some(CodecType::PcmAlaw) | Some(CodecType::PcmUlaw) => 8000,
        _ => 90000,
    }
}

fn default_channels(codec: Option<CodecType>) -> u8 {
    match codec {
        Some(CodecType::Opus) | Some(CodecType::Aac) | Some(CodecType::Pcm) => 2,
        _ => 1,
    }
}

fn default_payload_type(codec: Option<CodecType>) -> u8 {
    match codec {
        Some(CodecType::PcmUlaw) => STATIC_PT_PCMU,
        Some(CodecType::PcmAlaw) => STATIC_PT_PCMA,
        _ => 96,
    }
}

fn encode_hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

fn decode_hex(s: &str) -> Vec<u8> {
    let s = s.trim();
    if s.len() % 2 != 0 {
        return Vec::new();
    }
    (0..s.len())
        .step_by(2)
        .filter_map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
