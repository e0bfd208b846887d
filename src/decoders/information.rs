//! Compound decoders for informational responses.
//!
//! A single audio or video information frame fans out into dozens of
//! per-field deltas at fixed offsets.

use serde_json::Value;

use crate::error::Error;
use crate::params::AvrParams;
use crate::properties::{AvrProperties, BaseProperty};
use crate::queue::CommandItem;
use crate::registry::CommandEntry;
use crate::types::Zone;

use super::code_map::{apply_meta, map_error, BoolMap, CodeMap, DictMap, IntMap, MapKind, MapMeta};
use super::response::Response;

static AUDIO_CHANNEL_ACTIVE: DictMap = DictMap::new(
    MapMeta::new("audio channel active", Some(BaseProperty::Audio), None),
    &[("0", "inactive"), ("1", "active")],
);

static AUDIO_SIGNAL_INPUT_INFO: DictMap = DictMap::new(
    MapMeta::new("audio signal input info", Some(BaseProperty::Audio), None),
    &[
        ("00", "ANALOG"),
        ("01", "ANALOG"),
        ("02", "ANALOG"),
        ("03", "PCM"),
        ("04", "PCM"),
        ("05", "DOLBY DIGITAL"),
        ("06", "DTS"),
        ("07", "DTS-ES Matrix"),
        ("08", "DTS-ES Discrete"),
        ("09", "DTS 96/24"),
        ("10", "DTS 96/24 ES Matrix"),
        ("11", "DTS 96/24 ES Discrete"),
        ("12", "MPEG-2 AAC"),
        ("13", "WMA9 Pro"),
        ("14", "DSD (HDMI or File via DSP route)"),
        ("15", "HDMI THROUGH"),
        ("16", "DOLBY DIGITAL PLUS"),
        ("17", "DOLBY TrueHD"),
        ("18", "DTS EXPRESS"),
        ("19", "DTS-HD Master Audio"),
        ("20", "DTS-HD High Resolution"),
        ("21", "DTS-HD High Resolution"),
        ("22", "DTS-HD High Resolution"),
        ("23", "DTS-HD High Resolution"),
        ("24", "DTS-HD High Resolution"),
        ("25", "DTS-HD High Resolution"),
        ("26", "DTS-HD High Resolution"),
        ("27", "DTS-HD Master Audio"),
        ("28", "DSD (HDMI or File via DSD DIRECT route)"),
        ("29", "Dolby Atmos"),
        ("30", "Dolby Atmos over Dolby Digital Plus"),
        ("31", "Dolby Atmos over Dolby TrueHD"),
        ("64", "MP3"),
        ("65", "WAV"),
        ("66", "WMA"),
        ("67", "MPEG4-AAC"),
        ("68", "FLAC"),
        ("69", "ALAC(Apple Lossless)"),
        ("70", "AIFF"),
        ("71", "DSD (USB-DAC)"),
        ("72", "Spotify"),
    ],
);

static AUDIO_SIGNAL_INPUT_FREQ: DictMap = DictMap::with_default(
    MapMeta::new("audio signal input frequency", Some(BaseProperty::Audio), None),
    &[
        ("00", "32kHz"),
        ("01", "44.1kHz"),
        ("02", "48kHz"),
        ("03", "88.2kHz"),
        ("04", "96kHz"),
        ("05", "176.4kHz"),
        ("06", "192kHz"),
        ("32", "2.8MHz"),
        ("33", "5.6MHz"),
    ],
);

static AUDIO_WORKING_PQLS: DictMap = DictMap::new(
    MapMeta::new("audio working PQLS", Some(BaseProperty::Audio), None),
    &[("0", "off"), ("1", "2h"), ("2", "Multi-channel"), ("3", "Bitstream")],
);

static PLAIN_INT: IntMap =
    IntMap::unbounded(MapMeta::new("plain integer", Some(BaseProperty::Audio), None), 2);

static PLAIN_BOOL: BoolMap =
    BoolMap::new(MapMeta::new("plain boolean", Some(BaseProperty::Audio), None));

/// Input multichannel flag: true when all three front input channels are
/// active. A change in value triggers a listening-mode recomputation.
pub struct InputMultichannelMap;

impl InputMultichannelMap {
    const META: MapMeta =
        MapMeta::keyed("input multichannel", BaseProperty::Audio, "input_multichannel");
}

fn check_input_multichannel(
    mut response: Response,
    _params: &AvrParams,
    properties: &mut AvrProperties,
) -> Vec<Response> {
    if properties.audio.get("input_multichannel") == Some(&response.value) {
        return Vec::new();
    }
    response.queue_commands = vec![CommandItem::new("_update_listening_modes").queue(3)];
    vec![response]
}

impl CodeMap for InputMultichannelMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Bool
    }

    fn code_len(&self) -> usize {
        3
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        Ok(Value::Bool(!code.is_empty() && code.chars().all(|c| c == '1')))
    }

    fn decode_response(
        &self,
        mut response: Response,
        _params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        apply_meta(self.meta(), &mut response);
        response.value = self.code_to_value(&response.code)?;
        response.callback = Some(check_input_multichannel);
        Ok(vec![response])
    }
}

pub static INPUT_MULTICHANNEL: InputMultichannelMap = InputMultichannelMap;

/// Slice a fixed-offset field out of a compound frame.
fn field<'a>(meta: &MapMeta, code: &'a str, start: usize, end: usize) -> Result<&'a str, Error> {
    code.get(start..end)
        .ok_or_else(|| map_error(meta, format!("response truncated at offset {start}")))
}

fn decode_child(
    response: &Response,
    params: &AvrParams,
    properties: &AvrProperties,
    property_name: &str,
    code: &str,
    map: &dyn CodeMap,
) -> Result<Vec<Response>, Error> {
    let mut child = response.child(code);
    child.property_name = Some(property_name.to_string());
    map.decode_response(child, params, properties)
}

// =============================================================================
// Audio information
// =============================================================================

static AUDIO_INPUT_CHANNELS: &[&str] = &[
    "L", "C", "R", "SL", "SR", "SBL", "SBC", "SBR", "LFE", "FHL", "FHR", "FWL", "FWR", "XL", "XC",
    "XR",
];

static AUDIO_OUTPUT_CHANNELS: &[&str] = &["L", "C", "R", "SL", "SR", "SBL", "SB", "SBR"];

/// Audio information frame (`AST`).
pub struct AudioInformationMap;

impl AudioInformationMap {
    const META: MapMeta = MapMeta::new("audio information", Some(BaseProperty::Audio), None);
}

impl CodeMap for AudioInformationMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Compound
    }

    fn code_len(&self) -> usize {
        0
    }

    fn decode_response(
        &self,
        response: Response,
        params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        let meta = self.meta();
        let code = response.code.clone();
        let mut responses = Vec::new();

        responses.extend(decode_child(
            &response,
            params,
            properties,
            "input_signal",
            field(meta, &code, 0, 2)?,
            &AUDIO_SIGNAL_INPUT_INFO,
        )?);
        responses.extend(decode_child(
            &response,
            params,
            properties,
            "input_frequency",
            field(meta, &code, 2, 4)?,
            &AUDIO_SIGNAL_INPUT_FREQ,
        )?);
        responses.extend(decode_child(
            &response,
            params,
            properties,
            "input_multichannel",
            field(meta, &code, 4, 7)?,
            &INPUT_MULTICHANNEL,
        )?);
        for (index, channel) in AUDIO_INPUT_CHANNELS.iter().enumerate() {
            responses.extend(decode_child(
                &response,
                params,
                properties,
                &format!("input_channels.{channel}"),
                field(meta, &code, 4 + index, 5 + index)?,
                &AUDIO_CHANNEL_ACTIVE,
            )?);
        }
        for (index, channel) in AUDIO_OUTPUT_CHANNELS.iter().enumerate() {
            responses.extend(decode_child(
                &response,
                params,
                properties,
                &format!("output_channels.{channel}"),
                field(meta, &code, 25 + index, 26 + index)?,
                &AUDIO_CHANNEL_ACTIVE,
            )?);
        }

        // older generations stop at 43 data characters
        if code.len() > 43 {
            responses.extend(decode_child(
                &response,
                params,
                properties,
                "output_frequency",
                field(meta, &code, 43, 45)?,
                &AUDIO_SIGNAL_INPUT_FREQ,
            )?);
            responses.extend(decode_child(
                &response,
                params,
                properties,
                "output_bits",
                field(meta, &code, 45, 47)?,
                &PLAIN_INT,
            )?);
            responses.extend(decode_child(
                &response,
                params,
                properties,
                "output_pqls",
                field(meta, &code, 51, 52)?,
                &AUDIO_WORKING_PQLS,
            )?);
            responses.extend(decode_child(
                &response,
                params,
                properties,
                "output_auto_phase_control_plus",
                field(meta, &code, 52, 54)?,
                &PLAIN_INT,
            )?);
            responses.extend(decode_child(
                &response,
                params,
                properties,
                "output_reverse_phase",
                field(meta, &code, 54, 55)?,
                &PLAIN_BOOL,
            )?);
        }

        Ok(responses)
    }
}

pub static AUDIO_INFORMATION: AudioInformationMap = AudioInformationMap;

// =============================================================================
// Video information
// =============================================================================

static VIDEO_SIGNAL_INPUT_TERMINAL: DictMap = DictMap::with_default(
    MapMeta::new("video signal input terminal", Some(BaseProperty::Video), None),
    &[("1", "VIDEO"), ("2", "S-VIDEO"), ("3", "COMPONENT"), ("4", "HDMI"), ("5", "Self OSD/JPEG")],
);

static VIDEO_SIGNAL_FORMAT: DictMap = DictMap::with_default(
    MapMeta::new("video signal format", Some(BaseProperty::Video), None),
    &[
        ("01", "480/60i"),
        ("02", "576/50i"),
        ("03", "480/60p"),
        ("04", "576/50p"),
        ("05", "720/60p"),
        ("06", "720/50p"),
        ("07", "1080/60i"),
        ("08", "1080/50i"),
        ("09", "1080/60p"),
        ("10", "1080/50p"),
        ("11", "1080/24p"),
        ("12", "4Kx2K/24Hz"),
        ("13", "4Kx2K/25Hz"),
        ("14", "4Kx2K/30Hz"),
        ("15", "4Kx2K/24Hz(SMPTE)"),
        ("16", "4Kx2K/50Hz"),
        ("17", "4Kx2K/60Hz"),
    ],
);

static VIDEO_SIGNAL_ASPECT: DictMap = DictMap::with_default(
    MapMeta::new("video signal aspect", Some(BaseProperty::Video), None),
    &[("1", "4:3"), ("2", "16:9"), ("3", "14:9")],
);

static VIDEO_SIGNAL_COLORSPACE: DictMap = DictMap::with_default(
    MapMeta::new("video signal colorspace", Some(BaseProperty::Video), None),
    &[
        ("1", "RGB Limit"),
        ("2", "RGB Full"),
        ("3", "YcbCr444"),
        ("4", "YcbCr422"),
        ("5", "YcbCr420"),
    ],
);

static VIDEO_SIGNAL_BITS: DictMap = DictMap::with_default(
    MapMeta::new("video signal bits", Some(BaseProperty::Video), None),
    &[
        ("1", "24bit (8bit*3)"),
        ("2", "30bit (10bit*3)"),
        ("3", "36bit (12bit*3)"),
        ("4", "48bit (16bit*3)"),
    ],
);

static VIDEO_SIGNAL_EXT_COLORSPACE: DictMap = DictMap::with_default(
    MapMeta::new("video signal ext colorspace", Some(BaseProperty::Video), None),
    &[
        ("1", "Standard"),
        ("2", "xvYCC601"),
        ("3", "xvYCC709"),
        ("4", "sYCC"),
        ("5", "AdobeYCC601"),
        ("6", "AdobeRGB"),
    ],
);

static VIDEO_SIGNAL_3D_MODE: DictMap = DictMap::with_default(
    MapMeta::new("video signal 3D mode", Some(BaseProperty::Video), None),
    &[
        ("01", "Frame packing"),
        ("02", "Field alternative"),
        ("03", "Line alternative"),
        ("04", "Side-by-Side(Full)"),
        ("05", "L + depth"),
        ("06", "L + depth + graphics"),
        ("07", "Top-and-Bottom"),
        ("08", "Side-by-Side(Half)"),
    ],
);

/// Video information frame (`VST`).
pub struct VideoInformationMap;

impl VideoInformationMap {
    const META: MapMeta = MapMeta::new("video information", Some(BaseProperty::Video), None);
}

impl CodeMap for VideoInformationMap {
    fn meta(&self) -> &MapMeta {
        &Self::META
    }

    fn kind(&self) -> MapKind {
        MapKind::Compound
    }

    fn code_len(&self) -> usize {
        0
    }

    fn decode_response(
        &self,
        response: Response,
        params: &AvrParams,
        properties: &AvrProperties,
    ) -> Result<Vec<Response>, Error> {
        let meta = self.meta();
        let code = response.code.clone();
        let fields: &[(&str, usize, usize, &dyn CodeMap)] = &[
            ("signal_input_terminal", 0, 1, &VIDEO_SIGNAL_INPUT_TERMINAL),
            ("signal_input_resolution", 1, 3, &VIDEO_SIGNAL_FORMAT),
            ("signal_input_aspect", 3, 4, &VIDEO_SIGNAL_ASPECT),
            ("signal_input_color_format", 4, 5, &VIDEO_SIGNAL_COLORSPACE),
            ("signal_input_bit", 5, 6, &VIDEO_SIGNAL_BITS),
            ("signal_input_extended_colorspace", 6, 7, &VIDEO_SIGNAL_EXT_COLORSPACE),
            ("signal_output_resolution", 7, 9, &VIDEO_SIGNAL_FORMAT),
            ("signal_output_aspect", 9, 10, &VIDEO_SIGNAL_ASPECT),
            ("signal_output_color_format", 10, 11, &VIDEO_SIGNAL_COLORSPACE),
            ("signal_output_bit", 11, 12, &VIDEO_SIGNAL_BITS),
            ("signal_output_extended_colorspace", 12, 13, &VIDEO_SIGNAL_EXT_COLORSPACE),
            ("signal_hdmi1_recommended_resolution", 13, 15, &VIDEO_SIGNAL_FORMAT),
            ("signal_hdmi1_deepcolor", 15, 16, &VIDEO_SIGNAL_BITS),
            ("signal_hdmi2_recommended_resolution", 21, 23, &VIDEO_SIGNAL_FORMAT),
            ("signal_hdmi2_deepcolor", 23, 24, &VIDEO_SIGNAL_BITS),
        ];
        let extended_fields: &[(&str, usize, usize, &dyn CodeMap)] = &[
            ("signal_hdmi3_recommended_resolution", 29, 31, &VIDEO_SIGNAL_FORMAT),
            ("signal_hdmi3_deepcolor", 31, 32, &VIDEO_SIGNAL_BITS),
            ("input_3d_format", 37, 39, &VIDEO_SIGNAL_3D_MODE),
            ("output_3d_format", 39, 41, &VIDEO_SIGNAL_3D_MODE),
            ("signal_hdmi4_recommended_resolution", 41, 43, &VIDEO_SIGNAL_FORMAT),
            ("signal_hdmi4_deepcolor", 44, 45, &VIDEO_SIGNAL_BITS),
        ];

        let mut responses = Vec::new();
        for (name, start, end, map) in fields {
            responses.extend(decode_child(
                &response,
                params,
                properties,
                name,
                field(meta, &code, *start, *end)?,
                *map,
            )?);
        }
        // older generations only return 25 data values
        if code.len() > 40 {
            for (name, start, end, map) in extended_fields {
                responses.extend(decode_child(
                    &response,
                    params,
                    properties,
                    name,
                    field(meta, &code, *start, *end)?,
                    *map,
                )?);
            }
        }
        Ok(responses)
    }
}

pub static VIDEO_INFORMATION: VideoInformationMap = VideoInformationMap;

pub static RESPONSES: &[(&str, &'static dyn CodeMap, Zone)] = &[
    ("AST", &AUDIO_INFORMATION, Zone::Z1),
    ("VST", &VIDEO_INFORMATION, Zone::Z1),
];

pub static COMMANDS: &[CommandEntry] = &[
    CommandEntry::new("query_audio_information", &[(Zone::Z1, "?AST", Some("AST"))]),
    CommandEntry::new("query_video_information", &[(Zone::Z1, "?VST", Some("VST"))]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn multichannel_requires_all_front_channels() {
        assert_eq!(INPUT_MULTICHANNEL.code_to_value("111").unwrap(), json!(true));
        assert_eq!(INPUT_MULTICHANNEL.code_to_value("101").unwrap(), json!(false));
        assert_eq!(INPUT_MULTICHANNEL.code_to_value("000").unwrap(), json!(false));
    }

    #[test]
    fn audio_information_fans_out() {
        let params = AvrParams::default();
        let props = AvrProperties::new(params.clone());
        // 43-character short-form frame: PCM 44.1kHz, L/R active
        let code = format!("0301{}{}", "101000000000000000000000100000000000", "0000000");
        let response = Response::new("AST", &code[..43.min(code.len())], Zone::Z1);
        let deltas = AUDIO_INFORMATION.decode_response(response, &params, &props).unwrap();
        let signal = deltas
            .iter()
            .find(|delta| delta.property_name.as_deref() == Some("input_signal"))
            .unwrap();
        assert_eq!(signal.value, json!("PCM"));
        let multichannel = deltas
            .iter()
            .find(|delta| delta.property_name.as_deref() == Some("input_multichannel"))
            .unwrap();
        assert_eq!(multichannel.value, json!(false));
        assert!(multichannel.callback.is_some());
        let left = deltas
            .iter()
            .find(|delta| delta.property_name.as_deref() == Some("input_channels.L"))
            .unwrap();
        assert_eq!(left.value, json!("active"));
    }

    #[test]
    fn truncated_frame_is_a_decode_error() {
        let params = AvrParams::default();
        let props = AvrProperties::new(params.clone());
        let response = Response::new("AST", "0301", Zone::Z1);
        assert!(AUDIO_INFORMATION.decode_response(response, &params, &props).is_err());
    }
}
