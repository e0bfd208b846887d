//! Decoders for video parameters.

use serde_json::Value;

use crate::error::Error;
use crate::params::{AvrParams, PARAM_VIDEO_RESOLUTION_MODES};
use crate::properties::{AvrProperties, BaseProperty};
use crate::registry::CommandEntry;
use crate::types::Zone;

use super::code_map::{check_args, BoolMap, CodeMap, DictMap, IntMap, MapKind, MapMeta};

pub static VIDEO_CONVERTER: BoolMap =
    BoolMap::new(MapMeta::keyed("video converter", BaseProperty::Video, "converter"));

/// Video resolution. Selectable modes are model-specific: setting validates
/// the requested code against the `video_resolution_modes` parameter.
pub struct VideoResolutionMap;

impl VideoResolutionMap {
    const INNER: DictMap = DictMap::new(
        MapMeta::keyed("video resolution", BaseProperty::Video, "resolution"),
        &[
            ("0", "auto"),
            ("1", "pure"),
            ("3", "480/576p"),
            ("4", "720p"),
            ("5", "1080i"),
            ("6", "1080p"),
            ("7", "1080/24p"),
            ("8", "4K"),
            ("9", "4K/24p"),
        ],
    );
}

impl CodeMap for VideoResolutionMap {
    fn meta(&self) -> &MapMeta {
        &Self::INNER.meta
    }

    fn kind(&self) -> MapKind {
        MapKind::Dict
    }

    fn code_len(&self) -> usize {
        1
    }

    fn value_to_code(&self, value: &Value) -> Result<String, Error> {
        Self::INNER.value_to_code(value)
    }

    fn code_to_value(&self, code: &str) -> Result<Value, Error> {
        Self::INNER.code_to_value(code)
    }

    fn parse_args(
        &self,
        command: &str,
        args: &[Value],
        _zone: Zone,
        params: &AvrParams,
        _properties: &AvrProperties,
    ) -> Result<String, Error> {
        check_args(self, command, args)?;
        let code = self.value_to_code(&args[0])?;
        let modes = params.get_str_list(PARAM_VIDEO_RESOLUTION_MODES);
        if !modes.iter().any(|mode| *mode == code) {
            return Err(Error::unavailable_command(
                command,
                format!("resolution {} unavailable", args[0]),
            ));
        }
        Ok(code)
    }
}

pub static VIDEO_RESOLUTION: VideoResolutionMap = VideoResolutionMap;

pub static VIDEO_PURE_CINEMA: DictMap = DictMap::new(
    MapMeta::keyed("video pure cinema", BaseProperty::Video, "pure_cinema"),
    &[("0", "auto"), ("1", "on"), ("2", "off")],
);

pub static VIDEO_PROG_MOTION: IntMap =
    IntMap::new(MapMeta::keyed("video prog motion", BaseProperty::Video, "prog_motion"), -4, 4, 2)
        .offset(50);

pub static VIDEO_STREAM_SMOOTHER: DictMap = DictMap::new(
    MapMeta::keyed("video stream smoother", BaseProperty::Video, "stream_smoother"),
    &[("0", "off"), ("1", "on"), ("2", "auto")],
);

pub static ADVANCED_VIDEO_ADJUST: DictMap = DictMap::new(
    MapMeta::keyed("advanced video adjust", BaseProperty::Video, "advanced_video_adjust"),
    &[("0", "PDP"), ("1", "LCD"), ("2", "FPJ"), ("3", "professional"), ("4", "memory")],
);

pub static VIDEO_YNR: IntMap =
    IntMap::new(MapMeta::keyed("video YNR", BaseProperty::Video, "ynr"), 0, 8, 2).offset(50);

pub static VIDEO_CNR: IntMap =
    IntMap::new(MapMeta::keyed("video CNR", BaseProperty::Video, "cnr"), 0, 8, 2).offset(50);

pub static VIDEO_BNR: IntMap =
    IntMap::new(MapMeta::keyed("video BNR", BaseProperty::Video, "bnr"), 0, 8, 2).offset(50);

pub static VIDEO_MNR: IntMap =
    IntMap::new(MapMeta::keyed("video MNR", BaseProperty::Video, "mnr"), 0, 8, 2).offset(50);

pub static VIDEO_DETAIL: IntMap =
    IntMap::new(MapMeta::keyed("video detail", BaseProperty::Video, "detail"), 0, 8, 2).offset(50);

pub static VIDEO_SHARPNESS: IntMap =
    IntMap::new(MapMeta::keyed("video sharpness", BaseProperty::Video, "sharpness"), 0, 8, 2)
        .offset(50);

pub static VIDEO_BRIGHTNESS: IntMap =
    IntMap::new(MapMeta::keyed("video brightness", BaseProperty::Video, "brightness"), -6, 6, 2)
        .offset(50);

pub static VIDEO_CONTRAST: IntMap =
    IntMap::new(MapMeta::keyed("video contrast", BaseProperty::Video, "contrast"), -6, 6, 2)
        .offset(50);

pub static VIDEO_HUE: IntMap =
    IntMap::new(MapMeta::keyed("video hue", BaseProperty::Video, "hue"), -6, 6, 2).offset(50);

pub static VIDEO_CHROMA: IntMap =
    IntMap::new(MapMeta::keyed("video chroma", BaseProperty::Video, "chroma"), -6, 6, 2).offset(50);

pub static VIDEO_BLACK_SETUP: BoolMap =
    BoolMap::new(MapMeta::keyed("video black setup", BaseProperty::Video, "black_setup"));

pub static VIDEO_ASPECT: DictMap = DictMap::new(
    MapMeta::keyed("video aspect", BaseProperty::Video, "aspect"),
    &[("0", "passthrough"), ("1", "normal")],
);

pub static VIDEO_SUPER_RESOLUTION: IntMap = IntMap::new(
    MapMeta::keyed("video super resolution", BaseProperty::Video, "super_resolution"),
    0,
    3,
    1,
);

pub static RESPONSES: &[(&str, &'static dyn CodeMap, Zone)] = &[
    ("VTB", &VIDEO_CONVERTER, Zone::Z1),
    ("VTC", &VIDEO_RESOLUTION, Zone::Z1),
    ("VTD", &VIDEO_PURE_CINEMA, Zone::Z1),
    ("VTE", &VIDEO_PROG_MOTION, Zone::Z1),
    ("VTF", &VIDEO_STREAM_SMOOTHER, Zone::Z1),
    ("VTG", &ADVANCED_VIDEO_ADJUST, Zone::Z1),
    ("VTH", &VIDEO_YNR, Zone::Z1),
    ("VTI", &VIDEO_CNR, Zone::Z1),
    ("VTJ", &VIDEO_BNR, Zone::Z1),
    ("VTK", &VIDEO_MNR, Zone::Z1),
    ("VTL", &VIDEO_DETAIL, Zone::Z1),
    ("VTM", &VIDEO_SHARPNESS, Zone::Z1),
    ("VTN", &VIDEO_BRIGHTNESS, Zone::Z1),
    ("VTO", &VIDEO_CONTRAST, Zone::Z1),
    ("VTP", &VIDEO_HUE, Zone::Z1),
    ("VTQ", &VIDEO_CHROMA, Zone::Z1),
    ("VTR", &VIDEO_BLACK_SETUP, Zone::Z1),
    ("VTS", &VIDEO_ASPECT, Zone::Z1),
    ("VTT", &VIDEO_SUPER_RESOLUTION, Zone::Z1),
];

pub static COMMANDS: &[CommandEntry] = &[
    CommandEntry::new("query_video_converter", &[(Zone::Z1, "?VTB", Some("VTB"))]),
    CommandEntry::with_args("set_video_converter", &[(Zone::Z1, "VTB", Some("VTB"))], &VIDEO_CONVERTER),
    CommandEntry::new("query_video_resolution", &[(Zone::Z1, "?VTC", Some("VTC"))]),
    CommandEntry::with_args("set_video_resolution", &[(Zone::Z1, "VTC", Some("VTC"))], &VIDEO_RESOLUTION),
    CommandEntry::new("query_video_pure_cinema", &[(Zone::Z1, "?VTD", Some("VTD"))]),
    CommandEntry::with_args("set_video_pure_cinema", &[(Zone::Z1, "VTD", Some("VTD"))], &VIDEO_PURE_CINEMA),
    CommandEntry::new("query_video_prog_motion", &[(Zone::Z1, "?VTE", Some("VTE"))]),
    CommandEntry::with_args("set_video_prog_motion", &[(Zone::Z1, "VTE", Some("VTE"))], &VIDEO_PROG_MOTION),
    CommandEntry::new("query_video_stream_smoother", &[(Zone::Z1, "?VTF", Some("VTF"))]),
    CommandEntry::with_args(
        "set_video_stream_smoother",
        &[(Zone::Z1, "VTF", Some("VTF"))],
        &VIDEO_STREAM_SMOOTHER,
    ),
    CommandEntry::new("query_video_advanced_video_adjust", &[(Zone::Z1, "?VTG", Some("VTG"))]),
    CommandEntry::with_args(
        "set_video_advanced_video_adjust",
        &[(Zone::Z1, "VTG", Some("VTG"))],
        &ADVANCED_VIDEO_ADJUST,
    ),
    CommandEntry::new("query_video_ynr", &[(Zone::Z1, "?VTH", Some("VTH"))]),
    CommandEntry::with_args("set_video_ynr", &[(Zone::Z1, "VTH", Some("VTH"))], &VIDEO_YNR),
    CommandEntry::new("query_video_cnr", &[(Zone::Z1, "?VTI", Some("VTI"))]),
    CommandEntry::with_args("set_video_cnr", &[(Zone::Z1, "VTI", Some("VTI"))], &VIDEO_CNR),
    CommandEntry::new("query_video_bnr", &[(Zone::Z1, "?VTJ", Some("VTJ"))]),
    CommandEntry::with_args("set_video_bnr", &[(Zone::Z1, "VTJ", Some("VTJ"))], &VIDEO_BNR),
    CommandEntry::new("query_video_mnr", &[(Zone::Z1, "?VTK", Some("VTK"))]),
    CommandEntry::with_args("set_video_mnr", &[(Zone::Z1, "VTK", Some("VTK"))], &VIDEO_MNR),
    CommandEntry::new("query_video_detail", &[(Zone::Z1, "?VTL", Some("VTL"))]),
    CommandEntry::with_args("set_video_detail", &[(Zone::Z1, "VTL", Some("VTL"))], &VIDEO_DETAIL),
    CommandEntry::new("query_video_sharpness", &[(Zone::Z1, "?VTM", Some("VTM"))]),
    CommandEntry::with_args("set_video_sharpness", &[(Zone::Z1, "VTM", Some("VTM"))], &VIDEO_SHARPNESS),
    CommandEntry::new("query_video_brightness", &[(Zone::Z1, "?VTN", Some("VTN"))]),
    CommandEntry::with_args("set_video_brightness", &[(Zone::Z1, "VTN", Some("VTN"))], &VIDEO_BRIGHTNESS),
    CommandEntry::new("query_video_contrast", &[(Zone::Z1, "?VTO", Some("VTO"))]),
    CommandEntry::with_args("set_video_contrast", &[(Zone::Z1, "VTO", Some("VTO"))], &VIDEO_CONTRAST),
    CommandEntry::new("query_video_hue", &[(Zone::Z1, "?VTP", Some("VTP"))]),
    CommandEntry::with_args("set_video_hue", &[(Zone::Z1, "VTP", Some("VTP"))], &VIDEO_HUE),
    CommandEntry::new("query_video_chroma", &[(Zone::Z1, "?VTQ", Some("VTQ"))]),
    CommandEntry::with_args("set_video_chroma", &[(Zone::Z1, "VTQ", Some("VTQ"))], &VIDEO_CHROMA),
    CommandEntry::new("query_video_black_setup", &[(Zone::Z1, "?VTR", Some("VTR"))]),
    CommandEntry::with_args("set_video_black_setup", &[(Zone::Z1, "VTR", Some("VTR"))], &VIDEO_BLACK_SETUP),
    CommandEntry::new("query_video_aspect", &[(Zone::Z1, "?VTS", Some("VTS"))]),
    CommandEntry::with_args("set_video_aspect", &[(Zone::Z1, "VTS", Some("VTS"))], &VIDEO_ASPECT),
    CommandEntry::new("query_video_super_resolution", &[(Zone::Z1, "?VTT", Some("VTT"))]),
    CommandEntry::with_args(
        "set_video_super_resolution",
        &[(Zone::Z1, "VTT", Some("VTT"))],
        &VIDEO_SUPER_RESOLUTION,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolution_set_validated_against_parameter() {
        let params = AvrParams::default();
        let props = AvrProperties::new(params.clone());
        let code = VIDEO_RESOLUTION
            .parse_args("set_video_resolution", &[json!("1080p")], Zone::Z1, &params, &props)
            .unwrap();
        assert_eq!(code, "6");
        params.set_user_param(PARAM_VIDEO_RESOLUTION_MODES, json!(["0", "6"]));
        let err = VIDEO_RESOLUTION
            .parse_args("set_video_resolution", &[json!("4K")], Zone::Z1, &params, &props)
            .unwrap_err();
        assert!(matches!(err, Error::CommandUnavailable { .. }));
    }

    #[test]
    fn prog_motion_offset() {
        assert_eq!(VIDEO_PROG_MOTION.value_to_code(&json!(-4)).unwrap(), "46");
        assert_eq!(VIDEO_PROG_MOTION.code_to_value("54").unwrap(), json!(4));
    }
}
