//! Decoding of the camera's binary status reports into typed values and the
//! flat property map published to subscribers.

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use num_traits::FromPrimitive as _;
use serde::{Deserialize, Serialize};

/// Backpack status report (`/bacpac/se`). Only two bytes of the payload
/// carry information we act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacpacStatus {
    pub power_on: bool,
    pub ready: bool,
}

impl BacpacStatus {
    pub fn parse(raw: &[u8]) -> anyhow::Result<Self> {
        if raw.len() <= 11 {
            bail!("backpack status too short ({} bytes)", raw.len());
        }

        Ok(BacpacStatus {
            power_on: raw[9] == 1,
            ready: raw[11] == 1,
        })
    }
}

/// Camera identity parsed from `/camera/cv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub model_id: String,
    pub model: String,
    pub firmware: String,
}

impl CameraInfo {
    /// The payload starts with four bytes of framing, then
    /// `<version>\x05<name>` where the first two dot-separated fields of the
    /// version identify the model.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let body = raw.get(4..).context("camera info too short")?;
        let version = body
            .split('\u{5}')
            .next()
            .context("camera info missing version field")?;

        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() < 2 {
            bail!("unrecognized camera version: {version:?}");
        }

        let model_id = format!("{}.{}", parts[0], parts[1]);
        let firmware = parts[2..].join(".");
        let model = model_name(&model_id)
            .map(str::to_owned)
            .unwrap_or_else(|| model_id.clone());

        Ok(CameraInfo {
            model_id,
            model,
            firmware,
        })
    }
}

fn model_name(model_id: &str) -> Option<&'static str> {
    Some(match model_id {
        "HD2.08" => "HD HERO2",
        "HD3.01" => "HERO3 White Edition",
        "HD3.02" => "HERO3 Silver Edition",
        "HD3.03" => "HERO3 Black Edition",
        "HD3.10" => "HERO3+ Silver Edition",
        "HD3.11" => "HERO3+ Black Edition",
        "HD4.01" => "HERO4 Silver Edition",
        "HD4.02" => "HERO4 Black Edition",
        _ => return None,
    })
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $value:expr => $label:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq,
            num_derive::FromPrimitive,
            Serialize, Deserialize,
        )]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, ()> {
                $(if s.eq_ignore_ascii_case($label) {
                    return Ok($name::$variant);
                })+
                Err(())
            }
        }
    };
}

wire_enum! {
    /// Capture mode. `Timer` is reported by some firmwares but cannot be
    /// selected over the wire.
    CameraMode {
        Video = 0 => "Video",
        Photo = 1 => "Photo",
        Burst = 2 => "Burst",
        Timelapse = 3 => "Timelapse",
        Timer = 4 => "Timer",
        Playback = 5 => "Playback",
        Settings = 7 => "Settings",
    }
}

wire_enum! {
    FieldOfView {
        Wide = 0 => "Wide",
        Medium = 1 => "Medium",
        Narrow = 2 => "Narrow",
    }
}

wire_enum! {
    PhotoMode {
        Wide11mp = 0 => "11mpWide",
        Medium8mp = 1 => "8mpMedium",
        Wide5mp = 2 => "5mpWide",
        Medium5mp = 3 => "5mpMedium",
        Wide7mp = 4 => "7mpWide",
        Wide12mp = 5 => "12mpWide",
        Medium7mp = 6 => "7mpMedium",
    }
}

wire_enum! {
    VideoMode {
        Wvga = 0 => "WVGA",
        V720 = 1 => "720",
        V960 = 2 => "960",
        V1080 = 3 => "1080",
        V1440 = 4 => "1440",
        V2p7k = 5 => "2.7K",
        V4k = 6 => "4K",
        V2p7kCinema = 7 => "2.7KCinema",
        V4kCinema = 8 => "4KCinema",
        V1080SuperView = 9 => "1080SuperView",
        V720SuperView = 10 => "720SuperView",
    }
}

wire_enum! {
    BurstRate {
        Three1s = 0 => "3/1s",
        Five1s = 1 => "5/1s",
        Ten1s = 2 => "10/1s",
        Ten2s = 3 => "10/2s",
        Thirty1s = 4 => "30/1s",
        Thirty2s = 5 => "30/2s",
        Thirty3s = 6 => "30/3s",
    }
}

impl BurstRate {
    /// The readback register uses a different numbering than the write
    /// command; notably both 0 and 4 report as 30/1s.
    pub fn from_status_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 | 4 => BurstRate::Thirty1s,
            1 => BurstRate::Five1s,
            2 => BurstRate::Ten1s,
            3 => BurstRate::Ten2s,
            5 => BurstRate::Thirty2s,
            6 => BurstRate::Thirty3s,
            _ => return None,
        })
    }
}

wire_enum! {
    Orientation {
        Up = 0 => "Up",
        Down = 1 => "Down",
    }
}

wire_enum! {
    VideoStandard {
        Ntsc = 0 => "NTSC",
        Pal = 1 => "PAL",
    }
}

wire_enum! {
    Leds {
        Off = 0 => "Off",
        Two = 1 => "2",
        Four = 2 => "4",
    }
}

wire_enum! {
    AutoPowerOff {
        Never = 0 => "Never",
        Secs60 = 1 => "60",
        Secs120 = 2 => "120",
        Secs300 = 3 => "300",
    }
}

// Offsets into the 31-byte /camera/se payload.
mod offset {
    pub const CAMERA_MODE: usize = 1;
    pub const STARTUP_MODE: usize = 3;
    pub const SPOT_METER: usize = 4;
    pub const TIMELAPSE_INTERVAL: usize = 5;
    pub const AUTO_POWER_OFF: usize = 6;
    pub const FIELD_OF_VIEW: usize = 7;
    pub const PHOTO_MODE: usize = 8;
    pub const RECORDING_MINUTES: usize = 13;
    pub const RECORDING_SECONDS: usize = 14;
    pub const BEEP_VOLUME: usize = 16;
    pub const LEDS: usize = 17;
    pub const STATUS_BITS_1: usize = 18;
    pub const BATTERY_LEVEL: usize = 19;
    pub const PHOTOS_AVAILABLE_HI: usize = 21;
    pub const PHOTOS_AVAILABLE_LO: usize = 22;
    pub const PHOTO_COUNT_HI: usize = 23;
    pub const PHOTO_COUNT_LO: usize = 24;
    pub const VIDEO_REMAINING_HI: usize = 25;
    pub const VIDEO_REMAINING_LO: usize = 26;
    pub const VIDEO_COUNT_HI: usize = 27;
    pub const VIDEO_COUNT_LO: usize = 28;
    pub const RECORDING: usize = 29;
    pub const STATUS_BITS_2: usize = 30;
}

/// A full decoded status snapshot, combining the main status register with
/// the three auxiliary readback registers.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraStatus {
    pub camera_mode: Option<CameraMode>,
    pub default_mode: Option<CameraMode>,
    pub spot_meter: bool,
    pub timelapse_interval: f32,
    pub auto_power_off: Option<AutoPowerOff>,
    pub field_of_view: Option<FieldOfView>,
    pub photo_mode: Option<PhotoMode>,
    pub recording_time: u32,
    pub beep_volume: u8,
    pub leds: Option<Leds>,
    pub preview: bool,
    pub orientation: Orientation,
    pub one_button: bool,
    pub osd: bool,
    pub video_standard: VideoStandard,
    pub locate: bool,
    pub battery_level: u8,
    pub photos_available: u16,
    pub photo_count: u16,
    pub video_available_time: u32,
    pub video_count: u16,
    pub video_recording: bool,
    pub burst_recording: bool,
    pub protune: bool,
    pub sd_card: bool,
    pub video_mode: Option<VideoMode>,
    pub video_fps: f32,
    pub burst_rate: Option<BurstRate>,
}

impl CameraStatus {
    pub fn decode(
        status: &[u8],
        video_mode: &[u8],
        video_fps: &[u8],
        burst_rate: &[u8],
    ) -> anyhow::Result<Self> {
        if status.len() < 31 {
            bail!("camera status too short ({} bytes)", status.len());
        }

        let word = |hi: usize, lo: usize| u16::from(status[hi]) << 8 | u16::from(status[lo]);
        let bits1 = status[offset::STATUS_BITS_1];
        let bits2 = status[offset::STATUS_BITS_2];

        // A readback register is two bytes; the value is the second one.
        let register = |raw: &[u8]| raw.get(1).copied();

        Ok(CameraStatus {
            camera_mode: CameraMode::from_u8(status[offset::CAMERA_MODE]),
            default_mode: match status[offset::STARTUP_MODE] {
                byte @ 0..=3 => CameraMode::from_u8(byte),
                _ => None,
            },
            spot_meter: status[offset::SPOT_METER] == 1,
            timelapse_interval: decode_timelapse(status[offset::TIMELAPSE_INTERVAL]),
            auto_power_off: AutoPowerOff::from_u8(status[offset::AUTO_POWER_OFF]),
            field_of_view: FieldOfView::from_u8(status[offset::FIELD_OF_VIEW]),
            photo_mode: PhotoMode::from_u8(status[offset::PHOTO_MODE]),
            recording_time: u32::from(status[offset::RECORDING_MINUTES]) * 60
                + u32::from(status[offset::RECORDING_SECONDS]),
            beep_volume: decode_beep(status[offset::BEEP_VOLUME]),
            leds: Leds::from_u8(status[offset::LEDS]),
            preview: bits1 & 0x01 != 0,
            orientation: if bits1 & 0x04 != 0 {
                Orientation::Down
            } else {
                Orientation::Up
            },
            one_button: bits1 & 0x08 != 0,
            osd: bits1 & 0x10 != 0,
            video_standard: if bits1 & 0x20 != 0 {
                VideoStandard::Pal
            } else {
                VideoStandard::Ntsc
            },
            locate: bits1 & 0x40 != 0,
            battery_level: status[offset::BATTERY_LEVEL],
            photos_available: word(offset::PHOTOS_AVAILABLE_HI, offset::PHOTOS_AVAILABLE_LO),
            photo_count: word(offset::PHOTO_COUNT_HI, offset::PHOTO_COUNT_LO),
            video_available_time: u32::from(word(
                offset::VIDEO_REMAINING_HI,
                offset::VIDEO_REMAINING_LO,
            )) * 60,
            video_count: word(offset::VIDEO_COUNT_HI, offset::VIDEO_COUNT_LO),
            video_recording: status[offset::RECORDING] == 1,
            burst_recording: bits2 & 0x01 != 0,
            protune: bits2 & 0x02 != 0,
            // the "photos available" word pegs at 0xff in the high byte when
            // no card is inserted
            sd_card: status[offset::PHOTOS_AVAILABLE_HI] != 0xff,
            video_mode: register(video_mode).and_then(VideoMode::from_u8),
            video_fps: register(video_fps).map(decode_fps).unwrap_or(0.0),
            burst_rate: register(burst_rate).and_then(BurstRate::from_status_byte),
        })
    }

    /// Renders the snapshot into the flat string map published to
    /// subscribers. Keys are stable across firmware generations.
    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();

        let mut put = |key: &str, value: String| {
            map.insert(key.to_owned(), value);
        };

        put("AutoPowerOff", display_opt(self.auto_power_off));
        put("BatteryLevel", self.battery_level.to_string());
        put("BeepVolume", self.beep_volume.to_string());
        put("BurstRate", display_opt(self.burst_rate));
        put("BurstRecording", on_off(self.burst_recording));
        put("CameraMode", display_opt(self.camera_mode));
        put("DefaultCameraMode", display_opt(self.default_mode));
        put("LEDs", display_opt(self.leds));
        put("Locate", on_off(self.locate));
        put("OSD", on_off(self.osd));
        put("Orientation", self.orientation.to_string());
        put("PhotoCount", self.photo_count.to_string());
        put("PhotoMode", display_opt(self.photo_mode));
        put("PhotosAvailable", self.photos_available.to_string());
        put("Preview", on_off(self.preview));
        put("Protune", on_off(self.protune));
        put("SDCard", if self.sd_card { "Yes" } else { "No" }.to_owned());
        put("SpotMeter", on_off(self.spot_meter));
        put("TimelapseInterval", display_number(self.timelapse_interval));
        put("VideoAvailableTime", self.video_available_time.to_string());
        put("VideoCount", self.video_count.to_string());
        put("VideoFOV", display_opt(self.field_of_view));
        put("VideoFPS", display_number(self.video_fps));
        put("VideoMode", display_opt(self.video_mode));
        put("VideoRecording", on_off(self.video_recording));
        put("VideoRecordingTime", self.recording_time.to_string());
        put("VideoStandard", self.video_standard.to_string());

        map
    }
}

fn on_off(value: bool) -> String {
    if value { "On" } else { "Off" }.to_owned()
}

fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "Unknown".to_owned(),
    }
}

/// Formats without a trailing `.0` for whole numbers, so values read
/// `30` and `12.5` rather than `30.0`.
fn display_number(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as u32)
    } else {
        format!("{value}")
    }
}

fn decode_timelapse(byte: u8) -> f32 {
    match byte {
        0 => 0.5,
        1 => 1.0,
        2 => 2.0,
        5 => 5.0,
        10 => 10.0,
        30 => 30.0,
        60 => 60.0,
        _ => 0.0,
    }
}

fn decode_fps(byte: u8) -> f32 {
    match byte {
        0 => 12.0,
        1 => 15.0,
        2 => 24.0,
        3 => 25.0,
        4 => 30.0,
        5 => 48.0,
        6 => 50.0,
        7 => 60.0,
        8 => 100.0,
        9 => 120.0,
        10 => 240.0,
        11 => 12.5,
        _ => 0.0,
    }
}

fn decode_beep(byte: u8) -> u8 {
    match byte {
        0 => 0,
        1 => 70,
        _ => 100,
    }
}

/// One changed property between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub key: String,
    pub old: Option<String>,
    pub new: String,
}

/// The set of properties that changed between two snapshots. The first
/// snapshot after a session starts reports every property, with `old`
/// absent and `initial` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDelta {
    pub entries: Vec<StatusChange>,
    pub initial: bool,
}

impl StatusDelta {
    pub fn between(
        previous: Option<&BTreeMap<String, String>>,
        current: &BTreeMap<String, String>,
    ) -> Self {
        let entries = current
            .iter()
            .filter_map(|(key, value)| {
                let old = previous.and_then(|prev| prev.get(key));
                if old == Some(value) {
                    return None;
                }
                Some(StatusChange {
                    key: key.clone(),
                    old: old.cloned(),
                    new: value.clone(),
                })
            })
            .collect();

        StatusDelta {
            entries,
            initial: previous.is_none(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_status() -> [u8; 31] {
        let mut raw = [0u8; 31];
        raw[offset::CAMERA_MODE] = 0; // video
        raw[offset::TIMELAPSE_INTERVAL] = 1;
        raw[offset::FIELD_OF_VIEW] = 0;
        raw[offset::BATTERY_LEVEL] = 87;
        raw[offset::PHOTOS_AVAILABLE_HI] = 0x01;
        raw[offset::PHOTOS_AVAILABLE_LO] = 0x2c;
        raw[offset::VIDEO_REMAINING_HI] = 0x00;
        raw[offset::VIDEO_REMAINING_LO] = 0x5a;
        raw
    }

    #[test]
    fn bacpac_status_reads_power_and_ready() {
        let mut raw = [0u8; 12];
        raw[9] = 1;
        let status = BacpacStatus::parse(&raw).unwrap();
        assert!(status.power_on);
        assert!(!status.ready);

        raw[11] = 1;
        let status = BacpacStatus::parse(&raw).unwrap();
        assert!(status.ready);
    }

    #[test]
    fn bacpac_status_rejects_short_payload() {
        assert!(BacpacStatus::parse(&[0u8; 11]).is_err());
    }

    #[test]
    fn camera_info_known_model() {
        let info = CameraInfo::parse("\u{1}\u{0}\u{1}\u{0}HD3.02.03.00\u{5}HERO3").unwrap();
        assert_eq!(info.model_id, "HD3.02");
        assert_eq!(info.model, "HERO3 Silver Edition");
        assert_eq!(info.firmware, "03.00");
    }

    #[test]
    fn camera_info_unknown_model_falls_back_to_id() {
        let info = CameraInfo::parse("xxxxHD9.99.01.23\u{5}FUTURE").unwrap();
        assert_eq!(info.model, "HD9.99");
        assert_eq!(info.firmware, "01.23");
    }

    #[test]
    fn decode_basic_fields() {
        let status = base_status();
        let decoded =
            CameraStatus::decode(&status, &[0, 3], &[0, 4], &[0, 1]).unwrap();

        assert_eq!(decoded.camera_mode, Some(CameraMode::Video));
        assert_eq!(decoded.battery_level, 87);
        assert_eq!(decoded.photos_available, 300);
        assert_eq!(decoded.video_available_time, 90 * 60);
        assert!(decoded.sd_card);
        assert_eq!(decoded.video_mode, Some(VideoMode::V1080));
        assert_eq!(decoded.video_fps, 30.0);
        assert_eq!(decoded.burst_rate, Some(BurstRate::Five1s));
        assert_eq!(decoded.timelapse_interval, 1.0);
    }

    #[test]
    fn decode_status_bits() {
        let mut status = base_status();
        status[offset::STATUS_BITS_1] = 0x01 | 0x04 | 0x20;
        status[offset::STATUS_BITS_2] = 0x02;
        let decoded =
            CameraStatus::decode(&status, &[0, 0], &[0, 0], &[0, 0]).unwrap();

        assert!(decoded.preview);
        assert_eq!(decoded.orientation, Orientation::Down);
        assert_eq!(decoded.video_standard, VideoStandard::Pal);
        assert!(decoded.protune);
        assert!(!decoded.burst_recording);
    }

    #[test]
    fn missing_sd_card_uses_sentinel() {
        let mut status = base_status();
        status[offset::PHOTOS_AVAILABLE_HI] = 0xff;
        let decoded =
            CameraStatus::decode(&status, &[0, 0], &[0, 0], &[0, 0]).unwrap();
        assert!(!decoded.sd_card);
    }

    #[test]
    fn decode_rejects_short_status() {
        assert!(CameraStatus::decode(&[0u8; 30], &[0, 0], &[0, 0], &[0, 0]).is_err());
    }

    #[test]
    fn fractional_fps_keeps_decimal_point() {
        let status = base_status();
        let decoded =
            CameraStatus::decode(&status, &[0, 0], &[0, 11], &[0, 0]).unwrap();
        let props = decoded.properties();
        assert_eq!(props["VideoFPS"], "12.5");
        assert_eq!(props["TimelapseInterval"], "1");
    }

    #[test]
    fn first_delta_reports_every_property() {
        let status = base_status();
        let decoded =
            CameraStatus::decode(&status, &[0, 0], &[0, 0], &[0, 0]).unwrap();
        let props = decoded.properties();

        let delta = StatusDelta::between(None, &props);
        assert!(delta.initial);
        assert_eq!(delta.entries.len(), props.len());
        assert!(delta.entries.iter().all(|change| change.old.is_none()));
    }

    #[test]
    fn later_delta_reports_only_changes() {
        let status = base_status();
        let decoded =
            CameraStatus::decode(&status, &[0, 0], &[0, 0], &[0, 0]).unwrap();
        let old_props = decoded.properties();

        let mut status = base_status();
        status[offset::BATTERY_LEVEL] = 60;
        let decoded =
            CameraStatus::decode(&status, &[0, 0], &[0, 0], &[0, 0]).unwrap();
        let new_props = decoded.properties();

        let delta = StatusDelta::between(Some(&old_props), &new_props);
        assert!(!delta.initial);
        assert_eq!(delta.entries.len(), 1);
        assert_eq!(delta.entries[0].key, "BatteryLevel");
        assert_eq!(delta.entries[0].old.as_deref(), Some("87"));
        assert_eq!(delta.entries[0].new, "60");
    }
}
