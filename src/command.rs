use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::CameraError;
use crate::interface::endpoints;
use crate::status::{
    AutoPowerOff, BurstRate, CameraMode, FieldOfView, Leds, Orientation, PhotoMode, VideoMode,
    VideoStandard,
};

/// Settings to apply in one batch, keyed by property name as it appears in
/// status reports.
pub type CameraOptions = BTreeMap<String, String>;

/// Requests accepted by the control task.
#[derive(Debug, Clone)]
pub enum CameraRequest {
    Connect,
    Disconnect,
    PowerOn,
    PowerOff,
    StartShutter,
    StopShutter,
    StartLocate,
    StopLocate,
    SetOptions(CameraOptions),
    LoadStatus,
}

#[derive(Debug, Clone)]
pub enum CameraResponse {
    Unit,
    Status(crate::status::CameraStatus),
}

/// Maps a property name and value to the endpoint and parameter byte that
/// set it. Fails without touching the wire if the option is unknown or the
/// value does not parse.
pub fn translate_option(key: &str, value: &str) -> Result<(&'static str, u8), CameraError> {
    let reject = || CameraError::Rejected {
        reason: format!("unsupported option {key}={value}"),
    };

    let parsed: u8 = match key {
        "CameraMode" => {
            let mode = CameraMode::from_str(value).map_err(|_| reject())?;
            if mode == CameraMode::Timer {
                return Err(reject());
            }
            mode as u8
        }
        "DefaultCameraMode" => {
            let mode = CameraMode::from_str(value).map_err(|_| reject())?;
            match mode {
                CameraMode::Video | CameraMode::Photo | CameraMode::Burst
                | CameraMode::Timelapse => mode as u8,
                _ => return Err(reject()),
            }
        }
        "VideoMode" => VideoMode::from_str(value).map_err(|_| reject())? as u8,
        "VideoFOV" => FieldOfView::from_str(value).map_err(|_| reject())? as u8,
        "PhotoMode" => PhotoMode::from_str(value).map_err(|_| reject())? as u8,
        "BurstRate" => BurstRate::from_str(value).map_err(|_| reject())? as u8,
        "VideoStandard" => VideoStandard::from_str(value).map_err(|_| reject())? as u8,
        "Orientation" => Orientation::from_str(value).map_err(|_| reject())? as u8,
        "LEDs" => Leds::from_str(value).map_err(|_| reject())? as u8,
        "AutoPowerOff" => AutoPowerOff::from_str(value).map_err(|_| reject())? as u8,
        "VideoFPS" => fps_param(value).ok_or_else(reject)?,
        "TimelapseInterval" => timelapse_param(value).ok_or_else(reject)?,
        "BeepVolume" => beep_param(value).ok_or_else(reject)?,
        "Protune" | "SpotMeter" | "OSD" | "Locate" => bool_param(value).ok_or_else(reject)?,
        _ => return Err(reject()),
    };

    let endpoint = match key {
        "CameraMode" => endpoints::CAMERA_MODE,
        "DefaultCameraMode" => endpoints::DEFAULT_CAMERA_MODE,
        "VideoMode" => endpoints::VIDEO_MODE,
        "VideoFOV" => endpoints::VIDEO_FOV,
        "PhotoMode" => endpoints::PHOTO_MODE,
        "BurstRate" => endpoints::BURST_RATE,
        "VideoStandard" => endpoints::VIDEO_STANDARD,
        "Orientation" => endpoints::ORIENTATION,
        "LEDs" => endpoints::LEDS,
        "AutoPowerOff" => endpoints::AUTO_POWER_OFF,
        "VideoFPS" => endpoints::VIDEO_FPS,
        "TimelapseInterval" => endpoints::TIMELAPSE_INTERVAL,
        "BeepVolume" => endpoints::BEEP_VOLUME,
        "Protune" => endpoints::PROTUNE,
        "SpotMeter" => endpoints::SPOT_METER,
        "OSD" => endpoints::OSD,
        "Locate" => endpoints::LOCATE,
        _ => unreachable!("endpoint for accepted key {key}"),
    };

    Ok((endpoint, parsed))
}

fn bool_param(value: &str) -> Option<u8> {
    if value.eq_ignore_ascii_case("on") {
        Some(1)
    } else if value.eq_ignore_ascii_case("off") {
        Some(0)
    } else {
        None
    }
}

/// Frame rates are keyed by tenths of a frame to make 12.5 addressable.
fn fps_param(value: &str) -> Option<u8> {
    let fps: f32 = value.parse().ok()?;
    Some(match (fps * 10.0).round() as u32 {
        120 => 0x00,
        150 => 0x01,
        240 => 0x02,
        250 => 0x03,
        300 => 0x04,
        480 => 0x05,
        500 => 0x06,
        600 => 0x07,
        1000 => 0x08,
        1200 => 0x09,
        2400 => 0x0a,
        125 => 0x0b,
        _ => return None,
    })
}

fn timelapse_param(value: &str) -> Option<u8> {
    let interval: f32 = value.parse().ok()?;
    Some(match (interval * 10.0).round() as u32 {
        5 => 0x00,
        10 => 0x01,
        20 => 0x02,
        50 => 0x05,
        100 => 0x0a,
        200 => 0x14,
        300 => 0x1e,
        600 => 0x3c,
        _ => return None,
    })
}

fn beep_param(value: &str) -> Option<u8> {
    let volume: u8 = value.parse().ok()?;
    Some(match volume {
        0 => 0,
        1..=70 => 1,
        _ => 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_camera_mode() {
        assert_eq!(
            translate_option("CameraMode", "Photo").unwrap(),
            (endpoints::CAMERA_MODE, 1)
        );
    }

    #[test]
    fn timer_mode_is_not_settable() {
        assert!(translate_option("CameraMode", "Timer").is_err());
        assert!(translate_option("DefaultCameraMode", "Playback").is_err());
    }

    #[test]
    fn translates_fractional_fps() {
        assert_eq!(
            translate_option("VideoFPS", "12.5").unwrap(),
            (endpoints::VIDEO_FPS, 0x0b)
        );
        assert_eq!(
            translate_option("VideoFPS", "240").unwrap(),
            (endpoints::VIDEO_FPS, 0x0a)
        );
    }

    #[test]
    fn translates_booleans() {
        assert_eq!(
            translate_option("Protune", "On").unwrap(),
            (endpoints::PROTUNE, 1)
        );
        assert_eq!(
            translate_option("Locate", "off").unwrap(),
            (endpoints::LOCATE, 0)
        );
    }

    #[test]
    fn translates_beep_volume_buckets() {
        assert_eq!(translate_option("BeepVolume", "0").unwrap().1, 0);
        assert_eq!(translate_option("BeepVolume", "70").unwrap().1, 1);
        assert_eq!(translate_option("BeepVolume", "100").unwrap().1, 2);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = translate_option("Hologram", "On").unwrap_err();
        assert!(matches!(err, CameraError::Rejected { .. }));
        assert!(translate_option("VideoFPS", "13").is_err());
    }
}
