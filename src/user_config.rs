use std::{fs::read_to_string, path::Path};

use json::JsonValue;

use crate::classifier::ClassifierConfig;

const DEVICE_PREFS_FILE: &str = "v4l2_device.txt";
const RESOLUTION_FILE: &str = "resolution.txt";
const CLASSIFIER_FILE: &str = "classifier.json";
const PANEL_FILE: &str = "panel.json";
const CONTROLS_FILE: &str = "controls.json";

#[derive(Debug)]
pub(crate) struct DevicePreference {
    pub(crate) device_path: String,
    pub(crate) resolution: (usize, usize), // (width, height)
}

/**
 * Which color space the classifier runs in. The two rule tables use
 * different label subsets; a build picks one space and sticks with it.
 */
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum SampleSpace {
    Rgb,
    Hsv,
}

#[derive(Debug)]
pub(crate) struct SamplerSettings {
    pub(crate) space: SampleSpace,
    /**
     * Centered sample window encoded as
     * ((top_left_x, top_left_y), (bottom_right_x, bottom_right_y)),
     * right and bottom exclusive. Computed once from the configured ROI
     * size and clamped to the frame.
     */
    pub(crate) window: ((usize, usize), (usize, usize)),
    pub(crate) classifier: ClassifierConfig,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PanelBus {
    /**
     * HD44780 wired directly to GPIO, 4-bit mode.
     */
    Parallel {
        rs: u8,
        en: u8,
        d4: u8,
        d5: u8,
        d6: u8,
        d7: u8,
    },
    /**
     * PCF8574 I2C backpack.
     */
    I2c { addr: u16 },
}

#[derive(Debug)]
pub(crate) struct PanelInfo {
    pub(crate) bus: PanelBus,
}

#[derive(Debug)]
pub(crate) struct ControlPins {
    pub(crate) button_pin: u8,
    pub(crate) laser_pin: u8,
    pub(crate) blink_interval_ms: u64,
    pub(crate) debounce_ms: u64,
}

///////////////////
// Implementations
///////////////////
impl DevicePreference {
    pub(crate) fn read(config_dir: &Path) -> Self {
        let device_path = config_dir.join(DEVICE_PREFS_FILE);
        let device_txt = read_to_string(&device_path)
            .expect(format!("Could not read {}", device_path.to_str().unwrap()).as_str());

        let resolution_path = config_dir.join(RESOLUTION_FILE);
        let resolution_txt = read_to_string(&resolution_path)
            .expect(format!("Could not open file {}", resolution_path.to_str().unwrap()).as_str());
        let resolution_split = resolution_txt.split_whitespace();
        let resolution_parts: Vec<&str> = resolution_split.collect();
        if resolution_parts.len() != 2 {
            panic!(
                "Resolution Text could not be parsed. Resolution:\n{}",
                resolution_txt
            );
        }

        return Self {
            device_path: String::from(device_txt.trim()),
            resolution: (
                resolution_parts[0].trim().parse().unwrap(),
                resolution_parts[1].trim().parse().unwrap(),
            ),
        };
    }
}

impl SampleSpace {
    fn from_str(space: &str) -> Self {
        match space {
            "rgb" => Self::Rgb,
            "hsv" => Self::Hsv,
            _ => panic!("Invalid String for SampleSpace '{}'", space),
        }
    }
}

impl SamplerSettings {
    pub(crate) fn read(config_dir: &Path, image_size: &(usize, usize)) -> Self {
        let classifier_path = config_dir.join(CLASSIFIER_FILE);
        let classifier_raw = read_to_string(&classifier_path)
            .expect(format!("Could not read file {}", classifier_path.to_str().unwrap()).as_str());

        let classifier_json = json::parse(&classifier_raw).expect(
            format!(
                "Could not parse {} as JSON",
                classifier_path.to_str().unwrap()
            )
            .as_str(),
        );

        let space = SampleSpace::from_str(classifier_json["space"].as_str().unwrap());
        let roi_size = classifier_json["roi_size"].as_usize().unwrap();

        Self {
            space,
            window: SamplerSettings::_center_window(roi_size, image_size),
            classifier: SamplerSettings::_parse_thresholds(&classifier_json["thresholds"]),
        }
    }

    /**
     * Missing threshold keys fall back to the documented defaults, so a
     * config only has to name the values it actually tunes.
     */
    fn _parse_thresholds(thresholds_json: &JsonValue) -> ClassifierConfig {
        let defaults = ClassifierConfig::default();
        ClassifierConfig {
            brightness_threshold: thresholds_json["brightness_threshold"]
                .as_u8()
                .unwrap_or(defaults.brightness_threshold),
            dominance_margin: thresholds_json["dominance_margin"]
                .as_u8()
                .unwrap_or(defaults.dominance_margin),
            black_max: thresholds_json["black_max"]
                .as_u8()
                .unwrap_or(defaults.black_max),
            white_min: thresholds_json["white_min"]
                .as_u8()
                .unwrap_or(defaults.white_min),
            pink_floor: thresholds_json["pink_floor"]
                .as_u8()
                .unwrap_or(defaults.pink_floor),
            saturation_floor: thresholds_json["saturation_floor"]
                .as_u8()
                .unwrap_or(defaults.saturation_floor),
            value_floor: thresholds_json["value_floor"]
                .as_u8()
                .unwrap_or(defaults.value_floor),
        }
    }

    fn _center_window(
        roi_size: usize,
        image_size: &(usize, usize),
    ) -> ((usize, usize), (usize, usize)) {
        // An ROI larger than the frame shrinks to the frame.
        let roi_w = roi_size.min(image_size.0);
        let roi_h = roi_size.min(image_size.1);

        let top_left_x = (image_size.0 - roi_w) / 2;
        let top_left_y = (image_size.1 - roi_h) / 2;

        (
            (top_left_x, top_left_y),
            (top_left_x + roi_w, top_left_y + roi_h),
        )
    }
}

impl PanelInfo {
    pub(crate) fn read(config_dir: &Path) -> Self {
        let panel_path = config_dir.join(PANEL_FILE);
        let panel_raw = read_to_string(&panel_path)
            .expect(format!("Could not read file {}", panel_path.to_str().unwrap()).as_str());

        let panel_json = json::parse(&panel_raw)
            .expect(format!("Could not parse {} as JSON", panel_path.to_str().unwrap()).as_str());

        let bus = match panel_json["bus"].as_str().unwrap() {
            "parallel" => {
                let pins = &panel_json["pins"];
                PanelBus::Parallel {
                    rs: pins["rs"].as_u8().unwrap(),
                    en: pins["en"].as_u8().unwrap(),
                    d4: pins["d4"].as_u8().unwrap(),
                    d5: pins["d5"].as_u8().unwrap(),
                    d6: pins["d6"].as_u8().unwrap(),
                    d7: pins["d7"].as_u8().unwrap(),
                }
            }
            "i2c" => PanelBus::I2c {
                addr: panel_json["address"].as_u16().unwrap(),
            },
            other => panic!("Invalid String for PanelBus '{}'", other),
        };

        Self { bus }
    }
}

impl ControlPins {
    pub(crate) fn read(config_dir: &Path) -> Self {
        let controls_path = config_dir.join(CONTROLS_FILE);
        let controls_raw = read_to_string(&controls_path)
            .expect(format!("Could not read file {}", controls_path.to_str().unwrap()).as_str());

        let controls_json = json::parse(&controls_raw)
            .expect(format!("Could not parse {} as JSON", controls_path.to_str().unwrap()).as_str());

        Self {
            button_pin: controls_json["button_pin"].as_u8().unwrap(),
            laser_pin: controls_json["laser_pin"].as_u8().unwrap(),
            blink_interval_ms: controls_json["blink_interval_ms"].as_u64().unwrap(),
            debounce_ms: controls_json["debounce_ms"].as_u64().unwrap_or(200),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn write_config(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("write config file");
    }

    #[test]
    fn reads_device_preference() {
        let dir = tempdir().expect("temp config dir");
        write_config(dir.path(), DEVICE_PREFS_FILE, "/dev/video0\n");
        write_config(dir.path(), RESOLUTION_FILE, "320 240\n");

        let prefs = DevicePreference::read(dir.path());
        assert_eq!(prefs.device_path, "/dev/video0");
        assert_eq!(prefs.resolution, (320, 240));
    }

    #[test]
    fn reads_sampler_settings_with_partial_thresholds() {
        let dir = tempdir().expect("temp config dir");
        write_config(
            dir.path(),
            CLASSIFIER_FILE,
            r#"{
                "space": "rgb",
                "roi_size": 20,
                "thresholds": { "brightness_threshold": 130 }
            }"#,
        );

        let settings = SamplerSettings::read(dir.path(), &(320, 240));
        assert_eq!(settings.space, SampleSpace::Rgb);
        assert_eq!(settings.classifier.brightness_threshold, 130);
        // Unnamed keys keep their defaults.
        assert_eq!(settings.classifier.dominance_margin, 60);
        assert_eq!(settings.classifier.white_min, 200);
    }

    #[test]
    fn centers_and_clamps_the_sample_window() {
        assert_eq!(
            SamplerSettings::_center_window(20, &(320, 240)),
            ((150, 110), (170, 130))
        );
        // ROI wider than the frame collapses to the full frame.
        assert_eq!(
            SamplerSettings::_center_window(500, &(320, 240)),
            ((0, 0), (320, 240))
        );
    }

    #[test]
    fn reads_parallel_panel_info() {
        let dir = tempdir().expect("temp config dir");
        write_config(
            dir.path(),
            PANEL_FILE,
            r#"{
                "bus": "parallel",
                "pins": { "rs": 7, "en": 8, "d4": 25, "d5": 24, "d6": 23, "d7": 18 }
            }"#,
        );

        let panel = PanelInfo::read(dir.path());
        assert_eq!(
            panel.bus,
            PanelBus::Parallel {
                rs: 7,
                en: 8,
                d4: 25,
                d5: 24,
                d6: 23,
                d7: 18
            }
        );
    }

    #[test]
    fn reads_i2c_panel_info() {
        let dir = tempdir().expect("temp config dir");
        write_config(dir.path(), PANEL_FILE, r#"{ "bus": "i2c", "address": 39 }"#);

        let panel = PanelInfo::read(dir.path());
        assert_eq!(panel.bus, PanelBus::I2c { addr: 0x27 });
    }

    #[test]
    fn reads_control_pins() {
        let dir = tempdir().expect("temp config dir");
        write_config(
            dir.path(),
            CONTROLS_FILE,
            r#"{ "button_pin": 26, "laser_pin": 19, "blink_interval_ms": 500 }"#,
        );

        let controls = ControlPins::read(dir.path());
        assert_eq!(controls.button_pin, 26);
        assert_eq!(controls.laser_pin, 19);
        assert_eq!(controls.blink_interval_ms, 500);
        // Debounce window falls back to its default.
        assert_eq!(controls.debounce_ms, 200);
    }
}
