/*!
 * Pure color classification: maps an averaged camera sample to a discrete
 * label using fixed, configurable thresholds. No I/O, no state, total over
 * the input domain.
 */

/**
 * Mean color of the region of interest, RGB, each channel in [0, 255].
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RgbSample {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

/**
 * Mean color of the region of interest in OpenCV HSV units:
 * hue in [0, 179], saturation and value in [0, 255].
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HsvSample {
    pub(crate) h: u8,
    pub(crate) s: u8,
    pub(crate) v: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorLabel {
    Red,
    Green,
    Blue,
    Yellow,
    Pink,
    Cyan,
    Purple,
    Black,
    White,
    Gray,
    Undefined,
}

impl ColorLabel {
    pub(crate) fn as_str(&self) -> &str {
        match self {
            ColorLabel::Red => "Red",
            ColorLabel::Green => "Green",
            ColorLabel::Blue => "Blue",
            ColorLabel::Yellow => "Yellow",
            ColorLabel::Pink => "Pink",
            ColorLabel::Cyan => "Cyan",
            ColorLabel::Purple => "Purple",
            ColorLabel::Black => "Black",
            ColorLabel::White => "White",
            ColorLabel::Gray => "Gray",
            ColorLabel::Undefined => "Undefined",
        }
    }
}

/**
 * Threshold set for both rule tables. Every comparison against these values
 * is strict: a channel exactly at a threshold does not qualify.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClassifierConfig {
    /**
     * Minimum brightness a channel must exceed to be considered dominant.
     */
    pub(crate) brightness_threshold: u8,
    /**
     * Amount by which a dominant channel must exceed each other channel.
     */
    pub(crate) dominance_margin: u8,
    /**
     * All channels below this: Black.
     */
    pub(crate) black_max: u8,
    /**
     * All channels above this: White.
     */
    pub(crate) white_min: u8,
    /**
     * Floor for the green and blue channels of a Pink sample.
     */
    pub(crate) pink_floor: u8,
    /**
     * HSV: saturation below this is achromatic (White/Gray).
     */
    pub(crate) saturation_floor: u8,
    /**
     * HSV: value below this is Black regardless of hue.
     */
    pub(crate) value_floor: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 120,
            dominance_margin: 60,
            black_max: 50,
            white_min: 200,
            pink_floor: 100,
            saturation_floor: 43,
            value_floor: 46,
        }
    }
}

/**
 * RGB rule table. Rules are evaluated in a fixed priority order and the
 * first match wins: Black, White, Yellow, Pink, Red, Green, Blue, else
 * Undefined. Achromatic rules come first so an equal-channel sample can
 * never win a chromatic rule; White precedes Pink so bright neutral samples
 * read as White.
 */
pub(crate) fn classify_rgb(sample: RgbSample, config: &ClassifierConfig) -> ColorLabel {
    let (r, g, b) = (sample.r, sample.g, sample.b);

    if r < config.black_max && g < config.black_max && b < config.black_max {
        return ColorLabel::Black;
    }
    if r > config.white_min && g > config.white_min && b > config.white_min {
        return ColorLabel::White;
    }

    // Yellow: red and green both bright, both clear of blue by the margin.
    if r > config.brightness_threshold
        && g > config.brightness_threshold
        && _exceeds_by(r, b, config.dominance_margin)
        && _exceeds_by(g, b, config.dominance_margin)
    {
        return ColorLabel::Yellow;
    }

    // Pink: red near-white, green and blue lifted but not bright enough
    // for White.
    if r > config.white_min && g > config.pink_floor && b > config.pink_floor {
        return ColorLabel::Pink;
    }

    if _is_dominant(r, g, b, config) {
        return ColorLabel::Red;
    }
    if _is_dominant(g, r, b, config) {
        return ColorLabel::Green;
    }
    if _is_dominant(b, r, g, config) {
        return ColorLabel::Blue;
    }

    ColorLabel::Undefined
}

/**
 * HSV rule table. Achromatic cases resolve first, since hue carries no
 * information at low saturation: value below the floor is Black, then low
 * saturation is White or Gray depending on value. Remaining samples are
 * chromatic and classify by hue band, with red wrapping around 0/179.
 */
pub(crate) fn classify_hsv(sample: HsvSample, config: &ClassifierConfig) -> ColorLabel {
    if sample.v < config.value_floor {
        return ColorLabel::Black;
    }
    if sample.s < config.saturation_floor {
        if sample.v > config.white_min {
            return ColorLabel::White;
        }
        return ColorLabel::Gray;
    }

    match sample.h {
        0..=9 => ColorLabel::Red,
        10..=34 => ColorLabel::Yellow,
        35..=77 => ColorLabel::Green,
        78..=99 => ColorLabel::Cyan,
        100..=124 => ColorLabel::Blue,
        125..=155 => ColorLabel::Purple,
        _ => ColorLabel::Red, // 156..=179 wraps back toward 0
    }
}

/**
 * A channel is dominant iff it strictly exceeds the brightness threshold
 * and strictly exceeds both other channels by the dominance margin.
 */
fn _is_dominant(candidate: u8, other_a: u8, other_b: u8, config: &ClassifierConfig) -> bool {
    candidate > config.brightness_threshold
        && _exceeds_by(candidate, other_a, config.dominance_margin)
        && _exceeds_by(candidate, other_b, config.dominance_margin)
}

fn _exceeds_by(candidate: u8, other: u8, margin: u8) -> bool {
    // u16 so other + margin cannot wrap.
    candidate as u16 > other as u16 + margin as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClassifierConfig {
        ClassifierConfig::default()
    }

    #[test]
    fn dominant_channel_wins_its_label() {
        let cfg = config();
        assert_eq!(
            classify_rgb(RgbSample { r: 200, g: 70, b: 70 }, &cfg),
            ColorLabel::Red
        );
        assert_eq!(
            classify_rgb(RgbSample { r: 70, g: 200, b: 70 }, &cfg),
            ColorLabel::Green
        );
        assert_eq!(
            classify_rgb(RgbSample { r: 70, g: 70, b: 200 }, &cfg),
            ColorLabel::Blue
        );
    }

    #[test]
    fn near_zero_channels_are_black() {
        assert_eq!(
            classify_rgb(RgbSample { r: 10, g: 10, b: 10 }, &config()),
            ColorLabel::Black
        );
    }

    #[test]
    fn near_max_channels_are_white() {
        assert_eq!(
            classify_rgb(RgbSample { r: 230, g: 230, b: 230 }, &config()),
            ColorLabel::White
        );
    }

    #[test]
    fn equal_mid_brightness_is_undefined() {
        assert_eq!(
            classify_rgb(RgbSample { r: 120, g: 120, b: 120 }, &config()),
            ColorLabel::Undefined
        );
    }

    #[test]
    fn thresholds_are_strict() {
        let cfg = config();
        // Exactly at the brightness threshold: not dominant.
        assert_eq!(
            classify_rgb(RgbSample { r: 120, g: 40, b: 40 }, &cfg),
            ColorLabel::Undefined
        );
        // Exactly the margin above the other channels: not dominant.
        assert_eq!(
            classify_rgb(RgbSample { r: 180, g: 120, b: 120 }, &cfg),
            ColorLabel::Undefined
        );
        // One past both bounds qualifies.
        assert_eq!(
            classify_rgb(RgbSample { r: 181, g: 120, b: 120 }, &cfg),
            ColorLabel::Red
        );
    }

    #[test]
    fn yellow_needs_red_and_green_clear_of_blue() {
        let cfg = config();
        assert_eq!(
            classify_rgb(RgbSample { r: 230, g: 230, b: 110 }, &cfg),
            ColorLabel::Yellow
        );
        // Blue too close to red: no rule fires.
        assert_eq!(
            classify_rgb(RgbSample { r: 150, g: 150, b: 120 }, &cfg),
            ColorLabel::Undefined
        );
    }

    #[test]
    fn pink_is_bright_red_with_lifted_green_and_blue() {
        let cfg = config();
        assert_eq!(
            classify_rgb(RgbSample { r: 230, g: 150, b: 150 }, &cfg),
            ColorLabel::Pink
        );
        // Green and blue at the floor exactly: falls through to Red
        // dominance instead.
        assert_eq!(
            classify_rgb(RgbSample { r: 230, g: 100, b: 100 }, &cfg),
            ColorLabel::Red
        );
    }

    #[test]
    fn white_outranks_pink() {
        // All channels above white_min also satisfy the Pink rule; White is
        // checked first.
        assert_eq!(
            classify_rgb(RgbSample { r: 210, g: 205, b: 202 }, &config()),
            ColorLabel::White
        );
    }

    #[test]
    fn classification_is_idempotent() {
        let cfg = config();
        let sample = RgbSample { r: 200, g: 70, b: 70 };
        assert_eq!(classify_rgb(sample, &cfg), classify_rgb(sample, &cfg));

        let hsv = HsvSample { h: 60, s: 200, v: 200 };
        assert_eq!(classify_hsv(hsv, &cfg), classify_hsv(hsv, &cfg));
    }

    #[test]
    fn hsv_achromatic_cases_resolve_before_hue() {
        let cfg = config();
        assert_eq!(
            classify_hsv(HsvSample { h: 0, s: 10, v: 240 }, &cfg),
            ColorLabel::White
        );
        assert_eq!(
            classify_hsv(HsvSample { h: 0, s: 10, v: 100 }, &cfg),
            ColorLabel::Gray
        );
        // Value below the floor is Black no matter how saturated.
        assert_eq!(
            classify_hsv(HsvSample { h: 60, s: 220, v: 30 }, &cfg),
            ColorLabel::Black
        );
    }

    #[test]
    fn hsv_hue_bands() {
        let cfg = config();
        let chroma = |h| HsvSample { h, s: 200, v: 200 };
        assert_eq!(classify_hsv(chroma(0), &cfg), ColorLabel::Red);
        assert_eq!(classify_hsv(chroma(30), &cfg), ColorLabel::Yellow);
        assert_eq!(classify_hsv(chroma(60), &cfg), ColorLabel::Green);
        assert_eq!(classify_hsv(chroma(90), &cfg), ColorLabel::Cyan);
        assert_eq!(classify_hsv(chroma(110), &cfg), ColorLabel::Blue);
        assert_eq!(classify_hsv(chroma(140), &cfg), ColorLabel::Purple);
        // Red wraps around the top of the hue range.
        assert_eq!(classify_hsv(chroma(170), &cfg), ColorLabel::Red);
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let cfg = ClassifierConfig {
            brightness_threshold: 90,
            dominance_margin: 30,
            ..ClassifierConfig::default()
        };
        assert_eq!(
            classify_rgb(RgbSample { r: 100, g: 60, b: 60 }, &cfg),
            ColorLabel::Red
        );
    }
}
