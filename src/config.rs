//! Settings-file parsing: line-oriented `key=value` pairs.
//!
//! Two recognised key sets exist. The image set is
//! {rawfile, encfile, decfile, rle, quantfile, width, height, logfile};
//! the video set adds {gop, merange, motioncompensation}. The presence of
//! any video-only key selects video mode, which then requires both sets in
//! full. Unknown and duplicate keys are rejected outright.
//!
//! The parser keeps every value as a string; numeric conversion happens at
//! the call site so that a failed cast is distinguishable from a missing
//! key (they carry different exit codes in the driver).

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Keys required for both image and video runs.
pub const IMAGE_KEYS: [&str; 8] = [
    "rawfile",
    "encfile",
    "decfile",
    "rle",
    "quantfile",
    "width",
    "height",
    "logfile",
];

/// Keys additionally required for video runs.
pub const VIDEO_KEYS: [&str; 3] = ["gop", "merange", "motioncompensation"];

/// Which pipeline a settings file configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Image,
    Video,
}

/// Parsed settings file.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Read and parse a settings file.
    ///
    /// # Errors
    /// `Error::Io` when the file cannot be read; `Error::Config` on a
    /// malformed line, an unknown key, or a duplicate key.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse settings from text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut values = BTreeMap::new();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                Error::config(format!("line {}: expected key=value, got '{}'", lineno + 1, line))
            })?;
            let key = key.trim();
            let value = value.trim();

            if !IMAGE_KEYS.contains(&key) && !VIDEO_KEYS.contains(&key) {
                return Err(Error::config(format!(
                    "line {}: unknown key '{}'",
                    lineno + 1,
                    key
                )));
            }
            if values.insert(key.to_string(), value.to_string()).is_some() {
                return Err(Error::config(format!(
                    "line {}: duplicate key '{}'",
                    lineno + 1,
                    key
                )));
            }
        }

        Ok(Settings { values })
    }

    /// Whether any video-only key is present.
    pub fn is_video(&self) -> bool {
        VIDEO_KEYS.iter().any(|k| self.values.contains_key(*k))
    }

    /// Enforce the full key set for the mode the file selects.
    ///
    /// # Errors
    /// `Error::Config` naming the first missing key.
    pub fn verify(&self) -> Result<Mode> {
        let mode = if self.is_video() {
            Mode::Video
        } else {
            Mode::Image
        };

        for key in IMAGE_KEYS {
            if !self.values.contains_key(key) {
                return Err(Error::config(format!("missing key '{}'", key)));
            }
        }
        if mode == Mode::Video {
            for key in VIDEO_KEYS {
                if !self.values.contains_key(key) {
                    return Err(Error::config(format!("missing key '{}'", key)));
                }
            }
        }
        Ok(mode)
    }

    /// Raw value for a key, which must be present.
    pub fn value(&self, key: &str) -> Result<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::config(format!("missing key '{}'", key)))
    }

    /// Parse a numeric value.
    ///
    /// # Errors
    /// `Error::Cast` when the value does not parse as the target type.
    pub fn numeric<T: FromStr>(&self, key: &str) -> Result<T> {
        let raw = self.value(key)?;
        raw.parse().map_err(|_| Error::Cast {
            key: key.to_string(),
            value: raw.to_string(),
        })
    }

    /// Parse a 0|1 flag value.
    ///
    /// # Errors
    /// `Error::Cast` for anything other than "0" or "1".
    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.value(key)? {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(Error::Cast {
                key: key.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE_CONFIG: &str = "\
rawfile=in.raw
encfile=out.enc
decfile=out.dec
rle=1
quantfile=quant.txt
width=64
height=48
logfile=run.log
";

    fn video_config() -> String {
        format!("{}gop=4\nmerange=16\nmotioncompensation=1\n", IMAGE_CONFIG)
    }

    #[test]
    fn test_parse_image_config() {
        let settings = Settings::parse(IMAGE_CONFIG).unwrap();
        assert_eq!(settings.verify().unwrap(), Mode::Image);
        assert!(!settings.is_video());
        assert_eq!(settings.value("rawfile").unwrap(), "in.raw");
        assert_eq!(settings.numeric::<u16>("width").unwrap(), 64);
        assert!(settings.flag("rle").unwrap());
    }

    #[test]
    fn test_parse_video_config() {
        let settings = Settings::parse(&video_config()).unwrap();
        assert_eq!(settings.verify().unwrap(), Mode::Video);
        assert!(settings.is_video());
        assert_eq!(settings.numeric::<u16>("gop").unwrap(), 4);
        assert_eq!(settings.numeric::<u16>("merange").unwrap(), 16);
        assert!(settings.flag("motioncompensation").unwrap());
    }

    #[test]
    fn test_blank_lines_and_comments_skipped() {
        let text = format!("# codec settings\n\n{}\n# end\n", IMAGE_CONFIG);
        let settings = Settings::parse(&text).unwrap();
        assert_eq!(settings.verify().unwrap(), Mode::Image);
    }

    #[test]
    fn test_whitespace_around_pairs_trimmed() {
        let settings = Settings::parse("  width = 64 \nheight=48\n").unwrap();
        assert_eq!(settings.value("width").unwrap(), "64");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Settings::parse("bitrate=9000\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = Settings::parse("width=64\nwidth=32\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_line_rejected() {
        let err = Settings::parse("width 64\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_image_key_fails_verify() {
        let text = IMAGE_CONFIG.replace("logfile=run.log\n", "");
        let settings = Settings::parse(&text).unwrap();
        assert!(matches!(settings.verify(), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_video_set_fails_verify() {
        // A single video-only key promotes the file to video mode, which
        // then demands the full video set.
        let text = format!("{}gop=4\n", IMAGE_CONFIG);
        let settings = Settings::parse(&text).unwrap();
        assert!(settings.is_video());
        assert!(matches!(settings.verify(), Err(Error::Config(_))));
    }

    #[test]
    fn test_non_numeric_value_is_cast_error() {
        let settings = Settings::parse("width=wide\n").unwrap();
        assert!(matches!(
            settings.numeric::<u16>("width"),
            Err(Error::Cast { .. })
        ));
    }

    #[test]
    fn test_flag_rejects_non_binary() {
        let settings = Settings::parse("rle=yes\n").unwrap();
        assert!(matches!(settings.flag("rle"), Err(Error::Cast { .. })));
    }
}
