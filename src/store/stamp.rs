use std::fmt;

use chrono::{NaiveTime, Timelike};

use super::FRAME_EXTENSION;

const NAME_FORMAT: &str = "%H_%M_%S";

/// Wall-clock capture time at whole-second granularity. The derived ordering matches
/// the lexicographic ordering of the corresponding file names, but only within one
/// calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameStamp(NaiveTime);

impl FrameStamp {
    pub fn from_time(time: NaiveTime) -> Self {
        Self(time.with_nanosecond(0).unwrap_or(time))
    }

    /// `HH_MM_SS.jpg`
    pub fn file_name(&self) -> String {
        format!("{}.{FRAME_EXTENSION}", self.0.format(NAME_FORMAT))
    }

    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(FRAME_EXTENSION)?.strip_suffix('.')?;
        NaiveTime::parse_from_str(stem, NAME_FORMAT).ok().map(Self)
    }

    /// `HH:MM:SS`, as burned into the video.
    pub fn label(&self) -> String {
        self.0.format("%H:%M:%S").to_string()
    }

    /// True when `next` sorts before `self`, which for a sequential capture loop means
    /// the wall clock crossed midnight.
    pub fn wraps_before(&self, next: &FrameStamp) -> bool {
        next < self
    }
}

impl fmt::Display for FrameStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(h: u32, m: u32, s: u32) -> FrameStamp {
        FrameStamp::from_time(NaiveTime::from_hms_opt(h, m, s).unwrap())
    }

    #[test]
    fn file_name_is_zero_padded_24_hour() {
        assert_eq!(stamp(9, 5, 7).file_name(), "09_05_07.jpg");
        assert_eq!(stamp(23, 59, 59).file_name(), "23_59_59.jpg");
    }

    #[test]
    fn sub_second_precision_is_truncated() {
        let time = NaiveTime::from_hms_milli_opt(10, 0, 0, 999).unwrap();
        assert_eq!(FrameStamp::from_time(time), stamp(10, 0, 0));
    }

    #[test]
    fn parse_round_trips_file_name() {
        let original = stamp(14, 30, 2);
        assert_eq!(FrameStamp::parse_file_name(&original.file_name()), Some(original));
        assert_eq!(FrameStamp::parse_file_name("notes.txt"), None);
        assert_eq!(FrameStamp::parse_file_name("corrupt.jpg"), None);
        assert_eq!(FrameStamp::parse_file_name("25_00_00.jpg"), None);
    }

    #[test]
    fn stamp_order_matches_file_name_order() {
        let mut stamps = vec![stamp(10, 0, 0), stamp(9, 59, 59), stamp(0, 0, 1), stamp(13, 2, 0)];
        let mut names: Vec<String> = stamps.iter().map(FrameStamp::file_name).collect();
        stamps.sort();
        names.sort();
        let from_stamps: Vec<String> = stamps.iter().map(FrameStamp::file_name).collect();
        assert_eq!(from_stamps, names);
    }

    #[test]
    fn midnight_crossing_is_detected() {
        assert!(stamp(23, 59, 59).wraps_before(&stamp(0, 0, 5)));
        assert!(!stamp(9, 59, 59).wraps_before(&stamp(10, 0, 0)));
    }

    #[test]
    fn label_is_recovered_from_file_name() {
        assert_eq!(stamp(9, 59, 59).label(), "09:59:59");
        let parsed = FrameStamp::parse_file_name("10_00_00.jpg").unwrap();
        assert_eq!(parsed.label(), "10:00:00");
    }
}
