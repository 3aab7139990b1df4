use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::RenderError;

/// One subtitle line timed against the main audio clock.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubtitleSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl SubtitleSegment {
    pub fn new(text: impl Into<String>, start_ms: u64, end_ms: u64) -> Result<Self, RenderError> {
        let text = text.into();
        if start_ms > end_ms {
            return Err(RenderError::InvalidSubtitle {
                text,
                start_ms,
                end_ms,
            });
        }
        Ok(Self {
            text,
            start_ms,
            end_ms,
        })
    }

    /// Output frames covered by this segment, inclusive on both ends, after
    /// shifting by `offset_frames`.
    pub fn frame_range(&self, fps: u32, offset_frames: usize) -> std::ops::RangeInclusive<usize> {
        let to_frame = |ms: u64| (ms * fps as u64 / 1000) as usize + offset_frames;
        to_frame(self.start_ms)..=to_frame(self.end_ms)
    }
}

/// Load segments from a JSON array of `{text, start_ms, end_ms}` objects.
///
/// Segments whose start is after their end are dropped with a warning.
pub fn load_segments(path: &Path) -> Result<Vec<SubtitleSegment>, RenderError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| RenderError::asset(path, e))?;
    let raw: Vec<SubtitleSegment> =
        serde_json::from_str(&content).map_err(|e| RenderError::asset(path, e))?;

    let mut segments = Vec::with_capacity(raw.len());
    for seg in raw {
        match SubtitleSegment::new(seg.text, seg.start_ms, seg.end_ms) {
            Ok(seg) => segments.push(seg),
            Err(err) => log::warn!("Skipping subtitle: {}", err),
        }
    }

    log::info!("Loaded {} subtitle segments from {}", segments.len(), path.display());
    Ok(segments)
}

/// Frame index -> subtitle text, built once per render.
///
/// Segment timestamps are shifted by the intro clip length so subtitles stay
/// on the main audio clock. Where segments overlap, the earlier one in the
/// input keeps the frame.
#[derive(Debug, Default)]
pub struct SubtitleLookup {
    segments: Vec<SubtitleSegment>,
    by_frame: HashMap<usize, usize>,
}

impl SubtitleLookup {
    pub fn build(segments: Vec<SubtitleSegment>, fps: u32, offset_frames: usize) -> Self {
        let mut by_frame = HashMap::new();
        for (idx, seg) in segments.iter().enumerate() {
            for frame in seg.frame_range(fps, offset_frames) {
                by_frame.entry(frame).or_insert(idx);
            }
        }
        Self { segments, by_frame }
    }

    pub fn text_at(&self, frame: usize) -> Option<&str> {
        self.by_frame
            .get(&frame)
            .map(|&idx| self.segments[idx].text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, start: u64, end: u64) -> SubtitleSegment {
        SubtitleSegment::new(text, start, end).unwrap()
    }

    #[test]
    fn segment_maps_to_inclusive_frames() {
        let lookup = SubtitleLookup::build(vec![seg("hi", 1000, 1500)], 30, 90);
        assert_eq!(lookup.text_at(119), None);
        for frame in 120..=135 {
            assert_eq!(lookup.text_at(frame), Some("hi"), "frame {}", frame);
        }
        assert_eq!(lookup.text_at(136), None);
    }

    #[test]
    fn first_segment_wins_on_overlap() {
        let lookup = SubtitleLookup::build(
            vec![seg("first", 0, 1000), seg("second", 500, 2000)],
            10,
            0,
        );
        assert_eq!(lookup.text_at(5), Some("first"));
        assert_eq!(lookup.text_at(10), Some("first"));
        assert_eq!(lookup.text_at(11), Some("second"));
        assert_eq!(lookup.text_at(20), Some("second"));
    }

    #[test]
    fn zero_length_segment_covers_one_frame() {
        let lookup = SubtitleLookup::build(vec![seg("blip", 2000, 2000)], 25, 0);
        assert_eq!(lookup.text_at(50), Some("blip"));
        assert_eq!(lookup.text_at(49), None);
        assert_eq!(lookup.text_at(51), None);
    }

    #[test]
    fn rejects_inverted_segment() {
        let err = SubtitleSegment::new("bad", 900, 100).unwrap_err();
        assert!(matches!(err, RenderError::InvalidSubtitle { .. }));
    }

    #[test]
    fn loads_json_and_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.json");
        std::fs::write(
            &path,
            r#"[
                {"text": "hello", "start_ms": 0, "end_ms": 800},
                {"text": "broken", "start_ms": 900, "end_ms": 100},
                {"text": "world", "start_ms": 900, "end_ms": 1500}
            ]"#,
        )
        .unwrap();

        let segments = load_segments(&path).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "hello");
        assert_eq!(segments[1].start_ms, 900);
    }

    #[test]
    fn malformed_json_is_asset_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_segments(&path), Err(RenderError::Asset { .. })));
    }
}
