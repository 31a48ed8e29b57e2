use std::{
    io::BufRead,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use crossbeam_channel::Sender;
use serde::Deserialize;

use crate::types::{Frame, FrameInput, GestureKind, HandSkeleton};

/// Parsed input line.
#[derive(Clone, Debug)]
pub enum InputEvent {
    Frame(FrameInput),
    UpdateGesture {
        gesture: GestureKind,
        command: String,
        description: Option<String>,
    },
    GetConfig,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage {
    Frame(WireFrame),
    UpdateGesture {
        gesture: GestureKind,
        command: String,
        #[serde(default)]
        description: Option<String>,
    },
    GetConfig,
}

#[derive(Deserialize)]
struct WireFrame {
    #[serde(default)]
    timestamp_ms: Option<f64>,
    #[serde(default)]
    clutch: Option<HandSkeleton>,
    #[serde(default)]
    command: Option<HandSkeleton>,
    #[serde(default)]
    image: Option<WireImage>,
}

#[derive(Deserialize)]
struct WireImage {
    jpeg_base64: String,
}

/// Maps sender timestamps onto the local monotonic clock, anchored at the
/// first timestamped frame.
#[derive(Debug, Default)]
pub struct FrameClock {
    origin: Option<(Instant, f64)>,
}

impl FrameClock {
    pub fn at(&mut self, timestamp_ms: Option<f64>) -> Instant {
        let Some(ms) = timestamp_ms.filter(|ms| ms.is_finite()) else {
            return Instant::now();
        };
        let (base, first) = *self.origin.get_or_insert_with(|| (Instant::now(), ms));
        Duration::try_from_secs_f64((ms - first).max(0.0) / 1_000.0)
            .ok()
            .and_then(|offset| base.checked_add(offset))
            .unwrap_or_else(|| {
                log::warn!("frame timestamp {ms} out of range, using arrival time");
                Instant::now()
            })
    }
}

/// Parse one input line. Malformed lines, including hands with the wrong
/// number of keypoints, are rejected.
pub fn parse_line(line: &str, clock: &mut FrameClock) -> Result<InputEvent, serde_json::Error> {
    let event = match serde_json::from_str::<WireMessage>(line)? {
        WireMessage::Frame(frame) => InputEvent::Frame(FrameInput {
            timestamp: clock.at(frame.timestamp_ms),
            image: frame.image.and_then(|image| decode_image(&image.jpeg_base64)),
            clutch_hand: frame.clutch,
            command_hand: frame.command,
        }),
        WireMessage::UpdateGesture {
            gesture,
            command,
            description,
        } => InputEvent::UpdateGesture {
            gesture,
            command,
            description,
        },
        WireMessage::GetConfig => InputEvent::GetConfig,
    };
    Ok(event)
}

fn decode_image(encoded: &str) -> Option<Arc<Frame>> {
    let bytes = match BASE64.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("frame image is not valid base64: {err}");
            return None;
        }
    };
    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img.to_rgba8(),
        Err(err) => {
            log::warn!("failed to decode frame image: {err}");
            return None;
        }
    };

    let (width, height) = decoded.dimensions();
    Some(Arc::new(Frame {
        rgba: decoded.into_raw(),
        width,
        height,
        timestamp: Instant::now(),
    }))
}

/// Read JSON lines from `reader` on a background thread until EOF or until
/// the receiving side hangs up.
pub fn start_input_reader<R>(reader: R, event_tx: Sender<InputEvent>) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        let mut clock = FrameClock::default();
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    log::error!("failed to read input: {err}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_line(&line, &mut clock) {
                Ok(event) => {
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(err) => log::warn!("dropping input line: {err}"),
            }
        }
        log::info!("input stream closed");
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::types::{KEYPOINT_COUNT, Keypoint};

    fn hand_json(points: usize) -> String {
        let keypoints = vec![Keypoint::new(0.5, 0.5, 0.0); points];
        serde_json::json!({ "keypoints": keypoints, "handedness_confidence": 0.9 }).to_string()
    }

    #[test]
    fn parses_frame_with_hands() {
        let mut clock = FrameClock::default();
        let line = format!(
            r#"{{"type":"frame","timestamp_ms":1000,"clutch":{},"command":null}}"#,
            hand_json(KEYPOINT_COUNT)
        );
        let InputEvent::Frame(frame) = parse_line(&line, &mut clock).unwrap() else {
            panic!("expected a frame");
        };
        let clutch = frame.clutch_hand.unwrap();
        assert_eq!(clutch.keypoints().len(), KEYPOINT_COUNT);
        assert!((clutch.handedness_confidence() - 0.9).abs() < 1e-6);
        assert!(frame.command_hand.is_none());
        assert!(frame.image.is_none());
    }

    #[test]
    fn rejects_wrong_keypoint_count() {
        let mut clock = FrameClock::default();
        let line = format!(r#"{{"type":"frame","command":{}}}"#, hand_json(20));
        assert!(parse_line(&line, &mut clock).is_err());
    }

    #[test]
    fn parses_control_messages() {
        let mut clock = FrameClock::default();
        let event = parse_line(
            r#"{"type":"update_gesture","gesture":"shaka","command":"/compact"}"#,
            &mut clock,
        )
        .unwrap();
        assert!(matches!(
            event,
            InputEvent::UpdateGesture { gesture: GestureKind::Shaka, ref command, description: None }
                if command == "/compact"
        ));
        assert!(matches!(
            parse_line(r#"{"type":"get_config"}"#, &mut clock).unwrap(),
            InputEvent::GetConfig
        ));
        assert!(parse_line(r#"{"type":"unknown"}"#, &mut clock).is_err());
    }

    #[test]
    fn timestamps_are_relative_to_first_frame() {
        let mut clock = FrameClock::default();
        let first = clock.at(Some(5_000.0));
        let later = clock.at(Some(5_250.0));
        let earlier = clock.at(Some(4_000.0));
        assert_eq!(later - first, Duration::from_millis(250));
        assert_eq!(earlier, first);
    }

    #[test]
    fn out_of_range_timestamp_falls_back_to_arrival_time() {
        let mut clock = FrameClock::default();
        clock.at(Some(0.0));
        let before = Instant::now();
        assert!(clock.at(Some(1e300)) >= before);

        let line = r#"{"type":"frame","timestamp_ms":1e300}"#;
        assert!(matches!(parse_line(line, &mut clock), Ok(InputEvent::Frame(_))));
    }

    #[test]
    fn reader_skips_bad_lines() {
        let input = format!(
            "{}\nnot json\n\n{}\n",
            r#"{"type":"get_config"}"#,
            r#"{"type":"frame"}"#
        );
        let (tx, rx) = crossbeam_channel::unbounded();
        start_input_reader(Cursor::new(input.into_bytes()), tx)
            .join()
            .unwrap();

        let events: Vec<InputEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], InputEvent::GetConfig));
        assert!(matches!(events[1], InputEvent::Frame(_)));
    }

    #[test]
    fn decodes_jpeg_image() {
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut jpeg)
            .encode(&[10u8; 4 * 2 * 3], 4, 2, image::ExtendedColorType::Rgb8)
            .unwrap();
        let line = format!(
            r#"{{"type":"frame","image":{{"jpeg_base64":"{}"}}}}"#,
            BASE64.encode(&jpeg)
        );
        let mut clock = FrameClock::default();
        let InputEvent::Frame(frame) = parse_line(&line, &mut clock).unwrap() else {
            panic!("expected a frame");
        };
        let image = frame.image.unwrap();
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(image.rgba.len(), 4 * 2 * 4);
    }
}
