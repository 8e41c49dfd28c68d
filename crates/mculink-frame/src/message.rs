use crate::codec::SEPARATOR;
use crate::error::DecodeError;

/// Type tag of a reply frame: `R:<correlation id>:<body>`.
pub const REPLY_TAG: &str = "R";

/// Type tag of a state update frame: `S:<body>`.
pub const STATE_TAG: &str = "S";

/// A reply from the device to a command sent by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Correlation id echoed back by the device.
    pub correlation_id: String,
    /// Reply body (may contain `:`).
    pub body: String,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Reply to an outstanding command.
    Reply(Reply),
    /// Unsolicited telemetry.
    StateUpdate { body: String },
}

/// Decode one frame (terminator already stripped).
///
/// The type tag and, for replies, the correlation id are split off the front;
/// everything after them is the body, separators included, less one trailing
/// separator.
pub fn decode(frame: &[u8]) -> Result<Message, DecodeError> {
    if frame.is_empty() {
        return Err(DecodeError::Empty);
    }

    let text = std::str::from_utf8(frame).map_err(|_| DecodeError::InvalidUtf8)?;
    let separator = SEPARATOR as char;

    let Some((tag, rest)) = text.split_once(separator) else {
        return Err(DecodeError::UnrecognizedType {
            tag: text.to_string(),
        });
    };

    match tag {
        STATE_TAG => Ok(Message::StateUpdate {
            body: trim_separator(rest).to_string(),
        }),
        REPLY_TAG => {
            let (id, body) = rest.split_once(separator).unwrap_or((rest, ""));
            Ok(Message::Reply(Reply {
                correlation_id: id.to_string(),
                body: trim_separator(body).to_string(),
            }))
        }
        other => Err(DecodeError::UnrecognizedType {
            tag: other.to_string(),
        }),
    }
}

fn trim_separator(body: &str) -> &str {
    body.strip_suffix(SEPARATOR as char).unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use proptest::prelude::*;

    use super::*;
    use crate::codec::FrameAssembler;

    fn reply(id: &str, body: &str) -> Message {
        Message::Reply(Reply {
            correlation_id: id.to_string(),
            body: body.to_string(),
        })
    }

    #[test]
    fn decodes_reply() {
        assert_eq!(decode(b"R:1700000000123:ok").unwrap(), reply("1700000000123", "ok"));
    }

    #[test]
    fn decodes_state_update() {
        assert_eq!(
            decode(b"S:42").unwrap(),
            Message::StateUpdate {
                body: "42".to_string()
            }
        );
    }

    #[test]
    fn body_keeps_embedded_separators() {
        assert_eq!(decode(b"R:9:a:b:c").unwrap(), reply("9", "a:b:c"));
        assert_eq!(
            decode(b"S:x=1:y=2").unwrap(),
            Message::StateUpdate {
                body: "x=1:y=2".to_string()
            }
        );
    }

    #[test]
    fn one_trailing_separator_is_trimmed() {
        assert_eq!(
            decode(b"S:42:").unwrap(),
            Message::StateUpdate {
                body: "42".to_string()
            }
        );
        assert_eq!(decode(b"R:7:ok:").unwrap(), reply("7", "ok"));
        assert_eq!(decode(b"R:7:a:b::").unwrap(), reply("7", "a:b:"));
    }

    #[test]
    fn reply_without_body_is_empty() {
        assert_eq!(decode(b"R:9").unwrap(), reply("9", ""));
        assert_eq!(decode(b"R:9:").unwrap(), reply("9", ""));
    }

    #[test]
    fn state_with_empty_body() {
        assert_eq!(
            decode(b"S:").unwrap(),
            Message::StateUpdate {
                body: String::new()
            }
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(
            decode(b"X:1:2"),
            Err(DecodeError::UnrecognizedType {
                tag: "X".to_string()
            })
        );
    }

    #[test]
    fn single_field_is_rejected() {
        assert_eq!(
            decode(b"R"),
            Err(DecodeError::UnrecognizedType {
                tag: "R".to_string()
            })
        );
        assert_eq!(
            decode(b"S"),
            Err(DecodeError::UnrecognizedType {
                tag: "S".to_string()
            })
        );
    }

    #[test]
    fn tag_is_case_sensitive() {
        assert!(matches!(
            decode(b"r:1:ok"),
            Err(DecodeError::UnrecognizedType { .. })
        ));
    }

    #[test]
    fn empty_frame_is_its_own_error() {
        assert_eq!(decode(b""), Err(DecodeError::Empty));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert_eq!(decode(&[b'S', b':', 0xFF, 0xFE]), Err(DecodeError::InvalidUtf8));
    }

    proptest! {
        #[test]
        fn assembled_frames_decode_to_their_body(
            body in "[^:\n\r]{0,32}",
            id in "[0-9]{1,19}",
        ) {
            let mut assembler = FrameAssembler::default();

            let state = format!("{STATE_TAG}:{body}\n");
            let frame = assembler.push(state.as_bytes()).next().unwrap().unwrap();
            prop_assert_eq!(
                decode(&frame).unwrap(),
                Message::StateUpdate { body: body.clone() }
            );

            let mut wire = BytesMut::new();
            wire.extend_from_slice(format!("{REPLY_TAG}:{id}:{body}\n").as_bytes());
            let frame = assembler.push(&wire).next().unwrap().unwrap();
            prop_assert_eq!(decode(&frame).unwrap(), reply(&id, &body));
        }
    }
}
