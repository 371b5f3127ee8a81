//! JSON text-frame encoding for the gateway.
//!
//! Every frame is a single websocket text message holding one JSON object.

use serde::Serialize;

use crate::error::{GatewayError, GatewayResult};
use crate::messages::{opcode, GatewayFrame, HelloPayload, IdentifyPayload, OutboundFrame, ReadyPayload};

/// Encode an outbound frame `{"op": op, "d": d}`.
pub fn encode_frame<T: Serialize>(op: u8, d: T) -> GatewayResult<String> {
    Ok(serde_json::to_string(&OutboundFrame { op, d })?)
}

/// Encode an identify (op 2) frame.
pub fn encode_identify(identify: &IdentifyPayload) -> GatewayResult<String> {
    encode_frame(opcode::IDENTIFY, identify)
}

/// Encode a heartbeat (op 1) frame: `{"op":1,"d":null}`.
pub fn encode_heartbeat() -> GatewayResult<String> {
    encode_frame(opcode::HEARTBEAT, serde_json::Value::Null)
}

/// Decode any inbound text frame into the generic envelope.
pub fn decode_frame(text: &str) -> GatewayResult<GatewayFrame> {
    Ok(serde_json::from_str(text)?)
}

/// Extract the hello payload. The frame must be op 10 with a positive
/// `d.heartbeat_interval`.
pub fn decode_hello(frame: &GatewayFrame) -> GatewayResult<HelloPayload> {
    if frame.op != opcode::HELLO {
        return Err(GatewayError::InvalidMessage(format!(
            "expected HELLO (op {}), got op {}",
            opcode::HELLO,
            frame.op
        )));
    }
    let hello: HelloPayload = serde_json::from_value(frame.d.clone())
        .map_err(|e| GatewayError::InvalidMessage(format!("malformed HELLO: {e}")))?;
    if hello.heartbeat_interval == 0 {
        return Err(GatewayError::InvalidMessage("heartbeat_interval is zero".into()));
    }
    Ok(hello)
}

/// Extract the identity from the identify reply (`d.user.username`).
pub fn decode_ready(frame: &GatewayFrame) -> GatewayResult<ReadyPayload> {
    serde_json::from_value(frame.d.clone()).map_err(|e| {
        GatewayError::InvalidMessage(format!("identify reply (op {}) without user: {e}", frame.op))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{
        intents, ActivityDescriptor, ActivityKind, ConnectionProperties, OnlineStatus, PresenceSpec,
    };

    fn identify_with(activity: ActivityDescriptor) -> serde_json::Value {
        let mut presence = PresenceSpec::new(OnlineStatus::DoNotDisturb);
        presence.add_activity(activity);
        let identify = IdentifyPayload {
            token: "tok".into(),
            intents: intents::DEFAULT,
            properties: ConnectionProperties::default(),
            presence: presence.to_update(1_700_000_000.25),
        };
        let text = encode_identify(&identify).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn heartbeat_frame_is_exact() {
        assert_eq!(encode_heartbeat().unwrap(), r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn identify_layout() {
        let json = identify_with(ActivityDescriptor::new("Minecraft", ActivityKind::Game));
        assert_eq!(json["op"], 2);
        let d = &json["d"];
        assert_eq!(d["token"], "tok");
        assert_eq!(d["intents"], 513);
        assert_eq!(d["properties"]["os"], "linux");
        assert_eq!(d["properties"]["browser"], "Brave");
        assert_eq!(d["properties"]["device"], "Desktop");
        assert_eq!(d["presence"]["status"], "dnd");
        assert_eq!(d["presence"]["since"], 1_700_000_000.25);
        assert_eq!(d["presence"]["afk"], false);
        assert_eq!(d["presence"]["activities"][0]["name"], "Minecraft");
    }

    #[test]
    fn identify_streaming_url_present() {
        let json = identify_with(ActivityDescriptor::streaming("live", "https://x"));
        let activity = &json["d"]["presence"]["activities"][0];
        assert_eq!(activity["type"], 1);
        assert_eq!(activity["url"], "https://x");
    }

    #[test]
    fn identify_game_url_null() {
        let json = identify_with(ActivityDescriptor {
            display_name: "live".into(),
            kind: ActivityKind::Game,
            stream_url: Some("https://x".into()),
        });
        let activity = json["d"]["presence"]["activities"][0].as_object().unwrap();
        assert!(activity.contains_key("url"));
        assert!(activity["url"].is_null());
    }

    #[test]
    fn hello_decodes() {
        let frame = decode_frame(r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#)
            .unwrap();
        assert_eq!(decode_hello(&frame).unwrap().heartbeat_interval, 41250);
    }

    #[test]
    fn hello_rejects_wrong_op() {
        let frame = decode_frame(r#"{"op":0,"d":{"heartbeat_interval":41250}}"#).unwrap();
        assert!(matches!(decode_hello(&frame), Err(GatewayError::InvalidMessage(_))));
    }

    #[test]
    fn hello_rejects_missing_interval() {
        let frame = decode_frame(r#"{"op":10,"d":{}}"#).unwrap();
        assert!(decode_hello(&frame).is_err());
        let frame = decode_frame(r#"{"op":10,"d":{"heartbeat_interval":0}}"#).unwrap();
        assert!(decode_hello(&frame).is_err());
    }

    #[test]
    fn garbage_is_a_codec_error() {
        assert!(matches!(decode_frame("not json"), Err(GatewayError::Codec(_))));
        assert!(matches!(decode_frame(r#"{"d":{}}"#), Err(GatewayError::Codec(_))));
    }

    #[test]
    fn ready_requires_username() {
        let frame = decode_frame(r#"{"op":0,"t":"READY","s":1,"d":{"user":{"username":"piggy"}}}"#)
            .unwrap();
        assert_eq!(decode_ready(&frame).unwrap().user.username, "piggy");

        let frame = decode_frame(r#"{"op":9,"d":false}"#).unwrap();
        assert!(decode_ready(&frame).is_err());
    }
}
