use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/* ------------ client → server ------------ */

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    #[serde(rename_all = "camelCase")]
    Join {
        visitor_id: String,
        #[serde(default)]
        page: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        visitor_id: String,
        #[serde(default)]
        page: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Leave { visitor_id: String },
}

/* ------------ server → client ------------ */

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    #[serde(rename_all = "camelCase")]
    ActiveCount {
        active_count: usize,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    VisitorJoined {
        active_count: usize,
        visitor_id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    VisitorLeft {
        active_count: usize,
        visitor_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl Outbound {
    pub fn active_count(active_count: usize) -> Self {
        Outbound::ActiveCount { active_count, timestamp: Utc::now() }
    }

    pub fn visitor_joined(active_count: usize, visitor_id: &str) -> Self {
        Outbound::VisitorJoined {
            active_count,
            visitor_id: visitor_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn visitor_left(active_count: usize, visitor_id: &str) -> Self {
        Outbound::VisitorLeft {
            active_count,
            visitor_id: visitor_id.into(),
            timestamp: Utc::now(),
        }
    }

    // Serialization of these variants cannot fail.
    pub fn message(&self) -> Message {
        Message::Text(serde_json::to_string(self).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn parses_join_with_and_without_page() {
        let m: Inbound =
            serde_json::from_str(r#"{"type":"join","visitorId":"v1","page":"/shop"}"#).unwrap();
        match m {
            Inbound::Join { visitor_id, page } => {
                assert_eq!(visitor_id, "v1");
                assert_eq!(page.as_deref(), Some("/shop"));
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let m: Inbound = serde_json::from_str(r#"{"type":"join","visitorId":"v2"}"#).unwrap();
        assert!(matches!(m, Inbound::Join { page: None, .. }));
    }

    #[test]
    fn parses_heartbeat_and_leave() {
        let m: Inbound =
            serde_json::from_str(r#"{"type":"heartbeat","visitorId":"v1","page":"/"}"#).unwrap();
        assert!(matches!(m, Inbound::Heartbeat { .. }));

        let m: Inbound = serde_json::from_str(r#"{"type":"leave","visitorId":"v1"}"#).unwrap();
        assert!(matches!(m, Inbound::Leave { visitor_id } if visitor_id == "v1"));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(serde_json::from_str::<Inbound>(r#"{"type":"ping"}"#).is_err());
    }

    #[test]
    fn outbound_uses_tag_and_camel_case_keys() {
        let v: Value =
            serde_json::to_value(Outbound::visitor_joined(3, "v7")).unwrap();
        assert_eq!(v["type"], "visitor_joined");
        assert_eq!(v["activeCount"], 3);
        assert_eq!(v["visitorId"], "v7");
        // chrono renders an ISO-8601 / RFC 3339 string
        let ts = v["timestamp"].as_str().unwrap();
        assert!(ts.parse::<DateTime<Utc>>().is_ok());

        let v: Value = serde_json::to_value(Outbound::active_count(1)).unwrap();
        assert_eq!(v["type"], "active_count");
        assert!(v.get("visitorId").is_none());
    }
}
