//! # Wire-Level Flows
//!
//! The same lifecycle, submitted as JSON envelopes through the request
//! handler and the node's line loop.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use custody_ledger::prelude::*;
    use custody_node::{NodeConfig, NodeRuntime};
    use serde_json::{json, Value};
    use std::io::Cursor;
    use std::sync::Arc;
    use uuid::Uuid;

    fn line(caller: Identity, timestamp: Timestamp, method: &str, params: Value) -> String {
        json!({
            "correlation_id": Uuid::new_v4(),
            "caller": caller,
            "timestamp": timestamp,
            "request": { "method": method, "params": params },
        })
        .to_string()
    }

    async fn serve(lines: &[String]) -> Vec<Value> {
        let config = NodeConfig {
            ledger: LedgerConfig::for_testing(),
            ..NodeConfig::default()
        };
        let runtime = NodeRuntime::new(&config, ManualClock::new(0)).await.unwrap();
        let mut output = Vec::new();
        runtime
            .run(Cursor::new(lines.join("\n").into_bytes()), &mut output)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_lifecycle_over_line_protocol() {
        let mut lines = Vec::new();
        for (identity, role) in [(MAKER, 1), (DEALER, 2), (CUSTOMER, 3), (CENTER, 4)] {
            lines.push(line(OWNER, 0, "grantRole", json!({ "identity": identity, "role": role })));
        }
        lines.push(line(MAKER, 100, "createProduct", json!({ "id": "SN-1", "info": "laptop" })));
        lines.push(line(MAKER, 200, "transferProduct", json!({ "id": "SN-1", "to": DEALER })));
        lines.push(line(DEALER, 300, "transferProduct", json!({ "id": "SN-1", "to": CUSTOMER })));
        lines.push(line(CUSTOMER, 10_000, "transferProduct", json!({ "id": "SN-1", "to": CENTER })));
        lines.push(line(CENTER, 20_000, "warrantyProduct", json!({ "id": "SN-1", "note": "battery" })));
        lines.push(line(CENTER, 20_100, "getProduct", json!({ "id": "SN-1" })));
        lines.push(line(CENTER, 20_100, "verifyProductHistory", json!({ "id": "SN-1" })));

        let responses = serve(&lines).await;
        assert_eq!(responses.len(), lines.len());
        for response in &responses {
            assert!(response.get("error").is_none(), "unexpected error: {response}");
        }

        let product = &responses[9]["result"];
        assert_eq!(product["type"], "product");
        assert_eq!(product["value"]["history_count"], 5);
        assert_eq!(product["value"]["suspicious"], false);
        assert_eq!(product["value"]["current_owner"], json!(CENTER));

        let verification = &responses[10]["result"]["value"];
        assert!(verification["first_invalid"].is_null());
    }

    #[tokio::test]
    async fn test_error_codes_on_the_wire() {
        let lines = vec![
            line(MAKER, 0, "grantRole", json!({ "identity": MAKER, "role": 1 })),
            line(OWNER, 0, "grantRole", json!({ "identity": MAKER, "role": 9 })),
            line(OWNER, 0, "grantRole", json!({ "identity": MAKER, "role": 1 })),
            line(MAKER, 100, "createProduct", json!({ "id": "A", "info": "x" })),
            line(MAKER, 105, "createProduct", json!({ "id": "B", "info": "x" })),
            line(MAKER, 200, "createProduct", json!({ "id": "A", "info": "x" })),
            line(MAKER, 200, "getProduct", json!({ "id": "nope" })),
            r#"{"correlation_id":"not-a-uuid"}"#.to_string(),
        ];

        let responses = serve(&lines).await;
        let codes: Vec<Option<&str>> = responses
            .iter()
            .map(|r| r["error"]["code"].as_str())
            .collect();
        assert_eq!(
            codes,
            vec![
                Some("Unauthorized"),
                Some("InvalidRole"),
                None,
                None,
                Some("ActionTooFrequent"),
                Some("DuplicateProduct"),
                Some("NotFound"),
                Some("BadRequest"),
            ]
        );
        // Throttling rejections tell the caller when to come back.
        assert_eq!(responses[4]["error"]["retry_at"], 110);
    }

    #[tokio::test]
    async fn test_wide_role_codes_reach_validation() {
        let lines = vec![
            line(OWNER, 0, "grantRole", json!({ "identity": MAKER, "role": 5 })),
            line(OWNER, 0, "grantRole", json!({ "identity": MAKER, "role": 256 })),
            line(MAKER, 0, "grantRole", json!({ "identity": MAKER, "role": 300 })),
            line(OWNER, 0, "membersOf", json!({ "role": 70_000 })),
        ];

        let responses = serve(&lines).await;
        let codes: Vec<Option<&str>> = responses
            .iter()
            .map(|r| r["error"]["code"].as_str())
            .collect();
        assert_eq!(
            codes,
            vec![
                Some("InvalidRole"),
                Some("InvalidRole"),
                Some("Unauthorized"),
                Some("InvalidRole"),
            ]
        );
        assert!(responses[1]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("256"));
    }

    #[tokio::test]
    async fn test_bad_request_body_answers_under_its_correlation_id() {
        let id = Uuid::new_v4();
        let bad = json!({
            "correlation_id": id,
            "caller": OWNER,
            "request": { "method": "grantRole", "params": { "identity": MAKER, "role": -1 } },
        })
        .to_string();

        let responses = serve(&[bad]).await;
        assert_eq!(responses[0]["error"]["code"], "BadRequest");
        assert_eq!(responses[0]["correlation_id"], json!(id));
    }

    #[tokio::test]
    async fn test_handler_fills_missing_timestamp() {
        let service = Arc::new(create_test_service());
        let clock = ManualClock::new(7_000);
        let handler = RequestHandler::new(Arc::clone(&service), clock);

        let envelope: LedgerEnvelope = serde_json::from_value(json!({
            "correlation_id": Uuid::new_v4(),
            "caller": OWNER,
            "request": { "method": "grantRole", "params": { "identity": MAKER, "role": 1 } },
        }))
        .unwrap();
        let response = handler.handle(envelope).await;

        match response.result {
            Some(LedgerReply::Granted(grant)) => assert_eq!(grant.granted_at, 7_000),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert_eq!(service.role_grants(0).await.len(), 1);
    }
}
