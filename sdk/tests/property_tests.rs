use proptest::prelude::*;
use sdk::errors::{EngineError, ErrorExt};
use sdk::types::{Round, SiteRequest};

proptest! {
    #[test]
    fn test_error_user_hint_never_echoes_detail(detail in "[a-zA-Z0-9_/]{8,40}") {
        let errs = vec![
            EngineError::Config(detail.clone()),
            EngineError::Secret(detail.clone()),
            EngineError::InvalidRequest(detail.clone()),
            EngineError::Network(detail.clone()),
            EngineError::Startup { collaborator: detail.clone(), reason: detail.clone() },
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&detail));
        }
    }
}

proptest! {
    #[test]
    fn test_round_accepts_only_one_and_two(value in any::<u8>()) {
        let parsed = Round::try_from(value);
        if value == 1 || value == 2 {
            let round = parsed.unwrap();
            prop_assert_eq!(u8::from(round), value);
        } else {
            prop_assert!(parsed.is_err());
        }
    }
}

proptest! {
    #[test]
    fn test_request_json_keeps_check_order(
        checks in proptest::collection::vec("[a-z ]{1,20}", 0..6),
        round in 1u8..=2,
    ) {
        let json = serde_json::json!({
            "email": "dev@example.com",
            "secret": "s",
            "task": "task-a",
            "round": round,
            "nonce": "nonce",
            "brief": "brief",
            "checks": checks,
            "evaluation_url": "https://eval.example.com",
            "attachments": []
        });

        let request: SiteRequest = serde_json::from_value(json).unwrap();
        prop_assert_eq!(request.joined_checks(), checks.join("\n"));
        prop_assert_eq!(request.round.number(), round);
    }
}
