//! Property tests for the merge policy
//!
//! The external score can raise severity but never lower it, and a local
//! BLOCK is never touched.

use cath_shield::classifier::{
    enforce_local_block, merge_with_risk_score, ClassificationResult, MergedClassification,
    TokenClassifier, DANGER_RISK_SCORE, SUSPICIOUS_RISK_SCORE,
};
use cath_shield::types::{ThreatLevel, TokenClassification, TokenInfo};
use proptest::prelude::*;

fn local_verdict() -> impl Strategy<Value = ClassificationResult> {
    prop_oneof![
        Just((TokenClassification::Allow, ThreatLevel::Safe)),
        Just((TokenClassification::Warn, ThreatLevel::Suspicious)),
        Just((TokenClassification::Warn, ThreatLevel::Danger)),
        Just((TokenClassification::Block, ThreatLevel::Blocked)),
    ]
    .prop_flat_map(|(classification, threat_level)| {
        (0u8..=100).prop_map(move |confidence| ClassificationResult {
            classification,
            threat_level,
            reason: "generated".to_string(),
            confidence,
        })
    })
}

fn token() -> impl Strategy<Value = TokenInfo> {
    (
        "[1-9A-HJ-NP-Za-km-z]{4,44}",
        proptest::option::of("[A-Za-z ]{0,20}"),
        proptest::option::of("[A-Z]{0,6}"),
    )
        .prop_map(|(address, name, symbol)| TokenInfo {
            address,
            name,
            symbol,
            decimals: None,
        })
}

proptest! {
    #[test]
    fn merged_level_never_drops(local in local_verdict(), score in 0u8..=100) {
        let merged = merge_with_risk_score(&local, score);
        prop_assert!(merged.threat_level >= local.threat_level);
    }

    #[test]
    fn local_block_is_final(local in local_verdict(), score in 0u8..=100) {
        let merged = enforce_local_block(&local, merge_with_risk_score(&local, score));
        if local.classification == TokenClassification::Block {
            prop_assert_eq!(merged.classification, TokenClassification::Block);
            prop_assert_eq!(merged.threat_level, ThreatLevel::Blocked);
        } else {
            prop_assert_ne!(merged.classification, TokenClassification::Block);
        }
    }

    #[test]
    fn escalation_bands(local in local_verdict(), score in 0u8..=100) {
        prop_assume!(local.classification != TokenClassification::Block);
        let merged = merge_with_risk_score(&local, score);
        if score >= DANGER_RISK_SCORE {
            prop_assert_eq!(merged.classification, TokenClassification::Warn);
            prop_assert_eq!(merged.threat_level, ThreatLevel::Danger);
        } else if score >= SUSPICIOUS_RISK_SCORE && local.threat_level == ThreatLevel::Safe {
            prop_assert_eq!(merged.threat_level, ThreatLevel::Suspicious);
        } else {
            prop_assert_eq!(merged, MergedClassification::from(&local));
        }
    }

    #[test]
    fn confidence_does_not_affect_merge(local in local_verdict(), other in 0u8..=100, score in 0u8..=100) {
        let mut twin = local.clone();
        twin.confidence = other;
        prop_assert_eq!(merge_with_risk_score(&local, score), merge_with_risk_score(&twin, score));
    }

    #[test]
    fn classifier_is_total_and_deterministic(token in token()) {
        let classifier = TokenClassifier::new();
        let first = classifier.classify(&token).unwrap();
        let second = classifier.classify(&token).unwrap();
        prop_assert_eq!(&first, &second);
        let consistent = matches!(
            (first.classification, first.threat_level),
            (TokenClassification::Allow, ThreatLevel::Safe)
                | (TokenClassification::Warn, ThreatLevel::Suspicious)
                | (TokenClassification::Block, ThreatLevel::Blocked)
        );
        prop_assert!(consistent);
    }
}
