//! Decoding of run identifiers such as
//! `results_Aitana-6.3B_5_Latin_5-shot_3064` into model, language and shots.

use crate::model::RunIdentity;

const PREFIX: &str = "results_";

/// Layout: `results_{model}_{n}_{language}_{shots}_{rest...}`.
///
/// Colons are read as underscores first. Returns `None` when the prefix is
/// absent or fewer than four tokens follow it.
pub fn parse(identifier: &str) -> Option<RunIdentity> {
    let normalized = identifier.replace(':', "_");
    let content = normalized.strip_prefix(PREFIX)?;
    let parts: Vec<&str> = content.split('_').collect();
    if parts.len() < 4 {
        return None;
    }
    Some(RunIdentity {
        model_name: parts[0].to_string(),
        language: parts[2].to_string(),
        shots: parts[3].replace('-', "_"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_regular_model() {
        let id = parse("results_Aitana-6.3B_5_Latin_5-shot_3064").unwrap();
        assert_eq!(id.model_name, "Aitana-6.3B");
        assert_eq!(id.language, "Latin");
        assert_eq!(id.shots, "5_shot");
    }

    #[test]
    fn test_parse_checkpoint_name() {
        let id = parse("results_iter-047999-ckpt.pth_1_English_5-shot_13835").unwrap();
        assert_eq!(id.model_name, "iter-047999-ckpt.pth");
        assert_eq!(id.language, "English");
        assert_eq!(id.shots, "5_shot");
    }

    #[test]
    fn test_too_few_tokens() {
        assert_eq!(parse("results_foo_bar"), None);
        assert_eq!(parse("results_a_b_c"), None);
    }

    #[test]
    fn test_missing_prefix() {
        assert_eq!(parse("Aitana-6.3B_5_Latin_5-shot_3064"), None);
    }

    #[test]
    fn test_colon_separated_prefix() {
        let id = parse("results:Aitana_5_Catalan_0-shot_1").unwrap();
        assert_eq!(id.model_name, "Aitana");
        assert_eq!(id.language, "Catalan");
        assert_eq!(id.shots, "0_shot");
    }

    #[test]
    fn test_exactly_four_tokens() {
        let id = parse("results_m_1_Spanish_0-shot").unwrap();
        assert_eq!(id.language, "Spanish");
        assert_eq!(id.shots, "0_shot");
    }
}
