//! Keyword rules that turn a farmer's question into canned advice.

/// A rule fires when any of its triggers occurs in the lowercased query.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub triggers: &'static [&'static str],
    pub response: &'static str,
}

impl Rule {
    fn matches(&self, normalized: &str) -> bool {
        self.triggers.iter().any(|trigger| normalized.contains(trigger))
    }
}

/// Evaluated in order; the first matching rule wins.
pub const RULES: &[Rule] = &[
    Rule {
        triggers: &["tomato", "blight"],
        response: "Inyanya zawa nizigira ikibazo uzagure ibi bikurikira.",
    },
    Rule {
        triggers: &["fertilizer", "corn"],
        response: "For corn, use a balanced NPK fertilizer with slightly higher nitrogen content. Apply when corn is knee-high and again when tassels form. Organic options include well-composted manure or fish emulsion. Remember to soil test before applying to avoid over-fertilization.",
    },
    Rule {
        triggers: &["wheat", "winter"],
        response: "Winter wheat should typically be planted in fall, 6-8 weeks before the first expected frost. This allows for good root development before winter dormancy. Exact timing depends on your climate zone - around September to early October in most regions.",
    },
    Rule {
        triggers: &["soil", "fertility"],
        response: "To improve soil fertility naturally: 1) Add compost regularly, 2) Plant cover crops like clover or vetch, 3) Practice crop rotation, 4) Use mulch to preserve soil moisture and add organic matter, 5) Consider adding worm castings or compost tea as natural fertilizers.",
    },
];

/// Questions offered to the user as starting points.
pub const SUGGESTIONS: &[&str] = &[
    "NIgute narwanya uburwayi bwinyantya",
    "What's the best fertilizer for corn?",
    "When should I plant winter wheat?",
    "How to increase soil fertility naturally?",
];

const FALLBACK_TOKENS: usize = 3;

/// Returns the advice for `query`, or a referral that echoes the first words
/// of the query as the user typed them.
pub fn resolve(query: &str) -> String {
    let normalized = query.to_lowercase();
    match RULES.iter().find(|rule| rule.matches(&normalized)) {
        Some(rule) => rule.response.to_string(),
        None => fallback(query),
    }
}

fn fallback(query: &str) -> String {
    let topic = query
        .split_whitespace()
        .take(FALLBACK_TOKENS)
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "Thank you for your question about {topic}... I'd recommend consulting with your local agricultural extension office for specific advice tailored to your region and growing conditions. They can provide soil testing and personalized recommendations."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blight_rule_takes_precedence_over_later_rules() {
        let reply = resolve("My TOMATO plants need fertilizer for the soil this winter");
        assert_eq!(reply, RULES[0].response);
        assert_eq!(resolve("early Blight on leaves"), RULES[0].response);
    }

    #[test]
    fn corn_question_gets_fertilizer_advice() {
        assert_eq!(resolve("What's the best fertilizer for corn?"), RULES[1].response);
    }

    #[test]
    fn each_rule_fires_on_each_trigger() {
        for rule in RULES {
            for trigger in rule.triggers {
                let query = format!("question about {}", trigger.to_uppercase());
                assert_eq!(resolve(&query), rule.response, "trigger {trigger}");
            }
        }
    }

    #[test]
    fn triggers_match_inside_words() {
        // "soilless" still contains "soil".
        assert_eq!(resolve("soilless growing"), RULES[3].response);
    }

    #[test]
    fn fallback_echoes_first_three_raw_tokens() {
        let reply = resolve("How Do I   raise Goats quickly");
        assert!(reply.starts_with("Thank you for your question about How Do I... "));
        assert!(!reply.contains("raise"));
    }

    #[test]
    fn fallback_with_fewer_than_three_tokens() {
        let reply = resolve("hello there");
        assert!(reply.contains("about hello there..."));
    }

    #[test]
    fn resolve_is_deterministic() {
        for query in SUGGESTIONS.iter().chain(["hello there", "goats"].iter()) {
            assert_eq!(resolve(query), resolve(query));
        }
    }

    #[test]
    fn first_suggestion_falls_back() {
        let reply = resolve(SUGGESTIONS[0]);
        assert!(reply.contains("about NIgute narwanya uburwayi..."));
    }
}
