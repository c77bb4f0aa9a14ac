//! Clinical query expansion
//!
//! Short questions embed poorly against long protocol passages. Appending a
//! few domain synonyms pulls the query vector towards the right sections.

/// Families of related terms; the first two trigger a family, the first
/// three are appended.
const FAMILIES: &[(&str, &[&str])] = &[
    ("drug", &["drug", "medication", "compound", "treatment", "therapeutic"]),
    ("objective", &["objective", "purpose", "aim", "goal", "primary endpoint", "hypothesis"]),
    ("safety", &["safety", "adverse event", "side effect", "tolerability", "monitoring", "risk"]),
    ("criteria", &["criteria", "inclusion", "exclusion", "eligible", "enrollment", "participant"]),
    ("design", &["design", "methodology", "randomized", "controlled", "phase", "trial"]),
    ("dose", &["dose", "dosage", "mg", "administration", "regimen", "schedule"]),
];

const TRIGGER_TERMS: usize = 2;
const APPENDED_TERMS: usize = 3;

/// Append the terms of the first matching family, or return the question as is
pub fn expand_query(question: &str) -> String {
    let lower = question.to_lowercase();

    for (key, terms) in FAMILIES {
        let triggered = lower.contains(key)
            || terms.iter().take(TRIGGER_TERMS).any(|term| lower.contains(term));
        if triggered {
            let extra: Vec<&str> = terms.iter().take(APPENDED_TERMS).copied().collect();
            return format!("{} {}", question, extra.join(" "));
        }
    }

    question.to_string()
}
