//! Administrative front-matter detection

/// Phrases that mark signature pages, consent boilerplate and cover sheets
const ADMIN_INDICATORS: &[&str] = &[
    "confidential",
    "protocol incorporating amendment",
    "study no.",
    "source document",
    "drug accountability log",
    "regulatory filing",
    "correspondence",
    "written subject authorization",
    "informed consent form",
    "personal information",
    "investigator acknowledges",
    "consents to the use",
    "amendment no.",
    "signature page",
];

/// Chunks shorter than this carry no answerable content
const MIN_CONTENT_CHARS: usize = 50;

/// Whether a chunk is administrative rather than clinical content
pub fn is_administrative(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_CONTENT_CHARS {
        return true;
    }
    has_admin_marker(trimmed)
}

/// Whether text of any length contains an administrative phrase
pub fn has_admin_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    ADMIN_INDICATORS.iter().any(|indicator| lower.contains(indicator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_page_is_administrative() {
        assert!(is_administrative(
            "SIGNATURE PAGE. The investigator acknowledges receipt of the protocol and agrees to comply."
        ));
    }

    #[test]
    fn test_short_fragment_is_administrative() {
        assert!(is_administrative("Page 12 of 126"));
    }

    #[test]
    fn test_admin_marker_ignores_length() {
        assert!(has_admin_marker("Confidential."));
        assert!(!has_admin_marker("Dose is 10 mg."));
    }

    #[test]
    fn test_clinical_text_kept() {
        assert!(!is_administrative(
            "Participants must be adults aged 18 to 65 years with a confirmed diagnosis of type 2 diabetes."
        ));
    }
}
