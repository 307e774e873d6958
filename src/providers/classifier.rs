#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationLabel {
    pub label: String,
    pub confidence: f64,
}

pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> ClassificationLabel;
}

struct KeywordRule {
    keywords: &'static [&'static str],
    label: &'static str,
    confidence: f64,
}

/// Evaluated in order; the first rule with any matching keyword wins.
const RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["contract", "agreement"],
        label: "Contract",
        confidence: 0.92,
    },
    KeywordRule {
        keywords: &["invoice", "bill", "payment"],
        label: "Invoice",
        confidence: 0.89,
    },
    KeywordRule {
        keywords: &["report", "analysis"],
        label: "Report",
        confidence: 0.85,
    },
    KeywordRule {
        keywords: &["form", "application"],
        label: "Form",
        confidence: 0.88,
    },
    KeywordRule {
        keywords: &["certificate", "certification"],
        label: "Certificate",
        confidence: 0.90,
    },
    KeywordRule {
        keywords: &["medical", "patient", "diagnosis"],
        label: "Medical",
        confidence: 0.93,
    },
];

pub const DEFAULT_LABEL: &str = "Other";
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Case-insensitive substring matching against fixed keyword sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> ClassificationLabel {
        let lowered = text.to_lowercase();
        RULES
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k)))
            .map(|rule| ClassificationLabel {
                label: rule.label.to_string(),
                confidence: rule.confidence,
            })
            .unwrap_or_else(|| ClassificationLabel {
                label: DEFAULT_LABEL.to_string(),
                confidence: DEFAULT_CONFIDENCE,
            })
    }
}
