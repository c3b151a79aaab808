use serde::{Deserialize, Serialize};

/// Bounded text sample extracted from a file, paired with the content hash
/// it was derived from.
#[derive(Debug, Clone)]
pub struct ContentSample {
    pub hash: String,
    pub text: String,
}

/// Outcome of classifying one content sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub file_name: String,
}

/// Append-only record of a user moving a previously classified file into a
/// different category folder inside the feedback area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackCorrection {
    pub file_name: String,
    pub original_category: String,
    pub corrected_category: String,
    pub timestamp: String,
}
