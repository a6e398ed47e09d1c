use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directories each role reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLayout {
    pub generated_code: PathBuf,
    pub test_code: PathBuf,
    pub qa_reports: PathBuf,
    pub readme: PathBuf,
    pub refactored_code: PathBuf,
    /// Architecture plans.
    pub ca_plan: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            generated_code: PathBuf::from("generated_code"),
            test_code: PathBuf::from("test_code"),
            qa_reports: PathBuf::from("qa_reports"),
            readme: PathBuf::from("readme"),
            refactored_code: PathBuf::from("refactored_code"),
            ca_plan: PathBuf::from("ca_plan"),
        }
    }
}

impl OutputLayout {
    /// Every directory resolved under `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = Self::default();
        Self {
            generated_code: root.join(defaults.generated_code),
            test_code: root.join(defaults.test_code),
            qa_reports: root.join(defaults.qa_reports),
            readme: root.join(defaults.readme),
            refactored_code: root.join(defaults.refactored_code),
            ca_plan: root.join(defaults.ca_plan),
        }
    }
}
