use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Failed paths recorded by one batch worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchResults {
    pub failed_promotes: Vec<String>,
    pub failed_previews: Vec<String>,
    pub failed_publishes: Vec<String>,
}

impl BatchResults {
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }

    pub fn failure_count(&self) -> usize {
        self.failed_promotes.len() + self.failed_previews.len() + self.failed_publishes.len()
    }

    /// Append another batch's failures
    pub fn absorb(&mut self, other: BatchResults) {
        self.failed_promotes.extend(other.failed_promotes);
        self.failed_previews.extend(other.failed_previews);
        self.failed_publishes.extend(other.failed_publishes);
    }
}

/// Union of every batch's results for one instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateResults {
    #[serde(flatten)]
    pub failures: BatchResults,
    /// Batches whose worker disappeared without recording a finished status
    pub abandoned_batches: Vec<u32>,
    pub batch_count: usize,
}

impl AggregateResults {
    pub fn is_clean(&self) -> bool {
        self.failures.is_clean() && self.abandoned_batches.is_empty()
    }

    /// Shape stored in the run status `details`
    pub fn to_details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("batch_count".to_string(), json!(self.batch_count));
        details.insert(
            "failed_promotes".to_string(),
            json!(self.failures.failed_promotes),
        );
        details.insert(
            "failed_previews".to_string(),
            json!(self.failures.failed_previews),
        );
        details.insert(
            "failed_publishes".to_string(),
            json!(self.failures.failed_publishes),
        );
        details.insert(
            "abandoned_batches".to_string(),
            json!(self.abandoned_batches),
        );
        details.insert(
            "failure_count".to_string(),
            json!(self.failures.failure_count()),
        );
        details
    }
}
