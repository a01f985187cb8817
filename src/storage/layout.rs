use crate::constants::files;

/// Blob paths for one orchestration key, rooted at `{storage_root}/{orchestration_key}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    base: String,
}

impl StoreLayout {
    pub fn new(storage_root: &str, orchestration_key: &str) -> Self {
        let root = storage_root.trim_end_matches('/');
        Self {
            base: format!("{root}/{orchestration_key}"),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn tracker(&self) -> String {
        format!("{}/{}", self.base, files::TRACKER_FILE)
    }

    pub fn instance_dir(&self, instance_key: &str) -> String {
        format!("{}/{instance_key}", self.base)
    }

    pub fn instance(&self, instance_key: &str) -> String {
        format!("{}/{}", self.instance_dir(instance_key), files::INSTANCE_FILE)
    }

    pub fn instance_results(&self, instance_key: &str) -> String {
        format!("{}/{}", self.instance_dir(instance_key), files::RESULTS_FILE)
    }

    pub fn batch_dir(&self, instance_key: &str, batch_number: u32) -> String {
        format!(
            "{}/{}{batch_number}",
            self.instance_dir(instance_key),
            files::BATCH_DIR_PREFIX
        )
    }

    pub fn batch_info(&self, instance_key: &str, batch_number: u32) -> String {
        format!(
            "{}/{}",
            self.batch_dir(instance_key, batch_number),
            files::BATCH_INFO_FILE
        )
    }

    pub fn batch_results(&self, instance_key: &str, batch_number: u32) -> String {
        format!(
            "{}/{}",
            self.batch_dir(instance_key, batch_number),
            files::RESULTS_FILE
        )
    }
}
