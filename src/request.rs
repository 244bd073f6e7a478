use serde::Serialize;

/// One invocation of the external CMIP6 downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub variable_id: String,
    pub frequency: String,
    pub experiment: String,
    pub source_id: String,
    pub variant_label: String,
}

impl DownloadRequest {
    /// Command-line flags understood by `cmip6_downloader.py`, in the order it documents them.
    pub fn to_args(&self) -> Vec<String> {
        [
            ("--variable_id", &self.variable_id),
            ("--frequency", &self.frequency),
            ("--experiment", &self.experiment),
            ("--source_id", &self.source_id),
            ("--variant_label", &self.variant_label),
        ]
        .into_iter()
        .flat_map(|(flag, value)| [flag.to_string(), value.clone()])
        .collect()
    }

    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.source_id, self.experiment, self.variable_id)
    }
}
