//! Pushgateway grouping key and push URL construction.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;
use url::{PathSegmentsMut, Url};

pub const JOB_LABEL: &str = "job";
pub const INSTANCE_LABEL: &str = "instance";

#[derive(Debug, Error, PartialEq)]
pub enum GroupingError {
    #[error("grouping label name {0:?} is invalid")]
    InvalidLabelName(String),

    #[error("grouping label name {0:?} is reserved")]
    ReservedLabel(String),

    #[error("grouping label {0:?} given twice")]
    DuplicateLabel(String),

    #[error("gateway URL {0} cannot carry a path")]
    UnusableGatewayUrl(String),
}

/// The labels that select which previously pushed group a push replaces:
/// always `job`, plus any additional labels in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingKey {
    job: String,
    labels: Vec<(String, String)>,
}

impl GroupingKey {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            labels: Vec::new(),
        }
    }

    pub fn with_label(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, GroupingError> {
        let name = name.into();
        if name == JOB_LABEL {
            return Err(GroupingError::ReservedLabel(name));
        }
        if !is_valid_label_name(&name) {
            return Err(GroupingError::InvalidLabelName(name));
        }
        if self.labels.iter().any(|(existing, _)| *existing == name) {
            return Err(GroupingError::DuplicateLabel(name));
        }
        self.labels.push((name, value.into()));
        Ok(self)
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    /// Whether `name` is one of the grouping labels, `job` included.
    pub fn contains(&self, name: &str) -> bool {
        name == JOB_LABEL || self.labels.iter().any(|(label, _)| label == name)
    }

    /// `{gateway}/metrics/job/{job}/{label}/{value}...`
    ///
    /// Values containing `/` are sent base64url-encoded with an `@base64`
    /// suffix on the label name; an empty value becomes `=` the same way.
    pub fn push_url(&self, gateway: &Url) -> Result<Url, GroupingError> {
        let mut url = gateway.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GroupingError::UnusableGatewayUrl(gateway.to_string()))?;
            segments.pop_if_empty().push("metrics");
            push_component(&mut segments, JOB_LABEL, &self.job);
            for (name, value) in &self.labels {
                push_component(&mut segments, name, value);
            }
        }
        Ok(url)
    }
}

fn push_component(segments: &mut PathSegmentsMut<'_>, name: &str, value: &str) {
    if value.is_empty() {
        segments.push(&format!("{}@base64", name)).push("=");
    } else if value.contains('/') {
        segments
            .push(&format!("{}@base64", name))
            .push(&URL_SAFE_NO_PAD.encode(value));
    } else {
        segments.push(name).push(value);
    }
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_job_only() {
        let url = GroupingKey::new("backup")
            .push_url(&gateway("http://gw.example.com:9091"))
            .unwrap();
        assert_eq!(url.as_str(), "http://gw.example.com:9091/metrics/job/backup");
    }

    #[test]
    fn test_job_and_instance() {
        let key = GroupingKey::new("backup")
            .with_label(INSTANCE_LABEL, "server01")
            .unwrap();
        let url = key.push_url(&gateway("https://gw.example.com/")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://gw.example.com/metrics/job/backup/instance/server01"
        );
    }

    #[test]
    fn test_gateway_path_prefix_is_kept() {
        let url = GroupingKey::new("backup")
            .push_url(&gateway("https://proxy.example.com/pushgateway/"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://proxy.example.com/pushgateway/metrics/job/backup"
        );
    }

    #[test]
    fn test_slash_values_use_base64() {
        let key = GroupingKey::new("a/b").with_label("path", "/var/tmp").unwrap();
        let url = key.push_url(&gateway("http://gw")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://gw/metrics/job@base64/YS9i/path@base64/L3Zhci90bXA"
        );
    }

    #[test]
    fn test_empty_value() {
        let key = GroupingKey::new("backup").with_label(INSTANCE_LABEL, "").unwrap();
        let url = key.push_url(&gateway("http://gw")).unwrap();
        assert_eq!(url.as_str(), "http://gw/metrics/job/backup/instance@base64/=");
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let url = GroupingKey::new("nightly backup?")
            .push_url(&gateway("http://gw"))
            .unwrap();
        assert_eq!(url.as_str(), "http://gw/metrics/job/nightly%20backup%3F");
    }

    #[test]
    fn test_label_validation() {
        assert_eq!(
            GroupingKey::new("j").with_label("job", "x").unwrap_err(),
            GroupingError::ReservedLabel("job".to_string())
        );
        assert!(matches!(
            GroupingKey::new("j").with_label("1abc", "x"),
            Err(GroupingError::InvalidLabelName(_))
        ));
        assert!(matches!(
            GroupingKey::new("j")
                .with_label("instance", "a")
                .unwrap()
                .with_label("instance", "b"),
            Err(GroupingError::DuplicateLabel(_))
        ));
    }

    #[test]
    fn test_contains() {
        let key = GroupingKey::new("j").with_label(INSTANCE_LABEL, "i").unwrap();
        assert!(key.contains("job"));
        assert!(key.contains("instance"));
        assert!(!key.contains("region"));
    }
}
