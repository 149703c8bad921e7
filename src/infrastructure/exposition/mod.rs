//! Prometheus text exposition format (version 0.0.4).
//!
//! Parses a whole document into `prometheus::proto::MetricFamily` values,
//! the same model the `prometheus` crate gathers from a registry. Histogram
//! and summary series written over several lines are folded back into a
//! single family under their declared base name.

mod builder;
mod line;

use builder::FamiliesBuilder;
use line::{Line, parse_line};
use prometheus::proto::MetricFamily;
use thiserror::Error;

/// Syntax error in an exposition document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("text format parsing error in line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

/// Parses `input` into metric families ordered by name.
///
/// Each distinct family name appears exactly once. Nothing is returned on
/// error, not even the families parsed before the offending line.
pub fn parse_text(input: &str) -> Result<Vec<MetricFamily>, ParseError> {
    let mut builder = FamiliesBuilder::default();

    for (index, raw) in input.lines().enumerate() {
        let at = |message: String| ParseError {
            line: index + 1,
            message,
        };

        match parse_line(raw).map_err(at)? {
            Line::Blank | Line::Comment => {}
            Line::Help { name, text } => builder.help(&name, text).map_err(at)?,
            Line::Type { name, kind } => builder.declare_type(&name, kind).map_err(at)?,
            Line::Sample(sample) => builder.sample(sample).map_err(at)?,
        }
    }

    Ok(builder.finish())
}

/// Parses raw bytes, validating UTF-8 first.
pub fn parse_bytes(input: &[u8]) -> Result<Vec<MetricFamily>, ParseError> {
    let text = std::str::from_utf8(input).map_err(|e| {
        let valid = &input[..e.valid_up_to()];
        ParseError {
            line: valid.iter().filter(|b| **b == b'\n').count() + 1,
            message: format!("invalid UTF-8 at byte offset {}", e.valid_up_to()),
        }
    })?;
    parse_text(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::proto::MetricType;

    fn names(families: &[MetricFamily]) -> Vec<&str> {
        families.iter().map(|f| f.name()).collect()
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_text("").unwrap().is_empty());
        assert!(parse_text("\n\n# only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_one_family_per_distinct_name() {
        let families = parse_text("foo 1\nbar 2\nfoo{a=\"x\"} 3\n").unwrap();
        assert_eq!(names(&families), vec!["bar", "foo"]);
        assert_eq!(families[1].metric.len(), 2);
        assert_eq!(families[1].type_(), MetricType::UNTYPED);
    }

    #[test]
    fn test_typed_counter_and_gauge() {
        let doc = "\
# HELP http_requests_total The total number of HTTP requests.
# TYPE http_requests_total counter
http_requests_total{method=\"post\",code=\"200\"} 1027 1395066363000
http_requests_total{method=\"post\",code=\"400\"}    3 1395066363000
# TYPE temperature gauge
temperature -3.5
";
        let families = parse_text(doc).unwrap();
        assert_eq!(names(&families), vec!["http_requests_total", "temperature"]);

        let requests = &families[0];
        assert_eq!(requests.help(), "The total number of HTTP requests.");
        assert_eq!(requests.type_(), MetricType::COUNTER);
        assert_eq!(requests.metric.len(), 2);
        assert_eq!(requests.metric[0].counter.value(), 1027.0);
        assert_eq!(requests.metric[0].timestamp_ms, Some(1395066363000));
        // labels are sorted by name
        assert_eq!(requests.metric[0].label[0].name(), "code");

        assert_eq!(families[1].type_(), MetricType::GAUGE);
        assert_eq!(families[1].metric[0].gauge.value(), -3.5);
    }

    #[test]
    fn test_histogram_folds_into_one_family() {
        let doc = "\
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_bucket{le=\"0.05\"} 24054
http_request_duration_seconds_bucket{le=\"0.1\"} 33444
http_request_duration_seconds_bucket{le=\"+Inf\"} 144320
http_request_duration_seconds_sum 53423
http_request_duration_seconds_count 144320
";
        let families = parse_text(doc).unwrap();
        assert_eq!(names(&families), vec!["http_request_duration_seconds"]);

        let metric = &families[0].metric;
        assert_eq!(metric.len(), 1);
        let histogram = &metric[0].histogram;
        assert_eq!(histogram.bucket.len(), 3);
        assert_eq!(histogram.bucket[2].upper_bound(), f64::INFINITY);
        assert_eq!(histogram.bucket[2].cumulative_count(), 144320);
        assert_eq!(histogram.sample_count(), 144320);
        assert_eq!(histogram.sample_sum(), 53423.0);
    }

    #[test]
    fn test_summary_series_grouped_by_labels() {
        let doc = "\
# TYPE rpc_duration_seconds summary
rpc_duration_seconds{service=\"a\",quantile=\"0.5\"} 4773
rpc_duration_seconds{service=\"a\",quantile=\"0.99\"} 76656
rpc_duration_seconds_sum{service=\"a\"} 1.7560473e+07
rpc_duration_seconds_count{service=\"a\"} 2693
rpc_duration_seconds{service=\"b\",quantile=\"0.5\"} 12
rpc_duration_seconds_count{service=\"b\"} 7
";
        let families = parse_text(doc).unwrap();
        assert_eq!(families.len(), 1);

        let metric = &families[0].metric;
        assert_eq!(metric.len(), 2);
        assert_eq!(metric[0].summary.quantile.len(), 2);
        assert_eq!(metric[0].summary.sample_count(), 2693);
        assert_eq!(metric[1].label[0].value(), "b");
        assert_eq!(metric[1].summary.sample_count(), 7);
    }

    #[test]
    fn test_bad_format_reports_line() {
        let err = parse_text("foo 1\nhello<world>{ nope\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_structural_errors() {
        assert!(parse_text("# TYPE a gauge\n# TYPE a counter\n").is_err());
        assert!(parse_text("# HELP a one\n# HELP a two\n").is_err());
        assert!(parse_text("a 1\n# TYPE a gauge\n").is_err());
        assert!(parse_text("# TYPE h histogram\nh 1\n").is_err());
        assert!(parse_text("# TYPE h histogram\nh_bucket 1\n").is_err());
        assert!(parse_text("# TYPE s summary\ns 1\n").is_err());
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = parse_bytes(b"foo 1\nb\xffr 2\n").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
