//! Folds classified lines into metric families.

use super::line::Sample;
use prometheus::proto::{
    Bucket, Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType, Quantile, Untyped,
};
use std::collections::{BTreeMap, HashMap};

type LabelSet = Vec<(String, String)>;

struct FamilyState {
    family: MetricFamily,
    kind: MetricType,
    typed: bool,
    /// Histogram and summary samples of one series are spread over several
    /// lines; this maps a series' label set to its index in `family.metric`.
    series: HashMap<LabelSet, usize>,
}

impl FamilyState {
    fn new(name: &str) -> Self {
        let mut family = MetricFamily::default();
        family.name = Some(name.to_string());
        family.type_ = Some(MetricType::UNTYPED.into());
        Self {
            family,
            kind: MetricType::UNTYPED,
            typed: false,
            series: HashMap::new(),
        }
    }

    fn series_mut(&mut self, labels: LabelSet) -> &mut Metric {
        let metrics = &mut self.family.metric;
        let index = *self.series.entry(labels.clone()).or_insert_with(|| {
            metrics.push(new_metric(labels));
            metrics.len() - 1
        });
        &mut self.family.metric[index]
    }
}

#[derive(Default)]
pub(super) struct FamiliesBuilder {
    families: BTreeMap<String, FamilyState>,
}

impl FamiliesBuilder {
    pub fn help(&mut self, name: &str, text: String) -> Result<(), String> {
        let state = self.state_mut(name);
        if state.family.help.is_some() {
            return Err(format!("second HELP line for metric name {:?}", name));
        }
        state.family.help = Some(text);
        Ok(())
    }

    pub fn declare_type(&mut self, name: &str, kind: MetricType) -> Result<(), String> {
        let state = self.state_mut(name);
        if state.typed {
            return Err(format!("second TYPE line for metric name {:?}", name));
        }
        if !state.family.metric.is_empty() {
            return Err(format!(
                "TYPE line for metric name {:?} must appear before the first sample",
                name
            ));
        }
        state.kind = kind;
        state.typed = true;
        state.family.type_ = Some(kind.into());
        Ok(())
    }

    pub fn sample(&mut self, sample: Sample) -> Result<(), String> {
        let (family_name, suffix) = self.resolve_family(&sample.name);
        let state = self.state_mut(&family_name);

        match state.kind {
            MetricType::COUNTER => {
                let mut counter = Counter::default();
                counter.value = Some(sample.value);
                let mut metric = new_metric(sample.labels);
                metric.counter = Some(counter).into();
                metric.timestamp_ms = sample.timestamp_ms;
                state.family.metric.push(metric);
            }
            MetricType::GAUGE => {
                let mut gauge = Gauge::default();
                gauge.value = Some(sample.value);
                let mut metric = new_metric(sample.labels);
                metric.gauge = Some(gauge).into();
                metric.timestamp_ms = sample.timestamp_ms;
                state.family.metric.push(metric);
            }
            MetricType::SUMMARY => add_summary_sample(state, suffix, sample)?,
            MetricType::HISTOGRAM => add_histogram_sample(state, suffix, sample)?,
            _ => {
                let mut untyped = Untyped::default();
                untyped.value = Some(sample.value);
                let mut metric = new_metric(sample.labels);
                metric.untyped = Some(untyped).into();
                metric.timestamp_ms = sample.timestamp_ms;
                state.family.metric.push(metric);
            }
        }
        Ok(())
    }

    /// Families ordered by name.
    pub fn finish(self) -> Vec<MetricFamily> {
        self.families
            .into_values()
            .map(|state| state.family)
            .collect()
    }

    fn state_mut(&mut self, name: &str) -> &mut FamilyState {
        self.families
            .entry(name.to_string())
            .or_insert_with(|| FamilyState::new(name))
    }

    /// Maps `foo_bucket`, `foo_sum` and `foo_count` onto a declared
    /// histogram or summary `foo`.
    fn resolve_family(&self, sample_name: &str) -> (String, Option<Suffix>) {
        for suffix in [Suffix::Bucket, Suffix::Count, Suffix::Sum] {
            let Some(base) = sample_name.strip_suffix(suffix.as_str()) else {
                continue;
            };
            let Some(state) = self.families.get(base) else {
                continue;
            };
            let folds = match state.kind {
                MetricType::HISTOGRAM => true,
                MetricType::SUMMARY => suffix != Suffix::Bucket,
                _ => false,
            };
            if folds {
                return (base.to_string(), Some(suffix));
            }
        }
        (sample_name.to_string(), None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Suffix {
    Bucket,
    Count,
    Sum,
}

impl Suffix {
    fn as_str(self) -> &'static str {
        match self {
            Suffix::Bucket => "_bucket",
            Suffix::Count => "_count",
            Suffix::Sum => "_sum",
        }
    }
}

fn add_summary_sample(
    state: &mut FamilyState,
    suffix: Option<Suffix>,
    sample: Sample,
) -> Result<(), String> {
    let timestamp_ms = sample.timestamp_ms;
    let value = sample.value;

    let (labels, quantile) = split_label(sample.labels, "quantile");
    let metric = state.series_mut(labels);
    let summary = metric.summary.mut_or_insert_default();

    match suffix {
        None => {
            let raw = quantile.ok_or_else(|| {
                format!("summary sample {:?} is missing the quantile label", sample.name)
            })?;
            let mut entry = Quantile::default();
            entry.quantile = Some(parse_bound(&raw, "quantile")?);
            entry.value = Some(value);
            summary.quantile.push(entry);
        }
        Some(Suffix::Count) => summary.sample_count = Some(value as u64),
        Some(Suffix::Sum) => summary.sample_sum = Some(value),
        Some(Suffix::Bucket) => {
            return Err(format!("summary {:?} cannot have buckets", sample.name));
        }
    }

    if timestamp_ms.is_some() {
        metric.timestamp_ms = timestamp_ms;
    }
    Ok(())
}

fn add_histogram_sample(
    state: &mut FamilyState,
    suffix: Option<Suffix>,
    sample: Sample,
) -> Result<(), String> {
    let timestamp_ms = sample.timestamp_ms;
    let value = sample.value;
    let Some(suffix) = suffix else {
        return Err(format!(
            "histogram sample {:?} must end in _bucket, _sum or _count",
            sample.name
        ));
    };

    let (labels, le) = split_label(sample.labels, "le");
    let metric = state.series_mut(labels);
    let histogram = metric.histogram.mut_or_insert_default();

    match suffix {
        Suffix::Bucket => {
            let raw = le.ok_or_else(|| {
                format!("histogram bucket {:?} is missing the le label", sample.name)
            })?;
            let mut bucket = Bucket::default();
            bucket.upper_bound = Some(parse_bound(&raw, "le")?);
            bucket.cumulative_count = Some(value as u64);
            histogram.bucket.push(bucket);
        }
        Suffix::Count => histogram.sample_count = Some(value as u64),
        Suffix::Sum => histogram.sample_sum = Some(value),
    }

    if timestamp_ms.is_some() {
        metric.timestamp_ms = timestamp_ms;
    }
    Ok(())
}

/// Removes `name` from the label set, returning the remaining labels sorted
/// by name together with the removed value.
fn split_label(labels: LabelSet, name: &str) -> (LabelSet, Option<String>) {
    let mut removed = None;
    let mut rest: LabelSet = labels
        .into_iter()
        .filter_map(|(label, value)| {
            if label == name {
                removed = Some(value);
                None
            } else {
                Some((label, value))
            }
        })
        .collect();
    rest.sort();
    (rest, removed)
}

fn parse_bound(raw: &str, label: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid {} label value {:?}", label, raw))
}

fn new_metric(mut labels: LabelSet) -> Metric {
    labels.sort();
    let mut metric = Metric::default();
    metric.label = labels
        .into_iter()
        .map(|(name, value)| {
            let mut pair = LabelPair::default();
            pair.name = Some(name);
            pair.value = Some(value);
            pair
        })
        .collect();
    metric
}
