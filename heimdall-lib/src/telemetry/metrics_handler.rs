use prometheus::proto::MetricType;
use prometheus::Registry;
use serde_json::{json, Map, Value};

/// Render the metric registry as a JSON object, one entry per series.
///
/// Counters and gauges dump their value directly; histograms dump the sample
/// count plus the mean converted to milliseconds. Labeled series append
/// `{key=value}` to the entry name.
pub fn registry_json(registry: &Registry) -> Value {
    let mut out = Map::new();

    for family in registry.gather() {
        let name = family.get_name();
        for metric in family.get_metric() {
            let labels: Vec<String> = metric
                .get_label()
                .iter()
                .filter(|label| !label.get_name().starts_with("otel_"))
                .map(|label| format!("{}={}", label.name(), label.value()))
                .collect();
            let key = if labels.is_empty() {
                name.to_string()
            } else {
                format!("{}{{{}}}", name, labels.join(","))
            };

            let value = match family.get_field_type() {
                MetricType::COUNTER => json!(metric.get_counter().value()),
                MetricType::GAUGE => json!(metric.get_gauge().value()),
                MetricType::HISTOGRAM => {
                    let histogram = metric.get_histogram();
                    let count = histogram.get_sample_count();
                    let mean_ms = if count > 0 {
                        histogram.get_sample_sum() * 1000.0 / count as f64
                    } else {
                        0.0
                    };
                    json!({ "count": count, "mean_ms": mean_ms })
                }
                MetricType::UNTYPED => json!(metric.untyped.value()),
                MetricType::SUMMARY => continue,
            };
            out.insert(key, value);
        }
    }

    Value::Object(out)
}
