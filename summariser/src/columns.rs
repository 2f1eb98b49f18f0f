/// A statistic read from a stats CSV row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Average,
    Minimum,
    P95,
    Throughput,
    Failures,
    Requests,
}

/// Column names used for each [Statistic], in the order they are tried.
///
/// Locust renamed several columns between releases, so the newer name comes first and the older
/// one is kept as a fallback.
pub struct ColumnAliases;

impl ColumnAliases {
    const AVERAGE: &'static [&'static str] = &["Average Response Time", "Average response time"];
    const MINIMUM: &'static [&'static str] = &["Min Response Time", "Min response time"];
    const P95: &'static [&'static str] = &["95%", "95%ile"];
    const THROUGHPUT: &'static [&'static str] = &["Requests/s", "Requests per Second"];
    const FAILURES: &'static [&'static str] = &["Failure Count", "# failures"];
    const REQUESTS: &'static [&'static str] = &["Request Count", "# requests"];

    pub fn for_statistic(statistic: Statistic) -> &'static [&'static str] {
        match statistic {
            Statistic::Average => Self::AVERAGE,
            Statistic::Minimum => Self::MINIMUM,
            Statistic::P95 => Self::P95,
            Statistic::Throughput => Self::THROUGHPUT,
            Statistic::Failures => Self::FAILURES,
            Statistic::Requests => Self::REQUESTS,
        }
    }
}

/// Pick the value of the first alias that is present and non-zero, or 0.0.
///
/// `lookup` returns the value of a column, `None` when the column is missing or the cell is empty.
pub fn resolve(statistic: Statistic, lookup: impl Fn(&str) -> Option<f64>) -> f64 {
    ColumnAliases::for_statistic(statistic)
        .iter()
        .filter_map(|alias| lookup(alias))
        .find(|value| *value != 0.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(values: &[(&str, f64)]) -> HashMap<String, f64> {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn p95_prefers_the_current_column() {
        let both = row(&[("95%", 120.0), ("95%ile", 99.0)]);
        assert_eq!(120.0, resolve(Statistic::P95, |c| both.get(c).copied()));
    }

    #[test]
    fn p95_falls_back_to_the_old_column() {
        let old_only = row(&[("95%ile", 99.0)]);
        assert_eq!(99.0, resolve(Statistic::P95, |c| old_only.get(c).copied()));

        let zero_current = row(&[("95%", 0.0), ("95%ile", 99.0)]);
        assert_eq!(99.0, resolve(Statistic::P95, |c| zero_current.get(c).copied()));
    }

    #[test]
    fn missing_statistic_is_zero() {
        let throughput_only = row(&[("Requests/s", 15.68)]);
        assert_eq!(0.0, resolve(Statistic::P95, |c| throughput_only.get(c).copied()));
        assert_eq!(
            15.68,
            resolve(Statistic::Throughput, |c| throughput_only.get(c).copied())
        );
    }
}
