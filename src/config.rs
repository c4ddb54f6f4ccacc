use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for option '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

/// Every harness-recognized option, absorbed from the raw bag before
/// whatever remains is forwarded to the policy's `configure`.
#[derive(Default)]
struct SimulationConfigIntermediate {
    uni_size: Option<bool>,
    is_metadata_in_cache_size: Option<bool>,
    bloom_filter: Option<bool>,
    segment_window: Option<u64>,
    real_time_segment_window: Option<i64>,
    n_extra_fields: Option<usize>,
    n_early_stop: Option<i64>,
    seq_start: Option<u64>,
    enable_trace_format_check: Option<bool>,
    seed: Option<u64>,
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl SimulationConfigIntermediate {
    /// Consumes recognized keys out of `options`, leaving only the
    /// keys the policy should see.
    fn absorb(options: &mut BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut cfg = SimulationConfigIntermediate::default();

        macro_rules! take_bool {
            ($key:literal, $field:ident) => {
                if let Some(v) = options.remove($key) {
                    cfg.$field = Some(parse_bool($key, &v)?);
                }
            };
        }
        macro_rules! take_num {
            ($key:literal, $field:ident) => {
                if let Some(v) = options.remove($key) {
                    cfg.$field = Some(parse_num($key, &v)?);
                }
            };
        }

        take_bool!("uni_size", uni_size);
        take_bool!("is_metadata_in_cache_size", is_metadata_in_cache_size);
        take_bool!("bloom_filter", bloom_filter);
        take_num!("segment_window", segment_window);
        take_num!("real_time_segment_window", real_time_segment_window);
        take_num!("n_extra_fields", n_extra_fields);
        take_num!("n_early_stop", n_early_stop);
        take_num!("seq_start", seq_start);
        take_bool!("enable_trace_format_check", enable_trace_format_check);
        take_num!("seed", seed);

        Ok(cfg)
    }
}

/// Fully resolved simulation configuration, with every harness-level
/// default applied.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub uni_size: bool,
    pub is_metadata_in_cache_size: bool,
    pub bloom_filter: bool,
    pub segment_window: u64,
    pub real_time_segment_window: i64,
    pub n_extra_fields: Option<usize>,
    pub n_early_stop: i64,
    pub seq_start: u64,
    pub enable_trace_format_check: bool,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            uni_size: false,
            is_metadata_in_cache_size: false,
            bloom_filter: false,
            segment_window: 1_000_000,
            real_time_segment_window: 600,
            n_extra_fields: None,
            n_early_stop: -1,
            seq_start: 0,
            enable_trace_format_check: true,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Parses harness-recognized options out of `options`, removing
    /// them from the bag in place; whatever remains is meant for the
    /// policy's `configure`.
    pub fn from_options(options: &mut BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let intermediate = SimulationConfigIntermediate::absorb(options)?;
        let defaults = SimulationConfig::default();
        Ok(SimulationConfig {
            uni_size: intermediate.uni_size.unwrap_or(defaults.uni_size),
            is_metadata_in_cache_size: intermediate
                .is_metadata_in_cache_size
                .unwrap_or(defaults.is_metadata_in_cache_size),
            bloom_filter: intermediate.bloom_filter.unwrap_or(defaults.bloom_filter),
            segment_window: intermediate.segment_window.unwrap_or(defaults.segment_window),
            real_time_segment_window: intermediate
                .real_time_segment_window
                .unwrap_or(defaults.real_time_segment_window),
            n_extra_fields: intermediate.n_extra_fields,
            n_early_stop: intermediate.n_early_stop.unwrap_or(defaults.n_early_stop),
            seq_start: intermediate.seq_start.unwrap_or(defaults.seq_start),
            enable_trace_format_check: intermediate
                .enable_trace_format_check
                .unwrap_or(defaults.enable_trace_format_check),
            seed: intermediate.seed.unwrap_or(defaults.seed),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_when_bag_is_empty() {
        let mut options = BTreeMap::new();
        let cfg = SimulationConfig::from_options(&mut options).unwrap();
        assert_eq!(cfg.segment_window, 1_000_000);
        assert_eq!(cfg.real_time_segment_window, 600);
        assert!(!cfg.uni_size);
    }

    #[test]
    fn recognized_keys_are_removed_leftovers_forwarded() {
        let mut options = BTreeMap::new();
        options.insert("uni_size".to_string(), "1".to_string());
        options.insert("policy_specific".to_string(), "foo".to_string());
        let cfg = SimulationConfig::from_options(&mut options).unwrap();
        assert!(cfg.uni_size);
        assert_eq!(options.len(), 1);
        assert!(options.contains_key("policy_specific"));
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let mut options = BTreeMap::new();
        options.insert("uni_size".to_string(), "yes".to_string());
        assert!(SimulationConfig::from_options(&mut options).is_err());
    }
}
