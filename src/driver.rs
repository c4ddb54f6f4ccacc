use crate::annotate;
use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::filter::{AdmissionFilter, BloomFilter};
use crate::policy::{registry, CachePolicy};
use crate::rss::{RssProbe, SysinfoRssProbe};
use crate::sanity;
use crate::stats::{ResultDocument, StatsAggregator};
use crate::trace_reader::TraceReader;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Runs a full simulation and returns the resulting statistics
/// document. Uses a real, `sysinfo`-backed RSS probe.
pub fn run_simulation(
    trace_files: &[String],
    cache_type: &str,
    cache_size: u64,
    options: BTreeMap<String, String>,
) -> Result<ResultDocument, SimulationError> {
    run_simulation_with_probe(
        trace_files,
        cache_type,
        cache_size,
        options,
        Box::new(SysinfoRssProbe::new()),
    )
}

/// As [`run_simulation`], but with an injectable RSS probe so tests can
/// get deterministic result documents.
pub fn run_simulation_with_probe(
    trace_files: &[String],
    cache_type: &str,
    cache_size: u64,
    mut options: BTreeMap<String, String>,
    mut rss_probe: Box<dyn RssProbe>,
) -> Result<ResultDocument, SimulationError> {
    let config = SimulationConfig::from_options(&mut options)
        .map_err(|e| SimulationError::InvalidOption {
            key: "<config>".to_string(),
            value: e.to_string(),
        })?;

    let reg = registry();
    let registration = reg
        .get(cache_type)
        .ok_or_else(|| SimulationError::UnknownPolicy(cache_type.to_string()))?;
    let offline = registration.is_offline;

    let mut paths = trace_files.to_vec();
    if offline {
        let mut annotated = Vec::with_capacity(paths.len());
        for p in &paths {
            annotated.push(annotate::annotate(p)?.to_string_lossy().into_owned());
        }
        paths = annotated;
    }

    let n_extra_fields = match config.n_extra_fields {
        Some(n) => n,
        None => detect_n_extra_fields(&paths, offline)?,
    };

    if config.enable_trace_format_check {
        let expected_fields = n_extra_fields + if offline { 4 } else { 3 };
        sanity::check_traces(&paths, expected_fields, offline)?;
    }

    let mut policy: Box<dyn CachePolicy> = (registration.construct)();
    policy.set_size(cache_size);
    policy.configure(&options);

    let mut filter: Option<Box<dyn AdmissionFilter>> = if config.bloom_filter {
        Some(Box::new(BloomFilter::new(1_000_000)))
    } else {
        None
    };

    let rng = StdRng::seed_from_u64(config.seed);
    let mut reader = TraceReader::open(&paths, offline, n_extra_fields, rng)?;
    crate::log::status("Merging", reader.active_files().join(", "));

    let mut stats = StatsAggregator::new(config.segment_window, config.real_time_segment_window);
    if let Some(first_t) = reader.peek_min_t() {
        stats.init_real_time_window(first_t);
    }

    let mut seq_skip_remaining = config.seq_start;

    loop {
        // Preserved verbatim from the source: this counter advances
        // without consuming a trace record, so it skips loop
        // iterations rather than records.
        if seq_skip_remaining > 0 {
            seq_skip_remaining -= 1;
            continue;
        }

        if config.n_early_stop >= 0 && reader.next_seq() as i64 == config.n_early_stop {
            break;
        }

        let Some(mut req) = reader.next() else {
            break;
        };
        if config.uni_size {
            req.size = 1;
        }

        stats.close_elapsed_real_time_windows(req.t, || rss_probe.sample());

        if stats.is_sequence_boundary(req.seq) {
            let rss = rss_probe.sample();
            stats.close_sequence_window(rss, policy.current_bytes());
            if config.is_metadata_in_cache_size {
                policy.set_size(cache_size.saturating_sub(rss));
            }
            policy.periodic_tick();
        }

        let admitting = match filter.as_mut() {
            None => true,
            Some(f) => {
                if policy.exist(req.id) {
                    true
                } else {
                    f.exist_or_insert(req.id)
                }
            }
        };

        if admitting {
            let hit = policy.lookup(&req);
            stats.record_request(&req, hit);
            if !hit {
                policy.admit(&req);
            }
        } else {
            stats.record_request(&req, false);
        }
    }

    let final_rss = rss_probe.sample();
    stats.flush_residue(final_rss, policy.current_bytes());

    Ok(stats.into_result_document(policy.emit_stats()))
}

fn detect_n_extra_fields(paths: &[String], offline: bool) -> Result<usize, SimulationError> {
    let base_fields = if offline { 4 } else { 3 };
    for path in paths {
        let content = std::fs::read_to_string(path).map_err(|e| SimulationError::TraceOpen {
            path: path.clone(),
            source: e,
        })?;
        if let Some(line) = content.lines().find(|l| !l.trim().is_empty()) {
            let count = line.split_whitespace().count();
            return Ok(count.saturating_sub(base_fields));
        }
    }
    Ok(0)
}
