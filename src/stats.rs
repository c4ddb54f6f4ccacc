use crate::record::Request;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Default, Clone)]
struct LiveCounters {
    byte_req: u64,
    byte_miss: u64,
    object_req: u64,
    object_miss: u64,
}

impl LiveCounters {
    fn record(&mut self, size: u64, hit: bool) {
        self.byte_req += size;
        self.object_req += 1;
        if !hit {
            self.byte_miss += size;
            self.object_miss += 1;
        }
    }
}

#[derive(Default, Clone, Serialize)]
pub struct WindowSeries {
    pub byte_req: Vec<u64>,
    pub byte_miss: Vec<u64>,
    pub object_req: Vec<u64>,
    pub object_miss: Vec<u64>,
    pub rss: Vec<u64>,
}

#[derive(Default)]
struct Accumulator {
    seq_live: LiveCounters,
    seq_hist: WindowSeries,
    byte_in_cache: Vec<u64>,
    rt_live: LiveCounters,
    rt_hist: WindowSeries,
}

impl Accumulator {
    fn record(&mut self, size: u64, hit: bool) {
        self.seq_live.record(size, hit);
        self.rt_live.record(size, hit);
    }

    fn close_seq(&mut self, rss: u64, cache_bytes: u64) {
        let live = std::mem::take(&mut self.seq_live);
        self.seq_hist.byte_req.push(live.byte_req);
        self.seq_hist.byte_miss.push(live.byte_miss);
        self.seq_hist.object_req.push(live.object_req);
        self.seq_hist.object_miss.push(live.object_miss);
        self.seq_hist.rss.push(rss);
        self.byte_in_cache.push(cache_bytes);
    }

    fn close_rt(&mut self, rss: u64) {
        let live = std::mem::take(&mut self.rt_live);
        self.rt_hist.byte_req.push(live.byte_req);
        self.rt_hist.byte_miss.push(live.byte_miss);
        self.rt_hist.object_req.push(live.object_req);
        self.rt_hist.object_miss.push(live.object_miss);
        self.rt_hist.rss.push(rss);
    }
}

/// Maintains the sequence-window and real-time-window accumulators,
/// globally and broken down per category key (the first extra feature
/// of a request).
pub struct StatsAggregator {
    global: Accumulator,
    categories: BTreeMap<i64, Accumulator>,
    segment_window: u64,
    real_time_segment_window: i64,
    time_window_end: Option<i64>,
}

impl StatsAggregator {
    pub fn new(segment_window: u64, real_time_segment_window: i64) -> Self {
        StatsAggregator {
            global: Accumulator::default(),
            categories: BTreeMap::new(),
            segment_window,
            real_time_segment_window,
            time_window_end: None,
        }
    }

    /// Must be called once with the first request's timestamp before
    /// any request is recorded.
    pub fn init_real_time_window(&mut self, first_t: i64) {
        if self.time_window_end.is_none() {
            // ceil(first_t / w) * w: if first_t already falls on a
            // boundary, that boundary is the first one, so the leading
            // (all-zero) window closes immediately.
            let w = self.real_time_segment_window;
            let next = if first_t % w == 0 { first_t } else { ((first_t / w) + 1) * w };
            self.time_window_end = Some(next);
        }
    }

    pub fn record_request(&mut self, req: &Request, hit: bool) {
        self.global.record(req.size, hit);
        if let Some(key) = req.category_key() {
            self.categories.entry(key).or_default().record(req.size, hit);
        }
    }

    /// Closes every real-time window whose boundary `t` has reached or
    /// passed, possibly more than one if the trace skips ahead. `rss_fn`
    /// is invoked once per window actually closed, since each close
    /// samples memory independently.
    pub fn close_elapsed_real_time_windows(&mut self, t: i64, mut rss_fn: impl FnMut() -> u64) {
        while let Some(end) = self.time_window_end {
            if t < end {
                break;
            }
            let rss = rss_fn();
            self.global.close_rt(rss);
            for acc in self.categories.values_mut() {
                acc.close_rt(rss);
            }
            self.time_window_end = Some(end + self.real_time_segment_window);
        }
    }

    pub fn is_sequence_boundary(&self, seq: u64) -> bool {
        seq > 0 && seq % self.segment_window == 0
    }

    pub fn close_sequence_window(&mut self, rss: u64, cache_bytes: u64) {
        self.global.close_seq(rss, cache_bytes);
        for acc in self.categories.values_mut() {
            acc.close_seq(rss, cache_bytes);
        }
    }

    /// Flushes whatever is left in the live counters as a final,
    /// possibly partial, window. Called once at end of trace.
    pub fn flush_residue(&mut self, rss: u64, cache_bytes: u64) {
        self.global.close_seq(rss, cache_bytes);
        self.global.close_rt(rss);
        for acc in self.categories.values_mut() {
            acc.close_seq(rss, cache_bytes);
            acc.close_rt(rss);
        }
    }

    pub fn into_result_document(self, policy_stats: serde_json::Map<String, serde_json::Value>) -> ResultDocument {
        let total_byte_req: u64 = self.global.seq_hist.byte_req.iter().sum();
        let total_byte_miss: u64 = self.global.seq_hist.byte_miss.iter().sum();
        let no_warmup_byte_miss_ratio = if total_byte_req == 0 {
            0.0
        } else {
            total_byte_miss as f64 / total_byte_req as f64
        };

        let stats_by_extra_feature = self
            .categories
            .into_iter()
            .map(|(feature, acc)| CategoryDocument {
                feature,
                segment_byte_req: acc.seq_hist.byte_req,
                segment_byte_miss: acc.seq_hist.byte_miss,
                segment_object_req: acc.seq_hist.object_req,
                segment_object_miss: acc.seq_hist.object_miss,
                segment_rss: acc.seq_hist.rss,
                rt_segment_byte_req: acc.rt_hist.byte_req,
                rt_segment_byte_miss: acc.rt_hist.byte_miss,
                rt_segment_object_req: acc.rt_hist.object_req,
                rt_segment_object_miss: acc.rt_hist.object_miss,
                rt_segment_rss: acc.rt_hist.rss,
            })
            .collect();

        ResultDocument {
            no_warmup_byte_miss_ratio,
            segment_byte_miss: self.global.seq_hist.byte_miss,
            segment_byte_req: self.global.seq_hist.byte_req,
            segment_object_miss: self.global.seq_hist.object_miss,
            segment_object_req: self.global.seq_hist.object_req,
            segment_rss: self.global.seq_hist.rss,
            segment_byte_in_cache: self.global.byte_in_cache,
            real_time_segment_byte_miss: self.global.rt_hist.byte_miss,
            real_time_segment_byte_req: self.global.rt_hist.byte_req,
            real_time_segment_object_miss: self.global.rt_hist.object_miss,
            real_time_segment_object_req: self.global.rt_hist.object_req,
            real_time_segment_rss: self.global.rt_hist.rss,
            stats_by_extra_feature,
            policy_stats,
        }
    }
}

#[derive(Serialize)]
pub struct CategoryDocument {
    pub feature: i64,
    pub segment_byte_req: Vec<u64>,
    pub segment_byte_miss: Vec<u64>,
    pub segment_object_req: Vec<u64>,
    pub segment_object_miss: Vec<u64>,
    pub segment_rss: Vec<u64>,
    pub rt_segment_byte_req: Vec<u64>,
    pub rt_segment_byte_miss: Vec<u64>,
    pub rt_segment_object_req: Vec<u64>,
    pub rt_segment_object_miss: Vec<u64>,
    pub rt_segment_rss: Vec<u64>,
}

#[derive(Serialize)]
pub struct ResultDocument {
    pub no_warmup_byte_miss_ratio: f64,
    pub segment_byte_miss: Vec<u64>,
    pub segment_byte_req: Vec<u64>,
    pub segment_object_miss: Vec<u64>,
    pub segment_object_req: Vec<u64>,
    pub segment_rss: Vec<u64>,
    pub segment_byte_in_cache: Vec<u64>,
    pub real_time_segment_byte_miss: Vec<u64>,
    pub real_time_segment_byte_req: Vec<u64>,
    pub real_time_segment_object_miss: Vec<u64>,
    pub real_time_segment_object_req: Vec<u64>,
    pub real_time_segment_rss: Vec<u64>,
    pub stats_by_extra_feature: Vec<CategoryDocument>,
    #[serde(flatten)]
    pub policy_stats: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn req(id: i64, size: u64, extras: Vec<u16>) -> Request {
        Request {
            seq: 0,
            t: 0,
            id,
            size,
            next_seq: None,
            extra_features: extras,
        }
    }

    #[test]
    fn sequence_window_closes_on_boundary() {
        let mut agg = StatsAggregator::new(2, 100);
        agg.init_real_time_window(0);
        agg.record_request(&req(1, 10, vec![]), false);
        assert!(!agg.is_sequence_boundary(1));
        agg.record_request(&req(2, 10, vec![]), false);
        assert!(agg.is_sequence_boundary(2));
        agg.close_sequence_window(0, 20);

        let doc = agg.into_result_document(serde_json::Map::new());
        assert_eq!(doc.segment_object_req, vec![2]);
        assert_eq!(doc.segment_byte_req, vec![20]);
    }

    #[test]
    fn category_totals_match_global() {
        let mut agg = StatsAggregator::new(10, 100);
        agg.init_real_time_window(0);
        agg.record_request(&req(1, 10, vec![7]), false);
        agg.record_request(&req(2, 10, vec![8]), false);
        agg.flush_residue(0, 20);

        let doc = agg.into_result_document(serde_json::Map::new());
        let cat_total: u64 = doc.stats_by_extra_feature.iter().map(|c| c.segment_object_req.iter().sum::<u64>()).sum();
        let global_total: u64 = doc.segment_object_req.iter().sum();
        assert_eq!(cat_total, global_total);
    }

    #[test]
    fn real_time_residue_flushes_at_least_one_window() {
        let mut agg = StatsAggregator::new(1_000_000, 10);
        agg.init_real_time_window(0);
        agg.record_request(&req(1, 5, vec![]), false);
        agg.flush_residue(0, 5);
        let doc = agg.into_result_document(serde_json::Map::new());
        assert!(doc.real_time_segment_object_req.len() >= 1);
    }
}
