/// A single logical cache request produced by the trace reader.
///
/// Online and offline requests differ only in whether `next_seq` is
/// populated; there is no separate offline request type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub seq: u64,
    pub t: i64,
    pub id: i64,
    pub size: u64,
    /// `seq` of the next request for the same `id`, or `None` if this
    /// was never annotated or no future occurrence exists. Populated
    /// only when the driving policy is offline.
    pub next_seq: Option<i64>,
    pub extra_features: Vec<u16>,
}

impl Request {
    /// A value strictly larger than any valid `seq`; used by the
    /// annotator to mark "no future occurrence".
    pub const NO_NEXT_OCCURRENCE: i64 = i64::MAX;

    /// The category key used to partition per-category statistics: the
    /// first extra feature, if any.
    pub fn category_key(&self) -> Option<i64> {
        self.extra_features.first().map(|&v| v as i64)
    }
}
