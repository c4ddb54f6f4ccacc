use crate::record::Request;
use rand::rngs::StdRng;
use rand::Rng;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

struct Peeked {
    next_seq: Option<i64>,
    t: i64,
    id: i64,
    size: u64,
    extras: Vec<u16>,
}

struct TraceFile {
    path: String,
    reader: BufReader<File>,
    alive: bool,
}

impl TraceFile {
    fn open(path: &str) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(TraceFile {
            path: path.to_string(),
            reader: BufReader::new(file),
            alive: true,
        })
    }

    /// Reads one record from the current position without committing to
    /// it; the caller must either keep reading forward (the record was
    /// chosen) or `rewind_to` to undo this read.
    fn peek(&mut self, offline: bool, n_extra_fields: usize) -> Option<(u64, Peeked)> {
        if !self.alive {
            return None;
        }
        let pos = match self.reader.stream_position() {
            Ok(p) => p,
            Err(_) => {
                self.alive = false;
                return None;
            }
        };

        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.alive = false;
                    return None;
                }
                Ok(_) => {
                    if line.trim().is_empty() {
                        // skip blank lines without losing our rewind point
                        continue;
                    }
                    break;
                }
                Err(_) => {
                    self.alive = false;
                    return None;
                }
            }
        }

        match parse_record(&line, offline, n_extra_fields) {
            Some(p) => Some((pos, p)),
            None => {
                self.alive = false;
                None
            }
        }
    }

    fn rewind_to(&mut self, pos: u64) {
        if self.reader.seek(SeekFrom::Start(pos)).is_err() {
            self.alive = false;
        }
    }

    fn describe(&self) -> &str {
        &self.path
    }
}

fn parse_record(line: &str, offline: bool, n_extra_fields: usize) -> Option<Peeked> {
    let mut fields = line.split_whitespace();

    let next_seq = if offline {
        Some(fields.next()?.parse::<i64>().ok()?)
    } else {
        None
    };
    let t: i64 = fields.next()?.parse().ok()?;
    let id: i64 = fields.next()?.parse().ok()?;
    let size: u64 = fields.next()?.parse().ok()?;

    let mut extras = Vec::with_capacity(n_extra_fields);
    for _ in 0..n_extra_fields {
        extras.push(fields.next()?.parse::<u16>().ok()?);
    }

    Some(Peeked {
        next_seq,
        t,
        id,
        size,
        extras,
    })
}

/// Merges one or more time-ordered trace files into a single logical
/// request stream, tolerating individual files becoming unreadable and
/// breaking timestamp ties with a seeded random choice.
pub struct TraceReader {
    files: Vec<TraceFile>,
    offline: bool,
    n_extra_fields: usize,
    rng: StdRng,
    next_seq: u64,
}

impl TraceReader {
    pub fn open(paths: &[String], offline: bool, n_extra_fields: usize, rng: StdRng) -> std::io::Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(TraceFile::open(path)?);
        }
        Ok(TraceReader {
            files,
            offline,
            n_extra_fields,
            rng,
            next_seq: 0,
        })
    }

    /// The `seq` that will be assigned to the next record returned by
    /// `next()`, without consuming anything.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Paths of the files still being merged.
    pub fn active_files(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.describe()).collect()
    }

    /// Peeks the smallest timestamp across all files without consuming
    /// any record; used to initialize the real-time window boundary
    /// before the main loop starts. Leaves every file's position
    /// unchanged.
    pub fn peek_min_t(&mut self) -> Option<i64> {
        self.files.retain(|f| f.alive);
        let mut min_t = None;
        for file in self.files.iter_mut() {
            if let Some((pos, peeked)) = file.peek(self.offline, self.n_extra_fields) {
                min_t = Some(min_t.map_or(peeked.t, |m: i64| m.min(peeked.t)));
                file.rewind_to(pos);
            }
        }
        min_t
    }

    /// Yields the next request in merged, time-ordered sequence, or
    /// `None` once every file is exhausted or unreadable.
    pub fn next(&mut self) -> Option<Request> {
        self.files.retain(|f| f.alive);

        let mut peeks: Vec<(usize, u64, Peeked)> = Vec::new();
        for (idx, file) in self.files.iter_mut().enumerate() {
            if let Some((pos, peeked)) = file.peek(self.offline, self.n_extra_fields) {
                peeks.push((idx, pos, peeked));
            }
        }

        if peeks.is_empty() {
            return None;
        }

        let t_min = peeks.iter().map(|(_, _, p)| p.t).min().unwrap();
        let candidates: Vec<usize> = peeks
            .iter()
            .enumerate()
            .filter(|(_, (_, _, p))| p.t == t_min)
            .map(|(i, _)| i)
            .collect();

        let chosen = candidates[self.rng.random_range(0..candidates.len())];

        let mut request = None;
        for (i, (file_idx, pos, peeked)) in peeks.into_iter().enumerate() {
            if i == chosen {
                let seq = self.next_seq;
                self.next_seq += 1;
                request = Some(Request {
                    seq,
                    t: peeked.t,
                    id: peeked.id,
                    size: peeked.size,
                    next_seq: peeked.next_seq,
                    extra_features: peeked.extras,
                });
            } else {
                self.files[file_idx].rewind_to(pos);
            }
        }

        request
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn trace_file(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{}", contents).unwrap();
        f
    }

    #[test]
    fn single_file_in_order() {
        let f = trace_file("0 1 10\n1 2 20\n2 3 30\n");
        let path = f.path().to_str().unwrap().to_string();
        let rng = StdRng::seed_from_u64(0);
        let mut reader = TraceReader::open(&[path], false, 0, rng).unwrap();

        let r0 = reader.next().unwrap();
        assert_eq!((r0.seq, r0.t, r0.id, r0.size), (0, 0, 1, 10));
        let r1 = reader.next().unwrap();
        assert_eq!((r1.seq, r1.t, r1.id, r1.size), (1, 1, 2, 20));
        let r2 = reader.next().unwrap();
        assert_eq!((r2.seq, r2.t, r2.id, r2.size), (2, 2, 3, 30));
        assert!(reader.next().is_none());
    }

    #[test]
    fn merges_two_files_by_timestamp() {
        let a = trace_file("0 1 1\n10 1 1\n");
        let b = trace_file("5 2 1\n");
        let pa = a.path().to_str().unwrap().to_string();
        let pb = b.path().to_str().unwrap().to_string();
        let rng = StdRng::seed_from_u64(1);
        let mut reader = TraceReader::open(&[pa, pb], false, 0, rng).unwrap();

        let r0 = reader.next().unwrap();
        assert_eq!(r0.t, 0);
        let r1 = reader.next().unwrap();
        assert_eq!(r1.t, 5);
        assert_eq!(r1.id, 2);
        let r2 = reader.next().unwrap();
        assert_eq!(r2.t, 10);
        assert!(reader.next().is_none());
    }

    #[test]
    fn tie_break_consumes_both() {
        let a = trace_file("5 1 1\n");
        let b = trace_file("5 2 1\n");
        let pa = a.path().to_str().unwrap().to_string();
        let pb = b.path().to_str().unwrap().to_string();
        let rng = StdRng::seed_from_u64(7);
        let mut reader = TraceReader::open(&[pa, pb], false, 0, rng).unwrap();

        let mut ids = vec![reader.next().unwrap().id, reader.next().unwrap().id];
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
        assert!(reader.next().is_none());
    }

    #[test]
    fn offline_reads_next_seq_prefix() {
        let f = trace_file("2 0 1 10\n9223372036854775807 1 2 20\n");
        let path = f.path().to_str().unwrap().to_string();
        let rng = StdRng::seed_from_u64(0);
        let mut reader = TraceReader::open(&[path], true, 0, rng).unwrap();

        let r0 = reader.next().unwrap();
        assert_eq!(r0.next_seq, Some(2));
        let r1 = reader.next().unwrap();
        assert_eq!(r1.next_seq, Some(Request::NO_NEXT_OCCURRENCE));
    }
}
