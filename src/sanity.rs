use crate::error::SimulationError;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Minimal structural pre-flight check: every trace file must have a
/// consistent field count and non-decreasing per-file timestamps.
/// `expected_fields` is `n_extra_fields + 3` (online) or `+ 4` (offline).
pub fn check_traces(paths: &[String], expected_fields: usize, offline: bool) -> Result<(), SimulationError> {
    for path in paths {
        let file = File::open(path).map_err(|e| SimulationError::TraceOpen {
            path: path.clone(),
            source: e,
        })?;
        let reader = BufReader::new(file);

        let mut last_t: Option<i64> = None;
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != expected_fields {
                return Err(SimulationError::SanityCheck(format!(
                    "{}:{}: expected {} fields, found {}",
                    path,
                    lineno + 1,
                    expected_fields,
                    fields.len()
                )));
            }

            let t_field_idx = if offline { 1 } else { 0 };
            let t: i64 = fields[t_field_idx].parse().map_err(|_| {
                SimulationError::SanityCheck(format!("{}:{}: non-numeric timestamp", path, lineno + 1))
            })?;

            if let Some(prev) = last_t {
                if t < prev {
                    return Err(SimulationError::SanityCheck(format!(
                        "{}:{}: timestamp {} precedes earlier {}",
                        path,
                        lineno + 1,
                        t,
                        prev
                    )));
                }
            }
            last_t = Some(t);
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn trace_file(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{}", contents).unwrap();
        f
    }

    #[test]
    fn accepts_well_formed_trace() {
        let f = trace_file("0 1 10\n1 2 20\n");
        let path = f.path().to_str().unwrap().to_string();
        assert!(check_traces(&[path], 3, false).is_ok());
    }

    #[test]
    fn rejects_wrong_field_count() {
        let f = trace_file("0 1 10 99\n");
        let path = f.path().to_str().unwrap().to_string();
        assert!(check_traces(&[path], 3, false).is_err());
    }

    #[test]
    fn rejects_decreasing_timestamp() {
        let f = trace_file("5 1 10\n1 2 20\n");
        let path = f.path().to_str().unwrap().to_string();
        assert!(check_traces(&[path], 3, false).is_err());
    }
}
