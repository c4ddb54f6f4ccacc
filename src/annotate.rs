use crate::error::SimulationError;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const ANNOTATED_SUFFIX: &str = ".ant";

/// Rewrites `path` into a sibling `.ant` file where every record is
/// prefixed with the sequence number of the next request for the same
/// object id, or [`crate::record::Request::NO_NEXT_OCCURRENCE`] if none
/// exists. Skips the rewrite if an up-to-date annotated file already
/// exists.
pub fn annotate(path: &str) -> Result<PathBuf, SimulationError> {
    let annotated = annotated_path(path);

    if is_up_to_date(path, &annotated) {
        return Ok(annotated);
    }

    let input = fs::File::open(path).map_err(|e| SimulationError::TraceOpen {
        path: path.to_string(),
        source: e,
    })?;
    let reader = BufReader::new(input);

    let mut next_occurrence: HashMap<i64, Vec<u64>> = HashMap::new();
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let seq = lines.len() as u64;
        let id: i64 = line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| SimulationError::SanityCheck(format!("malformed record in {}", path)))?
            .parse()
            .map_err(|_| SimulationError::SanityCheck(format!("non-numeric id in {}", path)))?;
        next_occurrence.entry(id).or_default().push(seq);
        lines.push(line);
    }

    // for each id, reverse so pop() yields occurrences in ascending seq order
    let mut cursors: HashMap<i64, Vec<u64>> = next_occurrence
        .into_iter()
        .map(|(id, mut seqs)| {
            seqs.reverse();
            (id, seqs)
        })
        .collect();

    let mut out = fs::File::create(&annotated)?;
    for (seq, line) in lines.into_iter().enumerate() {
        let mut fields = line.split_whitespace();
        let t = fields.next().unwrap();
        let id_str = fields.next().unwrap();
        let id: i64 = id_str.parse().unwrap();
        let rest: Vec<&str> = fields.collect();

        let occurrences = cursors.get_mut(&id).unwrap();
        // the current record's own seq is at the top of the stack
        debug_assert_eq!(occurrences.pop(), Some(seq as u64));
        let next_seq = occurrences
            .last()
            .copied()
            .map(|s| s as i64)
            .unwrap_or(crate::record::Request::NO_NEXT_OCCURRENCE);

        write!(out, "{} {} {} {}", next_seq, t, id_str, rest.join(" "))?;
        writeln!(out)?;
    }

    Ok(annotated)
}

fn annotated_path(path: &str) -> PathBuf {
    let mut p = PathBuf::from(path);
    let file_name = p
        .file_name()
        .map(|n| format!("{}{}", n.to_string_lossy(), ANNOTATED_SUFFIX))
        .unwrap_or_else(|| ANNOTATED_SUFFIX.to_string());
    p.set_file_name(file_name);
    p
}

fn is_up_to_date(source: &str, annotated: &Path) -> bool {
    let (Ok(src_meta), Ok(ant_meta)) = (fs::metadata(source), fs::metadata(annotated)) else {
        return false;
    };
    let (Ok(src_mtime), Ok(ant_mtime)) = (src_meta.modified(), ant_meta.modified()) else {
        return false;
    };
    ant_mtime >= src_mtime
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn annotates_next_occurrence() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "0 1 10").unwrap();
        writeln!(f, "1 2 10").unwrap();
        writeln!(f, "2 1 10").unwrap();
        f.flush().unwrap();

        let path = f.path().to_str().unwrap().to_string();
        let annotated = annotate(&path).unwrap();
        let content = fs::read_to_string(&annotated).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "2 0 1 10");
        assert_eq!(
            lines[1],
            format!("{} 1 2 10", crate::record::Request::NO_NEXT_OCCURRENCE)
        );
        assert_eq!(
            lines[2],
            format!("{} 2 1 10", crate::record::Request::NO_NEXT_OCCURRENCE)
        );

        fs::remove_file(annotated).ok();
    }
}
