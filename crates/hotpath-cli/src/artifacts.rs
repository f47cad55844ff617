//! Run artifact files: projections, latency samples, and counters.
//!
//! Artifacts are plain CSVs so downstream tooling can diff baseline and
//! shedding runs. Projection files preserve duplicates and emission order;
//! recall is computed over the deduplicated set.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use hotpath_core::Projection;
use rustc_hash::FxHashSet;
use std::path::Path;

/// Write projections with the standard header, one row per emitted match.
pub fn write_projection_csv(path: &Path, projections: &[Projection]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating projection csv {}", path.display()))?;
    writer.write_record(["a1_start", "last_a_end", "b_end"])?;
    for p in projections {
        writer.write_record([
            p.a1_start.to_string(),
            p.last_a_end.to_string(),
            p.b_end.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a projection CSV into the set recall is computed over.
pub fn read_projection_set(path: &Path) -> Result<FxHashSet<Projection>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening projection csv {}", path.display()))?;

    let mut projections = FxHashSet::default();
    for record in reader.records() {
        let record = record?;
        if record.len() < 3 {
            anyhow::bail!("projection row has {} columns, expected 3", record.len());
        }
        let parse = |idx: usize| -> Result<u32> {
            record[idx]
                .trim()
                .parse::<u32>()
                .with_context(|| format!("bad projection value {:?}", &record[idx]))
        };
        projections.insert(Projection {
            a1_start: parse(0)?,
            last_a_end: parse(1)?,
            b_end: parse(2)?,
        });
    }
    Ok(projections)
}

/// One `delay_ms` row per sample, three decimal places.
pub fn write_latency_csv(path: &Path, delays_ms: &[f64]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating latency csv {}", path.display()))?;
    writer.write_record(["delay_ms"])?;
    for value in delays_ms {
        writer.write_record([format!("{value:.3}")])?;
    }
    writer.flush()?;
    Ok(())
}

/// `name,value` rows, sorted by name.
pub fn write_counters_csv(path: &Path, counters: &[(&str, u64)]) -> Result<()> {
    let mut sorted = counters.to_vec();
    sorted.sort_by_key(|(name, _)| *name);

    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating counters csv {}", path.display()))?;
    writer.write_record(["name", "value"])?;
    for (name, value) in sorted {
        writer.write_record([name.to_string(), value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proj(a: u32, b: u32, c: u32) -> Projection {
        Projection {
            a1_start: a,
            last_a_end: b,
            b_end: c,
        }
    }

    #[test]
    fn test_projection_roundtrip_dedupes_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projections.csv");
        let rows = vec![proj(1, 2, 3), proj(4, 5, 6), proj(1, 2, 3)];
        write_projection_csv(&path, &rows).unwrap();

        let set = read_projection_set(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&proj(1, 2, 3)));
        assert!(set.contains(&proj(4, 5, 6)));

        // Duplicates and order are preserved on disk.
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "a1_start,last_a_end,b_end");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "1,2,3");
        assert_eq!(lines[3], "1,2,3");
    }

    #[test]
    fn test_empty_projection_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projections.csv");
        write_projection_csv(&path, &[]).unwrap();
        assert!(read_projection_set(&path).unwrap().is_empty());
    }

    #[test]
    fn test_latency_csv_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latency.csv");
        write_latency_csv(&path, &[0.5, 12.3456]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec![
            "delay_ms",
            "0.500",
            "12.346"
        ]);
    }

    #[test]
    fn test_counters_csv_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.csv");
        write_counters_csv(&path, &[("matches", 2), ("dropped", 1), ("ingested", 3)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec![
            "name,value",
            "dropped,1",
            "ingested,3",
            "matches,2"
        ]);
    }

    #[test]
    fn test_bad_projection_value_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projections.csv");
        std::fs::write(&path, "a1_start,last_a_end,b_end\n1,x,3\n").unwrap();
        assert!(read_projection_set(&path).is_err());
    }
}
