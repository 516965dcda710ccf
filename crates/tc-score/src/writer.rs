//! Text output of final histograms: one `<name>.dat` file per scored quantity.
//!
//! ```text
//! # z_cm edep_GeV
//! 0.01 0.0123
//! 0.03 0
//! ```
//!
//! One header line `# <x_label> <y_label>`, then `<bin_center> <value>` per bin
//! in increasing bin order, space separated. Downstream analysis reads these
//! files with no format negotiation, so the layout must not change.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tc_core::{BinValue, Error, Histogram, Result, ResultSink, ScoringSnapshot, format_real};

/// File extension of result files.
pub const RESULT_EXTENSION: &str = "dat";

/// Render one histogram in the result-file format.
pub fn format_histogram<T: BinValue>(h: &Histogram<T>) -> String {
    let mut out = String::with_capacity(32 * (h.n_bins() + 1));
    let _ = writeln!(out, "# {} {}", h.x_label, h.y_label);
    for (i, v) in h.bin_content.iter().enumerate() {
        let _ = writeln!(out, "{} {}", format_real(h.policy.bin_center(i)), v.format_value());
    }
    out
}

/// Path of the result file for histogram `name` under `out_dir`.
pub fn result_path(out_dir: &Path, name: &str) -> PathBuf {
    out_dir.join(format!("{name}.{RESULT_EXTENSION}"))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    let mut f = std::fs::File::create(path).map_err(|e| Error::persistence(path, e))?;
    f.write_all(contents.as_bytes()).map_err(|e| Error::persistence(path, e))?;
    f.sync_all().map_err(|e| Error::persistence(path, e))?;
    Ok(())
}

/// Write every histogram of `snapshot` under `out_dir`, creating the directory if needed.
///
/// Returns the written paths in a fixed order (deposition, then spectrum).
pub fn write_results(snapshot: &ScoringSnapshot, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).map_err(|e| Error::persistence(out_dir, e))?;

    let files = [
        (snapshot.energy_deposition.name.as_str(), format_histogram(&snapshot.energy_deposition)),
        (snapshot.exit_spectrum.name.as_str(), format_histogram(&snapshot.exit_spectrum)),
    ];
    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = result_path(out_dir, name);
        write_file(&path, &contents)?;
        tracing::info!(path = %path.display(), "results written");
        written.push(path);
    }
    Ok(written)
}

/// [`ResultSink`] writing `.dat` text files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatWriter;

impl ResultSink for DatWriter {
    fn write(&self, snapshot: &ScoringSnapshot, out_dir: &Path) -> Result<Vec<PathBuf>> {
        write_results(snapshot, out_dir)
    }

    fn name(&self) -> &str {
        "dat"
    }
}

/// Contents of a result file read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    /// First header label (the binned quantity).
    pub x_label: String,
    /// Second header label (the accumulated quantity).
    pub y_label: String,
    /// `(bin_center, value)` rows in file order.
    pub rows: Vec<(f64, f64)>,
}

impl ResultTable {
    /// Second column, in file order.
    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|&(_, v)| v).collect()
    }
}

/// Parse result-file text. Lines starting with `#` other than the first header are ignored.
pub fn parse_result_table(text: &str) -> Result<ResultTable> {
    let mut labels: Option<(String, String)> = None;
    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('#') {
            if labels.is_none() && rows.is_empty() {
                let mut it = header.split_whitespace();
                if let (Some(x), Some(y)) = (it.next(), it.next()) {
                    labels = Some((x.to_string(), y.to_string()));
                }
            }
            continue;
        }
        let mut cols = line.split_whitespace();
        let (Some(x), Some(y), None) = (cols.next(), cols.next(), cols.next()) else {
            return Err(Error::Config(format!(
                "result line {}: expected two columns, got '{line}'",
                lineno + 1
            )));
        };
        let parse = |s: &str| {
            f64::parse_value(s).ok_or_else(|| {
                Error::Config(format!("result line {}: bad number '{s}'", lineno + 1))
            })
        };
        rows.push((parse(x)?, parse(y)?));
    }
    let (x_label, y_label) =
        labels.ok_or_else(|| Error::Config("result file has no '# x y' header".into()))?;
    Ok(ResultTable { x_label, y_label, rows })
}

/// Read a result file written by [`write_results`].
pub fn read_histogram_file(path: &Path) -> Result<ResultTable> {
    parse_result_table(&std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tc_core::BinningPolicy;

    fn tmp_dir(tag: &str) -> PathBuf {
        let nanos =
            std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("transcore_writer_{}_{}_{}", std::process::id(), nanos, tag))
    }

    fn snapshot() -> ScoringSnapshot {
        let mut edep: Histogram<f64> = Histogram::zeroed(
            "edep_profile",
            "z_cm",
            "edep_GeV",
            BinningPolicy::Linear { min: 0.0, max: 2.0, count: 4 },
        );
        edep.bin_content = vec![0.5, 0.0, 1.25, 3e-7];
        let mut spectrum: Histogram<u64> = Histogram::zeroed(
            "neutron_spectrum",
            "energy_GeV",
            "count",
            BinningPolicy::Logarithmic { min: 1e-11, max: 10.0, count: 2 },
        );
        spectrum.bin_content = vec![3, 7];
        ScoringSnapshot { energy_deposition: edep, exit_spectrum: spectrum }
    }

    #[test]
    fn depth_profile_text() {
        let text = format_histogram(&snapshot().energy_deposition);
        assert_eq!(text, "# z_cm edep_GeV\n0.25 0.5\n0.75 0\n1.25 1.25\n1.75 3e-7\n");
    }

    #[test]
    fn spectrum_uses_geometric_centres() {
        let table = parse_result_table(&format_histogram(&snapshot().exit_spectrum)).unwrap();
        assert_eq!(table.x_label, "energy_GeV");
        assert_eq!(table.y_label, "count");
        assert_eq!(table.values(), vec![3.0, 7.0]);
        assert_relative_eq!(table.rows[0].0, 1e-8, max_relative = 1e-12);
        assert_relative_eq!(table.rows[1].0, 1e-2, max_relative = 1e-12);
    }

    #[test]
    fn writes_both_files_and_creates_directory() {
        let dir = tmp_dir("nested").join("a/b");
        let paths = DatWriter.write(&snapshot(), &dir).unwrap();
        assert_eq!(
            paths,
            vec![dir.join("edep_profile.dat"), dir.join("neutron_spectrum.dat")]
        );
        let edep = read_histogram_file(&paths[0]).unwrap();
        assert_eq!(edep.values(), vec![0.5, 0.0, 1.25, 3e-7]);
        std::fs::remove_dir_all(dir.parent().unwrap().parent().unwrap()).ok();
    }

    #[test]
    fn unwritable_directory_is_a_persistence_error() {
        let blocker = tmp_dir("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let err = write_results(&snapshot(), &blocker.join("out")).unwrap_err();
        assert!(err.is_persistence(), "{err}");
        std::fs::remove_file(&blocker).ok();
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_result_table("0.1 0.2\n").is_err());
        assert!(parse_result_table("# x y\n0.1\n").is_err());
        assert!(parse_result_table("# x y\n0.1 abc\n").is_err());
        assert!(parse_result_table("# x y\n0.1 2 3\n").is_err());
        let t = parse_result_table("# x y\n# comment\n\n1 2\n").unwrap();
        assert_eq!(t.rows, vec![(1.0, 2.0)]);
    }
}
