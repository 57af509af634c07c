//! CSV export of a [`ResultBook`]
//!
//! Tables use the pandas `DataFrame.to_csv` layout: the header is an empty
//! cell followed by the trial indices, and each row starts with its episode
//! index. A cell is left empty when a trial has no value for that episode,
//! either because it ran fewer episodes or because no learning pass happened
//! during the episode.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    error::{Error, Result},
    traits::Losses,
};

use super::history::{ResultBook, TrialHistory};

/// Trial index → one cell per episode
pub type Table = BTreeMap<usize, Vec<Option<f64>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LossKind {
    Actor,
    Critic,
    Total,
}

impl LossKind {
    pub const ALL: [LossKind; 3] = [LossKind::Actor, LossKind::Critic, LossKind::Total];

    fn file_stem(self) -> &'static str {
        match self {
            LossKind::Actor => "actor_loss",
            LossKind::Critic => "critic_loss",
            LossKind::Total => "total_loss",
        }
    }

    fn pick(self, losses: &Losses) -> f32 {
        match self {
            LossKind::Actor => losses.actor,
            LossKind::Critic => losses.critic,
            LossKind::Total => losses.total,
        }
    }
}

/// Writes the score table and, for training runs, the three loss tables
#[derive(Clone, Debug)]
pub struct ResultRecorder {
    dir: PathBuf,
    prefix: String,
}

impl ResultRecorder {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn rewards_path(&self, training_mode: bool) -> PathBuf {
        let mode = if training_mode { "train" } else { "test" };
        self.dir.join(format!("{}-rewards-{mode}.csv", self.prefix))
    }

    pub fn loss_path(&self, kind: LossKind) -> PathBuf {
        self.dir
            .join(format!("{}-{}.csv", self.prefix, kind.file_stem()))
    }

    /// Write every table for `book` and return the paths written.
    ///
    /// All tables are rendered before the first file is touched, so a
    /// rendering error leaves nothing behind.
    pub fn export(&self, book: &ResultBook, training_mode: bool) -> Result<Vec<PathBuf>> {
        info!(dir = %self.dir.display(), "storing rewards data");
        let mut tables = vec![(
            self.rewards_path(training_mode),
            render_table(book, |h| h.scores.iter().map(|&s| Some(s)).collect())?,
        )];

        if training_mode {
            info!("storing losses");
            for kind in LossKind::ALL {
                let bytes = render_table(book, |h| {
                    h.losses
                        .iter()
                        .map(|l| l.as_ref().map(|l| f64::from(kind.pick(l))))
                        .collect()
                })?;
                tables.push((self.loss_path(kind), bytes));
            }
        }

        fs::create_dir_all(&self.dir)?;
        let mut written = Vec::with_capacity(tables.len());
        for (path, bytes) in tables {
            fs::write(&path, bytes)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn render_table<F>(book: &ResultBook, column: F) -> Result<Vec<u8>>
where
    F: Fn(&TrialHistory) -> Vec<Option<f64>>,
{
    let columns: Vec<(usize, Vec<Option<f64>>)> =
        book.iter().map(|(&trial, h)| (trial, column(h))).collect();
    let rows = columns.iter().map(|(_, c)| c.len()).max().unwrap_or(0);

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(
        std::iter::once(String::new()).chain(columns.iter().map(|(trial, _)| trial.to_string())),
    )?;
    for row in 0..rows {
        let cells = columns.iter().map(|(_, c)| match c.get(row).copied().flatten() {
            Some(v) => v.to_string(),
            None => String::new(),
        });
        writer.write_record(std::iter::once(row.to_string()).chain(cells))?;
    }
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Read a table written by [`ResultRecorder::export`].
///
/// Every column has one cell per row; shorter trials come back padded with `None`.
pub fn read_table(path: &Path) -> Result<Table> {
    let malformed = |reason: String| Error::MalformedTable {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::Reader::from_path(path)?;
    let trials = reader
        .headers()?
        .iter()
        .skip(1)
        .map(|h| {
            h.parse::<usize>()
                .map_err(|e| malformed(format!("bad trial header {h:?}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut table: Table = trials.iter().map(|&t| (t, Vec::new())).collect();
    for record in reader.records() {
        let record = record?;
        for (trial, cell) in trials.iter().zip(record.iter().skip(1)) {
            let value = if cell.is_empty() {
                None
            } else {
                Some(
                    cell.parse::<f64>()
                        .map_err(|e| malformed(format!("bad cell {cell:?}: {e}")))?,
                )
            };
            table.entry(*trial).or_default().push(value);
        }
    }
    Ok(table)
}

/// Read a rewards table back into per-trial score sequences
pub fn read_scores(path: &Path) -> Result<BTreeMap<usize, Vec<f64>>> {
    Ok(read_table(path)?
        .into_iter()
        .map(|(trial, cells)| (trial, cells.into_iter().map_while(|c| c).collect()))
        .collect())
}
