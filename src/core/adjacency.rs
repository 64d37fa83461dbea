use crate::{
    constants::HOMOZYGOUS_MARKER,
    core::variant::{VariantRecord, Zygosity},
    error::MnvxError,
    utils::util::Result,
};
use std::fmt;

/// A candidate region: `start` is 0-based, `end` is the last 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedWindow {
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub homozygous: bool,
}

impl fmt::Display for BedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.contig, self.start, self.end)?;
        if self.homozygous {
            write!(f, "\t{HOMOZYGOUS_MARKER}")?;
        }
        Ok(())
    }
}

struct Stretch {
    contig: String,
    first: u64,
    last: u64,
    zygosity: Option<Zygosity>,
}

impl Stretch {
    fn len(&self) -> u64 {
        self.last - self.first + 1
    }
}

/// Emits one [`BedWindow`] per maximal run of at least two adjacent records.
///
/// With `mark_homozygous`, runs also break where the designated sample's zygosity
/// changes, and wholly homozygous runs are marked.
pub struct AdjacencyProjector {
    mark_homozygous: bool,
    sample: String,
    current: Option<Stretch>,
    windows: usize,
}

impl AdjacencyProjector {
    pub fn new(mark_homozygous: bool, sample: impl Into<String>) -> Self {
        AdjacencyProjector {
            mark_homozygous,
            sample: sample.into(),
            current: None,
            windows: 0,
        }
    }

    pub fn windows_emitted(&self) -> usize {
        self.windows
    }

    fn zygosity(&self, record: &VariantRecord) -> Result<Option<Zygosity>> {
        if !self.mark_homozygous {
            return Ok(None);
        }
        let call = record
            .call(&self.sample)
            .ok_or_else(|| MnvxError::UnresolvedSample {
                sample: self.sample.clone(),
            })?;
        // An uncalled genotype is never treated as homozygous.
        Ok(Some(call.zygosity().unwrap_or(Zygosity::Heterozygous)))
    }

    fn close(&mut self, stretch: Stretch) -> Option<BedWindow> {
        if stretch.len() < 2 {
            return None;
        }
        self.windows += 1;
        Some(BedWindow {
            contig: stretch.contig,
            start: stretch.first - 1,
            end: stretch.last,
            homozygous: self.mark_homozygous && stretch.zygosity == Some(Zygosity::Homozygous),
        })
    }

    /// Feeds the next record; returns the window closed by it, if any.
    pub fn push(&mut self, record: &VariantRecord) -> Result<Option<BedWindow>> {
        let zygosity = self.zygosity(record)?;
        if let Some(stretch) = self.current.as_mut() {
            if stretch.contig == record.contig
                && record.pos == stretch.last + 1
                && stretch.zygosity == zygosity
            {
                stretch.last = record.pos;
                return Ok(None);
            }
        }

        let next = Stretch {
            contig: record.contig.clone(),
            first: record.pos,
            last: record.pos,
            zygosity,
        };
        Ok(self
            .current
            .replace(next)
            .and_then(|stretch| self.close(stretch)))
    }

    pub fn finish(&mut self) -> Option<BedWindow> {
        self.current.take().and_then(|stretch| self.close(stretch))
    }
}

/// Projects a whole record stream into candidate windows.
pub fn project<I, R>(records: I, mark_homozygous: bool, sample: &str) -> Result<Vec<BedWindow>>
where
    I: IntoIterator<Item = Result<R>>,
    R: AsRef<VariantRecord>,
{
    let mut projector = AdjacencyProjector::new(mark_homozygous, sample);
    let mut windows = Vec::new();
    for record in records {
        if let Some(window) = projector.push(record?.as_ref())? {
            windows.push(window);
        }
    }
    windows.extend(projector.finish());
    Ok(windows)
}
