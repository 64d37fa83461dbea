use crate::{
    constants::{HOMOZYGOUS_CONFIDENCE, MIN_RUN_LENGTH},
    io::bed_reader::{HomozygousRegions, Region},
    utils::util::Result,
};
use std::collections::BTreeMap;

/// A linked run of adjacent positions, keyed by its first position in [`LinkageMap`].
///
/// `confidences` holds one score per adjacent pair, in position order, kept as the
/// literal text of the report so it can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedRun {
    pub end: u64,
    pub confidences: Vec<String>,
}

/// Outcome of adding one adjacent pair to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    Opened,
    Extended,
    Joined,
    AlreadyCovered,
}

/// Linked runs per contig, ordered by contig name and then by start position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkageMap {
    contigs: BTreeMap<String, BTreeMap<u64, LinkedRun>>,
}

impl LinkageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `start` and `start + 1` on `contig` are linked.
    ///
    /// A pair starting where an existing run ends extends that run; a pair ending where
    /// another run starts absorbs it, so chains reported out of order still form one run.
    pub fn add_pair(&mut self, contig: &str, start: u64, confidence: &str) -> Result<PairOutcome> {
        let end = start
            .checked_add(1)
            .ok_or_else(|| crate::mnvx_error!("Linked position {contig}:{start} is out of range"))?;
        let runs = self.contigs.entry(contig.to_string()).or_default();

        let preceding = runs
            .range_mut(..=start)
            .next_back()
            .filter(|(_, run)| run.end >= start);

        let (run_start, mut outcome) = match preceding {
            Some((_, run)) if run.end > start => return Ok(PairOutcome::AlreadyCovered),
            Some((&run_start, run)) => {
                run.end = end;
                run.confidences.push(confidence.to_string());
                (run_start, PairOutcome::Extended)
            }
            None => {
                runs.insert(
                    start,
                    LinkedRun {
                        end,
                        confidences: vec![confidence.to_string()],
                    },
                );
                (start, PairOutcome::Opened)
            }
        };

        if let Some(following) = runs.remove(&end) {
            if let Some(run) = runs.get_mut(&run_start) {
                run.end = following.end;
                run.confidences.extend(following.confidences);
                outcome = PairOutcome::Joined;
            }
        }
        Ok(outcome)
    }

    /// Adds a homozygous region as a run of full-confidence pairs, replacing any run
    /// that starts at the same position.
    pub fn insert_homozygous(&mut self, contig: &str, region: Region) {
        if region.len() < 2 {
            log::debug!(
                "Ignoring single-base homozygous region {contig}:{}",
                region.first
            );
            return;
        }
        let pairs = region.len() - 1;
        let replaced = self.contigs.entry(contig.to_string()).or_default().insert(
            region.first,
            LinkedRun {
                end: region.last,
                confidences: vec![HOMOZYGOUS_CONFIDENCE.to_string(); pairs],
            },
        );
        if replaced.is_some() {
            log::debug!(
                "Homozygous region {contig}:{}-{} replaces a reported run",
                region.first,
                region.last
            );
        }
    }

    pub fn insert_homozygous_regions(&mut self, homozygous: &HomozygousRegions) {
        for (contig, regions) in &homozygous.regions {
            for region in regions {
                self.insert_homozygous(contig, *region);
            }
        }
    }

    pub fn run_starting_at(&self, contig: &str, pos: u64) -> Option<&LinkedRun> {
        self.contigs.get(contig)?.get(&pos)
    }

    /// Longest run in positions, or 1 when the map is empty.
    pub fn max_run_length(&self) -> usize {
        self.iter()
            .map(|(_, start, run)| (run.end - start + 1) as usize)
            .max()
            .unwrap_or(MIN_RUN_LENGTH)
            .max(MIN_RUN_LENGTH)
    }

    pub fn len(&self) -> usize {
        self.contigs.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64, &LinkedRun)> {
        self.contigs.iter().flat_map(|(contig, runs)| {
            runs.iter()
                .map(move |(start, run)| (contig.as_str(), *start, run))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(map: &LinkageMap) -> Vec<(String, u64, u64)> {
        map.iter()
            .map(|(contig, start, run)| (contig.to_string(), start, run.end))
            .collect()
    }

    #[test]
    fn adjacent_pairs_extend_one_run() {
        let mut map = LinkageMap::new();
        assert_eq!(map.add_pair("chr1", 100, "0.9").unwrap(), PairOutcome::Opened);
        assert_eq!(map.add_pair("chr1", 101, "0.8").unwrap(), PairOutcome::Extended);
        assert_eq!(spans(&map), vec![("chr1".to_string(), 100, 102)]);
        assert_eq!(
            map.run_starting_at("chr1", 100).unwrap().confidences,
            vec!["0.9", "0.8"]
        );
        assert_eq!(map.max_run_length(), 3);
    }

    #[test]
    fn out_of_order_pairs_join_into_one_run() {
        let mut map = LinkageMap::new();
        map.add_pair("chr1", 102, "0.7").unwrap();
        map.add_pair("chr1", 100, "0.9").unwrap();
        assert_eq!(map.add_pair("chr1", 101, "0.8").unwrap(), PairOutcome::Joined);
        assert_eq!(spans(&map), vec![("chr1".to_string(), 100, 103)]);
        assert_eq!(
            map.run_starting_at("chr1", 100).unwrap().confidences,
            vec!["0.9", "0.8", "0.7"]
        );
    }

    #[test]
    fn repeated_pair_is_ignored() {
        let mut map = LinkageMap::new();
        map.add_pair("chr1", 100, "0.9").unwrap();
        map.add_pair("chr1", 101, "0.8").unwrap();
        assert_eq!(map.add_pair("chr1", 101, "0.5").unwrap(), PairOutcome::AlreadyCovered);
        assert_eq!(map.run_starting_at("chr1", 100).unwrap().confidences.len(), 2);
    }

    #[test]
    fn separate_contigs_keep_separate_runs() {
        let mut map = LinkageMap::new();
        map.add_pair("chr2", 5, "0.9").unwrap();
        map.add_pair("chr1", 6, "0.9").unwrap();
        assert_eq!(
            spans(&map),
            vec![("chr1".to_string(), 6, 7), ("chr2".to_string(), 5, 6)]
        );
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn homozygous_region_counts_towards_longest_run() {
        let mut map = LinkageMap::new();
        map.add_pair("chr12", 9420710, "0.9").unwrap();
        map.insert_homozygous(
            "chr1",
            Region {
                first: 1627262,
                last: 1627269,
            },
        );
        assert_eq!(map.max_run_length(), 8);
        let run = map.run_starting_at("chr1", 1627262).unwrap();
        assert_eq!(run.end, 1627269);
        assert_eq!(run.confidences, vec![HOMOZYGOUS_CONFIDENCE; 7]);
    }

    #[test]
    fn homozygous_region_replaces_run_with_same_start() {
        let mut map = LinkageMap::new();
        map.add_pair("chr1", 10, "0.4").unwrap();
        map.insert_homozygous("chr1", Region { first: 10, last: 12 });
        let run = map.run_starting_at("chr1", 10).unwrap();
        assert_eq!(run.end, 12);
        assert_eq!(run.confidences, vec!["1.0", "1.0"]);
    }

    #[test]
    fn pair_at_last_representable_position_is_rejected() {
        let mut map = LinkageMap::new();
        let err = map.add_pair("chr1", u64::MAX, "0.9").unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert!(map.is_empty());
    }

    #[test]
    fn empty_map_has_unit_run_length() {
        let map = LinkageMap::new();
        assert!(map.is_empty());
        assert_eq!(map.max_run_length(), 1);
    }
}
