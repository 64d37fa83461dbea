use crate::{
    constants::SPCONF_TAG,
    core::{
        linkage_map::LinkageMap,
        variant::{Allele, AlleleKind, FieldValue, SampleCall, VariantRecord},
    },
    utils::util::Result,
};
use std::collections::VecDeque;

#[derive(Debug)]
pub enum MergedItem<R> {
    Passthrough(R),
    Mnv(VariantRecord),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    pub records_read: usize,
    pub records_passed_through: usize,
    pub runs_merged: usize,
    pub records_merged: usize,
    pub runs_abandoned: usize,
    pub longest_run: usize,
}

struct OpenRun<R> {
    contig: String,
    start: u64,
    end: u64,
    last_pos: u64,
    confidences: Vec<String>,
    records: Vec<R>,
}

/// Folds linked runs of a position-sorted record stream into single MNV records.
///
/// Records outside every run are yielded unchanged and in order. A run that cannot be
/// completed (contig change, skipped position or end of input) releases its records
/// unchanged.
pub struct MnvMerger<'a, I, R> {
    records: I,
    linkage: &'a LinkageMap,
    open: Option<OpenRun<R>>,
    released: VecDeque<R>,
    stats: MergeStats,
    exhausted: bool,
}

impl<'a, I, R> MnvMerger<'a, I, R>
where
    I: Iterator<Item = Result<R>>,
    R: AsRef<VariantRecord>,
{
    pub fn new(records: I, linkage: &'a LinkageMap) -> Self {
        MnvMerger {
            records,
            linkage,
            open: None,
            released: VecDeque::new(),
            stats: MergeStats::default(),
            exhausted: false,
        }
    }

    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    fn abandon(&mut self, run: OpenRun<R>, reason: &str) {
        log::warn!(
            "Abandoning linked run {}:{}-{} after {} record(s): {reason}",
            run.contig,
            run.start,
            run.end,
            run.records.len()
        );
        self.stats.runs_abandoned += 1;
        self.released.extend(run.records);
    }

    fn close(&mut self, run: OpenRun<R>) -> Result<VariantRecord> {
        let records: Vec<&VariantRecord> = run.records.iter().map(AsRef::as_ref).collect();
        let merged = merge_run(&records, &run.confidences)?;
        self.stats.runs_merged += 1;
        self.stats.records_merged += records.len();
        self.stats.longest_run = self.stats.longest_run.max(records.len());
        Ok(merged)
    }

    /// Feeds one record through the state machine. Returns a merged record when it closes a run.
    fn process(&mut self, record: R) -> Option<Result<VariantRecord>> {
        if let Some(mut run) = self.open.take() {
            let variant = record.as_ref();
            if variant.contig == run.contig && variant.pos == run.last_pos + 1 {
                run.last_pos = variant.pos;
                run.records.push(record);
                if run.last_pos == run.end {
                    return Some(self.close(run));
                }
                self.open = Some(run);
                return None;
            }
            let reason = if variant.contig != run.contig {
                format!("next record is on {}", variant.contig)
            } else {
                format!("next record is at {}", variant.pos)
            };
            self.abandon(run, &reason);
        }

        let variant = record.as_ref();
        if let Some(linked) = self.linkage.run_starting_at(&variant.contig, variant.pos) {
            self.open = Some(OpenRun {
                contig: variant.contig.clone(),
                start: variant.pos,
                end: linked.end,
                last_pos: variant.pos,
                confidences: linked.confidences.clone(),
                records: vec![record],
            });
        } else {
            self.released.push_back(record);
        }
        None
    }
}

impl<I, R> Iterator for MnvMerger<'_, I, R>
where
    I: Iterator<Item = Result<R>>,
    R: AsRef<VariantRecord>,
{
    type Item = Result<MergedItem<R>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.released.pop_front() {
                self.stats.records_passed_through += 1;
                return Some(Ok(MergedItem::Passthrough(record)));
            }
            if self.exhausted {
                return None;
            }
            match self.records.next() {
                Some(Ok(record)) => {
                    self.stats.records_read += 1;
                    if let Some(merged) = self.process(record) {
                        return Some(merged.map(MergedItem::Mnv));
                    }
                }
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                None => {
                    self.exhausted = true;
                    if let Some(run) = self.open.take() {
                        self.abandon(run, "end of input");
                    }
                }
            }
        }
    }
}

fn suffixed(key: &str, n: usize) -> String {
    format!("{key}_{n}")
}

/// Builds one MNV record from the ordered records of a linked run.
pub fn merge_run(records: &[&VariantRecord], confidences: &[String]) -> Result<VariantRecord> {
    let first = records
        .first()
        .ok_or_else(|| crate::mnvx_error!("Cannot merge an empty run"))?;

    let mut reference = String::with_capacity(records.len());
    let mut alt = String::with_capacity(records.len());
    let mut info = Vec::new();
    let mut format = Vec::new();
    let mut calls: Vec<SampleCall> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let n = idx + 1;
        let first_alt = record.first_alt().ok_or_else(|| {
            crate::mnvx_error!(
                "Record {}:{} in a linked run has no ALT allele",
                record.contig,
                record.pos
            )
        })?;
        reference.push_str(&record.reference);
        alt.push_str(&first_alt.value);

        format.extend(record.format.iter().map(|key| suffixed(key, n)));
        info.extend(
            record
                .info
                .iter()
                .map(|(key, value)| (suffixed(key, n), value.clone())),
        );

        for call in &record.calls {
            let data = call
                .data
                .iter()
                .map(|(key, value)| (suffixed(key, n), value.clone()));
            match calls.iter_mut().find(|c| c.sample == call.sample) {
                Some(merged) => merged.data.extend(data),
                None => calls.push(SampleCall {
                    sample: call.sample.clone(),
                    data: data.collect(),
                }),
            }
        }
    }

    let qual = match first.qual {
        Some(_) => {
            let quals: Vec<f32> = records.iter().filter_map(|r| r.qual).collect();
            let mean = quals.iter().sum::<f32>() / quals.len() as f32;
            log::debug!(
                "MNV at {}:{} takes the mean QUAL {mean} of {} record(s)",
                first.contig,
                first.pos,
                quals.len()
            );
            Some(mean)
        }
        None => None,
    };

    let filters = if records.iter().any(|r| !r.filters.is_empty()) {
        if records.iter().all(|r| r.filters == ["PASS"]) {
            vec!["PASS".to_string()]
        } else {
            log::debug!(
                "MNV at {}:{} concatenates the FILTERs of {} record(s)",
                first.contig,
                first.pos,
                records.len()
            );
            records.iter().flat_map(|r| r.filters.clone()).collect()
        }
    } else {
        Vec::new()
    };

    info.push((
        SPCONF_TAG.to_string(),
        FieldValue::string(confidences.join(",")),
    ));

    Ok(VariantRecord {
        contig: first.contig.clone(),
        pos: first.pos,
        ids: first.ids.clone(),
        reference,
        alts: vec![Allele {
            kind: AlleleKind::Mnv,
            value: alt,
        }],
        qual,
        filters,
        info,
        format,
        calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variant::test_utils::{annotated_snv, snv};
    use approx::assert_relative_eq;

    fn linkage(runs: &[(&str, u64, u64)]) -> LinkageMap {
        let mut map = LinkageMap::new();
        for (contig, start, end) in runs {
            for pos in *start..*end {
                map.add_pair(contig, pos, "0.9").unwrap();
            }
        }
        map
    }

    fn run_merger(
        records: Vec<VariantRecord>,
        map: &LinkageMap,
    ) -> (Vec<MergedItem<VariantRecord>>, MergeStats) {
        let mut merger = MnvMerger::new(records.into_iter().map(Ok), map);
        let items = merger
            .by_ref()
            .collect::<Result<Vec<_>>>()
            .expect("merge should succeed");
        (items, merger.stats().clone())
    }

    fn describe(items: &[MergedItem<VariantRecord>]) -> Vec<String> {
        items
            .iter()
            .map(|item| match item {
                MergedItem::Passthrough(r) => format!("{}:{}", r.contig, r.pos),
                MergedItem::Mnv(r) => format!("MNV {}:{} {}>{}", r.contig, r.pos, r.reference, r.alts[0].value),
            })
            .collect()
    }

    #[test]
    fn records_outside_runs_pass_through_in_order() {
        let records = vec![
            snv("chr1", 5, "A", "C"),
            snv("chr2", 100, "G", "T"),
            snv("chr1", 200, "T", "A"),
        ];
        let map = linkage(&[("chr1", 100, 101)]);
        let (items, stats) = run_merger(records.clone(), &map);
        let passed: Vec<VariantRecord> = items
            .into_iter()
            .map(|item| match item {
                MergedItem::Passthrough(r) => r,
                MergedItem::Mnv(_) => panic!("unexpected MNV"),
            })
            .collect();
        assert_eq!(passed, records);
        assert_eq!(stats.records_passed_through, 3);
        assert_eq!(stats.runs_merged, 0);
    }

    #[test]
    fn covered_run_becomes_one_mnv() {
        let records = vec![
            snv("chr1", 99, "C", "G"),
            snv("chr1", 100, "A", "C"),
            snv("chr1", 101, "G", "T"),
            snv("chr1", 102, "T", "A"),
            snv("chr1", 103, "C", "A"),
        ];
        let map = linkage(&[("chr1", 100, 102)]);
        let (items, stats) = run_merger(records, &map);
        assert_eq!(
            describe(&items),
            vec!["chr1:99", "MNV chr1:100 AGT>CTA", "chr1:103"]
        );
        assert_eq!(stats.runs_merged, 1);
        assert_eq!(stats.records_merged, 3);
        assert_eq!(stats.longest_run, 3);
        assert_eq!(stats.records_read, 5);

        let MergedItem::Mnv(mnv) = &items[1] else {
            panic!("expected MNV");
        };
        assert_eq!(mnv.alts[0].kind, AlleleKind::Mnv);
        assert_eq!(mnv.info(SPCONF_TAG), Some(&FieldValue::string("0.9,0.9")));
    }

    #[test]
    fn incomplete_run_is_released_unchanged() {
        let records = vec![
            snv("chr1", 100, "A", "C"),
            snv("chr1", 101, "G", "T"),
            snv("chr1", 105, "T", "A"),
        ];
        let map = linkage(&[("chr1", 100, 102)]);
        let (items, stats) = run_merger(records, &map);
        assert_eq!(describe(&items), vec!["chr1:100", "chr1:101", "chr1:105"]);
        assert_eq!(stats.runs_abandoned, 1);
        assert_eq!(stats.runs_merged, 0);
    }

    #[test]
    fn gap_inside_run_releases_records() {
        let records = vec![snv("chr1", 100, "A", "C"), snv("chr1", 102, "T", "A")];
        let map = linkage(&[("chr1", 100, 102)]);
        let (items, stats) = run_merger(records, &map);
        assert_eq!(describe(&items), vec!["chr1:100", "chr1:102"]);
        assert_eq!(stats.runs_abandoned, 1);
        assert_eq!(stats.runs_merged, 0);
        assert_eq!(stats.records_passed_through, 2);
    }

    #[test]
    fn repeated_position_restarts_run() {
        let records = vec![
            snv("chr1", 100, "A", "C"),
            snv("chr1", 100, "A", "G"),
            snv("chr1", 101, "G", "T"),
        ];
        let map = linkage(&[("chr1", 100, 101)]);
        let (items, stats) = run_merger(records, &map);
        assert_eq!(describe(&items), vec!["chr1:100", "MNV chr1:100 AG>GT"]);
        assert_eq!(stats.runs_abandoned, 1);
        assert_eq!(stats.runs_merged, 1);
    }

    #[test]
    fn run_open_at_end_of_input_is_released() {
        let records = vec![snv("chr1", 100, "A", "C")];
        let map = linkage(&[("chr1", 100, 101)]);
        let (items, stats) = run_merger(records, &map);
        assert_eq!(describe(&items), vec!["chr1:100"]);
        assert_eq!(stats.runs_abandoned, 1);
    }

    #[test]
    fn contig_change_abandons_run_and_reprocesses_record() {
        let records = vec![
            snv("chr1", 100, "A", "C"),
            snv("chr2", 10, "G", "T"),
            snv("chr2", 11, "T", "A"),
        ];
        let map = linkage(&[("chr1", 100, 101), ("chr2", 10, 11)]);
        let (items, _) = run_merger(records, &map);
        assert_eq!(describe(&items), vec!["chr1:100", "MNV chr2:10 GT>TA"]);
    }

    #[test]
    fn run_start_inside_open_run_does_not_interrupt_it() {
        let records = vec![
            snv("chr1", 100, "A", "C"),
            snv("chr1", 101, "G", "T"),
            snv("chr1", 102, "T", "A"),
            snv("chr1", 103, "C", "G"),
        ];
        let mut map = linkage(&[("chr1", 100, 102)]);
        map.insert_homozygous(
            "chr1",
            crate::io::bed_reader::Region {
                first: 101,
                last: 103,
            },
        );
        let (items, _) = run_merger(records, &map);
        assert_eq!(describe(&items), vec!["MNV chr1:100 AGT>CTA", "chr1:103"]);
    }

    #[test]
    fn merged_fields_are_suffixed_by_run_order() {
        let samples = [("NORMAL", "0|0"), ("TUMOUR", "0|1")];
        let first = annotated_snv("chr1", 100, ("A", "C"), Some(10.0), &[], 10, &samples);
        let second = annotated_snv("chr1", 101, ("G", "T"), Some(20.0), &[], 20, &samples);
        let third = annotated_snv("chr1", 102, ("T", "A"), Some(30.0), &[], 30, &samples);
        let merged = merge_run(
            &[&first, &second, &third],
            &["0.9".to_string(), "0.8".to_string()],
        )
        .unwrap();

        let info_keys: Vec<&str> = merged.info.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(info_keys, vec!["DP_1", "DP_2", "DP_3", SPCONF_TAG]);
        assert_eq!(merged.info("DP_2"), Some(&FieldValue::integer(20)));
        assert_eq!(
            merged.format,
            vec!["GT_1", "FAZ_1", "GT_2", "FAZ_2", "GT_3", "FAZ_3"]
        );

        assert_eq!(merged.calls.len(), 2);
        let tumour = merged.call("TUMOUR").unwrap();
        let keys: Vec<&str> = tumour.data.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["GT_1", "FAZ_1", "GT_2", "FAZ_2", "GT_3", "FAZ_3"]);
        assert_eq!(tumour.get("FAZ_3"), Some(&FieldValue::integer(15)));
        assert_eq!(tumour.get("GT_2"), Some(&FieldValue::string("0|1")));

        let mut seen = std::collections::HashSet::new();
        assert!(merged.info.iter().all(|(k, _)| seen.insert(k.clone())));
        assert_eq!(merged.info(SPCONF_TAG), Some(&FieldValue::string("0.9,0.8")));
    }

    #[test]
    fn merged_quality_is_the_mean() {
        let first = annotated_snv("chr1", 100, ("A", "C"), Some(10.0), &[], 1, &[]);
        let second = annotated_snv("chr1", 101, ("G", "T"), Some(25.0), &[], 1, &[]);
        let third = annotated_snv("chr1", 102, ("T", "A"), Some(40.0), &[], 1, &[]);
        let merged = merge_run(&[&first, &second, &third], &[]).unwrap();
        assert_relative_eq!(merged.qual.unwrap(), 25.0);

        let no_qual = snv("chr1", 100, "A", "C");
        let merged = merge_run(&[&no_qual, &second], &[]).unwrap();
        assert_eq!(merged.qual, None);
    }

    #[test]
    fn all_pass_filters_collapse() {
        let first = annotated_snv("chr1", 100, ("A", "C"), None, &["PASS"], 1, &[]);
        let second = annotated_snv("chr1", 101, ("G", "T"), None, &["PASS"], 1, &[]);
        let merged = merge_run(&[&first, &second], &[]).unwrap();
        assert_eq!(merged.filters, vec!["PASS"]);
    }

    #[test]
    fn mixed_filters_concatenate_in_order() {
        let first = annotated_snv("chr1", 100, ("A", "C"), None, &["PASS"], 1, &[]);
        let second = annotated_snv("chr1", 101, ("G", "T"), None, &["LowQ", "DTH"], 1, &[]);
        let third = annotated_snv("chr1", 102, ("T", "A"), None, &[], 1, &[]);
        let merged = merge_run(&[&first, &second, &third], &[]).unwrap();
        assert_eq!(merged.filters, vec!["PASS", "LowQ", "DTH"]);

        let unfiltered = snv("chr1", 100, "A", "C");
        let merged = merge_run(&[&unfiltered, &third], &[]).unwrap();
        assert!(merged.filters.is_empty());
    }

    #[test]
    fn merged_record_keeps_first_position_and_id() {
        let mut first = snv("chr1", 100, "A", "C");
        first.ids = vec!["rs1".to_string()];
        let mut second = snv("chr1", 101, "G", "T");
        second.ids = vec!["rs2".to_string()];
        let merged = merge_run(&[&first, &second], &["0.5".to_string()]).unwrap();
        assert_eq!(merged.contig, "chr1");
        assert_eq!(merged.pos, 100);
        assert_eq!(merged.ids, vec!["rs1"]);
        assert_eq!(merged.reference, "AG");
        assert_eq!(merged.alts.len(), 1);
        assert_eq!(merged.alts[0].value, "CT");
    }

    #[test]
    fn read_error_stops_the_stream() {
        let map = LinkageMap::new();
        let records: Vec<Result<VariantRecord>> = vec![
            Ok(snv("chr1", 1, "A", "C")),
            Err(crate::mnvx_error!("broken record")),
            Ok(snv("chr1", 3, "A", "C")),
        ];
        let mut merger = MnvMerger::new(records.into_iter(), &map);
        assert!(matches!(merger.next(), Some(Ok(MergedItem::Passthrough(_)))));
        assert!(matches!(merger.next(), Some(Err(_))));
        assert!(merger.next().is_none());
    }
}
