use super::{bed_reader::HomozygousRegions, readers::open_text_reader};
use crate::{
    constants::{LINKAGE_FIELD_COUNT, LINKAGE_REPORT_TERMINATOR, UNPHASED_FIELD_COUNT},
    core::linkage_map::{LinkageMap, PairOutcome},
    error::MnvxError,
    utils::util::Result,
};
use std::{io::BufRead, path::Path};

/// A position token of the report, `contig-position-rest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteToken<'a> {
    pub contig: &'a str,
    pub pos: u64,
}

impl<'a> SiteToken<'a> {
    pub fn parse(token: &'a str) -> std::result::Result<Self, String> {
        let mut parts = token.splitn(3, '-');
        let contig = parts
            .next()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| format!("missing contig in token '{token}'"))?;
        let pos = parts
            .next()
            .ok_or_else(|| format!("missing position in token '{token}'"))?
            .parse::<u64>()
            .map_err(|e| format!("invalid position in token '{token}': {e}"))?;
        Ok(SiteToken { contig, pos })
    }
}

/// One accepted-or-rejected linkage record.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkageLine<'a> {
    pub run_id: &'a str,
    pub start: SiteToken<'a>,
    pub end: SiteToken<'a>,
    pub flag: u32,
    pub confidence: f64,
    pub confidence_text: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportLine<'a> {
    Blank,
    Terminator,
    Unphased,
    Linkage(LinkageLine<'a>),
}

pub fn parse_report_line(line_number: usize, line: &str) -> Result<ReportLine<'_>> {
    if line.trim().is_empty() {
        return Ok(ReportLine::Blank);
    }
    if line.starts_with(LINKAGE_REPORT_TERMINATOR) {
        return Ok(ReportLine::Terminator);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() == UNPHASED_FIELD_COUNT {
        return Ok(ReportLine::Unphased);
    }
    let [run_id, start, end, flag, confidence] = fields[..] else {
        return Err(MnvxError::malformed_linkage_line(
            line_number,
            line,
            format!(
                "expected {LINKAGE_FIELD_COUNT} fields, found {}",
                fields.len()
            ),
        ));
    };

    let malformed = |cause: String| MnvxError::malformed_linkage_line(line_number, line, cause);
    let start = SiteToken::parse(start).map_err(malformed)?;
    let end = SiteToken::parse(end).map_err(malformed)?;
    let flag_value = flag
        .parse::<u32>()
        .map_err(|e| malformed(format!("invalid flag '{flag}': {e}")))?;
    let confidence_value = confidence
        .parse::<f64>()
        .map_err(|e| malformed(format!("invalid confidence '{confidence}': {e}")))?;

    Ok(ReportLine::Linkage(LinkageLine {
        run_id,
        start,
        end,
        flag: flag_value,
        confidence: confidence_value,
        confidence_text: confidence,
    }))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkageReportStats {
    pub lines: usize,
    pub accepted: usize,
    pub below_cutoff: usize,
    pub excluded_by_flag: usize,
    pub non_adjacent: usize,
    pub unphased: usize,
}

/// Parses a phasing report into a [`LinkageMap`] and the longest run length.
///
/// Pairs scoring below `cutoff`, or whose flag shares a bit with `exclude_mask`, are
/// skipped; homozygous regions, when given, are added as full-confidence runs.
pub fn parse_linkage_report(
    path: &Path,
    cutoff: f64,
    exclude_mask: u32,
    homozygous: Option<&HomozygousRegions>,
) -> Result<(LinkageMap, usize)> {
    let reader = open_text_reader(path)?;
    let mut map = LinkageMap::new();
    let mut stats = LinkageReportStats::default();

    for (line_index, result_line) in reader.lines().enumerate() {
        let line_number = line_index + 1;
        let line = result_line.map_err(|e| {
            crate::mnvx_error!("Error at linkage report line {line_number}: {e}")
        })?;
        stats.lines += 1;

        let record = match parse_report_line(line_number, &line)? {
            ReportLine::Blank => continue,
            ReportLine::Terminator => {
                log::debug!("Linkage report terminated at line {line_number}");
                break;
            }
            ReportLine::Unphased => {
                log::debug!("Skipping unphased marker at line {line_number}: {line}");
                stats.unphased += 1;
                continue;
            }
            ReportLine::Linkage(record) => record,
        };

        if record.confidence < cutoff {
            log::debug!(
                "Skipping {} at line {line_number}: confidence {} below cutoff {cutoff}",
                record.run_id,
                record.confidence_text
            );
            stats.below_cutoff += 1;
            continue;
        }
        if record.flag & exclude_mask != 0 {
            log::debug!(
                "Skipping {} at line {line_number}: flag {} matches exclude mask {exclude_mask}",
                record.run_id,
                record.flag
            );
            stats.excluded_by_flag += 1;
            continue;
        }
        let next_pos = record.start.pos.checked_add(1).ok_or_else(|| {
            MnvxError::malformed_linkage_line(
                line_number,
                &line,
                format!("position {} is out of range", record.start.pos),
            )
        })?;
        if record.start.contig != record.end.contig || next_pos != record.end.pos {
            log::debug!(
                "Skipping {} at line {line_number}: {}:{} and {}:{} are not adjacent",
                record.run_id,
                record.start.contig,
                record.start.pos,
                record.end.contig,
                record.end.pos
            );
            stats.non_adjacent += 1;
            continue;
        }

        match map.add_pair(
            record.start.contig,
            record.start.pos,
            record.confidence_text,
        )? {
            PairOutcome::AlreadyCovered => log::debug!(
                "Skipping {} at line {line_number}: pair already linked",
                record.run_id
            ),
            _ => stats.accepted += 1,
        }
    }

    if let Some(homozygous) = homozygous {
        map.insert_homozygous_regions(homozygous);
    }

    let max_run_length = map.max_run_length();
    log::info!(
        "Linkage report {}: {} pair(s) accepted into {} run(s), longest run {max_run_length}",
        path.display(),
        stats.accepted,
        map.len()
    );
    log::debug!("Linkage report statistics: {stats:?}");
    Ok((map, max_run_length))
}
