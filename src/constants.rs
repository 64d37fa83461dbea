pub const DEFAULT_CUTOFF: f64 = 0.0;
pub const DEFAULT_EXCLUDE_FLAGS: u32 = 2; // trans-phased
pub const DEFAULT_MERGED_OUTPUT: &str = "output.MNV.vcf";
pub const DEFAULT_ZYGOSITY_SAMPLE: &str = "TUMOUR";
pub const DEFAULT_MARK_HOMOZYGOUS: bool = false;

/// INFO tag carrying the per-base phasing confidences of a merged MNV.
pub const SPCONF_TAG: &str = "SPCONF";
pub const SPCONF_DESCRIPTION: &str =
    "Smart-Phase confidence scores for each adjacent pair in the MNV, in the form score_MNV_base_1to2,score_MNV_base_2to3,...";

pub const MNV_ALLELE_KIND: &str = "MNV";
pub const HOMOZYGOUS_CONFIDENCE: &str = "1.0";
pub const HOMOZYGOUS_MARKER: &str = "hom";

pub const PROCESS_LOG_KEY: &str = "vcfProcessLog";

/// Lines starting with this marker end the linkage report.
pub const LINKAGE_REPORT_TERMINATOR: &str = "Phasing finished";

/// Field count of a linkage report record and of an unphased marker line.
pub const LINKAGE_FIELD_COUNT: usize = 5;
pub const UNPHASED_FIELD_COUNT: usize = 2;

/// Shortest run length reported when the linkage report yields no runs.
pub const MIN_RUN_LENGTH: usize = 1;
