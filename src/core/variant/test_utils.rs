use super::{Allele, FieldValue, SampleCall, VariantRecord};
use std::{
    fs,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

static TEMP_VCF_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn make_temp_vcf(contents: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let counter = TEMP_VCF_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!("mnvx_test_variant_{nanos}_{counter}.vcf"));
    fs::write(&path, contents).unwrap();
    path
}

pub fn snv(contig: &str, pos: u64, reference: &str, alt: &str) -> VariantRecord {
    VariantRecord {
        contig: contig.to_string(),
        pos,
        ids: Vec::new(),
        reference: reference.to_string(),
        alts: vec![Allele::new(reference, alt)],
        qual: None,
        filters: Vec::new(),
        info: Vec::new(),
        format: Vec::new(),
        calls: Vec::new(),
    }
}

pub fn call(sample: &str, data: &[(&str, FieldValue)]) -> SampleCall {
    SampleCall {
        sample: sample.to_string(),
        data: data
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
    }
}

/// SNV with a quality, filters, one `DP` INFO value and a `GT:FAZ` call per sample.
pub fn annotated_snv(
    contig: &str,
    pos: u64,
    bases: (&str, &str),
    qual: Option<f32>,
    filters: &[&str],
    depth: i32,
    genotypes: &[(&str, &str)],
) -> VariantRecord {
    let mut record = snv(contig, pos, bases.0, bases.1);
    record.qual = qual;
    record.filters = filters.iter().map(|f| f.to_string()).collect();
    record.info = vec![("DP".to_string(), FieldValue::integer(depth))];
    if !genotypes.is_empty() {
        record.format = vec!["GT".to_string(), "FAZ".to_string()];
    }
    record.calls = genotypes
        .iter()
        .map(|(sample, gt)| {
            call(
                sample,
                &[
                    ("GT", FieldValue::string(*gt)),
                    ("FAZ", FieldValue::integer(depth / 2)),
                ],
            )
        })
        .collect();
    record
}
