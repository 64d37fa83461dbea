pub mod vcf;

#[cfg(test)]
pub mod test_utils;

use crate::constants::MNV_ALLELE_KIND;
use std::fmt;

/// Substitution kind of an alternate allele.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlleleKind {
    Snv,
    Mnv,
    Indel,
    Symbolic,
}

impl AlleleKind {
    pub fn classify(reference: &str, alt: &str) -> Self {
        if alt.starts_with('<') || alt.contains('[') || alt.contains(']') || alt == "*" {
            AlleleKind::Symbolic
        } else if reference.len() != alt.len() {
            AlleleKind::Indel
        } else if alt.len() == 1 {
            AlleleKind::Snv
        } else {
            AlleleKind::Mnv
        }
    }
}

impl fmt::Display for AlleleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlleleKind::Snv => "SNV",
            AlleleKind::Mnv => MNV_ALLELE_KIND,
            AlleleKind::Indel => "INDEL",
            AlleleKind::Symbolic => "SYMBOLIC",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allele {
    pub kind: AlleleKind,
    pub value: String,
}

impl Allele {
    pub fn new(reference: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        Allele {
            kind: AlleleKind::classify(reference, &value),
            value,
        }
    }
}

/// A typed INFO or FORMAT value. Missing vector entries are `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Flag,
    Integer(Vec<Option<i32>>),
    Float(Vec<Option<f32>>),
    String(Vec<String>),
}

impl FieldValue {
    pub fn string(value: impl Into<String>) -> Self {
        FieldValue::String(vec![value.into()])
    }

    pub fn integer(value: i32) -> Self {
        FieldValue::Integer(vec![Some(value)])
    }

    pub fn float(value: f32) -> Self {
        FieldValue::Float(vec![Some(value)])
    }
}

pub type Fields = Vec<(String, FieldValue)>;

pub fn field<'a>(fields: &'a Fields, key: &str) -> Option<&'a FieldValue> {
    fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zygosity {
    Homozygous,
    Heterozygous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleCall {
    pub sample: String,
    pub data: Fields,
}

impl SampleCall {
    pub fn new(sample: impl Into<String>) -> Self {
        SampleCall {
            sample: sample.into(),
            data: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        field(&self.data, key)
    }

    /// Zygosity of the `GT` call; `None` when no allele is called.
    pub fn zygosity(&self) -> Option<Zygosity> {
        let Some(FieldValue::String(values)) = self.get("GT") else {
            return None;
        };
        let gt = values.first()?;
        let called: Vec<&str> = gt
            .split(['/', '|'])
            .filter(|allele| !allele.is_empty() && *allele != ".")
            .collect();
        let first = called.first()?;
        if called.iter().all(|allele| allele == first) {
            Some(Zygosity::Homozygous)
        } else {
            Some(Zygosity::Heterozygous)
        }
    }
}

/// One genomic call. Positions are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub contig: String,
    pub pos: u64,
    pub ids: Vec<String>,
    pub reference: String,
    pub alts: Vec<Allele>,
    pub qual: Option<f32>,
    pub filters: Vec<String>,
    pub info: Fields,
    pub format: Vec<String>,
    pub calls: Vec<SampleCall>,
}

impl VariantRecord {
    pub fn info(&self, key: &str) -> Option<&FieldValue> {
        field(&self.info, key)
    }

    pub fn call(&self, sample: &str) -> Option<&SampleCall> {
        self.calls.iter().find(|call| call.sample == sample)
    }

    pub fn first_alt(&self) -> Option<&Allele> {
        self.alts.first()
    }
}

impl AsRef<VariantRecord> for VariantRecord {
    fn as_ref(&self) -> &VariantRecord {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allele_kind_is_derived_from_allele_lengths() {
        assert_eq!(AlleleKind::classify("A", "T"), AlleleKind::Snv);
        assert_eq!(AlleleKind::classify("AC", "TG"), AlleleKind::Mnv);
        assert_eq!(AlleleKind::classify("A", "AT"), AlleleKind::Indel);
        assert_eq!(AlleleKind::classify("A", "<DEL>"), AlleleKind::Symbolic);
        assert_eq!(AlleleKind::Mnv.to_string(), "MNV");
    }

    #[test]
    fn zygosity_from_genotype_string() {
        let mut call = SampleCall::new("TUMOUR");
        call.data.push(("GT".to_string(), FieldValue::string("0|1")));
        assert_eq!(call.zygosity(), Some(Zygosity::Heterozygous));

        call.data[0].1 = FieldValue::string("1/1");
        assert_eq!(call.zygosity(), Some(Zygosity::Homozygous));

        call.data[0].1 = FieldValue::string("./.");
        assert_eq!(call.zygosity(), None);

        call.data[0].1 = FieldValue::string("1");
        assert_eq!(call.zygosity(), Some(Zygosity::Homozygous));
    }

    #[test]
    fn zygosity_is_none_without_genotype() {
        let call = SampleCall::new("NORMAL");
        assert_eq!(call.zygosity(), None);
    }
}
