use super::{Allele, FieldValue, Fields, SampleCall, VariantRecord};
use crate::{
    error::MnvxError,
    utils::util::{
        is_missing_float, is_missing_integer, Result, MISSING_FLOAT, MISSING_INTEGER,
        VECTOR_END_FLOAT, VECTOR_END_INTEGER,
    },
};
use rust_htslib::{
    bcf::{
        self,
        header::{HeaderView, Id, TagType},
        record::GenotypeAllele,
    },
    htslib,
};
use std::iter;

impl VariantRecord {
    pub fn from_vcf_record(record: &bcf::Record) -> Result<Self> {
        let header = record.header();

        let rid = record
            .rid()
            .ok_or_else(|| crate::mnvx_error!("VCF record has no contig"))?;
        let contig = std::str::from_utf8(header.rid2name(rid)?)?.to_string();
        let pos = u64::try_from(record.pos() + 1)?;

        let raw_id = record.id();
        let ids = if raw_id.is_empty() || raw_id.as_slice() == b"." {
            Vec::new()
        } else {
            std::str::from_utf8(&raw_id)?
                .split(';')
                .map(str::to_string)
                .collect()
        };

        let alleles = record.alleles();
        let reference = alleles
            .first()
            .map(|allele| String::from_utf8_lossy(allele).into_owned())
            .ok_or_else(|| crate::mnvx_error!("VCF record at {contig}:{pos} has no REF"))?;
        let alts = alleles
            .iter()
            .skip(1)
            .map(|allele| Allele::new(&reference, String::from_utf8_lossy(allele)))
            .collect();

        let qual = Some(record.qual()).filter(|q| !is_missing_float(*q));

        let filters = record
            .filters()
            .map(|id| String::from_utf8(header.id_to_name(id)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| crate::mnvx_error!("FILTER name is not valid UTF-8: {e}"))?;

        let info = read_info_fields(record, header)?;
        let (format, calls) = read_sample_fields(record, header)?;

        Ok(VariantRecord {
            contig,
            pos,
            ids,
            reference,
            alts,
            qual,
            filters,
            info,
            format,
            calls,
        })
    }

    /// Encodes this record into `out`, which must be an empty record of the output writer.
    pub fn write_to_record(&self, out: &mut bcf::Record) -> Result<()> {
        let rid = out
            .header()
            .name2rid(self.contig.as_bytes())
            .map_err(|_| MnvxError::UnknownContig {
                contig: self.contig.clone(),
            })?;
        out.set_rid(Some(rid));
        out.set_pos(i64::try_from(self.pos)? - 1);

        if self.ids.is_empty() {
            out.set_id(b".")?;
        } else {
            out.set_id(self.ids.join(";").as_bytes())?;
        }

        let mut alleles: Vec<&[u8]> = vec![self.reference.as_bytes()];
        alleles.extend(self.alts.iter().map(|alt| alt.value.as_bytes()));
        out.set_alleles(&alleles)?;

        out.set_qual(self.qual.unwrap_or(MISSING_FLOAT));

        if !self.filters.is_empty() {
            let names: Vec<&[u8]> = self.filters.iter().map(|f| f.as_bytes()).collect();
            out.set_filters(&names)?;
        }

        for (key, value) in &self.info {
            push_info_value(out, key, value)?;
        }

        self.push_sample_fields(out)?;
        Ok(())
    }

    fn push_sample_fields(&self, out: &mut bcf::Record) -> Result<()> {
        if self.format.is_empty() {
            return Ok(());
        }

        let output_samples: Vec<String> = out
            .header()
            .samples()
            .iter()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect();
        for call in &self.calls {
            if !output_samples.contains(&call.sample) {
                return Err(MnvxError::UnresolvedSample {
                    sample: call.sample.clone(),
                });
            }
        }

        for key in &self.format {
            let per_sample: Vec<Option<&FieldValue>> = output_samples
                .iter()
                .map(|sample| self.call(sample).and_then(|call| call.get(key)))
                .collect();
            let Some(first) = per_sample.iter().flatten().next() else {
                continue;
            };

            if key == "GT" {
                push_genotypes(out, &per_sample)?;
                continue;
            }

            match first {
                FieldValue::Integer(_) => {
                    let values: Vec<Vec<i32>> = per_sample
                        .iter()
                        .map(|value| match value {
                            Some(FieldValue::Integer(v)) => v
                                .iter()
                                .map(|x| x.unwrap_or(MISSING_INTEGER))
                                .collect(),
                            _ => Vec::new(),
                        })
                        .collect();
                    out.push_format_integer(key.as_bytes(), &flatten_integer_values(&values))?;
                }
                FieldValue::Float(_) => {
                    let values: Vec<Vec<f32>> = per_sample
                        .iter()
                        .map(|value| match value {
                            Some(FieldValue::Float(v)) => {
                                v.iter().map(|x| x.unwrap_or(MISSING_FLOAT)).collect()
                            }
                            _ => Vec::new(),
                        })
                        .collect();
                    out.push_format_float(key.as_bytes(), &flatten_float_values(&values))?;
                }
                FieldValue::String(_) => {
                    let values: Vec<Vec<u8>> = per_sample
                        .iter()
                        .map(|value| match value {
                            Some(FieldValue::String(v)) if !v.is_empty() => {
                                v.join(",").into_bytes()
                            }
                            _ => b".".to_vec(),
                        })
                        .collect();
                    out.push_format_string(key.as_bytes(), &values)?;
                }
                FieldValue::Flag => {
                    return Err(crate::mnvx_error!(
                        "Unsupported FORMAT type Flag for tag {key}"
                    ));
                }
            }
        }
        Ok(())
    }
}

fn push_info_value(out: &mut bcf::Record, key: &str, value: &FieldValue) -> Result<()> {
    let tag = key.as_bytes();
    match value {
        FieldValue::Flag => out.push_info_flag(tag)?,
        FieldValue::Integer(values) => {
            let values: Vec<i32> = values
                .iter()
                .map(|v| v.unwrap_or(MISSING_INTEGER))
                .collect();
            out.push_info_integer(tag, &values)?
        }
        FieldValue::Float(values) => {
            let values: Vec<f32> = values.iter().map(|v| v.unwrap_or(MISSING_FLOAT)).collect();
            out.push_info_float(tag, &values)?
        }
        FieldValue::String(values) => {
            let values: Vec<&[u8]> = values.iter().map(|v| v.as_bytes()).collect();
            out.push_info_string(tag, &values)?
        }
    }
    Ok(())
}

/// Parses a textual genotype such as `0|1` or `./.` into htslib alleles.
pub fn parse_genotype(gt: &str) -> Vec<GenotypeAllele> {
    fn to_allele(token: &str, phased: bool) -> GenotypeAllele {
        match (token.parse::<i32>().ok(), phased) {
            (Some(index), true) => GenotypeAllele::Phased(index),
            (Some(index), false) => GenotypeAllele::Unphased(index),
            (None, true) => GenotypeAllele::PhasedMissing,
            (None, false) => GenotypeAllele::UnphasedMissing,
        }
    }

    let mut alleles = Vec::new();
    let mut phased = false;
    let mut start = 0;
    for (idx, c) in gt.char_indices() {
        if c == '/' || c == '|' {
            alleles.push(to_allele(&gt[start..idx], phased));
            phased = c == '|';
            start = idx + 1;
        }
    }
    alleles.push(to_allele(&gt[start..], phased));
    alleles
}

fn push_genotypes(out: &mut bcf::Record, per_sample: &[Option<&FieldValue>]) -> Result<()> {
    let mut sample_gts: Vec<Vec<GenotypeAllele>> = per_sample
        .iter()
        .map(|value| match value {
            Some(FieldValue::String(v)) => v
                .first()
                .map(|gt| parse_genotype(gt))
                .unwrap_or_default(),
            _ => Vec::new(),
        })
        .collect();
    let max_ploidy = sample_gts.iter().map(Vec::len).max().unwrap_or(1).max(1);
    for gt in &mut sample_gts {
        let missing = max_ploidy - gt.len();
        gt.extend(iter::repeat_n(GenotypeAllele::UnphasedMissing, missing));
    }
    let flattened: Vec<GenotypeAllele> = sample_gts.into_iter().flatten().collect();
    out.push_genotypes(&flattened)?;
    Ok(())
}

fn flatten_integer_values(values_per_sample: &[Vec<i32>]) -> Vec<i32> {
    let max_len = values_per_sample
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(1)
        .max(1);
    let mut flattened = Vec::with_capacity(values_per_sample.len() * max_len);
    for values in values_per_sample {
        if values.is_empty() {
            flattened.push(MISSING_INTEGER);
            flattened.extend(iter::repeat_n(VECTOR_END_INTEGER, max_len - 1));
            continue;
        }
        flattened.extend(values.iter().copied());
        flattened.extend(iter::repeat_n(VECTOR_END_INTEGER, max_len - values.len()));
    }
    flattened
}

fn flatten_float_values(values_per_sample: &[Vec<f32>]) -> Vec<f32> {
    let max_len = values_per_sample
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(1)
        .max(1);
    let mut flattened = Vec::with_capacity(values_per_sample.len() * max_len);
    for values in values_per_sample {
        if values.is_empty() {
            flattened.push(MISSING_FLOAT);
            flattened.extend(iter::repeat_n(VECTOR_END_FLOAT, max_len - 1));
            continue;
        }
        flattened.extend(values.iter().copied());
        flattened.extend(iter::repeat_n(VECTOR_END_FLOAT, max_len - values.len()));
    }
    flattened
}

fn tag_name(header: &HeaderView, id: i32) -> Result<String> {
    let id = u32::try_from(id)?;
    String::from_utf8(header.id_to_name(Id(id)))
        .map_err(|e| crate::mnvx_error!("Header tag name is not valid UTF-8: {e}"))
}

/// INFO tags in record order.
fn info_order(record: &bcf::Record, header: &HeaderView) -> Result<Vec<String>> {
    unsafe {
        htslib::bcf_unpack(record.inner, htslib::BCF_UN_INFO as i32);
    }
    let info_count = record.inner().n_info() as usize;
    let info_ptr = record.inner().d.info;
    if info_count == 0 || info_ptr.is_null() {
        return Ok(Vec::new());
    }

    let mut order = Vec::with_capacity(info_count);
    for info_idx in 0..info_count {
        let entry = unsafe { info_ptr.add(info_idx).read() };
        order.push(tag_name(header, entry.key)?);
    }
    Ok(order)
}

/// FORMAT tags in record order.
fn format_order(record: &bcf::Record, header: &HeaderView) -> Result<Vec<String>> {
    unsafe {
        htslib::bcf_unpack(record.inner, htslib::BCF_UN_FMT as i32);
    }
    let format_count = record.inner().n_fmt() as usize;
    let format_ptr = record.inner().d.fmt;
    if format_count == 0 || format_ptr.is_null() {
        return Ok(Vec::new());
    }

    let mut order = Vec::with_capacity(format_count);
    for format_idx in 0..format_count {
        let entry = unsafe { format_ptr.add(format_idx).read() };
        order.push(tag_name(header, entry.id)?);
    }
    Ok(order)
}

fn read_info_fields(record: &bcf::Record, header: &HeaderView) -> Result<Fields> {
    let mut fields = Vec::new();
    for tag in info_order(record, header)? {
        let (tag_type, _) = header.info_type(tag.as_bytes())?;
        let value = match tag_type {
            TagType::Flag => record
                .info(tag.as_bytes())
                .flag()?
                .then_some(FieldValue::Flag),
            TagType::Integer => record.info(tag.as_bytes()).integer()?.map(|values| {
                FieldValue::Integer(
                    values
                        .iter()
                        .take_while(|v| **v != VECTOR_END_INTEGER)
                        .map(|v| Some(*v).filter(|v| !is_missing_integer(*v)))
                        .collect(),
                )
            }),
            TagType::Float => record.info(tag.as_bytes()).float()?.map(|values| {
                FieldValue::Float(
                    values
                        .iter()
                        .take_while(|v| v.to_bits() != VECTOR_END_FLOAT.to_bits())
                        .map(|v| Some(*v).filter(|v| !is_missing_float(*v)))
                        .collect(),
                )
            }),
            TagType::String => record.info(tag.as_bytes()).string()?.map(|values| {
                FieldValue::String(
                    values
                        .iter()
                        .map(|v| String::from_utf8_lossy(v).into_owned())
                        .collect(),
                )
            }),
        };
        if let Some(value) = value {
            fields.push((tag, value));
        }
    }
    Ok(fields)
}

fn read_sample_fields(
    record: &bcf::Record,
    header: &HeaderView,
) -> Result<(Vec<String>, Vec<SampleCall>)> {
    let mut calls: Vec<SampleCall> = header
        .samples()
        .iter()
        .map(|sample| SampleCall::new(String::from_utf8_lossy(sample)))
        .collect();
    let sample_count = calls.len();
    if sample_count == 0 {
        return Ok((Vec::new(), calls));
    }

    let format = format_order(record, header)?;
    for tag in &format {
        if tag == "GT" {
            let genotypes = record
                .genotypes()
                .map_err(|e| crate::mnvx_error!("Error reading genotypes: {e}"))?;
            for (sample_idx, call) in calls.iter_mut().enumerate() {
                let gt = genotypes.get(sample_idx).to_string();
                call.data.push((tag.clone(), FieldValue::String(vec![gt])));
            }
            continue;
        }

        let (tag_type, _) = header.format_type(tag.as_bytes())?;
        let per_sample: Vec<FieldValue> = match tag_type {
            TagType::Integer => record
                .format(tag.as_bytes())
                .integer()
                .map_err(|e| crate::mnvx_error!("Error reading {tag} FORMAT: {e}"))?
                .iter()
                .map(|values| {
                    FieldValue::Integer(
                        values
                            .iter()
                            .take_while(|v| **v != VECTOR_END_INTEGER)
                            .map(|v| Some(*v).filter(|v| !is_missing_integer(*v)))
                            .collect(),
                    )
                })
                .collect(),
            TagType::Float => record
                .format(tag.as_bytes())
                .float()
                .map_err(|e| crate::mnvx_error!("Error reading {tag} FORMAT: {e}"))?
                .iter()
                .map(|values| {
                    FieldValue::Float(
                        values
                            .iter()
                            .take_while(|v| v.to_bits() != VECTOR_END_FLOAT.to_bits())
                            .map(|v| Some(*v).filter(|v| !is_missing_float(*v)))
                            .collect(),
                    )
                })
                .collect(),
            TagType::String => record
                .format(tag.as_bytes())
                .string()
                .map_err(|e| crate::mnvx_error!("Error reading {tag} FORMAT: {e}"))?
                .iter()
                .map(|value| FieldValue::string(String::from_utf8_lossy(value)))
                .collect(),
            TagType::Flag => {
                return Err(crate::mnvx_error!(
                    "Unsupported FORMAT type Flag for tag {tag}"
                ));
            }
        };

        if per_sample.len() != sample_count {
            return Err(crate::mnvx_error!(
                "Malformed {tag} FORMAT: expected {sample_count} samples, got {}",
                per_sample.len()
            ));
        }
        for (call, value) in calls.iter_mut().zip(per_sample) {
            call.data.push((tag.clone(), value));
        }
    }

    Ok((format, calls))
}
