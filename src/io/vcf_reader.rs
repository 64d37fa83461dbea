use crate::{core::variant::VariantRecord, utils::util::Result};
use rust_htslib::bcf::{self, header::HeaderView, Read};
use std::{
    fs::File,
    io::Read as ReadIo,
    path::{Path, PathBuf},
};

fn has_gzip_magic(path: &Path) -> Result<bool> {
    let mut f = File::open(path)
        .map_err(|e| crate::mnvx_error!("Failed to open {}: {e}", path.display()))?;
    let mut m = [0u8; 2];
    let n = std::io::Read::read(&mut f, &mut m)
        .map_err(|e| crate::mnvx_error!("Failed to read {}: {e}", path.display()))?;
    Ok(n == 2 && m == [0x1f, 0x8b])
}

fn looks_like_bcf(p: &[u8]) -> bool {
    p.len() >= 5 && &p[..3] == b"BCF" && p[3] == 0x02
}

fn looks_like_vcf(p: &[u8]) -> bool {
    let mut p = p;
    // Strip the UTF-8 BOM if present
    if p.starts_with(&[0xEF, 0xBB, 0xBF]) {
        p = &p[3..];
    }
    p.starts_with(b"##fileformat=VCF")
}

/// Checks that `file` is a plain, BGZF-compressed, or BCF variant file.
pub fn validate_variant_file(file: &Path) -> Result<()> {
    let mut buf = vec![0u8; 512];
    let n = if has_gzip_magic(file)? {
        let is_bgzf = rust_htslib::bgzf::is_bgzip(file).map_err(|e| {
            crate::mnvx_error!(
                "Failed to determine whether {} is BGZF-compressed: {e}",
                file.display()
            )
        })?;
        if !is_bgzf {
            return Err(crate::mnvx_error!(
                "File {} is gzip-compressed but not BGZF (bgzip). Recompress with bgzip (or `bcftools view -Oz`).",
                file.display()
            ));
        }
        let mut r = rust_htslib::bgzf::Reader::from_path(file).map_err(|e| {
            crate::mnvx_error!("Failed to open BGZF reader for {}: {e}", file.display())
        })?;
        r.read(&mut buf).map_err(|e| {
            crate::mnvx_error!("Failed to read BGZF stream from {}: {e}", file.display())
        })?
    } else {
        let mut f = File::open(file)
            .map_err(|e| crate::mnvx_error!("Failed to open {}: {e}", file.display()))?;
        f.read(&mut buf)
            .map_err(|e| crate::mnvx_error!("Failed to read {}: {e}", file.display()))?
    };
    buf.truncate(n);

    if buf.is_empty() {
        return Err(crate::mnvx_error!("File {} is empty", file.display()));
    }
    if looks_like_vcf(&buf) || looks_like_bcf(&buf) {
        Ok(())
    } else {
        Err(crate::mnvx_error!(
            "File {} does not look like VCF or BCF",
            file.display()
        ))
    }
}

/// An input record together with the htslib record it was decoded from.
pub struct InputRecord {
    pub variant: VariantRecord,
    pub raw: bcf::Record,
}

impl AsRef<VariantRecord> for InputRecord {
    fn as_ref(&self) -> &VariantRecord {
        &self.variant
    }
}

/// Forward-only reader over a VCF/BCF file; no index is required.
pub struct VcfReader {
    pub reader: bcf::Reader,
    pub current_record: bcf::Record,
    pub path: PathBuf,
    pub records_read: usize,
}

impl VcfReader {
    pub fn new(file: PathBuf) -> Result<Self> {
        log::trace!("Start loading VCF {:?}", &file);
        validate_variant_file(&file)
            .map_err(|e| crate::mnvx_error!("Error validating VCF: {}", e))?;

        let reader = bcf::Reader::from_path(&file)
            .map_err(|e| crate::mnvx_error!("Failed to open VCF file {}: {}", file.display(), e))?;
        log::trace!(
            "{:?} samples n = {}",
            file.file_name().unwrap_or_default(),
            reader.header().sample_count()
        );

        let current_record = reader.empty_record();
        Ok(VcfReader {
            reader,
            current_record,
            path: file,
            records_read: 0,
        })
    }

    pub fn header(&self) -> &HeaderView {
        self.reader.header()
    }

    pub fn sample_names(&self) -> Vec<String> {
        self.header()
            .samples()
            .iter()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect()
    }

    pub fn advance(&mut self) -> Result<bool> {
        match self.reader.read(&mut self.current_record) {
            Some(Ok(())) => {
                self.records_read += 1;
                Ok(true)
            }
            Some(Err(e)) => Err(crate::mnvx_error!(
                "Error reading record {} from {}: {e}",
                self.records_read + 1,
                self.path.display()
            )),
            None => Ok(false),
        }
    }

    /// Decoded records, each carrying its own copy of the htslib record.
    pub fn input_records(&mut self) -> InputRecords<'_> {
        InputRecords { reader: self }
    }
}

pub struct InputRecords<'a> {
    reader: &'a mut VcfReader,
}

impl Iterator for InputRecords<'_> {
    type Item = Result<InputRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.advance() {
            Ok(true) => {
                let raw = self.reader.current_record.clone();
                Some(
                    VariantRecord::from_vcf_record(&raw).map(|variant| InputRecord { variant, raw }),
                )
            }
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variant::test_utils::make_temp_vcf;

    const VCF: &str = "\
##fileformat=VCFv4.2
##contig=<ID=chr1,length=1000>
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNORMAL\tTUMOUR
chr1\t100\t.\tA\tG\t.\t.\t.\tGT\t0|0\t0|1
chr1\t101\t.\tC\tT\t.\t.\t.\tGT\t0|0\t1|1
";

    #[test]
    fn test_looks_like_vcf_and_bcf() {
        assert!(looks_like_vcf(b"##fileformat=VCFv4.2\n"));
        assert!(looks_like_vcf(b"\xEF\xBB\xBF##fileformat=VCFv4.3\n"));
        assert!(!looks_like_vcf(b"chr1\t1\t2\n"));
        assert!(looks_like_bcf(b"BCF\x02\x02"));
        assert!(!looks_like_bcf(b"BCF"));
    }

    #[test]
    fn test_validate_variant_file_rejects_non_vcf() {
        let path = make_temp_vcf("chr1\t10\t20\n");
        assert!(validate_variant_file(&path).is_err());
        let empty = make_temp_vcf("");
        assert!(validate_variant_file(&empty).is_err());
    }

    #[test]
    fn test_input_records_decode_in_order() {
        let path = make_temp_vcf(VCF);
        let mut reader = VcfReader::new(path).unwrap();
        assert_eq!(reader.sample_names(), vec!["NORMAL", "TUMOUR"]);

        let records = reader
            .input_records()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_ref().pos, 100);
        assert_eq!(records[1].variant.pos, 101);
        assert_eq!(records[1].raw.pos(), 100);
        assert_eq!(reader.records_read, 2);
    }

    #[test]
    fn test_vcf_reader_new_reports_missing_file() {
        let err = VcfReader::new(PathBuf::from("/definitely/not/here.vcf"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Error validating VCF"));
    }
}
