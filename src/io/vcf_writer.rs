use crate::{core::variant::VariantRecord, utils::util::Result};
use rust_htslib::bcf;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputType {
    Vcf { is_uncompressed: bool },
    Bcf { is_uncompressed: bool },
}

const CSI_MIN_SHIFT_DEFAULT: u32 = 14;

type OutputIndexSpec = (&'static str, bcf::index::Type);

impl OutputType {
    fn is_uncompressed(&self) -> bool {
        match self {
            Self::Vcf { is_uncompressed } | Self::Bcf { is_uncompressed } => *is_uncompressed,
        }
    }

    fn format(&self) -> bcf::Format {
        match self {
            Self::Vcf { .. } => bcf::Format::Vcf,
            Self::Bcf { .. } => bcf::Format::Bcf,
        }
    }

    fn output_index_spec(&self) -> Option<OutputIndexSpec> {
        if self.is_uncompressed() {
            return None;
        }

        match self {
            Self::Vcf { .. } => Some(("tabix", bcf::index::Type::Tbx)),
            Self::Bcf { .. } => Some(("csi", bcf::index::Type::Csi(CSI_MIN_SHIFT_DEFAULT))),
        }
    }

    pub fn infer_from_extension(path: &Path) -> OutputType {
        let path_lower = path.to_string_lossy().to_lowercase();
        match path_lower.as_str() {
            s if s.ends_with(".bcf.gz") => OutputType::Bcf {
                is_uncompressed: false,
            },
            s if s.ends_with(".vcf.gz") || s.ends_with(".vcf.bgz") => OutputType::Vcf {
                is_uncompressed: false,
            },
            s if s.ends_with(".bcf") => OutputType::Bcf {
                is_uncompressed: true,
            },
            _ => OutputType::Vcf {
                is_uncompressed: true,
            },
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriterStats {
    pub passthrough: usize,
    pub merged: usize,
}

/// Output sink for pass-through and newly built records.
pub struct VcfWriter {
    pub writer: bcf::Writer,
    pub output_type: OutputType,
    pub path: PathBuf,
    pub stats: WriterStats,
}

impl VcfWriter {
    pub fn new(header: &bcf::Header, output_type: Option<&OutputType>, path: &Path) -> Result<Self> {
        let output_type = output_type
            .cloned()
            .unwrap_or_else(|| OutputType::infer_from_extension(path));
        log::trace!("{:?}", &output_type);

        let writer = bcf::Writer::from_path(
            path,
            header,
            output_type.is_uncompressed(),
            output_type.format(),
        )
        .map_err(|e| crate::mnvx_error!("Failed to create writer: {}", e))?;

        Ok(VcfWriter {
            writer,
            output_type,
            path: path.to_path_buf(),
            stats: WriterStats::default(),
        })
    }

    /// Writes an input record unchanged, re-keyed to the output header.
    pub fn write_passthrough(&mut self, record: &mut bcf::Record) -> Result<()> {
        self.writer.translate(record);
        self.writer.write(record)?;
        self.stats.passthrough += 1;
        Ok(())
    }

    pub fn write_variant(&mut self, variant: &VariantRecord) -> Result<()> {
        let mut record = self.writer.empty_record();
        variant.write_to_record(&mut record)?;
        self.writer.write(&record)?;
        self.stats.merged += 1;
        Ok(())
    }

    /// Closes the output and indexes it when it is BGZF-compressed.
    pub fn finish(self) -> Result<WriterStats> {
        let VcfWriter {
            writer,
            output_type,
            path,
            stats,
        } = self;
        drop(writer);

        if let Some((index_name, index_type)) = output_type.output_index_spec() {
            log::debug!(
                "Writer: Building {} index for output {}",
                index_name,
                path.display()
            );
            bcf::index::build(&path, None, 1, index_type).map_err(|error| {
                crate::mnvx_error!(
                    "Failed to build {} index for output {}: {}",
                    index_name,
                    path.display(),
                    error
                )
            })?;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::variant::test_utils::snv;
    use rust_htslib::bcf::Read;
    use tempfile::tempdir;

    fn make_header() -> bcf::Header {
        let mut header = bcf::Header::new();
        header.push_record(br#"##fileformat=VCFv4.3"#);
        header.push_record(br#"##contig=<ID=chr1,length=1000>"#);
        header.push_sample(b"S1");
        header
    }

    #[test]
    fn output_type_is_inferred_from_extension() {
        assert_eq!(
            OutputType::infer_from_extension(Path::new("out.vcf.gz")),
            OutputType::Vcf {
                is_uncompressed: false
            }
        );
        assert_eq!(
            OutputType::infer_from_extension(Path::new("OUT.BCF")),
            OutputType::Bcf {
                is_uncompressed: true
            }
        );
        assert_eq!(
            OutputType::infer_from_extension(Path::new("output.MNV.vcf")),
            OutputType::Vcf {
                is_uncompressed: true
            }
        );
    }

    #[test]
    fn output_index_spec_only_for_compressed_output() {
        assert!(matches!(
            OutputType::Vcf {
                is_uncompressed: false
            }
            .output_index_spec(),
            Some(("tabix", bcf::index::Type::Tbx))
        ));
        assert!(OutputType::Vcf {
            is_uncompressed: true
        }
        .output_index_spec()
        .is_none());
    }

    #[test]
    fn compressed_output_is_indexed_on_finish() {
        let temp_dir = tempdir().expect("temp dir should be created");
        let out_path = temp_dir.path().join("out.vcf.gz");
        let mut writer = VcfWriter::new(&make_header(), None, &out_path).unwrap();
        writer.write_variant(&snv("chr1", 10, "A", "C")).unwrap();
        let stats = writer.finish().unwrap();
        assert_eq!(stats.merged, 1);
        assert!(temp_dir.path().join("out.vcf.gz.tbi").exists());
    }

    #[test]
    fn written_variant_reads_back() {
        let temp_dir = tempdir().expect("temp dir should be created");
        let out_path = temp_dir.path().join("out.vcf");
        let mut writer = VcfWriter::new(&make_header(), None, &out_path).unwrap();
        writer.write_variant(&snv("chr1", 10, "AC", "GT")).unwrap();
        writer.finish().unwrap();

        let mut reader = bcf::Reader::from_path(&out_path).unwrap();
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.pos(), 9);
        assert_eq!(record.alleles(), vec![b"AC" as &[u8], b"GT"]);
    }
}
