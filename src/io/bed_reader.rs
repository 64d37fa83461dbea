use super::readers::open_text_reader;
use crate::{constants::HOMOZYGOUS_MARKER, utils::util::Result};
use std::{collections::BTreeMap, io::BufRead, path::Path};

/// Inclusive 1-based interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub first: u64,
    pub last: u64,
}

impl Region {
    pub fn len(&self) -> usize {
        (self.last + 1).saturating_sub(self.first) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BedLine {
    Plain,
    Homozygous { contig: String, region: Region },
}

pub fn parse_bed_line(line: &str) -> Result<BedLine> {
    let split_line: Vec<&str> = line.split_whitespace().collect();
    let (contig, start, end, marker) = match &split_line[..] {
        [contig, start, end] => (*contig, *start, *end, None),
        [contig, start, end, marker] => (*contig, *start, *end, Some(*marker)),
        _ => {
            return Err(crate::mnvx_error!(
                "Expected 3 or 4 fields in the format 'chrom start end [hom]', found {}: {}",
                split_line.len(),
                line
            ))
        }
    };

    let start: u64 = start
        .parse()
        .map_err(|e| crate::mnvx_error!("Invalid start position: {}", e))?;
    let end: u64 = end
        .parse()
        .map_err(|e| crate::mnvx_error!("Invalid end position: {}", e))?;
    if end <= start {
        return Err(crate::mnvx_error!(
            "End position {end} is not after start position {start}"
        ));
    }

    match marker {
        None => Ok(BedLine::Plain),
        Some(HOMOZYGOUS_MARKER) => Ok(BedLine::Homozygous {
            contig: contig.to_owned(),
            region: Region {
                first: start + 1,
                last: end,
            },
        }),
        Some(other) => Err(crate::mnvx_error!(
            "Unexpected fourth field '{other}', expected '{HOMOZYGOUS_MARKER}'"
        )),
    }
}

/// Homozygous regions per contig, in file order.
#[derive(Debug, Default)]
pub struct HomozygousRegions {
    pub regions: BTreeMap<String, Vec<Region>>,
}

impl HomozygousRegions {
    pub fn new<P: AsRef<Path>>(bed_path: P) -> Result<Self> {
        let reader = open_text_reader(bed_path.as_ref())?;
        let mut regions: BTreeMap<String, Vec<Region>> = BTreeMap::new();
        let mut plain = 0usize;

        for (line_number, result_line) in reader.lines().enumerate() {
            let line = result_line
                .map_err(|e| crate::mnvx_error!("Error at BED line {}: {}", line_number + 1, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_bed_line(&line)
                .map_err(|e| crate::mnvx_error!("Error at BED line {}: {}", line_number + 1, e))?
            {
                BedLine::Plain => plain += 1,
                BedLine::Homozygous { contig, region } => {
                    regions.entry(contig).or_default().push(region)
                }
            }
        }

        log::debug!(
            "Read {} homozygous region(s) from {}, ignored {plain} plain region(s)",
            regions.values().map(Vec::len).sum::<usize>(),
            bed_path.as_ref().display()
        );
        Ok(HomozygousRegions { regions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_bed_line_homozygous() {
        let parsed = parse_bed_line("chr1\t9420709\t9420713\thom").unwrap();
        assert_eq!(
            parsed,
            BedLine::Homozygous {
                contig: "chr1".to_string(),
                region: Region {
                    first: 9420710,
                    last: 9420713
                }
            }
        );
    }

    #[test]
    fn test_parse_bed_line_plain() {
        assert_eq!(parse_bed_line("chr1\t10\t12").unwrap(), BedLine::Plain);
    }

    #[test]
    fn test_parse_bed_line_invalid() {
        assert!(parse_bed_line("chr1\t100").is_err());
        assert!(parse_bed_line("chr1\tabc\t200").is_err());
        assert!(parse_bed_line("chr1\t100\txyz").is_err());
        assert!(parse_bed_line("chr1\t100\t102\thet").is_err());
        assert!(parse_bed_line("chr1\t100\t102\thom\textra").is_err());
        assert!(parse_bed_line("chr1\t100\t100\thom").is_err());
    }

    #[test]
    fn test_region_len() {
        let region = Region {
            first: 9420710,
            last: 9420713,
        };
        assert_eq!(region.len(), 4);
        assert!(!region.is_empty());
    }

    #[test]
    fn test_homozygous_regions_new() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "chr1\t10\t12\thom")?;
        writeln!(temp_file, "chr2\t30\t32")?;
        writeln!(temp_file)?;
        writeln!(temp_file, "chr1\t50\t53\thom")?;
        temp_file.flush()?;

        let hom = HomozygousRegions::new(temp_file.path())?;
        assert_eq!(hom.regions.len(), 1);
        assert_eq!(
            hom.regions["chr1"],
            vec![
                Region {
                    first: 11,
                    last: 12
                },
                Region {
                    first: 51,
                    last: 53
                }
            ]
        );
        Ok(())
    }

    #[test]
    fn test_homozygous_regions_error_names_line() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "chr1\t10\t12\thom")?;
        writeln!(temp_file, "chr1\t10")?;
        temp_file.flush()?;

        let err = HomozygousRegions::new(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("BED line 2"));
        Ok(())
    }

    #[test]
    fn test_homozygous_regions_empty_file() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        let hom = HomozygousRegions::new(temp_file.path())?;
        assert!(hom.regions.is_empty());
        Ok(())
    }
}
