use crate::{
    cli::GenerateBedArgs,
    core::adjacency::{AdjacencyProjector, BedWindow},
    io::vcf_reader::VcfReader,
    utils::util::{format_number_with_commas, Result},
};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

fn open_bed_sink(output: Option<&Path>) -> Result<BufWriter<Box<dyn Write>>> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(File::create(path).map_err(|e| {
            crate::mnvx_error!("Failed to create BED output {}: {e}", path.display())
        })?),
        None => Box::new(io::stdout().lock()),
    };
    Ok(BufWriter::new(sink))
}

fn write_window(sink: &mut impl Write, window: &BedWindow) -> Result<()> {
    writeln!(sink, "{window}")
        .map_err(|e| crate::mnvx_error!("Failed to write BED window {window}: {e}"))
}

/// Streams `vcfin` and writes one BED line per run of adjacent records.
pub fn generate_bed(args: GenerateBedArgs) -> Result<()> {
    let mut reader = VcfReader::new(args.vcfin.clone())?;
    if args.mark_homozygous && !reader.sample_names().contains(&args.sample) {
        return Err(crate::error::MnvxError::UnresolvedSample {
            sample: args.sample.clone(),
        });
    }

    let mut sink = open_bed_sink(args.output.as_deref())?;
    let mut projector = AdjacencyProjector::new(args.mark_homozygous, args.sample.as_str());
    for record in reader.input_records() {
        let record = record?;
        if let Some(window) = projector.push(&record.variant)? {
            write_window(&mut sink, &window)?;
        }
    }
    if let Some(window) = projector.finish() {
        write_window(&mut sink, &window)?;
    }
    sink.flush()
        .map_err(|e| crate::mnvx_error!("Failed to flush BED output: {e}"))?;

    log::info!(
        "Wrote {} candidate window(s) from {} record(s)",
        format_number_with_commas(projector.windows_emitted()),
        format_number_with_commas(reader.records_read)
    );
    Ok(())
}
