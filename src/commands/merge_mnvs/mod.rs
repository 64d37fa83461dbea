use crate::{
    cli::MergeMnvsArgs,
    core::{
        header::{rewrite, HeaderModel, Provenance},
        mnv_merger::{MergeStats, MergedItem, MnvMerger},
    },
    io::{
        bed_reader::HomozygousRegions, linkage_reader::parse_linkage_report,
        vcf_reader::VcfReader, vcf_writer::VcfWriter,
    },
    utils::util::{file_name_or_path, format_number_with_commas, Result},
};
use chrono::NaiveDate;
use rust_htslib::bcf;


const PROVENANCE_SOURCE: &str = "mnvx merge-mnvs";

pub fn merge_mnvs(args: MergeMnvsArgs) -> Result<()> {
    let stats = merge_mnvs_on(&args, chrono::Utc::now().date_naive())?;
    log::info!(
        "Merged {} run(s) covering {} record(s), longest {}; {} record(s) passed through, {} run(s) abandoned",
        format_number_with_commas(stats.runs_merged),
        format_number_with_commas(stats.records_merged),
        stats.longest_run,
        format_number_with_commas(stats.records_passed_through),
        format_number_with_commas(stats.runs_abandoned)
    );
    Ok(())
}

/// Runs the merge with `date` stamped into the provenance key.
fn merge_mnvs_on(args: &MergeMnvsArgs, date: NaiveDate) -> Result<MergeStats> {
    if args.output == args.vcfin {
        return Err(crate::mnvx_error!(
            "The output path and input VCF must be different: {}",
            args.output.display()
        ));
    }

    let homozygous = args.bed.as_ref().map(HomozygousRegions::new).transpose()?;
    let (linkage, max_run_length) = parse_linkage_report(
        &args.smart_phased_output,
        args.cutoff,
        args.exclude,
        homozygous.as_ref(),
    )?;
    if linkage.is_empty() {
        log::warn!(
            "No linked runs in {}; records are copied unchanged",
            args.smart_phased_output.display()
        );
    }

    let mut reader = VcfReader::new(args.vcfin.clone())?;
    let mut model = HeaderModel::from_view(reader.header());
    let provenance = Provenance {
        input_name: file_name_or_path(&args.vcfin),
        source: PROVENANCE_SOURCE.to_string(),
        params: args.arg_string(),
    };
    let added = rewrite(&mut model, max_run_length, &provenance, date);

    let mut out_header = bcf::Header::from_template(reader.header());
    HeaderModel::apply_to(&added, &mut out_header);
    let mut writer = VcfWriter::new(&out_header, args.output_type.as_ref(), &args.output)?;

    let mut merger = MnvMerger::new(reader.input_records(), &linkage);
    for item in &mut merger {
        match item? {
            MergedItem::Passthrough(mut record) => writer.write_passthrough(&mut record.raw)?,
            MergedItem::Mnv(variant) => {
                log::trace!(
                    "Writing MNV {}:{} {}>{}",
                    variant.contig,
                    variant.pos,
                    variant.reference,
                    variant.alts.first().map_or("", |alt| alt.value.as_str())
                );
                writer.write_variant(&variant)?
            }
        }
    }
    let stats = merger.stats().clone();

    let written = writer.finish()?;
    log::debug!(
        "Wrote {} pass-through and {} merged record(s) to {}",
        written.passthrough,
        written.merged,
        args.output.display()
    );
    Ok(stats)
}
