pub mod counts;
pub mod votes;
pub mod coverage;
pub mod gapcover;
pub mod corrector;
pub mod call;

mod error;
pub use error::CallerError;

use anyhow::Result;
use located_error::LocatedError;
use log::{debug, info};
use rayon::prelude::*;

use call::AlleleCall;
use counts::CountMode;
use kmlst_io::read::AlleleStore;
use kmlst_io::write::{FastaWriter, TableWriter};
use mlst::{KmerDb, SequenceType};
use parser::{CallArgs, Common};

pub const CALLS_FILE: &str        = "calls.tsv";
pub const COVERAGE_FILE: &str     = "coverage.tsv";
pub const NOVEL_FASTA_FILE: &str  = "novel.fa";
pub const VOTE_CALLS_FILE: &str   = "vote_calls.tsv";
pub const VOTE_DETAILS_FILE: &str = "vote_details.tsv";
pub const TIES_FILE: &str         = "ties.tsv";

/// Main runner of the `call` subcommand: type every provided sample against
/// the database and write the batch result streams.
pub fn run(common: &Common, args: &CallArgs) -> Result<()> {
    // ----------------------------- Sanity checks.
    common.validate()?;
    args.validate()?;

    // ----------------------------- Load the typing database.
    let db = KmerDb::load(&args.db)?;

    // ----------------------------- Pair input files into samples.
    info!("Pairing input sequencing files...");
    let samples = kmlst_io::read::pair_samples(&args.forward, &args.reverse)?;
    info!("{} sample(s) to type", samples.len());

    let store = AlleleStore::new(args.resolve_fasta_dir());

    // ----------------------------- Resolve output files.
    let mut filenames = vec![CALLS_FILE, COVERAGE_FILE];
    if args.output_special_cases {
        filenames.push(NOVEL_FASTA_FILE);
    }
    if args.output_votes {
        filenames.extend([VOTE_CALLS_FILE, VOTE_DETAILS_FILE, TIES_FILE]);
    }
    let outfiles = kmlst_io::parse::output_files(&common.output_dir, common.overwrite, &filenames)?;

    // ----------------------------- Spin up the per-locus worker pool.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(common.threads)
        .build()
        .loc("While building the worker thread pool")?;

    // ----------------------------- Prepare writers and headers.
    let genotype_header = |first: &str| -> Vec<String> {
        std::iter::once(first.to_string())
            .chain(db.locus_names().map(ToString::to_string))
            .chain([String::from("ST"), String::from("clonal_complex")])
            .collect::<Vec<String>>()
    };

    let mut calls_writer = TableWriter::new(Some(&outfiles[CALLS_FILE]))?;
    calls_writer.write_row(genotype_header("Sample"))?;

    let mut coverage_writer = TableWriter::new(Some(&outfiles[COVERAGE_FILE]))?;
    coverage_writer.write_row(["Sample", "Locus", "Coverage", "MinKmerDepth", "Call"])?;

    let mut fasta_writer: Option<FastaWriter> = None;

    let mut vote_writers = if args.output_votes {
        let mut vote_calls_writer = TableWriter::new(Some(&outfiles[VOTE_CALLS_FILE]))?;
        vote_calls_writer.write_row(genotype_header("Sample"))?;
        let mut details_writer = TableWriter::new(Some(&outfiles[VOTE_DETAILS_FILE]))?;
        details_writer.write_row(["Sample", "Locus", "TotalLocusVotes", "Allele(votes)"])?;
        let mut ties_writer = TableWriter::new(Some(&outfiles[TIES_FILE]))?;
        ties_writer.write_row(["Sample", "Locus", "TiedAlleles"])?;
        Some((vote_calls_writer, details_writer, ties_writer))
    } else {
        None
    };

    // ----------------------------- Type each sample.
    for sample in &samples {
        info!("Processing sample '{}'...", sample.name);

        // ---- Count the canonical kmers of every read, restricted to the index.
        let counts = counts::count_sample(db.k, sample.sequences(), &CountMode::Restricted(&db.index))
            .with_loc(|| format!("While counting kmers of sample '{}'", sample.name))?;
        debug!("{} distinct indexed kmers counted", counts.len());

        // ---- Join the counts against the index.
        let vote_table = votes::tally(&counts, &db.index, &db.loci);

        // ---- Call every locus. Loci are independent once votes are known.
        let calls: Vec<AlleleCall> = pool.install(|| {
            db.loci.par_iter().enumerate()
                .map(|(locus_idx, locus)| {
                    call::call_locus(
                        locus,
                        locus_idx,
                        &vote_table,
                        || store.locus_sequences(locus),
                        &counts,
                        args.kmer_thr,
                        args.max_mutations,
                    )
                })
                .collect::<Result<Vec<AlleleCall>>>()
        }).with_loc(|| format!("While calling alleles of sample '{}'", sample.name))?;

        // ---- Calls table row.
        let genotype: Vec<String> = calls.iter().map(|call| call.label().to_string()).collect();
        let sequence_type = lookup_profile(&db, &genotype);
        let mut row = vec![sample.name.clone()];
        row.extend(calls.iter().map(call::AlleleCall::cell));
        row.push(sequence_type.st);
        row.push(sequence_type.clonal_complex);
        calls_writer.write_row(row)?;

        // ---- Coverage report rows.
        for call in &calls {
            coverage_writer.write_row([
                sample.name.clone(),
                call.locus.clone(),
                format!("{:.4}", call.coverage),
                call.depth.to_string(),
                call.cell(),
            ])?;
        }

        // ---- Special-cases FASTA.
        if args.output_special_cases {
            write_special_cases(&mut fasta_writer, &outfiles[NOVEL_FASTA_FILE], sample, &calls)?;
        }

        // ---- Vote-only diagnostic streams.
        if let Some((vote_calls_writer, details_writer, ties_writer)) = vote_writers.as_mut() {
            let vcalls = call::vote_calls(&vote_table, &db.loci)?;

            let vote_genotype: Vec<String> = vcalls.iter().map(|vc| vc.allele.clone()).collect();
            let vote_st = lookup_profile(&db, &vote_genotype);
            let mut row = vec![sample.name.clone()];
            row.extend(vote_genotype);
            row.push(vote_st.st);
            row.push(vote_st.clonal_complex);
            vote_calls_writer.write_row(row)?;

            for (locus_idx, locus) in db.loci.iter().enumerate() {
                let mut row = vec![
                    sample.name.clone(),
                    locus.name.clone(),
                    vote_table.locus_votes(locus_idx).to_string(),
                ];
                for (allele, allele_votes) in vote_table.ranked(locus_idx)
                    .into_iter()
                    .take(call::MAX_VOTE_DETAILS)
                {
                    let id = locus.external_id(allele).unwrap_or("?");
                    row.push(format!("{id}({allele_votes})"));
                }
                details_writer.write_row(row)?;
            }

            for vcall in vcalls.iter().filter(|vc| vc.ties.len() > 1) {
                ties_writer.write_row([
                    sample.name.clone(),
                    vcall.locus.clone(),
                    vcall.ties.join(","),
                ])?;
            }
        }
    }

    // ----------------------------- Flush everything down.
    calls_writer.flush()?;
    coverage_writer.flush()?;
    if let Some(writer) = fasta_writer.as_mut() {
        writer.flush()?;
    }
    if let Some((mut a, mut b, mut c)) = vote_writers {
        a.flush()?;
        b.flush()?;
        c.flush()?;
    }

    info!("Done.");
    Ok(())
}

/// Look the called genotype up within the optional profile table.
fn lookup_profile(db: &KmerDb, genotype: &[String]) -> SequenceType {
    match &db.profile {
        Some(profile) => profile.sequence_type(genotype),
        None          => SequenceType::default(),
    }
}

/// Append every check-candidate of a sample to the special-cases FASTA,
/// creating the file on first use so that clean batches leave no stray file.
fn write_special_cases(
    fasta_writer: &mut Option<FastaWriter<'_>>,
    path: &std::path::Path,
    sample: &kmlst_io::read::Sample,
    calls: &[AlleleCall],
) -> Result<()> {
    for call in calls {
        for candidate in &call.to_check {
            if fasta_writer.is_none() {
                *fasta_writer = Some(FastaWriter::new(Some(path))?);
            }
            if let Some(writer) = fasta_writer.as_mut() {
                let header = format!("{}_{} {} {}",
                    call.locus, candidate.label, sample.name, candidate.description);
                writer.write_record(&header, &candidate.sequence)?;
            }
        }
    }
    Ok(())
}
