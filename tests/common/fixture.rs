use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use mlst::{kmer, KmerDb, KmerIndex, LocusInfo, Posting, ProfileRow, ProfileTable};
use tempfile::TempDir;

pub const K: usize = 5;

// A two-locus toy scheme. gyrB shares no canonical kmer with any adk
// sequence, so the loci cannot cross-vote.
pub const ADK_1: &[u8]     = b"ACGGTCTTAGCAATGGCCTA";
pub const ADK_2: &[u8]     = b"ACGGTCTTAGCAATGGCCTG";
pub const ADK_3: &[u8]     = b"ACGGTCTTACCAATGGCCTG";
pub const GYRB_1: &[u8]    = b"ATACACGTCAGCACGAAACT";

/// One substitution away from every adk allele (closest: ADK_3, G20->A).
pub const ADK_NOVEL: &[u8] = b"ACGGTCTTACCAATGGCCTA";

/// A self-contained on-disk scheme plus read sets, rooted in a tempdir.
pub struct Fixture {
    _tempdir: TempDir,
    pub db: PathBuf,
    /// Reads tiling ADK_1 and GYRB_1: a known ST.
    pub single_fastq: PathBuf,
    /// Reads tiling ADK_NOVEL and GYRB_1: a novel adk allele.
    pub novel_fastq: PathBuf,
    pub output_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tempdir = tempfile::tempdir().expect("Failed to create tempdir");
        let dir = tempdir.path();

        write_fasta(&dir.join("adk.fa"), "adk", &[ADK_1, ADK_2, ADK_3]);
        write_fasta(&dir.join("gyrB.fa"), "gyrB", &[GYRB_1]);

        let db_path = dir.join("scheme.db");
        build_db().save(&db_path).expect("Failed to write database");

        let single_fastq = dir.join("toy_1.fastq");
        write_fastq(&single_fastq, &[ADK_1, GYRB_1], 10);
        let novel_fastq = dir.join("nov_1.fastq");
        write_fastq(&novel_fastq, &[ADK_NOVEL, GYRB_1], 10);

        Fixture {
            db: db_path,
            single_fastq,
            novel_fastq,
            output_dir: dir.join("results"),
            _tempdir: tempdir,
        }
    }
}

/// Index every canonical kmer of every allele, with weight 1.
fn build_db() -> KmerDb {
    let loci_alleles: [&[&[u8]]; 2] = [&[ADK_1, ADK_2, ADK_3], &[GYRB_1]];

    let mut loci = Vec::new();
    let mut index = KmerIndex::default();
    for (locus_idx, alleles) in loci_alleles.iter().enumerate() {
        let name = if locus_idx == 0 { "adk" } else { "gyrB" };
        loci.push(LocusInfo {
            name: name.to_string(),
            allele_ids: (1..=alleles.len()).map(|id| id.to_string()).collect(),
            fasta: Some(PathBuf::from(format!("{name}.fa"))),
        });
        for (allele_idx, sequence) in alleles.iter().enumerate() {
            for window in sequence.windows(K) {
                let canon = kmer::canonical(window).into_owned();
                let postings = index.entry(canon).or_insert_with(Vec::new);
                match postings.iter_mut().find(|p| usize::from(p.locus) == locus_idx) {
                    Some(posting) => {
                        if !posting.alleles.contains(&(allele_idx as u16 + 1)) {
                            posting.alleles.push(allele_idx as u16 + 1);
                        }
                    }
                    None => postings.push(Posting {
                        locus: locus_idx as u16,
                        weight: 1,
                        alleles: vec![allele_idx as u16 + 1],
                    }),
                }
            }
        }
    }

    let profile = ProfileTable {
        loci: vec!["adk".to_string(), "gyrB".to_string()],
        rows: vec![
            profile_row("1", &["1", "1"], "CC-1"),
            profile_row("2", &["2", "1"], ""),
            profile_row("3", &["3", "1"], ""),
        ],
    };

    KmerDb { k: K, loci, index, profile: Some(profile) }
}

fn profile_row(st: &str, alleles: &[&str], clonal_complex: &str) -> ProfileRow {
    ProfileRow {
        st: st.to_string(),
        alleles: alleles.iter().map(ToString::to_string).collect(),
        clonal_complex: clonal_complex.to_string(),
    }
}

fn write_fasta(path: &Path, locus: &str, sequences: &[&[u8]]) {
    let mut file = File::create(path).expect("Failed to create fasta");
    for (idx, sequence) in sequences.iter().enumerate() {
        writeln!(file, ">{locus}_{}", idx + 1).unwrap();
        file.write_all(sequence).unwrap();
        writeln!(file).unwrap();
    }
}

/// Write `copies` full-length reads of each sequence, fastq-formatted.
fn write_fastq(path: &Path, sequences: &[&[u8]], copies: usize) {
    let mut file = File::create(path).expect("Failed to create fastq");
    let mut read_id = 0;
    for _ in 0..copies {
        for sequence in sequences {
            read_id += 1;
            writeln!(file, "@read{read_id}").unwrap();
            file.write_all(sequence).unwrap();
            writeln!(file).unwrap();
            writeln!(file, "+").unwrap();
            writeln!(file, "{}", "I".repeat(sequence.len())).unwrap();
        }
    }
}
