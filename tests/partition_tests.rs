//! Partitioner and identifier-normalization properties.

use asmpolish_lib::fasta;
use asmpolish_lib::naming::{self, CorrespondenceTable};
use asmpolish_lib::partition::PartitionSet;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_genome(dir: &Path, name: &str, records: &[(&str, usize)]) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    for (header, length) in records {
        writeln!(file, ">{header}").unwrap();
        writeln!(file, "{}", "ACGT".repeat(length / 4 + 1)[..*length].to_string()).unwrap();
    }
    path
}

fn chunk_headers(set: &PartitionSet) -> Vec<Vec<String>> {
    set.partitions().iter().map(|p| fasta::header_lines(&p.fasta).unwrap()).collect()
}

#[test]
fn six_equal_sequences_make_three_even_partitions() {
    let dir = TempDir::new().unwrap();
    let records: Vec<(&str, usize)> =
        ["s1", "s2", "s3", "s4", "s5", "s6"].iter().map(|n| (*n, 100)).collect();
    let genome = write_genome(dir.path(), "genome.fasta", &records);

    let chunks = dir.path().join("chunks");
    fs::create_dir(&chunks).unwrap();
    let set = PartitionSet::build(&genome, 3, &chunks).unwrap();

    assert_eq!(set.len(), 3);
    for (i, p) in set.partitions().iter().enumerate() {
        assert_eq!(p.ordinal, i + 1);
        assert_eq!(p.sequences, 2);
        assert_eq!(p.bases, 200);
    }
    assert_eq!(
        chunk_headers(&set),
        vec![
            vec!["s1".to_string(), "s2".to_string()],
            vec!["s3".to_string(), "s4".to_string()],
            vec!["s5".to_string(), "s6".to_string()],
        ]
    );
}

#[test]
fn region_lists_cover_each_sequence_end_to_end() {
    let dir = TempDir::new().unwrap();
    let genome = write_genome(dir.path(), "genome.fasta", &[("s1", 120), ("s2", 80)]);

    let set = PartitionSet::build(&genome, 1, dir.path()).unwrap();
    assert_eq!(set.len(), 1);

    let bed = fs::read_to_string(&set.partitions()[0].regions).unwrap();
    assert_eq!(bed, "s1\t0\t120\ns2\t0\t80\n");
}

#[test]
fn partitions_are_complete_and_disjoint() {
    let dir = TempDir::new().unwrap();
    let records =
        [("a", 37), ("b", 250), ("c", 12), ("d", 99), ("e", 340), ("f", 7), ("g", 61)];
    let genome = write_genome(dir.path(), "genome.fasta", &records);

    let set = PartitionSet::build(&genome, 4, dir.path()).unwrap();

    let mut seen: HashSet<String> = HashSet::new();
    let mut in_order: Vec<String> = Vec::new();
    for headers in chunk_headers(&set) {
        for header in headers {
            // disjoint: no sequence appears in two partitions
            assert!(seen.insert(header.clone()), "{header} assigned twice");
            in_order.push(header);
        }
    }
    // complete, and ordinal order matches input encounter order
    let expected: Vec<String> = records.iter().map(|(n, _)| (*n).to_string()).collect();
    assert_eq!(in_order, expected);
}

#[test]
fn partitioning_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let records = [("a", 37), ("b", 250), ("c", 12), ("d", 99), ("e", 340)];
    let genome = write_genome(dir.path(), "genome.fasta", &records);

    let first_dir = dir.path().join("first");
    let second_dir = dir.path().join("second");
    fs::create_dir(&first_dir).unwrap();
    fs::create_dir(&second_dir).unwrap();

    let first = PartitionSet::build(&genome, 3, &first_dir).unwrap();
    let second = PartitionSet::build(&genome, 3, &second_dir).unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.partitions().iter().zip(second.partitions()) {
        assert_eq!(fs::read(&a.fasta).unwrap(), fs::read(&b.fasta).unwrap());
        assert_eq!(fs::read(&a.regions).unwrap(), fs::read(&b.regions).unwrap());
    }
}

#[test]
fn more_partitions_than_sequences_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let genome = write_genome(dir.path(), "genome.fasta", &[("s1", 50), ("s2", 50)]);

    let set = PartitionSet::build(&genome, 5, dir.path()).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.partitions()[0].sequences, 1);
    assert_eq!(set.partitions()[1].sequences, 1);
}

#[test]
fn normalization_scenario_produces_exact_table() {
    let dir = TempDir::new().unwrap();
    let genome = dir.path().join("genome.fasta");
    fs::write(&genome, ">contig A\nACGTACGT\n>contig#1\nTTTTTTTT\n").unwrap();

    assert!(fasta::headers_need_normalizing(&genome).unwrap());

    let assembly = dir.path().join("assembly.fasta");
    let table_path = dir.path().join("correspondence.tsv");
    let table = naming::normalize_assembly(&genome, &assembly, &table_path).unwrap();

    assert_eq!(
        fasta::header_lines(&assembly).unwrap(),
        vec!["Contig0".to_string(), "Contig1".to_string()]
    );

    let text = fs::read_to_string(&table_path).unwrap();
    assert_eq!(text, "Contig0\tcontig A\nContig1\tcontig#1\n");

    // bijection round trip through a reloaded table
    let reloaded = CorrespondenceTable::load(&table_path).unwrap();
    assert_eq!(reloaded.resolve("Contig0"), Some("contig A"));
    assert_eq!(reloaded.resolve("Contig1"), Some("contig#1"));
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn clean_headers_skip_normalization() {
    let dir = TempDir::new().unwrap();
    let genome = write_genome(dir.path(), "genome.fasta", &[("scaffold_1", 40), ("tig-2", 40)]);
    assert!(!fasta::headers_need_normalizing(&genome).unwrap());
}
