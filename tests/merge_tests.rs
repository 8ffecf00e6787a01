//! Reassembly properties: identifier restore round trips and backfill
//! semantics across composed stages.

use asmpolish_lib::fasta;
use asmpolish_lib::merge;
use asmpolish_lib::naming;
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

#[test]
fn normalized_run_round_trips_identifiers_and_backfills() {
    let dir = TempDir::new().unwrap();

    // input genome with headers the alignment toolkit cannot address
    let genome = dir.path().join("genome.fasta");
    fs::write(
        &genome,
        ">contig A\nACGTACGT\n>contig#1\nTTTTTTTT\n>scaffold|3\nGGGGGGGG\n",
    )
    .unwrap();

    let assembly = dir.path().join("assembly.fasta");
    let table_path = dir.path().join("correspondence.tsv");
    let table = naming::normalize_assembly(&genome, &assembly, &table_path).unwrap();
    assert_eq!(table.len(), 3);

    // the engine polished only two of the three normalized sequences
    let polished_dir = dir.path().join("polished_chunks");
    fs::create_dir(&polished_dir).unwrap();
    fs::write(polished_dir.join("chunk_1.fasta"), ">Contig0_polished\nACGAACGA\n").unwrap();
    fs::write(polished_dir.join("chunk_1.changes"), "Contig0\t4\tT->A\n").unwrap();
    fs::write(polished_dir.join("chunk_2.fasta"), ">Contig1_polished\nTTTTTTTA\n").unwrap();
    fs::write(polished_dir.join("chunk_2.changes"), "Contig1\t8\tT->A\n").unwrap();

    let tmp_fasta = dir.path().join("polished.fasta.tmp");
    let tmp_changes = dir.path().join("polished.changes.tmp");
    merge::merge_partition_outputs(&polished_dir, 2, &tmp_fasta, &tmp_changes).unwrap();

    let final_fasta = dir.path().join("polished.fasta");
    let final_changes = dir.path().join("polished.changes");
    let report = merge::restore_identifiers(
        &tmp_fasta,
        &tmp_changes,
        &table,
        &final_fasta,
        &final_changes,
    )
    .unwrap();
    assert_eq!(report.dropped_records, 0);
    assert_eq!(report.dropped_changes, 0);

    // restored headers are the originals, in partition order
    assert_eq!(
        fasta::header_lines(&final_fasta).unwrap(),
        vec!["contig A".to_string(), "contig#1".to_string()]
    );
    assert_eq!(
        fs::read_to_string(&final_changes).unwrap(),
        "contig A\t4\tT->A\ncontig#1\t8\tT->A\n"
    );

    // backfill completes the identifier set with the uncovered sequence
    let appended = merge::append_unpolished(&genome, &final_fasta).unwrap();
    assert_eq!(appended, 1);

    let final_set: HashSet<String> =
        fasta::header_lines(&final_fasta).unwrap().into_iter().collect();
    let input_set: HashSet<String> = fasta::header_lines(&genome).unwrap().into_iter().collect();
    assert_eq!(final_set, input_set);
}

#[test]
fn backfill_disabled_leaves_polished_subset_only() {
    let dir = TempDir::new().unwrap();
    let genome = dir.path().join("genome.fasta");
    fs::write(&genome, ">s1\nACGT\n>s2\nTTTT\n").unwrap();

    let polished_dir = dir.path().join("polished_chunks");
    fs::create_dir(&polished_dir).unwrap();
    fs::write(polished_dir.join("chunk_1.fasta"), ">s1_polished\nACGA\n").unwrap();
    fs::write(polished_dir.join("chunk_1.changes"), "s1\t4\tT->A\n").unwrap();

    let final_fasta = dir.path().join("polished.fasta");
    let final_changes = dir.path().join("polished.changes");
    merge::merge_partition_outputs(&polished_dir, 1, &final_fasta, &final_changes).unwrap();

    // without backfill the uncovered sequence is silently absent
    let headers = fasta::header_lines(&final_fasta).unwrap();
    assert_eq!(headers, vec!["s1_polished".to_string()]);
}

#[test]
fn remap_gaps_are_dropped_not_fatal() {
    let dir = TempDir::new().unwrap();

    let genome = dir.path().join("genome.fasta");
    fs::write(&genome, ">contig A\nACGT\n").unwrap();
    let assembly = dir.path().join("assembly.fasta");
    let table_path = dir.path().join("correspondence.tsv");
    let table = naming::normalize_assembly(&genome, &assembly, &table_path).unwrap();

    // engine output references a sequence the table never saw
    let tmp_fasta = dir.path().join("polished.fasta.tmp");
    fs::write(&tmp_fasta, ">Contig0_polished\nACGA\n>Ghost_polished\nTT\n").unwrap();
    let tmp_changes = dir.path().join("polished.changes.tmp");
    fs::write(&tmp_changes, "Contig0\t1\tA->C\nGhost\t2\tC->G\n").unwrap();

    let final_fasta = dir.path().join("polished.fasta");
    let final_changes = dir.path().join("polished.changes");
    let report = merge::restore_identifiers(
        &tmp_fasta,
        &tmp_changes,
        &table,
        &final_fasta,
        &final_changes,
    )
    .unwrap();

    assert_eq!(report.dropped_records, 1);
    assert_eq!(report.dropped_changes, 1);
    assert_eq!(fasta::header_lines(&final_fasta).unwrap(), vec!["contig A".to_string()]);
    assert_eq!(fs::read_to_string(&final_changes).unwrap(), "contig A\t1\tA->C\n");
}

#[test]
fn merge_is_tolerant_of_missing_ordinals() {
    let dir = TempDir::new().unwrap();
    let polished_dir = dir.path().join("polished_chunks");
    fs::create_dir(&polished_dir).unwrap();
    fs::write(polished_dir.join("chunk_2.fasta"), ">b\nCC\n").unwrap();
    fs::write(polished_dir.join("chunk_4.fasta"), ">d\nGG\n").unwrap();

    let out_fasta = dir.path().join("polished.fasta.tmp");
    let out_changes = dir.path().join("polished.changes.tmp");
    merge::merge_partition_outputs(&polished_dir, 5, &out_fasta, &out_changes).unwrap();

    assert_eq!(
        fasta::header_lines(&out_fasta).unwrap(),
        vec!["b".to_string(), "d".to_string()]
    );
    // no change logs existed at all: the unified log is empty
    assert_eq!(fs::read_to_string(&out_changes).unwrap(), "");
}
