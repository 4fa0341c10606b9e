// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const GENOME: &str = "GCTAAAGACAATTACATAACATACACGTCAGCACGAAACTTGTTGGCCCAGTGTGAATCGCTTAAGGGTTAAGTAAGTGTGATGCATACGCCTTTACTTGCTGTGTCCACCCCATCGGACTGGCATTTTTATTACACTCAGAAACAGAACTCGGGTAATTTTGACAGGTCACGCAGAGGCGCGCCCTCCTGAAGTGCGTGGACACTCGCTATGAATCTCTGATTTACCCACTCTGCCAAACTCCAGCGCG";

fn write_reads(dir: &Path) -> String {
    let fa = dir.join("reads.fa");
    fs::write(
        &fa,
        format!(">a\n{}\n>b\n{}\n", &GENOME[..200], &GENOME[50..250]),
    )
    .unwrap();
    let list = dir.join("reads.lst");
    fs::write(&list, format!("{}\n", fa.display())).unwrap();
    list.display().to_string()
}

#[test]
fn dovetail_pair_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_reads(dir.path());
    let ovs = dir.path().join("out.ovs");
    let txt = dir.path().join("out.txt");

    Command::cargo_bin("wgs_ovl")
        .unwrap()
        .args(&["-k", "16", "-e", "0.05", "-v", "40", "-t", "1"])
        .args(&["--hashbits", "12", "--text"])
        .arg(&txt)
        .arg(&list)
        .arg(&ovs)
        .assert()
        .success();

    let text = fs::read_to_string(&txt).unwrap();
    assert_eq!(text, "1\t2\tN\t50\t50\t0.0000\n");
    // one fixed width binary record per overlap
    assert_eq!(fs::metadata(&ovs).unwrap().len(), 24);
}

#[test]
fn refined_run_reports_the_same_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_reads(dir.path());
    let ovs = dir.path().join("out.ovs");
    let txt = dir.path().join("out.txt");

    Command::cargo_bin("wgs_ovl")
        .unwrap()
        .args(&["-k", "16", "-e", "0.05", "-v", "40", "-t", "1"])
        .args(&["--hashbits", "12", "--refine", "--text"])
        .arg(&txt)
        .arg(&list)
        .arg(&ovs)
        .assert()
        .success();

    let text = fs::read_to_string(&txt).unwrap();
    assert_eq!(text, "1\t2\tN\t50\t50\t0.0000\n");
    assert_eq!(fs::metadata(&ovs).unwrap().len(), 24);
}

#[test]
fn min_overlap_longer_than_the_overlap_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_reads(dir.path());
    let ovs = dir.path().join("out.ovs");

    Command::cargo_bin("wgs_ovl")
        .unwrap()
        .args(&["-k", "16", "-v", "190", "-t", "1", "--hashbits", "12"])
        .arg(&list)
        .arg(&ovs)
        .assert()
        .success();
    assert_eq!(fs::metadata(&ovs).unwrap().len(), 0);
}

#[test]
fn bad_memory_class_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_reads(dir.path());
    let ovs = dir.path().join("out.ovs");

    Command::cargo_bin("wgs_ovl")
        .unwrap()
        .args(&["-M", "3GB"])
        .arg(&list)
        .arg(&ovs)
        .assert()
        .failure()
        .stderr(predicate::str::contains("3GB"));
}

#[test]
fn bad_hash_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_reads(dir.path());
    let ovs = dir.path().join("out.ovs");

    Command::cargo_bin("wgs_ovl")
        .unwrap()
        .args(&["-h", "10-2"])
        .arg(&list)
        .arg(&ovs)
        .assert()
        .failure();
}
