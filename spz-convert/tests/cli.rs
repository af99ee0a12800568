use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use spz_codec::fs::{read_ply_file, read_spz_file};
use spz_codec::{save_splat_to_ply, GaussianCloud, PlyWriteOptions};

fn run<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_spz-convert"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to launch spz-convert")
}

/// Runs with the logger's default filter, as a user would.
fn run_default_logging<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_spz-convert"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to launch spz-convert")
}

fn write_sample_ply(path: &Path) {
    let mut cloud = GaussianCloud::with_capacity(8, 2, false);
    for (i, p) in cloud.positions.iter_mut().enumerate() {
        *p = (i as f32 - 12.0) * 0.5;
    }
    for q in cloud.rotations.chunks_exact_mut(4) {
        q[3] = 1.0;
    }
    cloud.sh.iter_mut().for_each(|v| *v = 0.125);
    let bytes = save_splat_to_ply(&cloud, &PlyWriteOptions::default()).unwrap();
    fs::write(path, bytes).unwrap();
}

#[test]
fn ply_to_spz_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.ply");
    let output = dir.path().join("output.spz");
    write_sample_ply(&input);

    let out = run([input.as_path(), output.as_path()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let cloud = read_spz_file(&output).unwrap();
    assert_eq!(cloud.num_points, 8);
    assert_eq!(cloud.sh_degree, 2);
}

#[test]
fn uppercase_extensions_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let ply = dir.path().join("INPUT.PLY");
    let spz = dir.path().join("MIDDLE.SPZ");
    let back = dir.path().join("back.ply");
    write_sample_ply(&ply);

    assert!(run([ply.as_path(), spz.as_path()]).status.success());
    let out = run([spz.as_path(), back.as_path(), Path::new("--normals")]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(read_ply_file(&back).unwrap().num_points, 8);
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.txt");
    let output = dir.path().join("output.spz");
    fs::write(&input, b"hello").unwrap();

    let out = run([input.as_path(), output.as_path()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(stderr.lines().count(), 1);
    assert!(stderr.starts_with("Error: "));
    assert!(stderr.contains("input.txt"));
    assert!(!output.exists());
}

#[test]
fn missing_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("absent.spz");
    let output = dir.path().join("absent.ply");

    let out = run([input.as_path(), output.as_path()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("absent.spz"));
    assert!(!output.exists());
}

#[test]
fn corrupt_spz_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("corrupt.spz");
    let output = dir.path().join("corrupt.ply");
    fs::write(&input, b"this is not an spz stream").unwrap();

    let out = run([input.as_path(), output.as_path(), Path::new("--async")]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("corrupt.spz"));
    assert!(!output.exists());
}

#[test]
fn failed_conversion_prints_one_line_with_default_logging() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.spz");
    let output = dir.path().join("bad.ply");
    fs::write(&input, b"garbage").unwrap();

    let out = run_default_logging([input.as_path(), output.as_path()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(stderr.lines().count(), 1, "{stderr}");
    assert!(stderr.starts_with("Error: "));
    assert!(stderr.contains("bad.spz"));
    assert!(!output.exists());
}
