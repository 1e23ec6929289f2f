use std::path::{Path, PathBuf};

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_alphavid")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "alphavid.exe"
            } else {
                "alphavid"
            });
            p
        })
}

/// Three 8x4 frames: mask on the left half, colour on the right.
fn write_sequence(dir: &Path) {
    let _ = std::fs::remove_dir_all(dir);
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..3u32 {
        let img = image::RgbaImage::from_fn(8, 4, |x, _| {
            if x < 4 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 255, 255])
            }
        });
        img.save(dir.join(format!("f{i:03}.png"))).unwrap();
    }
}

#[test]
fn cli_play_writes_composited_pngs() {
    let root = PathBuf::from("target").join("cli_smoke");
    let seq = root.join("seq");
    let out = root.join("out");
    write_sequence(&seq);
    let _ = std::fs::remove_dir_all(&out);

    let seq_arg = seq.to_string_lossy().to_string();
    let out_arg = out.to_string_lossy().to_string();
    let status = std::process::Command::new(exe())
        .args(["play", "--in", seq_arg.as_str(), "--width", "4", "--height", "4"])
        .args(["--out-dir", out_arg.as_str()])
        .status()
        .unwrap();

    assert!(status.success());
    let first = out.join("frame_00000.png");
    assert!(first.exists());
    let img = image::open(&first).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (4, 4));
    assert_eq!(img.get_pixel(2, 2).0, [0, 0, 255, 255]);
}

#[test]
fn cli_probe_reports_output_size() {
    let seq = PathBuf::from("target").join("cli_smoke").join("probe_seq");
    write_sequence(&seq);

    let seq_arg = seq.to_string_lossy().to_string();
    let out = std::process::Command::new(exe())
        .args(["probe", "--in", seq_arg.as_str()])
        .output()
        .unwrap();

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("output: 4x4"), "{stdout}");
    assert!(stdout.contains("frames: 3"), "{stdout}");
}
