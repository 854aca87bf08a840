use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(prefix: &str, ext: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push("harness-tests");
    let _ = std::fs::create_dir_all(&dir);

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    dir.join(format!("{}-{}.{}", prefix, nonce, ext))
}

fn write_temp_file(prefix: &str, ext: &str, contents: &[u8]) -> PathBuf {
    let path = temp_path(prefix, ext);
    std::fs::write(&path, contents).expect("Failed to write temp file");
    path
}

/// 4 KiB RAM at zero, console right behind it.
fn small_config() -> PathBuf {
    write_temp_file(
        "config",
        "yaml",
        br#"
ram:
  base: 0
  size: 4096
console:
  base: 1073741824
"#,
    )
}

/// Vector table with SP at the top of RAM and the reset handler at 0x8.
fn boot_image(len: usize) -> Vec<u8> {
    let mut image = vec![0u8; len];
    image[..4].copy_from_slice(&0x1000u32.to_le_bytes());
    image[4..8].copy_from_slice(&0x9u32.to_le_bytes());
    image
}

fn harness() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_harness"));
    cmd.stdin(Stdio::null());
    cmd
}

#[test]
fn test_cli_help() {
    let output = harness()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("LabWired Harness"));
}

#[test]
fn test_cli_missing_image_argument() {
    let output = harness().output().expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Usage"));
    assert!(!stderr.contains("Loading image"));
}

#[test]
fn test_cli_unreadable_image() {
    let output = harness()
        .arg("non_existent_image.bin")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_cli_image_one_byte_too_large() {
    let config = small_config();
    let image = write_temp_file("too-large", "bin", &boot_image(4097));

    let output = harness()
        .args(["--config", config.to_str().unwrap()])
        .args(["--max-steps", "1"])
        .arg(&image)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!stderr.contains("Starting simulation"));

    let _ = std::fs::remove_file(&config);
    let _ = std::fs::remove_file(&image);
}

#[test]
fn test_cli_image_of_exact_capacity_runs() {
    let config = small_config();
    let image = write_temp_file("exact", "bin", &boot_image(4096));
    let snapshot = temp_path("snapshot", "json");

    let output = harness()
        .args(["--config", config.to_str().unwrap()])
        .args(["--max-steps", "4"])
        .args(["--snapshot", snapshot.to_str().unwrap()])
        .arg(&image)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(0));

    let content = std::fs::read_to_string(&snapshot).unwrap();
    let snap: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(snap["steps"], 4);
    let regs = snap["cpu"]["registers"].as_array().unwrap();
    assert_eq!(regs.len(), 16);
    // four halfwords past the reset handler
    assert_eq!(regs[15], 0x10);
    assert_eq!(regs[13], 0x1000);

    let _ = std::fs::remove_file(&config);
    let _ = std::fs::remove_file(&image);
    let _ = std::fs::remove_file(&snapshot);
}

#[test]
fn test_cli_overlapping_config_is_rejected() {
    let config = write_temp_file(
        "overlap",
        "yaml",
        br#"
ram:
  base: 0
  size: 8192
console:
  base: 4096
"#,
    );
    let image = write_temp_file("small", "bin", &boot_image(16));

    let output = harness()
        .args(["--config", config.to_str().unwrap()])
        .arg(&image)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));

    let _ = std::fs::remove_file(&config);
    let _ = std::fs::remove_file(&image);
}

#[test]
fn test_cli_fetch_past_ram_end_is_reported() {
    let config = write_temp_file(
        "odd-ram",
        "yaml",
        br#"
ram:
  base: 0
  size: 4095
console:
  base: 1073741824
"#,
    );
    // reset handler in the last byte of RAM, so the first fetch straddles the end
    let mut bytes = boot_image(16);
    bytes[4..8].copy_from_slice(&0xFFFu32.to_le_bytes());
    let image = write_temp_file("straddle", "bin", &bytes);

    let output = harness()
        .args(["--config", config.to_str().unwrap()])
        .args(["--max-steps", "5"])
        .arg(&image)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(0));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("RAM fault: 2-byte load at 0x00000ffe"));
    assert_eq!(stderr.matches("Core reported lockup").count(), 1);

    let _ = std::fs::remove_file(&config);
    let _ = std::fs::remove_file(&image);
}

#[test]
fn test_cli_ram_too_small_for_vector_table() {
    let config = write_temp_file(
        "tiny-ram",
        "yaml",
        br#"
ram:
  base: 0
  size: 4
"#,
    );
    let image = write_temp_file("tiny", "bin", &[0; 4]);

    let output = harness()
        .args(["--config", config.to_str().unwrap()])
        .arg(&image)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));

    let _ = std::fs::remove_file(&config);
    let _ = std::fs::remove_file(&image);
}
