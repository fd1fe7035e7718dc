use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Collect `*.txt` enhancement configs, sorted for a stable embedding order.
fn find_config_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
    let configs_dir = Path::new(&manifest_dir).join("src/enhancement-configs");

    let files = find_config_files(&configs_dir);
    if files.is_empty() {
        println!("cargo:warning=No enhancement configs found in src/enhancement-configs/");
    }

    let mut entries = Vec::new();
    for file in &files {
        let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
            println!("cargo:warning=Skipping config with non UTF-8 name: {}", file.display());
            continue;
        };
        let source = file.to_string_lossy().replace('\\', "/");
        entries.push(format!("    ({stem:?}, include_str!({source:?})),"));
    }

    let generated_code = format!(
        "/// Packaged enhancement configs as (file stem, DSL text)\npub(crate) static EMBEDDED_CONFIGS: &[(&str, &str)] = &[\n{}\n];\n",
        entries.join("\n")
    );

    let output_path = Path::new(&out_dir).join("embedded_configs.rs");
    fs::write(output_path, generated_code).unwrap();

    println!("cargo:rerun-if-changed=src/enhancement-configs");
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
    }
}
