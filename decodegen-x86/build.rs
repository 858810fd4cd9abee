// build.rs

use decodegen::driver::read_file;
use decodegen::{emit_module, load, CodegenConfig};
use std::env;
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed=DECODEGEN_TABLE");

    let table = match env::var_os("DECODEGEN_TABLE") {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(env::var("CARGO_MANIFEST_DIR")?).join("x86.table"),
    };
    println!("cargo:rerun-if-changed={}", table.display());

    let set = load(&read_file(&table)?)?;
    let module = emit_module(&set, &CodegenConfig::default())?;

    let out = PathBuf::from(env::var("OUT_DIR")?).join("decoder.rs");
    fs::write(&out, module)?;
    Ok(())
}
