use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");

    let crate_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
    let include_dir = PathBuf::from(&crate_dir).join("include");

    let bindings = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("WIFI_HTTP_H")
        .generate();

    match bindings {
        Ok(bindings) => {
            if std::fs::create_dir_all(&include_dir).is_ok() {
                bindings.write_to_file(include_dir.join("wifi_http.h"));
            }
        }
        Err(e) => println!("cargo:warning=could not generate C header: {e}"),
    }
}
