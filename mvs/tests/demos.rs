//! Every program under `demos/` must compile to IR.

use std::fs;
use std::path::PathBuf;

use mvs_backend_llvm::{emit_program, CodegenOptions};
use mvs_core::{check_program, CheckOptions};

#[test]
fn all_demo_programs_compile() {
    let demos = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../demos");
    let mut seen = 0usize;

    let mut entries: Vec<PathBuf> = fs::read_dir(&demos)
        .expect("demos directory exists")
        .map(|e| e.expect("readable directory entry").path())
        .filter(|p| p.extension().is_some_and(|e| e == "mvs"))
        .collect();
    entries.sort();

    for path in entries {
        let src = fs::read_to_string(&path).expect("demo sources are readable");
        let program = mvs_parse::parse_source(&src)
            .unwrap_or_else(|e| panic!("{} failed to parse: {e:?}", path.display()));
        let typed = check_program(&program, CheckOptions::default())
            .unwrap_or_else(|e| panic!("{} failed to check: {e:?}", path.display()));
        let opts = CodegenOptions {
            source_name: path.display().to_string(),
            ..CodegenOptions::default()
        };
        let artifacts = emit_program(&typed, &opts)
            .unwrap_or_else(|e| panic!("{} failed to lower: {e}", path.display()));
        assert!(artifacts.llvm_ir.contains("define i32 @main()"));
        seen += 1;
    }
    assert!(seen >= 5, "expected the demo programs to be present");
}
