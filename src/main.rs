// coldstart - Ahead-of-time snapshot compiler
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use coldstart_core::{GlobalEnv, NamespaceRegistry, load_source};
use coldstart_emit::{Emission, Emitter, EmitterConfig, Snapshot, reconstruct};
use coldstart_parser::Heap;

const USAGE: &str = "\
Usage: coldstart [OPTIONS] <FILE>...

Evaluate bootstrap source files and emit a snapshot of the vars they define.

Options:
    -h, --help          Print this help message
    -v, --version       Print the version
    --out-dir <DIR>     Write interns.snap, statics.snap and fixups.snap to DIR
                        (default: print all three to stdout)
    --ns <NAME>         Initial namespace (default: coldstart.core)
    --ignore <HEAD>     Skip top-level forms with this head (repeatable)
    --verify            Rebuild the snapshot in a fresh environment and compare
    --verbose           Log at debug level unless RUST_LOG says otherwise
";

#[derive(Debug)]
struct Options {
    files: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    initial_ns: String,
    ignored_heads: Vec<String>,
    verify: bool,
    verbose: bool,
}

fn main() {
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        print!("{}", USAGE);
        return;
    }
    if args.contains(["-v", "--version"]) {
        println!("coldstart v{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let options = match parse_options(args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprint!("{}", USAGE);
            process::exit(1);
        }
    };

    let level = if options.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&options) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn parse_options(mut args: pico_args::Arguments) -> Result<Options, String> {
    let out_dir = args
        .opt_value_from_str::<_, PathBuf>("--out-dir")
        .map_err(|e| e.to_string())?;
    let initial_ns = args
        .opt_value_from_str::<_, String>("--ns")
        .map_err(|e| e.to_string())?
        .unwrap_or_else(|| NamespaceRegistry::CORE_NS.to_string());
    let ignored_heads = args
        .values_from_str::<_, String>("--ignore")
        .map_err(|e| e.to_string())?;
    let verify = args.contains("--verify");
    let verbose = args.contains("--verbose");

    let mut files = Vec::new();
    for arg in args.finish() {
        let arg = PathBuf::from(arg);
        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option '{}'", arg.display()));
        }
        files.push(arg);
    }
    if files.is_empty() {
        return Err("no input files".to_string());
    }

    Ok(Options {
        files,
        out_dir,
        initial_ns,
        ignored_heads,
        verify,
        verbose,
    })
}

/// Load every file, emit, then write and optionally verify the snapshot.
fn run(options: &Options) -> Result<(), String> {
    let mut heap = Heap::new();
    let mut env = GlobalEnv::new(&mut heap);
    env.namespaces_mut()
        .set_current(&mut heap, &options.initial_ns);

    let mut emitter = Emitter::new(EmitterConfig {
        initial_ns: options.initial_ns.clone(),
        ignored_heads: options.ignored_heads.clone(),
    });
    for path in &options.files {
        load_file(path, &mut heap, &mut env, &mut emitter)?;
    }

    let Emission {
        snapshot,
        diagnostics,
    } = emitter
        .finish(&heap, &env)
        .map_err(|e| format!("Emission failed: {}", e))?;
    if !diagnostics.is_empty() {
        log::info!("{} definitions or forms skipped", diagnostics.len());
    }

    match &options.out_dir {
        Some(dir) => write_streams(&snapshot, dir)?,
        None => print_streams(&snapshot).map_err(|e| format!("Error writing output: {}", e))?,
    }

    if options.verify {
        verify(&snapshot, &heap, &env)?;
    }
    Ok(())
}

/// Evaluate one source file and record its top-level forms.
fn load_file(
    path: &Path,
    heap: &mut Heap,
    env: &mut GlobalEnv,
    emitter: &mut Emitter,
) -> Result<(), String> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("Error reading '{}': {}", path.display(), e))?;
    let file = path.to_string_lossy();
    let forms = load_source(heap, env, &source, Some(&file))
        .map_err(|e| format!("Error in '{}': {}", path.display(), e))?;
    log::debug!("loaded {} forms from {}", forms.len(), file);

    for form in forms {
        emitter
            .record_top_level_form(heap, form)
            .map_err(|e| format!("Error in '{}': {}", path.display(), e))?;
    }
    Ok(())
}

fn write_streams(snapshot: &Snapshot, dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir)
        .map_err(|e| format!("Error creating '{}': {}", dir.display(), e))?;
    let streams = [
        ("interns.snap", snapshot.render_interns()),
        ("statics.snap", snapshot.render_statics()),
        ("fixups.snap", snapshot.render_fixups()),
    ];
    for (name, text) in streams {
        let path = dir.join(name);
        fs::write(&path, text).map_err(|e| format!("Error writing '{}': {}", path.display(), e))?;
        log::debug!("wrote {}", path.display());
    }
    Ok(())
}

fn print_streams(snapshot: &Snapshot) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, ";; interns")?;
    write!(out, "{}", snapshot.render_interns())?;
    writeln!(out, "\n;; statics")?;
    write!(out, "{}", snapshot.render_statics())?;
    writeln!(out, "\n;; fixups")?;
    write!(out, "{}", snapshot.render_fixups())?;
    out.flush()
}

/// Rebuild `snapshot` from scratch and compare every var it defines.
fn verify(snapshot: &Snapshot, heap: &Heap, env: &GlobalEnv) -> Result<(), String> {
    let mut fresh = Heap::new();
    let mut fresh_env = GlobalEnv::new(&mut fresh);
    let rebuilt = reconstruct(snapshot, &mut fresh, &mut fresh_env)
        .map_err(|e| format!("Reconstruction failed: {}", e))?;

    let mismatches = rebuilt.mismatches(heap, env, &fresh);
    for name in &mismatches {
        log::error!("{} differs after reconstruction", name);
    }
    if !mismatches.is_empty() {
        return Err(format!(
            "Verification failed: {} vars differ",
            mismatches.len()
        ));
    }
    eprintln!("Verified {} vars", rebuilt.vars().count());
    Ok(())
}
