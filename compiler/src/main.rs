use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};

use tmc::driver::{compute_provenance, CompileOptions};
use tmc::runtime::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    Source,
    Manifest,
    BuildInfo,
    Roundtrip,
}

#[derive(Parser, Debug)]
#[command(
    name = "tmc",
    version,
    about = "Tree Mapping Compiler — expands node mapping declarations into two-way tree converters"
)]
struct Cli {
    /// Declaration source file
    source: PathBuf,

    /// Output file path (`-` for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Source)]
    emit: EmitStage,

    /// JSON tree to convert A→B→A (with `--emit roundtrip`)
    #[arg(long)]
    tree: Option<PathBuf>,

    /// Declaration macro name
    #[arg(long = "macro", default_value = "map")]
    decl_macro: String,

    /// Seed table identifier
    #[arg(long, default_value = "A_TO_B")]
    seed_table: String,

    /// B→A registration function
    #[arg(long, default_value = "register_b_to_a")]
    register_fn: String,

    /// Tag of synthetic blocks rebuilt for block-body fields
    #[arg(long, default_value = "BlockStatement")]
    block_tag: String,

    /// Print compiler phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("tmc: source = {}", cli.source.display());
        eprintln!("tmc: output = {}", cli.output.display());
        eprintln!("tmc: emit   = {:?}", cli.emit);
    }

    if cli.emit == EmitStage::Roundtrip && cli.tree.is_none() {
        eprintln!("tmc: error: --emit roundtrip requires --tree FILE");
        std::process::exit(2);
    }

    let options = CompileOptions {
        decl_macro: cli.decl_macro.clone(),
        seed_table: cli.seed_table.clone(),
        register_fn: cli.register_fn.clone(),
        block_tag: cli.block_tag.clone(),
        ..CompileOptions::default()
    };

    // ── Read source ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("tmc: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };
    let path = cli.source.display().to_string();

    // ── Compile ──
    let output = match tmc::compile(&source, &options) {
        Ok(out) => out,
        Err(e) => {
            eprintln!("tmc: {}", e.to_diagnostic().render(&path, &source));
            std::process::exit(1);
        }
    };
    for diag in &output.diagnostics {
        eprintln!("tmc: {}", diag.render(&path, &source));
    }

    if cli.verbose {
        for t in &output.timings {
            eprintln!(
                "tmc: {:<8} {:>8.3} ms",
                t.phase,
                t.elapsed.as_secs_f64() * 1000.0
            );
        }
        eprintln!(
            "tmc: {} declarations, {} A-table entries, {} B-table entries",
            output.declarations,
            output.registry.len_a(),
            output.registry.len_b()
        );
    }

    // ── Emit ──
    let text = match cli.emit {
        EmitStage::Source => output.source.clone(),
        EmitStage::Manifest => to_json(&output.registry.manifest()),
        EmitStage::BuildInfo => to_json(&compute_provenance(&source, output.declarations)),
        EmitStage::Roundtrip => {
            let tree_path = cli.tree.as_deref().unwrap_or(Path::new("-"));
            roundtrip(&output.registry, &options, tree_path, &cli.output, cli.verbose)
        }
    };

    if let Err(e) = write_output(&cli.output, &text) {
        eprintln!("tmc: error: {}: {}", cli.output.display(), e);
        std::process::exit(2);
    }
}

/// Convert the tree A→B→A, write the result, and exit 1 if it changed.
fn roundtrip(
    registry: &tmc::registry::Registry,
    options: &CompileOptions,
    tree_path: &Path,
    output: &Path,
    verbose: bool,
) -> String {
    let tree: serde_json::Value = match std::fs::read_to_string(tree_path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("tmc: error: {}: {}", tree_path.display(), e);
            std::process::exit(2);
        }
    };

    let runtime = Runtime::new(registry, options);
    let b = match runtime.from_a(&tree) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("tmc: error: A→B: {}", e);
            std::process::exit(1);
        }
    };
    if verbose {
        eprintln!("tmc: B tree = {}", to_json(&b));
    }
    let back = match runtime.to_a(&b) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("tmc: error: B→A: {}", e);
            std::process::exit(1);
        }
    };

    let text = to_json(&back);
    if back != tree {
        if let Err(e) = write_output(output, &text) {
            eprintln!("tmc: error: {}: {}", output.display(), e);
            std::process::exit(2);
        }
        eprintln!("tmc: error: round trip changed the tree");
        std::process::exit(1);
    }
    text
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(s) => s + "\n",
        Err(e) => {
            eprintln!("tmc: error: serializing output: {}", e);
            std::process::exit(2);
        }
    }
}

fn write_output(path: &Path, text: &str) -> std::io::Result<()> {
    if path == Path::new("-") {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
        stdout.flush()
    } else {
        std::fs::write(path, text)
    }
}
