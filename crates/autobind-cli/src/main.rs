//! autobind CLI
//!
//! Inspect what autobind discovers in a C library's headers and manage the
//! binding cache.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use autobind_cache::CacheStore;
use autobind_callback::{trampolines, CallbackSignature, SHAPES};
use autobind_core::{CFunctionSignature, CParam, CType, Config, Registry};
use autobind_parser::{HeaderDiscovery, LoadReport, LoadSource, ModuleLoader, Platform};

#[derive(Parser)]
#[command(name = "autobind")]
#[command(author, version, about = "Automatic C library bindings", long_about = None)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a library's headers and summarize the bindings
    Scan {
        /// Shared library path or name (e.g. libz.so.1)
        #[arg(value_name = "LIBRARY")]
        library: PathBuf,

        /// Module alias (default: derived from the library name)
        #[arg(short, long)]
        alias: Option<String>,

        /// Header to parse; repeatable. Discovered when omitted
        #[arg(long = "header", value_name = "HEADER")]
        headers: Vec<PathBuf>,

        /// Extra directory to search for headers; repeatable
        #[arg(short = 'I', long = "include", value_name = "DIR")]
        include: Vec<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// List every constant, function and struct
        #[arg(short, long)]
        details: bool,

        /// Skip the binding cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Manage the binding cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// List callback shapes with a fixed trampoline, or check one signature
    Shapes {
        /// Signature to check, e.g. "pointer,pointer->int"
        #[arg(value_name = "SIGNATURE")]
        signature: Option<String>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count and size
    Stats,
    /// Remove every cached snapshot
    Clear,
    /// Print the cache directory
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_logging(cli.verbose || config.parse.trace);

    match cli.command {
        Commands::Scan {
            library,
            alias,
            headers,
            include,
            format,
            details,
            no_cache,
        } => {
            cmd_scan(config, &library, alias, &headers, include, &format, details, no_cache)?;
        }
        Commands::Cache { action } => {
            cmd_cache(&config, action)?;
        }
        Commands::Shapes { signature } => {
            cmd_shapes(signature.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_arguments)]
fn cmd_scan(
    mut config: Config,
    library: &Path,
    alias: Option<String>,
    headers: &[PathBuf],
    include: Vec<PathBuf>,
    format: &str,
    details: bool,
    no_cache: bool,
) -> Result<()> {
    if no_cache {
        config.cache.enabled = false;
    }

    let alias = match alias.or_else(|| HeaderDiscovery::header_stem(library)) {
        Some(alias) => alias,
        None => bail!("cannot derive an alias from {}; pass --alias", library.display()),
    };

    let mut loader = ModuleLoader::with_defaults(config).context("failed to set up the module loader")?;
    if !include.is_empty() {
        let mut discovery = HeaderDiscovery::system(Platform::host().arch);
        for dir in include {
            discovery.add_root(dir);
        }
        loader = loader.with_discovery(discovery);
    }

    let registry = Registry::new();
    let report = loader
        .load(&registry, &alias, library, headers)
        .with_context(|| format!("failed to load bindings for {}", library.display()))?;
    debug!(alias = %alias, source = ?report.source, "scan finished");

    if format == "json" {
        let mut result = serde_json::json!({ "report": report });
        if details {
            result["tables"] = serde_json::to_value(registry.snapshot_alias(&alias))?;
        }
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&report);
        if details {
            print_details(&registry, &alias);
        }
    }

    Ok(())
}

fn print_report(report: &LoadReport) {
    let source = match report.source {
        LoadSource::Cache => "cache",
        LoadSource::Parsed => "parsed headers",
    };
    println!("Module '{}' ({})", report.alias, source);
    for header in &report.headers {
        println!("   header: {}", header.display());
    }
    println!();
    println!("   Constants: {}", report.constants);
    println!("   Enums:     {}", report.enums);
    println!("   Functions: {}", report.functions);
    println!("   Typedefs:  {}", report.typedefs);
    println!("   Structs:   {}", report.structs);
    if report.source == LoadSource::Parsed {
        println!("   Skipped:   {}", report.skipped);
    }
    if let Some(path) = &report.cache_file {
        println!("   Cached to: {}", path.display());
    }
    if !report.import_errors.is_empty() {
        println!();
        println!("Import errors:");
        for err in &report.import_errors {
            println!("   {}", err);
        }
    }
}

fn print_details(registry: &Registry, alias: &str) {
    let tables = registry.snapshot_alias(alias);

    if !tables.constants.is_empty() {
        println!();
        println!("Constants:");
        for (name, value) in &tables.constants {
            println!("   {} = {}", name, value);
        }
    }

    if !tables.enums.is_empty() {
        println!();
        println!("Enums:");
        for data in &tables.enums {
            println!("   {}", data.name);
            for member in &data.order {
                if let Some(value) = data.values.get(member) {
                    println!("      {} = {}", member, value);
                }
            }
        }
    }

    if !tables.structs.is_empty() {
        println!();
        println!("Structs:");
        for def in &tables.structs {
            println!("   {} (size {}, align {})", def.name, def.size, def.alignment);
            for field in &def.fields {
                let array = field.array_len.map(|n| format!("[{}]", n)).unwrap_or_default();
                println!(
                    "      +{:<4} {} {}{}",
                    field.offset,
                    type_text(&field.ctype, field.struct_name.as_deref()),
                    field.name,
                    array
                );
            }
        }
    }

    if !tables.signatures.is_empty() {
        println!();
        println!("Functions:");
        for sig in tables.signatures.values() {
            println!("   {}", signature_text(sig));
        }
    }
}

fn type_text(ctype: &CType, struct_name: Option<&str>) -> String {
    match (ctype, struct_name) {
        (CType::Pointer, Some(name)) => format!("struct {} *", name),
        _ => ctype.to_string(),
    }
}

fn param_text(param: &CParam) -> String {
    type_text(&param.ctype, param.struct_name.as_deref())
}

fn signature_text(sig: &CFunctionSignature) -> String {
    let mut params: Vec<String> = sig.params.iter().map(param_text).collect();
    if sig.variadic {
        params.push("...".to_string());
    }
    let params = if params.is_empty() {
        "void".to_string()
    } else {
        params.join(", ")
    };
    format!(
        "{} {}({})",
        type_text(&sig.return_type, sig.return_struct_name.as_deref()),
        sig.name,
        params
    )
}

fn cmd_cache(config: &Config, action: CacheAction) -> Result<()> {
    let store = CacheStore::from_config(&config.cache).context("failed to open the cache directory")?;
    let dir = config.cache.directory.display();

    match action {
        CacheAction::Stats => {
            let stats = store.stats();
            println!("Cache: {}", dir);
            if !store.is_enabled() {
                println!("   (disabled)");
            }
            println!("   Entries: {}", stats.total_entries);
            println!("   Size:    {}", stats.size_human());
        }
        CacheAction::Clear => {
            let removed = store
                .clear()
                .with_context(|| format!("failed to clear {}", dir))?;
            println!("Removed {} file(s) from {}", removed, dir);
        }
        CacheAction::Path => {
            println!("{}", dir);
        }
    }

    Ok(())
}

fn cmd_shapes(signature: Option<&str>) -> Result<()> {
    let Some(signature) = signature else {
        for shape in SHAPES {
            println!("{}", shape);
        }
        return Ok(());
    };

    let parsed = CallbackSignature::parse(signature)?;
    let canonical = parsed.canonical();
    match trampolines::lookup(&canonical) {
        Some(_) => println!("{}: fixed trampoline", canonical),
        None => println!("{}: needs a dynamic closure", canonical),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autobind_core::SignatureOrigin;

    #[test]
    fn test_cli_parses_scan() {
        let cli = Cli::try_parse_from([
            "autobind", "scan", "libz.so.1", "--header", "a.h", "--header", "b.h", "-f", "json", "--no-cache",
        ])
        .unwrap();
        match cli.command {
            Commands::Scan {
                library,
                alias,
                headers,
                format,
                no_cache,
                ..
            } => {
                assert_eq!(library, PathBuf::from("libz.so.1"));
                assert!(alias.is_none());
                assert_eq!(headers, vec![PathBuf::from("a.h"), PathBuf::from("b.h")]);
                assert_eq!(format, "json");
                assert!(no_cache);
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_cli_parses_cache_and_shapes() {
        let cli = Cli::try_parse_from(["autobind", "-v", "cache", "clear"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Cache { action: CacheAction::Clear }));

        let cli = Cli::try_parse_from(["autobind", "shapes", "ptr,ptr->int"]).unwrap();
        assert!(matches!(cli.command, Commands::Shapes { signature: Some(ref s) } if s == "ptr,ptr->int"));
    }

    #[test]
    fn test_signature_text() {
        let mut sig = CFunctionSignature::new("deflate", CType::Int);
        sig.params.push(CParam {
            name: Some("strm".into()),
            ctype: CType::Pointer,
            struct_name: Some("z_stream_s".into()),
        });
        sig.params.push(CParam::new(CType::Int));
        sig.origin = SignatureOrigin::Auto;
        assert_eq!(signature_text(&sig), "int deflate(struct z_stream_s *, int)");

        let mut printf = CFunctionSignature::new("gzprintf", CType::Int);
        printf.params.push(CParam::new(CType::Pointer));
        printf.variadic = true;
        assert_eq!(signature_text(&printf), "int gzprintf(void *, ...)");

        let none = CFunctionSignature::new("zlibVersion", CType::CString);
        assert_eq!(signature_text(&none), "char * zlibVersion(void)");
    }
}
