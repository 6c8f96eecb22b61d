use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use utftable::archive::{Afs2Archive, ArchiveData};
use utftable::extract::{ExtractOptions, Extractor};
use utftable::table::{MaskKey, Table, TableReader, WriterSettings};
use utftable::Container;

#[derive(Parser)]
#[command(name = "utf", about = "Inspect and build @UTF tables and AFS2 archives")]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    Adx,
    Adx2,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a table's schema and header
    Info {
        input: PathBuf,
    },
    /// Decode a table to JSON
    Dump {
        input: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Encode a JSON table document
    Build {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Replace the document's writer settings
        #[arg(long, value_enum)]
        preset: Option<Preset>,
        /// Mask key xor byte (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_byte, requires = "mask_mul")]
        mask_xor: Option<u8>,
        /// Mask key multiplier byte
        #[arg(long, value_parser = parse_byte, requires = "mask_xor")]
        mask_mul: Option<u8>,
    },
    /// List the entries of an AFS2 archive
    Afs2List {
        input: PathBuf,
    },
    /// Extract every AFS2 entry as <id>.bin
    Afs2Extract {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(short, long, default_value = "4")]
        threads: usize,
        /// Run jobs one at a time
        #[arg(long)]
        sequential: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match cli.command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let mut reader = TableReader::open(&input)?;
            let header = reader.header().clone();

            println!("── @UTF Table ───────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Name           {}", reader.table_name());
            println!("  Encoding       {}", reader.encoding().name());
            match reader.mask_key() {
                Some(k) => println!("  Mask key       xor={:#04x} mul={:#04x}", k.xor, k.multiplier),
                None    => println!("  Mask key       none"),
            }
            println!("  Length         {} B", header.length);
            println!("  Row length     {} B", header.row_length);
            println!("  Rows           {}", reader.row_count());
            println!("  Fields ({}):", reader.field_count());
            for index in 0..reader.field_count() {
                let Some(field) = reader.field(index)? else { continue };
                match field.default_value() {
                    Some(v) => println!("    {:<24} {:<6} {:?} = {}", field.name(), field.field_type(), field.storage(), v.to_json()),
                    None    => println!("    {:<24} {:<6} {:?}", field.name(), field.field_type(), field.storage()),
                }
            }
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, output } => {
            let table = Table::read(BufReader::new(File::open(&input)?))?;
            let json = table.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Wrote: {}", path.display());
                }
                None => println!("{json}"),
            }
        }

        // ── Build ────────────────────────────────────────────────────────────
        Commands::Build { input, output, preset, mask_xor, mask_mul } => {
            let mut table = Table::from_json(&std::fs::read_to_string(&input)?)?;
            if let Some(preset) = preset {
                let mask = table.settings().mask;
                *table.settings_mut() = match preset {
                    Preset::Default => WriterSettings::default(),
                    Preset::Adx     => WriterSettings::adx(),
                    Preset::Adx2    => WriterSettings::adx2(),
                };
                table.settings_mut().mask = mask;
            }
            if let (Some(xor), Some(mul)) = (mask_xor, mask_mul) {
                table.settings_mut().mask = Some(MaskKey::new(xor, mul));
            }
            table.save_path(&output)?;
            println!("Created: {} ({} fields, {} rows)", output.display(), table.fields().len(), table.rows().len());
        }

        // ── AFS2 list ────────────────────────────────────────────────────────
        Commands::Afs2List { input } => {
            let ar: Afs2Archive = Afs2Archive::load_path(&input)?;
            println!("Archive: {}  (align {}, sub-key {:#06x})", input.display(), ar.align(), ar.sub_key());
            println!("{:>10} {:>12} {:>12}", "Id", "Position", "Length");
            for entry in ar.entries() {
                if let ArchiveData::Stored { position, length } = entry.data {
                    println!("{:>10} {:>12} {:>12}", entry.id, position, length);
                }
            }
        }

        // ── AFS2 extract ─────────────────────────────────────────────────────
        Commands::Afs2Extract { input, output_dir, threads, sequential } => {
            let ar: Afs2Archive = Afs2Archive::load_path(&input)?;
            let options = ExtractOptions { max_threads: threads, parallel: !sequential, ..ExtractOptions::default() };
            let mut extractor = Extractor::new(options);
            for entry in ar.entries() {
                if let ArchiveData::Stored { position, length } = entry.data {
                    extractor.add_from_path(&input, output_dir.join(format!("{}.bin", entry.id)), position, length);
                }
            }

            let report = extractor.run(Some(&mut |pct| {
                eprint!("\r  {pct:6.2}%");
                let _ = std::io::stderr().flush();
            }));
            eprintln!();
            for e in &report.errors {
                eprintln!("  failed  {e}");
            }
            println!("Extracted {} of {} entries ({} B) to: {}",
                report.completed, ar.len(), report.bytes, output_dir.display());
            if !report.is_success() {
                return Err(format!("{} entries failed", report.errors.len()).into());
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None      => s.parse(),
    };
    parsed.map_err(|e| format!("'{s}' is not a byte: {e}"))
}
