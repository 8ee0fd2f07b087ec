pub use anyhow::Result as R;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wavemap_lib::*;

#[derive(Parser, Debug)]
#[command(name = "wavemap")]
#[command(about = env!("CARGO_PKG_DESCRIPTION"), long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show how each file's samples would be mapped
    Info {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[arg(long, value_name = "ORDER", default_value = "C", help = "Axis order, C or F")]
        order: String,

        #[arg(long, help = "Keep mono files two-dimensional")]
        always_2d: bool,

        #[arg(long, help = "Map unsupported encodings as raw bytes")]
        raw: bool,
    },
    /// Copy the samples of one WAVE file into a new one
    Copy {
        #[arg(value_name = "SRC")]
        src: PathBuf,

        #[arg(value_name = "DST")]
        dst: PathBuf,
    },
}

fn info(files: &[PathBuf], options: &ReadOptions) -> R<()> {
    for path in files {
        let mut diagnostics = Diagnostics::collect();
        let m = AudioMapping::open(path, options, &mut diagnostics)?;
        println!("{}", path.display());
        println!("  type:        {}", m.sample_type());
        println!("  shape:       {} ({})", m.shape(), m.order());
        println!("  sample rate: {}", m.sample_rate());
        println!("  duration:    {:.3}s", m.duration());
        println!("  offset:      {}", m.offset());
        println!("  roffset:     {}", m.roffset());
        for message in diagnostics.messages() {
            println!("  warning:     {}", message);
        }
    }
    Ok(())
}

fn run(args: Args) -> R<()> {
    match args.command {
        Command::Info {
            files,
            order,
            always_2d,
            raw,
        } => {
            let options = ReadOptions {
                order: order.parse()?,
                always_2d,
                raw_fallback: raw,
                ..Default::default()
            };
            info(&files, &options)
        }
        Command::Copy { src, dst } => {
            let start_time = std::time::Instant::now();
            let out = copy(&src, &dst)?;
            println!(
                "ok: {} -> {} ({} frames in {:.3} seconds)",
                src.display(),
                dst.display(),
                out.frames(),
                start_time.elapsed().as_secs_f32()
            );
            Ok(())
        }
    }
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
