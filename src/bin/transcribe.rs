//! Command-line transcriber: WAV in, batch command files out.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use palette_dsp::library::{pitch, AtomProvider, LocalCacheProvider};
use palette_dsp::render::render_schedule;
use palette_dsp::schedule::writer::write_schedule;
use palette_dsp::{
    transcribe_audio, TranscriptionConfig, TranscriptionError, CANONICAL_SAMPLE_RATE,
};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Input mono WAV file at the canonical rate
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the batch command files
    #[arg(short, long)]
    output: PathBuf,

    /// Optional path for the rendered reconstruction WAV
    #[arg(short, long)]
    render: Option<PathBuf>,

    /// Directory of cached atom WAV files
    #[arg(short, long, default_value = "./atoms")]
    assets: PathBuf,

    /// Pitch variants per atom (1 disables pitch expansion)
    #[arg(long, default_value_t = 16)]
    pitch_steps: usize,

    /// Correlation pre-filter threshold in [0, 1]; omit to keep all placements
    #[arg(long)]
    prune: Option<f32>,

    /// Maximum solver iterations
    #[arg(long, default_value_t = 256)]
    iterations: usize,

    /// Report problems only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Increase verbosity (-v debug, -vv everything)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(args: &Args) {
    // Diagnostic verbosity only; never affects the transcription itself.
    let level = if args.quiet {
        LevelFilter::Warn
    } else {
        match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn load_input(path: &PathBuf) -> Result<Vec<f32>, TranscriptionError> {
    let mut reader = hound::WavReader::open(path).map_err(|e| {
        TranscriptionError::InvalidInput(format!("cannot open `{}`: {}", path.display(), e))
    })?;
    let spec = reader.spec();

    if spec.channels > 1 {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input");
        log::error!("stereo audio is not supported, convert the input to mono first");
        log::error!("help: ffmpeg -i {0}.wav -ac 1 {0}.mono.wav", stem);
        return Err(TranscriptionError::InvalidInput(format!(
            "`{}` has {} channels, expected mono",
            path.display(),
            spec.channels
        )));
    }

    if spec.sample_rate != CANONICAL_SAMPLE_RATE {
        return Err(TranscriptionError::InvalidInput(format!(
            "`{}` is at {} Hz, expected the canonical {} Hz (resample before transcribing)",
            path.display(),
            spec.sample_rate,
            CANONICAL_SAMPLE_RATE
        )));
    }

    let samples: Result<Vec<f32>, _> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_value))
                .collect()
        }
    };

    samples.map_err(|e| {
        TranscriptionError::InvalidInput(format!("failed to decode `{}`: {}", path.display(), e))
    })
}

fn write_render(path: &PathBuf, samples: &[f32]) -> Result<(), TranscriptionError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: CANONICAL_SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(|e| {
        TranscriptionError::OutputError(format!("cannot create `{}`: {}", path.display(), e))
    })?;
    for &s in samples {
        writer.write_sample(s).map_err(|e| {
            TranscriptionError::OutputError(format!("failed writing `{}`: {}", path.display(), e))
        })?;
    }
    writer.finalize().map_err(|e| {
        TranscriptionError::OutputError(format!("failed finalizing `{}`: {}", path.display(), e))
    })
}

fn run(args: &Args) -> Result<(), TranscriptionError> {
    // Setup phase: the library is acquired once, before any solving.
    let provider = LocalCacheProvider::new(&args.assets);
    let library = provider.load()?;
    let library = if args.pitch_steps > 1 {
        pitch::permute_with_pitch(&library, args.pitch_steps, 0.5, 2.0)?
    } else {
        library
    };

    let samples = load_input(&args.input)?;
    log::info!(
        "input `{}`: {} samples ({:.2}s)",
        args.input.display(),
        samples.len(),
        samples.len() as f32 / CANONICAL_SAMPLE_RATE as f32
    );

    let config = TranscriptionConfig {
        prune_correlation: args.prune,
        max_iterations: args.iterations,
        ..TranscriptionConfig::default()
    };

    let transcription = transcribe_audio(&samples, &library, &config)?;
    let meta = &transcription.metadata;
    log::info!(
        "solver: {} iterations, {} (objective {:.4e} -> {:.4e})",
        meta.solver.iterations,
        if meta.solver.converged {
            "converged"
        } else {
            "truncated"
        },
        meta.solver.initial_objective,
        meta.solver.final_objective
    );

    write_schedule(&transcription.schedule, &args.output)?;

    if let Some(render_path) = &args.render {
        let (rendered, report) =
            render_schedule(&transcription.schedule, &library, samples.len())?;
        log::info!(
            "reconstruction: {} events rendered, {} skipped",
            report.events_rendered,
            report.events_skipped
        );
        write_render(render_path, &rendered)?;
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
