use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use num_traits::ToPrimitive;
use rokfit::{
    cv::{CaptureVideo, MatCanvas, WriterSink},
    ExerciseMode, Phase, Pipeline, PipelineConfig, PoseReplay,
};
use std::{fs, io::BufWriter, path::PathBuf};
use structopt::StructOpt;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Recorded workout to analyze.
    video: PathBuf,

    /// JSON file with the poses estimated for the video.
    #[structopt(short, long)]
    poses: PathBuf,

    /// Exercise to count: pushup or situp.
    #[structopt(short, long, default_value = "pushup")]
    mode: ExerciseMode,

    /// Directory the annotated video is written to.
    #[structopt(short, long, default_value = ".")]
    output: PathBuf,

    /// Also write the annotation track as JSON to this file.
    #[structopt(long)]
    dump_track: Option<PathBuf>,

    #[structopt(short, long, default_value = "info", env = "RUST_LOG")]
    log_level: tracing_subscriber::filter::EnvFilter,

    #[structopt(short, long)]
    show_progress: bool,

    #[structopt(flatten)]
    pipeline: PipelineConfig,
}

fn progress_bars() -> Box<dyn FnMut(Phase, f64)> {
    let style = ProgressStyle::default_bar()
        .template("{prefix:>10.bold.dim} [{bar:40.cyan/blue}] {pos:>3}%")
        .progress_chars("=> ");
    let analyzing = ProgressBar::new(100)
        .with_style(style.clone())
        .with_prefix("analyzing");
    let encoding = ProgressBar::new(100)
        .with_style(style)
        .with_prefix("encoding");

    Box::new(move |phase: Phase, percent: f64| {
        let bar = match phase {
            Phase::Analyzing => &analyzing,
            Phase::Encoding => {
                if !analyzing.is_finished() {
                    analyzing.finish();
                }
                &encoding
            }
        };
        bar.set_position(percent.round().to_u64().unwrap_or_default());
        if percent >= 100.0 && phase == Phase::Encoding {
            bar.finish();
        }
    })
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    tracing::subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(opt.log_level),
    )?;

    let (width, height) = MatCanvas::DEFAULT_SIZE;
    let canvas = MatCanvas::new(width, height).context("failed creating canvas")?;
    let encoder = WriterSink::new(opt.pipeline.render_fps, MatCanvas::DEFAULT_SIZE);
    let poses = PoseReplay::new(&opt.poses, opt.pipeline.step);

    let mut pipeline = Pipeline::new(
        CaptureVideo::new(),
        canvas,
        poses,
        encoder,
        opt.pipeline.clone(),
    );
    pipeline.set_mode(opt.mode);

    let reset = pipeline.reset_handle();
    ctrlc::set_handler(move || reset.reset()).context("failed setting Ctrl-C handler")?;

    if opt.show_progress {
        pipeline.on_progress(progress_bars());
    }

    let output = match pipeline
        .process(&opt.video)
        .with_context(|| format!("failed processing {}", opt.video.display()))?
    {
        Some(output) => output,
        None => {
            info!(message = "interrupted, nothing written");
            return Ok(());
        }
    };

    if let Some(path) = opt.dump_track.as_ref() {
        let track = pipeline
            .track()
            .context("finished without an annotation track")?;
        let file = fs::File::create(path)
            .with_context(|| format!("failed creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), track)
            .context("failed writing annotation track")?;
        info!(message = "wrote annotation track", path = %path.display(), entries = track.len());
    }

    let path = opt.output.join(output.file_name());
    fs::write(&path, &output.bytes).with_context(|| format!("failed writing {}", path.display()))?;
    info!(
        message = "wrote annotated video",
        path = %path.display(),
        media_type = %output.media_type,
        bytes = output.bytes.len(),
        count = pipeline.counter().count()
    );

    Ok(())
}
