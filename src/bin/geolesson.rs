use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use geolesson::assets::fonts::resolve_font;
use geolesson::audio::narration::{
    ClipNaming, CommandNarrator, Narrator, narration_for_step, narrator_from_config,
};
use geolesson::grid::annotate_grid;
use geolesson::layout::normalize::{image_dimensions, normalize_to_logic_canvas, read_layout_map};
use geolesson::task::assemble::{AssembleInputs, assemble_files};
use geolesson::{
    NarrationBackend, PipelineConfig, RenderProfile, RenderSession, RenderTask, write_json_pretty,
};

#[derive(Parser, Debug)]
#[command(name = "geolesson", version, about = "Narrated geometry lesson videos")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Overlay a labelled 10×10 reference grid on a problem image.
    Grid(GridArgs),
    /// Project a model layout file onto the 1000-unit logic canvas.
    Normalize(NormalizeArgs),
    /// Merge metadata, layout and timeline into a render task.
    Assemble(AssembleArgs),
    /// Produce (or locate) narration clips and report their durations.
    Narrate(NarrateArgs),
    /// Play a render task and print the storyboard as JSON.
    Plan(PlanArgs),
    /// Render one frame of a render task as a PNG.
    Frame(FrameArgs),
    /// Render a render task to MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Pipeline configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured lesson profile (`classic` or `compact`).
    #[arg(long)]
    profile: Option<RenderProfile>,
}

impl ConfigArgs {
    fn load(&self) -> anyhow::Result<PipelineConfig> {
        let mut cfg = PipelineConfig::load_or_default(self.config.as_deref()).with_context(|| {
            format!(
                "load config '{}'",
                self.config
                    .as_deref()
                    .map_or_else(|| "<default>".into(), |p| p.display().to_string())
            )
        })?;
        if let Some(profile) = self.profile {
            cfg.profile = profile;
        }
        Ok(cfg)
    }
}

#[derive(Args, Debug)]
struct GridArgs {
    /// Source problem image.
    #[arg(long)]
    image: PathBuf,

    /// Output image; JPEG when the extension is jpg/jpeg.
    #[arg(long)]
    out: PathBuf,

    /// TTF/OTF font for the labels; defaults to the configured font.
    #[arg(long)]
    font: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args, Debug)]
struct NormalizeArgs {
    /// Model output with a top-level `layout_map`.
    #[arg(long)]
    layout: PathBuf,

    /// Source problem image (only its header is read).
    #[arg(long)]
    image: PathBuf,

    /// Output normalized layout JSON.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct AssembleArgs {
    /// Problem metadata JSON.
    #[arg(long)]
    meta: PathBuf,

    /// Model layout JSON (`{"layout_map": ...}`).
    #[arg(long)]
    layout: PathBuf,

    /// Timeline JSON (`{"timeline": [...]}`).
    #[arg(long)]
    timeline: PathBuf,

    /// Source image; 1920×1080 is assumed when absent or missing.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Output render task JSON.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct NarrateArgs {
    /// Render task JSON.
    #[arg(long)]
    task: PathBuf,

    /// Write clips as `step_<n>` files here instead of the narration cache
    /// (command backend only).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Render task JSON.
    #[arg(long)]
    task: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args, Debug)]
struct FrameArgs {
    /// Render task JSON.
    #[arg(long)]
    task: PathBuf,

    /// Time in seconds.
    #[arg(long)]
    time: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Render task JSON.
    #[arg(long)]
    task: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Fail instead of replacing an existing output file.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Grid(args) => cmd_grid(args),
        Command::Normalize(args) => cmd_normalize(args),
        Command::Assemble(args) => cmd_assemble(args),
        Command::Narrate(args) => cmd_narrate(args),
        Command::Plan(args) => cmd_plan(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_task(path: &Path) -> anyhow::Result<RenderTask> {
    RenderTask::load(path).with_context(|| format!("load render task '{}'", path.display()))
}

fn cmd_grid(args: GridArgs) -> anyhow::Result<()> {
    let cfg = args.config.load()?;
    let font = resolve_font(args.font.as_deref().or(cfg.font.as_deref()));
    let (w, h) = annotate_grid(&args.image, &args.out, font.as_ref())
        .with_context(|| format!("annotate '{}'", args.image.display()))?;
    eprintln!("wrote {} ({w}x{h})", args.out.display());
    Ok(())
}

fn cmd_normalize(args: NormalizeArgs) -> anyhow::Result<()> {
    let layout = read_layout_map(&args.layout)?;
    let (w, h) = image_dimensions(&args.image)?;
    let source = args
        .image
        .file_name()
        .map_or_else(|| args.image.display().to_string(), |n| n.to_string_lossy().into_owned());
    let normalized = normalize_to_logic_canvas(&layout, &source, w, h)?;
    write_json_pretty(&args.out, &normalized)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    eprintln!(
        "wrote {} (logic canvas {}x{})",
        args.out.display(),
        normalized.meta_info.logic_canvas_size[0],
        normalized.meta_info.logic_canvas_size[1]
    );
    Ok(())
}

fn cmd_assemble(args: AssembleArgs) -> anyhow::Result<()> {
    let doc = assemble_files(AssembleInputs {
        meta: &args.meta,
        layout: &args.layout,
        timeline: &args.timeline,
        image: args.image.as_deref(),
    })?;
    write_json_pretty(&args.out, &doc)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_narrate(args: NarrateArgs) -> anyhow::Result<()> {
    let cfg = args.config.load()?;
    let task = load_task(&args.task)?;

    let mut narrator: Box<dyn Narrator> = match (&args.out_dir, &cfg.narration.backend) {
        (
            Some(dir),
            NarrationBackend::Command {
                program,
                args: command_args,
                extension,
            },
        ) => Box::new(CommandNarrator {
            program: program.clone(),
            args: command_args.clone(),
            extension: extension.clone(),
            dir: dir.clone(),
            naming: ClipNaming::Steps,
            lang: cfg.narration_lang().to_owned(),
            secs_per_char: cfg.profile.secs_per_char(),
        }),
        (Some(_), _) => anyhow::bail!("--out-dir needs the command narration backend"),
        (None, _) => narrator_from_config(&cfg),
    };

    let steps: Vec<_> = task
        .timeline
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let clip = narration_for_step(narrator.as_mut(), i, &step.voice);
            json!({
                "step": i + 1,
                "secs": clip.secs,
                "audio": clip.audio.map(|p| p.display().to_string()),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&steps)?);
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let cfg = args.config.load()?;
    let task = load_task(&args.task)?;
    let mut narrator = narrator_from_config(&cfg);
    let storyboard = geolesson::TimelinePlayer::new(&cfg).play(&task, narrator.as_mut())?;
    println!("{}", serde_json::to_string_pretty(&storyboard)?);
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = args.config.load()?;
    let task = load_task(&args.task)?;
    let mut session = RenderSession::from_task(&task, &cfg)?;
    let frame = session.render_at(args.time)?;
    frame
        .save(&args.out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = args.config.load()?;
    let task = load_task(&args.task)?;
    let mut session = RenderSession::from_task(&task, &cfg)?;
    let stats = session
        .render_mp4(&args.out, !args.no_overwrite)
        .with_context(|| format!("render '{}'", args.out.display()))?;
    eprintln!(
        "wrote {} ({} frames, {:.1}s{})",
        args.out.display(),
        stats.frames_total,
        session.storyboard().duration_secs,
        if stats.with_audio { ", narrated" } else { "" }
    );
    Ok(())
}
