use crate::audio::narration::{Narrator, narration_for_step};
use crate::config::PipelineConfig;
use crate::foundation::error::GeoResult;
use crate::layout::fit::FigureMapper;
use crate::player::dispatch::ActionDispatcher;
use crate::player::registry::SceneObjectRegistry;
use crate::player::storyboard::{StepTiming, Storyboard, TimeWindow};
use crate::scene::regions::SceneRegions;
use crate::task::model::RenderTask;

/// Shortest time a step may take, whatever its narration.
pub const MIN_STEP_SECS: f64 = 1.5;

/// Cut `text` to `max_chars` characters, appending `...` when something was dropped.
pub fn truncate_header(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    } else {
        text.to_owned()
    }
}

/// Plays a render task's timeline into a [`Storyboard`].
///
/// Steps run back to back. Each step's narration is resolved first; the step then lasts
/// `max(narration, MIN_STEP_SECS)` and all of its actions animate over that window.
pub struct TimelinePlayer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> TimelinePlayer<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    #[tracing::instrument(skip_all, fields(steps = task.timeline.len()))]
    pub fn play(&self, task: &RenderTask, narrator: &mut dyn Narrator) -> GeoResult<Storyboard> {
        let cfg = self.config;
        cfg.validate()?;
        let profile = cfg.profile;
        let regions = SceneRegions::new(cfg.canvas, &cfg.theme);
        let mapper = FigureMapper::new(&task.layout_info, regions.figure, profile.figure_margin());
        let mut registry = SceneObjectRegistry::new();
        let mut dispatcher =
            ActionDispatcher::new(&mapper, &regions, &cfg.theme, profile, &mut registry);

        let mut steps = Vec::with_capacity(task.timeline.len());
        let mut t = 0.0;
        for (index, step) in task.timeline.iter().enumerate() {
            let clip = narration_for_step(narrator, index, &step.voice);
            let run_secs = clip.secs.max(MIN_STEP_SECS);
            let window = TimeWindow::new(t, t + run_secs);
            tracing::debug!(
                step = index,
                start = window.start,
                run_secs,
                actions = step.actions.len(),
                "playing step"
            );
            for action in &step.actions {
                dispatcher.dispatch(action, window);
            }
            steps.push(StepTiming {
                index,
                window,
                narration_secs: clip.secs,
                subtitle: step.voice.clone(),
                audio: clip.audio,
            });
            t = window.end;
        }

        let figure = *mapper.transform();
        let (marks, stats) = dispatcher.finish();
        tracing::info!(
            duration_secs = t,
            marks = marks.len(),
            skipped = stats.skipped,
            unknown = stats.unknown,
            "timeline played"
        );
        Ok(Storyboard {
            header: truncate_header(task.problem_text(), profile.header_max_chars()),
            duration_secs: t,
            steps,
            marks,
            registered: registry.keys().map(str::to_owned).collect(),
            figure,
            stats,
        })
    }
}
