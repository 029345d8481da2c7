use std::path::{Path, PathBuf};

use geolesson::task::assemble::{AssembleInputs, assemble_files};
use geolesson::audio::narration::EstimateNarrator;
use geolesson::{
    Canvas, Fps, InMemorySink, MarkShape, PipelineConfig, Point, RenderSession,
    RenderSessionOpts, RenderTask, TimelinePlayer,
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("geolesson-tests").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(path: &Path, value: serde_json::Value) {
    std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

fn triangle_task(dir: &Path) -> RenderTask {
    let image = dir.join("problem.png");
    image::RgbImage::from_pixel(1000, 500, image::Rgb([255, 255, 255]))
        .save(&image)
        .unwrap();

    let meta = dir.join("meta.json");
    let layout = dir.join("layout.json");
    let timeline = dir.join("timeline.json");
    write(
        &meta,
        serde_json::json!({"problem_text": "In triangle ABC, AB = AC. Find angle B."}),
    );
    write(
        &layout,
        serde_json::json!({"layout_map": {"A": [0.2, 0.2], "B": [0.8, 0.2], "C": [0.5, 0.8]}}),
    );
    write(
        &timeline,
        serde_json::json!({"timeline": [
            {"voice": "Draw the triangle.", "actions": [
                {"op": "DRAW_SHAPE", "type": "point", "targets": ["A", "B", "C"]},
                {"op": "DRAW_SHAPE", "type": "poly", "targets": ["A", "B", "C"]}
            ]},
            {"voice": "Look at angle B.", "actions": [
                {"op": "HIGHLIGHT", "targets": ["B"]},
                {"op": "WRITE_MATH", "content": "AB = AC"},
                {"op": "SPARKLE", "targets": ["A"]}
            ]}
        ]}),
    );

    let doc = assemble_files(AssembleInputs {
        meta: &meta,
        layout: &layout,
        timeline: &timeline,
        image: Some(&image),
    })
    .unwrap();
    let task_path = dir.join("task.json");
    write(&task_path, doc);
    RenderTask::load(&task_path).unwrap()
}

fn small_config() -> PipelineConfig {
    PipelineConfig {
        canvas: Canvas {
            width: 320,
            height: 180,
        },
        fps: Fps { num: 10, den: 1 },
        ..PipelineConfig::default()
    }
}

#[test]
fn triangle_task_is_fitted_into_the_figure_viewport() {
    let dir = scratch_dir("triangle_fit");
    let task = triangle_task(&dir);
    assert_eq!(task.layout_info.aspect_ratio, 2.0);
    assert_eq!(task.timeline.len(), 2);

    let cfg = PipelineConfig::default();
    let mut narrator = EstimateNarrator { secs_per_char: 0.1 };
    let sb = TimelinePlayer::new(&cfg).play(&task, &mut narrator).unwrap();

    let poly = sb
        .marks
        .iter()
        .find_map(|m| match &m.shape {
            MarkShape::Polygon { points } => Some(points.clone()),
            _ => None,
        })
        .expect("triangle polygon");
    assert_eq!(poly.len(), 3);

    let viewport = geolesson::scene::regions::SceneRegions::new(cfg.canvas, &cfg.theme).figure;
    for p in &poly {
        assert!(
            viewport.contains(*p),
            "{p:?} outside figure viewport {viewport:?}"
        );
    }

    let (min_x, max_x) = poly
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
    let (min_y, max_y) = poly
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    let bbox_center = Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
    let center = viewport.center();
    assert!((bbox_center - center).hypot() < 1e-9);

    let centroid_x = poly.iter().map(|p| p.x).sum::<f64>() / 3.0;
    assert!((centroid_x - center.x).abs() < 1e-9);

    // C is lower in the image, so below the AB base in the Y-up scene.
    assert!((poly[0].y - poly[1].y).abs() < 1e-9);
    assert!(poly[2].y < poly[0].y);

    assert_eq!(sb.stats.unknown, 1);
    assert!(sb.registered.iter().any(|k| k == "ABC"));
    assert!(sb.header.starts_with("In triangle ABC"));
}

#[test]
fn triangle_task_renders_every_frame() {
    let dir = scratch_dir("triangle_frames");
    let task = triangle_task(&dir);
    let cfg = small_config();
    let mut narrator = EstimateNarrator { secs_per_char: 0.1 };
    let sb = TimelinePlayer::new(&cfg).play(&task, &mut narrator).unwrap();
    let mut session = RenderSession::new(sb, &cfg, None, RenderSessionOpts::default()).unwrap();

    let expected = session.frame_count();
    assert!(expected > 0);
    let mut sink = InMemorySink::new();
    let stats = session
        .render_range(session.full_range().unwrap(), &mut sink)
        .unwrap();
    assert_eq!(stats.frames_total, expected);
    assert_eq!(sink.frames().len() as u64, expected);

    let (_, last) = sink.frames().last().unwrap();
    assert_eq!((last.width, last.height), (320, 180));
    let bg = cfg.theme.background;
    let drawn = last
        .data
        .chunks_exact(4)
        .filter(|px| px[..3] != [bg.r, bg.g, bg.b])
        .count();
    assert!(drawn > 0, "final frame is blank");
}

#[test]
fn triangle_task_encodes_to_mp4_when_ffmpeg_is_available() {
    if !geolesson::assets::media::is_ffmpeg_on_path() {
        return;
    }
    let dir = scratch_dir("triangle_mp4");
    let task = triangle_task(&dir);
    let mut session = RenderSession::from_task(&task, &small_config()).unwrap();
    let out = dir.join("lesson.mp4");
    let _ = std::fs::remove_file(&out);

    let stats = session.render_mp4(&out, true).unwrap();
    assert_eq!(stats.frames_total, session.frame_count());
    assert!(!stats.with_audio);
    assert!(std::fs::metadata(&out).unwrap().len() > 0);

    let err = session.render_mp4(&out, false).unwrap_err();
    assert!(err.to_string().contains("already exists"));
}
