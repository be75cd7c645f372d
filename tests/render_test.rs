//! Font store, layout and render service integration tests
//! Run with: cargo test --test render_test

use std::sync::Arc;

use placard_bot::application::errors::RenderError;
use placard_bot::application::services::{RenderDefaults, RenderPool, RenderService};
use placard_bot::domain::entities::{Background, CanvasSpec, Color, FontSpec, ImageFormat, RenderRequest};
use placard_bot::infrastructure::config::RenderConfig;
use placard_bot::infrastructure::fonts::{BlockFace, DiskFontLoader, FontStore, TextMetrics};
use placard_bot::infrastructure::rendering::{layout, Renderer};

fn block_store(dir: &std::path::Path) -> Arc<FontStore> {
    Arc::new(FontStore::new(DiskFontLoader::new(vec![dir.to_path_buf()]).with_builtin_fallback(true)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolves_share_one_instance() {
    let dir = tempfile::tempdir().unwrap();
    let store = block_store(dir.path());

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move { store.resolve("Liberation Sans", 24).await }));
    }

    let mut handles = Vec::new();
    for task in tasks {
        handles.push(task.await.unwrap().unwrap());
    }

    assert_eq!(store.cached().len(), 1);
    assert!(handles.iter().all(|h| h.same_instance(&handles[0])));
}

#[tokio::test]
async fn test_missing_font_without_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let store = FontStore::new(DiskFontLoader::new(vec![dir.path().to_path_buf()]));

    let err = store.resolve("Liberation Sans", 24).await.unwrap_err();
    assert_eq!(err, RenderError::FontNotFound { family: "Liberation Sans".to_string() });
    assert!(store.cached().is_empty());
}

#[test]
fn test_long_token_kept_whole() {
    let face = BlockFace::new(10);
    let text = "a very long single token of length exceeding width";
    let token = "abcdefghijklmnopqrstuvwxyz";
    let input = format!("{} {}", text, token);

    let laid_out = layout(&input, &face, 50.0).unwrap();
    let lines: Vec<String> = laid_out.lines().map(|l| l.text).collect();

    assert!(lines.contains(&token.to_string()));
    for line in &lines {
        let single_token = !line.contains(' ');
        assert!(face.advance(line) <= 50.0 || single_token, "line too wide: {:?}", line);
    }
    assert_eq!(lines.join(" "), input);

    // pure: same input, same breaks
    let again: Vec<String> = layout(&input, &face, 50.0).unwrap().lines().map(|l| l.text).collect();
    assert_eq!(lines, again);
}

#[tokio::test]
async fn test_render_service_writes_decodable_images() {
    let dir = tempfile::tempdir().unwrap();
    let config = RenderConfig {
        default_size: 16,
        canvas_width: 320,
        canvas_height: 80,
        padding: 16,
        ..RenderConfig::default()
    };
    let service = RenderService::from_config(&config, block_store(dir.path()));

    for format in [ImageFormat::Png, ImageFormat::Jpeg] {
        let canvas = service.canvas(None, None).unwrap().with_format(format);
        let request = RenderRequest::new("Hello, placard", FontSpec::new("Liberation Sans", 16), canvas).unwrap();
        let image = service.render(request).await.unwrap();

        let path = dir.path().join(format!("out.{}", format.extension()));
        std::fs::write(&path, image.bytes()).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 80));
    }
}

#[tokio::test]
async fn test_tall_text_grows_canvas_until_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let defaults = RenderDefaults {
        family: "Liberation Sans".to_string(),
        size: 10,
        width: 100,
        height: 40,
        format: ImageFormat::Png,
        background: Background::Color(Color::WHITE),
    };
    let service = RenderService::new(
        block_store(dir.path()),
        Renderer::new(100).with_padding(10),
        RenderPool::new(1, 1),
        defaults,
    );

    // 13 characters fit on an 80px line; each line is 12px tall
    let three_lines = service.request("aaaa bbbb cccc dddd eeee ffff").unwrap();
    let image = service.render(three_lines).await.unwrap();
    assert_eq!(image.height(), 56);

    let twenty_lines = service.request(vec!["wrapped"; 20].join(" ")).unwrap();
    let err = service.render(twenty_lines).await.unwrap_err();
    assert!(matches!(err, RenderError::RenderOverflow { limit: 100, .. }));

    let canvas = CanvasSpec::new(100, 101).unwrap();
    let request = RenderRequest::new("hi", FontSpec::new("Liberation Sans", 10), canvas).unwrap();
    assert!(matches!(service.render(request).await, Err(RenderError::RenderOverflow { .. })));
}
