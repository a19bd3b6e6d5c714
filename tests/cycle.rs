//! End-to-end generation cycle tests.
//!
//! Stands up a stub chat-completions server and a fake renderer script,
//! then drives single curator cycles and checks what reached the store,
//! the disk, and the (stub or dead) orb.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::routing::post;
use tokio::sync::Mutex;

use atelier::artist::Registry;
use atelier::curator::Curator;
use atelier::llm::LlmClient;
use atelier::orb::OrbClient;
use atelier::render::Renderer;
use atelier::store::PieceStore;

const SCENE_REPLY: &str = "TITLE: The Red Harbor\nSCENE: a fishing boat under a copper sky";
const COMMENTARY_REPLY: &str = "I painted this at dawn.\n\nThe copper light did the rest.";

/// Stub llama-server: first call answers the scene prompt, second the
/// commentary prompt.
async fn start_llm_stub() -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let content = if n % 2 == 0 { SCENE_REPLY } else { COMMENTARY_REPLY };
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}]
                }))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1/chat/completions"), calls)
}

/// Stub orb that records every `{artist_id, state}` payload it gets.
async fn start_orb_stub() -> (String, Arc<Mutex<Vec<(String, String)>>>) {
    let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let app = Router::new().route(
        "/state",
        post(move |Json(payload): Json<serde_json::Value>| {
            let sink = sink.clone();
            async move {
                let artist = payload["artist_id"].as_str().unwrap_or("").to_string();
                let state = payload["state"].as_str().unwrap_or("").to_string();
                sink.lock().await.push((artist, state));
                "ok"
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/state"), seen)
}

/// Fake sd binary: parses --output and writes a byte there.
fn write_fake_renderer(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-sd");
    std::fs::write(
        &path,
        "#!/bin/sh\nout=\"\"\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"--output\" ]; then out=\"$2\"; fi\n  shift\ndone\nprintf 'PNG' > \"$out\"\n",
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_registry(dir: &Path) -> PathBuf {
    let path = dir.join("artists.yaml");
    std::fs::write(
        &path,
        r#"
artists:
  - id: pierre
    name: Pierre
    weight: 1
    scene_system_prompt: "You are Pierre, a harbor painter."
    commentary_system_prompt: "Write Pierre's wall text."
    sd_style_prefix: "impasto oil painting,"
selection:
  default: pierre
"#,
    )
    .unwrap();
    path
}

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<PieceStore>,
    curator: Arc<Curator>,
    images_dir: PathBuf,
}

fn harness(dir: tempfile::TempDir, llm_url: &str, orb_url: &str, sd_bin: PathBuf) -> Harness {
    let registry = Arc::new(Registry::load(&write_registry(dir.path())).unwrap());
    let images_dir = dir.path().join("data").join("images");
    std::fs::create_dir_all(&images_dir).unwrap();
    let store = Arc::new(PieceStore::open(&dir.path().join("data").join("pieces.json")).unwrap());

    let llm = LlmClient::new(llm_url.to_string(), Duration::from_secs(5));
    let renderer = Renderer::new(
        sd_bin,
        dir.path().join("models"),
        3,
        512,
        Duration::from_secs(10),
    );
    let orb = OrbClient::new(orb_url);

    let curator = Arc::new(Curator::new(
        registry,
        llm,
        renderer,
        orb,
        store.clone(),
        images_dir.clone(),
        Duration::from_secs(1800),
        Duration::from_secs(0),
    ));
    Harness {
        _dir: dir,
        store,
        curator,
        images_dir,
    }
}

#[tokio::test]
async fn full_cycle_persists_one_piece() {
    let dir = tempfile::tempdir().unwrap();
    let (llm_url, calls) = start_llm_stub().await;
    let (orb_url, seen) = start_orb_stub().await;
    let sd = write_fake_renderer(dir.path());
    let h = harness(dir, &llm_url, &orb_url, sd);

    h.curator.tick().await;

    assert_eq!(h.store.count(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let piece = h.store.latest().unwrap();
    assert_eq!(piece.artist_id, "pierre");
    assert_eq!(piece.title, "The Red Harbor");
    assert_eq!(
        piece.image_prompt,
        "impasto oil painting, a fishing boat under a copper sky"
    );
    assert_eq!(piece.commentary, COMMENTARY_REPLY);
    assert_eq!(piece.image_filename, format!("pierre/{}.png", piece.id));
    assert!(h.images_dir.join(&piece.image_filename).exists());

    // Phase transitions reached the orb in pipeline order.
    let states: Vec<String> = seen.lock().await.iter().map(|(_, s)| s.clone()).collect();
    assert_eq!(states, vec!["THINKING", "DRAWING", "DONE"]);
    let artists: Vec<String> = seen.lock().await.iter().map(|(a, _)| a.clone()).collect();
    assert!(artists.iter().all(|a| a == "pierre"));
}

#[tokio::test]
async fn render_failure_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (llm_url, _) = start_llm_stub().await;
    let (orb_url, seen) = start_orb_stub().await;
    let h = harness(dir, &llm_url, &orb_url, PathBuf::from("/bin/false"));

    h.curator.tick().await;

    assert_eq!(h.store.count(), 0);
    // Cleanup notification so the orb doesn't stay stuck in DRAWING.
    let states: Vec<String> = seen.lock().await.iter().map(|(_, s)| s.clone()).collect();
    assert_eq!(states, vec!["THINKING", "DRAWING", "FINISHED"]);
}

#[tokio::test]
async fn llm_failure_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (orb_url, _) = start_orb_stub().await;
    let sd = write_fake_renderer(dir.path());
    // Nothing listens on port 9; the scene call fails immediately.
    let h = harness(dir, "http://127.0.0.1:9/v1/chat/completions", &orb_url, sd);

    h.curator.tick().await;

    assert_eq!(h.store.count(), 0);
    assert!(std::fs::read_dir(h.images_dir.join("pierre"))
        .map(|mut d| d.next().is_none())
        .unwrap_or(true));
}

#[tokio::test]
async fn unreachable_orb_does_not_block_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let (llm_url, _) = start_llm_stub().await;
    let sd = write_fake_renderer(dir.path());
    // Dead orb endpoint: every notify fails and is swallowed.
    let h = harness(dir, &llm_url, "http://127.0.0.1:9/state", sd);

    h.curator.tick().await;

    assert_eq!(h.store.count(), 1);
    assert_eq!(h.store.latest().unwrap().title, "The Red Harbor");
}

#[tokio::test]
async fn pieces_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (llm_url, _) = start_llm_stub().await;
    let (orb_url, _) = start_orb_stub().await;
    let sd = write_fake_renderer(dir.path());
    let pieces_path = dir.path().join("data").join("pieces.json");
    let h = harness(dir, &llm_url, &orb_url, sd);

    h.curator.tick().await;
    let before = h.store.latest().unwrap();

    // "Restart": reopen the persisted form fresh.
    let reopened = PieceStore::open(&pieces_path).unwrap();
    assert_eq!(reopened.count(), 1);
    assert_eq!(reopened.latest().unwrap(), before);
}
