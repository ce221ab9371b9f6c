use super::*;

async fn ready_store() -> (SandboxStore, String) {
    let store = SandboxStore::new(Duration::ZERO);
    let session = store.create_or_get(Some("s1")).await;
    // Let the readiness task run.
    for _ in 0..10 {
        tokio::task::yield_now().await;
        if store.get(&session.id).await.is_some_and(|s| s.status == SessionStatus::Ready) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    (store, session.id)
}

#[tokio::test]
async fn create_without_id_uses_timestamped_id() {
    let store = SandboxStore::default();
    let session = store.create_or_get(None).await;
    assert!(session.id.starts_with("session_"));
    assert_eq!(session.status, SessionStatus::Initializing);
}

#[tokio::test]
async fn create_with_id_returns_existing_session() {
    let store = SandboxStore::default();
    let first = store.create_or_get(Some("abc")).await;
    let second = store.create_or_get(Some("abc")).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn default_lookup_finds_default_session() {
    let store = SandboxStore::default();
    let created = store.create_or_get(Some(DEFAULT_SESSION_ID)).await;
    let fetched = store.create_or_get(None).await;
    assert_eq!(fetched.id, created.id);
}

#[tokio::test(start_paused = true)]
async fn session_becomes_ready_after_delay() {
    let store = SandboxStore::default();
    let session = store.create_or_get(Some("x")).await;

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(store.get(&session.id).await.unwrap().status, SessionStatus::Initializing);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(store.get(&session.id).await.unwrap().status, SessionStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn recreated_session_ignores_the_old_readiness_timer() {
    let store = SandboxStore::default();
    store.create_or_get(Some("x")).await;

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    store.remove("x").await.unwrap();
    store.create_or_get(Some("x")).await;

    // The first session's timer fires at 2s.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(store.get("x").await.unwrap().status, SessionStatus::Initializing);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(store.get("x").await.unwrap().status, SessionStatus::Ready);
}

#[tokio::test]
async fn execute_before_ready_is_rejected() {
    let store = SandboxStore::default();
    let session = store.create_or_get(Some("slow")).await;
    assert_eq!(store.execute(&session.id, "ls").await.unwrap_err(), SandboxError::NotReady);
}

#[tokio::test]
async fn execute_validates_input_and_session() {
    let store = SandboxStore::default();
    assert_eq!(store.execute("", "ls").await.unwrap_err(), SandboxError::MissingFields);
    assert_eq!(store.execute("s", " ").await.unwrap_err(), SandboxError::MissingFields);
    assert_eq!(store.execute("missing", "ls").await.unwrap_err(), SandboxError::NotFound);
}

#[tokio::test]
async fn execute_dev_server_reports_preview_urls() {
    let (store, id) = ready_store().await;
    let exec = store.execute(&id, "npm run dev").await.unwrap();
    assert_eq!(exec.exit_code, 0);
    assert!(exec.output.contains("http://localhost:5173"));
    let ports: Vec<u16> = exec.preview_urls.iter().map(|u| u.port).collect();
    assert_eq!(ports, vec![3000, 5173]);
}

#[tokio::test]
async fn execute_listing_and_fallback() {
    let (store, id) = ready_store().await;
    assert_eq!(store.execute(&id, "ls -la").await.unwrap().output, "file1.txt\nfile2.js\nfolder/");
    let exec = store.execute(&id, "echo hi").await.unwrap();
    assert_eq!(exec.output, "Command executed: echo hi");
    assert!(exec.preview_urls.is_empty());
}

#[tokio::test]
async fn execute_output_with_error_sets_exit_code() {
    let (store, id) = ready_store().await;
    let exec = store.execute(&id, "throw Error").await.unwrap();
    assert_eq!(exec.exit_code, 1);
}

#[tokio::test]
async fn remove_deletes_session() {
    let store = SandboxStore::default();
    store.create_or_get(Some("gone")).await;
    store.remove("gone").await.unwrap();
    assert!(store.get("gone").await.is_none());
    assert_eq!(store.remove("gone").await.unwrap_err(), SandboxError::NotFound);
}
