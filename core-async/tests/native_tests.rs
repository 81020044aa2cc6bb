//! Integration tests for the Tokio-backed facade.

use core_async::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use core_async::net::{TcpListener, TcpStream};
use core_async::sync::{self, CancellationToken};
use core_async::{fs, task, time};
use std::sync::Arc;

#[core_async::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[core_async::test]
async fn test_timeout_success() {
    let result = time::timeout(time::Duration::from_millis(200), async {
        time::sleep(time::Duration::from_millis(10)).await;
        42
    })
    .await;

    assert_eq!(result.unwrap(), 42);
}

#[core_async::test]
async fn test_timeout_elapsed() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(200)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[core_async::test]
async fn test_mutex_serialises_access() {
    let mutex = Arc::new(sync::Mutex::new(0));
    let mutex_clone = mutex.clone();

    task::spawn(async move {
        *mutex_clone.lock().await += 1;
    })
    .await
    .unwrap();

    assert_eq!(*mutex.lock().await, 1);
}

#[core_async::test]
async fn test_cancellation_token_wakes_waiter() {
    let token = CancellationToken::new();
    let child = token.clone();

    let waiter = task::spawn(async move {
        child.cancelled().await;
        true
    });

    token.cancel();
    assert!(waiter.await.unwrap());
}

#[core_async::test]
async fn test_loopback_roundtrip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let client = task::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"ping\n").await.unwrap();
    });

    let (stream, _) = listener.accept().await.unwrap();
    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line).await.unwrap();

    client.await.unwrap();
    assert_eq!(line, "ping\n");
}

#[core_async::test]
async fn test_fs_write_read_remove() {
    let dir = std::env::temp_dir().join(format!("core-async-fs-{}", std::process::id()));
    fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("sample.txt");

    fs::write(&path, b"hello").await.unwrap();
    assert_eq!(fs::read(&path).await.unwrap(), b"hello");

    fs::remove_file(&path).await.unwrap();
    assert!(!fs::try_exists(&path).await.unwrap());
}
