//! File handles over the facade


use anyhow::Result;
use common::*;
use unifs::stream::{StreamMode, SEEK_CUR, SEEK_END, SEEK_SET};
use unifs::FsError;

fn mode(raw: &str) -> StreamMode {
    raw.parse().expect("valid mode")
}

/// Write through a fresh `w+` handle, reopen read-only and read it back
#[tokio::test]
async fn test_write_then_reopen() -> Result<()> {
    for ctx in [TestContext::local()?, TestContext::memory()?] {
        let fs = ctx.fs().await?;

        let mut stream = fs.create_stream("new.txt")?;
        assert!(stream.open(&mode("w+")).await?);
        assert_eq!(stream.write(b"data").await?, 4);
        assert!(stream.close().await);

        let mut stream = fs.create_stream("new.txt")?;
        assert!(stream.open(&mode("r")).await?);
        assert_eq!(stream.read(4).await?.as_ref(), b"data");
        assert!(stream.eof());
        assert!(stream.close().await);
    }
    Ok(())
}

#[tokio::test]
async fn test_exclusive_create() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;

    let mut first = fs.create_stream("lock.pid")?;
    assert!(first.open(&mode("xb")).await?);
    first.write(b"42").await?;
    assert!(first.close().await);

    let mut second = fs.create_stream("lock.pid")?;
    assert!(!second.open(&mode("x")).await?);
    assert_content_str(&fs, "lock.pid", "42").await;
    Ok(())
}

#[tokio::test]
async fn test_read_write_mid_file() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;
    fs.put("record.txt", "0123456789").await?;

    let mut stream = fs.create_stream("record.txt")?;
    assert!(stream.open(&mode("r+")).await?);
    assert!(stream.seek(2, SEEK_SET));
    assert_eq!(stream.read(3).await?.as_ref(), b"234");
    assert!(stream.seek(-1, SEEK_CUR));
    stream.write(b"XY").await?;
    assert_eq!(stream.tell(), 6);
    assert!(stream.seek(2, SEEK_END));
    stream.write(b"!").await?;
    assert!(stream.flush().await);

    assert_content_str(&fs, "record.txt", "0123XY6789  !").await;
    Ok(())
}

#[tokio::test]
async fn test_append_handle_ignores_position() -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;
    fs.put("audit.log", "start").await?;

    let mut stream = fs.create_stream("audit.log")?;
    assert!(stream.open(&mode("a")).await?);
    stream.seek(0, SEEK_SET);
    stream.write(b"+end").await?;
    assert!(matches!(stream.read(1).await, Err(FsError::StreamState(_))));
    assert!(stream.close().await);

    assert_content_str(&fs, "audit.log", "start+end").await;
    Ok(())
}

#[tokio::test]
async fn test_truncating_open_is_visible_immediately() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;
    fs.put("cache.bin", "stale").await?;

    let mut stream = fs.create_stream("cache.bin")?;
    assert!(stream.open(&mode("w")).await?);
    assert_size(&fs, "cache.bin", 0).await;
    stream.write(b"fresh").await?;
    assert_size(&fs, "cache.bin", 0).await;
    assert!(stream.close().await);
    assert_content_str(&fs, "cache.bin", "fresh").await;
    Ok(())
}

#[tokio::test]
async fn test_unlink_only_under_truncating_mode() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;
    fs.put("keep.txt", "keep").await?;

    let mut reader = fs.create_stream("keep.txt")?;
    assert!(reader.open(&mode("r+")).await?);
    assert!(matches!(reader.unlink().await, Err(FsError::StreamState(_))));
    assert_exists(&fs, "keep.txt").await;

    let mut writer = fs.create_stream("keep.txt")?;
    assert!(writer.open(&mode("w+")).await?);
    assert!(writer.unlink().await?);
    assert_not_exists(&fs, "keep.txt").await;
    Ok(())
}

#[tokio::test]
async fn test_stat_local_and_remote() -> Result<()> {
    let local = TestContext::local()?;
    let fs = local.fs().await?;
    fs.put("s.txt", "abc").await?;

    let mut stream = fs.create_stream("s.txt")?;
    assert!(stream.open(&mode("r+")).await?);
    let stat = stream.stat().await?;
    assert_eq!(stat.size, 3);
    assert!(!stat.is_dir());
    assert_ne!(stat.ino, 0);

    stream.write(b"abcdef").await?;
    assert_eq!(stream.stat().await?.size, 6);

    let memory = TestContext::memory()?;
    let fs = memory.fs().await?;
    fs.put("s.txt", "abc").await?;
    let mut stream = fs.create_stream("s.txt")?;
    assert!(stream.open(&mode("r")).await?);
    let stat = stream.stat().await?;
    assert_eq!(stat.mode, 0o100664);
    assert_eq!((stat.dev, stat.ino), (0, 0));
    assert_eq!(stat.size, 3);
    Ok(())
}

#[tokio::test]
async fn test_null_backend_discards_stream() -> Result<()> {
    let ctx = TestContext::with_config(|builder, _| {
        builder
            .connection("void", &[("driver", serde_yaml::Value::from("null"))])
            .default_connection("void")
    })?;
    let fs = ctx.fs().await?;

    let mut stream = fs.create_stream("nothing.txt")?;
    assert!(stream.open(&mode("w")).await?);
    stream.write(b"lost").await?;
    // Writes succeed on the null backend, the data just disappears
    assert!(stream.close().await);
    assert_not_exists(&fs, "nothing.txt").await;
    Ok(())
}
