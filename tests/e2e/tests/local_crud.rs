//! CRUD through the facade on local disk and in memory


use anyhow::Result;
use common::*;
use test_case::test_case;
use unifs::FsError;

/// Put, check, read, move and read again on the default local connection
#[tokio::test]
async fn test_put_move_read_on_local_disk() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;

    fs.put("a.txt", "hello").await?;
    assert_is_file(&fs, "a.txt").await;
    assert_content_str(&fs, "a.txt", "hello").await;
    assert_file_content(&ctx.workspace().join("a.txt"), b"hello");

    fs.move_file("a.txt", "b.txt").await?;
    assert_not_exists(&fs, "a.txt").await;
    assert_content_str(&fs, "b.txt", "hello").await;
    Ok(())
}

#[test_case(0 ; "empty")]
#[test_case(1 ; "one byte")]
#[test_case(4096 ; "one page")]
#[test_case(1024 * 1024 + 7 ; "just over a megabyte")]
#[tokio::test]
async fn test_round_trip_local(size: usize) -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;
    let name = random_filename("rt");
    let data = random_bytes(size);

    fs.put(&name, data.clone()).await?;
    assert_content(&fs, &name, &data).await;
    assert_size(&fs, &name, size as u64).await;
    Ok(())
}

#[test_case(0 ; "empty")]
#[test_case(4096 ; "one page")]
#[tokio::test]
async fn test_round_trip_memory(size: usize) -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;
    let data = random_bytes(size);

    fs.put("blob.bin", data.clone()).await?;
    assert_content(&fs, "blob.bin", &data).await;
    Ok(())
}

#[tokio::test]
async fn test_streams_in_and_out() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;

    fs.put("streamed.txt", chunked(&[b"abc", b"", b"def"])).await?;
    assert_content_str(&fs, "streamed.txt", "abcdef").await;

    let stream = fs.read_stream("streamed.txt").await?;
    let collected = unifs::adapter::collect_stream(stream).await?;
    assert_eq!(collected.as_ref(), b"abcdef");
    Ok(())
}

#[tokio::test]
async fn test_directories_and_listing() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;

    fs.create_dir("reports/2024").await?;
    fs.put("reports/2024/q1.csv", "a,b").await?;
    fs.put("reports/summary.txt", "sum").await?;
    assert_is_dir(&fs, "reports/2024").await;

    let mut files = fs.get_files("reports", true).await?;
    files.sort();
    assert_eq!(files, vec!["reports/2024/q1.csv", "reports/summary.txt"]);
    assert_eq!(fs.get_directories("reports", false).await?, vec!["reports/2024"]);
    assert_eq!(fs.get_files("reports", false).await?, vec!["reports/summary.txt"]);

    fs.delete_dir("reports").await?;
    assert_not_exists(&fs, "reports/summary.txt").await;
    assert!(!ctx.workspace().join("reports").exists());
    Ok(())
}

#[tokio::test]
async fn test_assertions_guard_writes() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;

    fs.write("once.txt", "first").await?;
    assert!(matches!(
        fs.write("once.txt", "again").await,
        Err(FsError::AlreadyExists(_))
    ));
    assert!(fs.delete("never.txt").await.unwrap_err().is_not_found());
    assert!(fs.read("never.txt").await.unwrap_err().is_not_found());

    fs.copy("once.txt", "twice.txt").await?;
    assert_content_str(&fs, "twice.txt", "first").await;
    assert_eq!(fs.read_and_delete("twice.txt").await?.as_ref(), b"first");
    assert_not_exists(&fs, "twice.txt").await;
    Ok(())
}

#[tokio::test]
async fn test_pirate_mode_skips_assertions() -> Result<()> {
    let ctx = TestContext::with_config(|builder, paths| {
        builder
            .local("local", &paths.workspace)
            .default_connection("local")
            .pirate(true)
    })?;
    let fs = ctx.fs().await?;

    fs.write("a.txt", "1").await?;
    fs.write("a.txt", "2").await?;
    assert_content_str(&fs, "a.txt", "2").await;
    Ok(())
}

#[tokio::test]
async fn test_path_escape_is_rejected() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;

    assert!(matches!(
        fs.put("../outside.txt", "x").await,
        Err(FsError::InvalidPath(_))
    ));
    assert!(!ctx.scratch().join("outside.txt").exists());

    fs.put("dir\\sub\\file.txt", "win").await?;
    assert_content_str(&fs, "dir/sub/file.txt", "win").await;
    Ok(())
}
