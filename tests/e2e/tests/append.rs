//! Read-modify-write helpers


use anyhow::Result;
use common::*;

#[tokio::test]
async fn test_append_with_separator() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;

    fs.put("log.txt", "line1").await?;
    fs.append("log.txt", b"line2", b"\n").await?;
    assert_content_str(&fs, "log.txt", "line1\nline2").await;
    Ok(())
}

#[tokio::test]
async fn test_sequential_appends() -> Result<()> {
    let ctx = TestContext::memory()?;
    let fs = ctx.fs().await?;

    fs.put("notes.txt", "original").await?;
    fs.append("notes.txt", b"first", b" | ").await?;
    fs.append("notes.txt", b"second", b" | ").await?;
    assert_content_str(&fs, "notes.txt", "original | first | second").await;
    Ok(())
}

#[tokio::test]
async fn test_missing_target_gets_plain_write() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;

    fs.append("fresh-append.txt", b"data", b"\n").await?;
    fs.prepend("fresh-prepend.txt", b"data", b"\n").await?;
    assert_content_str(&fs, "fresh-append.txt", "data").await;
    assert_content_str(&fs, "fresh-prepend.txt", "data").await;
    Ok(())
}

#[tokio::test]
async fn test_prepend() -> Result<()> {
    let ctx = TestContext::local()?;
    let fs = ctx.fs().await?;

    fs.put("list.txt", "b").await?;
    fs.prepend("list.txt", b"a", b",").await?;
    fs.append("list.txt", b"c", b",").await?;
    assert_content_str(&fs, "list.txt", "a,b,c").await;
    Ok(())
}
