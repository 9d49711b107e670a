use super::{Digest, NotificationSink};
use crate::error::{NotifyError, OutputError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

/// Writes each digest as `<kind>.md` plus a JSON copy for whatever
/// mailer or bot picks it up.
pub struct FileSink {
    pub dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl NotificationSink for FileSink {
    async fn deliver(&self, digest: &Digest) -> Result<(), NotifyError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(OutputError::CreateDir)?;

        let mut content = format!("# {}\n\n", digest.subject);
        if !digest.recipients.is_empty() {
            content.push_str(&format!("**To:** {}\n\n", digest.recipients.join(", ")));
        }
        content.push_str(&digest.body);

        let md_path = self.dir.join(format!("{}.md", digest.kind));
        fs::write(&md_path, content)
            .await
            .map_err(OutputError::WriteReport)?;

        let json_path = self.dir.join(format!("{}.json", digest.kind));
        let json = serde_json::to_string_pretty(digest).map_err(OutputError::Serialize)?;
        fs::write(&json_path, json)
            .await
            .map_err(OutputError::WriteReport)?;

        info!("Wrote {} digest: {}", digest.kind, md_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::DigestKind;
    use crate::parser::TestPath;
    use std::fs;

    #[tokio::test]
    async fn test_writes_markdown_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("digests"));
        let digest = Digest {
            kind: DigestKind::PreExisting,
            subject: "Pre-existing test failures: 1 tests".to_string(),
            body: "- a.html\n".to_string(),
            recipients: vec!["gardener@example.com".to_string()],
            tests: vec![TestPath::from("a.html")],
            fingerprint: "0123456789ab".to_string(),
        };

        sink.deliver(&digest).await.unwrap();

        let md = fs::read_to_string(dir.path().join("digests/pre-existing.md")).unwrap();
        assert!(md.starts_with("# Pre-existing test failures"));
        assert!(md.contains("**To:** gardener@example.com"));

        let json = fs::read_to_string(dir.path().join("digests/pre-existing.json")).unwrap();
        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, digest);
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_write_every_kind() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("nested/digests"));
        let digests: Vec<Digest> = [DigestKind::Flaky, DigestKind::PreExisting, DigestKind::NewFailure]
            .into_iter()
            .map(|kind| Digest {
                kind,
                subject: format!("{} digest", kind),
                body: "- a.html\n".to_string(),
                recipients: Vec::new(),
                tests: vec![TestPath::from("a.html")],
                fingerprint: "0123456789ab".to_string(),
            })
            .collect();

        let results = futures::future::join_all(digests.iter().map(|d| sink.deliver(d))).await;
        assert!(results.iter().all(|r| r.is_ok()));

        for name in ["flaky", "pre-existing", "new-failure"] {
            let md = fs::read_to_string(dir.path().join(format!("nested/digests/{}.md", name))).unwrap();
            assert!(!md.contains("**To:**"));
            assert!(md.contains("- a.html"));
        }
    }
}
