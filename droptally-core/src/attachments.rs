use crate::normalize::{extension_from_content_type, sanitize_filename};
use std::path::PathBuf;

/// Saves uploaded screenshots under a content-addressed layout and hands
/// back the externally servable URL:
///
/// `{root}/{wom_id}/{kind}/{subfolder?}/{name}_{entry_id}[_{n}].{ext}`
pub struct AttachmentSink {
    root: PathBuf,
    public_base: String,
}

#[derive(Debug, Clone)]
pub struct SavedAttachment {
    pub path: PathBuf,
    pub url: String,
}

impl AttachmentSink {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        let mut public_base = public_base.into();
        while public_base.ends_with('/') {
            public_base.pop();
        }
        Self {
            root: root.into(),
            public_base,
        }
    }

    pub async fn save(
        &self,
        wom_id: i32,
        kind: &str,
        subfolder: Option<&str>,
        entry_name: &str,
        entry_id: i64,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> std::io::Result<SavedAttachment> {
        let extension = extension_from_content_type(content_type);

        let mut dir = self.root.join(wom_id.to_string()).join(kind);
        let mut url_path = format!("{wom_id}/{kind}");
        if let Some(subfolder) = subfolder {
            let subfolder = sanitize_filename(subfolder);
            if !subfolder.is_empty() {
                dir = dir.join(&subfolder);
                url_path = format!("{url_path}/{subfolder}");
            }
        }
        tokio::fs::create_dir_all(&dir).await?;

        let base_name = format!("{}_{entry_id}", sanitize_filename(entry_name));
        let file_name = self.unique_file_name(&dir, &base_name, extension).await?;
        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes).await?;

        Ok(SavedAttachment {
            url: format!("{}/{url_path}/{file_name}", self.public_base),
            path,
        })
    }

    /// Disambiguates collisions with a numeric suffix, the same way the
    /// store has always been laid out.
    async fn unique_file_name(
        &self,
        dir: &PathBuf,
        base_name: &str,
        extension: &str,
    ) -> std::io::Result<String> {
        let mut candidate = format!("{base_name}.{extension}");
        let mut counter = 1u32;
        while tokio::fs::try_exists(dir.join(&candidate)).await? {
            candidate = format!("{base_name}_{counter}.{extension}");
            counter += 1;
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_under_player_kind_subfolder_layout() {
        let tmp = std::env::temp_dir().join(format!("droptally-sink-{}", std::process::id()));
        let sink = AttachmentSink::new(&tmp, "https://img.example/base/");

        let saved = sink
            .save(
                77,
                "drop",
                Some("King Black Dragon"),
                "Dragon med helm",
                12,
                Some("image/png"),
                b"pngbytes",
            )
            .await
            .expect("save should succeed");

        assert_eq!(
            saved.url,
            "https://img.example/base/77/drop/King_Black_Dragon/Dragon_med_helm_12.png"
        );
        assert!(saved.path.exists());

        // A second save of the same entry gets a numeric suffix.
        let again = sink
            .save(
                77,
                "drop",
                Some("King Black Dragon"),
                "Dragon med helm",
                12,
                Some("image/png"),
                b"pngbytes",
            )
            .await
            .expect("save should succeed");
        assert!(again.url.ends_with("Dragon_med_helm_12_1.png"));

        tokio::fs::remove_dir_all(&tmp).await.ok();
    }
}
