use crate::error::Error;
use crate::playback::{PlaybackError, PlaybackErrorKind};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Minimal parsed view of a stream manifest, enough to decide the stream
/// is playable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamManifest {
    pub variant_count: usize,
}

/// Fetches and validates a stream manifest. The production implementation
/// talks HTTP; tests substitute in-memory loaders.
#[async_trait]
pub trait ManifestLoader: Send + Sync {
    async fn load(&self, stream_url: &str) -> Result<StreamManifest, PlaybackError>;
}

/// HLS manifest loader: fetches the playlist and checks it is an m3u8
/// document before the session is allowed to report Playing.
pub struct HlsManifestLoader {
    client: reqwest::Client,
}

impl HlsManifestLoader {
    /// Build the loader with a per-request timeout. A client that cannot
    /// honor the timeout is a startup failure, not a silent fallback.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ManifestLoader for HlsManifestLoader {
    async fn load(&self, stream_url: &str) -> Result<StreamManifest, PlaybackError> {
        let parsed = Url::parse(stream_url).map_err(|e| {
            PlaybackError::new(
                PlaybackErrorKind::Unsupported,
                format!("Invalid stream URL: {}", e),
            )
        })?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(PlaybackError::new(
                    PlaybackErrorKind::Unsupported,
                    format!("Unsupported stream scheme: {}", other),
                ));
            }
        }

        let response = self.client.get(parsed).send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                PlaybackErrorKind::Timeout
            } else {
                PlaybackErrorKind::Network
            };
            PlaybackError::new(kind, format!("Failed to fetch manifest: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(PlaybackError::new(
                PlaybackErrorKind::Network,
                format!("Manifest request returned {}", response.status()),
            ));
        }

        let body = response.text().await.map_err(|e| {
            PlaybackError::new(
                PlaybackErrorKind::Decode,
                format!("Failed to read manifest body: {}", e),
            )
        })?;

        parse_manifest(&body)
    }
}

fn parse_manifest(body: &str) -> Result<StreamManifest, PlaybackError> {
    if !body.trim_start().starts_with("#EXTM3U") {
        return Err(PlaybackError::new(
            PlaybackErrorKind::Unsupported,
            "Response is not an HLS playlist",
        ));
    }

    let variant_count = body
        .lines()
        .filter(|line| line.starts_with("#EXT-X-STREAM-INF"))
        .count();

    Ok(StreamManifest { variant_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_playlist_counts_variants() {
        let body = "#EXTM3U\n\
                    #EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/index.m3u8\n\
                    #EXT-X-STREAM-INF:BANDWIDTH=2500000\nhigh/index.m3u8\n";
        assert_eq!(parse_manifest(body).unwrap().variant_count, 2);
    }

    #[test]
    fn media_playlist_is_playable_with_no_variants() {
        let body = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg0.ts\n";
        assert_eq!(parse_manifest(body).unwrap().variant_count, 0);
    }

    #[test]
    fn non_hls_body_is_unsupported() {
        let err = parse_manifest("<html>not a stream</html>").unwrap_err();
        assert_eq!(err.kind, PlaybackErrorKind::Unsupported);
    }

    #[test]
    fn loader_builds_with_configured_timeout() {
        assert!(HlsManifestLoader::new(Duration::from_secs(5)).is_ok());
    }
}
